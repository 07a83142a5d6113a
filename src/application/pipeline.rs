//! Run compositions used by the CLI
//!
//! | run              | politicians        | bills        | notices            | opinions         |
//! |------------------|--------------------|--------------|--------------------|------------------|
//! | `init`           | historical+current+SNS | 1..=current | download + import | all open notices |
//! | `update-default` | current + SNS      | current term | download + import  | all open notices |
//! | `update --days N`| -                  | -            | -                  | ending within N days |
//!
//! Stages run in order. A stage that fails as a whole is logged and the run
//! moves on; only context construction errors abort.

use std::time::Instant;

use anyhow::Result;
use tracing::{error, info};

use crate::application::bill_service::BillService;
use crate::application::context::PipelineContext;
use crate::application::notice_service::NoticeService;
use crate::application::opinion_service::OpinionService;
use crate::application::politician_service::{PoliticianService, merge};
use crate::crawling::ImportSummary;

/// Which compound run to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Init,
    UpdateDefault,
    UpdateWithin { days: u32 },
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::UpdateDefault => write!(f, "update-default"),
            Self::UpdateWithin { days } => write!(f, "update --days {days}"),
        }
    }
}

pub struct Pipeline {
    context: PipelineContext,
}

impl Pipeline {
    pub fn new(context: PipelineContext) -> Self {
        Self { context }
    }

    pub async fn run(&self, mode: RunMode) -> Result<ImportSummary> {
        let started = Instant::now();
        info!("🚀 pipeline {} started", mode);

        let mut total = ImportSummary::default();
        match mode {
            RunMode::Init => {
                let politicians = PoliticianService::new(self.context.clone())?;
                let unit = politicians.current_unit().await;
                absorb(&mut total, "historical politicians", politicians.import_historical(unit).await);
                absorb(&mut total, "current politicians", politicians.import_current(unit).await);
                absorb(&mut total, "SNS", politicians.import_sns().await);
                absorb(
                    &mut total,
                    "bills",
                    BillService::new(self.context.clone())?.import_all(unit).await,
                );
                self.legislation(&mut total).await;
            }
            RunMode::UpdateDefault => {
                let politicians = PoliticianService::new(self.context.clone())?;
                let unit = politicians.current_unit().await;
                absorb(&mut total, "current politicians", politicians.import_current(unit).await);
                absorb(&mut total, "SNS", politicians.import_sns().await);
                absorb(
                    &mut total,
                    "current bills",
                    BillService::new(self.context.clone())?.import_term(unit).await,
                );
                self.legislation(&mut total).await;
            }
            RunMode::UpdateWithin { days } => {
                let opinions = OpinionService::new(self.context.clone(), self.context.bootstrapper());
                absorb(&mut total, "opinions", opinions.run(Some(days)).await);
            }
        }

        total.elapsed = started.elapsed();
        total.log(&mode.to_string());
        Ok(total)
    }

    /// Notice list download + import, then opinions of every open notice.
    async fn legislation(&self, total: &mut ImportSummary) {
        let notices = NoticeService::new(self.context.clone(), self.context.bootstrapper());
        absorb(total, "notices", notices.run().await);

        let opinions = OpinionService::new(self.context.clone(), self.context.bootstrapper());
        absorb(total, "opinions", opinions.run(None).await);
    }
}

fn absorb(total: &mut ImportSummary, stage: &str, outcome: Result<ImportSummary>) {
    match outcome {
        Ok(summary) => merge(total, &summary),
        Err(e) => error!("❌ stage {} failed: {:#}", stage, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn failed_stage_leaves_total_untouched() {
        let mut total = ImportSummary {
            fetched: 5,
            succeeded: 5,
            ..ImportSummary::default()
        };
        absorb(&mut total, "broken", Err(anyhow!("boom")));
        assert_eq!((total.fetched, total.succeeded, total.failed), (5, 5, 0));

        absorb(
            &mut total,
            "ok",
            Ok(ImportSummary {
                fetched: 2,
                succeeded: 1,
                failed: 1,
                ..ImportSummary::default()
            }),
        );
        assert_eq!((total.fetched, total.succeeded, total.failed), (7, 6, 1));
    }

    #[test]
    fn run_modes_render_as_commands() {
        assert_eq!(RunMode::Init.to_string(), "init");
        assert_eq!(RunMode::UpdateWithin { days: 3 }.to_string(), "update --days 3");
    }
}
