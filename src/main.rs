//! `gwatch` - GWatch data pipeline CLI

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use gwatch_pipeline::application::{
    BillService, NoticeService, OpinionService, Pipeline, PipelineContext, PoliticianService, RunMode,
};
use gwatch_pipeline::crawling::ImportSummary;
use gwatch_pipeline::infrastructure::{AppConfig, init_logging_with_config};

#[derive(Parser, Debug)]
#[command(name = "gwatch")]
#[command(about = "National Assembly legislative data pipeline")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./gwatch.toml, then the user config dir)
    #[arg(short, long, env = "GWATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Full load: all politicians, all bills, notices and opinions
    Init,
    /// Current politicians and bills, then notices and opinions
    UpdateDefault,
    /// Opinions of notices ending within N days
    Update {
        #[arg(short, long, default_value_t = 1)]
        days: u32,
    },
    #[command(name = "update-1d")]
    Update1d,
    #[command(name = "update-3d")]
    Update3d,
    #[command(name = "update-7d")]
    Update7d,
    /// Historical and current members plus SNS
    Politicians,
    /// Bills of one term, or of every term when omitted
    Bills {
        #[arg(short, long)]
        term: Option<u32>,
    },
    /// Download and import the ongoing notice list
    Notices,
    /// Download and import opinions of every open notice
    Opinions,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("configuration error")?;
    init_logging_with_config(&config.logging)?;
    info!("🚀 gwatch {} starting", env!("CARGO_PKG_VERSION"));

    let context = PipelineContext::connect(config).await?;

    tokio::select! {
        result = execute(cli.command, context) => {
            let summary = result?;
            info!("🏁 done: {} succeeded, {} failed", summary.succeeded, summary.failed);
            Ok(())
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("🛑 interrupted, stopping");
            Ok(())
        }
    }
}

async fn execute(command: Command, context: PipelineContext) -> Result<ImportSummary> {
    match command {
        Command::Init => Pipeline::new(context).run(RunMode::Init).await,
        Command::UpdateDefault => Pipeline::new(context).run(RunMode::UpdateDefault).await,
        Command::Update { days } => Pipeline::new(context).run(RunMode::UpdateWithin { days }).await,
        Command::Update1d => Pipeline::new(context).run(RunMode::UpdateWithin { days: 1 }).await,
        Command::Update3d => Pipeline::new(context).run(RunMode::UpdateWithin { days: 3 }).await,
        Command::Update7d => Pipeline::new(context).run(RunMode::UpdateWithin { days: 7 }).await,
        Command::Politicians => PoliticianService::new(context)?.run().await,
        Command::Bills { term } => {
            let service = PoliticianService::new(context.clone())?;
            let bills = BillService::new(context)?;
            match term {
                Some(age) => bills.import_term(age).await,
                None => bills.import_all(service.current_unit().await).await,
            }
        }
        Command::Notices => {
            let bootstrapper = context.bootstrapper();
            NoticeService::new(context, bootstrapper).run().await
        }
        Command::Opinions => {
            let bootstrapper = context.bootstrapper();
            OpinionService::new(context, bootstrapper).run(None).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_days_defaults_to_one() {
        let cli = Cli::try_parse_from(["gwatch", "update"]).unwrap();
        assert!(matches!(cli.command, Command::Update { days: 1 }));

        let cli = Cli::try_parse_from(["gwatch", "update", "-d", "5"]).unwrap();
        assert!(matches!(cli.command, Command::Update { days: 5 }));
    }

    #[test]
    fn fixed_window_aliases_parse() {
        let cli = Cli::try_parse_from(["gwatch", "--config", "x.toml", "update-7d"]).unwrap();
        assert!(matches!(cli.command, Command::Update7d));
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
    }

    #[test]
    fn bills_accepts_a_term() {
        let cli = Cli::try_parse_from(["gwatch", "bills", "--term", "21"]).unwrap();
        assert!(matches!(cli.command, Command::Bills { term: Some(21) }));
    }
}
