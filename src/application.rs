//! Application layer
//!
//! Services compose the crawling components into import runs; `pipeline`
//! composes the services into the CLI's compound commands.

pub mod bill_service;
pub mod context;
pub mod notice_service;
pub mod opinion_service;
pub mod pipeline;
pub mod politician_service;

pub use bill_service::{BillLookup, BillService, BillSink};
pub use context::{PipelineContext, SharedFetcher};
pub use notice_service::{NoticeService, NoticeSink};
pub use opinion_service::{OpinionContent, OpinionService, OpinionSink, parse_opinion_content};
pub use pipeline::{Pipeline, RunMode};
pub use politician_service::{KNOWN_CURRENT_UNIT, MemberScope, MemberSink, PoliticianService, SnsSink};
