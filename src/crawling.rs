//! # Crawling Module
//!
//! 수집 파이프라인의 핵심 구성요소
//! - `collector` / `envelope`: 열린국회정보 Open API 페이지 수집
//! - `importer`: fetch tier + persist tier 워커 풀
//! - `session_bootstrapper`: 헤드리스 브라우저로 CSRF 토큰과 쿠키 확보
//! - `download_pool`: 엑셀 다운로드 (1회 재시도)
//! - `spreadsheet_extractor`: 엑셀 행 → 작업 레코드, watermark 필터
//! - `proposer_resolver`: 발의자 텍스트 → 국회의원 ID
//! - `html`: 서버 렌더링 페이지 파싱

pub mod collector;
pub mod download_pool;
pub mod envelope;
pub mod html;
pub mod importer;
pub mod proposer_resolver;
pub mod session_bootstrapper;
pub mod spreadsheet_extractor;

pub use collector::{ApiCollector, CollectorError, Resource, ResourcePages};
pub use download_pool::{DownloadError, DownloadPool, DownloadReport, save_download};
pub use envelope::{Envelope, EnvelopeError};
pub use html::HtmlError;
pub use importer::{
    ImportOptions, ImportStats, ImportSummary, Importer, JobBatch, PageSource, RowError, RowSink,
};
pub use proposer_resolver::{
    ProposerQuery, ProposerResolver, ProposerText, ResolveError, ResolveStep, Resolution,
    parse_proposer_text, resolve_candidates,
};
pub use session_bootstrapper::{
    AuthenticatedRequests, BrowserSession, NavigationPlan, PortalUrls, SessionBootstrapper,
    SessionError, SessionTarget,
};
pub use spreadsheet_extractor::{ExtractError, OpinionBatch, SpreadsheetExtractor};
