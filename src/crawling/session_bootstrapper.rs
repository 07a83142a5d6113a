//! Session Bootstrapper
//!
//! 입법예고 포털은 CSRF 토큰과 브라우저 세션 쿠키가 없으면 엑셀 다운로드와
//! 의견 본문 조회를 거부한다. A headless browser walks the portal pages that
//! establish server-side state, then the token and the cookie jar are captured
//! together into a read-only [`Session`].
//!
//! The browser process is always terminated: on every error path inside
//! [`SessionBootstrapper::create_session`], and after the caller's work in
//! [`SessionBootstrapper::with_session`] whether it succeeded, failed or
//! panicked.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::Session;
use crate::infrastructure::config::{BrowserConfig, LegislationConfig};
use crate::infrastructure::{BrowserDriver, BrowserError, BrowserLauncher, FetchRequest, WaitMode};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("page never rendered {selector}")]
    WaitTimeout { selector: String },

    #[error("token extraction failed: {0}")]
    Extraction(String),

    #[error("cookie extraction failed: {0}")]
    Cookies(String),
}

impl From<BrowserError> for SessionError {
    fn from(e: BrowserError) -> Self {
        match e {
            BrowserError::Launch(message) => Self::Launch(message),
            BrowserError::Navigation { url, message } => Self::Navigation { url, message },
            BrowserError::WaitTimeout { selector, .. } => Self::WaitTimeout { selector },
            BrowserError::Evaluation(message) => Self::Extraction(message),
            BrowserError::Cookies(message) => Self::Cookies(message),
            BrowserError::Closed => Self::Extraction("browser closed mid-session".to_string()),
        }
    }
}

const MENU_NO: &str = "1100026";
const PLACEHOLDER_BILL_ID: &str = "placeholder";

/// 입법예고 포털 URL 모음
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalUrls {
    base: String,
}

impl PortalUrls {
    pub fn new(base: impl Into<String>) -> Self {
        let base: String = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn origin(&self) -> &str {
        &self.base
    }

    /// 진행 중 입법예고 목록
    #[must_use]
    pub fn ongoing_list(&self) -> String {
        format!(
            "{}/napal/lgsltpa/lgsltpaOngoing/list.do?searchConClosed=0&menuNo={MENU_NO}",
            self.base
        )
    }

    #[must_use]
    pub fn ongoing_list_for(&self, bill_id: &str) -> String {
        format!(
            "{}/napal/lgsltpa/lgsltpaOngoing/list.do?lgsltPaId={bill_id}&menuNo={MENU_NO}",
            self.base
        )
    }

    #[must_use]
    pub fn notice_view(&self, bill_id: &str) -> String {
        format!("{}/napal/lgsltpa/lgsltpaOngoing/view.do?lgsltPaId={bill_id}", self.base)
    }

    /// 의견 목록 (입법예고기간, 의견 수 포함)
    #[must_use]
    pub fn opinion_list(&self, bill_id: &str) -> String {
        format!(
            "{}/napal/lgsltpa/lgsltpaOpn/list.do?lgsltPaId={bill_id}&searchConClosed=0",
            self.base
        )
    }

    #[must_use]
    pub fn opinion_download(&self) -> String {
        format!("{}/napal/lgsltpa/lgsltpaOpn/downloadExcel.uxls", self.base)
    }

    #[must_use]
    pub fn notice_download(&self) -> String {
        format!("{}/napal/lgsltpa/lgsltpaOngoing/downloadExcel.uxls", self.base)
    }

    #[must_use]
    pub fn opinion_content(&self) -> String {
        format!("{}/napal/lgsltpa/lgsltpaOpn/findOneLgsltpaOpnById.json", self.base)
    }
}

/// What the session will be used for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTarget {
    /// 특정 의안의 등록의견 목록/다운로드/본문 조회
    Opinions { bill_id: String },
    /// 진행 중 입법예고 목록 다운로드
    NoticeList,
}

impl std::fmt::Display for SessionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opinions { bill_id } => write!(f, "opinions({bill_id})"),
            Self::NoticeList => f.write_str("notice-list"),
        }
    }
}

/// Fixed navigation sequence for one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationPlan {
    pub pages: Vec<String>,
    pub ready_selector: &'static str,
    pub ready_mode: WaitMode,
    /// page-size select change + window load, for deferred table content
    pub simulate_interaction: bool,
}

const OPINION_TABLE: &str = "#tbody_opnList";
const CSRF_INPUT: &str = r#"input[name="_csrf"]"#;

const SET_PAGE_UNIT: &str = r#"(() => { const s = document.querySelector('select[name="pageUnit"]'); if (s) { s.value = "10"; } return !!s; })()"#;
const DISPATCH_CHANGE: &str = r#"(() => { const s = document.querySelector('select[name="pageUnit"]'); if (s) { s.dispatchEvent(new Event("change")); } return !!s; })()"#;
const DISPATCH_LOAD: &str = r#"window.dispatchEvent(new Event("load"))"#;
const READ_CSRF: &str = r#"(() => { const el = document.querySelector('input[name="_csrf"]'); return el ? el.value : null; })()"#;

impl SessionTarget {
    #[must_use]
    pub fn plan(&self, urls: &PortalUrls) -> NavigationPlan {
        match self {
            Self::Opinions { bill_id } => NavigationPlan {
                pages: vec![
                    urls.ongoing_list_for(bill_id),
                    urls.notice_view(bill_id),
                    urls.opinion_list(bill_id),
                ],
                ready_selector: OPINION_TABLE,
                ready_mode: WaitMode::Visible,
                simulate_interaction: true,
            },
            Self::NoticeList => NavigationPlan {
                pages: vec![urls.notice_view(PLACEHOLDER_BILL_ID), urls.ongoing_list()],
                // hidden input, never laid out
                ready_selector: CSRF_INPUT,
                ready_mode: WaitMode::Present,
                simulate_interaction: false,
            },
        }
    }
}

/// A captured session plus the browser that owns it. Call [`release`]
/// when done; dropping it without release only logs.
///
/// [`release`]: BrowserSession::release
pub struct BrowserSession<D: BrowserDriver> {
    session: Arc<Session>,
    driver: Option<D>,
}

impl<D: BrowserDriver> BrowserSession<D> {
    #[must_use]
    pub fn session(&self) -> Arc<Session> {
        Arc::clone(&self.session)
    }

    /// Terminate the browser process.
    pub async fn release(mut self) {
        if let Some(mut driver) = self.driver.take() {
            if let Err(e) = driver.close().await {
                warn!("⚠️ browser close failed: {}", e);
            }
        }
    }
}

impl<D: BrowserDriver> std::fmt::Debug for BrowserSession<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserSession")
            .field("cookies", &self.session.cookies().len())
            .field("released", &self.driver.is_none())
            .finish()
    }
}

impl<D: BrowserDriver> Drop for BrowserSession<D> {
    fn drop(&mut self) {
        if self.driver.is_some() {
            warn!("⚠️ browser session dropped without release");
        }
    }
}

pub struct SessionBootstrapper<L> {
    launcher: L,
    urls: PortalUrls,
    wait_timeout: Duration,
    settle: Duration,
}

impl<L: BrowserLauncher> SessionBootstrapper<L> {
    pub fn new(launcher: L, urls: PortalUrls, wait_timeout: Duration, settle: Duration) -> Self {
        Self {
            launcher,
            urls,
            wait_timeout,
            settle,
        }
    }

    pub fn from_config(launcher: L, browser: &BrowserConfig, legislation: &LegislationConfig) -> Self {
        Self::new(
            launcher,
            PortalUrls::new(&legislation.base_url),
            Duration::from_secs(browser.wait_timeout_seconds),
            Duration::from_millis(browser.settle_millis),
        )
    }

    #[must_use]
    pub fn urls(&self) -> &PortalUrls {
        &self.urls
    }

    /// Launch a browser and capture a session for `target`. On error the
    /// browser has already been closed.
    pub async fn create_session(&self, target: &SessionTarget) -> Result<BrowserSession<L::Driver>, SessionError> {
        let mut driver = self.launcher.launch().await?;

        match self.drive(&mut driver, target).await {
            Ok(session) => Ok(BrowserSession {
                session: Arc::new(session),
                driver: Some(driver),
            }),
            Err(e) => {
                warn!("⚠️ session bootstrap for {} failed: {}", target, e);
                if let Err(close_err) = driver.close().await {
                    warn!("⚠️ browser close failed: {}", close_err);
                }
                Err(e)
            }
        }
    }

    /// Run `work` with a fresh session and release the browser afterwards,
    /// also when `work` panics.
    pub async fn with_session<F, Fut, T>(&self, target: &SessionTarget, work: F) -> Result<T, SessionError>
    where
        F: FnOnce(Arc<Session>) -> Fut + Send,
        Fut: Future<Output = T> + Send,
        T: Send,
    {
        let browser = self.create_session(target).await?;
        let outcome = AssertUnwindSafe(work(browser.session())).catch_unwind().await;
        browser.release().await;
        match outcome {
            Ok(value) => Ok(value),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn drive(&self, driver: &mut L::Driver, target: &SessionTarget) -> Result<Session, SessionError> {
        let plan = target.plan(&self.urls);

        for url in &plan.pages {
            debug!("🧭 {}", url);
            driver.navigate(url).await?;
        }
        driver
            .wait_for(plan.ready_selector, plan.ready_mode, self.wait_timeout)
            .await?;

        if plan.simulate_interaction {
            driver.evaluate(SET_PAGE_UNIT).await?;
            driver.evaluate(DISPATCH_CHANGE).await?;
            tokio::time::sleep(self.settle).await;
            driver.evaluate(DISPATCH_LOAD).await?;
            tokio::time::sleep(self.settle * 2 / 3).await;
        }

        let token = driver.evaluate(READ_CSRF).await?;
        let token = token
            .as_str()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SessionError::Extraction(format!("no _csrf value on {target}")))?
            .to_string();

        let cookies = driver.get_cookies().await?;
        info!("🔐 session ready for {}: {} cookies", target, cookies.len());
        Ok(Session::new(token, cookies))
    }
}

/// Builds the plain HTTP requests that must look like they came from the
/// browser that produced the session.
#[derive(Debug, Clone)]
pub struct AuthenticatedRequests {
    urls: PortalUrls,
    user_agent: String,
}

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

fn form(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
}

impl AuthenticatedRequests {
    pub fn new(urls: PortalUrls, user_agent: impl Into<String>) -> Self {
        Self {
            urls,
            user_agent: user_agent.into(),
        }
    }

    #[must_use]
    pub fn urls(&self) -> &PortalUrls {
        &self.urls
    }

    /// 입법예고 등록의견 엑셀 다운로드
    #[must_use]
    pub fn opinion_download(&self, session: &Session, bill_id: &str) -> FetchRequest {
        let body = form(&[
            ("_csrf", session.csrf_token()),
            ("lgsltPaId", bill_id),
            ("excelFileName", "입법예고 등록의견"),
            ("headers", "의견번호,제목,작성자,의견제출기관,등록일"),
            ("columns", "opnNo,sj,rgrNm,opnSbmInstNm,opnRgDt"),
            ("menuNo", MENU_NO),
            ("sortCol", "OPN_NO"),
            ("sortGbn", "DESC"),
            ("searchConRng", "0"),
            ("searchConKey", "0"),
            ("searchWrd", ""),
            ("divType", ""),
            ("pageIndex", "1"),
            ("pageUnit", "10"),
        ]);

        FetchRequest::post_form(self.urls.opinion_download(), body)
            .header("Content-Type", FORM_CONTENT_TYPE)
            .header("Accept", "*/*")
            .header("Cache-Control", "no-cache")
            .header("Pragma", "no-cache")
            .header("Referer", self.urls.opinion_list(bill_id))
            .header("Origin", self.urls.origin())
            .header("User-Agent", &self.user_agent)
            .header("Sec-Fetch-Dest", "iframe")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "same-origin")
            .header("Sec-Fetch-User", "?1")
            .header("Cookie", session.cookie_header(&[("fileDownloadToken", "TRUE")]))
    }

    /// 진행 중 입법예고 목록 엑셀 다운로드
    #[must_use]
    pub fn notice_list_download(&self, session: &Session) -> FetchRequest {
        let body = form(&[
            ("_csrf", session.csrf_token()),
            ("excelFileName", "진행 중 입법예고"),
            ("headers", "의안번호,의견수,법률안명,제안자구분,소관위원회,주요내용,등록일시"),
            (
                "columns",
                "billNo,opnCnt,billNameTitle,proposerKindCd,currCommittee,ppslRsonMnCn,lgsltPaRgDt",
            ),
            ("menuNo", MENU_NO),
            ("sortCol", "BILL_NO"),
            ("sortGbn", "DESC"),
            ("searchConClosed", "0"),
            ("divType", ""),
            ("committeeId", ""),
            ("billName", ""),
            ("represent", ""),
            ("proposers", ""),
            ("ppslRsonMnCn", ""),
            ("committeeIdMb", ""),
            ("billNameMb", ""),
            ("representMb", ""),
            ("proposersMb", ""),
            ("ppslRsonMnCnMb", ""),
            ("pageIndex", "1"),
            ("pageUnit", "10"),
        ]);

        FetchRequest::post_form(self.urls.notice_download(), body)
            .header("Content-Type", FORM_CONTENT_TYPE)
            .header("Referer", self.urls.ongoing_list())
            .header("Origin", self.urls.origin())
            .header("User-Agent", &self.user_agent)
            .header("Cookie", session.cookie_header(&[]))
    }

    /// 의견 본문 조회 (AJAX)
    #[must_use]
    pub fn opinion_content(&self, session: &Session, bill_id: &str, opinion_no: u64) -> FetchRequest {
        let body = form(&[("lgsltPaId", bill_id), ("opnNo", &opinion_no.to_string())]);

        FetchRequest::post_form(self.urls.opinion_content(), body)
            .header("Content-Type", FORM_CONTENT_TYPE)
            .header("x-csrf-token", session.csrf_token())
            .header("Referer", self.urls.opinion_list(bill_id))
            .header("Origin", self.urls.origin())
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/json, text/javascript, */*; q=0.01")
            .header("X-Requested-With", "XMLHttpRequest")
            .header("requestAJAX", "true")
            .header("Cookie", session.cookie_header(&[]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SessionCookie;

    fn session() -> Session {
        Session::new(
            "tok-123".into(),
            vec![
                SessionCookie::new("JSESSIONID", "abc", "pal.assembly.go.kr", "/"),
                SessionCookie::new("WMONID", "xyz", "pal.assembly.go.kr", "/"),
            ],
        )
    }

    fn requests() -> AuthenticatedRequests {
        AuthenticatedRequests::new(PortalUrls::new("https://pal.assembly.go.kr/"), "Mozilla/5.0 test")
    }

    #[test]
    fn opinion_plan_visits_list_view_then_target() {
        let urls = PortalUrls::new("https://pal.assembly.go.kr");
        let plan = SessionTarget::Opinions { bill_id: "PRC_A1".into() }.plan(&urls);
        assert_eq!(
            plan.pages,
            vec![
                "https://pal.assembly.go.kr/napal/lgsltpa/lgsltpaOngoing/list.do?lgsltPaId=PRC_A1&menuNo=1100026",
                "https://pal.assembly.go.kr/napal/lgsltpa/lgsltpaOngoing/view.do?lgsltPaId=PRC_A1",
                "https://pal.assembly.go.kr/napal/lgsltpa/lgsltpaOpn/list.do?lgsltPaId=PRC_A1&searchConClosed=0",
            ]
        );
        assert_eq!((plan.ready_selector, plan.ready_mode), ("#tbody_opnList", WaitMode::Visible));
        assert!(plan.simulate_interaction);

        let plan = SessionTarget::NoticeList.plan(&urls);
        assert_eq!(plan.pages.len(), 2);
        assert_eq!((plan.ready_selector, plan.ready_mode), (r#"input[name="_csrf"]"#, WaitMode::Present));
        assert!(!plan.simulate_interaction);
    }

    #[test]
    fn opinion_download_echoes_token_and_cookies() {
        let request = requests().opinion_download(&session(), "PRC_A1");
        assert_eq!(request.url, "https://pal.assembly.go.kr/napal/lgsltpa/lgsltpaOpn/downloadExcel.uxls");
        assert_eq!(request.form_value("_csrf"), Some("tok-123"));
        assert_eq!(request.form_value("lgsltPaId"), Some("PRC_A1"));
        assert_eq!(request.form_value("sortCol"), Some("OPN_NO"));
        assert_eq!(
            request.header_value("cookie"),
            Some("JSESSIONID=abc; WMONID=xyz; fileDownloadToken=TRUE")
        );
        assert_eq!(request.header_value("Sec-Fetch-Dest"), Some("iframe"));
    }

    #[test]
    fn content_request_carries_csrf_header() {
        let request = requests().opinion_content(&session(), "PRC_A1", 42);
        assert_eq!(request.header_value("x-csrf-token"), Some("tok-123"));
        assert_eq!(request.header_value("X-Requested-With"), Some("XMLHttpRequest"));
        assert_eq!(request.form_value("opnNo"), Some("42"));
        assert_eq!(request.header_value("Cookie"), Some("JSESSIONID=abc; WMONID=xyz"));
    }

    #[test]
    fn notice_download_has_fixed_form() {
        let request = requests().notice_list_download(&session());
        assert_eq!(request.form_value("excelFileName"), Some("진행 중 입법예고"));
        assert_eq!(request.form_value("sortCol"), Some("BILL_NO"));
        assert_eq!(request.form_value("proposersMb"), Some(""));
        assert_eq!(
            request.header_value("Referer"),
            Some("https://pal.assembly.go.kr/napal/lgsltpa/lgsltpaOngoing/list.do?searchConClosed=0&menuNo=1100026")
        );
    }

    #[test]
    fn wait_timeout_maps_to_session_error() {
        let err: SessionError = BrowserError::WaitTimeout {
            selector: "#tbody_opnList".into(),
            timeout: Duration::from_secs(1),
        }
        .into();
        assert_eq!(err, SessionError::WaitTimeout { selector: "#tbody_opnList".into() });
    }
}
