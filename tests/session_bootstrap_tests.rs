//! Browser session lifecycle against a scripted launcher

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use gwatch_pipeline::crawling::{PortalUrls, SessionBootstrapper, SessionError, SessionTarget};
use gwatch_pipeline::domain::SessionCookie;
use gwatch_pipeline::infrastructure::{BrowserDriver, BrowserError, BrowserLauncher, WaitMode};

#[derive(Clone, Default)]
struct Processes {
    launched: Arc<AtomicUsize>,
    alive: Arc<AtomicUsize>,
    navigations: Arc<AtomicUsize>,
}

#[derive(Clone, Copy)]
enum Script {
    Ready,
    NeverReady,
    NoToken,
}

struct ScriptedLauncher {
    processes: Processes,
    script: Script,
}

struct ScriptedDriver {
    processes: Processes,
    script: Script,
    closed: bool,
}

#[async_trait]
impl BrowserLauncher for ScriptedLauncher {
    type Driver = ScriptedDriver;

    async fn launch(&self) -> Result<ScriptedDriver, BrowserError> {
        self.processes.launched.fetch_add(1, Ordering::SeqCst);
        self.processes.alive.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedDriver {
            processes: self.processes.clone(),
            script: self.script,
            closed: false,
        })
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn navigate(&mut self, _url: &str) -> Result<(), BrowserError> {
        self.processes.navigations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, mode: WaitMode, timeout: Duration) -> Result<(), BrowserError> {
        let ready = match self.script {
            Script::NeverReady => false,
            // the _csrf input is type=hidden: in the DOM, never laid out
            _ => !(selector.contains("_csrf") && mode == WaitMode::Visible),
        };
        if ready {
            Ok(())
        } else {
            Err(BrowserError::WaitTimeout {
                selector: selector.to_string(),
                timeout,
            })
        }
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value, BrowserError> {
        if !script.contains("_csrf") {
            return Ok(Value::Null);
        }
        match self.script {
            Script::NoToken => Ok(Value::Null),
            _ => Ok(json!("csrf-abc")),
        }
    }

    async fn get_cookies(&mut self) -> Result<Vec<SessionCookie>, BrowserError> {
        Ok(vec![SessionCookie::new("JSESSIONID", "s1", "pal.assembly.go.kr", "/")])
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        if !self.closed {
            self.closed = true;
            self.processes.alive.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

fn bootstrapper(script: Script) -> (SessionBootstrapper<ScriptedLauncher>, Processes) {
    let processes = Processes::default();
    let launcher = ScriptedLauncher {
        processes: processes.clone(),
        script,
    };
    let bootstrapper = SessionBootstrapper::new(
        launcher,
        PortalUrls::new("https://pal.assembly.go.kr"),
        Duration::from_millis(50),
        Duration::from_millis(1),
    );
    (bootstrapper, processes)
}

fn worker_fails() -> bool {
    true
}

fn opinions() -> SessionTarget {
    SessionTarget::Opinions {
        bill_id: "PRC_A1".into(),
    }
}

#[tokio::test]
async fn session_carries_token_and_cookies_and_is_released() {
    let (bootstrapper, processes) = bootstrapper(Script::Ready);

    let (token, cookies) = bootstrapper
        .with_session(&opinions(), |session| async move {
            (session.csrf_token().to_string(), session.cookie_header(&[]))
        })
        .await
        .unwrap();

    assert_eq!(token, "csrf-abc");
    assert_eq!(cookies, "JSESSIONID=s1");
    assert_eq!(processes.launched.load(Ordering::SeqCst), 1);
    assert_eq!(processes.navigations.load(Ordering::SeqCst), 3);
    assert_eq!(processes.alive.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ready_timeout_fails_and_closes_the_browser() {
    let (bootstrapper, processes) = bootstrapper(Script::NeverReady);

    let err = bootstrapper.create_session(&opinions()).await.unwrap_err();

    assert!(matches!(err, SessionError::WaitTimeout { .. }));
    assert_eq!(processes.alive.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_token_is_an_extraction_error() {
    let (bootstrapper, processes) = bootstrapper(Script::NoToken);

    let err = bootstrapper
        .with_session(&SessionTarget::NoticeList, |_| async {})
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Extraction(_)));
    assert_eq!(processes.alive.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn session_is_released_when_work_panics() {
    let (bootstrapper, processes) = bootstrapper(Script::Ready);
    let bootstrapper = Arc::new(bootstrapper);

    let task = {
        let bootstrapper = Arc::clone(&bootstrapper);
        tokio::spawn(async move {
            bootstrapper
                .with_session(&opinions(), |_| async {
                    if worker_fails() {
                        panic!("worker blew up");
                    }
                })
                .await
        })
    };

    assert!(task.await.unwrap_err().is_panic());
    assert_eq!(processes.alive.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn notice_list_session_is_ready_on_a_hidden_token_input() {
    let (bootstrapper, processes) = bootstrapper(Script::Ready);

    let token = bootstrapper
        .with_session(&SessionTarget::NoticeList, |session| async move {
            session.csrf_token().to_string()
        })
        .await
        .unwrap();

    assert_eq!(token, "csrf-abc");
    assert_eq!(processes.navigations.load(Ordering::SeqCst), 2);
    assert_eq!(processes.alive.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn manual_release_terminates_the_process() {
    let (bootstrapper, processes) = bootstrapper(Script::Ready);

    let browser = bootstrapper.create_session(&SessionTarget::NoticeList).await.unwrap();
    assert_eq!(processes.alive.load(Ordering::SeqCst), 1);
    assert_eq!(browser.session().csrf_token(), "csrf-abc");

    browser.release().await;
    assert_eq!(processes.alive.load(Ordering::SeqCst), 0);
}
