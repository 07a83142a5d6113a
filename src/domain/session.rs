//! 브라우저 세션 값 객체
//!
//! Token and cookie jar are captured together once navigation has finished
//! and are read-only afterwards. Concurrent HTTP callers share a `Session`
//! behind an `Arc`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
}

impl SessionCookie {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: path.into(),
        }
    }
}

/// CSRF 토큰 + 쿠키 묶음
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    csrf_token: String,
    cookies: Vec<SessionCookie>,
}

impl Session {
    #[must_use]
    pub fn new(csrf_token: String, cookies: Vec<SessionCookie>) -> Self {
        Self { csrf_token, cookies }
    }

    #[must_use]
    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    #[must_use]
    pub fn cookies(&self) -> &[SessionCookie] {
        &self.cookies
    }

    /// `Cookie` header value, optionally followed by extra `name=value` pairs.
    #[must_use]
    pub fn cookie_header(&self, extra: &[(&str, &str)]) -> String {
        self.cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .chain(extra.iter().map(|(name, value)| format!("{name}={value}")))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_header_appends_extras_in_order() {
        let session = Session::new(
            "tok".into(),
            vec![
                SessionCookie::new("JSESSIONID", "abc", "pal.assembly.go.kr", "/"),
                SessionCookie::new("WMONID", "xyz", "pal.assembly.go.kr", "/"),
            ],
        );
        assert_eq!(
            session.cookie_header(&[("fileDownloadToken", "TRUE")]),
            "JSESSIONID=abc; WMONID=xyz; fileDownloadToken=TRUE"
        );
        assert_eq!(session.csrf_token(), "tok");
    }
}
