//! Fresh-session scraping.
//!
//! Every relayed call starts here: fetch the page, pull the token and build
//! label out of it, and derive the flow id and request counter from the
//! clock. Sessions are never cached.

use crate::acquisition::http_client::HttpClient;
use crate::acquisition::token;
use crate::config::UpstreamConfig;
use crate::error::SessionFailure;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Parameters scraped from one page load, plus the client that loaded it.
pub struct ScrapedSession {
    /// Carries the cookies set by the page GET.
    pub client: HttpClient,
    pub token: String,
    /// Front-end build label, sent as `bl`.
    pub build_label: String,
    /// Negative epoch-millisecond flow id, sent as `f.sid`.
    pub flow_id: String,
    /// Six-digit request counter, sent as `_reqid`.
    pub request_counter: u32,
}

impl fmt::Debug for ScrapedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrapedSession")
            .field("token_len", &self.token.len())
            .field("build_label", &self.build_label)
            .field("flow_id", &self.flow_id)
            .field("request_counter", &self.request_counter)
            .finish_non_exhaustive()
    }
}

/// Fetch the upstream page and scrape a session from it.
pub async fn acquire(config: &UpstreamConfig) -> Result<ScrapedSession, SessionFailure> {
    let client = HttpClient::new(config).map_err(|e| SessionFailure::Transport(e.to_string()))?;

    let page = client
        .get_page(&config.page_url, config.page_timeout)
        .await
        .map_err(|e| SessionFailure::Transport(e.to_string()))?;

    if !page.is_success() {
        return Err(SessionFailure::Status(page.status));
    }

    let found = token::find_token(&page.body).ok_or(SessionFailure::TokenNotFound)?;
    debug!(
        pattern = found.pattern,
        token_len = found.value.len(),
        final_url = %page.final_url,
        "session token extracted"
    );

    let build_label = match extract_build_label(&page.body) {
        Some(label) => label,
        None => {
            warn!(
                fallback = %config.fallback_build_label,
                "page has no build label, using the stale fallback"
            );
            config.fallback_build_label.clone()
        }
    };

    let now_ms = chrono::Utc::now().timestamp_millis();
    let session = ScrapedSession {
        client,
        token: found.value,
        build_label,
        flow_id: flow_id(now_ms),
        request_counter: request_counter(now_ms),
    };
    debug!(?session, "session scraped");
    Ok(session)
}

/// The `"bl":"…"` value embedded in the page, if any.
pub fn extract_build_label(html: &str) -> Option<String> {
    static BL: OnceLock<Regex> = OnceLock::new();
    let re = BL.get_or_init(|| Regex::new(r#""bl":"([^"]+)""#).expect("build label regex is valid"));
    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Flow id for an epoch-millisecond timestamp: the timestamp, negated.
pub fn flow_id(epoch_ms: i64) -> String {
    (-epoch_ms).to_string()
}

/// Request counter for an epoch-millisecond timestamp: its last six digits.
pub fn request_counter(epoch_ms: i64) -> u32 {
    epoch_ms.rem_euclid(1_000_000) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_label_found() {
        let html = r#"{"bl":"boq_assistant-bard-web-server_20260301.05_p1","cfb2h":"x"}"#;
        assert_eq!(
            extract_build_label(html).as_deref(),
            Some("boq_assistant-bard-web-server_20260301.05_p1")
        );
    }

    #[test]
    fn test_build_label_is_case_sensitive() {
        assert_eq!(extract_build_label(r#"{"BL":"boq_x"}"#), None);
        assert_eq!(extract_build_label("<html></html>"), None);
    }

    #[test]
    fn test_flow_id_is_negated_millis() {
        assert_eq!(flow_id(1_760_000_123_456), "-1760000123456");
    }

    #[test]
    fn test_request_counter_keeps_last_six_digits() {
        assert_eq!(request_counter(1_760_000_123_456), 123_456);
        assert_eq!(request_counter(1_760_000_000_042), 42);
        assert!(request_counter(chrono::Utc::now().timestamp_millis()) < 1_000_000);
    }

    #[test]
    fn test_debug_never_prints_token() {
        let session = ScrapedSession {
            client: HttpClient::new(&UpstreamConfig::default()).unwrap(),
            token: "super-secret-token-value-0123".to_string(),
            build_label: "boq_test".to_string(),
            flow_id: "-1".to_string(),
            request_counter: 1,
        };
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("token_len"));
    }

    #[tokio::test]
    async fn test_unreachable_page_is_transport_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut config = UpstreamConfig::for_base_url(&format!("http://127.0.0.1:{port}"));
        config.page_timeout = std::time::Duration::from_secs(2);
        let err = acquire(&config).await.unwrap_err();
        assert!(matches!(err, SessionFailure::Transport(_)));
    }
}
