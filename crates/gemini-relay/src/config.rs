//! Server and upstream configuration.
//!
//! The listener gets an explicit [`ServerConfig`]; the only environment
//! variables consulted are the bind host and port. Everything shaped by the
//! upstream web app lives in [`UpstreamConfig`] so it can be updated in one
//! place when the upstream changes.

use anyhow::{Context, Result};
use std::time::Duration;

/// Environment variable overriding the bind host.
pub const HOST_ENV: &str = "RELAY_HOST";
/// Environment variable overriding the bind port.
pub const PORT_ENV: &str = "RELAY_PORT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;

/// Upstream origin the web client runs on.
pub const UPSTREAM_ORIGIN: &str = "https://gemini.google.com";
/// Path of the page that embeds the session token.
pub const PAGE_PATH: &str = "/app";
/// Path of the internal streaming generate endpoint.
pub const GENERATE_PATH: &str =
    "/_/BardChatUi/data/assistant.lamda.BardFrontendService/StreamGenerate";

/// Build label sent when the page does not expose one.
///
/// This is a dated snapshot of the upstream front-end build and goes stale
/// whenever the upstream deploys. It has to be updated by hand; nothing
/// refreshes it.
pub const STALE_BUILD_LABEL: &str = "boq_assistant-bard-web-server_20251217.07_p5";

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Lowers the default log level to `debug`.
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            debug: false,
        }
    }
}

impl ServerConfig {
    /// Resolve the listener settings: explicit flag > environment > default.
    pub fn resolve(host: Option<&str>, port: Option<u16>, debug: bool) -> Result<Self> {
        Self::resolve_with(host, port, debug, |key| std::env::var(key).ok())
    }

    /// Same as [`ServerConfig::resolve`] with an injectable environment lookup.
    pub fn resolve_with<F>(host: Option<&str>, port: Option<u16>, debug: bool, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = match host {
            Some(h) => h.to_string(),
            None => env(HOST_ENV)
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        };

        let port = match port {
            Some(p) => p,
            None => match env(PORT_ENV) {
                Some(raw) => raw
                    .trim()
                    .parse::<u16>()
                    .with_context(|| format!("invalid {PORT_ENV} value: {raw:?}"))?,
                None => DEFAULT_PORT,
            },
        };

        Ok(Self { host, port, debug })
    }

    /// `host:port` string handed to the TCP listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Log filter used when `RUST_LOG` is not set.
    pub fn default_log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

/// Everything the relay needs to know about the upstream web app.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Page scraped for the session token.
    pub page_url: String,
    /// Streaming generate endpoint the prompt is posted to.
    pub generate_url: String,
    /// `origin` header on the forward request.
    pub origin: String,
    /// `referer` header on the forward request.
    pub referer: String,
    /// Locale tag used in the payload and the `hl` query parameter.
    pub locale: String,
    pub user_agent: String,
    pub accept_language: String,
    pub page_timeout: Duration,
    pub forward_timeout: Duration,
    /// Sent as `bl` when the page carries no build label.
    pub fallback_build_label: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self::for_base_url(UPSTREAM_ORIGIN)
    }
}

impl UpstreamConfig {
    /// Point every upstream URL at `base` (scheme + host, no trailing slash).
    pub fn for_base_url(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            page_url: format!("{base}{PAGE_PATH}"),
            generate_url: format!("{base}{GENERATE_PATH}"),
            origin: base.to_string(),
            referer: format!("{base}/"),
            locale: "en-US".to_string(),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                         AppleWebKit/537.36 (KHTML, like Gecko) \
                         Chrome/131.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            page_timeout: Duration::from_secs(30),
            forward_timeout: Duration::from_secs(60),
            fallback_build_label: STALE_BUILD_LABEL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_flags_or_env() {
        let cfg = ServerConfig::resolve_with(None, None, false, env_of(&[])).unwrap();
        assert_eq!(cfg, ServerConfig::default());
        assert_eq!(cfg.bind_address(), "0.0.0.0:5000");
        assert_eq!(cfg.default_log_level(), "info");
    }

    #[test]
    fn test_env_overrides_defaults() {
        let env = env_of(&[(HOST_ENV, "127.0.0.1"), (PORT_ENV, " 8080 ")]);
        let cfg = ServerConfig::resolve_with(None, None, true, env).unwrap();
        assert_eq!(cfg.bind_address(), "127.0.0.1:8080");
        assert_eq!(cfg.default_log_level(), "debug");
    }

    #[test]
    fn test_flags_override_env() {
        let env = env_of(&[(HOST_ENV, "127.0.0.1"), (PORT_ENV, "8080")]);
        let cfg = ServerConfig::resolve_with(Some("::1"), Some(9000), false, env).unwrap();
        assert_eq!(cfg.host, "::1");
        assert_eq!(cfg.port, 9000);
    }

    #[test]
    fn test_bad_port_env_is_an_error() {
        let env = env_of(&[(PORT_ENV, "http")]);
        let err = ServerConfig::resolve_with(None, None, false, env).unwrap_err();
        assert!(err.to_string().contains(PORT_ENV));
    }

    #[test]
    fn test_upstream_urls_follow_base() {
        let cfg = UpstreamConfig::for_base_url("http://127.0.0.1:4000/");
        assert_eq!(cfg.page_url, "http://127.0.0.1:4000/app");
        assert!(cfg.generate_url.ends_with("/StreamGenerate"));
        assert_eq!(cfg.origin, "http://127.0.0.1:4000");
        assert_eq!(cfg.referer, "http://127.0.0.1:4000/");
        assert_eq!(cfg.fallback_build_label, STALE_BUILD_LABEL);
    }

    #[test]
    fn test_default_targets_live_service() {
        let cfg = UpstreamConfig::default();
        assert_eq!(cfg.page_url, "https://gemini.google.com/app");
        assert_eq!(cfg.page_timeout, Duration::from_secs(30));
        assert_eq!(cfg.forward_timeout, Duration::from_secs(60));
    }
}
