//! One relayed prompt: acquire a session, build the payload, forward it.
//!
//! The three steps run in sequence and each either completes or ends the
//! call. There are no retries and nothing survives the call.

use crate::acquisition::{self, ScrapedSession};
use crate::config::UpstreamConfig;
use crate::error::{RelayError, RelayResult};
use crate::payload::{RequestIds, UploadForm};
use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Timing attached to a successful reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyMetadata {
    /// Seconds, two decimals, `s` suffix.
    pub response_time: String,
    /// UTC ISO-8601 with a trailing `Z`.
    pub timestamp: String,
}

impl ReplyMetadata {
    pub fn finished(elapsed: Duration) -> Self {
        Self {
            response_time: format_elapsed(elapsed),
            timestamp: utc_timestamp(Utc::now()),
        }
    }
}

/// The upstream body, untouched, plus timing.
#[derive(Debug, Clone)]
pub struct RelayReply {
    pub body: String,
    pub metadata: ReplyMetadata,
}

/// Forwards prompts to the upstream web app.
#[derive(Debug, Clone)]
pub struct Relay {
    config: UpstreamConfig,
}

impl Relay {
    pub fn new(config: UpstreamConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// Scrape a fresh session and forward `prompt` with it.
    pub async fn ask(&self, prompt: &str) -> RelayResult<RelayReply> {
        let started = Instant::now();

        let session = acquisition::acquire(&self.config).await.map_err(|cause| {
            warn!(%cause, "session acquisition failed");
            RelayError::SessionUnavailable { cause }
        })?;

        let ids = RequestIds::generate();
        let form = UploadForm::new(prompt, &session.token, &ids, &self.config.locale)?;
        debug!(
            session_id = %ids.session_id,
            request_uuid = %ids.request_uuid,
            "payload built"
        );

        let body = self.forward(&session, &form).await?;
        let metadata = ReplyMetadata::finished(started.elapsed());
        info!(
            response_time = %metadata.response_time,
            bytes = body.len(),
            "upstream replied"
        );

        Ok(RelayReply { body, metadata })
    }

    /// URL of the generate endpoint for one session.
    pub fn stream_url(&self, session: &ScrapedSession) -> RelayResult<url::Url> {
        let reqid = session.request_counter.to_string();
        url::Url::parse_with_params(
            &self.config.generate_url,
            [
                ("bl", session.build_label.as_str()),
                ("f.sid", session.flow_id.as_str()),
                ("hl", self.config.locale.as_str()),
                ("_reqid", reqid.as_str()),
                ("rt", "c"),
            ],
        )
        .map_err(|e| RelayError::Network(format!("invalid upstream URL: {e}")))
    }

    async fn forward(&self, session: &ScrapedSession, form: &UploadForm) -> RelayResult<String> {
        let url = self.stream_url(session)?;
        let headers = [
            ("origin", self.config.origin.as_str()),
            ("referer", self.config.referer.as_str()),
        ];

        let resp = session
            .client
            .post_form(
                url.as_str(),
                form.encode(),
                &headers,
                self.config.forward_timeout,
            )
            .await
            .map_err(|e| {
                warn!(error = %e, "forward request failed");
                RelayError::Network(e.to_string())
            })?;

        if resp.status != 200 {
            warn!(status = resp.status, "upstream rejected request");
            return Err(RelayError::UpstreamRejected(resp.status));
        }

        Ok(resp.body)
    }
}

/// Seconds rounded to two decimals with an `s` suffix: `1.23s`, `2.0s`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = (elapsed.as_secs_f64() * 100.0).round() / 100.0;
    format!("{secs:?}s")
}

/// ISO-8601 UTC timestamp with a trailing `Z`. Microseconds are omitted
/// when zero.
pub fn utc_timestamp(now: DateTime<Utc>) -> String {
    if now.nanosecond() / 1_000 == 0 {
        format!("{}Z", now.format("%Y-%m-%dT%H:%M:%S"))
    } else {
        format!("{}Z", now.format("%Y-%m-%dT%H:%M:%S%.6f"))
    }
}
