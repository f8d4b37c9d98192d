//! Async HTTP client wrapping reqwest.
//!
//! Not a browser. Just the page GET and the form POST the web client makes.
//! The cookie store is on, so whatever the GET sets is replayed on the POST.
//! Build one client per relayed call; nothing is shared between calls.

use crate::config::UpstreamConfig;
use reqwest::header;
use std::time::Duration;

/// Redirect hops followed before giving up, as many as a browser session allows.
pub const MAX_REDIRECTS: usize = 30;

/// Response from an upstream request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final URL after redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response body as text, unmodified.
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client bound to one scraped session.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    accept_language: String,
}

impl HttpClient {
    /// Create a client with an empty cookie store and a browser user-agent.
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            accept_language: config.accept_language.clone(),
        })
    }

    /// GET an HTML page with browser-like headers. No retries.
    pub async fn get_page(&self, url: &str, timeout: Duration) -> Result<HttpResponse, reqwest::Error> {
        let r = self
            .client
            .get(url)
            .header(header::ACCEPT, "text/html")
            .header(header::ACCEPT_LANGUAGE, self.accept_language.as_str())
            .timeout(timeout)
            .send()
            .await?;

        let status = r.status().as_u16();
        let final_url = r.url().to_string();
        let body = r.text().await?;

        Ok(HttpResponse {
            final_url,
            status,
            body,
        })
    }

    /// POST an already url-encoded form body.
    ///
    /// The body is passed pre-encoded because the upstream expects the exact
    /// `Content-Type` value the web client sends, charset included.
    pub async fn post_form(
        &self,
        url: &str,
        encoded_body: String,
        extra_headers: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<HttpResponse, reqwest::Error> {
        let mut builder = self
            .client
            .post(url)
            .header(
                header::CONTENT_TYPE,
                "application/x-www-form-urlencoded;charset=UTF-8",
            )
            .timeout(timeout);

        for (name, value) in extra_headers {
            builder = builder.header(*name, *value);
        }

        let r = builder.body(encoded_body).send().await?;
        let status = r.status().as_u16();
        let final_url = r.url().to_string();
        let body = r.text().await?;

        Ok(HttpResponse {
            final_url,
            status,
            body,
        })
    }
}
