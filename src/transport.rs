use std::time::Duration;

use async_trait::async_trait;

use crate::models::QueueEntry;

/// A failed delivery attempt: a non-2xx response or a network error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFailed {
    pub status: Option<u16>,
    pub message: String,
}

impl RequestFailed {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn status(code: u16) -> Self {
        Self {
            status: Some(code),
            message: format!("API error: {code}"),
        }
    }
}

impl std::fmt::Display for RequestFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RequestFailed {}

/// Replays a queued entry against the backend.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, entry: &QueueEntry) -> Result<(), RequestFailed>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, entry: &QueueEntry) -> Result<(), RequestFailed> {
        let url = self.url_for(&entry.endpoint);

        let mut req = self
            .client
            .request(entry.method.into(), &url)
            .header("Content-Type", "application/json");

        if let Some(body) = &entry.body {
            req = req.body(body.clone());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| RequestFailed::network(format!("Request to {url} failed: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RequestFailed::status(status.as_u16()))
        }
    }
}
