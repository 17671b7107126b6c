//! Destinations for published snapshots.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::Snapshot;
use crate::config::BusConfig;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("monitoring bus unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid monitoring bus url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("monitoring bus rejected snapshot with status {0}")]
    Rejected(StatusCode),

    #[error("failed to serialize snapshot: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to write snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("no consumer is attached")]
    Closed,
}

#[async_trait]
pub trait PublishSink: Send + Sync {
    /// Checks that the destination can be reached before monitoring starts.
    async fn attach(&self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn publish(&self, snapshot: &Snapshot) -> Result<(), SinkError>;
}

/// Writes one JSON line per snapshot to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl PublishSink for LogSink {
    async fn publish(&self, snapshot: &Snapshot) -> Result<(), SinkError> {
        let line = serde_json::to_string(snapshot)?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}")?;
        Ok(())
    }
}

const BUS_SECRET_HEADER: &str = "X-MONITORING-SECRET";

/// Posts snapshots as JSON to a monitoring bus endpoint.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    url: Url,
    token: Option<String>,
}

impl HttpSink {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Result<Self, SinkError> {
        let url = url.into();
        let url = Url::parse(&url).map_err(|e| SinkError::InvalidUrl {
            reason: e.to_string(),
            url,
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client, url, token })
    }

    pub fn from_config(bus: &BusConfig) -> Result<Self, SinkError> {
        Self::new(bus.url.clone(), bus.token.clone())
    }

    fn request(&self, method: Method) -> RequestBuilder {
        let request = self.client.request(method, self.url.clone());
        match &self.token {
            Some(token) => request.header(BUS_SECRET_HEADER, token),
            None => request,
        }
    }
}

#[async_trait]
impl PublishSink for HttpSink {
    /// Any response counts as reachable; only transport failures are errors.
    async fn attach(&self) -> Result<(), SinkError> {
        let response = self.request(Method::HEAD).send().await?;
        debug!("monitoring bus at {} answered {}", self.url, response.status());
        Ok(())
    }

    async fn publish(&self, snapshot: &Snapshot) -> Result<(), SinkError> {
        let response = self.request(Method::POST).json(snapshot).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Rejected(status));
        }

        trace!("posted snapshot with {} records", snapshot.records.len());
        Ok(())
    }
}

/// Fans snapshots out to in-process subscribers.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: broadcast::Sender<Snapshot>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<Snapshot>) {
        let (sender, receiver) = broadcast::channel(capacity);
        (Self { sender }, receiver)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Snapshot> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl PublishSink for ChannelSink {
    async fn publish(&self, snapshot: &Snapshot) -> Result<(), SinkError> {
        let receivers = self
            .sender
            .send(snapshot.clone())
            .map_err(|_| SinkError::Closed)?;
        trace!("published snapshot to {receivers} receivers");
        Ok(())
    }
}
