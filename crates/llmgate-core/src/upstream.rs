use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use wreq::Client;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream timed out: {0}")]
    Timeout(String),
    #[error("upstream unreachable: {0}")]
    Connect(String),
    #[error("upstream returned HTTP {status}")]
    Status { status: u16, body: String },
    #[error("upstream body unreadable: {0}")]
    MalformedBody(String),
}

impl UpstreamError {
    /// Only transport-level failures where the request plausibly never
    /// reached the provider are safe to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, UpstreamError::Timeout(_) | UpstreamError::Connect(_))
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub url: String,
    /// Name/value pairs applied verbatim. Values may hold credentials
    /// and must never reach a log line.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub is_stream: bool,
}

pub enum UpstreamBody {
    Bytes(Bytes),
    Stream(tokio::sync::mpsc::Receiver<Bytes>),
}

pub struct UpstreamResponse {
    pub status: u16,
    pub body: UpstreamBody,
}

#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn send(&self, req: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError>;
}

#[derive(Debug, Clone)]
pub struct UpstreamClientConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub stream_idle_timeout: Duration,
}

impl Default for UpstreamClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(600),
            stream_idle_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone)]
pub struct WreqUpstreamClient {
    config: UpstreamClientConfig,
    client: Client,
}

impl WreqUpstreamClient {
    pub fn new(config: UpstreamClientConfig) -> Result<Self, wreq::Error> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .read_timeout(config.stream_idle_timeout)
            .build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl UpstreamClient for WreqUpstreamClient {
    async fn send(&self, req: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        let mut builder = self.client.post(&req.url);
        for (name, value) in &req.headers {
            builder = builder.header(name, value);
        }
        let resp = builder
            .header("content-type", "application/json")
            .body(req.body)
            .send()
            .await
            .map_err(map_wreq_error)?;
        convert_response(resp, req.is_stream, self.config.stream_idle_timeout).await
    }
}

async fn convert_response(
    resp: wreq::Response,
    want_stream: bool,
    stream_idle_timeout: Duration,
) -> Result<UpstreamResponse, UpstreamError> {
    let status = resp.status().as_u16();

    if !(200..300).contains(&status) {
        let body = resp.bytes().await.unwrap_or_default();
        return Err(UpstreamError::Status {
            status,
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }

    if !want_stream {
        let body = resp
            .bytes()
            .await
            .map_err(|err| UpstreamError::MalformedBody(err.to_string()))?;
        return Ok(UpstreamResponse {
            status,
            body: UpstreamBody::Bytes(body),
        });
    }

    // Relay the body through a channel. If the consumer goes away the
    // send fails, the task returns, and dropping the wreq stream tears
    // down the provider connection.
    let (tx, rx) = tokio::sync::mpsc::channel::<Bytes>(16);
    tokio::spawn(async move {
        let mut stream = resp.bytes_stream();
        loop {
            let next = tokio::time::timeout(stream_idle_timeout, stream.next()).await;
            let Ok(item) = next else {
                break;
            };
            let Some(item) = item else {
                break;
            };
            let Ok(chunk) = item else {
                break;
            };
            if tx.send(chunk).await.is_err() {
                break;
            }
        }
    });

    Ok(UpstreamResponse {
        status,
        body: UpstreamBody::Stream(rx),
    })
}

fn map_wreq_error(err: wreq::Error) -> UpstreamError {
    if err.is_timeout() {
        return UpstreamError::Timeout(err.to_string());
    }
    if err.is_connect() || err.is_connection_reset() {
        return UpstreamError::Connect(err.to_string());
    }
    UpstreamError::Connect(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_failures_are_retryable() {
        assert!(UpstreamError::Timeout("t".into()).is_retryable());
        assert!(UpstreamError::Connect("c".into()).is_retryable());
        assert!(
            !UpstreamError::Status {
                status: 500,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(!UpstreamError::MalformedBody("m".into()).is_retryable());
    }
}
