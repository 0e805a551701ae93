use super::{Relay, RelayError};
use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::http::header::{HeaderValue, CONTENT_TYPE};
use hyper::http::{Method, Request, Uri};
use hyper::{Body, Client};
use serde_json::Value;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, instrument};

/// Header carrying the slug of the sending application
pub const ORIGIN_HEADER: &str = "x-outpost-app";

/// [`Relay`] which posts documents to an HTTP endpoint (commonly called Basecamp)
///
/// Authentication and request signing are expected to be handled by the network
/// layer in front of the relay. Requests that do not complete within the configured
/// timeout are aborted.
pub struct HttpRelay {
    client: Client<HttpConnector>,
    base: String,
    origin: HeaderValue,
    timeout: Duration,
}

impl HttpRelay {
    /// Creates a new relay posting to `base` on behalf of the application `origin`
    pub fn new(base: impl Into<String>, origin: &str, timeout: Duration) -> Result<Self, RelayError> {
        let origin = HeaderValue::from_str(origin)
            .map_err(|e| RelayError::MalformedBody(Box::new(e)))?;

        Ok(Self {
            client: Client::new(),
            base: base.into().trim_end_matches('/').to_owned(),
            origin,
            timeout,
        })
    }

    fn uri(&self, path: &str) -> Result<Uri, RelayError> {
        format!("{}{}", self.base, path)
            .parse()
            .map_err(|e| RelayError::ConnectionFailed(Box::new(e)))
    }
}

#[async_trait]
impl Relay for HttpRelay {
    #[instrument(skip(self, body), fields(base = %self.base))]
    async fn post(&self, path: &str, body: &Value) -> Result<Vec<u8>, RelayError> {
        let body = serde_json::to_vec(body).map_err(|e| RelayError::MalformedBody(Box::new(e)))?;

        let request = Request::builder()
            .method(Method::POST)
            .uri(self.uri(path)?)
            .header(CONTENT_TYPE, "application/json")
            .header(ORIGIN_HEADER, self.origin.clone())
            .body(Body::from(body))
            .map_err(|e| RelayError::MalformedBody(Box::new(e)))?;

        let response = timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| RelayError::Timeout(self.timeout))?
            .map_err(|e| RelayError::ConnectionFailed(Box::new(e)))?;

        let status = response.status();
        debug!(%status, "Relay responded");

        if !status.is_success() {
            return Err(RelayError::Rejected(status.as_u16()));
        }

        let bytes = hyper::body::to_bytes(response.into_body())
            .await
            .map_err(|e| RelayError::ConnectionFailed(Box::new(e)))?;

        Ok(bytes.to_vec())
    }
}
