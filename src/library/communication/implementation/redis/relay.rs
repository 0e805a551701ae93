use super::{inbox_key, RedisFactory, STREAM_ID_NEW};
use crate::library::communication::relay::{Relay, RelayError, SEND_PATH};
use async_trait::async_trait;
use redis::streams::StreamMaxlen;
use redis::AsyncCommands;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

/// Token addressing every known application
const BROADCAST: &str = "*";
/// Prefix excluding an application from a broadcast
const EXCLUSION_PREFIX: char = '!';

#[derive(Debug, Deserialize)]
struct SendRequest {
    from: String,
    to: Vec<String>,
    #[serde(default)]
    correlation_id: Option<String>,
    #[serde(default)]
    payload: Map<String, Value>,
    namespace: String,
}

/// [`Relay`] which appends envelopes directly to the inbox streams of their targets
///
/// Intended for deployments where all applications share one redis instance. Since
/// there is no central registry, broadcasts are expanded against a fixed list of peers.
/// Every inbox is capped at roughly `limit` entries.
pub struct StreamRelay<F: RedisFactory + Send + Sync> {
    factory: F,
    peers: Vec<String>,
    limit: usize,
}

impl<F: RedisFactory + Send + Sync> StreamRelay<F> {
    /// Creates a new relay which broadcasts to the given peers
    pub fn new(factory: F, peers: Vec<String>, limit: usize) -> Self {
        Self {
            factory,
            peers,
            limit,
        }
    }
}

/// Resolves the list of addressed applications into concrete inbox owners
///
/// Broadcasts expand to every peer except the sender, exclusions apply to the expanded list.
fn resolve_targets(to: &[String], peers: &[String], origin: &str) -> Vec<String> {
    let excluded: Vec<&str> = to
        .iter()
        .filter_map(|target| target.strip_prefix(EXCLUSION_PREFIX))
        .collect();

    let broadcast = to.iter().any(|target| target == BROADCAST);
    let expanded = peers.iter().filter(|peer| broadcast && peer.as_str() != origin);

    let mut targets: Vec<String> = Vec::new();

    for target in to
        .iter()
        .filter(|target| target.as_str() != BROADCAST && !target.starts_with(EXCLUSION_PREFIX))
        .chain(expanded)
    {
        if !excluded.contains(&target.as_str()) && !targets.contains(target) {
            targets.push(target.to_owned());
        }
    }

    targets
}

#[async_trait]
impl<F: RedisFactory + Send + Sync> Relay for StreamRelay<F> {
    #[instrument(skip(self, body))]
    async fn post(&self, path: &str, body: &Value) -> Result<Vec<u8>, RelayError> {
        if path != SEND_PATH {
            return Err(RelayError::UnsupportedPath(path.to_owned()));
        }

        let request: SendRequest = serde_json::from_value(body.clone())
            .map_err(|e| RelayError::MalformedBody(Box::new(e)))?;

        let payload = serde_json::to_string(&request.payload)
            .map_err(|e| RelayError::MalformedBody(Box::new(e)))?;
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();

        let mut fields = vec![
            ("namespace", request.namespace.as_str()),
            ("payload", payload.as_str()),
            ("from", request.from.as_str()),
            ("timestamp", timestamp.as_str()),
        ];

        if let Some(correlation_id) = &request.correlation_id {
            fields.push(("correlation_id", correlation_id.as_str()));
        }

        let targets = resolve_targets(&request.to, &self.peers, &request.from);

        let mut con = self
            .factory
            .shared()
            .await
            .map_err(RelayError::ConnectionFailed)?;

        for target in targets.iter() {
            debug!(target = %target, namespace = %request.namespace, "Appending envelope to inbox");

            con.xadd_maxlen::<_, _, _, _, ()>(
                inbox_key(target),
                StreamMaxlen::Approx(self.limit),
                STREAM_ID_NEW,
                &fields[..],
            )
            .await
            .map_err(|e| RelayError::ConnectionFailed(Box::new(e)))?;
        }

        serde_json::to_vec(&json!({ "delivered": targets }))
            .map_err(|e| RelayError::MalformedBody(Box::new(e)))
    }
}
