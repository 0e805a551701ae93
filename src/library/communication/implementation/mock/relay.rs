use crate::library::communication::relay::{Relay, RelayError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Relay that records every posted document instead of delivering it
#[derive(Default)]
pub struct MockRelay {
    posted: Mutex<Vec<(String, Value)>>,
    failing: AtomicBool,
}

impl MockRelay {
    /// Creates a relay which accepts every request
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a relay which rejects every request
    pub fn failing() -> Self {
        let relay = Self::default();
        relay.failing.store(true, Ordering::SeqCst);
        relay
    }

    /// Paths and bodies of all accepted requests
    pub fn posted(&self) -> Vec<(String, Value)> {
        self.posted.lock().unwrap().clone()
    }

    /// Bodies of all accepted requests
    pub fn bodies(&self) -> Vec<Value> {
        self.posted().into_iter().map(|(_, body)| body).collect()
    }
}

#[async_trait]
impl Relay for MockRelay {
    async fn post(&self, path: &str, body: &Value) -> Result<Vec<u8>, RelayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RelayError::Rejected(503));
        }

        self.posted
            .lock()
            .unwrap()
            .push((path.to_owned(), body.clone()));

        Ok(b"{}".to_vec())
    }
}
