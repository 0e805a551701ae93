//! Live redis server for tests exercising redis specific behaviour
//!
//! Tests connect to the server at `OUTPOST_TEST_REDIS` when it is set. Otherwise a private
//! `redis-server` process is launched for the duration of the test. Tests are skipped when
//! neither is available.

use super::communication::implementation::redis::RedisConnectionFactory;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

const URL_VARIABLE: &str = "OUTPOST_TEST_REDIS";
const BASE_PORT: u16 = 41000;
const PORTS_PER_PROCESS: u16 = 16;
const STARTUP_ATTEMPTS: usize = 50;

static NEXT_PORT: AtomicU16 = AtomicU16::new(0);

/// Creates a string that is unique to the location it is invoked at
#[macro_export]
macro_rules! unique_identifier {
    () => {
        concat!(module_path!(), ":", line!(), ":", column!())
    };
}

/// Runs the body with a [`TestRedis`] bound to the given identifier or skips it
#[macro_export]
macro_rules! with_redis {
    ($i:ident, $body:block) => {
        match $crate::library::testing::TestRedis::launch().await {
            Some($i) => $body,
            None => eprintln!("Skipping test, no redis server available"),
        }
    };
}

/// Handle to a redis server which lives as long as this value
pub struct TestRedis {
    url: String,
    process: Option<Child>,
}

impl TestRedis {
    /// Connects to the configured server or launches a new one
    pub async fn launch() -> Option<Self> {
        if let Ok(url) = std::env::var(URL_VARIABLE) {
            return Some(Self { url, process: None });
        }

        let offset = (std::process::id() % 1000) as u16 * PORTS_PER_PROCESS;
        let port = BASE_PORT + offset + NEXT_PORT.fetch_add(1, Ordering::SeqCst) % PORTS_PER_PROCESS;

        let process = Command::new("redis-server")
            .arg("--port")
            .arg(port.to_string())
            .arg("--save")
            .arg("")
            .arg("--appendonly")
            .arg("no")
            .stdout(Stdio::null())
            .spawn()
            .ok()?;

        let redis = Self {
            url: format!("redis://127.0.0.1:{}/", port),
            process: Some(process),
        };

        redis.wait_until_ready().await.then(|| redis)
    }

    async fn wait_until_ready(&self) -> bool {
        let client = match redis::Client::open(self.url.as_str()) {
            Ok(client) => client,
            Err(_) => return false,
        };

        for _ in 0..STARTUP_ATTEMPTS {
            if client.get_async_connection().await.is_ok() {
                return true;
            }

            sleep(Duration::from_millis(50)).await;
        }

        false
    }

    /// Factory connecting to this server
    pub fn factory(&self) -> Arc<RedisConnectionFactory> {
        Arc::new(RedisConnectionFactory::new(&self.url).unwrap())
    }
}

impl Drop for TestRedis {
    fn drop(&mut self) {
        if let Some(process) = self.process.as_mut() {
            process.kill().ok();
            process.wait().ok();
        }
    }
}
