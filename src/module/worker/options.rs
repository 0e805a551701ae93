use crate::domain::message::DEFAULT_LISTENER_ROOT;
use crate::library::helpers::parse_seconds;
use crate::module::options::{AppOptions, RedisOptions};
use std::str::FromStr;
use std::time::Duration;
use structopt::StructOpt;
use thiserror::Error;

/// Options for the worker module
#[derive(Debug, StructOpt)]
pub struct Options {
    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub redis: RedisOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub app: AppOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub relay: RelayOptions,

    /// Maximum duration (in seconds) a single read from the inbox blocks
    #[structopt(long, env, default_value = "5", parse(try_from_str = parse_seconds))]
    pub block: Duration,

    /// Duration (in seconds) after which unresolved promises expire.
    /// Omitting it keeps them around until resolved.
    #[structopt(long, env, parse(try_from_str = parse_seconds))]
    pub promise_ttl: Option<Duration>,

    /// Namespace under which listeners are bound
    #[structopt(long, env, default_value = DEFAULT_LISTENER_ROOT)]
    pub listener_root: String,
}

/// Transport used for outgoing messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMode {
    /// Post envelopes to Basecamp via HTTP
    Http,
    /// Append envelopes to the inbox streams directly
    Stream,
}

/// Relay mode could not be parsed
#[derive(Debug, Error)]
#[error("unknown relay mode {0:?}, expected http or stream")]
pub struct UnknownRelayMode(String);

impl FromStr for RelayMode {
    type Err = UnknownRelayMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Self::Http),
            "stream" => Ok(Self::Stream),
            _ => Err(UnknownRelayMode(s.to_owned())),
        }
    }
}

/// Relay related options
#[derive(Debug, StructOpt)]
pub struct RelayOptions {
    /// Transport for outgoing messages (http or stream)
    #[structopt(long = "relay", env = "RELAY", default_value = "http")]
    pub mode: RelayMode,

    /// Base URL of the Basecamp relay
    #[structopt(long, env = "BASECAMP", default_value = "http://basecamp/", value_name = "url")]
    pub basecamp: String,

    /// Maximum duration (in seconds) the relay may take to accept a message
    #[structopt(long, env, default_value = "10", parse(try_from_str = parse_seconds))]
    pub relay_timeout: Duration,

    /// Applications reached by broadcasts when using the stream relay
    #[structopt(long, env, use_delimiter = true, value_name = "slugs")]
    pub peers: Vec<String>,

    /// Approximate number of entries retained per inbox when using the stream relay
    #[structopt(long, env, default_value = "10000")]
    pub inbox_limit: usize,
}
