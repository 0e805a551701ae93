//! Trait implementations using [`redis`](::redis)

const STREAM_ID_NEW: &str = "*";
const STREAM_ID_HEAD: &str = "0";
const STREAM_ID_TAIL: &str = "$";
const STREAM_ID_ADDITIONS: &str = ">";

/// Prefix of the stream every application consumes its messages from
pub const INBOX_PREFIX: &str = "outpost:";

mod context_store;
mod factory;
mod queue_entry;
mod queue_provider;
mod relay;

pub use context_store::*;
pub use factory::*;
pub use queue_entry::*;
pub use queue_provider::*;
pub use relay::*;

/// Key of the stream holding messages for the given application
pub fn inbox_key(slug: &str) -> String {
    format!("{}{}", INBOX_PREFIX, slug)
}
