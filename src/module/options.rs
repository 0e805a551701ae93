//! Various options usable by modules
//!
//! The structs in this module allow other modules to flatten them into
//! their own options struct. This allows for a unified yet non-cluttered
//! option set.

use structopt::StructOpt;

/// Options for connecting to the Redis server
#[derive(Debug, StructOpt)]
pub struct RedisOptions {
    /// Redis database server URL
    #[structopt(
        short = "r",
        long = "redis",
        env = "REDIS",
        global = true,
        default_value = "redis://outpost-redis/",
        value_name = "url"
    )]
    pub url: String,
}

/// Identity of the application this process acts on behalf of
#[derive(Debug, StructOpt)]
pub struct AppOptions {
    /// Slug of the application, used as inbox name and consumer group
    #[structopt(short = "a", long = "app", env = "APP", value_name = "slug")]
    pub slug: String,

    /// Name of this consumer within the group, defaults to `{hostname}-{pid}`.
    /// Keeping it stable across restarts allows pending entries to be recovered.
    #[structopt(long, env = "CONSUMER", value_name = "name")]
    pub consumer: Option<String>,
}
