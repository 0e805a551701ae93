use std::str::FromStr;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    about = "Asynchronous messaging between applications over Redis streams.",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct MainOptions {
    /// Log level, scopable to different modules
    ///
    /// Levels: trace, debug, info, warn, error
    #[structopt(
        short,
        long,
        global = true,
        default_value = "info,hyper=warn",
        env = "RUST_LOG",
        value_name = "level"
    )]
    pub log: String,

    /// Log output format (text, compact, json)
    #[structopt(long, global = true, default_value = "text", env)]
    pub log_format: LogFormat,

    #[structopt(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Text,
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown log format {:?}", s)),
        }
    }
}

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Consume the inbox of an application
    Worker(outpost::module::worker::Options),
}
