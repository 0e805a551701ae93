use anyhow::{anyhow, Result};
use options::{Command, LogFormat};
use outpost::harness::ModuleRunner;
use outpost::module::worker::Worker;
use structopt::StructOpt;
use tracing::info;

mod options;

#[tokio::main]
async fn main() -> Result<()> {
    let command = init();
    let runner = ModuleRunner::default();

    let reason = match command {
        Command::Worker(options) => {
            let worker = Worker::new(options).map_err(|e| anyhow!(e))?;
            runner.run(worker).await
        }
    };

    if reason.is_failure() {
        return Err(reason.into());
    }

    Ok(())
}

fn init() -> Command {
    let options = options::MainOptions::from_args();

    let formatter = tracing_subscriber::fmt().with_env_filter(options.log);

    match options.log_format {
        LogFormat::Text => formatter.init(),
        LogFormat::Compact => formatter.compact().init(),
        LogFormat::Json => formatter.json().init(),
    };

    info!("Outpost {}", env!("CARGO_PKG_VERSION"));

    options.command
}
