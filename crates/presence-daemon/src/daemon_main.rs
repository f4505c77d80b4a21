//! `presenced`: mirror a presence file to the chat companion.
//!
//!   presenced --config ~/.config/presenced/presenced.toml
//!
//! Edit the presence file while the daemon runs and the companion picks up
//! the change within one reload interval (rate limits permitting).

use clap::Parser;
use presence_daemon::config::DaemonConfig;
use presence_daemon::{daemon, logging};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "presenced", version, about = "Keep the chat companion's presence in sync")]
struct Args {
    /// Path to the daemon config file.
    #[arg(long, env = "PRESENCED_CONFIG", default_value = "presenced.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging("presenced=info,presence_daemon=info,presence_client=info");

    let args = Args::parse();
    let config = DaemonConfig::load(&args.config)?;

    daemon::run(config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Cannot listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await
}
