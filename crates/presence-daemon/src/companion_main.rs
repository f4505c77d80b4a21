//! `presence-companion`: a stand-in companion for local testing.
//!
//!   presence-companion &
//!   presenced --config presenced.toml
//!
//! Pass `--protocol 2` to watch clients reject a protocol mismatch.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "presence-companion", version, about = "Stand-in presence companion")]
struct Args {
    /// Socket to listen on. Defaults to the first endpoint clients probe.
    #[arg(long, env = "PRESENCE_SOCKET")]
    socket: Option<PathBuf>,

    /// Protocol version to announce in READY.
    #[arg(long, default_value_t = presence_core::RPC_VERSION)]
    protocol: u32,
}

#[cfg(unix)]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use anyhow::Context;
    use presence_daemon::{companion, logging};

    logging::init_logging("presence_companion=info,presence_daemon=info");

    let args = Args::parse();
    let path = match args.socket {
        Some(path) => path,
        None => presence_client::candidate_paths()
            .into_iter()
            .next()
            .context("no candidate socket path")?,
    };
    if path.exists() {
        anyhow::bail!("{} already exists; is a companion running?", path.display());
    }

    let listener = tokio::net::UnixListener::bind(&path)
        .with_context(|| format!("binding {}", path.display()))?;
    tracing::info!("Listening on {} (v{})", path.display(), args.protocol);

    let result = tokio::select! {
        r = companion::serve(listener, args.protocol, None) => r.map_err(anyhow::Error::from),
        _ = tokio::signal::ctrl_c() => Ok(()),
    };
    std::fs::remove_file(&path).ok();
    result
}

#[cfg(not(unix))]
fn main() -> anyhow::Result<()> {
    let _ = Args::parse();
    anyhow::bail!("presence-companion only runs on unix sockets")
}
