//! The presence daemon: keeps the companion showing what the presence file
//! says.

use crate::config::DaemonConfig;
use crate::presence_file::read_presence;
use anyhow::Context;
use presence_client::{IpcTransport, SyncEngine};
use presence_core::InboundEvent;
use std::future::Future;
use tokio::time::{Instant, MissedTickBehavior};

/// Run until `shutdown` resolves, then close the link.
///
/// The presence file must be readable at startup. Later read or validation
/// failures are logged and the previous presence stays up.
pub async fn run(config: DaemonConfig, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
    let initial = read_presence(&config.presence_file)
        .await
        .with_context(|| format!("loading {}", config.presence_file.display()))?;

    let mut engine = SyncEngine::new(IpcTransport::new(&config.client), &config.client);
    engine.on_event(log_event);
    engine.set_presence(initial)?;
    engine.start();

    tracing::info!(
        "Syncing {} for client {}",
        config.presence_file.display(),
        config.client.client_id
    );

    let mut ticker = tokio::time::interval(config.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_reload = Instant::now();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                if last_reload.elapsed() >= config.reload_interval() {
                    last_reload = Instant::now();
                    match read_presence(&config.presence_file).await {
                        Ok(snapshot) => {
                            if let Err(e) = engine.set_presence(snapshot) {
                                tracing::warn!("Rejected presence: {}", e);
                            }
                        }
                        Err(e) => tracing::warn!(
                            "Could not reload {}: {}",
                            config.presence_file.display(),
                            e
                        ),
                    }
                }

                engine.tick().await;
                engine.drain().for_each(drop);
            }
        }
    }

    tracing::info!("Shutting down");
    engine.close().await;
    Ok(())
}

fn log_event(event: &InboundEvent) {
    match event {
        InboundEvent::ConnectionChanged { state } => tracing::info!("Connection {:?}", state),
        InboundEvent::JoinRequest { user } => {
            tracing::info!("{} ({}) asked to join", user.username, user.id)
        }
        InboundEvent::Join { secret } => tracing::info!("Joining game {}", secret),
        InboundEvent::SpectateRequest { secret } => tracing::info!("Spectating {}", secret),
        InboundEvent::Error { code, message } => {
            tracing::warn!("Companion error {}: {}", code, message)
        }
    }
}
