//! Client-side presence sync.
//!
//! Application code hands snapshots to a [`SyncEngine`]; the engine
//! coalesces them, drops repeats, rate-limits what is left and pushes it over
//! a [`Transport`] to the companion, reconnecting with backoff when the
//! companion goes away.
//!
//! ```no_run
//! use presence_client::{IpcTransport, SyncConfig, SyncEngine};
//! use presence_core::PresenceSnapshot;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig::new("1383904378154651768");
//! let mut engine = SyncEngine::new(IpcTransport::new(&config), &config);
//! engine.on_event(|event| println!("{event:?}"));
//!
//! engine.set_presence(
//!     PresenceSnapshot::builder()
//!         .details("Ranked")
//!         .state("In Queue")
//!         .build()?,
//! )?;
//!
//! loop {
//!     engine.tick().await;
//!     engine.drain().for_each(drop);
//!     tokio::time::sleep(std::time::Duration::from_millis(100)).await;
//! }
//! # }
//! ```

mod backoff;
mod coalescer;
mod config;
mod engine;
mod ipc;
mod sink;
mod transport;

#[cfg(test)]
mod mock;

pub use backoff::Backoff;
pub use coalescer::UpdateCoalescer;
pub use config::SyncConfig;
pub use engine::{EngineError, SyncEngine};
pub use ipc::{IPC_PREFIX, IpcTransport, candidate_paths};
pub use sink::{Drain, EventSink};
pub use transport::Transport;
