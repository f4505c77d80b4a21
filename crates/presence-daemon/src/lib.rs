//! Presence daemon.
//!
//! `presenced` keeps the companion showing whatever a TOML presence file
//! says, re-reading it on an interval. `presence-companion` is a stand-in
//! companion for trying the daemon (or any client) without the real one.

pub mod config;
pub mod daemon;
pub mod logging;
pub mod presence_file;

#[cfg(unix)]
pub mod companion;
