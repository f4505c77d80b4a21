//! The presence the daemon keeps on display, as a TOML file.
//!
//! ```toml
//! details = "Ranked"
//! state = "In Queue"
//! start_time = 1700000000
//!
//! [assets]
//! large_image_key = "map_dust"
//! large_image_text = "Dust"
//!
//! [party]
//! id = "party-7"
//! size = 2
//! max = 5
//! ```

use presence_core::{PresenceSnapshot, ValidationError};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum PresenceFileError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid presence file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

pub fn parse_presence(text: &str) -> Result<PresenceSnapshot, PresenceFileError> {
    let snapshot: PresenceSnapshot = toml::from_str(text)?;
    let snapshot = snapshot.normalized();
    snapshot.validate()?;
    Ok(snapshot)
}

pub async fn read_presence(path: &Path) -> Result<PresenceSnapshot, PresenceFileError> {
    let text = tokio::fs::read_to_string(path).await?;
    parse_presence(&text)
}
