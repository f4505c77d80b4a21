//! The presence data model.
//!
//! A [`PresenceSnapshot`] is one complete presence state. Snapshots are built
//! by application code on every change and replaced wholesale by the next one;
//! nothing mutates a snapshot once it has been handed to the client.

use crate::ValidationError;
use serde::{Deserialize, Serialize};

/// Longest text the companion accepts for any single field, in characters.
pub const MAX_TEXT_LEN: usize = 128;

/// Seconds since the Unix epoch.
pub type Timestamp = u64;

/// One complete presence state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    /// What the player is doing, shown under the application name.
    #[serde(default)]
    pub details: String,
    /// Current state ("In Game", "In Menu"), shown next to the party size.
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub start_time: Option<Timestamp>,
    #[serde(default)]
    pub end_time: Option<Timestamp>,
    #[serde(default)]
    pub assets: Option<AssetRef>,
    #[serde(default)]
    pub party: Option<PartyInfo>,
    #[serde(default)]
    pub secrets: Option<SecretRef>,
}

/// Image keys and their hover texts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetRef {
    pub large_image_key: String,
    pub large_image_text: String,
    pub small_image_key: String,
    pub small_image_text: String,
}

/// The party the player belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyInfo {
    /// Party identifier. Must not be empty.
    pub id: String,
    /// Current member count.
    pub size: u32,
    /// Maximum member count.
    pub max: u32,
}

/// Secrets for the join and spectate features.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretRef {
    #[serde(rename = "match")]
    pub match_secret: String,
    pub join: String,
    pub spectate: String,
}

impl AssetRef {
    pub(crate) fn is_empty(&self) -> bool {
        self.large_image_key.is_empty()
            && self.large_image_text.is_empty()
            && self.small_image_key.is_empty()
            && self.small_image_text.is_empty()
    }
}

impl PartyInfo {
    pub fn new(id: impl Into<String>, size: u32, max: u32) -> Self {
        Self {
            id: id.into(),
            size,
            max,
        }
    }
}

impl SecretRef {
    pub(crate) fn is_empty(&self) -> bool {
        self.match_secret.is_empty() && self.join.is_empty() && self.spectate.is_empty()
    }
}

impl PresenceSnapshot {
    /// Start building a snapshot.
    pub fn builder() -> PresenceBuilder {
        PresenceBuilder::default()
    }

    /// Check every invariant the companion relies on.
    ///
    /// Over-long text is rejected rather than truncated.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_len("details", &self.details)?;
        check_len("state", &self.state)?;

        if let Some(assets) = &self.assets {
            check_len("assets.large_image_key", &assets.large_image_key)?;
            check_len("assets.large_image_text", &assets.large_image_text)?;
            check_len("assets.small_image_key", &assets.small_image_key)?;
            check_len("assets.small_image_text", &assets.small_image_text)?;
        }

        if let Some(party) = &self.party {
            if party.id.is_empty() {
                return Err(ValidationError::EmptyPartyId);
            }
            if party.size > party.max {
                return Err(ValidationError::PartyOverflow {
                    size: party.size,
                    max: party.max,
                });
            }
        }

        if let Some(secrets) = &self.secrets {
            check_len("secrets.match", &secrets.match_secret)?;
            check_len("secrets.join", &secrets.join)?;
            check_len("secrets.spectate", &secrets.spectate)?;
        }

        if let (Some(start), Some(end)) = (self.start_time, self.end_time)
            && end < start
        {
            return Err(ValidationError::EndBeforeStart { start, end });
        }

        Ok(())
    }

    /// Collapse groups with nothing in them to `None`, and zero timestamps
    /// to unset.
    pub fn normalized(mut self) -> Self {
        if self.assets.as_ref().is_some_and(AssetRef::is_empty) {
            self.assets = None;
        }
        if self.secrets.as_ref().is_some_and(SecretRef::is_empty) {
            self.secrets = None;
        }
        self.start_time = self.start_time.filter(|t| *t > 0);
        self.end_time = self.end_time.filter(|t| *t > 0);
        self
    }
}

fn check_len(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len > MAX_TEXT_LEN {
        return Err(ValidationError::TooLong {
            field,
            len,
            max: MAX_TEXT_LEN,
        });
    }
    Ok(())
}

/// Builder for [`PresenceSnapshot`]. [`build`](Self::build) validates.
#[derive(Debug, Clone, Default)]
pub struct PresenceBuilder {
    snapshot: PresenceSnapshot,
}

impl PresenceBuilder {
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.snapshot.details = details.into();
        self
    }

    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.snapshot.state = state.into();
        self
    }

    pub fn start_time(mut self, start: Timestamp) -> Self {
        self.snapshot.start_time = Some(start);
        self
    }

    pub fn end_time(mut self, end: Timestamp) -> Self {
        self.snapshot.end_time = Some(end);
        self
    }

    pub fn large_image(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        let assets = self.snapshot.assets.get_or_insert_with(AssetRef::default);
        assets.large_image_key = key.into();
        assets.large_image_text = text.into();
        self
    }

    pub fn small_image(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        let assets = self.snapshot.assets.get_or_insert_with(AssetRef::default);
        assets.small_image_key = key.into();
        assets.small_image_text = text.into();
        self
    }

    pub fn party(mut self, id: impl Into<String>, size: u32, max: u32) -> Self {
        self.snapshot.party = Some(PartyInfo::new(id, size, max));
        self
    }

    pub fn secrets(mut self, secrets: SecretRef) -> Self {
        self.snapshot.secrets = Some(secrets);
        self
    }

    pub fn join_secret(mut self, secret: impl Into<String>) -> Self {
        self.snapshot
            .secrets
            .get_or_insert_with(SecretRef::default)
            .join = secret.into();
        self
    }

    pub fn spectate_secret(mut self, secret: impl Into<String>) -> Self {
        self.snapshot
            .secrets
            .get_or_insert_with(SecretRef::default)
            .spectate = secret.into();
        self
    }

    pub fn build(self) -> Result<PresenceSnapshot, ValidationError> {
        let snapshot = self.snapshot.normalized();
        snapshot.validate()?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_minimal() {
        let snapshot = PresenceSnapshot::builder()
            .details("Playing a game")
            .state("In Game")
            .build()
            .unwrap();
        assert_eq!(snapshot.details, "Playing a game");
        assert!(snapshot.party.is_none());
        assert!(snapshot.assets.is_none());
    }

    #[test]
    fn party_over_capacity_rejected() {
        let err = PresenceSnapshot::builder()
            .party("lobby-1", 5, 4)
            .build()
            .unwrap_err();
        assert!(matches!(err, ValidationError::PartyOverflow { size: 5, max: 4 }));
    }

    #[test]
    fn full_party_accepted() {
        let snapshot = PresenceSnapshot::builder()
            .party("lobby-1", 4, 4)
            .build()
            .unwrap();
        assert_eq!(snapshot.party, Some(PartyInfo::new("lobby-1", 4, 4)));
    }

    #[test]
    fn empty_party_id_rejected() {
        let err = PresenceSnapshot::builder().party("", 1, 4).build().unwrap_err();
        assert!(matches!(err, ValidationError::EmptyPartyId));
    }

    #[test]
    fn end_before_start_rejected() {
        let err = PresenceSnapshot::builder()
            .start_time(2_000)
            .end_time(1_000)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::EndBeforeStart {
                start: 2_000,
                end: 1_000
            }
        ));
    }

    #[test]
    fn text_limit_counts_characters() {
        let at_limit = "é".repeat(MAX_TEXT_LEN);
        assert!(PresenceSnapshot::builder().state(at_limit).build().is_ok());

        let over = "x".repeat(MAX_TEXT_LEN + 1);
        let err = PresenceSnapshot::builder().details(over).build().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::TooLong {
                field: "details",
                len: 129,
                ..
            }
        ));
    }

    #[test]
    fn long_secret_rejected() {
        let err = PresenceSnapshot::builder()
            .join_secret("s".repeat(200))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::TooLong {
                field: "secrets.join",
                ..
            }
        ));
    }

    #[test]
    fn empty_groups_normalize_to_none() {
        let snapshot = PresenceSnapshot::builder()
            .large_image("", "")
            .secrets(SecretRef::default())
            .start_time(0)
            .build()
            .unwrap();
        assert!(snapshot.assets.is_none());
        assert!(snapshot.secrets.is_none());
        assert!(snapshot.start_time.is_none());
    }

    #[test]
    fn validate_catches_hand_built_snapshot() {
        let snapshot = PresenceSnapshot {
            party: Some(PartyInfo::new("p", 3, 2)),
            ..Default::default()
        };
        assert!(snapshot.validate().is_err());
    }
}
