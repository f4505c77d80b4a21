//! The companion's wire form of a presence.
//!
//! [`PresenceSnapshot`] is what applications build; [`Activity`] is what the
//! companion reads. The two mapping functions here are the only place the
//! shapes meet.

use crate::{AssetRef, PartyInfo, PresenceSnapshot, SecretRef, ValidationError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<ActivityTimestamps>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<ActivityAssets>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party: Option<ActivityParty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<ActivitySecrets>,
    /// Whether this activity is an instanced match.
    #[serde(default)]
    pub instance: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityTimestamps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityAssets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityParty {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// `[current, max]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<[u32; 2]>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySecrets {
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub match_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spectate: Option<String>,
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

impl PresenceSnapshot {
    /// Map to the companion's wire form. Empty strings and empty groups are
    /// omitted, and the timestamps block only appears when at least one time
    /// is non-zero.
    pub fn to_activity(&self) -> Activity {
        let start = self.start_time.filter(|t| *t > 0);
        let end = self.end_time.filter(|t| *t > 0);
        let timestamps =
            (start.is_some() || end.is_some()).then_some(ActivityTimestamps { start, end });

        let assets = self.assets.as_ref().filter(|a| !a.is_empty()).map(|a| ActivityAssets {
            large_image: non_empty(&a.large_image_key),
            large_text: non_empty(&a.large_image_text),
            small_image: non_empty(&a.small_image_key),
            small_text: non_empty(&a.small_image_text),
        });

        let party = self.party.as_ref().map(|p| ActivityParty {
            id: Some(p.id.clone()),
            size: Some([p.size, p.max]),
        });

        let secrets = self.secrets.as_ref().filter(|s| !s.is_empty()).map(|s| ActivitySecrets {
            match_secret: non_empty(&s.match_secret),
            join: non_empty(&s.join),
            spectate: non_empty(&s.spectate),
        });

        Activity {
            state: non_empty(&self.state),
            details: non_empty(&self.details),
            timestamps,
            assets,
            party,
            instance: secrets.as_ref().is_some_and(|s| s.match_secret.is_some()),
            secrets,
        }
    }

    /// Map back from the wire form, applying the same normalization and
    /// validation as [`PresenceBuilder::build`](crate::PresenceBuilder::build).
    ///
    /// A party without an id is treated as no party.
    pub fn from_activity(activity: Activity) -> Result<Self, ValidationError> {
        let (start_time, end_time) = activity
            .timestamps
            .map(|t| (t.start, t.end))
            .unwrap_or_default();

        let party = activity.party.and_then(|p| {
            let id = p.id.filter(|id| !id.is_empty())?;
            let [size, max] = p.size.unwrap_or_default();
            Some(PartyInfo { id, size, max })
        });

        let snapshot = PresenceSnapshot {
            details: activity.details.unwrap_or_default(),
            state: activity.state.unwrap_or_default(),
            start_time,
            end_time,
            assets: activity.assets.map(|a| AssetRef {
                large_image_key: a.large_image.unwrap_or_default(),
                large_image_text: a.large_text.unwrap_or_default(),
                small_image_key: a.small_image.unwrap_or_default(),
                small_image_text: a.small_text.unwrap_or_default(),
            }),
            party,
            secrets: activity.secrets.map(|s| SecretRef {
                match_secret: s.match_secret.unwrap_or_default(),
                join: s.join.unwrap_or_default(),
                spectate: s.spectate.unwrap_or_default(),
            }),
        }
        .normalized();

        snapshot.validate()?;
        Ok(snapshot)
    }
}
