//! Picks the offence category for a message.

use crate::config::{OffenceConfig, OffencesConfig};
use crate::event::{MessageKind, RoomMessage};
use crate::mentions::count_mentions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Offence categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffenceCategory {
    /// Plain message
    TextSpam,
    /// Image, audio or video
    MediaSpam,
    /// Mentions at least one user
    Mentions,
    /// Mentions `upgrade_at` or more users
    MassMentions,
}

impl fmt::Display for OffenceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::TextSpam => "text_spam",
            Self::MediaSpam => "media_spam",
            Self::Mentions => "mentions",
            Self::MassMentions => "mass_mentions",
        };
        f.write_str(label)
    }
}

/// Weight and lifetime of the offence a message earns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffenceSpec {
    /// Category that matched
    pub category: OffenceCategory,
    /// Weight to record
    pub weight: u32,
    /// Offence lifetime
    pub ttl: Duration,
}

impl OffenceSpec {
    fn from_config(category: OffenceCategory, config: &OffenceConfig) -> Self {
        Self {
            category,
            weight: config.weight,
            ttl: config.ttl(),
        }
    }
}

/// Maps messages to offences using the configured categories.
#[derive(Debug, Clone)]
pub struct OffenceClassifier {
    offences: OffencesConfig,
}

impl OffenceClassifier {
    /// Create a classifier over `offences`.
    pub fn new(offences: OffencesConfig) -> Self {
        Self { offences }
    }

    /// The offence `message` earns, if any category applies.
    pub fn classify(&self, message: &RoomMessage) -> Option<OffenceSpec> {
        self.mention_offence(message).or_else(|| {
            let (category, config) = if message.kind.is_media() {
                (OffenceCategory::MediaSpam, &self.offences.media_spam)
            } else {
                (OffenceCategory::TextSpam, &self.offences.text_spam)
            };
            config
                .enabled
                .then(|| OffenceSpec::from_config(category, config))
        })
    }

    fn mention_offence(&self, message: &RoomMessage) -> Option<OffenceSpec> {
        if message.kind != MessageKind::Text {
            return None;
        }
        let body = message.formatted_body.as_deref()?;
        let mentions = &self.offences.mentions;
        let mass = &self.offences.mass_mentions;
        if !mentions.enabled && !mass.offence.enabled {
            return None;
        }

        let limit = if mass.offence.enabled { mass.upgrade_at } else { 1 };
        let count = count_mentions(body, limit);
        if mass.offence.enabled && count == mass.upgrade_at {
            Some(OffenceSpec::from_config(
                OffenceCategory::MassMentions,
                &mass.offence,
            ))
        } else if mentions.enabled && count > 0 {
            Some(OffenceSpec::from_config(OffenceCategory::Mentions, mentions))
        } else {
            None
        }
    }
}
