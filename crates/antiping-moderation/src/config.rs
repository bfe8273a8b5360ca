//! Configuration for the moderation engine.
//!
//! Loaded from TOML. Every table except `mjolnir`, `log` and `user` is
//! optional and falls back to the defaults below. [`Config::validate`]
//! collects every problem it finds and reports them together, so an operator
//! fixes a bad file in one pass.

use crate::error::{ModerationError, Result};
use crate::filter::compile_pattern;
use crate::offence::Limits;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Homeserver name; only rooms on this server are moderated
    pub server_name: String,
    /// Moderation-bot command room and ban list
    pub mjolnir: MjolnirConfig,
    /// Room receiving moderation notices
    pub log: LogConfig,
    /// Account the engine acts as
    pub user: UserConfig,
    /// Room include/exclude patterns
    #[serde(default)]
    pub rooms: RoomsConfig,
    /// Member exclusions
    #[serde(default)]
    pub members: MembersConfig,
    /// Offence weights, expiry and limits
    #[serde(default)]
    pub offences: OffencesConfig,
    /// Action dispatcher tuning
    #[serde(default)]
    pub dispatcher: DispatcherSettings,
}

/// Moderation bot that executes bans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MjolnirConfig {
    /// Room the bot reads commands from
    pub room: String,
    /// Ban list shortcode
    pub banlist: String,
    /// Command prefix
    #[serde(default = "default_mjolnir_prefix")]
    pub prefix: String,
}

/// Notice log destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Room receiving notices
    pub room: String,
}

/// Engine account credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    /// Localpart of the engine's account
    pub user: String,
    /// Account password
    pub password: String,
    /// Client-server API base URL
    #[serde(default)]
    pub homeserver: Option<String>,
}

/// One offence category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OffenceConfig {
    /// Whether the category produces offences
    pub enabled: bool,
    /// Weight added per offence
    pub weight: u32,
    /// Lifetime of each offence in minutes
    pub expires_minutes: f64,
}

impl OffenceConfig {
    const fn new(weight: u32, expires_minutes: f64) -> Self {
        Self {
            enabled: true,
            weight,
            expires_minutes,
        }
    }

    /// Offence lifetime; zero if `expires_minutes` is not a positive number.
    pub fn ttl(&self) -> Duration {
        Duration::try_from_secs_f64(self.expires_minutes * 60.0).unwrap_or(Duration::ZERO)
    }
}

/// Mass-mention category; upgrades ordinary mentions at `upgrade_at`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassMentionsConfig {
    /// Weight and expiry
    #[serde(flatten)]
    pub offence: OffenceConfig,
    /// Mention count that makes a message a mass mention
    #[serde(default = "default_upgrade_at")]
    pub upgrade_at: usize,
}

/// Classification thresholds as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Weight that triggers an alert
    pub spam: u64,
    /// Weight that triggers a ban
    pub ban: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { spam: 20, ban: 30 }
    }
}

/// Offence categories and ledger settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffencesConfig {
    /// Any non-media message
    pub text_spam: OffenceConfig,
    /// Image, audio and video messages
    pub media_spam: OffenceConfig,
    /// Messages mentioning at least one user
    pub mentions: OffenceConfig,
    /// Messages mentioning many users
    pub mass_mentions: MassMentionsConfig,
    /// Text appended to the in-room alert
    pub spam_alert: String,
    /// Thresholds
    pub limits: LimitsConfig,
    /// Offences remembered per identity
    pub history_size: usize,
    /// Minutes between garbage-collection sweeps
    pub gc_interval_minutes: u64,
}

impl Default for OffencesConfig {
    fn default() -> Self {
        Self {
            text_spam: OffenceConfig::new(2, 0.4),
            media_spam: OffenceConfig::new(4, 0.5),
            mentions: OffenceConfig::new(4, 0.5),
            mass_mentions: MassMentionsConfig {
                offence: OffenceConfig::new(10, 1.0),
                upgrade_at: default_upgrade_at(),
            },
            spam_alert: "Stop spamming.".to_owned(),
            limits: LimitsConfig::default(),
            history_size: 20,
            gc_interval_minutes: 5,
        }
    }
}

impl OffencesConfig {
    /// Interval between garbage-collection sweeps.
    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_minutes.saturating_mul(60))
    }
}

/// Shell-style room patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    /// Rooms to moderate
    pub include: Vec<String>,
    /// Rooms to leave alone
    pub exclude: Vec<String>,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            include: vec!["*".to_owned()],
            exclude: Vec::new(),
        }
    }
}

/// Shell-style member patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MembersConfig {
    /// Senders never scored
    pub exclude: Vec<String>,
}

/// Dispatcher tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherSettings {
    /// Delay between readiness attempts in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            retry_delay_ms: 2_000,
        }
    }
}

impl DispatcherSettings {
    /// Delay between readiness attempts.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_mjolnir_prefix() -> String {
    "!mjolnir".to_owned()
}

fn default_upgrade_at() -> usize {
    4
}

impl Config {
    /// Parse and validate TOML.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Config = toml::from_str(input)
            .map_err(|e| ModerationError::config(format!("failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ModerationError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Classification thresholds.
    pub fn limits(&self) -> Result<Limits> {
        Limits::new(self.offences.limits.spam, self.offences.limits.ban)
    }

    /// Full user id of the engine's account.
    pub fn bot_user_id(&self) -> String {
        format!("@{}:{}", self.user.user, self.server_name)
    }

    /// Check every invariant the engine relies on.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        let offences = &self.offences;

        if offences.limits.spam > offences.limits.ban {
            problems.push(format!(
                "offences.limits.spam ({}) exceeds offences.limits.ban ({})",
                offences.limits.spam, offences.limits.ban
            ));
        }
        if offences.history_size == 0 {
            problems.push("offences.history_size must be greater than zero".to_owned());
        }
        if offences.gc_interval_minutes == 0 {
            problems.push("offences.gc_interval_minutes must be greater than zero".to_owned());
        }
        if self.dispatcher.retry_delay_ms == 0 {
            problems.push("dispatcher.retry_delay_ms must be greater than zero".to_owned());
        }
        if offences.mass_mentions.upgrade_at == 0 {
            problems.push("offences.mass_mentions.upgrade_at must be greater than zero".to_owned());
        }
        for (name, category) in [
            ("text_spam", &offences.text_spam),
            ("media_spam", &offences.media_spam),
            ("mentions", &offences.mentions),
            ("mass_mentions", &offences.mass_mentions.offence),
        ] {
            if category.ttl().is_zero() {
                problems.push(format!(
                    "offences.{name}.expires_minutes must be a positive number (got {})",
                    category.expires_minutes
                ));
            }
        }

        if self.server_name.is_empty() {
            problems.push("server_name must not be empty".to_owned());
        }
        if !is_valid_localpart(&self.user.user) {
            problems.push(format!(
                "user.user {:?} must match [a-z0-9._=\\-/]+",
                self.user.user
            ));
        }

        for (field, patterns) in [
            ("rooms.include", &self.rooms.include),
            ("rooms.exclude", &self.rooms.exclude),
            ("members.exclude", &self.members.exclude),
        ] {
            for pattern in patterns {
                if let Err(e) = compile_pattern(pattern) {
                    problems.push(format!("{field} pattern {pattern:?} is invalid: {e}"));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ModerationError::config(problems.join("; ")))
        }
    }
}

fn is_valid_localpart(localpart: &str) -> bool {
    !localpart.is_empty()
        && localpart.chars().all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '=' | '-' | '/')
        })
}
