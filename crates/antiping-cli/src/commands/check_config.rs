// Configuration validation

use anyhow::Context;
use antiping_moderation::Config;
use serde_json::json;
use std::path::Path;

/// Load and validate the configuration, then print the effective settings
///
/// Credentials are never printed.
pub fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("configuration {} rejected", config_path.display()))?;
    println!("{}", serde_json::to_string_pretty(&summary(&config))?);
    Ok(())
}

fn summary(config: &Config) -> serde_json::Value {
    let offences = &config.offences;
    json!({
        "server_name": config.server_name,
        "user_id": config.bot_user_id(),
        "homeserver": config.user.homeserver,
        "log_room": config.log.room,
        "mjolnir": {
            "room": config.mjolnir.room,
            "banlist": config.mjolnir.banlist,
            "prefix": config.mjolnir.prefix,
        },
        "rooms": {
            "include": config.rooms.include,
            "exclude": config.rooms.exclude,
        },
        "members_exclude": config.members.exclude,
        "limits": {
            "spam": offences.limits.spam,
            "ban": offences.limits.ban,
        },
        "history_size": offences.history_size,
        "gc_interval_secs": offences.gc_interval().as_secs(),
        "retry_delay_ms": config.dispatcher.retry_delay_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_summary_omits_password() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            server_name = "example.org"
            [mjolnir]
            room = "!mod:example.org"
            banlist = "spam"
            [log]
            room = "!log:example.org"
            [user]
            user = "antiping"
            password = "secret-password"
            "#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        let rendered = summary(&config).to_string();
        assert!(!rendered.contains("secret-password"));
        assert!(rendered.contains("@antiping:example.org"));
        assert!(run(file.path()).is_ok());
    }

    #[test]
    fn test_invalid_config_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "server_name = 5").unwrap();
        let err = run(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains(&file.path().display().to_string()));
    }
}
