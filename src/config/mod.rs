//! Static configuration
//!
//! Candidate roster, admin allow-list, voting window, and platform
//! credentials. Loaded once at startup and never mutated afterwards.

use chrono::NaiveDateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// LINE carousel templates accept at most this many columns.
pub const CAROUSEL_COLUMN_LIMIT: usize = 10;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] json5::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The two candidate groups a voter picks from, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Group {
    A,
    B,
}

impl Group {
    /// Human-readable group label ("A" or "B").
    pub fn label(self) -> &'static str {
        match self {
            Group::A => "A",
            Group::B => "B",
        }
    }
}

impl std::fmt::Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A statically configured candidate. Defined at startup, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Unique candidate id, used as the tally key and postback payload.
    pub id: String,
    /// Which group this candidate belongs to.
    pub group: Group,
    /// Display name shown on carousel cards and in replies.
    pub name: String,
    /// Card thumbnail image.
    pub image_url: String,
    /// Short blurb shown under the name on the card.
    pub description: String,
}

/// The interval during which general users may vote, in the configured
/// civil timezone. Both bounds are inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteWindow {
    pub opens_at: NaiveDateTime,
    pub closes_at: NaiveDateTime,
}

/// LINE Messaging API credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineCredentials {
    /// Channel secret used to verify webhook signatures.
    #[serde(default)]
    pub channel_secret: String,
    /// Channel access token used for the reply API.
    #[serde(default)]
    pub channel_access_token: String,
}

/// Complete bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address the webhook server binds to.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Path of the JSON vote dataset.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// Civil timezone used to compute "today" and the window bounds.
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
    /// Voting window for general users.
    pub window: VoteWindow,
    /// User ids allowed to run admin commands.
    #[serde(default)]
    pub admins: Vec<String>,
    /// Candidate roster; order here is the tally tie-break order.
    pub candidates: Vec<Candidate>,
    /// Optional image sent along with the completion summary.
    #[serde(default)]
    pub completion_image_url: Option<String>,
    /// LINE credentials.
    #[serde(default)]
    pub line: LineCredentials,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("senbatsu").join("votes.json"))
        .unwrap_or_else(|| PathBuf::from("votes.json"))
}

fn default_timezone() -> Tz {
    chrono_tz::Asia::Tokyo
}

impl Config {
    /// Load configuration from a JSON5 file, apply environment overrides
    /// for credentials, and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_json5(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON5 string without validating.
    pub fn from_json5(raw: &str) -> Result<Self, ConfigError> {
        Ok(json5::from_str(raw)?)
    }

    /// Credentials may be supplied via the environment instead of the
    /// config file, so secrets stay out of checked-in files.
    fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("SENBATSU_CHANNEL_SECRET") {
            self.line.channel_secret = secret;
        }
        if let Ok(token) = std::env::var("SENBATSU_CHANNEL_ACCESS_TOKEN") {
            self.line.channel_access_token = token;
        }
    }

    /// Validate roster, window, and carousel constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.candidates.is_empty() {
            return Err(ConfigError::Invalid("candidate roster is empty".into()));
        }

        let mut seen = HashSet::new();
        for candidate in &self.candidates {
            if candidate.id.trim().is_empty() {
                return Err(ConfigError::Invalid("candidate with empty id".into()));
            }
            if !seen.insert(candidate.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate candidate id '{}'",
                    candidate.id
                )));
            }
        }

        for group in [Group::A, Group::B] {
            let count = self.group_candidates(group).count();
            if count == 0 {
                return Err(ConfigError::Invalid(format!(
                    "group {group} has no candidates"
                )));
            }
            if count > CAROUSEL_COLUMN_LIMIT {
                return Err(ConfigError::Invalid(format!(
                    "group {group} has {count} candidates; carousel limit is {CAROUSEL_COLUMN_LIMIT}"
                )));
            }
        }

        if self.window.opens_at >= self.window.closes_at {
            return Err(ConfigError::Invalid(
                "voting window opens_at must be before closes_at".into(),
            ));
        }

        Ok(())
    }

    /// Look up a candidate by id.
    pub fn candidate(&self, id: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == id)
    }

    /// Candidates in the given group, in roster order.
    pub fn group_candidates(&self, group: Group) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter().filter(move |c| c.group == group)
    }

    /// Whether this user id is on the admin allow-list.
    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admins.iter().any(|a| a == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn candidate(id: &str, group: Group) -> Candidate {
        Candidate {
            id: id.to_string(),
            group,
            name: format!("Candidate {id}"),
            image_url: format!("https://example.com/{id}.jpg"),
            description: "A candidate".to_string(),
        }
    }

    fn window() -> VoteWindow {
        VoteWindow {
            opens_at: NaiveDate::from_ymd_opt(2026, 7, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            closes_at: NaiveDate::from_ymd_opt(2026, 7, 31)
                .unwrap()
                .and_hms_opt(23, 59, 59)
                .unwrap(),
        }
    }

    fn valid_config() -> Config {
        Config {
            bind: default_bind(),
            store_path: PathBuf::from("votes.json"),
            timezone: chrono_tz::Asia::Tokyo,
            window: window(),
            admins: vec!["Uadmin".to_string()],
            candidates: vec![candidate("1", Group::A), candidate("4", Group::B)],
            completion_image_url: None,
            line: LineCredentials::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_empty_roster_rejected() {
        let mut config = valid_config();
        config.candidates.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_candidate_id_rejected() {
        let mut config = valid_config();
        config.candidates.push(candidate("1", Group::B));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_group_without_candidates_rejected() {
        let mut config = valid_config();
        config.candidates.retain(|c| c.group == Group::A);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_group_rejected() {
        let mut config = valid_config();
        for i in 0..CAROUSEL_COLUMN_LIMIT {
            config.candidates.push(candidate(&format!("a{i}"), Group::A));
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_window_rejected() {
        let mut config = valid_config();
        std::mem::swap(&mut config.window.opens_at, &mut config.window.closes_at);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_json5() {
        let raw = r#"{
            // comments are allowed
            timezone: "Asia/Tokyo",
            window: {
                opens_at: "2026-07-01T00:00:00",
                closes_at: "2026-07-31T23:59:59",
            },
            admins: ["Uadmin"],
            candidates: [
                { id: "1", group: "A", name: "Alice", image_url: "https://example.com/1.jpg", description: "first" },
                { id: "4", group: "B", name: "Beth", image_url: "https://example.com/4.jpg", description: "second" },
            ],
        }"#;

        let config = Config::from_json5(raw).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.timezone, chrono_tz::Asia::Tokyo);
        assert_eq!(config.candidates.len(), 2);
        assert!(config.is_admin("Uadmin"));
        assert!(!config.is_admin("Uother"));
    }

    #[test]
    fn test_group_lookup() {
        let config = valid_config();
        assert_eq!(config.candidate("1").unwrap().group, Group::A);
        assert!(config.candidate("missing").is_none());
        assert_eq!(config.group_candidates(Group::B).count(), 1);
    }
}
