//! Application-level configuration loading: calendar timezone, daily allotments, invite lifetime,
//! admin token and the question catalogue seeded at startup.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use thiserror::Error;
use time::{UtcOffset, macros::format_description};
use tracing::{info, warn};

use crate::{dao::models::GameKind, state::daily::Allotment};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PAIRPLAY_BACK_CONFIG_PATH";
const DEFAULT_INVITE_TTL_MINUTES: u64 = 24 * 60;

/// Reasons a configuration file is rejected as a whole.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file is not valid JSON for the expected shape.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The `timezone_offset` key is not a `+HH:MM` offset.
    #[error("invalid timezone offset `{0}`, expected `+HH:MM`")]
    TimezoneOffset(String),
    /// `invite_ttl_minutes` is zero.
    #[error("invite lifetime must be at least one minute")]
    InviteTtl,
}

/// Content of one question shipped with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuestionSeed {
    /// Prompt shown to both partners.
    pub text: String,
    /// Game the question belongs to.
    pub kind: GameKind,
    /// The two options of choice games.
    #[serde(default)]
    pub choices: Option<[String; 2]>,
    /// Relative selection weight, 1 by default.
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Whether the question can be served.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_weight() -> u32 {
    1
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    timezone_offset: UtcOffset,
    allotment: Allotment,
    invite_ttl: Duration,
    admin_token: Option<String>,
    questions: Vec<QuestionSeed>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        offset = %app_config.timezone_offset,
                        questions = app_config.questions.len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a configuration document. Absent keys take their default value.
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        serde_json::from_str::<RawConfig>(contents)?.try_into()
    }

    /// The single civil timezone in which calendar days are counted.
    pub fn timezone_offset(&self) -> UtcOffset {
        self.timezone_offset
    }

    /// Counters restored on every new calendar day.
    pub fn allotment(&self) -> Allotment {
        self.allotment
    }

    /// How long an issued invite stays valid.
    pub fn invite_ttl(&self) -> Duration {
        self.invite_ttl
    }

    /// Token expected in `x-admin-token`. Admin routes are disabled without one.
    pub fn admin_token(&self) -> Option<&str> {
        self.admin_token.as_deref()
    }

    /// Questions seeded into the store at startup.
    pub fn questions(&self) -> &[QuestionSeed] {
        &self.questions
    }

    /// Replace the admin token.
    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(token.into());
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timezone_offset: UtcOffset::UTC,
            allotment: Allotment::default(),
            invite_ttl: Duration::from_secs(DEFAULT_INVITE_TTL_MINUTES * 60),
            admin_token: None,
            questions: default_questions(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    timezone_offset: Option<String>,
    daily_allotment: Option<u32>,
    ticket_allotment: Option<u32>,
    invite_ttl_minutes: Option<u64>,
    admin_token: Option<String>,
    questions: Option<Vec<QuestionSeed>>,
}

impl TryFrom<RawConfig> for AppConfig {
    type Error = ConfigError;

    fn try_from(value: RawConfig) -> Result<Self, Self::Error> {
        let defaults = AppConfig::default();

        let timezone_offset = match value.timezone_offset {
            Some(raw) => parse_offset(&raw)?,
            None => defaults.timezone_offset,
        };
        let invite_ttl = match value.invite_ttl_minutes {
            Some(0) => return Err(ConfigError::InviteTtl),
            Some(minutes) => Duration::from_secs(minutes * 60),
            None => defaults.invite_ttl,
        };

        Ok(Self {
            timezone_offset,
            allotment: Allotment {
                daily: value.daily_allotment.unwrap_or(defaults.allotment.daily),
                tickets: value.ticket_allotment.unwrap_or(defaults.allotment.tickets),
            },
            invite_ttl,
            admin_token: value.admin_token.filter(|token| !token.trim().is_empty()),
            questions: value.questions.unwrap_or(defaults.questions),
        })
    }
}

fn parse_offset(raw: &str) -> Result<UtcOffset, ConfigError> {
    UtcOffset::parse(
        raw,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .map_err(|_| ConfigError::TimezoneOffset(raw.to_owned()))
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in catalogue shipped with the binary so every game kind is playable.
fn default_questions() -> Vec<QuestionSeed> {
    fn open(text: &str) -> QuestionSeed {
        QuestionSeed {
            text: text.into(),
            kind: GameKind::Daily,
            choices: None,
            weight: 1,
            active: true,
        }
    }

    fn pick(kind: GameKind, text: &str, first: &str, second: &str) -> QuestionSeed {
        QuestionSeed {
            text: text.into(),
            kind,
            choices: Some([first.into(), second.into()]),
            weight: 1,
            active: true,
        }
    }

    vec![
        open("What made you smile today?"),
        open("Which memory of us would you relive tomorrow?"),
        open("What is one small thing I could do for you this week?"),
        pick(GameKind::ThisOrThat, "Weekend getaway?", "Beach", "Mountains"),
        pick(GameKind::ThisOrThat, "Friday night?", "Movie night", "Dinner out"),
        pick(GameKind::ThisOrThat, "Favourite time of day?", "Sunrise", "Sunset"),
        pick(
            GameKind::MoreLikely,
            "Who is more likely to forget an anniversary?",
            "Me",
            "You",
        ),
        pick(
            GameKind::MoreLikely,
            "Who is more likely to cry at a movie?",
            "Me",
            "You",
        ),
        pick(
            GameKind::WouldYouRather,
            "Would you rather spend the next ten years...",
            "Travel the world together",
            "Build a dream home together",
        ),
        pick(
            GameKind::WouldYouRather,
            "Would you rather, for the rest of your life...",
            "Always cook together",
            "Never cook again",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use time::macros::offset;

    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_json("{}").unwrap();

        assert_eq!(config.timezone_offset(), UtcOffset::UTC);
        assert_eq!(config.allotment(), Allotment::default());
        assert_eq!(config.invite_ttl(), Duration::from_secs(86_400));
        assert!(config.admin_token().is_none());
        assert!(!config.questions().is_empty());
    }

    #[test]
    fn explicit_keys_override_defaults() {
        let config = AppConfig::from_json(
            r#"{
                "timezone_offset": "+02:00",
                "daily_allotment": 2,
                "ticket_allotment": 5,
                "invite_ttl_minutes": 60,
                "admin_token": "s3cret",
                "questions": [
                    {"text": "Tea or coffee?", "kind": "this_or_that", "choices": ["Tea", "Coffee"], "weight": 3}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.timezone_offset(), offset!(+2));
        assert_eq!(
            config.allotment(),
            Allotment {
                daily: 2,
                tickets: 5
            }
        );
        assert_eq!(config.invite_ttl(), Duration::from_secs(3_600));
        assert_eq!(config.admin_token(), Some("s3cret"));
        assert_eq!(config.questions().len(), 1);
        assert_eq!(config.questions()[0].weight, 3);
        assert!(config.questions()[0].active);
    }

    #[test]
    fn negative_offsets_are_supported() {
        let config = AppConfig::from_json(r#"{"timezone_offset": "-05:30"}"#).unwrap();
        assert_eq!(config.timezone_offset(), offset!(-5:30));
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(matches!(
            AppConfig::from_json(r#"{"timezone_offset": "Europe/Paris"}"#),
            Err(ConfigError::TimezoneOffset(_))
        ));
        assert!(matches!(
            AppConfig::from_json(r#"{"invite_ttl_minutes": 0}"#),
            Err(ConfigError::InviteTtl)
        ));
        assert!(matches!(
            AppConfig::from_json("not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn blank_admin_token_disables_admin_routes() {
        let config = AppConfig::from_json(r#"{"admin_token": "  "}"#).unwrap();
        assert!(config.admin_token().is_none());
    }
}
