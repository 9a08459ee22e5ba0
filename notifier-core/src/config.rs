//! Typed application configuration.
//!
//! The TOML document is deserialized into loosely typed `Raw*` structures
//! first so that a missing key can be reported by its dotted path, then
//! validated once into [`AppConfig`]. Nothing downstream re-checks it.

use crate::{ConfigError, CoreError, SubredditFilter};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const ENV_CONFIG_PATH: &str = "RPN_CONFIG";
pub const ENV_LOGGING: &str = "RPN_LOGGING";

/// Value of `RPN_LOGGING` that keeps match echoing off.
const LOGGING_DISABLED: &str = "FALSE";

/// Reddit's own limits on subreddit names.
const SUBREDDIT_NAME_LEN: std::ops::RangeInclusive<usize> = 2..=21;

/// Process-level settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub config_path: PathBuf,
    pub echo_matches: bool,
}

impl RuntimeSettings {
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var(ENV_CONFIG_PATH).ok(),
            std::env::var(ENV_LOGGING).ok(),
        )
    }

    pub fn from_vars(config_path: Option<String>, logging: Option<String>) -> Self {
        let config_path = config_path
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        let echo_matches = logging.map_or(false, |v| v != LOGGING_DISABLED);

        Self {
            config_path,
            echo_matches,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Notification target descriptors, opaque to the core.
    pub notifications: Vec<String>,
    pub reddit: RedditCredentials,
    /// Sorted by name.
    pub subreddits: Vec<SubredditFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(alias = "apprise")]
    notifications: Option<Vec<String>>,
    reddit: Option<RawReddit>,
}

#[derive(Debug, Deserialize)]
struct RawReddit {
    client: Option<String>,
    secret: Option<String>,
    agent: Option<String>,
    subreddits: Option<BTreeMap<String, RawFilters>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFilters {
    #[serde(default)]
    include: Vec<String>,
    #[serde(default)]
    exclude: Vec<String>,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let shown = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => CoreError::Config(ConfigError::FileNotFound {
                path: shown.clone(),
            }),
            ErrorKind::PermissionDenied => CoreError::Config(ConfigError::PermissionDenied {
                path: shown.clone(),
            }),
            _ => CoreError::Io(e),
        })?;

        info!("Using config file: {}", shown);
        let config = Self::from_toml_str(&contents)?;

        info!("Monitoring Reddit for:");
        for filter in &config.subreddits {
            info!(
                "\tr/{}: include={:?}, exclude={:?}",
                filter.name, filter.include, filter.exclude
            );
        }

        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        if contents.trim().is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "empty file".to_string(),
            });
        }

        let raw: RawConfig = toml::from_str(contents).map_err(|e| {
            let (line, column) = e
                .span()
                .map(|span| line_and_column(contents, span.start))
                .unwrap_or((1, 1));
            ConfigError::InvalidFormat {
                line,
                column,
                details: e.message().to_string(),
            }
        })?;

        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
        let reddit = raw.reddit.ok_or_else(|| missing("reddit"))?;
        let client_id = reddit.client.ok_or_else(|| missing("reddit -> client"))?;
        let client_secret = reddit.secret.ok_or_else(|| missing("reddit -> secret"))?;
        let user_agent = reddit.agent.ok_or_else(|| missing("reddit -> agent"))?;
        let raw_subreddits = reddit
            .subreddits
            .ok_or_else(|| missing("reddit -> subreddits"))?;
        let notifications = raw.notifications.ok_or_else(|| missing("notifications"))?;

        if raw_subreddits.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "'reddit -> subreddits' must list at least one subreddit".to_string(),
            });
        }

        let mut subreddits: Vec<SubredditFilter> = Vec::with_capacity(raw_subreddits.len());
        for (name, filters) in raw_subreddits {
            validate_subreddit_name(&name)?;
            validate_terms(&name, "include", &filters.include)?;
            validate_terms(&name, "exclude", &filters.exclude)?;

            let filter = SubredditFilter::new(name.as_str(), filters.include, filters.exclude);
            if subreddits.iter().any(|existing| existing.name == filter.name) {
                return Err(ConfigError::ValidationFailed {
                    reason: format!("subreddit '{}' is listed more than once", filter.name),
                });
            }
            subreddits.push(filter);
        }
        subreddits.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Self {
            notifications,
            reddit: RedditCredentials {
                client_id,
                client_secret,
                user_agent,
            },
            subreddits,
        })
    }

    pub fn subreddit_names(&self) -> Vec<String> {
        self.subreddits.iter().map(|f| f.name.clone()).collect()
    }

    /// Case-insensitive lookup.
    pub fn filter_for(&self, subreddit: &str) -> Option<&SubredditFilter> {
        let subreddit = subreddit.to_lowercase();
        self.subreddits.iter().find(|f| f.name == subreddit)
    }
}

fn missing(field: &str) -> ConfigError {
    ConfigError::MissingField {
        field: field.to_string(),
    }
}

fn validate_subreddit_name(name: &str) -> Result<(), ConfigError> {
    let well_formed = SUBREDDIT_NAME_LEN.contains(&name.len())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if well_formed {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field: name.to_string(),
            reason: "is not a valid subreddit name".to_string(),
        })
    }
}

fn validate_terms(subreddit: &str, key: &str, terms: &[String]) -> Result<(), ConfigError> {
    if terms.iter().any(|term| term.trim().is_empty()) {
        return Err(ConfigError::InvalidValue {
            field: format!("{} in '{}'", key, subreddit),
            reason: "must not contain blank keywords".to_string(),
        });
    }
    Ok(())
}

/// 1-based line and column of a byte offset.
fn line_and_column(contents: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(contents.len());
    let before = &contents[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map_or(before.chars().count(), |nl| before[nl + 1..].chars().count())
        + 1;
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const VALID: &str = r#"
notifications = ["json://localhost:8080/notify"]

[reddit]
client = "client-id"
secret = "client-secret"
agent = "reddit-post-notifier/0.1 by u/tester"

[reddit.subreddits.News]
include = ["Election"]
exclude = ["satire"]

[reddit.subreddits.rust]
"#;

    #[test]
    fn test_valid_config() {
        let config = AppConfig::from_toml_str(VALID).unwrap();
        assert_eq!(config.notifications, vec!["json://localhost:8080/notify"]);
        assert_eq!(config.reddit.client_id, "client-id");
        assert_eq!(config.reddit.client_secret, "client-secret");
        assert_eq!(
            config.reddit.user_agent,
            "reddit-post-notifier/0.1 by u/tester"
        );
        assert_eq!(config.subreddit_names(), vec!["news", "rust"]);

        let news = config.filter_for("NEWS").unwrap();
        assert_eq!(news.include, vec!["election"]);
        assert_eq!(news.exclude, vec!["satire"]);

        let rust = config.filter_for("rust").unwrap();
        assert!(rust.include.is_empty());
        assert!(rust.exclude.is_empty());
    }

    #[test]
    fn test_apprise_alias() {
        let contents = VALID.replace("notifications =", "apprise =");
        let config = AppConfig::from_toml_str(&contents).unwrap();
        assert_eq!(config.notifications.len(), 1);
    }

    #[test]
    fn test_empty_file() {
        let err = AppConfig::from_toml_str("  \n").unwrap_err();
        assert_eq!(err.to_string(), "Invalid config: empty file");
    }

    #[test]
    fn test_missing_fields_are_named() {
        let cases = [
            ("client = \"client-id\"\n", "reddit -> client"),
            ("secret = \"client-secret\"\n", "reddit -> secret"),
            (
                "agent = \"reddit-post-notifier/0.1 by u/tester\"\n",
                "reddit -> agent",
            ),
            (
                "notifications = [\"json://localhost:8080/notify\"]\n",
                "notifications",
            ),
        ];

        for (line, field) in cases {
            let contents = VALID.replace(line, "");
            match AppConfig::from_toml_str(&contents) {
                Err(ConfigError::MissingField { field: missing }) => assert_eq!(missing, field),
                other => panic!("expected missing {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_missing_reddit_table() {
        let err = AppConfig::from_toml_str("notifications = []\n").unwrap_err();
        assert_eq!(err.to_string(), "Invalid config: missing reddit config");
    }

    #[test]
    fn test_missing_subreddits() {
        let contents = r#"
notifications = []
[reddit]
client = "a"
secret = "b"
agent = "c"
"#;
        let err = AppConfig::from_toml_str(contents).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { ref field } if field == "reddit -> subreddits"));
    }

    #[test]
    fn test_mistyped_field_reports_location() {
        let contents = VALID.replace("client = \"client-id\"", "client = 42");
        match AppConfig::from_toml_str(&contents) {
            Err(ConfigError::InvalidFormat { line, column, .. }) => {
                assert_eq!(line, 5);
                assert!(column >= 1);
            }
            other => panic!("expected invalid format, got {other:?}"),
        }
    }

    #[test]
    fn test_syntax_error_reports_location() {
        let err = AppConfig::from_toml_str("[reddit\nclient = \"x\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFormat { .. }));
        assert!(err.to_string().contains("line"));
    }

    #[test]
    fn test_include_must_be_list_of_strings() {
        let contents = VALID.replace("include = [\"Election\"]", "include = \"Election\"");
        assert!(matches!(
            AppConfig::from_toml_str(&contents),
            Err(ConfigError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_blank_keyword_rejected() {
        let contents = VALID.replace("exclude = [\"satire\"]", "exclude = [\"  \"]");
        match AppConfig::from_toml_str(&contents) {
            Err(ConfigError::InvalidValue { field, .. }) => {
                assert_eq!(field, "exclude in 'News'");
            }
            other => panic!("expected invalid value, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_names_after_lowercasing() {
        let contents = format!("{VALID}\n[reddit.subreddits.news]\n");
        assert!(matches!(
            AppConfig::from_toml_str(&contents),
            Err(ConfigError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn test_malformed_subreddit_name() {
        let contents = VALID.replace("[reddit.subreddits.rust]", "[reddit.subreddits.\"r/rust\"]");
        assert!(matches!(
            AppConfig::from_toml_str(&contents),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "r/rust"
        ));
    }

    #[test]
    fn test_no_subreddits() {
        let contents = r#"
notifications = []
[reddit]
client = "a"
secret = "b"
agent = "c"
[reddit.subreddits]
"#;
        assert!(matches!(
            AppConfig::from_toml_str(contents),
            Err(ConfigError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        match AppConfig::load(&path) {
            Err(CoreError::Config(ConfigError::FileNotFound { path: reported })) => {
                assert!(reported.ends_with("missing.toml"));
            }
            other => panic!("expected file not found, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(VALID.as_bytes()).unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.subreddits.len(), 2);
    }

    #[test]
    fn test_runtime_settings_defaults() {
        let settings = RuntimeSettings::from_vars(None, None);
        assert_eq!(settings.config_path, PathBuf::from("config.toml"));
        assert!(!settings.echo_matches);
    }

    #[test]
    fn test_runtime_settings_overrides() {
        let settings =
            RuntimeSettings::from_vars(Some("/etc/rpn.toml".to_string()), Some("TRUE".to_string()));
        assert_eq!(settings.config_path, PathBuf::from("/etc/rpn.toml"));
        assert!(settings.echo_matches);

        let settings = RuntimeSettings::from_vars(None, Some("FALSE".to_string()));
        assert!(!settings.echo_matches);
    }

    #[test]
    fn test_line_and_column() {
        assert_eq!(line_and_column("abc", 0), (1, 1));
        assert_eq!(line_and_column("abc\ndef", 5), (2, 2));
    }
}
