use std::fmt;

use config::Config;
use serenity::model::id::{ChannelId, RoleId};
use thiserror::Error;

/// Default port of the health check server
pub const DEFAULT_PORT: u16 = 3000;
/// Default catstare emoji name
pub const DEFAULT_CATSTARE_EMOJI: &str = "catstare";
/// Default number of reactions needed to reach the board
pub const DEFAULT_CATSTARE_THRESHOLD: u64 = 3;
/// Default chat completion model
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
/// Default translation endpoint
pub const DEFAULT_TRANSLATE_API_URL: &str = "https://translate.googleapis.com/translate_a/single";

/// Environment marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn is_development(self) -> bool {
        self == AppEnv::Development
    }
}

/// Catstare board settings
#[derive(Debug, Clone, PartialEq)]
pub struct CatstareConfig {
    /// Board channel, the board is disabled without one
    pub channel_id: Option<ChannelId>,
    /// Emoji name that counts towards the board
    pub emoji: String,
    /// Reactions needed to reach the board
    pub threshold: u64,
}

/// Chat completion settings
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Base URL of an OpenAI compatible API
    pub api_url: Option<String>,
    /// Bearer token
    pub api_key: Option<String>,
    /// Model name
    pub model: String,
}

/// Application settings
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Bot token
    pub discord_token: String,
    /// Health check port
    pub port: u16,
    /// Environment marker
    pub app_env: AppEnv,
    /// Operator log channel
    pub log_channel_id: ChannelId,
    /// Channel receiving direct messages
    pub dm_log_channel_id: ChannelId,
    /// Role granted to accepted frens
    pub fren_role_id: Option<RoleId>,
    /// Catstare board
    pub catstare: CatstareConfig,
    /// Chat bot
    pub chat: ChatConfig,
    /// Translation endpoint
    pub translate_api_url: String,
    /// Directory holding the database
    pub data_dir: String,
}

/// Unvalidated settings as read from the sources
#[derive(Debug, Default, serde::Deserialize, PartialEq, Clone)]
pub struct RawConfig {
    pub discord_token: Option<String>,
    pub port: Option<String>,
    pub app_env: Option<String>,
    pub log_channel_id: Option<String>,
    pub dm_log_channel_id: Option<String>,
    pub fren_role_id: Option<String>,
    pub catstare_channel_id: Option<String>,
    pub catstare_emoji: Option<String>,
    pub catstare_threshold: Option<String>,
    pub chat_api_url: Option<String>,
    pub chat_api_key: Option<String>,
    pub chat_model: Option<String>,
    pub translate_api_url: Option<String>,
    pub data_dir: Option<String>,
}

/// One problem found in the settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} :: {}", self.field, self.message)
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    /// A source could not be read or parsed
    #[error("failed to read configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// One or more values are missing or invalid
    #[error("{}", format_issues(.0))]
    Invalid(Vec<ConfigIssue>),
}

fn format_issues(issues: &[ConfigIssue]) -> String {
    let mut ret = format!(
        "{} validation error{}!\n",
        issues.len(),
        if issues.len() > 1 { "s" } else { "" }
    );
    for issue in issues {
        ret.push_str(&format!("{}\n", issue));
    }
    ret
}

/// Collects issues while converting raw values
#[derive(Default)]
struct Validator {
    issues: Vec<ConfigIssue>,
}

impl Validator {
    fn issue(&mut self, field: &'static str, message: impl Into<String>) {
        self.issues.push(ConfigIssue {
            field,
            message: message.into(),
        });
    }

    fn required(&mut self, field: &'static str, value: Option<String>) -> Option<String> {
        match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            Some(value) => Some(value),
            None => {
                self.issue(field, "is required");
                None
            }
        }
    }

    fn snowflake(&mut self, field: &'static str, value: &str) -> Option<u64> {
        match value.trim().parse::<u64>() {
            Ok(id) if id > 0 => Some(id),
            _ => {
                self.issue(field, format!("`{}` is not a valid snowflake", value));
                None
            }
        }
    }

    fn optional_snowflake(&mut self, field: &'static str, value: Option<String>) -> Option<u64> {
        let value = value.filter(|v| !v.trim().is_empty())?;
        self.snowflake(field, &value)
    }
}

/// Treats blank values like missing ones
fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Bot tokens are three dot-separated base64 segments
fn is_token_shaped(token: &str) -> bool {
    let parts = token.split('.').collect::<Vec<_>>();
    parts.len() == 3
        && parts.iter().all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        })
}

impl RawConfig {
    /// Checks every value and reports all problems at once
    pub fn validate(self) -> Result<AppConfig, ConfigError> {
        let mut v = Validator::default();

        let discord_token = v.required("discord_token", self.discord_token);
        if let Some(token) = &discord_token {
            if !is_token_shaped(token) {
                v.issue("discord_token", "does not look like a bot token");
            }
        }

        let port = match non_empty(self.port) {
            None => Some(DEFAULT_PORT),
            Some(port) => match port.parse::<u16>() {
                Ok(port) if port > 0 => Some(port),
                _ => {
                    v.issue("port", format!("`{}` is not a port between 1 and 65535", port));
                    None
                }
            },
        };

        let app_env = v
            .required("app_env", self.app_env)
            .and_then(|env| match env.to_ascii_lowercase().as_str() {
                "development" => Some(AppEnv::Development),
                "production" => Some(AppEnv::Production),
                _ => {
                    v.issue(
                        "app_env",
                        format!("`{}` must be `development` or `production`", env),
                    );
                    None
                }
            });

        let log_channel_id = v
            .required("log_channel_id", self.log_channel_id)
            .and_then(|id| v.snowflake("log_channel_id", &id));
        let dm_log_channel_id = v.optional_snowflake("dm_log_channel_id", self.dm_log_channel_id);
        let fren_role_id = v.optional_snowflake("fren_role_id", self.fren_role_id);
        let catstare_channel_id =
            v.optional_snowflake("catstare_channel_id", self.catstare_channel_id);

        let catstare_threshold = match non_empty(self.catstare_threshold) {
            None => Some(DEFAULT_CATSTARE_THRESHOLD),
            Some(threshold) => match threshold.parse::<u64>() {
                Ok(threshold) if threshold >= 1 => Some(threshold),
                _ => {
                    v.issue(
                        "catstare_threshold",
                        format!("`{}` must be a positive integer", threshold),
                    );
                    None
                }
            },
        };

        let chat_api_url = non_empty(self.chat_api_url);
        if let Some(url) = &chat_api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                v.issue("chat_api_url", format!("`{}` is not an http(s) URL", url));
            }
        }

        if !v.issues.is_empty() {
            return Err(ConfigError::Invalid(v.issues));
        }

        // every `None` below was recorded as an issue above
        match (discord_token, port, app_env, log_channel_id, catstare_threshold) {
            (Some(discord_token), Some(port), Some(app_env), Some(log_channel_id), Some(threshold)) => {
                Ok(AppConfig {
                    discord_token,
                    port,
                    app_env,
                    log_channel_id: ChannelId(log_channel_id),
                    dm_log_channel_id: ChannelId(dm_log_channel_id.unwrap_or(log_channel_id)),
                    fren_role_id: fren_role_id.map(RoleId),
                    catstare: CatstareConfig {
                        channel_id: catstare_channel_id.map(ChannelId),
                        emoji: non_empty(self.catstare_emoji)
                            .unwrap_or_else(|| DEFAULT_CATSTARE_EMOJI.to_string()),
                        threshold,
                    },
                    chat: ChatConfig {
                        api_url: chat_api_url,
                        api_key: non_empty(self.chat_api_key),
                        model: non_empty(self.chat_model)
                            .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
                    },
                    translate_api_url: non_empty(self.translate_api_url)
                        .unwrap_or_else(|| DEFAULT_TRANSLATE_API_URL.to_string()),
                    data_dir: non_empty(self.data_dir).unwrap_or_else(|| ".".to_string()),
                })
            }
            _ => Err(ConfigError::Invalid(v.issues)),
        }
    }
}

impl AppConfig {
    /// Loads the settings
    pub fn load_config() -> Result<AppConfig, ConfigError> {
        let config = Config::builder()
            // Add in `./config.toml` when present
            .add_source(config::File::with_name("config").required(false))
            // Add in settings from the environment, e.g. `DISCORD_TOKEN=...`
            .add_source(config::Environment::default())
            .build()?;
        Self::from_config(config)
    }

    /// Deserializes and validates an assembled configuration
    pub fn from_config(config: Config) -> Result<AppConfig, ConfigError> {
        let raw = config.try_deserialize::<RawConfig>()?;
        raw.validate()
    }
}
