use crate::error::{ConfigError, Result as AppResult};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, Value, ValueKind};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub cors_origins: Vec<String>,
    #[serde(default)]
    pub static_dir: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WordListSourceType {
    File,
    Http,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WordListConfig {
    pub source_type: WordListSourceType,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub http_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GameConfig {
    pub default_room: String,
    pub word_list: WordListConfig,
}

#[derive(Deserialize, Clone)]
pub struct BotConfig {
    pub api_url: String,
    /// Bots are disabled when no key is configured.
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub log_responses: bool,
}

// Keeps the key out of the startup log line.
impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("log_responses", &self.log_responses)
            .finish()
    }
}

impl BotConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub pong_wait_secs: u64,
    pub max_message_bytes: usize,
    pub outbound_buffer: usize,
    pub otp_retention_secs: u64,
    pub otp_sweep_interval_ms: u64,
}

impl SessionConfig {
    pub fn pong_wait(&self) -> Duration {
        Duration::from_secs(self.pong_wait_secs)
    }

    /// Pings go out at half the pong wait so one lost pong is tolerated.
    pub fn ping_interval(&self) -> Duration {
        self.pong_wait() / 2
    }

    pub fn otp_retention(&self) -> Duration {
        Duration::from_secs(self.otp_retention_secs)
    }

    pub fn otp_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.otp_sweep_interval_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub server: ServerConfig,
    pub game: GameConfig,
    pub bot: BotConfig,
    pub session: SessionConfig,
}

impl AppSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.game.default_room.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "game.default_room cannot be empty".to_string(),
            ));
        }
        match self.game.word_list.source_type {
            WordListSourceType::File if self.game.word_list.file_path.is_none() => {
                return Err(ConfigError::Missing("game.word_list.file_path".to_string()));
            }
            WordListSourceType::Http if self.game.word_list.http_url.is_none() => {
                return Err(ConfigError::Missing("game.word_list.http_url".to_string()));
            }
            _ => {}
        }
        if self.bot.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "bot.timeout_secs must be positive".to_string(),
            ));
        }
        if self.session.pong_wait_secs < 2 {
            return Err(ConfigError::InvalidValue(
                "session.pong_wait_secs must be at least 2".to_string(),
            ));
        }
        if self.session.max_message_bytes == 0 || self.session.outbound_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "session.max_message_bytes and session.outbound_buffer must be positive"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn bots_enabled(&self) -> bool {
        self.bot
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    builder
        .set_default("server.port", 8080)?
        .set_default(
            "server.cors_origins",
            Value::new(None, ValueKind::Array(Vec::new())),
        )?
        .set_default("game.default_room", "lobby")?
        .set_default("game.word_list.source_type", "file")?
        .set_default("game.word_list.file_path", "wordlist.txt")?
        .set_default("bot.api_url", "https://api.openai.com/v1")?
        .set_default("bot.model", "gpt-3.5-turbo")?
        .set_default("bot.timeout_secs", 30)?
        .set_default("bot.log_responses", false)?
        .set_default("session.pong_wait_secs", 60)?
        .set_default("session.max_message_bytes", 512)?
        .set_default("session.outbound_buffer", 64)?
        .set_default("session.otp_retention_secs", 5)?
        .set_default("session.otp_sweep_interval_ms", 400)
}

fn build_settings(builder: ConfigBuilder<DefaultState>) -> AppResult<AppSettings> {
    let settings: AppSettings = with_defaults(builder)
        .map_err(|e| ConfigError::Load(e.to_string()))?
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;
    settings.validate()?;
    Ok(settings)
}

pub fn load_settings() -> AppResult<AppSettings> {
    let builder = Config::builder()
        .add_source(
            Environment::with_prefix("CODEWORDS")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("server.cors_origins")
                .try_parsing(true),
        )
        .add_source(File::with_name("config").required(false));

    build_settings(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use config::FileFormat;

    fn from_toml(toml: &str) -> AppResult<AppSettings> {
        build_settings(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    #[test]
    fn test_defaults_fill_everything() {
        let settings = from_toml("").unwrap();
        assert_eq!(settings.server.port, 8080);
        assert!(settings.server.cors_origins.is_empty());
        assert_eq!(settings.game.default_room, "lobby");
        assert_eq!(settings.game.word_list.source_type, WordListSourceType::File);
        assert_eq!(settings.bot.timeout(), Duration::from_secs(30));
        assert!(!settings.bots_enabled());
        assert_eq!(settings.session.ping_interval(), Duration::from_secs(30));
        assert_eq!(settings.session.otp_sweep_interval(), Duration::from_millis(400));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let settings = from_toml(
            r#"
            [server]
            port = 9000
            cors_origins = ["http://localhost:3000"]

            [game.word_list]
            source_type = "http"
            http_url = "https://example.com/words.txt"

            [bot]
            api_key = "sk-test"
            "#,
        )
        .unwrap();
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.cors_origins, vec!["http://localhost:3000"]);
        assert_eq!(settings.game.word_list.source_type, WordListSourceType::Http);
        assert!(settings.bots_enabled());
        assert!(!format!("{:?}", settings.bot).contains("sk-test"));
    }

    #[test]
    fn test_http_source_requires_url() {
        let result = from_toml(
            r#"
            [game.word_list]
            source_type = "http"
            "#,
        );
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::Missing(key))) if key == "game.word_list.http_url"
        ));
    }

    #[test]
    fn test_tiny_pong_wait_is_rejected() {
        let result = from_toml("[session]\npong_wait_secs = 1\n");
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::InvalidValue(_)))
        ));
    }
}
