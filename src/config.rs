use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the chat backend; requests go to `{base_url}/api/chat`
    pub base_url: String,

    /// Language tag sent with every request
    pub language: String,

    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,

    /// Wait before resending after a soft failure (empty 200 payload)
    pub soft_retry_delay_ms: u64,

    /// Wait before resending after a "search results" style reply
    pub requery_delay_ms: u64,

    /// Parley home directory (client id, transcripts, logs)
    pub parley_home: PathBuf,

    /// UI preferences
    pub ui: UiConfig,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    pub show_timestamps: bool,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

        Config {
            base_url: "https://chat.parley.chat".to_string(),
            language: "en-US".to_string(),
            request_timeout_secs: 30,
            soft_retry_delay_ms: 800,
            requery_delay_ms: 2000,
            parley_home: home.join(".parley"),
            ui: UiConfig {
                show_timestamps: true,
            },
        }
    }
}

impl Config {
    /// Load configuration from `~/.parley/config.toml`, falling back to
    /// defaults when the file does not exist yet.
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        let parley_home = home.join(".parley");
        let config_path = parley_home.join("config.toml");

        fs::create_dir_all(&parley_home).context("Failed to create .parley directory")?;

        let mut config = if config_path.exists() {
            let content =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            let config = Config {
                parley_home: parley_home.clone(),
                ..Config::default()
            };
            config.save()?;
            config
        };

        config.parley_home = parley_home;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = self.parley_home.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn transcripts_dir(&self) -> PathBuf {
        self.parley_home.join("transcripts")
    }

    pub fn log_path(&self) -> PathBuf {
        self.parley_home.join("parley.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.language, "en-US");
        assert_eq!(config.request_timeout_secs, 30);
        // the soft-failure wait is deliberately shorter than the re-query wait
        assert!(config.soft_retry_delay_ms < config.requery_delay_ms);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).expect("serialize");
        let back: Config = toml::from_str(&text).expect("parse");
        assert_eq!(back.base_url, config.base_url);
        assert_eq!(back.soft_retry_delay_ms, config.soft_retry_delay_ms);
        assert_eq!(back.ui.show_timestamps, config.ui.show_timestamps);
    }
}
