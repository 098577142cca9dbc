// ABOUTME: Configuration for embedchat sessions.
// ABOUTME: Reads ~/.embedchat/config.toml plus an EMBEDCHAT_AUTH_TOKEN env overlay.

use std::path::PathBuf;

use serde::Deserialize;

/// Session configuration. Loaded once at construction; immutable during a
/// session except through the controller's explicit reconfigure operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Display name of the assistant.
    pub bot_name: String,
    /// Remote assistant endpoint. The teardown notification goes to
    /// `<endpoint_url>/destroy`.
    pub endpoint_url: String,
    /// Value of the `Authorization` header; empty means no header.
    pub auth_token: String,
    /// Artificial delay before each transport call, in milliseconds.
    /// Zero disables it.
    pub response_delay_ms: u64,
    /// Maximum length (in characters) of a user message.
    pub max_message_length: usize,
    /// Whether to show the typing placeholder while awaiting a response.
    pub enable_typing_indicator: bool,
    /// Whether the quick-replies strip is offered at all.
    pub enable_quick_replies: bool,
    /// First message of every conversation, reseeded on clear.
    pub greeting: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            bot_name: "Assistant".to_string(),
            endpoint_url: "/api/chat".to_string(),
            auth_token: String::new(),
            response_delay_ms: 1500,
            max_message_length: 500,
            enable_typing_indicator: true,
            enable_quick_replies: true,
            greeting: "Hello! I'm your assistant. How can I help you today?".to_string(),
        }
    }
}

impl ChatConfig {
    /// Load config from ~/.embedchat/config.toml, falling back to defaults.
    ///
    /// A local .env is read first; EMBEDCHAT_AUTH_TOKEN, when set, overrides
    /// whatever credential the file carries so tokens stay out of config
    /// files.
    pub fn load() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let path = Self::config_path();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        if let Ok(token) = std::env::var("EMBEDCHAT_AUTH_TOKEN") {
            config.auth_token = token;
        }
        Ok(config)
    }

    /// Path to the config file.
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".embedchat")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = ChatConfig::default();
        assert_eq!(config.endpoint_url, "/api/chat");
        assert_eq!(config.response_delay_ms, 1500);
        assert_eq!(config.max_message_length, 500);
        assert!(config.enable_typing_indicator);
        assert!(config.enable_quick_replies);
        assert!(config.auth_token.is_empty());
    }

    #[test]
    fn parse_config_toml() {
        let toml_str = r#"
bot_name = "Sales Assistant"
endpoint_url = "https://assistant.example.com/chat"
response_delay_ms = 800
max_message_length = 280
enable_quick_replies = false
"#;
        let config: ChatConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bot_name, "Sales Assistant");
        assert_eq!(config.endpoint_url, "https://assistant.example.com/chat");
        assert_eq!(config.response_delay_ms, 800);
        assert_eq!(config.max_message_length, 280);
        assert!(!config.enable_quick_replies);
        // Unspecified fields keep their defaults.
        assert!(config.enable_typing_indicator);
    }

    #[test]
    fn parse_config_file_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "endpoint_url = \"https://bot.example.com\"\n").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let config: ChatConfig = toml::from_str(&content).unwrap();
        assert_eq!(config.endpoint_url, "https://bot.example.com");
        assert_eq!(config.max_message_length, 500);
    }
}
