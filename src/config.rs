//! Configuration types for the relay.
//!
//! A [`RelayConfig`] is built once at startup (from TOML plus environment
//! overrides) and handed to each component at construction time. Nothing in
//! the crate reads configuration from global state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RelayError, Result};
use crate::index::DEFAULT_SEARCH_LIMIT;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Completion, transcription and embedding provider settings.
    pub gateway: GatewayConfig,
    /// Speech synthesis provider settings.
    pub speech: SpeechConfig,
    /// Vector index settings.
    pub vector: VectorConfig,
    /// HTTP surface settings.
    pub server: ServerConfig,
}

/// Settings for the OpenAI-compatible completion/transcription/embedding provider.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Bearer token. Empty means "not configured".
    pub api_key: String,
    /// Base URL including the API version prefix.
    pub base_url: String,
    /// Model requested for chat completions.
    pub chat_model: String,
    /// Model requested for transcriptions.
    pub transcription_model: String,
    /// Model requested for embeddings.
    pub embedding_model: String,
    /// Upper bound for a transcription call.
    pub transcription_timeout_secs: u64,
    /// Upper bound for an embedding call.
    pub embedding_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.groq.com/openai/v1".to_owned(),
            chat_model: "mixtral-8x7b-32768".to_owned(),
            transcription_model: "whisper-large-v3".to_owned(),
            embedding_model: "text-embedding-3-large".to_owned(),
            transcription_timeout_secs: 120,
            embedding_timeout_secs: 30,
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("transcription_model", &self.transcription_model)
            .field("embedding_model", &self.embedding_model)
            .field("transcription_timeout_secs", &self.transcription_timeout_secs)
            .field("embedding_timeout_secs", &self.embedding_timeout_secs)
            .finish()
    }
}

impl GatewayConfig {
    /// The configured credential, or a [`RelayError::Configuration`] when empty.
    pub fn require_api_key(&self) -> Result<&str> {
        non_empty_key(&self.api_key, "GROQ_API_KEY must be configured to use the gateway")
    }

    /// Timeout applied to transcription requests.
    pub fn transcription_timeout(&self) -> Duration {
        Duration::from_secs(self.transcription_timeout_secs)
    }

    /// Timeout applied to embedding requests.
    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding_timeout_secs)
    }
}

/// Settings for the streaming text-to-speech provider.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Value for the `xi-api-key` header. Empty means "not configured".
    pub api_key: String,
    /// Base URL including the API version prefix.
    pub base_url: String,
    /// Voice used when the caller does not name one.
    pub default_voice: String,
    /// Voice stability sent with every request.
    pub stability: f64,
    /// Similarity boost sent with every request.
    pub similarity_boost: f64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.elevenlabs.io/v1".to_owned(),
            default_voice: DEFAULT_VOICE_ID.to_owned(),
            stability: 0.35,
            similarity_boost: 0.75,
        }
    }
}

impl fmt::Debug for SpeechConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_voice", &self.default_voice)
            .field("stability", &self.stability)
            .field("similarity_boost", &self.similarity_boost)
            .finish()
    }
}

impl SpeechConfig {
    /// The configured credential, or a [`RelayError::Configuration`] when empty.
    pub fn require_api_key(&self) -> Result<&str> {
        non_empty_key(
            &self.api_key,
            "ELEVENLABS_API_KEY must be configured to stream audio",
        )
    }
}

/// Voice requested when neither the caller nor the config names one.
pub const DEFAULT_VOICE_ID: &str = "eleven_multilingual_v2";

/// Vector index connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    /// Connection URL. Accepts `qdrant://`, `qdrant+https://` and plain `http(s)://`.
    pub url: String,
    /// Collection holding knowledge items.
    pub collection: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Result count used when a search does not specify one.
    pub search_limit: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            url: "qdrant://localhost:6333".to_owned(),
            collection: "knowledge_items".to_owned(),
            timeout_secs: 30,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl VectorConfig {
    /// Per-request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// HTTP surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind (0 = auto-assign).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8000,
        }
    }
}

fn non_empty_key<'a>(key: &'a str, message: &str) -> Result<&'a str> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(RelayError::Configuration(message.to_owned()));
    }
    Ok(trimmed)
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "<unset>" } else { "<redacted>" }
}

impl RelayConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| RelayError::Configuration(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| RelayError::Configuration(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from `path` when it exists, otherwise start from defaults, then
    /// apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply overrides from environment-style variables.
    ///
    /// `lookup` is injected so tests do not have to mutate process state.
    /// Recognized names: `GROQ_API_KEY`, `ELEVENLABS_API_KEY`,
    /// `VECTOR_STORE_URL`, `VOXRELAY_BIND` (`host:port`).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("GROQ_API_KEY") {
            self.gateway.api_key = key;
        }
        if let Some(key) = lookup("ELEVENLABS_API_KEY") {
            self.speech.api_key = key;
        }
        if let Some(url) = lookup("VECTOR_STORE_URL") {
            self.vector.url = url;
        }
        if let Some(bind) = lookup("VOXRELAY_BIND")
            && let Some((host, port)) = bind.rsplit_once(':')
        {
            match port.parse() {
                Ok(port) => {
                    self.server.host = host.to_owned();
                    self.server.port = port;
                }
                Err(_) => tracing::warn!(%bind, "ignoring VOXRELAY_BIND with invalid port"),
            }
        }
    }

    /// Returns the default config file path: `~/.config/voxrelay/config.toml`.
    pub fn default_config_path() -> PathBuf {
        match dirs::config_dir() {
            Some(dir) => dir.join("voxrelay").join("config.toml"),
            None => PathBuf::from("/tmp/voxrelay-config/config.toml"),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = RelayConfig::default();
        assert!(config.gateway.api_key.is_empty());
        assert_eq!(config.speech.default_voice, "eleven_multilingual_v2");
        assert!((config.speech.stability - 0.35).abs() < f64::EPSILON);
        assert!((config.speech.similarity_boost - 0.75).abs() < f64::EPSILON);
        assert_eq!(config.vector.search_limit, 4);
        assert_eq!(config.gateway.transcription_timeout(), Duration::from_secs(120));
        assert_eq!(config.gateway.embedding_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn missing_keys_are_configuration_errors() {
        let config = RelayConfig::default();
        let err = config.gateway.require_api_key().unwrap_err();
        assert_eq!(err.code(), "CONFIG_MISSING");
        let err = config.speech.require_api_key().unwrap_err();
        assert_eq!(err.code(), "CONFIG_MISSING");
    }

    #[test]
    fn whitespace_key_counts_as_missing() {
        let mut config = RelayConfig::default();
        config.gateway.api_key = "   ".into();
        assert!(config.gateway.require_api_key().is_err());
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let mut config = RelayConfig::default();
        config.gateway.api_key = "gsk-secret".into();
        config.speech.api_key = "xi-secret".into();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("gsk-secret"));
        assert!(!rendered.contains("xi-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = RelayConfig::default();
        config.vector.collection = "notes".into();
        config.server.port = 9123;
        config.save_to_file(&path).unwrap();

        let loaded = RelayConfig::from_file(&path).unwrap();
        assert_eq!(loaded.vector.collection, "notes");
        assert_eq!(loaded.server.port, 9123);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: RelayConfig = toml::from_str("[speech]\ndefault_voice = \"rachel\"").unwrap();
        assert_eq!(config.speech.default_voice, "rachel");
        assert_eq!(config.speech.base_url, "https://api.elevenlabs.io/v1");
        assert_eq!(config.vector.url, "qdrant://localhost:6333");
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").unwrap();
        let err = RelayConfig::from_file(&path).unwrap_err();
        assert_eq!(err.code(), "CONFIG_MISSING");
    }

    #[test]
    fn from_file_nonexistent_returns_io_error() {
        let err = RelayConfig::from_file(Path::new("/nonexistent/voxrelay.toml")).unwrap_err();
        assert_eq!(err.code(), "IO_ERROR");
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("GROQ_API_KEY", "gsk"),
            ("ELEVENLABS_API_KEY", "xi"),
            ("VECTOR_STORE_URL", "qdrant+https://index.example"),
            ("VOXRELAY_BIND", "0.0.0.0:9000"),
        ]
        .into_iter()
        .collect();

        let mut config = RelayConfig::default();
        config.apply_env(|name| vars.get(name).map(|v| (*v).to_owned()));

        assert_eq!(config.gateway.api_key, "gsk");
        assert_eq!(config.speech.api_key, "xi");
        assert_eq!(config.vector.url, "qdrant+https://index.example");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn invalid_bind_is_ignored() {
        let mut config = RelayConfig::default();
        config.apply_env(|name| (name == "VOXRELAY_BIND").then(|| "host:notaport".to_owned()));
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = RelayConfig::default_config_path();
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }
}
