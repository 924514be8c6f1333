//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::CoreError;
use crate::Result;

const DEFAULT_STREAM_ENDPOINT: &str = "http://127.0.0.1:8000/chat/stream";
const DEFAULT_STORAGE_KEY: &str = "chat_sessions_v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the database file
    pub database_path: PathBuf,
    /// Server-sent-events endpoint; the message goes in the `message` query parameter
    pub stream_endpoint: String,
    /// Slot holding the serialized sessions
    pub storage_key: String,
    /// Longest title derived from a first message
    pub title_max_chars: usize,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join("chatline.db"),
            stream_endpoint: DEFAULT_STREAM_ENDPOINT.to_string(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            title_max_chars: chatline_session::TITLE_MAX_CHARS,
        }
    }

    /// Read a JSON config file; missing fields take their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn with_stream_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.stream_endpoint = endpoint.into();
        self
    }

    pub fn endpoint_url(&self) -> Result<Url> {
        let url = Url::parse(&self.stream_endpoint)
            .map_err(|e| CoreError::Config(format!("invalid stream endpoint: {}", e)))?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(CoreError::Config(format!(
                "unsupported stream endpoint scheme: {}",
                other
            ))),
        }
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("chatline"))
            .unwrap_or_else(|| PathBuf::from(".chatline"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

// Platform data directory lookup
mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new(PathBuf::from("/tmp/chatline-test"));
        assert_eq!(
            config.database_path,
            PathBuf::from("/tmp/chatline-test/chatline.db")
        );
        assert_eq!(config.storage_key, "chat_sessions_v1");
        assert_eq!(config.title_max_chars, 24);
        assert_eq!(
            config.endpoint_url().unwrap().as_str(),
            "http://127.0.0.1:8000/chat/stream"
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        let config = Config::new(PathBuf::from("/tmp")).with_stream_endpoint("not a url");
        assert!(matches!(config.endpoint_url(), Err(CoreError::Config(_))));

        let config = Config::new(PathBuf::from("/tmp")).with_stream_endpoint("ftp://host/stream");
        assert!(matches!(config.endpoint_url(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_from_file_fills_defaults() {
        let dir = std::env::temp_dir().join(format!("chatline-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(
            &path,
            r#"{"stream_endpoint":"https://chat.example.com/stream","title_max_chars":10}"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.stream_endpoint, "https://chat.example.com/stream");
        assert_eq!(config.title_max_chars, 10);
        assert_eq!(config.storage_key, "chat_sessions_v1");

        std::fs::write(&path, "{broken").unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(CoreError::Serialization(_))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
