use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://letscountapi.com";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid base URL {0}")]
    InvalidBaseUrl(String),
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),
}

/// Namespace and the keys used under it, in the order they should be listed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub namespace: String,
    #[serde(default)]
    pub keys: Vec<String>,
}

/// Stored configuration at `~/.tally/config.json`.
///
/// `history` only seeds the in-memory directory at startup; it is never
/// written back from a running session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryEntry>,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            history: Vec::new(),
        }
    }
}

/// `~/.tally`, or `./.tally` when no home directory is known.
pub fn tally_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tally")
}

impl TallyConfig {
    pub fn config_path() -> PathBuf {
        tally_dir().join("config.json")
    }

    /// Load from ~/.tally/config.json.
    pub fn load() -> Option<Self> {
        Self::load_from(&Self::config_path()).ok()
    }

    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Save to ~/.tally/config.json (mode 0o600)
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, &data)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let c: TallyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(c, TallyConfig::default());
        assert_eq!(c.base_url, DEFAULT_BASE_URL);
        assert_eq!(c.request_timeout_secs, 20);
        assert!(c.history.is_empty());
    }

    #[test]
    fn history_parses_in_order() {
        let c: TallyConfig = serde_json::from_str(
            r#"{"history":[{"namespace":"INFO6350","keys":["dan.magnusson","dan"]},{"namespace":"INFO6250","keys":["daniel"]}]}"#,
        )
        .unwrap();
        assert_eq!(c.history.len(), 2);
        assert_eq!(c.history[0].namespace, "INFO6350");
        assert_eq!(c.history[0].keys, vec!["dan.magnusson", "dan"]);
        assert_eq!(c.history[1].keys, vec!["daniel"]);
    }

    #[test]
    fn save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = TallyConfig {
            base_url: "http://localhost:9000".into(),
            request_timeout_secs: 3,
            history: vec![HistoryEntry {
                namespace: "ns".into(),
                keys: vec!["k".into()],
            }],
        };
        config.save_to(&path).unwrap();
        assert_eq!(TallyConfig::load_from(&path).unwrap(), config);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn load_from_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TallyConfig::load_from(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn load_from_garbage_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            TallyConfig::load_from(&path),
            Err(ConfigError::Json(_))
        ));
    }
}
