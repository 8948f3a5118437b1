//! Configuration types.
//!
//! Everything is read from the process environment at startup. Parsing goes
//! through a lookup closure so tests never touch the real environment.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default Anthropic model for extraction.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default Airtable API root.
pub const DEFAULT_AIRTABLE_API_URL: &str = "https://api.airtable.com/v0";

const DEFAULT_AIRTABLE_BASE_ID: &str = "app8CI7NAZqhQ4G1Y";
const DEFAULT_AIRTABLE_TABLE: &str = "Projects";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_PROMPT_PATH: &str = "prompt.txt";

/// Airtable connection settings.
#[derive(Debug, Clone)]
pub struct RecordStoreConfig {
    /// Bearer token. `None` turns every store operation into a no-op.
    pub api_key: Option<SecretString>,
    pub api_url: String,
    pub base_id: String,
    pub table: String,
}

impl RecordStoreConfig {
    /// URL of the configured table, without trailing slash.
    pub fn table_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.api_url.trim_end_matches('/'),
            self.base_id,
            self.table
        )
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub anthropic_api_key: SecretString,
    pub model: String,
    pub record_store: RecordStoreConfig,
    pub port: u16,
    pub prompt_path: PathBuf,
    /// Directory for the rolling log file, if file logging is enabled.
    pub log_dir: Option<PathBuf>,
}

impl ServiceConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let anthropic_api_key = get("ANTHROPIC_API_KEY")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("ANTHROPIC_API_KEY".to_string()))?;

        let port = match get("PORT") {
            Some(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: "PORT".to_string(),
                message: format!("{raw:?} is not a valid port: {e}"),
            })?,
            None => DEFAULT_PORT,
        };

        let record_store = RecordStoreConfig {
            api_key: get("AIRTABLE_API_KEY").map(SecretString::from),
            api_url: get("AIRTABLE_API_URL")
                .unwrap_or_else(|| DEFAULT_AIRTABLE_API_URL.to_string()),
            base_id: get("AIRTABLE_BASE_ID")
                .unwrap_or_else(|| DEFAULT_AIRTABLE_BASE_ID.to_string()),
            table: get("AIRTABLE_PROJECTS_TABLE")
                .unwrap_or_else(|| DEFAULT_AIRTABLE_TABLE.to_string()),
        };

        Ok(Self {
            anthropic_api_key,
            model: get("DOT_UPDATE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            record_store,
            port,
            prompt_path: get("DOT_UPDATE_PROMPT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROMPT_PATH)),
            log_dir: get("DOT_UPDATE_LOG_DIR").map(PathBuf::from),
        })
    }
}

/// Read the extraction system prompt. Missing or blank files are errors.
pub fn load_system_prompt(path: &Path) -> Result<String, ConfigError> {
    let prompt = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;

    if prompt.trim().is_empty() {
        return Err(ConfigError::EmptyPrompt {
            path: path.display().to_string(),
        });
    }

    Ok(prompt)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_with_only_model_key() {
        let config =
            ServiceConfig::from_lookup(lookup_from(&[("ANTHROPIC_API_KEY", "sk-ant-test")]))
                .unwrap();

        assert_eq!(config.anthropic_api_key.expose_secret(), "sk-ant-test");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.port, 8080);
        assert_eq!(config.prompt_path, PathBuf::from("prompt.txt"));
        assert!(config.log_dir.is_none());
        assert!(config.record_store.api_key.is_none());
        assert_eq!(
            config.record_store.table_url(),
            "https://api.airtable.com/v0/app8CI7NAZqhQ4G1Y/Projects"
        );
    }

    #[test]
    fn missing_model_key_is_an_error() {
        let err = ServiceConfig::from_lookup(lookup_from(&[("PORT", "9000")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "ANTHROPIC_API_KEY"));
    }

    #[test]
    fn blank_model_key_counts_as_missing() {
        let err =
            ServiceConfig::from_lookup(lookup_from(&[("ANTHROPIC_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));
    }

    #[test]
    fn invalid_port_is_an_error() {
        let err = ServiceConfig::from_lookup(lookup_from(&[
            ("ANTHROPIC_API_KEY", "sk"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "PORT"));
    }

    #[test]
    fn overrides_are_applied() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("ANTHROPIC_API_KEY", "sk"),
            ("AIRTABLE_API_KEY", "pat123"),
            ("AIRTABLE_API_URL", "http://127.0.0.1:9999/v0/"),
            ("AIRTABLE_BASE_ID", "appTest"),
            ("AIRTABLE_PROJECTS_TABLE", "Jobs"),
            ("DOT_UPDATE_MODEL", "claude-3-5-haiku-latest"),
            ("PORT", "3000"),
            ("DOT_UPDATE_PROMPT_PATH", "/etc/dot/prompt.txt"),
            ("DOT_UPDATE_LOG_DIR", "/var/log/dot"),
        ]))
        .unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.model, "claude-3-5-haiku-latest");
        assert_eq!(
            config.record_store.api_key.as_ref().unwrap().expose_secret(),
            "pat123"
        );
        assert_eq!(
            config.record_store.table_url(),
            "http://127.0.0.1:9999/v0/appTest/Jobs"
        );
        assert_eq!(config.prompt_path, PathBuf::from("/etc/dot/prompt.txt"));
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/dot")));
    }

    #[test]
    fn load_prompt_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Extract the job status.").unwrap();

        let prompt = load_system_prompt(file.path()).unwrap();
        assert_eq!(prompt, "Extract the job status.");
    }

    #[test]
    fn load_prompt_rejects_blank_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "   ").unwrap();

        let err = load_system_prompt(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyPrompt { .. }));
    }

    #[test]
    fn load_prompt_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_system_prompt(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
