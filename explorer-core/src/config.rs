use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExplorerConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DataConfig {
    /// Explicit CSV export to load. When unset the server scans `search_dir`.
    pub csv_path: Option<String>,
    pub search_dir: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            csv_path: None,
            search_dir: ".".to_string(),
        }
    }
}

/// Gemini settings as they appear in `explorer.toml`. The API key is never
/// read from the file; it comes from `GOOGLE_API_KEY`.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmSettings {
    pub model: String,
    pub base_url: String,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            max_retries: 3,
            retry_delay_ms: 1000,
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnalysisConfig {
    pub batch_size: usize,
    pub top_n: usize,
    pub message_char_limit: usize,
    pub wri_search_threshold: u8,
    pub evidence_score_boost: u8,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            top_n: 10,
            message_char_limit: 2000,
            wri_search_threshold: 50,
            evidence_score_boost: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5001,
        }
    }
}

impl ExplorerConfig {
    /// Load `path` (optional) and apply `EXPLORER__SECTION__KEY` overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("EXPLORER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = ExplorerConfig::load("does-not-exist-explorer.toml").unwrap();
        assert_eq!(config.http.port, 5001);
        assert_eq!(config.analysis.batch_size, 5);
        assert_eq!(config.analysis.top_n, 10);
        assert_eq!(config.llm.model, "gemini-2.0-flash");
        assert!(config.data.csv_path.is_none());
    }

    #[test]
    fn test_partial_file_keeps_section_defaults() {
        let dir = std::env::temp_dir().join(format!("explorer-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("explorer.toml");
        std::fs::write(&path, "[http]\nhost = \"0.0.0.0\"\nport = 8080\n").unwrap();

        let config = ExplorerConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.http.host, "0.0.0.0");
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.analysis.message_char_limit, 2000);

        std::fs::remove_dir_all(&dir).ok();
    }
}
