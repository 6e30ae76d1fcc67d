use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{LLMConfig, LLMProvider};
use crate::infrastructure::security::keyring::KeyringManager;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use validator::Validate;

pub const DEFAULT_CONFIG_FILE: &str = "cloudcost.toml";
const ENV_PREFIX: &str = "CLOUDCOST_";
const KEYRING_SERVICE: &str = "cloudcost-sql";

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct ServerConfig {
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    /// Address a local client uses to reach this server. Wildcard binds map to loopback.
    pub fn client_url(&self) -> String {
        let host = match self.host.as_str() {
            "0.0.0.0" | "" => "127.0.0.1",
            "::" => "[::1]",
            other => other,
        };
        format!("http://{}:{}", host, self.port)
    }
}

/// Optional statement guard in front of the executor.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GuardConfig {
    pub enabled: bool,
    pub deny_statements: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            deny_statements: [
                "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "REPLACE", "ATTACH",
                "DETACH", "PRAGMA", "VACUUM",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct ProfilerConfig {
    pub model: String,
    #[validate(range(min = 1))]
    pub sample_size: u32,
    pub request_delay_ms: u64,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            sample_size: 5,
            request_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub metadata_path: PathBuf,
    #[validate(length(min = 1, message = "include_tables must name at least one table"))]
    pub include_tables: Vec<String>,
    pub sample_rows_in_table_info: u32,
    #[validate(nested)]
    pub server: ServerConfig,
    pub llm: LLMConfig,
    pub guard: GuardConfig,
    #[validate(nested)]
    pub profiler: ProfilerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("cloud_costs.db"),
            metadata_path: PathBuf::from("semantic_metadata.json"),
            include_tables: vec!["aws_cost_usage".to_string(), "azure_cost_usage".to_string()],
            sample_rows_in_table_info: 2,
            server: ServerConfig::default(),
            llm: LLMConfig::default(),
            guard: GuardConfig::default(),
            profiler: ProfilerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Defaults, then the TOML file (if present), then `CLOUDCOST_*` variables.
    pub fn figment(path: Option<&Path>) -> Figment {
        let file = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(AppError::Config(format!(
                    "Config file '{}' not found",
                    path.display()
                )));
            }
        }

        let config: AppConfig = Self::figment(path)
            .extract()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        debug!(
            database = %config.database_path.display(),
            provider = ?config.llm.provider,
            model = %config.llm.model,
            "Configuration loaded"
        );
        Ok(config)
    }
}

pub struct ConfigService {
    keyring: KeyringManager,
}

impl ConfigService {
    pub fn new() -> Self {
        Self {
            keyring: KeyringManager::new(KEYRING_SERVICE),
        }
    }

    pub fn save_api_key(&self, provider: LLMProvider, key: &str) -> Result<()> {
        self.keyring.set_secret(provider.keyring_key(), key)
    }

    pub fn get_api_key(&self, provider: LLMProvider) -> Result<String> {
        self.keyring.get_secret(provider.keyring_key())
    }

    pub fn delete_api_key(&self, provider: LLMProvider) -> Result<()> {
        self.keyring.delete_secret(provider.keyring_key())
    }

    /// Fills `api_key` from the provider's environment variable, then the OS keyring.
    /// An explicitly configured key always wins; a local provider needs none.
    pub fn resolve_api_key(&self, llm: &mut LLMConfig) {
        if llm.api_key.as_deref().is_some_and(|k| !k.trim().is_empty()) {
            return;
        }

        if let Some(var) = llm.provider.api_key_env() {
            if let Ok(key) = std::env::var(var) {
                if !key.trim().is_empty() {
                    llm.api_key = Some(key);
                    return;
                }
            }
        }

        if llm.provider == LLMProvider::Local {
            return;
        }

        match self.get_api_key(llm.provider) {
            Ok(key) => llm.api_key = Some(key),
            Err(e) => debug!(error = %e, provider = ?llm.provider, "No API key in keyring"),
        }
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        Jail::expect_with(|_jail| {
            let config = AppConfig::load(None).unwrap();
            assert_eq!(config.database_path, PathBuf::from("cloud_costs.db"));
            assert_eq!(config.include_tables, vec!["aws_cost_usage", "azure_cost_usage"]);
            assert_eq!(config.sample_rows_in_table_info, 2);
            assert_eq!(config.server.port, 8000);
            assert_eq!(config.llm.provider, LLMProvider::OpenAI);
            assert!(!config.guard.enabled);
            assert_eq!(config.profiler.model, "gpt-4o-mini");
            Ok(())
        });
    }

    #[test]
    fn test_client_url_follows_server_config() {
        Jail::expect_with(|jail| {
            assert_eq!(AppConfig::load(None).unwrap().server.client_url(), "http://127.0.0.1:8000");

            jail.set_env("CLOUDCOST_SERVER__HOST", "10.0.0.5");
            jail.set_env("CLOUDCOST_SERVER__PORT", "9100");
            let config = AppConfig::load(None).unwrap();
            assert_eq!(config.server.client_url(), "http://10.0.0.5:9100");
            Ok(())
        });
    }

    #[test]
    fn test_toml_then_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                r#"
                database_path = "data/costs.db"
                include_tables = ["aws_cost_usage"]

                [llm]
                provider = "Gemini"
                base_url = "https://generativelanguage.googleapis.com/v1beta"
                model = "gemini-1.5-flash"

                [guard]
                enabled = true
                "#,
            )?;
            jail.set_env("CLOUDCOST_LLM__MODEL", "gemini-2.0-flash");
            jail.set_env("CLOUDCOST_SERVER__PORT", "9000");

            let config = AppConfig::load(None).unwrap();
            assert_eq!(config.database_path, PathBuf::from("data/costs.db"));
            assert_eq!(config.include_tables, vec!["aws_cost_usage"]);
            assert_eq!(config.llm.provider, LLMProvider::Gemini);
            assert_eq!(config.llm.model, "gemini-2.0-flash");
            assert_eq!(config.server.port, 9000);
            assert!(config.guard.enabled);
            assert!(config.guard.deny_statements.contains(&"DROP".to_string()));
            Ok(())
        });
    }

    #[test]
    fn test_empty_table_list_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "include_tables = []")?;
            let err = AppConfig::load(Some(Path::new("custom.toml"))).unwrap_err();
            assert!(matches!(err, AppError::Config(ref m) if m.contains("include_tables")));
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        Jail::expect_with(|_jail| {
            let err = AppConfig::load(Some(Path::new("nope.toml"))).unwrap_err();
            assert!(matches!(err, AppError::Config(_)));
            Ok(())
        });
    }

    #[test]
    fn test_configured_api_key_wins() {
        let mut llm = LLMConfig {
            api_key: Some("sk-configured".to_string()),
            ..LLMConfig::default()
        };
        ConfigService::new().resolve_api_key(&mut llm);
        assert_eq!(llm.api_key.as_deref(), Some("sk-configured"));
    }

    #[test]
    fn test_api_key_from_provider_env() {
        Jail::expect_with(|jail| {
            jail.set_env("GEMINI_API_KEY", "gm-from-env");
            let mut llm = LLMConfig {
                provider: LLMProvider::Gemini,
                ..LLMConfig::default()
            };
            ConfigService::new().resolve_api_key(&mut llm);
            assert_eq!(llm.api_key.as_deref(), Some("gm-from-env"));
            Ok(())
        });
    }
}
