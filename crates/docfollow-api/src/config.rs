use config::{Config as ConfigLoader, ConfigError, Environment, File};
use docfollow_engine::{CalendarConfig, SchedulerConfig};
use docfollow_gateway::{MediaExtractorConfig, TwilioConfig};
use docfollow_llm::{ProviderConfig, ProviderType};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub mongodb: MongoDbConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub gateway: TwilioConfig,
    #[serde(default)]
    pub media: MediaExtractorConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,

    // Secrets (from ENV only)
    #[serde(default)]
    pub mongodb_uri: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub azure_openai: Option<AzureSecrets>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    pub origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoDbConfig {
    pub database: String,
    #[serde(default = "default_true")]
    pub ensure_indexes: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: ProviderType,
    /// Model name, or deployment name for Azure OpenAI
    pub model: String,
    pub temperature: f32,
    /// Bound on every drafting-agent call
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AzureSecrets {
    pub api_key: String,
    pub endpoint: String,
    pub api_version: String,
}

const DEFAULT_AZURE_API_VERSION: &str = "2024-02-15-preview";

/// Read a non-empty environment variable
fn env_secret(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// `{SECTION}__{KEY}` maps to `{section}.{key}`, e.g. `SCHEDULER__POLL_INTERVAL_MS`
fn section_env(prefix: &str) -> Environment {
    Environment::with_prefix(prefix)
        .prefix_separator("__")
        .separator("__")
        .keep_prefix(true)
        .try_parsing(true)
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. Environment variables (SERVER__, MONGODB__, LLM__, LOGGING__, SCHEDULER__, GATEWAY__)
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let mut builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false));
        for prefix in ["SERVER", "MONGODB", "LLM", "LOGGING", "SCHEDULER", "GATEWAY"] {
            builder = builder.add_source(section_env(prefix));
        }

        let mut cfg: Config = builder.build()?.try_deserialize()?;

        cfg.mongodb_uri = env_secret("MONGODB_URI").ok_or_else(|| {
            ConfigError::Message("MONGODB_URI environment variable is required".to_string())
        })?;
        cfg.apply_env_secrets();

        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        ConfigLoader::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()
    }

    /// Optional credentials. Missing LLM keys leave the drafting agent unavailable.
    fn apply_env_secrets(&mut self) {
        self.openai_api_key = env_secret("OPENAI_API_KEY");

        if let (Some(api_key), Some(endpoint)) = (
            env_secret("AZURE_OPENAI_API_KEY"),
            env_secret("AZURE_OPENAI_ENDPOINT"),
        ) {
            self.azure_openai = Some(AzureSecrets {
                api_key,
                endpoint,
                api_version: env_secret("AZURE_OPENAI_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
            });
        }
        if let Some(deployment) = env_secret("AZURE_OPENAI_DEPLOYMENT") {
            self.llm.model = deployment;
        }

        self.gateway.account_sid = env_secret("TWILIO_ACCOUNT_SID");
        self.gateway.auth_token = env_secret("TWILIO_AUTH_TOKEN");
        if let Some(number) = env_secret("TWILIO_WHATSAPP_NUMBER") {
            self.gateway.from_number = number;
        }

        self.calendar.access_token = env_secret("GOOGLE_CALENDAR_TOKEN");
    }

    /// Provider for the drafting agent, if its credentials are present
    pub fn llm_provider(&self) -> Option<ProviderConfig> {
        let provider = match (self.llm.provider, &self.azure_openai, &self.openai_api_key) {
            (ProviderType::AzureOpenAI, Some(azure), _) => ProviderConfig::azure_openai(
                azure.api_key.clone(),
                azure.endpoint.clone(),
                azure.api_version.clone(),
            ),
            (ProviderType::OpenAI, _, Some(key)) => ProviderConfig::openai(key.clone()),
            _ => return None,
        };
        Some(provider.with_timeout_secs(self.llm.timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [server]
        host = "127.0.0.1"
        port = 8000

        [cors]
        enabled = true
        origins = ["http://localhost:5173"]

        [mongodb]
        database = "docfollow_test"

        [llm]
        model = "gpt-4o-mini"
        temperature = 0.3

        [logging]
        level = "debug"
        format = "json"
    "#;

    #[test]
    fn test_config_structure() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.request_timeout_secs, 120);
        assert_eq!(config.mongodb.database, "docfollow_test");
        assert!(config.mongodb.ensure_indexes);
        assert_eq!(config.llm.provider, ProviderType::OpenAI);
        assert_eq!(config.llm.timeout_secs, 60);
    }

    #[test]
    fn test_sections_default_when_missing() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert!(config.scheduler.enabled);
        assert_eq!(config.scheduler.misfire_grace_secs, 300);
        assert_eq!(config.scheduler.cleanup_hour_utc, 2);
        assert!(config.gateway.credentials().is_none());
        assert!(config.gateway.from_number.contains("14155238886"));
        assert!(config.calendar.access_token.is_none());
        assert_eq!(config.calendar.calendar_id, "primary");
    }

    #[test]
    fn test_scheduler_overrides() {
        let toml = format!(
            "{}\n[scheduler]\npoll_interval_ms = 250\nmax_concurrent = 8\n",
            MINIMAL
        );
        let config: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config.scheduler.poll_interval_ms, 250);
        assert_eq!(config.scheduler.max_concurrent, 8);
        assert_eq!(config.scheduler.past_clamp_secs, 30);
    }

    #[test]
    fn test_no_credentials_means_no_provider() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert!(config.llm_provider().is_none());
    }

    #[test]
    fn test_provider_selection() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.openai_api_key = Some("sk-test".to_string());
        let provider = config.llm_provider().unwrap();
        assert_eq!(provider.provider_type(), ProviderType::OpenAI);
        assert_eq!(provider.timeout_secs, 60);

        config.llm.provider = ProviderType::AzureOpenAI;
        assert!(config.llm_provider().is_none());

        config.azure_openai = Some(AzureSecrets {
            api_key: "k".to_string(),
            endpoint: "https://clinic.openai.azure.com".to_string(),
            api_version: DEFAULT_AZURE_API_VERSION.to_string(),
        });
        assert_eq!(
            config.llm_provider().unwrap().provider_type(),
            ProviderType::AzureOpenAI
        );
    }

    #[test]
    fn test_from_file() {
        let dir = std::env::temp_dir().join(format!("docfollow-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.cors.origins, vec!["http://localhost:5173".to_string()]);
        assert_eq!(config.logging.format, "json");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
