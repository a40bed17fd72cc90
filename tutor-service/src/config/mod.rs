use crate::models::GroundingDataSource;
use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Azure OpenAI REST API version that supports `data_sources` grounding.
pub const DEFAULT_API_VERSION: &str = "2024-02-01";

const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 60;
const DEFAULT_PROVIDER_MAX_RETRIES: u32 = 2;
const DEFAULT_PROVIDER_INITIAL_BACKOFF_MS: u64 = 500;

pub const CHAT_ENDPOINT_VAR: &str = "AZURE_OPENAI_ENDPOINT";
pub const CHAT_API_KEY_VAR: &str = "AZURE_OPENAI_API_KEY";
pub const CHAT_DEPLOYMENT_VAR: &str = "AZURE_OPENAI_DEPLOYMENT";
pub const SEARCH_ENDPOINT_VAR: &str = "AZURE_SEARCH_ENDPOINT";
pub const SEARCH_API_KEY_VAR: &str = "AZURE_SEARCH_API_KEY";
pub const SEARCH_INDEX_VAR: &str = "AZURE_SEARCH_INDEX";

/// The six values without which no grounded request can be built.
pub const REQUIRED_VARS: [&str; 6] = [
    CHAT_ENDPOINT_VAR,
    CHAT_API_KEY_VAR,
    CHAT_DEPLOYMENT_VAR,
    SEARCH_ENDPOINT_VAR,
    SEARCH_API_KEY_VAR,
    SEARCH_INDEX_VAR,
];

#[derive(Debug, Clone)]
pub struct TutorConfig {
    pub common: core_config::Config,
    pub chat: ChatConfig,
    pub search: SearchConfig,
    pub provider: ProviderSettings,
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Resource endpoint without trailing slash, e.g. `https://x.openai.azure.com`.
    pub endpoint: String,
    pub api_key: Secret<String>,
    /// Deployment that serves chat completions.
    pub deployment: String,
    pub api_version: String,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub endpoint: String,
    pub api_key: Secret<String>,
    pub index_name: String,
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Upper bound for a single provider call.
    pub timeout: Duration,
    /// Retries after the first attempt, transient failures only.
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl TutorConfig {
    /// Load from `APP__*` (common block) and the process environment.
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Every missing required key is reported in a single error.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let missing: Vec<&str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|key| non_empty(&lookup, key).is_none())
            .collect();

        if !missing.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "{} required but not set",
                missing.join(", ")
            )));
        }

        let required = |key: &str| -> Result<String, AppError> {
            non_empty(&lookup, key).ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!("{} is required but not set", key))
            })
        };

        Ok(TutorConfig {
            common,
            chat: ChatConfig {
                endpoint: trim_endpoint(required(CHAT_ENDPOINT_VAR)?),
                api_key: Secret::new(required(CHAT_API_KEY_VAR)?),
                deployment: required(CHAT_DEPLOYMENT_VAR)?,
                api_version: non_empty(&lookup, "AZURE_OPENAI_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            },
            search: SearchConfig {
                endpoint: trim_endpoint(required(SEARCH_ENDPOINT_VAR)?),
                api_key: Secret::new(required(SEARCH_API_KEY_VAR)?),
                index_name: required(SEARCH_INDEX_VAR)?,
            },
            provider: ProviderSettings {
                timeout: Duration::from_secs(parse_or(
                    &lookup,
                    "TUTOR_PROVIDER_TIMEOUT_SECS",
                    DEFAULT_PROVIDER_TIMEOUT_SECS,
                )?),
                max_retries: parse_or(
                    &lookup,
                    "TUTOR_PROVIDER_MAX_RETRIES",
                    DEFAULT_PROVIDER_MAX_RETRIES,
                )?,
                initial_backoff: Duration::from_millis(parse_or(
                    &lookup,
                    "TUTOR_PROVIDER_INITIAL_BACKOFF_MS",
                    DEFAULT_PROVIDER_INITIAL_BACKOFF_MS,
                )?),
            },
        })
    }

    /// The search index every chat request is grounded on.
    pub fn grounding(&self) -> GroundingDataSource {
        GroundingDataSource {
            search_endpoint: self.search.endpoint.clone(),
            api_key: self.search.api_key.clone(),
            index_name: self.search.index_name.clone(),
        }
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(lookup, key) {
        Some(raw) => raw.parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
        }),
        None => Ok(default),
    }
}

fn trim_endpoint(endpoint: String) -> String {
    endpoint.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            (CHAT_ENDPOINT_VAR, "https://tutor.openai.azure.com/"),
            (CHAT_API_KEY_VAR, "chat-key"),
            (CHAT_DEPLOYMENT_VAR, "gpt-35-turbo-16k"),
            (SEARCH_ENDPOINT_VAR, "https://tutor.search.windows.net"),
            (SEARCH_API_KEY_VAR, "search-key"),
            (SEARCH_INDEX_VAR, "itsospec-index"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<TutorConfig, AppError> {
        TutorConfig::from_lookup(core_config::Config { port: 0 }, |key| {
            vars.get(key).map(|v| v.to_string())
        })
    }

    #[test]
    fn loads_required_values_and_defaults() {
        let config = load(&full_env()).unwrap();

        assert_eq!(config.chat.endpoint, "https://tutor.openai.azure.com");
        assert_eq!(config.chat.api_key.expose_secret(), "chat-key");
        assert_eq!(config.chat.deployment, "gpt-35-turbo-16k");
        assert_eq!(config.chat.api_version, DEFAULT_API_VERSION);
        assert_eq!(config.search.index_name, "itsospec-index");
        assert_eq!(config.provider.timeout, Duration::from_secs(60));
        assert_eq!(config.provider.max_retries, 2);
        assert_eq!(config.provider.initial_backoff, Duration::from_millis(500));
    }

    #[test]
    fn each_required_value_is_fatal_when_missing() {
        for key in REQUIRED_VARS {
            let mut vars = full_env();
            vars.remove(key);

            match load(&vars) {
                Err(AppError::ConfigError(err)) => assert!(err.to_string().contains(key)),
                other => panic!("expected ConfigError for {}, got {:?}", key, other.map(|_| ())),
            }
        }
    }

    #[test]
    fn blank_values_count_as_missing() {
        let mut vars = full_env();
        vars.insert(SEARCH_API_KEY_VAR, "   ");
        vars.insert(CHAT_DEPLOYMENT_VAR, "");

        let err = load(&vars).unwrap_err().to_string();
        assert!(err.contains(SEARCH_API_KEY_VAR));
        assert!(err.contains(CHAT_DEPLOYMENT_VAR));
    }

    #[test]
    fn invalid_optional_value_is_rejected() {
        let mut vars = full_env();
        vars.insert("TUTOR_PROVIDER_MAX_RETRIES", "lots");

        assert!(matches!(load(&vars), Err(AppError::ConfigError(_))));
    }

    #[test]
    fn grounding_is_built_from_search_settings() {
        let grounding = load(&full_env()).unwrap().grounding();

        assert_eq!(grounding.search_endpoint, "https://tutor.search.windows.net");
        assert_eq!(grounding.api_key.expose_secret(), "search-key");
        assert_eq!(grounding.index_name, "itsospec-index");
    }

    #[test]
    fn debug_output_redacts_keys() {
        let rendered = format!("{:?}", load(&full_env()).unwrap());
        assert!(!rendered.contains("chat-key"));
        assert!(!rendered.contains("search-key"));
    }
}
