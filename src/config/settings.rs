//! Application settings and configuration
//!
//! Settings are read once at process start from environment variables (and a
//! `.env` file when present). API keys are held as [`SecretString`] and are
//! never serialized or logged.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::services::credential_pool::{collect_keys, split_keys, CredentialPool, SecretString};
use crate::services::gemini::{GEMINI_API_BASE, DEFAULT_GEMINI_MODEL};
use crate::services::image::{ImageBackend, HUGGINGFACE_API_BASE, POLLINATIONS_API_BASE};
use crate::services::product::DEFAULT_PAGE_TEXT_MAX_CHARS;
use crate::services::quota::DEFAULT_FREE_DAILY_LIMIT;
use crate::utils::backoff::BackoffPolicy;

/// Application environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    #[value(alias = "dev")]
    Development,
    #[value(alias = "stage")]
    Staging,
    #[value(alias = "prod")]
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::invalid(
                "ENVIRONMENT",
                format!("'{}', expected development, staging or production", s),
            )),
        }
    }
}

/// Gemini text generation settings
#[derive(Debug, Clone, Serialize)]
pub struct TextServiceConfig {
    #[serde(skip_serializing)]
    pub api_keys: Vec<SecretString>,
    /// Models tried in order for every key
    pub models: Vec<String>,
    pub base_url: String,
}

impl Default for TextServiceConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            models: vec![DEFAULT_GEMINI_MODEL.to_string()],
            base_url: GEMINI_API_BASE.to_string(),
        }
    }
}

/// Image generation settings
#[derive(Debug, Clone, Serialize)]
pub struct ImageServiceConfig {
    pub provider: ImageBackend,
    #[serde(skip_serializing)]
    pub api_keys: Vec<SecretString>,
    /// Models tried in order for every key; empty means the backend default
    pub models: Vec<String>,
    pub base_url: String,
    pub fetch_bytes: bool,
}

impl Default for ImageServiceConfig {
    fn default() -> Self {
        Self {
            provider: ImageBackend::HuggingFace,
            api_keys: Vec::new(),
            models: Vec::new(),
            base_url: HUGGINGFACE_API_BASE.to_string(),
            fetch_bytes: false,
        }
    }
}

/// Backoff applied after the whole pool failed
#[derive(Debug, Clone, Serialize)]
pub struct DispatchConfig {
    pub max_backoff_rounds: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_backoff_rounds: 2,
            initial_backoff_ms: 1000,
            max_backoff_ms: 20_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl DispatchConfig {
    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy::new()
            .with_max_backoff_rounds(self.max_backoff_rounds)
            .with_initial_delay(Duration::from_millis(self.initial_backoff_ms))
            .with_max_delay(Duration::from_millis(self.max_backoff_ms))
            .with_multiplier(self.backoff_multiplier)
    }
}

/// Free plan quota and Pro license keys
#[derive(Debug, Clone, Serialize)]
pub struct QuotaConfig {
    pub free_daily_limit: u32,
    #[serde(skip_serializing)]
    pub license_keys: Vec<SecretString>,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            free_daily_limit: DEFAULT_FREE_DAILY_LIMIT,
            license_keys: Vec::new(),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_window: u32,
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_window: 30,
            window_seconds: 60,
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    // App settings
    pub app_name: String,
    pub app_version: String,
    pub environment: Environment,
    pub log_level: String,

    // Server settings
    pub host: String,
    pub port: u16,

    // Upstream services
    pub gemini: TextServiceConfig,
    pub image: ImageServiceConfig,
    pub request_timeout_seconds: u64,
    pub dispatch: DispatchConfig,

    // Usage limits
    pub quota: QuotaConfig,
    pub rate_limit: RateLimitConfig,

    // Product analysis
    pub page_text_max_chars: usize,
}

impl Settings {
    /// Load settings from environment variables with defaults
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignored in production typically)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| -> String {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let provider: ImageBackend = get("IMAGE_PROVIDER", "huggingface").parse()?;
        let image_keys = match provider {
            ImageBackend::HuggingFace => {
                collect_keys(&lookup, "HUGGINGFACE_API_KEYS", "HUGGINGFACE_API_KEY")
            }
            ImageBackend::Pollinations => {
                collect_keys(&lookup, "POLLINATIONS_API_KEYS", "POLLINATIONS_API_KEY")
            }
        };
        let image_base_url = match provider {
            ImageBackend::HuggingFace => get("HUGGINGFACE_BASE_URL", HUGGINGFACE_API_BASE),
            ImageBackend::Pollinations => get("POLLINATIONS_BASE_URL", POLLINATIONS_API_BASE),
        };

        let settings = Self {
            // App settings
            app_name: get("APP_NAME", "creator-hub"),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: get("ENVIRONMENT", "development").parse()?,
            log_level: get("LOG_LEVEL", "info"),

            // Server settings
            host: get("HOST", "0.0.0.0"),
            port: parse_value("PORT", &get("PORT", "8000"))?,

            gemini: TextServiceConfig {
                api_keys: secrets(collect_keys(&lookup, "GEMINI_API_KEYS", "GEMINI_API_KEY")),
                models: split_keys(&get("GEMINI_MODELS", DEFAULT_GEMINI_MODEL)),
                base_url: get("GEMINI_BASE_URL", GEMINI_API_BASE),
            },

            image: ImageServiceConfig {
                provider,
                api_keys: secrets(image_keys),
                models: split_keys(&get("IMAGE_MODELS", "")),
                base_url: image_base_url,
                fetch_bytes: parse_value("IMAGE_FETCH_BYTES", &get("IMAGE_FETCH_BYTES", "false"))?,
            },

            request_timeout_seconds: parse_value(
                "REQUEST_TIMEOUT_SECONDS",
                &get("REQUEST_TIMEOUT_SECONDS", "120"),
            )?,

            dispatch: DispatchConfig {
                max_backoff_rounds: parse_value(
                    "DISPATCH_MAX_BACKOFF_ROUNDS",
                    &get("DISPATCH_MAX_BACKOFF_ROUNDS", "2"),
                )?,
                initial_backoff_ms: parse_value(
                    "DISPATCH_INITIAL_BACKOFF_MS",
                    &get("DISPATCH_INITIAL_BACKOFF_MS", "1000"),
                )?,
                max_backoff_ms: parse_value(
                    "DISPATCH_MAX_BACKOFF_MS",
                    &get("DISPATCH_MAX_BACKOFF_MS", "20000"),
                )?,
                backoff_multiplier: parse_value(
                    "DISPATCH_BACKOFF_MULTIPLIER",
                    &get("DISPATCH_BACKOFF_MULTIPLIER", "2.0"),
                )?,
            },

            quota: QuotaConfig {
                free_daily_limit: parse_value("FREE_DAILY_LIMIT", &get("FREE_DAILY_LIMIT", "5"))?,
                license_keys: secrets(split_keys(&get("LICENSE_KEYS", ""))),
            },

            rate_limit: RateLimitConfig {
                enabled: parse_value("RATE_LIMIT_ENABLED", &get("RATE_LIMIT_ENABLED", "true"))?,
                requests_per_window: parse_value(
                    "RATE_LIMIT_REQUESTS_PER_WINDOW",
                    &get("RATE_LIMIT_REQUESTS_PER_WINDOW", "30"),
                )?,
                window_seconds: parse_value(
                    "RATE_LIMIT_WINDOW_SECONDS",
                    &get("RATE_LIMIT_WINDOW_SECONDS", "60"),
                )?,
            },

            page_text_max_chars: parse_value(
                "PAGE_TEXT_MAX_CHARS",
                &get("PAGE_TEXT_MAX_CHARS", &DEFAULT_PAGE_TEXT_MAX_CHARS.to_string()),
            )?,
        };

        settings.validate()?;

        Ok(settings)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::invalid("PORT", "port cannot be 0"));
        }

        if self.request_timeout_seconds == 0 {
            return Err(ConfigError::invalid(
                "REQUEST_TIMEOUT_SECONDS",
                "timeout must be > 0",
            ));
        }

        if self.gemini.models.is_empty() {
            return Err(ConfigError::invalid(
                "GEMINI_MODELS",
                "at least one model is required",
            ));
        }

        if self.dispatch.backoff_multiplier < 1.0 || !self.dispatch.backoff_multiplier.is_finite() {
            return Err(ConfigError::invalid(
                "DISPATCH_BACKOFF_MULTIPLIER",
                "multiplier must be a finite number >= 1.0",
            ));
        }

        if self.dispatch.initial_backoff_ms > self.dispatch.max_backoff_ms {
            return Err(ConfigError::invalid(
                "DISPATCH_INITIAL_BACKOFF_MS",
                "initial backoff cannot exceed DISPATCH_MAX_BACKOFF_MS",
            ));
        }

        if self.rate_limit.enabled {
            if self.rate_limit.requests_per_window == 0 {
                return Err(ConfigError::invalid(
                    "RATE_LIMIT_REQUESTS_PER_WINDOW",
                    "must be > 0",
                ));
            }
            if self.rate_limit.window_seconds == 0 {
                return Err(ConfigError::invalid("RATE_LIMIT_WINDOW_SECONDS", "must be > 0"));
            }
        }

        if self.is_production() && self.quota.license_keys.is_empty() {
            tracing::warn!("Running in production without license keys; every client is on the free plan");
        }

        Ok(())
    }

    /// Pool of Gemini keys; an empty pool stops startup
    pub fn text_pool(&self) -> Result<CredentialPool, ConfigError> {
        CredentialPool::load("gemini", self.gemini.api_keys.iter().cloned())
    }

    /// Pool for the image backend
    ///
    /// Keyless backends fall back to an anonymous pool. A keyed backend
    /// without keys yields `None` and image generation is disabled.
    pub fn image_pool(&self) -> Option<CredentialPool> {
        let service = self.image.provider.as_str();
        match CredentialPool::load(service, self.image.api_keys.iter().cloned()) {
            Ok(pool) => Some(pool),
            Err(_) if self.image.provider.is_keyless() => Some(CredentialPool::anonymous(service)),
            Err(_) => None,
        }
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Get the server address string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "creator-hub".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: Environment::Development,
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            gemini: TextServiceConfig::default(),
            image: ImageServiceConfig::default(),
            request_timeout_seconds: 120,
            dispatch: DispatchConfig::default(),
            quota: QuotaConfig::default(),
            rate_limit: RateLimitConfig::default(),
            page_text_max_chars: DEFAULT_PAGE_TEXT_MAX_CHARS,
        }
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.parse()
        .map_err(|_| ConfigError::invalid(key, format!("cannot parse '{}'", raw)))
}

fn secrets(keys: Vec<String>) -> Vec<SecretString> {
    keys.into_iter().map(SecretString::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.app_name, "creator-hub");
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.dispatch.max_backoff_rounds, 2);
        assert_eq!(settings.quota.free_daily_limit, 5);
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("development".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("production".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert!("moon".parse::<Environment>().is_err());
    }

    #[test]
    fn test_from_lookup_reads_keys_and_models() {
        let settings = Settings::from_lookup(lookup(&[
            ("GEMINI_API_KEYS", "AIzaA, AIzaB"),
            ("GEMINI_API_KEY", "AIzaC"),
            ("GEMINI_MODELS", "gemini-flash-latest,gemini-2.0-flash"),
            ("PORT", "9000"),
        ]))
        .unwrap();

        assert_eq!(settings.port, 9000);
        assert_eq!(settings.gemini.api_keys.len(), 3);
        assert_eq!(
            settings.gemini.models,
            vec!["gemini-flash-latest", "gemini-2.0-flash"]
        );
        assert_eq!(settings.text_pool().unwrap().len(), 3);
    }

    #[test]
    fn test_missing_text_keys_is_empty_pool() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert!(matches!(
            settings.text_pool(),
            Err(ConfigError::EmptyPool { .. })
        ));
    }

    #[test]
    fn test_malformed_number_is_rejected() {
        let err = Settings::from_lookup(lookup(&[("DISPATCH_MAX_BACKOFF_ROUNDS", "two")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "DISPATCH_MAX_BACKOFF_ROUNDS"));
    }

    #[test]
    fn test_image_pool_selection() {
        let hf_without_keys = Settings::from_lookup(lookup(&[])).unwrap();
        assert!(hf_without_keys.image_pool().is_none());

        let pollinations =
            Settings::from_lookup(lookup(&[("IMAGE_PROVIDER", "pollinations")])).unwrap();
        let pool = pollinations.image_pool().unwrap();
        assert!(pool.last().is_anonymous());
        assert_eq!(pollinations.image.base_url, POLLINATIONS_API_BASE);
    }

    #[test]
    fn test_serialized_settings_hide_keys() {
        let settings = Settings::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "AIzaSuperSecret"),
            ("LICENSE_KEYS", "PRO-SECRET"),
        ]))
        .unwrap();
        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("SuperSecret"));
        assert!(!json.contains("PRO-SECRET"));
        assert!(!format!("{:?}", settings).contains("SuperSecret"));
    }

    #[test]
    fn test_dispatch_policy() {
        let policy = DispatchConfig::default().policy();
        assert_eq!(policy.max_backoff_rounds, 2);
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
    }

    #[test]
    fn test_server_addr() {
        let settings = Settings::default();
        assert_eq!(settings.server_addr(), "0.0.0.0:8000");
    }
}
