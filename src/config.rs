//! Configuration parsing and validation for chim.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;

/// Default endpoint of the chim completion proxy.
pub const DEFAULT_BASE_URL: &str = "https://chimeragpt.adventblocks.cc/v1";

/// Environment variable consulted when no `api_key` is configured.
pub const API_KEY_ENV_VAR: &str = "CHIM_KEY";

/// Root configuration structure.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub logging: LoggingConfig,
}

/// Connection settings for the chim provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the OpenAI-compatible API (e.g., "https://chimeragpt.adventblocks.cc/v1")
    pub base_url: String,
    /// Bearer token sent with every request
    pub api_key: Option<ApiKey>,
    /// Optional outbound proxy URL used for all provider traffic
    pub proxy: Option<String>,
    /// TCP connect timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            proxy: None,
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    /// Full URL of the chat completions endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// API key wrapper that redacts in Debug/Display/Serialize and zeroizes on drop.
///
/// Only accessible via `.expose_secret()`.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Access the raw key value.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Serialize for ApiKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> serde::Deserialize<'de> for ApiKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|s| ApiKey(SecretString::from(s)))
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        ApiKey(SecretString::from(s))
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        ApiKey(SecretString::from(s))
    }
}

/// How the provider's API key was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySource {
    /// Key was a literal string in config (no ${} references)
    Literal,
    /// Key contained ${VAR} references expanded from environment
    EnvExpanded,
    /// Key was read from the convention env var (holds var name)
    Convention(String),
    /// No key available
    None,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Literal => write!(f, "config-literal"),
            KeySource::EnvExpanded => write!(f, "env-expanded"),
            KeySource::Convention(var) => write!(f, "convention ({})", var),
            KeySource::None => write!(f, "none"),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable '{var}' not usable: {message}")]
    EnvVar { var: String, message: String },
}

/// Raw provider section deserialized directly from TOML.
/// `api_key` may still contain `${VAR}` references.
#[derive(Debug, Deserialize)]
pub struct RawProviderConfig {
    #[serde(default = "default_base_url")]
    base_url: String,
    api_key: Option<String>,
    proxy: Option<String>,
    #[serde(default = "default_connect_timeout_secs")]
    connect_timeout_secs: u64,
}

impl Default for RawProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            proxy: None,
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Raw configuration deserialized directly from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    provider: RawProviderConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

/// Expand all `${VAR}` references in a string using a custom lookup function.
///
/// Supports multiple `${VAR}` in one string (e.g., `${SCHEME}://${HOST}/v1`).
/// Fails on first missing variable, unclosed `${`, or empty variable name.
fn expand_env_vars_with<F>(input: &str, lookup: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if !input.contains("${") {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let end = after.find('}').ok_or_else(|| ConfigError::EnvVar {
            var: "<unclosed>".to_string(),
            message: format!("Unclosed '${{' in config value: {}", input),
        })?;

        let var_name = &after[..end];
        if var_name.is_empty() {
            return Err(ConfigError::EnvVar {
                var: "".to_string(),
                message: "Empty variable name in '${}' reference".to_string(),
            });
        }

        let value = lookup(var_name).ok_or_else(|| ConfigError::EnvVar {
            var: var_name.to_string(),
            message: format!("Environment variable '{}' is not set", var_name),
        })?;

        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

impl Config {
    /// Load configuration from a TOML file, expanding `${VAR}` references
    /// from the process environment.
    pub fn from_file(path: impl AsRef<Path>) -> Result<(Self, KeySource), ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::parse_str(&content)
    }

    /// Parse configuration from a TOML string, expanding `${VAR}` references
    /// from the process environment.
    pub fn parse_str(content: &str) -> Result<(Self, KeySource), ConfigError> {
        let raw: RawConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
        Self::from_raw(raw)
    }

    /// Configuration with defaults only; the key comes from `CHIM_KEY` if set.
    pub fn from_env() -> Result<(Self, KeySource), ConfigError> {
        Self::from_raw(RawConfig::default())
    }

    /// Convert raw config to final config using the process environment.
    pub fn from_raw(raw: RawConfig) -> Result<(Self, KeySource), ConfigError> {
        Self::from_raw_with(raw, process_env)
    }

    /// Convert raw config to final config with a custom variable lookup.
    ///
    /// - `api_key` containing `${VAR}`: expanded, source = `EnvExpanded`
    /// - literal `api_key`: wrapped directly, source = `Literal`
    /// - absent `api_key`: `CHIM_KEY` lookup, source = `Convention` or `None`
    pub fn from_raw_with<F>(raw: RawConfig, lookup: F) -> Result<(Self, KeySource), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let rp = raw.provider;

        let (api_key, source) = match rp.api_key {
            Some(ref raw_key) if raw_key.contains("${") => {
                let expanded = expand_env_vars_with(raw_key, &lookup)?;
                (Some(ApiKey::from(expanded)), KeySource::EnvExpanded)
            }
            Some(ref raw_key) => (Some(ApiKey::from(raw_key.as_str())), KeySource::Literal),
            None => match lookup(API_KEY_ENV_VAR) {
                Some(value) => (
                    Some(ApiKey::from(value)),
                    KeySource::Convention(API_KEY_ENV_VAR.to_string()),
                ),
                None => (None, KeySource::None),
            },
        };

        let base_url = expand_env_vars_with(&rp.base_url, &lookup)?;

        let config = Config {
            provider: ProviderConfig {
                base_url,
                api_key,
                proxy: rp.proxy,
                connect_timeout_secs: rp.connect_timeout_secs,
            },
            logging: raw.logging,
        };
        config.validate()?;

        Ok((config, source))
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let base_url = &self.provider.base_url;
        if base_url.is_empty() {
            return Err(ConfigError::Validation(
                "provider.base_url must not be empty".to_string(),
            ));
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "provider.base_url '{}' must start with http:// or https://",
                base_url
            )));
        }

        if let Some(proxy) = &self.provider.proxy {
            if proxy.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "provider.proxy must not be empty when set".to_string(),
                ));
            }
            if let Err(e) = reqwest::Proxy::all(proxy.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "provider.proxy '{}' is invalid: {}",
                    proxy, e
                )));
            }
        }

        if self.provider.api_key.is_none() {
            tracing::warn!(
                var = API_KEY_ENV_VAR,
                "No API key configured - requests will be sent without Authorization"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn parse_with<F>(toml: &str, lookup: F) -> Result<(Config, KeySource), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw: RawConfig = toml::from_str(toml).unwrap();
        Config::from_raw_with(raw, lookup)
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let (config, source) = parse_with("", no_env).unwrap();
        assert_eq!(config.provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.provider.connect_timeout_secs, 10);
        assert!(config.provider.proxy.is_none());
        assert!(config.provider.api_key.is_none());
        assert_eq!(config.logging.level, "info");
        assert_eq!(source, KeySource::None);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [provider]
            base_url = "https://example.com/v1"
            api_key = "sk-literal"
            proxy = "http://127.0.0.1:7890"
            connect_timeout_secs = 3

            [logging]
            level = "debug"
        "#;

        let (config, source) = parse_with(toml, no_env).unwrap();
        assert_eq!(config.provider.base_url, "https://example.com/v1");
        assert_eq!(
            config.provider.api_key.as_ref().unwrap().expose_secret(),
            "sk-literal"
        );
        assert_eq!(config.provider.proxy.as_deref(), Some("http://127.0.0.1:7890"));
        assert_eq!(config.provider.connect_timeout_secs, 3);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(source, KeySource::Literal);
    }

    #[test]
    fn test_completions_url_trims_trailing_slash() {
        let config = ProviderConfig {
            base_url: "https://example.com/v1/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.completions_url(),
            "https://example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let toml = r#"
            [provider]
            base_url = "example.com/v1"
        "#;
        let err = parse_with(toml, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_empty_proxy_rejected() {
        let toml = r#"
            [provider]
            proxy = "  "
        "#;
        let err = parse_with(toml, no_env).unwrap_err();
        assert!(err.to_string().contains("proxy"));
    }

    #[test]
    fn test_malformed_proxy_rejected() {
        let toml = r#"
            [provider]
            proxy = "http://[::1"
        "#;
        let err = parse_with(toml, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("provider.proxy"), "{}", err);
    }

    #[test]
    fn test_api_key_debug_redaction() {
        let key = ApiKey::from("super-secret-token");
        let debug_output = format!("{:?}", key);
        assert_eq!(debug_output, "[REDACTED]");
    }

    #[test]
    fn test_api_key_display_redaction() {
        let key = ApiKey::from("super-secret-token");
        assert_eq!(format!("{}", key), "[REDACTED]");
    }

    #[test]
    fn test_api_key_serialize_redaction() {
        let key = ApiKey::from("real-secret-value");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"[REDACTED]\"");
    }

    #[test]
    fn test_provider_config_debug_redaction() {
        let config = ProviderConfig {
            api_key: Some(ApiKey::from("sk-abcd1234secret")),
            ..Default::default()
        };
        let debug_output = format!("{:?}", config);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk-abcd1234secret"));
    }

    // ── Expansion tests ──

    #[test]
    fn test_expand_single_var() {
        let lookup = |name: &str| match name {
            "MY_KEY" => Some("sk-expanded".to_string()),
            _ => None,
        };
        assert_eq!(
            expand_env_vars_with("${MY_KEY}", &lookup).unwrap(),
            "sk-expanded"
        );
    }

    #[test]
    fn test_expand_multiple_vars() {
        let lookup = |name: &str| match name {
            "SCHEME" => Some("https".to_string()),
            "HOST" => Some("example.com".to_string()),
            _ => None,
        };
        let result = expand_env_vars_with("${SCHEME}://${HOST}/v1", &lookup).unwrap();
        assert_eq!(result, "https://example.com/v1");
    }

    #[test]
    fn test_expand_no_vars_passthrough() {
        let lookup = |_: &str| -> Option<String> { panic!("should not be called") };
        assert_eq!(
            expand_env_vars_with("literal-value", &lookup).unwrap(),
            "literal-value"
        );
    }

    #[test]
    fn test_expand_missing_var_fails() {
        let err = expand_env_vars_with("${MISSING}", &no_env).unwrap_err();
        assert!(err.to_string().contains("MISSING"));
    }

    #[test]
    fn test_expand_unclosed_brace_fails() {
        let err = expand_env_vars_with("${UNCLOSED", &no_env).unwrap_err();
        assert!(err.to_string().to_lowercase().contains("unclosed"));
    }

    #[test]
    fn test_expand_empty_var_name_fails() {
        let err = expand_env_vars_with("${}", &no_env).unwrap_err();
        assert!(err.to_string().to_lowercase().contains("empty"));
    }

    #[test]
    fn test_expand_dollar_without_brace_passthrough() {
        assert_eq!(
            expand_env_vars_with("$NOT_A_VAR", &no_env).unwrap(),
            "$NOT_A_VAR"
        );
    }

    // ── Key source resolution ──

    #[test]
    fn test_env_expanded_key() {
        let toml = r#"
            [provider]
            api_key = "${PROXY_TOKEN}"
        "#;
        let lookup = |name: &str| (name == "PROXY_TOKEN").then(|| "sk-from-env".to_string());
        let (config, source) = parse_with(toml, lookup).unwrap();
        assert_eq!(source, KeySource::EnvExpanded);
        assert_eq!(
            config.provider.api_key.unwrap().expose_secret(),
            "sk-from-env"
        );
    }

    #[test]
    fn test_convention_key() {
        let lookup = |name: &str| (name == API_KEY_ENV_VAR).then(|| "sk-convention".to_string());
        let (config, source) = parse_with("", lookup).unwrap();
        assert_eq!(source, KeySource::Convention("CHIM_KEY".to_string()));
        assert_eq!(
            config.provider.api_key.unwrap().expose_secret(),
            "sk-convention"
        );
    }

    #[test]
    fn test_literal_key_wins_over_convention() {
        let toml = r#"
            [provider]
            api_key = "sk-literal"
        "#;
        let lookup = |_: &str| Some("sk-convention".to_string());
        let (config, source) = parse_with(toml, lookup).unwrap();
        assert_eq!(source, KeySource::Literal);
        assert_eq!(config.provider.api_key.unwrap().expose_secret(), "sk-literal");
    }

    #[test]
    fn test_missing_env_var_in_key_fails() {
        let toml = r#"
            [provider]
            api_key = "${DEFINITELY_MISSING}"
        "#;
        let err = parse_with(toml, no_env).unwrap_err();
        assert!(err.to_string().contains("DEFINITELY_MISSING"));
    }

    #[test]
    fn test_base_url_expansion() {
        let toml = r#"
            [provider]
            base_url = "https://${CHIM_HOST}/v1"
        "#;
        let lookup = |name: &str| (name == "CHIM_HOST").then(|| "proxy.internal".to_string());
        let (config, _) = parse_with(toml, lookup).unwrap();
        assert_eq!(config.provider.base_url, "https://proxy.internal/v1");
    }

    #[test]
    fn test_key_source_display() {
        assert_eq!(KeySource::Literal.to_string(), "config-literal");
        assert_eq!(
            KeySource::Convention("CHIM_KEY".to_string()).to_string(),
            "convention (CHIM_KEY)"
        );
        assert_eq!(KeySource::None.to_string(), "none");
    }
}
