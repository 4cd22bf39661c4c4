//! Optional TOML configuration file.
//!
//! ```toml
//! [generate]
//! alphabetize = true
//! support-array-length = true
//!
//! [fetch]
//! auth = "Bearer ..."
//! method = "GET"
//! headers = { "X-Tenant" = "acme" }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use openapi_ts_core::GenerationOptions;
use serde::Deserialize;
use serde_json::Value;

/// Parsed configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Generation flags.
    pub generate: GenerationOptions,
    /// Remote document loading.
    pub fetch: FetchConfig,
}

/// The `[fetch]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// `Authorization` header value.
    pub auth: Option<String>,
    /// Extra request headers.
    pub headers: BTreeMap<String, Value>,
    /// HTTP method.
    pub method: Option<String>,
}

/// Read and parse a configuration file.
pub fn load(path: &Path) -> Result<Config, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| format!("Failed to read config {}: {err}", path.display()))?;
    parse(&text).map_err(|err| format!("Invalid config {}: {err}", path.display()))
}

fn parse(text: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(text)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = parse(
            r#"
[generate]
alphabetize = true
support-array-length = true

[fetch]
auth = "Bearer abc"
method = "POST"
headers = { "X-Tenant" = "acme", "X-Retries" = 3 }
"#,
        )
        .unwrap();
        assert!(config.generate.alphabetize);
        assert!(config.generate.support_array_length);
        assert!(!config.generate.immutable_types);
        assert_eq!(config.fetch.auth.as_deref(), Some("Bearer abc"));
        assert_eq!(config.fetch.method.as_deref(), Some("POST"));
        assert_eq!(config.fetch.headers["X-Tenant"], "acme");
        assert_eq!(config.fetch.headers["X-Retries"], 3);
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = parse("").unwrap();
        assert_eq!(config.generate, GenerationOptions::default());
        assert!(config.fetch.headers.is_empty());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(parse("[generate]\nalphabetise = true\n").is_err());
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let err = load(&path).unwrap_err();
        assert!(err.contains("missing.toml"));
    }
}
