use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::catalog::alignments;
use crate::enrich::DEFAULT_PROBE_TIMEOUT;
use crate::error::CatalogError;
use crate::validate::{BooleanTokens, ValidationPolicy};

pub const DEFAULT_CONFIG_FILE: &str = "catalog-build.json";
pub const DEFAULT_OUTPUT_DIR: &str = "intermediate";

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub downloads_dir: Option<String>,
    #[serde(default)]
    pub validation_policy: Option<ValidationPolicy>,
    #[serde(default)]
    pub boolean_tokens: Option<BooleanTokensEntry>,
    #[serde(default)]
    pub probe_timeout_secs: Option<u64>,
    #[serde(default)]
    pub skip_file_sizes: Option<bool>,
    #[serde(default)]
    pub alignments_source: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum BooleanTokensEntry {
    Preset(String),
    Custom(BooleanTokens),
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub output_dir: Utf8PathBuf,
    pub downloads_dir: Option<Utf8PathBuf>,
    pub validation_policy: ValidationPolicy,
    pub boolean_tokens: BooleanTokens,
    pub probe_timeout: Duration,
    pub skip_file_sizes: bool,
    pub alignments_source: Utf8PathBuf,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            output_dir: Utf8PathBuf::from(DEFAULT_OUTPUT_DIR),
            downloads_dir: None,
            validation_policy: ValidationPolicy::default(),
            boolean_tokens: BooleanTokens::default(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            skip_file_sizes: false,
            alignments_source: Utf8PathBuf::from(alignments::DEFAULT_SOURCE),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Without an explicit path a missing default file means defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, CatalogError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| CatalogError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| CatalogError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, CatalogError> {
        let defaults = ResolvedConfig::default();

        let boolean_tokens = match config.boolean_tokens {
            None => defaults.boolean_tokens,
            Some(BooleanTokensEntry::Preset(name)) => match name.as_str() {
                "upper" => BooleanTokens::upper(),
                "title" => BooleanTokens::title(),
                other => {
                    return Err(CatalogError::ConfigParse(format!(
                        "unknown boolean token preset `{other}` (expected `upper` or `title`)"
                    )));
                }
            },
            Some(BooleanTokensEntry::Custom(tokens)) => {
                if tokens.truthy == tokens.falsy {
                    return Err(CatalogError::ConfigParse(
                        "boolean tokens for true and false must differ".to_string(),
                    ));
                }
                tokens
            }
        };

        Ok(ResolvedConfig {
            output_dir: config
                .output_dir
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.output_dir),
            downloads_dir: config.downloads_dir.map(Utf8PathBuf::from),
            validation_policy: config
                .validation_policy
                .unwrap_or(defaults.validation_policy),
            boolean_tokens,
            probe_timeout: config
                .probe_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.probe_timeout),
            skip_file_sizes: config.skip_file_sizes.unwrap_or(defaults.skip_file_sizes),
            alignments_source: config
                .alignments_source
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.alignments_source),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.output_dir, Utf8PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(resolved.validation_policy, ValidationPolicy::Warn);
        assert_eq!(resolved.boolean_tokens, BooleanTokens::upper());
        assert_eq!(resolved.probe_timeout, Duration::from_secs(10));
    }

    #[test]
    fn token_presets_and_custom_pairs() {
        let title: Config = serde_json::from_str(r#"{ "boolean_tokens": "title" }"#).unwrap();
        assert_eq!(
            ConfigLoader::resolve_config(title).unwrap().boolean_tokens,
            BooleanTokens::title()
        );

        let custom: Config =
            serde_json::from_str(r#"{ "boolean_tokens": { "true": "yes", "false": "no" } }"#)
                .unwrap();
        let tokens = ConfigLoader::resolve_config(custom).unwrap().boolean_tokens;
        assert_eq!(tokens.parse("yes"), Some(true));

        let unknown: Config = serde_json::from_str(r#"{ "boolean_tokens": "lower" }"#).unwrap();
        assert!(matches!(
            ConfigLoader::resolve_config(unknown),
            Err(CatalogError::ConfigParse(_))
        ));
    }
}
