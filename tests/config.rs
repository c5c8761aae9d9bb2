use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use tempfile::TempDir;

use pangenome_catalog::config::{Config, ConfigLoader};
use pangenome_catalog::error::CatalogError;
use pangenome_catalog::validate::{BooleanTokens, ValidationPolicy};

#[test]
fn explicit_missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.json");
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, CatalogError::ConfigRead(reported) if reported == path);
}

#[test]
fn resolves_a_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("catalog-build.json");
    fs::write(
        &path,
        r#"{
            "output_dir": "out",
            "downloads_dir": "downloads",
            "validation_policy": "fail",
            "boolean_tokens": "title",
            "probe_timeout_secs": 3,
            "skip_file_sizes": true,
            "alignments_source": "source/alignments-v2.csv"
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.output_dir, Utf8PathBuf::from("out"));
    assert_eq!(resolved.downloads_dir, Some(Utf8PathBuf::from("downloads")));
    assert_eq!(resolved.validation_policy, ValidationPolicy::Fail);
    assert_eq!(resolved.boolean_tokens, BooleanTokens::title());
    assert_eq!(resolved.probe_timeout, Duration::from_secs(3));
    assert!(resolved.skip_file_sizes);
    assert_eq!(
        resolved.alignments_source,
        Utf8PathBuf::from("source/alignments-v2.csv")
    );
}

#[test]
fn unknown_keys_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("catalog-build.json");
    fs::write(&path, r#"{ "output": "out" }"#).unwrap();
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(CatalogError::ConfigParse(_))
    );
}

#[test]
fn identical_custom_tokens_are_rejected() {
    let config: Config =
        serde_json::from_str(r#"{ "boolean_tokens": { "true": "1", "false": "1" } }"#).unwrap();
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(CatalogError::ConfigParse(message)) if message.contains("must differ")
    );
}
