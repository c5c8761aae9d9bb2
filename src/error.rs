use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CatalogError {
    #[error("request for {url} failed: {message}")]
    FetchHttp { url: String, message: String },

    #[error("{url} caused error {status}. See details below:\n {body}")]
    FetchStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[error("invalid source specification: {0}")]
    Configuration(String),

    #[error("no separator specified for {0}")]
    #[diagnostic(help("set `separator` on the source or on one of its parents"))]
    MissingSeparator(String),

    #[error("column `{column}` not found (available: {available})")]
    MissingColumn { column: String, available: String },

    #[error("join on `{key}` is not many-to-one: value `{value}` appears more than once in the reference table")]
    JoinCardinality { key: String, value: String },

    #[error("invalid schema model {model}: {message}")]
    Schema { model: String, message: String },

    #[error("failed to parse {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    #[error("{0}")]
    Format(String),

    #[error("validation failed for {files} source file(s)")]
    #[diagnostic(help("fix the source rows listed above or rerun with `--validation-policy warn`"))]
    ValidationFailed { files: usize },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
