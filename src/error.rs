use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DataprovError {
    #[error("required metadata file {0} not found in article listing")]
    MetadataNotFound(String),

    #[error("integrity failure: {0}")]
    Integrity(String),

    #[error("external tool failed: {0}")]
    ExternalTool(String),

    #[error("hook {name} failed on {path}: {message}")]
    Hook {
        name: String,
        path: PathBuf,
        message: String,
    },

    #[error("relocation manifest references unknown hook: {0}")]
    UnknownHook(String),

    #[error("failed to read relocation manifest at {0}")]
    ManifestRead(PathBuf),

    #[error("failed to parse relocation manifest: {0}")]
    ManifestParse(String),

    #[error("tarball rule destination is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("figshare request failed: {0}")]
    Http(String),

    #[error("figshare returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
