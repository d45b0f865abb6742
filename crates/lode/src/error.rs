//! CLI error types.

use lode_config::ConfigError;
use lode_repo::RepoError;
use lode_site::{DocError, SiteError};

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Repo(#[from] RepoError),

    #[error("{0}")]
    Site(#[from] SiteError),

    #[error("{0}")]
    Doc(#[from] DocError),

    #[error("{0} not found")]
    NotFound(String),
}
