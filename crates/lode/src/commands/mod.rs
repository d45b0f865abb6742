//! CLI command implementations.

pub(crate) mod docs;
pub(crate) mod package;
pub(crate) mod packages;
pub(crate) mod stars;

use std::path::PathBuf;

use clap::Args;
use lode_config::{CliSettings, Config};
use lode_site::Site;

use crate::error::CliError;

pub(crate) use docs::DocsArgs;
pub(crate) use package::PackageArgs;
pub(crate) use packages::PackagesArgs;
pub(crate) use stars::StarsArgs;

/// Arguments shared by every command.
#[derive(Args)]
pub(crate) struct CommonArgs {
    /// Path to configuration file (default: auto-discover lode.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Guide source directory (overrides config).
    #[arg(long)]
    docs_dir: Option<PathBuf>,

    /// Library ref (overrides config).
    #[arg(long)]
    library_ref: Option<String>,

    /// Contrib ref (overrides config).
    #[arg(long)]
    contrib_ref: Option<String>,

    /// GitHub access token (overrides config).
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Enable verbose output (log upstream fetches).
    #[arg(short, long)]
    pub verbose: bool,
}

impl CommonArgs {
    /// Load configuration and build the site.
    pub(crate) fn site(self) -> Result<Site, CliError> {
        let cli_settings = CliSettings {
            docs_dir: self.docs_dir,
            library_ref: self.library_ref,
            contrib_ref: self.contrib_ref,
            github_token: self.github_token,
        };

        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        Ok(Site::new(&config))
    }
}
