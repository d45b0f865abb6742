//! Configuration management for Lode.
//!
//! Parses `lode.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `github.api_url`
//! - `github.raw_url`
//! - `github.token`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override guide docs source directory.
    pub docs_dir: Option<PathBuf>,
    /// Override the library repository's default ref.
    pub library_ref: Option<String>,
    /// Override the contrib repository's default ref.
    pub contrib_ref: Option<String>,
    /// Override the GitHub token.
    pub github_token: Option<String>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "lode.toml";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Library repository (the external documentation provider).
    pub library: LibraryConfig,
    /// Contributor repository holding the workspace packages.
    pub contrib: ContribConfig,
    /// Guide documentation configuration (paths are relative strings from TOML).
    docs: DocsConfigRaw,
    /// GitHub access.
    pub github: GitHubConfig,
    /// Symbol extractor configuration.
    pub extractor: ExtractorConfig,

    /// Resolved docs configuration (set after loading).
    #[serde(skip)]
    pub docs_resolved: DocsConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Library repository configuration.
///
/// The library publishes the API docs that contrib packages link to. Its
/// historical versions are looked up through tags named
/// `{tag_prefix}-v{version}`.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Repository in `owner/name` form.
    pub repository: String,
    /// Ref used when no version is requested.
    pub default_ref: String,
    /// Tag prefix for version tags.
    pub tag_prefix: String,
    /// Dependency names that refer to this library in package manifests.
    pub dependency_names: Vec<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            repository: "thefrontside/effection".to_owned(),
            default_ref: "v4".to_owned(),
            tag_prefix: "effection".to_owned(),
            dependency_names: vec!["effection".to_owned(), "@effection/effection".to_owned()],
        }
    }
}

/// Contributor repository configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ContribConfig {
    /// Repository in `owner/name` form.
    pub repository: String,
    /// Ref used for package listings.
    pub default_ref: String,
}

impl Default for ContribConfig {
    fn default() -> Self {
        Self {
            repository: "thefrontside/effectionx".to_owned(),
            default_ref: "main".to_owned(),
        }
    }
}

/// Raw docs configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct DocsConfigRaw {
    source_dir: Option<String>,
    structure: Option<String>,
}

/// Resolved guide documentation configuration with absolute paths.
#[derive(Debug, Default)]
pub struct DocsConfig {
    /// Directory containing the guide markdown files.
    pub source_dir: PathBuf,
    /// Structure declaration (topic → ordered documents).
    pub structure: PathBuf,
}

/// GitHub access configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// REST API base URL.
    pub api_url: String,
    /// Raw content base URL.
    pub raw_url: String,
    /// Access token. Empty after expansion means anonymous access.
    pub token: Option<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_owned(),
            raw_url: "https://raw.githubusercontent.com".to_owned(),
            token: None,
        }
    }
}

impl GitHubConfig {
    /// Token to send, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Symbol extractor configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Executable providing `doc --json`.
    pub command: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            command: "deno".to_owned(),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`github.token`").
        field: String,
        /// Error message (e.g., "${`GITHUB_TOKEN`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

/// Require an `owner/name` repository identifier.
fn require_repository(value: &str, field: &str) -> Result<(), ConfigError> {
    match value.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok(())
        }
        _ => Err(ConfigError::Validation(format!(
            "{field} must have the form owner/name"
        ))),
    }
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `lode.toml` in current directory and parents.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(docs_dir) = &settings.docs_dir {
            self.docs_resolved.structure = docs_dir.join("structure.json");
            self.docs_resolved.source_dir.clone_from(docs_dir);
        }
        if let Some(library_ref) = &settings.library_ref {
            self.library.default_ref.clone_from(library_ref);
        }
        if let Some(contrib_ref) = &settings.contrib_ref {
            self.contrib.default_ref.clone_from(contrib_ref);
        }
        if let Some(token) = &settings.github_token {
            self.github.token = Some(token.clone());
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            library: LibraryConfig::default(),
            contrib: ContribConfig::default(),
            docs: DocsConfigRaw::default(),
            github: GitHubConfig::default(),
            extractor: ExtractorConfig::default(),
            docs_resolved: DocsConfig {
                source_dir: base.join("docs"),
                structure: base.join("docs").join("structure.json"),
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_repositories()?;
        self.validate_github()?;
        require_non_empty(&self.extractor.command, "extractor.command")?;
        Ok(())
    }

    fn validate_repositories(&self) -> Result<(), ConfigError> {
        require_repository(&self.library.repository, "library.repository")?;
        require_non_empty(&self.library.default_ref, "library.default_ref")?;
        require_non_empty(&self.library.tag_prefix, "library.tag_prefix")?;
        if self.library.dependency_names.is_empty() {
            return Err(ConfigError::Validation(
                "library.dependency_names cannot be empty".to_owned(),
            ));
        }

        require_repository(&self.contrib.repository, "contrib.repository")?;
        require_non_empty(&self.contrib.default_ref, "contrib.default_ref")?;
        Ok(())
    }

    fn validate_github(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.github.api_url, "github.api_url")?;
        require_http_url(&self.github.api_url, "github.api_url")?;
        require_non_empty(&self.github.raw_url, "github.raw_url")?;
        require_http_url(&self.github.raw_url, "github.raw_url")?;
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.github.api_url = expand::expand_env(&self.github.api_url, "github.api_url")?;
        self.github.raw_url = expand::expand_env(&self.github.raw_url, "github.raw_url")?;

        if let Some(ref token) = self.github.token {
            self.github.token = Some(expand::expand_env(token, "github.token")?);
        }

        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let source_dir = config_dir.join(self.docs.source_dir.as_deref().unwrap_or("docs"));
        let structure = match self.docs.structure.as_deref() {
            Some(path) => config_dir.join(path),
            None => source_dir.join("structure.json"),
        };

        self.docs_resolved = DocsConfig {
            source_dir,
            structure,
        };
    }
}
