//! Repository host trait and error types.
//!
//! Provides the core [`RepositoryHost`] trait for abstracting ref resolution
//! and file retrieval from a remote code host, along with [`HostError`] for
//! unified error handling across backends.
//!
//! # Paths
//!
//! All path parameters are repository-relative paths without a leading
//! slash (e.g., `"deno.json"`, `"task-buffer/README.md"`).

use async_trait::async_trait;

/// Semantic error categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum HostErrorKind {
    /// Ref, repository or file does not exist.
    NotFound,
    /// Host is temporarily unavailable or the transport failed.
    Unavailable,
    /// Too many requests.
    RateLimited,
    /// Operation timed out.
    Timeout,
    /// Other/unknown error category.
    Other,
}

/// Host error with semantic kind and backend-specific source.
#[derive(Debug)]
pub struct HostError {
    /// Semantic error category.
    pub kind: HostErrorKind,
    /// Request context (ref, path or URL).
    pub context: Option<String>,
    /// Backend identifier (e.g., "GitHub", "Mock").
    pub backend: Option<&'static str>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl HostError {
    /// Create a new host error.
    #[must_use]
    pub fn new(kind: HostErrorKind) -> Self {
        Self {
            kind,
            context: None,
            backend: None,
            source: None,
        }
    }

    /// Attach request context.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Attach backend identifier.
    #[must_use]
    pub fn with_backend(mut self, backend: &'static str) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Attach the underlying error source.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Create a not found error with context.
    #[must_use]
    pub fn not_found(context: impl Into<String>) -> Self {
        Self::new(HostErrorKind::NotFound).with_context(context)
    }

    /// Create an unavailable error with context.
    #[must_use]
    pub fn unavailable(context: impl Into<String>) -> Self {
        Self::new(HostErrorKind::Unavailable).with_context(context)
    }

    /// Map an HTTP status code to an error.
    ///
    /// `404` and `422` (GitHub's answer for unknown commits) are `NotFound`.
    #[must_use]
    pub fn from_http_status(status: u16, context: impl Into<String>) -> Self {
        let kind = match status {
            404 | 422 => HostErrorKind::NotFound,
            403 | 429 => HostErrorKind::RateLimited,
            408 | 504 => HostErrorKind::Timeout,
            500..=599 => HostErrorKind::Unavailable,
            _ => HostErrorKind::Other,
        };
        Self::new(kind).with_context(format!("HTTP {status}: {}", context.into()))
    }

    /// Whether the error means the requested resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == HostErrorKind::NotFound
    }
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Format: "[Backend] Kind: message (context)"
        if let Some(backend) = self.backend {
            write!(f, "[{backend}] ")?;
        }

        let kind_str = match self.kind {
            HostErrorKind::NotFound => "Not found",
            HostErrorKind::Unavailable => "Unavailable",
            HostErrorKind::RateLimited => "Rate limited",
            HostErrorKind::Timeout => "Timeout",
            HostErrorKind::Other => "Error",
        };

        write!(f, "{kind_str}")?;

        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }

        if let Some(context) = &self.context {
            write!(f, " ({context})")?;
        }

        Ok(())
    }
}

impl std::error::Error for HostError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Remote code host access.
///
/// Every method that talks to the host is async; implementations that use
/// blocking clients must move the work off the async workers.
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Resolve a branch, tag (`tags/{name}`) or commit to a commit id.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] with [`HostErrorKind::NotFound`] if the ref does
    /// not exist, or another kind on transport failure.
    async fn resolve_ref(&self, repository: &str, git_ref: &str) -> Result<String, HostError>;

    /// Read a text file at a resolved commit.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] with [`HostErrorKind::NotFound`] if the file does
    /// not exist at that commit.
    async fn read_file(
        &self,
        repository: &str,
        commit: &str,
        path: &str,
    ) -> Result<String, HostError>;

    /// Absolute URL of a file at a resolved commit.
    ///
    /// Used as the entrypoint handed to the symbol extractor.
    fn file_url(&self, repository: &str, commit: &str, path: &str) -> String;

    /// Browsable URL of a directory at a ref.
    fn tree_url(&self, repository: &str, git_ref: &str, path: &str) -> String;

    /// Number of stars on the repository.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] if the repository cannot be queried.
    async fn star_count(&self, repository: &str) -> Result<u64, HostError>;
}
