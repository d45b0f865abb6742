//! Ref resolution and repository snapshots.
//!
//! A [`Repository`] resolves refs to immutable [`Snapshot`]s. Resolutions
//! are memoized per ref for the lifetime of the repository: concurrent
//! requests for the same ref share one upstream call, and later requests get
//! the same `Arc<Snapshot>` back.

use std::sync::Arc;

use lode_cache::Memo;
use tracing::{debug, info};

use crate::host::{HostError, RepositoryHost};

/// Error returned by repository operations.
///
/// Cloneable so that a single failure can be handed to every waiter of a
/// shared resolution.
#[derive(Clone, Debug, thiserror::Error)]
pub enum RepoError {
    /// The ref does not exist upstream.
    #[error("Ref not found: {repository}@{git_ref}")]
    RefNotFound {
        /// Repository in `owner/name` form.
        repository: String,
        /// Requested ref.
        git_ref: String,
    },
    /// Transport or host failure.
    #[error("Repository unavailable: {repository}")]
    Unavailable {
        /// Repository in `owner/name` form.
        repository: String,
        /// Underlying host error.
        #[source]
        source: Arc<HostError>,
    },
    /// No manifest at the expected location.
    #[error("Manifest not found: {repository}/{path}")]
    ManifestMissing {
        /// Repository in `owner/name` form.
        repository: String,
        /// Manifest path inside the snapshot.
        path: String,
    },
    /// File does not exist at the snapshot's commit.
    #[error("File not found: {repository}@{commit}/{path}")]
    FileNotFound {
        /// Repository in `owner/name` form.
        repository: String,
        /// Resolved commit.
        commit: String,
        /// Path inside the snapshot.
        path: String,
    },
    /// Manifest exists but is not valid JSON.
    #[error("Invalid manifest {path}: {message}")]
    InvalidManifest {
        /// Manifest path inside the snapshot.
        path: String,
        /// Parser message.
        message: String,
    },
}

impl RepoError {
    fn unavailable(repository: &str, source: HostError) -> Self {
        Self::Unavailable {
            repository: repository.to_owned(),
            source: Arc::new(source),
        }
    }
}

/// A named repository on a [`RepositoryHost`] with memoized ref resolution.
pub struct Repository {
    name: String,
    default_ref: String,
    host: Arc<dyn RepositoryHost>,
    snapshots: Memo<String, Arc<Snapshot>, RepoError>,
    stars: Memo<(), u64, RepoError>,
}

impl Repository {
    /// Create a repository handle.
    ///
    /// # Arguments
    ///
    /// * `name` - Repository in `owner/name` form
    /// * `default_ref` - Ref used by [`resolve_default`](Self::resolve_default)
    /// * `host` - Host used for all upstream calls
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        default_ref: impl Into<String>,
        host: Arc<dyn RepositoryHost>,
    ) -> Self {
        Self {
            name: name.into(),
            default_ref: default_ref.into(),
            host,
            snapshots: Memo::new("snapshots"),
            stars: Memo::new("stars"),
        }
    }

    /// Repository name in `owner/name` form.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured default ref.
    #[must_use]
    pub fn default_ref(&self) -> &str {
        &self.default_ref
    }

    /// Resolve a ref to a snapshot.
    ///
    /// Accepts branch names, `tags/{name}`, `heads/{name}` or commit ids.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::RefNotFound`] if the ref does not exist and
    /// [`RepoError::Unavailable`] on transport failure. Failures are not
    /// cached; the next call retries.
    pub async fn resolve_ref(&self, git_ref: &str) -> Result<Arc<Snapshot>, RepoError> {
        let host = Arc::clone(&self.host);
        let repository = self.name.clone();
        let requested = git_ref.to_owned();

        self.snapshots
            .get_or_try_init(git_ref.to_owned(), move || async move {
                let commit = host
                    .resolve_ref(&repository, &requested)
                    .await
                    .map_err(|e| {
                        if e.is_not_found() {
                            RepoError::RefNotFound {
                                repository: repository.clone(),
                                git_ref: requested.clone(),
                            }
                        } else {
                            RepoError::unavailable(&repository, e)
                        }
                    })?;

                info!("Resolved {repository}@{requested} to {commit}");

                Ok(Arc::new(Snapshot {
                    repository,
                    git_ref: requested,
                    commit,
                    host,
                }))
            })
            .await
    }

    /// Resolve the configured default ref.
    ///
    /// # Errors
    ///
    /// See [`resolve_ref`](Self::resolve_ref).
    pub async fn resolve_default(&self) -> Result<Arc<Snapshot>, RepoError> {
        self.resolve_ref(&self.default_ref).await
    }

    /// Star count of the repository, fetched once.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Unavailable`] if the host cannot be queried.
    pub async fn star_count(&self) -> Result<u64, RepoError> {
        let host = Arc::clone(&self.host);
        let repository = self.name.clone();

        self.stars
            .get_or_try_init((), move || async move {
                host.star_count(&repository)
                    .await
                    .map_err(|e| RepoError::unavailable(&repository, e))
            })
            .await
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("name", &self.name)
            .field("default_ref", &self.default_ref)
            .finish_non_exhaustive()
    }
}

/// Immutable, commit-pinned view of a repository.
pub struct Snapshot {
    repository: String,
    git_ref: String,
    commit: String,
    host: Arc<dyn RepositoryHost>,
}

impl Snapshot {
    /// Repository name in `owner/name` form.
    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Ref this snapshot was resolved from.
    #[must_use]
    pub fn git_ref(&self) -> &str {
        &self.git_ref
    }

    /// Resolved commit id.
    #[must_use]
    pub fn commit(&self) -> &str {
        &self.commit
    }

    /// Read a text file from the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::FileNotFound`] if the file does not exist at this
    /// commit and [`RepoError::Unavailable`] on transport failure.
    pub async fn read_file(&self, path: &str) -> Result<String, RepoError> {
        debug!("Reading {}@{}/{path}", self.repository, self.commit);
        self.host
            .read_file(&self.repository, &self.commit, path)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    RepoError::FileNotFound {
                        repository: self.repository.clone(),
                        commit: self.commit.clone(),
                        path: path.to_owned(),
                    }
                } else {
                    RepoError::unavailable(&self.repository, e)
                }
            })
    }

    /// Absolute URL of a file in the snapshot.
    #[must_use]
    pub fn file_url(&self, path: &str) -> String {
        self.host.file_url(&self.repository, &self.commit, path)
    }

    /// Browsable URL of a directory at the requested ref.
    #[must_use]
    pub fn tree_url(&self, path: &str) -> String {
        self.host.tree_url(&self.repository, &self.git_ref, path)
    }

    /// Read and parse a JSON manifest.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::ManifestMissing`] if the file is absent and
    /// [`RepoError::InvalidManifest`] if it is not valid JSON.
    pub async fn read_manifest(&self, path: &str) -> Result<serde_json::Value, RepoError> {
        let content = self.read_file(path).await.map_err(|e| match e {
            RepoError::FileNotFound { .. } => RepoError::ManifestMissing {
                repository: self.repository.clone(),
                path: path.to_owned(),
            },
            other => other,
        })?;

        serde_json::from_str(&content).map_err(|e| RepoError::InvalidManifest {
            path: path.to_owned(),
            message: e.to_string(),
        })
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("repository", &self.repository)
            .field("git_ref", &self.git_ref)
            .field("commit", &self.commit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::MockHost;

    const REPO: &str = "thefrontside/effection";

    fn repository(host: MockHost) -> (Repository, Arc<MockHost>) {
        let host = Arc::new(host);
        let repo = Repository::new(REPO, "v4", Arc::clone(&host) as Arc<dyn RepositoryHost>);
        (repo, host)
    }

    #[tokio::test]
    async fn test_concurrent_resolution_issues_one_fetch() {
        let (repo, host) = repository(
            MockHost::new()
                .with_latency(Duration::from_millis(20))
                .with_ref(REPO, "v4", "abc123"),
        );

        let (a, b) = tokio::join!(repo.resolve_ref("v4"), repo.resolve_ref("v4"));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.commit(), "abc123");
        assert_eq!(host.resolve_calls(), 1);
    }

    #[tokio::test]
    async fn test_repeated_resolution_returns_cached_snapshot() {
        let (repo, host) = repository(MockHost::new().with_ref(REPO, "v4", "abc123"));

        let first = repo.resolve_default().await.unwrap();
        let second = repo.resolve_ref("v4").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.git_ref(), "v4");
        assert_eq!(host.resolve_calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_ref_is_ref_not_found() {
        let (repo, _host) = repository(MockHost::new());

        let err = repo.resolve_ref("tags/effection-v9.9.9").await.unwrap_err();

        assert!(matches!(
            err,
            RepoError::RefNotFound { ref git_ref, .. } if git_ref == "tags/effection-v9.9.9"
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_is_unavailable_and_retried() {
        let (repo, host) = repository(
            MockHost::new()
                .with_ref(REPO, "v4", "abc123")
                .with_unavailable(REPO),
        );

        let err = repo.resolve_ref("v4").await.unwrap_err();
        assert!(matches!(err, RepoError::Unavailable { .. }));

        host.set_available(REPO);
        let snapshot = repo.resolve_ref("v4").await.unwrap();

        assert_eq!(snapshot.commit(), "abc123");
        assert_eq!(host.resolve_calls(), 2);
    }

    #[tokio::test]
    async fn test_read_file_not_found() {
        let (repo, _host) = repository(MockHost::new().with_ref(REPO, "v4", "abc123"));
        let snapshot = repo.resolve_default().await.unwrap();

        let err = snapshot.read_file("missing.md").await.unwrap_err();

        assert!(matches!(err, RepoError::FileNotFound { ref path, .. } if path == "missing.md"));
    }

    #[tokio::test]
    async fn test_read_manifest_missing_and_invalid() {
        let (repo, _host) = repository(
            MockHost::new()
                .with_ref(REPO, "v4", "abc123")
                .with_file(REPO, "abc123", "bad/deno.json", "{ not json"),
        );
        let snapshot = repo.resolve_default().await.unwrap();

        assert!(matches!(
            snapshot.read_manifest("deno.json").await.unwrap_err(),
            RepoError::ManifestMissing { .. }
        ));
        assert!(matches!(
            snapshot.read_manifest("bad/deno.json").await.unwrap_err(),
            RepoError::InvalidManifest { .. }
        ));
    }

    #[tokio::test]
    async fn test_star_count_fetched_once() {
        let (repo, host) = repository(MockHost::new().with_stars(REPO, 1500));

        assert_eq!(repo.star_count().await.unwrap(), 1500);
        assert_eq!(repo.star_count().await.unwrap(), 1500);
        assert_eq!(host.star_calls(), 1);
    }
}
