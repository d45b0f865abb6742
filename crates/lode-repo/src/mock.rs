//! Mock host implementation for testing.
//!
//! Provides [`MockHost`] for unit testing without network access.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::host::{HostError, RepositoryHost};

/// Mock repository host for testing.
///
/// Stores refs, files and star counts in memory and counts upstream calls.
/// Use the builder methods to configure the mock with test data.
///
/// # Example
///
/// ```ignore
/// use lode_repo::MockHost;
///
/// let host = MockHost::new()
///     .with_ref("acme/extras", "main", "abc123")
///     .with_file("acme/extras", "abc123", "deno.json", r#"{"workspace":[]}"#);
/// ```
#[derive(Debug, Default)]
pub struct MockHost {
    refs: RwLock<HashMap<(String, String), String>>,
    files: RwLock<HashMap<(String, String, String), String>>,
    stars: RwLock<HashMap<String, u64>>,
    unavailable: RwLock<HashSet<String>>,
    latency: Duration,
    resolve_calls: AtomicUsize,
    read_calls: AtomicUsize,
    star_calls: AtomicUsize,
}

impl MockHost {
    /// Create a new empty mock host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `git_ref` in `repository` resolve to `commit`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_ref(
        self,
        repository: impl Into<String>,
        git_ref: impl Into<String>,
        commit: impl Into<String>,
    ) -> Self {
        self.refs
            .write()
            .unwrap()
            .insert((repository.into(), git_ref.into()), commit.into());
        self
    }

    /// Add a file at a commit.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_file(
        self,
        repository: impl Into<String>,
        commit: impl Into<String>,
        path: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        self.files.write().unwrap().insert(
            (repository.into(), commit.into(), path.into()),
            content.into(),
        );
        self
    }

    /// Set the star count of a repository.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_stars(self, repository: impl Into<String>, stars: u64) -> Self {
        self.stars.write().unwrap().insert(repository.into(), stars);
        self
    }

    /// Fail every call for `repository` with a transport error.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_unavailable(self, repository: impl Into<String>) -> Self {
        self.unavailable.write().unwrap().insert(repository.into());
        self
    }

    /// Delay every async call by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Start failing calls for `repository`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn set_unavailable(&self, repository: &str) {
        self.unavailable.write().unwrap().insert(repository.to_owned());
    }

    /// Stop failing calls for `repository`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn set_available(&self, repository: &str) {
        self.unavailable.write().unwrap().remove(repository);
    }

    /// Number of `resolve_ref` calls received.
    #[must_use]
    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    /// Number of `read_file` calls received.
    #[must_use]
    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    /// Number of `star_count` calls received.
    #[must_use]
    pub fn star_calls(&self) -> usize {
        self.star_calls.load(Ordering::SeqCst)
    }

    async fn enter(&self, repository: &str) -> Result<(), HostError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.unavailable.read().unwrap().contains(repository) {
            return Err(HostError::unavailable(repository).with_backend("Mock"));
        }
        Ok(())
    }
}

#[async_trait]
impl RepositoryHost for MockHost {
    async fn resolve_ref(&self, repository: &str, git_ref: &str) -> Result<String, HostError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.enter(repository).await?;

        self.refs
            .read()
            .unwrap()
            .get(&(repository.to_owned(), git_ref.to_owned()))
            .cloned()
            .ok_or_else(|| {
                HostError::not_found(format!("{repository}@{git_ref}")).with_backend("Mock")
            })
    }

    async fn read_file(
        &self,
        repository: &str,
        commit: &str,
        path: &str,
    ) -> Result<String, HostError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.enter(repository).await?;

        self.files
            .read()
            .unwrap()
            .get(&(repository.to_owned(), commit.to_owned(), path.to_owned()))
            .cloned()
            .ok_or_else(|| HostError::not_found(path).with_backend("Mock"))
    }

    fn file_url(&self, repository: &str, commit: &str, path: &str) -> String {
        format!("mock://{repository}/{commit}/{path}")
    }

    fn tree_url(&self, repository: &str, git_ref: &str, path: &str) -> String {
        format!("mock://{repository}/tree/{git_ref}/{path}")
    }

    async fn star_count(&self, repository: &str) -> Result<u64, HostError> {
        self.star_calls.fetch_add(1, Ordering::SeqCst);
        self.enter(repository).await?;

        self.stars
            .read()
            .unwrap()
            .get(repository)
            .copied()
            .ok_or_else(|| HostError::not_found(repository).with_backend("Mock"))
    }
}
