//! Repository snapshots and workspace discovery for Lode.
//!
//! This crate provides a [`RepositoryHost`] trait for abstracting access to a
//! remote code host, and the resolution layer built on top of it:
//!
//! - [`Repository`]: resolves refs (branches, tags, commits) to immutable
//!   [`Snapshot`]s, memoized per ref with at most one resolution in flight
//! - [`Snapshot`]: reads files and manifests at a pinned commit and lists
//!   member [`Workspace`]s
//!
//! # Backends
//!
//! - [`GitHubHost`]: GitHub REST API and raw content host
//! - [`MockHost`]: in-memory host for testing (behind `mock` feature flag)
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use lode_repo::{GitHubHost, Repository};
//!
//! let host = Arc::new(GitHubHost::new("https://api.github.com", "https://raw.githubusercontent.com", None));
//! let contrib = Repository::new("thefrontside/effectionx", "main", host);
//! let snapshot = contrib.resolve_default().await?;
//! for workspace in snapshot.list_workspaces().await? {
//!     println!("{}", workspace.path);
//! }
//! ```

mod github;
mod host;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod repository;
mod workspace;

pub use github::GitHubHost;
pub use host::{HostError, HostErrorKind, RepositoryHost};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockHost;
pub use repository::{RepoError, Repository, Snapshot};
pub use workspace::{MANIFEST_FILENAME, Workspace, join_path, normalize_path};
