//! Workspace discovery.
//!
//! The root manifest (`deno.json`) of a snapshot lists member workspaces:
//!
//! ```json
//! { "workspace": ["./task-buffer", "./websocket"] }
//! ```
//!
//! Each member has its own manifest at `{path}/deno.json`. Members are listed
//! in declaration order whether or not their manifest can be read; a member
//! with a missing or broken manifest carries the error instead, so that one
//! bad package never hides its siblings.

use futures::future::join_all;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::repository::{RepoError, Snapshot};

/// Manifest file name at the root of every workspace.
pub const MANIFEST_FILENAME: &str = "deno.json";

/// The part of a root manifest that declares members.
#[derive(Debug, Default, Deserialize)]
struct RootManifest {
    #[serde(default)]
    workspace: Vec<String>,
}

/// One package subtree and its manifest within a snapshot.
#[derive(Clone, Debug)]
pub struct Workspace {
    /// Path relative to the snapshot root, without a leading `./`
    /// (`""` for the root package).
    pub path: String,
    /// Parsed manifest, or the reason it could not be read.
    pub manifest: Result<serde_json::Value, RepoError>,
}

impl Workspace {
    /// Whether the manifest declares `"private": true`.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.manifest
            .as_ref()
            .is_ok_and(|m| m.get("private") == Some(&serde_json::Value::Bool(true)))
    }

    /// Declared package name, if the manifest has one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.manifest.as_ref().ok()?.get("name")?.as_str()
    }

    /// Path of a file inside this workspace, relative to the snapshot root.
    #[must_use]
    pub fn join(&self, file: &str) -> String {
        join_path(&self.path, file)
    }
}

/// Normalize a declared workspace path (`./a/b/` → `a/b`).
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
    trimmed.trim_matches('/').to_owned()
}

/// Join a directory and a relative file path.
#[must_use]
pub fn join_path(dir: &str, file: &str) -> String {
    let file = file.strip_prefix("./").unwrap_or(file);
    if dir.is_empty() {
        file.to_owned()
    } else {
        format!("{dir}/{file}")
    }
}

impl Snapshot {
    /// List member workspaces declared by the root manifest.
    ///
    /// Member manifests are read concurrently. Glob entries cannot be
    /// expanded against a remote snapshot and are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::ManifestMissing`] if the root manifest is absent,
    /// or any error reading or parsing the root manifest.
    pub async fn list_workspaces(&self) -> Result<Vec<Workspace>, RepoError> {
        let root = self.read_manifest(MANIFEST_FILENAME).await?;
        let declared: RootManifest =
            serde_json::from_value(root).map_err(|e| RepoError::InvalidManifest {
                path: MANIFEST_FILENAME.to_owned(),
                message: e.to_string(),
            })?;

        let paths: Vec<String> = declared
            .workspace
            .iter()
            .filter(|entry| {
                if entry.contains('*') {
                    warn!(
                        "Skipping workspace glob {entry} in {}@{}",
                        self.repository(),
                        self.git_ref()
                    );
                    false
                } else {
                    true
                }
            })
            .map(|entry| normalize_path(entry))
            .collect();

        debug!(
            "Found {} workspaces in {}@{}",
            paths.len(),
            self.repository(),
            self.git_ref()
        );

        let manifests = join_all(
            paths
                .iter()
                .map(|path| self.read_manifest_owned(join_path(path, MANIFEST_FILENAME))),
        )
        .await;

        Ok(paths
            .into_iter()
            .zip(manifests)
            .map(|(path, manifest)| Workspace { path, manifest })
            .collect())
    }

    /// The root manifest as a workspace at path `""`.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::ManifestMissing`] if the root manifest is absent.
    pub async fn root_workspace(&self) -> Result<Workspace, RepoError> {
        let manifest = self.read_manifest(MANIFEST_FILENAME).await?;
        Ok(Workspace {
            path: String::new(),
            manifest: Ok(manifest),
        })
    }

    /// Find a listed workspace by path.
    ///
    /// # Errors
    ///
    /// Propagates [`list_workspaces`](Self::list_workspaces) errors.
    pub async fn find_workspace(&self, path: &str) -> Result<Option<Workspace>, RepoError> {
        let wanted = normalize_path(path);
        Ok(self
            .list_workspaces()
            .await?
            .into_iter()
            .find(|w| w.path == wanted))
    }

    async fn read_manifest_owned(&self, path: String) -> Result<serde_json::Value, RepoError> {
        self.read_manifest(&path).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{MockHost, Repository, RepositoryHost};

    const REPO: &str = "thefrontside/effectionx";
    const COMMIT: &str = "abc123";

    async fn snapshot(host: MockHost) -> Arc<Snapshot> {
        let host: Arc<dyn RepositoryHost> = Arc::new(host.with_ref(REPO, "main", COMMIT));
        Repository::new(REPO, "main", host)
            .resolve_default()
            .await
            .unwrap()
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("./task-buffer"), "task-buffer");
        assert_eq!(normalize_path("./a/b/"), "a/b");
        assert_eq!(normalize_path("websocket"), "websocket");
        assert_eq!(normalize_path("./"), "");
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "deno.json"), "deno.json");
        assert_eq!(join_path("task-buffer", "./mod.ts"), "task-buffer/mod.ts");
    }

    #[tokio::test]
    async fn test_list_workspaces_in_declared_order() {
        let snapshot = snapshot(
            MockHost::new()
                .with_file(
                    REPO,
                    COMMIT,
                    "deno.json",
                    r#"{"workspace":["./websocket","./task-buffer","./internal"]}"#,
                )
                .with_file(REPO, COMMIT, "websocket/deno.json", r#"{"name":"@effectionx/websocket"}"#)
                .with_file(
                    REPO,
                    COMMIT,
                    "task-buffer/deno.json",
                    r#"{"name":"@effectionx/task-buffer"}"#,
                )
                .with_file(
                    REPO,
                    COMMIT,
                    "internal/deno.json",
                    r#"{"name":"@effectionx/internal","private":true}"#,
                ),
        )
        .await;

        let workspaces = snapshot.list_workspaces().await.unwrap();

        let paths: Vec<&str> = workspaces.iter().map(|w| w.path.as_str()).collect();
        assert_eq!(paths, vec!["websocket", "task-buffer", "internal"]);
        assert_eq!(workspaces[0].name(), Some("@effectionx/websocket"));
        assert!(!workspaces[0].is_private());
        assert!(workspaces[2].is_private());
    }

    #[tokio::test]
    async fn test_member_without_manifest_is_still_listed() {
        let snapshot = snapshot(
            MockHost::new()
                .with_file(REPO, COMMIT, "deno.json", r#"{"workspace":["./ghost","./real"]}"#)
                .with_file(REPO, COMMIT, "real/deno.json", r#"{"name":"@effectionx/real"}"#),
        )
        .await;

        let workspaces = snapshot.list_workspaces().await.unwrap();

        assert_eq!(workspaces.len(), 2);
        assert!(matches!(
            workspaces[0].manifest,
            Err(RepoError::ManifestMissing { ref path, .. }) if path == "ghost/deno.json"
        ));
        assert!(workspaces[1].manifest.is_ok());
    }

    #[tokio::test]
    async fn test_missing_root_manifest() {
        let snapshot = snapshot(MockHost::new()).await;

        let err = snapshot.list_workspaces().await.unwrap_err();

        assert!(matches!(err, RepoError::ManifestMissing { ref path, .. } if path == "deno.json"));
    }

    #[tokio::test]
    async fn test_globs_are_skipped() {
        let snapshot = snapshot(
            MockHost::new()
                .with_file(REPO, COMMIT, "deno.json", r#"{"workspace":["./packages/*","./a"]}"#)
                .with_file(REPO, COMMIT, "a/deno.json", "{}"),
        )
        .await;

        let workspaces = snapshot.list_workspaces().await.unwrap();

        assert_eq!(workspaces.len(), 1);
        assert_eq!(workspaces[0].path, "a");
    }

    #[tokio::test]
    async fn test_root_without_workspace_key_has_no_members() {
        let snapshot = snapshot(MockHost::new().with_file(
            REPO,
            COMMIT,
            "deno.json",
            r#"{"name":"effection","version":"4.0.0"}"#,
        ))
        .await;

        assert!(snapshot.list_workspaces().await.unwrap().is_empty());

        let root = snapshot.root_workspace().await.unwrap();
        assert_eq!(root.path, "");
        assert_eq!(root.name(), Some("effection"));
        assert_eq!(root.join("README.md"), "README.md");
    }

    #[tokio::test]
    async fn test_find_workspace() {
        let snapshot = snapshot(
            MockHost::new()
                .with_file(REPO, COMMIT, "deno.json", r#"{"workspace":["./a"]}"#)
                .with_file(REPO, COMMIT, "a/deno.json", "{}"),
        )
        .await;

        assert!(snapshot.find_workspace("./a").await.unwrap().is_some());
        assert!(snapshot.find_workspace("b").await.unwrap().is_none());
    }
}
