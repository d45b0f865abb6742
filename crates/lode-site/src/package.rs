//! Package metadata.
//!
//! A [`Package`] is the read-only view of one workspace: validated manifest
//! fields, README, dependencies, symbol documentation per export and derived
//! registry links. Packages are built on demand and never persisted.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use lode_renderer::{Description, MarkdownCompiler, Rendered, parse_description};
use lode_repo::{RepoError, Snapshot, Workspace};
use serde_json::Value;
use tracing::{debug, warn};

use crate::symbols::{DEFAULT_MODULE_KEY, DocNode, SymbolExtractor, extract_all};

/// README text used when a package has none.
pub const MISSING_README: &str = "Could not find a README.md file";

/// Error building a package.
///
/// Aborts only the package being built.
#[derive(Clone, Debug, thiserror::Error)]
pub enum PackageError {
    /// The workspace has no manifest.
    #[error("Manifest not found for workspace {workspace}")]
    ManifestMissing {
        /// Workspace path.
        workspace: String,
    },
    /// Manifest fields are missing or have the wrong type.
    #[error("{path} failed validation: {}", fields.join(", "))]
    ManifestValidation {
        /// Manifest path inside the snapshot.
        path: String,
        /// Every violated field.
        fields: Vec<String>,
    },
    /// The package is marked private.
    #[error("Package {workspace} is private")]
    Private {
        /// Workspace path.
        workspace: String,
    },
    /// Remote access failed.
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// A declared dependency.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dependency {
    /// Package name (`effection`, `@effection/effection`).
    pub name: String,
    /// Declared version with range operators stripped.
    pub version: String,
}

impl Dependency {
    /// Parse an import map specifier such as `npm:effection@^3.2.1` or
    /// `jsr:@std/path@1.0.6/posix`.
    ///
    /// Returns `None` for specifiers without a registry prefix or version.
    #[must_use]
    pub fn parse(specifier: &str) -> Option<Self> {
        let spec = specifier
            .strip_prefix("npm:")
            .or_else(|| specifier.strip_prefix("jsr:"))?;

        // A scoped name starts with '@', so the version separator is the next one.
        let at = spec.get(1..)?.find('@')? + 1;
        let name = &spec[..at];
        let version = spec[at + 1..]
            .trim_start_matches(['^', '~', '=', '>', '<', ' '])
            .split(['/', ' '])
            .next()
            .unwrap_or_default();

        (!name.is_empty() && !version.is_empty()).then(|| Self {
            name: name.to_owned(),
            version: version.to_owned(),
        })
    }
}

/// Registry, badge and source URLs of a package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageLinks {
    pub jsr: String,
    pub jsr_badge: String,
    pub npm: String,
    pub npm_version_badge: String,
    pub bundlephobia: String,
    pub bundle_size_badge: String,
    pub dependency_count_badge: String,
    pub tree_shaking_badge: String,
    pub source: String,
}

impl PackageLinks {
    /// Derive links from the package name and version.
    #[must_use]
    pub fn new(package_name: &str, version: &str, source: String) -> Self {
        Self {
            jsr: format!("https://jsr.io/{package_name}"),
            jsr_badge: format!("https://jsr.io/badges/{package_name}"),
            npm: format!("https://www.npmjs.com/package/{package_name}"),
            npm_version_badge: format!("https://img.shields.io/npm/v/{package_name}"),
            bundlephobia: format!("https://bundlephobia.com/package/{package_name}/{version}"),
            bundle_size_badge: format!(
                "https://img.shields.io/bundlephobia/minzip/{package_name}/{version}"
            ),
            dependency_count_badge: format!(
                "https://badgen.net/bundlephobia/dependency-count/{package_name}"
            ),
            tree_shaking_badge: format!(
                "https://badgen.net/bundlephobia/tree-shaking/{package_name}"
            ),
            source,
        }
    }
}

/// Documentation view of one workspace.
#[derive(Clone, Debug)]
pub struct Package {
    /// Workspace path inside the repository.
    pub workspace: String,
    /// Scope without `@`.
    pub scope: String,
    /// Name without scope.
    pub name: String,
    /// Full `@scope/name`.
    pub package_name: String,
    pub version: String,
    pub license: String,
    /// Module key to entrypoint path, in manifest order.
    pub exports: Vec<(String, String)>,
    /// README source, or [`MISSING_README`].
    pub readme: String,
    /// Compiled README, absent if it failed to compile.
    pub content: Option<Rendered>,
    pub description: Description,
    pub dependencies: Vec<Dependency>,
    /// Symbol documentation per module key.
    pub docs: BTreeMap<String, Vec<DocNode>>,
    pub links: PackageLinks,
}

impl Package {
    /// Symbols of the default entrypoint.
    #[must_use]
    pub fn default_docs(&self) -> &[DocNode] {
        self.docs
            .get(DEFAULT_MODULE_KEY)
            .map_or(&[], Vec::as_slice)
    }

    /// Find a symbol of the default entrypoint by name.
    #[must_use]
    pub fn find_symbol(&self, name: &str) -> Option<&DocNode> {
        self.default_docs().iter().find(|node| node.name == name)
    }

    /// Find a dependency whose name is one of `names`.
    #[must_use]
    pub fn find_dependency(&self, names: &[String]) -> Option<&Dependency> {
        self.dependencies
            .iter()
            .find(|dep| names.iter().any(|name| *name == dep.name))
    }
}

/// Manifest fields after validation.
struct ValidManifest {
    name: String,
    scope: String,
    short_name: String,
    version: String,
    license: String,
    exports: Vec<(String, String)>,
    private: bool,
    dependencies: Vec<Dependency>,
}

/// Validate manifest fields, naming every violation.
fn validate_manifest(manifest: &Value) -> Result<ValidManifest, Vec<String>> {
    let mut fields = Vec::new();

    let name = manifest.get("name").and_then(Value::as_str);
    let scoped = name.and_then(split_scope);
    if scoped.is_none() {
        fields.push("name".to_owned());
    }

    let version = manifest.get("version").and_then(Value::as_str);
    if version.is_none() {
        fields.push("version".to_owned());
    }

    let exports = manifest.get("exports").and_then(normalize_exports);
    if exports.is_none() {
        fields.push("exports".to_owned());
    }

    let license = manifest.get("license").and_then(Value::as_str);
    if license.is_none() {
        fields.push("license".to_owned());
    }

    let private = match manifest.get("private") {
        None => Some(false),
        Some(Value::Bool(true)) => Some(true),
        Some(_) => None,
    };
    if private.is_none() {
        fields.push("private".to_owned());
    }

    match (name, scoped, version, exports, license, private) {
        (
            Some(name),
            Some((scope, short_name)),
            Some(version),
            Some(exports),
            Some(license),
            Some(private),
        ) => Ok(ValidManifest {
            name: name.to_owned(),
            scope: scope.to_owned(),
            short_name: short_name.to_owned(),
            version: version.to_owned(),
            license: license.to_owned(),
            exports,
            private,
            dependencies: parse_imports(manifest),
        }),
        _ => Err(fields),
    }
}

/// Split `@scope/name` into `(scope, name)`.
fn split_scope(name: &str) -> Option<(&str, &str)> {
    let (scope, short) = name.strip_prefix('@')?.split_once('/')?;
    (!scope.is_empty() && !short.is_empty()).then_some((scope, short))
}

/// A string export becomes the default entrypoint; an object is used as-is.
fn normalize_exports(exports: &Value) -> Option<Vec<(String, String)>> {
    match exports {
        Value::String(path) => Some(vec![(DEFAULT_MODULE_KEY.to_owned(), path.clone())]),
        Value::Object(map) => map
            .iter()
            .map(|(key, path)| Some((key.clone(), path.as_str()?.to_owned())))
            .collect(),
        _ => None,
    }
}

fn parse_imports(manifest: &Value) -> Vec<Dependency> {
    manifest
        .get("imports")
        .and_then(Value::as_object)
        .map(|imports| {
            imports
                .values()
                .filter_map(Value::as_str)
                .filter_map(Dependency::parse)
                .collect()
        })
        .unwrap_or_default()
}

/// Builds [`Package`]s from workspaces.
#[derive(Clone)]
pub struct PackageBuilder {
    extractor: Arc<dyn SymbolExtractor>,
    compiler: Arc<dyn MarkdownCompiler>,
}

impl PackageBuilder {
    /// Create a builder.
    #[must_use]
    pub fn new(extractor: Arc<dyn SymbolExtractor>, compiler: Arc<dyn MarkdownCompiler>) -> Self {
        Self {
            extractor,
            compiler,
        }
    }

    /// Build the package of one workspace.
    ///
    /// # Errors
    ///
    /// - [`PackageError::ManifestMissing`] if the workspace has no manifest
    /// - [`PackageError::ManifestValidation`] naming every bad field
    /// - [`PackageError::Private`] for private packages
    /// - [`PackageError::Repo`] if the README cannot be fetched
    pub async fn build(
        &self,
        snapshot: &Snapshot,
        workspace: &Workspace,
    ) -> Result<Package, PackageError> {
        let manifest_path = workspace.join(lode_repo::MANIFEST_FILENAME);

        let manifest = match &workspace.manifest {
            Ok(manifest) => manifest,
            Err(RepoError::ManifestMissing { .. }) => {
                return Err(PackageError::ManifestMissing {
                    workspace: workspace.path.clone(),
                });
            }
            Err(e) => return Err(e.clone().into()),
        };

        let valid = validate_manifest(manifest).map_err(|fields| {
            PackageError::ManifestValidation {
                path: manifest_path,
                fields,
            }
        })?;

        if valid.private {
            return Err(PackageError::Private {
                workspace: workspace.path.clone(),
            });
        }

        let readme = match snapshot.read_file(&workspace.join("README.md")).await {
            Ok(readme) => readme,
            Err(RepoError::FileNotFound { .. }) => {
                debug!("No README in {}", workspace.path);
                MISSING_README.to_owned()
            }
            Err(e) => return Err(e.into()),
        };

        let content = match self.compiler.compile(&readme) {
            Ok(rendered) => Some(rendered),
            Err(e) => {
                warn!("Could not compile README of {}: {e}", valid.name);
                None
            }
        };
        let description = parse_description(&readme);

        let entrypoints: Vec<(String, String)> = valid
            .exports
            .iter()
            .map(|(key, path)| (key.clone(), snapshot.file_url(&workspace.join(path))))
            .collect();
        let docs = extract_all(self.extractor.as_ref(), self.compiler.as_ref(), &entrypoints)
            .await
            .into_iter()
            .collect();

        let links = PackageLinks::new(&valid.name, &valid.version, snapshot.tree_url(&workspace.path));

        Ok(Package {
            workspace: workspace.path.clone(),
            scope: valid.scope,
            name: valid.short_name,
            package_name: valid.name,
            version: valid.version,
            license: valid.license,
            exports: valid.exports,
            readme,
            content,
            description,
            dependencies: valid.dependencies,
            docs,
            links,
        })
    }

    /// Build every public package of a snapshot concurrently.
    ///
    /// Private packages are skipped; other failures are logged without
    /// affecting siblings. Packages keep declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError`] if the workspace list cannot be read.
    pub async fn build_public(&self, snapshot: &Snapshot) -> Result<Vec<Package>, RepoError> {
        let workspaces = snapshot.list_workspaces().await?;

        let results = join_all(workspaces.iter().map(|ws| self.build(snapshot, ws))).await;

        Ok(workspaces
            .iter()
            .zip(results)
            .filter_map(|(workspace, result)| match result {
                Ok(package) => Some(package),
                Err(PackageError::Private { .. }) => {
                    debug!("Skipping private package {}", workspace.path);
                    None
                }
                Err(e) => {
                    warn!("Skipping package {}: {e}", workspace.path);
                    None
                }
            })
            .collect())
    }

    /// Build the root manifest of a snapshot as a package.
    ///
    /// # Errors
    ///
    /// See [`build`](Self::build); fails with [`PackageError::Repo`] if the
    /// root manifest is absent.
    pub async fn build_root(&self, snapshot: &Snapshot) -> Result<Package, PackageError> {
        let root = snapshot.root_workspace().await?;
        self.build(snapshot, &root).await
    }
}

impl std::fmt::Debug for PackageBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageBuilder").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use lode_renderer::HtmlCompiler;
    use lode_repo::{MockHost, Repository, RepositoryHost};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::symbols::fixtures::{FakeExtractor, symbol};

    const REPO: &str = "thefrontside/effectionx";
    const COMMIT: &str = "c0ffee";

    async fn snapshot(host: MockHost) -> Arc<Snapshot> {
        let host: Arc<dyn RepositoryHost> = Arc::new(host.with_ref(REPO, "main", COMMIT));
        Repository::new(REPO, "main", host)
            .resolve_default()
            .await
            .unwrap()
    }

    fn builder(extractor: FakeExtractor) -> PackageBuilder {
        PackageBuilder::new(Arc::new(extractor), Arc::new(HtmlCompiler::new()))
    }

    fn manifest(name: &str, private: bool) -> String {
        let mut value = json!({
            "name": name,
            "version": "1.2.0",
            "license": "MIT",
            "exports": "./mod.ts",
            "imports": { "effection": "npm:effection@^3.2.1" }
        });
        if private {
            value["private"] = json!(true);
        }
        value.to_string()
    }

    fn url(path: &str) -> String {
        format!("mock://{REPO}/{COMMIT}/{path}")
    }

    #[test]
    fn test_dependency_parse() {
        assert_eq!(
            Dependency::parse("npm:effection@^3.2.1"),
            Some(Dependency {
                name: "effection".to_owned(),
                version: "3.2.1".to_owned()
            })
        );
        assert_eq!(
            Dependency::parse("jsr:@effection/effection@~4.0.0"),
            Some(Dependency {
                name: "@effection/effection".to_owned(),
                version: "4.0.0".to_owned()
            })
        );
        assert_eq!(
            Dependency::parse("jsr:@std/path@1.0.6/posix").map(|d| d.version),
            Some("1.0.6".to_owned())
        );
        assert_eq!(Dependency::parse("npm:zod"), None);
        assert_eq!(Dependency::parse("./local.ts"), None);
        assert_eq!(Dependency::parse("https://esm.sh/x@1"), None);
    }

    #[test]
    fn test_validation_names_every_field() {
        let fields = validate_manifest(&json!({
            "name": "unscoped",
            "exports": 42,
            "private": false
        }))
        .err()
        .unwrap();

        assert_eq!(fields, vec!["name", "version", "exports", "license", "private"]);
    }

    #[test]
    fn test_exports_normalization() {
        assert_eq!(
            normalize_exports(&json!("./mod.ts")),
            Some(vec![(".".to_owned(), "./mod.ts".to_owned())])
        );
        assert_eq!(
            normalize_exports(&json!({ ".": "./mod.ts", "./sub": "./sub.ts" })),
            Some(vec![
                (".".to_owned(), "./mod.ts".to_owned()),
                ("./sub".to_owned(), "./sub.ts".to_owned())
            ])
        );
        assert_eq!(normalize_exports(&json!({ ".": 1 })), None);
    }

    #[test]
    fn test_links() {
        let links = PackageLinks::new(
            "@effectionx/task-buffer",
            "1.2.0",
            "https://example.com/src".to_owned(),
        );

        assert_eq!(links.jsr, "https://jsr.io/@effectionx/task-buffer");
        assert_eq!(links.jsr_badge, "https://jsr.io/badges/@effectionx/task-buffer");
        assert_eq!(links.npm, "https://www.npmjs.com/package/@effectionx/task-buffer");
        assert_eq!(
            links.bundle_size_badge,
            "https://img.shields.io/bundlephobia/minzip/@effectionx/task-buffer/1.2.0"
        );
        assert_eq!(
            links.bundlephobia,
            "https://bundlephobia.com/package/@effectionx/task-buffer/1.2.0"
        );
        assert_eq!(
            links.tree_shaking_badge,
            "https://badgen.net/bundlephobia/tree-shaking/@effectionx/task-buffer"
        );
    }

    #[tokio::test]
    async fn test_build_package() {
        let snapshot = snapshot(
            MockHost::new()
                .with_file(REPO, COMMIT, "task-buffer/deno.json", manifest("@effectionx/task-buffer", false))
                .with_file(
                    REPO,
                    COMMIT,
                    "task-buffer/README.md",
                    "# task-buffer\n\nSpawn with a limit.",
                ),
        )
        .await;
        let workspace = Workspace {
            path: "task-buffer".to_owned(),
            manifest: snapshot.read_manifest("task-buffer/deno.json").await,
        };
        let extractor = FakeExtractor::default().with(
            &url("task-buffer/mod.ts"),
            vec![symbol("useTaskBuffer", "function", Some("Create a buffer"))],
        );

        let package = builder(extractor).build(&snapshot, &workspace).await.unwrap();

        assert_eq!(package.scope, "effectionx");
        assert_eq!(package.name, "task-buffer");
        assert_eq!(package.package_name, "@effectionx/task-buffer");
        assert_eq!(package.description.text.as_deref(), Some("Spawn with a limit."));
        assert_eq!(
            package.dependencies,
            vec![Dependency {
                name: "effection".to_owned(),
                version: "3.2.1".to_owned()
            }]
        );
        assert_eq!(package.default_docs()[0].id, "useTaskBuffer");
        assert!(package.find_symbol("useTaskBuffer").is_some());
        assert_eq!(
            package.links.source,
            format!("mock://{REPO}/tree/main/task-buffer")
        );
    }

    #[tokio::test]
    async fn test_missing_readme_uses_placeholder() {
        let snapshot = snapshot(MockHost::new().with_file(
            REPO,
            COMMIT,
            "a/deno.json",
            manifest("@effectionx/a", false),
        ))
        .await;
        let workspace = Workspace {
            path: "a".to_owned(),
            manifest: snapshot.read_manifest("a/deno.json").await,
        };

        let package = builder(FakeExtractor::default())
            .build(&snapshot, &workspace)
            .await
            .unwrap();

        assert_eq!(package.readme, MISSING_README);
        assert!(package.default_docs().is_empty());
    }

    #[tokio::test]
    async fn test_private_and_missing_manifest() {
        let snapshot = snapshot(MockHost::new().with_file(
            REPO,
            COMMIT,
            "internal/deno.json",
            manifest("@effectionx/internal", true),
        ))
        .await;
        let builder = builder(FakeExtractor::default());

        let private = Workspace {
            path: "internal".to_owned(),
            manifest: snapshot.read_manifest("internal/deno.json").await,
        };
        assert!(matches!(
            builder.build(&snapshot, &private).await,
            Err(PackageError::Private { .. })
        ));

        let missing = Workspace {
            path: "ghost".to_owned(),
            manifest: snapshot.read_manifest("ghost/deno.json").await,
        };
        assert!(matches!(
            builder.build(&snapshot, &missing).await,
            Err(PackageError::ManifestMissing { .. })
        ));
    }

    #[tokio::test]
    async fn test_build_public_excludes_private_and_failures() {
        let snapshot = snapshot(
            MockHost::new()
                .with_file(
                    REPO,
                    COMMIT,
                    "deno.json",
                    r#"{"workspace":["./a","./internal","./broken","./b"]}"#,
                )
                .with_file(REPO, COMMIT, "a/deno.json", manifest("@effectionx/a", false))
                .with_file(REPO, COMMIT, "b/deno.json", manifest("@effectionx/b", false))
                .with_file(
                    REPO,
                    COMMIT,
                    "internal/deno.json",
                    manifest("@effectionx/internal", true),
                )
                .with_file(REPO, COMMIT, "broken/deno.json", r#"{"name":"broken"}"#),
        )
        .await;

        let listed = snapshot.list_workspaces().await.unwrap();
        assert!(listed.iter().any(|w| w.path == "internal" && w.is_private()));

        let packages = builder(FakeExtractor::default())
            .build_public(&snapshot)
            .await
            .unwrap();

        let names: Vec<&str> = packages.iter().map(|p| p.package_name.as_str()).collect();
        assert_eq!(names, vec!["@effectionx/a", "@effectionx/b"]);
    }

    #[tokio::test]
    async fn test_build_root() {
        let snapshot = snapshot(MockHost::new().with_file(
            REPO,
            COMMIT,
            "deno.json",
            manifest("@effection/effection", false),
        ))
        .await;
        let extractor = FakeExtractor::default()
            .with(&url("mod.ts"), vec![symbol("Operation", "interface", None)]);

        let package = builder(extractor).build_root(&snapshot).await.unwrap();

        assert_eq!(package.workspace, "");
        assert!(package.find_symbol("Operation").is_some());
    }

    #[tokio::test]
    async fn test_readme_transport_failure_propagates() {
        let host = Arc::new(
            MockHost::new()
                .with_ref(REPO, "main", COMMIT)
                .with_file(REPO, COMMIT, "a/deno.json", manifest("@effectionx/a", false)),
        );
        let snapshot = Repository::new(REPO, "main", Arc::clone(&host) as Arc<dyn RepositoryHost>)
            .resolve_default()
            .await
            .unwrap();
        let workspace = Workspace {
            path: "a".to_owned(),
            manifest: snapshot.read_manifest("a/deno.json").await,
        };
        host.set_unavailable(REPO);

        let err = builder(FakeExtractor::default())
            .build(&snapshot, &workspace)
            .await
            .unwrap_err();

        assert!(matches!(err, PackageError::Repo(RepoError::Unavailable { .. })));
    }
}
