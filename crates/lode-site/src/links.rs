//! Symbol reference resolution.
//!
//! Documentation prose refers to symbols by name. A reference resolves, in
//! order, to:
//!
//! 1. a symbol of the current package's default entrypoint
//! 2. an anchor on the current page for `Owner_member` names
//! 3. a symbol of the library version the package depends on
//! 4. the bare symbol name
//!
//! A name is split at its last `_` only after the full name failed to match
//! in step 1, so `{@link MAX_SIZE}` still links to a local `MAX_SIZE`.
//!
//! Step 3 needs the library's docs at the exact version the package declares,
//! which means resolving a tag and building the library's root package. A
//! [`LinkResolver`] does that at most once; [`LibraryDocs`] shares the built
//! packages between resolvers.

use std::fmt;
use std::sync::Arc;

use lode_cache::Memo;
use lode_renderer::{find_references, splice};
use lode_repo::Repository;
use semver::Version;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::package::{Dependency, Package, PackageBuilder, PackageError};

/// Connector of a same-page member reference (`{@link Task_halt}`).
const ANCHOR_CONNECTOR: &str = "_";

/// `(owner, member)` of an `Owner_member` name.
fn anchor_parts(symbol: &str) -> Option<(&str, &str)> {
    symbol
        .rsplit_once(ANCHOR_CONNECTOR)
        .filter(|(owner, member)| !owner.is_empty() && !member.is_empty())
}

/// Where a symbol reference points.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkTarget {
    /// Anchor on the current page (`#{symbol}_{method}`).
    Anchor(String),
    /// Symbol of the current package, anchored at `{kind}_{name}`.
    Internal {
        /// Referenced symbol.
        symbol: String,
        /// Anchor without `#`.
        anchor: String,
    },
    /// Symbol of a dependency's API docs.
    External {
        /// Referenced symbol.
        symbol: String,
        /// `/api/{major}.{minor}/{symbol}`.
        href: String,
    },
    /// Nothing found; rendered as the symbol text.
    Unresolved(String),
}

impl LinkTarget {
    /// Link destination, if any.
    #[must_use]
    pub fn href(&self) -> Option<String> {
        match self {
            Self::Anchor(anchor) => Some(anchor.clone()),
            Self::Internal { anchor, .. } => Some(format!("#{anchor}")),
            Self::External { href, .. } => Some(href.clone()),
            Self::Unresolved(_) => None,
        }
    }

    /// Markdown replacement for the reference.
    ///
    /// `label` replaces the symbol as link text. `code` wraps the link text
    /// in backticks, for `{@linkcode}`.
    #[must_use]
    pub fn to_markdown(&self, label: Option<&str>, code: bool) -> String {
        let text = |symbol: &str| {
            let text = label.unwrap_or(symbol);
            if code {
                format!("`{text}`")
            } else {
                text.to_owned()
            }
        };

        match self {
            Self::Anchor(anchor) => match label {
                Some(_) => format!("[{}]({anchor})", text(anchor)),
                None => anchor.clone(),
            },
            Self::Internal { symbol, anchor } => format!("[{}](#{anchor})", text(symbol)),
            Self::External { symbol, href } => format!("[{}]({href})", text(symbol)),
            Self::Unresolved(symbol) => text(symbol),
        }
    }
}

impl fmt::Display for LinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_markdown(None, false))
    }
}

/// `(major, minor)` of a declared version such as `3.2.1`, `3.2` or `4`.
#[must_use]
pub fn major_minor(version: &str) -> Option<(u64, u64)> {
    let version = version.trim();
    [
        version.to_owned(),
        format!("{version}.0"),
        format!("{version}.0.0"),
    ]
    .iter()
    .find_map(|candidate| Version::parse(candidate).ok())
    .map(|v| (v.major, v.minor))
}

/// API docs of the external documentation provider, per version.
pub struct LibraryDocs {
    repository: Arc<Repository>,
    builder: PackageBuilder,
    tag_prefix: String,
    dependency_names: Vec<String>,
    packages: Memo<String, Arc<Package>, PackageError>,
}

impl LibraryDocs {
    /// Create a provider.
    ///
    /// # Arguments
    ///
    /// * `repository` - Library repository
    /// * `builder` - Builder for the library's root package
    /// * `tag_prefix` - Release tags are `{tag_prefix}-v{version}`
    /// * `dependency_names` - Names under which packages depend on the library
    #[must_use]
    pub fn new(
        repository: Arc<Repository>,
        builder: PackageBuilder,
        tag_prefix: impl Into<String>,
        dependency_names: Vec<String>,
    ) -> Self {
        Self {
            repository,
            builder,
            tag_prefix: tag_prefix.into(),
            dependency_names,
            packages: Memo::new("library-packages"),
        }
    }

    /// Library repository.
    #[must_use]
    pub fn repository(&self) -> &Arc<Repository> {
        &self.repository
    }

    /// The package's dependency on the library, if it has one.
    #[must_use]
    pub fn dependency_of<'a>(&self, package: &'a Package) -> Option<&'a Dependency> {
        package.find_dependency(&self.dependency_names)
    }

    /// Release tag of a version.
    #[must_use]
    pub fn tag(&self, version: &str) -> String {
        format!("tags/{}-v{version}", self.tag_prefix)
    }

    /// Root package of the library at a released version.
    ///
    /// Built once per version; failures are retried on the next call.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError`] if the tag cannot be resolved or the root
    /// package cannot be built.
    pub async fn package_at(&self, version: &str) -> Result<Arc<Package>, PackageError> {
        let repository = Arc::clone(&self.repository);
        let builder = self.builder.clone();
        let tag = self.tag(version);

        self.packages
            .get_or_try_init(version.to_owned(), move || async move {
                let snapshot = repository.resolve_ref(&tag).await?;
                let package = builder.build_root(&snapshot).await?;
                Ok(Arc::new(package))
            })
            .await
    }
}

impl fmt::Debug for LibraryDocs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryDocs")
            .field("repository", &self.repository.name())
            .field("tag_prefix", &self.tag_prefix)
            .field("dependency_names", &self.dependency_names)
            .finish_non_exhaustive()
    }
}

/// Library docs at the version a package depends on.
struct External {
    major: u64,
    minor: u64,
    package: Arc<Package>,
}

/// Resolves symbol references for one package during one rendering pass.
pub struct LinkResolver {
    package: Arc<Package>,
    library: Arc<LibraryDocs>,
    external: OnceCell<Option<External>>,
}

impl LinkResolver {
    /// Create a resolver for `package`.
    #[must_use]
    pub fn new(package: Arc<Package>, library: Arc<LibraryDocs>) -> Self {
        Self {
            package,
            library,
            external: OnceCell::new(),
        }
    }

    /// Whether resolving `symbol` requires the dependency's docs.
    ///
    /// True when the symbol is not exported by the current package and the
    /// reference is not a same-page anchor.
    #[must_use]
    pub fn needs_external(&self, symbol: &str, connector: Option<&str>) -> bool {
        connector != Some(ANCHOR_CONNECTOR)
            && self.package.find_symbol(symbol).is_none()
            && (connector.is_some() || anchor_parts(symbol).is_none())
    }

    /// Resolve one reference.
    ///
    /// An explicit `_` connector always yields an anchor. Without a
    /// connector, an unmatched `Owner_member` name does too.
    pub async fn resolve(
        &self,
        symbol: &str,
        connector: Option<&str>,
        method: Option<&str>,
    ) -> LinkTarget {
        if connector == Some(ANCHOR_CONNECTOR) {
            return LinkTarget::Anchor(format!("#{symbol}_{}", method.unwrap_or_default()));
        }

        if let Some(node) = self.package.find_symbol(symbol) {
            return LinkTarget::Internal {
                symbol: symbol.to_owned(),
                anchor: node.anchor(),
            };
        }

        if connector.is_none()
            && let Some((owner, member)) = anchor_parts(symbol)
        {
            return LinkTarget::Anchor(format!("#{owner}_{member}"));
        }

        if let Some(external) = self.external().await
            && external.package.find_symbol(symbol).is_some()
        {
            return LinkTarget::External {
                symbol: symbol.to_owned(),
                href: format!("/api/{}.{}/{symbol}", external.major, external.minor),
            };
        }

        LinkTarget::Unresolved(symbol.to_owned())
    }

    /// Rewrite every `{@link}` and `{@linkcode}` reference in markdown.
    pub async fn render_prose(&self, markdown: &str) -> String {
        let refs = find_references(markdown);
        if refs.is_empty() {
            return markdown.to_owned();
        }

        let mut replacements = Vec::with_capacity(refs.len());
        for reference in &refs {
            let target = self
                .resolve(
                    &reference.symbol,
                    reference.connector.as_deref(),
                    reference.method.as_deref(),
                )
                .await;
            replacements.push(target.to_markdown(reference.label.as_deref(), reference.code));
        }

        splice(markdown, &refs, &replacements)
    }

    /// Dependency docs, looked up once. Failures resolve to `None`.
    async fn external(&self) -> Option<&External> {
        self.external
            .get_or_init(|| async {
                let dependency = self.library.dependency_of(&self.package)?;
                let Some((major, minor)) = major_minor(&dependency.version) else {
                    warn!(
                        "Cannot parse {} version {} of {}",
                        dependency.name, dependency.version, self.package.package_name
                    );
                    return None;
                };

                match self.library.package_at(&dependency.version).await {
                    Ok(package) => {
                        debug!(
                            "Resolving links of {} against {}@{}",
                            self.package.package_name, dependency.name, dependency.version
                        );
                        Some(External {
                            major,
                            minor,
                            package,
                        })
                    }
                    Err(e) => {
                        warn!(
                            "No docs for {}@{} of {}: {e}",
                            dependency.name, dependency.version, self.package.package_name
                        );
                        None
                    }
                }
            })
            .await
            .as_ref()
    }
}

impl fmt::Debug for LinkResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkResolver")
            .field("package", &self.package.package_name)
            .field("external_loaded", &self.external.initialized())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use lode_renderer::{Description, HtmlCompiler};
    use lode_repo::{MockHost, RepositoryHost};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::package::PackageLinks;
    use crate::symbols::fixtures::{FakeExtractor, symbol};
    use crate::symbols::{DocNode, Location, SymbolKind};

    const LIBRARY: &str = "thefrontside/effection";
    const LIBRARY_COMMIT: &str = "e3e3e3";

    fn node(name: &str, kind: SymbolKind) -> DocNode {
        DocNode {
            id: name.to_owned(),
            name: name.to_owned(),
            kind,
            location: Location::default(),
            doc: None,
            rendered: None,
        }
    }

    fn contrib_package(dependencies: Vec<Dependency>) -> Arc<Package> {
        package_with_docs(dependencies, vec![node("run", SymbolKind::Function)])
    }

    fn package_with_docs(dependencies: Vec<Dependency>, nodes: Vec<DocNode>) -> Arc<Package> {
        Arc::new(Package {
            workspace: "task-buffer".to_owned(),
            scope: "effectionx".to_owned(),
            name: "task-buffer".to_owned(),
            package_name: "@effectionx/task-buffer".to_owned(),
            version: "1.0.0".to_owned(),
            license: "MIT".to_owned(),
            exports: vec![(".".to_owned(), "./mod.ts".to_owned())],
            readme: String::new(),
            content: None,
            description: Description::default(),
            dependencies,
            docs: BTreeMap::from([(".".to_owned(), nodes)]),
            links: PackageLinks::new("@effectionx/task-buffer", "1.0.0", String::new()),
        })
    }

    fn effection(version: &str) -> Vec<Dependency> {
        vec![Dependency {
            name: "effection".to_owned(),
            version: version.to_owned(),
        }]
    }

    fn library(host: MockHost) -> (Arc<LibraryDocs>, Arc<MockHost>) {
        let host = Arc::new(host);
        let repository = Arc::new(Repository::new(
            LIBRARY,
            "v4",
            Arc::clone(&host) as Arc<dyn RepositoryHost>,
        ));
        let extractor = FakeExtractor::default().with(
            &format!("mock://{LIBRARY}/{LIBRARY_COMMIT}/mod.ts"),
            vec![
                symbol("Operation", "interface", None),
                symbol("spawn", "function", None),
            ],
        );
        let builder = PackageBuilder::new(Arc::new(extractor), Arc::new(HtmlCompiler::new()));
        let docs = LibraryDocs::new(
            repository,
            builder,
            "effection",
            vec!["effection".to_owned(), "@effection/effection".to_owned()],
        );
        (Arc::new(docs), host)
    }

    fn library_host() -> MockHost {
        MockHost::new()
            .with_ref(LIBRARY, "tags/effection-v3.2.1", LIBRARY_COMMIT)
            .with_file(
                LIBRARY,
                LIBRARY_COMMIT,
                "deno.json",
                r#"{"name":"@effection/effection","version":"3.2.1","license":"ISC","exports":"./mod.ts"}"#,
            )
    }

    #[test]
    fn test_major_minor() {
        assert_eq!(major_minor("3.2.1"), Some((3, 2)));
        assert_eq!(major_minor("4.0.0-alpha.3"), Some((4, 0)));
        assert_eq!(major_minor("3.2"), Some((3, 2)));
        assert_eq!(major_minor("4"), Some((4, 0)));
        assert_eq!(major_minor("latest"), None);
    }

    #[test]
    fn test_link_target_markdown() {
        let internal = LinkTarget::Internal {
            symbol: "run".to_owned(),
            anchor: "function_run".to_owned(),
        };
        assert_eq!(internal.to_string(), "[run](#function_run)");
        assert_eq!(internal.to_markdown(None, true), "[`run`](#function_run)");
        assert_eq!(
            internal.to_markdown(Some("the runner"), false),
            "[the runner](#function_run)"
        );
        assert_eq!(internal.href().as_deref(), Some("#function_run"));
        assert_eq!(LinkTarget::Unresolved("x".to_owned()).to_markdown(None, true), "`x`");
        assert_eq!(LinkTarget::Unresolved("x".to_owned()).to_markdown(Some("y"), false), "y");
        let anchor = LinkTarget::Anchor("#Task_halt".to_owned());
        assert_eq!(anchor.to_string(), "#Task_halt");
        assert_eq!(anchor.to_markdown(Some("halt"), false), "[halt](#Task_halt)");
        assert!(LinkTarget::Unresolved("x".to_owned()).href().is_none());
    }

    #[tokio::test]
    async fn test_anchor_connector_short_circuits() {
        let (library, host) = library(library_host());
        let resolver = LinkResolver::new(contrib_package(effection("3.2.1")), library);

        let target = resolver.resolve("Task", Some("_"), Some("halt")).await;

        assert_eq!(target, LinkTarget::Anchor("#Task_halt".to_owned()));
        assert!(!resolver.needs_external("Task", Some("_")));
        assert_eq!(host.resolve_calls(), 0);
    }

    #[tokio::test]
    async fn test_unmatched_underscored_name_is_anchor() {
        let (library, host) = library(library_host());
        let resolver = LinkResolver::new(contrib_package(effection("3.2.1")), library);

        let target = resolver.resolve("Task_halt", None, None).await;

        assert_eq!(target, LinkTarget::Anchor("#Task_halt".to_owned()));
        assert!(!resolver.needs_external("Task_halt", None));
        assert!(resolver.needs_external("_private", None));
        assert!(resolver.needs_external("Task_", None));
        assert_eq!(host.resolve_calls(), 0);
    }

    #[tokio::test]
    async fn test_underscored_local_symbol_links_internally() {
        let (library, host) = library(library_host());
        let package = package_with_docs(
            effection("3.2.1"),
            vec![
                node("MAX_SIZE", SymbolKind::Variable),
                node("Task", SymbolKind::Interface),
            ],
        );
        let resolver = LinkResolver::new(package, library);

        let output = resolver
            .render_prose(
                "See {@link MAX_SIZE}, {@linkcode Task_halt} and {@link Task_halt | halt}.",
            )
            .await;

        assert_eq!(
            output,
            "See [MAX_SIZE](#variable_MAX_SIZE), #Task_halt and [halt](#Task_halt)."
        );
        assert!(!resolver.needs_external("MAX_SIZE", None));
        assert_eq!(host.resolve_calls(), 0);
    }

    #[tokio::test]
    async fn test_internal_symbol_never_consults_dependency() {
        let (library, host) = library(library_host());
        let resolver = LinkResolver::new(contrib_package(effection("3.2.1")), library);

        let target = resolver.resolve("run", None, None).await;

        assert_eq!(target.to_string(), "[run](#function_run)");
        assert!(!resolver.needs_external("run", None));
        assert_eq!(host.resolve_calls(), 0);
    }

    #[tokio::test]
    async fn test_external_symbol_links_to_versioned_api() {
        let (library, _host) = library(library_host());
        let dependencies = Dependency::parse("npm:effection@^3.2.1").into_iter().collect();
        let resolver = LinkResolver::new(contrib_package(dependencies), library);
        assert!(resolver.needs_external("Operation", None));

        let target = resolver.resolve("Operation", None, None).await;

        assert_eq!(
            target,
            LinkTarget::External {
                symbol: "Operation".to_owned(),
                href: "/api/3.2/Operation".to_owned(),
            }
        );
        assert_eq!(target.href().as_deref(), Some("/api/3.2/Operation"));
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_literal() {
        let (library, _host) = library(library_host());
        let resolver = LinkResolver::new(contrib_package(effection("3.2.1")), library);

        let target = resolver.resolve("Nope", None, None).await;

        assert_eq!(target.to_string(), "Nope");
    }

    #[tokio::test]
    async fn test_external_lookup_runs_once() {
        let (library, host) = library(library_host());
        let resolver = LinkResolver::new(contrib_package(effection("3.2.1")), library);

        resolver.resolve("Operation", None, None).await;
        resolver.resolve("spawn", None, None).await;
        resolver.resolve("Nope", None, None).await;

        assert_eq!(host.resolve_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_external_lookup_is_cached_as_none() {
        let (library, host) = library(library_host());
        let resolver = LinkResolver::new(contrib_package(effection("9.9.9")), library);

        assert_eq!(
            resolver.resolve("Operation", None, None).await,
            LinkTarget::Unresolved("Operation".to_owned())
        );
        assert_eq!(
            resolver.resolve("spawn", None, None).await,
            LinkTarget::Unresolved("spawn".to_owned())
        );
        assert_eq!(host.resolve_calls(), 1);
    }

    #[tokio::test]
    async fn test_no_library_dependency() {
        let (library, host) = library(library_host());
        let resolver = LinkResolver::new(contrib_package(Vec::new()), library);

        assert_eq!(
            resolver.resolve("Operation", None, None).await,
            LinkTarget::Unresolved("Operation".to_owned())
        );
        assert_eq!(host.resolve_calls(), 0);
    }

    #[tokio::test]
    async fn test_library_package_shared_between_resolvers() {
        let (library, host) = library(library_host());
        let first = LinkResolver::new(contrib_package(effection("3.2.1")), Arc::clone(&library));
        let second = LinkResolver::new(contrib_package(effection("3.2.1")), library);

        first.resolve("Operation", None, None).await;
        second.resolve("Operation", None, None).await;

        assert_eq!(host.resolve_calls(), 1);
        assert_eq!(host.read_calls(), 2);
    }

    #[tokio::test]
    async fn test_render_prose() {
        let (library, _host) = library(library_host());
        let resolver = LinkResolver::new(contrib_package(effection("3.2.1")), library);

        let output = resolver
            .render_prose(
                "Use {@link run} with an {@linkcode Operation}, see {@link Task_halt} or {@link Nope.x}.",
            )
            .await;

        assert_eq!(
            output,
            "Use [run](#function_run) with an [`Operation`](/api/3.2/Operation), see #Task_halt or Nope."
        );
    }

    #[tokio::test]
    async fn test_render_prose_labels() {
        let (library, _host) = library(library_host());
        let resolver = LinkResolver::new(contrib_package(effection("3.2.1")), library);

        let output = resolver
            .render_prose(
                "{@link run | Run it} with {@linkcode Operation operations}, not {@link Nope nothing}.",
            )
            .await;

        assert_eq!(
            output,
            "[Run it](#function_run) with [`operations`](/api/3.2/Operation), not nothing."
        );
    }

    #[tokio::test]
    async fn test_render_prose_leaves_code_alone() {
        let (library, host) = library(library_host());
        let resolver = LinkResolver::new(contrib_package(effection("3.2.1")), library);
        let markdown = "Write `{@link run}` like this:\n\n```ts\n/** {@link Operation} */\n```\n\nThen {@link run}.";

        let output = resolver.render_prose(markdown).await;

        assert_eq!(
            output,
            "Write `{@link run}` like this:\n\n```ts\n/** {@link Operation} */\n```\n\nThen [run](#function_run)."
        );
        assert_eq!(host.resolve_calls(), 0);
    }
}
