//! Site facade.
//!
//! [`Site`] wires repositories, the package builder, guide documents and the
//! library docs provider together from a [`Config`]. Everything it owns is
//! memoized for the lifetime of the site, so one `Site` should be shared by
//! all requests.

use std::sync::Arc;

use futures::future::join_all;
use lode_config::Config;
use lode_renderer::{HtmlCompiler, MarkdownCompiler};
use lode_repo::{GitHubHost, RepoError, Repository, RepositoryHost, Workspace};
use tracing::info;

use crate::docs::Docs;
use crate::links::{LibraryDocs, LinkResolver};
use crate::package::{Package, PackageBuilder, PackageError};
use crate::symbols::{DenoDocExtractor, SymbolExtractor};

/// Error returned by [`Site`] lookups.
#[derive(Clone, Debug, thiserror::Error)]
pub enum SiteError {
    /// No workspace with that path in the contrib repository.
    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),
    /// The package could not be built.
    #[error(transparent)]
    Package(#[from] PackageError),
    /// Remote access failed.
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Content resolution entry point.
pub struct Site {
    library: Arc<Repository>,
    contrib: Arc<Repository>,
    builder: PackageBuilder,
    library_docs: Arc<LibraryDocs>,
    docs: Docs,
}

impl Site {
    /// Create a site talking to GitHub and running the configured extractor.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let host = GitHubHost::new(
            &config.github.api_url,
            &config.github.raw_url,
            config.github.token().map(str::to_owned),
        );
        Self::with_backends(
            config,
            Arc::new(host),
            Arc::new(DenoDocExtractor::new(&config.extractor.command)),
            Arc::new(HtmlCompiler::new()),
        )
    }

    /// Create a site with explicit backends.
    ///
    /// # Arguments
    ///
    /// * `config` - Repository, tag and docs settings
    /// * `host` - Host serving both repositories
    /// * `extractor` - Symbol extractor for package entrypoints
    /// * `compiler` - Compiler for READMEs, doc comments and guides
    #[must_use]
    pub fn with_backends(
        config: &Config,
        host: Arc<dyn RepositoryHost>,
        extractor: Arc<dyn SymbolExtractor>,
        compiler: Arc<dyn MarkdownCompiler>,
    ) -> Self {
        info!(
            "Using library {}@{} and contrib {}@{}",
            config.library.repository,
            config.library.default_ref,
            config.contrib.repository,
            config.contrib.default_ref
        );

        let library = Arc::new(Repository::new(
            &config.library.repository,
            &config.library.default_ref,
            Arc::clone(&host),
        ));
        let contrib = Arc::new(Repository::new(
            &config.contrib.repository,
            &config.contrib.default_ref,
            host,
        ));
        let builder = PackageBuilder::new(extractor, Arc::clone(&compiler));
        let library_docs = Arc::new(LibraryDocs::new(
            Arc::clone(&library),
            builder.clone(),
            &config.library.tag_prefix,
            config.library.dependency_names.clone(),
        ));
        let docs = Docs::new(
            &config.docs_resolved.source_dir,
            &config.docs_resolved.structure,
            compiler,
        );

        Self {
            library,
            contrib,
            builder,
            library_docs,
            docs,
        }
    }

    /// Library repository.
    #[must_use]
    pub fn library(&self) -> &Arc<Repository> {
        &self.library
    }

    /// Contributor repository.
    #[must_use]
    pub fn contrib(&self) -> &Arc<Repository> {
        &self.contrib
    }

    /// Guide documents.
    #[must_use]
    pub fn docs(&self) -> &Docs {
        &self.docs
    }

    /// Workspaces of the contrib repository at its default ref.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError`] if the ref or root manifest cannot be read.
    pub async fn contrib_workspaces(&self) -> Result<Vec<Workspace>, RepoError> {
        self.contrib.resolve_default().await?.list_workspaces().await
    }

    /// Public packages of the contrib repository.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError`] if the ref or root manifest cannot be read.
    pub async fn contrib_packages(&self) -> Result<Vec<Package>, RepoError> {
        let snapshot = self.contrib.resolve_default().await?;
        self.builder.build_public(&snapshot).await
    }

    /// Every contrib workspace with its build result, in declaration order.
    ///
    /// Unlike [`contrib_packages`](Self::contrib_packages), private and
    /// failing workspaces are kept.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError`] if the ref or root manifest cannot be read.
    pub async fn contrib_inventory(
        &self,
    ) -> Result<Vec<(Workspace, Result<Package, PackageError>)>, RepoError> {
        let snapshot = self.contrib.resolve_default().await?;
        let workspaces = snapshot.list_workspaces().await?;
        let results = join_all(workspaces.iter().map(|ws| self.builder.build(&snapshot, ws))).await;
        Ok(workspaces.into_iter().zip(results).collect())
    }

    /// Build one contrib package by workspace path.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::WorkspaceNotFound`] for unknown paths, otherwise
    /// the build or repository error.
    pub async fn contrib_package(&self, workspace: &str) -> Result<Package, SiteError> {
        let snapshot = self.contrib.resolve_default().await?;
        let Some(found) = snapshot.find_workspace(workspace).await? else {
            return Err(SiteError::WorkspaceNotFound(workspace.to_owned()));
        };
        Ok(self.builder.build(&snapshot, &found).await?)
    }

    /// Root package of the library at its default ref.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError`] if the ref cannot be resolved or the package
    /// fails to build.
    pub async fn library_package(&self) -> Result<Package, PackageError> {
        let snapshot = self.library.resolve_default().await?;
        self.builder.build_root(&snapshot).await
    }

    /// A link resolver for one rendering pass over `package`.
    #[must_use]
    pub fn link_resolver(&self, package: Arc<Package>) -> LinkResolver {
        LinkResolver::new(package, Arc::clone(&self.library_docs))
    }

    /// Star count of the library repository.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Unavailable`] if the host cannot be queried.
    pub async fn library_stars(&self) -> Result<u64, RepoError> {
        self.library.star_count().await
    }
}

impl std::fmt::Debug for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Site")
            .field("library", &self.library)
            .field("contrib", &self.contrib)
            .field("docs", &self.docs)
            .finish_non_exhaustive()
    }
}
