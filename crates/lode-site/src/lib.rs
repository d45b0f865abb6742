//! Package and guide documentation for Lode.
//!
//! This crate provides:
//! - [`Site`]: entry point wiring repositories, packages and guides from
//!   configuration
//! - [`PackageBuilder`]: builds [`Package`] views of repository workspaces,
//!   including exported symbol docs
//! - [`Docs`]: lazily compiled guide documents with topic navigation
//! - [`LinkResolver`]: resolves `{@link}` references across package and
//!   version boundaries
//!
//! # Quick Start
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use lode_config::Config;
//! use lode_site::Site;
//!
//! let config = Config::load(None, None)?;
//! let site = Site::new(&config);
//!
//! for package in site.contrib_packages().await? {
//!     println!("{} {}", package.package_name, package.version);
//! }
//! # Ok(())
//! # }
//! ```

mod docs;
mod links;
mod package;
mod site;
mod symbols;

pub use docs::{Doc, DocError, DocIndex, DocMeta, Docs, Topic};
pub use links::{LibraryDocs, LinkResolver, LinkTarget, major_minor};
pub use package::{Dependency, MISSING_README, Package, PackageBuilder, PackageError, PackageLinks};
pub use site::{Site, SiteError};
pub use symbols::{
    DEFAULT_MODULE_KEY, DenoDocExtractor, DocNode, JsDoc, Location, RawSymbol,
    SymbolExtractionError, SymbolExtractor, SymbolKind, export_hash, extract_all,
    extract_doc_nodes, parse_deno_doc,
};
