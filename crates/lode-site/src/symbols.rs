//! Exported symbol documentation.
//!
//! Symbols are listed by an external static analyzer. The shipping
//! [`DenoDocExtractor`] runs `deno doc --json <url>`, which accepts remote
//! module URLs directly, so entrypoints never have to be checked out.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use lode_renderer::{MarkdownCompiler, Rendered};
use serde::Deserialize;
use tracing::{debug, warn};

/// Export key of a package's default entrypoint.
pub const DEFAULT_MODULE_KEY: &str = ".";

/// Error running the symbol extractor on one entrypoint.
///
/// Non-fatal: the entrypoint contributes no symbols.
#[derive(Clone, Debug, thiserror::Error)]
pub enum SymbolExtractionError {
    /// The extractor command could not be started.
    #[error("Failed to run {command}: {source}")]
    Spawn {
        /// Command name.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },
    /// The extractor exited unsuccessfully.
    #[error("Symbol extraction failed for {url}: {stderr}")]
    Failed {
        /// Entrypoint URL.
        url: String,
        /// Captured standard error.
        stderr: String,
    },
    /// The extractor output could not be parsed.
    #[error("Invalid extractor output for {url}: {message}")]
    Parse {
        /// Entrypoint URL.
        url: String,
        /// Parser message.
        message: String,
    },
}

/// Source location of a symbol.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Location {
    /// Module URL or path.
    pub filename: String,
    /// 1-based line.
    #[serde(default)]
    pub line: u32,
    /// 0-based column.
    #[serde(default)]
    pub col: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.col)
    }
}

/// Doc comment attached to a symbol.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct JsDoc {
    /// Free text of the comment, without tags.
    #[serde(default)]
    pub doc: Option<String>,
}

/// One symbol as reported by the extractor.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSymbol {
    /// Exported name.
    pub name: String,
    /// Extractor kind name (`function`, `typeAlias`, ...).
    pub kind: String,
    /// Declaration site.
    #[serde(default)]
    pub location: Location,
    /// `export`, `declare` or `private`.
    #[serde(default)]
    pub declaration_kind: Option<String>,
    /// Attached doc comment.
    #[serde(default)]
    pub js_doc: Option<JsDoc>,
}

/// Extractor output: newer releases wrap the node list in an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum DenoDocOutput {
    Versioned { nodes: Vec<RawSymbol> },
    Nodes(Vec<RawSymbol>),
}

impl DenoDocOutput {
    fn into_nodes(self) -> Vec<RawSymbol> {
        match self {
            Self::Versioned { nodes } | Self::Nodes(nodes) => nodes,
        }
    }
}

/// Parse `deno doc --json` output.
///
/// # Errors
///
/// Returns [`SymbolExtractionError::Parse`] if the output is not a node list.
pub fn parse_deno_doc(url: &str, json: &str) -> Result<Vec<RawSymbol>, SymbolExtractionError> {
    serde_json::from_str::<DenoDocOutput>(json)
        .map(DenoDocOutput::into_nodes)
        .map_err(|e| SymbolExtractionError::Parse {
            url: url.to_owned(),
            message: e.to_string(),
        })
}

/// Lists exported symbols of a module.
#[async_trait]
pub trait SymbolExtractor: Send + Sync {
    /// Extract the symbols exported by the module at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`SymbolExtractionError`] if the module cannot be analyzed.
    async fn extract_symbols(&self, url: &str) -> Result<Vec<RawSymbol>, SymbolExtractionError>;
}

/// Extractor that runs `deno doc --json`.
#[derive(Clone, Debug)]
pub struct DenoDocExtractor {
    command: String,
}

impl DenoDocExtractor {
    /// Create an extractor running `command` (normally `deno`).
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl SymbolExtractor for DenoDocExtractor {
    async fn extract_symbols(&self, url: &str) -> Result<Vec<RawSymbol>, SymbolExtractionError> {
        debug!("Running {} doc --json {url}", self.command);

        let output = tokio::process::Command::new(&self.command)
            .args(["doc", "--json", url])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SymbolExtractionError::Spawn {
                command: self.command.clone(),
                source: Arc::new(e),
            })?;

        if !output.status.success() {
            return Err(SymbolExtractionError::Failed {
                url: url.to_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        parse_deno_doc(url, &String::from_utf8_lossy(&output.stdout))
    }
}

/// Kind of an exported symbol.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Function,
    Class,
    Interface,
    TypeAlias,
    Variable,
    Enum,
    Namespace,
    /// Kind not known to Lode, kept verbatim.
    Other(String),
}

impl SymbolKind {
    /// Kind name as reported by the extractor, used in anchors.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::TypeAlias => "typeAlias",
            Self::Variable => "variable",
            Self::Enum => "enum",
            Self::Namespace => "namespace",
            Self::Other(kind) => kind,
        }
    }
}

impl From<&str> for SymbolKind {
    fn from(kind: &str) -> Self {
        match kind {
            "function" => Self::Function,
            "class" => Self::Class,
            "interface" => Self::Interface,
            "typeAlias" => Self::TypeAlias,
            "variable" => Self::Variable,
            "enum" => Self::Enum,
            "namespace" => Self::Namespace,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Documentation of one exported symbol.
#[derive(Clone, Debug, PartialEq)]
pub struct DocNode {
    /// Stable identifier unique within the owning package.
    pub id: String,
    /// Exported name.
    pub name: String,
    /// Symbol kind.
    pub kind: SymbolKind,
    /// Declaration site.
    pub location: Location,
    /// Raw doc comment text.
    pub doc: Option<String>,
    /// Compiled doc comment, absent when there is none or it failed to compile.
    pub rendered: Option<Rendered>,
}

impl DocNode {
    /// Anchor of this symbol on its package page (`{kind}_{name}`).
    #[must_use]
    pub fn anchor(&self) -> String {
        format!("{}_{}", self.kind, self.name)
    }
}

/// Identifier of a symbol within its package.
///
/// Symbols of the default entrypoint keep their name; symbols of other
/// entrypoints are prefixed with the module key so names never collide
/// across entrypoints.
#[must_use]
pub fn export_hash(module_key: &str, name: &str) -> String {
    if module_key == DEFAULT_MODULE_KEY {
        name.to_owned()
    } else {
        format!("{module_key}__{name}")
    }
}

/// Whether a raw symbol is part of the documented surface.
fn is_documented(symbol: &RawSymbol) -> bool {
    !matches!(symbol.kind.as_str(), "moduleDoc" | "import" | "reference")
        && symbol.declaration_kind.as_deref() != Some("private")
}

/// Extract and compile the symbols of one entrypoint.
///
/// Extraction failures are logged and yield no symbols. A doc comment that
/// fails to compile leaves its node without rendered content.
pub async fn extract_doc_nodes(
    extractor: &dyn SymbolExtractor,
    compiler: &dyn MarkdownCompiler,
    module_key: &str,
    url: &str,
) -> Vec<DocNode> {
    let symbols = match extractor.extract_symbols(url).await {
        Ok(symbols) => symbols,
        Err(e) => {
            warn!("Could not extract symbols from {url}: {e}");
            return Vec::new();
        }
    };

    symbols
        .into_iter()
        .filter(is_documented)
        .map(|symbol| {
            let doc = symbol
                .js_doc
                .and_then(|js_doc| js_doc.doc)
                .filter(|doc| !doc.trim().is_empty());

            let rendered = doc.as_deref().and_then(|doc| match compiler.compile(doc) {
                Ok(rendered) => Some(rendered),
                Err(e) => {
                    warn!(
                        "Could not compile doc string for {} at {}: {e}",
                        symbol.name, symbol.location
                    );
                    None
                }
            });

            DocNode {
                id: export_hash(module_key, &symbol.name),
                kind: SymbolKind::from(symbol.kind.as_str()),
                name: symbol.name,
                location: symbol.location,
                doc,
                rendered,
            }
        })
        .collect()
}

/// Extract every entrypoint of an export map concurrently.
///
/// Results keep the order of `entrypoints`.
pub async fn extract_all(
    extractor: &dyn SymbolExtractor,
    compiler: &dyn MarkdownCompiler,
    entrypoints: &[(String, String)],
) -> Vec<(String, Vec<DocNode>)> {
    let nodes = join_all(
        entrypoints
            .iter()
            .map(|(key, url)| extract_doc_nodes(extractor, compiler, key, url)),
    )
    .await;

    entrypoints
        .iter()
        .map(|(key, _)| key.clone())
        .zip(nodes)
        .collect()
}
