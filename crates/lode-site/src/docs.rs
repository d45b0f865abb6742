//! Guide documents.
//!
//! Guides are markdown files listed in a structure file, grouped by topic:
//!
//! ```json
//! {
//!   "Getting Started": [["installation.mdx", "Installation"], ["tutorial.mdx", "Tutorial"]],
//!   "Learn": [["operations.mdx", "Operations"]]
//! }
//! ```
//!
//! The first request builds a task table: every declared document gets its
//! [`DocMeta`] and a spawned compile task. The table is built once and never
//! rebuilt; later requests await the existing tasks. A document that fails
//! to compile only fails its own task.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use lode_renderer::{CompileError, MarkdownCompiler, Rendered};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

type DocTask = Shared<BoxFuture<'static, Result<Arc<Doc>, DocError>>>;

/// Error loading guide documents.
#[derive(Clone, Debug, thiserror::Error)]
pub enum DocError {
    /// The structure file could not be read or parsed.
    #[error("Invalid docs structure {}: {message}", path.display())]
    Structure {
        /// Structure file path.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },
    /// A document source could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        /// Source file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },
    /// A document failed to compile.
    #[error("Failed to compile {id}: {source}")]
    Compile {
        /// Document id.
        id: String,
        /// Compiler error.
        #[source]
        source: CompileError,
    },
    /// The compile task was cancelled or panicked.
    #[error("Compile task for {id} failed: {message}")]
    Task {
        /// Document id.
        id: String,
        /// Join error message.
        message: String,
    },
}

/// Navigation metadata of one document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocMeta {
    /// File name without extension.
    pub id: String,
    pub title: String,
    /// File name relative to the source directory.
    pub filename: String,
    /// Index of the owning topic in [`DocIndex::topics`].
    pub topic: usize,
    /// Index of the previous document of the same topic.
    pub prev: Option<usize>,
    /// Index of the next document of the same topic.
    pub next: Option<usize>,
}

/// An ordered group of documents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topic {
    pub name: String,
    /// Indices into [`DocIndex::metas`], in declaration order.
    pub items: Vec<usize>,
}

/// Immutable navigation view over all declared documents.
///
/// `prev`/`next` links are indices assigned once from declaration order.
#[derive(Debug, Default)]
pub struct DocIndex {
    metas: Vec<DocMeta>,
    topics: Vec<Topic>,
    by_id: HashMap<String, usize>,
}

impl DocIndex {
    /// Build the index from `(topic, [(filename, title)])` declarations.
    ///
    /// Documents whose id was already declared are skipped.
    #[must_use]
    pub fn new(structure: Vec<(String, Vec<(String, String)>)>) -> Self {
        let mut index = Self::default();

        for (name, entries) in structure {
            let topic = index.topics.len();
            let mut items: Vec<usize> = Vec::with_capacity(entries.len());

            for (filename, title) in entries {
                let id = doc_id(&filename);
                if index.by_id.contains_key(&id) {
                    warn!("Skipping duplicate document {id} ({filename})");
                    continue;
                }

                let position = index.metas.len();
                let prev = items.last().copied();
                if let Some(prev) = prev {
                    index.metas[prev].next = Some(position);
                }

                index.by_id.insert(id.clone(), position);
                index.metas.push(DocMeta {
                    id,
                    title,
                    filename,
                    topic,
                    prev,
                    next: None,
                });
                items.push(position);
            }

            index.topics.push(Topic { name, items });
        }

        index
    }

    /// All documents in declaration order.
    #[must_use]
    pub fn metas(&self) -> &[DocMeta] {
        &self.metas
    }

    /// Topics in declaration order.
    #[must_use]
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&DocMeta> {
        self.by_id.get(id).map(|&i| &self.metas[i])
    }

    #[must_use]
    pub fn prev(&self, meta: &DocMeta) -> Option<&DocMeta> {
        meta.prev.map(|i| &self.metas[i])
    }

    #[must_use]
    pub fn next(&self, meta: &DocMeta) -> Option<&DocMeta> {
        meta.next.map(|i| &self.metas[i])
    }

    /// Topic owning a document.
    #[must_use]
    pub fn topic_of(&self, meta: &DocMeta) -> &Topic {
        &self.topics[meta.topic]
    }

    /// Documents of a topic in order.
    pub fn items<'a>(&'a self, topic: &'a Topic) -> impl Iterator<Item = &'a DocMeta> + 'a {
        topic.items.iter().map(|&i| &self.metas[i])
    }
}

/// Document id: file name without directories and extension.
fn doc_id(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map_or_else(|| filename.to_owned(), |stem| stem.to_string_lossy().into_owned())
}

/// A compiled guide document.
#[derive(Clone, Debug)]
pub struct Doc {
    pub meta: DocMeta,
    /// Markdown source.
    pub markdown: String,
    pub content: Rendered,
}

/// Parse the structure file, keeping topic order.
fn parse_structure(
    path: &Path,
    json: &str,
) -> Result<Vec<(String, Vec<(String, String)>)>, DocError> {
    let invalid = |message: String| DocError::Structure {
        path: path.to_path_buf(),
        message,
    };

    let topics: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(json).map_err(|e| invalid(e.to_string()))?;

    topics
        .into_iter()
        .map(|(name, entries)| {
            let entries: Vec<(String, String)> = serde_json::from_value(entries)
                .map_err(|e| invalid(format!("topic {name}: {e}")))?;
            Ok((name, entries))
        })
        .collect()
}

struct Table {
    index: Arc<DocIndex>,
    tasks: HashMap<String, DocTask>,
}

/// Lazily compiled guide documents.
pub struct Docs {
    source_dir: PathBuf,
    structure: PathBuf,
    compiler: Arc<dyn MarkdownCompiler>,
    table: OnceCell<Table>,
}

impl Docs {
    /// Create a document set. Nothing is read until first access.
    ///
    /// # Arguments
    ///
    /// * `source_dir` - Directory document file names are relative to
    /// * `structure` - Path of the structure file
    /// * `compiler` - Compiler used for every document
    #[must_use]
    pub fn new(
        source_dir: impl Into<PathBuf>,
        structure: impl Into<PathBuf>,
        compiler: Arc<dyn MarkdownCompiler>,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            structure: structure.into(),
            compiler,
            table: OnceCell::new(),
        }
    }

    /// All documents that compiled, in declaration order.
    ///
    /// Failed documents are logged and omitted.
    ///
    /// # Errors
    ///
    /// Returns [`DocError::Structure`] if the structure file cannot be loaded.
    pub async fn all(&self) -> Result<Vec<Arc<Doc>>, DocError> {
        let table = self.table().await?;

        let tasks = table
            .index
            .metas()
            .iter()
            .filter_map(|meta| table.tasks.get(&meta.id).cloned());

        Ok(join_all(tasks)
            .await
            .into_iter()
            .filter_map(|result| match result {
                Ok(doc) => Some(doc),
                Err(e) => {
                    warn!("{e}");
                    None
                }
            })
            .collect())
    }

    /// Get a document by id.
    ///
    /// `None` or an unknown id yields `Ok(None)`; no document is loaded for
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns the document's own [`DocError`] if it failed, or
    /// [`DocError::Structure`] if the structure file cannot be loaded.
    pub async fn get_doc(&self, id: Option<&str>) -> Result<Option<Arc<Doc>>, DocError> {
        let Some(id) = id else {
            return Ok(None);
        };

        let table = self.table().await?;
        match table.tasks.get(id) {
            Some(task) => task.clone().await.map(Some),
            None => Ok(None),
        }
    }

    /// Navigation index of all declared documents.
    ///
    /// # Errors
    ///
    /// Returns [`DocError::Structure`] if the structure file cannot be loaded.
    pub async fn index(&self) -> Result<Arc<DocIndex>, DocError> {
        Ok(Arc::clone(&self.table().await?.index))
    }

    async fn table(&self) -> Result<&Table, DocError> {
        self.table.get_or_try_init(|| self.load()).await
    }

    async fn load(&self) -> Result<Table, DocError> {
        let json = tokio::fs::read_to_string(&self.structure)
            .await
            .map_err(|e| DocError::Structure {
                path: self.structure.clone(),
                message: e.to_string(),
            })?;
        let index = DocIndex::new(parse_structure(&self.structure, &json)?);

        info!("Loading {} documents", index.metas().len());

        let tasks = index
            .metas()
            .iter()
            .map(|meta| (meta.id.clone(), self.spawn_compile(meta.clone())))
            .collect();

        Ok(Table {
            index: Arc::new(index),
            tasks,
        })
    }

    fn spawn_compile(&self, meta: DocMeta) -> DocTask {
        let id = meta.id.clone();
        let path = self.source_dir.join(&meta.filename);
        let compiler = Arc::clone(&self.compiler);

        let handle = tokio::spawn(async move {
            debug!("Compiling {}", path.display());

            let markdown = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| DocError::Read {
                    path: path.clone(),
                    source: Arc::new(e),
                })?;

            let content = compiler.compile(&markdown).map_err(|source| DocError::Compile {
                id: meta.id.clone(),
                source,
            })?;

            Ok(Arc::new(Doc {
                meta,
                markdown,
                content,
            }))
        });

        handle
            .map(move |joined| {
                joined.unwrap_or_else(|e| {
                    Err(DocError::Task {
                        id,
                        message: e.to_string(),
                    })
                })
            })
            .boxed()
            .shared()
    }
}

impl std::fmt::Debug for Docs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Docs")
            .field("source_dir", &self.source_dir)
            .field("structure", &self.structure)
            .field("loaded", &self.table.initialized())
            .finish_non_exhaustive()
    }
}
