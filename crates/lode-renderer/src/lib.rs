//! Markdown compilation for Lode.
//!
//! This crate turns documentation text (READMEs, guides, doc comments) into
//! rendered content:
//!
//! - [`MarkdownCompiler`]: compiles markdown, with [`HtmlCompiler`] as the
//!   `pulldown-cmark` implementation
//! - [`parse_description`]: short description from front matter or the first
//!   paragraph
//! - [`find_references`]: locates `{@link}` symbol references for the link
//!   resolver to rewrite
//!
//! # Example
//!
//! ```
//! use lode_renderer::{HtmlCompiler, MarkdownCompiler};
//!
//! let rendered = HtmlCompiler::new().compile("# Hello\n\n**Bold** text").unwrap();
//! assert_eq!(rendered.title.as_deref(), Some("Hello"));
//! ```

mod compiler;
mod description;
mod front_matter;
mod references;

pub use compiler::{CompileError, HtmlCompiler, MarkdownCompiler, Rendered};
pub use description::{Description, parse_description};
pub use front_matter::{FrontMatter, parse_front_matter, split_front_matter};
pub use references::{SymbolRef, find_references, splice};
