//! YAML front matter.
//!
//! A document may start with a YAML block fenced by `---` lines:
//!
//! ```markdown
//! ---
//! title: Spawn
//! description: Run operations concurrently
//! ---
//!
//! # Spawn
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::CompileError;

/// Parsed front matter fields.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct FrontMatter {
    /// Document title.
    pub title: Option<String>,
    /// Short description used for previews.
    pub description: Option<String>,
    /// Any other keys.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Split a document into its front matter block and body.
///
/// Returns `(None, markdown)` when the document has no front matter. The
/// opening fence must be the very first line.
#[must_use]
pub fn split_front_matter(markdown: &str) -> (Option<&str>, &str) {
    let Some(rest) = markdown
        .strip_prefix("---\n")
        .or_else(|| markdown.strip_prefix("---\r\n"))
    else {
        return (None, markdown);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }

    (None, markdown)
}

/// Parse a front matter block.
///
/// Empty blocks yield default (empty) front matter.
///
/// # Errors
///
/// Returns [`CompileError::FrontMatter`] if the YAML is malformed.
pub fn parse_front_matter(yaml: &str) -> Result<FrontMatter, CompileError> {
    let trimmed = yaml.trim();
    if trimmed.is_empty() {
        return Ok(FrontMatter::default());
    }

    serde_yaml::from_str(trimmed).map_err(|e| CompileError::FrontMatter(e.to_string()))
}
