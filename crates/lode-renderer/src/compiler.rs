//! Markdown to HTML compilation.

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};

use crate::front_matter::{FrontMatter, parse_front_matter, split_front_matter};

/// Error compiling a single markdown input.
///
/// Compile failures never abort a batch: callers log them and continue with
/// the remaining inputs.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// The YAML front matter block could not be parsed.
    #[error("Invalid front matter: {0}")]
    FrontMatter(String),
}

/// Result of compiling markdown.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Rendered {
    /// Rendered HTML content.
    pub html: String,
    /// Title from front matter, or the first H1 heading.
    pub title: Option<String>,
    /// Parsed front matter (empty when the document has none).
    pub front_matter: FrontMatter,
}

/// Compiles markdown text into rendered content.
pub trait MarkdownCompiler: Send + Sync {
    /// Compile one markdown document.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError`] if this input cannot be compiled.
    fn compile(&self, markdown: &str) -> Result<Rendered, CompileError>;
}

/// HTML compiler backed by `pulldown-cmark`.
#[derive(Clone, Copy, Debug)]
pub struct HtmlCompiler {
    gfm: bool,
}

impl Default for HtmlCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlCompiler {
    /// Create a compiler with GFM enabled.
    #[must_use]
    pub fn new() -> Self {
        Self { gfm: true }
    }

    /// Enable or disable GitHub Flavored Markdown features.
    ///
    /// GFM is enabled by default. When enabled, the parser supports:
    /// - Tables
    /// - Strikethrough (`~~text~~`)
    /// - Task lists (`- [ ] item`)
    #[must_use]
    pub fn with_gfm(mut self, enabled: bool) -> Self {
        self.gfm = enabled;
        self
    }

    /// Parser options based on GFM configuration.
    #[must_use]
    pub fn parser_options(&self) -> Options {
        if self.gfm {
            Options::ENABLE_TABLES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS
                | Options::ENABLE_GFM
        } else {
            Options::empty()
        }
    }
}

impl MarkdownCompiler for HtmlCompiler {
    fn compile(&self, markdown: &str) -> Result<Rendered, CompileError> {
        let (yaml, body) = split_front_matter(markdown);
        let front_matter = match yaml {
            Some(yaml) => parse_front_matter(yaml)?,
            None => FrontMatter::default(),
        };

        let title = front_matter
            .title
            .clone()
            .or_else(|| first_heading(Parser::new_ext(body, self.parser_options())));

        let mut output = String::with_capacity(body.len() * 3 / 2);
        html::push_html(&mut output, Parser::new_ext(body, self.parser_options()));

        Ok(Rendered {
            html: output,
            title,
            front_matter,
        })
    }
}

/// Plain text of the first H1 heading.
fn first_heading<'a>(events: impl Iterator<Item = Event<'a>>) -> Option<String> {
    let mut inside = false;
    let mut text = String::new();

    for event in events {
        match event {
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }) => inside = true,
            Event::End(TagEnd::Heading(HeadingLevel::H1)) if inside => {
                let title = text.trim();
                return (!title.is_empty()).then(|| title.to_owned());
            }
            Event::Text(t) | Event::Code(t) if inside => text.push_str(&t),
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_compile_basic() {
        let rendered = HtmlCompiler::new()
            .compile("# Hello\n\n**Bold** text")
            .unwrap();

        assert!(rendered.html.contains("<h1>Hello</h1>"));
        assert!(rendered.html.contains("<strong>Bold</strong>"));
        assert_eq!(rendered.title.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_title_from_inline_code_heading() {
        let rendered = HtmlCompiler::new().compile("# The `spawn` operation").unwrap();
        assert_eq!(rendered.title.as_deref(), Some("The spawn operation"));
    }

    #[test]
    fn test_front_matter_title_wins() {
        let rendered = HtmlCompiler::new()
            .compile("---\ntitle: Spawning\n---\n# Spawn\n")
            .unwrap();

        assert_eq!(rendered.title.as_deref(), Some("Spawning"));
        assert!(!rendered.html.contains("title:"));
    }

    #[test]
    fn test_no_title() {
        let rendered = HtmlCompiler::new().compile("## Only a subheading").unwrap();
        assert!(rendered.title.is_none());
    }

    #[test]
    fn test_gfm_table() {
        let markdown = "| a | b |\n|---|---|\n| 1 | 2 |";

        let with_gfm = HtmlCompiler::new().compile(markdown).unwrap();
        let without_gfm = HtmlCompiler::new().with_gfm(false).compile(markdown).unwrap();

        assert!(with_gfm.html.contains("<table>"));
        assert!(!without_gfm.html.contains("<table>"));
    }

    #[test]
    fn test_invalid_front_matter_fails() {
        let err = HtmlCompiler::new()
            .compile("---\ntitle: [oops\n---\nBody")
            .unwrap_err();
        assert!(matches!(err, CompileError::FrontMatter(_)));
    }
}
