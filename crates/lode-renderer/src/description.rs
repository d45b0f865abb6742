//! Short description extraction.

use pulldown_cmark::{Event, Parser, Tag, TagEnd};

use crate::front_matter::{parse_front_matter, split_front_matter};

/// Short plain-text description of a document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Description {
    /// Description text, if one could be derived.
    pub text: Option<String>,
}

/// Derive a description from markdown.
///
/// Uses the front matter `description` when present, otherwise the plain
/// text of the first paragraph. Malformed front matter is ignored.
#[must_use]
pub fn parse_description(markdown: &str) -> Description {
    let (yaml, body) = split_front_matter(markdown);

    let from_front_matter = yaml
        .and_then(|yaml| parse_front_matter(yaml).ok())
        .and_then(|fm| fm.description)
        .filter(|d| !d.trim().is_empty());

    Description {
        text: from_front_matter.or_else(|| first_paragraph(body)),
    }
}

fn first_paragraph(markdown: &str) -> Option<String> {
    let mut inside = false;
    let mut text = String::new();

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Paragraph) => inside = true,
            Event::End(TagEnd::Paragraph) if inside => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_owned());
                }
                inside = false;
                text.clear();
            }
            Event::Text(t) | Event::Code(t) if inside => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak if inside => text.push(' '),
            _ => {}
        }
    }

    None
}
