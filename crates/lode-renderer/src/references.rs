//! `{@link}` symbol references in documentation prose.
//!
//! Doc comments and READMEs refer to symbols with JSDoc inline tags:
//!
//! - `{@link spawn}`: a symbol
//! - `{@link Task.halt}` or `{@link Task#halt}`: a member of a symbol
//! - `{@link spawn | label}` or `{@link spawn label}`: a symbol with link text
//! - `{@linkcode spawn}`: same as `{@link}`, rendered as code by the caller
//!
//! Names are captured whole, so `{@link MAX_SIZE}` and `{@link Task_halt}`
//! both yield a single symbol; telling a symbol from a same-page anchor is up
//! to the resolver. Tags inside inline code or code blocks are left alone.
//!
//! This module only finds references. Resolving them to links is up to the
//! caller, which then splices the replacements back with [`splice`].

use std::ops::Range;
use std::sync::LazyLock;

use pulldown_cmark::{Event, Parser, Tag};
use regex::Regex;

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\{@link(code)?\s+([A-Za-z0-9$_]+)(?:([.#])([A-Za-z0-9$_]+))?(?:(?:\s*\|\s*|\s+)([^}]*?))?\s*\}",
    )
    .unwrap()
});

/// A `{@link}` reference found in text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolRef {
    /// Byte range of the whole tag in the source text.
    pub range: Range<usize>,
    /// Referenced symbol.
    pub symbol: String,
    /// `.` or `#` when a member is referenced.
    pub connector: Option<String>,
    /// Referenced member.
    pub method: Option<String>,
    /// Link text given after the name.
    pub label: Option<String>,
    /// Whether the tag was `{@linkcode}`.
    pub code: bool,
}

/// Find every `{@link}` and `{@linkcode}` reference in `text`, in order.
///
/// Tags inside inline code spans and code blocks are skipped.
#[must_use]
pub fn find_references(text: &str) -> Vec<SymbolRef> {
    let code = code_ranges(text);

    LINK_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if code.iter().any(|range| range.contains(&whole.start())) {
                return None;
            }
            Some(SymbolRef {
                range: whole.range(),
                symbol: caps.get(2)?.as_str().to_owned(),
                connector: caps.get(3).map(|m| m.as_str().to_owned()),
                method: caps.get(4).map(|m| m.as_str().to_owned()),
                label: caps
                    .get(5)
                    .map(|m| m.as_str().trim())
                    .filter(|label| !label.is_empty())
                    .map(str::to_owned),
                code: caps.get(1).is_some(),
            })
        })
        .collect()
}

/// Byte ranges of inline code spans and code blocks.
fn code_ranges(text: &str) -> Vec<Range<usize>> {
    Parser::new(text)
        .into_offset_iter()
        .filter_map(|(event, range)| match event {
            Event::Code(_) | Event::Start(Tag::CodeBlock(_)) => Some(range),
            _ => None,
        })
        .collect()
}

/// Replace each reference's range with its replacement.
///
/// `refs` must come from [`find_references`] on the same `text`, and
/// `replacements` must be parallel to `refs`. Extra entries on either side
/// are ignored.
#[must_use]
pub fn splice(text: &str, refs: &[SymbolRef], replacements: &[String]) -> String {
    let mut output = String::with_capacity(text.len());
    let mut cursor = 0;

    for (reference, replacement) in refs.iter().zip(replacements) {
        output.push_str(&text[cursor..reference.range.start]);
        output.push_str(replacement);
        cursor = reference.range.end;
    }
    output.push_str(&text[cursor..]);

    output
}
