//! Inline `@` references inside message text.
//!
//! Two encodings are recognized and both stay parseable indefinitely, since
//! messages keep whatever encoding was current when they were sent:
//!
//! - Markdown link: `[@name](scheme://path)`
//! - bare token: `@scheme://path`, ended by the first whitespace
//!
//! [`parse_references`] rewrites them into short display forms (`@name`) and
//! reports where each one landed. The raw text is what downstream consumers
//! get; [`expand_for_downstream`] is deliberately the identity.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::ContextReference;

static MARKDOWN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[@([^\]\n]+)\]\(([A-Za-z][A-Za-z0-9+.\-]*://[^)\s]+)\)")
        .expect("markdown reference pattern is valid")
});

static BARE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@([A-Za-z][A-Za-z0-9+.\-]*://\S+)").expect("bare reference pattern is valid")
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceKind {
    File,
    Web,
}

/// One reference located in display text. Offsets are byte offsets into
/// [`ParsedReferences::display_text`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineReference {
    /// What the reader sees, e.g. `@main`.
    pub display_text: String,
    /// The raw token as written in the source text.
    pub full_path: String,
    pub kind: ReferenceKind,
    pub start_index: usize,
    pub end_index: usize,
}

impl InlineReference {
    /// The `scheme://path` this reference points at.
    pub fn target(&self) -> &str {
        if let Some(caps) = MARKDOWN_RE.captures(&self.full_path)
            && let Some(m) = caps.get(2)
        {
            return m.as_str();
        }
        self.full_path.strip_prefix('@').unwrap_or(&self.full_path)
    }

    pub fn to_context_reference(&self) -> ContextReference {
        let target = self.target();
        match self.kind {
            ReferenceKind::Web => ContextReference::Web {
                url: target.to_string(),
                title: None,
            },
            ReferenceKind::File => ContextReference::File {
                path: label_for_uri(target),
                full_path: percent_decode(target.strip_prefix("file://").unwrap_or(target)),
            },
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ParsedReferences {
    pub display_text: String,
    pub references: Vec<InlineReference>,
}

impl ParsedReferences {
    pub fn context_references(&self) -> Vec<ContextReference> {
        self.references
            .iter()
            .map(InlineReference::to_context_reference)
            .collect()
    }
}

/// A match in the raw text, before display offsets are known.
struct RawSpan {
    start: usize,
    end: usize,
    display: String,
    kind: ReferenceKind,
}

fn scheme_of(uri: &str) -> &str {
    uri.split_once("://").map(|(s, _)| s).unwrap_or("")
}

fn kind_of(uri: &str) -> ReferenceKind {
    match scheme_of(uri).to_ascii_lowercase().as_str() {
        "http" | "https" => ReferenceKind::Web,
        _ => ReferenceKind::File,
    }
}

/// Host part of a URL (`https://docs.rs/x` -> `docs.rs`).
pub(crate) fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    if end == 0 { rest } else { &rest[..end] }
}

/// Decode `%XX` escapes written by [`ContextReference::uri`]. Text that does
/// not decode to UTF-8 is kept as written.
fn percent_decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| s.to_string())
}

/// Trim a label so it cannot end in the start of a `://`.
fn clean_label(label: &str) -> Option<&str> {
    if label.contains("://") {
        return None;
    }
    let label = label.trim_end_matches([':', '/']);
    (!label.is_empty()).then_some(label)
}

/// Short label for a target: the file name for `file://`, the host otherwise.
fn label_for_uri(uri: &str) -> String {
    let label = match kind_of(uri) {
        ReferenceKind::Web => host_of(uri).to_string(),
        ReferenceKind::File => {
            let rest = uri.split_once("://").map(|(_, r)| r).unwrap_or(uri);
            let rest = rest.split(['#', '?']).next().unwrap_or(rest);
            let trimmed = rest.trim_end_matches('/');
            percent_decode(trimmed.rsplit('/').next().unwrap_or(trimmed))
        }
    };
    clean_label(&label).unwrap_or("link").to_string()
}

fn overlaps(spans: &[RawSpan], start: usize, end: usize) -> bool {
    spans.iter().any(|s| start < s.end && s.start < end)
}

/// Inserted after the `:` of a leftover `://` so the display text never
/// parses as a reference again.
const WORD_JOINER: char = '\u{2060}';

/// Whether `://` appended to `before` would complete a reference on a rescan.
fn completes_reference(before: &str) -> bool {
    let scheme_start = before
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_alphanumeric() || matches!(*c, '+' | '.' | '-'))
        .last()
        .map_or(before.len(), |(i, _)| i);
    let head = &before[..scheme_start];
    if let Some(rest) = head.strip_suffix('@')
        && rest.chars().next_back().is_none_or(char::is_whitespace)
    {
        return true;
    }
    head.ends_with("](")
        && head
            .rsplit('\n')
            .next()
            .is_some_and(|line| line.contains("[@"))
}

/// Append text that lies between references, breaking any `://` that would
/// otherwise join with what precedes it into a new reference.
fn push_inert(out: &mut String, gap: &str) {
    let mut rest = gap;
    while let Some(i) = rest.find("://") {
        out.push_str(&rest[..i]);
        let inert = completes_reference(out);
        out.push(':');
        if inert {
            out.push(WORD_JOINER);
        }
        rest = &rest[i + 1..];
    }
    out.push_str(rest);
}

/// Find every reference in `text` and produce its display form.
///
/// Parsing the resulting display text again finds no references.
pub fn parse_references(text: &str) -> ParsedReferences {
    let mut spans: Vec<RawSpan> = MARKDOWN_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?.as_str();
            let uri = caps.get(2)?.as_str();
            let label = clean_label(name)
                .map_or_else(|| label_for_uri(uri), str::to_string);
            Some(RawSpan {
                start: whole.start(),
                end: whole.end(),
                display: format!("@{label}"),
                kind: kind_of(uri),
            })
        })
        .collect();

    let markdown_count = spans.len();
    for caps in BARE_RE.captures_iter(text) {
        let (Some(whole), Some(uri)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let at_word_start = text[..whole.start()]
            .chars()
            .next_back()
            .is_none_or(char::is_whitespace);
        if !at_word_start || overlaps(&spans[..markdown_count], whole.start(), whole.end()) {
            continue;
        }
        spans.push(RawSpan {
            start: whole.start(),
            end: whole.end(),
            display: format!("@{}", label_for_uri(uri.as_str())),
            kind: kind_of(uri.as_str()),
        });
    }
    spans.sort_by_key(|s| s.start);

    let mut display_text = String::with_capacity(text.len());
    let mut references = Vec::with_capacity(spans.len());
    let mut cursor = 0;
    for span in spans {
        push_inert(&mut display_text, &text[cursor..span.start]);
        let start_index = display_text.len();
        display_text.push_str(&span.display);
        references.push(InlineReference {
            display_text: span.display,
            full_path: text[span.start..span.end].to_string(),
            kind: span.kind,
            start_index,
            end_index: display_text.len(),
        });
        cursor = span.end;
    }
    push_inert(&mut display_text, &text[cursor..]);

    ParsedReferences {
        display_text,
        references,
    }
}

/// Text handed to the model. Raw `@scheme://path` tokens pass through
/// unmodified even though the UI shows a shortened form.
pub fn expand_for_downstream(text: &str) -> Cow<'_, str> {
    Cow::Borrowed(text)
}

/// Whether every span lies inside `text` on char boundaries, matches its
/// display text, and does not overlap its neighbours.
pub fn spans_valid(text: &str, references: &[InlineReference]) -> bool {
    let mut prev_end = 0;
    for r in references {
        if r.start_index < prev_end
            || r.end_index < r.start_index
            || r.end_index > text.len()
            || !text.is_char_boundary(r.start_index)
            || !text.is_char_boundary(r.end_index)
            || text[r.start_index..r.end_index] != r.display_text
        {
            return false;
        }
        prev_end = r.end_index;
    }
    true
}

/// Reuse `parsed` if it still describes `display`, otherwise re-scan `raw`.
pub fn revalidate(raw: &str, display: &str, parsed: ParsedReferences) -> ParsedReferences {
    if parsed.display_text == display && spans_valid(display, &parsed.references) {
        return parsed;
    }
    tracing::debug!("inline reference spans drifted; rescanning");
    parse_references(raw)
}
