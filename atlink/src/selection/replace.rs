use crate::{ContextReference, ReferenceEncoding};

use super::state::Commit;

/// Input text after a committed reference was spliced in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Replacement {
    pub text: String,
    /// Byte offset just past the inserted reference and its trailing space.
    pub cursor: usize,
}

impl Commit {
    /// Splice this reference into `text`.
    ///
    /// With an inline trigger, the `@query` word is replaced. If the text no
    /// longer has an `@` at the trigger offset the reference is inserted at
    /// the cursor instead.
    pub fn apply(&self, text: &str, cursor: usize, encoding: ReferenceEncoding) -> Replacement {
        self.trigger_index
            .and_then(|trigger| {
                replacement_text(text, cursor, trigger, &self.reference, encoding)
            })
            .unwrap_or_else(|| {
                insert_at_cursor(text, cursor, &self.reference.encode(encoding))
            })
    }
}

fn clamp_cursor(text: &str, cursor: usize) -> usize {
    let mut cursor = cursor.min(text.len());
    while !text.is_char_boundary(cursor) {
        cursor -= 1;
    }
    cursor
}

/// Replace the `@query` word starting at `trigger_index` with the encoded
/// reference followed by a space. The word runs to the first whitespace at or
/// after `cursor`. Returns `None` when there is no `@` at `trigger_index`.
pub fn replacement_text(
    text: &str,
    cursor: usize,
    trigger_index: usize,
    reference: &ContextReference,
    encoding: ReferenceEncoding,
) -> Option<Replacement> {
    if !text.is_char_boundary(trigger_index) || !text[trigger_index..].starts_with('@') {
        return None;
    }
    let cursor = clamp_cursor(text, cursor).max(trigger_index);
    let word_end = text[cursor..]
        .find(char::is_whitespace)
        .map(|i| cursor + i)
        .unwrap_or(text.len());

    let before = &text[..trigger_index];
    let after = &text[word_end..];
    Some(splice(before, &reference.encode(encoding), after))
}

/// Insert `encoded` at `cursor`, padding with spaces where it would touch a word.
fn insert_at_cursor(text: &str, cursor: usize, encoded: &str) -> Replacement {
    let cursor = clamp_cursor(text, cursor);
    let before = &text[..cursor];
    let after = &text[cursor..];
    if before.chars().next_back().is_some_and(|c| !c.is_whitespace()) {
        splice(&format!("{before} "), encoded, after)
    } else {
        splice(before, encoded, after)
    }
}

fn splice(before: &str, encoded: &str, after: &str) -> Replacement {
    let mut text = String::with_capacity(before.len() + encoded.len() + after.len() + 1);
    text.push_str(before);
    text.push_str(encoded);
    // reuse existing whitespace instead of doubling it
    let gap = match after.chars().next() {
        Some(c) if c.is_whitespace() => c.len_utf8(),
        _ => {
            text.push(' ');
            0
        }
    };
    let cursor = text.len() + gap;
    text.push_str(after);
    Replacement { text, cursor }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(trigger_index: Option<usize>) -> Commit {
        Commit {
            reference: ContextReference::File {
                path: "src/main.rs".into(),
                full_path: "/repo/src/main.rs".into(),
            },
            trigger_index,
        }
    }

    #[test]
    fn replaces_query_at_end_of_text() {
        let r = commit(Some(6)).apply("check @mai", 10, ReferenceEncoding::Markdown);
        assert_eq!(r.text, "check [@main.rs](file:///repo/src/main.rs) ");
        assert_eq!(r.cursor, r.text.len());
    }

    #[test]
    fn replaces_whole_word_when_cursor_is_mid_query() {
        let r = commit(Some(0)).apply("@mai please", 2, ReferenceEncoding::Bare);
        assert_eq!(r.text, "@file:///repo/src/main.rs please");
        assert_eq!(&r.text[r.cursor..], "please");
    }

    #[test]
    fn lone_trigger_is_replaced() {
        let r = commit(Some(0)).apply("@", 1, ReferenceEncoding::Bare);
        assert_eq!(r.text, "@file:///repo/src/main.rs ");
    }

    #[test]
    fn stale_trigger_falls_back_to_cursor_insert() {
        let r = commit(Some(3)).apply("hello", 5, ReferenceEncoding::Bare);
        assert_eq!(r.text, "hello @file:///repo/src/main.rs ");
        assert_eq!(r.cursor, r.text.len());
    }

    #[test]
    fn add_context_inserts_at_cursor() {
        let r = commit(None).apply("look  here", 5, ReferenceEncoding::Bare);
        assert_eq!(r.text, "look @file:///repo/src/main.rs here");
        assert_eq!(&r.text[r.cursor..], "here");
    }

    #[test]
    fn multibyte_text_around_trigger() {
        let text = "ünïcode @ma ✓";
        let r = commit(Some(10)).apply(text, 13, ReferenceEncoding::Bare);
        assert_eq!(r.text, "ünïcode @file:///repo/src/main.rs ✓");
    }

    #[test]
    fn trigger_off_char_boundary_is_rejected() {
        let reference = commit(None).reference;
        assert_eq!(
            replacement_text("é@", 3, 1, &reference, ReferenceEncoding::Bare),
            None
        );
    }
}
