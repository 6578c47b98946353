/// Character that opens an inline context query.
pub const TRIGGER: char = '@';

/// An `@` query found under the cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtQuery<'a> {
    /// Byte offset of the `@`.
    pub trigger_index: usize,
    /// Text after the `@` up to the end of the word the cursor is in.
    pub query: &'a str,
}

impl AtQuery<'_> {
    /// Byte offset one past the end of the query.
    pub fn end_index(&self) -> usize {
        self.trigger_index + TRIGGER.len_utf8() + self.query.len()
    }
}

/// Scan backwards from `cursor` for the `@` that opens the current word.
/// The `@` must be at start of text or preceded by whitespace, so `foo@bar`
/// does not trigger. Whitespace before any `@` ends the scan.
/// `cursor` is a byte offset; past-the-end values are clamped.
pub fn detect(text: &str, cursor: usize) -> Option<AtQuery<'_>> {
    let cursor = cursor.min(text.len());
    if !text.is_char_boundary(cursor) {
        return None;
    }
    let before = &text[..cursor];
    let (trigger_index, _) = before
        .char_indices()
        .rev()
        .find(|(_, c)| *c == TRIGGER || c.is_whitespace())
        .filter(|(_, c)| *c == TRIGGER)?;

    let preceded_ok = before[..trigger_index]
        .chars()
        .next_back()
        .is_none_or(char::is_whitespace);
    if !preceded_ok {
        return None;
    }

    let query_start = trigger_index + TRIGGER.len_utf8();
    let query_end = text[cursor..]
        .find(char::is_whitespace)
        .map(|i| cursor + i)
        .unwrap_or(text.len());
    Some(AtQuery {
        trigger_index,
        query: &text[query_start..query_end],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(text: &str, cursor: usize) -> Option<(usize, &str)> {
        detect(text, cursor).map(|q| (q.trigger_index, q.query))
    }

    #[test]
    fn query_after_space() {
        assert_eq!(at("hello @wor", 10), Some((6, "wor")));
    }

    #[test]
    fn mid_word_at_does_not_trigger() {
        assert_eq!(at("a@b", 3), None);
        assert_eq!(at("mail foo@bar.com", 16), None);
    }

    #[test]
    fn lone_trigger() {
        assert_eq!(at("@", 1), Some((0, "")));
    }

    #[test]
    fn cursor_before_trigger_finds_nothing() {
        assert_eq!(at("@abc", 0), None);
        assert_eq!(at("", 0), None);
    }

    #[test]
    fn whitespace_between_trigger_and_cursor_stops_scan() {
        assert_eq!(at("@abc def", 8), None);
        assert_eq!(at("@abc\tdef", 8), None);
        assert_eq!(at("@abc ", 5), None);
    }

    #[test]
    fn query_extends_past_cursor_to_word_end() {
        assert_eq!(at("see @src/main.rs please", 7), Some((4, "src/main.rs")));
        assert_eq!(at("@abc", 2), Some((0, "abc")));
    }

    #[test]
    fn query_after_newline() {
        assert_eq!(at("line one\n@Rea", 13), Some((9, "Rea")));
    }

    #[test]
    fn cursor_right_after_trigger_mid_text() {
        assert_eq!(at("x @ y", 3), Some((2, "")));
    }

    #[test]
    fn nearest_trigger_wins() {
        assert_eq!(at("@a @b", 5), Some((3, "b")));
        assert_eq!(at("@a@b", 4), None);
    }

    #[test]
    fn cursor_past_end_is_clamped() {
        assert_eq!(at("@ab", 99), Some((0, "ab")));
    }

    #[test]
    fn multibyte_text() {
        let text = "héllo @wörld";
        let cursor = text.len();
        assert_eq!(at(text, cursor), Some((7, "wörld")));
        // inside the two-byte 'é'
        assert_eq!(at(text, 2), None);
    }

    #[test]
    fn end_index_covers_query() {
        let q = detect("hi @foo bar", 5).unwrap();
        assert_eq!(q.end_index(), 7);
    }
}
