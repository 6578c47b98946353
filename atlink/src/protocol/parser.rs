use super::message::CliMessage;
use super::normalize::normalize_fields;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("line is not a JSON object")]
    NotJson,
    #[error("decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Cheap pre-filter: only lines shaped like `{...}` are worth decoding.
fn is_candidate(trimmed: &str) -> bool {
    trimmed.starts_with('{') && trimmed.ends_with('}')
}

/// Decode one line, reporting why it failed. Blank lines are `Ok(None)`.
pub fn try_parse_line(line: &str) -> Result<Option<CliMessage>, ParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if !trimmed.starts_with('{') {
        return Err(ParseError::NotJson);
    }
    let normalized = normalize_fields(trimmed);
    Ok(Some(serde_json::from_str(&normalized)?))
}

/// Decode one line of CLI output. Never fails: blank, fragmentary or
/// undecodable lines yield `None` and a debug diagnostic.
pub fn parse_line(line: &str) -> Option<CliMessage> {
    match try_parse_line(line) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!("skipping CLI output line: {e}");
            None
        }
    }
}

/// Decode every JSON line in `content`, silently skipping plain-text lines
/// the CLI interleaves with its JSON.
pub fn parse_stream(content: &str) -> Vec<CliMessage> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| is_candidate(l))
        .filter_map(parse_line)
        .collect()
}

/// Incremental parser for output read from a subprocess pipe in arbitrary
/// chunks. A trailing partial line is held until its newline arrives.
#[derive(Debug, Default)]
pub struct StreamParser {
    buffer: String,
    parsed: usize,
    skipped: usize,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the messages completed by it.
    pub fn push(&mut self, chunk: &str) -> Vec<CliMessage> {
        self.buffer.push_str(chunk);
        let Some(last_newline) = self.buffer.rfind('\n') else {
            return Vec::new();
        };
        let complete: String = self.buffer.drain(..=last_newline).collect();
        complete
            .lines()
            .filter_map(|line| self.consume_line(line))
            .collect()
    }

    /// Flush whatever is left once the stream has closed.
    pub fn finish(&mut self) -> Vec<CliMessage> {
        let rest = std::mem::take(&mut self.buffer);
        self.consume_line(&rest).into_iter().collect()
    }

    /// Lines decoded so far.
    pub fn parsed(&self) -> usize {
        self.parsed
    }

    /// Non-blank lines that were not JSON or failed to decode.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn consume_line(&mut self, line: &str) -> Option<CliMessage> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        let msg = if is_candidate(trimmed) {
            parse_line(trimmed)
        } else {
            None
        };
        match msg {
            Some(m) => {
                self.parsed += 1;
                Some(m)
            }
            None => {
                self.skipped += 1;
                None
            }
        }
    }
}
