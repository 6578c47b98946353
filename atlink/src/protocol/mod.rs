//! Decoding of the CLI's newline-delimited JSON output.
//!
//! Lines go through [`normalize_fields`] (snake_case keys to camelCase) and
//! are then decoded into [`CliMessage`]. Nothing here fails loudly: lines that
//! are not JSON, or do not decode, are skipped.

mod lenient;
mod message;
mod normalize;
mod parser;
mod summary;

pub use message::{
    CliMessage, ContentBlock, ConversationMessage, ErrorMessage, McpServerStatus, MessageContent,
    MessagePayload, ResultMessage, StreamEventMessage, SystemMessage, Usage,
};
pub use normalize::{FIELD_RENAMES, normalize_fields};
pub use parser::{ParseError, StreamParser, parse_line, parse_stream, try_parse_line};
pub use summary::StreamSummary;
