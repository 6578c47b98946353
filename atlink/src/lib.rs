pub mod config;
pub mod index;
pub mod mention;
pub mod protocol;
pub mod references;
pub mod search;
pub mod selection;

// Re-exports
pub use config::{AtlinkConfig, ConfigError, ReferenceEncoding};
pub use index::{FileIndex, IndexError, WalkIndex};
pub use mention::{AtQuery, detect};
pub use protocol::{
    CliMessage, ParseError, StreamParser, StreamSummary, Usage, normalize_fields, parse_line,
    parse_stream,
};
pub use references::{
    InlineReference, ParsedReferences, ReferenceKind, expand_for_downstream, parse_references,
};
pub use search::{FileSearchResult, MatchType, search};
pub use selection::{
    ContextSelectionState, ContextSelector, SelectionEvent, SelectorConfig, SelectorState,
};

use std::path::Path;

/// Snapshot of one file-index entry.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IndexedFileInfo {
    pub name: String,
    pub relative_path: String,
    pub absolute_path: String,
    pub is_directory: bool,
    /// Lower-cased extension, "directory", or empty.
    #[serde(default)]
    pub file_type: String,
}

impl IndexedFileInfo {
    /// Build an entry for `absolute`, recording its path relative to `root`.
    pub fn from_path(root: &Path, absolute: &Path, is_directory: bool) -> Self {
        let name = absolute
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let relative_path = absolute
            .strip_prefix(root)
            .unwrap_or(absolute)
            .to_string_lossy()
            .replace('\\', "/");
        let file_type = if is_directory {
            "directory".to_string()
        } else {
            absolute
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default()
        };
        Self {
            name,
            relative_path,
            absolute_path: absolute.to_string_lossy().to_string(),
            is_directory,
            file_type,
        }
    }

    /// File name without its final extension (`"Test.kt"` -> `"Test"`).
    pub fn stem(&self) -> &str {
        match self.name.rfind('.') {
            Some(0) | None => &self.name,
            Some(dot) => &self.name[..dot],
        }
    }
}

/// A resolved pointer to something attached to a chat message.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContextReference {
    File {
        path: String,
        full_path: String,
    },
    Web {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Folder {
        path: String,
        full_path: String,
    },
    Symbol {
        name: String,
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        line: Option<u32>,
    },
    Image {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime: Option<String>,
    },
}

impl ContextReference {
    /// Build a file or folder reference from an index entry.
    pub fn from_indexed(item: &IndexedFileInfo) -> Self {
        if item.is_directory {
            ContextReference::Folder {
                path: item.relative_path.clone(),
                full_path: item.absolute_path.clone(),
            }
        } else {
            ContextReference::File {
                path: item.relative_path.clone(),
                full_path: item.absolute_path.clone(),
            }
        }
    }

    /// Short name shown after the `@` in display text.
    pub fn label(&self) -> String {
        match self {
            ContextReference::File { path, .. }
            | ContextReference::Folder { path, .. }
            | ContextReference::Image { path, .. } => last_segment(path).to_string(),
            ContextReference::Web { url, title } => match title {
                Some(t) if !t.is_empty() && !t.contains("://") => t.clone(),
                _ => references::host_of(url).to_string(),
            },
            ContextReference::Symbol { name, .. } => name.clone(),
        }
    }

    /// The `scheme://path` target this reference points at.
    pub fn uri(&self) -> String {
        match self {
            ContextReference::File { full_path, .. }
            | ContextReference::Folder { full_path, .. } => file_uri(full_path),
            ContextReference::Image { path, .. } => file_uri(path),
            ContextReference::Web { url, .. } => url.clone(),
            ContextReference::Symbol { path, line, .. } => match line {
                Some(l) => format!("{}#L{l}", file_uri(path)),
                None => file_uri(path),
            },
        }
    }

    /// `[@label](scheme://path)`. Characters that would end the link text
    /// early are dropped from the label.
    pub fn to_markdown_link(&self) -> String {
        let label: String = self
            .label()
            .chars()
            .filter(|c| *c != ']')
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect();
        let label = if label.trim().is_empty() {
            "link"
        } else {
            label.as_str()
        };
        format!("[@{label}]({})", self.uri())
    }

    /// `@scheme://path`
    pub fn to_bare_token(&self) -> String {
        format!("@{}", self.uri())
    }

    pub fn encode(&self, encoding: ReferenceEncoding) -> String {
        match encoding {
            ReferenceEncoding::Markdown => self.to_markdown_link(),
            ReferenceEncoding::Bare => self.to_bare_token(),
        }
    }
}

fn last_segment(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

fn file_uri(path: &str) -> String {
    if path.contains("://") {
        return path.to_string();
    }
    let path = path.replace('\\', "/");
    // each segment is escaped so spaces and parentheses survive both encodings
    let encoded = path
        .split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/");
    if encoded.starts_with('/') {
        format!("file://{encoded}")
    } else {
        format!("file:///{encoded}")
    }
}
