use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::lenient;

/// One normalized line of CLI output, dispatched on its `type` field.
///
/// Keys listed in [`super::FIELD_RENAMES`] arrive camelCased by the
/// normalizer; other multi-word keys keep their snake_case spelling as an
/// alias.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CliMessage {
    System(SystemMessage),
    Assistant(ConversationMessage),
    User(ConversationMessage),
    Result(ResultMessage),
    StreamEvent(StreamEventMessage),
    Error(ErrorMessage),
    /// A discriminant this build does not know about.
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMessage {
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub mcp_servers: Vec<McpServerStatus>,
    #[serde(default, alias = "permission_mode")]
    pub permission_mode: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct McpServerStatus {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// `assistant` and `user` lines share this envelope.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    #[serde(default)]
    pub message: MessagePayload,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub parent_uuid: Option<String>,
    #[serde(default, alias = "parent_tool_use_id")]
    pub parent_tool_use_id: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub content: MessageContent,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(default, alias = "stop_reason")]
    pub stop_reason: Option<String>,
}

/// User messages may carry a plain string; everything else carries blocks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Blocks(Vec::new())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    ToolUse {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        #[serde(default, rename = "toolUseId", alias = "tool_use_id")]
        tool_use_id: String,
        #[serde(default)]
        content: Value,
        #[serde(default, rename = "isError", deserialize_with = "lenient::opt_bool")]
        is_error: Option<bool>,
    },
    #[serde(other)]
    Unknown,
}

/// Token accounting as reported by the CLI.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    #[serde(default, deserialize_with = "lenient::u64_or_zero")]
    pub input_tokens: u64,
    #[serde(default, deserialize_with = "lenient::u64_or_zero")]
    pub output_tokens: u64,
    #[serde(default, deserialize_with = "lenient::u64_or_zero")]
    pub cache_creation_input_tokens: u64,
    #[serde(default, deserialize_with = "lenient::u64_or_zero")]
    pub cache_read_input_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_tier: Option<String>,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.output_tokens)
            .saturating_add(self.cache_creation_input_tokens)
            .saturating_add(self.cache_read_input_tokens)
    }

    pub fn add(&mut self, other: &Usage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.cache_creation_input_tokens = self
            .cache_creation_input_tokens
            .saturating_add(other.cache_creation_input_tokens);
        self.cache_read_input_tokens = self
            .cache_read_input_tokens
            .saturating_add(other.cache_read_input_tokens);
        if other.service_tier.is_some() {
            self.service_tier.clone_from(&other.service_tier);
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMessage {
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub is_error: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub duration_ms: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub duration_api_ms: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub num_turns: Option<u64>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub total_cost_usd: Option<f64>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEventMessage {
    #[serde(default)]
    pub event: Value,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub session_id: Option<String>,
    #[serde(default, alias = "parent_tool_use_id")]
    pub parent_tool_use_id: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
}

impl StreamEventMessage {
    /// The inner event's own discriminant, e.g. `content_block_delta`.
    pub fn event_type(&self) -> Option<&str> {
        self.event.get("type").and_then(|t| t.as_str())
    }

    /// Text carried by a `text_delta`, if this event is one.
    pub fn text_delta(&self) -> Option<&str> {
        let delta = self.event.get("delta")?;
        if delta.get("type").and_then(|t| t.as_str()) != Some("text_delta") {
            return None;
        }
        delta.get("text").and_then(|t| t.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub session_id: Option<String>,
}

impl CliMessage {
    /// The wire discriminant this message was decoded from.
    pub fn kind(&self) -> &'static str {
        match self {
            CliMessage::System(_) => "system",
            CliMessage::Assistant(_) => "assistant",
            CliMessage::User(_) => "user",
            CliMessage::Result(_) => "result",
            CliMessage::StreamEvent(_) => "stream_event",
            CliMessage::Error(_) => "error",
            CliMessage::Unknown => "unknown",
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            CliMessage::System(m) => m.session_id.as_deref(),
            CliMessage::Assistant(m) | CliMessage::User(m) => m.session_id.as_deref(),
            CliMessage::Result(m) => m.session_id.as_deref(),
            CliMessage::StreamEvent(m) => m.session_id.as_deref(),
            CliMessage::Error(m) => m.session_id.as_deref(),
            CliMessage::Unknown => None,
        }
    }

    pub fn parent_uuid(&self) -> Option<&str> {
        match self {
            CliMessage::Assistant(m) | CliMessage::User(m) => m.parent_uuid.as_deref(),
            _ => None,
        }
    }

    pub fn usage(&self) -> Option<&Usage> {
        match self {
            CliMessage::Assistant(m) | CliMessage::User(m) => m.message.usage.as_ref(),
            CliMessage::Result(m) => m.usage.as_ref(),
            _ => None,
        }
    }

    pub fn total_cost_usd(&self) -> Option<f64> {
        match self {
            CliMessage::Result(m) => m.total_cost_usd,
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        match self {
            CliMessage::Error(_) => true,
            CliMessage::Result(m) => m.is_error.unwrap_or(false),
            _ => false,
        }
    }

    /// Concatenated text blocks of an assistant or user message.
    pub fn text(&self) -> Option<String> {
        let payload = match self {
            CliMessage::Assistant(m) | CliMessage::User(m) => &m.message,
            CliMessage::Result(m) => return m.result.clone(),
            _ => return None,
        };
        match &payload.content {
            MessageContent::Text(t) => Some(t.clone()),
            MessageContent::Blocks(blocks) => {
                let parts: Vec<&str> = blocks
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join("\n"))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn usage_total_and_add() {
        let mut a = Usage {
            input_tokens: 1,
            output_tokens: 2,
            cache_creation_input_tokens: 3,
            cache_read_input_tokens: 4,
            service_tier: None,
        };
        let b = Usage {
            input_tokens: 10,
            service_tier: Some("standard".into()),
            ..Usage::default()
        };
        a.add(&b);
        assert_eq!(a.input_tokens, 11);
        assert_eq!(a.total(), 20);
        assert_eq!(a.service_tier.as_deref(), Some("standard"));
    }

    #[test]
    fn usage_saturates_instead_of_overflowing() {
        let mut a: Usage = serde_json::from_value(json!({
            "inputTokens": "18446744073709551615",
            "outputTokens": 3
        }))
        .unwrap();
        assert_eq!(a.total(), u64::MAX);
        a.add(&Usage {
            input_tokens: 1,
            ..Usage::default()
        });
        assert_eq!(a.input_tokens, u64::MAX);
        assert_eq!(a.output_tokens, 3);
    }

    #[test]
    fn text_block_without_text_decodes_empty() {
        let block: ContentBlock = serde_json::from_value(json!({"type": "text"})).unwrap();
        assert_eq!(
            block,
            ContentBlock::Text {
                text: String::new()
            }
        );
    }

    #[test]
    fn unknown_content_block_is_kept_as_unknown() {
        let block: ContentBlock =
            serde_json::from_value(json!({"type": "server_tool_use", "id": "x"})).unwrap();
        assert_eq!(block, ContentBlock::Unknown);
    }

    #[test]
    fn string_content_for_user_messages() {
        let msg: ConversationMessage =
            serde_json::from_value(json!({"message": {"role": "user", "content": "hi"}}))
                .unwrap();
        assert_eq!(msg.message.content, MessageContent::Text("hi".into()));
    }

    #[test]
    fn stream_event_text_delta() {
        let ev = StreamEventMessage {
            event: json!({
                "type": "content_block_delta",
                "delta": {"type": "text_delta", "text": "Hel"}
            }),
            ..StreamEventMessage::default()
        };
        assert_eq!(ev.event_type(), Some("content_block_delta"));
        assert_eq!(ev.text_delta(), Some("Hel"));
    }

    #[test]
    fn text_joins_text_blocks_only() {
        let msg = CliMessage::Assistant(ConversationMessage {
            message: MessagePayload {
                content: MessageContent::Blocks(vec![
                    ContentBlock::Text { text: "a".into() },
                    ContentBlock::ToolUse {
                        id: "t1".into(),
                        name: "Read".into(),
                        input: json!({}),
                    },
                    ContentBlock::Text { text: "b".into() },
                ]),
                ..MessagePayload::default()
            },
            ..ConversationMessage::default()
        });
        assert_eq!(msg.text().as_deref(), Some("a\nb"));
        assert_eq!(msg.kind(), "assistant");
    }
}
