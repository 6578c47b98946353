use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Protocol keys the CLI emits in snake_case, with their camelCase names.
pub const FIELD_RENAMES: &[(&str, &str)] = &[
    ("session_id", "sessionId"),
    ("parent_uuid", "parentUuid"),
    ("mcp_servers", "mcpServers"),
    ("duration_ms", "durationMs"),
    ("duration_api_ms", "durationApiMs"),
    ("num_turns", "numTurns"),
    ("is_error", "isError"),
    ("total_cost_usd", "totalCostUsd"),
    ("input_tokens", "inputTokens"),
    ("output_tokens", "outputTokens"),
    ("cache_creation_input_tokens", "cacheCreationInputTokens"),
    ("cache_read_input_tokens", "cacheReadInputTokens"),
    ("service_tier", "serviceTier"),
];

// A key is a quoted token that opens an object or follows a comma, and is
// followed by a colon. Values never sit in that position.
static KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = FIELD_RENAMES
        .iter()
        .map(|(snake, _)| regex::escape(snake))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r#"([{{,]\s*)"({alternation})"(\s*:)"#))
        .expect("field rename pattern is valid")
});

fn camel_for(snake: &str) -> &'static str {
    FIELD_RENAMES
        .iter()
        .find(|(s, _)| *s == snake)
        .map(|(_, camel)| *camel)
        .unwrap_or("")
}

/// Rewrite known snake_case object keys to camelCase, leaving values and
/// unknown keys untouched. Borrows the input when nothing matched.
pub fn normalize_fields(line: &str) -> Cow<'_, str> {
    KEY_RE.replace_all(line, |caps: &Captures<'_>| {
        format!("{}\"{}\"{}", &caps[1], camel_for(&caps[2]), &caps[3])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_key_is_renamed() {
        for (snake, camel) in FIELD_RENAMES {
            let input = format!(r#"{{"{snake}": "v_{snake}"}}"#);
            let out = normalize_fields(&input);
            assert_eq!(out, format!(r#"{{"{camel}": "v_{snake}"}}"#), "key {snake}");
        }
    }

    #[test]
    fn unknown_keys_pass_through() {
        let input = r#"{"type":"system","parent_tool_use_id":null,"subtype":"init"}"#;
        assert!(matches!(normalize_fields(input), Cow::Borrowed(_)));
    }

    #[test]
    fn values_containing_key_names_are_untouched() {
        let input = r#"{"text":"session_id","note":"the is_error flag: set"}"#;
        assert_eq!(normalize_fields(input), input);
    }

    #[test]
    fn escaped_quotes_in_values_are_untouched() {
        let input = r#"{"text":"{\"session_id\": 1}","session_id":"abc"}"#;
        assert_eq!(
            normalize_fields(input),
            r#"{"text":"{\"session_id\": 1}","sessionId":"abc"}"#
        );
    }

    #[test]
    fn nested_objects_and_whitespace() {
        let input = r#"{ "usage" : { "input_tokens" : 3 , "output_tokens":4 }, "num_turns" :2}"#;
        assert_eq!(
            normalize_fields(input),
            r#"{ "usage" : { "inputTokens" : 3 , "outputTokens":4 }, "numTurns" :2}"#
        );
    }

    #[test]
    fn longer_key_is_not_confused_with_prefix() {
        let input = r#"{"duration_api_ms":5,"duration_ms":7}"#;
        assert_eq!(
            normalize_fields(input),
            r#"{"durationApiMs":5,"durationMs":7}"#
        );
    }

    #[test]
    fn camel_case_input_is_unchanged() {
        let input = r#"{"sessionId":"x","isError":false}"#;
        assert_eq!(normalize_fields(input), input);
    }
}
