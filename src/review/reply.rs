use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::ToolCall;
use crate::error::{ReviewError, ReviewResult};

/// One review remark produced through `format_replies`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub reply: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicting: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,
}

/// Result of one conversational turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResponseContent {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<Reply>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_content: Option<String>,
}

impl ResponseContent {
    pub fn from_message(text: String) -> Self {
        Self {
            replies: Vec::new(),
            message_content: Some(text),
        }
    }

    pub fn from_replies(replies: Vec<Reply>) -> Self {
        Self {
            replies,
            message_content: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RepliesArguments {
    replies: Vec<Reply>,
}

/// Merge the `replies` of every function call in the step.
///
/// Calls without a `replies` argument (file search, context lookups) are
/// skipped; a step that yields no replies at all is malformed.
pub fn replies_from_tool_calls(tool_calls: &[ToolCall]) -> ReviewResult<Vec<Reply>> {
    let mut replies = Vec::new();
    let mut found = false;

    for call in tool_calls {
        let Some(function) = &call.function else {
            continue;
        };
        let arguments: Value = function.parsed_arguments().map_err(|e| {
            ReviewError::MalformedResponse(format!(
                "tool call {} has invalid arguments: {}",
                call.id, e
            ))
        })?;
        if arguments.get("replies").is_none() {
            continue;
        }

        let parsed: RepliesArguments = serde_json::from_value(arguments).map_err(|e| {
            ReviewError::MalformedResponse(format!(
                "tool call {} has malformed replies: {}",
                call.id, e
            ))
        })?;
        found = true;
        replies.extend(parsed.replies);
    }

    if !found {
        return Err(ReviewError::MalformedResponse(
            "run step carries no replies".to_string(),
        ));
    }
    Ok(replies)
}
