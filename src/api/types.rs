//! Request and response types for the assistants API.
//!
//! Only the fields the engine relies on are modelled; everything else in the
//! remote payloads is ignored on deserialization.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Resource status
// ============================================================================

/// Lifecycle status shared by runs, run steps and vector-store file batches.
///
/// Unknown wire values are preserved in [`ResourceStatus::Other`] instead of
/// failing the whole response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceStatus {
    Queued,
    InProgress,
    Cancelling,
    RequiresAction,
    Completed,
    Cancelled,
    Failed,
    Incomplete,
    Expired,
    Other(String),
}

impl ResourceStatus {
    /// Statuses the poller keeps waiting on.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            ResourceStatus::Queued | ResourceStatus::InProgress | ResourceStatus::Cancelling
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            ResourceStatus::Queued => "queued",
            ResourceStatus::InProgress => "in_progress",
            ResourceStatus::Cancelling => "cancelling",
            ResourceStatus::RequiresAction => "requires_action",
            ResourceStatus::Completed => "completed",
            ResourceStatus::Cancelled => "cancelled",
            ResourceStatus::Failed => "failed",
            ResourceStatus::Incomplete => "incomplete",
            ResourceStatus::Expired => "expired",
            ResourceStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for ResourceStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "queued" => ResourceStatus::Queued,
            "in_progress" => ResourceStatus::InProgress,
            "cancelling" => ResourceStatus::Cancelling,
            "requires_action" => ResourceStatus::RequiresAction,
            "completed" => ResourceStatus::Completed,
            "cancelled" => ResourceStatus::Cancelled,
            "failed" => ResourceStatus::Failed,
            "incomplete" => ResourceStatus::Incomplete,
            "expired" => ResourceStatus::Expired,
            _ => ResourceStatus::Other(raw),
        }
    }
}

impl From<&str> for ResourceStatus {
    fn from(raw: &str) -> Self {
        ResourceStatus::from(raw.to_string())
    }
}

impl From<ResourceStatus> for String {
    fn from(status: ResourceStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Paginated list envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct List<T> {
    pub data: Vec<T>,
}

// ============================================================================
// Threads and messages
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Thread {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateMessageRequest {
    pub role: Role,
    pub content: String,
}

impl CreateMessageRequest {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl Message {
    /// Concatenated text parts, or `None` when the message carries no text.
    pub fn text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|c| match c {
                MessageContent::Text { text } => Some(text.value.as_str()),
                MessageContent::Other => None,
            })
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextContent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextContent {
    pub value: String,
}

// ============================================================================
// Runs, steps and tool calls
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Run {
    pub id: String,
    /// `None` means "not observed yet"; the poller treats it as pending.
    #[serde(default)]
    pub status: Option<ResourceStatus>,
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
    #[serde(default)]
    pub last_error: Option<LastError>,
}

impl Run {
    /// Tool calls the run is blocked on, if it signalled `requires_action`.
    pub fn required_tool_calls(&self) -> Option<&[ToolCall]> {
        self.required_action
            .as_ref()
            .and_then(|action| action.submit_tool_outputs.as_ref())
            .map(|outputs| outputs.tool_calls.as_slice())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequiredAction {
    #[serde(default)]
    pub submit_tool_outputs: Option<SubmitToolOutputsAction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitToolOutputsAction {
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRunRequest {
    pub assistant_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_instructions: Option<String>,
}

impl CreateRunRequest {
    pub fn new(assistant_id: impl Into<String>) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            additional_instructions: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunStep {
    pub id: String,
    #[serde(default)]
    pub status: Option<ResourceStatus>,
    pub step_details: StepDetails,
}

/// Payload of a run step, discriminated by the wire `type` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepDetails {
    MessageCreation { message_creation: MessageCreation },
    ToolCalls { tool_calls: Vec<ToolCall> },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageCreation {
    pub message_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, as sent by the remote side.
    #[serde(default)]
    pub arguments: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl FunctionCall {
    pub fn parsed_arguments(&self) -> Result<serde_json::Value, serde_json::Error> {
        if self.arguments.trim().is_empty() {
            return Ok(serde_json::Value::Object(Default::default()));
        }
        serde_json::from_str(&self.arguments)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitToolOutputsRequest {
    pub tool_outputs: Vec<ToolOutput>,
}

// ============================================================================
// Files and vector stores
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct FileObject {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VectorStore {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateVectorStoreRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateFileBatchRequest {
    pub file_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileBatch {
    pub id: String,
    #[serde(default)]
    pub status: Option<ResourceStatus>,
}

// ============================================================================
// Assistants
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Assistant {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateAssistantRequest {
    pub name: String,
    pub description: String,
    pub instructions: String,
    pub model: String,
    pub temperature: f64,
    pub tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_resources: Option<ToolResources>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tool {
    FileSearch,
    Function { function: FunctionDefinition },
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolResources {
    pub file_search: FileSearchResources,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileSearchResources {
    pub vector_store_ids: Vec<String>,
}

// ============================================================================
// API Status Codes
// ============================================================================

/// Classification of an HTTP outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStatus {
    Ok,
    InvalidArgument,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    Conflict,
    TooLarge,
    ResourceExhausted,
    DeadlineExceeded,
    Unavailable,
    Unknown,
}

impl ApiStatus {
    pub fn from_http_status(http_status: u16) -> Self {
        match http_status {
            200..=299 => ApiStatus::Ok,
            400 => ApiStatus::InvalidArgument,
            401 => ApiStatus::Unauthenticated,
            403 => ApiStatus::PermissionDenied,
            404 => ApiStatus::NotFound,
            408 | 504 => ApiStatus::DeadlineExceeded,
            409 => ApiStatus::Conflict,
            413 => ApiStatus::TooLarge,
            429 => ApiStatus::ResourceExhausted,
            500..=599 => ApiStatus::Unavailable,
            _ => ApiStatus::Unknown,
        }
    }

    /// Errors that no amount of retrying will fix without user action.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ApiStatus::Unauthenticated | ApiStatus::PermissionDenied
        )
    }

    pub fn error_message(&self) -> &'static str {
        match self {
            ApiStatus::Ok => "Success",
            ApiStatus::InvalidArgument => "Invalid request",
            ApiStatus::Unauthenticated => "Authentication failed; check the configured API key",
            ApiStatus::PermissionDenied => "The API key is not allowed to use this resource",
            ApiStatus::NotFound => "Resource not found",
            ApiStatus::Conflict => "Resource is in a conflicting state",
            ApiStatus::TooLarge => "Request body too large",
            ApiStatus::ResourceExhausted => "Rate limit exceeded. Please wait and try again",
            ApiStatus::DeadlineExceeded => "Request timed out",
            ApiStatus::Unavailable => "Service temporarily unavailable",
            ApiStatus::Unknown => "Unknown error occurred",
        }
    }
}

impl std::fmt::Display for ApiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error_message())
    }
}

// ============================================================================
// API Error Type
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// A non-success HTTP response from the assistants API.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: ApiStatus,
    pub http_status: u16,
    pub message: String,
    /// `error.type` / `error.code` reported by the server, when present.
    pub error_type: Option<String>,
    pub code: Option<String>,
}

impl ApiError {
    pub fn from_http_response(http_status: u16, body: String) -> Self {
        let status = ApiStatus::from_http_status(http_status);
        let envelope = serde_json::from_str::<ErrorEnvelope>(&body).ok();

        let detail = match &envelope {
            Some(envelope) => envelope.error.message.clone(),
            None if body.trim().is_empty() => status.error_message().to_string(),
            None => body,
        };

        let message = match status {
            ApiStatus::Unauthenticated | ApiStatus::PermissionDenied => {
                format!("{} (HTTP {}): {}", status.error_message(), http_status, detail)
            }
            _ => format!("API error (HTTP {}): {}", http_status, detail),
        };

        let (error_type, code) = envelope
            .map(|e| (e.error.error_type, e.error.code))
            .unwrap_or((None, None));

        Self {
            status,
            http_status,
            message,
            error_type,
            code,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.status.is_fatal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_unknown_values() {
        let status: ResourceStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(status, ResourceStatus::InProgress);
        assert!(status.is_pending());

        let odd: ResourceStatus = serde_json::from_str("\"paused\"").unwrap();
        assert_eq!(odd, ResourceStatus::Other("paused".to_string()));
        assert!(!odd.is_pending());
        assert_eq!(serde_json::to_string(&odd).unwrap(), "\"paused\"");
    }

    #[test]
    fn test_run_step_message_creation() {
        let json = r#"{
            "id": "step_1",
            "status": "completed",
            "step_details": {
                "type": "message_creation",
                "message_creation": { "message_id": "msg_9" }
            }
        }"#;
        let step: RunStep = serde_json::from_str(json).unwrap();
        match step.step_details {
            StepDetails::MessageCreation { message_creation } => {
                assert_eq!(message_creation.message_id, "msg_9")
            }
            other => panic!("unexpected details: {:?}", other),
        }
        assert_eq!(step.status, Some(ResourceStatus::Completed));
    }

    #[test]
    fn test_run_step_tool_calls_and_unknown_type() {
        let json = r#"{
            "id": "step_2",
            "step_details": {
                "type": "tool_calls",
                "tool_calls": [
                    { "id": "call_1", "type": "function",
                      "function": { "name": "get_context", "arguments": "{\"requests\":[]}" } },
                    { "id": "call_2", "type": "file_search", "file_search": {} }
                ]
            }
        }"#;
        let step: RunStep = serde_json::from_str(json).unwrap();
        let StepDetails::ToolCalls { tool_calls } = step.step_details else {
            panic!("expected tool calls");
        };
        assert_eq!(tool_calls.len(), 2);
        let names: Vec<Option<&str>> = tool_calls
            .iter()
            .map(|call| call.function.as_ref().map(|f| f.name.as_str()))
            .collect();
        assert_eq!(names, vec![Some("get_context"), None]);

        let unknown = r#"{ "id": "s", "step_details": { "type": "reasoning" } }"#;
        let step: RunStep = serde_json::from_str(unknown).unwrap();
        assert!(matches!(step.step_details, StepDetails::Unknown));
    }

    #[test]
    fn test_message_text_joins_parts() {
        let json = r#"{
            "id": "msg_1",
            "role": "assistant",
            "content": [
                { "type": "text", "text": { "value": "first", "annotations": [] } },
                { "type": "image_file", "image_file": { "file_id": "f" } },
                { "type": "text", "text": { "value": "second", "annotations": [] } }
            ]
        }"#;
        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.text().as_deref(), Some("first\nsecond"));
    }

    #[test]
    fn test_tool_serialization() {
        let tools = vec![
            Tool::FileSearch,
            Tool::Function {
                function: FunctionDefinition {
                    name: "get_context".to_string(),
                    description: "d".to_string(),
                    parameters: serde_json::json!({"type": "object"}),
                },
            },
        ];
        let value = serde_json::to_value(&tools).unwrap();
        assert_eq!(value[0]["type"], "file_search");
        assert_eq!(value[1]["type"], "function");
        assert_eq!(value[1]["function"]["name"], "get_context");
    }

    #[test]
    fn test_api_error_parses_error_envelope() {
        let body = r#"{"error":{"message":"No thread found","type":"invalid_request_error","code":null}}"#;
        let err = ApiError::from_http_response(404, body.to_string());
        assert_eq!(err.status, ApiStatus::NotFound);
        assert!(err.message.contains("No thread found"));
        assert_eq!(err.error_type.as_deref(), Some("invalid_request_error"));
        assert!(!err.is_fatal());

        let err = ApiError::from_http_response(401, String::new());
        assert!(err.is_fatal());
        assert!(err.message.contains("HTTP 401"));
    }
}
