//! Resolution of remote function calls into local outputs.

use tracing::{debug, warn};

use crate::api::{AssistantApi, Run, SubmitToolOutputsRequest, ToolCall, ToolOutput};
use crate::error::{ReviewError, ReviewResult};

use super::context::ContextProvider;

/// Function names answered with on-demand code context.
///
/// `multi_tool_use.parallel` is the wrapper the remote side sometimes
/// substitutes when it batches several `get_context` calls.
pub const ON_DEMAND_CONTEXT_FUNCTIONS: &[&str] = &["get_context", "multi_tool_use.parallel"];

pub struct ToolCallDispatcher<'a> {
    api: &'a dyn AssistantApi,
    context: &'a dyn ContextProvider,
}

impl<'a> ToolCallDispatcher<'a> {
    pub fn new(api: &'a dyn AssistantApi, context: &'a dyn ContextProvider) -> Self {
        Self { api, context }
    }

    /// One output per call, in call order. Calls outside the allow-list, and
    /// context lookups that fail, answer with an empty string.
    pub async fn tool_outputs(&self, tool_calls: &[ToolCall]) -> Vec<ToolOutput> {
        let mut outputs = Vec::with_capacity(tool_calls.len());

        for call in tool_calls {
            let output = match &call.function {
                Some(function) if ON_DEMAND_CONTEXT_FUNCTIONS.contains(&function.name.as_str()) => {
                    let context = match function.parsed_arguments() {
                        Ok(arguments) => self.context.code_context(&arguments).await,
                        Err(e) => Err(ReviewError::MalformedResponse(format!(
                            "invalid arguments for {}: {}",
                            function.name, e
                        ))),
                    };
                    context.unwrap_or_else(|e| {
                        warn!("Context lookup for tool call {} failed: {}", call.id, e);
                        String::new()
                    })
                }
                Some(function) => {
                    debug!("No local handler for function {}", function.name);
                    String::new()
                }
                None => String::new(),
            };

            outputs.push(ToolOutput {
                tool_call_id: call.id.clone(),
                output,
            });
        }

        outputs
    }

    /// Compute outputs for every call and submit them to the run in one request.
    pub async fn submit_tool_output(
        &self,
        thread_id: &str,
        run_id: &str,
        tool_calls: &[ToolCall],
    ) -> ReviewResult<Run> {
        let request = SubmitToolOutputsRequest {
            tool_outputs: self.tool_outputs(tool_calls).await,
        };
        debug!(
            "Submitting {} tool output(s) to run {}",
            request.tool_outputs.len(),
            run_id
        );
        self.api
            .submit_tool_outputs(thread_id, run_id, &request)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{function_call, FakeApi};
    use async_trait::async_trait;
    use serde_json::Value;

    struct EchoContext;

    #[async_trait]
    impl ContextProvider for EchoContext {
        async fn code_context(&self, arguments: &Value) -> ReviewResult<String> {
            match arguments["requests"][0]["context_required_entity"].as_str() {
                Some("broken") => Err(ReviewError::connection("lookup failed")),
                Some(entity) => Ok(format!("context for {}", entity)),
                None => Ok("context".to_string()),
            }
        }
    }

    fn args(entity: &str) -> String {
        format!(
            r#"{{"requests":[{{"entity_category":"function","context_required_entity":"{}"}}]}}"#,
            entity
        )
    }

    #[tokio::test]
    async fn test_outputs_follow_call_order() {
        let api = FakeApi::new();
        let dispatcher = ToolCallDispatcher::new(&api, &EchoContext);
        let calls = vec![
            function_call("call_1", "get_context", &args("load")),
            function_call("call_2", "unsupported_fn", "{}"),
        ];

        let outputs = dispatcher.tool_outputs(&calls).await;

        assert_eq!(
            outputs,
            vec![
                ToolOutput {
                    tool_call_id: "call_1".to_string(),
                    output: "context for load".to_string()
                },
                ToolOutput {
                    tool_call_id: "call_2".to_string(),
                    output: String::new()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_parallel_wrapper_and_failures() {
        let api = FakeApi::new();
        let dispatcher = ToolCallDispatcher::new(&api, &EchoContext);
        let calls = vec![
            function_call("call_1", "multi_tool_use.parallel", "{}"),
            function_call("call_2", "get_context", &args("broken")),
            function_call("call_3", "get_context", "not json"),
        ];

        let outputs: Vec<String> = dispatcher
            .tool_outputs(&calls)
            .await
            .into_iter()
            .map(|o| o.output)
            .collect();

        assert_eq!(outputs, vec!["context", "", ""]);
    }

    #[tokio::test]
    async fn test_submit_sends_one_batch() {
        let api = FakeApi::new();
        let dispatcher = ToolCallDispatcher::new(&api, &EchoContext);
        let calls = vec![
            function_call("call_1", "get_context", &args("a")),
            function_call("call_2", "get_context", &args("b")),
        ];

        let run = dispatcher
            .submit_tool_output("thread_1", "run_1", &calls)
            .await
            .unwrap();

        assert_eq!(run.id, "run_1");
        let state = api.state();
        assert_eq!(state.submitted_outputs.len(), 1);
        let ids: Vec<&str> = state.submitted_outputs[0]
            .iter()
            .map(|o| o.tool_call_id.as_str())
            .collect();
        assert_eq!(ids, vec!["call_1", "call_2"]);
    }
}
