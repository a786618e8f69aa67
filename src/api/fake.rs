//! Scripted in-memory [`AssistantApi`] for engine tests.
//!
//! Scripts are queues; the last entry of a queue keeps being returned once the
//! earlier ones are consumed.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::types::{
    FunctionCall, MessageContent, RequiredAction, Role, SubmitToolOutputsAction, TextContent,
};
use super::{
    Assistant, AssistantApi, CreateAssistantRequest, CreateMessageRequest, CreateRunRequest,
    CreateVectorStoreRequest, FileBatch, FileObject, Message, ResourceStatus, Run, RunStep,
    StepDetails, SubmitToolOutputsRequest, Thread, ToolCall, ToolOutput, VectorStore,
};
use crate::error::{ReviewError, ReviewResult};

#[derive(Debug, Clone)]
pub(crate) enum StepResponse {
    Steps(Vec<RunStep>),
    ConnectionFailure,
}

#[derive(Default)]
pub(crate) struct FakeState {
    // Scripts
    pub created_run_status: Option<ResourceStatus>,
    pub run_statuses: VecDeque<ResourceStatus>,
    pub pending_tool_calls: Vec<ToolCall>,
    pub step_responses: VecDeque<StepResponse>,
    pub created_batch_status: Option<ResourceStatus>,
    pub batch_statuses: VecDeque<ResourceStatus>,
    pub cancel_status: Option<ResourceStatus>,
    pub messages: HashMap<String, String>,

    // Observations
    pub threads_created: usize,
    pub messages_added: Vec<(String, String)>,
    pub runs_created: Vec<(String, String)>,
    pub get_run_calls: usize,
    pub list_steps_calls: usize,
    pub cancel_calls: usize,
    pub submitted_outputs: Vec<Vec<ToolOutput>>,
    pub uploaded_files: Vec<(String, Vec<u8>)>,
    pub vector_stores_created: usize,
    pub batches_created: Vec<(String, Vec<String>)>,
    pub get_batch_calls: usize,
    pub assistants_created: Vec<CreateAssistantRequest>,
}

#[derive(Default)]
pub(crate) struct FakeApi {
    state: Mutex<FakeState>,
}

fn next_scripted<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

pub(crate) fn function_call(id: &str, name: &str, arguments: &str) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        kind: "function".to_string(),
        function: Some(FunctionCall {
            name: name.to_string(),
            arguments: arguments.to_string(),
            output: None,
        }),
    }
}

pub(crate) fn message_step(status: ResourceStatus, message_id: &str) -> RunStep {
    RunStep {
        id: format!("step_{}", message_id),
        status: Some(status),
        step_details: StepDetails::MessageCreation {
            message_creation: super::types::MessageCreation {
                message_id: message_id.to_string(),
            },
        },
    }
}

pub(crate) fn tool_calls_step(status: ResourceStatus, tool_calls: Vec<ToolCall>) -> RunStep {
    RunStep {
        id: "step_tools".to_string(),
        status: Some(status),
        step_details: StepDetails::ToolCalls { tool_calls },
    }
}

#[async_trait]
impl AssistantApi for FakeApi {
    async fn create_thread(&self) -> ReviewResult<Thread> {
        let mut state = self.state();
        state.threads_created += 1;
        Ok(Thread {
            id: format!("thread_{}", state.threads_created),
        })
    }

    async fn add_message(
        &self,
        thread_id: &str,
        request: &CreateMessageRequest,
    ) -> ReviewResult<Message> {
        let mut state = self.state();
        state
            .messages_added
            .push((thread_id.to_string(), request.content.clone()));
        Ok(Message {
            id: format!("msg_user_{}", state.messages_added.len()),
            role: Role::User,
            content: Vec::new(),
        })
    }

    async fn get_message(&self, _thread_id: &str, message_id: &str) -> ReviewResult<Message> {
        let state = self.state();
        let text = state
            .messages
            .get(message_id)
            .cloned()
            .ok_or_else(|| ReviewError::connection(format!("no message {}", message_id)))?;
        Ok(Message {
            id: message_id.to_string(),
            role: Role::Assistant,
            content: vec![MessageContent::Text {
                text: TextContent { value: text },
            }],
        })
    }

    async fn create_run(&self, thread_id: &str, request: &CreateRunRequest) -> ReviewResult<Run> {
        let mut state = self.state();
        state
            .runs_created
            .push((thread_id.to_string(), request.assistant_id.clone()));
        Ok(Run {
            id: format!("run_{}", state.runs_created.len()),
            status: Some(
                state
                    .created_run_status
                    .clone()
                    .unwrap_or(ResourceStatus::Queued),
            ),
            required_action: None,
            last_error: None,
        })
    }

    async fn get_run(&self, _thread_id: &str, run_id: &str) -> ReviewResult<Run> {
        let mut state = self.state();
        state.get_run_calls += 1;
        let status = next_scripted(&mut state.run_statuses).unwrap_or(ResourceStatus::Completed);
        let required_action = (status == ResourceStatus::RequiresAction).then(|| RequiredAction {
            submit_tool_outputs: Some(SubmitToolOutputsAction {
                tool_calls: state.pending_tool_calls.clone(),
            }),
        });
        Ok(Run {
            id: run_id.to_string(),
            status: Some(status),
            required_action,
            last_error: None,
        })
    }

    async fn list_run_steps(&self, _thread_id: &str, _run_id: &str) -> ReviewResult<Vec<RunStep>> {
        let mut state = self.state();
        state.list_steps_calls += 1;
        match next_scripted(&mut state.step_responses) {
            Some(StepResponse::Steps(steps)) => Ok(steps),
            Some(StepResponse::ConnectionFailure) => {
                Err(ReviewError::connection("connection reset while listing steps"))
            }
            None => Ok(Vec::new()),
        }
    }

    async fn cancel_run(&self, _thread_id: &str, run_id: &str) -> ReviewResult<Run> {
        let mut state = self.state();
        state.cancel_calls += 1;
        Ok(Run {
            id: run_id.to_string(),
            status: Some(
                state
                    .cancel_status
                    .clone()
                    .unwrap_or(ResourceStatus::Cancelled),
            ),
            required_action: None,
            last_error: None,
        })
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        run_id: &str,
        request: &SubmitToolOutputsRequest,
    ) -> ReviewResult<Run> {
        let mut state = self.state();
        state.submitted_outputs.push(request.tool_outputs.clone());
        Ok(Run {
            id: run_id.to_string(),
            status: Some(ResourceStatus::Queued),
            required_action: None,
            last_error: None,
        })
    }

    async fn upload_file(&self, filename: &str, content: Vec<u8>) -> ReviewResult<FileObject> {
        let mut state = self.state();
        state.uploaded_files.push((filename.to_string(), content));
        Ok(FileObject {
            id: format!("file_{}", state.uploaded_files.len()),
        })
    }

    async fn create_vector_store(
        &self,
        _request: &CreateVectorStoreRequest,
    ) -> ReviewResult<VectorStore> {
        let mut state = self.state();
        state.vector_stores_created += 1;
        Ok(VectorStore {
            id: format!("vs_{}", state.vector_stores_created),
        })
    }

    async fn create_file_batch(
        &self,
        vector_store_id: &str,
        file_ids: Vec<String>,
    ) -> ReviewResult<FileBatch> {
        let mut state = self.state();
        state
            .batches_created
            .push((vector_store_id.to_string(), file_ids));
        Ok(FileBatch {
            id: format!("batch_{}", state.batches_created.len()),
            status: Some(
                state
                    .created_batch_status
                    .clone()
                    .unwrap_or(ResourceStatus::InProgress),
            ),
        })
    }

    async fn get_file_batch(
        &self,
        _vector_store_id: &str,
        batch_id: &str,
    ) -> ReviewResult<FileBatch> {
        let mut state = self.state();
        state.get_batch_calls += 1;
        let status = next_scripted(&mut state.batch_statuses).unwrap_or(ResourceStatus::Completed);
        Ok(FileBatch {
            id: batch_id.to_string(),
            status: Some(status),
        })
    }

    async fn create_assistant(&self, request: &CreateAssistantRequest) -> ReviewResult<Assistant> {
        let mut state = self.state();
        state.assistants_created.push(request.clone());
        Ok(Assistant {
            id: format!("asst_{}", state.assistants_created.len()),
        })
    }
}
