//! Client for the remote assistant/thread/run API.
//!
//! [`AssistantApi`] is the seam the review engine is written against;
//! [`ApiClient`] implements it over HTTP.

mod assistants;
mod client;
#[cfg(test)]
pub(crate) mod fake;
mod http;
mod threads;
mod types;

use async_trait::async_trait;

pub use client::ApiClient;
pub use types::{
    ApiError, Assistant, CreateAssistantRequest, CreateMessageRequest, CreateRunRequest,
    CreateVectorStoreRequest, FileBatch, FileObject, FileSearchResources, FunctionDefinition,
    Message, ResourceStatus, Run, RunStep, StepDetails, SubmitToolOutputsRequest, Thread, Tool,
    ToolCall, ToolOutput, ToolResources, VectorStore,
};

use crate::error::ReviewResult;

/// Remote operations consumed by the review engine.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    async fn create_thread(&self) -> ReviewResult<Thread>;

    async fn add_message(
        &self,
        thread_id: &str,
        request: &CreateMessageRequest,
    ) -> ReviewResult<Message>;

    async fn get_message(&self, thread_id: &str, message_id: &str) -> ReviewResult<Message>;

    async fn create_run(&self, thread_id: &str, request: &CreateRunRequest) -> ReviewResult<Run>;

    async fn get_run(&self, thread_id: &str, run_id: &str) -> ReviewResult<Run>;

    async fn list_run_steps(&self, thread_id: &str, run_id: &str) -> ReviewResult<Vec<RunStep>>;

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> ReviewResult<Run>;

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        request: &SubmitToolOutputsRequest,
    ) -> ReviewResult<Run>;

    async fn upload_file(&self, filename: &str, content: Vec<u8>) -> ReviewResult<FileObject>;

    async fn create_vector_store(
        &self,
        request: &CreateVectorStoreRequest,
    ) -> ReviewResult<VectorStore>;

    async fn create_file_batch(
        &self,
        vector_store_id: &str,
        file_ids: Vec<String>,
    ) -> ReviewResult<FileBatch>;

    async fn get_file_batch(&self, vector_store_id: &str, batch_id: &str)
        -> ReviewResult<FileBatch>;

    async fn create_assistant(&self, request: &CreateAssistantRequest) -> ReviewResult<Assistant>;
}

#[async_trait]
impl AssistantApi for ApiClient {
    async fn create_thread(&self) -> ReviewResult<Thread> {
        ApiClient::create_thread(self).await
    }

    async fn add_message(
        &self,
        thread_id: &str,
        request: &CreateMessageRequest,
    ) -> ReviewResult<Message> {
        ApiClient::add_message(self, thread_id, request).await
    }

    async fn get_message(&self, thread_id: &str, message_id: &str) -> ReviewResult<Message> {
        ApiClient::get_message(self, thread_id, message_id).await
    }

    async fn create_run(&self, thread_id: &str, request: &CreateRunRequest) -> ReviewResult<Run> {
        ApiClient::create_run(self, thread_id, request).await
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> ReviewResult<Run> {
        ApiClient::get_run(self, thread_id, run_id).await
    }

    async fn list_run_steps(&self, thread_id: &str, run_id: &str) -> ReviewResult<Vec<RunStep>> {
        ApiClient::list_run_steps(self, thread_id, run_id).await
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> ReviewResult<Run> {
        ApiClient::cancel_run(self, thread_id, run_id).await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        request: &SubmitToolOutputsRequest,
    ) -> ReviewResult<Run> {
        ApiClient::submit_tool_outputs(self, thread_id, run_id, request).await
    }

    async fn upload_file(&self, filename: &str, content: Vec<u8>) -> ReviewResult<FileObject> {
        ApiClient::upload_file(self, filename, content).await
    }

    async fn create_vector_store(
        &self,
        request: &CreateVectorStoreRequest,
    ) -> ReviewResult<VectorStore> {
        ApiClient::create_vector_store(self, request).await
    }

    async fn create_file_batch(
        &self,
        vector_store_id: &str,
        file_ids: Vec<String>,
    ) -> ReviewResult<FileBatch> {
        ApiClient::create_file_batch(self, vector_store_id, file_ids).await
    }

    async fn get_file_batch(
        &self,
        vector_store_id: &str,
        batch_id: &str,
    ) -> ReviewResult<FileBatch> {
        ApiClient::get_file_batch(self, vector_store_id, batch_id).await
    }

    async fn create_assistant(&self, request: &CreateAssistantRequest) -> ReviewResult<Assistant> {
        ApiClient::create_assistant(self, request).await
    }
}
