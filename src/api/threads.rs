//! Thread, message and run endpoints.

use reqwest::Method;
use serde::Serialize;

use super::client::ApiClient;
use super::types::{
    CreateMessageRequest, CreateRunRequest, List, Message, Run, RunStep,
    SubmitToolOutputsRequest, Thread,
};
use crate::error::ReviewResult;

/// Serializes to `{}` for endpoints that take no parameters.
#[derive(Serialize)]
struct Empty {}

const EMPTY_BODY: &Empty = &Empty {};

impl ApiClient {
    pub async fn create_thread(&self) -> ReviewResult<Thread> {
        self.request(Method::POST, "threads", Some(EMPTY_BODY)).await
    }

    pub async fn add_message(
        &self,
        thread_id: &str,
        request: &CreateMessageRequest,
    ) -> ReviewResult<Message> {
        self.request_once(
            Method::POST,
            &format!("threads/{}/messages", thread_id),
            Some(request),
        )
        .await
    }

    pub async fn get_message(&self, thread_id: &str, message_id: &str) -> ReviewResult<Message> {
        self.request::<(), _>(
            Method::GET,
            &format!("threads/{}/messages/{}", thread_id, message_id),
            None,
        )
        .await
    }

    pub async fn create_run(
        &self,
        thread_id: &str,
        request: &CreateRunRequest,
    ) -> ReviewResult<Run> {
        self.request_once(
            Method::POST,
            &format!("threads/{}/runs", thread_id),
            Some(request),
        )
        .await
    }

    pub async fn get_run(&self, thread_id: &str, run_id: &str) -> ReviewResult<Run> {
        self.request::<(), _>(
            Method::GET,
            &format!("threads/{}/runs/{}", thread_id, run_id),
            None,
        )
        .await
    }

    /// First page of a run's steps, in the API's default (newest first) order.
    pub async fn list_run_steps(&self, thread_id: &str, run_id: &str) -> ReviewResult<Vec<RunStep>> {
        let list: List<RunStep> = self
            .request::<(), _>(
                Method::GET,
                &format!("threads/{}/runs/{}/steps", thread_id, run_id),
                None,
            )
            .await?;
        Ok(list.data)
    }

    pub async fn cancel_run(&self, thread_id: &str, run_id: &str) -> ReviewResult<Run> {
        self.request(
            Method::POST,
            &format!("threads/{}/runs/{}/cancel", thread_id, run_id),
            Some(EMPTY_BODY),
        )
        .await
    }

    pub async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        request: &SubmitToolOutputsRequest,
    ) -> ReviewResult<Run> {
        self.request_once(
            Method::POST,
            &format!("threads/{}/runs/{}/submit_tool_outputs", thread_id, run_id),
            Some(request),
        )
        .await
    }
}
