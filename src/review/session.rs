//! One full review turn against a change.

use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{ApiClient, AssistantApi, StepDetails};
use crate::config::Settings;
use crate::error::{ReviewError, ReviewResult};
use crate::provision::AssistantProvisioner;
use crate::state::{FileStateStore, StateStore};

use super::context::{ContextProvider, RepositoryContext};
use super::reply::{replies_from_tool_calls, ResponseContent};
use super::run::RunCoordinator;
use super::thread::ThreadHandler;

/// Per-request flags, passed explicitly to every call of a turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewContext {
    pub change_id: String,
    #[serde(default)]
    pub force_fresh_thread: bool,
    #[serde(default)]
    pub force_new_assistant: bool,
}

impl ReviewContext {
    pub fn new(change_id: impl Into<String>) -> Self {
        Self {
            change_id: change_id.into(),
            ..Self::default()
        }
    }
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> ReviewResult<()> {
    if cancel.is_cancelled() {
        return Err(ReviewError::Cancelled);
    }
    Ok(())
}

#[derive(Clone)]
pub struct ReviewSession {
    api: Arc<dyn AssistantApi>,
    state: Arc<dyn StateStore>,
    context: Arc<dyn ContextProvider>,
    settings: Arc<Settings>,
}

impl ReviewSession {
    pub fn new(
        api: Arc<dyn AssistantApi>,
        state: Arc<dyn StateStore>,
        context: Arc<dyn ContextProvider>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            api,
            state,
            context,
            settings,
        }
    }

    /// Session over HTTP, the file state store and the project's source tree.
    ///
    /// Only local settings are checked here; commands that reach the remote
    /// API call [`Settings::validate_remote`] first.
    pub fn from_settings(settings: Settings) -> ReviewResult<Self> {
        settings.validate()?;
        let api = ApiClient::new(&settings.api_base_url, settings.api_key.clone())?;
        let state = FileStateStore::new(settings.state_dir.clone());
        let context = RepositoryContext::new(settings.project_root.clone());

        Ok(Self::new(
            Arc::new(api),
            Arc::new(state),
            Arc::new(context),
            Arc::new(settings),
        ))
    }

    /// Post `prompt` to the change's thread and collect the assistant's answer.
    ///
    /// Once a run exists it is always handed to `cancel_run`, whatever the
    /// outcome of the turn; a failing cancel is logged and dropped.
    pub async fn ask(
        &self,
        ctx: &ReviewContext,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> ReviewResult<ResponseContent> {
        let api = self.api.as_ref();
        let state = self.state.as_ref();
        let threads = ThreadHandler::new(api, state);

        ensure_not_cancelled(cancel)?;
        let thread_id = threads
            .ensure_thread(&ctx.change_id, ctx.force_fresh_thread)
            .await?;

        ensure_not_cancelled(cancel)?;
        threads.add_message(&thread_id, prompt).await?;

        ensure_not_cancelled(cancel)?;
        let mut assistants = AssistantProvisioner::new(api, state, &self.settings)
            .force_new_assistant(ctx.force_new_assistant);
        let mut coordinator =
            RunCoordinator::new(api, self.context.as_ref(), &self.settings, thread_id);
        coordinator.create_run(&mut assistants, &ctx.change_id).await?;

        let outcome = Self::collect_response(&threads, &mut coordinator, cancel).await;

        if let Err(e) = coordinator.cancel_run().await {
            warn!("Failed to cancel run for change {}: {}", ctx.change_id, e);
        }
        outcome
    }

    async fn collect_response(
        threads: &ThreadHandler<'_>,
        coordinator: &mut RunCoordinator<'_>,
        cancel: &CancellationToken,
    ) -> ReviewResult<ResponseContent> {
        ensure_not_cancelled(cancel)?;
        coordinator.poll_run_step().await?;

        ensure_not_cancelled(cancel)?;
        match coordinator.first_step_details()? {
            StepDetails::MessageCreation { message_creation } => {
                let message_id = message_creation.message_id.clone();
                debug!("Reading reply message {}", message_id);
                let text = threads
                    .message_text(coordinator.thread_id(), &message_id)
                    .await?;
                Ok(ResponseContent::from_message(text))
            }
            StepDetails::ToolCalls { .. } => {
                let tool_calls = coordinator.first_step_tool_calls()?;
                Ok(ResponseContent::from_replies(replies_from_tool_calls(tool_calls)?))
            }
            StepDetails::Unknown => Err(ReviewError::MalformedResponse(
                "unsupported run step type".to_string(),
            )),
        }
    }

    /// The change was merged: forget the project's assistant and vector store.
    pub fn change_merged(&self, change_id: &str) -> ReviewResult<()> {
        AssistantProvisioner::new(self.api.as_ref(), self.state.as_ref(), &self.settings)
            .flush_assistant_and_vector_ids(change_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{function_call, message_step, tool_calls_step, FakeApi, StepResponse};
    use crate::api::ResourceStatus;
    use crate::state::{StateScope, THREAD_ID_KEY};
    use async_trait::async_trait;
    use serde_json::Value;
    use tempfile::TempDir;

    struct NoContext;

    #[async_trait]
    impl ContextProvider for NoContext {
        async fn code_context(&self, _arguments: &Value) -> ReviewResult<String> {
            Ok(String::new())
        }
    }

    struct Fixture {
        _project: TempDir,
        _state_dir: TempDir,
        api: Arc<FakeApi>,
        state: Arc<FileStateStore>,
        session: ReviewSession,
    }

    fn fixture() -> Fixture {
        let project = TempDir::new().unwrap();
        std::fs::write(project.path().join("main.rs"), "fn main() {}").unwrap();
        let state_dir = TempDir::new().unwrap();
        let settings = Settings::new(
            project.path().to_path_buf(),
            "demo",
            state_dir.path().to_path_buf(),
        );

        let api = Arc::new(FakeApi::new());
        api.state().batch_statuses = [ResourceStatus::Completed].into_iter().collect();
        let state = Arc::new(FileStateStore::new(state_dir.path()));
        let session = ReviewSession::new(
            api.clone(),
            state.clone(),
            Arc::new(NoContext),
            Arc::new(settings),
        );

        Fixture {
            _project: project,
            _state_dir: state_dir,
            api,
            state,
            session,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_reply() {
        let fx = fixture();
        {
            let mut state = fx.api.state();
            state.step_responses =
                vec![StepResponse::Steps(vec![message_step(ResourceStatus::Completed, "msg_1")])]
                    .into();
            state
                .messages
                .insert("msg_1".to_string(), "No issues found.".to_string());
        }

        let response = fx
            .session
            .ask(&ReviewContext::new("change-1"), "Review", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.message_content.as_deref(), Some("No issues found."));
        assert!(response.replies.is_empty());
        assert_eq!(fx.api.state().cancel_calls, 0);
        assert_eq!(
            fx.state
                .get(&StateScope::Change("change-1".to_string()), THREAD_ID_KEY)
                .unwrap()
                .as_deref(),
            Some("thread_1")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_tool_call_replies_and_dangling_run_cancelled() {
        let fx = fixture();
        let calls = vec![function_call(
            "call_1",
            "format_replies",
            r#"{"replies":[{"reply":"Use a constant","score":1}]}"#,
        )];
        fx.api.state().step_responses =
            vec![StepResponse::Steps(vec![tool_calls_step(ResourceStatus::InProgress, calls)])]
                .into();

        let response = fx
            .session
            .ask(&ReviewContext::new("change-1"), "Review", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.replies.len(), 1);
        assert_eq!(response.replies[0].reply, "Use a constant");
        assert_eq!(fx.api.state().cancel_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_turn_still_cancels_run() {
        let fx = fixture();
        fx.api.state().step_responses =
            vec![StepResponse::Steps(vec![message_step(ResourceStatus::InProgress, "missing")])]
                .into();

        let result = fx
            .session
            .ask(&ReviewContext::new("change-1"), "Review", &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(ReviewError::ConnectionFailure { .. })));
        assert_eq!(fx.api.state().cancel_calls, 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let fx = fixture();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = fx
            .session
            .ask(&ReviewContext::new("change-1"), "Review", &cancel)
            .await;

        assert!(matches!(result, Err(ReviewError::Cancelled)));
        assert_eq!(fx.api.state().threads_created, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_merged_flushes_ids() {
        let fx = fixture();
        fx.api.state().step_responses =
            vec![StepResponse::Steps(vec![message_step(ResourceStatus::Completed, "msg_1")])]
                .into();
        fx.api
            .state()
            .messages
            .insert("msg_1".to_string(), "ok".to_string());
        let ctx = ReviewContext::new("change-1");
        fx.session
            .ask(&ctx, "Review", &CancellationToken::new())
            .await
            .unwrap();

        fx.session.change_merged("change-1").unwrap();
        fx.session
            .ask(&ctx, "Review again", &CancellationToken::new())
            .await
            .unwrap();

        let api = fx.api.state();
        assert_eq!(api.assistants_created.len(), 2);
        assert_eq!(api.vector_stores_created, 2);
        // The thread survives a merge flush
        assert_eq!(api.threads_created, 1);
    }

    #[test]
    fn test_context_deserializes_with_defaults() {
        let ctx: ReviewContext = serde_json::from_str(r#"{"changeId":"42"}"#).unwrap();
        assert_eq!(ctx, ReviewContext::new("42"));
    }
}
