//! Drives one conversational turn against a thread.
//!
//! Lifecycle: `create_run` → `poll_run_step` (poll the run, resolve
//! `requires_action` through the tool dispatcher, fetch steps with a fixed
//! backoff) → read the first step → `cancel_run` to drop anything left
//! running.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::api::{AssistantApi, CreateRunRequest, ResourceStatus, Run, RunStep, StepDetails, ToolCall};
use crate::config::Settings;
use crate::error::{ReviewError, ReviewResult};
use crate::poller::Poller;
use crate::provision::AssistantProvisioner;

use super::context::ContextProvider;
use super::tools::ToolCallDispatcher;

/// Step-list fetches per `poll_run_step`; empty lists and transient errors share this budget.
pub const MAX_STEP_RETRIEVAL_RETRIES: usize = 3;

/// Tool-output submissions allowed over the whole turn.
pub const MAX_ACTION_REQUIRED_RETRIES: usize = 1;

pub struct RunCoordinator<'a> {
    api: &'a dyn AssistantApi,
    dispatcher: ToolCallDispatcher<'a>,
    poller: Poller,
    step_retrieval_interval: Duration,
    thread_id: String,
    run: Option<Run>,
    steps: Vec<RunStep>,
    action_required_submissions: usize,
}

impl<'a> RunCoordinator<'a> {
    pub fn new(
        api: &'a dyn AssistantApi,
        context: &'a dyn ContextProvider,
        settings: &Settings,
        thread_id: impl Into<String>,
    ) -> Self {
        Self {
            api,
            dispatcher: ToolCallDispatcher::new(api, context),
            poller: Poller::new(settings.poll_interval, settings.poll_timeout),
            step_retrieval_interval: settings.step_retrieval_interval,
            thread_id: thread_id.into(),
            run: None,
            steps: Vec::new(),
            action_required_submissions: 0,
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    #[cfg(test)]
    pub fn run(&self) -> Option<&Run> {
        self.run.as_ref()
    }

    fn current_run(&self) -> ReviewResult<&Run> {
        self.run
            .as_ref()
            .ok_or_else(|| ReviewError::InvalidState("no run has been created".to_string()))
    }

    /// Resolve the assistant and start a run on the thread.
    pub async fn create_run(
        &mut self,
        assistants: &mut AssistantProvisioner<'_>,
        change_id: &str,
    ) -> ReviewResult<&Run> {
        let assistant_id = assistants.setup_assistant(change_id).await?;
        let run = self
            .api
            .create_run(&self.thread_id, &CreateRunRequest::new(assistant_id))
            .await?;

        info!(
            "▶️  Started run {} on thread {} (status {})",
            run.id,
            self.thread_id,
            run.status.as_ref().map_or("unset", ResourceStatus::as_str)
        );

        self.steps.clear();
        self.action_required_submissions = 0;
        Ok(self.run.insert(run))
    }

    /// Wait for the run to settle and fetch its steps.
    ///
    /// Each attempt polls the run (submitting tool outputs while the
    /// submission budget lasts), then lists the steps. An empty list or a
    /// transient failure in either phase consumes the attempt and waits the
    /// step retrieval interval before the next one.
    pub async fn poll_run_step(&mut self) -> ReviewResult<&[RunStep]> {
        let mut last_error: Option<ReviewError> = None;

        for attempt in 1..=MAX_STEP_RETRIEVAL_RETRIES {
            match self.retrieve_steps().await {
                Ok(true) => {
                    debug!(
                        "Run steps retrieved after {} poll request(s) in {:?}",
                        self.poller.poll_count(),
                        self.poller.elapsed()
                    );
                    return Ok(&self.steps);
                }
                Ok(false) => {
                    warn!(
                        "Run {} returned no steps (attempt {}/{})",
                        self.run_id(),
                        attempt,
                        MAX_STEP_RETRIEVAL_RETRIES
                    );
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        "Failed to retrieve steps of run {} (attempt {}/{}): {}",
                        self.run_id(),
                        attempt,
                        MAX_STEP_RETRIEVAL_RETRIES,
                        e
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }

            if attempt < MAX_STEP_RETRIEVAL_RETRIES {
                sleep(self.step_retrieval_interval).await;
            }
        }

        let message = format!(
            "failed to retrieve run steps after {} attempts ({} poll request(s) in {:?})",
            MAX_STEP_RETRIEVAL_RETRIES,
            self.poller.poll_count(),
            self.poller.elapsed()
        );
        Err(match last_error {
            Some(source) => ReviewError::connection_caused_by(message, source),
            None => ReviewError::connection(message),
        })
    }

    fn run_id(&self) -> &str {
        self.run.as_ref().map_or("(none)", |run| run.id.as_str())
    }

    /// One attempt: settle the run, then list its steps. `Ok(false)` means
    /// the list came back empty.
    async fn retrieve_steps(&mut self) -> ReviewResult<bool> {
        self.poll_run().await?;
        let run_id = self.current_run()?.id.clone();

        let steps = self.api.list_run_steps(&self.thread_id, &run_id).await?;
        if steps.is_empty() {
            return Ok(false);
        }
        debug!("Run {} has {} step(s)", run_id, steps.len());
        self.steps = steps;
        Ok(true)
    }

    /// Poll until the run leaves the pending set, resolving `requires_action`
    /// while submissions remain.
    async fn poll_run(&mut self) -> ReviewResult<()> {
        loop {
            let current = self.current_run()?.clone();
            let api = self.api;
            let thread_id = self.thread_id.as_str();
            let run_id = current.id.clone();
            let run_ref = run_id.as_str();

            let run = self
                .poller
                .poll_resource(current, move || api.get_run(thread_id, run_ref))
                .await?;
            let run = self.run.insert(run);

            if matches!(
                run.status,
                Some(ResourceStatus::Failed) | Some(ResourceStatus::Expired)
            ) {
                let reason = run
                    .last_error
                    .as_ref()
                    .map_or("no error reported".to_string(), |e| {
                        format!("{}: {}", e.code, e.message)
                    });
                warn!(
                    "Run {} ended {} after {} poll request(s) in {:?} ({})",
                    run.id,
                    run.status.as_ref().map_or("unset", ResourceStatus::as_str),
                    self.poller.poll_count(),
                    self.poller.elapsed(),
                    reason
                );
            }

            if run.status != Some(ResourceStatus::RequiresAction) {
                return Ok(());
            }

            if self.action_required_submissions >= MAX_ACTION_REQUIRED_RETRIES {
                warn!(
                    "Run {} still requires action after {} submission(s); not actionable",
                    run.id, self.action_required_submissions
                );
                return Ok(());
            }

            let tool_calls: Vec<ToolCall> = run.required_tool_calls().unwrap_or_default().to_vec();
            let mut resumed = self
                .dispatcher
                .submit_tool_output(&self.thread_id, &run_id, &tool_calls)
                .await?;
            self.action_required_submissions += 1;

            // Unset so the next poll cycle waits on the resumed run.
            resumed.status = None;
            self.run = Some(resumed);
        }
    }

    fn first_step(&self) -> ReviewResult<&RunStep> {
        self.steps
            .first()
            .ok_or_else(|| ReviewError::InvalidState("no run steps retrieved".to_string()))
    }

    /// Details of the first listed step; an unknown step type is malformed.
    pub fn first_step_details(&self) -> ReviewResult<&StepDetails> {
        let step = self.first_step()?;
        match &step.step_details {
            StepDetails::Unknown => Err(ReviewError::MalformedResponse(format!(
                "run step {} has an unsupported type",
                step.id
            ))),
            details => Ok(details),
        }
    }

    pub fn first_step_tool_calls(&self) -> ReviewResult<&[ToolCall]> {
        match self.first_step_details()? {
            StepDetails::ToolCalls { tool_calls } => Ok(tool_calls),
            _ => Err(ReviewError::MalformedResponse(
                "first run step does not carry tool calls".to_string(),
            )),
        }
    }

    /// Cancel the run unless its first step already completed.
    ///
    /// Returns whether a cancel request was sent.
    pub async fn cancel_run(&mut self) -> ReviewResult<bool> {
        let run_id = self.current_run()?.id.clone();

        let first_status = self.steps.first().and_then(|step| step.status.as_ref());
        if first_status == Some(&ResourceStatus::Completed) {
            debug!("Run {} completed; nothing to cancel", run_id);
            return Ok(false);
        }

        let run = self.api.cancel_run(&self.thread_id, &run_id).await?;
        if run.status != Some(ResourceStatus::Cancelled) {
            warn!(
                "Run {} not cancelled (status {})",
                run_id,
                run.status.as_ref().map_or("unset", ResourceStatus::as_str)
            );
        }
        self.run = Some(run);
        Ok(true)
    }
}
