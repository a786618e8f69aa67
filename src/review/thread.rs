use tracing::{debug, info};

use crate::api::{AssistantApi, CreateMessageRequest, Message};
use crate::error::{ReviewError, ReviewResult};
use crate::state::{StateScope, StateStore, THREAD_ID_KEY};

/// Change-scoped conversation thread.
pub struct ThreadHandler<'a> {
    api: &'a dyn AssistantApi,
    state: &'a dyn StateStore,
}

impl<'a> ThreadHandler<'a> {
    pub fn new(api: &'a dyn AssistantApi, state: &'a dyn StateStore) -> Self {
        Self { api, state }
    }

    /// Thread id remembered for the change, or a freshly created one.
    pub async fn ensure_thread(&self, change_id: &str, force_fresh: bool) -> ReviewResult<String> {
        let scope = StateScope::Change(change_id.to_string());

        if !force_fresh {
            if let Some(thread_id) = self.state.get(&scope, THREAD_ID_KEY)? {
                debug!("Reusing thread {} for change {}", thread_id, change_id);
                return Ok(thread_id);
            }
        }

        let thread = self.api.create_thread().await?;
        self.state.set(&scope, THREAD_ID_KEY, &thread.id)?;
        info!("🧵 Created thread {} for change {}", thread.id, change_id);
        Ok(thread.id)
    }

    pub async fn add_message(&self, thread_id: &str, prompt: &str) -> ReviewResult<Message> {
        self.api
            .add_message(thread_id, &CreateMessageRequest::user(prompt))
            .await
    }

    pub async fn message_text(&self, thread_id: &str, message_id: &str) -> ReviewResult<String> {
        let message = self.api.get_message(thread_id, message_id).await?;
        debug!("Read message {} ({:?}) from thread {}", message.id, message.role, thread_id);
        message.text().ok_or_else(|| {
            ReviewError::MalformedResponse(format!("message {} has no text content", message_id))
        })
    }
}
