//! Assistant provisioning keyed by a hash of the assistant parameters.

use chrono::Utc;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::api::{
    AssistantApi, CreateAssistantRequest, FileSearchResources, FunctionDefinition, Tool,
    ToolResources,
};
use crate::config::{AssistantParams, Settings};
use crate::error::ReviewResult;
use crate::state::{StateScope, StateStore, ASSISTANT_ID_LOG_KEY};

use super::vector_store::VectorStoreProvisioner;

pub const GET_CONTEXT_FUNCTION: &str = "get_context";
pub const FORMAT_REPLIES_FUNCTION: &str = "format_replies";

/// Cache key for an assistant configuration.
///
/// SHA-256 over description, instructions, model and the temperature's
/// string form, separated so that shifting text between fields changes the
/// key.
pub fn assistant_params_hash(params: &AssistantParams) -> String {
    let mut hasher = Sha256::new();
    for part in [
        params.description.as_str(),
        params.instructions.as_str(),
        params.model.as_str(),
        params.temperature.to_string().as_str(),
    ] {
        hasher.update(part.len().to_le_bytes());
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

fn get_context_tool() -> Tool {
    Tool::Function {
        function: FunctionDefinition {
            name: GET_CONTEXT_FUNCTION.to_string(),
            description: "Look up the definition of code entities that the diff uses but \
                          does not show."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "requests": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "entity_category": {
                                    "type": "string",
                                    "enum": ["function", "class", "type", "variable", "module"]
                                },
                                "context_required_entity": { "type": "string" },
                                "filename": { "type": "string" }
                            },
                            "required": ["entity_category", "context_required_entity"]
                        }
                    }
                },
                "required": ["requests"]
            }),
        },
    }
}

fn format_replies_tool() -> Tool {
    Tool::Function {
        function: FunctionDefinition {
            name: FORMAT_REPLIES_FUNCTION.to_string(),
            description: "Return the review as a list of structured replies.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "replies": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "reply": { "type": "string" },
                                "score": { "type": "integer" },
                                "relevance": { "type": "number" },
                                "repeated": { "type": "boolean" },
                                "conflicting": { "type": "boolean" },
                                "filename": { "type": "string" },
                                "line_number": { "type": "integer" },
                                "code_snippet": { "type": "string" }
                            },
                            "required": ["reply"]
                        }
                    }
                },
                "required": ["replies"]
            }),
        },
    }
}

pub struct AssistantProvisioner<'a> {
    api: &'a dyn AssistantApi,
    state: &'a dyn StateStore,
    vector_stores: VectorStoreProvisioner<'a>,
    params: AssistantParams,
    project_name: String,
    workspace_scope: StateScope,
    force_new_assistant: bool,
}

impl<'a> AssistantProvisioner<'a> {
    pub fn new(api: &'a dyn AssistantApi, state: &'a dyn StateStore, settings: &Settings) -> Self {
        Self {
            api,
            state,
            vector_stores: VectorStoreProvisioner::new(api, state, settings),
            params: settings.assistant.clone(),
            project_name: settings.project_name.clone(),
            workspace_scope: StateScope::Workspace(settings.project_name.clone()),
            force_new_assistant: settings.force_new_assistant,
        }
    }

    /// Skip the cached assistant even when its parameters match.
    pub fn force_new_assistant(mut self, force: bool) -> Self {
        self.force_new_assistant = self.force_new_assistant || force;
        self
    }

    /// Resolve the assistant for the current parameters, creating it when needed.
    ///
    /// Every call appends `"<rfc3339> <assistant id>"` to the change's
    /// assistant log, whether the id was cached or new.
    pub async fn setup_assistant(&mut self, change_id: &str) -> ReviewResult<String> {
        let hash = assistant_params_hash(&self.params);

        let cached = if self.force_new_assistant {
            None
        } else {
            self.state.get(&self.workspace_scope, &hash)?
        };

        let assistant_id = match cached {
            Some(assistant_id) => {
                debug!("Reusing assistant {} for parameter hash {}", assistant_id, hash);
                assistant_id
            }
            None => {
                let store_id = self.vector_stores.generate_vector_store().await?;
                let request = self.create_request(store_id);
                let assistant = self.api.create_assistant(&request).await?;
                self.state
                    .set(&self.workspace_scope, &hash, &assistant.id)?;
                info!(
                    "🤖 Created assistant {} ({}) for {}",
                    assistant.id, self.params.model, self.project_name
                );
                assistant.id
            }
        };

        let entry = format!("{} {}", Utc::now().to_rfc3339(), assistant_id);
        self.state.append(
            &StateScope::Change(change_id.to_string()),
            ASSISTANT_ID_LOG_KEY,
            &entry,
        )?;

        Ok(assistant_id)
    }

    /// Forget the vector store, every cached assistant id and the change's assistant log.
    pub fn flush_assistant_and_vector_ids(&self, change_id: &str) -> ReviewResult<()> {
        self.vector_stores.remove_vector_store_id()?;
        self.state.destroy(&self.workspace_scope)?;
        self.state.remove(
            &StateScope::Change(change_id.to_string()),
            ASSISTANT_ID_LOG_KEY,
        )?;
        info!("🧹 Flushed assistant and vector store ids for {}", self.project_name);
        Ok(())
    }

    fn create_request(&self, vector_store_id: String) -> CreateAssistantRequest {
        CreateAssistantRequest {
            name: format!("{} reviewer", self.project_name),
            description: self.params.description.clone(),
            instructions: self.params.instructions.clone(),
            model: self.params.model.clone(),
            temperature: self.params.temperature,
            tools: vec![Tool::FileSearch, get_context_tool(), format_replies_tool()],
            tool_resources: Some(ToolResources {
                file_search: FileSearchResources {
                    vector_store_ids: vec![vector_store_id],
                },
            }),
        }
    }
}
