//! Vector store provisioning with self-healing validation.
//!
//! A stored vector store id is trusted only once its file batch reports
//! `completed`. Until then every validation attempt polls the batch; a batch
//! that settles in any other status throws the whole store away and rebuilds
//! it from a fresh upload.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::api::{AssistantApi, CreateVectorStoreRequest, ResourceStatus};
use crate::config::Settings;
use crate::error::{ReviewError, ReviewResult};
use crate::poller::Poller;
use crate::state::{
    StateScope, StateStore, VECTOR_STORE_FILE_BATCH_ID_KEY, VECTOR_STORE_FILE_BATCH_STATUS_KEY,
    VECTOR_STORE_ID_KEY,
};
use crate::workspace::{collect_project_files, upload_project_files};

/// Validation attempts before giving up; every failed attempt but the last recreates the store.
pub const MAX_VECTOR_STORE_GENERATION_RETRIES: usize = 3;

pub struct VectorStoreProvisioner<'a> {
    api: &'a dyn AssistantApi,
    state: &'a dyn StateStore,
    poller: Poller,
    scope: StateScope,
    project_name: String,
    project_root: PathBuf,
    upload_chunk_bytes: usize,
}

impl<'a> VectorStoreProvisioner<'a> {
    pub fn new(api: &'a dyn AssistantApi, state: &'a dyn StateStore, settings: &Settings) -> Self {
        Self {
            api,
            state,
            poller: Poller::new(settings.poll_interval, settings.poll_timeout),
            scope: StateScope::Project(settings.project_name.clone()),
            project_name: settings.project_name.clone(),
            project_root: settings.project_root.clone(),
            upload_chunk_bytes: settings.upload_chunk_bytes,
        }
    }

    /// Return a validated vector store id, creating the store when none is stored.
    pub async fn generate_vector_store(&mut self) -> ReviewResult<String> {
        let store_id = match self.state.get(&self.scope, VECTOR_STORE_ID_KEY)? {
            Some(store_id) => {
                debug!("Found stored vector store {}", store_id);
                store_id
            }
            None => self.create_vector_store().await?,
        };

        self.validate_vector_store(store_id).await
    }

    /// Confirm the store's file batch completed, recreating the store on failure.
    ///
    /// Returns the id of the store that validated, which differs from
    /// `store_id` when a recreation happened.
    pub async fn validate_vector_store(&mut self, store_id: String) -> ReviewResult<String> {
        let mut store_id = store_id;

        for attempt in 1..=MAX_VECTOR_STORE_GENERATION_RETRIES {
            let stored_status = self
                .state
                .get(&self.scope, VECTOR_STORE_FILE_BATCH_STATUS_KEY)?
                .map(ResourceStatus::from);

            if stored_status == Some(ResourceStatus::Completed) {
                debug!("Vector store {} already validated", store_id);
                return Ok(store_id);
            }

            let status = match self.state.get(&self.scope, VECTOR_STORE_FILE_BATCH_ID_KEY)? {
                Some(batch_id) => {
                    let api = self.api;
                    let (vs_id, batch) = (store_id.as_str(), batch_id.as_str());
                    let polled = self
                        .poller
                        .poll(stored_status.as_ref(), move || {
                            api.get_file_batch(vs_id, batch)
                        })
                        .await;
                    match polled {
                        Ok(polled) => {
                            let status = polled.and_then(|b| b.status).or(stored_status);
                            self.persist_batch_status(status.as_ref())?;
                            status
                        }
                        // A batch that never settles fails this attempt.
                        Err(e) if e.is_transient() => {
                            warn!(
                                "Polling file batch {} of vector store {} failed: {}",
                                batch_id, store_id, e
                            );
                            stored_status
                        }
                        Err(e) => return Err(e),
                    }
                }
                None => {
                    warn!("Vector store {} has no file batch recorded", store_id);
                    None
                }
            };

            if status == Some(ResourceStatus::Completed) {
                info!("✅ Vector store {} is ready", store_id);
                return Ok(store_id);
            }

            warn!(
                "Vector store {} failed validation (attempt {}/{}, batch status {})",
                store_id,
                attempt,
                MAX_VECTOR_STORE_GENERATION_RETRIES,
                status.as_ref().map_or("unset", ResourceStatus::as_str)
            );

            if attempt < MAX_VECTOR_STORE_GENERATION_RETRIES {
                store_id = self.create_vector_store().await?;
            }
        }

        Err(ReviewError::VectorStoreGenerationFailure {
            attempts: MAX_VECTOR_STORE_GENERATION_RETRIES,
        })
    }

    /// Forget the stored vector store and its file batch.
    pub fn remove_vector_store_id(&self) -> ReviewResult<()> {
        self.state.remove(&self.scope, VECTOR_STORE_ID_KEY)?;
        self.state.remove(&self.scope, VECTOR_STORE_FILE_BATCH_ID_KEY)?;
        self.state.remove(&self.scope, VECTOR_STORE_FILE_BATCH_STATUS_KEY)
    }

    async fn create_vector_store(&mut self) -> ReviewResult<String> {
        self.remove_vector_store_id()?;

        let files = collect_project_files(self.project_root.clone()).await?;
        let file_ids = upload_project_files(
            self.api,
            &self.project_name,
            &files,
            self.upload_chunk_bytes,
        )
        .await?;

        let request = CreateVectorStoreRequest {
            name: format!("{}-review", self.project_name),
        };
        let store = self.api.create_vector_store(&request).await?;
        self.state.set(&self.scope, VECTOR_STORE_ID_KEY, &store.id)?;

        let batch = self.api.create_file_batch(&store.id, file_ids).await?;
        self.state
            .set(&self.scope, VECTOR_STORE_FILE_BATCH_ID_KEY, &batch.id)?;
        self.persist_batch_status(batch.status.as_ref())?;

        info!(
            "📦 Created vector store {} with file batch {} for {}",
            store.id, batch.id, self.project_name
        );
        Ok(store.id)
    }

    fn persist_batch_status(&self, status: Option<&ResourceStatus>) -> ReviewResult<()> {
        match status {
            Some(status) => {
                self.state
                    .set(&self.scope, VECTOR_STORE_FILE_BATCH_STATUS_KEY, status.as_str())
            }
            None => self
                .state
                .remove(&self.scope, VECTOR_STORE_FILE_BATCH_STATUS_KEY),
        }
    }
}
