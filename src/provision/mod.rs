//! Remote resources the review runs depend on: the project's vector store
//! and the assistant that searches it.

mod assistant;
mod vector_store;

pub use assistant::{assistant_params_hash, AssistantProvisioner};
