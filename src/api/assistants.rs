//! File, vector store and assistant endpoints.

use reqwest::Method;

use super::client::ApiClient;
use super::types::{
    Assistant, CreateAssistantRequest, CreateFileBatchRequest, CreateVectorStoreRequest,
    FileBatch, FileObject, VectorStore,
};
use crate::error::ReviewResult;

/// Upload purpose for documents searched by assistants.
const ASSISTANTS_PURPOSE: &str = "assistants";

impl ApiClient {
    pub async fn upload_file(&self, filename: &str, content: Vec<u8>) -> ReviewResult<FileObject> {
        self.post_multipart("files", filename, &content, ASSISTANTS_PURPOSE)
            .await
    }

    pub async fn create_vector_store(
        &self,
        request: &CreateVectorStoreRequest,
    ) -> ReviewResult<VectorStore> {
        self.request(Method::POST, "vector_stores", Some(request))
            .await
    }

    pub async fn create_file_batch(
        &self,
        vector_store_id: &str,
        file_ids: Vec<String>,
    ) -> ReviewResult<FileBatch> {
        let request = CreateFileBatchRequest { file_ids };
        self.request(
            Method::POST,
            &format!("vector_stores/{}/file_batches", vector_store_id),
            Some(&request),
        )
        .await
    }

    pub async fn get_file_batch(
        &self,
        vector_store_id: &str,
        batch_id: &str,
    ) -> ReviewResult<FileBatch> {
        self.request::<(), _>(
            Method::GET,
            &format!("vector_stores/{}/file_batches/{}", vector_store_id, batch_id),
            None,
        )
        .await
    }

    pub async fn create_assistant(
        &self,
        request: &CreateAssistantRequest,
    ) -> ReviewResult<Assistant> {
        self.request(Method::POST, "assistants", Some(request)).await
    }
}
