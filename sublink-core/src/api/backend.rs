//! Narrow async seams over the HTTP client
//!
//! The loader and the synchronizer only need a slice of the API. Keeping
//! them behind traits lets tests drive them with in-memory backends.

use async_trait::async_trait;

use super::client::{ApiClient, ApiError};
use super::types::{AlignmentPageResponse, ContentId, ProgressRecord, ProgressUpdate};

/// Source of alignment batches
#[async_trait]
pub trait AlignmentSource: Send + Sync {
    async fn fetch_alignments(
        &self,
        content_id: &ContentId,
        start_index: u64,
        limit: u32,
    ) -> Result<AlignmentPageResponse, ApiError>;
}

/// Remote store for progress records
#[async_trait]
pub trait ProgressBackend: Send + Sync {
    async fn get_progress(&self, content_id: &ContentId)
        -> Result<Option<ProgressRecord>, ApiError>;

    async fn put_progress(
        &self,
        content_id: &ContentId,
        update: &ProgressUpdate,
    ) -> Result<ProgressRecord, ApiError>;

    /// Cheap reachability check
    async fn ping(&self) -> Result<(), ApiError>;
}

#[async_trait]
impl AlignmentSource for ApiClient {
    async fn fetch_alignments(
        &self,
        content_id: &ContentId,
        start_index: u64,
        limit: u32,
    ) -> Result<AlignmentPageResponse, ApiError> {
        ApiClient::fetch_alignments(self, content_id, start_index, limit).await
    }
}

#[async_trait]
impl ProgressBackend for ApiClient {
    async fn get_progress(
        &self,
        content_id: &ContentId,
    ) -> Result<Option<ProgressRecord>, ApiError> {
        ApiClient::get_progress(self, content_id).await
    }

    async fn put_progress(
        &self,
        content_id: &ContentId,
        update: &ProgressUpdate,
    ) -> Result<ProgressRecord, ApiError> {
        ApiClient::put_progress(self, content_id, update).await
    }

    async fn ping(&self) -> Result<(), ApiError> {
        self.health().await
    }
}
