//! One-shot batch fetching
//!
//! The loader never retries. Retry and backoff belong to the caller so
//! navigation latency stays predictable.

use std::sync::Arc;

use tracing::{debug, warn};

use super::types::Batch;
use crate::api::{AlignmentSource, ContentId};
use crate::error::{EngineError, Result};

/// A fetched batch plus the total length of the sequence
#[derive(Debug, Clone)]
pub struct LoadedBatch {
    pub batch: Batch,
    pub total_count: u64,
}

/// Fetches windows of aligned subtitle pairs
#[derive(Clone)]
pub struct BatchLoader {
    source: Arc<dyn AlignmentSource>,
}

impl BatchLoader {
    pub fn new(source: Arc<dyn AlignmentSource>) -> Self {
        Self { source }
    }

    /// Load `limit` alignments starting at `start_index`
    ///
    /// Arguments are checked before any request is made.
    pub async fn load(
        &self,
        content_id: &ContentId,
        start_index: i64,
        limit: u32,
    ) -> Result<LoadedBatch> {
        let start = u64::try_from(start_index).map_err(|_| {
            EngineError::InvalidArgument(format!("start index {} is negative", start_index))
        })?;
        if limit == 0 {
            return Err(EngineError::InvalidArgument("limit must be positive".to_string()));
        }

        debug!("Loading alignments {}..+{} for {}", start, limit, content_id);

        let page = self
            .source
            .fetch_alignments(content_id, start, limit)
            .await
            .map_err(|e| {
                warn!("Batch fetch failed for {}: {}", content_id, e);
                EngineError::load_failure(e)
            })?;

        let total_count = page.pagination.total_alignments;
        if page.alignments.is_empty() && start < total_count {
            return Err(EngineError::LoadFailure {
                status: Some(200),
                body: format!("empty batch at {} of {}", start, total_count),
            });
        }

        let batch = Batch::new(start, page.alignments).map_err(|reason| {
            warn!("Malformed batch for {}: {}", content_id, reason);
            EngineError::LoadFailure {
                status: Some(200),
                body: reason,
            }
        })?;

        Ok(LoadedBatch { batch, total_count })
    }
}
