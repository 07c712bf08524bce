//! Core `RemoteStore` trait and its error type.
//!
//! Every operation the workspace needs from the backend goes through this
//! trait, so the reconciliation logic can be exercised against an in-memory
//! double and run against [`HttpStore`](super::HttpStore) in production.

use async_trait::async_trait;
use thiserror::Error;

use crate::recorder::Blob;
use crate::segment::{AudioEntity, EntityId, MetadataUpdate, Provenance, Segment, SegmentId};

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("rejected by the server: {0}")]
    Validation(String),

    #[error("upload rejected: {0}")]
    UploadRejected(String),

    #[error("conflicting change: {0}")]
    Conflict(String),

    #[error("merge failed: {0}")]
    MergeFailed(String),

    #[error("not signed in or session expired")]
    Unauthorized,

    #[error("request timed out")]
    Timeout,

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("failed to parse server response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            StoreError::Timeout
        } else if e.is_decode() {
            StoreError::Parse(e.to_string())
        } else {
            StoreError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// UploadPayload
// ---------------------------------------------------------------------------

/// One binary segment packaged for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadPayload {
    pub file_name: String,
    pub blob: Blob,
    pub provenance: Provenance,
}

impl UploadPayload {
    pub fn new(stem: &str, blob: Blob, provenance: Provenance) -> Self {
        let file_name = format!("{stem}.{}", blob.mime().file_extension());
        Self {
            file_name,
            blob,
            provenance,
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteStore trait
// ---------------------------------------------------------------------------

/// Backend operations consumed by the workspace.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn RemoteStore>`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_audio(&self, id: &EntityId) -> Result<AudioEntity, StoreError>;

    async fn update_metadata(
        &self,
        id: &EntityId,
        update: &MetadataUpdate,
    ) -> Result<AudioEntity, StoreError>;

    /// Created segments are returned in the same order as `payloads`.
    async fn upload_segments(
        &self,
        id: &EntityId,
        payloads: &[UploadPayload],
    ) -> Result<Vec<Segment>, StoreError>;

    async fn reorder_segments(&self, id: &EntityId, order: &[SegmentId]) -> Result<(), StoreError>;

    async fn delete_segment(&self, id: &EntityId, segment: &SegmentId) -> Result<(), StoreError>;

    async fn publish(&self, id: &EntityId, merge: bool) -> Result<AudioEntity, StoreError>;
}
