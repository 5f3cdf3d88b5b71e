use async_trait::async_trait;

/// Boundary to the blob store that holds message attachments. The core only
/// ever asks it to drop a reference when the owning message is deleted; the
/// store-and-get-URL side lives entirely outside this service.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn delete(&self, media_ref: &str) -> Result<(), MediaStoreError>;
}

#[derive(Debug, thiserror::Error)]
#[error("media store error: {0}")]
pub struct MediaStoreError(pub String);

/// Default binding when no blob store is wired in: acknowledges and logs.
pub struct NullMediaStore;

#[async_trait]
impl MediaStore for NullMediaStore {
    async fn delete(&self, media_ref: &str) -> Result<(), MediaStoreError> {
        tracing::debug!(%media_ref, "no media store configured, skipping attachment removal");
        Ok(())
    }
}
