//! Core traits for the backend session protocol.

use async_trait::async_trait;
use thiserror::Error;

use crate::{InitRequest, SessionRecord};

/// Session identifier. Opaque; backends may use any format.
pub type SessionId = String;

/// Backend error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend unreachable: {0}")]
    Unreachable(String),
    #[error("Backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Invalid backend response: {0}")]
    Decode(String),
    #[error("Backend error: {0}")]
    Internal(String),
}

/// Trait for session backends.
///
/// Implementations are stateless protocol clients: they never hold on to a
/// record between calls.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Obtain or create a server-tracked session.
    async fn init(&self, request: &InitRequest) -> Result<SessionRecord, BackendError>;

    /// Push the full current record.
    async fn sync(&self, record: &SessionRecord) -> Result<(), BackendError>;
}

#[async_trait]
impl<B> SessionBackend for std::sync::Arc<B>
where
    B: SessionBackend + ?Sized,
{
    async fn init(&self, request: &InitRequest) -> Result<SessionRecord, BackendError> {
        (**self).init(request).await
    }

    async fn sync(&self, record: &SessionRecord) -> Result<(), BackendError> {
        (**self).sync(record).await
    }
}
