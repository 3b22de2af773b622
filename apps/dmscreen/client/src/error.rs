use dmscreen_core::EnvelopeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    #[error("sync client has stopped")]
    Stopped,
}
