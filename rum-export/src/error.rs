use rum_common::StorageError;

/// An error sending an export request.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// The collector responded with an unsuccessful status code.
    #[error("collector responded with status {0}")]
    Status(u16),
    /// The request could not be delivered.
    #[error("network error: {0}")]
    Network(String),
    /// The transport is shut down.
    #[error("transport closed")]
    Closed,
}

/// An error exporting a batch.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The batch could not be encoded.
    #[error("failed to encode batch")]
    Encode(#[from] serde_json::Error),
    /// The encoded batch could not be sent.
    #[error("failed to send batch")]
    Transport(#[from] TransportError),
    /// The batch could not be staged for sending.
    #[error("failed to stage batch")]
    Storage(#[from] StorageError),
}
