use thiserror::Error;

/// Errors raised while turning raw ingest bytes into frames.
///
/// Callers are expected to recover differently per variant: a [`Decode`] or
/// [`Desync`] discards the offending frame and keeps going, while [`Io`] may
/// mean the link itself is gone.
///
/// [`Decode`]: IngestError::Decode
/// [`Desync`]: IngestError::Desync
/// [`Io`]: IngestError::Io
#[derive(Debug, Error)]
pub enum IngestError {
    /// The payload could not be parsed by the image codec.
    #[error("failed to decode image payload: {0}")]
    Decode(#[from] image::ImageError),
    /// The serial stream lost framing: the end marker was missing or garbled.
    #[error("frame stream desynchronised: expected ENDIMG terminator, got {got:?}")]
    Desync { got: String },
    #[error("frame stream read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
