//! Error taxonomy of the STEP loading pipeline.
//!
//! Every stage (fetch, engine start-up, conversion, mesh building) reports a
//! [`LoadError`]. The viewer catches all of them at its boundary, so none of
//! these ever reach the rendering surface.

use thiserror::Error;

/// Result type used throughout the loading pipeline.
pub type LoadResult<T> = Result<T, LoadError>;

/// The conversion engine could not be started.
///
/// Initialisation is attempted once per process, so this error is shared by
/// every caller that awaited (or will await) the engine.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("geometry engine failed to initialise: {0}")]
pub struct EngineInitError(pub String);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    /// The source is neither a URL nor a recognised binary shape.
    #[error("expected a STEP file URL or a binary buffer, got {0}")]
    InvalidInput(String),

    /// The server answered with a non-success status.
    #[error("failed to fetch STEP file ({status}): {status_text}")]
    Fetch { status: u16, status_text: String },

    /// The request never produced a response (DNS, TLS, connection reset...).
    #[error("network error while fetching STEP file: {0}")]
    Network(String),

    /// The request was superseded or its viewer was disposed.
    #[error("load was cancelled")]
    Cancelled,

    #[error(transparent)]
    EngineInit(#[from] EngineInitError),

    /// The engine rejected the bytes, typically malformed STEP content.
    #[error("STEP conversion failed: {0}")]
    Conversion(String),

    /// The engine produced a mesh record that cannot be turned into geometry.
    #[error("conversion result is corrupt, mesh {mesh}: {reason}")]
    CorruptMesh { mesh: usize, reason: String },
}

impl LoadError {
    /// Cancellations are expected control flow and must not be logged as failures.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadError::Cancelled)
    }
}

impl From<reqwest::Error> for LoadError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => LoadError::Fetch {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            },
            None => LoadError::Network(e.to_string()),
        }
    }
}
