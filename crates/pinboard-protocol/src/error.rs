//! Protocol error type.

use thiserror::Error;

/// Errors from parsing wire messages.
///
/// These never travel back over the wire — the dispatcher logs the offending
/// frame and drops it.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame was not valid JSON, named an unknown action, or did not
    /// match the action's payload schema.
    #[error("malformed action: {0}")]
    Malformed(#[from] serde_json::Error),
}
