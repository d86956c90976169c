//! Structured error types for the finalization pipeline.
//!
//! Only failures that abort a run live here. A missing or undecodable logo or
//! signature degrades the rendered document instead of erroring, and a
//! rejected email is recorded in the audit log and folded into the note's
//! aggregate status — neither ever surfaces as an `Err`.

use thiserror::Error;
use uuid::Uuid;

/// A collaborator-side persistence failure: the note store, the blob store
/// or the audit sink could not complete an operation.
#[derive(Debug, Clone, Error)]
#[error("storage failure: {0}")]
pub struct StorageError(pub String);

/// A transport-level failure while handing a message to the dispatcher,
/// as opposed to the dispatcher accepting the hand-off and rejecting the
/// message. Both count as a failed send for the audit log.
#[derive(Debug, Clone, Error)]
#[error("dispatch transport error: {0}")]
pub struct DispatchError(pub String);

/// The unified error type returned by pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The delivery note does not exist. Fatal; nothing was attempted.
    #[error("delivery note {0} not found")]
    NoteNotFound(Uuid),

    /// Artifact upload or note update failed. Fatal for the run: a note
    /// left pointing at an artifact that was never stored is worse than an
    /// explicit error.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// `send_to_client` was invoked for a note without a client email.
    #[error("delivery note has no client email")]
    ClientEmailMissing,

    /// `send_to_client` was invoked before any document was generated and
    /// stored for the note.
    #[error("no stored document for this delivery note")]
    ArtifactMissing,

    /// `send_to_client` handed the message off and the dispatcher rejected
    /// it. Carries the serialized rejection detail.
    #[error("email dispatch rejected: {0}")]
    DispatchRejected(String),
}
