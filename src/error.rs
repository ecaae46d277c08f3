//! Error taxonomy of the approval engine.
//!
//! Everything here is local and synchronous: an error is returned to the
//! caller of the failing operation and never affects any other in-flight
//! workflow.
use crate::types::{ApprovalStatus, Role};

#[derive(thiserror::Error, Debug)]
pub enum ApprovalError {
    // Configuration problems, surfaced to the user as "contact an administrator".
    #[error("no approval route matches the requester role and amount")]
    NoMatchingRoute,
    #[error("route {0} has no approval steps configured")]
    MisconfiguredRoute(String),
    #[error("route would overlap an existing active route: {0}")]
    RouteOverlap(String),
    #[error("route definition rejected: {0}")]
    Config(String),

    // Lookups.
    #[error("document {0} was not found")]
    DocumentNotFound(String),
    #[error("user {0} was not found")]
    UserNotFound(String),
    #[error("route {0} was not found")]
    RouteNotFound(String),

    // State errors: the transition is illegal for the current status.
    // Recoverable by the caller refreshing, never retried automatically.
    #[error("operation requires document status {expected:?}, found {found:?}")]
    InvalidState {
        expected: ApprovalStatus,
        found: ApprovalStatus,
    },
    #[error("document has no approval awaiting a decision")]
    NoActiveApproval,
    #[error("an approval is already in progress for this document")]
    AlreadyInProgress,

    // Authorization. The expected role is carried so the UI can explain
    // the refusal without a second lookup.
    #[error("user is not the requester and holds no back-office permission")]
    Forbidden,
    #[error("this step must be decided by a {expected:?}")]
    WrongApproverRole { expected: Role },

    // A conditioned write matched nothing: someone else got there first.
    // Never retried blindly, since that could re-apply a stale decision.
    #[error("the record was updated by someone else, refresh and retry")]
    ConcurrentModification,

    // Infrastructure.
    #[error("storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("stored record could not be decoded: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("record could not be encoded: {0}")]
    Encode(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
