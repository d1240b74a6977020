//! Error taxonomy for a reconciliation run
//!
//! Fetch and scan errors are fatal to an invocation and surface before any
//! mutation. Action errors are recorded per repository and never abort the
//! remaining actions.

use std::path::PathBuf;
use thiserror::Error;

use crate::plan::ActionKind;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote inventory could not be assembled completely
    #[error("remote inventory for organization '{org}' unavailable (page {page}): {reason}")]
    RemoteUnavailable {
        org: String,
        page: u32,
        reason: String,
    },

    /// The local root is missing, not a directory, or cannot be listed
    #[error("local path {} is unreadable: {reason}", path.display())]
    PathUnreadable { path: PathBuf, reason: String },

    /// A single clone, update or delete failed
    #[error("{kind} of '{name}' failed: {reason}")]
    ActionFailure {
        name: String,
        kind: ActionKind,
        reason: String,
    },

    /// The deletion gate refused to execute the planned deletes
    #[error("refusing to delete local repositories: {reason}")]
    DeletionRefused { reason: String },

    /// A repository name that would escape the local root
    #[error("'{name}' is not a valid repository directory name")]
    InvalidName { name: String },
}

pub type Result<T> = std::result::Result<T, SyncError>;
