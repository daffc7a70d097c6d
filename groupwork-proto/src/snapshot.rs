//! Point-in-time snapshot of engine state and its postcard encoding.
//!
//! Indices (copy id -> master id, user -> copies) are not part of the
//! snapshot; they are rebuilt from the task entries on restore.

use serde::{Deserialize, Serialize};

use crate::group::{Group, UserProfile};
use crate::notification::Notification;
use crate::task::{GroupTask, MemberTaskCopy};

/// Version tag written at the head of every snapshot.
pub const SNAPSHOT_VERSION: u16 = 2;

/// Error type for snapshot encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Snapshot was written by an incompatible version.
    #[error("unsupported snapshot version {found} (expected {SNAPSHOT_VERSION})")]
    UnsupportedVersion {
        /// Version found in the snapshot.
        found: u16,
    },
}

/// A master task together with its live member copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEntrySnapshot {
    /// The master record.
    pub master: GroupTask,
    /// Live copies, one per assignee.
    pub copies: Vec<MemberTaskCopy>,
}

/// Pending notifications of one user, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxSnapshot {
    /// Recipient.
    pub user_id: String,
    /// Pending notifications in delivery order.
    pub notifications: Vec<Notification>,
}

/// Full engine state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Format version.
    pub version: u16,
    /// Registered users.
    pub users: Vec<UserProfile>,
    /// Groups and their roles.
    pub groups: Vec<Group>,
    /// Master tasks with their copies.
    pub tasks: Vec<TaskEntrySnapshot>,
    /// Pending notifications.
    pub inboxes: Vec<InboxSnapshot>,
}

/// Encodes a [`StoreSnapshot`] into bytes using postcard.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the snapshot cannot be serialized.
pub fn encode(snapshot: &StoreSnapshot) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(snapshot).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a [`StoreSnapshot`] from bytes using postcard.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the bytes cannot be deserialized,
/// or [`CodecError::UnsupportedVersion`] if the version tag does not match.
pub fn decode(bytes: &[u8]) -> Result<StoreSnapshot, CodecError> {
    let snapshot: StoreSnapshot =
        postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(CodecError::UnsupportedVersion {
            found: snapshot.version,
        });
    }
    Ok(snapshot)
}
