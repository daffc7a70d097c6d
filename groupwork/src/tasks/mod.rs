//! Group task coordination.
//!
//! A master task owned by a group is synchronized into one copy per
//! assignee ([`sync`]). Scoring a copy first passes the [`approval`] gate,
//! then [`completion`] applies the shared completion policy. [`store`]
//! keeps masters behind per-master locks with id indices, and
//! [`service`] exposes the operations request handlers call.

pub mod approval;
pub mod completion;
pub mod service;
pub mod store;
pub mod sync;

pub use approval::{ApprovalGate, GateDecision};
pub use completion::ScoreOutcome;
pub use service::{NewGroupTask, TaskRecord, TaskService};
pub use store::{TaskEntry, TaskStore};

use groupwork_proto::task::TaskId;
use thiserror::Error;

use crate::directory::DirectoryError;
use crate::i18n::MessageKey;

/// Errors that can occur during task operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The acting user may not perform the operation, or the task is
    /// waiting for approval.
    #[error("{message}")]
    NotAuthorized {
        /// Catalog key distinguishing the cause.
        key: MessageKey,
        /// Message rendered in the acting user's locale.
        message: String,
    },
    /// Task text cannot be empty.
    #[error("task text cannot be empty")]
    TextEmpty,
    /// Task text exceeds the maximum length.
    #[error("task text too long (max 256 characters)")]
    TextTooLong,
    /// Task with the given ID was not found (or is not visible to the user).
    #[error("task not found: {0}")]
    TaskNotFound(String),
    /// The user holds no copy of the task.
    #[error("user {user_id} is not assigned to task {task_id}")]
    NotAssigned {
        /// Master task id.
        task_id: TaskId,
        /// User that was looked up.
        user_id: String,
    },
    /// The master is already completed and cannot take new assignees.
    #[error("task {0} is already completed")]
    TaskCompleted(TaskId),
    /// Directory lookup failed.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl EngineError {
    /// HTTP-style status code for this error.
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::NotAuthorized { .. }
            | Self::Directory(
                DirectoryError::NotPermitted { .. } | DirectoryError::NotMember { .. },
            ) => 401,
            Self::TaskNotFound(_)
            | Self::Directory(
                DirectoryError::UserNotFound(_) | DirectoryError::GroupNotFound(_),
            ) => 404,
            Self::TextEmpty
            | Self::TextTooLong
            | Self::NotAssigned { .. }
            | Self::TaskCompleted(_)
            | Self::Directory(_) => 400,
        }
    }

    /// Error name for this error.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self.code() {
            401 => "NotAuthorized",
            404 => "NotFound",
            _ => "BadRequest",
        }
    }

    /// The message key, if this is an authorization failure with one.
    #[must_use]
    pub const fn message_key(&self) -> Option<MessageKey> {
        match self {
            Self::NotAuthorized { key, .. } => Some(*key),
            _ => None,
        }
    }
}
