//! Group task model: the master record owned by a group and the
//! per-assignee copies synchronized from it.
//!
//! A [`GroupTask`] is the single source of truth for approval and shared
//! completion state. Each assigned member holds a [`MemberTaskCopy`] whose
//! [`GroupLink`] points back at the master by id; copies never hold a
//! reference to the master itself.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::approval::Approval;

/// Maximum allowed task text length in characters.
pub const MAX_TASK_TEXT_LENGTH: usize = 256;

/// Unique identifier for a master task or a member copy (UUID v7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a new time-ordered task identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `TaskId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Kind of task. Both kinds complete when scored up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// One-off task.
    #[default]
    Todo,
    /// Recurring task.
    Daily,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Todo => write!(f, "todo"),
            Self::Daily => write!(f, "daily"),
        }
    }
}

/// Scoring direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Mark progress / completion.
    Up,
    /// Negative score. Never reverts completion.
    Down,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
        }
    }
}

/// Error returned when parsing an unknown scoring direction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid score direction: {0}")]
pub struct InvalidDirection(pub String);

impl FromStr for Direction {
    type Err = InvalidDirection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(InvalidDirection(other.to_string())),
        }
    }
}

/// How one assignee's completion affects the master and sibling copies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SharedCompletion {
    /// Each assignee completes independently; the master is untouched.
    #[default]
    None,
    /// The first completion completes the master and removes sibling copies.
    SingleCompletion,
    /// The master completes once every assignee has completed.
    AllAssignedCompletion,
}

impl std::fmt::Display for SharedCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::SingleCompletion => write!(f, "singleCompletion"),
            Self::AllAssignedCompletion => write!(f, "allAssignedCompletion"),
        }
    }
}

/// The master record of a task owned by a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupTask {
    /// Master task id.
    pub id: TaskId,
    /// Display text.
    pub text: String,
    /// Task kind.
    pub task_type: TaskType,
    /// Owning group.
    pub group_id: String,
    /// Whether scoring needs manager sign-off.
    pub requires_approval: bool,
    /// Cross-member completion policy.
    pub shared_completion: SharedCompletion,
    /// Users holding a live copy of this task.
    pub assigned_user_ids: BTreeSet<String>,
    /// Approval state machine.
    pub approval: Approval,
    /// Whether the master is completed. Only moves false -> true.
    pub completed: bool,
    /// When the master was completed.
    pub date_completed: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// User who created the task.
    pub created_by: String,
    /// Last time master fields were changed.
    pub updated_at: DateTime<Utc>,
}

/// Back-reference from a copy to its master, with the synchronized
/// master state the copy needs to answer reads on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupLink {
    /// Owning group id.
    pub group_id: String,
    /// Master task id.
    pub task_id: TaskId,
    /// Snapshot of the master's approval state.
    pub approval: Approval,
    /// Whether the master requires approval.
    pub requires_approval: bool,
    /// Master completion policy.
    pub shared_completion: SharedCompletion,
}

/// A per-assignee projection of a [`GroupTask`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberTaskCopy {
    /// Copy id, distinct from the master id.
    pub id: TaskId,
    /// Owner of this copy.
    pub user_id: String,
    /// Display text, synchronized from the master.
    pub text: String,
    /// Task kind.
    pub task_type: TaskType,
    /// Link back to the master.
    pub group: GroupLink,
    /// Whether this assignee completed the task.
    pub completed: bool,
    /// When this assignee completed the task.
    pub date_completed: Option<DateTime<Utc>>,
    /// When the copy was created (assignment time).
    pub created_at: DateTime<Utc>,
}

impl MemberTaskCopy {
    /// Builds a fresh copy for `user_id` from the current master state.
    #[must_use]
    pub fn snapshot_of(master: &GroupTask, user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: TaskId::new(),
            user_id: user_id.to_string(),
            text: master.text.clone(),
            task_type: master.task_type,
            group: GroupLink {
                group_id: master.group_id.clone(),
                task_id: master.id,
                approval: master.approval.clone(),
                requires_approval: master.requires_approval,
                shared_completion: master.shared_completion,
            },
            completed: false,
            date_completed: None,
            created_at: now,
        }
    }
}
