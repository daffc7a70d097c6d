//! Notification records delivered to a user's pending-notification queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::task::{Direction, TaskId};

/// Kind of notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// An assignee asked for approval of a group task.
    GroupTaskApproval,
    /// A manager approved the recipient's group task.
    GroupTaskApproved,
}

/// Payload of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    /// Message rendered in the recipient's locale.
    pub message: String,
    /// Group owning the task.
    pub group_id: String,
    /// Id of the recipient-facing task: the member copy that was scored
    /// or approved.
    pub task_id: TaskId,
    /// Id of the master group task the copy belongs to.
    pub group_task_id: TaskId,
    /// User who triggered the notification.
    pub user_id: String,
    /// Scoring direction that triggered it, when relevant.
    pub direction: Option<Direction>,
}

/// A single pending notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification id (UUID v7, time-ordered).
    pub id: Uuid,
    /// Kind of notification.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Payload.
    pub data: NotificationData,
    /// When the notification was emitted.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Creates a notification stamped now.
    #[must_use]
    pub fn new(kind: NotificationKind, data: NotificationData) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            data,
            created_at: Utc::now(),
        }
    }
}
