//! JSON request and response bodies of the HTTP API.
//!
//! Internal records keep the approval state machine as an enum; the views
//! here flatten it into the `{requested, requestedDate, approved}` shape
//! clients read.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::approval::ApprovalView;
use crate::task::{GroupTask, MemberTaskCopy, SharedCompletion, TaskId, TaskType};

/// Error name carried by every authorization failure.
pub const NOT_AUTHORIZED: &str = "NotAuthorized";

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// HTTP status code.
    pub code: u16,
    /// Error name, e.g. `NotAuthorized`.
    pub error: String,
    /// Rendered message.
    pub message: String,
}

/// `POST /users`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    /// Login name.
    pub username: String,
    /// Preferred locale; server default when absent.
    #[serde(default)]
    pub locale: Option<String>,
}

/// `PUT /user`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    /// New preferred locale.
    pub locale: String,
}

/// `POST /groups`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroupRequest {
    /// Display name.
    pub name: String,
}

/// `POST /groups/{group_id}/members`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    /// User to add.
    pub user_id: String,
}

/// `POST /groups/{group_id}/add-manager` and `remove-manager`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerRequest {
    /// User gaining or losing the manager role.
    pub manager_id: String,
}

/// `POST /tasks/group/{group_id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupTaskRequest {
    /// Display text.
    pub text: String,
    /// Task kind, `todo` when absent.
    #[serde(rename = "type", default)]
    pub task_type: TaskType,
    /// Whether scoring needs manager sign-off.
    #[serde(default)]
    pub requires_approval: bool,
    /// Completion policy, `none` when absent.
    #[serde(default)]
    pub shared_completion: Option<SharedCompletion>,
}

/// `PUT /tasks/{task_id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateGroupTaskRequest {
    /// New display text.
    pub text: String,
}

/// `POST /tasks/{task_id}/score/{direction}` success body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResponse {
    /// Whether the scored copy is completed.
    pub completed: bool,
    /// When it was completed.
    pub date_completed: Option<DateTime<Utc>>,
}

/// `type` query filter of `GET /tasks/group/{group_id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupTaskFilter {
    /// Incomplete todos.
    Todos,
    /// Completed todos.
    CompletedTodos,
    /// All dailies.
    Dailys,
}

impl GroupTaskFilter {
    /// Whether `task` passes the filter. `None` selects active tasks:
    /// every daily and every incomplete todo.
    #[must_use]
    pub const fn matches(filter: Option<Self>, task: &GroupTask) -> bool {
        match (filter, task.task_type) {
            (None, TaskType::Todo) | (Some(Self::Todos), TaskType::Todo) => !task.completed,
            (Some(Self::CompletedTodos), TaskType::Todo) => task.completed,
            (None, TaskType::Daily) | (Some(Self::Dailys), TaskType::Daily) => true,
            _ => false,
        }
    }
}

/// Query string of `GET /tasks/group/{group_id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupTasksQuery {
    /// Optional filter.
    #[serde(rename = "type", default)]
    pub filter: Option<GroupTaskFilter>,
}

/// Master task as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupTaskView {
    /// Master task id.
    pub id: TaskId,
    /// Display text.
    pub text: String,
    /// Task kind.
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Owning group.
    pub group_id: String,
    /// Whether scoring needs manager sign-off.
    pub requires_approval: bool,
    /// Completion policy.
    pub shared_completion: SharedCompletion,
    /// Assignees.
    pub assigned_user_ids: BTreeSet<String>,
    /// Flattened approval state.
    pub approval: ApprovalView,
    /// Whether the master is completed.
    pub completed: bool,
    /// When the master was completed.
    pub date_completed: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last master update.
    pub updated_at: DateTime<Utc>,
}

impl From<&GroupTask> for GroupTaskView {
    fn from(task: &GroupTask) -> Self {
        Self {
            id: task.id,
            text: task.text.clone(),
            task_type: task.task_type,
            group_id: task.group_id.clone(),
            requires_approval: task.requires_approval,
            shared_completion: task.shared_completion,
            assigned_user_ids: task.assigned_user_ids.clone(),
            approval: ApprovalView::new(task.requires_approval, &task.approval),
            completed: task.completed,
            date_completed: task.date_completed,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

/// `group` field of a [`MemberTaskView`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupLinkView {
    /// Owning group id.
    pub id: String,
    /// Master task id.
    pub task_id: TaskId,
    /// Flattened approval state.
    pub approval: ApprovalView,
    /// Completion policy.
    pub shared_completion: SharedCompletion,
}

/// Member copy as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberTaskView {
    /// Copy id.
    pub id: TaskId,
    /// Owner.
    pub user_id: String,
    /// Display text.
    pub text: String,
    /// Task kind.
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Link back to the master.
    pub group: GroupLinkView,
    /// Whether the owner completed it.
    pub completed: bool,
    /// When the owner completed it.
    pub date_completed: Option<DateTime<Utc>>,
    /// Assignment time.
    pub created_at: DateTime<Utc>,
}

impl From<&MemberTaskCopy> for MemberTaskView {
    fn from(copy: &MemberTaskCopy) -> Self {
        Self {
            id: copy.id,
            user_id: copy.user_id.clone(),
            text: copy.text.clone(),
            task_type: copy.task_type,
            group: GroupLinkView {
                id: copy.group.group_id.clone(),
                task_id: copy.group.task_id,
                approval: ApprovalView::new(copy.group.requires_approval, &copy.group.approval),
                shared_completion: copy.group.shared_completion,
            },
            completed: copy.completed,
            date_completed: copy.date_completed,
            created_at: copy.created_at,
        }
    }
}

/// Either kind of task, for `GET /tasks/{task_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TaskView {
    /// A master task.
    Master(GroupTaskView),
    /// A member copy.
    Copy(MemberTaskView),
}
