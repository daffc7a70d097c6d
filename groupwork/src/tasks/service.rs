//! Group task operations exposed to request handlers.
//!
//! `TaskService` resolves the acting user, checks their role in the owning
//! group, and then runs the approval gate, completion policy and copy
//! synchronization while holding the master's lock. Index updates for
//! created or removed copies happen before that lock is released.

use std::sync::Arc;

use chrono::Utc;
use groupwork_proto::api::GroupTaskFilter;
use groupwork_proto::approval::{Approval, ApprovalError};
use groupwork_proto::group::UserProfile;
use groupwork_proto::notification::{Notification, NotificationData, NotificationKind};
use groupwork_proto::snapshot::TaskEntrySnapshot;
use groupwork_proto::task::{
    Direction, GroupTask, MAX_TASK_TEXT_LENGTH, MemberTaskCopy, SharedCompletion, TaskId, TaskType,
};

use super::approval::ApprovalGate;
use super::store::{TaskEntry, TaskStore};
use super::{EngineError, completion, sync};
use crate::directory::{Directory, DirectoryError};
use crate::i18n::{MessageKey, Translator};
use crate::notify::NotificationCenter;

/// Fields of a group task to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroupTask {
    /// Display text.
    pub text: String,
    /// Task kind.
    pub task_type: TaskType,
    /// Whether scoring needs manager sign-off.
    pub requires_approval: bool,
    /// Completion policy.
    pub shared_completion: SharedCompletion,
}

impl NewGroupTask {
    /// A plain todo with no approval and no shared completion.
    #[must_use]
    pub fn todo(text: &str) -> Self {
        Self {
            text: text.to_string(),
            task_type: TaskType::Todo,
            requires_approval: false,
            shared_completion: SharedCompletion::None,
        }
    }

    /// Sets the approval requirement.
    #[must_use]
    pub const fn requires_approval(mut self, required: bool) -> Self {
        self.requires_approval = required;
        self
    }

    /// Sets the completion policy.
    #[must_use]
    pub const fn shared_completion(mut self, policy: SharedCompletion) -> Self {
        self.shared_completion = policy;
        self
    }
}

/// A task looked up by id: either a master or a member copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRecord {
    /// Master task.
    Master(GroupTask),
    /// Member copy.
    Copy(MemberTaskCopy),
}

/// Group task operations.
pub struct TaskService {
    store: TaskStore,
    directory: Arc<Directory>,
    notifications: Arc<NotificationCenter>,
    translator: Arc<dyn Translator>,
}

impl TaskService {
    /// Creates a service over an existing store and collaborators.
    #[must_use]
    pub fn new(
        store: TaskStore,
        directory: Arc<Directory>,
        notifications: Arc<NotificationCenter>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            store,
            directory,
            notifications,
            translator,
        }
    }

    /// Creates a master task in `group_id`. Leader or manager only.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TextEmpty`], [`EngineError::TextTooLong`],
    /// [`EngineError::NotAuthorized`] or a directory lookup error.
    pub fn create_group_task(
        &self,
        actor_id: &str,
        group_id: &str,
        new: NewGroupTask,
    ) -> Result<GroupTask, EngineError> {
        let actor = self.directory.user(actor_id)?;
        self.require_manager(group_id, &actor)?;
        validate_text(&new.text)?;

        let now = Utc::now();
        let master = GroupTask {
            id: TaskId::new(),
            text: new.text,
            task_type: new.task_type,
            group_id: group_id.to_string(),
            requires_approval: new.requires_approval,
            shared_completion: new.shared_completion,
            assigned_user_ids: std::collections::BTreeSet::new(),
            approval: Approval::Unrequested,
            completed: false,
            date_completed: None,
            created_at: now,
            created_by: actor.id.clone(),
            updated_at: now,
        };
        self.store.insert_master(master.clone());
        tracing::info!(
            task_id = %master.id,
            group_id = %group_id,
            requires_approval = master.requires_approval,
            shared_completion = %master.shared_completion,
            "group task created"
        );
        Ok(master)
    }

    /// Assigns a master task to `user_id`, creating their copy.
    ///
    /// Assigning a user who already holds a copy returns that copy
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TaskNotFound`], [`EngineError::NotAuthorized`],
    /// [`EngineError::TaskCompleted`], or a directory error when the
    /// assignee is unknown or not a group member.
    pub fn assign_task(
        &self,
        actor_id: &str,
        master_id: &TaskId,
        user_id: &str,
    ) -> Result<MemberTaskCopy, EngineError> {
        let actor = self.directory.user(actor_id)?;
        self.directory.user(user_id)?;
        self.with_entry(master_id, |entry| {
            self.require_manager(&entry.master.group_id, &actor)?;
            self.directory.role_of(&entry.master.group_id, user_id)?;
            if entry.master.completed && !entry.copies.contains_key(user_id) {
                return Err(EngineError::TaskCompleted(entry.master.id));
            }

            let assignment = sync::assign(entry, user_id, Utc::now());
            if assignment.created {
                self.store.index_copy(&assignment.copy);
                tracing::info!(
                    task_id = %master_id,
                    user_id = %user_id,
                    copy_id = %assignment.copy.id,
                    "task assigned"
                );
            } else {
                tracing::debug!(task_id = %master_id, user_id = %user_id, "already assigned");
            }
            Ok(assignment.copy)
        })
    }

    /// Removes `user_id`'s copy. Under all-assigned completion the
    /// remaining copies are re-evaluated.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TaskNotFound`], [`EngineError::NotAuthorized`]
    /// or [`EngineError::NotAssigned`].
    pub fn unassign_task(
        &self,
        actor_id: &str,
        master_id: &TaskId,
        user_id: &str,
    ) -> Result<GroupTask, EngineError> {
        let actor = self.directory.user(actor_id)?;
        self.with_entry(master_id, |entry| {
            self.require_manager(&entry.master.group_id, &actor)?;
            let now = Utc::now();
            let removed =
                sync::unassign(entry, user_id, now).ok_or_else(|| EngineError::NotAssigned {
                    task_id: *master_id,
                    user_id: user_id.to_string(),
                })?;
            self.store.unindex_copy(&removed);
            let completed = completion::reevaluate(entry, now);
            tracing::info!(
                task_id = %master_id,
                user_id = %user_id,
                master_completed = completed,
                "task unassigned"
            );
            Ok(entry.master.clone())
        })
    }

    /// Approves the master for `user_id` and notifies them. Returns the
    /// user's refreshed copy.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TaskNotFound`], [`EngineError::NotAssigned`],
    /// or [`EngineError::NotAuthorized`] when the actor is not a manager or
    /// the task is already approved.
    pub fn approve_task(
        &self,
        actor_id: &str,
        master_id: &TaskId,
        user_id: &str,
    ) -> Result<MemberTaskCopy, EngineError> {
        let actor = self.directory.user(actor_id)?;
        self.with_entry(master_id, |entry| {
            self.require_manager(&entry.master.group_id, &actor)?;
            let copy = match sync::approve(entry, user_id, &actor.id, Utc::now()) {
                Ok(Some(copy)) => copy,
                Ok(None) => {
                    return Err(EngineError::NotAssigned {
                        task_id: *master_id,
                        user_id: user_id.to_string(),
                    });
                }
                Err(ApprovalError::AlreadyApproved | ApprovalError::AlreadyRequested) => {
                    return Err(self.not_authorized(MessageKey::CanOnlyApproveTaskOnce, &actor));
                }
            };
            tracing::info!(
                task_id = %master_id,
                user_id = %user_id,
                approver = %actor.id,
                "task approved"
            );

            let locale = self
                .directory
                .user(user_id)
                .map(|u| u.locale)
                .unwrap_or_default();
            let message = self.translator.translate(
                MessageKey::YourTaskHasBeenApproved,
                &[("taskName", copy.text.clone())],
                &locale,
            );
            self.notifications.emit(
                user_id,
                Notification::new(
                    NotificationKind::GroupTaskApproved,
                    NotificationData {
                        message,
                        group_id: entry.master.group_id.clone(),
                        task_id: copy.id,
                        group_task_id: entry.master.id,
                        user_id: actor.id.clone(),
                        direction: None,
                    },
                ),
            );
            Ok(copy)
        })
    }

    /// Scores the acting user's copy `copy_id` in `direction`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TaskNotFound`] when the copy does not exist
    /// or belongs to someone else, and [`EngineError::NotAuthorized`] when
    /// the approval gate refuses the attempt.
    pub fn score_task(
        &self,
        actor_id: &str,
        copy_id: &TaskId,
        direction: Direction,
    ) -> Result<MemberTaskCopy, EngineError> {
        let actor = self.directory.user(actor_id)?;
        let master_id = self
            .store
            .master_of_copy(copy_id)
            .ok_or_else(|| EngineError::TaskNotFound(copy_id.to_string()))?;
        self.with_entry(&master_id, |entry| {
            if entry.copies.get(&actor.id).is_none_or(|c| c.id != *copy_id) {
                return Err(EngineError::TaskNotFound(copy_id.to_string()));
            }

            let now = Utc::now();
            ApprovalGate::new(&self.directory, &self.notifications, self.translator.as_ref())
                .check(entry, &actor, direction, now)?;

            let outcome = completion::score(entry, &actor.id, direction, now)
                .ok_or_else(|| EngineError::TaskNotFound(copy_id.to_string()))?;
            for removed in &outcome.removed {
                self.store.unindex_copy(removed);
            }
            tracing::info!(
                task_id = %master_id,
                copy_id = %copy_id,
                user_id = %actor.id,
                %direction,
                completed = outcome.copy.completed,
                master_completed = outcome.master_completed,
                removed_copies = outcome.removed.len(),
                "task scored"
            );
            Ok(outcome.copy)
        })
    }

    /// Changes the master text and re-syncs it onto every copy.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TaskNotFound`], [`EngineError::NotAuthorized`],
    /// [`EngineError::TextEmpty`] or [`EngineError::TextTooLong`].
    pub fn update_group_task(
        &self,
        actor_id: &str,
        master_id: &TaskId,
        text: &str,
    ) -> Result<GroupTask, EngineError> {
        let actor = self.directory.user(actor_id)?;
        validate_text(text)?;
        self.with_entry(master_id, |entry| {
            self.require_manager(&entry.master.group_id, &actor)?;
            sync::update_text(entry, text, Utc::now());
            tracing::info!(task_id = %master_id, copies = entry.copies.len(), "group task updated");
            Ok(entry.master.clone())
        })
    }

    /// Deletes a master and every copy of it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TaskNotFound`] or [`EngineError::NotAuthorized`].
    pub fn delete_group_task(&self, actor_id: &str, master_id: &TaskId) -> Result<(), EngineError> {
        let actor = self.directory.user(actor_id)?;
        self.with_entry(master_id, |entry| {
            self.require_manager(&entry.master.group_id, &actor)?;
            let removed = sync::delete_all(entry);
            for copy in &removed {
                self.store.unindex_copy(copy);
            }
            entry.deleted = true;
            self.store.remove_master(&entry.master);
            tracing::info!(task_id = %master_id, copies = removed.len(), "group task deleted");
            Ok(())
        })
    }

    /// Looks up a master (visible to group members) or a copy (visible to
    /// its owner).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TaskNotFound`] when neither exists or the
    /// actor may not see it.
    pub fn get_task(&self, actor_id: &str, id: &TaskId) -> Result<TaskRecord, EngineError> {
        let actor = self.directory.user(actor_id)?;
        if self.store.entry(id).is_some() {
            return self.with_entry(id, |entry| {
                self.directory
                    .role_of(&entry.master.group_id, &actor.id)
                    .map_err(|_| EngineError::TaskNotFound(id.to_string()))?;
                Ok(TaskRecord::Master(entry.master.clone()))
            });
        }
        let master_id = self
            .store
            .master_of_copy(id)
            .ok_or_else(|| EngineError::TaskNotFound(id.to_string()))?;
        self.with_entry(&master_id, |entry| {
            entry
                .copies
                .get(&actor.id)
                .filter(|c| c.id == *id)
                .cloned()
                .map(TaskRecord::Copy)
                .ok_or_else(|| EngineError::TaskNotFound(id.to_string()))
        })
    }

    /// Every copy the user holds, oldest assignment first.
    ///
    /// # Errors
    ///
    /// Returns a directory error when the user is unknown.
    pub fn user_tasks(&self, actor_id: &str) -> Result<Vec<MemberTaskCopy>, EngineError> {
        let actor = self.directory.user(actor_id)?;
        let mut copies: Vec<MemberTaskCopy> = self
            .store
            .copies_of_user(&actor.id)
            .into_iter()
            .filter_map(|(copy_id, master_id)| {
                let handle = self.store.entry(&master_id)?;
                let entry = handle.lock();
                if entry.deleted {
                    return None;
                }
                entry
                    .copies
                    .get(&actor.id)
                    .filter(|c| c.id == copy_id)
                    .cloned()
            })
            .collect();
        copies.sort_by_key(|c| (c.created_at, c.id));
        Ok(copies)
    }

    /// Masters of a group passing `filter`, oldest first. Members only.
    ///
    /// # Errors
    ///
    /// Returns a directory error when the group is unknown or the actor is
    /// not a member.
    pub fn group_tasks(
        &self,
        actor_id: &str,
        group_id: &str,
        filter: Option<GroupTaskFilter>,
    ) -> Result<Vec<GroupTask>, EngineError> {
        let actor = self.directory.user(actor_id)?;
        self.directory.role_of(group_id, &actor.id)?;
        let mut masters: Vec<GroupTask> = self
            .store
            .masters_of_group(group_id)
            .into_iter()
            .filter_map(|master_id| {
                let handle = self.store.entry(&master_id)?;
                let entry = handle.lock();
                (!entry.deleted && GroupTaskFilter::matches(filter, &entry.master))
                    .then(|| entry.master.clone())
            })
            .collect();
        masters.sort_by_key(|t| (t.created_at, t.id));
        Ok(masters)
    }

    /// Copies out every master with its copies.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TaskEntrySnapshot> {
        self.store.snapshot()
    }

    /// Runs `f` on the locked entry of `master_id`.
    fn with_entry<T>(
        &self,
        master_id: &TaskId,
        f: impl FnOnce(&mut TaskEntry) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let handle = self
            .store
            .entry(master_id)
            .ok_or_else(|| EngineError::TaskNotFound(master_id.to_string()))?;
        let mut entry = handle.lock();
        if entry.deleted {
            return Err(EngineError::TaskNotFound(master_id.to_string()));
        }
        f(&mut *entry)
    }

    fn require_manager(&self, group_id: &str, actor: &UserProfile) -> Result<(), EngineError> {
        match self.directory.role_of(group_id, &actor.id) {
            Ok(role) if role.can_manage() => Ok(()),
            Ok(_) | Err(DirectoryError::NotMember { .. }) => {
                Err(self.not_authorized(MessageKey::OnlyGroupLeaderCanEditTasks, actor))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn not_authorized(&self, key: MessageKey, actor: &UserProfile) -> EngineError {
        EngineError::NotAuthorized {
            key,
            message: self.translator.translate(key, &[], &actor.locale),
        }
    }
}

fn validate_text(text: &str) -> Result<(), EngineError> {
    if text.trim().is_empty() {
        return Err(EngineError::TextEmpty);
    }
    if text.chars().count() > MAX_TASK_TEXT_LENGTH {
        return Err(EngineError::TextTooLong);
    }
    Ok(())
}
