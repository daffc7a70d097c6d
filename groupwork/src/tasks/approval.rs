//! Manager approval gate in front of scoring.
//!
//! The first scoring attempt on an unapproved task moves the master to
//! `Requested` and notifies every manager; later attempts are refused
//! without further notifications until a manager approves.

use chrono::{DateTime, Utc};
use groupwork_proto::group::UserProfile;
use groupwork_proto::notification::{Notification, NotificationData, NotificationKind};
use groupwork_proto::task::{Direction, GroupTask, MemberTaskCopy};

use super::EngineError;
use super::store::TaskEntry;
use super::sync;
use crate::directory::Directory;
use crate::i18n::{MessageKey, Translator};
use crate::notify::{Delivery, NotificationCenter};

/// What the gate decides for a scoring attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// No approval needed, or already approved.
    Pass,
    /// First attempt: approval must be requested.
    RequestApproval,
    /// Approval was requested earlier and is still pending.
    AwaitingApproval,
}

/// Decides whether scoring `master` may proceed.
#[must_use]
pub const fn evaluate(master: &GroupTask) -> GateDecision {
    if !master.requires_approval || master.approval.is_approved() {
        GateDecision::Pass
    } else if master.approval.is_requested() {
        GateDecision::AwaitingApproval
    } else {
        GateDecision::RequestApproval
    }
}

/// Applies [`evaluate`] and its side effects.
pub struct ApprovalGate<'a> {
    directory: &'a Directory,
    notifications: &'a NotificationCenter,
    translator: &'a dyn Translator,
}

impl<'a> ApprovalGate<'a> {
    /// Creates a gate over the given collaborators.
    #[must_use]
    pub fn new(
        directory: &'a Directory,
        notifications: &'a NotificationCenter,
        translator: &'a dyn Translator,
    ) -> Self {
        Self {
            directory,
            notifications,
            translator,
        }
    }

    /// Lets a scoring attempt through, or rejects it.
    ///
    /// On the first rejected attempt the master's approval moves to
    /// `Requested`, every copy is re-synced and one notification is queued
    /// for each manager resolved at this moment. The notification points at
    /// the scorer's copy. The scorer's copy completion state is never
    /// touched.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotAuthorized`] with key
    /// `taskApprovalHasBeenRequested` on the first attempt and
    /// `taskRequiresApproval` on later ones, or a directory error if the
    /// owning group cannot be resolved. [`EngineError::TaskNotFound`] when
    /// the scorer holds no copy of the task.
    pub fn check(
        &self,
        entry: &mut TaskEntry,
        scorer: &UserProfile,
        direction: Direction,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        match evaluate(&entry.master) {
            GateDecision::Pass => Ok(()),
            GateDecision::AwaitingApproval => {
                tracing::debug!(
                    task_id = %entry.master.id,
                    user_id = %scorer.id,
                    "score refused, approval still pending"
                );
                Err(self.rejection(MessageKey::TaskRequiresApproval, scorer))
            }
            GateDecision::RequestApproval => {
                let scorer_copy = entry
                    .copies
                    .get(&scorer.id)
                    .cloned()
                    .ok_or_else(|| EngineError::TaskNotFound(entry.master.id.to_string()))?;
                let managers = self.directory.manager_ids(&entry.master.group_id)?;
                entry
                    .master
                    .approval
                    .request(now)
                    .map_err(|_| self.rejection(MessageKey::TaskRequiresApproval, scorer))?;
                entry.master.updated_at = now;
                sync::sync_approval(entry);

                let deliveries: Vec<Delivery> = managers
                    .into_iter()
                    .map(|manager_id| {
                        let notification =
                            self.approval_request(&scorer_copy, scorer, direction, &manager_id);
                        Delivery {
                            recipient: manager_id,
                            notification,
                        }
                    })
                    .collect();
                tracing::info!(
                    task_id = %entry.master.id,
                    user_id = %scorer.id,
                    managers = deliveries.len(),
                    "approval requested"
                );
                self.notifications.emit_all(deliveries);

                Err(self.rejection(MessageKey::TaskApprovalHasBeenRequested, scorer))
            }
        }
    }

    fn approval_request(
        &self,
        copy: &MemberTaskCopy,
        scorer: &UserProfile,
        direction: Direction,
        recipient_id: &str,
    ) -> Notification {
        let locale = self
            .directory
            .user(recipient_id)
            .map(|u| u.locale)
            .unwrap_or_default();
        let message = self.translator.translate(
            MessageKey::UserHasRequestedTaskApproval,
            &[
                ("user", scorer.username.clone()),
                ("taskName", copy.text.clone()),
                ("taskId", copy.id.to_string()),
                ("direction", direction.to_string()),
            ],
            &locale,
        );
        Notification::new(
            NotificationKind::GroupTaskApproval,
            NotificationData {
                message,
                group_id: copy.group.group_id.clone(),
                task_id: copy.id,
                group_task_id: copy.group.task_id,
                user_id: scorer.id.clone(),
                direction: Some(direction),
            },
        )
    }

    fn rejection(&self, key: MessageKey, scorer: &UserProfile) -> EngineError {
        EngineError::NotAuthorized {
            key,
            message: self.translator.translate(key, &[], &scorer.locale),
        }
    }
}
