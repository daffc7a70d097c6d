//! Master-to-copy synchronization.
//!
//! Every function here works on a [`TaskEntry`] the caller has already
//! locked, so each call is all-or-nothing with respect to the master's
//! copy set. Functions that create or remove copies return them so the
//! caller can update the store indices before releasing the lock.

use chrono::{DateTime, Utc};
use groupwork_proto::approval::ApprovalError;
use groupwork_proto::task::MemberTaskCopy;

use super::store::TaskEntry;

/// Result of an assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// The assignee's copy.
    pub copy: MemberTaskCopy,
    /// `false` when the user was already assigned and the existing copy
    /// was returned unchanged.
    pub created: bool,
}

/// Creates a copy of the master for `user_id`.
///
/// Re-assigning an assigned user is a no-op that returns the existing copy.
pub fn assign(entry: &mut TaskEntry, user_id: &str, now: DateTime<Utc>) -> Assignment {
    if let Some(existing) = entry.copies.get(user_id) {
        return Assignment {
            copy: existing.clone(),
            created: false,
        };
    }
    let copy = MemberTaskCopy::snapshot_of(&entry.master, user_id, now);
    entry.copies.insert(user_id.to_string(), copy.clone());
    entry.master.assigned_user_ids.insert(user_id.to_string());
    entry.master.updated_at = now;
    Assignment {
        copy,
        created: true,
    }
}

/// Removes the copy of `user_id`, returning it if it existed.
pub fn unassign(
    entry: &mut TaskEntry,
    user_id: &str,
    now: DateTime<Utc>,
) -> Option<MemberTaskCopy> {
    let removed = entry.copies.remove(user_id)?;
    entry.master.assigned_user_ids.remove(user_id);
    entry.master.updated_at = now;
    Some(removed)
}

/// Removes every copy whose owner is not `keep_user_id` and returns them.
pub fn delete_copies_except(entry: &mut TaskEntry, keep_user_id: &str) -> Vec<MemberTaskCopy> {
    let doomed: Vec<String> = entry
        .copies
        .keys()
        .filter(|owner| owner.as_str() != keep_user_id)
        .cloned()
        .collect();
    let mut removed = Vec::with_capacity(doomed.len());
    for owner in doomed {
        if let Some(copy) = entry.copies.remove(&owner) {
            entry.master.assigned_user_ids.remove(&owner);
            removed.push(copy);
        }
    }
    removed
}

/// Removes every copy, for master deletion.
pub fn delete_all(entry: &mut TaskEntry) -> Vec<MemberTaskCopy> {
    entry.master.assigned_user_ids.clear();
    std::mem::take(&mut entry.copies).into_values().collect()
}

/// Pushes the master's approval state onto every copy.
pub fn sync_approval(entry: &mut TaskEntry) {
    let approval = entry.master.approval.clone();
    for copy in entry.copies.values_mut() {
        copy.group.approval = approval.clone();
    }
}

/// Grants approval on the master and propagates it to the copies.
///
/// Returns the target user's refreshed copy, or `None` if `user_id` holds
/// no copy (in which case nothing is changed).
///
/// # Errors
///
/// Returns [`ApprovalError::AlreadyApproved`] if the master was already
/// approved.
pub fn approve(
    entry: &mut TaskEntry,
    user_id: &str,
    approver_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<MemberTaskCopy>, ApprovalError> {
    if !entry.copies.contains_key(user_id) {
        return Ok(None);
    }
    entry.master.approval.approve(approver_id, now)?;
    entry.master.updated_at = now;
    sync_approval(entry);
    Ok(entry.copies.get(user_id).cloned())
}

/// Changes the master text and re-syncs it onto every copy.
pub fn update_text(entry: &mut TaskEntry, text: &str, now: DateTime<Utc>) {
    entry.master.text = text.to_string();
    entry.master.updated_at = now;
    for copy in entry.copies.values_mut() {
        copy.text = text.to_string();
    }
}
