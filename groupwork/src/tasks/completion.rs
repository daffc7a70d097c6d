//! Shared completion policy.
//!
//! Runs after the approval gate passed, on an entry the caller holds
//! locked. Completion only moves forward: neither copies nor the master
//! are ever reverted to incomplete here.

use chrono::{DateTime, Utc};
use groupwork_proto::task::{Direction, MemberTaskCopy, SharedCompletion};

use super::store::TaskEntry;
use super::sync;

/// Effect of one scoring action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreOutcome {
    /// The scorer's copy after scoring.
    pub copy: MemberTaskCopy,
    /// Whether this action completed the master.
    pub master_completed: bool,
    /// Sibling copies removed by single-completion cleanup.
    pub removed: Vec<MemberTaskCopy>,
}

/// Scores the copy of `user_id` in `direction`.
///
/// Returns `None` when the user holds no copy. Scoring down, or scoring up
/// an already completed copy, leaves everything unchanged.
pub fn score(
    entry: &mut TaskEntry,
    user_id: &str,
    direction: Direction,
    now: DateTime<Utc>,
) -> Option<ScoreOutcome> {
    let copy = entry.copies.get_mut(user_id)?;
    if direction == Direction::Down || copy.completed {
        return Some(ScoreOutcome {
            copy: copy.clone(),
            master_completed: false,
            removed: Vec::new(),
        });
    }

    copy.completed = true;
    copy.date_completed = Some(now);
    let copy = copy.clone();

    let (master_completed, removed) = match entry.master.shared_completion {
        SharedCompletion::None => (false, Vec::new()),
        SharedCompletion::SingleCompletion => {
            let removed = sync::delete_copies_except(entry, user_id);
            (complete_master(entry, now), removed)
        }
        SharedCompletion::AllAssignedCompletion => (reevaluate(entry, now), Vec::new()),
    };

    Some(ScoreOutcome {
        copy,
        master_completed,
        removed,
    })
}

/// Whether every live copy is completed. `false` when there are none.
#[must_use]
pub fn all_assigned_complete(entry: &TaskEntry) -> bool {
    !entry.copies.is_empty() && entry.copies.values().all(|c| c.completed)
}

/// Completes the master of an all-assigned task once every live copy is
/// completed. Returns whether the master was completed by this call.
pub fn reevaluate(entry: &mut TaskEntry, now: DateTime<Utc>) -> bool {
    entry.master.shared_completion == SharedCompletion::AllAssignedCompletion
        && all_assigned_complete(entry)
        && complete_master(entry, now)
}

fn complete_master(entry: &mut TaskEntry, now: DateTime<Utc>) -> bool {
    if entry.master.completed {
        return false;
    }
    entry.master.completed = true;
    entry.master.date_completed = Some(now);
    entry.master.updated_at = now;
    true
}
