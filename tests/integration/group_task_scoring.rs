//! Integration tests for scoring group tasks.
//!
//! Covers the approval gate (request, repeated attempts, approval), the
//! shared completion policies and the notifications each step produces,
//! driven through the public `Engine` API.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::similar_names)]

use groupwork::i18n::MessageKey;
use groupwork::tasks::{EngineError, NewGroupTask};
use groupwork::{Engine, EngineConfig};
use groupwork_proto::group::{Group, UserProfile};
use groupwork_proto::notification::NotificationKind;
use groupwork_proto::task::{Direction, GroupTask, SharedCompletion};

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// A group with leader `leader`, manager `manager`, members `alice` and `bob`.
struct Guild {
    engine: Engine,
    leader: UserProfile,
    manager: UserProfile,
    alice: UserProfile,
    bob: UserProfile,
    group: Group,
}

fn make_guild() -> Guild {
    let engine = Engine::new(&EngineConfig::default());
    let leader = engine.register_user("leader", None).unwrap();
    let manager = engine.register_user("manager", None).unwrap();
    let alice = engine.register_user("alice", None).unwrap();
    let bob = engine.register_user("bob", None).unwrap();
    let group = engine.directory().create_group(&leader.id, "Test Guild").unwrap();
    for user in [&manager, &alice, &bob] {
        engine
            .directory()
            .add_member(&group.id, &leader.id, &user.id)
            .unwrap();
    }
    engine
        .directory()
        .add_manager(&group.id, &leader.id, &manager.id)
        .unwrap();
    Guild {
        engine,
        leader,
        manager,
        alice,
        bob,
        group,
    }
}

impl Guild {
    fn create(&self, new: NewGroupTask) -> GroupTask {
        self.engine
            .tasks()
            .create_group_task(&self.leader.id, &self.group.id, new)
            .unwrap()
    }

    fn master(&self, task: &GroupTask) -> GroupTask {
        self.engine
            .tasks()
            .group_tasks(&self.leader.id, &self.group.id, None)
            .unwrap()
            .into_iter()
            .chain(
                self.engine
                    .tasks()
                    .group_tasks(
                        &self.leader.id,
                        &self.group.id,
                        Some(groupwork_proto::api::GroupTaskFilter::CompletedTodos),
                    )
                    .unwrap(),
            )
            .find(|t| t.id == task.id)
            .unwrap()
    }
}

// ===========================================================================
// Approval gate
// ===========================================================================

#[test]
fn approval_flow_end_to_end() {
    let g = make_guild();
    let task = g.create(NewGroupTask::todo("approve me").requires_approval(true));
    let copy = g
        .engine
        .tasks()
        .assign_task(&g.leader.id, &task.id, &g.alice.id)
        .unwrap();

    let err = g
        .engine
        .tasks()
        .score_task(&g.alice.id, &copy.id, Direction::Up)
        .unwrap_err();
    assert_eq!(err.message_key(), Some(MessageKey::TaskApprovalHasBeenRequested));
    assert_eq!(err.code(), 401);
    assert!(g.master(&task).approval.is_requested());

    let manager_inbox = g.engine.notifications().pending(&g.manager.id);
    assert_eq!(manager_inbox.len(), 1);
    assert_eq!(manager_inbox[0].kind, NotificationKind::GroupTaskApproval);
    assert_eq!(manager_inbox[0].data.task_id, copy.id);
    assert_eq!(manager_inbox[0].data.group_task_id, task.id);
    assert!(manager_inbox[0].data.message.contains(&copy.id.to_string()));
    assert_eq!(manager_inbox[0].data.user_id, g.alice.id);
    assert_eq!(manager_inbox[0].data.direction, Some(Direction::Up));
    assert_eq!(g.engine.notifications().pending_len(&g.leader.id), 1);

    g.engine
        .tasks()
        .approve_task(&g.manager.id, &task.id, &g.alice.id)
        .unwrap();

    let scored = g
        .engine
        .tasks()
        .score_task(&g.alice.id, &copy.id, Direction::Up)
        .unwrap();
    assert!(scored.completed);
    assert!(scored.date_completed.is_some());
}

#[test]
fn repeated_attempt_is_refused_without_notification() {
    let g = make_guild();
    let task = g.create(NewGroupTask::todo("approve me").requires_approval(true));
    let copy = g
        .engine
        .tasks()
        .assign_task(&g.leader.id, &task.id, &g.alice.id)
        .unwrap();

    g.engine
        .tasks()
        .score_task(&g.alice.id, &copy.id, Direction::Up)
        .unwrap_err();
    let err = g
        .engine
        .tasks()
        .score_task(&g.alice.id, &copy.id, Direction::Up)
        .unwrap_err();
    assert_eq!(err.message_key(), Some(MessageKey::TaskRequiresApproval));
    assert_eq!(g.engine.notifications().pending_len(&g.manager.id), 1);
    assert_eq!(g.engine.notifications().pending_len(&g.leader.id), 1);

    let copies = g.engine.tasks().user_tasks(&g.alice.id).unwrap();
    assert!(!copies[0].completed);
}

#[test]
fn request_is_shared_by_all_assignees() {
    let g = make_guild();
    let task = g.create(NewGroupTask::todo("shared gate").requires_approval(true));
    let alice_copy = g
        .engine
        .tasks()
        .assign_task(&g.leader.id, &task.id, &g.alice.id)
        .unwrap();
    let bob_copy = g
        .engine
        .tasks()
        .assign_task(&g.leader.id, &task.id, &g.bob.id)
        .unwrap();

    g.engine
        .tasks()
        .score_task(&g.alice.id, &alice_copy.id, Direction::Up)
        .unwrap_err();
    let err = g
        .engine
        .tasks()
        .score_task(&g.bob.id, &bob_copy.id, Direction::Up)
        .unwrap_err();
    assert_eq!(err.message_key(), Some(MessageKey::TaskRequiresApproval));
    assert_eq!(g.engine.notifications().pending_len(&g.manager.id), 1);

    let bob_view = g.engine.tasks().user_tasks(&g.bob.id).unwrap();
    assert!(bob_view[0].group.approval.is_requested());
}

#[test]
fn late_manager_gets_no_earlier_notification() {
    let g = make_guild();
    let carol = g.engine.register_user("carol", None).unwrap();
    g.engine
        .directory()
        .add_member(&g.group.id, &g.leader.id, &carol.id)
        .unwrap();

    let task = g.create(NewGroupTask::todo("approve me").requires_approval(true));
    let copy = g
        .engine
        .tasks()
        .assign_task(&g.leader.id, &task.id, &g.alice.id)
        .unwrap();
    g.engine
        .tasks()
        .score_task(&g.alice.id, &copy.id, Direction::Up)
        .unwrap_err();

    g.engine
        .directory()
        .add_manager(&g.group.id, &g.leader.id, &carol.id)
        .unwrap();
    assert_eq!(g.engine.notifications().pending_len(&carol.id), 0);

    // Carol may still approve.
    g.engine
        .tasks()
        .approve_task(&carol.id, &task.id, &g.alice.id)
        .unwrap();
    assert!(g.master(&task).approval.is_approved());
}

#[test]
fn notifications_render_in_recipient_locale() {
    let g = make_guild();
    g.engine.set_locale(&g.manager.id, "cs").unwrap();
    let task = g.create(NewGroupTask::todo("uklid").requires_approval(true));
    let copy = g
        .engine
        .tasks()
        .assign_task(&g.leader.id, &task.id, &g.alice.id)
        .unwrap();
    g.engine
        .tasks()
        .score_task(&g.alice.id, &copy.id, Direction::Up)
        .unwrap_err();

    let cs = g.engine.notifications().pending(&g.manager.id);
    let en = g.engine.notifications().pending(&g.leader.id);
    assert_ne!(cs[0].data.message, en[0].data.message);
    assert!(cs[0].data.message.contains("uklid"));
    assert!(en[0].data.message.contains("uklid"));
    assert!(en[0].data.message.contains(&copy.id.to_string()));
    assert!(cs[0].data.message.contains(&copy.id.to_string()));
}

#[test]
fn approval_notifies_assignee() {
    let g = make_guild();
    let task = g.create(NewGroupTask::todo("approve me").requires_approval(true));
    let copy = g
        .engine
        .tasks()
        .assign_task(&g.leader.id, &task.id, &g.alice.id)
        .unwrap();
    g.engine
        .tasks()
        .approve_task(&g.leader.id, &task.id, &g.alice.id)
        .unwrap();

    let inbox = g.engine.notifications().drain(&g.alice.id);
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::GroupTaskApproved);
    assert_eq!(inbox[0].data.task_id, copy.id);
    assert_eq!(inbox[0].data.group_task_id, task.id);
    assert_eq!(inbox[0].data.user_id, g.leader.id);
    assert!(g.engine.notifications().pending(&g.alice.id).is_empty());
}

#[test]
fn approving_twice_is_refused() {
    let g = make_guild();
    let task = g.create(NewGroupTask::todo("approve me").requires_approval(true));
    g.engine
        .tasks()
        .assign_task(&g.leader.id, &task.id, &g.alice.id)
        .unwrap();
    g.engine
        .tasks()
        .approve_task(&g.leader.id, &task.id, &g.alice.id)
        .unwrap();
    let err = g
        .engine
        .tasks()
        .approve_task(&g.manager.id, &task.id, &g.alice.id)
        .unwrap_err();
    assert_eq!(err.message_key(), Some(MessageKey::CanOnlyApproveTaskOnce));
}

#[test]
fn members_cannot_approve() {
    let g = make_guild();
    let task = g.create(NewGroupTask::todo("approve me").requires_approval(true));
    g.engine
        .tasks()
        .assign_task(&g.leader.id, &task.id, &g.alice.id)
        .unwrap();
    let err = g
        .engine
        .tasks()
        .approve_task(&g.bob.id, &task.id, &g.alice.id)
        .unwrap_err();
    assert_eq!(err.message_key(), Some(MessageKey::OnlyGroupLeaderCanEditTasks));
    assert!(!g.master(&task).approval.is_approved());
}

#[test]
fn concurrent_first_attempts_fan_out_once() {
    let g = make_guild();
    let task = g.create(NewGroupTask::todo("race").requires_approval(true));
    let alice_copy = g
        .engine
        .tasks()
        .assign_task(&g.leader.id, &task.id, &g.alice.id)
        .unwrap();
    let bob_copy = g
        .engine
        .tasks()
        .assign_task(&g.leader.id, &task.id, &g.bob.id)
        .unwrap();

    let keys: Vec<Option<MessageKey>> = std::thread::scope(|s| {
        let a = s.spawn(|| {
            g.engine
                .tasks()
                .score_task(&g.alice.id, &alice_copy.id, Direction::Up)
                .unwrap_err()
                .message_key()
        });
        let b = s.spawn(|| {
            g.engine
                .tasks()
                .score_task(&g.bob.id, &bob_copy.id, Direction::Up)
                .unwrap_err()
                .message_key()
        });
        vec![a.join().unwrap(), b.join().unwrap()]
    });

    let requested = keys
        .iter()
        .filter(|k| **k == Some(MessageKey::TaskApprovalHasBeenRequested))
        .count();
    assert_eq!(requested, 1);
    assert_eq!(g.engine.notifications().pending_len(&g.manager.id), 1);
    assert_eq!(g.engine.notifications().pending_len(&g.leader.id), 1);
}

// ===========================================================================
// Shared completion
// ===========================================================================

#[test]
fn single_completion_removes_sibling_copies() {
    let g = make_guild();
    let task = g.create(
        NewGroupTask::todo("first wins").shared_completion(SharedCompletion::SingleCompletion),
    );
    let alice_copy = g
        .engine
        .tasks()
        .assign_task(&g.leader.id, &task.id, &g.alice.id)
        .unwrap();
    let bob_copy = g
        .engine
        .tasks()
        .assign_task(&g.leader.id, &task.id, &g.bob.id)
        .unwrap();

    g.engine
        .tasks()
        .score_task(&g.alice.id, &alice_copy.id, Direction::Up)
        .unwrap();

    let master = g.master(&task);
    assert!(master.completed);
    assert!(master.date_completed.is_some());
    assert!(g.engine.tasks().user_tasks(&g.bob.id).unwrap().is_empty());

    let err = g
        .engine
        .tasks()
        .score_task(&g.bob.id, &bob_copy.id, Direction::Up)
        .unwrap_err();
    assert!(matches!(err, EngineError::TaskNotFound(_)));
}

#[test]
fn all_assigned_completion_in_either_order() {
    for alice_first in [true, false] {
        let g = make_guild();
        let task = g.create(
            NewGroupTask::todo("everyone")
                .shared_completion(SharedCompletion::AllAssignedCompletion),
        );
        let alice_copy = g
            .engine
            .tasks()
            .assign_task(&g.leader.id, &task.id, &g.alice.id)
            .unwrap();
        let bob_copy = g
            .engine
            .tasks()
            .assign_task(&g.leader.id, &task.id, &g.bob.id)
            .unwrap();

        let mut order = vec![(&g.alice, &alice_copy), (&g.bob, &bob_copy)];
        if !alice_first {
            order.reverse();
        }

        g.engine
            .tasks()
            .score_task(&order[0].0.id, &order[0].1.id, Direction::Up)
            .unwrap();
        assert!(!g.master(&task).completed);

        g.engine
            .tasks()
            .score_task(&order[1].0.id, &order[1].1.id, Direction::Up)
            .unwrap();
        assert!(g.master(&task).completed);
        assert_eq!(g.engine.tasks().user_tasks(&g.alice.id).unwrap().len(), 1);
        assert_eq!(g.engine.tasks().user_tasks(&g.bob.id).unwrap().len(), 1);
    }
}

#[test]
fn none_policy_never_completes_master() {
    let g = make_guild();
    let task = g.create(NewGroupTask::todo("independent"));
    for user in [&g.alice, &g.bob] {
        let copy = g
            .engine
            .tasks()
            .assign_task(&g.leader.id, &task.id, &user.id)
            .unwrap();
        g.engine
            .tasks()
            .score_task(&user.id, &copy.id, Direction::Up)
            .unwrap();
    }
    assert!(!g.master(&task).completed);
}

#[test]
fn unassigning_last_incomplete_assignee_completes_master() {
    let g = make_guild();
    let task = g.create(
        NewGroupTask::todo("everyone").shared_completion(SharedCompletion::AllAssignedCompletion),
    );
    let alice_copy = g
        .engine
        .tasks()
        .assign_task(&g.leader.id, &task.id, &g.alice.id)
        .unwrap();
    g.engine
        .tasks()
        .assign_task(&g.leader.id, &task.id, &g.bob.id)
        .unwrap();
    g.engine
        .tasks()
        .score_task(&g.alice.id, &alice_copy.id, Direction::Up)
        .unwrap();

    let master = g
        .engine
        .tasks()
        .unassign_task(&g.leader.id, &task.id, &g.bob.id)
        .unwrap();
    assert!(master.completed);
}

#[test]
fn scoring_down_does_not_complete() {
    let g = make_guild();
    let task = g.create(
        NewGroupTask::todo("down").shared_completion(SharedCompletion::SingleCompletion),
    );
    let copy = g
        .engine
        .tasks()
        .assign_task(&g.leader.id, &task.id, &g.alice.id)
        .unwrap();
    let scored = g
        .engine
        .tasks()
        .score_task(&g.alice.id, &copy.id, Direction::Down)
        .unwrap();
    assert!(!scored.completed);
    assert!(!g.master(&task).completed);
}

#[test]
fn completed_master_rejects_new_assignees() {
    let g = make_guild();
    let task = g.create(
        NewGroupTask::todo("done").shared_completion(SharedCompletion::SingleCompletion),
    );
    let copy = g
        .engine
        .tasks()
        .assign_task(&g.leader.id, &task.id, &g.alice.id)
        .unwrap();
    g.engine
        .tasks()
        .score_task(&g.alice.id, &copy.id, Direction::Up)
        .unwrap();

    let err = g
        .engine
        .tasks()
        .assign_task(&g.leader.id, &task.id, &g.bob.id)
        .unwrap_err();
    assert!(matches!(err, EngineError::TaskCompleted(_)));
}

#[test]
fn placeholder_like_task_text_is_rendered_verbatim() {
    let g = make_guild();
    let task =
        g.create(NewGroupTask::todo("Fix {direction} and {user}").requires_approval(true));
    let copy = g
        .engine
        .tasks()
        .assign_task(&g.leader.id, &task.id, &g.alice.id)
        .unwrap();
    g.engine
        .tasks()
        .score_task(&g.alice.id, &copy.id, Direction::Up)
        .unwrap_err();

    let inbox = g.engine.notifications().pending(&g.leader.id);
    let expected = format!(
        "alice requests approval for Fix {{direction}} and {{user}} (task {}, direction up)",
        copy.id
    );
    assert_eq!(inbox[0].data.message, expected);
}
