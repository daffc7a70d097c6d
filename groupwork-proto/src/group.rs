//! Users, groups and the roles users hold within a group.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Default locale used when a user never picked one.
pub const DEFAULT_LOCALE: &str = "en";

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// User id.
    pub id: String,
    /// Login name, used in notification messages.
    pub username: String,
    /// Preferred language for rendered messages.
    pub locale: String,
}

/// Role a user holds within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    /// Group leader (owner).
    Leader,
    /// Member with manager privileges.
    Manager,
    /// Plain member.
    Member,
}

impl GroupRole {
    /// Whether the role may create, assign and approve group tasks.
    #[must_use]
    pub const fn can_manage(self) -> bool {
        matches!(self, Self::Leader | Self::Manager)
    }
}

/// A group that owns tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Group id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Owner of the group.
    pub leader_id: String,
    /// Users holding the manager role (never includes the leader).
    pub managers: BTreeSet<String>,
    /// All members, leader and managers included.
    pub members: BTreeSet<String>,
}

impl Group {
    /// Returns the role of `user_id`, or `None` if not a member.
    #[must_use]
    pub fn role_of(&self, user_id: &str) -> Option<GroupRole> {
        if self.leader_id == user_id {
            Some(GroupRole::Leader)
        } else if self.managers.contains(user_id) {
            Some(GroupRole::Manager)
        } else if self.members.contains(user_id) {
            Some(GroupRole::Member)
        } else {
            None
        }
    }

    /// Leader followed by every manager, in stable order.
    #[must_use]
    pub fn manager_ids(&self) -> Vec<String> {
        std::iter::once(self.leader_id.clone())
            .chain(self.managers.iter().cloned())
            .collect()
    }
}
