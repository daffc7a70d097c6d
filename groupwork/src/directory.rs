//! In-memory user and group directory.
//!
//! Stands in for the identity and membership services: resolves user
//! profiles (username, locale) and the role each user holds in a group.
//! The engine reads the manager set from here at the moment it fans out
//! approval notifications.

use std::collections::{BTreeSet, HashMap};

use groupwork_proto::group::{Group, GroupRole, UserProfile};
use parking_lot::RwLock;
use uuid::Uuid;

/// Maximum username length in characters.
pub const MAX_USERNAME_LENGTH: usize = 64;

/// Errors that can occur during directory operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// Username is empty or too long.
    #[error("invalid username")]
    InvalidUsername,
    /// Username already registered (case-insensitive).
    #[error("username already taken: {0}")]
    UsernameTaken(String),
    /// Group name cannot be empty.
    #[error("group name cannot be empty")]
    GroupNameEmpty,
    /// No message catalog for the requested locale.
    #[error("unsupported locale: {0}")]
    UnsupportedLocale(String),
    /// No such user.
    #[error("user not found: {0}")]
    UserNotFound(String),
    /// No such group.
    #[error("group not found: {0}")]
    GroupNotFound(String),
    /// Acting user lacks the role the operation needs.
    #[error("user {user_id} is not allowed to manage group {group_id}")]
    NotPermitted {
        /// Acting user.
        user_id: String,
        /// Target group.
        group_id: String,
    },
    /// User is not a member of the group.
    #[error("user {user_id} is not a member of group {group_id}")]
    NotMember {
        /// User that was looked up.
        user_id: String,
        /// Target group.
        group_id: String,
    },
}

/// Users and groups, each behind its own lock.
#[derive(Default)]
pub struct Directory {
    users: RwLock<HashMap<String, UserProfile>>,
    groups: RwLock<HashMap<String, Group>>,
}

impl Directory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new user.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::InvalidUsername`] or
    /// [`DirectoryError::UsernameTaken`].
    pub fn register_user(
        &self,
        username: &str,
        locale: &str,
    ) -> Result<UserProfile, DirectoryError> {
        let username = username.trim();
        if username.is_empty() || username.chars().count() > MAX_USERNAME_LENGTH {
            return Err(DirectoryError::InvalidUsername);
        }
        let mut users = self.users.write();
        let lower = username.to_lowercase();
        if users.values().any(|u| u.username.to_lowercase() == lower) {
            return Err(DirectoryError::UsernameTaken(username.to_string()));
        }
        let profile = UserProfile {
            id: Uuid::now_v7().to_string(),
            username: username.to_string(),
            locale: locale.to_string(),
        };
        users.insert(profile.id.clone(), profile.clone());
        drop(users);
        tracing::info!(user_id = %profile.id, username = %profile.username, "user registered");
        Ok(profile)
    }

    /// Changes a user's preferred locale.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::UserNotFound`].
    pub fn set_locale(&self, user_id: &str, locale: &str) -> Result<UserProfile, DirectoryError> {
        let mut users = self.users.write();
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| DirectoryError::UserNotFound(user_id.to_string()))?;
        user.locale = locale.to_string();
        tracing::info!(user_id = %user_id, locale = %locale, "user locale changed");
        Ok(user.clone())
    }

    /// Looks up a user.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::UserNotFound`].
    pub fn user(&self, user_id: &str) -> Result<UserProfile, DirectoryError> {
        self.users
            .read()
            .get(user_id)
            .cloned()
            .ok_or_else(|| DirectoryError::UserNotFound(user_id.to_string()))
    }

    /// Creates a group led by `leader_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::GroupNameEmpty`] or
    /// [`DirectoryError::UserNotFound`].
    pub fn create_group(&self, leader_id: &str, name: &str) -> Result<Group, DirectoryError> {
        if name.trim().is_empty() {
            return Err(DirectoryError::GroupNameEmpty);
        }
        self.user(leader_id)?;
        let group = Group {
            id: Uuid::now_v7().to_string(),
            name: name.trim().to_string(),
            leader_id: leader_id.to_string(),
            managers: BTreeSet::new(),
            members: BTreeSet::from([leader_id.to_string()]),
        };
        self.groups.write().insert(group.id.clone(), group.clone());
        tracing::info!(group_id = %group.id, leader = %leader_id, "group created");
        Ok(group)
    }

    /// Looks up a group.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::GroupNotFound`].
    pub fn group(&self, group_id: &str) -> Result<Group, DirectoryError> {
        self.groups
            .read()
            .get(group_id)
            .cloned()
            .ok_or_else(|| DirectoryError::GroupNotFound(group_id.to_string()))
    }

    /// Role of `user_id` in `group_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::GroupNotFound`] or
    /// [`DirectoryError::NotMember`].
    pub fn role_of(&self, group_id: &str, user_id: &str) -> Result<GroupRole, DirectoryError> {
        self.group(group_id)?
            .role_of(user_id)
            .ok_or_else(|| DirectoryError::NotMember {
                user_id: user_id.to_string(),
                group_id: group_id.to_string(),
            })
    }

    /// Current leader and managers of a group.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::GroupNotFound`].
    pub fn manager_ids(&self, group_id: &str) -> Result<Vec<String>, DirectoryError> {
        Ok(self.group(group_id)?.manager_ids())
    }

    /// Adds `user_id` as a member. Only the leader or a manager may do this.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::GroupNotFound`],
    /// [`DirectoryError::UserNotFound`] or [`DirectoryError::NotPermitted`].
    pub fn add_member(
        &self,
        group_id: &str,
        actor_id: &str,
        user_id: &str,
    ) -> Result<(), DirectoryError> {
        self.user(user_id)?;
        let mut groups = self.groups.write();
        let group = groups
            .get_mut(group_id)
            .ok_or_else(|| DirectoryError::GroupNotFound(group_id.to_string()))?;
        if !group.role_of(actor_id).is_some_and(GroupRole::can_manage) {
            return Err(DirectoryError::NotPermitted {
                user_id: actor_id.to_string(),
                group_id: group_id.to_string(),
            });
        }
        group.members.insert(user_id.to_string());
        drop(groups);
        tracing::info!(group_id = %group_id, user_id = %user_id, "member added");
        Ok(())
    }

    /// Grants the manager role to an existing member. Leader only.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::GroupNotFound`],
    /// [`DirectoryError::NotPermitted`] or [`DirectoryError::NotMember`].
    pub fn add_manager(
        &self,
        group_id: &str,
        actor_id: &str,
        manager_id: &str,
    ) -> Result<(), DirectoryError> {
        self.update_manager(group_id, actor_id, manager_id, true)
    }

    /// Revokes the manager role. Leader only.
    ///
    /// # Errors
    ///
    /// Same as [`Directory::add_manager`].
    pub fn remove_manager(
        &self,
        group_id: &str,
        actor_id: &str,
        manager_id: &str,
    ) -> Result<(), DirectoryError> {
        self.update_manager(group_id, actor_id, manager_id, false)
    }

    fn update_manager(
        &self,
        group_id: &str,
        actor_id: &str,
        manager_id: &str,
        grant: bool,
    ) -> Result<(), DirectoryError> {
        let mut groups = self.groups.write();
        let group = groups
            .get_mut(group_id)
            .ok_or_else(|| DirectoryError::GroupNotFound(group_id.to_string()))?;
        if group.leader_id != actor_id {
            return Err(DirectoryError::NotPermitted {
                user_id: actor_id.to_string(),
                group_id: group_id.to_string(),
            });
        }
        if !group.members.contains(manager_id) {
            return Err(DirectoryError::NotMember {
                user_id: manager_id.to_string(),
                group_id: group_id.to_string(),
            });
        }
        if manager_id == group.leader_id {
            return Ok(());
        }
        if grant {
            group.managers.insert(manager_id.to_string());
        } else {
            group.managers.remove(manager_id);
        }
        drop(groups);
        tracing::info!(
            group_id = %group_id,
            manager_id = %manager_id,
            grant,
            "manager role updated"
        );
        Ok(())
    }

    /// All users, for snapshots.
    #[must_use]
    pub fn users(&self) -> Vec<UserProfile> {
        self.users.read().values().cloned().collect()
    }

    /// All groups, for snapshots.
    #[must_use]
    pub fn groups(&self) -> Vec<Group> {
        self.groups.read().values().cloned().collect()
    }

    /// Rebuilds a directory from snapshot contents.
    #[must_use]
    pub fn from_parts(users: Vec<UserProfile>, groups: Vec<Group>) -> Self {
        Self {
            users: RwLock::new(users.into_iter().map(|u| (u.id.clone(), u)).collect()),
            groups: RwLock::new(groups.into_iter().map(|g| (g.id.clone(), g)).collect()),
        }
    }
}
