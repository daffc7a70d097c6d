//! Engine facade wiring the directory, notification center and task
//! service together.

use std::sync::Arc;

use groupwork_proto::group::{DEFAULT_LOCALE, UserProfile};
use groupwork_proto::snapshot::{SNAPSHOT_VERSION, StoreSnapshot};

use crate::directory::{Directory, DirectoryError};
use crate::i18n::{Catalog, Translator};
use crate::notify::{DEFAULT_MAX_PENDING, NotificationCenter};
use crate::tasks::{TaskService, TaskStore};

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Inbox size limit per user.
    pub max_pending_notifications: usize,
    /// Locale for users registered without one, and the catalog fallback.
    pub default_locale: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_pending_notifications: DEFAULT_MAX_PENDING,
            default_locale: DEFAULT_LOCALE.to_string(),
        }
    }
}

/// The group task engine.
pub struct Engine {
    directory: Arc<Directory>,
    notifications: Arc<NotificationCenter>,
    tasks: TaskService,
    translator: Arc<dyn Translator>,
    default_locale: String,
}

impl Engine {
    /// Creates an empty engine with the built-in message catalog.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self::restore(StoreSnapshot::default(), config)
    }

    /// Rebuilds an engine from a snapshot.
    #[must_use]
    pub fn restore(snapshot: StoreSnapshot, config: &EngineConfig) -> Self {
        let translator: Arc<dyn Translator> = Arc::new(Catalog::new(&config.default_locale));
        Self::with_translator(snapshot, config, translator)
    }

    /// Rebuilds an engine from a snapshot with a custom translator.
    #[must_use]
    pub fn with_translator(
        snapshot: StoreSnapshot,
        config: &EngineConfig,
        translator: Arc<dyn Translator>,
    ) -> Self {
        let directory = Arc::new(Directory::from_parts(snapshot.users, snapshot.groups));
        let notifications = Arc::new(NotificationCenter::restore(
            snapshot.inboxes,
            config.max_pending_notifications,
        ));
        let tasks = TaskService::new(
            TaskStore::restore(snapshot.tasks),
            Arc::clone(&directory),
            Arc::clone(&notifications),
            Arc::clone(&translator),
        );
        Self {
            directory,
            notifications,
            tasks,
            translator,
            default_locale: config.default_locale.clone(),
        }
    }

    /// Registers a user, using the configured default locale when none is
    /// given.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::InvalidUsername`],
    /// [`DirectoryError::UsernameTaken`] or
    /// [`DirectoryError::UnsupportedLocale`].
    pub fn register_user(
        &self,
        username: &str,
        locale: Option<&str>,
    ) -> Result<UserProfile, DirectoryError> {
        let locale = locale.unwrap_or(&self.default_locale);
        self.check_locale(locale)?;
        self.directory.register_user(username, locale)
    }

    /// Changes a user's preferred locale.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::UnsupportedLocale`] or
    /// [`DirectoryError::UserNotFound`].
    pub fn set_locale(&self, user_id: &str, locale: &str) -> Result<UserProfile, DirectoryError> {
        self.check_locale(locale)?;
        self.directory.set_locale(user_id, locale)
    }

    fn check_locale(&self, locale: &str) -> Result<(), DirectoryError> {
        if self.translator.supports(locale) {
            Ok(())
        } else {
            Err(DirectoryError::UnsupportedLocale(locale.to_string()))
        }
    }

    /// User and group directory.
    #[must_use]
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Pending notification inboxes.
    #[must_use]
    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    /// Message translator shared with the task service.
    #[must_use]
    pub fn translator(&self) -> &dyn Translator {
        self.translator.as_ref()
    }

    /// Locale used when nothing better is known.
    #[must_use]
    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// Group task operations.
    #[must_use]
    pub const fn tasks(&self) -> &TaskService {
        &self.tasks
    }

    /// Copies the whole engine state out for persistence.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            version: SNAPSHOT_VERSION,
            users: self.directory.users(),
            groups: self.directory.groups(),
            tasks: self.tasks.snapshot(),
            inboxes: self.notifications.snapshot(),
        }
    }
}
