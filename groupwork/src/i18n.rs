//! Message catalog for user-facing strings.
//!
//! The engine only knows message keys and substitution values; turning
//! them into text is delegated to a [`Translator`]. [`Catalog`] is the
//! built-in implementation with English and Czech tables.

/// Keys of every message the engine can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    /// First scoring attempt on an unapproved task.
    TaskApprovalHasBeenRequested,
    /// Repeated scoring attempt while approval is pending.
    TaskRequiresApproval,
    /// Notification body sent to managers.
    UserHasRequestedTaskApproval,
    /// Notification body sent to an assignee once approved.
    YourTaskHasBeenApproved,
    /// Approving a task that is already approved.
    CanOnlyApproveTaskOnce,
    /// Non-manager tried to manage group tasks.
    OnlyGroupLeaderCanEditTasks,
    /// Request without an acting user.
    MissingAuthHeaders,
}

impl MessageKey {
    /// Catalog key string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaskApprovalHasBeenRequested => "taskApprovalHasBeenRequested",
            Self::TaskRequiresApproval => "taskRequiresApproval",
            Self::UserHasRequestedTaskApproval => "userHasRequestedTaskApproval",
            Self::YourTaskHasBeenApproved => "yourTaskHasBeenApproved",
            Self::CanOnlyApproveTaskOnce => "canOnlyApproveTaskOnce",
            Self::OnlyGroupLeaderCanEditTasks => "onlyGroupLeaderCanEditTasks",
            Self::MissingAuthHeaders => "missingAuthHeaders",
        }
    }
}

impl std::fmt::Display for MessageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders message keys into display strings.
pub trait Translator: Send + Sync {
    /// Renders `key` in `locale`, replacing `{name}` placeholders with the
    /// matching entry of `vars`.
    fn translate(&self, key: MessageKey, vars: &[(&str, String)], locale: &str) -> String;

    /// Whether `locale` can be stored as a user's preferred locale.
    fn supports(&self, locale: &str) -> bool;
}

const EN: &[(&str, &str)] = &[
    ("taskApprovalHasBeenRequested", "Approval has been requested"),
    (
        "taskRequiresApproval",
        "This task must be approved before you can complete it. Approval has already been requested",
    ),
    (
        "userHasRequestedTaskApproval",
        "{user} requests approval for {taskName} (task {taskId}, direction {direction})",
    ),
    ("yourTaskHasBeenApproved", "Your task \"{taskName}\" has been approved"),
    ("canOnlyApproveTaskOnce", "This task has already been approved."),
    (
        "onlyGroupLeaderCanEditTasks",
        "Not authorized to manage tasks!",
    ),
    ("missingAuthHeaders", "Missing authentication headers."),
];

const CS: &[(&str, &str)] = &[
    ("taskApprovalHasBeenRequested", "Bylo požádáno o schválení"),
    (
        "taskRequiresApproval",
        "Tento úkol musí být schválen, než ho budeš moci splnit. O schválení již bylo požádáno",
    ),
    (
        "userHasRequestedTaskApproval",
        "{user} žádá o schválení úkolu {taskName} (úkol {taskId}, směr {direction})",
    ),
    ("yourTaskHasBeenApproved", "Tvůj úkol \"{taskName}\" byl schválen"),
];

/// Built-in catalog. Unknown locales fall back to the default locale and
/// then to English; unknown keys render as the key itself.
#[derive(Debug, Clone)]
pub struct Catalog {
    default_locale: String,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new("en")
    }
}

impl Catalog {
    /// Creates a catalog that falls back to `default_locale`.
    #[must_use]
    pub fn new(default_locale: &str) -> Self {
        Self {
            default_locale: default_locale.to_string(),
        }
    }

    fn table(locale: &str) -> Option<&'static [(&'static str, &'static str)]> {
        match locale {
            "en" => Some(EN),
            "cs" => Some(CS),
            _ => None,
        }
    }

    fn lookup(locale: &str, key: &str) -> Option<&'static str> {
        Self::table(locale)?
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }
}

impl Translator for Catalog {
    fn translate(&self, key: MessageKey, vars: &[(&str, String)], locale: &str) -> String {
        let template = Self::lookup(locale, key.as_str())
            .or_else(|| Self::lookup(&self.default_locale, key.as_str()))
            .or_else(|| Self::lookup("en", key.as_str()))
            .unwrap_or(key.as_str());
        substitute(template, vars)
    }

    fn supports(&self, locale: &str) -> bool {
        Self::table(locale).is_some()
    }
}

/// Replaces every `{name}` in `template` with its value from `vars` in a
/// single left-to-right pass. Inserted values are copied verbatim and never
/// rescanned. Placeholders without a value are left as-is.
fn substitute(template: &str, vars: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let Some(close) = tail.find('}') else {
            rest = tail;
            break;
        };
        let name = &tail[1..close];
        match vars.iter().find(|(n, _)| *n == name) {
            Some((_, value)) => out.push_str(value),
            None => {
                // Unknown name: keep the brace and rescan right after it.
                out.push('{');
                rest = &tail[1..];
                continue;
            }
        }
        rest = &tail[close + 1..];
    }
    out.push_str(rest);
    out
}
