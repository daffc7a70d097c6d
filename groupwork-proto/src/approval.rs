//! Manager approval state machine for group tasks.
//!
//! Approval moves strictly forward:
//!
//! ```text
//! Unrequested ──request──▶ Requested ──approve──▶ Approved
//!      └──────────────────approve─────────────────────▲
//! ```
//!
//! The flattened [`ApprovalView`] derives its booleans from the variant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Approval state of a master task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Approval {
    /// Nobody has asked for approval yet.
    #[default]
    Unrequested,
    /// An assignee tried to score and is waiting for a manager.
    Requested {
        /// When approval was first requested.
        requested_date: DateTime<Utc>,
    },
    /// A manager signed off.
    Approved {
        /// When approval was requested, if it ever was.
        requested_date: Option<DateTime<Utc>>,
        /// When the manager approved.
        approved_date: DateTime<Utc>,
        /// Manager who approved.
        approving_user: String,
    },
}

/// Illegal approval transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApprovalError {
    /// Approval was already requested.
    #[error("approval has already been requested")]
    AlreadyRequested,
    /// Approval was already granted.
    #[error("task is already approved")]
    AlreadyApproved,
}

impl Approval {
    /// Whether an approval request is outstanding or was granted.
    #[must_use]
    pub const fn is_requested(&self) -> bool {
        !matches!(self, Self::Unrequested)
    }

    /// Whether a manager signed off.
    #[must_use]
    pub const fn is_approved(&self) -> bool {
        matches!(self, Self::Approved { .. })
    }

    /// When approval was requested, if known.
    #[must_use]
    pub const fn requested_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Unrequested => None,
            Self::Requested { requested_date } => Some(*requested_date),
            Self::Approved { requested_date, .. } => *requested_date,
        }
    }

    /// Moves `Unrequested` to `Requested`.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::AlreadyRequested`] or
    /// [`ApprovalError::AlreadyApproved`] from any other state.
    pub fn request(&mut self, now: DateTime<Utc>) -> Result<(), ApprovalError> {
        match self {
            Self::Unrequested => {
                *self = Self::Requested {
                    requested_date: now,
                };
                Ok(())
            }
            Self::Requested { .. } => Err(ApprovalError::AlreadyRequested),
            Self::Approved { .. } => Err(ApprovalError::AlreadyApproved),
        }
    }

    /// Moves `Unrequested` or `Requested` to `Approved`.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::AlreadyApproved`] if already approved.
    pub fn approve(
        &mut self,
        approving_user: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ApprovalError> {
        if self.is_approved() {
            return Err(ApprovalError::AlreadyApproved);
        }
        *self = Self::Approved {
            requested_date: self.requested_date(),
            approved_date: now,
            approving_user: approving_user.to_string(),
        };
        Ok(())
    }
}

/// Flattened approval shape exposed over the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalView {
    /// Whether the task requires approval at all.
    pub required: bool,
    /// Whether approval was requested (or granted).
    pub requested: bool,
    /// When approval was requested.
    pub requested_date: Option<DateTime<Utc>>,
    /// Whether a manager approved.
    pub approved: bool,
    /// When a manager approved.
    pub approved_date: Option<DateTime<Utc>>,
    /// Manager who approved.
    pub approving_user: Option<String>,
}

impl ApprovalView {
    /// Builds the view for an approval state on a task with the given
    /// `requires_approval` flag.
    #[must_use]
    pub fn new(required: bool, approval: &Approval) -> Self {
        let (approved_date, approving_user) = match approval {
            Approval::Approved {
                approved_date,
                approving_user,
                ..
            } => (Some(*approved_date), Some(approving_user.clone())),
            _ => (None, None),
        };
        Self {
            required,
            requested: approval.is_requested(),
            requested_date: approval.requested_date(),
            approved: approval.is_approved(),
            approved_date,
            approving_user,
        }
    }
}
