//! Per-user pending notification queues.
//!
//! The [`NotificationCenter`] holds a FIFO inbox per recipient. Emitting a
//! batch appends to every recipient's inbox under a single lock, so a later
//! batch can never be observed before an earlier one. Every record is also
//! pushed to live subscribers; that push never blocks and is dropped when
//! nobody listens.

use std::collections::{HashMap, VecDeque};

use groupwork_proto::notification::Notification;
use groupwork_proto::snapshot::InboxSnapshot;
use parking_lot::RwLock;
use tokio::sync::broadcast;

/// Default maximum number of pending notifications per user before FIFO eviction.
pub const DEFAULT_MAX_PENDING: usize = 1000;

/// Capacity of the live delivery channel.
const LIVE_CHANNEL_CAPACITY: usize = 256;

/// A notification addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Recipient user id.
    pub recipient: String,
    /// The notification.
    pub notification: Notification,
}

/// In-memory per-user notification inboxes with FIFO eviction.
pub struct NotificationCenter {
    inboxes: RwLock<HashMap<String, VecDeque<Notification>>>,
    max_pending: usize,
    live: broadcast::Sender<Delivery>,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationCenter {
    /// Creates an empty center with the default inbox size limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_pending(DEFAULT_MAX_PENDING)
    }

    /// Creates an empty center with a custom inbox size limit.
    #[must_use]
    pub fn with_max_pending(max_pending: usize) -> Self {
        let (live, _) = broadcast::channel(LIVE_CHANNEL_CAPACITY);
        Self {
            inboxes: RwLock::new(HashMap::new()),
            max_pending,
            live,
        }
    }

    /// Appends every delivery to its recipient's inbox, in order.
    ///
    /// If an inbox exceeds the configured maximum, its oldest record is
    /// evicted.
    pub fn emit_all(&self, deliveries: Vec<Delivery>) {
        if deliveries.is_empty() {
            return;
        }
        let mut inboxes = self.inboxes.write();
        for delivery in &deliveries {
            let inbox = inboxes.entry(delivery.recipient.clone()).or_default();
            inbox.push_back(delivery.notification.clone());
            if inbox.len() > self.max_pending {
                inbox.pop_front();
            }
        }
        drop(inboxes);

        for delivery in deliveries {
            tracing::debug!(
                recipient = %delivery.recipient,
                kind = ?delivery.notification.kind,
                "notification emitted"
            );
            // No subscribers is fine: the inbox already holds the record.
            let _ = self.live.send(delivery);
        }
    }

    /// Appends one notification to `recipient`'s inbox.
    pub fn emit(&self, recipient: &str, notification: Notification) {
        self.emit_all(vec![Delivery {
            recipient: recipient.to_string(),
            notification,
        }]);
    }

    /// Returns the pending notifications of a user, oldest first, without
    /// clearing them.
    #[must_use]
    pub fn pending(&self, user_id: &str) -> Vec<Notification> {
        self.inboxes
            .read()
            .get(user_id)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Removes and returns the pending notifications of a user, oldest first.
    pub fn drain(&self, user_id: &str) -> Vec<Notification> {
        self.inboxes
            .write()
            .remove(user_id)
            .map(|q| q.into_iter().collect())
            .unwrap_or_default()
    }

    /// Number of pending notifications for a user.
    #[must_use]
    pub fn pending_len(&self, user_id: &str) -> usize {
        self.inboxes.read().get(user_id).map_or(0, VecDeque::len)
    }

    /// Subscribes to live deliveries emitted after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Delivery> {
        self.live.subscribe()
    }

    /// Snapshot of every non-empty inbox.
    #[must_use]
    pub fn snapshot(&self) -> Vec<InboxSnapshot> {
        self.inboxes
            .read()
            .iter()
            .filter(|(_, q)| !q.is_empty())
            .map(|(user_id, q)| InboxSnapshot {
                user_id: user_id.clone(),
                notifications: q.iter().cloned().collect(),
            })
            .collect()
    }

    /// Rebuilds a center from snapshot contents.
    #[must_use]
    pub fn restore(inboxes: Vec<InboxSnapshot>, max_pending: usize) -> Self {
        let center = Self::with_max_pending(max_pending);
        {
            let mut map = center.inboxes.write();
            for inbox in inboxes {
                map.insert(inbox.user_id, inbox.notifications.into_iter().collect());
            }
        }
        center
    }
}
