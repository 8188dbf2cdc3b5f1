//! Change notification types emitted by the entity store

use crate::store::Collection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// The kind of row change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A single row change on one collection
///
/// Must be Clone so one change can fan out to several subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Collection the row lives in
    pub collection: Collection,
    /// What happened to the row
    pub kind: ChangeKind,
    /// ID of the changed row
    pub row_id: Uuid,
    /// Account owning the row
    pub account_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// Create a new ChangeEvent stamped with the current time
    pub fn new(collection: Collection, kind: ChangeKind, row_id: Uuid, account_id: Uuid) -> Self {
        Self {
            collection,
            kind,
            row_id,
            account_id,
            timestamp: Utc::now(),
        }
    }
}

/// Opaque handle identifying one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

/// A live subscription to one collection of one account.
///
/// The receiver yields `None` once the subscription has been released.
#[derive(Debug)]
pub struct ChangeSubscription {
    pub id: SubscriptionId,
    pub collection: Collection,
    pub receiver: mpsc::Receiver<ChangeEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_kind_snake_case() {
        assert_eq!(serde_json::to_string(&ChangeKind::Insert).unwrap(), "\"insert\"");
        let kind: ChangeKind = serde_json::from_str("\"delete\"").unwrap();
        assert_eq!(kind, ChangeKind::Delete);
    }

    #[test]
    fn test_change_event_serializes_collection() {
        let event = ChangeEvent::new(
            Collection::Chatbots,
            ChangeKind::Update,
            Uuid::new_v4(),
            Uuid::new_v4(),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["collection"], "chatbots");
        assert_eq!(json["kind"], "update");
    }
}
