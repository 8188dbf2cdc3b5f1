//! Change notification system for realtime dashboard refreshes
//!
//! This module provides:
//! - `ChangeEvent` — typed events emitted after every store mutation
//! - `ChangeSubscription` — a per-collection, per-account event channel
//! - `SubscriberRegistry` — fan-out of events to live subscriptions

mod registry;
mod types;

pub use registry::SubscriberRegistry;
pub use types::{ChangeEvent, ChangeKind, ChangeSubscription, SubscriptionId};
