//! Realtime synchronisation: turns store change events into refreshes

mod coalescer;

pub use coalescer::{ChangeCoalescer, RefreshCallback, RefreshFuture, DEFAULT_QUIET_INTERVAL};
