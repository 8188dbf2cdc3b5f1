//! Change coalescer for the live dashboard.
//!
//! Subscribes to every watched collection of one account and turns bursts
//! of change events into a single refresh.
//!
//! ## Design
//!
//! All subscription receivers are merged into one stream feeding a
//! background task:
//! 1. The task waits for the first event of a burst
//! 2. It keeps consuming events until the quiet interval passes with none
//!    (every event re-arms the timer)
//! 3. It then runs the refresh callback and waits for it to finish before
//!    looking at new events, so refreshes never overlap
//!
//! Cancelling the token stops the task at the next await point; a pending
//! refresh is discarded. `shutdown` also releases every subscription, and so
//! does dropping the coalescer inside a runtime (on a spawned task).

use crate::error::{DashboardError, DashboardResult};
use crate::events::{ChangeEvent, SubscriptionId};
use crate::store::{AccountScope, Collection, EntityStore};
use futures::stream::{self, Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default quiet interval before a refresh fires
pub const DEFAULT_QUIET_INTERVAL: Duration = Duration::from_millis(1000);

pub type RefreshFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Called once per coalesced burst
pub type RefreshCallback = Arc<dyn Fn() -> RefreshFuture + Send + Sync>;

/// Debounced change listener for one account.
pub struct ChangeCoalescer {
    store: Arc<dyn EntityStore>,
    scope: AccountScope,
    handles: Vec<SubscriptionId>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ChangeCoalescer {
    /// Subscribe to the watched collections and start the debounce loop.
    ///
    /// If any subscription fails, the ones already established are released
    /// and a `Connectivity` error is returned.
    pub async fn start(
        store: Arc<dyn EntityStore>,
        scope: AccountScope,
        quiet: Duration,
        on_refresh: RefreshCallback,
    ) -> DashboardResult<Self> {
        let mut handles = Vec::with_capacity(Collection::WATCHED.len());
        let mut receivers = Vec::with_capacity(Collection::WATCHED.len());

        for collection in Collection::WATCHED {
            match store.subscribe(collection, &scope).await {
                Ok(sub) => {
                    handles.push(sub.id);
                    receivers.push(ReceiverStream::new(sub.receiver));
                }
                Err(e) => {
                    warn!(%scope, %collection, error = %e, "Subscription failed");
                    release_all(store.as_ref(), &handles).await;
                    return Err(DashboardError::Connectivity(format!(
                        "could not subscribe to {}: {}",
                        collection, e.message
                    )));
                }
            }
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(
            stream::select_all(receivers),
            quiet,
            on_refresh,
            cancel.clone(),
            scope,
        ));
        info!(%scope, quiet_ms = quiet.as_millis() as u64, "Change coalescer started");

        Ok(Self {
            store,
            scope,
            handles,
            cancel,
            task: Some(task),
        })
    }

    pub fn scope(&self) -> AccountScope {
        self.scope
    }

    /// Number of live subscriptions held
    pub fn subscription_count(&self) -> usize {
        self.handles.len()
    }

    /// False once the loop has stopped, either cancelled or because every
    /// subscription stream closed
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the loop, drop any pending refresh and release every subscription
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    warn!(scope = %self.scope, "Coalescer task panicked");
                }
            }
        }
        let handles = std::mem::take(&mut self.handles);
        release_all(self.store.as_ref(), &handles).await;
        info!(scope = %self.scope, "Change coalescer stopped");
    }
}

impl Drop for ChangeCoalescer {
    fn drop(&mut self) {
        self.cancel.cancel();
        if self.handles.is_empty() {
            return;
        }
        let handles = std::mem::take(&mut self.handles);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!(
                    scope = %self.scope,
                    handles = handles.len(),
                    "Coalescer dropped without shutdown, releasing subscriptions"
                );
                let store = self.store.clone();
                runtime.spawn(async move {
                    release_all(store.as_ref(), &handles).await;
                });
            }
            Err(_) => warn!(
                scope = %self.scope,
                handles = handles.len(),
                "Coalescer dropped outside a runtime, subscriptions not released"
            ),
        }
    }
}

async fn release_all(store: &dyn EntityStore, handles: &[SubscriptionId]) {
    for id in handles {
        if let Err(e) = store.unsubscribe(*id).await {
            warn!(subscription = id.0, error = %e, "Failed to release subscription");
        }
    }
}

async fn run_loop<S>(
    mut events: S,
    quiet: Duration,
    on_refresh: RefreshCallback,
    cancel: CancellationToken,
    scope: AccountScope,
) where
    S: Stream<Item = ChangeEvent> + Unpin + Send,
{
    loop {
        // Wait for the first event of a burst
        let first = tokio::select! {
            _ = cancel.cancelled() => return,
            next = events.next() => match next {
                Some(event) => event,
                None => {
                    warn!(%scope, "Every subscription closed, coalescer stopped");
                    return;
                }
            },
        };
        debug!(%scope, collection = %first.collection, "Change burst started");
        let mut burst = 1usize;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                next = tokio::time::timeout(quiet, events.next()) => match next {
                    Ok(Some(_)) => burst += 1, // re-arm the timer
                    Ok(None) => {
                        warn!(%scope, burst, "Every subscription closed mid-burst, coalescer stopped");
                        return;
                    }
                    Err(_) => break, // quiet interval elapsed
                },
            }
        }

        debug!(%scope, burst, "Quiet interval elapsed, refreshing");
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = on_refresh() => {}
        }
    }
}
