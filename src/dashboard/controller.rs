//! Dashboard controller
//!
//! Owns the lifecycle of one mounted dashboard: initial load, live refresh
//! through the change coalescer, local search and status filtering, and
//! mutations with an optimistic shadow that the next refresh replaces.
//!
//! ## State machine
//!
//! ```text
//! Loading -> Ready        snapshot fetched and aggregated
//! Loading -> Error        fetch, subscription or admin check failed
//! Ready   -> Ready        coalesced refresh succeeded
//! Ready   -> Error        refresh failed
//! Error   -> Loading      manual refresh
//! any     -> (discarded)  after shutdown or remount
//! ```
//!
//! Every mount bumps a generation counter. Results computed for an older
//! generation, or after shutdown, are dropped instead of being written.
//! Within a generation every fetch takes a ticket before it starts; a result
//! whose ticket is older than the last committed one is dropped as well, so a
//! slow refresh can never overwrite the one that followed a mutation.

use super::aggregator::aggregate;
use super::filter::{filter_views, StatusFilter};
use super::models::AggregatedProjectView;
use super::mutations::{MutationOrchestrator, MutationOutcome};
use super::stats::{compute_stats, DashboardStats};
use super::validation::ClientFields;
use crate::error::{DashboardError, DashboardResult, ErrorCategory};
use crate::store::{fetch_snapshot, AccountScope, EntityStore, ProjectStatus, RawCollections};
use crate::sync::{ChangeCoalescer, RefreshCallback, RefreshFuture, DEFAULT_QUIET_INTERVAL};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const ADMIN_REQUIRED_MESSAGE: &str = "You don't have permission to access this dashboard.";

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Quiet interval for the change coalescer
    pub quiet_interval: Duration,
    /// Reject accounts that are not administrators on mount
    pub require_admin: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            quiet_interval: DEFAULT_QUIET_INTERVAL,
            require_admin: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Loading,
    Ready,
    Error,
}

/// Error as exposed to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub category: ErrorCategory,
    /// Raw message, for diagnostics
    pub message: String,
    pub user_message: String,
}

impl From<&DashboardError> for ErrorReport {
    fn from(err: &DashboardError) -> Self {
        Self {
            category: err.category(),
            message: err.message().to_string(),
            user_message: err.user_message().to_string(),
        }
    }
}

/// Immutable snapshot handed to the presentation layer
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub status: LoadStatus,
    /// Filtered, shadow-applied views in store order
    pub items: Vec<AggregatedProjectView>,
    /// Totals over every visible view, ignoring search and status filter
    pub stats: DashboardStats,
    pub error: Option<ErrorReport>,
    pub search: String,
    pub status_filter: StatusFilter,
    pub revision: u64,
}

/// Local edits layered over the last snapshot until the next refresh
#[derive(Debug, Default)]
struct ShadowState {
    hidden_clients: HashSet<Uuid>,
    hidden_projects: HashSet<Uuid>,
    status_overrides: HashMap<Uuid, ProjectStatus>,
}

impl ShadowState {
    fn is_empty(&self) -> bool {
        self.hidden_clients.is_empty()
            && self.hidden_projects.is_empty()
            && self.status_overrides.is_empty()
    }

    fn apply(&self, views: &[AggregatedProjectView]) -> Vec<AggregatedProjectView> {
        views
            .iter()
            .filter(|v| {
                !self.hidden_projects.contains(&v.id) && !self.hidden_clients.contains(&v.client.id)
            })
            .map(|v| match self.status_overrides.get(&v.id) {
                Some(status) => {
                    let mut view = v.clone();
                    view.project.status = *status;
                    view
                }
                None => v.clone(),
            })
            .collect()
    }
}

struct ControllerState {
    status: LoadStatus,
    scope: Option<AccountScope>,
    raw: Arc<RawCollections>,
    views: Arc<Vec<AggregatedProjectView>>,
    shadow: ShadowState,
    search: String,
    status_filter: StatusFilter,
    error: Option<DashboardError>,
    revision: u64,
    /// Ticket of the newest fetch whose result was written
    last_committed_fetch: u64,
}

impl ControllerState {
    fn new() -> Self {
        Self {
            status: LoadStatus::Loading,
            scope: None,
            raw: Arc::new(RawCollections::default()),
            views: Arc::new(Vec::new()),
            shadow: ShadowState::default(),
            search: String::new(),
            status_filter: StatusFilter::All,
            error: None,
            revision: 0,
            last_committed_fetch: 0,
        }
    }
}

struct Inner {
    store: Arc<dyn EntityStore>,
    options: ControllerOptions,
    mutations: MutationOrchestrator,
    state: RwLock<ControllerState>,
    coalescer: Mutex<Option<ChangeCoalescer>>,
    generation: AtomicU64,
    fetches: AtomicU64,
    teardown: CancellationToken,
    revisions: watch::Sender<u64>,
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        !self.teardown.is_cancelled() && self.generation.load(Ordering::SeqCst) == generation
    }

    fn next_ticket(&self) -> u64 {
        self.fetches.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Drop results of a superseded mount, or older than what is shown
    fn accepts(&self, state: &ControllerState, generation: u64, ticket: u64) -> bool {
        self.is_current(generation) && ticket > state.last_committed_fetch
    }

    fn bump(&self, state: &mut ControllerState) {
        state.revision += 1;
        self.revisions.send_replace(state.revision);
    }

    /// Fetch, aggregate and commit a fresh snapshot for `generation`
    async fn reload(&self, generation: u64) -> DashboardResult<()> {
        let (scope, ticket) = {
            let mut state = self.state.write().await;
            if !self.is_current(generation) {
                return Ok(());
            }
            if state.status == LoadStatus::Error {
                state.status = LoadStatus::Loading;
                self.bump(&mut state);
            }
            match state.scope {
                Some(scope) => (scope, self.next_ticket()),
                None => return Ok(()),
            }
        };

        match fetch_snapshot(self.store.as_ref(), &scope).await {
            Ok(raw) => {
                let views = aggregate(&raw);
                self.commit_snapshot(generation, ticket, raw, views).await;
                Ok(())
            }
            Err(e) => {
                let err = DashboardError::from(e);
                self.commit_error(generation, ticket, err.clone()).await;
                Err(err)
            }
        }
    }

    async fn commit_snapshot(
        &self,
        generation: u64,
        ticket: u64,
        raw: RawCollections,
        views: Vec<AggregatedProjectView>,
    ) {
        let mut state = self.state.write().await;
        if !self.accepts(&state, generation, ticket) {
            debug!(generation, ticket, "Discarding stale snapshot");
            return;
        }
        let count = views.len();
        state.last_committed_fetch = ticket;
        state.raw = Arc::new(raw);
        state.views = Arc::new(views);
        state.shadow = ShadowState::default();
        state.status = LoadStatus::Ready;
        state.error = None;
        self.bump(&mut state);
        debug!(generation, views = count, revision = state.revision, "Snapshot committed");
    }

    async fn commit_error(&self, generation: u64, ticket: u64, err: DashboardError) {
        let mut state = self.state.write().await;
        if !self.accepts(&state, generation, ticket) {
            debug!(generation, ticket, error = %err, "Discarding stale error");
            return;
        }
        state.last_committed_fetch = ticket;
        warn!(generation, category = ?err.category(), error = %err, "Dashboard entered error state");
        state.status = LoadStatus::Error;
        state.error = Some(err);
        self.bump(&mut state);
    }
}

/// Handle to one dashboard; cheap to clone
#[derive(Clone)]
pub struct DashboardController {
    inner: Arc<Inner>,
}

impl DashboardController {
    pub fn new(store: Arc<dyn EntityStore>, options: ControllerOptions) -> Self {
        let (revisions, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                mutations: MutationOrchestrator::new(store.clone()),
                store,
                options,
                state: RwLock::new(ControllerState::new()),
                coalescer: Mutex::new(None),
                generation: AtomicU64::new(0),
                fetches: AtomicU64::new(0),
                teardown: CancellationToken::new(),
                revisions,
            }),
        }
    }

    /// Receiver notified with the new revision after every state change
    pub fn subscribe_revisions(&self) -> watch::Receiver<u64> {
        self.inner.revisions.subscribe()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Mount the dashboard for an account.
    ///
    /// Releases any previous account's subscriptions first, then checks
    /// admin rights if required, subscribes to changes and loads the first
    /// snapshot. On failure the controller is left in `Error`.
    pub async fn mount(&self, scope: AccountScope) -> DashboardResult<()> {
        let inner = &self.inner;
        if inner.teardown.is_cancelled() {
            return Err(DashboardError::Connectivity(
                "dashboard controller has been shut down".to_string(),
            ));
        }
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let previous = inner.coalescer.lock().await.take();
        if let Some(previous) = previous {
            debug!(old = %previous.scope(), new = %scope, "Releasing previous account");
            previous.shutdown().await;
        }

        {
            let mut state = inner.state.write().await;
            state.status = LoadStatus::Loading;
            state.scope = Some(scope);
            state.raw = Arc::new(RawCollections::default());
            state.views = Arc::new(Vec::new());
            state.shadow = ShadowState::default();
            state.error = None;
            inner.bump(&mut state);
        }
        info!(%scope, generation, "Mounting dashboard");

        if inner.options.require_admin {
            let verdict = match inner.store.is_admin(scope.account_id).await {
                Ok(true) => Ok(()),
                Ok(false) => Err(DashboardError::Permission(ADMIN_REQUIRED_MESSAGE.to_string())),
                Err(e) => Err(DashboardError::from(e)),
            };
            if let Err(err) = verdict {
                inner.commit_error(generation, inner.next_ticket(), err.clone()).await;
                return Err(err);
            }
        }

        // Subscribe before the first fetch so no change slips between them
        let coalescer = match ChangeCoalescer::start(
            inner.store.clone(),
            scope,
            inner.options.quiet_interval,
            refresh_callback(Arc::downgrade(inner), generation),
        )
        .await
        {
            Ok(coalescer) => coalescer,
            Err(err) => {
                inner.commit_error(generation, inner.next_ticket(), err.clone()).await;
                return Err(err);
            }
        };

        {
            let mut slot = inner.coalescer.lock().await;
            if inner.is_current(generation) {
                let replaced = slot.replace(coalescer);
                drop(slot);
                if let Some(replaced) = replaced {
                    replaced.shutdown().await;
                }
            } else {
                drop(slot);
                coalescer.shutdown().await;
                return Ok(());
            }
        }

        inner.reload(generation).await
    }

    /// Refresh manually. Recovers from `Error`, re-subscribing when the
    /// subscription was never established or its streams have closed.
    pub async fn refresh(&self) -> DashboardResult<()> {
        let scope = self.current_scope().await?;
        let dead = {
            let mut slot = self.inner.coalescer.lock().await;
            let running = slot.as_ref().map(ChangeCoalescer::is_running);
            match running {
                Some(true) => None,
                Some(false) => slot.take(),
                None => {
                    drop(slot);
                    return self.mount(scope).await;
                }
            }
        };
        if let Some(dead) = dead {
            warn!(%scope, "Change subscriptions closed, re-subscribing");
            dead.shutdown().await;
            return self.mount(scope).await;
        }
        let generation = self.inner.generation.load(Ordering::SeqCst);
        self.inner.reload(generation).await
    }

    /// Release every subscription and discard in-flight results.
    /// Idempotent; the controller cannot be mounted again afterwards.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        inner.teardown.cancel();
        inner.generation.fetch_add(1, Ordering::SeqCst);
        let coalescer = inner.coalescer.lock().await.take();
        if let Some(coalescer) = coalescer {
            coalescer.shutdown().await;
        }
        info!("Dashboard shut down");
    }

    async fn current_scope(&self) -> DashboardResult<AccountScope> {
        self.inner
            .state
            .read()
            .await
            .scope
            .ok_or_else(|| DashboardError::NotFound("no account is mounted".to_string()))
    }

    // ========================================================================
    // Presentation
    // ========================================================================

    /// Current view: shadow applied, then search and status filter
    pub async fn view(&self) -> DashboardView {
        let state = self.inner.state.read().await;
        let visible = if state.shadow.is_empty() {
            state.views.to_vec()
        } else {
            state.shadow.apply(&state.views)
        };
        DashboardView {
            status: state.status,
            items: filter_views(&visible, &state.search, state.status_filter),
            stats: compute_stats(&visible),
            error: state.error.as_ref().map(ErrorReport::from),
            search: state.search.clone(),
            status_filter: state.status_filter,
            revision: state.revision,
        }
    }

    pub async fn status(&self) -> LoadStatus {
        self.inner.state.read().await.status
    }

    /// Raw collections of the last committed snapshot
    pub async fn raw(&self) -> Arc<RawCollections> {
        self.inner.state.read().await.raw.clone()
    }

    pub async fn set_search(&self, term: impl Into<String>) {
        let mut state = self.inner.state.write().await;
        state.search = term.into();
        self.inner.bump(&mut state);
    }

    pub async fn set_status_filter(&self, filter: StatusFilter) {
        let mut state = self.inner.state.write().await;
        state.status_filter = filter;
        self.inner.bump(&mut state);
    }

    /// Change a project's status locally. Not persisted; the next refresh
    /// shows the stored status again.
    pub async fn set_project_status(&self, project_id: Uuid, status: ProjectStatus) {
        let mut state = self.inner.state.write().await;
        state.shadow.status_overrides.insert(project_id, status);
        self.inner.bump(&mut state);
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Delete a client and its projects. The client's rows disappear from
    /// the view at once and come back if the delete fails.
    pub async fn delete_client(&self, client_id: Uuid) -> DashboardResult<MutationOutcome> {
        let scope = self.current_scope().await?;
        let generation = self.inner.generation.load(Ordering::SeqCst);
        self.with_shadow(|s| {
            s.hidden_clients.insert(client_id);
        })
        .await;

        let result = self.inner.mutations.delete_client(&scope, client_id).await;
        self.settle(generation, &result, |s| {
            s.hidden_clients.remove(&client_id);
        })
        .await;
        result
    }

    /// Delete one project, hiding it optimistically
    pub async fn delete_project(&self, project_id: Uuid) -> DashboardResult<MutationOutcome> {
        self.current_scope().await?;
        let generation = self.inner.generation.load(Ordering::SeqCst);
        self.with_shadow(|s| {
            s.hidden_projects.insert(project_id);
        })
        .await;

        let result = self.inner.mutations.delete_project(project_id).await;
        self.settle(generation, &result, |s| {
            s.hidden_projects.remove(&project_id);
        })
        .await;
        result
    }

    /// Validate and write client fields, then refresh
    pub async fn update_client(
        &self,
        client_id: Uuid,
        fields: &ClientFields,
    ) -> DashboardResult<MutationOutcome> {
        self.current_scope().await?;
        let generation = self.inner.generation.load(Ordering::SeqCst);
        let (outcome, _) = self.inner.mutations.update_client(client_id, fields).await?;
        if matches!(outcome, MutationOutcome::Completed(_)) {
            self.refresh_after_mutation(generation).await;
        }
        Ok(outcome)
    }

    async fn with_shadow(&self, edit: impl FnOnce(&mut ShadowState)) {
        let mut state = self.inner.state.write().await;
        edit(&mut state.shadow);
        self.inner.bump(&mut state);
    }

    /// Refresh after success, undo the optimistic edit after failure
    async fn settle(
        &self,
        generation: u64,
        result: &DashboardResult<MutationOutcome>,
        revert: impl FnOnce(&mut ShadowState),
    ) {
        match result {
            Ok(MutationOutcome::Completed(_)) => self.refresh_after_mutation(generation).await,
            // The mutation already running owns the shadow entry
            Ok(MutationOutcome::AlreadyInFlight) => {}
            Err(err) => {
                debug!(error = %err, "Mutation failed, reverting optimistic change");
                if self.inner.is_current(generation) {
                    self.with_shadow(revert).await;
                }
            }
        }
    }

    async fn refresh_after_mutation(&self, generation: u64) {
        // The mutation itself succeeded; a failed reload is reported via state
        if let Err(e) = self.inner.reload(generation).await {
            warn!(error = %e, "Refresh after mutation failed");
        }
    }
}

fn refresh_callback(inner: Weak<Inner>, generation: u64) -> RefreshCallback {
    Arc::new(move || -> RefreshFuture {
        let inner = inner.clone();
        Box::pin(async move {
            if let Some(inner) = inner.upgrade() {
                if let Err(e) = inner.reload(generation).await {
                    warn!(generation, error = %e, "Coalesced refresh failed");
                }
            }
        })
    })
}
