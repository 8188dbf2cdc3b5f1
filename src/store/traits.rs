//! EntityStore trait definition
//!
//! Defines the abstract interface of the hosted relational store the
//! dashboard consumes. The store owns persistence, row-level permissions and
//! referential cleanup; the dashboard only reads, writes and listens.

use super::error::StoreResult;
use super::models::*;
use crate::events::{ChangeSubscription, SubscriptionId};
use async_trait::async_trait;
use uuid::Uuid;

/// Abstract interface for all entity store operations.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // ========================================================================
    // Reads (account scoped)
    // ========================================================================

    /// List the account's clients in store order
    async fn fetch_clients(&self, scope: &AccountScope) -> StoreResult<Vec<Client>>;

    /// List the account's projects in store order
    async fn fetch_projects(&self, scope: &AccountScope) -> StoreResult<Vec<Project>>;

    /// List the account's chatbots in store order
    async fn fetch_chatbots(&self, scope: &AccountScope) -> StoreResult<Vec<Chatbot>>;

    /// List the account's analytics events in store order
    async fn fetch_analytics(&self, scope: &AccountScope) -> StoreResult<Vec<AnalyticsEvent>>;

    // ========================================================================
    // Admin reads (cross-account)
    // ========================================================================

    /// Whether the account holds the admin role
    async fn is_admin(&self, account_id: Uuid) -> StoreResult<bool>;

    /// List every chatbot request, all accounts
    async fn fetch_all_requests(&self) -> StoreResult<Vec<ChatbotRequest>>;

    /// List every project, all accounts
    async fn fetch_all_projects(&self) -> StoreResult<Vec<Project>>;

    /// List every client, all accounts
    async fn fetch_all_clients(&self) -> StoreResult<Vec<Client>>;

    /// List every creator account
    async fn fetch_creators(&self) -> StoreResult<Vec<Creator>>;

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert a row
    async fn insert(&self, row: Row) -> StoreResult<()>;

    /// Overwrite a client's editable fields.
    ///
    /// Returns `None` when no row matched (missing or not visible to caller).
    async fn update_client(&self, id: Uuid, patch: &ClientPatch) -> StoreResult<Option<Client>>;

    /// Apply an admin edit to a chatbot request
    async fn update_request(
        &self,
        id: Uuid,
        patch: &RequestPatch,
    ) -> StoreResult<Option<ChatbotRequest>>;

    /// Delete one row by id, returning the number of rows removed.
    ///
    /// Deleting a project also removes its chatbots, analytics events and
    /// chatbot requests (foreign-key cascade owned by the store).
    async fn delete(&self, collection: Collection, id: Uuid) -> StoreResult<u64>;

    // ========================================================================
    // Change notifications
    // ========================================================================

    /// Subscribe to changes on one collection of one account
    async fn subscribe(
        &self,
        collection: Collection,
        scope: &AccountScope,
    ) -> StoreResult<ChangeSubscription>;

    /// Release a subscription; unknown handles are ignored
    async fn unsubscribe(&self, id: SubscriptionId) -> StoreResult<()>;
}

/// Fetch the four raw collections of one account concurrently.
///
/// This is the bulk data-fetch contract the dashboard consumes: either all
/// four collections are returned or the first failure is.
pub async fn fetch_snapshot(
    store: &dyn EntityStore,
    scope: &AccountScope,
) -> StoreResult<RawCollections> {
    let (clients, projects, chatbots, analytics) = tokio::try_join!(
        store.fetch_clients(scope),
        store.fetch_projects(scope),
        store.fetch_chatbots(scope),
        store.fetch_analytics(scope),
    )?;

    Ok(RawCollections {
        clients,
        projects,
        chatbots,
        analytics,
    })
}
