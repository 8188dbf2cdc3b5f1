//! Recording, failure-injecting EntityStore for tests.
//!
//! Wraps a `MemoryStore`, logs every call in order and lets tests make
//! individual operations fail or stall.
//! Conditionally compiled with `#[cfg(test)]`.

use super::error::{StoreError, StoreResult};
use super::memory::MemoryStore;
use super::models::*;
use super::traits::EntityStore;
use crate::events::{ChangeSubscription, SubscriptionId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

/// One recorded store call
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Fetch(Collection),
    IsAdmin(Uuid),
    Insert(Collection),
    UpdateClient(Uuid),
    UpdateRequest(Uuid),
    Delete(Collection, Uuid),
    Subscribe(Collection),
    Unsubscribe(SubscriptionId),
}

/// EntityStore wrapper that records calls and injects failures
pub struct RecordingStore {
    pub inner: MemoryStore,
    calls: Mutex<Vec<StoreCall>>,
    failing_deletes: Mutex<HashMap<Uuid, StoreError>>,
    failing_subscribe: Mutex<Option<Collection>>,
    fetch_error: Mutex<Option<StoreError>>,
    update_error: Mutex<Option<StoreError>>,
    admin_error: Mutex<Option<StoreError>>,
    write_latency: Mutex<Option<Duration>>,
    project_fetch_stall: Mutex<Option<Duration>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::wrap(MemoryStore::new())
    }

    pub fn wrap(inner: MemoryStore) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            failing_deletes: Mutex::new(HashMap::new()),
            failing_subscribe: Mutex::new(None),
            fetch_error: Mutex::new(None),
            update_error: Mutex::new(None),
            admin_error: Mutex::new(None),
            write_latency: Mutex::new(None),
            project_fetch_stall: Mutex::new(None),
        }
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Only the delete calls, in order
    pub fn deletes(&self) -> Vec<(Collection, Uuid)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Delete(collection, id) => Some((collection, id)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&StoreCall) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn fail_delete(&self, id: Uuid, err: StoreError) {
        self.failing_deletes.lock().unwrap().insert(id, err);
    }

    pub fn fail_subscribe_on(&self, collection: Option<Collection>) {
        *self.failing_subscribe.lock().unwrap() = collection;
    }

    pub fn set_fetch_error(&self, err: Option<StoreError>) {
        *self.fetch_error.lock().unwrap() = err;
    }

    pub fn set_update_error(&self, err: Option<StoreError>) {
        *self.update_error.lock().unwrap() = err;
    }

    pub fn set_admin_error(&self, err: Option<StoreError>) {
        *self.admin_error.lock().unwrap() = err;
    }

    pub fn set_write_latency(&self, latency: Option<Duration>) {
        *self.write_latency.lock().unwrap() = latency;
    }

    /// Make the next project fetch read its rows, then wait `latency`
    /// before returning them
    pub fn stall_next_project_fetch(&self, latency: Duration) {
        *self.project_fetch_stall.lock().unwrap() = Some(latency);
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn fetch_failure(&self) -> StoreResult<()> {
        match self.fetch_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn stall(&self) {
        let latency = *self.write_latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl EntityStore for RecordingStore {
    async fn fetch_clients(&self, scope: &AccountScope) -> StoreResult<Vec<Client>> {
        self.record(StoreCall::Fetch(Collection::Clients));
        self.fetch_failure()?;
        self.inner.fetch_clients(scope).await
    }

    async fn fetch_projects(&self, scope: &AccountScope) -> StoreResult<Vec<Project>> {
        self.record(StoreCall::Fetch(Collection::Projects));
        self.fetch_failure()?;
        let projects = self.inner.fetch_projects(scope).await?;
        let stall = self.project_fetch_stall.lock().unwrap().take();
        if let Some(latency) = stall {
            tokio::time::sleep(latency).await;
        }
        Ok(projects)
    }

    async fn fetch_chatbots(&self, scope: &AccountScope) -> StoreResult<Vec<Chatbot>> {
        self.record(StoreCall::Fetch(Collection::Chatbots));
        self.fetch_failure()?;
        self.inner.fetch_chatbots(scope).await
    }

    async fn fetch_analytics(&self, scope: &AccountScope) -> StoreResult<Vec<AnalyticsEvent>> {
        self.record(StoreCall::Fetch(Collection::Analytics));
        self.fetch_failure()?;
        self.inner.fetch_analytics(scope).await
    }

    async fn is_admin(&self, account_id: Uuid) -> StoreResult<bool> {
        self.record(StoreCall::IsAdmin(account_id));
        if let Some(err) = self.admin_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.inner.is_admin(account_id).await
    }

    async fn fetch_all_requests(&self) -> StoreResult<Vec<ChatbotRequest>> {
        self.record(StoreCall::Fetch(Collection::ChatbotRequests));
        self.fetch_failure()?;
        self.inner.fetch_all_requests().await
    }

    async fn fetch_all_projects(&self) -> StoreResult<Vec<Project>> {
        self.record(StoreCall::Fetch(Collection::Projects));
        self.fetch_failure()?;
        self.inner.fetch_all_projects().await
    }

    async fn fetch_all_clients(&self) -> StoreResult<Vec<Client>> {
        self.record(StoreCall::Fetch(Collection::Clients));
        self.fetch_failure()?;
        self.inner.fetch_all_clients().await
    }

    async fn fetch_creators(&self) -> StoreResult<Vec<Creator>> {
        self.inner.fetch_creators().await
    }

    async fn insert(&self, row: Row) -> StoreResult<()> {
        self.record(StoreCall::Insert(row.collection()));
        self.inner.insert(row).await
    }

    async fn update_client(&self, id: Uuid, patch: &ClientPatch) -> StoreResult<Option<Client>> {
        self.record(StoreCall::UpdateClient(id));
        self.stall().await;
        if let Some(err) = self.update_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.inner.update_client(id, patch).await
    }

    async fn update_request(
        &self,
        id: Uuid,
        patch: &RequestPatch,
    ) -> StoreResult<Option<ChatbotRequest>> {
        self.record(StoreCall::UpdateRequest(id));
        self.stall().await;
        if let Some(err) = self.update_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.inner.update_request(id, patch).await
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> StoreResult<u64> {
        self.record(StoreCall::Delete(collection, id));
        self.stall().await;
        let injected = self.failing_deletes.lock().unwrap().get(&id).cloned();
        if let Some(err) = injected {
            return Err(err);
        }
        self.inner.delete(collection, id).await
    }

    async fn subscribe(
        &self,
        collection: Collection,
        scope: &AccountScope,
    ) -> StoreResult<ChangeSubscription> {
        self.record(StoreCall::Subscribe(collection));
        if *self.failing_subscribe.lock().unwrap() == Some(collection) {
            return Err(StoreError::new(format!(
                "connection refused while joining realtime channel for {}",
                collection
            )));
        }
        self.inner.subscribe(collection, scope).await
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> StoreResult<()> {
        self.record(StoreCall::Unsubscribe(id));
        self.inner.unsubscribe(id).await
    }
}
