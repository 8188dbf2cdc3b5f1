//! In-memory implementation of EntityStore.
//!
//! Keeps every collection in a `Vec` (store order is insertion order) behind
//! a `tokio::sync::RwLock`, enforces the constraints the hosted store
//! enforces (unique client e-mail per account, project foreign-key cascade)
//! and emits change events for every mutation.

use super::error::{StoreError, StoreErrorCode, StoreResult};
use super::models::*;
use super::traits::EntityStore;
use crate::events::{ChangeEvent, ChangeKind, ChangeSubscription, SubscriberRegistry, SubscriptionId};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Serializable dump of a whole store, used for fixtures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub creators: Vec<Creator>,
    pub clients: Vec<Client>,
    pub projects: Vec<Project>,
    pub chatbots: Vec<Chatbot>,
    pub analytics: Vec<AnalyticsEvent>,
    pub requests: Vec<ChatbotRequest>,
}

#[derive(Default)]
struct Tables {
    creators: Vec<Creator>,
    clients: Vec<Client>,
    projects: Vec<Project>,
    chatbots: Vec<Chatbot>,
    analytics: Vec<AnalyticsEvent>,
    requests: Vec<ChatbotRequest>,
}

/// In-memory entity store
pub struct MemoryStore {
    tables: RwLock<Tables>,
    registry: SubscriberRegistry,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            registry: SubscriberRegistry::default(),
        }
    }

    /// Create a store pre-seeded with a fixture. Constraints are not checked.
    pub fn from_fixture(fixture: Fixture) -> Self {
        let tables = Tables {
            creators: fixture.creators,
            clients: fixture.clients,
            projects: fixture.projects,
            chatbots: fixture.chatbots,
            analytics: fixture.analytics,
            requests: fixture.requests,
        };
        Self {
            tables: RwLock::new(tables),
            registry: SubscriberRegistry::default(),
        }
    }

    /// Dump the current contents as a fixture
    pub async fn to_fixture(&self) -> Fixture {
        let t = self.tables.read().await;
        Fixture {
            creators: t.creators.clone(),
            clients: t.clients.clone(),
            projects: t.projects.clone(),
            chatbots: t.chatbots.clone(),
            analytics: t.analytics.clone(),
            requests: t.requests.clone(),
        }
    }

    /// Register a creator account
    pub async fn add_creator(&self, creator: Creator) {
        self.tables.write().await.creators.push(creator);
    }

    /// Number of live change subscriptions
    pub fn active_subscriptions(&self) -> usize {
        self.registry.active_count()
    }

    /// Close every change subscription, as a dropped realtime connection would
    pub fn disconnect_subscribers(&self) -> usize {
        self.registry.close_all()
    }

    fn emit_all(&self, events: &[ChangeEvent]) {
        for event in events {
            self.registry.emit(event);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn duplicate_email() -> StoreError {
    StoreError::with_code(
        StoreErrorCode::UniqueViolation,
        "duplicate key value violates unique constraint \"end_clients_email_key\"",
    )
}

fn duplicate_id(collection: Collection, id: Uuid) -> StoreError {
    StoreError::with_code(
        StoreErrorCode::UniqueViolation,
        format!(
            "duplicate key value violates unique constraint \"{}_pkey\" (id={})",
            collection.table_name(),
            id
        ),
    )
}

fn email_taken(clients: &[Client], account_id: Uuid, email: &str, except: Option<Uuid>) -> bool {
    clients.iter().any(|c| {
        c.account_id == account_id
            && Some(c.id) != except
            && c.email.eq_ignore_ascii_case(email)
    })
}

fn owned_by<T: Clone>(rows: &[T], scope: &AccountScope, owner: impl Fn(&T) -> Uuid) -> Vec<T> {
    rows.iter()
        .filter(|row| owner(row) == scope.account_id)
        .cloned()
        .collect()
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn fetch_clients(&self, scope: &AccountScope) -> StoreResult<Vec<Client>> {
        Ok(owned_by(&self.tables.read().await.clients, scope, |c| c.account_id))
    }

    async fn fetch_projects(&self, scope: &AccountScope) -> StoreResult<Vec<Project>> {
        Ok(owned_by(&self.tables.read().await.projects, scope, |p| p.account_id))
    }

    async fn fetch_chatbots(&self, scope: &AccountScope) -> StoreResult<Vec<Chatbot>> {
        Ok(owned_by(&self.tables.read().await.chatbots, scope, |c| c.account_id))
    }

    async fn fetch_analytics(&self, scope: &AccountScope) -> StoreResult<Vec<AnalyticsEvent>> {
        Ok(owned_by(&self.tables.read().await.analytics, scope, |a| a.account_id))
    }

    async fn is_admin(&self, account_id: Uuid) -> StoreResult<bool> {
        Ok(self
            .tables
            .read()
            .await
            .creators
            .iter()
            .any(|c| c.id == account_id && c.is_admin))
    }

    async fn fetch_all_requests(&self) -> StoreResult<Vec<ChatbotRequest>> {
        Ok(self.tables.read().await.requests.clone())
    }

    async fn fetch_all_projects(&self) -> StoreResult<Vec<Project>> {
        Ok(self.tables.read().await.projects.clone())
    }

    async fn fetch_all_clients(&self) -> StoreResult<Vec<Client>> {
        Ok(self.tables.read().await.clients.clone())
    }

    async fn fetch_creators(&self) -> StoreResult<Vec<Creator>> {
        Ok(self.tables.read().await.creators.clone())
    }

    async fn insert(&self, row: Row) -> StoreResult<()> {
        let event = ChangeEvent::new(row.collection(), ChangeKind::Insert, row.id(), row.account_id());
        {
            let mut t = self.tables.write().await;
            let id = row.id();
            match row {
                Row::Client(client) => {
                    if t.clients.iter().any(|c| c.id == id) {
                        return Err(duplicate_id(Collection::Clients, id));
                    }
                    if email_taken(&t.clients, client.account_id, &client.email, None) {
                        return Err(duplicate_email());
                    }
                    t.clients.push(client);
                }
                Row::Project(project) => {
                    if t.projects.iter().any(|p| p.id == id) {
                        return Err(duplicate_id(Collection::Projects, id));
                    }
                    t.projects.push(project);
                }
                Row::Chatbot(chatbot) => {
                    if t.chatbots.iter().any(|c| c.id == id) {
                        return Err(duplicate_id(Collection::Chatbots, id));
                    }
                    t.chatbots.push(chatbot);
                }
                Row::Analytics(analytics) => {
                    if t.analytics.iter().any(|a| a.id == id) {
                        return Err(duplicate_id(Collection::Analytics, id));
                    }
                    t.analytics.push(analytics);
                }
                Row::ChatbotRequest(request) => {
                    if t.requests.iter().any(|r| r.id == id) {
                        return Err(duplicate_id(Collection::ChatbotRequests, id));
                    }
                    t.requests.push(request);
                }
            }
        }
        self.registry.emit(&event);
        Ok(())
    }

    async fn update_client(&self, id: Uuid, patch: &ClientPatch) -> StoreResult<Option<Client>> {
        let updated = {
            let mut t = self.tables.write().await;
            let Some(index) = t.clients.iter().position(|c| c.id == id) else {
                return Ok(None);
            };
            let account_id = t.clients[index].account_id;
            if email_taken(&t.clients, account_id, &patch.email, Some(id)) {
                return Err(duplicate_email());
            }
            let client = &mut t.clients[index];
            client.name = patch.name.clone();
            client.email = patch.email.clone();
            client.company = patch.company.clone();
            client.phone = patch.phone.clone();
            client.website = patch.website.clone();
            client.updated_at = patch.updated_at;
            client.clone()
        };
        self.registry.emit(&ChangeEvent::new(
            Collection::Clients,
            ChangeKind::Update,
            updated.id,
            updated.account_id,
        ));
        Ok(Some(updated))
    }

    async fn update_request(
        &self,
        id: Uuid,
        patch: &RequestPatch,
    ) -> StoreResult<Option<ChatbotRequest>> {
        let updated = {
            let mut t = self.tables.write().await;
            let Some(request) = t.requests.iter_mut().find(|r| r.id == id) else {
                return Ok(None);
            };
            if let Some(status) = patch.status {
                request.status = status;
            }
            if let Some(notes) = &patch.admin_notes {
                request.admin_notes = Some(notes.clone());
            }
            if let Some(url) = &patch.chatbot_url {
                request.chatbot_url = Some(url.clone());
            }
            if let Some(date) = patch.estimated_completion_date {
                request.estimated_completion_date = date;
            }
            request.updated_at = Some(Utc::now());
            request.clone()
        };
        self.registry.emit(&ChangeEvent::new(
            Collection::ChatbotRequests,
            ChangeKind::Update,
            updated.id,
            updated.account_id,
        ));
        Ok(Some(updated))
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> StoreResult<u64> {
        let mut events = Vec::new();
        {
            let mut t = self.tables.write().await;
            match collection {
                Collection::Clients => {
                    if let Some(index) = t.clients.iter().position(|c| c.id == id) {
                        let client = t.clients.remove(index);
                        events.push(ChangeEvent::new(
                            collection,
                            ChangeKind::Delete,
                            id,
                            client.account_id,
                        ));
                    }
                }
                Collection::Projects => {
                    if let Some(index) = t.projects.iter().position(|p| p.id == id) {
                        let project = t.projects.remove(index);
                        events.push(ChangeEvent::new(
                            collection,
                            ChangeKind::Delete,
                            id,
                            project.account_id,
                        ));

                        // Foreign-key cascade
                        t.chatbots.retain(|c| {
                            let keep = c.project_id != id;
                            if !keep {
                                events.push(ChangeEvent::new(
                                    Collection::Chatbots,
                                    ChangeKind::Delete,
                                    c.id,
                                    c.account_id,
                                ));
                            }
                            keep
                        });
                        t.analytics.retain(|a| {
                            let keep = a.project_id != id;
                            if !keep {
                                events.push(ChangeEvent::new(
                                    Collection::Analytics,
                                    ChangeKind::Delete,
                                    a.id,
                                    a.account_id,
                                ));
                            }
                            keep
                        });
                        t.requests.retain(|r| {
                            let keep = r.project_id != id;
                            if !keep {
                                events.push(ChangeEvent::new(
                                    Collection::ChatbotRequests,
                                    ChangeKind::Delete,
                                    r.id,
                                    r.account_id,
                                ));
                            }
                            keep
                        });
                    }
                }
                Collection::Chatbots => {
                    if let Some(index) = t.chatbots.iter().position(|c| c.id == id) {
                        let chatbot = t.chatbots.remove(index);
                        events.push(ChangeEvent::new(
                            collection,
                            ChangeKind::Delete,
                            id,
                            chatbot.account_id,
                        ));
                    }
                }
                Collection::Analytics => {
                    return Err(StoreError::with_code(
                        StoreErrorCode::InsufficientPrivilege,
                        "permission denied: analytics events are append-only",
                    ));
                }
                Collection::ChatbotRequests => {
                    if let Some(index) = t.requests.iter().position(|r| r.id == id) {
                        let request = t.requests.remove(index);
                        events.push(ChangeEvent::new(
                            collection,
                            ChangeKind::Delete,
                            id,
                            request.account_id,
                        ));
                    }
                }
            }
        }

        let removed = events
            .iter()
            .filter(|e| e.collection == collection)
            .count() as u64;
        self.emit_all(&events);
        Ok(removed)
    }

    async fn subscribe(
        &self,
        collection: Collection,
        scope: &AccountScope,
    ) -> StoreResult<ChangeSubscription> {
        Ok(self.registry.register(collection, *scope))
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> StoreResult<()> {
        self.registry.release(id);
        Ok(())
    }
}
