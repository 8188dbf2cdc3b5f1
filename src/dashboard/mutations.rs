//! Mutation orchestration
//!
//! Serialises writes per entity: while a mutation on `(kind, id)` is in
//! flight, repeating the same mutation returns
//! [`MutationOutcome::AlreadyInFlight`] and a different one (an edit during a
//! delete) fails with `Conflict`. Neither touches the store.
//!
//! Deleting a client is a two-step, non-atomic operation. The client's
//! projects are deleted first, concurrently; their failures are logged and
//! reported but do not abort the client delete, which is issued exactly once
//! after every project delete has settled.

use super::validation::{normalize_client_fields, validate_client_fields, ClientFields};
use crate::error::{DashboardError, DashboardResult};
use crate::store::{AccountScope, ChatbotRequest, Client, Collection, EntityStore, RequestPatch};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const NO_CLIENT_UPDATED_MESSAGE: &str = "No client was updated. The client may not exist or you may not have permission to update it.";

/// Entity kind used in the busy-set key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Client,
    Project,
    Request,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    DeleteClient,
    DeleteProject,
    UpdateClient,
    UpdateRequest,
}

/// A dependent row that could not be removed during a cascading delete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeFailure {
    /// `None` when the dependent rows could not even be listed
    pub project_id: Option<Uuid>,
    pub message: String,
}

/// Result of a completed mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationReport {
    pub kind: MutationKind,
    pub entity_id: Uuid,
    /// Human-readable success message
    pub message: String,
    /// Dependent projects removed before the client
    #[serde(default)]
    pub cascaded: usize,
    #[serde(default)]
    pub cascade_failures: Vec<CascadeFailure>,
    /// Always false for client deletes: step 1 and step 2 are separate writes
    pub atomic: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    Completed(MutationReport),
    /// The same entity already has a mutation in flight; nothing was sent
    AlreadyInFlight,
}

impl MutationOutcome {
    pub fn report(&self) -> Option<&MutationReport> {
        match self {
            MutationOutcome::Completed(report) => Some(report),
            MutationOutcome::AlreadyInFlight => None,
        }
    }
}

/// Removes its key from the busy set when dropped
struct BusyGuard<'a> {
    set: &'a DashMap<(EntityKind, Uuid), MutationKind>,
    key: (EntityKind, Uuid),
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.key);
    }
}

/// Issues writes against the store on behalf of the dashboard
pub struct MutationOrchestrator {
    store: Arc<dyn EntityStore>,
    in_flight: DashMap<(EntityKind, Uuid), MutationKind>,
}

impl MutationOrchestrator {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            in_flight: DashMap::new(),
        }
    }

    /// True while a mutation on this entity is running
    pub fn is_busy(&self, kind: EntityKind, id: Uuid) -> bool {
        self.in_flight.contains_key(&(kind, id))
    }

    /// `Ok(None)` when the same mutation is already running on this entity
    fn try_acquire(
        &self,
        kind: EntityKind,
        id: Uuid,
        mutation: MutationKind,
    ) -> DashboardResult<Option<BusyGuard<'_>>> {
        let key = (kind, id);
        match self.in_flight.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(mutation);
            }
            Entry::Occupied(running) if *running.get() == mutation => {
                debug!(?mutation, %id, "Mutation already in flight, ignoring duplicate request");
                return Ok(None);
            }
            Entry::Occupied(running) => {
                let running = *running.get();
                warn!(?mutation, ?running, %id, "Another mutation is in flight on this entity");
                return Err(DashboardError::Conflict(format!(
                    "{:?} is still in progress for {}",
                    running, id
                )));
            }
        }
        Ok(Some(BusyGuard {
            set: &self.in_flight,
            key,
        }))
    }

    // ========================================================================
    // Deletes
    // ========================================================================

    /// Delete every project of the client, then the client itself
    pub async fn delete_client(
        &self,
        scope: &AccountScope,
        client_id: Uuid,
    ) -> DashboardResult<MutationOutcome> {
        let Some(_guard) =
            self.try_acquire(EntityKind::Client, client_id, MutationKind::DeleteClient)?
        else {
            return Ok(MutationOutcome::AlreadyInFlight);
        };

        let mut cascaded = 0;
        let mut failures = Vec::new();

        // Step 1: dependent projects
        match self.store.fetch_projects(scope).await {
            Ok(projects) => {
                let targets: Vec<Uuid> = projects
                    .iter()
                    .filter(|p| p.client_id == client_id)
                    .map(|p| p.id)
                    .collect();
                let results = join_all(
                    targets
                        .iter()
                        .map(|id| self.store.delete(Collection::Projects, *id)),
                )
                .await;
                for (project_id, result) in targets.iter().zip(results) {
                    match result {
                        Ok(_) => cascaded += 1,
                        Err(e) => {
                            warn!(
                                %client_id,
                                %project_id,
                                error = %e,
                                "Failed to delete project while deleting client"
                            );
                            failures.push(CascadeFailure {
                                project_id: Some(*project_id),
                                message: e.message,
                            });
                        }
                    }
                }
            }
            Err(e) => {
                warn!(
                    %client_id,
                    error = %e,
                    "Could not list projects for client; deleting client anyway"
                );
                failures.push(CascadeFailure {
                    project_id: None,
                    message: e.message,
                });
            }
        }

        // Step 2: the client row, exactly once
        let removed = self.store.delete(Collection::Clients, client_id).await?;
        if removed == 0 {
            return Err(DashboardError::NotFound(format!(
                "client {} not found",
                client_id
            )));
        }

        let message = if failures.is_empty() {
            "The client and all associated projects have been permanently removed."
        } else {
            "The client was removed, but some of its projects could not be deleted."
        };
        info!(
            %client_id,
            cascaded,
            failed = failures.len(),
            "Client deleted"
        );

        Ok(MutationOutcome::Completed(MutationReport {
            kind: MutationKind::DeleteClient,
            entity_id: client_id,
            message: message.to_string(),
            cascaded,
            cascade_failures: failures,
            atomic: false,
        }))
    }

    /// Delete a single project; related chatbots and analytics go with it
    pub async fn delete_project(&self, project_id: Uuid) -> DashboardResult<MutationOutcome> {
        let Some(_guard) =
            self.try_acquire(EntityKind::Project, project_id, MutationKind::DeleteProject)?
        else {
            return Ok(MutationOutcome::AlreadyInFlight);
        };

        let removed = self.store.delete(Collection::Projects, project_id).await?;
        if removed == 0 {
            return Err(DashboardError::NotFound(format!(
                "project {} not found",
                project_id
            )));
        }
        info!(%project_id, "Project deleted");

        Ok(MutationOutcome::Completed(MutationReport {
            kind: MutationKind::DeleteProject,
            entity_id: project_id,
            message: "The project and its related data were removed successfully.".to_string(),
            cascaded: 0,
            cascade_failures: Vec::new(),
            atomic: true,
        }))
    }

    // ========================================================================
    // Updates
    // ========================================================================

    /// Validate, normalise and write client fields.
    ///
    /// Validation failures return before any store call.
    pub async fn update_client(
        &self,
        client_id: Uuid,
        fields: &ClientFields,
    ) -> DashboardResult<(MutationOutcome, Option<Client>)> {
        validate_client_fields(fields)?;
        let Some(_guard) =
            self.try_acquire(EntityKind::Client, client_id, MutationKind::UpdateClient)?
        else {
            return Ok((MutationOutcome::AlreadyInFlight, None));
        };

        let patch = normalize_client_fields(fields, Utc::now());
        let updated = self
            .store
            .update_client(client_id, &patch)
            .await?
            .ok_or_else(|| DashboardError::NotFound(NO_CLIENT_UPDATED_MESSAGE.to_string()))?;
        info!(%client_id, "Client updated");

        let report = MutationReport {
            kind: MutationKind::UpdateClient,
            entity_id: client_id,
            message: format!("{}'s data has been updated successfully.", updated.name),
            cascaded: 0,
            cascade_failures: Vec::new(),
            atomic: true,
        };
        Ok((MutationOutcome::Completed(report), Some(updated)))
    }

    /// Apply an admin edit to a chatbot request
    pub async fn update_request(
        &self,
        request_id: Uuid,
        patch: &RequestPatch,
    ) -> DashboardResult<(MutationOutcome, Option<ChatbotRequest>)> {
        let Some(_guard) =
            self.try_acquire(EntityKind::Request, request_id, MutationKind::UpdateRequest)?
        else {
            return Ok((MutationOutcome::AlreadyInFlight, None));
        };

        let updated = self
            .store
            .update_request(request_id, patch)
            .await?
            .ok_or_else(|| {
                DashboardError::NotFound(format!("chatbot request {} not found", request_id))
            })?;
        info!(%request_id, status = updated.status.as_str(), "Chatbot request updated");

        let report = MutationReport {
            kind: MutationKind::UpdateRequest,
            entity_id: request_id,
            message: "Request updated successfully.".to_string(),
            cascaded: 0,
            cascade_failures: Vec::new(),
            atomic: true,
        };
        Ok((MutationOutcome::Completed(report), Some(updated)))
    }
}
