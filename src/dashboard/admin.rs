//! Admin board for chatbot creation requests
//!
//! Cross-account view: every request joined with its project, the project's
//! client and the client's agency. Only administrators may load or edit it.

use super::mutations::{MutationOrchestrator, MutationOutcome};
use crate::error::{DashboardError, DashboardResult};
use crate::store::{
    ChatbotRequest, Client, Creator, EntityStore, Project, RequestPatch, RequestStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub const ADMIN_ONLY_MESSAGE: &str = "You don't have permission to access the admin panel.";

/// A request with the names the board displays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestView {
    pub request: ChatbotRequest,
    pub project_title: String,
    pub client_name: String,
    pub client_email: String,
    pub client_company: String,
    pub agency_name: String,
}

/// Request totals per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCounts {
    pub total: usize,
    pub pending: usize,
    pub in_review: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub cancelled: usize,
}

/// Parse a status selector; `"all"` yields `None`
pub fn parse_request_status(raw: &str) -> DashboardResult<Option<RequestStatus>> {
    let status = match raw.trim().to_ascii_lowercase().as_str() {
        "all" => return Ok(None),
        "pending" => RequestStatus::Pending,
        "in_review" => RequestStatus::InReview,
        "in_progress" => RequestStatus::InProgress,
        "completed" => RequestStatus::Completed,
        "cancelled" => RequestStatus::Cancelled,
        other => {
            return Err(DashboardError::Validation(format!(
                "Unknown request status: {}",
                other
            )))
        }
    };
    Ok(Some(status))
}

/// Inner-join requests with project, client and agency, newest first.
///
/// Requests whose chain does not fully resolve are left out.
pub fn join_requests(
    requests: &[ChatbotRequest],
    projects: &[Project],
    clients: &[Client],
    creators: &[Creator],
) -> Vec<RequestView> {
    let projects: HashMap<Uuid, &Project> = projects.iter().map(|p| (p.id, p)).collect();
    let clients: HashMap<Uuid, &Client> = clients.iter().map(|c| (c.id, c)).collect();
    let creators: HashMap<Uuid, &Creator> = creators.iter().map(|c| (c.id, c)).collect();

    let mut views: Vec<RequestView> = requests
        .iter()
        .filter_map(|request| {
            let project = projects.get(&request.project_id)?;
            let client = clients.get(&project.client_id)?;
            let Some(creator) = creators.get(&client.account_id) else {
                debug!(request_id = %request.id, "Request without agency, skipping");
                return None;
            };
            Some(RequestView {
                request: request.clone(),
                project_title: project.title.clone().unwrap_or_default(),
                client_name: client.name.clone(),
                client_email: client.email.clone(),
                client_company: client.company.clone(),
                agency_name: creator.agency_name.clone(),
            })
        })
        .collect();

    views.sort_by(|a, b| b.request.created_at.cmp(&a.request.created_at));
    views
}

/// Case-insensitive search over chatbot name, project title, client name and
/// agency name, plus an optional exact status
pub fn filter_requests(
    views: &[RequestView],
    search: &str,
    status: Option<RequestStatus>,
) -> Vec<RequestView> {
    let needle = search.trim().to_lowercase();
    views
        .iter()
        .filter(|v| status.map_or(true, |s| v.request.status == s))
        .filter(|v| {
            needle.is_empty()
                || [
                    &v.request.chatbot_name,
                    &v.project_title,
                    &v.client_name,
                    &v.agency_name,
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

pub fn count_requests(views: &[RequestView]) -> RequestCounts {
    let mut counts = RequestCounts {
        total: views.len(),
        ..Default::default()
    };
    for view in views {
        match view.request.status {
            RequestStatus::Pending => counts.pending += 1,
            RequestStatus::InReview => counts.in_review += 1,
            RequestStatus::InProgress => counts.in_progress += 1,
            RequestStatus::Completed => counts.completed += 1,
            RequestStatus::Cancelled => counts.cancelled += 1,
        }
    }
    counts
}

/// Loads and edits chatbot requests on behalf of an administrator
pub struct RequestBoard {
    store: Arc<dyn EntityStore>,
    mutations: MutationOrchestrator,
}

impl RequestBoard {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            mutations: MutationOrchestrator::new(store.clone()),
            store,
        }
    }

    async fn ensure_admin(&self, account_id: Uuid) -> DashboardResult<()> {
        match self.store.is_admin(account_id).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!(%account_id, "Non-admin account tried to use the request board");
                Err(DashboardError::Permission(ADMIN_ONLY_MESSAGE.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Every request across all accounts, newest first
    pub async fn load(&self, admin_id: Uuid) -> DashboardResult<Vec<RequestView>> {
        self.ensure_admin(admin_id).await?;
        let (requests, projects, clients, creators) = tokio::try_join!(
            self.store.fetch_all_requests(),
            self.store.fetch_all_projects(),
            self.store.fetch_all_clients(),
            self.store.fetch_creators(),
        )?;
        Ok(join_requests(&requests, &projects, &clients, &creators))
    }

    /// Update status, notes, delivery URL or estimated date of a request
    pub async fn update(
        &self,
        admin_id: Uuid,
        request_id: Uuid,
        patch: &RequestPatch,
    ) -> DashboardResult<(MutationOutcome, Option<ChatbotRequest>)> {
        self.ensure_admin(admin_id).await?;
        self.mutations.update_request(request_id, patch).await
    }
}
