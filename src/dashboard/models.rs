//! Derived view models built from raw store rows

use crate::store::{Client, ProjectStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client as shown on a project card; always resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub company: String,
    pub phone: Option<String>,
    pub website: Option<String>,
}

impl From<&Client> for ClientSummary {
    fn from(client: &Client) -> Self {
        Self {
            id: client.id,
            name: client.name.clone(),
            email: client.email.clone(),
            company: client.company.clone(),
            phone: client.phone.clone(),
            website: client.website.clone(),
        }
    }
}

/// Project fields with every required value filled in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub title: String,
    pub description: String,
    pub project_type: String,
    pub category: String,
    pub tags: Vec<String>,
    pub status: ProjectStatus,
    pub thumbnail_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The project's primary chatbot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatbotSummary {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub conversations: u64,
    pub satisfaction: f64,
    pub language: String,
    pub welcome_message: String,
    pub fallback_message: String,
}

/// Metrics summed from a project's analytics events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetrics {
    pub total_views: f64,
    pub unique_visitors: f64,
    /// Seconds of recorded time spent; 0 without time-spent events
    pub avg_session_duration: f64,
    pub conversions: f64,
    /// Percentage with two decimals; 0 when there are no views
    pub conversion_rate: f64,
}

impl ProjectMetrics {
    /// Session duration rendered as `"{minutes}m {seconds}s"`
    pub fn session_duration_display(&self) -> String {
        format_duration(self.avg_session_duration)
    }
}

/// Render whole minutes and seconds, e.g. `"2m 5s"`
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0m 0s".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{}m {}s", total / 60, total % 60)
}

/// Composite per-project record consumed by the presentation layer.
///
/// Rebuilt on every refresh and replaced wholesale; never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedProjectView {
    pub id: Uuid,
    pub client: ClientSummary,
    pub project: ProjectSummary,
    pub chatbot: Option<ChatbotSummary>,
    pub analytics: ProjectMetrics,
    pub last_activity: DateTime<Utc>,
}
