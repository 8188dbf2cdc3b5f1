//! Raw row models as returned by the entity store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Collections and scope
// ============================================================================

/// A named collection in the backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Clients,
    Projects,
    Chatbots,
    Analytics,
    ChatbotRequests,
}

impl Collection {
    /// The four collections the dashboard listens to
    pub const WATCHED: [Collection; 4] = [
        Collection::Projects,
        Collection::Clients,
        Collection::Chatbots,
        Collection::Analytics,
    ];

    /// Table name used by the store
    pub fn table_name(&self) -> &'static str {
        match self {
            Collection::Clients => "end_clients",
            Collection::Projects => "projects",
            Collection::Chatbots => "chatbots",
            Collection::Analytics => "analytics",
            Collection::ChatbotRequests => "chatbot_requests",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// The data scope of one creator account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountScope {
    pub account_id: Uuid,
}

impl AccountScope {
    pub fn new(account_id: Uuid) -> Self {
        Self { account_id }
    }
}

impl fmt::Display for AccountScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "account:{}", self.account_id)
    }
}

// ============================================================================
// Creator (agency account)
// ============================================================================

/// A creator account (the agency owning clients)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creator {
    pub id: Uuid,
    pub agency_name: String,
    pub contact_email: String,
    #[serde(default)]
    pub is_admin: bool,
}

// ============================================================================
// Client
// ============================================================================

/// An end client of the agency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub email: String,
    pub company: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Normalised field set written by a client update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientPatch {
    pub name: String,
    pub email: String,
    pub company: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Project
// ============================================================================

/// A tour project as stored; textual fields may be missing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub account_id: Uuid,
    pub client_id: Uuid,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub project_type: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Raw status string; unknown values fall back to `setup` on aggregation
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Project lifecycle status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Setup,
    Active,
    Completed,
    Inactive,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Setup => "setup",
            ProjectStatus::Active => "active",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Inactive => "inactive",
        }
    }

    /// Parse a raw status string (case-insensitive, surrounding whitespace ignored)
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "setup" => Some(ProjectStatus::Setup),
            "active" => Some(ProjectStatus::Active),
            "completed" => Some(ProjectStatus::Completed),
            "inactive" => Some(ProjectStatus::Inactive),
            _ => None,
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Chatbot
// ============================================================================

/// Usage statistics embedded in a chatbot row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatbotStatistics {
    #[serde(default)]
    pub total_conversations: u64,
    #[serde(default)]
    pub satisfaction_rate: f64,
}

/// A chatbot attached to a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chatbot {
    pub id: Uuid,
    pub account_id: Uuid,
    pub project_id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub welcome_message: Option<String>,
    #[serde(default)]
    pub fallback_message: Option<String>,
    #[serde(default)]
    pub statistics: Option<ChatbotStatistics>,
}

// ============================================================================
// Analytics
// ============================================================================

/// Metric recorded by an analytics event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    View,
    UniqueVisitor,
    TimeSpent,
    LeadGenerated,
}

/// Append-only analytics event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub id: Uuid,
    pub account_id: Uuid,
    pub project_id: Uuid,
    pub metric_type: MetricType,
    pub metric_value: f64,
    pub recorded_at: DateTime<Utc>,
}

// ============================================================================
// Chatbot requests (admin board)
// ============================================================================

/// Processing status of a chatbot creation request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    InReview,
    InProgress,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::InReview => "in_review",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        }
    }
}

/// Priority of a chatbot creation request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// A request from a creator asking the admins to build a chatbot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatbotRequest {
    pub id: Uuid,
    pub account_id: Uuid,
    pub project_id: Uuid,
    pub chatbot_name: String,
    #[serde(default)]
    pub chatbot_purpose: String,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub status: RequestStatus,
    #[serde(default)]
    pub priority: RequestPriority,
    #[serde(default)]
    pub admin_notes: Option<String>,
    #[serde(default)]
    pub chatbot_url: Option<String>,
    #[serde(default)]
    pub estimated_completion_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Admin-side edit of a chatbot request; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestPatch {
    #[serde(default)]
    pub status: Option<RequestStatus>,
    #[serde(default)]
    pub admin_notes: Option<String>,
    #[serde(default)]
    pub chatbot_url: Option<String>,
    /// `Some(None)` clears the date
    #[serde(default)]
    pub estimated_completion_date: Option<Option<DateTime<Utc>>>,
}

// ============================================================================
// Generic row and snapshot
// ============================================================================

/// Any insertable row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "collection", content = "row", rename_all = "snake_case")]
pub enum Row {
    Client(Client),
    Project(Project),
    Chatbot(Chatbot),
    Analytics(AnalyticsEvent),
    ChatbotRequest(ChatbotRequest),
}

impl Row {
    pub fn collection(&self) -> Collection {
        match self {
            Row::Client(_) => Collection::Clients,
            Row::Project(_) => Collection::Projects,
            Row::Chatbot(_) => Collection::Chatbots,
            Row::Analytics(_) => Collection::Analytics,
            Row::ChatbotRequest(_) => Collection::ChatbotRequests,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Row::Client(c) => c.id,
            Row::Project(p) => p.id,
            Row::Chatbot(c) => c.id,
            Row::Analytics(a) => a.id,
            Row::ChatbotRequest(r) => r.id,
        }
    }

    pub fn account_id(&self) -> Uuid {
        match self {
            Row::Client(c) => c.account_id,
            Row::Project(p) => p.account_id,
            Row::Chatbot(c) => c.account_id,
            Row::Analytics(a) => a.account_id,
            Row::ChatbotRequest(r) => r.account_id,
        }
    }
}

/// The four raw collections of one account, in store order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCollections {
    #[serde(default)]
    pub clients: Vec<Client>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub chatbots: Vec<Chatbot>,
    #[serde(default)]
    pub analytics: Vec<AnalyticsEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_status_parse_is_lenient() {
        assert_eq!(ProjectStatus::parse("active"), Some(ProjectStatus::Active));
        assert_eq!(ProjectStatus::parse(" Completed "), Some(ProjectStatus::Completed));
        assert_eq!(ProjectStatus::parse("archived"), None);
        assert_eq!(ProjectStatus::parse(""), None);
    }

    #[test]
    fn test_metric_type_snake_case() {
        assert_eq!(
            serde_json::to_string(&MetricType::UniqueVisitor).unwrap(),
            "\"unique_visitor\""
        );
        let parsed: MetricType = serde_json::from_str("\"lead_generated\"").unwrap();
        assert_eq!(parsed, MetricType::LeadGenerated);
    }

    #[test]
    fn test_row_reports_collection_and_owner() {
        let account = Uuid::new_v4();
        let row = Row::Client(Client {
            id: Uuid::new_v4(),
            account_id: account,
            name: "Ada".into(),
            email: "ada@example.com".into(),
            company: "Acme".into(),
            phone: None,
            website: None,
            updated_at: Utc::now(),
        });
        assert_eq!(row.collection(), Collection::Clients);
        assert_eq!(row.account_id(), account);
    }

    #[test]
    fn test_project_deserializes_with_missing_fields() {
        let json = format!(
            r#"{{"id":"{}","account_id":"{}","client_id":"{}"}}"#,
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        let project: Project = serde_json::from_str(&json).unwrap();
        assert!(project.title.is_none());
        assert!(project.tags.is_empty());
        assert!(project.status.is_none());
    }
}
