//! Test helper factories
//!
//! Provides convenience functions for creating rows with sensible defaults,
//! and a small seeded account used across controller and mutation tests.
#![allow(dead_code)]

use crate::store::*;
use chrono::Utc;
use uuid::Uuid;

// ============================================================================
// Row factories
// ============================================================================

pub fn client(account_id: Uuid, name: &str, email: &str, company: &str) -> Client {
    Client {
        id: Uuid::new_v4(),
        account_id,
        name: name.to_string(),
        email: email.to_string(),
        company: company.to_string(),
        phone: None,
        website: None,
        updated_at: Utc::now(),
    }
}

pub fn project(account_id: Uuid, client_id: Uuid, title: &str, status: &str) -> Project {
    let now = Utc::now();
    Project {
        id: Uuid::new_v4(),
        account_id,
        client_id,
        title: Some(title.to_string()),
        description: Some(format!("{} description", title)),
        project_type: Some("virtual_tour".to_string()),
        category: Some("real_estate".to_string()),
        tags: vec![],
        status: Some(status.to_string()),
        thumbnail_url: None,
        created_at: Some(now),
        updated_at: Some(now),
    }
}

pub fn chatbot(account_id: Uuid, project_id: Uuid, name: &str) -> Chatbot {
    Chatbot {
        id: Uuid::new_v4(),
        account_id,
        project_id,
        name: Some(name.to_string()),
        is_active: true,
        language: Some("en".to_string()),
        welcome_message: None,
        fallback_message: None,
        statistics: Some(ChatbotStatistics {
            total_conversations: 12,
            satisfaction_rate: 4.5,
        }),
    }
}

pub fn analytics_event(
    account_id: Uuid,
    project_id: Uuid,
    metric_type: MetricType,
    value: f64,
) -> AnalyticsEvent {
    AnalyticsEvent {
        id: Uuid::new_v4(),
        account_id,
        project_id,
        metric_type,
        metric_value: value,
        recorded_at: Utc::now(),
    }
}

pub fn request(account_id: Uuid, project_id: Uuid, chatbot_name: &str) -> ChatbotRequest {
    ChatbotRequest {
        id: Uuid::new_v4(),
        account_id,
        project_id,
        chatbot_name: chatbot_name.to_string(),
        chatbot_purpose: "Answer visitor questions".to_string(),
        target_audience: None,
        language: Some("en".to_string()),
        status: RequestStatus::Pending,
        priority: RequestPriority::Medium,
        admin_notes: None,
        chatbot_url: None,
        estimated_completion_date: None,
        created_at: Utc::now(),
        updated_at: None,
    }
}

pub fn creator(id: Uuid, agency_name: &str, is_admin: bool) -> Creator {
    Creator {
        id,
        agency_name: agency_name.to_string(),
        contact_email: format!("{}@agency.test", agency_name.to_lowercase().replace(' ', "")),
        is_admin,
    }
}

// ============================================================================
// Seeded account
// ============================================================================

/// A small account: one client ("Acme Corp") with three projects, one chatbot
/// and a handful of analytics events, plus a second client with one project.
pub struct SeededAccount {
    pub scope: AccountScope,
    pub acme: Client,
    pub globex: Client,
    pub acme_projects: Vec<Project>,
    pub globex_project: Project,
}

pub async fn seed_account(store: &dyn EntityStore) -> SeededAccount {
    let account_id = Uuid::new_v4();
    let acme = client(account_id, "Wile Coyote", "wile@acme.test", "Acme Corp");
    let globex = client(account_id, "Hank Scorpio", "hank@globex.test", "Globex");
    let acme_projects = vec![
        project(account_id, acme.id, "Acme Showroom", "active"),
        project(account_id, acme.id, "Acme Warehouse", "setup"),
        project(account_id, acme.id, "Desert Outpost", "completed"),
    ];
    let globex_project = project(account_id, globex.id, "Volcano Lair", "active");

    store.insert(Row::Client(acme.clone())).await.unwrap();
    store.insert(Row::Client(globex.clone())).await.unwrap();
    for p in &acme_projects {
        store.insert(Row::Project(p.clone())).await.unwrap();
    }
    store.insert(Row::Project(globex_project.clone())).await.unwrap();
    store
        .insert(Row::Chatbot(chatbot(account_id, acme_projects[0].id, "Roadrunner")))
        .await
        .unwrap();
    for (metric, value) in [
        (MetricType::View, 100.0),
        (MetricType::UniqueVisitor, 40.0),
        (MetricType::LeadGenerated, 5.0),
    ] {
        store
            .insert(Row::Analytics(analytics_event(
                account_id,
                acme_projects[0].id,
                metric,
                value,
            )))
            .await
            .unwrap();
    }

    SeededAccount {
        scope: AccountScope::new(account_id),
        acme,
        globex,
        acme_projects,
        globex_project,
    }
}
