//! View-model aggregation
//!
//! Joins the four raw collections into one `AggregatedProjectView` per
//! project. Every secondary collection is indexed by project or client id
//! once, so a pass is linear in the total number of rows.

use super::models::*;
use crate::store::{
    AnalyticsEvent, Chatbot, Client, MetricType, Project, ProjectStatus, RawCollections,
};
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

pub const DEFAULT_TITLE: &str = "Untitled Project";
pub const DEFAULT_PROJECT_TYPE: &str = "Virtual Tour";
pub const DEFAULT_CATEGORY: &str = "other";
pub const DEFAULT_THUMBNAIL: &str =
    "https://images.unsplash.com/photo-1497366216548-37526070297c?w=400";
pub const DEFAULT_CHATBOT_NAME: &str = "Assistant";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_WELCOME: &str = "Hello! How can I help you today?";
pub const DEFAULT_FALLBACK: &str = "I apologize, but I need more information to help you.";

/// Running sums for one project
#[derive(Debug, Default, Clone, Copy)]
struct MetricTotals {
    views: f64,
    unique_visitors: f64,
    time_spent: f64,
    conversions: f64,
}

impl MetricTotals {
    fn add(&mut self, event: &AnalyticsEvent) {
        // Negative or non-finite values count as zero
        let value = if event.metric_value.is_finite() {
            event.metric_value.max(0.0)
        } else {
            0.0
        };
        match event.metric_type {
            MetricType::View => self.views += value,
            MetricType::UniqueVisitor => self.unique_visitors += value,
            MetricType::TimeSpent => self.time_spent += value,
            MetricType::LeadGenerated => self.conversions += value,
        }
    }

    fn into_metrics(self) -> ProjectMetrics {
        let conversion_rate = if self.views > 0.0 {
            round2(self.conversions / self.views * 100.0)
        } else {
            0.0
        };
        ProjectMetrics {
            total_views: self.views,
            unique_visitors: self.unique_visitors,
            avg_session_duration: self.time_spent,
            conversions: self.conversions,
            conversion_rate,
        }
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Build one view per project whose client resolves.
///
/// Pure: the same input always yields the same output, in project order.
/// Projects pointing at a missing client are dropped with a warning.
pub fn aggregate(raw: &RawCollections) -> Vec<AggregatedProjectView> {
    let mut clients: HashMap<Uuid, &Client> = HashMap::with_capacity(raw.clients.len());
    for client in &raw.clients {
        clients.entry(client.id).or_insert(client);
    }

    // First chatbot seen per project is the primary one
    let mut chatbots: HashMap<Uuid, &Chatbot> = HashMap::with_capacity(raw.chatbots.len());
    for bot in &raw.chatbots {
        chatbots.entry(bot.project_id).or_insert(bot);
    }

    let mut totals: HashMap<Uuid, MetricTotals> = HashMap::new();
    for event in &raw.analytics {
        totals.entry(event.project_id).or_default().add(event);
    }

    let views: Vec<AggregatedProjectView> = raw
        .projects
        .iter()
        .filter_map(|project| {
            let Some(client) = clients.get(&project.client_id) else {
                warn!(
                    project_id = %project.id,
                    client_id = %project.client_id,
                    "Skipping project whose client could not be resolved"
                );
                return None;
            };
            Some(build_view(
                project,
                client,
                chatbots.get(&project.id).copied(),
                totals.get(&project.id).copied().unwrap_or_default(),
            ))
        })
        .collect();

    debug!(
        projects = raw.projects.len(),
        views = views.len(),
        "Aggregated dashboard views"
    );
    views
}

fn build_view(
    project: &Project,
    client: &Client,
    chatbot: Option<&Chatbot>,
    totals: MetricTotals,
) -> AggregatedProjectView {
    let project_type = project
        .project_type
        .as_deref()
        .map(title_case)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_PROJECT_TYPE.to_string());

    let title = non_empty(project.title.as_deref()).unwrap_or(DEFAULT_TITLE);
    let description = non_empty(project.description.as_deref())
        .map(str::to_string)
        .unwrap_or_else(|| format!("A {} project", project_type));

    let created_at = project.created_at.unwrap_or(client.updated_at);
    let updated_at = project.updated_at.unwrap_or(created_at);

    let summary = ProjectSummary {
        title: title.to_string(),
        description,
        project_type,
        category: non_empty(project.category.as_deref())
            .unwrap_or(DEFAULT_CATEGORY)
            .to_string(),
        tags: project.tags.clone(),
        status: project
            .status
            .as_deref()
            .and_then(ProjectStatus::parse)
            .unwrap_or_default(),
        thumbnail_url: non_empty(project.thumbnail_url.as_deref())
            .unwrap_or(DEFAULT_THUMBNAIL)
            .to_string(),
        created_at,
        updated_at,
    };

    AggregatedProjectView {
        id: project.id,
        client: ClientSummary::from(client),
        chatbot: chatbot.map(summarize_chatbot),
        analytics: totals.into_metrics(),
        last_activity: updated_at,
        project: summary,
    }
}

fn summarize_chatbot(bot: &Chatbot) -> ChatbotSummary {
    let stats = bot.statistics.clone().unwrap_or_default();
    ChatbotSummary {
        id: bot.id,
        name: non_empty(bot.name.as_deref())
            .unwrap_or(DEFAULT_CHATBOT_NAME)
            .to_string(),
        is_active: bot.is_active,
        conversations: stats.total_conversations,
        satisfaction: if stats.satisfaction_rate.is_finite() {
            stats.satisfaction_rate
        } else {
            0.0
        },
        language: non_empty(bot.language.as_deref())
            .unwrap_or(DEFAULT_LANGUAGE)
            .to_string(),
        welcome_message: non_empty(bot.welcome_message.as_deref())
            .unwrap_or(DEFAULT_WELCOME)
            .to_string(),
        fallback_message: non_empty(bot.fallback_message.as_deref())
            .unwrap_or(DEFAULT_FALLBACK)
            .to_string(),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// `"virtual_tour"` -> `"Virtual Tour"`
fn title_case(raw: &str) -> String {
    raw.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
