//! Account-wide totals shown above the project list

use super::aggregator::round2;
use super::models::AggregatedProjectView;
use crate::store::ProjectStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_projects: usize,
    pub total_views: f64,
    pub total_visitors: f64,
    pub active_projects: usize,
    pub total_chatbots: usize,
    pub total_conversations: u64,
    /// Mean chatbot satisfaction over all projects; projects without a chatbot count as 0
    pub avg_satisfaction: f64,
    /// Mean of per-project conversion rates, 0 when the account has no views
    pub conversion_rate: f64,
}

/// Compute totals over the unfiltered view list
pub fn compute_stats(views: &[AggregatedProjectView]) -> DashboardStats {
    let mut stats = DashboardStats {
        total_projects: views.len(),
        ..Default::default()
    };
    let mut satisfaction = 0.0;
    let mut rates = 0.0;

    for view in views {
        stats.total_views += view.analytics.total_views;
        stats.total_visitors += view.analytics.unique_visitors;
        rates += view.analytics.conversion_rate;
        if view.project.status == ProjectStatus::Active {
            stats.active_projects += 1;
        }
        if let Some(bot) = &view.chatbot {
            stats.total_chatbots += 1;
            stats.total_conversations += bot.conversations;
            satisfaction += bot.satisfaction;
        }
    }

    if !views.is_empty() {
        let n = views.len() as f64;
        stats.avg_satisfaction = round2(satisfaction / n);
        if stats.total_views > 0.0 {
            stats.conversion_rate = round2(rates / n);
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::aggregate;
    use crate::store::{MetricType, RawCollections};
    use crate::test_helpers::*;
    use uuid::Uuid;

    #[test]
    fn test_empty_list_is_all_zero() {
        assert_eq!(compute_stats(&[]), DashboardStats::default());
    }

    #[test]
    fn test_totals_over_projects() {
        let account = Uuid::new_v4();
        let acme = client(account, "Wile Coyote", "wile@acme.test", "Acme Corp");
        let showroom = project(account, acme.id, "Acme Showroom", "active");
        let warehouse = project(account, acme.id, "Acme Warehouse", "setup");
        let raw = RawCollections {
            analytics: vec![
                analytics_event(account, showroom.id, MetricType::View, 100.0),
                analytics_event(account, showroom.id, MetricType::UniqueVisitor, 40.0),
                analytics_event(account, showroom.id, MetricType::LeadGenerated, 5.0),
            ],
            chatbots: vec![chatbot(account, showroom.id, "Roadrunner")],
            projects: vec![showroom, warehouse],
            clients: vec![acme],
        };

        let stats = compute_stats(&aggregate(&raw));
        assert_eq!(stats.total_projects, 2);
        assert_eq!(stats.total_views, 100.0);
        assert_eq!(stats.total_visitors, 40.0);
        assert_eq!(stats.active_projects, 1);
        assert_eq!(stats.total_chatbots, 1);
        assert_eq!(stats.total_conversations, 12);
        // 4.5 satisfaction on one of two projects
        assert_eq!(stats.avg_satisfaction, 2.25);
        // (5.0 + 0.0) / 2
        assert_eq!(stats.conversion_rate, 2.5);
    }
}
