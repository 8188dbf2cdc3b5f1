//! Search and status filtering over aggregated views

use super::models::AggregatedProjectView;
use crate::error::DashboardError;
use crate::store::ProjectStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status selector; `All` disables status filtering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StatusFilter {
    #[default]
    All,
    Only(ProjectStatus),
}

impl StatusFilter {
    pub fn matches(&self, status: ProjectStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => *wanted == status,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => f.write_str("all"),
            StatusFilter::Only(status) => f.write_str(status.as_str()),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        ProjectStatus::parse(s)
            .map(StatusFilter::Only)
            .ok_or_else(|| DashboardError::Validation(format!("Unknown project status: {}", s)))
    }
}

impl TryFrom<String> for StatusFilter {
    type Error = DashboardError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StatusFilter> for String {
    fn from(filter: StatusFilter) -> Self {
        filter.to_string()
    }
}

/// True when the view matches both the search term and the status filter.
///
/// `needle` must already be lowercased; an empty needle matches everything.
fn matches(view: &AggregatedProjectView, needle: &str, status: StatusFilter) -> bool {
    if !status.matches(view.project.status) {
        return false;
    }
    needle.is_empty()
        || [
            view.client.name.as_str(),
            view.client.company.as_str(),
            view.project.title.as_str(),
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

/// Filter views by a case-insensitive substring over client name, client
/// company and project title, plus an exact status match. Input order is kept.
pub fn filter_views(
    views: &[AggregatedProjectView],
    search: &str,
    status: StatusFilter,
) -> Vec<AggregatedProjectView> {
    let needle = search.trim().to_lowercase();
    views
        .iter()
        .filter(|view| matches(view, &needle, status))
        .cloned()
        .collect()
}
