//! Dashboard engine: aggregation, filtering, mutations and the controller
//! that ties them to live store changes.

pub mod admin;
mod aggregator;
mod controller;
mod filter;
pub mod models;
mod mutations;
mod stats;
pub mod validation;

pub use admin::{RequestBoard, RequestCounts, RequestView};
pub use aggregator::aggregate;
pub use controller::{
    ControllerOptions, DashboardController, DashboardView, ErrorReport, LoadStatus,
};
pub use filter::{filter_views, StatusFilter};
pub use models::*;
pub use mutations::{
    CascadeFailure, EntityKind, MutationKind, MutationOrchestrator, MutationOutcome,
    MutationReport,
};
pub use stats::{compute_stats, DashboardStats};
pub use validation::ClientFields;
