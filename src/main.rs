//! Agency Dashboard - command line front end
//!
//! Loads a fixture into the in-memory store, mounts the dashboard for one
//! account and runs a query or mutation against it.

use agency_dashboard::dashboard::admin::{count_requests, filter_requests, parse_request_status};
use agency_dashboard::dashboard::{
    ClientFields, DashboardController, DashboardView, MutationOutcome, RequestBoard, StatusFilter,
};
use agency_dashboard::store::{AccountScope, Fixture, MemoryStore, RequestPatch};
use agency_dashboard::Config;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "dashboard")]
#[command(about = "Agency dashboard aggregation engine")]
struct Cli {
    /// Path to config.yaml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Fixture file (overrides config)
    #[arg(long, global = true)]
    fixture: Option<PathBuf>,

    /// Account to mount (overrides config)
    #[arg(long, global = true)]
    account: Option<Uuid>,

    /// Save the store back to the fixture after a mutation
    #[arg(long, global = true)]
    write_back: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the filtered project views and account totals as JSON
    Snapshot {
        #[arg(short, long, default_value = "")]
        search: String,

        /// all | setup | active | completed | inactive
        #[arg(long, default_value = "all")]
        status: StatusFilter,
    },

    /// Delete a client and every project it owns
    DeleteClient { id: Uuid },

    /// Delete a single project
    DeleteProject { id: Uuid },

    /// Update a client's contact details
    UpdateClient {
        id: Uuid,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        company: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        website: String,
    },

    /// List chatbot requests across all accounts (admin only)
    Requests {
        #[arg(long)]
        admin: Uuid,
        #[arg(short, long, default_value = "")]
        search: String,
        /// all | pending | in_review | in_progress | completed | cancelled
        #[arg(long, default_value = "all")]
        status: String,
    },

    /// Edit a chatbot request (admin only)
    UpdateRequest {
        id: Uuid,
        #[arg(long)]
        admin: Uuid,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        url: Option<String>,
    },
}

#[derive(Serialize)]
struct MutationOutput<'a> {
    outcome: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a agency_dashboard::dashboard::MutationReport>,
    view: &'a DashboardView,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing; stdout is reserved for JSON output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,agency_dashboard=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_yaml_and_env(cli.config.as_deref())?;
    let fixture_path = cli.fixture.clone().unwrap_or(config.fixture_path.clone());

    let store = Arc::new(MemoryStore::from_fixture(load_fixture(&fixture_path)?));

    match cli.command {
        Commands::Requests {
            admin,
            search,
            status,
        } => {
            let status = parse_request_status(&status)?;
            let board = RequestBoard::new(store.clone());
            let all = board.load(admin).await?;
            let items = filter_requests(&all, &search, status);
            print_json(&serde_json::json!({
                "counts": count_requests(&all),
                "items": items,
            }))
        }
        Commands::UpdateRequest {
            id,
            admin,
            status,
            notes,
            url,
        } => {
            let status = match status {
                Some(raw) => match parse_request_status(&raw)? {
                    Some(status) => Some(status),
                    None => bail!("--status must name a single status"),
                },
                None => None,
            };
            let patch = RequestPatch {
                status,
                admin_notes: notes,
                chatbot_url: url,
                estimated_completion_date: None,
            };
            let board = RequestBoard::new(store.clone());
            let (_, updated) = board.update(admin, id, &patch).await?;
            if cli.write_back {
                save_fixture(&fixture_path, &store.to_fixture().await)?;
            }
            print_json(&updated)
        }
        command => {
            let account = cli
                .account
                .or(config.account_id)
                .context("no account given: pass --account or set DASHBOARD_ACCOUNT_ID")?;
            let controller =
                DashboardController::new(store.clone(), config.controller_options());
            controller.mount(AccountScope::new(account)).await?;

            let result = run_dashboard_command(&controller, command).await;
            controller.shutdown().await;
            let mutated = result?;

            if mutated && cli.write_back {
                save_fixture(&fixture_path, &store.to_fixture().await)?;
                tracing::info!("Fixture written to {}", fixture_path.display());
            }
            Ok(())
        }
    }
}

/// Run a command against the mounted dashboard. Returns true if it mutated the store.
async fn run_dashboard_command(controller: &DashboardController, command: Commands) -> Result<bool> {
    let outcome = match command {
        Commands::Snapshot { search, status } => {
            controller.set_search(search).await;
            controller.set_status_filter(status).await;
            print_json(&controller.view().await)?;
            return Ok(false);
        }
        Commands::DeleteClient { id } => controller.delete_client(id).await?,
        Commands::DeleteProject { id } => controller.delete_project(id).await?,
        Commands::UpdateClient {
            id,
            name,
            email,
            company,
            phone,
            website,
        } => {
            let fields = ClientFields {
                name,
                email,
                company,
                phone,
                website,
            };
            controller.update_client(id, &fields).await?
        }
        Commands::Requests { .. } | Commands::UpdateRequest { .. } => {
            bail!("admin commands do not mount an account")
        }
    };

    let view = controller.view().await;
    let output = MutationOutput {
        outcome: match &outcome {
            MutationOutcome::Completed(_) => "completed",
            MutationOutcome::AlreadyInFlight => "already_in_flight",
        },
        report: outcome.report(),
        view: &view,
    };
    print_json(&output)?;
    Ok(true)
}

fn load_fixture(path: &Path) -> Result<Fixture> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read fixture {}", path.display()))?;
    let fixture = if is_json(path) {
        serde_json::from_str(&contents)?
    } else {
        serde_yaml::from_str(&contents)?
    };
    Ok(fixture)
}

fn save_fixture(path: &Path, fixture: &Fixture) -> Result<()> {
    let contents = if is_json(path) {
        serde_json::to_string_pretty(fixture)?
    } else {
        serde_yaml::to_string(fixture)?
    };
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write fixture {}", path.display()))
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
