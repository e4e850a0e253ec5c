//! `envguard` CLI: check bookings and refresh intents against each other.
//!
//! ## Usage
//!
//! ```sh
//! # Create the database and load the environment inventory
//! envguard init --inventory inventory.json
//!
//! # Check (and optionally create) a booking
//! envguard check-booking -r EnvironmentInstance/int-x \
//!     --start 2026-03-16T09:00:00Z --end 2026-03-16T11:00:00Z \
//!     --create --owner alice --acknowledge
//!
//! # Check (and optionally create) a refresh intent
//! envguard check-refresh --entity Environment/int --impact DATA_OVERWRITE \
//!     --start 2026-03-16T12:00:00Z --create
//!
//! # List, inspect and resolve conflicts
//! envguard conflicts --severity HIGH
//! envguard show <conflict-id>
//! envguard resolve <conflict-id> --status ACKNOWLEDGED --resolver bob
//!
//! # Free slots on a resource
//! envguard slots --entity EnvironmentInstance/int-x --duration 45
//! ```
//!
//! Results are printed as pretty JSON on stdout; logs go to stderr and are
//! filtered with `RUST_LOG` (default `envguard=info`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use envguard_core::model::{
    BookingPriority, BookingStatus, ImpactType, NewBooking, NewRefreshIntent, RefreshStatus,
    ResolutionStatus, ResourceKind, ResourceRef, Severity,
};
use envguard_core::{
    check_conflicts_for_booking, check_conflicts_for_refresh, check_refreshes_for_booking,
    create_booking, create_refresh_intent, ensure_approvable, get_conflict_details,
    get_unresolved_conflicts, notify_conflicts, resolve_conflict, revalidate_conflicts,
    set_booking_status, suggest_slots, BookingWindowQuery, Clock, ConflictFilter, EngineConfig,
    FixedClock, ForceOverride, LogDispatcher, RefreshCheckRequest, SlotRequest, Store,
    SystemClock, TimeWindow, TracingActivityLog,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "envguard",
    version,
    about = "Booking and refresh conflict detection for shared test environments"
)]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "ENVGUARD_DB", default_value = "envguard.db", global = true)]
    db: PathBuf,

    /// JSON engine configuration file
    #[arg(long, env = "ENVGUARD_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Evaluate as of this instant (RFC 3339) instead of the system clock
    #[arg(long, env = "ENVGUARD_NOW", global = true)]
    now: Option<DateTime<Utc>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or migrate the database, optionally importing an inventory
    Init {
        /// JSON inventory of environments, instances and components
        #[arg(short, long)]
        inventory: Option<PathBuf>,
    },
    /// Check a booking window against other bookings and committed refreshes
    CheckBooking {
        /// Resource as Kind/id (repeatable)
        #[arg(short, long = "resource", required = true)]
        resources: Vec<ResourceRef>,
        #[arg(long)]
        start: DateTime<Utc>,
        #[arg(long)]
        end: DateTime<Utc>,
        /// Booking to leave out of the overlap check (when updating it)
        #[arg(long)]
        exclude: Option<String>,
        /// Create the booking if the checks allow it
        #[arg(long)]
        create: bool,
        #[arg(long, default_value = "booking")]
        title: String,
        #[arg(long, default_value = "Requested")]
        status: BookingStatus,
        #[arg(long, default_value = "Normal")]
        priority: BookingPriority,
        #[arg(long)]
        critical: bool,
        /// Booking owner (required with --create)
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        group: Option<String>,
        /// Accept that a destructive refresh overlaps the booking
        #[arg(long)]
        acknowledge: bool,
    },
    /// Move a booking to a new status and update resource occupancy
    SetStatus {
        booking_id: String,
        status: BookingStatus,
    },
    /// Check a refresh window against confirmed bookings
    CheckRefresh {
        /// Target as Kind/id
        #[arg(long)]
        entity: ResourceRef,
        #[arg(long)]
        start: DateTime<Utc>,
        #[arg(long)]
        end: Option<DateTime<Utc>>,
        /// Estimated downtime, used when --end is not given
        #[arg(long)]
        downtime_minutes: Option<i64>,
        #[arg(long)]
        impact: ImpactType,
        /// Store the refresh intent with its conflict snapshot
        #[arg(long)]
        create: bool,
        #[arg(long, default_value = "refresh")]
        title: String,
        #[arg(long, default_value = "REQUESTED")]
        status: RefreshStatus,
        #[arg(long)]
        requested_by: Option<String>,
    },
    /// Recompute the stored conflicts of a refresh intent
    Revalidate { refresh_intent_id: String },
    /// Approve a refresh intent, with an override if it is MAJOR-flagged
    Approve {
        refresh_intent_id: String,
        /// Approver taking responsibility for a MAJOR conflict flag
        #[arg(long, requires = "reason")]
        force_approver: Option<String>,
        #[arg(long)]
        reason: Option<String>,
    },
    /// List unresolved conflicts, most severe first
    Conflicts {
        /// Kind of entity the refresh targets
        #[arg(long)]
        entity_type: Option<ResourceKind>,
        #[arg(long)]
        severity: Option<Severity>,
        /// Group owning the booking
        #[arg(long)]
        group: Option<String>,
    },
    /// Show a conflict with its booking and refresh intent
    Show { conflict_id: String },
    /// Record a resolution on a conflict
    Resolve {
        conflict_id: String,
        #[arg(long)]
        status: ResolutionStatus,
        #[arg(long)]
        resolver: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Suggest free slots on a resource
    Slots {
        /// Resource as Kind/id
        #[arg(long)]
        entity: ResourceRef,
        /// Slot length in minutes
        #[arg(long)]
        duration: i64,
        #[arg(long)]
        lookahead_days: Option<i64>,
    },
    /// Hand unnotified conflicts of a refresh intent to the log dispatcher
    Notify { refresh_intent_id: String },
}

/// Inventory file accepted by `init`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Inventory {
    #[serde(default)]
    environments: Vec<EnvironmentEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnvironmentEntry {
    id: String,
    name: String,
    #[serde(default)]
    instances: Vec<InstanceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InstanceEntry {
    id: String,
    name: String,
    #[serde(default)]
    components: Vec<ComponentEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ComponentEntry {
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct InitSummary {
    schema_version: i64,
    environments: usize,
    instances: usize,
    components: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("envguard=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let mut store = Store::open(&cli.db, config)
        .with_context(|| format!("Failed to open database: {}", cli.db.display()))?;
    let clock: Box<dyn Clock> = match cli.now {
        Some(now) => Box::new(FixedClock(now)),
        None => Box::new(SystemClock),
    };
    let clock = clock.as_ref();
    let activity = TracingActivityLog;

    match cli.command {
        Commands::Init { inventory } => {
            let mut summary = InitSummary {
                schema_version: store.schema_version()?,
                environments: 0,
                instances: 0,
                components: 0,
            };
            if let Some(path) = inventory {
                import_inventory(&store, &path, &mut summary)?;
            }
            print_json(&summary)?;
        }
        Commands::CheckBooking {
            resources,
            start,
            end,
            exclude,
            create,
            title,
            status,
            priority,
            critical,
            owner,
            group,
            acknowledge,
        } => {
            if create {
                let owner_id = owner.context("--owner is required with --create")?;
                let created = create_booking(
                    &mut store,
                    NewBooking {
                        title,
                        resources,
                        start,
                        end,
                        status,
                        priority,
                        is_critical: critical,
                        owner_id,
                        owning_group_id: group,
                    },
                    acknowledge,
                )
                .context("Booking was not created")?;
                print_json(&created)?;
            } else {
                let overlaps = check_conflicts_for_booking(
                    &store,
                    &resources,
                    TimeWindow::new(start, end),
                    exclude.as_deref(),
                )?;
                let query = BookingWindowQuery {
                    start,
                    end,
                    environment_instance_ids: store.instances_booked_by(&resources)?,
                };
                let refresh_warning = check_refreshes_for_booking(&store, &query)?;
                print_json(&serde_json::json!({
                    "overlaps": overlaps,
                    "refresh_warning": refresh_warning,
                }))?;
            }
        }
        Commands::SetStatus { booking_id, status } => {
            let booking = set_booking_status(&mut store, &booking_id, status)?;
            print_json(&booking)?;
        }
        Commands::CheckRefresh {
            entity,
            start,
            end,
            downtime_minutes,
            impact,
            create,
            title,
            status,
            requested_by,
        } => {
            if create {
                let (intent, result) = create_refresh_intent(
                    &mut store,
                    clock,
                    &activity,
                    NewRefreshIntent {
                        title,
                        entity,
                        planned_start: start,
                        planned_end: end,
                        estimated_downtime_minutes: downtime_minutes,
                        impact_type: impact,
                        status,
                        requested_by,
                    },
                )?;
                print_json(&serde_json::json!({
                    "refresh_intent": intent,
                    "result": result,
                }))?;
            } else {
                let result = check_conflicts_for_refresh(
                    &store,
                    &RefreshCheckRequest {
                        entity,
                        planned_start: start,
                        planned_end: end,
                        impact_type: impact,
                        estimated_downtime_minutes: downtime_minutes,
                        refresh_intent_id: None,
                    },
                )?;
                print_json(&result)?;
            }
        }
        Commands::Revalidate { refresh_intent_id } => {
            let result = revalidate_conflicts(&mut store, clock, &activity, &refresh_intent_id)?;
            print_json(&result)?;
        }
        Commands::Approve {
            refresh_intent_id,
            force_approver,
            reason,
        } => {
            let intent = store.require_refresh_intent(&refresh_intent_id)?;
            let force = force_approver.map(|approver_id| ForceOverride {
                approver_id,
                reason: reason.unwrap_or_default(),
            });
            ensure_approvable(&intent, force.as_ref(), &activity)?;
            store.set_refresh_status(&refresh_intent_id, RefreshStatus::Approved)?;
            print_json(&store.require_refresh_intent(&refresh_intent_id)?)?;
        }
        Commands::Conflicts {
            entity_type,
            severity,
            group,
        } => {
            let filter = ConflictFilter {
                entity_type,
                severity,
                owning_group_id: group,
            };
            print_json(&get_unresolved_conflicts(&store, &filter)?)?;
        }
        Commands::Show { conflict_id } => {
            print_json(&get_conflict_details(&store, &conflict_id)?)?;
        }
        Commands::Resolve {
            conflict_id,
            status,
            resolver,
            notes,
        } => {
            let conflict = resolve_conflict(
                &mut store,
                clock,
                &activity,
                &conflict_id,
                status,
                &resolver,
                notes.as_deref(),
            )?;
            print_json(&conflict)?;
        }
        Commands::Slots {
            entity,
            duration,
            lookahead_days,
        } => {
            let request = SlotRequest {
                entity,
                duration_minutes: duration,
                lookahead_days,
            };
            print_json(&suggest_slots(&store, clock, &request)?)?;
        }
        Commands::Notify { refresh_intent_id } => {
            let summary = notify_conflicts(&store, clock, &refresh_intent_id, &LogDispatcher)?;
            print_json(&summary)?;
        }
    }

    Ok(())
}

fn import_inventory(store: &Store, path: &Path, summary: &mut InitSummary) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read inventory: {}", path.display()))?;
    let inventory: Inventory = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid inventory: {}", path.display()))?;

    for environment in &inventory.environments {
        store.add_environment(&environment.id, &environment.name)?;
        summary.environments += 1;
        for instance in &environment.instances {
            store.add_instance(&instance.id, &environment.id, &instance.name)?;
            summary.instances += 1;
            for component in &instance.components {
                store.add_component(&component.id, &instance.id, &component.name)?;
                summary.components += 1;
            }
        }
    }
    tracing::info!(
        environments = summary.environments,
        instances = summary.instances,
        components = summary.components,
        "inventory imported"
    );
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
