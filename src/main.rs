use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::Path;
use std::sync::Arc;

use med_station::config::CONFIG_FILE;
use med_station::store::{load_snapshot, save_snapshot};
use med_station::{
    Actor, Decision, DispenseLine, KeyedLocks, LifecycleEngine, MedStationConfig, MemoryStore,
    NewMedication, NewRequest, NoopNotifier, ReportRange, ReportService, Role, StockLedger,
    StockLocation, SubjectGroup, UserDirectory,
};

#[derive(Parser)]
#[command(name = "med-station")]
#[command(about = "Medication request and inventory tracking for a university health station")]
#[command(long_about = "Employees and students submit symptom-based requests; clinical staff \
                       review, approve or reject them and dispense from one of two stock \
                       locations. State lives in a JSON snapshot next to the config.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default med-station.toml and an empty data snapshot
    Init {
        /// Overwrite an existing configuration
        #[arg(long, help = "Overwrite med-station.toml if it already exists")]
        force: bool,
        /// Seed the directory with a first ADMIN user
        #[arg(long, value_name = "EMAIL")]
        admin: Option<String>,
    },
    /// Show pending queue size and low-stock medications
    Status,
    /// Submit and process medication requests
    Request {
        #[command(subcommand)]
        command: RequestCommands,
    },
    /// Manage medications and stock levels
    Inventory {
        #[command(subcommand)]
        command: InventoryCommands,
    },
    /// Persist the EXPIRED flip for pending requests past the window
    Sweep,
    /// Show the activity log, newest first
    Logs {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Dispensing report for a calendar month
    Report {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
        #[arg(long, value_enum, default_value = "medication")]
        group_by: ReportGroup,
    },
    /// Complete or update a user profile
    Profile {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        /// Class or department
        #[arg(long)]
        unit: String,
    },
    /// Admin: change a user's role
    SetRole {
        /// Acting admin's email
        #[arg(long = "as", value_name = "EMAIL")]
        actor: String,
        #[arg(long)]
        email: String,
        #[arg(long, value_enum)]
        role: RoleArg,
    },
}

#[derive(Subcommand)]
enum RequestCommands {
    /// Submit a new request
    Submit {
        /// Requester's email
        #[arg(long = "as", value_name = "EMAIL")]
        actor: String,
        #[arg(long, value_enum)]
        group: GroupArg,
        /// Symptom / reason note
        #[arg(long, default_value = "")]
        note: String,
        /// Wish-list items as MED_ID:QTY (repeatable)
        #[arg(long = "item", value_name = "MED_ID:QTY")]
        items: Vec<String>,
    },
    /// List requests visible to the given viewer
    List {
        #[arg(long = "as", value_name = "EMAIL")]
        actor: String,
    },
    /// Approve a request, optionally dispensing items
    Approve {
        request_id: String,
        #[arg(long = "as", value_name = "EMAIL")]
        actor: String,
        #[arg(long)]
        note: String,
        /// Which location to dispense from (A or B)
        #[arg(long)]
        area: StockLocation,
        /// Items to dispense as MED_ID:QTY (repeatable)
        #[arg(long = "item", value_name = "MED_ID:QTY")]
        items: Vec<String>,
    },
    /// Reject a request
    Reject {
        request_id: String,
        #[arg(long = "as", value_name = "EMAIL")]
        actor: String,
        #[arg(long)]
        note: String,
    },
}

#[derive(Subcommand)]
enum InventoryCommands {
    /// List all medications with stock at both locations
    List,
    /// Register a new medication
    Add {
        #[arg(long = "as", value_name = "EMAIL")]
        actor: String,
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "unit")]
        unit: String,
        #[arg(long, default_value = "0")]
        stock_a: u32,
        #[arg(long, default_value = "0")]
        stock_b: u32,
        #[arg(long, default_value = "0")]
        threshold: u32,
    },
    /// Raise a location's stock to a new level
    Restock {
        medication_id: String,
        #[arg(long = "as", value_name = "EMAIL")]
        actor: String,
        #[arg(long)]
        location: StockLocation,
        #[arg(long)]
        quantity: u32,
    },
    /// Move stock between the two locations
    Transfer {
        medication_id: String,
        #[arg(long = "as", value_name = "EMAIL")]
        actor: String,
        #[arg(long)]
        amount: u32,
        #[arg(long)]
        from: StockLocation,
        #[arg(long)]
        to: StockLocation,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum GroupArg {
    Student,
    Employee,
}

impl From<GroupArg> for SubjectGroup {
    fn from(value: GroupArg) -> Self {
        match value {
            GroupArg::Student => SubjectGroup::Student,
            GroupArg::Employee => SubjectGroup::Employee,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Employee,
    Staff,
    Admin,
}

impl From<RoleArg> for Role {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Employee => Role::Employee,
            RoleArg::Staff => Role::Staff,
            RoleArg::Admin => Role::Admin,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportGroup {
    Medication,
    Requester,
}

/// Everything wired up over the snapshot-backed store.
struct Station {
    config: MedStationConfig,
    store: Arc<MemoryStore>,
    engine: LifecycleEngine,
    ledger: Arc<StockLedger>,
    directory: UserDirectory,
    reports: ReportService,
}

impl Station {
    fn open(config: MedStationConfig) -> Result<Self> {
        let snapshot = load_snapshot(Path::new(&config.data.snapshot_path))
            .with_context(|| format!("loading snapshot {}", config.data.snapshot_path))?;
        let store = Arc::new(MemoryStore::from_snapshot(snapshot));
        let locks = Arc::new(KeyedLocks::new());
        let notifier = Arc::new(NoopNotifier);

        let ledger = Arc::new(StockLedger::new(
            store.clone(),
            locks.clone(),
            store.clone(),
            notifier.clone(),
        ));
        let engine = LifecycleEngine::new(
            store.clone(),
            store.clone(),
            ledger.clone(),
            store.clone(),
            notifier,
            locks,
        )
        .with_expiry_window(chrono::Duration::hours(config.requests.expiry_hours));
        let directory = UserDirectory::new(store.clone(), store.clone());
        let reports = ReportService::new(store.clone(), store.clone());

        Ok(Self {
            config,
            store,
            engine,
            ledger,
            directory,
            reports,
        })
    }

    async fn save(&self) -> Result<()> {
        let snapshot = self.store.to_snapshot().await;
        save_snapshot(Path::new(&self.config.data.snapshot_path), &snapshot)
            .with_context(|| format!("saving snapshot {}", self.config.data.snapshot_path))?;
        Ok(())
    }

    /// Resolve the acting identity. The email is trusted (sign-in is the
    /// deployment's job); the role comes from the user directory.
    async fn actor(&self, email: &str) -> Result<Actor> {
        let role = self.directory.resolve_role(email).await?;
        Ok(Actor::new(email, role))
    }
}

fn parse_item(spec: &str) -> Result<DispenseLine> {
    let (id, qty) = spec
        .split_once(':')
        .with_context(|| format!("expected MED_ID:QTY, got '{spec}'"))?;
    let quantity: u32 = qty
        .trim()
        .parse()
        .with_context(|| format!("invalid quantity in '{spec}'"))?;
    Ok(DispenseLine::new(id.trim(), quantity))
}

fn parse_items(specs: &[String]) -> Result<Vec<DispenseLine>> {
    specs.iter().map(|s| parse_item(s)).collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _ = MedStationConfig::load_env_file();
    let config = MedStationConfig::load()?;
    med_station::init_telemetry(&config.observability)?;

    tokio::runtime::Runtime::new()?.block_on(run(cli, config))
}

async fn run(cli: Cli, config: MedStationConfig) -> Result<()> {
    match cli.command {
        Commands::Init { force, admin } => init_command(config, force, admin).await,
        Commands::Status => status_command(config).await,
        Commands::Request { command } => request_command(config, command).await,
        Commands::Inventory { command } => inventory_command(config, command).await,
        Commands::Sweep => sweep_command(config).await,
        Commands::Logs { limit } => logs_command(config, limit).await,
        Commands::Report {
            year,
            month,
            group_by,
        } => report_command(config, year, month, group_by).await,
        Commands::Profile {
            email,
            name,
            phone,
            unit,
        } => profile_command(config, email, name, phone, unit).await,
        Commands::SetRole { actor, email, role } => {
            set_role_command(config, actor, email, role.into()).await
        }
    }
}

async fn init_command(config: MedStationConfig, force: bool, admin: Option<String>) -> Result<()> {
    let config_path = Path::new(CONFIG_FILE);
    if config_path.exists() && !force {
        bail!("{CONFIG_FILE} already exists (use --force to overwrite)");
    }
    config.save_to_file(config_path)?;
    let snapshot_path = Path::new(&config.data.snapshot_path);
    if !snapshot_path.exists() {
        save_snapshot(snapshot_path, &Default::default())?;
    }
    println!("Wrote {CONFIG_FILE} and {}", config.data.snapshot_path);

    // First admin is seeded directly; every later role change goes through
    // the ADMIN-gated path.
    if let Some(email) = admin {
        let station = Station::open(config)?;
        med_station::UserStore::upsert_user(
            station.store.as_ref(),
            med_station::User {
                email: email.clone(),
                name: String::new(),
                role: Role::Admin,
                phone: String::new(),
                unit: String::new(),
            },
        )
        .await?;
        station.save().await?;
        println!("Seeded admin {email}");
    }
    Ok(())
}

async fn status_command(config: MedStationConfig) -> Result<()> {
    let station = Station::open(config)?;
    let viewer = Actor::new("status@local", Role::Admin);
    let now = Utc::now();

    let views = station.engine.list_for(&viewer, now).await?;
    let pending = views
        .iter()
        .filter(|v| v.request.status == med_station::RequestStatus::Pending)
        .count();
    let low = station.ledger.low_stock().await?;

    println!("{}", station.config.station.name);
    println!("  pending requests: {pending}");
    if low.is_empty() {
        println!("  stock: all medications above threshold");
    } else {
        println!("  low stock:");
        for med in low {
            println!(
                "    {} ({}): A={} B={} threshold={}",
                med.id, med.name, med.stock_area_a, med.stock_area_b, med.min_threshold
            );
        }
    }
    station.save().await?;
    Ok(())
}

async fn request_command(config: MedStationConfig, command: RequestCommands) -> Result<()> {
    let station = Station::open(config)?;
    let now = Utc::now();

    match command {
        RequestCommands::Submit {
            actor,
            group,
            note,
            items,
        } => {
            let actor = station.actor(&actor).await?;
            let request = station
                .engine
                .submit(
                    &actor,
                    NewRequest {
                        subject_group: group.into(),
                        note,
                        initial_items: parse_items(&items)?,
                    },
                    now,
                )
                .await?;
            println!("Submitted {}", request.id);
        }
        RequestCommands::List { actor } => {
            let actor = station.actor(&actor).await?;
            let views = station.engine.list_for(&actor, now).await?;
            if views.is_empty() {
                println!("No visible requests.");
            }
            for view in views {
                let r = &view.request;
                println!(
                    "{}  {}  {}  {}  {}",
                    r.id,
                    r.created_at.format("%Y-%m-%d %H:%M"),
                    r.status,
                    r.requester_email,
                    r.note
                );
                for item in view.items {
                    println!(
                        "    {} x {} ({})",
                        item.quantity, item.medication_id, item.medication_name
                    );
                }
            }
        }
        RequestCommands::Approve {
            request_id,
            actor,
            note,
            area,
            items,
        } => {
            let actor = station.actor(&actor).await?;
            let request = station
                .engine
                .process(
                    &actor,
                    &request_id,
                    Decision::Approve {
                        staff_note: note,
                        distribution_area: area,
                        items: parse_items(&items)?,
                    },
                    now,
                )
                .await?;
            println!("{} is now {}", request.id, request.status);
        }
        RequestCommands::Reject {
            request_id,
            actor,
            note,
        } => {
            let actor = station.actor(&actor).await?;
            let request = station
                .engine
                .process(&actor, &request_id, Decision::Reject { staff_note: note }, now)
                .await?;
            println!("{} is now {}", request.id, request.status);
        }
    }
    station.save().await?;
    Ok(())
}

async fn inventory_command(config: MedStationConfig, command: InventoryCommands) -> Result<()> {
    let station = Station::open(config)?;

    match command {
        InventoryCommands::List => {
            for med in station.ledger.list().await? {
                let marker = if med.is_low() { "  LOW" } else { "" };
                println!(
                    "{}  {} ({}): A={} B={} threshold={}{}",
                    med.id, med.name, med.unit, med.stock_area_a, med.stock_area_b,
                    med.min_threshold, marker
                );
            }
        }
        InventoryCommands::Add {
            actor,
            id,
            name,
            unit,
            stock_a,
            stock_b,
            threshold,
        } => {
            let actor = station.actor(&actor).await?;
            let med = station
                .ledger
                .add_medication(
                    &actor,
                    NewMedication {
                        id,
                        name,
                        unit,
                        stock_area_a: stock_a,
                        stock_area_b: stock_b,
                        min_threshold: threshold,
                    },
                )
                .await?;
            println!("Added {} ({})", med.id, med.name);
        }
        InventoryCommands::Restock {
            medication_id,
            actor,
            location,
            quantity,
        } => {
            let actor = station.actor(&actor).await?;
            station
                .ledger
                .restock(&actor, &medication_id, location, quantity)
                .await?;
            println!("{medication_id} at {location} restocked to {quantity}");
        }
        InventoryCommands::Transfer {
            medication_id,
            actor,
            amount,
            from,
            to,
        } => {
            let actor = station.actor(&actor).await?;
            station
                .ledger
                .transfer(&actor, &medication_id, amount, from, to)
                .await?;
            println!("Moved {amount} x {medication_id} from {from} to {to}");
        }
    }
    station.save().await?;
    Ok(())
}

async fn sweep_command(config: MedStationConfig) -> Result<()> {
    let station = Station::open(config)?;
    let flipped = station.engine.expire_pending(Utc::now()).await?;
    println!("Expired {flipped} request(s)");
    station.save().await?;
    Ok(())
}

async fn logs_command(config: MedStationConfig, limit: usize) -> Result<()> {
    let station = Station::open(config)?;
    // Log visibility is staff-gated at the API surface; the CLI is an
    // operator tool and reads directly.
    let entries = med_station::ActivityLog::recent(station.store.as_ref(), limit).await?;
    for entry in entries {
        println!(
            "{}  {}  {}  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.action,
            entry.actor_email,
            entry.details
        );
    }
    Ok(())
}

async fn report_command(
    config: MedStationConfig,
    year: i32,
    month: u32,
    group_by: ReportGroup,
) -> Result<()> {
    let station = Station::open(config)?;
    let actor = Actor::new("reports@local", Role::Admin);
    let range = ReportRange::month(year, month)
        .with_context(|| format!("invalid report month {year}-{month}"))?;

    match group_by {
        ReportGroup::Medication => {
            let totals = station.reports.dispensed_by_medication(&actor, range).await?;
            if totals.is_empty() {
                println!("No dispensing recorded in {year}-{month:02}.");
            }
            for row in totals {
                println!(
                    "{}  {}  {} {}",
                    row.medication_id, row.name, row.total_dispensed, row.unit
                );
            }
        }
        ReportGroup::Requester => {
            let rows = station.reports.dispensed_by_requester(&actor, range).await?;
            if rows.is_empty() {
                println!("No dispensing recorded in {year}-{month:02}.");
            }
            for row in rows {
                let when = row
                    .processed_at
                    .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                let meds: Vec<String> = row
                    .items
                    .iter()
                    .map(|i| format!("{} ({})", i.medication_name, i.quantity))
                    .collect();
                println!(
                    "{}  {}  {}  {}  {}",
                    when,
                    row.requester_email,
                    row.subject_group,
                    meds.join(", "),
                    row.request_id
                );
            }
        }
    }
    Ok(())
}

async fn profile_command(
    config: MedStationConfig,
    email: String,
    name: String,
    phone: String,
    unit: String,
) -> Result<()> {
    let station = Station::open(config)?;
    let user = station
        .directory
        .complete_profile(&email, &name, &phone, &unit)
        .await?;
    println!("Profile saved for {} ({})", user.email, user.role);
    station.save().await?;
    Ok(())
}

async fn set_role_command(
    config: MedStationConfig,
    actor: String,
    email: String,
    role: Role,
) -> Result<()> {
    let station = Station::open(config)?;
    let actor = station.actor(&actor).await?;
    station.directory.set_role(&actor, &email, role).await?;
    println!("{email} is now {role}");
    station.save().await?;
    Ok(())
}
