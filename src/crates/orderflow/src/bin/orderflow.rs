//! Orderflow CLI - admin tool for purchase request and production order workflows
//!
//! Every command prints its result as pretty JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use orderflow::workflow::{DetailPatch, EntityFilter, ListView};
use orderflow::{
    AppConfig, DatabaseConnection, EntityKind, NewEntity, NoopNotifier, Notifier, Status,
    TracingNotifier, TransitionPayload, WizardLocks, WorkflowEngine, WorkflowSettings,
};

#[derive(Parser)]
#[command(name = "orderflow")]
#[command(
    about = "Orderflow - status workflows for purchase requests and production orders",
    long_about = None
)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file (TOML or YAML)
    #[arg(long, global = true, env = "ORDERFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database path, overriding the configuration
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    PurchaseRequest,
    ProductionOrder,
}

impl From<KindArg> for EntityKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::PurchaseRequest => EntityKind::PurchaseRequest,
            KindArg::ProductionOrder => EntityKind::ProductionOrder,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ViewArg {
    Active,
    Archived,
    All,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    Migrate,

    /// Create a purchase request or production order
    Create {
        #[arg(long, value_enum)]
        kind: KindArg,
        #[arg(long)]
        item: String,
        #[arg(long)]
        quantity: f64,
        /// Supplier or client
        #[arg(long)]
        counterparty: String,
        /// Required or delivery date (YYYY-MM-DD)
        #[arg(long)]
        required_date: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        actor: String,
    },

    /// Show an entity by id or consecutive code, with its legal next statuses
    Show {
        #[arg(long, value_enum)]
        kind: KindArg,
        /// Numeric id or code such as OP-00001
        reference: String,
    },

    /// List entities, newest first
    List {
        #[arg(long, value_enum)]
        kind: KindArg,
        #[arg(long, value_enum, default_value = "active")]
        view: ViewArg,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Page size (archived view only)
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// Move an entity to another status
    Transition {
        #[arg(long, value_enum)]
        kind: KindArg,
        id: i64,
        /// Target status slug, or custom:<id>
        to: String,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        delivered: Option<f64>,
        #[arg(long)]
        defective: Option<f64>,
        #[arg(long)]
        package: Option<String>,
        #[arg(long)]
        ticket: Option<String>,
    },

    /// Send a terminal entity back to pending
    Reopen {
        #[arg(long, value_enum)]
        kind: KindArg,
        id: i64,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Reject a cancellation request
    RejectCancellation {
        #[arg(long, value_enum)]
        kind: KindArg,
        id: i64,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Add a note to the history without changing the status
    Note {
        #[arg(long, value_enum)]
        kind: KindArg,
        id: i64,
        text: String,
        #[arg(long)]
        actor: String,
    },

    /// Edit non-status fields
    Edit {
        #[arg(long, value_enum)]
        kind: KindArg,
        id: i64,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        quantity: Option<f64>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        required_date: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        /// Machine from the configured catalog; empty clears it
        #[arg(long)]
        machine: Option<String>,
        #[arg(long)]
        shift: Option<String>,
        #[arg(long)]
        scheduled_start: Option<String>,
        #[arg(long)]
        scheduled_end: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Show the history ledger of an entity, newest first
    History {
        #[arg(long, value_enum)]
        kind: KindArg,
        id: i64,
    },

    /// Show or change the workflow settings of a kind
    Settings {
        #[arg(long, value_enum)]
        kind: KindArg,
        /// JSON file replacing the whole settings document
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        warehouse_step: Option<bool>,
        #[arg(long)]
        require_assignment: Option<bool>,
        /// Required when changing settings
        #[arg(long)]
        actor: Option<String>,
    },

    /// Warehouse location commands
    #[command(subcommand)]
    Location(LocationCommands),

    /// Rack-population wizard lock commands
    #[command(subcommand)]
    Lock(LockCommands),
}

#[derive(Subcommand)]
enum LocationCommands {
    /// Create a location
    Create {
        code: String,
        name: String,
        #[arg(long)]
        parent: Option<i64>,
    },
    /// List children of a location, or the roots
    List {
        #[arg(long)]
        parent: Option<i64>,
    },
}

#[derive(Subcommand)]
enum LockCommands {
    /// Take the wizard lock; a session id is generated when omitted
    Acquire {
        location: i64,
        #[arg(long)]
        session: Option<String>,
    },
    /// Release a lock held by a session
    Release {
        location: i64,
        #[arg(long)]
        session: String,
    },
    /// Clear a lock whoever holds it
    ForceRelease {
        location: i64,
        #[arg(long)]
        actor: String,
    },
    /// Release every lock held by a session
    ReleaseSession { session: String },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn connect(config: &AppConfig) -> anyhow::Result<DatabaseConnection> {
    let db = if config.database.path == ":memory:" {
        DatabaseConnection::in_memory().await?
    } else {
        DatabaseConnection::with_max_connections(
            &config.database_url(),
            config.database.max_connections,
        )
        .await?
    };
    db.run_migrations().await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => AppConfig::load()?,
    };
    if let Some(path) = cli.database {
        config.database.path = path;
    }

    // Initialize tracing; RUST_LOG wins over the configured filter
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Database path: {}", config.database.path);
    let db = connect(&config).await?;

    let notifier: Arc<dyn Notifier> = if config.notifications.enabled {
        Arc::new(TracingNotifier)
    } else {
        Arc::new(NoopNotifier)
    };
    let engine = WorkflowEngine::new(db.pool().clone())
        .with_notifier(notifier)
        .with_link_base(config.notifications.link_base.clone());

    let result = run(cli.command, &engine, &db).await;
    if let Err(e) = &result {
        if let Some(err) = e.downcast_ref::<orderflow::WorkflowError>() {
            if err.is_fatal() {
                tracing::error!("Storage failure: {}", err);
            }
        }
    }

    db.close().await;
    result
}

async fn run(
    command: Commands,
    engine: &WorkflowEngine,
    db: &DatabaseConnection,
) -> anyhow::Result<()> {
    match command {
        Commands::Migrate => {
            db.health_check().await?;
            print_json(&serde_json::json!({ "migrated": true, "version": orderflow::version() }))
        }
        Commands::Create {
            kind,
            item,
            quantity,
            counterparty,
            required_date,
            description,
            category,
            priority,
            notes,
            actor,
        } => {
            let new = NewEntity {
                item,
                description,
                quantity,
                counterparty,
                category,
                required_date: Some(required_date),
                priority,
                notes,
            };
            let entity = engine.create(kind.into(), &new, &actor).await?;
            print_json(&entity)
        }
        Commands::Show { kind, reference } => {
            let kind = EntityKind::from(kind);
            let entity = match reference.parse::<i64>() {
                Ok(id) => engine.get_by_id(kind, id).await?,
                Err(_) => engine
                    .find_by_consecutive(kind, &reference)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("{} not found: {}", kind.label(), reference))?,
            };
            let next = engine.allowed_transitions(kind, entity.id).await?;
            print_json(&serde_json::json!({ "entity": entity, "allowed_transitions": next }))
        }
        Commands::List {
            kind,
            view,
            search,
            status,
            category,
            from,
            to,
            limit,
            offset,
        } => {
            let mut filter = match view {
                ViewArg::Active => EntityFilter::active(),
                ViewArg::Archived => EntityFilter::archived(),
                ViewArg::All => EntityFilter::all(),
            };
            if let Some(search) = search {
                filter = filter.with_search(search);
            }
            if let Some(status) = status {
                filter = filter.with_status(Status::parse(&status)?);
            }
            if let Some(category) = category {
                filter = filter.with_category(category);
            }
            filter.from_date = from;
            filter.to_date = to;
            if let Some(limit) = limit {
                if filter.view != ListView::Archived {
                    tracing::warn!("Pagination applies to the archived view only");
                }
                filter = filter.with_page(limit, offset);
            }

            let kind = EntityKind::from(kind);
            let items = engine.list(kind, &filter).await?;
            let total = engine.count(kind, &filter).await?;
            print_json(&serde_json::json!({ "total": total, "items": items }))
        }
        Commands::Transition {
            kind,
            id,
            to,
            actor,
            notes,
            delivered,
            defective,
            package,
            ticket,
        } => {
            let payload = TransitionPayload {
                notes,
                delivered_quantity: delivered,
                defective_quantity: defective,
                package_number: package,
                ticket_number: ticket,
            };
            let target = Status::parse(&to)?;
            let entity = engine
                .transition(kind.into(), id, &target, &payload, &actor)
                .await?;
            print_json(&entity)
        }
        Commands::Reopen { kind, id, actor, notes } => {
            let entity = engine.reopen(kind.into(), id, &actor, notes.as_deref()).await?;
            print_json(&entity)
        }
        Commands::RejectCancellation { kind, id, actor, notes } => {
            let entity = engine
                .reject_cancellation(kind.into(), id, &actor, notes.as_deref())
                .await?;
            print_json(&entity)
        }
        Commands::Note { kind, id, text, actor } => {
            let entry = engine.add_note(kind.into(), id, &actor, &text).await?;
            print_json(&entry)
        }
        Commands::Edit {
            kind,
            id,
            actor,
            quantity,
            description,
            category,
            required_date,
            priority,
            machine,
            shift,
            scheduled_start,
            scheduled_end,
            notes,
        } => {
            let patch = DetailPatch {
                description,
                quantity,
                category,
                required_date,
                priority,
                assigned_resource: machine,
                shift,
                scheduled_start,
                scheduled_end,
                notes,
            };
            let entity = engine.update_details(kind.into(), id, &patch, &actor).await?;
            print_json(&entity)
        }
        Commands::History { kind, id } => {
            let entries = engine.history(kind.into(), id).await?;
            print_json(&entries)
        }
        Commands::Settings {
            kind,
            file,
            warehouse_step,
            require_assignment,
            actor,
        } => {
            let kind = EntityKind::from(kind);
            let mut settings = match &file {
                Some(path) => {
                    let content = std::fs::read_to_string(path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    serde_json::from_str::<WorkflowSettings>(&content)
                        .with_context(|| format!("parsing {}", path.display()))?
                }
                None => engine.settings(kind).await?,
            };

            let changed =
                file.is_some() || warehouse_step.is_some() || require_assignment.is_some();
            if !changed {
                return print_json(&settings);
            }

            if let Some(enabled) = warehouse_step {
                settings.warehouse_step_enabled = enabled;
            }
            if let Some(required) = require_assignment {
                settings.require_assignment_before_start = required;
            }
            let actor =
                actor.ok_or_else(|| anyhow::anyhow!("--actor is required to change settings"))?;
            let saved = engine.update_settings(kind, settings, &actor).await?;
            print_json(&saved)
        }
        Commands::Location(cmd) => {
            let locations = WizardLocks::new(db.pool().clone());
            match cmd {
                LocationCommands::Create { code, name, parent } => {
                    print_json(&locations.create_location(&code, &name, parent).await?)
                }
                LocationCommands::List { parent } => {
                    print_json(&locations.children(parent).await?)
                }
            }
        }
        Commands::Lock(cmd) => {
            let locks = WizardLocks::new(db.pool().clone());
            match cmd {
                LockCommands::Acquire { location, session } => {
                    let session = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                    print_json(&locks.acquire(location, &session).await?)
                }
                LockCommands::Release { location, session } => {
                    locks.release(location, &session).await?;
                    print_json(&locks.location(location).await?)
                }
                LockCommands::ForceRelease { location, actor } => {
                    locks.force_release(location, &actor).await?;
                    print_json(&locks.location(location).await?)
                }
                LockCommands::ReleaseSession { session } => {
                    let released = locks.release_session(&session).await?;
                    print_json(&serde_json::json!({ "session": session, "released": released }))
                }
            }
        }
    }
}
