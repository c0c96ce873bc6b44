//! StockTrack CLI
//!
//! Thin wrapper around stocktrack-core for command-line usage. All sync
//! logic lives in the core; this binary only parses arguments, feeds the
//! connectivity monitor, and prints results.
//!
//! ## Usage
//!
//! ```bash
//! # Log in (also replays any actions queued while offline)
//! stocktrack login amara secret
//!
//! # Show session, connectivity, and queue state
//! stocktrack status
//!
//! # List products / product types
//! stocktrack product list --search rice
//! stocktrack product types
//!
//! # Record mutations; queued automatically when offline
//! stocktrack product add "Rice 5kg" --price 12.5 --quantity 40 --type-id 2
//! stocktrack stock 7 out 3 --reason "damaged bags"
//! stocktrack sell 7 2
//!
//! # Work offline explicitly, then drain later
//! stocktrack --offline sell 7 1
//! stocktrack queue list
//! stocktrack sync
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use stocktrack_core::{
    ActionKind, Attempt, DrainOutcome, DrainReport, EngineConfig, NewProduct, SaleRequest,
    StockAdjustment, StockDirection, SyncEngine,
};

/// StockTrack - offline-first inventory client
#[derive(Parser)]
#[command(name = "stocktrack")]
#[command(version = "0.1.0")]
#[command(about = "StockTrack - offline-first inventory client")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Data directory (default: ~/.stocktrack/data)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Base URL of the StockTrack API
    /// (default: $STOCKTRACK_API_URL or http://localhost:3000)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Treat the device as offline: mutations are queued, reads fail fast
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and replay any queued actions
    Login { username: String, password: String },

    /// Clear the active session (queued actions are kept)
    Logout,

    /// Register a new account
    Register {
        username: String,
        email: String,
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        telephone: Option<String>,
    },

    /// Show session, connectivity, and queue state
    Status,

    /// Replay all queued actions now
    Sync,

    /// Inspect or clear the offline action queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },

    /// Product catalogue
    Product {
        #[command(subcommand)]
        action: ProductAction,
    },

    /// Adjust a product's stock level (queued when offline)
    Stock {
        product_id: i64,
        direction: Direction,
        quantity: i64,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        cost_price: Option<f64>,
    },

    /// Record a sale (queued when offline)
    Sell { product_id: i64, qty: i64 },

    /// Sales listings and admin approval
    Sales {
        #[command(subcommand)]
        action: SalesAction,
    },

    /// Fetch a report by name (e.g. daily, stock-levels)
    Report { name: String },

    /// Profile maintenance
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand)]
enum QueueAction {
    /// List pending actions in replay order
    List,
    /// Drop every pending action
    Clear,
}

#[derive(Subcommand)]
enum ProductAction {
    /// List products
    List {
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one product
    Show { id: i64 },
    /// Create a product (queued when offline)
    Add {
        name: String,
        #[arg(long)]
        price: f64,
        #[arg(long)]
        quantity: i64,
        #[arg(long)]
        type_id: i64,
        #[arg(long)]
        description: Option<String>,
    },
    /// List product types
    Types,
}

#[derive(Subcommand)]
enum SalesAction {
    /// List my sales
    Mine,
    /// List sales awaiting approval (admin)
    Pending,
    /// Approve a pending sale (admin)
    Approve { id: i64 },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Update profile fields
    Update {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        telephone: Option<String>,
    },
    /// Change the account password
    ChangePassword { current: String, new: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    In,
    Out,
}

impl From<Direction> for StockDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::In => StockDirection::In,
            Direction::Out => StockDirection::Out,
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "stocktrack_cli={default_level},stocktrack_core={default_level}"
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".stocktrack")
        .join("data")
}

fn default_api_url() -> String {
    std::env::var("STOCKTRACK_API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    let api_url = cli.api_url.clone().unwrap_or_else(default_api_url);
    let config = EngineConfig::new(&data_dir, api_url);

    let engine = Arc::new(SyncEngine::new(&config).context("failed to open local database")?);
    engine.connectivity().set_online(!cli.offline);

    match cli.command {
        Commands::Login { username, password } => {
            let session = engine.login(&username, &password).await?;
            println!(
                "Logged in as {} {} ({})",
                session.user.first_name, session.user.last_name, session.user.role
            );
            report_pending(&engine)?;
        }
        Commands::Logout => {
            engine.logout()?;
            println!("Logged out");
            report_pending(&engine)?;
        }
        Commands::Register {
            username,
            email,
            password,
            first_name,
            last_name,
            telephone,
        } => {
            let body = json!({
                "username": username,
                "email": email,
                "password": password,
                "firstName": first_name,
                "lastName": last_name,
                "telephone": telephone,
            });
            engine.gateway().register(&body).await?;
            println!("Registered {username}; you can now log in");
        }
        Commands::Status => {
            match engine.session() {
                Some(session) => println!(
                    "Session:      {} ({}), issued {}",
                    session.user.username,
                    session.user.role,
                    format_timestamp(session.issued_at)
                ),
                None => println!("Session:      none (not logged in)"),
            }
            println!(
                "Connectivity: {}",
                if engine.connectivity().is_online() {
                    "online"
                } else {
                    "offline"
                }
            );
            println!("Sync status:  {}", engine.status());
            println!("Pending:      {} queued action(s)", engine.pending_count()?);
        }
        Commands::Sync => match engine.drain().await? {
            DrainOutcome::Completed(report) => print_drain_report(&report),
            DrainOutcome::AlreadyDraining => println!("A sync is already in progress"),
            DrainOutcome::Offline => println!("Offline - nothing synced"),
        },
        Commands::Queue { action } => match action {
            QueueAction::List => {
                let pending = engine.pending_actions()?;
                if pending.is_empty() {
                    println!("Queue is empty");
                }
                for action in pending {
                    println!(
                        "{}  {}  enqueued {}  attempts {}",
                        action.id,
                        action.kind.name(),
                        format_timestamp(action.enqueued_at),
                        action.attempts
                    );
                }
            }
            QueueAction::Clear => {
                let dropped = engine.pending_count()?;
                engine.queue().clear()?;
                println!("Dropped {dropped} queued action(s)");
            }
        },
        Commands::Product { action } => match action {
            ProductAction::List { search } => {
                let products = engine.gateway().fetch_products(search.as_deref()).await?;
                for product in &products {
                    println!(
                        "{:>5}  {:<30} {:>8.2}  qty {:>4}{}",
                        product.id,
                        product.name,
                        product.price,
                        product.quantity,
                        if product.is_low_stock() { "  LOW" } else { "" }
                    );
                }
                println!("{} product(s)", products.len());
            }
            ProductAction::Show { id } => {
                let product = engine.gateway().fetch_product(id).await?;
                println!("{}", serde_json::to_string_pretty(&product)?);
            }
            ProductAction::Add {
                name,
                price,
                quantity,
                type_id,
                description,
            } => {
                let kind = ActionKind::CreateProduct(NewProduct {
                    name,
                    description,
                    price,
                    quantity,
                    product_type_id: type_id,
                });
                report_attempt(engine.attempt_or_queue(kind).await?, "Product created");
            }
            ProductAction::Types => {
                for pt in engine.gateway().fetch_product_types().await? {
                    println!("{:>5}  {}", pt.id, pt.name);
                }
            }
        },
        Commands::Stock {
            product_id,
            direction,
            quantity,
            reason,
            cost_price,
        } => {
            let kind = ActionKind::UpdateStock(StockAdjustment {
                product_id,
                direction: direction.into(),
                quantity,
                reason,
                cost_price,
            });
            report_attempt(engine.attempt_or_queue(kind).await?, "Stock updated");
        }
        Commands::Sell { product_id, qty } => {
            let kind = ActionKind::RecordSale(SaleRequest {
                product_id,
                qty_sold: qty,
            });
            report_attempt(engine.attempt_or_queue(kind).await?, "Sale recorded");
        }
        Commands::Sales { action } => match action {
            SalesAction::Mine => {
                for sale in engine.gateway().my_sales().await? {
                    println!(
                        "{:>5}  product {:>5}  qty {:>4}  {}",
                        sale.id,
                        sale.product_id,
                        sale.qty_sold,
                        sale.status.as_deref().unwrap_or("-")
                    );
                }
            }
            SalesAction::Pending => {
                for sale in engine.gateway().pending_sales().await? {
                    println!(
                        "{:>5}  product {:>5}  qty {:>4}",
                        sale.id, sale.product_id, sale.qty_sold
                    );
                }
            }
            SalesAction::Approve { id } => {
                engine.gateway().approve_sale(id).await?;
                println!("Sale {id} approved");
            }
        },
        Commands::Report { name } => {
            let report = engine.gateway().fetch_report(&name).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Profile { action } => match action {
            ProfileAction::Update {
                first_name,
                last_name,
                telephone,
            } => {
                let mut body = serde_json::Map::new();
                if let Some(v) = first_name {
                    body.insert("firstName".into(), json!(v));
                }
                if let Some(v) = last_name {
                    body.insert("lastName".into(), json!(v));
                }
                if let Some(v) = telephone {
                    body.insert("telephone".into(), json!(v));
                }
                let user = engine
                    .gateway()
                    .update_profile(&serde_json::Value::Object(body))
                    .await?;
                println!("Profile updated for {}", user.username);
            }
            ProfileAction::ChangePassword { current, new } => {
                engine.gateway().change_password(&current, &new).await?;
                println!("Password changed");
            }
        },
    }

    Ok(())
}

/// Tell the user whether the mutation completed or was queued for replay
fn report_attempt(attempt: Attempt, completed_message: &str) {
    match attempt {
        Attempt::Completed(_) => println!("{completed_message}"),
        Attempt::Queued(action) => println!(
            "Offline - queued as {} (replays automatically when back online)",
            action.id
        ),
    }
}

fn print_drain_report(report: &DrainReport) {
    println!("Replayed {} action(s)", report.replayed.len());
    for (id, reason) in &report.dropped {
        println!("Dropped {id}: {reason}");
    }
    match report.halted {
        Some(reason) => println!(
            "Stopped early ({reason}); {} action(s) still queued",
            report.remaining
        ),
        None if report.remaining == 0 => println!("Queue is empty"),
        None => println!("{} action(s) still queued", report.remaining),
    }
}

fn report_pending(engine: &SyncEngine) -> Result<()> {
    let pending = engine.pending_count()?;
    if pending > 0 {
        println!("{pending} action(s) still queued for replay");
    }
    Ok(())
}

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}
