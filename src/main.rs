//! fleetctl: command-line front-end for fleet routing configuration.
//!
//! # Architecture Overview
//!
//! ```text
//!   fleetctl ──▶ config (TOML) ──▶ Fleet (components)
//!                                     │
//!        ┌──────────────┬─────────────┼───────────────┬──────────────┐
//!        ▼              ▼             ▼               ▼              ▼
//!   repositories    resolver     cleanup plan     number search   customers
//!        │              │             │               │              │
//!        └──────────────┴──── ScatterGather ──────────┴──────────────┘
//!                                     │
//!                          Transport (HTTP, per server)
//!                                     │
//!                      server A   server B   server C ...
//! ```
//!
//! Every command prints pretty JSON on stdout; logs go to stderr.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use gateway_fleet::cleanup::CleanupTask;
use gateway_fleet::config::load_config;
use gateway_fleet::conflict::ContentHash;
use gateway_fleet::model::{GatewayRecord, Payload};
use gateway_fleet::observability::{logging, metrics};
use gateway_fleet::Fleet;

#[derive(Parser)]
#[command(name = "fleetctl")]
#[command(about = "Manage routing configuration across a fleet of voice servers", long_about = None)]
struct Cli {
    /// Path to the fleet configuration file
    #[arg(short, long, default_value = "fleet.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured servers
    Servers,
    /// Mapping gateways on one server
    #[command(subcommand)]
    Mg(GatewayCommand),
    /// Routing gateways on one server
    #[command(subcommand)]
    Rg(RoutingCommand),
    /// Where the given virtual-number keys are defined
    Definitions {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Search rewrite-rule keys by substring; without a term, dump every definition
    Keys { term: Option<String> },
    /// Customers owning a virtual number
    Owner { key: String },
    /// Report every occurrence of the given numbers
    Search {
        #[arg(required = true)]
        numbers: Vec<String>,
    },
    /// Plan or apply a number cleanup
    #[command(subcommand)]
    Cleanup(CleanupCommand),
    /// Customer accounts
    #[command(subcommand)]
    Customer(CustomerCommand),
}

#[derive(Args)]
struct Target {
    /// Server name from the configuration
    #[arg(short, long)]
    server: String,
    /// Gateway name
    #[arg(short, long)]
    name: String,
}

#[derive(Args)]
struct UpdateArgs {
    #[command(flatten)]
    target: Target,
    /// JSON payload file, or "-" for stdin
    #[arg(short, long)]
    payload: PathBuf,
    /// Content hash from `show`; enables conflict detection
    #[arg(long)]
    hash: Option<ContentHash>,
}

#[derive(Subcommand)]
enum GatewayCommand {
    List {
        #[arg(short, long)]
        server: String,
        #[arg(short, long)]
        filter: Option<String>,
    },
    Show(Target),
    Update(UpdateArgs),
}

#[derive(Subcommand)]
enum RoutingCommand {
    #[command(flatten)]
    Common(GatewayCommand),
    /// Append real numbers to a rewrite rule
    AddReals {
        #[command(flatten)]
        target: Target,
        #[arg(short, long)]
        key: String,
        #[arg(short, long = "real", required = true)]
        reals: Vec<String>,
        #[arg(long)]
        hash: Option<ContentHash>,
    },
    /// One rewrite rule of one gateway
    Status {
        #[command(flatten)]
        target: Target,
        #[arg(short, long)]
        key: String,
    },
}

#[derive(Subcommand)]
enum CleanupCommand {
    /// Find gateways referencing the numbers and propose payloads
    Scan {
        #[arg(required = true)]
        numbers: Vec<String>,
    },
    /// Apply reviewed tasks from a JSON file (or "-" for stdin)
    Apply { tasks: PathBuf },
}

#[derive(Subcommand)]
enum CustomerCommand {
    Show {
        #[arg(short, long)]
        server: String,
        #[arg(short, long)]
        account: String,
    },
    Search { filter: String },
    CreditLimit {
        #[arg(short, long)]
        server: String,
        #[arg(short, long)]
        account: String,
        #[arg(short, long)]
        limit: String,
        #[arg(long)]
        hash: Option<ContentHash>,
    },
    Lock {
        #[arg(short, long)]
        server: String,
        #[arg(short, long)]
        account: String,
        /// Unlock instead of lock
        #[arg(long)]
        unlock: bool,
        #[arg(long)]
        hash: Option<ContentHash>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    logging::init_logging(&config.observability)?;

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let fleet = Fleet::from_config(&config)?;
    tracing::debug!(servers = fleet.registry.len(), "fleetctl starting");

    run(&fleet, cli.command).await
}

async fn run(fleet: &Fleet, command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    let servers = fleet.registry.all();

    match command {
        Commands::Servers => print_json(&servers)?,
        Commands::Mg(cmd) => run_mapping(fleet, cmd).await?,
        Commands::Rg(cmd) => run_routing(fleet, cmd).await?,
        Commands::Definitions { keys } => {
            print_json(&fleet.resolver.find_definitions(servers, &keys).await?)?
        }
        Commands::Keys { term: Some(term) } => {
            print_json(&fleet.resolver.search_keys(servers, &term).await?)?
        }
        Commands::Keys { term: None } => print_json(&fleet.resolver.all_definitions(servers).await)?,
        Commands::Owner { key } => {
            print_json(&fleet.resolver.resolve_owner_customer(servers, &key).await?)?
        }
        Commands::Search { numbers } => {
            print_json(&fleet.search.find_occurrences(servers, &numbers).await?)?
        }
        Commands::Cleanup(CleanupCommand::Scan { numbers }) => {
            let plan = fleet.matcher.scan(servers, &numbers).await?;
            let tasks: Vec<CleanupTask> = plan.items.iter().map(|c| c.to_task()).collect();
            print_json(&json!({ "plan": plan, "proposed_tasks": tasks }))?
        }
        Commands::Cleanup(CleanupCommand::Apply { tasks }) => {
            let tasks: Vec<CleanupTask> = serde_json::from_str(&read_input(&tasks)?)?;
            print_json(&fleet.applier.apply(tasks).await)?
        }
        Commands::Customer(cmd) => run_customer(fleet, cmd).await?,
    }
    Ok(())
}

async fn run_mapping(fleet: &Fleet, command: GatewayCommand) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        GatewayCommand::List { server, filter } => {
            let server = fleet.registry.require(&server)?;
            print_json(&fleet.mappings.list_all(server, filter.as_deref()).await?)
        }
        GatewayCommand::Show(target) => {
            let server = fleet.registry.require(&target.server)?;
            let mg = fleet.mappings.get_by_name(server, &target.name).await?;
            print_json(&json!({ "hash": mg.content_hash(), "gateway": mg }))
        }
        GatewayCommand::Update(args) => {
            let server = fleet.registry.require(&args.target.server)?;
            let payload = read_payload(&args.payload)?;
            fleet
                .mappings
                .update(server, &args.target.name, payload, args.hash.as_ref())
                .await?;
            print_json(&json!({ "status": "updated", "gateway": args.target.name }))
        }
    }
}

async fn run_routing(fleet: &Fleet, command: RoutingCommand) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        RoutingCommand::Common(GatewayCommand::List { server, filter }) => {
            let server = fleet.registry.require(&server)?;
            print_json(&fleet.routings.list_all(server, filter.as_deref()).await?)
        }
        RoutingCommand::Common(GatewayCommand::Show(target)) => {
            let server = fleet.registry.require(&target.server)?;
            let rg = fleet.routings.get_by_name(server, &target.name).await?;
            print_json(&json!({ "hash": rg.content_hash(), "gateway": rg }))
        }
        RoutingCommand::Common(GatewayCommand::Update(args)) => {
            let server = fleet.registry.require(&args.target.server)?;
            let payload = read_payload(&args.payload)?;
            fleet
                .routings
                .update(server, &args.target.name, payload, args.hash.as_ref())
                .await?;
            print_json(&json!({ "status": "updated", "gateway": args.target.name }))
        }
        RoutingCommand::AddReals {
            target,
            key,
            reals,
            hash,
        } => {
            let server = fleet.registry.require(&target.server)?;
            let definition = fleet
                .routings
                .add_real_numbers(server, &target.name, &key, &reals, hash.as_ref())
                .await?;
            print_json(&definition)
        }
        RoutingCommand::Status { target, key } => {
            let server = fleet.registry.require(&target.server)?;
            print_json(
                &fleet
                    .routings
                    .virtual_number_status(server, &target.name, &key)
                    .await?,
            )
        }
    }
}

async fn run_customer(fleet: &Fleet, command: CustomerCommand) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        CustomerCommand::Show { server, account } => {
            let server = fleet.registry.require(&server)?;
            let customer = fleet.customers.get(server, &account).await?;
            print_json(&json!({
                "hash": customer.content_hash(),
                "locked": customer.is_locked(),
                "credit_limit": customer.credit_limit(),
                "customer": customer,
            }))
        }
        CustomerCommand::Search { filter } => {
            print_json(&fleet.customers.search(fleet.registry.all(), &filter).await?)
        }
        CustomerCommand::CreditLimit {
            server,
            account,
            limit,
            hash,
        } => {
            let server = fleet.registry.require(&server)?;
            fleet
                .customers
                .update_credit_limit(server, &account, &limit, hash.as_ref())
                .await?;
            print_json(&json!({ "status": "updated", "account": account, "limitMoney": limit }))
        }
        CustomerCommand::Lock {
            server,
            account,
            unlock,
            hash,
        } => {
            let server = fleet.registry.require(&server)?;
            fleet
                .customers
                .update_lock_status(server, &account, !unlock, hash.as_ref())
                .await?;
            print_json(&json!({ "status": "updated", "account": account, "locked": !unlock }))
        }
    }
}

fn read_input(path: &Path) -> io::Result<String> {
    if path.as_os_str() == "-" {
        io::read_to_string(io::stdin())
    } else {
        fs::read_to_string(path)
    }
}

fn read_payload(path: &Path) -> Result<Payload, Box<dyn std::error::Error>> {
    let value: serde_json::Value = serde_json::from_str(&read_input(path)?)?;
    Ok(Payload::from_value(value)?)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
