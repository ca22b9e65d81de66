//! Binary entrypoint for the Guildledger CLI.
//!
//! Commands:
//! - `init` - create a starter `config.toml` and an empty data directory
//! - `seed` - load the demo roster, tasks, and shop into an empty store
//! - `status` - print a short summary of the store
//! - `refresh` - run the expiry sweep and dump every collection as JSON
//! - `user`, `task`, `shop`, `treasure`, `allowance` - operation groups
//!
//! See the library crate docs for module-level details: `guildledger::`.
use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::info;

use guildledger::config::Config;
use guildledger::guild::{
    self, AdventurerRank, GuildStore, NewProduct, NewTask, ProductCategory, ProductPatch,
    TaskKind, TaskRank, UserRole,
};

#[derive(Parser)]
#[command(name = "guildledger")]
#[command(about = "A gamified task and reward ledger for small organizations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file and data directory
    Init,
    /// Seed an empty store with a demo roster, tasks, and shop
    Seed,
    /// Show a short store summary
    Status,
    /// Run the expiry sweep and print every collection as JSON
    Refresh,
    /// Member management
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Task lifecycle operations
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Product catalog and redemption
    Shop {
        #[command(subcommand)]
        action: ShopAction,
    },
    /// Treasure inventory and the use-review queue
    Treasure {
        #[command(subcommand)]
        action: TreasureAction,
    },
    /// Seasonal allowance and the annual reset
    Allowance {
        #[command(subcommand)]
        action: AllowanceAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a member
    Create {
        name: String,
        /// admin | staff
        #[arg(long, default_value = "staff")]
        role: String,
    },
    /// List all members
    List,
    /// Print one member's transaction history
    History { user_id: String },
    /// Remove a member (their tasks and ledger entries remain)
    Delete { user_id: String },
    /// Change a member's role
    SetRole {
        user_id: String,
        /// admin | staff
        role: String,
    },
    /// Rename a member
    Rename { user_id: String, name: String },
    /// Apply a signed coin adjustment with an audit entry
    Adjust {
        user_id: String,
        #[arg(allow_negative_numbers = true)]
        delta: i64,
        #[arg(long, default_value = "Manual adjustment")]
        reason: String,
    },
    /// Select an unlocked avatar frame
    SetFrame { user_id: String, frame_id: String },
    /// Grant a commemorative frame that is never earned through counters
    GrantFrame { user_id: String, frame_id: String },
}

#[derive(Subcommand)]
enum TaskAction {
    /// Publish a task
    Create {
        title: String,
        /// s | b | f
        #[arg(long)]
        rank: String,
        /// guild | solo
        #[arg(long, default_value = "guild")]
        kind: String,
        #[arg(long)]
        reward: u32,
        #[arg(long)]
        creator: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List all tasks
    List,
    /// Apply for a pooled task
    Apply { task_id: String, user_id: String },
    /// Assign a pooled task to one of its applicants
    Assign { task_id: String, user_id: String },
    /// Accept a task directly, skipping the applicant pool
    Accept { task_id: String, user_id: String },
    /// Attach completion proof to an in-progress task
    Submit { task_id: String, proof_uri: String },
    /// Verify a submitted task and pay out its reward
    Complete { task_id: String },
    /// Leave a 1-5 star rating on a completed task
    Rate {
        task_id: String,
        from: String,
        to: String,
        rating: u8,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Cancel a task that has not finished
    Cancel { task_id: String },
    /// Expire overdue open tasks
    Sweep,
}

#[derive(Subcommand)]
enum ShopAction {
    /// Add a product to the catalog
    Add {
        name: String,
        #[arg(long)]
        price: u32,
        #[arg(long)]
        stock: u32,
        /// physical | virtual
        #[arg(long, default_value = "virtual")]
        kind: String,
        /// bronze | silver | gold
        #[arg(long)]
        min_rank: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List the catalog
    List,
    /// Change catalog fields on an existing product
    Update {
        product_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        price: Option<u32>,
        #[arg(long)]
        stock: Option<u32>,
        /// bronze | silver | gold, or "none" to drop the gate
        #[arg(long)]
        min_rank: Option<String>,
    },
    /// Remove a product (issued receipts and treasures remain)
    Delete { product_id: String },
    /// Redeem a product for a member
    Redeem { user_id: String, product_id: String },
}

#[derive(Subcommand)]
enum TreasureAction {
    /// List one member's treasure inventory
    List { user_id: String },
    /// Ask for approval to use a virtual treasure
    Request {
        treasure_id: String,
        requester_id: String,
    },
    /// Approve or reject a pending use request
    Review {
        request_id: String,
        reviewer_id: String,
        #[arg(long)]
        reject: bool,
    },
    /// List unresolved use requests
    Pending,
}

#[derive(Subcommand)]
enum AllowanceAction {
    /// Credit every member with the winter allowance
    Distribute {
        admin_id: String,
        #[arg(long)]
        amount: Option<u32>,
    },
    /// Zero every member's coin balance
    Reset { admin_id: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Commands::Init = cli.command {
        return cmd_init(&cli.config);
    }

    let config = Config::load_or_default(&cli.config)?;
    let store = GuildStore::open(&config.storage.data_dir)?;

    match cli.command {
        Commands::Init => unreachable!(),
        Commands::Seed => {
            let created = guild::seed_demo_if_needed(&store)?;
            if created == 0 {
                println!("Store already has members; nothing seeded.");
            } else {
                println!("Seeded {created} demo records.");
            }
        }
        Commands::Status => cmd_status(&store)?,
        Commands::Refresh => {
            let snapshot = guild::refresh_now(&store)?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Commands::User { action } => match action {
            UserAction::Create { name, role } => {
                let user = guild::create_user(&store, &name, parse_role(&role)?)?;
                print_json(&user)?;
            }
            UserAction::List => print_json(&store.list_users()?)?,
            UserAction::History { user_id } => {
                print_json(&guild::user_transactions(&store, &user_id)?)?
            }
            UserAction::Delete { user_id } => {
                if guild::delete_user(&store, &user_id)? {
                    println!("Deleted member {user_id}.");
                } else {
                    println!("No such member.");
                }
            }
            UserAction::SetRole { user_id, role } => {
                let user = guild::change_role(&store, &user_id, parse_role(&role)?)?;
                print_json(&user)?;
            }
            UserAction::Rename { user_id, name } => {
                print_json(&guild::rename_user(&store, &user_id, &name)?)?
            }
            UserAction::Adjust {
                user_id,
                delta,
                reason,
            } => print_json(&guild::adjust_coins(&store, &user_id, delta, &reason)?)?,
            UserAction::SetFrame { user_id, frame_id } => {
                print_json(&guild::select_frame(&store, &user_id, &frame_id)?)?
            }
            UserAction::GrantFrame { user_id, frame_id } => {
                print_json(&guild::grant_frame(&store, &user_id, &frame_id)?)?
            }
        },
        Commands::Task { action } => cmd_task(&store, action)?,
        Commands::Shop { action } => match action {
            ShopAction::Add {
                name,
                price,
                stock,
                kind,
                min_rank,
                description,
            } => {
                let product = guild::create_product(
                    &store,
                    NewProduct {
                        name,
                        description,
                        category: parse_category(&kind)?,
                        price,
                        stock,
                        min_rank: min_rank.as_deref().map(parse_adventurer_rank).transpose()?,
                        image_uri: None,
                    },
                )?;
                print_json(&product)?;
            }
            ShopAction::List => print_json(&store.list_products()?)?,
            ShopAction::Update {
                product_id,
                name,
                description,
                price,
                stock,
                min_rank,
            } => {
                let min_rank = match min_rank.as_deref() {
                    None => None,
                    Some("none") => Some(None),
                    Some(rank) => Some(Some(parse_adventurer_rank(rank)?)),
                };
                let patch = ProductPatch {
                    name,
                    description,
                    price,
                    stock,
                    min_rank,
                    image_uri: None,
                };
                match guild::update_product(&store, &product_id, patch)? {
                    Some(product) => print_json(&product)?,
                    None => println!("No such product."),
                }
            }
            ShopAction::Delete { product_id } => {
                if guild::delete_product(&store, &product_id)? {
                    println!("Deleted product {product_id}.");
                } else {
                    println!("No such product.");
                }
            }
            ShopAction::Redeem {
                user_id,
                product_id,
            } => {
                let receipt = guild::redeem(&store, &user_id, &product_id, Utc::now())?;
                print_json(&receipt)?;
            }
        },
        Commands::Treasure { action } => match action {
            TreasureAction::List { user_id } => {
                print_json(&guild::user_treasures(&store, &user_id)?)?
            }
            TreasureAction::Request {
                treasure_id,
                requester_id,
            } => {
                let request =
                    guild::request_use(&store, &treasure_id, &requester_id, Utc::now())?;
                print_json(&request)?;
            }
            TreasureAction::Review {
                request_id,
                reviewer_id,
                reject,
            } => {
                let request =
                    guild::review_use(&store, &request_id, !reject, &reviewer_id, Utc::now())?;
                print_json(&request)?;
            }
            TreasureAction::Pending => print_json(&guild::pending_reviews(&store)?)?,
        },
        Commands::Allowance { action } => match action {
            AllowanceAction::Distribute { admin_id, amount } => {
                let amount = amount.unwrap_or(config.economy.monthly_allowance);
                let record = guild::distribute(&store, &admin_id, amount, Utc::now())?;
                print_json(&record)?;
            }
            AllowanceAction::Reset { admin_id } => {
                let touched = guild::annual_reset(&store, &admin_id)?;
                println!("Reset {touched} member balance(s) to zero.");
            }
        },
    }

    Ok(())
}

fn cmd_init(config_path: &str) -> Result<()> {
    if std::path::Path::new(config_path).exists() {
        println!("Config already exists at {config_path}");
    } else {
        Config::create_default(config_path)?;
        println!("Wrote default config to {config_path}");
    }
    let config = Config::load(config_path)?;
    GuildStore::open(&config.storage.data_dir)?;
    println!("Data directory ready at {}", config.storage.data_dir);
    Ok(())
}

fn cmd_status(store: &GuildStore) -> Result<()> {
    let users = store.list_users()?;
    let tasks = store.list_tasks()?;
    let open = tasks.iter().filter(|t| !t.status.is_terminal()).count();
    println!("Guildledger v{}", env!("CARGO_PKG_VERSION"));
    println!("  members:       {}", users.len());
    println!("  tasks:         {} ({} active)", tasks.len(), open);
    println!("  products:      {}", store.list_products()?.len());
    println!("  transactions:  {}", store.list_transactions()?.len());
    println!(
        "  pending reviews: {}",
        guild::pending_reviews(store)?.len()
    );
    Ok(())
}

fn cmd_task(store: &GuildStore, action: TaskAction) -> Result<()> {
    let now = Utc::now();
    match action {
        TaskAction::Create {
            title,
            rank,
            kind,
            reward,
            creator,
            description,
        } => {
            let task = guild::create_task(
                store,
                NewTask {
                    title,
                    description,
                    kind: parse_task_kind(&kind)?,
                    rank: parse_task_rank(&rank)?,
                    reward,
                    creator_id: creator,
                },
                now,
            )?;
            print_json(&task)?;
        }
        TaskAction::List => print_json(&store.list_tasks()?)?,
        TaskAction::Apply { task_id, user_id } => {
            print_optional(guild::apply_for_task(store, &task_id, &user_id, now)?)?
        }
        TaskAction::Assign { task_id, user_id } => {
            print_optional(guild::assign_task(store, &task_id, &user_id, now)?)?
        }
        TaskAction::Accept { task_id, user_id } => {
            print_optional(guild::accept_task_direct(store, &task_id, &user_id, now)?)?
        }
        TaskAction::Submit { task_id, proof_uri } => {
            print_optional(guild::submit_proof(store, &task_id, &proof_uri)?)?
        }
        TaskAction::Complete { task_id } => {
            let (task, assignee) = guild::complete_task(store, &task_id, now)?;
            info!(
                "task {} completed; {} earned {} coins",
                task.id, assignee.name, task.reward
            );
            print_json(&task)?;
        }
        TaskAction::Rate {
            task_id,
            from,
            to,
            rating,
            comment,
        } => print_optional(guild::rate_task(
            store,
            &task_id,
            &from,
            &to,
            rating,
            comment.as_deref(),
            now,
        )?)?,
        TaskAction::Cancel { task_id } => print_optional(guild::cancel_task(store, &task_id)?)?,
        TaskAction::Sweep => {
            let expired = guild::sweep_expired_tasks(store, now)?;
            println!("Expired {} task(s).", expired.len());
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_optional(task: Option<guild::Task>) -> Result<()> {
    match task {
        Some(task) => print_json(&task),
        None => {
            println!("No such task.");
            Ok(())
        }
    }
}

fn parse_role(s: &str) -> Result<UserRole> {
    match s.to_ascii_lowercase().as_str() {
        "admin" => Ok(UserRole::Admin),
        "staff" => Ok(UserRole::Staff),
        other => Err(anyhow!("unknown role '{other}' (expected admin or staff)")),
    }
}

fn parse_task_kind(s: &str) -> Result<TaskKind> {
    match s.to_ascii_lowercase().as_str() {
        "guild" => Ok(TaskKind::Guild),
        "solo" => Ok(TaskKind::Solo),
        other => Err(anyhow!("unknown task kind '{other}' (expected guild or solo)")),
    }
}

fn parse_task_rank(s: &str) -> Result<TaskRank> {
    match s.to_ascii_uppercase().as_str() {
        "S" => Ok(TaskRank::S),
        "B" => Ok(TaskRank::B),
        "F" => Ok(TaskRank::F),
        other => Err(anyhow!("unknown task rank '{other}' (expected S, B, or F)")),
    }
}

fn parse_adventurer_rank(s: &str) -> Result<AdventurerRank> {
    match s.to_ascii_lowercase().as_str() {
        "bronze" => Ok(AdventurerRank::Bronze),
        "silver" => Ok(AdventurerRank::Silver),
        "gold" => Ok(AdventurerRank::Gold),
        other => Err(anyhow!(
            "unknown adventurer rank '{other}' (expected bronze, silver, or gold)"
        )),
    }
}

fn parse_category(s: &str) -> Result<ProductCategory> {
    match s.to_ascii_lowercase().as_str() {
        "physical" => Ok(ProductCategory::Physical),
        "virtual" => Ok(ProductCategory::Virtual),
        other => Err(anyhow!(
            "unknown product kind '{other}' (expected physical or virtual)"
        )),
    }
}


fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(level)
        .init();
}
