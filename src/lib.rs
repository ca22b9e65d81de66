//! # Guildledger - a gamified task and reward ledger
//!
//! Guildledger tracks a small organization's bounty tasks, coin and
//! experience economy, product redemptions, and reviewed-use treasure
//! inventory. Members complete tasks to earn coins and experience, redeem
//! coins for products, and request admin approval to use virtual rewards.
//!
//! ## Features
//!
//! - **Task lifecycle**: creation, applications, assignment, proof
//!   submission, completion, ratings, and a time-based expiry sweep.
//! - **Economy**: an append-only transaction ledger paired with every
//!   balance mutation, solo-task escrow, and a season-gated allowance.
//! - **Progression**: adventurer and quest-master ranks derived from source
//!   counters, with monotone cosmetic frame unlocks.
//! - **Treasury**: per-user inventory of earned and redeemed items, with an
//!   admin review workflow for virtual item use.
//! - **Durability**: sled-backed per-record storage; multi-record operations
//!   commit through one atomic cross-tree batch.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use guildledger::guild::{self, GuildStore, NewTask, TaskKind, TaskRank, UserRole};
//!
//! fn main() -> anyhow::Result<()> {
//!     let store = GuildStore::open("data/guild")?;
//!     let admin = guild::create_user(&store, "Principal", UserRole::Admin)?;
//!     let task = guild::create_task(
//!         &store,
//!         NewTask {
//!             title: "Storeroom cleanup".to_string(),
//!             description: "Sort and count the gear".to_string(),
//!             kind: TaskKind::Guild,
//!             rank: TaskRank::B,
//!             reward: 100,
//!             creator_id: admin.id.clone(),
//!         },
//!         chrono::Utc::now(),
//!     )?;
//!     println!("created task {}", task.id);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`guild`] - The domain engine: types, storage, and all operations
//! - [`config`] - Configuration management

pub mod config;
pub mod guild;
