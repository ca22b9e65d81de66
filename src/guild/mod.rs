//! Guild ledger domain engine: member roster, task lifecycle, coin and
//! experience ledger, product redemption, treasure review workflow, and the
//! seasonal allowance. Persistence is a sled-backed per-record store; every
//! multi-record operation commits through one atomic batch.

use chrono::{DateTime, Utc};
use serde::Serialize;

pub mod allowance;
pub mod commerce;
pub mod errors;
pub mod ledger;
pub mod rank;
pub mod seed;
pub mod storage;
pub mod tasks;
pub mod treasure;
pub mod types;
pub mod users;

pub use allowance::{annual_reset, distribute};
pub use commerce::{create_product, delete_product, redeem, update_product, NewProduct, ProductPatch};
pub use errors::GuildError;
pub use ledger::{adjust_coins, record_transaction, user_transactions};
pub use rank::{adventurer_rank, frame_catalog, quest_master_rank, unlocked_frames};
pub use seed::seed_demo_if_needed;
pub use storage::{GuildStore, GuildStoreBuilder, WriteBatch};
pub use tasks::{
    accept_task_direct, apply_for_task, assign_task, cancel_task, complete_task, create_task,
    rate_task, submit_proof, sweep_expired_tasks, NewTask,
};
pub use treasure::{pending_reviews, request_use, review_use, user_treasures};
pub use types::*;
pub use users::{change_role, create_user, delete_user, grant_frame, rename_user, select_frame};

/// Fresh reads of every collection, for collaborators rendering state.
#[derive(Debug, Serialize)]
pub struct Snapshot {
    pub users: Vec<User>,
    pub tasks: Vec<Task>,
    pub products: Vec<Product>,
    pub redemptions: Vec<Redemption>,
    pub transactions: Vec<Transaction>,
    pub treasures: Vec<TreasureItem>,
    pub reviews: Vec<TreasureReviewRequest>,
    pub allowances: Vec<AllowanceRecord>,
}

/// Run the expiry sweep, then return fresh reads of everything.
pub fn refresh(store: &GuildStore, now: DateTime<Utc>) -> Result<Snapshot, GuildError> {
    tasks::sweep_expired_tasks(store, now)?;
    Ok(Snapshot {
        users: store.list_users()?,
        tasks: store.list_tasks()?,
        products: store.list_products()?,
        redemptions: store.list_redemptions()?,
        transactions: store.list_transactions()?,
        treasures: store.list_treasures()?,
        reviews: store.list_reviews()?,
        allowances: store.list_allowances()?,
    })
}

/// Convenience wrapper for `refresh` at the current instant.
pub fn refresh_now(store: &GuildStore) -> Result<Snapshot, GuildError> {
    refresh(store, Utc::now())
}
