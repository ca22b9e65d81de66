use std::path::{Path, PathBuf};

use chrono::Utc;
use sled::IVec;

use crate::guild::errors::GuildError;
use crate::guild::rank;
use crate::guild::types::{
    AllowanceRecord, Product, Redemption, Task, Transaction, TreasureItem, TreasureReviewRequest,
    User, PRODUCT_SCHEMA_VERSION, TASK_SCHEMA_VERSION, TREASURE_SCHEMA_VERSION,
    USER_SCHEMA_VERSION,
};

const TREE_PRIMARY: &str = "guild";
const TREE_LEDGER: &str = "guild_ledger";
const TREE_TREASURY: &str = "guild_treasury";

fn next_timestamp_nanos() -> i64 {
    let now = Utc::now();
    now.timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros() * 1000)
}

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct GuildStoreBuilder {
    path: PathBuf,
}

impl GuildStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open(self) -> Result<GuildStore, GuildError> {
        GuildStore::open(self.path)
    }
}

/// Which tree a staged write targets.
#[derive(Debug, Clone, Copy)]
enum TreeKind {
    Primary,
    Ledger,
    Treasury,
}

/// A set of record writes applied atomically across all trees.
///
/// Multi-step operations (task completion, redemption, allowance runs) stage
/// every touched record here and commit once, so a crash can never leave a
/// balance credited without its ledger entry or vice versa.
#[derive(Default)]
pub struct WriteBatch {
    ops: Vec<(TreeKind, Vec<u8>, Vec<u8>)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn insert(&mut self, tree: TreeKind, key: Vec<u8>, bytes: Vec<u8>) {
        self.ops.push((tree, key, bytes));
    }
}

/// Sled-backed persistence for guild users, tasks, commerce, and treasury.
///
/// Every record lives under its own key, so a mutation touches exactly the
/// records an operation names and nothing else. Callers are expected to
/// sequence writes (single logical writer); the atomic batch commit removes
/// the partially-applied failure mode either way.
pub struct GuildStore {
    _db: sled::Db,
    primary: sled::Tree,
    ledger: sled::Tree,
    treasury: sled::Tree,
}

impl GuildStore {
    /// Open (or create) the guild store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GuildError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let primary = db.open_tree(TREE_PRIMARY)?;
        let ledger = db.open_tree(TREE_LEDGER)?;
        let treasury = db.open_tree(TREE_TREASURY)?;
        Ok(Self {
            _db: db,
            primary,
            ledger,
            treasury,
        })
    }

    fn user_key(id: &str) -> Vec<u8> {
        format!("users:{id}").into_bytes()
    }

    fn task_key(id: &str) -> Vec<u8> {
        format!("tasks:{id}").into_bytes()
    }

    fn product_key(id: &str) -> Vec<u8> {
        format!("products:{id}").into_bytes()
    }

    fn treasure_key(id: &str) -> Vec<u8> {
        format!("treasures:{id}").into_bytes()
    }

    fn review_key(id: &str) -> Vec<u8> {
        format!("reviews:{id}").into_bytes()
    }

    fn allowance_key(month: u32, year: i32) -> Vec<u8> {
        format!("allowance:{year:04}-{month:02}").into_bytes()
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, GuildError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: IVec) -> Result<T, GuildError> {
        Ok(bincode::deserialize::<T>(&bytes)?)
    }

    /// Recompute every derived user field from its source counters. This is
    /// the single entry point demanded by the data model: ranks and frame
    /// unlocks are a cache of the counters, never independently settable.
    fn finalize_user(user: &mut User) {
        user.schema_version = USER_SCHEMA_VERSION;
        user.adventurer_rank = rank::adventurer_rank(user.adventurer_exp);
        user.quest_master_rank = rank::quest_master_rank(user.quest_master_completions);
        user.unlocked_frames = rank::unlocked_frames(user);
    }

    // ---- staging (multi-record atomic operations) ----

    pub fn stage_user(&self, batch: &mut WriteBatch, user: &mut User) -> Result<(), GuildError> {
        Self::finalize_user(user);
        batch.insert(TreeKind::Primary, Self::user_key(&user.id), Self::serialize(user)?);
        Ok(())
    }

    pub fn stage_task(&self, batch: &mut WriteBatch, task: &Task) -> Result<(), GuildError> {
        batch.insert(TreeKind::Primary, Self::task_key(&task.id), Self::serialize(task)?);
        Ok(())
    }

    pub fn stage_product(&self, batch: &mut WriteBatch, product: &Product) -> Result<(), GuildError> {
        batch.insert(
            TreeKind::Primary,
            Self::product_key(&product.id),
            Self::serialize(product)?,
        );
        Ok(())
    }

    pub fn stage_transaction(
        &self,
        batch: &mut WriteBatch,
        txn: &Transaction,
    ) -> Result<(), GuildError> {
        // Timestamped keys keep the ledger in append order under prefix scans.
        let key = format!("txns:{:020}:{}", next_timestamp_nanos(), txn.id).into_bytes();
        batch.insert(TreeKind::Ledger, key, Self::serialize(txn)?);
        Ok(())
    }

    pub fn stage_redemption(
        &self,
        batch: &mut WriteBatch,
        redemption: &Redemption,
    ) -> Result<(), GuildError> {
        let key = format!("redemptions:{:020}:{}", next_timestamp_nanos(), redemption.id).into_bytes();
        batch.insert(TreeKind::Ledger, key, Self::serialize(redemption)?);
        Ok(())
    }

    pub fn stage_allowance(
        &self,
        batch: &mut WriteBatch,
        record: &AllowanceRecord,
    ) -> Result<(), GuildError> {
        batch.insert(
            TreeKind::Ledger,
            Self::allowance_key(record.month, record.year),
            Self::serialize(record)?,
        );
        Ok(())
    }

    pub fn stage_treasure(
        &self,
        batch: &mut WriteBatch,
        item: &TreasureItem,
    ) -> Result<(), GuildError> {
        batch.insert(
            TreeKind::Treasury,
            Self::treasure_key(&item.id),
            Self::serialize(item)?,
        );
        Ok(())
    }

    pub fn stage_review(
        &self,
        batch: &mut WriteBatch,
        request: &TreasureReviewRequest,
    ) -> Result<(), GuildError> {
        batch.insert(
            TreeKind::Treasury,
            Self::review_key(&request.id),
            Self::serialize(request)?,
        );
        Ok(())
    }

    /// Apply every staged write in one atomic cross-tree transaction.
    pub fn commit(&self, batch: WriteBatch) -> Result<(), GuildError> {
        use sled::transaction::TransactionError;
        use sled::Transactional;

        if batch.is_empty() {
            return Ok(());
        }
        let ops = batch.ops;
        (&self.primary, &self.ledger, &self.treasury)
            .transaction(|(primary, ledger, treasury)| {
                for (tree, key, bytes) in &ops {
                    let target = match tree {
                        TreeKind::Primary => primary,
                        TreeKind::Ledger => ledger,
                        TreeKind::Treasury => treasury,
                    };
                    target.insert(key.as_slice(), bytes.as_slice())?;
                }
                Ok(())
            })
            .map_err(|err| match err {
                TransactionError::Abort(()) => {
                    GuildError::Internal("write batch aborted".to_string())
                }
                TransactionError::Storage(e) => GuildError::Sled(e),
            })?;
        self.primary.flush()?;
        self.ledger.flush()?;
        self.treasury.flush()?;
        Ok(())
    }

    // ---- users ----

    /// Insert or update a user record, recomputing all derived fields.
    pub fn put_user(&self, user: &mut User) -> Result<(), GuildError> {
        let mut batch = WriteBatch::new();
        self.stage_user(&mut batch, user)?;
        self.commit(batch)
    }

    pub fn get_user(&self, id: &str) -> Result<User, GuildError> {
        let Some(bytes) = self.primary.get(Self::user_key(id))? else {
            return Err(GuildError::NotFound(format!("user: {id}")));
        };
        let record: User = Self::deserialize(bytes)?;
        if record.schema_version != USER_SCHEMA_VERSION {
            return Err(GuildError::SchemaMismatch {
                entity: "user",
                expected: USER_SCHEMA_VERSION,
                found: record.schema_version,
            });
        }
        Ok(record)
    }

    pub fn find_user(&self, id: &str) -> Result<Option<User>, GuildError> {
        match self.get_user(id) {
            Ok(user) => Ok(Some(user)),
            Err(GuildError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Remove a user record. Tasks and transactions the user touched remain,
    /// orphaned by reference.
    pub fn delete_user(&self, id: &str) -> Result<bool, GuildError> {
        let removed = self.primary.remove(Self::user_key(id))?.is_some();
        if removed {
            self.primary.flush()?;
        }
        Ok(removed)
    }

    pub fn list_users(&self) -> Result<Vec<User>, GuildError> {
        self.scan(&self.primary, b"users:")
    }

    // ---- tasks ----

    pub fn put_task(&self, task: &Task) -> Result<(), GuildError> {
        let mut batch = WriteBatch::new();
        self.stage_task(&mut batch, task)?;
        self.commit(batch)
    }

    pub fn get_task(&self, id: &str) -> Result<Task, GuildError> {
        let Some(bytes) = self.primary.get(Self::task_key(id))? else {
            return Err(GuildError::NotFound(format!("task: {id}")));
        };
        let record: Task = Self::deserialize(bytes)?;
        if record.schema_version != TASK_SCHEMA_VERSION {
            return Err(GuildError::SchemaMismatch {
                entity: "task",
                expected: TASK_SCHEMA_VERSION,
                found: record.schema_version,
            });
        }
        Ok(record)
    }

    pub fn find_task(&self, id: &str) -> Result<Option<Task>, GuildError> {
        match self.get_task(id) {
            Ok(task) => Ok(Some(task)),
            Err(GuildError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>, GuildError> {
        self.scan(&self.primary, b"tasks:")
    }

    // ---- products ----

    pub fn put_product(&self, product: &Product) -> Result<(), GuildError> {
        let mut batch = WriteBatch::new();
        self.stage_product(&mut batch, product)?;
        self.commit(batch)
    }

    pub fn get_product(&self, id: &str) -> Result<Product, GuildError> {
        let Some(bytes) = self.primary.get(Self::product_key(id))? else {
            return Err(GuildError::NotFound(format!("product: {id}")));
        };
        let record: Product = Self::deserialize(bytes)?;
        if record.schema_version != PRODUCT_SCHEMA_VERSION {
            return Err(GuildError::SchemaMismatch {
                entity: "product",
                expected: PRODUCT_SCHEMA_VERSION,
                found: record.schema_version,
            });
        }
        Ok(record)
    }

    /// Remove a product. Already-issued redemptions and treasure items are
    /// not retracted.
    pub fn delete_product(&self, id: &str) -> Result<bool, GuildError> {
        let removed = self.primary.remove(Self::product_key(id))?.is_some();
        if removed {
            self.primary.flush()?;
        }
        Ok(removed)
    }

    pub fn list_products(&self) -> Result<Vec<Product>, GuildError> {
        self.scan(&self.primary, b"products:")
    }

    // ---- ledger ----

    pub fn list_transactions(&self) -> Result<Vec<Transaction>, GuildError> {
        self.scan(&self.ledger, b"txns:")
    }

    pub fn list_redemptions(&self) -> Result<Vec<Redemption>, GuildError> {
        self.scan(&self.ledger, b"redemptions:")
    }

    pub fn list_allowances(&self) -> Result<Vec<AllowanceRecord>, GuildError> {
        self.scan(&self.ledger, b"allowance:")
    }

    /// Whether an allowance has already been distributed for (month, year).
    pub fn allowance_exists(&self, month: u32, year: i32) -> Result<bool, GuildError> {
        Ok(self.ledger.get(Self::allowance_key(month, year))?.is_some())
    }

    // ---- treasury ----

    pub fn put_treasure(&self, item: &TreasureItem) -> Result<(), GuildError> {
        let mut batch = WriteBatch::new();
        self.stage_treasure(&mut batch, item)?;
        self.commit(batch)
    }

    pub fn get_treasure(&self, id: &str) -> Result<TreasureItem, GuildError> {
        let Some(bytes) = self.treasury.get(Self::treasure_key(id))? else {
            return Err(GuildError::NotFound(format!("treasure: {id}")));
        };
        let record: TreasureItem = Self::deserialize(bytes)?;
        if record.schema_version != TREASURE_SCHEMA_VERSION {
            return Err(GuildError::SchemaMismatch {
                entity: "treasure",
                expected: TREASURE_SCHEMA_VERSION,
                found: record.schema_version,
            });
        }
        Ok(record)
    }

    pub fn find_treasure(&self, id: &str) -> Result<Option<TreasureItem>, GuildError> {
        match self.get_treasure(id) {
            Ok(item) => Ok(Some(item)),
            Err(GuildError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn delete_treasure(&self, id: &str) -> Result<bool, GuildError> {
        let removed = self.treasury.remove(Self::treasure_key(id))?.is_some();
        if removed {
            self.treasury.flush()?;
        }
        Ok(removed)
    }

    pub fn list_treasures(&self) -> Result<Vec<TreasureItem>, GuildError> {
        self.scan(&self.treasury, b"treasures:")
    }

    pub fn put_review(&self, request: &TreasureReviewRequest) -> Result<(), GuildError> {
        let mut batch = WriteBatch::new();
        self.stage_review(&mut batch, request)?;
        self.commit(batch)
    }

    pub fn get_review(&self, id: &str) -> Result<TreasureReviewRequest, GuildError> {
        let Some(bytes) = self.treasury.get(Self::review_key(id))? else {
            return Err(GuildError::NotFound(format!("review request: {id}")));
        };
        Self::deserialize(bytes)
    }

    pub fn list_reviews(&self) -> Result<Vec<TreasureReviewRequest>, GuildError> {
        self.scan(&self.treasury, b"reviews:")
    }

    fn scan<T: serde::de::DeserializeOwned>(
        &self,
        tree: &sled::Tree,
        prefix: &[u8],
    ) -> Result<Vec<T>, GuildError> {
        tree.scan_prefix(prefix)
            .map(|entry| {
                entry
                    .map_err(GuildError::from)
                    .and_then(|(_key, value)| Self::deserialize(value))
            })
            .collect()
    }
}
