use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const USER_SCHEMA_VERSION: u8 = 1;
pub const TASK_SCHEMA_VERSION: u8 = 1;
pub const PRODUCT_SCHEMA_VERSION: u8 = 1;
pub const TREASURE_SCHEMA_VERSION: u8 = 1;

/// Days until an unassigned task expires.
pub const TASK_EXPIRY_DAYS: i64 = 14;

/// Months in which the seasonal allowance may be distributed.
pub const ALLOWANCE_MONTHS: [u32; 4] = [12, 1, 2, 3];

/// Default amount credited per member during an allowance run.
pub const MONTHLY_ALLOWANCE: u32 = 100;

/// Generate a fresh record identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Staff,
}

/// Task difficulty tier. Each tier carries a fixed experience value and a
/// suggested reward band; the band is guidance at creation time only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskRank {
    S,
    B,
    F,
}

/// Per-tier reward guidance and fixed experience value.
pub struct RankProfile {
    pub name: &'static str,
    pub min_reward: u32,
    pub max_reward: u32,
    pub exp: u32,
}

impl TaskRank {
    pub fn profile(&self) -> RankProfile {
        match self {
            TaskRank::S => RankProfile {
                name: "Legendary",
                min_reward: 200,
                max_reward: 999,
                exp: 150,
            },
            TaskRank::B => RankProfile {
                name: "Standard",
                min_reward: 51,
                max_reward: 200,
                exp: 40,
            },
            TaskRank::F => RankProfile {
                name: "Easy",
                min_reward: 10,
                max_reward: 50,
                exp: 10,
            },
        }
    }

    /// Experience granted to the assignee when a task of this rank completes.
    pub fn exp(&self) -> u32 {
        self.profile().exp
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Guild-funded work, open to the whole roster.
    Guild,
    /// Personal errand funded by the creator (escrowed at creation).
    Solo,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    Accepting,
    InProgress,
    PendingVerification,
    Completed,
    Cancelled,
    Expired,
}

impl TaskStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Cancelled | TaskStatus::Expired
        )
    }

    /// States in which applicants may still join and an assignee may be picked.
    pub fn accepts_applicants(&self) -> bool {
        matches!(self, TaskStatus::Open | TaskStatus::Accepting)
    }
}

/// Adventurer progression tier, derived from cumulative experience.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AdventurerRank {
    Bronze,
    Silver,
    Gold,
}

impl AdventurerRank {
    pub fn threshold(&self) -> u32 {
        match self {
            AdventurerRank::Bronze => 0,
            AdventurerRank::Silver => 600,
            AdventurerRank::Gold => 2000,
        }
    }
}

/// Quest-master progression tier, derived from the count of completed tasks
/// the user authored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum QuestMasterRank {
    Apprentice,
    Senior,
    Legendary,
}

impl QuestMasterRank {
    pub fn threshold(&self) -> u32 {
        match self {
            QuestMasterRank::Apprentice => 0,
            QuestMasterRank::Senior => 20,
            QuestMasterRank::Legendary => 60,
        }
    }
}

/// Achievement badge earned by a user. Badges feed cosmetic frame unlocks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub description: String,
    pub earned_at: DateTime<Utc>,
}

impl Badge {
    pub fn new(id: &str, name: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            earned_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: UserRole,
    /// Spendable balance. Authoritative; the transaction log is an audit trail.
    pub pure_coins: u32,
    pub adventurer_exp: u32,
    /// Denormalized cache of `rank::adventurer_rank(adventurer_exp)`.
    /// Recomputed by the store on every write, never set directly.
    pub adventurer_rank: AdventurerRank,
    pub quest_master_completions: u32,
    /// Denormalized cache, same contract as `adventurer_rank`.
    pub quest_master_rank: QuestMasterRank,
    pub badges: Vec<Badge>,
    /// Cosmetic unlocks. Monotonic: recomputation unions, never removes.
    pub unlocked_frames: Vec<String>,
    /// Currently selected frame; must be a member of `unlocked_frames`.
    pub avatar_frame: Option<String>,
    pub reputation_score: u32,
    pub total_ratings: u32,
    pub created_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl User {
    pub fn new(name: &str, role: UserRole) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            role,
            pure_coins: 0,
            adventurer_exp: 0,
            adventurer_rank: AdventurerRank::Bronze,
            quest_master_completions: 0,
            quest_master_rank: QuestMasterRank::Apprentice,
            badges: Vec::new(),
            unlocked_frames: vec!["default".to_string()],
            avatar_frame: None,
            reputation_score: 0,
            total_ratings: 0,
            created_at: Utc::now(),
            schema_version: USER_SCHEMA_VERSION,
        }
    }

    pub fn has_badge(&self, badge_id: &str) -> bool {
        self.badges.iter().any(|b| b.id == badge_id)
    }

    /// Average received rating, if any ratings exist. Derived, never stored.
    pub fn reputation_average(&self) -> Option<f64> {
        if self.total_ratings == 0 {
            None
        } else {
            Some(f64::from(self.reputation_score) / f64::from(self.total_ratings))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskApplicant {
    pub user_id: String,
    pub user_name: String,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRating {
    pub from_user_id: String,
    pub to_user_id: String,
    /// Clamped to 1..=5 at submission.
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub kind: TaskKind,
    pub rank: TaskRank,
    pub reward: u32,
    /// Fixed from the rank profile at creation; immutable afterward.
    pub exp: u32,
    pub status: TaskStatus,
    pub creator_id: String,
    pub creator_name: String,
    pub assignee_id: Option<String>,
    pub assignee_name: Option<String>,
    /// Insertion-ordered, unique per user.
    pub applicants: Vec<TaskApplicant>,
    pub proof_image_uri: Option<String>,
    /// At most one rating per (rater, ratee) pair.
    pub ratings: Vec<TaskRating>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub schema_version: u8,
}

impl Task {
    pub fn new(
        title: &str,
        description: &str,
        kind: TaskKind,
        rank: TaskRank,
        reward: u32,
        creator: &User,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            title: title.to_string(),
            description: description.to_string(),
            kind,
            rank,
            reward,
            exp: rank.exp(),
            status: TaskStatus::Open,
            creator_id: creator.id.clone(),
            creator_name: creator.name.clone(),
            assignee_id: None,
            assignee_name: None,
            applicants: Vec::new(),
            proof_image_uri: None,
            ratings: Vec::new(),
            created_at: now,
            expires_at: now + chrono::Duration::days(TASK_EXPIRY_DAYS),
            accepted_at: None,
            completed_at: None,
            schema_version: TASK_SCHEMA_VERSION,
        }
    }

    pub fn has_applicant(&self, user_id: &str) -> bool {
        self.applicants.iter().any(|a| a.user_id == user_id)
    }

    pub fn has_rating_pair(&self, from: &str, to: &str) -> bool {
        self.ratings
            .iter()
            .any(|r| r.from_user_id == from && r.to_user_id == to)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Physical,
    /// Virtual items require an admin-reviewed use request after redemption.
    Virtual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: ProductCategory,
    pub price: u32,
    /// Remaining stock; decremented with each redemption, never negative.
    pub stock: u32,
    /// Minimum adventurer rank required to redeem, if gated.
    pub min_rank: Option<AdventurerRank>,
    pub image_uri: Option<String>,
    pub created_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl Product {
    pub fn new(
        name: &str,
        description: &str,
        category: ProductCategory,
        price: u32,
        stock: u32,
    ) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            description: description.to_string(),
            category,
            price,
            stock,
            min_rank: None,
            image_uri: None,
            created_at: Utc::now(),
            schema_version: PRODUCT_SCHEMA_VERSION,
        }
    }

}

/// Immutable receipt of one redeem event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Redemption {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub product_id: String,
    pub product_name: String,
    pub price: u32,
    pub redeemed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    TaskReward,
    TaskPublish,
    Redemption,
    Allowance,
    AdminAdjust,
}

/// Immutable ledger entry. The sum of a user's entries is not the
/// authoritative balance; it is an audit trail kept consistent with every
/// balance mutation by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    pub kind: TransactionKind,
    pub description: String,
    pub related_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        user_id: &str,
        amount: i64,
        kind: TransactionKind,
        description: &str,
        related_id: Option<&str>,
    ) -> Self {
        Self {
            id: new_id(),
            user_id: user_id.to_string(),
            amount,
            kind,
            description: description.to_string(),
            related_id: related_id.map(str::to_string),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TreasureKind {
    /// Deposited automatically when a product redemption succeeds.
    Product,
    /// Deposited automatically when a task completes.
    TaskProof,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TreasureUseStatus {
    Unused,
    Pending,
    Used,
}

/// Per-user inventory entry representing something earned or redeemed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreasureItem {
    pub id: String,
    pub user_id: String,
    pub kind: TreasureKind,
    pub name: String,
    pub description: String,
    pub image_uri: Option<String>,
    pub category: Option<ProductCategory>,
    pub task_rank: Option<TaskRank>,
    pub task_exp: Option<u32>,
    pub task_reward: Option<u32>,
    pub acquired_at: DateTime<Utc>,
    /// Task or product this item was minted from.
    pub related_id: String,
    pub use_status: TreasureUseStatus,
    pub use_requested_at: Option<DateTime<Utc>>,
    pub used_at: Option<DateTime<Utc>>,
    pub schema_version: u8,
}

impl TreasureItem {
    /// Proof-of-completion item deposited for the assignee of a finished task.
    pub fn task_proof(task: &Task, now: DateTime<Utc>) -> Self {
        let assignee = task.assignee_id.clone().unwrap_or_default();
        Self {
            id: new_id(),
            user_id: assignee,
            kind: TreasureKind::TaskProof,
            name: format!("Task proof: {}", task.title),
            description: format!(
                "Completed a rank {:?} task for {} coins and {} exp",
                task.rank, task.reward, task.exp
            ),
            image_uri: task.proof_image_uri.clone(),
            category: None,
            task_rank: Some(task.rank),
            task_exp: Some(task.exp),
            task_reward: Some(task.reward),
            acquired_at: now,
            related_id: task.id.clone(),
            use_status: TreasureUseStatus::Unused,
            use_requested_at: None,
            used_at: None,
            schema_version: TREASURE_SCHEMA_VERSION,
        }
    }

    /// Inventory copy of a redeemed product.
    pub fn from_product(user_id: &str, product: &Product, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            user_id: user_id.to_string(),
            kind: TreasureKind::Product,
            name: product.name.clone(),
            description: product.description.clone(),
            image_uri: product.image_uri.clone(),
            category: Some(product.category),
            task_rank: None,
            task_exp: None,
            task_reward: None,
            acquired_at: now,
            related_id: product.id.clone(),
            use_status: TreasureUseStatus::Unused,
            use_requested_at: None,
            used_at: None,
            schema_version: TREASURE_SCHEMA_VERSION,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

/// One request to use a virtual treasure item, resolved by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreasureReviewRequest {
    pub id: String,
    pub treasure_id: String,
    pub treasure_name: String,
    pub user_id: String,
    pub user_name: String,
    pub requested_at: DateTime<Utc>,
    pub status: ReviewStatus,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
}

/// One per (month, year) successfully distributed; existence is the
/// idempotence guard against double distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowanceRecord {
    pub id: String,
    pub month: u32,
    pub year: i32,
    pub amount: u32,
    pub recipient_count: usize,
    pub distributed_at: DateTime<Utc>,
    pub distributed_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_profiles_match_tier_table() {
        assert_eq!(TaskRank::S.exp(), 150);
        assert_eq!(TaskRank::B.exp(), 40);
        assert_eq!(TaskRank::F.exp(), 10);
        let s = TaskRank::S.profile();
        assert_eq!((s.min_reward, s.max_reward), (200, 999));
    }

    #[test]
    fn new_task_derives_exp_and_expiry_from_rank() {
        let creator = User::new("admin", UserRole::Admin);
        let now = Utc::now();
        let task = Task::new("Wax boards", "wax them", TaskKind::Guild, TaskRank::F, 20, &creator, now);
        assert_eq!(task.exp, 10);
        assert_eq!(task.status, TaskStatus::Open);
        assert_eq!(task.expires_at, now + chrono::Duration::days(TASK_EXPIRY_DAYS));
        assert!(task.applicants.is_empty());
    }

    #[test]
    fn terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(TaskStatus::Expired.is_terminal());
        assert!(!TaskStatus::PendingVerification.is_terminal());
        assert!(TaskStatus::Open.accepts_applicants());
        assert!(TaskStatus::Accepting.accepts_applicants());
        assert!(!TaskStatus::InProgress.accepts_applicants());
    }

    #[test]
    fn reputation_average_is_derived() {
        let mut user = User::new("coach", UserRole::Staff);
        assert_eq!(user.reputation_average(), None);
        user.reputation_score = 9;
        user.total_ratings = 2;
        assert_eq!(user.reputation_average(), Some(4.5));
    }

    #[test]
    fn adventurer_rank_ordering_matches_thresholds() {
        assert!(AdventurerRank::Bronze < AdventurerRank::Silver);
        assert!(AdventurerRank::Silver < AdventurerRank::Gold);
        assert_eq!(AdventurerRank::Silver.threshold(), 600);
        assert_eq!(QuestMasterRank::Legendary.threshold(), 60);
    }
}
