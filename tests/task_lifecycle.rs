/// End-to-end task lifecycle: publish, apply, assign, submit, complete, rate.
use chrono::{Duration, Utc};
use tempfile::TempDir;

use guildledger::guild::{
    self, GuildError, GuildStore, NewTask, TaskKind, TaskRank, TaskStatus, TransactionKind,
    TreasureKind, UserRole,
};

fn open_store(dir: &TempDir) -> GuildStore {
    GuildStore::open(dir.path()).expect("open store")
}

fn publish(store: &GuildStore, creator_id: &str, rank: TaskRank, reward: u32) -> guild::Task {
    guild::create_task(
        store,
        NewTask {
            title: "Storeroom cleanup".to_string(),
            description: "Sort and count the gear".to_string(),
            kind: TaskKind::Guild,
            rank,
            reward,
            creator_id: creator_id.to_string(),
        },
        Utc::now(),
    )
    .expect("create task")
}

#[test]
fn full_lifecycle_pays_reward_exp_and_mints_proof() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let admin = guild::create_user(&store, "Principal", UserRole::Admin).unwrap();
    let worker = guild::create_user(&store, "Ming", UserRole::Staff).unwrap();

    let task = publish(&store, &admin.id, TaskRank::F, 20);
    assert_eq!(task.status, TaskStatus::Open);
    assert_eq!(task.exp, 10);

    let task = guild::apply_for_task(&store, &task.id, &worker.id, Utc::now())
        .unwrap()
        .expect("task exists");
    assert_eq!(task.status, TaskStatus::Accepting);
    assert_eq!(task.applicants.len(), 1);

    let task = guild::assign_task(&store, &task.id, &worker.id, Utc::now())
        .unwrap()
        .expect("task exists");
    assert_eq!(task.status, TaskStatus::InProgress);
    assert_eq!(task.assignee_id.as_deref(), Some(worker.id.as_str()));

    let task = guild::submit_proof(&store, &task.id, "proofs/cleanup.jpg")
        .unwrap()
        .expect("task exists");
    assert_eq!(task.status, TaskStatus::PendingVerification);

    let (task, paid_worker) = guild::complete_task(&store, &task.id, Utc::now()).unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(paid_worker.pure_coins, 20);
    assert_eq!(paid_worker.adventurer_exp, 10);

    // The reward shows up in the ledger and a proof item lands in the
    // worker's treasury.
    let history = guild::user_transactions(&store, &worker.id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, TransactionKind::TaskReward);
    assert_eq!(history[0].amount, 20);

    let treasures = guild::user_treasures(&store, &worker.id).unwrap();
    assert_eq!(treasures.len(), 1);
    assert_eq!(treasures[0].kind, TreasureKind::TaskProof);
    assert_eq!(treasures[0].related_id, task.id);

    // Creator's quest-master counter moved.
    let creator = store.get_user(&admin.id).unwrap();
    assert_eq!(creator.quest_master_completions, 1);
}

#[test]
fn completing_twice_is_rejected() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let admin = guild::create_user(&store, "Principal", UserRole::Admin).unwrap();
    let worker = guild::create_user(&store, "Ming", UserRole::Staff).unwrap();

    let task = publish(&store, &admin.id, TaskRank::B, 100);
    guild::accept_task_direct(&store, &task.id, &worker.id, Utc::now()).unwrap();
    guild::submit_proof(&store, &task.id, "proofs/a.jpg").unwrap();
    guild::complete_task(&store, &task.id, Utc::now()).unwrap();

    let err = guild::complete_task(&store, &task.id, Utc::now()).unwrap_err();
    assert!(matches!(err, GuildError::InvalidState(_)));

    // The payout must not have been applied twice.
    let worker = store.get_user(&worker.id).unwrap();
    assert_eq!(worker.pure_coins, 100);
}

#[test]
fn assignment_requires_an_application() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let admin = guild::create_user(&store, "Principal", UserRole::Admin).unwrap();
    let outsider = guild::create_user(&store, "Hua", UserRole::Staff).unwrap();

    let task = publish(&store, &admin.id, TaskRank::F, 20);
    let unchanged = guild::assign_task(&store, &task.id, &outsider.id, Utc::now())
        .unwrap()
        .expect("task exists");
    assert_eq!(unchanged.status, TaskStatus::Open);
    assert!(unchanged.assignee_id.is_none());
}

#[test]
fn ratings_are_clamped_and_unique_per_pair() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let admin = guild::create_user(&store, "Principal", UserRole::Admin).unwrap();
    let worker = guild::create_user(&store, "Ming", UserRole::Staff).unwrap();

    let task = publish(&store, &admin.id, TaskRank::F, 20);
    guild::accept_task_direct(&store, &task.id, &worker.id, Utc::now()).unwrap();
    guild::submit_proof(&store, &task.id, "proofs/a.jpg").unwrap();
    guild::complete_task(&store, &task.id, Utc::now()).unwrap();

    let task = guild::rate_task(&store, &task.id, &admin.id, &worker.id, 9, Some("great"), Utc::now())
        .unwrap()
        .expect("task exists");
    assert_eq!(task.ratings.len(), 1);
    assert_eq!(task.ratings[0].rating, 5);

    // Second rating from the same pair is ignored.
    let task = guild::rate_task(&store, &task.id, &admin.id, &worker.id, 1, None, Utc::now())
        .unwrap()
        .expect("task exists");
    assert_eq!(task.ratings.len(), 1);
    assert_eq!(task.ratings[0].rating, 5);

    let worker = store.get_user(&worker.id).unwrap();
    assert_eq!(worker.total_ratings, 1);
    assert_eq!(worker.reputation_average(), Some(5.0));
}

#[test]
fn solo_task_escrow_is_refunded_by_the_sweep() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let creator = guild::create_user(&store, "Ming", UserRole::Staff).unwrap();
    guild::adjust_coins(&store, &creator.id, 100, "opening balance").unwrap();

    let published = Utc::now() - Duration::days(20);
    let task = guild::create_task(
        &store,
        NewTask {
            title: "Breakfast run".to_string(),
            description: "Coffee and buns for the morning crew".to_string(),
            kind: TaskKind::Solo,
            rank: TaskRank::F,
            reward: 30,
            creator_id: creator.id.clone(),
        },
        published,
    )
    .unwrap();

    // Reward escrowed up front.
    assert_eq!(store.get_user(&creator.id).unwrap().pure_coins, 70);

    let expired = guild::sweep_expired_tasks(&store, Utc::now()).unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].id, task.id);
    assert_eq!(expired[0].status, TaskStatus::Expired);
    assert_eq!(store.get_user(&creator.id).unwrap().pure_coins, 100);

    // Sweeping again finds nothing and refunds nothing.
    let again = guild::sweep_expired_tasks(&store, Utc::now()).unwrap();
    assert!(again.is_empty());
    assert_eq!(store.get_user(&creator.id).unwrap().pure_coins, 100);
}
