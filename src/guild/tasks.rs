//! Task lifecycle state machine.
//!
//! open -> accepting -> in_progress -> pending_verification -> completed,
//! with open/accepting expiring via the time-based sweep and cancellation
//! reachable from any non-terminal state. State-machine violations are silent
//! no-ops (`Ok(None)` or the unchanged task) per the caller contract; only
//! the side-effect-heavy operations return typed errors.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::guild::errors::GuildError;
use crate::guild::storage::{GuildStore, WriteBatch};
use crate::guild::types::{
    Badge, Task, TaskApplicant, TaskKind, TaskRank, TaskRating, TaskStatus, Transaction,
    TransactionKind, TreasureItem, User,
};

/// Parameters for creating a task.
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub kind: TaskKind,
    pub rank: TaskRank,
    pub reward: u32,
    pub creator_id: String,
}

/// Create a task in `Open` status. Solo tasks escrow the reward from the
/// creator's balance at creation (refunded on expiry or cancellation), so an
/// expiry refund can never mint coins the creator never paid in.
pub fn create_task(
    store: &GuildStore,
    spec: NewTask,
    now: DateTime<Utc>,
) -> Result<Task, GuildError> {
    let mut creator = store.get_user(&spec.creator_id)?;
    let task = Task::new(
        &spec.title,
        &spec.description,
        spec.kind,
        spec.rank,
        spec.reward,
        &creator,
        now,
    );

    let mut batch = WriteBatch::new();
    if spec.kind == TaskKind::Solo {
        if creator.pure_coins < spec.reward {
            return Err(GuildError::InsufficientFunds {
                have: creator.pure_coins,
                need: spec.reward,
            });
        }
        creator.pure_coins -= spec.reward;
        let escrow = Transaction::new(
            &creator.id,
            -i64::from(spec.reward),
            TransactionKind::TaskPublish,
            &format!("Task escrow: {}", task.title),
            Some(&task.id),
        );
        store.stage_user(&mut batch, &mut creator)?;
        store.stage_transaction(&mut batch, &escrow)?;
    }
    store.stage_task(&mut batch, &task)?;
    store.commit(batch)?;
    info!("created {:?} task '{}' ({})", task.kind, task.title, task.id);
    Ok(task)
}

/// Join a task's applicant pool. Returns the unchanged task if the user has
/// already applied, `None` if the task is unknown or no longer accepting.
/// The first applicant flips `Open` to `Accepting`.
pub fn apply_for_task(
    store: &GuildStore,
    task_id: &str,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<Task>, GuildError> {
    let Some(mut task) = store.find_task(task_id)? else {
        return Ok(None);
    };
    if !task.status.accepts_applicants() {
        debug!("apply ignored: task {task_id} is {:?}", task.status);
        return Ok(None);
    }
    let Some(user) = store.find_user(user_id)? else {
        return Ok(None);
    };
    if task.has_applicant(user_id) {
        return Ok(Some(task));
    }

    if task.applicants.is_empty() {
        task.status = TaskStatus::Accepting;
    }
    task.applicants.push(TaskApplicant {
        user_id: user.id,
        user_name: user.name,
        applied_at: now,
    });
    store.put_task(&task)?;
    Ok(Some(task))
}

/// Pick an applicant as assignee and move the task to `InProgress`. Fails
/// silently (no state change) if the task is not assignable or the applicant
/// is not in the pool.
pub fn assign_task(
    store: &GuildStore,
    task_id: &str,
    assignee_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<Task>, GuildError> {
    let Some(mut task) = store.find_task(task_id)? else {
        return Ok(None);
    };
    if !task.status.accepts_applicants() {
        return Ok(None);
    }
    let Some(applicant) = task.applicants.iter().find(|a| a.user_id == assignee_id) else {
        return Ok(None);
    };

    task.assignee_id = Some(applicant.user_id.clone());
    task.assignee_name = Some(applicant.user_name.clone());
    task.status = TaskStatus::InProgress;
    task.accepted_at = Some(now);
    store.put_task(&task)?;
    Ok(Some(task))
}

/// Take a task directly, bypassing the applicant pool (solo / self-initiated
/// flows). Guarded the same way as pool assignment: the task must still be
/// assignable and have no assignee.
pub fn accept_task_direct(
    store: &GuildStore,
    task_id: &str,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<Task>, GuildError> {
    let Some(mut task) = store.find_task(task_id)? else {
        return Ok(None);
    };
    if !task.status.accepts_applicants() || task.assignee_id.is_some() {
        return Ok(None);
    }
    let Some(user) = store.find_user(user_id)? else {
        return Ok(None);
    };

    task.assignee_id = Some(user.id);
    task.assignee_name = Some(user.name);
    task.status = TaskStatus::InProgress;
    task.accepted_at = Some(now);
    store.put_task(&task)?;
    Ok(Some(task))
}

/// Attach proof and move the task to `PendingVerification`. Only valid from
/// `InProgress`.
pub fn submit_proof(
    store: &GuildStore,
    task_id: &str,
    proof_image_uri: &str,
) -> Result<Option<Task>, GuildError> {
    let Some(mut task) = store.find_task(task_id)? else {
        return Ok(None);
    };
    if task.status != TaskStatus::InProgress {
        return Ok(None);
    }
    task.proof_image_uri = Some(proof_image_uri.to_string());
    task.status = TaskStatus::PendingVerification;
    store.put_task(&task)?;
    Ok(Some(task))
}

/// Complete a task and settle every side effect in one atomic batch:
/// the assignee is credited reward coins and experience with one matching
/// `TaskReward` entry, the creator's quest-master completion counter ticks,
/// and a task-proof treasure item is deposited for the assignee. An S-rank
/// completion additionally awards the hunter badge (which unlocks its frame).
pub fn complete_task(
    store: &GuildStore,
    task_id: &str,
    now: DateTime<Utc>,
) -> Result<(Task, User), GuildError> {
    let mut task = store.get_task(task_id)?;
    if task.status.is_terminal() {
        return Err(GuildError::InvalidState(format!(
            "task {task_id} already {:?}",
            task.status
        )));
    }
    let Some(assignee_id) = task.assignee_id.clone() else {
        return Err(GuildError::InvalidState(format!(
            "task {task_id} has no assignee"
        )));
    };

    let mut assignee = store.get_user(&assignee_id)?;
    task.status = TaskStatus::Completed;
    task.completed_at = Some(now);

    assignee.pure_coins = assignee.pure_coins.saturating_add(task.reward);
    assignee.adventurer_exp = assignee.adventurer_exp.saturating_add(task.exp);
    if task.rank == TaskRank::S && !assignee.has_badge("s_rank_complete") {
        assignee.badges.push(Badge::new(
            "s_rank_complete",
            "S-rank hunter",
            "Completed a legendary task",
        ));
    }

    let reward_txn = Transaction::new(
        &assignee.id,
        i64::from(task.reward),
        TransactionKind::TaskReward,
        &format!("Completed task: {}", task.title),
        Some(&task.id),
    );
    let proof = TreasureItem::task_proof(&task, now);

    let mut batch = WriteBatch::new();
    store.stage_task(&mut batch, &task)?;
    store.stage_transaction(&mut batch, &reward_txn)?;
    store.stage_treasure(&mut batch, &proof)?;

    if task.creator_id == assignee.id {
        assignee.quest_master_completions += 1;
        store.stage_user(&mut batch, &mut assignee)?;
    } else {
        store.stage_user(&mut batch, &mut assignee)?;
        // A deleted creator orphans the task; the completion still settles.
        if let Some(mut creator) = store.find_user(&task.creator_id)? {
            creator.quest_master_completions += 1;
            store.stage_user(&mut batch, &mut creator)?;
        }
    }
    store.commit(batch)?;
    info!(
        "completed task '{}': {} coins and {} exp to {}",
        task.title, task.reward, task.exp, assignee.name
    );
    Ok((task, assignee))
}

/// Rate a participant of a completed task. At most one rating per
/// (rater, ratee) pair; the second attempt returns the unchanged task.
/// Ratings are clamped to 1..=5 and feed the ratee's reputation counters.
pub fn rate_task(
    store: &GuildStore,
    task_id: &str,
    from_user_id: &str,
    to_user_id: &str,
    rating: u8,
    comment: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Option<Task>, GuildError> {
    let Some(mut task) = store.find_task(task_id)? else {
        return Ok(None);
    };
    if task.status != TaskStatus::Completed {
        return Ok(None);
    }
    if task.has_rating_pair(from_user_id, to_user_id) {
        return Ok(Some(task));
    }

    let clamped = rating.clamp(1, 5);
    task.ratings.push(TaskRating {
        from_user_id: from_user_id.to_string(),
        to_user_id: to_user_id.to_string(),
        rating: clamped,
        comment: comment.map(str::to_string),
        created_at: now,
    });

    let mut batch = WriteBatch::new();
    store.stage_task(&mut batch, &task)?;
    if let Some(mut ratee) = store.find_user(to_user_id)? {
        ratee.reputation_score += u32::from(clamped);
        ratee.total_ratings += 1;
        store.stage_user(&mut batch, &mut ratee)?;
    }
    store.commit(batch)?;
    Ok(Some(task))
}

/// Cancel a task from any non-terminal state. Solo tasks refund the escrowed
/// reward to the creator.
pub fn cancel_task(store: &GuildStore, task_id: &str) -> Result<Option<Task>, GuildError> {
    let Some(mut task) = store.find_task(task_id)? else {
        return Ok(None);
    };
    if task.status.is_terminal() {
        return Ok(None);
    }
    task.status = TaskStatus::Cancelled;

    let mut batch = WriteBatch::new();
    store.stage_task(&mut batch, &task)?;
    if let Some((creator_id, amount)) =
        stage_refund_entry(store, &mut batch, &task, "Cancelled task refund")?
    {
        let mut creator = store.get_user(&creator_id)?;
        creator.pure_coins = creator.pure_coins.saturating_add(amount);
        store.stage_user(&mut batch, &mut creator)?;
    }
    store.commit(batch)?;
    Ok(Some(task))
}

/// Force-expire every `Open`/`Accepting` task whose deadline has passed.
/// Solo tasks refund the escrowed reward to the creator with a ledger entry.
/// Run on every data refresh.
pub fn sweep_expired_tasks(
    store: &GuildStore,
    now: DateTime<Utc>,
) -> Result<Vec<Task>, GuildError> {
    let mut expired = Vec::new();
    let mut batch = WriteBatch::new();
    let mut refunds: BTreeMap<String, u32> = BTreeMap::new();
    for mut task in store.list_tasks()? {
        if !task.status.accepts_applicants() || task.expires_at >= now {
            continue;
        }
        task.status = TaskStatus::Expired;
        store.stage_task(&mut batch, &task)?;
        if let Some((creator_id, amount)) =
            stage_refund_entry(store, &mut batch, &task, "Expired task refund")?
        {
            *refunds.entry(creator_id).or_insert(0) += amount;
        }
        expired.push(task);
    }
    // One staged user write per creator: several expired tasks from the same
    // creator must stack their refunds, not overwrite each other.
    for (creator_id, amount) in refunds {
        let mut creator = store.get_user(&creator_id)?;
        creator.pure_coins = creator.pure_coins.saturating_add(amount);
        store.stage_user(&mut batch, &mut creator)?;
    }
    if !expired.is_empty() {
        store.commit(batch)?;
        info!("expired {} overdue task(s)", expired.len());
    }
    Ok(expired)
}

/// Stage the refund ledger entry for a solo task and report who is owed how
/// much. The balance credit itself is the caller's job, so a caller batching
/// several refunds can merge them into one user write.
fn stage_refund_entry(
    store: &GuildStore,
    batch: &mut WriteBatch,
    task: &Task,
    label: &str,
) -> Result<Option<(String, u32)>, GuildError> {
    if task.kind != TaskKind::Solo {
        return Ok(None);
    }
    // Creator may have been deleted; the escrow is then forfeit.
    if store.find_user(&task.creator_id)?.is_none() {
        return Ok(None);
    }
    let refund = Transaction::new(
        &task.creator_id,
        i64::from(task.reward),
        TransactionKind::TaskPublish,
        &format!("{label}: {}", task.title),
        Some(&task.id),
    );
    store.stage_transaction(batch, &refund)?;
    Ok(Some((task.creator_id.clone(), task.reward)))
}
