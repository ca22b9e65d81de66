//! Per-user treasure inventory and the reviewed-use workflow.
//!
//! Items are deposited automatically by task completion and product
//! redemption. Virtual items must pass an admin review before they count as
//! used: unused -> pending -> used on approval, pending -> unused on
//! rejection. `used` is permanent.

use chrono::{DateTime, Utc};
use log::info;

use crate::guild::errors::GuildError;
use crate::guild::storage::{GuildStore, WriteBatch};
use crate::guild::types::{
    new_id, ProductCategory, ReviewStatus, TreasureItem, TreasureReviewRequest, TreasureUseStatus,
};

/// All treasure items owned by one user, in acquisition order.
pub fn user_treasures(store: &GuildStore, user_id: &str) -> Result<Vec<TreasureItem>, GuildError> {
    let mut items: Vec<TreasureItem> = store
        .list_treasures()?
        .into_iter()
        .filter(|t| t.user_id == user_id)
        .collect();
    items.sort_by_key(|t| t.acquired_at);
    Ok(items)
}

/// Ask for permission to use a virtual treasure item. Only `Virtual`-category
/// items in `Unused` status qualify; the item moves to `Pending` and a
/// pending review request is created, both in one batch. The `Unused`
/// precondition guarantees at most one active request per item.
pub fn request_use(
    store: &GuildStore,
    treasure_id: &str,
    requester_id: &str,
    now: DateTime<Utc>,
) -> Result<TreasureReviewRequest, GuildError> {
    let requester = store
        .find_user(requester_id)?
        .ok_or_else(|| GuildError::Unauthenticated(format!("unknown user: {requester_id}")))?;
    let mut item = store.get_treasure(treasure_id)?;

    if item.category != Some(ProductCategory::Virtual) {
        return Err(GuildError::InvalidState(
            "only virtual items require a use review".to_string(),
        ));
    }
    if item.use_status != TreasureUseStatus::Unused {
        return Err(GuildError::InvalidState(format!(
            "treasure {treasure_id} is {:?}",
            item.use_status
        )));
    }

    item.use_status = TreasureUseStatus::Pending;
    item.use_requested_at = Some(now);
    let request = TreasureReviewRequest {
        id: new_id(),
        treasure_id: item.id.clone(),
        treasure_name: item.name.clone(),
        user_id: requester.id.clone(),
        user_name: requester.name.clone(),
        requested_at: now,
        status: ReviewStatus::Pending,
        reviewed_at: None,
        reviewed_by: None,
    };

    let mut batch = WriteBatch::new();
    store.stage_treasure(&mut batch, &item)?;
    store.stage_review(&mut batch, &request)?;
    store.commit(batch)?;
    info!("{} requested use of '{}'", requester.name, item.name);
    Ok(request)
}

/// Resolve a pending use request and mirror the outcome onto the referenced
/// item. Approval marks the item `Used` permanently; rejection returns it to
/// `Unused` and clears the request timestamp. If the item has been deleted
/// since, the request still resolves and the mirror is a no-op.
pub fn review_use(
    store: &GuildStore,
    request_id: &str,
    approved: bool,
    reviewer_id: &str,
    now: DateTime<Utc>,
) -> Result<TreasureReviewRequest, GuildError> {
    let reviewer = store
        .find_user(reviewer_id)?
        .ok_or_else(|| GuildError::Unauthenticated(format!("unknown user: {reviewer_id}")))?;
    let mut request = store.get_review(request_id)?;
    if request.status != ReviewStatus::Pending {
        return Err(GuildError::InvalidState(format!(
            "review request {request_id} already {:?}",
            request.status
        )));
    }

    request.status = if approved {
        ReviewStatus::Approved
    } else {
        ReviewStatus::Rejected
    };
    request.reviewed_at = Some(now);
    request.reviewed_by = Some(reviewer.id.clone());

    let mut batch = WriteBatch::new();
    store.stage_review(&mut batch, &request)?;
    if let Some(mut item) = store.find_treasure(&request.treasure_id)? {
        if approved {
            item.use_status = TreasureUseStatus::Used;
            item.used_at = Some(now);
        } else {
            item.use_status = TreasureUseStatus::Unused;
            item.use_requested_at = None;
        }
        store.stage_treasure(&mut batch, &item)?;
    }
    store.commit(batch)?;
    info!(
        "{} {} use request for '{}'",
        reviewer.name,
        if approved { "approved" } else { "rejected" },
        request.treasure_name
    );
    Ok(request)
}

/// Pending requests awaiting an admin, oldest first.
pub fn pending_reviews(store: &GuildStore) -> Result<Vec<TreasureReviewRequest>, GuildError> {
    let mut reviews: Vec<TreasureReviewRequest> = store
        .list_reviews()?
        .into_iter()
        .filter(|r| r.status == ReviewStatus::Pending)
        .collect();
    reviews.sort_by_key(|r| r.requested_at);
    Ok(reviews)
}
