//! Append-only transaction ledger.
//!
//! Entries are an audit trail; the authoritative balance lives on the user
//! record. Every operation that changes a balance stages the user write and
//! its matching ledger entry in the same atomic batch, so the pairing holds
//! by construction.

use log::info;

use crate::guild::errors::GuildError;
use crate::guild::storage::{GuildStore, WriteBatch};
use crate::guild::types::{Transaction, TransactionKind};

/// Append an immutable ledger entry. No balance check happens here; callers
/// must already have validated and staged the balance change.
pub fn record_transaction(
    store: &GuildStore,
    user_id: &str,
    amount: i64,
    kind: TransactionKind,
    description: &str,
    related_id: Option<&str>,
) -> Result<Transaction, GuildError> {
    let txn = Transaction::new(user_id, amount, kind, description, related_id);
    let mut batch = WriteBatch::new();
    store.stage_transaction(&mut batch, &txn)?;
    store.commit(batch)?;
    Ok(txn)
}

/// Admin adjustment: apply a signed delta to a user's balance, clamped at
/// zero, paired with one `AdminAdjust` entry.
pub fn adjust_coins(
    store: &GuildStore,
    user_id: &str,
    delta: i64,
    reason: &str,
) -> Result<crate::guild::types::User, GuildError> {
    let mut user = store.get_user(user_id)?;
    let balance = i64::from(user.pure_coins) + delta;
    user.pure_coins = u32::try_from(balance.max(0)).unwrap_or(u32::MAX);

    let txn = Transaction::new(user_id, delta, TransactionKind::AdminAdjust, reason, None);
    let mut batch = WriteBatch::new();
    store.stage_user(&mut batch, &mut user)?;
    store.stage_transaction(&mut batch, &txn)?;
    store.commit(batch)?;
    info!("adjusted coins for {user_id} by {delta}: {reason}");
    Ok(user)
}

/// All ledger entries for one user, in append order.
pub fn user_transactions(
    store: &GuildStore,
    user_id: &str,
) -> Result<Vec<Transaction>, GuildError> {
    Ok(store
        .list_transactions()?
        .into_iter()
        .filter(|t| t.user_id == user_id)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guild::storage::GuildStoreBuilder;
    use crate::guild::types::{User, UserRole};
    use tempfile::TempDir;

    fn open_store() -> (TempDir, GuildStore) {
        let dir = TempDir::new().expect("tempdir");
        let store = GuildStoreBuilder::new(dir.path()).open().expect("store");
        (dir, store)
    }

    #[test]
    fn adjust_pairs_balance_with_exactly_one_entry() {
        let (_dir, store) = open_store();
        let mut user = User::new("alice", UserRole::Staff);
        store.put_user(&mut user).expect("put");

        let updated = adjust_coins(&store, &user.id, 75, "event bonus").expect("adjust");
        assert_eq!(updated.pure_coins, 75);

        let entries = user_transactions(&store, &user.id).expect("txns");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, 75);
        assert_eq!(entries[0].kind, TransactionKind::AdminAdjust);
    }

    #[test]
    fn negative_adjust_clamps_at_zero() {
        let (_dir, store) = open_store();
        let mut user = User::new("bob", UserRole::Staff);
        user.pure_coins = 20;
        store.put_user(&mut user).expect("put");

        let updated = adjust_coins(&store, &user.id, -50, "penalty").expect("adjust");
        assert_eq!(updated.pure_coins, 0);
        // The ledger still records the requested delta.
        let entries = user_transactions(&store, &user.id).expect("txns");
        assert_eq!(entries[0].amount, -50);
    }

    #[test]
    fn adjust_unknown_user_fails() {
        let (_dir, store) = open_store();
        assert!(matches!(
            adjust_coins(&store, "ghost", 10, "oops"),
            Err(GuildError::NotFound(_))
        ));
    }

    #[test]
    fn user_transactions_filters_by_user() {
        let (_dir, store) = open_store();
        record_transaction(&store, "u1", 10, TransactionKind::Allowance, "a", None).expect("t1");
        record_transaction(&store, "u2", 20, TransactionKind::Allowance, "b", None).expect("t2");
        record_transaction(&store, "u1", -5, TransactionKind::Redemption, "c", Some("p1"))
            .expect("t3");

        let mine = user_transactions(&store, "u1").expect("txns");
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].amount, 10);
        assert_eq!(mine[1].amount, -5);
        assert_eq!(mine[1].related_id.as_deref(), Some("p1"));
    }
}
