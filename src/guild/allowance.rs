//! Season-gated allowance distribution and the annual balance reset.

use chrono::{DateTime, Datelike, Utc};
use log::info;

use crate::guild::errors::GuildError;
use crate::guild::storage::{GuildStore, WriteBatch};
use crate::guild::types::{
    new_id, AllowanceRecord, Transaction, TransactionKind, ALLOWANCE_MONTHS,
};

/// Credit every member `amount` coins, once per (month, year) and only during
/// the allowance season. The per-user credits, their ledger entries, and the
/// allowance record all land in one atomic batch; the record's existence is
/// the sole idempotence guard, so it can never exist without the credits or
/// vice versa.
pub fn distribute(
    store: &GuildStore,
    admin_id: &str,
    amount: u32,
    now: DateTime<Utc>,
) -> Result<AllowanceRecord, GuildError> {
    let admin = store
        .find_user(admin_id)?
        .ok_or_else(|| GuildError::Unauthenticated(format!("unknown user: {admin_id}")))?;

    let month = now.month();
    let year = now.year();
    if !ALLOWANCE_MONTHS.contains(&month) {
        return Err(GuildError::OutOfSeason(ALLOWANCE_MONTHS));
    }
    if store.allowance_exists(month, year)? {
        return Err(GuildError::AlreadyDistributed { month, year });
    }

    let users = store.list_users()?;
    let mut batch = WriteBatch::new();
    for mut user in users.iter().cloned() {
        user.pure_coins = user.pure_coins.saturating_add(amount);
        let txn = Transaction::new(
            &user.id,
            i64::from(amount),
            TransactionKind::Allowance,
            &format!("Seasonal allowance for month {month}"),
            None,
        );
        store.stage_user(&mut batch, &mut user)?;
        store.stage_transaction(&mut batch, &txn)?;
    }

    let record = AllowanceRecord {
        id: new_id(),
        month,
        year,
        amount,
        recipient_count: users.len(),
        distributed_at: now,
        distributed_by: admin.id.clone(),
    };
    store.stage_allowance(&mut batch, &record)?;
    store.commit(batch)?;
    info!(
        "distributed {amount} coins to {} member(s) for {month}/{year}",
        record.recipient_count
    );
    Ok(record)
}

/// Annual settlement: zero every non-zero balance, pairing each with a
/// negative `AdminAdjust` entry. Returns the number of users reset.
pub fn annual_reset(store: &GuildStore, admin_id: &str) -> Result<usize, GuildError> {
    store
        .find_user(admin_id)?
        .ok_or_else(|| GuildError::Unauthenticated(format!("unknown user: {admin_id}")))?;

    let mut reset = 0usize;
    let mut batch = WriteBatch::new();
    for mut user in store.list_users()? {
        if user.pure_coins == 0 {
            continue;
        }
        let txn = Transaction::new(
            &user.id,
            -i64::from(user.pure_coins),
            TransactionKind::AdminAdjust,
            "Annual settlement",
            None,
        );
        user.pure_coins = 0;
        store.stage_user(&mut batch, &mut user)?;
        store.stage_transaction(&mut batch, &txn)?;
        reset += 1;
    }
    store.commit(batch)?;
    info!("annual reset cleared {reset} balance(s)");
    Ok(reset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guild::ledger::user_transactions;
    use crate::guild::storage::GuildStoreBuilder;
    use crate::guild::types::{User, UserRole};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, GuildStore) {
        let dir = TempDir::new().expect("tempdir");
        let store = GuildStoreBuilder::new(dir.path()).open().expect("store");
        (dir, store)
    }

    fn seed_user(store: &GuildStore, name: &str, role: UserRole, coins: u32) -> User {
        let mut user = User::new(name, role);
        user.pure_coins = coins;
        store.put_user(&mut user).expect("put user");
        user
    }

    fn in_season() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap()
    }

    fn off_season() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn distribute_credits_every_member_once() {
        let (_dir, store) = open_store();
        let admin = seed_user(&store, "boss", UserRole::Admin, 500);
        let staff = seed_user(&store, "coach", UserRole::Staff, 20);

        let record = distribute(&store, &admin.id, 100, in_season()).expect("distribute");
        assert_eq!(record.recipient_count, 2);
        assert_eq!((record.month, record.year), (1, 2026));

        assert_eq!(store.get_user(&admin.id).expect("admin").pure_coins, 600);
        assert_eq!(store.get_user(&staff.id).expect("staff").pure_coins, 120);

        let entries = user_transactions(&store, &staff.id).expect("txns");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, 100);
        assert_eq!(entries[0].kind, TransactionKind::Allowance);
    }

    #[test]
    fn second_distribution_same_month_fails() {
        let (_dir, store) = open_store();
        let admin = seed_user(&store, "boss", UserRole::Admin, 0);

        distribute(&store, &admin.id, 100, in_season()).expect("first");
        assert!(matches!(
            distribute(&store, &admin.id, 100, in_season()),
            Err(GuildError::AlreadyDistributed { month: 1, year: 2026 })
        ));
        // Exactly one credit happened.
        assert_eq!(store.get_user(&admin.id).expect("admin").pure_coins, 100);

        // A different month in season succeeds again.
        let feb = Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap();
        distribute(&store, &admin.id, 100, feb).expect("february");
        assert_eq!(store.get_user(&admin.id).expect("admin").pure_coins, 200);
    }

    #[test]
    fn off_season_always_fails() {
        let (_dir, store) = open_store();
        let admin = seed_user(&store, "boss", UserRole::Admin, 0);
        assert!(matches!(
            distribute(&store, &admin.id, 100, off_season()),
            Err(GuildError::OutOfSeason(_))
        ));
        assert!(store.list_allowances().expect("records").is_empty());
    }

    #[test]
    fn unknown_admin_is_unauthenticated() {
        let (_dir, store) = open_store();
        assert!(matches!(
            distribute(&store, "ghost", 100, in_season()),
            Err(GuildError::Unauthenticated(_))
        ));
    }

    #[test]
    fn annual_reset_zeroes_balances_with_paired_entries() {
        let (_dir, store) = open_store();
        let admin = seed_user(&store, "boss", UserRole::Admin, 500);
        let staff = seed_user(&store, "coach", UserRole::Staff, 0);

        let reset = annual_reset(&store, &admin.id).expect("reset");
        assert_eq!(reset, 1); // staff already at zero

        assert_eq!(store.get_user(&admin.id).expect("admin").pure_coins, 0);
        let entries = user_transactions(&store, &admin.id).expect("txns");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, -500);
        assert_eq!(entries[0].kind, TransactionKind::AdminAdjust);
        assert!(user_transactions(&store, &staff.id).expect("txns").is_empty());
    }
}
