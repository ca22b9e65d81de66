/// Seasonal allowance: season gate, once-per-month idempotence, annual reset.
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use guildledger::guild::{self, GuildError, GuildStore, TransactionKind, UserRole};

fn open_store(dir: &TempDir) -> GuildStore {
    GuildStore::open(dir.path()).expect("open store")
}

#[test]
fn winter_distribution_credits_every_member_once() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let admin = guild::create_user(&store, "Principal", UserRole::Admin).unwrap();
    let a = guild::create_user(&store, "Ming", UserRole::Staff).unwrap();
    let b = guild::create_user(&store, "Hua", UserRole::Staff).unwrap();

    let january = Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap();
    let record = guild::distribute(&store, &admin.id, 100, january).unwrap();
    assert_eq!(record.month, 1);
    assert_eq!(record.year, 2026);
    assert_eq!(record.recipient_count, 3);

    for id in [&admin.id, &a.id, &b.id] {
        let user = store.get_user(id).unwrap();
        assert_eq!(user.pure_coins, 100);
        let history = guild::user_transactions(&store, id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, TransactionKind::Allowance);
        assert_eq!(history[0].amount, 100);
    }

    // Same month again is refused and credits nothing.
    let later = Utc.with_ymd_and_hms(2026, 1, 28, 9, 0, 0).unwrap();
    let err = guild::distribute(&store, &admin.id, 100, later).unwrap_err();
    assert!(matches!(
        err,
        GuildError::AlreadyDistributed {
            month: 1,
            year: 2026
        }
    ));
    assert_eq!(store.get_user(&a.id).unwrap().pure_coins, 100);

    // February of the same winter is a fresh month.
    let february = Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap();
    guild::distribute(&store, &admin.id, 100, february).unwrap();
    assert_eq!(store.get_user(&a.id).unwrap().pure_coins, 200);
}

#[test]
fn distribution_outside_the_season_is_refused() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let admin = guild::create_user(&store, "Principal", UserRole::Admin).unwrap();

    let june = Utc.with_ymd_and_hms(2026, 6, 15, 9, 0, 0).unwrap();
    let err = guild::distribute(&store, &admin.id, 100, june).unwrap_err();
    assert!(matches!(err, GuildError::OutOfSeason(_)));
    assert!(store.list_allowances().unwrap().is_empty());
}

#[test]
fn unknown_admin_is_refused() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    guild::create_user(&store, "Ming", UserRole::Staff).unwrap();

    let january = Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap();
    let err = guild::distribute(&store, "nobody", 100, january).unwrap_err();
    assert!(matches!(err, GuildError::Unauthenticated(_)));

    let err = guild::annual_reset(&store, "nobody").unwrap_err();
    assert!(matches!(err, GuildError::Unauthenticated(_)));
}

#[test]
fn annual_reset_zeroes_balances_and_leaves_an_audit_trail() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let admin = guild::create_user(&store, "Principal", UserRole::Admin).unwrap();
    let rich = guild::create_user(&store, "Ming", UserRole::Staff).unwrap();
    let broke = guild::create_user(&store, "Hua", UserRole::Staff).unwrap();
    guild::adjust_coins(&store, &rich.id, 250, "opening balance").unwrap();

    let reset = guild::annual_reset(&store, &admin.id).unwrap();
    assert_eq!(reset, 1);
    assert_eq!(store.get_user(&rich.id).unwrap().pure_coins, 0);
    assert_eq!(store.get_user(&broke.id).unwrap().pure_coins, 0);

    let history = guild::user_transactions(&store, &rich.id).unwrap();
    let settlement = history
        .iter()
        .find(|t| t.kind == TransactionKind::AdminAdjust && t.amount == -250)
        .expect("settlement entry");
    assert_eq!(settlement.amount, -250);

    // Nothing to reset the second time.
    assert_eq!(guild::annual_reset(&store, &admin.id).unwrap(), 0);
}
