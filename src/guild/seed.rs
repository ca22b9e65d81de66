//! Demo bootstrap data for a fresh store.

use chrono::Utc;
use log::info;

use crate::guild::commerce::{self, NewProduct};
use crate::guild::errors::GuildError;
use crate::guild::storage::GuildStore;
use crate::guild::tasks::{self, NewTask};
use crate::guild::types::{
    AdventurerRank, ProductCategory, TaskKind, TaskRank, User, UserRole,
};

/// Seed demo users, tasks, and products if the roster is empty. Idempotent:
/// any existing user makes this a no-op.
pub fn seed_demo_if_needed(store: &GuildStore) -> Result<usize, GuildError> {
    if !store.list_users()?.is_empty() {
        return Ok(0);
    }

    let mut principal = User::new("Principal", UserRole::Admin);
    principal.pure_coins = 500;
    store.put_user(&mut principal)?;

    let mut coach_ming = User::new("Coach Ming", UserRole::Staff);
    coach_ming.pure_coins = 200;
    coach_ming.adventurer_exp = 100;
    store.put_user(&mut coach_ming)?;

    let mut coach_hua = User::new("Coach Hua", UserRole::Staff);
    coach_hua.pure_coins = 150;
    coach_hua.adventurer_exp = 50;
    store.put_user(&mut coach_hua)?;

    let now = Utc::now();
    let mut seeded = 3usize;

    let demo_tasks = [
        (
            "Promo video shoot",
            "Film a 30-second ski lesson promo video",
            TaskKind::Guild,
            TaskRank::S,
            300,
            principal.id.clone(),
        ),
        (
            "Storeroom cleanup",
            "Sort the gear storeroom and count the inventory",
            TaskKind::Guild,
            TaskRank::B,
            100,
            principal.id.clone(),
        ),
        (
            "Breakfast run",
            "Pick up breakfast from the village on your way up",
            TaskKind::Solo,
            TaskRank::F,
            20,
            coach_ming.id.clone(),
        ),
        (
            "Waxing help",
            "Help wax a set of boards, about 30 minutes",
            TaskKind::Solo,
            TaskRank::F,
            30,
            coach_hua.id.clone(),
        ),
    ];
    for (title, description, kind, rank, reward, creator_id) in demo_tasks {
        tasks::create_task(
            store,
            NewTask {
                title: title.to_string(),
                description: description.to_string(),
                kind,
                rank,
                reward,
                creator_id,
            },
            now,
        )?;
        seeded += 1;
    }

    let demo_products = [
        (
            "Guild T-shirt",
            "Limited-run guild T-shirt, black",
            ProductCategory::Physical,
            200,
            10,
            None,
        ),
        (
            "Board waxing voucher",
            "One free board waxing",
            ProductCategory::Virtual,
            50,
            20,
            None,
        ),
        (
            "Priority scheduling pass",
            "Pick your teaching slots first next season",
            ProductCategory::Virtual,
            300,
            5,
            Some(AdventurerRank::Silver),
        ),
        (
            "VIP lounge pass",
            "One day in the VIP lounge",
            ProductCategory::Virtual,
            150,
            10,
            None,
        ),
    ];
    for (name, description, category, price, stock, min_rank) in demo_products {
        commerce::create_product(
            store,
            NewProduct {
                name: name.to_string(),
                description: description.to_string(),
                category,
                price,
                stock,
                min_rank,
                image_uri: None,
            },
        )?;
        seeded += 1;
    }

    info!("seeded {seeded} demo record(s)");
    Ok(seeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guild::storage::GuildStoreBuilder;
    use tempfile::TempDir;

    #[test]
    fn seeding_only_happens_once() {
        let dir = TempDir::new().expect("tempdir");
        let store = GuildStoreBuilder::new(dir.path()).open().expect("store");

        let seeded = seed_demo_if_needed(&store).expect("seed");
        assert_eq!(seeded, 11);
        assert_eq!(store.list_users().expect("users").len(), 3);
        assert_eq!(store.list_tasks().expect("tasks").len(), 4);
        assert_eq!(store.list_products().expect("products").len(), 4);

        assert_eq!(seed_demo_if_needed(&store).expect("reseed"), 0);
        assert_eq!(store.list_users().expect("users").len(), 3);
    }

    #[test]
    fn solo_demo_tasks_escrow_from_their_creators() {
        let dir = TempDir::new().expect("tempdir");
        let store = GuildStoreBuilder::new(dir.path()).open().expect("store");
        seed_demo_if_needed(&store).expect("seed");

        let users = store.list_users().expect("users");
        let ming = users.iter().find(|u| u.name == "Coach Ming").expect("ming");
        let hua = users.iter().find(|u| u.name == "Coach Hua").expect("hua");
        assert_eq!(ming.pure_coins, 180); // 200 - 20 escrow
        assert_eq!(hua.pure_coins, 120); // 150 - 30 escrow
    }
}
