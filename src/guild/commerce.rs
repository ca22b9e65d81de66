//! Product catalog and redemption.
//!
//! Redemption is the debit side of the economy: it checks stock, balance, and
//! the product's rank gate, then settles the balance debit, its ledger entry,
//! the stock decrement, the receipt, and the treasure deposit in one atomic
//! batch.

use chrono::{DateTime, Utc};
use log::info;

use crate::guild::errors::GuildError;
use crate::guild::storage::{GuildStore, WriteBatch};
use crate::guild::types::{
    new_id, AdventurerRank, Product, ProductCategory, Redemption, Transaction, TransactionKind,
    TreasureItem,
};

/// Parameters for creating a catalog product.
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub category: ProductCategory,
    pub price: u32,
    pub stock: u32,
    pub min_rank: Option<AdventurerRank>,
    pub image_uri: Option<String>,
}

pub fn create_product(store: &GuildStore, spec: NewProduct) -> Result<Product, GuildError> {
    let mut product = Product::new(
        &spec.name,
        &spec.description,
        spec.category,
        spec.price,
        spec.stock,
    );
    product.min_rank = spec.min_rank;
    product.image_uri = spec.image_uri;
    store.put_product(&product)?;
    Ok(product)
}

/// Catalog fields an admin may change after creation.
#[derive(Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<u32>,
    pub stock: Option<u32>,
    pub min_rank: Option<Option<AdventurerRank>>,
    pub image_uri: Option<Option<String>>,
}

pub fn update_product(
    store: &GuildStore,
    product_id: &str,
    patch: ProductPatch,
) -> Result<Option<Product>, GuildError> {
    let mut product = match store.get_product(product_id) {
        Ok(product) => product,
        Err(GuildError::NotFound(_)) => return Ok(None),
        Err(err) => return Err(err),
    };
    if let Some(name) = patch.name {
        product.name = name;
    }
    if let Some(description) = patch.description {
        product.description = description;
    }
    if let Some(price) = patch.price {
        product.price = price;
    }
    if let Some(stock) = patch.stock {
        product.stock = stock;
    }
    if let Some(min_rank) = patch.min_rank {
        product.min_rank = min_rank;
    }
    if let Some(image_uri) = patch.image_uri {
        product.image_uri = image_uri;
    }
    store.put_product(&product)?;
    Ok(Some(product))
}

/// Remove a product from the catalog. Already-issued redemptions and
/// treasure items remain valid.
pub fn delete_product(store: &GuildStore, product_id: &str) -> Result<bool, GuildError> {
    store.delete_product(product_id)
}

/// Redeem one unit of a product for a user. Checks run in a fixed order:
/// stock, funds, rank gate. On success the price is debited with a negative
/// `Redemption` ledger entry, stock drops by one (never below zero), an
/// immutable receipt is appended, and the product lands in the user's
/// treasure inventory.
pub fn redeem(
    store: &GuildStore,
    user_id: &str,
    product_id: &str,
    now: DateTime<Utc>,
) -> Result<Redemption, GuildError> {
    let mut user = store.get_user(user_id)?;
    let mut product = store.get_product(product_id)?;

    if product.stock == 0 {
        return Err(GuildError::OutOfStock);
    }
    if user.pure_coins < product.price {
        return Err(GuildError::InsufficientFunds {
            have: user.pure_coins,
            need: product.price,
        });
    }
    if let Some(min_rank) = product.min_rank {
        if user.adventurer_rank < min_rank {
            return Err(GuildError::RankTooLow { required: min_rank });
        }
    }

    user.pure_coins -= product.price;
    product.stock -= 1;

    let receipt = Redemption {
        id: new_id(),
        user_id: user.id.clone(),
        user_name: user.name.clone(),
        product_id: product.id.clone(),
        product_name: product.name.clone(),
        price: product.price,
        redeemed_at: now,
    };
    let txn = Transaction::new(
        &user.id,
        -i64::from(product.price),
        TransactionKind::Redemption,
        &format!("Redeemed product: {}", product.name),
        Some(&product.id),
    );
    let treasure = TreasureItem::from_product(&user.id, &product, now);

    let mut batch = WriteBatch::new();
    store.stage_user(&mut batch, &mut user)?;
    store.stage_product(&mut batch, &product)?;
    store.stage_transaction(&mut batch, &txn)?;
    store.stage_redemption(&mut batch, &receipt)?;
    store.stage_treasure(&mut batch, &treasure)?;
    store.commit(batch)?;
    info!(
        "{} redeemed '{}' for {} coins ({} left in stock)",
        user.name, product.name, product.price, product.stock
    );
    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guild::ledger::user_transactions;
    use crate::guild::storage::GuildStoreBuilder;
    use crate::guild::types::{TreasureKind, User, UserRole};
    use tempfile::TempDir;

    fn open_store() -> (TempDir, GuildStore) {
        let dir = TempDir::new().expect("tempdir");
        let store = GuildStoreBuilder::new(dir.path()).open().expect("store");
        (dir, store)
    }

    fn seed_user(store: &GuildStore, coins: u32, exp: u32) -> User {
        let mut user = User::new("shopper", UserRole::Staff);
        user.pure_coins = coins;
        user.adventurer_exp = exp;
        store.put_user(&mut user).expect("put user");
        user
    }

    fn voucher(store: &GuildStore, price: u32, stock: u32, min_rank: Option<AdventurerRank>) -> Product {
        create_product(
            store,
            NewProduct {
                name: "Wax voucher".to_string(),
                description: "One free board waxing".to_string(),
                category: ProductCategory::Virtual,
                price,
                stock,
                min_rank,
                image_uri: None,
            },
        )
        .expect("create product")
    }

    #[test]
    fn redeem_settles_all_five_effects() {
        let (_dir, store) = open_store();
        let user = seed_user(&store, 100, 0);
        let product = voucher(&store, 50, 3, None);

        let receipt = redeem(&store, &user.id, &product.id, Utc::now()).expect("redeem");
        assert_eq!(receipt.price, 50);

        assert_eq!(store.get_user(&user.id).expect("user").pure_coins, 50);
        assert_eq!(store.get_product(&product.id).expect("product").stock, 2);

        let txns = user_transactions(&store, &user.id).expect("txns");
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].amount, -50);
        assert_eq!(txns[0].kind, TransactionKind::Redemption);

        assert_eq!(store.list_redemptions().expect("receipts").len(), 1);
        let treasures = store.list_treasures().expect("treasures");
        assert_eq!(treasures.len(), 1);
        assert_eq!(treasures[0].kind, TreasureKind::Product);
        assert_eq!(treasures[0].user_id, user.id);
        assert_eq!(treasures[0].category, Some(ProductCategory::Virtual));
    }

    #[test]
    fn last_unit_sells_out_and_never_goes_negative() {
        let (_dir, store) = open_store();
        let user = seed_user(&store, 200, 0);
        let product = voucher(&store, 50, 1, None);

        redeem(&store, &user.id, &product.id, Utc::now()).expect("first");
        assert_eq!(store.get_product(&product.id).expect("product").stock, 0);
        assert!(matches!(
            redeem(&store, &user.id, &product.id, Utc::now()),
            Err(GuildError::OutOfStock)
        ));
        assert_eq!(store.get_product(&product.id).expect("product").stock, 0);
        // Only the first attempt debited anything.
        assert_eq!(store.get_user(&user.id).expect("user").pure_coins, 150);
    }

    #[test]
    fn insufficient_funds_leaves_everything_untouched() {
        let (_dir, store) = open_store();
        let user = seed_user(&store, 30, 0);
        let product = voucher(&store, 50, 5, None);

        assert!(matches!(
            redeem(&store, &user.id, &product.id, Utc::now()),
            Err(GuildError::InsufficientFunds { have: 30, need: 50 })
        ));
        assert_eq!(store.get_product(&product.id).expect("product").stock, 5);
        assert!(store.list_redemptions().expect("receipts").is_empty());
    }

    #[test]
    fn rank_gate_blocks_low_tiers() {
        let (_dir, store) = open_store();
        // 100 coins, bronze rank.
        let user = seed_user(&store, 100, 0);
        let product = voucher(&store, 50, 1, Some(AdventurerRank::Silver));

        assert!(matches!(
            redeem(&store, &user.id, &product.id, Utc::now()),
            Err(GuildError::RankTooLow { required: AdventurerRank::Silver })
        ));
        assert_eq!(store.get_product(&product.id).expect("product").stock, 1);

        // A silver user clears the gate.
        let silver = seed_user(&store, 100, 600);
        redeem(&store, &silver.id, &product.id, Utc::now()).expect("redeem");
    }

    #[test]
    fn update_and_delete_product() {
        let (_dir, store) = open_store();
        let product = voucher(&store, 50, 5, None);

        let updated = update_product(
            &store,
            &product.id,
            ProductPatch {
                price: Some(60),
                min_rank: Some(Some(AdventurerRank::Gold)),
                ..Default::default()
            },
        )
        .expect("update")
        .expect("some");
        assert_eq!(updated.price, 60);
        assert_eq!(updated.min_rank, Some(AdventurerRank::Gold));

        assert!(delete_product(&store, &product.id).expect("delete"));
        assert!(update_product(&store, &product.id, ProductPatch::default())
            .expect("update")
            .is_none());
    }

    #[test]
    fn deleting_product_keeps_issued_receipts_and_treasures() {
        let (_dir, store) = open_store();
        let user = seed_user(&store, 100, 0);
        let product = voucher(&store, 50, 1, None);
        redeem(&store, &user.id, &product.id, Utc::now()).expect("redeem");

        assert!(delete_product(&store, &product.id).expect("delete"));
        assert_eq!(store.list_redemptions().expect("receipts").len(), 1);
        assert_eq!(store.list_treasures().expect("treasures").len(), 1);
    }
}
