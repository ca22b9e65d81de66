//! Member roster operations.

use log::info;

use crate::guild::errors::GuildError;
use crate::guild::storage::GuildStore;
use crate::guild::types::{User, UserRole};

pub fn create_user(store: &GuildStore, name: &str, role: UserRole) -> Result<User, GuildError> {
    let mut user = User::new(name, role);
    store.put_user(&mut user)?;
    info!("created {role:?} user '{name}' ({})", user.id);
    Ok(user)
}

/// Remove a user. Tasks, transactions, and treasures they touched are left
/// in place, orphaned by reference.
pub fn delete_user(store: &GuildStore, user_id: &str) -> Result<bool, GuildError> {
    store.delete_user(user_id)
}

pub fn change_role(
    store: &GuildStore,
    user_id: &str,
    role: UserRole,
) -> Result<User, GuildError> {
    let mut user = store.get_user(user_id)?;
    user.role = role;
    store.put_user(&mut user)?;
    Ok(user)
}

pub fn rename_user(store: &GuildStore, user_id: &str, name: &str) -> Result<User, GuildError> {
    let mut user = store.get_user(user_id)?;
    user.name = name.to_string();
    store.put_user(&mut user)?;
    Ok(user)
}

/// Grant a catalog frame directly, for commemorative frames that are never
/// earned through counters. Idempotent; the monotone unlock union keeps the
/// grant on every later write.
pub fn grant_frame(
    store: &GuildStore,
    user_id: &str,
    frame_id: &str,
) -> Result<User, GuildError> {
    if !crate::guild::rank::frame_catalog().iter().any(|f| f.id == frame_id) {
        return Err(GuildError::NotFound(format!("frame: {frame_id}")));
    }
    let mut user = store.get_user(user_id)?;
    if !user.unlocked_frames.iter().any(|f| f == frame_id) {
        user.unlocked_frames.push(frame_id.to_string());
        store.put_user(&mut user)?;
        info!("granted frame '{frame_id}' to {user_id}");
    }
    Ok(user)
}

/// Select an avatar frame. The frame must already be unlocked.
pub fn select_frame(
    store: &GuildStore,
    user_id: &str,
    frame_id: &str,
) -> Result<User, GuildError> {
    let mut user = store.get_user(user_id)?;
    if !user.unlocked_frames.iter().any(|f| f == frame_id) {
        return Err(GuildError::InvalidState(format!(
            "frame '{frame_id}' is not unlocked"
        )));
    }
    user.avatar_frame = Some(frame_id.to_string());
    store.put_user(&mut user)?;
    Ok(user)
}
