//! Rank derivation and cosmetic frame unlocks.
//!
//! Everything here is pure. The store recomputes these derivations on every
//! user write, so the denormalized rank and frame fields can never drift from
//! their source counters.

use crate::guild::types::{AdventurerRank, QuestMasterRank, User};

/// Highest adventurer tier whose threshold is at or below `exp`.
pub fn adventurer_rank(exp: u32) -> AdventurerRank {
    if exp >= AdventurerRank::Gold.threshold() {
        AdventurerRank::Gold
    } else if exp >= AdventurerRank::Silver.threshold() {
        AdventurerRank::Silver
    } else {
        AdventurerRank::Bronze
    }
}

/// Highest quest-master tier whose threshold is at or below `completions`.
pub fn quest_master_rank(completions: u32) -> QuestMasterRank {
    if completions >= QuestMasterRank::Legendary.threshold() {
        QuestMasterRank::Legendary
    } else if completions >= QuestMasterRank::Senior.threshold() {
        QuestMasterRank::Senior
    } else {
        QuestMasterRank::Apprentice
    }
}

/// Minimum received-rating average for the reputation frame.
const REPUTATION_FRAME_THRESHOLD: f64 = 4.5;

/// How a cosmetic avatar frame is unlocked.
pub enum FrameUnlock {
    /// Available to everyone.
    Default,
    /// Reaching an adventurer tier unlocks it (and every lower tier's frame).
    Adventurer(AdventurerRank),
    /// Reaching a quest-master tier unlocks it, same tier semantics.
    QuestMaster(QuestMasterRank),
    /// Unlocked by carrying the named badge.
    Badge(&'static str),
    /// Received-rating average at or above the reputation threshold.
    Reputation,
    /// Commemorative frame granted explicitly by an admin, never earned.
    Special,
}

pub struct FrameSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub unlock: FrameUnlock,
}

/// The full cosmetic frame catalog.
pub const fn frame_catalog() -> &'static [FrameSpec] {
    &[
        FrameSpec {
            id: "default",
            name: "Basic frame",
            unlock: FrameUnlock::Default,
        },
        FrameSpec {
            id: "bronze_adventurer",
            name: "Bronze proof",
            unlock: FrameUnlock::Adventurer(AdventurerRank::Bronze),
        },
        FrameSpec {
            id: "silver_adventurer",
            name: "Silver proof",
            unlock: FrameUnlock::Adventurer(AdventurerRank::Silver),
        },
        FrameSpec {
            id: "gold_adventurer",
            name: "Gold proof",
            unlock: FrameUnlock::Adventurer(AdventurerRank::Gold),
        },
        FrameSpec {
            id: "apprentice_master",
            name: "Apprentice quest master",
            unlock: FrameUnlock::QuestMaster(QuestMasterRank::Apprentice),
        },
        FrameSpec {
            id: "senior_master",
            name: "Senior quest master",
            unlock: FrameUnlock::QuestMaster(QuestMasterRank::Senior),
        },
        FrameSpec {
            id: "legendary_master",
            name: "Legendary commissioner",
            unlock: FrameUnlock::QuestMaster(QuestMasterRank::Legendary),
        },
        FrameSpec {
            id: "first_task",
            name: "Newcomer",
            unlock: FrameUnlock::Badge("first_task"),
        },
        FrameSpec {
            id: "s_rank_hunter",
            name: "S-rank hunter",
            unlock: FrameUnlock::Badge("s_rank_complete"),
        },
        FrameSpec {
            id: "snow_warrior",
            name: "Snow warrior",
            unlock: FrameUnlock::Badge("snow_warrior"),
        },
        FrameSpec {
            id: "pixel_master",
            name: "Pixel master",
            unlock: FrameUnlock::Badge("exp_1000"),
        },
        FrameSpec {
            id: "reputation_star",
            name: "Reputation star",
            unlock: FrameUnlock::Reputation,
        },
        FrameSpec {
            id: "guild_founder",
            name: "Guild founder",
            unlock: FrameUnlock::Special,
        },
    ]
}

/// Union of the user's existing unlocks and everything currently earned.
/// Monotonic: a previously unlocked frame is never revoked, even if a source
/// counter were to decrease.
pub fn unlocked_frames(user: &User) -> Vec<String> {
    let adv = adventurer_rank(user.adventurer_exp);
    let qm = quest_master_rank(user.quest_master_completions);

    let mut unlocked = user.unlocked_frames.clone();
    let mut grant = |id: &str| {
        if !unlocked.iter().any(|f| f == id) {
            unlocked.push(id.to_string());
        }
    };

    for frame in frame_catalog() {
        let earned = match &frame.unlock {
            FrameUnlock::Default => true,
            FrameUnlock::Adventurer(tier) => *tier <= adv,
            FrameUnlock::QuestMaster(tier) => *tier <= qm,
            FrameUnlock::Badge(badge_id) => user.has_badge(badge_id),
            FrameUnlock::Reputation => user
                .reputation_average()
                .is_some_and(|avg| avg >= REPUTATION_FRAME_THRESHOLD),
            // Held once granted (the union preserves it), never auto-earned.
            FrameUnlock::Special => false,
        };
        if earned {
            grant(frame.id);
        }
    }

    unlocked
}
