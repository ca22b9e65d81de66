use thiserror::Error;

/// Errors that can arise while operating on the guild ledger.
#[derive(Debug, Error)]
pub enum GuildError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when fetching a record that is not present.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// Operation attempted against a lifecycle state that forbids it.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Balance too low to cover a debit.
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u32, need: u32 },

    /// Product stock exhausted.
    #[error("product out of stock")]
    OutOfStock,

    /// Adventurer rank below a product's minimum rank gate.
    #[error("requires {required:?} adventurer rank or above")]
    RankTooLow {
        required: crate::guild::types::AdventurerRank,
    },

    /// Allowance distribution attempted outside the allowed months.
    #[error("allowance can only be distributed in months {0:?}")]
    OutOfSeason([u32; 4]),

    /// Allowance already distributed for this month and year.
    #[error("allowance already distributed for {month}/{year}")]
    AlreadyDistributed { month: u32, year: i32 },

    /// No acting identity available for an operation that requires one.
    #[error("no acting identity: {0}")]
    Unauthenticated(String),

    /// Internal error (unexpected conditions).
    #[error("internal error: {0}")]
    Internal(String),
}
