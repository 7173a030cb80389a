//! # Loot Error Types
//!
//! All errors that can occur in the loot system.

use thiserror::Error;

use crate::rarity::Rarity;

/// Errors that can occur in the loot system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LootError {
    /// A catalog directory (or a path segment) does not name a rarity tier.
    #[error("unknown rarity tier: {name:?}")]
    UnknownTier {
        /// The offending directory or tier name.
        name: String,
    },

    /// The catalog holds no backs for the requested tier.
    #[error("no backs of rarity {0} in the catalog")]
    EmptyTier(Rarity),

    /// No tier satisfied the roll. Unreachable while `roll < max_weight`.
    #[error("no rarity tier selected for roll {roll}")]
    NoTierSelected {
        /// The roll that fell through every tier.
        roll: u32,
    },

    /// A back path is empty or does not start with a tier directory.
    #[error("invalid back path {path:?}: {reason}")]
    InvalidBackPath {
        /// The rejected path.
        path: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The catalog root could not be read.
    #[error("catalog io failed: {0}")]
    CatalogIo(String),

    /// A ledger record failed its mandatory fields.
    #[error("invalid ledger record: {0}")]
    InvalidRecord(String),

    /// Reading or writing the ledger file failed.
    #[error("ledger io failed: {0}")]
    LedgerIo(String),

    /// The CSV layer rejected the ledger table.
    #[error("ledger csv error: {0}")]
    Csv(String),

    /// The user does not own the back they asked for.
    #[error("back {path:?} is not in the backpack")]
    BackNotOwned {
        /// Path of the requested back.
        path: String,
    },

    /// The path does not resolve to a back in the catalog.
    #[error("back not found: {0}")]
    BackNotFound(String),

    /// Rollback requested below the point threshold.
    #[error("insufficient rarity points: need {required}, have {available}")]
    InsufficientPoints {
        /// Points required.
        required: u64,
        /// Points the user holds.
        available: u64,
    },

    /// A back file is not a valid frame stream.
    #[error("frame decode failed: {0}")]
    FrameDecode(String),

    /// The user has no open playback session.
    #[error("no active playback session for user {0}")]
    NoActiveSession(String),

    /// The playback collaborator failed.
    #[error("playback failed: {0}")]
    Playback(String),

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for loot operations.
pub type LootResult<T> = Result<T, LootError>;
