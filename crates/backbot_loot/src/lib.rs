//! # Back Bot Loot
//!
//! Rarity-weighted back selection and the per-user loot ledger.
//!
//! ## Design Principles
//!
//! 1. **Static catalog** - Backs are discovered once from a tiered directory tree
//! 2. **Inverse-rarity draws** - One roll, one tier scan, no cumulative table
//! 3. **Memory is authoritative** - The ledger file is a periodic snapshot
//! 4. **Failures stay local** - A failed flush never fails the mutation that triggered it
//!
//! ## Thread Safety
//!
//! [`Catalog`] is immutable and shared by `Arc`. [`Selector`] and every
//! [`LootBag`] are `Send + Sync`; each ledger operation runs under one lock.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use backbot_loot::{Catalog, CsvLootBag, LootBag, LootConfig, Selector, UserId};
//!
//! let config = LootConfig::from_file("backbot.toml")?;
//! let catalog = Arc::new(Catalog::load(&config.catalog_root)?);
//! let selector = Selector::new(Arc::clone(&catalog));
//! let bag = CsvLootBag::open_with_catalog(
//!     &config.ledger_path,
//!     config.staleness_policy(),
//!     config.flush_mode,
//!     &catalog,
//! )?;
//!
//! let back = selector.pick_weighted()?;
//! bag.add_loot(&UserId::from("1234"), &back);
//! bag.shutdown()?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod actions;
pub mod back;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod flush;
pub mod frames;
pub mod ledger;
pub mod rarity;
pub mod selector;
pub mod store;

pub use actions::{
    BackSource, Backpack, BackpackTier, DirBackSource, LootActions, PlaybackSink, PlaybackTarget,
};
pub use back::Back;
pub use catalog::Catalog;
pub use config::LootConfig;
pub use error::{LootError, LootResult};
pub use flush::{AlwaysFlush, FlushPolicy, NeverFlush, StalenessPolicy};
pub use ledger::{LedgerState, LootBag, MemoryLootBag, UserId, UserLedgerEntry};
pub use rarity::{compute_point_values, PointTable, Rarity};
pub use selector::{SelectionStatistics, Selector};
pub use store::{CsvLootBag, FlushMode};
