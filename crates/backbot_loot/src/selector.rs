//! # Weighted Back Selection
//!
//! Draws a back with probability inversely proportional to its tier's rarity.
//!
//! ## Algorithm
//!
//! ```text
//! roll = uniform [0, max_weight)
//!
//!  0  1 2 ........ 10 11 ........... 90 91 ................. 399
//!  ├──┴────────────┼─────────────────┼───────────────────────┤
//!  Rollback  Rare         Uncommon            Common
//! ```
//!
//! Tiers are scanned rarest first and the first tier whose weight is
//! `>= roll` wins, so each tier owns the rolls in `(previous weight, weight]`.
//! The boundary is inclusive: `roll == weight` belongs to that tier. No
//! cumulative table is built.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::back::Back;
use crate::catalog::Catalog;
use crate::error::{LootError, LootResult};
use crate::rarity::Rarity;

/// Returns the tier owning `roll`: the first tier, in ascending weight
/// order, whose weight is `>= roll`.
#[must_use]
pub fn tier_for_roll(roll: u32) -> Option<Rarity> {
    Rarity::ALL.into_iter().find(|rarity| rarity.weight() >= roll)
}

/// Uniformly picks one back of `rarity` from the catalog.
///
/// # Errors
///
/// Returns [`LootError::UnknownTier`] if the catalog has no such tier, or
/// [`LootError::EmptyTier`] if the tier holds no backs.
pub fn pick_from_tier<R: Rng + ?Sized>(catalog: &Catalog, rarity: Rarity, rng: &mut R) -> LootResult<Back> {
    if !catalog.has_tier(rarity) {
        return Err(LootError::UnknownTier {
            name: rarity.name().to_string(),
        });
    }

    let backs = catalog.backs(rarity);
    if backs.is_empty() {
        return Err(LootError::EmptyTier(rarity));
    }

    Ok(backs[rng.gen_range(0..backs.len())].clone())
}

/// Draws a back using a caller-supplied roll.
///
/// # Errors
///
/// [`LootError::NoTierSelected`] when no tier covers `roll`, otherwise the
/// errors of [`pick_from_tier`] for the selected tier.
pub fn pick_with_roll<R: Rng + ?Sized>(catalog: &Catalog, roll: u32, rng: &mut R) -> LootResult<Back> {
    let rarity = tier_for_roll(roll).ok_or(LootError::NoTierSelected { roll })?;
    tracing::debug!(roll, %rarity, "rolled for a back");

    pick_from_tier(catalog, rarity, rng).map_err(|e| match e {
        // The weighted path reports a missing tier the same as an empty one
        LootError::UnknownTier { .. } => LootError::EmptyTier(rarity),
        other => other,
    })
}

/// Draws a back over every tier, weighted by tier.
///
/// # Errors
///
/// See [`pick_with_roll`].
pub fn pick_weighted<R: Rng + ?Sized>(catalog: &Catalog, rng: &mut R) -> LootResult<Back> {
    let max = catalog.max_weight();
    if max == 0 {
        return Err(LootError::NoTierSelected { roll: 0 });
    }
    let roll = rng.gen_range(0..max);
    pick_with_roll(catalog, roll, rng)
}

/// Shared selector: a catalog plus a locked RNG.
///
/// Safe to share across tasks; draws serialize on the RNG lock only.
pub struct Selector {
    /// The read-only catalog.
    catalog: Arc<Catalog>,
    /// Draw RNG.
    rng: Mutex<ChaCha8Rng>,
}

impl Selector {
    /// Creates a selector seeded from OS entropy.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            rng: Mutex::new(ChaCha8Rng::from_entropy()),
        }
    }

    /// Creates a selector with a fixed seed, for reproducible draws.
    #[must_use]
    pub fn with_seed(catalog: Arc<Catalog>, seed: u64) -> Self {
        Self {
            catalog,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    /// The catalog draws come from.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Weighted draw over every tier.
    ///
    /// # Errors
    ///
    /// See [`pick_weighted`].
    pub fn pick_weighted(&self) -> LootResult<Back> {
        pick_weighted(&self.catalog, &mut *self.rng.lock())
    }

    /// Uniform draw from one tier.
    ///
    /// # Errors
    ///
    /// See [`pick_from_tier`].
    pub fn pick_from_tier(&self, rarity: Rarity) -> LootResult<Back> {
        pick_from_tier(&self.catalog, rarity, &mut *self.rng.lock())
    }

    /// Runs `iterations` weighted draws and tallies the results.
    #[must_use]
    pub fn run_statistics(&self, iterations: u32) -> SelectionStatistics {
        let mut stats = SelectionStatistics::default();
        let mut rng = self.rng.lock();

        for _ in 0..iterations {
            stats.total_draws += 1;
            match pick_weighted(&self.catalog, &mut *rng) {
                Ok(back) => *stats.tier_counts.entry(back.rarity()).or_insert(0) += 1,
                Err(_) => stats.failed_draws += 1,
            }
        }

        stats
    }
}

impl std::fmt::Debug for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selector")
            .field("backs", &self.catalog.len())
            .finish_non_exhaustive()
    }
}

/// Tallies from a batch of weighted draws.
#[derive(Clone, Debug, Default)]
pub struct SelectionStatistics {
    /// Draws attempted.
    pub total_draws: u64,
    /// Draws that returned an error.
    pub failed_draws: u64,
    /// Successful draws by tier.
    pub tier_counts: BTreeMap<Rarity, u64>,
}

impl SelectionStatistics {
    /// Observed share of draws that landed in `rarity`.
    #[must_use]
    pub fn frequency(&self, rarity: Rarity) -> f64 {
        if self.total_draws == 0 {
            return 0.0;
        }
        let hits = self.tier_counts.get(&rarity).copied().unwrap_or(0);
        hits as f64 / self.total_draws as f64
    }
}

/// Expected share of weighted draws that land in `rarity`.
///
/// Tier `i` owns the rolls in `(w[i-1], w[i]]`; the rarest tier also owns
/// roll 0, and the top tier loses `max_weight` itself to the half-open range.
#[must_use]
pub fn expected_frequency(rarity: Rarity) -> f64 {
    let max = Rarity::ALL[Rarity::ALL.len() - 1].weight();
    let mut lower: Option<u32> = None;
    let mut owned = 0;

    for tier in Rarity::ALL {
        let upper = tier.weight().min(max - 1);
        let first = lower.map_or(0, |l| l + 1);
        if tier == rarity {
            owned = (upper + 1).saturating_sub(first);
            break;
        }
        lower = Some(tier.weight());
    }

    f64::from(owned) / f64::from(max)
}
