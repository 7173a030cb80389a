//! # Rarity Tiers
//!
//! Weights are inverse rarity: a tier's weight is the width of its slice of
//! the roll range, so a smaller weight means a rarer back.
//!
//! Point values are derived from the weights once, by
//! [`compute_point_values`], and handed around as a [`PointTable`].

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{LootError, LootResult};

/// Multiplier applied to the mean non-rollback weight when deriving points.
pub const LOOT_MULTIPLIER: u64 = 300;

/// Rarity tier for backs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum Rarity {
    /// The special reset back. Rarest, and worth no points.
    Rollback = 1,
    /// Rare backs.
    Rare = 10,
    /// Uncommon backs.
    Uncommon = 90,
    /// Common backs.
    Common = 400,
}

impl Rarity {
    /// All tiers in ascending weight order (rarest first).
    pub const ALL: [Self; 4] = [Self::Rollback, Self::Rare, Self::Uncommon, Self::Common];

    /// The tier's draw weight.
    #[inline]
    #[must_use]
    pub const fn weight(self) -> u32 {
        self as u32
    }

    /// Canonical tier name, as used for catalog directories.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rollback => "Rollback",
            Self::Rare => "Rare",
            Self::Uncommon => "Uncommon",
            Self::Common => "Common",
        }
    }

    /// Looks up a tier by name, ignoring ASCII case.
    ///
    /// # Errors
    ///
    /// Returns [`LootError::UnknownTier`] when no tier has that name.
    pub fn from_name(name: &str) -> LootResult<Self> {
        Self::ALL
            .into_iter()
            .find(|rarity| rarity.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| LootError::UnknownTier {
                name: name.to_string(),
            })
    }

    /// Whether this tier takes part in point scoring.
    #[inline]
    #[must_use]
    pub const fn is_scored(self) -> bool {
        !matches!(self, Self::Rollback)
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The highest weight among `tiers`, or 0 when empty.
#[must_use]
pub fn max_weight(tiers: &[Rarity]) -> u32 {
    tiers.iter().map(|r| r.weight()).max().unwrap_or(0)
}

/// Rarity points per back, keyed by tier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PointTable {
    values: BTreeMap<Rarity, u64>,
}

impl PointTable {
    /// Points for one back of `rarity`, or `None` for unscored tiers.
    #[inline]
    #[must_use]
    pub fn value(&self, rarity: Rarity) -> Option<u64> {
        self.values.get(&rarity).copied()
    }

    /// Iterates scored tiers in ascending weight order.
    pub fn iter(&self) -> impl Iterator<Item = (Rarity, u64)> + '_ {
        self.values.iter().map(|(r, v)| (*r, *v))
    }
}

/// Derives the point value of every scored tier.
///
/// `value(tier) = floor(sum(scored weights) * K / count(scored)) / weight(tier)`
/// with `K` = [`LOOT_MULTIPLIER`]. The rollback tier is excluded from both the
/// derivation and the result.
#[must_use]
pub fn compute_point_values(tiers: &[Rarity]) -> PointTable {
    let scored: Vec<Rarity> = tiers.iter().copied().filter(|r| r.is_scored()).collect();
    if scored.is_empty() {
        return PointTable::default();
    }

    let sum: u64 = scored.iter().map(|r| u64::from(r.weight())).sum();
    let base = sum * LOOT_MULTIPLIER / scored.len() as u64;

    let values = scored
        .into_iter()
        .map(|r| (r, base / u64::from(r.weight())))
        .collect();

    PointTable { values }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers_ascending_by_weight() {
        let weights: Vec<u32> = Rarity::ALL.iter().map(|r| r.weight()).collect();
        let mut sorted = weights.clone();
        sorted.sort_unstable();
        assert_eq!(weights, sorted);
        assert_eq!(max_weight(&Rarity::ALL), 400);
    }

    #[test]
    fn test_point_values() {
        let table = compute_point_values(&Rarity::ALL);

        // (10 + 90 + 400) * 300 / 3 = 50_000
        assert_eq!(table.value(Rarity::Rare), Some(5000));
        assert_eq!(table.value(Rarity::Uncommon), Some(555));
        assert_eq!(table.value(Rarity::Common), Some(125));
        assert_eq!(table.value(Rarity::Rollback), None);
    }

    #[test]
    fn test_point_values_subset() {
        let table = compute_point_values(&[Rarity::Rollback, Rarity::Common]);
        assert_eq!(table.value(Rarity::Common), Some(300));
        assert_eq!(table.iter().count(), 1);

        assert_eq!(compute_point_values(&[Rarity::Rollback]), PointTable::default());
    }

    #[test]
    fn test_from_name_ignores_case() {
        assert_eq!(Rarity::from_name("common").unwrap(), Rarity::Common);
        assert_eq!(Rarity::from_name("RARE").unwrap(), Rarity::Rare);
        assert_eq!(Rarity::from_name("Rollback").unwrap(), Rarity::Rollback);
        assert!(matches!(
            Rarity::from_name("mythic"),
            Err(LootError::UnknownTier { name }) if name == "mythic"
        ));
    }
}
