//! # Loot Ledger
//!
//! Per-user counts of owned backs plus a greenbacks balance.
//!
//! ## Invariants
//!
//! 1. A stored count is always `>= 1`; a count reaching zero removes the key
//! 2. Rarity points are computed on demand from the counts, never cached
//! 3. Unknown users read as an empty entry
//!
//! [`LootBag`] is the operation set; [`MemoryLootBag`] keeps everything in
//! memory and [`crate::store::CsvLootBag`] adds the durable file.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use parking_lot::Mutex;

use crate::back::Back;
use crate::rarity::{compute_point_values, PointTable, Rarity};

/// Identifier of a ledger owner.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(String);

impl UserId {
    /// Wraps a user identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One user's ledger entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserLedgerEntry {
    /// Owned backs and their counts. Every count is `>= 1`.
    pub loot: HashMap<Back, u32>,
    /// Currency balance.
    pub greenbacks: u64,
}

impl UserLedgerEntry {
    /// How many copies of `back` the user owns.
    #[must_use]
    pub fn count(&self, back: &Back) -> u32 {
        self.loot.get(back).copied().unwrap_or(0)
    }

    /// Total rarity points: sum of `points(tier) * count` over owned backs.
    /// Unscored tiers contribute nothing.
    #[must_use]
    pub fn rarity_points(&self, points: &PointTable) -> u64 {
        self.loot
            .iter()
            .filter_map(|(back, count)| points.value(back.rarity()).map(|v| v * u64::from(*count)))
            .sum()
    }

    /// Owned backs grouped by tier, each group sorted by path.
    #[must_use]
    pub fn loot_by_rarity(&self) -> BTreeMap<Rarity, Vec<(Back, u32)>> {
        let mut grouped: BTreeMap<Rarity, Vec<(Back, u32)>> = BTreeMap::new();
        for (back, count) in &self.loot {
            grouped.entry(back.rarity()).or_default().push((back.clone(), *count));
        }
        for backs in grouped.values_mut() {
            backs.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        }
        grouped
    }

    /// Owned backs sorted by path.
    #[must_use]
    pub fn sorted_loot(&self) -> Vec<(&Back, u32)> {
        let mut loot: Vec<(&Back, u32)> = self.loot.iter().map(|(b, c)| (b, *c)).collect();
        loot.sort_unstable_by(|a, b| a.0.cmp(b.0));
        loot
    }

    /// Whether the user owns nothing and has no greenbacks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loot.is_empty() && self.greenbacks == 0
    }

    fn add(&mut self, back: &Back) {
        let count = self.loot.entry(back.clone()).or_insert(0);
        match count.checked_add(1) {
            Some(next) => *count = next,
            None => {
                tracing::warn!(back = %back, count = *count, "back count at maximum, not incremented");
            }
        }
    }

    fn remove(&mut self, back: &Back) -> bool {
        let Some(count) = self.loot.get_mut(back) else {
            return false;
        };
        if *count > 1 {
            *count -= 1;
        } else {
            self.loot.remove(back);
        }
        true
    }
}

/// The set of ledger operations callers depend on.
///
/// Every operation is keyed by user and may trigger a flush check as a side
/// effect. In-memory mutations cannot fail.
pub trait LootBag: Send + Sync {
    /// The user's entry, or an empty entry for unknown users.
    fn get_state(&self, user: &UserId) -> UserLedgerEntry;

    /// Adds one copy of `back`.
    fn add_loot(&self, user: &UserId, back: &Back);

    /// Removes one copy of `back`. Returns `false` if the user owns none.
    fn remove_loot(&self, user: &UserId, back: &Back) -> bool;

    /// Clears every owned back. Greenbacks are untouched.
    fn rollback(&self, user: &UserId);

    /// Sells one copy of `back` for its point value, crediting greenbacks.
    ///
    /// Returns the credited amount, or `None` (with no mutation) when the
    /// back is not owned or its tier is unscored.
    fn sell_loot(&self, user: &UserId, back: &Back) -> Option<u64>;

    /// Removes up to `spent[back]` copies of each listed back in one step.
    /// Copies beyond what the user owns are ignored; unlisted backs stay.
    fn spend_loot(&self, user: &UserId, spent: &HashMap<Back, u32>);
}

/// The user map and the mutations shared by every [`LootBag`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerState {
    users: HashMap<UserId, UserLedgerEntry>,
}

impl LedgerState {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The user's entry, cloned, or an empty one.
    #[must_use]
    pub fn get(&self, user: &UserId) -> UserLedgerEntry {
        self.users.get(user).cloned().unwrap_or_default()
    }

    /// Replaces a user's entry wholesale.
    pub fn insert(&mut self, user: UserId, entry: UserLedgerEntry) {
        self.users.insert(user, entry);
    }

    /// Adds one copy of `back`.
    pub fn add_loot(&mut self, user: &UserId, back: &Back) {
        self.users.entry(user.clone()).or_default().add(back);
    }

    /// Removes one copy of `back`.
    pub fn remove_loot(&mut self, user: &UserId, back: &Back) -> bool {
        self.users.get_mut(user).is_some_and(|entry| entry.remove(back))
    }

    /// Clears the user's loot, keeping greenbacks.
    pub fn rollback(&mut self, user: &UserId) {
        if let Some(entry) = self.users.get_mut(user) {
            entry.loot.clear();
        }
    }

    /// Removes up to the listed count of each back, deleting keys that reach
    /// zero.
    pub fn spend_loot(&mut self, user: &UserId, spent: &HashMap<Back, u32>) {
        let Some(entry) = self.users.get_mut(user) else {
            return;
        };
        for (back, count) in spent {
            if let Some(owned) = entry.loot.get_mut(back) {
                *owned = owned.saturating_sub(*count);
                if *owned == 0 {
                    entry.loot.remove(back);
                }
            }
        }
    }

    /// Removes one copy of `back` and credits its point value.
    pub fn sell_loot(&mut self, user: &UserId, back: &Back, points: &PointTable) -> Option<u64> {
        let value = points.value(back.rarity())?;
        let entry = self.users.get_mut(user)?;
        if !entry.remove(back) {
            return None;
        }
        entry.greenbacks = entry.greenbacks.saturating_add(value);
        Some(value)
    }

    /// Iterates all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&UserId, &UserLedgerEntry)> {
        self.users.iter()
    }

    /// Number of users with an entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether no user has an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// A [`LootBag`] with no backing file.
#[derive(Debug)]
pub struct MemoryLootBag {
    state: Mutex<LedgerState>,
    points: PointTable,
}

impl MemoryLootBag {
    /// Creates an empty bag scored with the standard point table.
    #[must_use]
    pub fn new() -> Self {
        Self::with_state(LedgerState::new())
    }

    /// Creates a bag pre-populated with `state`.
    #[must_use]
    pub fn with_state(state: LedgerState) -> Self {
        Self {
            state: Mutex::new(state),
            points: compute_point_values(&Rarity::ALL),
        }
    }

    /// A copy of the whole ledger.
    #[must_use]
    pub fn snapshot(&self) -> LedgerState {
        self.state.lock().clone()
    }
}

impl Default for MemoryLootBag {
    fn default() -> Self {
        Self::new()
    }
}

impl LootBag for MemoryLootBag {
    fn get_state(&self, user: &UserId) -> UserLedgerEntry {
        self.state.lock().get(user)
    }

    fn add_loot(&self, user: &UserId, back: &Back) {
        self.state.lock().add_loot(user, back);
    }

    fn remove_loot(&self, user: &UserId, back: &Back) -> bool {
        self.state.lock().remove_loot(user, back)
    }

    fn rollback(&self, user: &UserId) {
        self.state.lock().rollback(user);
    }

    fn sell_loot(&self, user: &UserId, back: &Back) -> Option<u64> {
        self.state.lock().sell_loot(user, back, &self.points)
    }

    fn spend_loot(&self, user: &UserId, spent: &HashMap<Back, u32>) {
        self.state.lock().spend_loot(user, spent);
    }
}
