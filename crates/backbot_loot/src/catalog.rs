//! # Back Catalog
//!
//! The static universe of backs, partitioned by rarity tier.
//!
//! ```text
//! back_repo/
//! ├── Common/
//! │   ├── a.dca
//! │   └── nested/b.dca
//! ├── Rare/
//! │   └── c.dca
//! └── Rollback/
//!     └── reset.dca
//! ```
//!
//! Built once at startup and never mutated; shared read-only between tasks.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::back::Back;
use crate::error::{LootError, LootResult};
use crate::rarity::{compute_point_values, max_weight, PointTable, Rarity};

/// Read-only mapping from tier to the backs of that tier.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    /// Backs by tier.
    tiers: BTreeMap<Rarity, Vec<Back>>,
    /// Path lookup for resolving persisted paths.
    by_path: HashMap<String, Back>,
    /// Points per tier.
    points: PointTable,
}

impl Catalog {
    /// Loads the catalog from a directory tree.
    ///
    /// Every first-level entry under `root` must be named after a tier.
    /// Files nested at any depth below a tier directory become backs of that
    /// tier, with paths relative to `root`. Errors on individual walk entries
    /// are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`LootError::UnknownTier`] naming the first top-level entry
    /// that is not a tier, or [`LootError::CatalogIo`] if `root` itself
    /// cannot be listed.
    pub fn load(root: impl AsRef<Path>) -> LootResult<Self> {
        let root = root.as_ref();
        let entries = fs::read_dir(root).map_err(|e| {
            LootError::CatalogIo(format!("failed to list {}: {e}", root.display()))
        })?;

        let mut tiers: BTreeMap<Rarity, Vec<Back>> = BTreeMap::new();

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(root = %root.display(), error = %e, "skipping unreadable catalog entry");
                    continue;
                }
            };

            let dir_name = entry.file_name().to_string_lossy().into_owned();
            let rarity = Rarity::from_name(&dir_name).map_err(|_| LootError::UnknownTier {
                name: dir_name.clone(),
            })?;

            let backs = tiers.entry(rarity).or_default();
            backs.extend(walk_tier(root, &entry.path()));
        }

        let catalog = Self::from_tiers(tiers);
        tracing::info!(
            root = %root.display(),
            backs = catalog.len(),
            tiers = catalog.tiers.len(),
            "loaded back catalog"
        );
        Ok(catalog)
    }

    /// Builds a catalog from already-parsed backs, grouping them by tier.
    #[must_use]
    pub fn from_backs(backs: impl IntoIterator<Item = Back>) -> Self {
        let mut tiers: BTreeMap<Rarity, Vec<Back>> = BTreeMap::new();
        for back in backs {
            tiers.entry(back.rarity()).or_default().push(back);
        }
        Self::from_tiers(tiers)
    }

    fn from_tiers(tiers: BTreeMap<Rarity, Vec<Back>>) -> Self {
        let by_path = tiers
            .values()
            .flatten()
            .map(|back| (back.path().to_string(), back.clone()))
            .collect();
        Self {
            points: compute_point_values(&Rarity::ALL),
            tiers,
            by_path,
        }
    }

    /// Backs of one tier; empty if the tier is absent.
    #[must_use]
    pub fn backs(&self, rarity: Rarity) -> &[Back] {
        self.tiers.get(&rarity).map_or(&[], Vec::as_slice)
    }

    /// Whether the tier has a directory in the catalog (possibly empty).
    #[must_use]
    pub fn has_tier(&self, rarity: Rarity) -> bool {
        self.tiers.contains_key(&rarity)
    }

    /// Tiers present, in ascending weight order.
    pub fn tiers(&self) -> impl Iterator<Item = Rarity> + '_ {
        self.tiers.keys().copied()
    }

    /// The highest weight of any known tier, present or not.
    #[must_use]
    pub fn max_weight(&self) -> u32 {
        max_weight(&Rarity::ALL)
    }

    /// Resolves a persisted path to the catalog's back.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<&Back> {
        self.by_path.get(path)
    }

    /// Point values per tier.
    #[must_use]
    pub const fn points(&self) -> &PointTable {
        &self.points
    }

    /// Total number of backs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    /// Whether the catalog holds no backs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

/// Collects every file below a tier directory. Symlinks are followed, so a
/// link loop or a dangling link surfaces as a skipped walk error.
fn walk_tier(root: &Path, tier_dir: &Path) -> Vec<Back> {
    let mut backs = Vec::new();

    for entry in WalkDir::new(tier_dir).min_depth(1).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(tier_dir = %tier_dir.display(), error = %e, "error while walking catalog tier");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();

        match Back::parse(&relative.join("/")) {
            Ok(back) => backs.push(back),
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "skipping unparseable back");
            }
        }
    }

    backs
}
