//! # Backs
//!
//! A back is a collectible identified by its catalog path,
//! `<tier>/<subpath>`. The tier is the top-level directory.

use std::fmt;

use crate::error::{LootError, LootResult};
use crate::rarity::Rarity;

/// A collectible back.
///
/// Equality, ordering and hashing follow the full path; the rarity is
/// derived from the path at construction.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Back {
    path: String,
    rarity: Rarity,
}

impl Back {
    /// Parses a catalog-relative path into a back.
    ///
    /// Backslashes are normalized to `/`. The first segment must name a
    /// rarity tier and at least one segment must follow it.
    ///
    /// # Errors
    ///
    /// Returns [`LootError::InvalidBackPath`] for empty paths, bare tier
    /// names and paths whose top-level segment is not a tier.
    pub fn parse(path: &str) -> LootResult<Self> {
        let path = path.replace('\\', "/");
        let path = path.trim_matches('/');
        if path.is_empty() {
            return Err(invalid(path, "path is empty"));
        }

        let Some((tier, rest)) = path.split_once('/') else {
            return Err(invalid(path, "path has no tier directory"));
        };
        if rest.is_empty() {
            return Err(invalid(path, "path has no file below its tier"));
        }
        let rarity = Rarity::from_name(tier).map_err(|_| invalid(path, "unknown tier directory"))?;

        Ok(Self {
            path: path.to_string(),
            rarity,
        })
    }

    /// The full catalog-relative path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The rarity tier this back belongs to.
    #[inline]
    #[must_use]
    pub const fn rarity(&self) -> Rarity {
        self.rarity
    }

    /// The final path segment.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Display name: the file name up to its first `.`.
    #[must_use]
    pub fn name(&self) -> &str {
        let file_name = self.file_name();
        file_name.split('.').next().unwrap_or(file_name)
    }
}

impl fmt::Display for Back {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

fn invalid(path: &str, reason: &'static str) -> LootError {
    LootError::InvalidBackPath {
        path: path.to_string(),
        reason,
    }
}
