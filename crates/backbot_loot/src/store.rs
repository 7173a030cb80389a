//! # CSV Loot Bag
//!
//! The durable [`LootBag`]: the whole ledger lives in memory and is rewritten
//! to a single CSV file whenever the flush policy says so, and once more at
//! shutdown.
//!
//! ## Locking
//!
//! ```text
//! op ──> lock(state) ──> mutate ──> should_flush?
//!                                      │ yes
//!                                      ▼
//!                         notify_flush, render bytes,
//!                         lock(file), unlock(state)
//!                                      │
//!                                      ▼
//!                         seek(0) + write + truncate
//! ```
//!
//! The file lock is always taken while the state lock is held, so rendered
//! snapshots reach the disk in mutation order. The write itself runs after
//! the state lock is released, so operations that do not flush proceed during
//! it. An operation that is due to flush while an earlier write is still
//! running waits for that write while holding the state lock, which stalls
//! every other operation until the disk catches up.
//!
//! ## Failure model
//!
//! In-memory operations never fail. A failed flush is logged and the next
//! flush the policy allows rewrites the full state. A crash in the middle of
//! an in-place rewrite can leave a torn file; [`FlushMode::AtomicRename`]
//! trades an extra file for crash safety.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::back::Back;
use crate::catalog::Catalog;
use crate::codec::{read_table, write_table};
use crate::error::{LootError, LootResult};
use crate::flush::FlushPolicy;
use crate::ledger::{LedgerState, LootBag, UserId, UserLedgerEntry};
use crate::rarity::{compute_point_values, PointTable, Rarity};

/// How the backing file is rewritten.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushMode {
    /// Seek to the start, overwrite, truncate to the written length.
    #[default]
    InPlace,
    /// Write a sibling temporary file, sync it, rename it over the ledger.
    AtomicRename,
}

/// Ledger state guarded together with the policy that decides its flushes.
struct Guarded {
    state: LedgerState,
    policy: Box<dyn FlushPolicy>,
}

/// A [`LootBag`] persisted to a CSV file.
pub struct CsvLootBag {
    /// Path of the backing file.
    path: PathBuf,
    /// Ledger plus flush policy.
    inner: Mutex<Guarded>,
    /// The open backing file.
    file: Mutex<File>,
    /// Rewrite strategy.
    mode: FlushMode,
    /// Points used by `sell_loot`.
    points: PointTable,
}

impl CsvLootBag {
    /// Opens (creating if absent) the ledger at `path`.
    ///
    /// Any back path that parses is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`LootError::LedgerIo`] if the file cannot be opened or read.
    pub fn open(
        path: impl AsRef<Path>,
        policy: impl FlushPolicy + 'static,
        mode: FlushMode,
    ) -> LootResult<Self> {
        Self::open_with_resolver(path.as_ref(), Box::new(policy), mode, |p| Back::parse(p).ok())
    }

    /// Opens the ledger, keeping only backs present in `catalog`.
    ///
    /// # Errors
    ///
    /// Returns [`LootError::LedgerIo`] if the file cannot be opened or read.
    pub fn open_with_catalog(
        path: impl AsRef<Path>,
        policy: impl FlushPolicy + 'static,
        mode: FlushMode,
        catalog: &Catalog,
    ) -> LootResult<Self> {
        Self::open_with_resolver(path.as_ref(), Box::new(policy), mode, |p| {
            catalog.resolve(p).cloned()
        })
    }

    fn open_with_resolver<F>(
        path: &Path,
        policy: Box<dyn FlushPolicy>,
        mode: FlushMode,
        resolve: F,
    ) -> LootResult<Self>
    where
        F: FnMut(&str) -> Option<Back>,
    {
        let mut file = open_backing_file(path)?;

        let mut contents = Vec::new();
        file.read_to_end(&mut contents)
            .map_err(|e| LootError::LedgerIo(format!("failed to read {}: {e}", path.display())))?;

        let state = read_table(contents.as_slice(), resolve)?;
        tracing::info!(path = %path.display(), users = state.len(), "loaded loot ledger");

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(Guarded { state, policy }),
            file: Mutex::new(file),
            mode,
            points: compute_point_values(&Rarity::ALL),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A copy of the whole in-memory ledger.
    #[must_use]
    pub fn snapshot(&self) -> LedgerState {
        self.inner.lock().state.clone()
    }

    /// Writes the ledger now, regardless of policy.
    ///
    /// # Errors
    ///
    /// Returns the CSV or IO error of the failed write.
    pub fn flush(&self) -> LootResult<()> {
        let mut inner = self.inner.lock();
        inner.policy.notify_flush();
        let bytes = write_table(&inner.state)?;
        let mut file = self.file.lock();
        drop(inner);

        self.write_file(&mut file, &bytes)
    }

    /// Forces a final flush and closes the file.
    ///
    /// # Errors
    ///
    /// Returns the error of the final flush; the file is closed either way.
    pub fn shutdown(self) -> LootResult<()> {
        let result = self.flush();
        if let Err(e) = &result {
            tracing::error!(path = %self.path.display(), error = %e, "final ledger flush failed");
        } else {
            tracing::info!(path = %self.path.display(), "loot ledger shut down");
        }
        result
    }

    /// Runs `op` on the ledger, then flushes if the policy says so.
    fn with_state<T>(&self, op: impl FnOnce(&mut LedgerState) -> T) -> T {
        let mut inner = self.inner.lock();
        let out = op(&mut inner.state);

        if !inner.policy.should_flush() {
            return out;
        }
        inner.policy.notify_flush();

        let bytes = match write_table(&inner.state) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "failed to render loot ledger");
                return out;
            }
        };
        let mut file = self.file.lock();
        drop(inner);

        match self.write_file(&mut file, &bytes) {
            Ok(()) => tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "flushed loot ledger"),
            Err(e) => tracing::error!(path = %self.path.display(), error = %e, "failed to flush loot ledger"),
        }
        out
    }

    fn write_file(&self, file: &mut File, bytes: &[u8]) -> LootResult<()> {
        match self.mode {
            FlushMode::InPlace => rewrite_in_place(file, bytes),
            FlushMode::AtomicRename => {
                rewrite_by_rename(&self.path, bytes)?;
                *file = open_backing_file(&self.path)?;
                Ok(())
            }
        }
    }
}

impl LootBag for CsvLootBag {
    fn get_state(&self, user: &UserId) -> UserLedgerEntry {
        self.with_state(|state| state.get(user))
    }

    fn add_loot(&self, user: &UserId, back: &Back) {
        self.with_state(|state| state.add_loot(user, back));
    }

    fn remove_loot(&self, user: &UserId, back: &Back) -> bool {
        self.with_state(|state| state.remove_loot(user, back))
    }

    fn rollback(&self, user: &UserId) {
        self.with_state(|state| state.rollback(user));
    }

    fn sell_loot(&self, user: &UserId, back: &Back) -> Option<u64> {
        self.with_state(|state| state.sell_loot(user, back, &self.points))
    }

    fn spend_loot(&self, user: &UserId, spent: &HashMap<Back, u32>) {
        self.with_state(|state| state.spend_loot(user, spent));
    }
}

impl std::fmt::Debug for CsvLootBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvLootBag")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

fn open_backing_file(path: &Path) -> LootResult<File> {
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| LootError::LedgerIo(format!("failed to open {}: {e}", path.display())))
}

fn rewrite_in_place(file: &mut File, bytes: &[u8]) -> LootResult<()> {
    file.seek(SeekFrom::Start(0))
        .map_err(|e| LootError::LedgerIo(format!("could not rewind ledger file: {e}")))?;
    file.write_all(bytes)
        .map_err(|e| LootError::LedgerIo(format!("error while writing ledger file: {e}")))?;
    file.set_len(bytes.len() as u64)
        .map_err(|e| LootError::LedgerIo(format!("error while truncating ledger file: {e}")))?;
    file.flush()
        .map_err(|e| LootError::LedgerIo(format!("error while flushing ledger file: {e}")))?;
    Ok(())
}

fn rewrite_by_rename(path: &Path, bytes: &[u8]) -> LootResult<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let mut file = File::create(&tmp)
        .map_err(|e| LootError::LedgerIo(format!("failed to create {}: {e}", tmp.display())))?;
    file.write_all(bytes)
        .map_err(|e| LootError::LedgerIo(format!("failed to write {}: {e}", tmp.display())))?;
    file.sync_all()
        .map_err(|e| LootError::LedgerIo(format!("failed to sync {}: {e}", tmp.display())))?;
    drop(file);

    fs::rename(&tmp, path).map_err(|e| {
        LootError::LedgerIo(format!("failed to rename {} over {}: {e}", tmp.display(), path.display()))
    })
}
