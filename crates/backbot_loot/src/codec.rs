//! # Ledger Codec
//!
//! Converts ledger entries to and from rows of a comma-delimited table.
//!
//! ## Row format
//!
//! ```text
//! userID, greenbacks, back-1-path, back-1-count, ..., back-n-path, back-n-count
//! ```
//!
//! Rows have a variable column count. Backs within a row are written in
//! ascending path order and rows in ascending user order, so the same ledger
//! always renders to the same bytes.
//!
//! ## Decoding
//!
//! - user id and greenbacks are mandatory; a failure rejects the whole row
//! - back/count pairs are decoded one by one; a bad pair is skipped
//! - a dangling unpaired field is logged and dropped

use std::io::Read;

use csv::{ReaderBuilder, WriterBuilder};

use crate::back::Back;
use crate::error::{LootError, LootResult};
use crate::ledger::{LedgerState, UserId, UserLedgerEntry};

/// Renders one entry as a row. Backs with a count below 1 are omitted.
#[must_use]
pub fn encode_record(user: &UserId, entry: &UserLedgerEntry) -> Vec<String> {
    let mut record = Vec::with_capacity(2 + entry.loot.len() * 2);
    record.push(user.as_str().to_string());
    record.push(entry.greenbacks.to_string());

    for (back, count) in entry.sorted_loot() {
        if count < 1 {
            continue;
        }
        record.push(back.path().to_string());
        record.push(count.to_string());
    }

    record
}

/// Decodes a row, accepting any back path that parses.
///
/// # Errors
///
/// See [`decode_record_with`].
pub fn decode_record<S: AsRef<str>>(record: &[S]) -> LootResult<(UserId, UserLedgerEntry)> {
    decode_record_with(record, |path| Back::parse(path).ok())
}

/// Decodes a row, resolving back paths through `resolve`.
///
/// Pairs whose path does not resolve, or whose count is not a positive
/// integer, are skipped.
///
/// # Errors
///
/// Returns [`LootError::InvalidRecord`] if the row has fewer than two fields,
/// an empty user id, or a greenbacks field that is not a non-negative integer.
pub fn decode_record_with<S, F>(record: &[S], mut resolve: F) -> LootResult<(UserId, UserLedgerEntry)>
where
    S: AsRef<str>,
    F: FnMut(&str) -> Option<Back>,
{
    let [user, greenbacks, rest @ ..] = record else {
        return Err(LootError::InvalidRecord(format!(
            "expected at least 2 fields, found {}",
            record.len()
        )));
    };

    let user = user.as_ref();
    if user.is_empty() {
        return Err(LootError::InvalidRecord("empty user id".to_string()));
    }

    let greenbacks = greenbacks.as_ref().parse::<u64>().map_err(|e| {
        LootError::InvalidRecord(format!(
            "invalid greenbacks {:?} for user {user:?}: {e}",
            greenbacks.as_ref()
        ))
    })?;

    let mut entry = UserLedgerEntry {
        greenbacks,
        ..UserLedgerEntry::default()
    };

    let mut pairs = rest.chunks_exact(2);
    for pair in pairs.by_ref() {
        let (path, count) = (pair[0].as_ref(), pair[1].as_ref());

        let Some(back) = resolve(path) else {
            tracing::debug!(user, path, "skipping unresolvable back in ledger record");
            continue;
        };
        match count.parse::<u32>() {
            Ok(count) if count >= 1 => {
                entry.loot.insert(back, count);
            }
            _ => {
                tracing::debug!(user, path, count, "skipping invalid back count in ledger record");
            }
        }
    }

    let remainder: Vec<&str> = pairs.remainder().iter().map(AsRef::as_ref).collect();
    if !remainder.is_empty() {
        tracing::warn!(user, ?remainder, "corrupted ledger record: dropping unpaired trailing field");
    }

    Ok((UserId::new(user), entry))
}

/// Renders the whole ledger as CSV bytes, rows sorted by user id.
///
/// # Errors
///
/// Returns [`LootError::Csv`] if the CSV writer fails.
pub fn write_table(state: &LedgerState) -> LootResult<Vec<u8>> {
    let mut users: Vec<(&UserId, &UserLedgerEntry)> = state.iter().collect();
    users.sort_unstable_by(|a, b| a.0.cmp(b.0));

    let mut writer = WriterBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_writer(Vec::new());

    for (user, entry) in users {
        writer
            .write_record(encode_record(user, entry))
            .map_err(|e| LootError::Csv(format!("failed to encode record for {user}: {e}")))?;
    }

    writer
        .into_inner()
        .map_err(|e| LootError::Csv(format!("failed to finish ledger table: {e}")))
}

/// Parses a ledger table, resolving back paths through `resolve`.
///
/// Rows that fail their mandatory fields are logged and skipped. A later
/// row for the same user replaces an earlier one.
///
/// # Errors
///
/// Returns [`LootError::LedgerIo`] if the underlying reader fails.
pub fn read_table<R, F>(reader: R, mut resolve: F) -> LootResult<LedgerState>
where
    R: Read,
    F: FnMut(&str) -> Option<Back>,
{
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut state = LedgerState::new();

    for (index, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => {
                return Err(LootError::LedgerIo(format!("failed to read ledger: {e}")));
            }
            Err(e) => {
                tracing::warn!(row = index + 1, error = %e, "skipping malformed ledger row");
                continue;
            }
        };

        let fields: Vec<&str> = record.iter().collect();
        match decode_record_with(&fields, &mut resolve) {
            Ok((user, entry)) => state.insert(user, entry),
            Err(e) => {
                tracing::warn!(row = index + 1, ?fields, error = %e, "rejecting ledger record");
            }
        }
    }

    Ok(state)
}
