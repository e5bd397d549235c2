//! # Storage - Durable deduplicating Set table engine
//!
//! Ties together the [`block`], [`rowset`], and [`codec`] crates into a
//! table engine that keeps every unique row in memory and makes every
//! appended batch durable on disk.
//!
//! ## Architecture
//!
//! ```text
//! Query layer (external)
//!   |
//!   v
//! ┌─────────────────────────────────────────────────┐
//! │                  SET TABLE                      │
//! │                                                 │
//! │ write.rs → RowSet insert → codec append to      │
//! │            tmp/<n>.bin → flush → atomic rename  │
//! │                                                 │
//! │ recovery.rs → scan <n>.bin files → decode →     │
//! │               RowSet insert → restore counter   │
//! │                                                 │
//! │ dirs.rs → <base>/<escaped-name>/ layout         │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! ## Durability Protocol
//!
//! A transaction writes all of its blocks to `tmp/<n>.bin`, where `n` is a
//! freshly claimed sequence number. Only after every buffering layer
//! (codec → zstd → file) is flushed does a single atomic rename publish the
//! file into the table root. A crash at any earlier point leaves at most an
//! orphan under `tmp/`, which recovery never scans. The sequence counter is
//! restored on open to the maximum published number, so a new number never
//! collides with an existing file, even across crashes.
//!
//! The write path assumes at most one concurrent writer (external
//! serialization is the caller's job); row-set reads may interleave freely.

mod dirs;
mod error;
mod recovery;
mod write;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use block::{Block, Schema};
use rowset::RowSet;
use tracing::info;

pub use dirs::escape_for_file_name;
pub use error::StorageError;
pub use write::BackupWriter;

/// Tunables for a Set table.
#[derive(Debug, Clone)]
pub struct SetTableOptions {
    /// If `true`, every transaction's `finish` fsyncs the backup file before
    /// publishing it.
    pub fsync: bool,
}

impl Default for SetTableOptions {
    fn default() -> Self {
        Self { fsync: true }
    }
}

/// A durable, deduplicating row store.
///
/// # Open
///
/// [`open`](SetTable::open) resolves `<base>/<escaped-name>/`, synchronously
/// replays every published backup file into the in-memory [`RowSet`], and
/// restores the sequence counter. The table is unavailable until recovery
/// completes; a corrupt or tampered directory fails the open.
///
/// # Write Path
///
/// 1. Claim the next sequence number.
/// 2. Stream blocks into `tmp/<n>.bin` (inserting each into the row set).
/// 3. Flush all layers and atomically rename into the table root.
pub struct SetTable {
    path: PathBuf,
    name: String,
    schema: Schema,
    set: RowSet,
    /// Current sequence counter; the number of the last claimed transaction.
    seq: AtomicU64,
    options: SetTableOptions,
}

impl std::fmt::Debug for SetTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetTable")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("seq", &self.sequence())
            .field("unique_rows", &self.set.total_row_count())
            .field("arity", &self.schema.arity())
            .field("fsync", &self.options.fsync)
            .finish()
    }
}

impl SetTable {
    /// Opens (or creates) a Set table, performing full recovery from any
    /// previously published backup files before returning.
    pub fn open<P: AsRef<Path>>(
        base: P,
        name: &str,
        schema: Schema,
        options: SetTableOptions,
    ) -> Result<Self, StorageError> {
        let path = dirs::table_dir(base.as_ref(), name);
        let set = RowSet::new();
        let seq = recovery::restore(&path, &set)?;

        info!(
            table = name,
            path = %path.display(),
            seq,
            unique_rows = set.total_row_count(),
            "set table opened"
        );

        Ok(Self {
            path,
            name: name.to_string(),
            schema,
            set,
            seq: AtomicU64::new(seq),
            options,
        })
    }

    /// Starts a new write transaction bound to the next sequence number.
    ///
    /// The number is claimed immediately; if the transaction is abandoned,
    /// its number is simply a gap in the published series (gaps are fine —
    /// recovery only cares about the maximum).
    pub fn begin_backup(&self) -> Result<BackupWriter<'_>, StorageError> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        BackupWriter::create(&self.set, &self.schema, &self.path, seq, self.options.fsync)
    }

    /// Writes a sequence of blocks as one durable transaction.
    ///
    /// Returns once all blocks are published; any failure is surfaced and
    /// the transaction's temp file is left orphaned under `tmp/`.
    pub fn write_blocks<I>(&self, blocks: I) -> Result<(), StorageError>
    where
        I: IntoIterator<Item = Block>,
    {
        let mut writer = self.begin_backup()?;
        for block in blocks {
            writer.write(&block)?;
        }
        writer.finish()
    }

    /// Moves the whole table directory (published files, `tmp/`, orphans)
    /// under a new base with a new name, in one filesystem rename, then
    /// updates the live path/name state.
    pub fn rename<P: AsRef<Path>>(&mut self, new_base: P, new_name: &str) -> Result<(), StorageError> {
        let new_path = dirs::table_dir(new_base.as_ref(), new_name);
        fs::rename(&self.path, &new_path)?;
        self.path = new_path;
        self.name = new_name.to_string();
        Ok(())
    }

    /// The live deduplicated row store. Reads may interleave with an
    /// in-flight write transaction.
    pub fn row_set(&self) -> &RowSet {
        &self.set
    }

    /// Current unique row count (diagnostics).
    pub fn total_row_count(&self) -> usize {
        self.set.total_row_count()
    }

    /// The sequence number of the most recently claimed transaction.
    pub fn sequence(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The table's directory on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests;
