//! One durable write transaction: temp file, compressed block stream,
//! atomic publish by rename.

use std::fs::{self, File, OpenOptions};
use std::io::BufWriter;
use std::path::PathBuf;

use block::{Block, Schema};
use codec::BlockStreamWriter;
use rowset::RowSet;
use tracing::debug;
use zstd::stream::write::Encoder;

use crate::dirs::{backup_file_name, tmp_dir};
use crate::StorageError;

/// 0 selects zstd's default compression level.
const COMPRESSION_LEVEL: i32 = 0;

type BackupStream = BlockStreamWriter<Encoder<'static, BufWriter<File>>>;

/// A single write transaction against a Set table.
///
/// Created by [`SetTable::begin_backup`](crate::SetTable::begin_backup) with
/// the transaction's sequence number already claimed. Blocks written through
/// [`write`](BackupWriter::write) are inserted into the row set and appended
/// to a temp file under `tmp/`; nothing is visible under the final name
/// until [`finish`](BackupWriter::finish) flushes every layer and atomically
/// renames the file into the table root.
///
/// Dropping the writer without calling `finish` abandons the transaction:
/// the temp file stays behind as an orphan, invisible to recovery. Rows
/// already inserted into the in-memory set are not rolled back — they
/// disappear with the process, so no cross-restart inconsistency results.
pub struct BackupWriter<'a> {
    set: &'a RowSet,
    schema: &'a Schema,
    tmp_path: PathBuf,
    final_path: PathBuf,
    stream: BackupStream,
    fsync: bool,
}

impl<'a> BackupWriter<'a> {
    pub(crate) fn create(
        set: &'a RowSet,
        schema: &'a Schema,
        table_dir: &std::path::Path,
        seq: u64,
        fsync: bool,
    ) -> Result<Self, StorageError> {
        let file_name = backup_file_name(seq);
        let tmp_path = tmp_dir(table_dir).join(&file_name);
        let final_path = table_dir.join(&file_name);

        // Truncate: an orphan with the same number from a crashed run is
        // dead weight, never replayed, and safe to overwrite.
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        let encoder = Encoder::new(BufWriter::new(file), COMPRESSION_LEVEL)?;

        Ok(Self {
            set,
            schema,
            tmp_path,
            final_path,
            stream: BlockStreamWriter::new(encoder),
            fsync,
        })
    }

    /// Applies one block: row set insert first, then the durable append.
    ///
    /// If the process dies between the two, the next restart re-derives the
    /// set purely from what was durably appended — the in-memory insert is
    /// not itself a durability requirement.
    pub fn write(&mut self, block: &Block) -> Result<(), StorageError> {
        if !block.matches_schema(self.schema) {
            return Err(StorageError::SchemaMismatch);
        }
        self.set.insert_from_block(block);
        self.stream.encode(block)?;
        Ok(())
    }

    /// Finalizes the transaction: flushes codec, compressor and file buffers
    /// in that order, fsyncs when configured, then atomically renames the
    /// temp file into the table root.
    ///
    /// Only after the rename is the backup file published and eligible for
    /// a future recovery scan. On any failure the temp file is left behind
    /// and the error is surfaced to the caller.
    pub fn finish(self) -> Result<(), StorageError> {
        let encoder = self.stream.into_inner()?;
        let buf = encoder.finish()?;
        let file = buf
            .into_inner()
            .map_err(|e| StorageError::Io(e.into_error()))?;
        if self.fsync {
            file.sync_all()?;
        }
        drop(file);

        fs::rename(&self.tmp_path, &self.final_path)?;

        // Fsync the parent directory so the rename itself survives a crash.
        if let Some(parent) = self.final_path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        debug!(path = %self.final_path.display(), "published backup file");
        Ok(())
    }
}
