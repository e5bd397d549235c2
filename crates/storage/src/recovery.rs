//! Startup recovery: rebuild the row set from published backup files.
//!
//! Runs once, synchronously, before the table accepts any operation. The
//! directory walk is an explicit enumerate-parse-validate pass that yields
//! typed `(sequence, path)` pairs before any decoding begins, keeping
//! filesystem concerns out of the codec path.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use codec::BlockStreamReader;
use rowset::RowSet;
use tracing::info;

use crate::dirs::{tmp_dir, BACKUP_SUFFIX};
use crate::StorageError;

/// One published backup file discovered in the table root.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct BackupFile {
    pub seq: u64,
    pub path: PathBuf,
}

/// Lists the published backup files directly under `table_dir`.
///
/// Directories (including `tmp/`) and files without the `.bin` suffix are
/// ignored. Zero-byte `.bin` files are skipped — they are artifacts of a
/// crash before any flush, and their numbers do not advance the sequence
/// counter. A `.bin` name whose prefix is not a decimal sequence number is
/// fatal ([`StorageError::BadBackupName`]).
pub(crate) fn scan_backup_files(table_dir: &Path) -> Result<Vec<BackupFile>, StorageError> {
    let mut files = Vec::new();

    for entry in fs::read_dir(table_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        // Lossy conversion keeps the ASCII `.bin` suffix intact even for a
        // non-UTF-8 name; any replacement characters then land in the stem,
        // where the sequence parse treats them as tampering.
        let name = file_name.to_string_lossy();
        let stem = match name.strip_suffix(BACKUP_SUFFIX) {
            Some(s) => s,
            None => continue,
        };
        if entry.metadata()?.len() == 0 {
            continue;
        }
        let seq: u64 = stem.parse().map_err(|_| StorageError::BadBackupName {
            name: name.to_string(),
        })?;
        files.push(BackupFile {
            seq,
            path: entry.path(),
        });
    }

    Ok(files)
}

/// Replays every published backup file into `set` and returns the highest
/// sequence number seen (0 for a fresh table).
///
/// A missing `tmp/` subdirectory means the table has never been opened:
/// the directories are created and there is nothing to replay.
pub(crate) fn restore(table_dir: &Path, set: &RowSet) -> Result<u64, StorageError> {
    let tmp = tmp_dir(table_dir);
    if !tmp.is_dir() {
        fs::create_dir_all(&tmp)?;
        return Ok(0);
    }

    let mut files = scan_backup_files(table_dir)?;
    files.sort_by_key(|f| f.seq);

    let mut max_seq = 0u64;
    for file in &files {
        restore_from_file(file, set)?;
        max_seq = max_seq.max(file.seq);
    }

    Ok(max_seq)
}

/// Decodes one backup file to exhaustion, inserting every block into `set`.
fn restore_from_file(file: &BackupFile, set: &RowSet) -> Result<(), StorageError> {
    let raw = File::open(&file.path)?;
    let decoder = zstd::stream::read::Decoder::new(raw)?;
    let mut reader = BlockStreamReader::new(decoder);

    let mut rows = 0usize;
    loop {
        let block = reader.next_block().map_err(|source| StorageError::Corrupt {
            path: file.path.clone(),
            source,
        })?;
        match block {
            Some(block) => {
                rows += block.num_rows();
                set.insert_from_block(&block);
            }
            None => break,
        }
    }

    info!(
        path = %file.path.display(),
        rows,
        unique_rows = set.total_row_count(),
        "loaded backup file"
    );
    Ok(())
}
