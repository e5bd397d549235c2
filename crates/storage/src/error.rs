use std::io;
use std::path::PathBuf;

use codec::CodecError;
use thiserror::Error;

/// Errors surfaced by table open, write transactions, and rename.
///
/// None of these are retried internally: a failed write transaction is
/// abandoned (its temp file orphaned), and a failed recovery means the table
/// does not open.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An open/read/write/rename failure at the filesystem boundary.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A codec failure on the write path.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A published backup file could not be decoded during recovery.
    ///
    /// Fatal to opening the table: silently dropping rows would break the
    /// completeness guarantee of the set.
    #[error("corrupt backup file {}: {}", .path.display(), .source)]
    Corrupt {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    /// A `.bin` file in the table root whose name prefix is not a sequence
    /// number. Treated as directory corruption or external tampering.
    #[error("unrecognized backup file name in table directory: {name:?}")]
    BadBackupName { name: String },

    /// A block handed to a write transaction does not match the table's
    /// declared column list.
    #[error("block does not match the table schema")]
    SchemaMismatch,
}
