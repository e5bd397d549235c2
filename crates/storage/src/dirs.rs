//! Path layout for a Set table's on-disk directory.
//!
//! ```text
//! <base>/<escaped-table-name>/
//!     1.bin          published backup files
//!     2.bin
//!     tmp/           in-progress and orphaned transaction files
//!         3.bin
//! ```

use std::path::{Path, PathBuf};

/// Child directory holding in-progress (unpublished) transaction files.
pub(crate) const TMP_DIR_NAME: &str = "tmp";

/// Suffix of every backup file, published or in-progress.
pub(crate) const BACKUP_SUFFIX: &str = ".bin";

/// Escapes a table name for use as a directory name.
///
/// ASCII letters, digits and `_` pass through; every other byte becomes
/// `%XX` (uppercase hex), so distinct table names always map to distinct
/// directory names.
pub fn escape_for_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for b in name.bytes() {
        if b.is_ascii_alphanumeric() || b == b'_' {
            out.push(b as char);
        } else {
            out.push('%');
            out.push_str(&format!("{:02X}", b));
        }
    }
    out
}

/// The per-table directory under `base`.
pub(crate) fn table_dir(base: &Path, name: &str) -> PathBuf {
    base.join(escape_for_file_name(name))
}

/// The temp subdirectory of a table directory.
pub(crate) fn tmp_dir(table_dir: &Path) -> PathBuf {
    table_dir.join(TMP_DIR_NAME)
}

/// File name for the backup published by transaction `seq`.
pub(crate) fn backup_file_name(seq: u64) -> String {
    format!("{}{}", seq, BACKUP_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_pass_through() {
        assert_eq!(escape_for_file_name("users_2024"), "users_2024");
    }

    #[test]
    fn special_characters_are_percent_encoded() {
        assert_eq!(escape_for_file_name("a/b"), "a%2Fb");
        assert_eq!(escape_for_file_name("a b.c"), "a%20b%2Ec");
        assert_eq!(escape_for_file_name("тест"), "%D1%82%D0%B5%D1%81%D1%82");
    }

    #[test]
    fn distinct_names_stay_distinct() {
        assert_ne!(escape_for_file_name("a/b"), escape_for_file_name("a_b"));
    }

    #[test]
    fn backup_names_are_decimal_without_padding() {
        assert_eq!(backup_file_name(1), "1.bin");
        assert_eq!(backup_file_name(12345), "12345.bin");
    }
}
