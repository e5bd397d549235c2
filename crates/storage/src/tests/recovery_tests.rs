use super::helpers::*;
use crate::StorageError;
use std::fs;
use tempfile::tempdir;

// --------------------- Fresh tables ---------------------

#[test]
fn fresh_table_starts_at_sequence_zero() {
    let dir = tempdir().unwrap();
    let table = open_table(dir.path(), "t").unwrap();

    assert_eq!(table.sequence(), 0);
    assert_eq!(table.total_row_count(), 0);
    assert!(table.path().join("tmp").is_dir());
}

#[test]
fn reopening_empty_table_is_fine() {
    let dir = tempdir().unwrap();
    drop(open_table(dir.path(), "t").unwrap());
    let table = open_table(dir.path(), "t").unwrap();
    assert_eq!(table.sequence(), 0);
}

// --------------------- Replay ---------------------

#[test]
fn recovery_unions_all_published_files() {
    let dir = tempdir().unwrap();
    {
        let table = open_table(dir.path(), "t").unwrap();
        table
            .write_blocks(vec![block_of(&[(1, "A"), (2, "B")])])
            .unwrap();
        table
            .write_blocks(vec![block_of(&[(2, "B"), (3, "C")])])
            .unwrap();
    }

    let table = open_table(dir.path(), "t").unwrap();
    assert_eq!(table.total_row_count(), 3);
    assert!(table.row_set().contains(&row(1, "A")));
    assert!(table.row_set().contains(&row(2, "B")));
    assert!(table.row_set().contains(&row(3, "C")));
    assert_eq!(table.sequence(), 2);
}

#[test]
fn recovery_restores_multi_block_transactions() {
    let dir = tempdir().unwrap();
    {
        let table = open_table(dir.path(), "t").unwrap();
        table
            .write_blocks(vec![
                block_of(&[(1, "a")]),
                block_of(&[(2, "b")]),
                block_of(&[(3, "c")]),
            ])
            .unwrap();
    }

    let table = open_table(dir.path(), "t").unwrap();
    assert_eq!(table.total_row_count(), 3);
}

// --------------------- Sequence counter ---------------------

#[test]
fn next_sequence_exceeds_all_published_files() {
    let dir = tempdir().unwrap();
    {
        let table = open_table(dir.path(), "t").unwrap();
        table.write_blocks(vec![block_of(&[(1, "a")])]).unwrap();
        table.write_blocks(vec![block_of(&[(2, "b")])]).unwrap();
    }

    // Fake a directory with gaps: 3.bin and 7.bin
    let root = dir.path().join("t");
    fs::rename(root.join("1.bin"), root.join("3.bin")).unwrap();
    fs::rename(root.join("2.bin"), root.join("7.bin")).unwrap();

    let table = open_table(dir.path(), "t").unwrap();
    assert_eq!(table.sequence(), 7);

    table.write_blocks(vec![block_of(&[(3, "c")])]).unwrap();
    assert!(root.join("8.bin").exists());
}

// --------------------- Tolerated artifacts ---------------------

#[test]
fn zero_byte_file_is_skipped() {
    let dir = tempdir().unwrap();
    {
        let table = open_table(dir.path(), "t").unwrap();
        table.write_blocks(vec![block_of(&[(1, "a")])]).unwrap();
    }

    // crash artifact: a published name that never got any bytes
    fs::write(dir.path().join("t").join("9.bin"), b"").unwrap();

    let table = open_table(dir.path(), "t").unwrap();
    assert_eq!(table.total_row_count(), 1);
    // zero-byte files do not advance the counter
    assert_eq!(table.sequence(), 1);
}

#[test]
fn non_bin_files_are_ignored() {
    let dir = tempdir().unwrap();
    {
        let table = open_table(dir.path(), "t").unwrap();
        table.write_blocks(vec![block_of(&[(1, "a")])]).unwrap();
    }
    fs::write(dir.path().join("t").join("notes.txt"), b"hello").unwrap();

    let table = open_table(dir.path(), "t").unwrap();
    assert_eq!(table.total_row_count(), 1);
}

// --------------------- Fatal conditions ---------------------

#[test]
fn malformed_bin_name_fails_open() {
    let dir = tempdir().unwrap();
    drop(open_table(dir.path(), "t").unwrap());
    fs::write(dir.path().join("t").join("junk.bin"), b"x").unwrap();

    let err = open_table(dir.path(), "t").unwrap_err();
    assert!(matches!(err, StorageError::BadBackupName { .. }));
}

#[cfg(unix)]
#[test]
fn non_utf8_bin_name_fails_open() {
    use std::os::unix::ffi::OsStrExt;

    let dir = tempdir().unwrap();
    drop(open_table(dir.path(), "t").unwrap());

    let name = std::ffi::OsStr::from_bytes(b"1\xFF.bin");
    fs::write(dir.path().join("t").join(name), b"x").unwrap();

    let err = open_table(dir.path(), "t").unwrap_err();
    assert!(matches!(err, StorageError::BadBackupName { .. }));
}

#[test]
fn truncated_backup_file_fails_open() {
    let dir = tempdir().unwrap();
    {
        let table = open_table(dir.path(), "t").unwrap();
        table
            .write_blocks(vec![block_of(&[(1, "a"), (2, "b")])])
            .unwrap();
    }

    let path = dir.path().join("t").join("1.bin");
    let data = fs::read(&path).unwrap();
    fs::write(&path, &data[..data.len() / 2]).unwrap();

    let err = open_table(dir.path(), "t").unwrap_err();
    assert!(matches!(err, StorageError::Corrupt { .. }));
}

#[test]
fn garbage_backup_file_fails_open() {
    let dir = tempdir().unwrap();
    drop(open_table(dir.path(), "t").unwrap());
    fs::write(dir.path().join("t").join("1.bin"), b"not a zstd stream").unwrap();

    assert!(open_table(dir.path(), "t").is_err());
}

// --------------------- Commutativity ---------------------

#[test]
fn replay_order_does_not_affect_contents() {
    // Two directories holding the same blocks published in opposite order
    // must recover to identical sets.
    let fwd = tempdir().unwrap();
    let rev = tempdir().unwrap();

    {
        let t = open_table(fwd.path(), "t").unwrap();
        t.write_blocks(vec![block_of(&[(1, "a"), (2, "b")])]).unwrap();
        t.write_blocks(vec![block_of(&[(2, "b"), (3, "c")])]).unwrap();
    }
    {
        let t = open_table(rev.path(), "t").unwrap();
        t.write_blocks(vec![block_of(&[(2, "b"), (3, "c")])]).unwrap();
        t.write_blocks(vec![block_of(&[(1, "a"), (2, "b")])]).unwrap();
    }

    let a = open_table(fwd.path(), "t").unwrap();
    let b = open_table(rev.path(), "t").unwrap();
    assert_eq!(a.total_row_count(), 3);
    assert_eq!(b.total_row_count(), 3);
    for r in [row(1, "a"), row(2, "b"), row(3, "c")] {
        assert!(a.row_set().contains(&r));
        assert!(b.row_set().contains(&r));
    }
}
