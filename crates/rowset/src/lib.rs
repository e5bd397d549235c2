//! # RowSet - Deduplicated in-memory row store
//!
//! The live contents of a Set table: every unique row ever inserted, with
//! duplicate insertions ignored. Populated from decoded blocks at recovery
//! time and by every write transaction afterwards.
//!
//! Because the store is a set, insertion is commutative: replaying the same
//! blocks in any order yields the same final contents. Recovery relies on
//! this property.
//!
//! Internally a `HashSet` behind an `RwLock`, so membership probes and row
//! counts can interleave with the (single) writer's `insert_from_block`
//! calls. A row is visible to readers no later than its insertion returns.

use std::collections::HashSet;
use std::sync::RwLock;

use block::{Block, Row, Value};

#[derive(Debug, Default)]
pub struct RowSet {
    rows: RwLock<HashSet<Row>>,
}

impl RowSet {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashSet::new()),
        }
    }

    /// Inserts every row of `block`, in the order the columns present them.
    ///
    /// A row already present (by full column-wise equality) is a no-op.
    /// Returns the number of rows that were actually new.
    pub fn insert_from_block(&self, block: &Block) -> usize {
        let mut rows = self.rows.write().expect("row set lock poisoned");
        let mut inserted = 0;
        for row in block.rows() {
            if rows.insert(row) {
                inserted += 1;
            }
        }
        inserted
    }

    /// Current number of unique rows.
    pub fn total_row_count(&self) -> usize {
        self.rows.read().expect("row set lock poisoned").len()
    }

    /// Membership probe by full column-wise equality.
    pub fn contains(&self, row: &[Value]) -> bool {
        self.rows.read().expect("row set lock poisoned").contains(row)
    }

    pub fn is_empty(&self) -> bool {
        self.total_row_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use block::{Schema, Value};

    fn schema() -> Schema {
        Schema::parse("id:int64,name:text").unwrap()
    }

    fn block_of(rows: &[(i64, &str)]) -> Block {
        let mut b = Block::new(&schema());
        for (id, name) in rows {
            b.push_row(vec![Value::Int64(*id), Value::Text((*name).into())])
                .unwrap();
        }
        b
    }

    #[test]
    fn insert_and_count() {
        let set = RowSet::new();
        assert!(set.is_empty());

        let n = set.insert_from_block(&block_of(&[(1, "a"), (2, "b")]));
        assert_eq!(n, 2);
        assert_eq!(set.total_row_count(), 2);
    }

    #[test]
    fn duplicate_rows_are_noops() {
        let set = RowSet::new();
        set.insert_from_block(&block_of(&[(1, "a"), (1, "a")]));
        assert_eq!(set.total_row_count(), 1);

        // same row again from a later block
        let n = set.insert_from_block(&block_of(&[(1, "a")]));
        assert_eq!(n, 0);
        assert_eq!(set.total_row_count(), 1);
    }

    #[test]
    fn contains_by_full_row_equality() {
        let set = RowSet::new();
        set.insert_from_block(&block_of(&[(1, "a")]));

        assert!(set.contains(&[Value::Int64(1), Value::Text("a".into())]));
        assert!(!set.contains(&[Value::Int64(1), Value::Text("b".into())]));
        assert!(!set.contains(&[Value::Int64(1)]));
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let b1 = block_of(&[(1, "a"), (2, "b")]);
        let b2 = block_of(&[(2, "b"), (3, "c")]);

        let forward = RowSet::new();
        forward.insert_from_block(&b1);
        forward.insert_from_block(&b2);

        let backward = RowSet::new();
        backward.insert_from_block(&b2);
        backward.insert_from_block(&b1);

        assert_eq!(forward.total_row_count(), 3);
        assert_eq!(backward.total_row_count(), 3);
        for row in b1.rows().chain(b2.rows()) {
            assert!(forward.contains(&row));
            assert!(backward.contains(&row));
        }
    }

    #[test]
    fn overlapping_blocks_union() {
        let set = RowSet::new();
        set.insert_from_block(&block_of(&[(1, "a"), (2, "b")]));
        set.insert_from_block(&block_of(&[(2, "b"), (3, "c")]));
        assert_eq!(set.total_row_count(), 3);
    }

    #[test]
    fn reads_interleave_with_writer() {
        use std::sync::Arc;

        let set = Arc::new(RowSet::new());
        let reader = {
            let set = Arc::clone(&set);
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    let _ = set.total_row_count();
                }
            })
        };

        for i in 0..100 {
            set.insert_from_block(&block_of(&[(i, "x")]));
        }
        reader.join().unwrap();
        assert_eq!(set.total_row_count(), 100);
    }
}
