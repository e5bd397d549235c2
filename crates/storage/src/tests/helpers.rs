use std::fs;
use std::path::Path;

use block::{Block, Schema, Value};

use crate::{SetTable, SetTableOptions, StorageError};

pub fn schema() -> Schema {
    Schema::parse("id:int64,name:text").unwrap()
}

pub fn block_of(rows: &[(i64, &str)]) -> Block {
    let mut b = Block::new(&schema());
    for (id, name) in rows {
        b.push_row(vec![Value::Int64(*id), Value::Text((*name).into())])
            .unwrap();
    }
    b
}

pub fn row(id: i64, name: &str) -> Vec<Value> {
    vec![Value::Int64(id), Value::Text(name.into())]
}

pub fn open_table(base: &Path, name: &str) -> Result<SetTable, StorageError> {
    SetTable::open(base, name, schema(), SetTableOptions::default())
}

/// Names of published backup files directly under the table root.
pub fn published_files(table_dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(table_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
