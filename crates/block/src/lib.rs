//! # Block - Columnar batches of typed rows
//!
//! The exchange format between the query side and the storage engine: a
//! [`Block`] is an ordered batch of rows stored column-wise (one value vector
//! per declared column, all vectors the same length). Blocks are transient —
//! only their serialized form (see the `codec` crate) ever touches disk.
//!
//! [`Value`] implements `Eq + Hash` for every column type, including
//! `Float64` (compared by bit pattern), so full rows can live in a hash set.

use std::fmt;
use std::hash::{Hash, Hasher};

use thiserror::Error;

/// The column types the engine understands.
///
/// Type names (`int64`, `uint64`, `float64`, `text`) are what appears in
/// schema strings and in the serialized block format's type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Int64,
    UInt64,
    Float64,
    Text,
}

impl ColumnType {
    /// Parses a type name as used in schema strings.
    pub fn parse(s: &str) -> Option<ColumnType> {
        match s {
            "int64" => Some(ColumnType::Int64),
            "uint64" => Some(ColumnType::UInt64),
            "float64" => Some(ColumnType::Float64),
            "text" => Some(ColumnType::Text),
            _ => None,
        }
    }

    /// The canonical type name.
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Int64 => "int64",
            ColumnType::UInt64 => "uint64",
            ColumnType::Float64 => "float64",
            ColumnType::Text => "text",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single typed datum.
///
/// `Float64` equality and hashing use the raw bit pattern: NaN equals itself
/// and `-0.0 != 0.0`. The set semantics of the engine need a total, stable
/// notion of row equality, not IEEE comparison.
#[derive(Debug, Clone)]
pub enum Value {
    Int64(i64),
    UInt64(u64),
    Float64(f64),
    Text(String),
}

impl Value {
    /// The column type this value belongs to.
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Int64(_) => ColumnType::Int64,
            Value::UInt64(_) => ColumnType::UInt64,
            Value::Float64(_) => ColumnType::Float64,
            Value::Text(_) => ColumnType::Text,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::UInt64(a), Value::UInt64(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Int64(v) => {
                state.write_u8(0);
                v.hash(state);
            }
            Value::UInt64(v) => {
                state.write_u8(1);
                v.hash(state);
            }
            Value::Float64(v) => {
                state.write_u8(2);
                v.to_bits().hash(state);
            }
            Value::Text(v) => {
                state.write_u8(3);
                v.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
        }
    }
}

/// A full row: one value per declared column, in column order.
pub type Row = Vec<Value>;

/// One declared column: name + type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
}

/// The declared column list of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub columns: Vec<ColumnDef>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self { columns }
    }

    /// Parses a schema string of the form `"name:type,name:type"`.
    ///
    /// Used by the CLI's environment-variable configuration. Returns `None`
    /// on an empty string, a missing `:`, or an unknown type name.
    pub fn parse(s: &str) -> Option<Schema> {
        let mut columns = Vec::new();
        for part in s.split(',') {
            let (name, ty) = part.split_once(':')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            columns.push(ColumnDef {
                name: name.to_string(),
                ty: ColumnType::parse(ty.trim())?,
            });
        }
        if columns.is_empty() {
            None
        } else {
            Some(Schema { columns })
        }
    }

    pub fn arity(&self) -> usize {
        self.columns.len()
    }
}

/// Errors from block construction.
#[derive(Debug, Error)]
pub enum BlockError {
    /// Columns passed to `try_from_columns` have differing lengths.
    #[error("column length mismatch: column {column:?} has {actual} values, expected {expected}")]
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// A row does not have one value per column.
    #[error("row arity mismatch: got {actual} values, block has {expected} columns")]
    ArityMismatch { expected: usize, actual: usize },

    /// A row value's type does not match its column's declared type.
    #[error("type mismatch in column {column:?}: expected {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: ColumnType,
        actual: ColumnType,
    },
}

/// One column of a block: declared name/type plus its values.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
    pub values: Vec<Value>,
}

/// An ordered batch of rows, stored column-wise.
///
/// Invariant: all columns hold the same number of values (the block's row
/// count). Enforced by the constructors and [`push_row`](Block::push_row).
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    columns: Vec<Column>,
}

impl Block {
    /// An empty block with one empty column per schema entry.
    pub fn new(schema: &Schema) -> Block {
        Block {
            columns: schema
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    ty: c.ty,
                    values: Vec::new(),
                })
                .collect(),
        }
    }

    /// Builds a block from pre-filled columns, validating equal lengths.
    pub fn try_from_columns(columns: Vec<Column>) -> Result<Block, BlockError> {
        if let Some(first) = columns.first() {
            let expected = first.values.len();
            for col in &columns[1..] {
                if col.values.len() != expected {
                    return Err(BlockError::ColumnLengthMismatch {
                        column: col.name.clone(),
                        expected,
                        actual: col.values.len(),
                    });
                }
            }
        }
        Ok(Block { columns })
    }

    /// Appends one row, validating arity and per-column value types.
    pub fn push_row(&mut self, row: Row) -> Result<(), BlockError> {
        if row.len() != self.columns.len() {
            return Err(BlockError::ArityMismatch {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        for (col, value) in self.columns.iter().zip(&row) {
            if value.column_type() != col.ty {
                return Err(BlockError::TypeMismatch {
                    column: col.name.clone(),
                    expected: col.ty,
                    actual: value.column_type(),
                });
            }
        }
        for (col, value) in self.columns.iter_mut().zip(row) {
            col.values.push(value);
        }
        Ok(())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// The `i`-th row, cloned out of the columns.
    ///
    /// # Panics
    ///
    /// Panics if `i >= num_rows()`.
    pub fn row(&self, i: usize) -> Row {
        self.columns.iter().map(|c| c.values[i].clone()).collect()
    }

    /// Iterates rows in order, cloning each out of the columns.
    pub fn rows(&self) -> impl Iterator<Item = Row> + '_ {
        (0..self.num_rows()).map(move |i| self.row(i))
    }

    /// True if the block's column names and types match `schema` exactly,
    /// in order.
    pub fn matches_schema(&self, schema: &Schema) -> bool {
        self.columns.len() == schema.columns.len()
            && self
                .columns
                .iter()
                .zip(&schema.columns)
                .all(|(c, d)| c.name == d.name && c.ty == d.ty)
    }
}
