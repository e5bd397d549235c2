///! # CLI - SetStore Interactive Shell
///!
///! A REPL-style command-line interface for the SetStore table engine.
///! Reads commands from stdin, executes them against one Set table, and
///! prints results to stdout. Designed for both interactive use and
///! scripted testing (pipe commands via stdin).
///!
///! ## Commands
///!
///! ```text
///! INSERT v1 v2 ...    Insert one row (one value per schema column);
///!                     runs a full durable write transaction
///! CONTAINS v1 v2 ...  Membership probe by full row equality
///! COUNT               Print the unique row count
///! STATS               Print table debug info
///! EXIT / QUIT         Shut down
///! ```
///!
///! ## Configuration
///!
///! All settings are controlled via environment variables:
///!
///! ```text
///! SETSTORE_BASE_DIR  Base data directory                (default: "data")
///! SETSTORE_TABLE     Table name                         (default: "set")
///! SETSTORE_SCHEMA    Column list, "name:type,..."       (default: "key:text")
///! SETSTORE_FSYNC     fsync before publishing a backup   (default: "true")
///! ```
///!
///! ## Example
///!
///! ```text
///! $ cargo run -p cli
///! SetStore started (table=set, schema=key:text, rows=0, seq=0)
///! > INSERT alice
///! OK (1 unique rows)
///! > CONTAINS alice
///! true
///! > EXIT
///! bye
///! ```

use anyhow::Result;
use block::{Block, ColumnType, Row, Schema, Value};
use std::io::{self, BufRead, Write};
use storage::{SetTable, SetTableOptions};

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parses one token per schema column into a full row.
fn parse_row(schema: &Schema, tokens: &[&str]) -> Result<Row, String> {
    if tokens.len() != schema.arity() {
        return Err(format!(
            "expected {} values, got {}",
            schema.arity(),
            tokens.len()
        ));
    }
    schema
        .columns
        .iter()
        .zip(tokens)
        .map(|(col, tok)| {
            parse_value(col.ty, tok).map_err(|e| format!("column {:?}: {}", col.name, e))
        })
        .collect()
}

fn parse_value(ty: ColumnType, token: &str) -> Result<Value, String> {
    match ty {
        ColumnType::Int64 => token
            .parse()
            .map(Value::Int64)
            .map_err(|_| format!("{:?} is not an int64", token)),
        ColumnType::UInt64 => token
            .parse()
            .map(Value::UInt64)
            .map_err(|_| format!("{:?} is not a uint64", token)),
        ColumnType::Float64 => token
            .parse()
            .map(Value::Float64)
            .map_err(|_| format!("{:?} is not a float64", token)),
        ColumnType::Text => Ok(Value::Text(token.to_string())),
    }
}

fn schema_display(schema: &Schema) -> String {
    schema
        .columns
        .iter()
        .map(|c| format!("{}:{}", c.name, c.ty))
        .collect::<Vec<_>>()
        .join(",")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    // Configuration via environment variables with sensible defaults.
    //
    //  SETSTORE_BASE_DIR - base data directory              (default: "data")
    //  SETSTORE_TABLE    - table name                       (default: "set")
    //  SETSTORE_SCHEMA   - column list "name:type,..."      (default: "key:text")
    //  SETSTORE_FSYNC    - fsync before publishing a backup (default: "true")
    let base_dir = env_or("SETSTORE_BASE_DIR", "data");
    let table_name = env_or("SETSTORE_TABLE", "set");
    let schema_str = env_or("SETSTORE_SCHEMA", "key:text");
    let fsync: bool = env_or("SETSTORE_FSYNC", "true").parse().unwrap_or(true);

    let schema = Schema::parse(&schema_str)
        .ok_or_else(|| anyhow::anyhow!("invalid SETSTORE_SCHEMA: {:?}", schema_str))?;

    let table = SetTable::open(
        &base_dir,
        &table_name,
        schema.clone(),
        SetTableOptions { fsync },
    )?;

    println!(
        "SetStore started (table={}, schema={}, rows={}, seq={})",
        table.name(),
        schema_display(&schema),
        table.total_row_count(),
        table.sequence()
    );
    println!("Commands: INSERT v1 v2 ... | CONTAINS v1 v2 ... | COUNT | STATS | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if let Some((cmd, args)) = tokens.split_first() {
            match cmd.to_uppercase().as_str() {
                "INSERT" => match parse_row(&schema, args) {
                    Ok(row) => {
                        let mut b = Block::new(&schema);
                        match b.push_row(row) {
                            Ok(()) => match table.write_blocks(vec![b]) {
                                Ok(()) => {
                                    println!("OK ({} unique rows)", table.total_row_count())
                                }
                                Err(e) => println!("ERR insert failed: {}", e),
                            },
                            Err(e) => println!("ERR bad row: {}", e),
                        }
                    }
                    Err(e) => println!("ERR {}", e),
                },
                "CONTAINS" => match parse_row(&schema, args) {
                    Ok(row) => println!("{}", table.row_set().contains(&row)),
                    Err(e) => println!("ERR {}", e),
                },
                "COUNT" => {
                    println!("{}", table.total_row_count());
                }
                "STATS" => {
                    println!("{:?}", table);
                }
                "EXIT" | "QUIT" => {
                    println!("bye");
                    break;
                }
                other => {
                    println!("unknown command: {}", other);
                }
            }
        }

        print!("> ");
        io::stdout().flush().ok();
    }

    Ok(())
}
