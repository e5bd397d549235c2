//! # Codec - Framed binary block streams
//!
//! Serializes [`Block`]s into an append-only stream of checksummed frames
//! and reads them back. The codec is symmetric: decoding the concatenation
//! of all blocks encoded into one stream reproduces each block's column
//! data exactly (values, column order, row order).
//!
//! The codec is compression-agnostic — it is generic over `Write`/`Read`,
//! and the storage layer layers it on top of a zstd stream encoder/decoder.
//!
//! ## Frame Format
//!
//! ```text
//! [frame_len: u32 LE][crc32: u32 LE][body ...]
//! ```
//!
//! `frame_len` includes the 4-byte CRC but **not** itself. The CRC covers
//! the body. Body:
//!
//! ```text
//! [n_cols: u32][n_rows: u32]
//! per column: [name_len: u32][name bytes][type_tag: u8][n_rows values]
//! ```
//!
//! Value encodings: `int64`/`uint64`/`float64` are fixed 8-byte LE;
//! `text` is `[len: u32][utf8 bytes]`.
//!
//! A stream may end cleanly only on a frame boundary. Anything else — a
//! partial header, a short body, a CRC mismatch, an unknown type tag — is
//! reported as [`CodecError::Corrupt`]; callers replaying backup files must
//! fail loudly rather than silently drop rows.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use std::io::{self, Read, Write};

use block::{Block, Column, ColumnType, Value};
use thiserror::Error;

/// Safety cap on a single frame (64 MiB). Larger claims are corruption.
const MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;
/// Safety cap on the column count of a single block.
const MAX_COLUMNS: u32 = 4096;
/// Safety cap on a column name (64 KiB).
const MAX_NAME_BYTES: u32 = 64 * 1024;

const TAG_INT64: u8 = 0;
const TAG_UINT64: u8 = 1;
const TAG_FLOAT64: u8 = 2;
const TAG_TEXT: u8 = 3;

/// Errors that can occur while encoding or decoding block streams.
#[derive(Debug, Error)]
pub enum CodecError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A frame did not match the bytes actually available, failed its CRC,
    /// or contained malformed contents.
    #[error("corrupt block frame: {0}")]
    Corrupt(&'static str),
}

fn type_tag(ty: ColumnType) -> u8 {
    match ty {
        ColumnType::Int64 => TAG_INT64,
        ColumnType::UInt64 => TAG_UINT64,
        ColumnType::Float64 => TAG_FLOAT64,
        ColumnType::Text => TAG_TEXT,
    }
}

fn tag_type(tag: u8) -> Option<ColumnType> {
    match tag {
        TAG_INT64 => Some(ColumnType::Int64),
        TAG_UINT64 => Some(ColumnType::UInt64),
        TAG_FLOAT64 => Some(ColumnType::Float64),
        TAG_TEXT => Some(ColumnType::Text),
        _ => None,
    }
}

/// Append-only writer for a stream of framed blocks.
///
/// `encode` may be called repeatedly into the same open stream; the caller
/// finalizes by flushing (and unwrapping) via [`into_inner`](Self::into_inner).
pub struct BlockStreamWriter<W: Write> {
    w: W,
    /// Reusable scratch buffer to avoid allocation on every frame.
    buf: Vec<u8>,
}

impl<W: Write> BlockStreamWriter<W> {
    pub fn new(w: W) -> Self {
        Self {
            w,
            buf: Vec::with_capacity(1024),
        }
    }

    /// Serializes `block` and appends it to the stream as one frame.
    pub fn encode(&mut self, block: &Block) -> Result<(), CodecError> {
        // Reuse the internal buffer — clear but keep the allocation.
        self.buf.clear();

        // Reserve 8 bytes for the frame header (frame_len + crc), filled later.
        self.buf.extend_from_slice(&[0u8; 8]);

        self.buf
            .write_u32::<LittleEndian>(block.num_columns() as u32)?;
        self.buf.write_u32::<LittleEndian>(block.num_rows() as u32)?;

        for col in block.columns() {
            self.buf.write_u32::<LittleEndian>(col.name.len() as u32)?;
            self.buf.extend_from_slice(col.name.as_bytes());
            self.buf.write_u8(type_tag(col.ty))?;
            for value in &col.values {
                match value {
                    Value::Int64(v) => self.buf.write_i64::<LittleEndian>(*v)?,
                    Value::UInt64(v) => self.buf.write_u64::<LittleEndian>(*v)?,
                    Value::Float64(v) => self.buf.write_f64::<LittleEndian>(*v)?,
                    Value::Text(v) => {
                        self.buf.write_u32::<LittleEndian>(v.len() as u32)?;
                        self.buf.extend_from_slice(v.as_bytes());
                    }
                }
            }
        }

        let body = &self.buf[8..];

        let mut hasher = Crc32::new();
        hasher.update(body);
        let crc = hasher.finalize();

        // frame_len = body.len() + 4 (CRC), must fit in u32 and under the cap
        let frame_len = (body.len() as u64) + 4;
        if frame_len > MAX_FRAME_SIZE as u64 {
            return Err(CodecError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "block frame too large",
            )));
        }

        self.buf[0..4].copy_from_slice(&(frame_len as u32).to_le_bytes());
        self.buf[4..8].copy_from_slice(&crc.to_le_bytes());

        // Single write call for the entire frame.
        self.w.write_all(&self.buf)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), CodecError> {
        self.w.flush()?;
        Ok(())
    }

    /// Flushes and returns the underlying writer so the caller can finalize
    /// any wrapping layers (compression trailer, file sync).
    pub fn into_inner(mut self) -> Result<W, CodecError> {
        self.w.flush()?;
        Ok(self.w)
    }
}

/// Sequential reader for a stream of framed blocks.
pub struct BlockStreamReader<R: Read> {
    r: R,
}

impl<R: Read> BlockStreamReader<R> {
    pub fn new(r: R) -> Self {
        Self { r }
    }

    /// Reads the next block, or `Ok(None)` on a clean end of stream.
    ///
    /// "Clean" means the stream is exhausted exactly at a frame boundary; a
    /// partial frame of any kind is [`CodecError::Corrupt`].
    pub fn next_block(&mut self) -> Result<Option<Block>, CodecError> {
        // Read the length prefix by hand so that zero bytes (clean EOF) is
        // distinguishable from a torn header (corruption).
        let mut len_buf = [0u8; 4];
        match read_full(&mut self.r, &mut len_buf)? {
            0 => return Ok(None),
            4 => {}
            _ => return Err(CodecError::Corrupt("truncated frame header")),
        }
        let frame_len = u32::from_le_bytes(len_buf);

        if frame_len <= 4 || frame_len > MAX_FRAME_SIZE {
            return Err(CodecError::Corrupt("implausible frame length"));
        }

        let crc = match self.r.read_u32::<LittleEndian>() {
            Ok(v) => v,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(CodecError::Corrupt("truncated frame header"))
            }
            Err(e) => return Err(CodecError::Io(e)),
        };

        let body_len = (frame_len - 4) as usize;
        let mut body = vec![0u8; body_len];
        match self.r.read_exact(&mut body) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(CodecError::Corrupt("truncated frame body"))
            }
            Err(e) => return Err(CodecError::Io(e)),
        }

        let mut hasher = Crc32::new();
        hasher.update(&body);
        if hasher.finalize() != crc {
            return Err(CodecError::Corrupt("crc mismatch"));
        }

        decode_body(&body).map(Some)
    }
}

/// Reads until `buf` is full or the reader is exhausted; returns the number
/// of bytes read.
fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<usize, CodecError> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CodecError::Io(e)),
        }
    }
    Ok(filled)
}

/// Parses a CRC-verified frame body into a block.
fn decode_body(body: &[u8]) -> Result<Block, CodecError> {
    // All reads are from an in-memory slice, so any UnexpectedEof here means
    // the frame's own lengths are inconsistent — corruption, not I/O.
    let mut br = body;

    let n_cols = read_u32(&mut br)?;
    let n_rows = read_u32(&mut br)?;
    if n_cols > MAX_COLUMNS {
        return Err(CodecError::Corrupt("implausible column count"));
    }

    let mut columns = Vec::with_capacity(n_cols as usize);
    for _ in 0..n_cols {
        let name_len = read_u32(&mut br)?;
        if name_len > MAX_NAME_BYTES {
            return Err(CodecError::Corrupt("implausible column name length"));
        }
        let name = read_string(&mut br, name_len as usize)?;

        let mut tag = [0u8; 1];
        br.read_exact(&mut tag)
            .map_err(|_| CodecError::Corrupt("truncated frame body"))?;
        let ty = tag_type(tag[0]).ok_or(CodecError::Corrupt("unknown column type tag"))?;

        // A row count the remaining bytes cannot possibly hold is corruption;
        // checking before the reservation keeps a tampered frame from forcing
        // a huge allocation. Every value occupies at least 4 bytes (a text
        // length prefix) or 8 (the fixed-width types).
        let min_value_bytes: u64 = match ty {
            ColumnType::Text => 4,
            _ => 8,
        };
        if (n_rows as u64) * min_value_bytes > br.len() as u64 {
            return Err(CodecError::Corrupt("implausible row count"));
        }

        let mut values = Vec::with_capacity(n_rows as usize);
        for _ in 0..n_rows {
            values.push(read_value(&mut br, ty)?);
        }

        columns.push(Column { name, ty, values });
    }

    if !br.is_empty() {
        return Err(CodecError::Corrupt("trailing bytes in frame body"));
    }

    Block::try_from_columns(columns).map_err(|_| CodecError::Corrupt("ragged columns"))
}

fn read_u32(br: &mut &[u8]) -> Result<u32, CodecError> {
    br.read_u32::<LittleEndian>()
        .map_err(|_| CodecError::Corrupt("truncated frame body"))
}

fn read_string(br: &mut &[u8], len: usize) -> Result<String, CodecError> {
    if br.len() < len {
        return Err(CodecError::Corrupt("truncated frame body"));
    }
    let mut bytes = vec![0u8; len];
    br.read_exact(&mut bytes)
        .map_err(|_| CodecError::Corrupt("truncated frame body"))?;
    String::from_utf8(bytes).map_err(|_| CodecError::Corrupt("invalid utf-8 in text"))
}

fn read_value(br: &mut &[u8], ty: ColumnType) -> Result<Value, CodecError> {
    let corrupt = |_| CodecError::Corrupt("truncated frame body");
    Ok(match ty {
        ColumnType::Int64 => Value::Int64(br.read_i64::<LittleEndian>().map_err(corrupt)?),
        ColumnType::UInt64 => Value::UInt64(br.read_u64::<LittleEndian>().map_err(corrupt)?),
        ColumnType::Float64 => Value::Float64(br.read_f64::<LittleEndian>().map_err(corrupt)?),
        ColumnType::Text => {
            let len = read_u32(br)?;
            Value::Text(read_string(br, len as usize)?)
        }
    })
}
