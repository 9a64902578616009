//! Chunk object layout and payload window extraction.
//!
//! ```text
//! offset  0        8              40                 header_size
//!         ├────────┼─ header_size ─┼─ compressed flag ─┼── payload ──►
//! ```
//!
//! Only two header fields are interpreted: the header size at byte 8 and
//! the storage flag at byte 40 (`1` = zlib).

use std::io::{self, Read};

use flate2::read::ZlibDecoder;
use thiserror::Error;

/// Position of the header size byte.
pub const HEADER_SIZE_OFFSET: usize = 8;

/// Position of the storage flag byte.
pub const STORAGE_FLAG_OFFSET: usize = 40;

/// Storage flag value marking a zlib payload.
pub const FLAG_COMPRESSED: u8 = 1;

const MIN_OBJECT_LEN: usize = STORAGE_FLAG_OFFSET + 1;

/// Why a chunk object could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("object is {len} bytes, shorter than the 41-byte minimum")]
    TooShort { len: usize },

    #[error("header size {header_size} exceeds object length {len}")]
    HeaderOutOfBounds { header_size: usize, len: usize },

    #[error("window {offset}+{size} exceeds the {available}-byte payload")]
    WindowOutOfBounds {
        offset: u64,
        size: usize,
        available: u64,
    },

    #[error("negative window {offset}+{size}")]
    NegativeWindow { offset: i32, size: i32 },

    #[error("decompression failed: {0}")]
    Decompress(String),
}

/// Extract `size` bytes starting at `offset` of the object's decompressed
/// payload.
///
/// Compressed payloads are decoded forward only: `offset` bytes are inflated
/// and discarded, then exactly `size` bytes are read.
pub fn decode_window(object: &[u8], offset: u64, size: usize) -> Result<Vec<u8>, CodecError> {
    if object.len() < MIN_OBJECT_LEN {
        return Err(CodecError::TooShort { len: object.len() });
    }

    let header_size = usize::from(object[HEADER_SIZE_OFFSET]);
    if header_size > object.len() {
        return Err(CodecError::HeaderOutOfBounds {
            header_size,
            len: object.len(),
        });
    }
    let payload = &object[header_size..];

    if object[STORAGE_FLAG_OFFSET] == FLAG_COMPRESSED {
        inflate_window(payload, offset, size)
    } else {
        stored_window(payload, offset, size)
    }
}

fn stored_window(payload: &[u8], offset: u64, size: usize) -> Result<Vec<u8>, CodecError> {
    let out_of_bounds = || CodecError::WindowOutOfBounds {
        offset,
        size,
        available: payload.len() as u64,
    };

    let start = usize::try_from(offset).map_err(|_| out_of_bounds())?;
    let end = start.checked_add(size).ok_or_else(out_of_bounds)?;
    payload
        .get(start..end)
        .map(<[u8]>::to_vec)
        .ok_or_else(out_of_bounds)
}

fn inflate_window(payload: &[u8], offset: u64, size: usize) -> Result<Vec<u8>, CodecError> {
    let mut decoder = ZlibDecoder::new(payload);

    let skipped = io::copy(&mut (&mut decoder).take(offset), &mut io::sink())
        .map_err(|e| CodecError::Decompress(e.to_string()))?;
    if skipped < offset {
        return Err(CodecError::WindowOutOfBounds {
            offset,
            size,
            available: skipped,
        });
    }

    let mut window = vec![0u8; size];
    match decoder.read_exact(&mut window) {
        Ok(()) => Ok(window),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(CodecError::WindowOutOfBounds {
            offset,
            size,
            available: decoder.total_out(),
        }),
        Err(e) => Err(CodecError::Decompress(e.to_string())),
    }
}
