//! Decimal-triplet byte encoding.
//!
//! Manifest documents encode raw bytes as consecutive 3-digit decimal groups,
//! one group per byte: `{5, 255, 16}` is `"005255016"`.

use std::fmt;

/// Byte order in which groups are assembled.
///
/// Chunk hashes are stored with their bytes reversed while offsets and sizes
/// are stored forward. Keeping this as a named rule lets a future manifest
/// version switch it per field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripletOrder {
    Forward,
    Reversed,
}

/// Why a triplet string could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TripletError {
    /// Length is not a multiple of three.
    Length(usize),
    /// A group contains a non-digit character.
    NotDecimal { group: usize },
    /// A group is above 255.
    Overflow { group: usize, value: u16 },
}

impl fmt::Display for TripletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripletError::Length(len) => {
                write!(f, "length {} is not a multiple of 3", len)
            }
            TripletError::NotDecimal { group } => {
                write!(f, "group {} is not a decimal number", group)
            }
            TripletError::Overflow { group, value } => {
                write!(f, "group {} has value {} (max 255)", group, value)
            }
        }
    }
}

impl std::error::Error for TripletError {}

/// Decode a decimal-triplet string into bytes.
pub fn decode_triplets(text: &str, order: TripletOrder) -> Result<Vec<u8>, TripletError> {
    let raw = text.as_bytes();
    if raw.len() % 3 != 0 {
        return Err(TripletError::Length(raw.len()));
    }

    let mut bytes = raw
        .chunks_exact(3)
        .enumerate()
        .map(|(group, digits)| {
            let mut value: u16 = 0;
            for &d in digits {
                if !d.is_ascii_digit() {
                    return Err(TripletError::NotDecimal { group });
                }
                value = value * 10 + u16::from(d - b'0');
            }
            u8::try_from(value).map_err(|_| TripletError::Overflow { group, value })
        })
        .collect::<Result<Vec<u8>, _>>()?;

    if order == TripletOrder::Reversed {
        bytes.reverse();
    }
    Ok(bytes)
}

/// Encode bytes as a forward decimal-triplet string.
pub fn encode_triplets(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:03}", b)).collect()
}

/// Decode a triplet string and read its first four bytes as a little-endian
/// `i32`. Returns `None` if fewer than four bytes are present.
pub fn decode_i32(text: &str) -> Result<Option<i32>, TripletError> {
    let bytes = decode_triplets(text, TripletOrder::Forward)?;
    Ok(bytes
        .get(..4)
        .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]])))
}

/// Upper-case hexadecimal rendering.
pub fn to_hex_upper(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}
