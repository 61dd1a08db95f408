//! Binary data conversion utilities for reading fixed-width numeric fields from byte slices.
//! Legacy table headers and binary columns are little-endian; FoxPro memo headers are big-endian.

/// Converts the first 8 bytes of a slice to a 64-bit floating point number.
#[inline]
pub(crate) fn to_f64(s: &[u8]) -> f64 {
    f64::from_le_bytes(s[..8].try_into().expect("f64"))
}

/// Converts the first 8 bytes of a slice to a 64-bit signed integer.
#[inline]
pub(crate) fn to_i64(s: &[u8]) -> i64 {
    i64::from_le_bytes(s[..8].try_into().expect("i64"))
}

/// Converts the first 4 bytes of a slice to a 32-bit unsigned integer.
#[inline]
pub(crate) fn to_u32(s: &[u8]) -> u32 {
    u32::from_le_bytes(s[..4].try_into().expect("u32"))
}

/// Converts the first 4 bytes of a slice to a 32-bit signed integer.
#[inline]
pub(crate) fn to_i32(s: &[u8]) -> i32 {
    i32::from_le_bytes(s[..4].try_into().expect("i32"))
}

/// Converts the first 2 bytes of a slice to a 16-bit unsigned integer.
#[inline]
pub(crate) fn to_u16(s: &[u8]) -> u16 {
    u16::from_le_bytes(s[..2].try_into().expect("u16"))
}

/// Converts the first 4 bytes of a slice to a big-endian 32-bit unsigned integer.
/// FoxPro memo files store their block headers big-endian.
#[inline]
pub(crate) fn to_u32_be(s: &[u8]) -> u32 {
    u32::from_be_bytes(s[..4].try_into().expect("u32"))
}

/// Converts the first 2 bytes of a slice to a big-endian 16-bit unsigned integer.
#[inline]
pub(crate) fn to_u16_be(s: &[u8]) -> u16 {
    u16::from_be_bytes(s[..2].try_into().expect("u16"))
}

/// Reads a null-padded ASCII name (field names in table headers).
pub(crate) fn to_ascii_name(s: &[u8]) -> String {
    let end = s.iter().position(|byte| *byte == 0).unwrap_or(s.len());
    s[..end]
        .iter()
        .map(|byte| *byte as char)
        .collect::<String>()
        .trim()
        .to_owned()
}
