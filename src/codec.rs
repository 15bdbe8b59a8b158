//! Little-endian byte helpers and the legacy hex literal encoding used by
//! the host API (§6): a write's payload is a 10-character `0xXXXXXXXX`
//! literal, encoded as 4 little-endian bytes and zero-padded to a full page.

use crate::FtlError;

/// Read a little-endian `u32` from the first 4 bytes of `data`.
///
/// # Panics
/// Panics if `data` is shorter than 4 bytes, matching the reference's
/// unchecked buffer access.
pub fn read_u32_le(data: &[u8]) -> u32 {
    (data[0] as u32)
        | ((data[1] as u32) << 8)
        | ((data[2] as u32) << 16)
        | ((data[3] as u32) << 24)
}

/// Write `v` as little-endian bytes into the first 4 bytes of `data`.
///
/// # Panics
/// Panics if `data` is shorter than 4 bytes.
pub fn write_u32_le(data: &mut [u8], v: u32) {
    data[0] = v as u8;
    data[1] = (v >> 8) as u8;
    data[2] = (v >> 16) as u8;
    data[3] = (v >> 24) as u8;
}

/// Parse a `0xXXXXXXXX` literal (exactly 10 characters) into a `u32`.
pub fn parse_hex_literal(hex: &str) -> Result<u32, FtlError> {
    let digits = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .ok_or_else(|| FtlError::OutOfRange(0))?;
    if digits.len() != 8 {
        return Err(FtlError::OutOfRange(0));
    }
    u32::from_str_radix(digits, 16).map_err(|_| FtlError::OutOfRange(0))
}

/// Encode a hex literal into a zero-padded, page-sized buffer with the
/// 4-byte little-endian value at offset 0.
pub fn encode_page_payload(hex: &str) -> Result<Vec<u8>, FtlError> {
    let value = parse_hex_literal(hex)?;
    let mut buf = vec![0u8; crate::PAGE_SIZE];
    write_u32_le(&mut buf[0..4], value);
    Ok(buf)
}

/// Decode the leading `u32` of a page payload and format it as the host's
/// `0xXXXXXXXX` literal.
pub fn decode_page_payload(payload: &[u8]) -> String {
    format!("0x{:08X}", read_u32_le(payload))
}
