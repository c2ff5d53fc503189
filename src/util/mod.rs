//! util: общие утилиты.
//!
//! - hex_encode(): lowercase hex of a byte slice (fingerprints).

/// Lowercase hex encoding.
pub fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_encode_lowercase() {
        assert_eq!(hex_encode(&[0x00, 0xAB, 0x0f, 0xff]), "00ab0fff");
        assert_eq!(hex_encode(&[]), "");
    }
}
