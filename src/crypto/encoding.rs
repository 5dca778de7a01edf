//! Address-level text encodings: bech32/bech32m, base58check, and the
//! Stacks c32check alphabet (no ecosystem crate for the latter).

use bech32::{Bech32, Bech32m, Hrp};

use crate::common::error::AibtcError;
use crate::crypto::hashes::double_sha256;

pub fn bech32_encode(hrp: &str, data: &[u8]) -> Result<String, AibtcError> {
    let hrp = Hrp::parse(hrp).map_err(|e| AibtcError::validation(format!("invalid hrp: {e}")))?;
    bech32::encode::<Bech32>(hrp, data).map_err(|e| AibtcError::validation(format!("bech32 encode failed: {e}")))
}

pub fn bech32_decode(s: &str) -> Result<(String, Vec<u8>), AibtcError> {
    let (hrp, data) =
        bech32::decode(s).map_err(|e| AibtcError::validation(format!("bech32 decode failed: {e}")))?;
    Ok((hrp.to_string(), data))
}

pub fn bech32m_encode(hrp: &str, data: &[u8]) -> Result<String, AibtcError> {
    let hrp = Hrp::parse(hrp).map_err(|e| AibtcError::validation(format!("invalid hrp: {e}")))?;
    bech32::encode::<Bech32m>(hrp, data).map_err(|e| AibtcError::validation(format!("bech32m encode failed: {e}")))
}

/// base58check: `base58(payload || checksum)` where `checksum =
/// doubleSha256(payload)[..4]`.
pub fn base58check_encode(payload: &[u8]) -> String {
    let checksum = double_sha256(payload);
    let mut buf = Vec::with_capacity(payload.len() + 4);
    buf.extend_from_slice(payload);
    buf.extend_from_slice(&checksum[..4]);
    bs58::encode(buf).into_string()
}

pub fn base58check_decode(s: &str) -> Result<Vec<u8>, AibtcError> {
    let buf = bs58::decode(s)
        .into_vec()
        .map_err(|e| AibtcError::validation(format!("invalid base58: {e}")))?;
    if buf.len() < 4 {
        return Err(AibtcError::validation("base58check payload too short"));
    }
    let (payload, checksum) = buf.split_at(buf.len() - 4);
    let expected = double_sha256(payload);
    if checksum != &expected[..4] {
        return Err(AibtcError::validation("base58check checksum mismatch"));
    }
    Ok(payload.to_vec())
}

const C32_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Stacks c32check address encoding: `version byte || 20-byte hash160`,
/// checksummed with the first 4 bytes of `sha256(sha256(version || hash))`
/// and rendered in the c32 alphabet (base32 minus visually ambiguous
/// characters, no padding).
pub fn c32_encode(version: u8, hash: &[u8; 20]) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(version);
    payload.extend_from_slice(hash);
    let checksum = double_sha256(&payload);

    let mut data = Vec::with_capacity(25);
    data.extend_from_slice(hash);
    data.extend_from_slice(&checksum[..4]);

    let c32_body = c32_encode_bytes(&data);
    format!("S{}{}", c32_check_digit(version), c32_body)
}

/// Decode a c32check address back into `(version, hash160)`.
pub fn c32_decode(address: &str) -> Result<(u8, [u8; 20]), AibtcError> {
    let address = address.trim();
    if !address.starts_with('S') || address.len() < 3 {
        return Err(AibtcError::validation("not a c32 address: missing 'S' prefix"));
    }
    let version = c32_version_from_char(address.as_bytes()[1])?;
    let body = &address[2..];

    let decoded = c32_decode_bytes(body)?;
    if decoded.len() < 4 {
        return Err(AibtcError::validation("c32 address too short"));
    }
    let (hash_bytes, checksum) = decoded.split_at(decoded.len() - 4);
    if hash_bytes.len() != 20 {
        return Err(AibtcError::validation("c32 address hash is not 20 bytes"));
    }

    let mut hash = [0u8; 20];
    hash.copy_from_slice(hash_bytes);

    let mut payload = Vec::with_capacity(21);
    payload.push(version);
    payload.extend_from_slice(&hash);
    let expected = double_sha256(&payload);
    if checksum != &expected[..4] {
        return Err(AibtcError::validation("c32 checksum mismatch"));
    }

    Ok((version, hash))
}

fn c32_check_digit(version: u8) -> char {
    C32_ALPHABET[(version % 32) as usize] as char
}

fn c32_version_from_char(c: u8) -> Result<u8, AibtcError> {
    C32_ALPHABET
        .iter()
        .position(|&b| b == c.to_ascii_uppercase())
        .map(|v| v as u8)
        .ok_or_else(|| AibtcError::validation("invalid c32 version character"))
}

/// Encode bytes as base32 over the c32 alphabet, most-significant-bit
/// first, no padding — matches the Stacks c32check reference encoding.
fn c32_encode_bytes(data: &[u8]) -> String {
    let mut bits: u32 = 0;
    let mut bit_count = 0u32;
    let mut out = Vec::new();

    for &byte in data.iter().rev() {
        bits |= (byte as u32) << bit_count;
        bit_count += 8;
        while bit_count >= 5 {
            out.push(C32_ALPHABET[(bits & 0x1f) as usize]);
            bits >>= 5;
            bit_count -= 5;
        }
    }
    if bit_count > 0 {
        out.push(C32_ALPHABET[(bits & 0x1f) as usize]);
    }
    // leading zero bytes become leading '0' characters in c32
    let leading_zeros = data.iter().take_while(|&&b| b == 0).count();
    out.extend(std::iter::repeat(b'0').take(leading_zeros));

    out.reverse();
    String::from_utf8(out).expect("c32 alphabet is ASCII")
}

fn c32_decode_bytes(s: &str) -> Result<Vec<u8>, AibtcError> {
    let mut bits: u32 = 0;
    let mut bit_count = 0u32;
    let mut out = Vec::new();

    for c in s.chars().rev() {
        let value = c32_char_value(c)?;
        bits |= (value as u32) << bit_count;
        bit_count += 5;
        while bit_count >= 8 {
            out.push((bits & 0xff) as u8);
            bits >>= 8;
            bit_count -= 8;
        }
    }
    if bit_count > 0 && (bits & ((1 << bit_count) - 1)) != 0 {
        return Err(AibtcError::validation("c32 encoding has non-zero padding bits"));
    }

    let leading_zeros = s.chars().take_while(|&c| c == '0').count();
    out.extend(std::iter::repeat(0u8).take(leading_zeros));

    out.reverse();
    Ok(out)
}

fn c32_char_value(c: char) -> Result<u8, AibtcError> {
    let upper = c.to_ascii_uppercase() as u8;
    C32_ALPHABET
        .iter()
        .position(|&b| b == upper)
        .map(|v| v as u8)
        .ok_or_else(|| AibtcError::validation(format!("invalid c32 character: {c}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c32_round_trips() {
        let hash = [0xABu8; 20];
        let encoded = c32_encode(22, &hash);
        assert!(encoded.starts_with("SP") || encoded.starts_with("Sp"));
        let (version, decoded_hash) = c32_decode(&encoded).unwrap();
        assert_eq!(version, 22);
        assert_eq!(decoded_hash, hash);
    }

    #[test]
    fn c32_testnet_version_round_trips() {
        let hash = [0x01u8; 20];
        let encoded = c32_encode(26, &hash);
        let (version, decoded_hash) = c32_decode(&encoded).unwrap();
        assert_eq!(version, 26);
        assert_eq!(decoded_hash, hash);
    }

    #[test]
    fn c32_rejects_bad_checksum() {
        let hash = [0x02u8; 20];
        let mut encoded = c32_encode(22, &hash);
        encoded.push('0');
        // mutate a trailing character to corrupt the checksum
        let mut chars: Vec<char> = encoded.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == '0' { '1' } else { '0' };
        let corrupted: String = chars.into_iter().collect();
        assert!(c32_decode(&corrupted).is_err());
    }

    #[test]
    fn base58check_round_trips() {
        let payload = b"hello world payload";
        let encoded = base58check_encode(payload);
        let decoded = base58check_decode(&encoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn base58check_rejects_corruption() {
        let payload = b"payload bytes";
        let mut encoded = base58check_encode(payload);
        encoded.push('1');
        assert!(base58check_decode(&encoded).is_err());
    }

    #[test]
    fn bech32_round_trips() {
        let data = vec![0u8, 1, 2, 3, 4];
        let encoded = bech32_encode("bc", &data).unwrap();
        let (hrp, decoded) = bech32_decode(&encoded).unwrap();
        assert_eq!(hrp, "bc");
        assert_eq!(decoded, data);
    }
}
