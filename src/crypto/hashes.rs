//! Hash primitives: SHA-256/512/512-256, RIPEMD-160, HASH160, Keccak-256.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512, Sha512_256};
use sha3::Keccak256;

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

pub fn sha512(data: &[u8]) -> [u8; 64] {
    let mut hasher = Sha512::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn sha512_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha512_256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `ripemd160(sha256(data))`, the standard Bitcoin pubkey-hash.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(&sha256(data))
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Bitcoin/Stacks varint-prefixed message hash, used by both BIP-137 and
/// the Stacks plain-text signing scheme: `hash(prefix || varint(len) || msg)`.
pub fn prefixed_message_hash(prefix: &[u8], message: &[u8], double: bool) -> [u8; 32] {
    let mut buf = Vec::with_capacity(prefix.len() + 9 + message.len());
    buf.extend_from_slice(prefix);
    write_varint(&mut buf, message.len() as u64);
    buf.extend_from_slice(message);
    if double {
        double_sha256(&buf)
    } else {
        sha256(&buf)
    }
}

fn write_varint(buf: &mut Vec<u8>, n: u64) {
    if n < 0xfd {
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(0xfd);
        buf.extend_from_slice(&(n as u16).to_le_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(0xfe);
        buf.extend_from_slice(&(n as u32).to_le_bytes());
    } else {
        buf.push(0xff);
        buf.extend_from_slice(&n.to_le_bytes());
    }
}
