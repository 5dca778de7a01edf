//! Clarity value binary codec.
//!
//! Byte-level encoding for the subset of Clarity v2 types the core needs:
//! int, uint, buffer, string-ascii, string-utf8, bool, principal (standard
//! and contract), response-ok/err, optional, list, tuple. Tuples always
//! serialize their keys in lexicographic order — `BTreeMap` gives us that
//! for free.
//!
//! There is no ecosystem crate for this in the dependency set the rest of
//! the core draws from, so it's hand-written against the wire-format
//! constants below.

use std::collections::BTreeMap;

use crate::common::error::AibtcError;

const TYPE_INT: u8 = 0x00;
const TYPE_UINT: u8 = 0x01;
const TYPE_BUFFER: u8 = 0x02;
const TYPE_BOOL_TRUE: u8 = 0x03;
const TYPE_BOOL_FALSE: u8 = 0x04;
const TYPE_PRINCIPAL_STANDARD: u8 = 0x05;
const TYPE_PRINCIPAL_CONTRACT: u8 = 0x06;
const TYPE_RESPONSE_OK: u8 = 0x07;
const TYPE_RESPONSE_ERR: u8 = 0x08;
const TYPE_OPTIONAL_NONE: u8 = 0x09;
const TYPE_OPTIONAL_SOME: u8 = 0x0a;
const TYPE_LIST: u8 = 0x0b;
const TYPE_TUPLE: u8 = 0x0c;
const TYPE_STRING_ASCII: u8 = 0x0d;
const TYPE_STRING_UTF8: u8 = 0x0e;

#[derive(Debug, Clone, PartialEq)]
pub enum ClarityValue {
    Int(i128),
    UInt(u128),
    Buffer(Vec<u8>),
    Bool(bool),
    StringAscii(String),
    StringUtf8(String),
    PrincipalStandard { version: u8, hash160: [u8; 20] },
    PrincipalContract { version: u8, hash160: [u8; 20], contract_name: String },
    ResponseOk(Box<ClarityValue>),
    ResponseErr(Box<ClarityValue>),
    OptionalSome(Box<ClarityValue>),
    OptionalNone,
    List(Vec<ClarityValue>),
    Tuple(BTreeMap<String, ClarityValue>),
}

impl ClarityValue {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            ClarityValue::Int(v) => {
                buf.push(TYPE_INT);
                buf.extend_from_slice(&v.to_be_bytes());
            }
            ClarityValue::UInt(v) => {
                buf.push(TYPE_UINT);
                buf.extend_from_slice(&v.to_be_bytes());
            }
            ClarityValue::Buffer(bytes) => {
                buf.push(TYPE_BUFFER);
                buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                buf.extend_from_slice(bytes);
            }
            ClarityValue::Bool(true) => buf.push(TYPE_BOOL_TRUE),
            ClarityValue::Bool(false) => buf.push(TYPE_BOOL_FALSE),
            ClarityValue::StringAscii(s) => {
                buf.push(TYPE_STRING_ASCII);
                buf.extend_from_slice(&(s.len() as u32).to_be_bytes());
                buf.extend_from_slice(s.as_bytes());
            }
            ClarityValue::StringUtf8(s) => {
                buf.push(TYPE_STRING_UTF8);
                let bytes = s.as_bytes();
                buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                buf.extend_from_slice(bytes);
            }
            ClarityValue::PrincipalStandard { version, hash160 } => {
                buf.push(TYPE_PRINCIPAL_STANDARD);
                buf.push(*version);
                buf.extend_from_slice(hash160);
            }
            ClarityValue::PrincipalContract { version, hash160, contract_name } => {
                buf.push(TYPE_PRINCIPAL_CONTRACT);
                buf.push(*version);
                buf.extend_from_slice(hash160);
                buf.push(contract_name.len() as u8);
                buf.extend_from_slice(contract_name.as_bytes());
            }
            ClarityValue::ResponseOk(inner) => {
                buf.push(TYPE_RESPONSE_OK);
                inner.encode_into(buf);
            }
            ClarityValue::ResponseErr(inner) => {
                buf.push(TYPE_RESPONSE_ERR);
                inner.encode_into(buf);
            }
            ClarityValue::OptionalNone => buf.push(TYPE_OPTIONAL_NONE),
            ClarityValue::OptionalSome(inner) => {
                buf.push(TYPE_OPTIONAL_SOME);
                inner.encode_into(buf);
            }
            ClarityValue::List(items) => {
                buf.push(TYPE_LIST);
                buf.extend_from_slice(&(items.len() as u32).to_be_bytes());
                for item in items {
                    item.encode_into(buf);
                }
            }
            ClarityValue::Tuple(fields) => {
                buf.push(TYPE_TUPLE);
                buf.extend_from_slice(&(fields.len() as u32).to_be_bytes());
                // BTreeMap iterates in key order, satisfying the
                // lexicographic-key invariant.
                for (key, value) in fields {
                    buf.push(key.len() as u8);
                    buf.extend_from_slice(key.as_bytes());
                    value.encode_into(buf);
                }
            }
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, AibtcError> {
        let (value, rest) = Self::decode_partial(bytes)?;
        if !rest.is_empty() {
            return Err(AibtcError::validation("trailing bytes after Clarity value"));
        }
        Ok(value)
    }

    fn decode_partial(bytes: &[u8]) -> Result<(Self, &[u8]), AibtcError> {
        let (&type_id, rest) = bytes.split_first().ok_or_else(|| AibtcError::validation("empty Clarity buffer"))?;
        match type_id {
            TYPE_INT => {
                let (raw, rest) = take(rest, 16)?;
                Ok((ClarityValue::Int(i128::from_be_bytes(raw.try_into().unwrap())), rest))
            }
            TYPE_UINT => {
                let (raw, rest) = take(rest, 16)?;
                Ok((ClarityValue::UInt(u128::from_be_bytes(raw.try_into().unwrap())), rest))
            }
            TYPE_BUFFER => {
                let (len, rest) = take_u32(rest)?;
                let (data, rest) = take(rest, len as usize)?;
                Ok((ClarityValue::Buffer(data.to_vec()), rest))
            }
            TYPE_BOOL_TRUE => Ok((ClarityValue::Bool(true), rest)),
            TYPE_BOOL_FALSE => Ok((ClarityValue::Bool(false), rest)),
            TYPE_STRING_ASCII => {
                let (len, rest) = take_u32(rest)?;
                let (data, rest) = take(rest, len as usize)?;
                let s = String::from_utf8(data.to_vec()).map_err(|e| AibtcError::validation(format!("invalid ascii string: {e}")))?;
                Ok((ClarityValue::StringAscii(s), rest))
            }
            TYPE_STRING_UTF8 => {
                let (len, rest) = take_u32(rest)?;
                let (data, rest) = take(rest, len as usize)?;
                let s = String::from_utf8(data.to_vec()).map_err(|e| AibtcError::validation(format!("invalid utf8 string: {e}")))?;
                Ok((ClarityValue::StringUtf8(s), rest))
            }
            TYPE_PRINCIPAL_STANDARD => {
                let (version, rest) = take(rest, 1)?;
                let (hash, rest) = take(rest, 20)?;
                Ok((
                    ClarityValue::PrincipalStandard { version: version[0], hash160: hash.try_into().unwrap() },
                    rest,
                ))
            }
            TYPE_PRINCIPAL_CONTRACT => {
                let (version, rest) = take(rest, 1)?;
                let (hash, rest) = take(rest, 20)?;
                let (name_len, rest) = take(rest, 1)?;
                let (name_bytes, rest) = take(rest, name_len[0] as usize)?;
                let contract_name = String::from_utf8(name_bytes.to_vec())
                    .map_err(|e| AibtcError::validation(format!("invalid contract name: {e}")))?;
                Ok((
                    ClarityValue::PrincipalContract { version: version[0], hash160: hash.try_into().unwrap(), contract_name },
                    rest,
                ))
            }
            TYPE_RESPONSE_OK => {
                let (inner, rest) = Self::decode_partial(rest)?;
                Ok((ClarityValue::ResponseOk(Box::new(inner)), rest))
            }
            TYPE_RESPONSE_ERR => {
                let (inner, rest) = Self::decode_partial(rest)?;
                Ok((ClarityValue::ResponseErr(Box::new(inner)), rest))
            }
            TYPE_OPTIONAL_NONE => Ok((ClarityValue::OptionalNone, rest)),
            TYPE_OPTIONAL_SOME => {
                let (inner, rest) = Self::decode_partial(rest)?;
                Ok((ClarityValue::OptionalSome(Box::new(inner)), rest))
            }
            TYPE_LIST => {
                let (len, mut rest) = take_u32(rest)?;
                let mut items = Vec::with_capacity(len as usize);
                for _ in 0..len {
                    let (item, next_rest) = Self::decode_partial(rest)?;
                    items.push(item);
                    rest = next_rest;
                }
                Ok((ClarityValue::List(items), rest))
            }
            TYPE_TUPLE => {
                let (count, mut rest) = take_u32(rest)?;
                let mut fields = BTreeMap::new();
                for _ in 0..count {
                    let (name_len, next_rest) = take(rest, 1)?;
                    let (name_bytes, next_rest) = take(next_rest, name_len[0] as usize)?;
                    let key = String::from_utf8(name_bytes.to_vec())
                        .map_err(|e| AibtcError::validation(format!("invalid tuple key: {e}")))?;
                    let (value, next_rest) = Self::decode_partial(next_rest)?;
                    fields.insert(key, value);
                    rest = next_rest;
                }
                Ok((ClarityValue::Tuple(fields), rest))
            }
            other => Err(AibtcError::validation(format!("unknown Clarity type id: {other:#04x}"))),
        }
    }
}

fn take(bytes: &[u8], n: usize) -> Result<(&[u8], &[u8]), AibtcError> {
    if bytes.len() < n {
        return Err(AibtcError::validation("truncated Clarity value"));
    }
    Ok(bytes.split_at(n))
}

fn take_u32(bytes: &[u8]) -> Result<(u32, &[u8]), AibtcError> {
    let (raw, rest) = take(bytes, 4)?;
    Ok((u32::from_be_bytes(raw.try_into().unwrap()), rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: ClarityValue) {
        let encoded = value.encode();
        let decoded = ClarityValue::decode(&encoded).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn int_round_trips_including_negative() {
        round_trip(ClarityValue::Int(-42));
        round_trip(ClarityValue::Int(i128::MIN));
        round_trip(ClarityValue::Int(i128::MAX));
    }

    #[test]
    fn uint_round_trips() {
        round_trip(ClarityValue::UInt(0));
        round_trip(ClarityValue::UInt(u128::MAX));
    }

    #[test]
    fn buffer_bool_and_strings_round_trip() {
        round_trip(ClarityValue::Buffer(vec![1, 2, 3, 4]));
        round_trip(ClarityValue::Bool(true));
        round_trip(ClarityValue::Bool(false));
        round_trip(ClarityValue::StringAscii("hello".to_string()));
        round_trip(ClarityValue::StringUtf8("héllo wörld".to_string()));
    }

    #[test]
    fn principals_round_trip() {
        round_trip(ClarityValue::PrincipalStandard { version: 22, hash160: [1u8; 20] });
        round_trip(ClarityValue::PrincipalContract {
            version: 26,
            hash160: [2u8; 20],
            contract_name: "my-contract".to_string(),
        });
    }

    #[test]
    fn response_and_optional_round_trip() {
        round_trip(ClarityValue::ResponseOk(Box::new(ClarityValue::UInt(1))));
        round_trip(ClarityValue::ResponseErr(Box::new(ClarityValue::UInt(2))));
        round_trip(ClarityValue::OptionalNone);
        round_trip(ClarityValue::OptionalSome(Box::new(ClarityValue::Bool(true))));
    }

    #[test]
    fn list_round_trips() {
        round_trip(ClarityValue::List(vec![ClarityValue::UInt(1), ClarityValue::UInt(2), ClarityValue::UInt(3)]));
    }

    #[test]
    fn tuple_serializes_keys_in_lexicographic_order() {
        let mut fields = BTreeMap::new();
        fields.insert("zebra".to_string(), ClarityValue::Bool(true));
        fields.insert("apple".to_string(), ClarityValue::Bool(false));
        let tuple = ClarityValue::Tuple(fields);
        let encoded = tuple.encode();

        // "apple" (5 bytes) must appear before "zebra" in the wire bytes.
        let apple_pos = encoded.windows(5).position(|w| w == b"apple").unwrap();
        let zebra_pos = encoded.windows(5).position(|w| w == b"zebra").unwrap();
        assert!(apple_pos < zebra_pos);

        round_trip(tuple);
    }

    #[test]
    fn decode_rejects_truncated_input() {
        assert!(ClarityValue::decode(&[TYPE_UINT, 0, 0]).is_err());
    }

    #[test]
    fn decode_rejects_unknown_type() {
        assert!(ClarityValue::decode(&[0xff]).is_err());
    }
}
