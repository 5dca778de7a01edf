//! Clarity function-argument parser: accepts both the shorthand
//! `"uint:100"` form and explicit typed JSON (`{"type":"uint","value":100}`).

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::common::error::AibtcError;
use crate::crypto::c32_decode;
use crate::signing::ClarityValue;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ClarityArgInput {
    Shorthand(String),
    Typed(TypedArg),
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypedArg {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: serde_json::Value,
}

/// Parse a single function argument in either representation.
pub fn parse_arg(input: &ClarityArgInput) -> Result<ClarityValue, AibtcError> {
    match input {
        ClarityArgInput::Shorthand(s) => parse_shorthand(s),
        ClarityArgInput::Typed(t) => parse_typed(&t.kind, &t.value),
    }
}

pub fn parse_args(inputs: &[ClarityArgInput]) -> Result<Vec<ClarityValue>, AibtcError> {
    inputs.iter().map(parse_arg).collect()
}

fn parse_shorthand(s: &str) -> Result<ClarityValue, AibtcError> {
    let (kind, rest) = s
        .split_once(':')
        .ok_or_else(|| AibtcError::validation(format!("clarity shorthand '{s}' must be 'type:value'")))?;
    parse_typed(kind, &serde_json::Value::String(rest.to_string()))
}

fn as_str(value: &serde_json::Value) -> Result<String, AibtcError> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        other => Ok(other.to_string()),
    }
}

fn parse_typed(kind: &str, value: &serde_json::Value) -> Result<ClarityValue, AibtcError> {
    match kind {
        "int" => {
            let s = as_str(value)?;
            let n: i128 = s.parse().map_err(|_| AibtcError::validation(format!("invalid int literal '{s}'")))?;
            Ok(ClarityValue::Int(n))
        }
        "uint" => {
            let s = as_str(value)?;
            let n: u128 = s.parse().map_err(|_| AibtcError::validation(format!("invalid uint literal '{s}'")))?;
            Ok(ClarityValue::UInt(n))
        }
        "bool" => {
            let s = as_str(value)?;
            let b: bool = s.parse().map_err(|_| AibtcError::validation(format!("invalid bool literal '{s}'")))?;
            Ok(ClarityValue::Bool(b))
        }
        "buffer" => {
            let s = as_str(value)?;
            let hex_str = s.strip_prefix("0x").unwrap_or(&s);
            let bytes = hex::decode(hex_str).map_err(|e| AibtcError::validation(format!("invalid buffer hex: {e}")))?;
            Ok(ClarityValue::Buffer(bytes))
        }
        "string-ascii" => Ok(ClarityValue::StringAscii(as_str(value)?)),
        "string-utf8" => Ok(ClarityValue::StringUtf8(as_str(value)?)),
        "principal" => {
            let s = as_str(value)?;
            parse_principal(&s)
        }
        "optional-none" | "none" => Ok(ClarityValue::OptionalNone),
        "optional-some" | "some" => {
            let inner = value
                .as_object()
                .and_then(|o| o.get("value"))
                .ok_or_else(|| AibtcError::validation("optional-some requires a nested 'value'"))?;
            let nested_kind = value
                .as_object()
                .and_then(|o| o.get("type"))
                .and_then(|v| v.as_str())
                .ok_or_else(|| AibtcError::validation("optional-some requires a nested 'type'"))?;
            Ok(ClarityValue::OptionalSome(Box::new(parse_typed(nested_kind, inner)?)))
        }
        "list" => {
            let arr = value.as_array().ok_or_else(|| AibtcError::validation("list value must be a JSON array"))?;
            let mut items = Vec::with_capacity(arr.len());
            for item in arr {
                let obj = item.as_object().ok_or_else(|| AibtcError::validation("list items must be typed objects"))?;
                let item_kind = obj.get("type").and_then(|v| v.as_str()).ok_or_else(|| AibtcError::validation("list item missing 'type'"))?;
                let item_value = obj.get("value").ok_or_else(|| AibtcError::validation("list item missing 'value'"))?;
                items.push(parse_typed(item_kind, item_value)?);
            }
            Ok(ClarityValue::List(items))
        }
        "tuple" => {
            let obj = value.as_object().ok_or_else(|| AibtcError::validation("tuple value must be a JSON object"))?;
            let mut fields = BTreeMap::new();
            for (key, field_value) in obj {
                let field_obj = field_value.as_object().ok_or_else(|| AibtcError::validation("tuple field must be a typed object"))?;
                let field_kind = field_obj.get("type").and_then(|v| v.as_str()).ok_or_else(|| AibtcError::validation("tuple field missing 'type'"))?;
                let inner_value = field_obj.get("value").ok_or_else(|| AibtcError::validation("tuple field missing 'value'"))?;
                fields.insert(key.clone(), parse_typed(field_kind, inner_value)?);
            }
            Ok(ClarityValue::Tuple(fields))
        }
        other => Err(AibtcError::validation(format!("unsupported clarity argument type '{other}'"))),
    }
}

fn parse_principal(address: &str) -> Result<ClarityValue, AibtcError> {
    if let Some((addr, contract_name)) = address.split_once('.') {
        let (version, hash160) = c32_decode(addr)?;
        Ok(ClarityValue::PrincipalContract { version, hash160, contract_name: contract_name.to_string() })
    } else {
        let (version, hash160) = c32_decode(address)?;
        Ok(ClarityValue::PrincipalStandard { version, hash160 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_shorthand_uint() {
        let input = ClarityArgInput::Shorthand("uint:100".to_string());
        assert_eq!(parse_arg(&input).unwrap(), ClarityValue::UInt(100));
    }

    #[test]
    fn parses_shorthand_negative_int() {
        let input = ClarityArgInput::Shorthand("int:-42".to_string());
        assert_eq!(parse_arg(&input).unwrap(), ClarityValue::Int(-42));
    }

    #[test]
    fn parses_typed_bool() {
        let input: ClarityArgInput = serde_json::from_value(serde_json::json!({"type": "bool", "value": "true"})).unwrap();
        assert_eq!(parse_arg(&input).unwrap(), ClarityValue::Bool(true));
    }

    #[test]
    fn parses_shorthand_principal() {
        let input = ClarityArgInput::Shorthand("principal:ST3J2GVMMM2R07ZFBJDWTYEYAR8FZH5WKDTFJ9AHA".to_string());
        let value = parse_arg(&input).unwrap();
        assert!(matches!(value, ClarityValue::PrincipalStandard { .. }));
    }

    #[test]
    fn parses_buffer_hex() {
        let input = ClarityArgInput::Shorthand("buffer:0xdead".to_string());
        assert_eq!(parse_arg(&input).unwrap(), ClarityValue::Buffer(vec![0xde, 0xad]));
    }

    #[test]
    fn rejects_unknown_type() {
        let input = ClarityArgInput::Shorthand("mystery:1".to_string());
        assert!(parse_arg(&input).is_err());
    }
}
