//! Stacks post-conditions: consensus-enforced assertions about what an
//! asset transfer must, or must not, do. Covers STX, SIP-010 fungible
//! tokens, and SIP-009 NFTs.

use crate::common::error::AibtcError;
use crate::crypto::c32_decode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostConditionMode {
    Allow,
    Deny,
}

impl PostConditionMode {
    pub(crate) fn wire_byte(self) -> u8 {
        match self {
            PostConditionMode::Allow => 0x01,
            PostConditionMode::Deny => 0x02,
        }
    }
}

impl Default for PostConditionMode {
    fn default() -> Self {
        PostConditionMode::Deny
    }
}

/// Semantic comparator for a fungible (STX or SIP-010) post-condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparator {
    fn fungible_code(self) -> u8 {
        match self {
            Comparator::Eq => 0x01,
            Comparator::Gt => 0x02,
            Comparator::Gte => 0x03,
            Comparator::Lt => 0x04,
            Comparator::Lte => 0x05,
        }
    }
}

/// The principal whose balance change is being constrained.
#[derive(Debug, Clone)]
pub enum PostConditionPrincipal {
    Origin,
    Standard { address: String },
    Contract { address: String, contract_name: String },
}

impl PostConditionPrincipal {
    fn encode_into(&self, buf: &mut Vec<u8>) -> Result<(), AibtcError> {
        match self {
            PostConditionPrincipal::Origin => buf.push(0x01),
            PostConditionPrincipal::Standard { address } => {
                buf.push(0x02);
                let (version, hash160) = c32_decode(address)?;
                buf.push(version);
                buf.extend_from_slice(&hash160);
            }
            PostConditionPrincipal::Contract { address, contract_name } => {
                buf.push(0x03);
                let (version, hash160) = c32_decode(address)?;
                buf.push(version);
                buf.extend_from_slice(&hash160);
                write_clarity_name(buf, contract_name)?;
            }
        }
        Ok(())
    }
}

/// `(contractAddress, contractName, assetName)` triple identifying a
/// SIP-010 or SIP-009 asset.
#[derive(Debug, Clone)]
pub struct AssetInfo {
    pub contract_address: String,
    pub contract_name: String,
    pub asset_name: String,
}

impl AssetInfo {
    fn encode_into(&self, buf: &mut Vec<u8>) -> Result<(), AibtcError> {
        let (version, hash160) = c32_decode(&self.contract_address)?;
        buf.push(version);
        buf.extend_from_slice(&hash160);
        write_clarity_name(buf, &self.contract_name)?;
        write_clarity_name(buf, &self.asset_name)?;
        Ok(())
    }
}

fn write_clarity_name(buf: &mut Vec<u8>, name: &str) -> Result<(), AibtcError> {
    if name.len() > 128 {
        return Err(AibtcError::validation(format!("clarity name '{name}' exceeds 128 bytes")));
    }
    buf.push(name.len() as u8);
    buf.extend_from_slice(name.as_bytes());
    Ok(())
}

#[derive(Debug, Clone)]
pub enum PostCondition {
    Stx { principal: PostConditionPrincipal, comparator: Comparator, amount: u64 },
    Fungible { principal: PostConditionPrincipal, asset: AssetInfo, comparator: Comparator, amount: u64 },
    NonFungible { principal: PostConditionPrincipal, asset: AssetInfo, token_id: crate::signing::ClarityValue, send: bool },
}

impl PostCondition {
    pub fn encode(&self) -> Result<Vec<u8>, AibtcError> {
        let mut buf = Vec::new();
        match self {
            PostCondition::Stx { principal, comparator, amount } => {
                buf.push(0x00);
                principal.encode_into(&mut buf)?;
                buf.push(comparator.fungible_code());
                buf.extend_from_slice(&amount.to_be_bytes());
            }
            PostCondition::Fungible { principal, asset, comparator, amount } => {
                buf.push(0x01);
                principal.encode_into(&mut buf)?;
                asset.encode_into(&mut buf)?;
                buf.push(comparator.fungible_code());
                buf.extend_from_slice(&amount.to_be_bytes());
            }
            PostCondition::NonFungible { principal, asset, token_id, send } => {
                buf.push(0x02);
                principal.encode_into(&mut buf)?;
                asset.encode_into(&mut buf)?;
                buf.extend_from_slice(&token_id.encode());
                buf.push(if *send { 0x10 } else { 0x11 });
            }
        }
        Ok(buf)
    }
}

/// Encode the `{ count: u32 BE, postConditions: [...] }` list that follows
/// the post-condition mode byte in a transaction.
pub fn encode_post_conditions(conditions: &[PostCondition]) -> Result<Vec<u8>, AibtcError> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(conditions.len() as u32).to_be_bytes());
    for c in conditions {
        buf.extend_from_slice(&c.encode()?);
    }
    Ok(buf)
}
