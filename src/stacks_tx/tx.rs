//! Stacks transaction wire format, signing, and the public builder
//! operations (`transfer`, `callContract`, `deployContract`,
//! `broadcastSigned`).
//!
//! Wire layout follows the Stacks transaction v0 binary format: version,
//! chain id, single-signature auth (standard or sponsored), anchor mode,
//! post-condition mode + post-conditions, and a tagged payload. Signing
//! runs the origin spending condition through the presign sighash step
//! (`sighash_presign`) before signing, so the origin's signature remains
//! valid no matter what fee a sponsor ultimately attaches — the sponsor's
//! own spending condition, and the postsign chaining step that feeds it,
//! are signed externally by whoever sponsors the transaction, not here.

use crate::common::error::AibtcError;
use crate::crypto::{c32_decode, hash160, public_key_from_secret, sha512_256, sign_recoverable};
use crate::env::Network;
use crate::gateway::StacksGateway;
use crate::signing::ClarityValue;
use crate::stacks_tx::clarity_args::ClarityArgInput;
use crate::stacks_tx::postcond::{encode_post_conditions, PostCondition, PostConditionMode};
use crate::wallet::hd::Account;

const ANCHOR_MODE_ANY: u8 = 0x03;
const AUTH_STANDARD: u8 = 0x04;
const AUTH_SPONSORED: u8 = 0x05;
const HASH_MODE_P2PKH: u8 = 0x00;
const KEY_ENCODING_COMPRESSED: u8 = 0x00;

const PAYLOAD_TOKEN_TRANSFER: u8 = 0x00;
const PAYLOAD_CONTRACT_CALL: u8 = 0x02;
const PAYLOAD_SMART_CONTRACT: u8 = 0x06;

const MEMO_LEN: usize = 34;

#[derive(Debug, Clone)]
pub enum StacksPayload {
    TokenTransfer { recipient: String, amount_micro_stx: u64, memo: String },
    ContractCall { contract_address: String, contract_name: String, function_name: String, function_args: Vec<ClarityValue> },
    SmartContract { contract_name: String, code_body: String },
}

impl StacksPayload {
    fn encode(&self) -> Result<Vec<u8>, AibtcError> {
        let mut buf = Vec::new();
        match self {
            StacksPayload::TokenTransfer { recipient, amount_micro_stx, memo } => {
                buf.push(PAYLOAD_TOKEN_TRANSFER);
                encode_principal(&mut buf, recipient)?;
                buf.extend_from_slice(&amount_micro_stx.to_be_bytes());
                let mut memo_bytes = [0u8; MEMO_LEN];
                let src = memo.as_bytes();
                if src.len() > MEMO_LEN {
                    return Err(AibtcError::validation("memo exceeds 34 bytes"));
                }
                memo_bytes[..src.len()].copy_from_slice(src);
                buf.extend_from_slice(&memo_bytes);
            }
            StacksPayload::ContractCall { contract_address, contract_name, function_name, function_args } => {
                buf.push(PAYLOAD_CONTRACT_CALL);
                let (version, hash160) = c32_decode(contract_address)?;
                buf.push(version);
                buf.extend_from_slice(&hash160);
                write_clarity_name(&mut buf, contract_name)?;
                write_clarity_name(&mut buf, function_name)?;
                buf.extend_from_slice(&(function_args.len() as u32).to_be_bytes());
                for arg in function_args {
                    buf.extend_from_slice(&arg.encode());
                }
            }
            StacksPayload::SmartContract { contract_name, code_body } => {
                buf.push(PAYLOAD_SMART_CONTRACT);
                write_clarity_name(&mut buf, contract_name)?;
                buf.extend_from_slice(&(code_body.len() as u32).to_be_bytes());
                buf.extend_from_slice(code_body.as_bytes());
            }
        }
        Ok(buf)
    }
}

fn write_clarity_name(buf: &mut Vec<u8>, name: &str) -> Result<(), AibtcError> {
    if name.is_empty() || name.len() > 128 {
        return Err(AibtcError::validation(format!("invalid contract/function name '{name}'")));
    }
    buf.push(name.len() as u8);
    buf.extend_from_slice(name.as_bytes());
    Ok(())
}

fn encode_principal(buf: &mut Vec<u8>, address: &str) -> Result<(), AibtcError> {
    if let Some((addr, contract_name)) = address.split_once('.') {
        let (version, hash160) = c32_decode(addr)?;
        buf.push(0x06);
        buf.push(version);
        buf.extend_from_slice(&hash160);
        write_clarity_name(buf, contract_name)?;
    } else {
        let (version, hash160) = c32_decode(address)?;
        buf.push(0x05);
        buf.push(version);
        buf.extend_from_slice(&hash160);
    }
    Ok(())
}

/// One participant's spending condition: signer hash, nonce, fee, and
/// (once signed) an RSV signature.
#[derive(Debug, Clone)]
struct SpendingCondition {
    signer_hash160: [u8; 20],
    nonce: u64,
    fee: u64,
    signature: [u8; 65],
}

impl SpendingCondition {
    fn placeholder(signer_hash160: [u8; 20], nonce: u64, fee: u64) -> Self {
        Self { signer_hash160, nonce, fee, signature: [0u8; 65] }
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + 20 + 8 + 8 + 1 + 65);
        buf.push(HASH_MODE_P2PKH);
        buf.extend_from_slice(&self.signer_hash160);
        buf.extend_from_slice(&self.nonce.to_be_bytes());
        buf.extend_from_slice(&self.fee.to_be_bytes());
        buf.push(KEY_ENCODING_COMPRESSED);
        buf.extend_from_slice(&self.signature);
        buf
    }
}

fn sighash_presign(cur: &[u8; 32], auth_type: u8, fee: u64, nonce: u64) -> [u8; 32] {
    let mut buf = Vec::with_capacity(32 + 1 + 8 + 8);
    buf.extend_from_slice(cur);
    buf.push(auth_type);
    buf.extend_from_slice(&fee.to_be_bytes());
    buf.extend_from_slice(&nonce.to_be_bytes());
    sha512_256(&buf)
}

/// A built, signed Stacks transaction ready to serialize or broadcast.
#[derive(Debug, Clone)]
pub struct StacksTransaction {
    pub version: Network,
    pub chain_id: u32,
    pub sponsored: bool,
    anchor_mode: u8,
    post_condition_mode: PostConditionMode,
    origin: SpendingCondition,
    sponsor: Option<SpendingCondition>,
    /// Encoded post-conditions list followed by the encoded payload,
    /// concatenated — both are simply replayed verbatim on serialize, so
    /// there's no need to split them back into separate buffers.
    tail: Vec<u8>,
}

impl StacksTransaction {
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(if self.version == Network::Mainnet { 0x00 } else { 0x80 });
        buf.extend_from_slice(&self.chain_id.to_be_bytes());
        buf.push(if self.sponsored { AUTH_SPONSORED } else { AUTH_STANDARD });
        buf.extend_from_slice(&self.origin.encode());
        if let Some(sponsor) = &self.sponsor {
            buf.extend_from_slice(&sponsor.encode());
        }
        buf.push(self.anchor_mode);
        buf.push(self.post_condition_mode.wire_byte());
        buf.extend_from_slice(&self.tail);
        buf
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    /// Stacks txid = `Sha512/256(serialized tx)`.
    pub fn txid(&self) -> String {
        hex::encode(sha512_256(&self.serialize()))
    }

    pub fn fee(&self) -> u64 {
        self.sponsor.as_ref().map(|s| s.fee).unwrap_or(self.origin.fee)
    }

    pub fn nonce(&self) -> u64 {
        self.origin.nonce
    }
}

/// Deserialize a raw transaction hex back into a `StacksTransaction`.
/// Round-trips with [`StacksTransaction::to_hex`] for well-formed input.
pub fn deserialize(hex_str: &str) -> Result<StacksTransaction, AibtcError> {
    let bytes = hex::decode(hex_str).map_err(|e| AibtcError::validation(format!("invalid tx hex: {e}")))?;
    let mut cursor = 0usize;

    let take = |buf: &[u8], cursor: &mut usize, n: usize| -> Result<Vec<u8>, AibtcError> {
        if *cursor + n > buf.len() {
            return Err(AibtcError::validation("truncated stacks transaction"));
        }
        let slice = buf[*cursor..*cursor + n].to_vec();
        *cursor += n;
        Ok(slice)
    };

    let version_byte = take(&bytes, &mut cursor, 1)?[0];
    let version = if version_byte == 0x00 { Network::Mainnet } else { Network::Testnet };
    let chain_id = u32::from_be_bytes(take(&bytes, &mut cursor, 4)?.try_into().unwrap());
    let auth_type = take(&bytes, &mut cursor, 1)?[0];
    let sponsored = auth_type == AUTH_SPONSORED;

    let decode_spending_condition = |buf: &[u8], cursor: &mut usize| -> Result<SpendingCondition, AibtcError> {
        let _hash_mode = take(buf, cursor, 1)?;
        let signer: [u8; 20] = take(buf, cursor, 20)?.try_into().unwrap();
        let nonce = u64::from_be_bytes(take(buf, cursor, 8)?.try_into().unwrap());
        let fee = u64::from_be_bytes(take(buf, cursor, 8)?.try_into().unwrap());
        let _key_encoding = take(buf, cursor, 1)?;
        let signature: [u8; 65] = take(buf, cursor, 65)?.try_into().unwrap();
        Ok(SpendingCondition { signer_hash160: signer, nonce, fee, signature })
    };

    let origin = decode_spending_condition(&bytes, &mut cursor)?;
    let sponsor = if sponsored { Some(decode_spending_condition(&bytes, &mut cursor)?) } else { None };

    let anchor_mode = take(&bytes, &mut cursor, 1)?[0];
    let pc_mode_byte = take(&bytes, &mut cursor, 1)?[0];
    let post_condition_mode = if pc_mode_byte == 0x01 { PostConditionMode::Allow } else { PostConditionMode::Deny };

    // The post-conditions list and the payload are both replayed verbatim
    // on serialize, so there's no need to walk the post-conditions list
    // structurally here — keep everything from the count field onward.
    let tail = bytes[cursor..].to_vec();

    Ok(StacksTransaction {
        version,
        chain_id,
        sponsored,
        anchor_mode,
        post_condition_mode,
        origin,
        sponsor,
        tail,
    })
}

pub struct BuiltTransaction {
    pub txid: String,
    pub tx_hex: String,
    pub nonce: u64,
    pub fee: u64,
}

pub struct ContractCallArgs {
    pub contract_address: String,
    pub contract_name: String,
    pub function_name: String,
    pub function_args: Vec<ClarityArgInput>,
    pub post_condition_mode: PostConditionMode,
    pub post_conditions: Vec<PostCondition>,
    pub fee: Option<u64>,
    pub sponsored: bool,
}

pub struct DeployContractArgs {
    pub contract_name: String,
    pub code_body: String,
    pub fee: Option<u64>,
    pub sponsored: bool,
}

fn require_sponsor_fee_zero(sponsored: bool, fee: Option<u64>) -> Result<(), AibtcError> {
    if sponsored && fee.unwrap_or(0) != 0 {
        return Err(AibtcError::validation("sponsored transactions require fee=0 in the origin auth"));
    }
    Ok(())
}

fn build_signed(
    account: &Account,
    nonce: u64,
    fee: u64,
    sponsored: bool,
    anchor_mode: u8,
    post_condition_mode: PostConditionMode,
    post_conditions: &[PostCondition],
    payload: StacksPayload,
) -> Result<StacksTransaction, AibtcError> {
    let chain_id = account.network.stacks_chain_id();
    let signer_pubkey = public_key_from_secret(&account.stx_private_key[..32].try_into().unwrap())?;
    let signer_hash160 = hash160(&signer_pubkey.serialize());

    let origin_fee = if sponsored { 0 } else { fee };
    let origin_placeholder = SpendingCondition::placeholder(signer_hash160, nonce, origin_fee);
    let sponsor_placeholder = if sponsored { Some(SpendingCondition::placeholder([0u8; 20], 0, fee)) } else { None };

    let encoded_pcs = encode_post_conditions(post_conditions)?;
    let encoded_payload = payload.encode()?;

    // txid-without-signature: the base "cur_sighash" the presign chain starts from.
    let mut base = Vec::new();
    base.push(if account.network == Network::Mainnet { 0x00 } else { 0x80 });
    base.extend_from_slice(&chain_id.to_be_bytes());
    base.push(if sponsored { AUTH_SPONSORED } else { AUTH_STANDARD });
    base.extend_from_slice(&origin_placeholder.encode());
    if let Some(sp) = &sponsor_placeholder {
        base.extend_from_slice(&sp.encode());
    }
    base.push(anchor_mode);
    base.push(post_condition_mode.wire_byte());
    base.extend_from_slice(&encoded_pcs);
    base.extend_from_slice(&encoded_payload);
    let cur_sighash = sha512_256(&base);

    let presign = sighash_presign(&cur_sighash, if sponsored { AUTH_SPONSORED } else { AUTH_STANDARD }, origin_fee, nonce);
    let sig = sign_recoverable(&presign, account.stx_private_key[..32].try_into().unwrap())?;
    let mut origin_signature = [0u8; 65];
    origin_signature[..32].copy_from_slice(&sig.r);
    origin_signature[32..64].copy_from_slice(&sig.s);
    origin_signature[64] = sig.rec_id as u8;

    // Sponsored transactions carry a second spending condition whose
    // signature is added by the sponsor after this tx is handed off (see
    // `x402`'s sponsored-payment flow) — we never sign that condition
    // ourselves, so there's no postsign chaining step to compute here.

    let origin = SpendingCondition { signer_hash160, nonce, fee: origin_fee, signature: origin_signature };

    let mut tail = encoded_pcs;
    tail.extend_from_slice(&encoded_payload);

    Ok(StacksTransaction {
        version: account.network,
        chain_id,
        sponsored,
        anchor_mode,
        post_condition_mode,
        origin,
        sponsor: sponsor_placeholder,
        tail,
    })
}

/// Build and sign an STX transfer.
pub fn transfer(
    account: &Account,
    recipient: &str,
    amount_micro_stx: u64,
    memo: Option<&str>,
    nonce: u64,
    fee: Option<u64>,
    sponsored: bool,
) -> Result<BuiltTransaction, AibtcError> {
    require_sponsor_fee_zero(sponsored, fee)?;
    let payload = StacksPayload::TokenTransfer {
        recipient: recipient.to_string(),
        amount_micro_stx,
        memo: memo.unwrap_or("").to_string(),
    };
    let tx = build_signed(account, nonce, fee.unwrap_or(0), sponsored, ANCHOR_MODE_ANY, PostConditionMode::Deny, &[], payload)?;
    Ok(BuiltTransaction { txid: tx.txid(), tx_hex: tx.to_hex(), nonce, fee: tx.fee() })
}

/// Build and sign a contract-call transaction.
pub fn call_contract(account: &Account, nonce: u64, args: ContractCallArgs) -> Result<BuiltTransaction, AibtcError> {
    require_sponsor_fee_zero(args.sponsored, args.fee)?;
    let function_args = crate::stacks_tx::clarity_args::parse_args(&args.function_args)?;
    let payload = StacksPayload::ContractCall {
        contract_address: args.contract_address,
        contract_name: args.contract_name,
        function_name: args.function_name,
        function_args,
    };
    let tx = build_signed(
        account,
        nonce,
        args.fee.unwrap_or(0),
        args.sponsored,
        ANCHOR_MODE_ANY,
        args.post_condition_mode,
        &args.post_conditions,
        payload,
    )?;
    Ok(BuiltTransaction { txid: tx.txid(), tx_hex: tx.to_hex(), nonce, fee: tx.fee() })
}

/// Build and sign a contract-deploy transaction.
pub fn deploy_contract(account: &Account, nonce: u64, args: DeployContractArgs) -> Result<BuiltTransaction, AibtcError> {
    require_sponsor_fee_zero(args.sponsored, args.fee)?;
    let payload = StacksPayload::SmartContract { contract_name: args.contract_name, code_body: args.code_body };
    let tx = build_signed(account, nonce, args.fee.unwrap_or(0), args.sponsored, ANCHOR_MODE_ANY, PostConditionMode::Deny, &[], payload)?;
    Ok(BuiltTransaction { txid: tx.txid(), tx_hex: tx.to_hex(), nonce, fee: tx.fee() })
}

/// Broadcast a previously-signed, hex-encoded transaction.
pub async fn broadcast_signed(gateway: &dyn StacksGateway, tx_hex: &str) -> Result<String, AibtcError> {
    gateway.broadcast_raw_tx(tx_hex).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::hd::derive_account;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn test_account() -> Account {
        derive_account(TEST_MNEMONIC, "", Network::Testnet).unwrap()
    }

    #[test]
    fn transfer_builds_signed_tx_and_round_trips_hex() {
        let account = test_account();
        let built = transfer(&account, &account.stx_address, 1_000_000, Some("gm"), 0, Some(200), false).unwrap();

        assert_eq!(built.nonce, 0);
        assert_eq!(built.fee, 200);
        assert_eq!(built.txid.len(), 64);

        let decoded = deserialize(&built.tx_hex).unwrap();
        assert_eq!(decoded.to_hex(), built.tx_hex);
        assert_eq!(decoded.txid(), built.txid);
    }

    #[test]
    fn sponsored_transfer_requires_zero_origin_fee() {
        let account = test_account();
        let err = transfer(&account, &account.stx_address, 1_000_000, None, 0, Some(500), true).unwrap_err();
        assert!(matches!(err, AibtcError::Validation(_)));
    }

    #[test]
    fn sponsored_transfer_with_zero_fee_succeeds() {
        let account = test_account();
        let built = transfer(&account, &account.stx_address, 1_000_000, None, 0, Some(0), true).unwrap();
        assert_eq!(built.fee, 0);
    }

    #[test]
    fn call_contract_builds_with_shorthand_args() {
        let account = test_account();
        let args = ContractCallArgs {
            contract_address: account.stx_address.clone(),
            contract_name: "my-contract".to_string(),
            function_name: "do-thing".to_string(),
            function_args: vec![ClarityArgInput::Shorthand("uint:42".to_string())],
            post_condition_mode: PostConditionMode::Deny,
            post_conditions: vec![],
            fee: Some(3000),
            sponsored: false,
        };
        let built = call_contract(&account, 1, args).unwrap();
        assert_eq!(built.nonce, 1);
        let decoded = deserialize(&built.tx_hex).unwrap();
        assert_eq!(decoded.to_hex(), built.tx_hex);
    }

    #[test]
    fn deploy_contract_builds_signed_tx() {
        let account = test_account();
        let args = DeployContractArgs {
            contract_name: "hello-world".to_string(),
            code_body: "(define-public (hello) (ok true))".to_string(),
            fee: Some(10_000),
            sponsored: false,
        };
        let built = deploy_contract(&account, 2, args).unwrap();
        assert_eq!(built.fee, 10_000);
    }

    #[test]
    fn different_nonces_yield_different_txids() {
        let account = test_account();
        let a = transfer(&account, &account.stx_address, 1000, None, 0, Some(180), false).unwrap();
        let b = transfer(&account, &account.stx_address, 1000, None, 1, Some(180), false).unwrap();
        assert_ne!(a.txid, b.txid);
    }
}
