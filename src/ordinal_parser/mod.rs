//! Ordinal Parser
//!
//! Read-only extraction of ordinal inscription envelopes from a reveal
//! transaction's witness scripts. No network dependency: given raw bytes,
//! everything here is pure parsing.
//!
//! Envelope grammar (as used by `ord`): `OP_FALSE OP_IF "ord" <tag> <value>
//! [<tag> <value> ...] OP_ENDIF`, where tags are pushed as minimally-encoded
//! small integers (which the Bitcoin script interpreter represents as
//! `OP_0`/`OP_1`..`OP_16`, not as explicit data pushes). Tag `0` (body) is
//! special: every push after it, up to `OP_ENDIF`, is a body chunk.

use bitcoin::opcodes::all::{OP_ENDIF, OP_IF};
use bitcoin::opcodes::Opcode;
use bitcoin::script::Instruction;
use bitcoin::{consensus, ScriptBuf, Transaction};

use crate::common::error::AibtcError;

const TAG_BODY: i64 = 0;
const TAG_CONTENT_TYPE: i64 = 1;
const TAG_POINTER: i64 = 2;
const TAG_PARENT: i64 = 3;
const TAG_METADATA: i64 = 5;
const TAG_METAPROTOCOL: i64 = 7;
const TAG_CONTENT_ENCODING: i64 = 9;
const TAG_DELEGATE: i64 = 11;
const TAG_RUNE: i64 = 13;

/// A single decoded ordinal inscription envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    /// True unless this is the first envelope found in the first input's
    /// witness script — the one position `ord` treats as uncursed.
    pub cursed: bool,
    pub pointer: Option<u64>,
    pub parent: Option<Vec<u8>>,
    pub metadata: Option<Vec<u8>>,
    pub metaprotocol: Option<String>,
    pub content_encoding: Option<String>,
    pub delegate: Option<Vec<u8>>,
    pub rune: Option<Vec<u8>>,
}

/// Extract every envelope from a single witness script's bytes (the
/// taproot script-path leaf, i.e. the second-to-last witness element).
pub fn parse_envelopes_from_script(script_bytes: &[u8]) -> Result<Vec<Envelope>, AibtcError> {
    parse_envelopes_from_script_at(script_bytes, true)
}

fn parse_envelopes_from_script_at(script_bytes: &[u8], is_first_input: bool) -> Result<Vec<Envelope>, AibtcError> {
    let script = ScriptBuf::from_bytes(script_bytes.to_vec());
    let instructions: Vec<Instruction<'_>> = script
        .instructions()
        .collect::<Result<_, _>>()
        .map_err(|e| AibtcError::validation(format!("malformed witness script: {e}")))?;

    let mut envelopes = Vec::new();
    let mut i = 0usize;
    let mut envelope_index = 0usize;
    while i < instructions.len() {
        if is_op_false(&instructions[i]) && i + 1 < instructions.len() && is_op(&instructions[i + 1], OP_IF) {
            if let Some((envelope, consumed)) = parse_one_envelope(&instructions[i + 2..]) {
                let mut envelope = envelope;
                envelope.cursed = !(is_first_input && envelope_index == 0);
                envelopes.push(envelope);
                envelope_index += 1;
                i += 2 + consumed;
                continue;
            }
        }
        i += 1;
    }
    Ok(envelopes)
}

/// Extract every envelope from a whole reveal transaction, scanning each
/// input's witness script in input order.
pub fn parse_envelopes_from_tx_hex(tx_hex: &str) -> Result<Vec<Envelope>, AibtcError> {
    let bytes = hex::decode(tx_hex).map_err(|e| AibtcError::validation(format!("invalid tx hex: {e}")))?;
    let tx: Transaction = consensus::deserialize(&bytes).map_err(|e| AibtcError::validation(format!("malformed transaction: {e}")))?;

    let mut all = Vec::new();
    for (input_index, input) in tx.input.iter().enumerate() {
        // Script-path spend witness layout: [..., script, control_block].
        let elements: Vec<&[u8]> = input.witness.iter().collect();
        if elements.len() < 2 {
            continue;
        }
        let script_bytes = elements[elements.len() - 2];
        all.extend(parse_envelopes_from_script_at(script_bytes, input_index == 0)?);
    }
    Ok(all)
}

fn is_op(instr: &Instruction<'_>, op: Opcode) -> bool {
    matches!(instr, Instruction::Op(found) if *found == op)
}

/// `OP_FALSE`/`OP_0` (opcode byte `0x00`) is a zero-length data push in the
/// Script grammar, so the instruction decoder yields `PushBytes(&[])`
/// rather than `Op(OP_FALSE)`.
fn is_op_false(instr: &Instruction<'_>) -> bool {
    matches!(instr, Instruction::PushBytes(bytes) if bytes.as_bytes().is_empty())
}

/// Returns `Some(tag)` if this instruction is a minimally-encoded small
/// integer push (`OP_0`, or `OP_1`..`OP_16`).
fn small_int(instr: &Instruction<'_>) -> Option<i64> {
    match instr {
        Instruction::Op(op) => {
            let byte = op.to_u8();
            if byte == 0x00 {
                Some(0)
            } else if (0x51..=0x60).contains(&byte) {
                Some((byte - 0x50) as i64)
            } else {
                None
            }
        }
        Instruction::PushBytes(bytes) if bytes.as_bytes().is_empty() => Some(0),
        _ => None,
    }
}

fn push_data<'a>(instr: &'a Instruction<'a>) -> Option<&'a [u8]> {
    match instr {
        Instruction::PushBytes(bytes) => Some(bytes.as_bytes()),
        _ => None,
    }
}

/// Parse one envelope body starting just after `OP_FALSE OP_IF`. Returns
/// the envelope and how many instructions (from the start of `instrs`,
/// i.e. right after `OP_IF`) were consumed, including the terminating
/// `OP_ENDIF`.
fn parse_one_envelope(instrs: &[Instruction<'_>]) -> Option<(Envelope, usize)> {
    let mut idx = 0usize;
    let marker = push_data(instrs.get(idx)?)?;
    if marker != b"ord" {
        return None;
    }
    idx += 1;

    let mut envelope = Envelope::default();
    let mut body_chunks: Vec<&[u8]> = Vec::new();
    let mut in_body = false;

    loop {
        let instr = instrs.get(idx)?;
        if is_op(instr, OP_ENDIF) {
            idx += 1;
            break;
        }

        if in_body {
            let chunk = push_data(instr)?;
            body_chunks.push(chunk);
            idx += 1;
            continue;
        }

        let tag = small_int(instr)?;
        idx += 1;
        if tag == TAG_BODY {
            in_body = true;
            continue;
        }

        let value = push_data(instrs.get(idx)?)?;
        idx += 1;
        match tag {
            TAG_CONTENT_TYPE => envelope.content_type = Some(String::from_utf8_lossy(value).into_owned()),
            TAG_POINTER => envelope.pointer = Some(decode_le_uint(value)),
            TAG_PARENT => envelope.parent = Some(value.to_vec()),
            TAG_METADATA => envelope.metadata = Some(value.to_vec()),
            TAG_METAPROTOCOL => envelope.metaprotocol = Some(String::from_utf8_lossy(value).into_owned()),
            TAG_CONTENT_ENCODING => envelope.content_encoding = Some(String::from_utf8_lossy(value).into_owned()),
            TAG_DELEGATE => envelope.delegate = Some(value.to_vec()),
            TAG_RUNE => envelope.rune = Some(value.to_vec()),
            _ => {}
        }
    }

    envelope.body = body_chunks.concat();
    Some((envelope, idx))
}

fn decode_le_uint(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    for (i, b) in bytes.iter().take(8).enumerate() {
        buf[i] = *b;
    }
    u64::from_le_bytes(buf)
}
