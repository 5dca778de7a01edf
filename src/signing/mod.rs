//! Signature Services
//!
//! Four signing standards, each with matching verification: BIP-137
//! (Bitcoin), Stacks plain-text, SIP-018 structured data, and BIP-340
//! Schnorr (taproot key-path). Verify functions are side-effect-free and
//! never touch the session. Also hosts the Clarity value codec, which
//! both SIP-018 and the Stacks Tx Builder depend on.

pub mod bip137;
pub mod clarity_value;
pub mod schnorr_sig;
pub mod sip018;
pub mod stacks_message;

pub use clarity_value::ClarityValue;
