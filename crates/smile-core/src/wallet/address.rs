//! Synthetic address derivation and recovery phrases.
//!
//! Addresses are a one-way SHA-256 digest of the secret bytes rendered in the
//! chain's usual shape. They are placeholders, not real chain addresses.

use rand::seq::SliceRandom;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::types::ChainKind;

pub const SECRET_LEN: usize = 32;
pub const PHRASE_WORDS: usize = 12;

const BECH32_CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const BTC_BODY_LEN: usize = 39;

const WORDS: &[&str] = &[
    "abandon", "ability", "able", "about", "above", "absent", "absorb", "abstract",
    "absurd", "abuse", "access", "accident", "account", "accuse", "achieve", "acid",
    "acoustic", "acquire", "across", "act", "action", "actor", "actress", "actual",
    "adapt", "add", "addict", "address", "adjust", "admit", "adult", "advance",
    "advice", "aerobic", "affair", "afford", "afraid", "again", "age", "agent",
    "agree", "ahead", "aim", "air", "airport", "aisle", "alarm", "album",
];

/// Fresh random secret bytes.
pub fn random_secret() -> [u8; SECRET_LEN] {
    rand::thread_rng().gen()
}

/// Secret as stored (before sealing): `0x` + 64 hex.
pub fn secret_hex(secret: &[u8; SECRET_LEN]) -> String {
    format!("0x{}", hex::encode(secret))
}

pub fn derive_address(kind: ChainKind, secret: &[u8; SECRET_LEN]) -> String {
    let digest: [u8; 32] = Sha256::digest(secret).into();
    match kind {
        // 20 trailing bytes, like an EVM address
        ChainKind::Evm => format!("0x{}", hex::encode(&digest[12..])),
        ChainKind::Btc => format!("bc1{}", bech32_body(&digest, BTC_BODY_LEN)),
        ChainKind::Sol => {
            let mut bytes = digest;
            // High bit set keeps the base58 form at exactly 44 characters
            bytes[0] |= 0x80;
            bs58::encode(bytes).into_string()
        }
    }
}

/// Render `bytes` as 5-bit groups in the bech32 alphabet.
fn bech32_body(bytes: &[u8], len: usize) -> String {
    let mut out = String::with_capacity(len);
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    for byte in bytes {
        if out.len() >= len {
            break;
        }
        acc = (acc << 8) | u32::from(*byte);
        bits += 8;
        while bits >= 5 && out.len() < len {
            bits -= 5;
            let idx = ((acc >> bits) & 0x1f) as usize;
            out.push(BECH32_CHARSET[idx] as char);
        }
        acc &= (1 << bits) - 1;
    }
    out
}

/// Twelve words from the phrase list.
pub fn recovery_phrase() -> String {
    let mut rng = rand::thread_rng();
    (0..PHRASE_WORDS)
        .filter_map(|_| WORDS.choose(&mut rng).copied())
        .collect::<Vec<_>>()
        .join(" ")
}
