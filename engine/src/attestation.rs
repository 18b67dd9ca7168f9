//! Verdict attestation: a secp256k1 personal-message signature over the
//! keccak-256 digest of the packed verdict tuple.
//!
//! Packed layout, no padding:
//!
//! ```text
//! case_hash (32) | feasibility (1) | innovation (1) | risk (1) | final (1) | short verdict (utf-8)
//! ```
//!
//! The digest is signed the way wallet `personal_sign` does it, so any
//! Ethereum tooling can recover the attestor from `(messageHash, signature)`.

use std::fmt;

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};
use thiserror::Error;

use jury_types::{Attestation, CaseText, Score, truncate_chars};

use crate::verdict::JuryScores;

/// Longest short verdict carried in the attested tuple, in characters.
pub const SHORT_VERDICT_CHARS: usize = 140;

const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";
const SECRET_KEY_BYTES: usize = 32;
const SIGNATURE_BYTES: usize = 65;
const RECOVERY_ID_OFFSET: u8 = 27;

#[derive(Debug, Error)]
pub enum AttestationError {
    #[error("{field} is not valid hex: {source}")]
    Hex {
        field: &'static str,
        #[source]
        source: hex::FromHexError,
    },
    #[error("attestation key must be 32 bytes, got {0}")]
    KeyLength(usize),
    #[error("attestation key is not a valid secp256k1 secret key")]
    InvalidKey(#[source] k256::ecdsa::Error),
    #[error("signing the verdict digest failed")]
    Signing(#[source] k256::ecdsa::Error),
    #[error("message hash must be 32 bytes, got {0}")]
    HashLength(usize),
    #[error("signature must be 65 bytes, got {0}")]
    SignatureLength(usize),
    #[error("signature recovery byte {0} is not 27 or 28")]
    RecoveryByte(u8),
    #[error("could not recover a public key from the signature")]
    Recovery(#[source] k256::ecdsa::Error),
}

fn decode_hex(field: &'static str, raw: &str) -> Result<Vec<u8>, AttestationError> {
    let raw = raw.trim();
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(digits).map_err(|source| AttestationError::Hex { field, source })
}

fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[must_use]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Digest a wallet produces for `personal_sign(message)`.
#[must_use]
pub fn personal_message_digest(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(PERSONAL_MESSAGE_PREFIX.as_bytes());
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// Keccak-256 of the trimmed case text.
#[must_use]
pub fn case_hash(case: &CaseText) -> [u8; 32] {
    keccak256(case.as_str().as_bytes())
}

/// EIP-55 mixed-case checksum encoding of a 20-byte address.
fn checksum_address(address: &[u8]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());

    let mut out = String::with_capacity(2 + lower.len());
    out.push_str("0x");
    for (i, ch) in lower.chars().enumerate() {
        let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
        if ch.is_ascii_alphabetic() && nibble >= 8 {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn address_of(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    checksum_address(&hash[12..])
}

// ============================================================================
// Key handle
// ============================================================================

/// The process signing key. Parsed once at startup, read-only afterwards.
#[derive(Clone)]
pub struct AttestationKey {
    signing_key: SigningKey,
    address: String,
}

impl fmt::Debug for AttestationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttestationKey")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl AttestationKey {
    /// Parse a 32-byte hex secret, `0x` prefix optional.
    pub fn from_hex(raw: &str) -> Result<Self, AttestationError> {
        let bytes = decode_hex("attestation key", raw)?;
        if bytes.len() != SECRET_KEY_BYTES {
            return Err(AttestationError::KeyLength(bytes.len()));
        }
        let signing_key = SigningKey::from_slice(&bytes).map_err(AttestationError::InvalidKey)?;
        let address = address_of(signing_key.verifying_key());
        Ok(Self {
            signing_key,
            address,
        })
    }

    /// Checksummed address identifying the attestor.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    fn sign_personal(&self, message: &[u8]) -> Result<[u8; SIGNATURE_BYTES], AttestationError> {
        let digest = personal_message_digest(message);
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(&digest)
            .map_err(AttestationError::Signing)?;

        let mut out = [0u8; SIGNATURE_BYTES];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = RECOVERY_ID_OFFSET + recovery_id.to_byte();
        Ok(out)
    }
}

// ============================================================================
// Payload
// ============================================================================

/// The tuple the verdict store records and the attestation binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerdictPayload {
    pub case_hash: [u8; 32],
    pub scores: JuryScores,
    pub final_score: Score,
    pub short_verdict: String,
}

impl VerdictPayload {
    /// The summary is cut to [`SHORT_VERDICT_CHARS`] characters.
    #[must_use]
    pub fn new(case_hash: [u8; 32], scores: JuryScores, final_score: Score, summary: &str) -> Self {
        Self {
            case_hash,
            scores,
            final_score,
            short_verdict: truncate_chars(summary, SHORT_VERDICT_CHARS).to_string(),
        }
    }

    #[must_use]
    pub fn packed(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 + 4 + self.short_verdict.len());
        out.extend_from_slice(&self.case_hash);
        out.push(self.scores.feasibility.get());
        out.push(self.scores.innovation.get());
        out.push(self.scores.risk.get());
        out.push(self.final_score.get());
        out.extend_from_slice(self.short_verdict.as_bytes());
        out
    }

    #[must_use]
    pub fn message_hash(&self) -> [u8; 32] {
        keccak256(&self.packed())
    }
}

// ============================================================================
// Signer
// ============================================================================

/// Signs verdict payloads, or does nothing when no key is configured.
#[derive(Debug, Clone, Default)]
pub struct AttestationSigner {
    key: Option<AttestationKey>,
}

impl AttestationSigner {
    #[must_use]
    pub fn new(key: Option<AttestationKey>) -> Self {
        Self { key }
    }

    /// A signer that never attests.
    #[must_use]
    pub fn disabled() -> Self {
        Self { key: None }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    #[must_use]
    pub fn attestor(&self) -> Option<&str> {
        self.key.as_ref().map(AttestationKey::address)
    }

    /// `Ok(None)` when attestation is disabled.
    pub fn sign(&self, payload: &VerdictPayload) -> Result<Option<Attestation>, AttestationError> {
        let Some(key) = &self.key else {
            return Ok(None);
        };

        let message_hash = payload.message_hash();
        let signature = key.sign_personal(&message_hash)?;

        Ok(Some(Attestation {
            attestor: key.address().to_string(),
            message_hash: encode_hex(&message_hash),
            signature: encode_hex(&signature),
        }))
    }
}

/// Recover the checksummed address that produced `signature` over `message_hash`.
pub fn recover_attestor(message_hash: &str, signature: &str) -> Result<String, AttestationError> {
    let hash = decode_hex("message hash", message_hash)?;
    if hash.len() != 32 {
        return Err(AttestationError::HashLength(hash.len()));
    }
    let bytes = decode_hex("signature", signature)?;
    if bytes.len() != SIGNATURE_BYTES {
        return Err(AttestationError::SignatureLength(bytes.len()));
    }

    let v = bytes[64];
    let recovery_id = v
        .checked_sub(RECOVERY_ID_OFFSET)
        .and_then(RecoveryId::from_byte)
        .ok_or(AttestationError::RecoveryByte(v))?;
    let signature = Signature::from_slice(&bytes[..64]).map_err(AttestationError::Recovery)?;

    let digest = personal_message_digest(&hash);
    let key = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)
        .map_err(AttestationError::Recovery)?;
    Ok(address_of(&key))
}
