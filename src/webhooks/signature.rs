//! GitHub webhook signature verification.
//!
//! GitHub signs webhook payloads with an HMAC over the raw body using a shared
//! secret. The signature arrives as `<algorithm>=<hex>`: `sha256=...` in
//! `X-Hub-Signature-256`, and `sha1=...` in the legacy `X-Hub-Signature`.
//!
//! Verification must run over the exact bytes received. Re-serializing a
//! decoded body changes whitespace and key order and invalidates the signature.

use std::fmt;

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use thiserror::Error;

use crate::error::ErrorKind;

/// Hash algorithms accepted in a signature header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl SignatureAlgorithm {
    /// Every approved algorithm.
    pub const ALL: [SignatureAlgorithm; 5] = [
        SignatureAlgorithm::Sha1,
        SignatureAlgorithm::Sha224,
        SignatureAlgorithm::Sha256,
        SignatureAlgorithm::Sha384,
        SignatureAlgorithm::Sha512,
    ];

    /// Looks up an algorithm by its exact (lowercase) header name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|algorithm| algorithm.name() == name)
    }

    /// The name used in signature headers.
    pub fn name(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha1 => "sha1",
            SignatureAlgorithm::Sha224 => "sha224",
            SignatureAlgorithm::Sha256 => "sha256",
            SignatureAlgorithm::Sha384 => "sha384",
            SignatureAlgorithm::Sha512 => "sha512",
        }
    }

    /// Digest length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            SignatureAlgorithm::Sha1 => 20,
            SignatureAlgorithm::Sha224 => 28,
            SignatureAlgorithm::Sha256 => 32,
            SignatureAlgorithm::Sha384 => 48,
            SignatureAlgorithm::Sha512 => 64,
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reasons a signature is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// The header is not `algorithm=hexdigest`.
    #[error("malformed signature header: {0}")]
    MalformedHeader(&'static str),

    /// The named algorithm is not approved.
    #[error("hash algorithm \"{0}\" is not supported")]
    UnsupportedAlgorithm(String),

    /// The digest does not match the body.
    #[error("signature does not match payload")]
    Mismatch,
}

impl SignatureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SignatureError::MalformedHeader(_) => ErrorKind::MalformedHeader,
            SignatureError::UnsupportedAlgorithm(_) => ErrorKind::UnsupportedAlgorithm,
            SignatureError::Mismatch => ErrorKind::SignatureMismatch,
        }
    }
}

/// Parses a signature header (e.g., "sha256=abc123...") into an algorithm and
/// raw digest bytes.
///
/// The algorithm is checked before the digest, so an unapproved algorithm is
/// reported as such even when the digest is also garbage. Names are matched
/// exactly, so `SHA256` is unapproved. GitHub sends lowercase hex and the
/// digest is compared as text: uppercase hex is a mismatch. Never panics.
///
/// # Examples
///
/// ```
/// use ticket_bridge::webhooks::{SignatureAlgorithm, SignatureError, parse_signature_header};
///
/// let (algorithm, digest) = parse_signature_header("sha1=abcd1234").unwrap();
/// assert_eq!(algorithm, SignatureAlgorithm::Sha1);
/// assert_eq!(digest, vec![0xab, 0xcd, 0x12, 0x34]);
///
/// assert!(matches!(
///     parse_signature_header("md5=abcd"),
///     Err(SignatureError::UnsupportedAlgorithm(_))
/// ));
/// assert!(matches!(
///     parse_signature_header("abcd1234"),
///     Err(SignatureError::MalformedHeader(_))
/// ));
/// ```
pub fn parse_signature_header(
    header: &str,
) -> Result<(SignatureAlgorithm, Vec<u8>), SignatureError> {
    let (name, hex_sig) = header
        .split_once('=')
        .ok_or(SignatureError::MalformedHeader("expected <algorithm>=<hexdigest>"))?;

    if name.is_empty() {
        return Err(SignatureError::MalformedHeader("empty algorithm name"));
    }

    let algorithm = SignatureAlgorithm::from_name(name)
        .ok_or_else(|| SignatureError::UnsupportedAlgorithm(name.to_string()))?;

    let digest = hex::decode(hex_sig)
        .map_err(|_| SignatureError::MalformedHeader("digest is not valid hex"))?;

    if hex_sig.bytes().any(|b| b.is_ascii_uppercase()) {
        return Err(SignatureError::Mismatch);
    }

    Ok((algorithm, digest))
}

/// Computes the HMAC of a payload with the given algorithm and secret.
///
/// This is useful for testing purposes (generating expected signatures).
pub fn compute_signature(algorithm: SignatureAlgorithm, payload: &[u8], secret: &[u8]) -> Vec<u8> {
    match algorithm {
        SignatureAlgorithm::Sha1 => mac_bytes::<Hmac<Sha1>>(payload, secret),
        SignatureAlgorithm::Sha224 => mac_bytes::<Hmac<Sha224>>(payload, secret),
        SignatureAlgorithm::Sha256 => mac_bytes::<Hmac<Sha256>>(payload, secret),
        SignatureAlgorithm::Sha384 => mac_bytes::<Hmac<Sha384>>(payload, secret),
        SignatureAlgorithm::Sha512 => mac_bytes::<Hmac<Sha512>>(payload, secret),
    }
}

/// Formats a signature as a GitHub-style header value: `<algorithm>=<hex>`.
pub fn format_signature_header(algorithm: SignatureAlgorithm, signature: &[u8]) -> String {
    format!("{}={}", algorithm.name(), hex::encode(signature))
}

/// Verifies a GitHub webhook signature against the payload and secret.
///
/// Uses the MAC's constant-time comparison, so the time taken does not depend
/// on how many leading digest bytes match.
///
/// # Arguments
///
/// * `payload` - The raw webhook payload bytes, exactly as received
/// * `signature_header` - The signature header value (e.g., "sha1=...")
/// * `secret` - The webhook secret configured in GitHub
///
/// # Examples
///
/// ```
/// use ticket_bridge::webhooks::{
///     SignatureAlgorithm, SignatureError, compute_signature, format_signature_header,
///     verify_signature,
/// };
///
/// let payload = b"Hello, World!";
/// let secret = b"my-secret-key";
///
/// let sig = compute_signature(SignatureAlgorithm::Sha256, payload, secret);
/// let header = format_signature_header(SignatureAlgorithm::Sha256, &sig);
///
/// assert_eq!(verify_signature(payload, &header, secret), Ok(()));
/// assert_eq!(
///     verify_signature(payload, &header, b"wrong-secret"),
///     Err(SignatureError::Mismatch)
/// );
/// ```
pub fn verify_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &[u8],
) -> Result<(), SignatureError> {
    let (algorithm, expected) = parse_signature_header(signature_header)?;

    let verified = match algorithm {
        SignatureAlgorithm::Sha1 => mac_verify::<Hmac<Sha1>>(payload, secret, &expected),
        SignatureAlgorithm::Sha224 => mac_verify::<Hmac<Sha224>>(payload, secret, &expected),
        SignatureAlgorithm::Sha256 => mac_verify::<Hmac<Sha256>>(payload, secret, &expected),
        SignatureAlgorithm::Sha384 => mac_verify::<Hmac<Sha384>>(payload, secret, &expected),
        SignatureAlgorithm::Sha512 => mac_verify::<Hmac<Sha512>>(payload, secret, &expected),
    };

    if verified {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

fn keyed<M: Mac + KeyInit>(payload: &[u8], secret: &[u8]) -> M {
    let mut mac =
        <M as KeyInit>::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac
}

fn mac_bytes<M: Mac + KeyInit>(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    keyed::<M>(payload, secret).finalize().into_bytes().to_vec()
}

fn mac_verify<M: Mac + KeyInit>(payload: &[u8], secret: &[u8], expected: &[u8]) -> bool {
    keyed::<M>(payload, secret).verify_slice(expected).is_ok()
}
