//! Deterministic failure fingerprints.
//!
//! The fingerprint is the first 8 hex chars of SHA-256 over the context
//! label followed by the normalized stack (or the message when there is no
//! stack, or the raw text for opaque failures). It is the dedup key for
//! stored records and the id shown to end users. Truncation to 32 bits makes
//! collisions possible (~1 in 4 billion per pair); they are not detected.

use crate::failure::Failure;
use crate::normalize::StackNormalizer;
use sha2::{Digest, Sha256};

pub const FINGERPRINT_LEN: usize = 8;

/// Fingerprint with the default normalizer.
pub fn fingerprint(failure: &Failure, context_label: &str) -> String {
    fingerprint_with(&StackNormalizer::default(), failure, context_label)
}

pub fn fingerprint_with(
    normalizer: &StackNormalizer,
    failure: &Failure,
    context_label: &str,
) -> String {
    let mut material = String::from(context_label);

    match failure {
        Failure::Fault { message, .. } => match failure.stack() {
            Some(stack) => material.push_str(&normalizer.normalize(stack)),
            None => material.push_str(message),
        },
        Failure::Expected { message } => material.push_str(message),
        Failure::Opaque { text } => material.push_str(text),
    }

    hash_signature(&material)
}

fn hash_signature(material: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(material.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..FINGERPRINT_LEN].to_string()
}
