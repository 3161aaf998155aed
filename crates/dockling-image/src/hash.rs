//! Content digest computation and verification.
//!
//! Validates that downloaded blobs hash to the digest they were requested by.

use sha2::{Digest, Sha256, Sha512};

use crate::error::RegistryFailure;
use crate::manifest::LayerDigest;

/// Computes the `sha256:<hex>` digest of `bytes`.
#[must_use]
pub fn sha256_digest(bytes: &[u8]) -> LayerDigest {
    LayerDigest::from_computed(format!("sha256:{:x}", Sha256::digest(bytes)))
}

/// Checks that `bytes` hash to `expected`.
///
/// `sha256` and `sha512` digests are verified; content addressed with any
/// other algorithm is accepted unverified.
///
/// # Errors
///
/// Returns [`RegistryFailure::DigestMismatch`] if the hashes differ.
pub fn verify_digest(expected: &LayerDigest, bytes: &[u8]) -> Result<(), RegistryFailure> {
    let actual = match expected.algorithm() {
        "sha256" => format!("{:x}", Sha256::digest(bytes)),
        "sha512" => format!("{:x}", Sha512::digest(bytes)),
        other => {
            tracing::warn!(algorithm = other, digest = %expected, "unsupported digest algorithm, skipping verification");
            return Ok(());
        }
    };

    if actual.eq_ignore_ascii_case(expected.hex()) {
        tracing::debug!(digest = %expected, "digest verified");
        Ok(())
    } else {
        Err(RegistryFailure::DigestMismatch {
            expected: expected.to_string(),
            actual: format!("{}:{actual}", expected.algorithm()),
        })
    }
}
