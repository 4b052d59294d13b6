//! Password hashing.
//!
//! bcrypt digests embed their own salt and cost, so verification needs no
//! side channel and digests for the same password never repeat.

use anyhow::{Context, Result};

/// Fixed bcrypt work factor.
const WORK_FACTOR: u32 = 10;

/// Hashes a plaintext password.
///
/// # Errors
///
/// Fails only when the underlying RNG is unavailable.
pub(crate) fn hash(plaintext: &str) -> Result<String> {
    bcrypt::hash(plaintext, WORK_FACTOR).context("failed to hash password")
}

/// Verifies a plaintext password against a stored digest.
///
/// Fails closed: a malformed digest verifies as false rather than erroring.
#[must_use]
pub(crate) fn verify(plaintext: &str, digest: &str) -> bool {
    bcrypt::verify(plaintext, digest).unwrap_or(false)
}
