//! Name and key-strength validation.

use crate::error::ValidationError;
use crate::keys::PublicKey;

/// Longest accepted environment or key name, in bytes.
pub const MAX_NAME_LEN: usize = 64;

/// Smallest accepted RSA modulus.
pub const MIN_RSA_BITS: usize = 2048;

/// Largest accepted RSA modulus; the `rsa` crate refuses to decode anything
/// bigger, so a larger key could be registered but never read back.
pub const MAX_RSA_BITS: usize = 4096;

/// Validate an environment or key name.
///
/// Names become file names, so this also rules out path traversal:
/// - non-empty, at most [`MAX_NAME_LEN`] bytes
/// - only ASCII letters, digits, `.`, `_`, `-`
/// - no leading `.` or `-` (which also excludes `.` and `..`)
pub fn validate_name(candidate: &str) -> Result<(), ValidationError> {
    let first = candidate.chars().next().ok_or(ValidationError::EmptyName)?;

    if candidate.len() > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong {
            len: candidate.len(),
            max: MAX_NAME_LEN,
        });
    }

    if let Some(bad) = candidate
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(ValidationError::InvalidCharacter(bad));
    }

    if matches!(first, '.' | '-') {
        return Err(ValidationError::InvalidLeadingCharacter(first));
    }

    Ok(())
}

/// Accept Ed25519, and RSA between [`MIN_RSA_BITS`] and [`MAX_RSA_BITS`].
pub fn validate_public_key_strength(key: &PublicKey) -> Result<(), ValidationError> {
    validate_rsa_bits(key, MIN_RSA_BITS)
}

/// Strength check with a caller-chosen RSA floor.
pub fn validate_rsa_bits(key: &PublicKey, min_bits: usize) -> Result<(), ValidationError> {
    match key.rsa_bits() {
        Some(bits) if bits < min_bits => Err(ValidationError::WeakRsaKey {
            bits,
            min: min_bits,
        }),
        Some(bits) if bits > MAX_RSA_BITS => Err(ValidationError::OversizedRsaKey {
            bits,
            max: MAX_RSA_BITS,
        }),
        _ => Ok(()),
    }
}
