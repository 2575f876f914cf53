use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Compute a SHA-256 digest of the provided data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute a SHA-256 digest and encode it as a lowercase hex string.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Compare two secrets in constant time.
///
/// Both secrets are hashed first, so the comparison doesn't depend on their lengths either.
pub fn secrets_match(expected: &[u8], provided: &[u8]) -> bool {
    sha256(expected).ct_eq(&sha256(provided)).into()
}
