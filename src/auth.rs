use sha2::{Digest, Sha256};

/// Session tokens come from the check-in workflow. Only their SHA-256 hex digest
/// is kept: it owns tracking sessions and keys persisted snapshots.
pub fn hash_session_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let out = hasher.finalize();
    hex::encode(out)
}
