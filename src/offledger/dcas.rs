//! Content-addressed keys for DCAS collections
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use sha2::{Digest, Sha256};

use crate::error::{PeerExtError, Result};

/// URL-safe base64 of the SHA-256 digest of `value`
pub fn cas_key(value: &[u8]) -> String {
    URL_SAFE.encode(Sha256::digest(value))
}

pub fn validate(key: &str, value: &[u8]) -> Result<()> {
    let expected = cas_key(value);
    if key != expected {
        return Err(PeerExtError::InvalidKey(format!(
            "key [{}] does not match the content hash [{}]",
            key, expected
        )));
    }
    Ok(())
}
