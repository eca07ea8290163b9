//! Request token generation.
//!
//! Journal rows carry a request token so callers can correlate a
//! movement with the API request that caused it. Callers may supply
//! their own; otherwise one is generated here.

use rand::RngCore;

/// Prefix for generated tokens.
const TOKEN_PREFIX: &str = "req_";

/// Generate a request token: `req_` followed by 16 hex characters.
pub fn generate() -> String {
    let mut bytes = [0u8; 8];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    format!("{TOKEN_PREFIX}{}", hex::encode(bytes))
}
