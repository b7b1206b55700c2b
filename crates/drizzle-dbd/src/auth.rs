//! Password scrambles for the handshake.
//!
//! - `mysql_native_password`:
//!   `SHA1(password) XOR SHA1(seed + SHA1(SHA1(password)))`
//! - `caching_sha2_password` (fast path only):
//!   `SHA256(password) XOR SHA256(SHA256(SHA256(password)) + seed)`
//!
//! Full `caching_sha2_password` authentication needs TLS or an RSA
//! exchange, neither of which the driver speaks.

use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Authentication plugin names.
pub mod plugins {
    pub const MYSQL_NATIVE_PASSWORD: &str = "mysql_native_password";
    pub const CACHING_SHA2_PASSWORD: &str = "caching_sha2_password";
    pub const MYSQL_CLEAR_PASSWORD: &str = "mysql_clear_password";
}

/// Status bytes of the caching_sha2_password exchange.
pub mod caching_sha2 {
    pub const FAST_AUTH_SUCCESS: u8 = 0x03;
    pub const PERFORM_FULL_AUTH: u8 = 0x04;
}

/// The server scramble without its trailing NUL, capped at 20 bytes.
fn seed(auth_data: &[u8]) -> &[u8] {
    let data = auth_data.strip_suffix(&[0]).unwrap_or(auth_data);
    &data[..data.len().min(20)]
}

fn xor<const N: usize>(a: [u8; N], b: [u8; N]) -> Vec<u8> {
    a.iter().zip(b).map(|(x, y)| x ^ y).collect()
}

/// 20-byte `mysql_native_password` response; empty for an empty password.
pub fn mysql_native_password(password: &str, auth_data: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }
    let stage1: [u8; 20] = Sha1::digest(password.as_bytes()).into();
    let stage2: [u8; 20] = Sha1::digest(stage1).into();
    let mut hasher = Sha1::new();
    hasher.update(seed(auth_data));
    hasher.update(stage2);
    xor(stage1, hasher.finalize().into())
}

/// 32-byte `caching_sha2_password` fast-path response; empty for an empty
/// password.
pub fn caching_sha2_password(password: &str, auth_data: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }
    let hash: [u8; 32] = Sha256::digest(password.as_bytes()).into();
    let hash_hash: [u8; 32] = Sha256::digest(hash).into();
    let mut hasher = Sha256::new();
    hasher.update(hash_hash);
    hasher.update(seed(auth_data));
    xor(hash, hasher.finalize().into())
}

/// Response for `plugin`, falling back to the native scramble for plugins
/// the driver does not know.
pub fn auth_response(plugin: &str, password: &str, auth_data: &[u8]) -> Vec<u8> {
    match plugin {
        plugins::CACHING_SHA2_PASSWORD => caching_sha2_password(password, auth_data),
        plugins::MYSQL_CLEAR_PASSWORD => {
            let mut out = password.as_bytes().to_vec();
            out.push(0);
            out
        }
        _ => mysql_native_password(password, auth_data),
    }
}
