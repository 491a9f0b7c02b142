//! Random token generation

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};

/// Byte length of generated session ids (256 bits of entropy)
pub const SESSION_ID_BYTES: usize = 32;

/// Byte length of generated JTIs (128 bits of entropy)
pub const JTI_BYTES: usize = 16;

/// Generate a URL-safe random token with `bytes` bytes of entropy.
///
/// Backed by the OS CSPRNG; suitable for session ids and JTIs.
pub fn secure_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

pub(crate) fn chrono_ttl(ttl: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX)
}
