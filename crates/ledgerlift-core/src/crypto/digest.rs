//! HMAC helpers used to derive and verify entry uids.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

fn keyed(key: &[u8], parts: &[&[u8]]) -> Result<HmacSha256> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|error| Error::Crypto(format!("Invalid MAC key: {error}")))?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac)
}

/// Hex-encoded HMAC-SHA256 over the concatenated parts.
pub(super) fn digest_hex(key: &[u8], parts: &[&[u8]]) -> Result<String> {
    Ok(hex::encode(keyed(key, parts)?.finalize().into_bytes()))
}

/// Constant-time check of `expected` against the HMAC of `parts`.
pub(super) fn verify(key: &[u8], parts: &[&[u8]], expected: &[u8]) -> Result<bool> {
    Ok(keyed(key, parts)?.verify_slice(expected).is_ok())
}
