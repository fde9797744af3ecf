//! Journal cryptography: account key material and chained entry encryption.
//!
//! Every journal gets its own key, derived from the account's derived key (or
//! opened from a shared-key envelope). Entry payloads are sealed with
//! ChaCha20-Poly1305 and bound to the uid of the previous entry, so replaying
//! entries out of order fails authentication.

mod chain;
mod digest;
mod keys;

pub use chain::ChainCrypto;
pub use keys::{open_journal_key, seal_journal_key, DerivedKey, KeyMaterial, KeyPair};

use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::{Error, Result};

/// Symmetric key length in bytes.
pub const KEY_LEN: usize = 32;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Expand `ikm` into `N` bytes of key material with HKDF-SHA256.
fn expand<const N: usize>(ikm: &[u8], salt: Option<&[u8]>, info: &[u8]) -> Result<[u8; N]> {
    let hkdf = Hkdf::<Sha256>::new(salt, ikm);
    let mut output = [0u8; N];
    hkdf.expand(info, &mut output)
        .map_err(|error| Error::Crypto(format!("HKDF expansion failed: {error}")))?;
    Ok(output)
}

/// Encrypt with a random nonce; output is `nonce || ciphertext`.
fn seal(key: &[u8; KEY_LEN], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|error| Error::Crypto(format!("Encryption failed: {error}")))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Reverse of [`seal`]. `None` means the data failed authentication.
fn open(key: &[u8; KEY_LEN], aad: &[u8], sealed: &[u8]) -> Option<Vec<u8>> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return None;
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .ok()
}
