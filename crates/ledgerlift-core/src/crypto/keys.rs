//! Account key material: derived key, X25519 key pair, and journal key sharing.

use std::fmt;

use curve25519_dalek::montgomery::MontgomeryPoint;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::{expand, open, seal, KEY_LEN};
use crate::error::{Error, Result};
use crate::models::UserInfo;

const USER_INFO_LABEL: &str = "ledgerlift:user-info";
const KEY_SHARE_LABEL: &[u8] = b"ledgerlift:journal-key-share:v1";

/// Master key derived from the user's encryption password by the auth layer.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_LEN]);

impl DerivedKey {
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(value: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            hex::decode(value.trim())
                .map_err(|_| Error::InvalidInput("derived key must be hex encoded".into()))?,
        );
        let bytes: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            Error::InvalidInput(format!("derived key must be {KEY_LEN} bytes"))
        })?;
        Ok(Self(bytes))
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("DerivedKey([REDACTED])")
    }
}

/// X25519 key pair used to open journal keys shared with the account.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    secret: [u8; KEY_LEN],
    #[zeroize(skip)]
    public: [u8; KEY_LEN],
}

impl KeyPair {
    #[must_use]
    pub fn generate() -> Self {
        let mut secret = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut secret);
        Self::from_secret(secret)
    }

    #[must_use]
    pub fn from_secret(secret: [u8; KEY_LEN]) -> Self {
        let public = MontgomeryPoint::mul_base_clamped(secret).to_bytes();
        Self { secret, public }
    }

    #[must_use]
    pub const fn public_key(&self) -> [u8; KEY_LEN] {
        self.public
    }

    fn diffie_hellman(&self, their_public: &[u8; KEY_LEN]) -> Zeroizing<[u8; KEY_LEN]> {
        Zeroizing::new(MontgomeryPoint(*their_public).mul_clamped(self.secret).to_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("KeyPair")
            .field("secret", &"[REDACTED]")
            .field("public", &hex::encode(self.public))
            .finish()
    }
}

/// Verified account keys, ready to open journals.
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    owner: String,
    derived_key: DerivedKey,
    key_pair: KeyPair,
}

impl KeyMaterial {
    /// Open the account key pair stored in `user_info`.
    ///
    /// This is the password check: a derived key that cannot open the record,
    /// or that opens a key pair not matching the published public key, is an
    /// [`Error::Authentication`].
    pub fn unlock(derived_key: DerivedKey, user_info: &UserInfo) -> Result<Self> {
        let key = user_info_key(&derived_key, user_info.owner.as_bytes(), user_info.version)?;
        let secret = open(&key, user_info.owner.as_bytes(), &user_info.content)
            .map(Zeroizing::new)
            .ok_or_else(|| Error::Authentication("account key material failed to decrypt".into()))?;
        let secret: [u8; KEY_LEN] = secret.as_slice().try_into().map_err(|_| {
            Error::Authentication("account key material has an unexpected length".into())
        })?;

        let key_pair = KeyPair::from_secret(secret);
        if key_pair.public_key().as_slice() != user_info.public_key.as_slice() {
            return Err(Error::Authentication(
                "account key pair does not match its public key".into(),
            ));
        }

        Ok(Self {
            owner: user_info.owner.clone(),
            derived_key,
            key_pair,
        })
    }

    /// Build the encrypted user-info record for an account.
    pub fn seal_user_info(
        derived_key: &DerivedKey,
        owner: &str,
        version: u8,
        key_pair: &KeyPair,
    ) -> Result<UserInfo> {
        let key = user_info_key(derived_key, owner.as_bytes(), version)?;
        Ok(UserInfo {
            owner: owner.to_string(),
            version,
            public_key: key_pair.public_key().to_vec(),
            content: seal(&key, owner.as_bytes(), &key_pair.secret)?,
        })
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub const fn derived_key(&self) -> &DerivedKey {
        &self.derived_key
    }

    #[must_use]
    pub const fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }
}

fn user_info_key(
    derived_key: &DerivedKey,
    owner: &[u8],
    version: u8,
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let info = format!("{USER_INFO_LABEL}:v{version}");
    expand(derived_key.as_bytes(), Some(owner), info.as_bytes()).map(Zeroizing::new)
}

fn share_key(
    shared_secret: &[u8; KEY_LEN],
    sender_public: &[u8; KEY_LEN],
    recipient_public: &[u8; KEY_LEN],
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let mut salt = Vec::with_capacity(2 * KEY_LEN);
    salt.extend_from_slice(sender_public);
    salt.extend_from_slice(recipient_public);
    expand(shared_secret, Some(&salt), KEY_SHARE_LABEL).map(Zeroizing::new)
}

/// Seal a journal key for `recipient_public`.
///
/// Output layout: `sender_public(32) || nonce(12) || ciphertext`.
pub fn seal_journal_key(
    sender: &KeyPair,
    recipient_public: &[u8; KEY_LEN],
    journal_key: &[u8; KEY_LEN],
) -> Result<Vec<u8>> {
    let sender_public = sender.public_key();
    let shared = sender.diffie_hellman(recipient_public);
    let wrap_key = share_key(&shared, &sender_public, recipient_public)?;

    let sealed = seal(&wrap_key, &sender_public, journal_key)?;
    let mut envelope = Vec::with_capacity(KEY_LEN + sealed.len());
    envelope.extend_from_slice(&sender_public);
    envelope.extend_from_slice(&sealed);
    Ok(envelope)
}

/// Open a journal key sealed by [`seal_journal_key`].
pub fn open_journal_key(
    recipient: &KeyPair,
    envelope: &[u8],
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    if envelope.len() <= KEY_LEN {
        return Err(Error::Crypto("shared journal key envelope is too short".into()));
    }
    let (sender_public, sealed) = envelope.split_at(KEY_LEN);
    let sender_public: [u8; KEY_LEN] = sender_public
        .try_into()
        .map_err(|_| Error::Crypto("invalid sender public key".into()))?;

    let shared = recipient.diffie_hellman(&sender_public);
    let wrap_key = share_key(&shared, &sender_public, &recipient.public_key())?;
    let journal_key = open(&wrap_key, &sender_public, sealed)
        .map(Zeroizing::new)
        .ok_or_else(|| Error::Crypto("shared journal key could not be opened".into()))?;

    let journal_key: [u8; KEY_LEN] = journal_key
        .as_slice()
        .try_into()
        .map_err(|_| Error::Crypto("shared journal key has an unexpected length".into()))?;
    Ok(Zeroizing::new(journal_key))
}
