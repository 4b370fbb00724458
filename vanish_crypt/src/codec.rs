//! Passphrase-based authenticated encryption of payloads
//!
//! A sealed payload is laid out as `nonce || ciphertext || tag` under AES-256-GCM. The key
//! is the SHA3-256 digest of the passphrase. Any failure to open a payload is reported as
//! [`Error::Crypto`] without detail, so a wrong passphrase and tampered bytes are
//! indistinguishable to the caller.

use crate::secure_buffer::sec_bytes::SecBytes;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::Aes256Gcm;
use rand::RngCore;
use sha3::{Digest, Sha3_256};
use vanish_types::errors::Error;
use zeroize::{Zeroize, Zeroizing};

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
/// Bytes added to every payload by [`encrypt`]
pub const CIPHERTEXT_OVERHEAD: usize = NONCE_LEN + TAG_LEN;

/// Derives the symmetric key for a passphrase. The result is wiped when dropped
pub fn derive_key(passphrase: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    let mut hasher = Sha3_256::new();
    hasher.update(passphrase);
    hasher.finalize_into(GenericArray::from_mut_slice(&mut key[..]));
    key
}

/// Seals `plaintext` under `passphrase` with a fresh random nonce
pub fn encrypt(plaintext: &[u8], passphrase: &[u8]) -> Result<Vec<u8>, Error> {
    let key = derive_key(passphrase);
    let cipher = Aes256Gcm::new(GenericArray::from_slice(&key[..]));

    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng()
        .try_fill_bytes(&mut nonce)
        .map_err(|err| Error::resource(format!("Unable to generate a nonce: {err}")))?;

    let mut sealed = Vec::with_capacity(plaintext.len() + CIPHERTEXT_OVERHEAD);
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(plaintext);

    let body = &mut sealed[NONCE_LEN..];
    match cipher.encrypt_in_place_detached(GenericArray::from_slice(&nonce), &[], body) {
        Ok(tag) => {
            sealed.extend_from_slice(&tag);
            Ok(sealed)
        }

        Err(_) => {
            // the buffer still holds a plaintext copy
            sealed.zeroize();
            Err(Error::Crypto)
        }
    }
}

/// Opens a payload produced by [`encrypt`]. Plaintext is only returned once the tag has
/// been verified, and is pinned and scrubbed on drop
pub fn decrypt(ciphertext: &[u8], passphrase: &[u8]) -> Result<SecBytes, Error> {
    if ciphertext.len() < CIPHERTEXT_OVERHEAD {
        return Err(Error::Crypto);
    }

    let (nonce, rest) = ciphertext.split_at(NONCE_LEN);
    let (body, tag) = rest.split_at(rest.len() - TAG_LEN);

    let key = derive_key(passphrase);
    let cipher = Aes256Gcm::new(GenericArray::from_slice(&key[..]));

    let mut plaintext = SecBytes::from(body);
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(nonce),
            &[],
            plaintext.as_mut(),
            GenericArray::from_slice(tag),
        )
        .map_err(|_| Error::Crypto)?;

    Ok(plaintext)
}
