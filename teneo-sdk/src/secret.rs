//! [`SecureSecret`]: an at-rest-encrypted holder for the signing scalar.
//!
//! The 32-byte scalar is never stored in the clear. At construction time we generate a
//! random per-instance ChaCha20-Poly1305 key and nonce, encrypt the scalar under them,
//! and immediately zeroize the caller-supplied plaintext and our own staging buffer.
//! The only long-lived representation is the ciphertext; decryption happens
//! transiently inside [`SecureSecret::expose`] and the plaintext is zeroized again
//! before the call returns.

use chacha20poly1305::{
    AeadCore, ChaCha20Poly1305, KeyInit,
    aead::{Aead, OsRng},
};
use secrecy::{ExposeSecret, SecretBox};
use teneo_types::SdkError;
use zeroize::Zeroize;

/// Ciphertext-at-rest wrapper around a 32-byte secp256k1 signing scalar.
pub struct SecureSecret {
    ciphertext: Vec<u8>,
    nonce: chacha20poly1305::Nonce,
    key: SecretBox<[u8; 32]>,
}

impl std::fmt::Debug for SecureSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureSecret").finish_non_exhaustive()
    }
}

impl SecureSecret {
    /// Encrypts `scalar` at rest. The input buffer is zeroized before returning.
    pub fn new(mut scalar: [u8; 32]) -> Self {
        let mut key_bytes = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut key_bytes);
        let cipher = ChaCha20Poly1305::new_from_slice(&key_bytes).expect("32-byte key");
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, scalar.as_ref())
            .expect("encryption under a freshly generated key cannot fail");
        scalar.zeroize();

        let secret = SecureSecret {
            ciphertext,
            nonce,
            key: SecretBox::new(Box::new(key_bytes)),
        };
        key_bytes.zeroize();
        secret
    }

    /// Decrypts the scalar, hands it to `f`, then zeroizes the plaintext before
    /// returning `f`'s result. This is the only place the plaintext scalar exists.
    pub(crate) fn expose<T>(
        &self,
        f: impl FnOnce(&[u8; 32]) -> T,
    ) -> Result<T, SdkError> {
        let cipher = ChaCha20Poly1305::new_from_slice(self.key.expose_secret())
            .expect("32-byte key");
        let mut plaintext = cipher
            .decrypt(&self.nonce, self.ciphertext.as_ref())
            .map_err(|_| SdkError::sdk("secret_decrypt_failed", "could not decrypt signing key"))?;
        let mut scalar: [u8; 32] = plaintext
            .as_slice()
            .try_into()
            .map_err(|_| SdkError::sdk("secret_malformed", "decrypted scalar has wrong length"))?;
        plaintext.zeroize();
        let result = f(&scalar);
        scalar.zeroize();
        Ok(result)
    }
}

impl Drop for SecureSecret {
    fn drop(&mut self) {
        self.ciphertext.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_without_leaking_the_original_buffer() {
        let scalar = [7u8; 32];
        let secret = SecureSecret::new(scalar);
        let recovered = secret.expose(|s| *s).unwrap();
        assert_eq!(recovered, [7u8; 32]);
    }

    #[test]
    fn two_instances_use_independent_keys() {
        let a = SecureSecret::new([1u8; 32]);
        let b = SecureSecret::new([1u8; 32]);
        assert_ne!(a.ciphertext, b.ciphertext);
    }
}
