//! [`SignatureOracle`]: address derivation, signing, and verification.
//!
//! Signing uses the standard Ethereum personal-message prefix
//! (`"\x19Ethereum Signed Message:\n" + len(message) + message`), which is exactly
//! what `alloy`'s [`Signer::sign_message`] implements for a local secp256k1 key. This
//! mirrors how the teacher repo constructs its wallet signer
//! (`alloy::signers::local::PrivateKeySigner`) from a raw scalar.

use std::str::FromStr;

use alloy::primitives::{Address, Signature};
use alloy::signers::{Signer as _, local::PrivateKeySigner};
use teneo_types::SdkError;

use crate::secret::SecureSecret;

/// Derives an address, signs, and verifies messages on behalf of a held secp256k1
/// key.
///
/// The plaintext scalar is touched only inside [`SignatureOracle::sign`]; the address
/// is cached at construction since deriving it requires the same transient decrypt.
pub struct SignatureOracle {
    secret: SecureSecret,
    address: Address,
}

impl SignatureOracle {
    /// Builds an oracle from an encrypted secret, deriving (and caching) its address.
    pub fn new(secret: SecureSecret) -> Result<Self, SdkError> {
        let address = secret.expose(|scalar| {
            let signer = PrivateKeySigner::from_slice(scalar)
                .map_err(|e| SdkError::sdk("invalid_signing_key", e.to_string()))?;
            Ok::<_, SdkError>(signer.address())
        })??;
        Ok(SignatureOracle { secret, address })
    }

    /// The address derived from the held key.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Signs `message` (UTF-8) under the Ethereum personal-message scheme, returning
    /// a `0x`-prefixed hex signature.
    pub async fn sign(&self, message: &str) -> Result<String, SdkError> {
        let signer = self.secret.expose(|scalar| {
            PrivateKeySigner::from_slice(scalar)
                .map_err(|e| SdkError::sdk("invalid_signing_key", e.to_string()))
        })??;
        let signature = signer
            .sign_message(message.as_bytes())
            .await
            .map_err(|e| SdkError::Authentication(format!("sign failure: {e}")))?;
        Ok(format!("0x{}", alloy::hex::encode(signature.as_bytes())))
    }

    /// Verifies that `signature_hex` is a valid Ethereum personal-message signature
    /// over `message` by `expected_address`.
    pub fn verify(message: &str, signature_hex: &str, expected_address: &str) -> bool {
        let Ok(expected) = Address::from_str(expected_address) else {
            return false;
        };
        let Ok(signature) = Signature::from_str(signature_hex.trim_start_matches("0x"))
            .or_else(|_| Signature::from_str(signature_hex))
        else {
            return false;
        };
        match signature.recover_address_from_msg(message.as_bytes()) {
            Ok(recovered) => recovered == expected,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle() -> SignatureOracle {
        let signer = PrivateKeySigner::random();
        let scalar: [u8; 32] = signer.to_bytes().into();
        SignatureOracle::new(SecureSecret::new(scalar)).unwrap()
    }

    #[tokio::test]
    async fn signs_then_verifies_with_declared_address() {
        let oracle = oracle();
        let msg = "Teneo authentication challenge: abc123";
        let sig = oracle.sign(msg).await.unwrap();
        assert!(SignatureOracle::verify(
            msg,
            &sig,
            &oracle.address().to_string()
        ));
    }

    #[tokio::test]
    async fn fails_verification_for_a_different_address() {
        let oracle = oracle();
        let other = PrivateKeySigner::random();
        let msg = "Teneo authentication challenge: abc123";
        let sig = oracle.sign(msg).await.unwrap();
        assert!(!SignatureOracle::verify(
            msg,
            &sig,
            &other.address().to_string()
        ));
    }
}
