//! Nonce signing with RSASSA-PKCS1-v1_5 / SHA-256
//!
//! The key is imported from PKCS#8 DER (the output of [`crate::pkcs::prepare_key`])
//! and never exported again. The decoded DER is zeroized once imported.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rsa::{
    pkcs1v15::SigningKey,
    pkcs8::DecodePrivateKey,
    signature::{SignatureEncoding, Signer},
    RsaPrivateKey,
};
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

/// Signing primitive errors
#[derive(Debug, Error)]
pub enum SignError {
    #[error("Prepared key is not valid base64: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("Key import failed: {0}")]
    KeyImportError(String),
}

/// Non-extractable RSA signing key for authentication nonces
pub struct NonceSigner {
    key: SigningKey<Sha256>,
}

impl NonceSigner {
    /// Import a PKCS#8 DER private key.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, SignError> {
        let private_key = RsaPrivateKey::from_pkcs8_der(der)
            .map_err(|e| SignError::KeyImportError(e.to_string()))?;
        Ok(Self {
            key: SigningKey::<Sha256>::new(private_key),
        })
    }

    /// Import a base64-encoded PKCS#8 DER private key.
    pub fn from_pkcs8_base64(prepared_key: &str) -> Result<Self, SignError> {
        let der = Zeroizing::new(BASE64.decode(prepared_key)?);
        Self::from_pkcs8_der(&der)
    }

    /// Raw signature bytes over `message`
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.key.sign(message).to_vec()
    }

    /// Sign the UTF-8 bytes of a nonce and base64 encode the signature.
    pub fn sign_nonce(&self, nonce: &str) -> String {
        BASE64.encode(self.sign(nonce.as_bytes()))
    }
}

impl std::fmt::Debug for NonceSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceSigner").finish_non_exhaustive()
    }
}
