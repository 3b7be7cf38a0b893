//! Access-link payload encryption
//!
//! Link payloads are canonically encoded (unescaped), encrypted with the
//! service's RSA public key under PKCS#1 v1.5 padding, and base64 encoded.
//! The service key is read from `assets/link_public_key.pem` at build time or
//! supplied through configuration. Without either, construction fails.

use base64::Engine;
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};

use crate::encoding::{canonical_encode, FieldMapping};
use crate::error::{GateKeyError, Result};

/// PEM of the link public key bundled with the crate
pub const EMBEDDED_PUBLIC_KEY_PEM: &str = include_str!("../assets/link_public_key.pem");

/// PKCS#1 v1.5 padding overhead in bytes
const PKCS1_PADDING_LEN: usize = 11;

/// Encrypts link payloads with the service public key
#[derive(Debug, Clone)]
pub struct LinkEncryptor {
    key: RsaPublicKey,
}

impl LinkEncryptor {
    /// Encryptor over the bundled key; fails when the asset is empty
    pub fn embedded() -> Result<Self> {
        Self::from_pem(EMBEDDED_PUBLIC_KEY_PEM)
    }

    /// Parse an SPKI (`PUBLIC KEY`) or PKCS#1 (`RSA PUBLIC KEY`) PEM.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let pem = pem.trim();
        if pem.is_empty() {
            return Err(GateKeyError::Encryption("public key is missing".into()));
        }

        let key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| GateKeyError::Encryption(format!("invalid public key: {}", e)))?;

        Ok(Self { key })
    }

    /// Largest plaintext one block can carry
    pub fn max_plaintext_len(&self) -> usize {
        self.key.size().saturating_sub(PKCS1_PADDING_LEN)
    }

    /// Encrypt raw bytes and base64 the ciphertext
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        if plaintext.len() > self.max_plaintext_len() {
            return Err(GateKeyError::Encryption(format!(
                "payload of {} bytes exceeds the {}-byte key limit",
                plaintext.len(),
                self.max_plaintext_len()
            )));
        }

        let ciphertext = self.key.encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)?;
        Ok(base64::engine::general_purpose::STANDARD.encode(ciphertext))
    }

    /// Canonically encode a mapping and encrypt it
    pub fn encrypt_link(&self, mapping: &FieldMapping) -> Result<String> {
        self.encrypt(canonical_encode(mapping).as_bytes())
    }
}

#[cfg(test)]
pub(crate) mod test_key {
    use rand::rngs::OsRng;
    use rsa::pkcs8::{EncodePublicKey, LineEnding};
    use rsa::RsaPrivateKey;
    use std::sync::OnceLock;

    static KEY: OnceLock<(RsaPrivateKey, String)> = OnceLock::new();

    fn pair() -> &'static (RsaPrivateKey, String) {
        KEY.get_or_init(|| {
            let private = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
            let public = private
                .to_public_key()
                .to_public_key_pem(LineEnding::LF)
                .unwrap();
            (private, public)
        })
    }

    /// Runtime-generated key shared by the unit tests
    pub(crate) fn private_key() -> &'static RsaPrivateKey {
        &pair().0
    }

    pub(crate) fn public_pem() -> String {
        pair().1.clone()
    }
}
