//! Toy XOR cipher for pedagogical mode.
//!
//! NOT ENCRYPTION. Each byte is XORed with the key and IV bytes at the same
//! position, both repeated cyclically. There is no authentication and a
//! single known plaintext reveals the keystream. It exists so the hybrid demo
//! can run end to end on a host without a real provider, and it sits behind
//! the same [`SymmetricCipher`] interface as the real AEAD so the two can
//! never be confused at the type level.

use std::future::Future;

use crate::{error::ProviderError, provider::SymmetricCipher};

/// Repeating-key XOR.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToyCipher;

impl ToyCipher {
    /// XOR `data` with the repeated key and IV.
    ///
    /// Encryption and decryption are the same operation.
    pub fn apply(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, ProviderError> {
        if key.is_empty() {
            return Err(ProviderError::InvalidKeyLength { expected: 1, actual: 0 });
        }
        if iv.is_empty() {
            return Err(ProviderError::InvalidIvLength { expected: 1, actual: 0 });
        }

        Ok(data
            .iter()
            .enumerate()
            .map(|(i, byte)| byte ^ key[i % key.len()] ^ iv[i % iv.len()])
            .collect())
    }
}

impl SymmetricCipher for ToyCipher {
    fn label(&self) -> &'static str {
        "toy-xor (NOT SECURE)"
    }

    fn encrypt(
        &self,
        key: &[u8],
        iv: &[u8],
        plaintext: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send {
        std::future::ready(Self::apply(key, iv, plaintext))
    }

    fn decrypt(
        &self,
        key: &[u8],
        iv: &[u8],
        ciphertext: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send {
        std::future::ready(Self::apply(key, iv, ciphertext))
    }
}
