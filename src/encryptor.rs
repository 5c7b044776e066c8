// PowerAuth Crypto Library
// Copyright 2016 Wultra s.r.o.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Encrypt-then-MAC channel for messages sent before an activation exists
//!
//! The legacy end-to-end channel derives a one-shot encryption key and MAC
//! key from a session secret using two freshly drawn 16-byte indexes, which
//! must differ so the two keys cannot collapse into one. Encryption is
//! AES-128-CBC under a random nonce IV with PKCS#7 padding; the MAC is
//! HMAC-SHA256 over the ciphertext and is always checked, in constant time,
//! before any decryption is attempted.

use crate::errors::{InternalError, ProtocolError};
use crate::kdf::SecretKey;
use crate::primitives::{self, Padding, BLOCK_SIZE};
use rand_core::{CryptoRng, RngCore};
use subtle::ConstantTimeEq;

/// Bound on redraws of the MAC index before the random source is declared
/// broken.
const MAX_ATTEMPT_COUNT: usize = 1000;

/// One encrypted message of the non-personalized channel. All binary fields
/// are standard Base64 on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct NonPersonalizedEncryptedMessage {
    /// Identifier of the calling application.
    #[cfg_attr(feature = "serde", serde(with = "crate::serialization::base64_bytes"))]
    pub application_key: Vec<u8>,
    /// Index of the session the message belongs to.
    #[cfg_attr(feature = "serde", serde(with = "crate::serialization::base64_bytes"))]
    pub session_index: Vec<u8>,
    /// Per-message index deriving the encryption key.
    #[cfg_attr(feature = "serde", serde(with = "crate::serialization::base64_bytes"))]
    pub ad_hoc_index: Vec<u8>,
    /// Per-message index deriving the MAC key.
    #[cfg_attr(feature = "serde", serde(with = "crate::serialization::base64_bytes"))]
    pub mac_index: Vec<u8>,
    /// IV for the CBC encryption.
    #[cfg_attr(feature = "serde", serde(with = "crate::serialization::base64_bytes"))]
    pub nonce: Vec<u8>,
    /// Ephemeral public key the session secret was agreed under.
    #[cfg_attr(feature = "serde", serde(with = "crate::serialization::base64_bytes"))]
    pub ephemeral_public_key: Vec<u8>,
    /// The CBC ciphertext.
    #[cfg_attr(feature = "serde", serde(with = "crate::serialization::base64_bytes"))]
    pub encrypted_data: Vec<u8>,
    /// HMAC-SHA256 over `encrypted_data`.
    #[cfg_attr(feature = "serde", serde(with = "crate::serialization::base64_bytes"))]
    pub mac: Vec<u8>,
}

/// Encrypts and decrypts non-personalized messages for one session.
pub struct NonPersonalizedEncryptor {
    application_key: Vec<u8>,
    session_index: [u8; BLOCK_SIZE],
    session_related_secret_key: SecretKey,
    ephemeral_public_key: Vec<u8>,
}

impl NonPersonalizedEncryptor {
    /// Creates an encryptor from the session parameters agreed with the
    /// server.
    pub fn new(
        application_key: Vec<u8>,
        session_related_secret_key: SecretKey,
        session_index: [u8; BLOCK_SIZE],
        ephemeral_public_key: Vec<u8>,
    ) -> Self {
        Self {
            application_key,
            session_index,
            session_related_secret_key,
            ephemeral_public_key,
        }
    }

    /// Encrypts `original_data` into a one-shot message.
    pub fn encrypt<R: RngCore + CryptoRng>(
        &self,
        original_data: &[u8],
        rng: &mut R,
    ) -> Result<NonPersonalizedEncryptedMessage, ProtocolError> {
        let ad_hoc_index: [u8; BLOCK_SIZE] = primitives::random_bytes(rng);
        let mut mac_index: [u8; BLOCK_SIZE] = primitives::random_bytes(rng);

        // the two indexes must differ; a bounded redraw also catches a stuck
        // random source
        let mut attempt_count = 0;
        while ad_hoc_index == mac_index {
            mac_index = primitives::random_bytes(rng);
            attempt_count += 1;
            if attempt_count >= MAX_ATTEMPT_COUNT {
                return Err(InternalError::RngExhaustionError.into());
            }
        }

        let nonce: [u8; BLOCK_SIZE] = primitives::random_bytes(rng);

        let encryption_key = self.session_related_secret_key.derive_hmac(&ad_hoc_index)?;
        let mac_key = self.session_related_secret_key.derive_hmac(&mac_index)?;

        let encrypted_data = primitives::aes128_cbc_encrypt(
            original_data,
            &nonce,
            encryption_key.as_bytes(),
            Padding::Pkcs7,
        )?;
        let mac = primitives::hmac_sha256(mac_key.as_bytes(), &encrypted_data)?;

        Ok(NonPersonalizedEncryptedMessage {
            application_key: self.application_key.clone(),
            session_index: self.session_index.to_vec(),
            ad_hoc_index: ad_hoc_index.to_vec(),
            mac_index: mac_index.to_vec(),
            nonce: nonce.to_vec(),
            ephemeral_public_key: self.ephemeral_public_key.clone(),
            encrypted_data,
            mac: mac.to_vec(),
        })
    }

    /// Validates and decrypts a received message.
    ///
    /// The index and nonce lengths, the index distinctness, and the MAC are
    /// all checked before decryption; any failure is terminal for the call.
    pub fn decrypt(
        &self,
        message: &NonPersonalizedEncryptedMessage,
    ) -> Result<Vec<u8>, ProtocolError> {
        let ad_hoc_index: [u8; BLOCK_SIZE] = message
            .ad_hoc_index
            .as_slice()
            .try_into()
            .map_err(|_| ProtocolError::InvalidMessageError)?;
        let mac_index: [u8; BLOCK_SIZE] = message
            .mac_index
            .as_slice()
            .try_into()
            .map_err(|_| ProtocolError::InvalidMessageError)?;
        let nonce: [u8; BLOCK_SIZE] = message
            .nonce
            .as_slice()
            .try_into()
            .map_err(|_| ProtocolError::InvalidMessageError)?;
        if ad_hoc_index == mac_index {
            return Err(ProtocolError::InvalidMessageError);
        }

        let encryption_key = self.session_related_secret_key.derive_hmac(&ad_hoc_index)?;
        let mac_key = self.session_related_secret_key.derive_hmac(&mac_index)?;

        let expected_mac = primitives::hmac_sha256(mac_key.as_bytes(), &message.encrypted_data)?;
        if !bool::from(expected_mac.ct_eq(&message.mac)) {
            return Err(ProtocolError::MacMismatchError);
        }

        primitives::aes128_cbc_decrypt(
            &message.encrypted_data,
            &nonce,
            encryption_key.as_bytes(),
            Padding::Pkcs7,
        )
        .map_err(ProtocolError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn encryptor() -> NonPersonalizedEncryptor {
        NonPersonalizedEncryptor::new(
            b"app-key".to_vec(),
            SecretKey::new([0x33; 16]),
            [0x44; 16],
            vec![0x02; 33],
        )
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let mut rng = OsRng;
        let encryptor = encryptor();
        let message = encryptor.encrypt(b"status request payload", &mut rng).unwrap();
        assert_ne!(message.ad_hoc_index, message.mac_index);
        assert_eq!(message.encrypted_data.len() % BLOCK_SIZE, 0);
        let recovered = encryptor.decrypt(&message).unwrap();
        assert_eq!(recovered, b"status request payload");
    }

    #[test]
    fn equal_indexes_are_rejected() {
        let mut rng = OsRng;
        let encryptor = encryptor();
        let mut message = encryptor.encrypt(b"payload", &mut rng).unwrap();
        message.mac_index = message.ad_hoc_index.clone();
        assert!(matches!(
            encryptor.decrypt(&message),
            Err(ProtocolError::InvalidMessageError)
        ));
    }

    #[test]
    fn malformed_lengths_are_rejected() {
        let mut rng = OsRng;
        let encryptor = encryptor();
        let good = encryptor.encrypt(b"payload", &mut rng).unwrap();

        let mut short_index = good.clone();
        short_index.ad_hoc_index.truncate(15);
        assert!(matches!(
            encryptor.decrypt(&short_index),
            Err(ProtocolError::InvalidMessageError)
        ));

        let mut short_nonce = good;
        short_nonce.nonce.truncate(8);
        assert!(matches!(
            encryptor.decrypt(&short_nonce),
            Err(ProtocolError::InvalidMessageError)
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_the_mac() {
        let mut rng = OsRng;
        let encryptor = encryptor();
        let mut message = encryptor.encrypt(b"payload", &mut rng).unwrap();
        message.encrypted_data[0] ^= 0x01;
        assert!(matches!(
            encryptor.decrypt(&message),
            Err(ProtocolError::MacMismatchError)
        ));
    }

    #[test]
    fn tampered_mac_fails() {
        let mut rng = OsRng;
        let encryptor = encryptor();
        let mut message = encryptor.encrypt(b"payload", &mut rng).unwrap();
        let last = message.mac.len() - 1;
        message.mac[last] ^= 0x80;
        assert!(matches!(
            encryptor.decrypt(&message),
            Err(ProtocolError::MacMismatchError)
        ));
    }
}
