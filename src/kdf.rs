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

//! Derivation of the named symmetric keys of the protocol
//!
//! Every key in the protocol is 128 bits. The master secret key is agreed
//! through ECDH and folded to 16 bytes; all other keys are derived from it
//! with one of two key derivation functions, both bit-reproducible:
//!
//! * the AES-index KDF, which encrypts the zero-padded big-endian index as a
//!   single AES block under the master key, and
//! * the HMAC-index KDF, which folds `HMAC-SHA256(key = master, data = index)`
//!   back to 16 bytes.
//!
//! The named keys use fixed indices: possession 1, knowledge 2, biometry 3,
//! transport 1000, vault encryption 2000. Rotating any of them requires a
//! new activation.

use crate::errors::InternalError;
use crate::keypair::{PrivateKey, PublicKey};
use crate::primitives::{self, BLOCK_SIZE};
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use rand_core::{CryptoRng, RngCore};
use std::fmt;
use std::ops::Deref;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Derivation index of the possession-factor signature key.
pub const POSSESSION_KEY_INDEX: u64 = 1;
/// Derivation index of the knowledge-factor signature key.
pub const KNOWLEDGE_KEY_INDEX: u64 = 2;
/// Derivation index of the biometry-factor signature key.
pub const BIOMETRY_KEY_INDEX: u64 = 3;
/// Derivation index of the transport key.
pub const TRANSPORT_KEY_INDEX: u64 = 1000;
/// Derivation index of the vault encryption key.
pub const VAULT_KEY_INDEX: u64 = 2000;

/// A 128-bit symmetric key. The key material is zeroed on drop and compared
/// in constant time.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; BLOCK_SIZE]);

impl SecretKey {
    /// Length of every symmetric key in the protocol, in bytes.
    pub const LEN: usize = BLOCK_SIZE;

    /// Wraps raw key material.
    pub fn new(bytes: [u8; BLOCK_SIZE]) -> Self {
        Self(bytes)
    }

    /// Builds a key from a slice, rejecting any length other than 16.
    pub fn from_bytes(input: &[u8]) -> Result<Self, InternalError> {
        let checked = crate::errors::utils::check_slice_size(input, Self::LEN, "secret key")?;
        let mut bytes = [0u8; BLOCK_SIZE];
        bytes.copy_from_slice(checked);
        Ok(Self(bytes))
    }

    /// Generates a fresh random key.
    pub fn generate_random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self(primitives::random_bytes(rng))
    }

    /// The raw key bytes
    pub fn as_bytes(&self) -> &[u8; BLOCK_SIZE] {
        &self.0
    }

    /// Derives a subkey with the AES-index KDF: the index is padded from the
    /// left with zeros to 16 bytes and encrypted as one AES block under this
    /// key. One block with a zero IV, so CBC and ECB coincide.
    pub fn derive(&self, index: u64) -> SecretKey {
        let mut bytes = [0u8; BLOCK_SIZE];
        bytes[8..].copy_from_slice(&index.to_be_bytes());
        let cipher = Aes128::new((&self.0).into());
        let mut block = GenericArray::from(bytes);
        cipher.encrypt_block(&mut block);
        SecretKey(block.into())
    }

    /// Derives a subkey with the HMAC-index KDF:
    /// `xor_fold(HMAC-SHA256(key = self, data = index))`.
    pub fn derive_hmac(&self, index: &[u8]) -> Result<SecretKey, InternalError> {
        let digest = primitives::hmac_sha256(&self.0, index)?;
        Ok(SecretKey(primitives::xor_fold(&digest)?))
    }
}

/// Stretches a UTF-8 password and salt into a symmetric key with
/// PBKDF2-HMAC-SHA-1 (10,000 iterations).
pub fn derive_secret_key_from_password(password: &str, salt: &[u8]) -> SecretKey {
    SecretKey(primitives::pbkdf2_hmac_sha1(password, salt))
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for SecretKey {}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// The master secret key of an activation, agreed through ECDH and held only
/// transiently while the named keys are expanded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MasterSecretKey(SecretKey);

impl MasterSecretKey {
    /// Computes the master secret from an ECDH agreement: the 32-byte raw
    /// shared secret folded to 16 bytes. Both sides of the activation arrive
    /// at the same value from their own private key and the peer's public
    /// key.
    pub fn agree(private: &PrivateKey, public: &PublicKey) -> Result<Self, InternalError> {
        let shared = primitives::ecdh_shared_secret(private, public);
        Ok(Self(SecretKey(primitives::xor_fold(&shared)?)))
    }

    /// Wraps an existing 16-byte master secret.
    pub fn from_bytes(input: &[u8]) -> Result<Self, InternalError> {
        Ok(Self(SecretKey::from_bytes(input)?))
    }

    /// The possession-factor signature key, index 1.
    pub fn signature_possession_key(&self) -> SecretKey {
        self.derive(POSSESSION_KEY_INDEX)
    }

    /// The knowledge-factor signature key, index 2.
    pub fn signature_knowledge_key(&self) -> SecretKey {
        self.derive(KNOWLEDGE_KEY_INDEX)
    }

    /// The biometry-factor signature key, index 3.
    pub fn signature_biometry_key(&self) -> SecretKey {
        self.derive(BIOMETRY_KEY_INDEX)
    }

    /// The transport key, index 1000.
    pub fn transport_key(&self) -> SecretKey {
        self.derive(TRANSPORT_KEY_INDEX)
    }

    /// The vault encryption key, index 2000.
    pub fn vault_encryption_key(&self) -> SecretKey {
        self.derive(VAULT_KEY_INDEX)
    }
}

impl Deref for MasterSecretKey {
    type Target = SecretKey;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::test_strategies::uniform_keypair_strategy;
    use proptest::prelude::*;

    fn fixed_master() -> MasterSecretKey {
        MasterSecretKey::from_bytes(&hex::decode("00112233445566778899aabbccddeeff").unwrap())
            .unwrap()
    }

    #[test]
    fn aes_index_kdf_known_answers() {
        let master = fixed_master();
        let expected = [
            (POSSESSION_KEY_INDEX, "84d4c9c08b4f482861e3a9c6c35bc4d9"),
            (KNOWLEDGE_KEY_INDEX, "1df927374513bfd49f436bd73f325285"),
            (BIOMETRY_KEY_INDEX, "daef4ff7e13d46a6dbcb1c024e725387"),
            (TRANSPORT_KEY_INDEX, "38e95820473ba09b2e35020def8ce6c3"),
            (VAULT_KEY_INDEX, "c7331024b68836c602f5fe74b382178a"),
        ];
        for (index, hex_key) in expected {
            assert_eq!(hex::encode(master.derive(index).as_bytes()), hex_key);
        }
    }

    #[test]
    fn hmac_index_kdf_known_answer() {
        let master = fixed_master();
        let index = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let derived = master.derive_hmac(&index).unwrap();
        assert_eq!(
            hex::encode(derived.as_bytes()),
            "ceb9fb2300088d9734c00b2c2a3661e7"
        );
    }

    #[test]
    fn derivation_is_deterministic() {
        let master = fixed_master();
        assert_eq!(master.derive(1), master.derive(1));
        let index = [0x5au8; 16];
        assert_eq!(
            master.derive_hmac(&index).unwrap(),
            master.derive_hmac(&index).unwrap()
        );
    }

    #[test]
    fn secret_key_rejects_wrong_length() {
        assert!(SecretKey::from_bytes(&[0u8; 15]).is_err());
        assert!(SecretKey::from_bytes(&[0u8; 17]).is_err());
    }

    proptest! {
        #[test]
        fn ecdh_agreement_is_symmetric(
            kp1 in uniform_keypair_strategy(),
            kp2 in uniform_keypair_strategy()
        ) {
            let ms1 = MasterSecretKey::agree(kp1.private(), kp2.public()).unwrap();
            let ms2 = MasterSecretKey::agree(kp2.private(), kp1.public()).unwrap();
            prop_assert_eq!(ms1.as_bytes(), ms2.as_bytes());
        }
    }
}
