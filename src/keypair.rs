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

//! Contains the secp256r1 key pair types used during activation

use crate::errors::InternalError;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::{CryptoRng, RngCore};
use std::fmt;

/// Wrapper around a secp256r1 secret scalar to enforce that it's a private
/// key.
///
/// Key hygiene: the inner [`p256::SecretKey`] wipes its scalar on drop
/// through its own drop implementation, so this wrapper carries no `Zeroize`
/// derive of its own ([`p256::SecretKey`] does not expose the `Zeroize`
/// trait to derive through). Dropping a `PrivateKey` therefore zeroes the
/// key material, matching the discipline of the 16-byte symmetric
/// [`SecretKey`](crate::kdf::SecretKey).
#[derive(Clone)]
pub struct PrivateKey(pub(crate) p256::SecretKey);

/// Wrapper around a secp256r1 point to enforce that it's a public key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(pub(crate) p256::PublicKey);

/// A device or server key pair on secp256r1
///
/// The private half is wiped on drop; see [`PrivateKey`] for how that is
/// delegated to the underlying scalar type. The public half is not secret
/// and is left untouched.
#[derive(Clone)]
pub struct KeyPair {
    pk: PublicKey,
    sk: PrivateKey,
}

impl KeyPair {
    /// The public key component
    pub fn public(&self) -> &PublicKey {
        &self.pk
    }

    /// The private key component
    pub fn private(&self) -> &PrivateKey {
        &self.sk
    }

    /// Generating a random key pair given a cryptographic rng
    pub fn generate_random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let sk = p256::SecretKey::random(rng);
        let pk = sk.public_key();
        Self {
            pk: PublicKey(pk),
            sk: PrivateKey(sk),
        }
    }

    /// Obtains a KeyPair from a slice representing the private scalar. At all
    /// times, the public component is rederived from the private one.
    pub fn from_private_key_bytes(input: &[u8]) -> Result<Self, InternalError> {
        let sk = PrivateKey::from_bytes(input)?;
        let pk = sk.public_key();
        Ok(Self { pk, sk })
    }
}

impl PrivateKey {
    /// Deserializes a private scalar, rejecting zero and out-of-range values.
    pub fn from_bytes(input: &[u8]) -> Result<Self, InternalError> {
        p256::SecretKey::from_slice(input)
            .map(PrivateKey)
            .map_err(|_| InternalError::InvalidKeyError)
    }

    /// The big-endian scalar bytes
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes().into()
    }

    /// Rederives the public key for this private key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.public_key())
    }
}

impl PublicKey {
    /// Deserializes a public key from its SEC1 encoding (compressed or
    /// uncompressed). This is meant to be applied on material provided
    /// through the network; off-curve and identity encodings are rejected.
    pub fn from_sec1_bytes(input: &[u8]) -> Result<Self, InternalError> {
        p256::PublicKey::from_sec1_bytes(input)
            .map(PublicKey)
            .map_err(|_| InternalError::PointError)
    }

    /// The SEC1 compressed point encoding, the form carried on the wire and
    /// hashed into activation fingerprints.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_encoded_point(true).as_bytes().to_vec()
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey")
            .field(&self.0.to_encoded_point(true))
            .finish()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair").field("pk", &self.pk).finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::test_strategies::uniform_keypair_strategy;
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_public_from_private(kp in uniform_keypair_strategy()) {
            prop_assert_eq!(&kp.private().public_key(), kp.public());
        }

        #[test]
        fn test_sec1_roundtrip(kp in uniform_keypair_strategy()) {
            let bytes = kp.public().to_bytes();
            prop_assert_eq!(bytes.len(), 33);
            let recovered = PublicKey::from_sec1_bytes(&bytes).unwrap();
            prop_assert_eq!(&recovered, kp.public());
        }

        #[test]
        fn test_private_key_bytes_roundtrip(kp in uniform_keypair_strategy()) {
            let sk_bytes = kp.private().to_bytes();
            let kp2 = KeyPair::from_private_key_bytes(&sk_bytes).unwrap();
            prop_assert_eq!(kp2.private().to_bytes(), sk_bytes);
            prop_assert_eq!(kp2.public(), kp.public());
        }
    }

    #[test]
    fn rejects_off_curve_material() {
        // compressed-point prefix with an x-coordinate that is not on the curve
        assert!(PublicKey::from_sec1_bytes(&[0x03; 33]).is_err());
        assert!(PublicKey::from_sec1_bytes(b"").is_err());
        assert!(PrivateKey::from_bytes(&[0u8; 32]).is_err());
    }
}
