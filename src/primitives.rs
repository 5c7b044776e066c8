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

//! Named wrappers over the fixed cryptographic primitives of the protocol
//!
//! Every algorithm choice here is part of the wire contract: SHA-256,
//! HMAC-SHA-256, AES-128-CBC with either PKCS#7 or no padding,
//! PBKDF2-HMAC-SHA-1 with 10,000 iterations, and ECDH / ECDSA over
//! secp256r1. All operations are pure; randomness is always supplied by the
//! caller through a [`CryptoRng`] so that no process-wide generator is ever
//! consulted.

use crate::errors::InternalError;
use crate::keypair::{PrivateKey, PublicKey};
use aes::cipher::block_padding::{NoPadding, Pkcs7};
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes128;
use hmac::{Hmac, Mac};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use pbkdf2::pbkdf2_hmac_array;
use rand_core::{CryptoRng, RngCore};
use sha1::Sha1;
use sha2::{Digest, Sha256};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// The AES block size, which is also the length of every symmetric key,
/// counter materialization, and derivation index in the protocol.
pub const BLOCK_SIZE: usize = 16;

/// Number of PBKDF2 iterations used when stretching a password into a key.
pub const PBKDF2_ITERATIONS: u32 = 10_000;

/// Padding discipline for an AES-CBC call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Padding {
    /// PKCS#7 padding, used for variable-length data.
    Pkcs7,
    /// No padding; the data must already be block aligned. Used for the
    /// single-block key derivation and the status blob.
    None,
}

/// Fills a fixed-size array with cryptographically strong random bytes.
pub fn random_bytes<R: RngCore + CryptoRng, const N: usize>(rng: &mut R) -> [u8; N] {
    let mut bytes = [0u8; N];
    rng.fill_bytes(&mut bytes);
    bytes
}

/// Draws `len` cryptographically strong random bytes for callers whose
/// length is only known at run time.
pub fn random_vec<R: RngCore + CryptoRng>(rng: &mut R, len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rng.fill_bytes(&mut bytes);
    bytes
}

/// Computes the SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Computes HMAC-SHA-256 of `data` under `key`. Any key length is accepted.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32], InternalError> {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(key).map_err(|_| InternalError::InvalidKeyError)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

/// Encrypts `plaintext` with AES-128-CBC under the given key and IV.
///
/// With [`Padding::None`] the plaintext length must be a multiple of the
/// block size, otherwise the call fails before touching the cipher.
pub fn aes128_cbc_encrypt(
    plaintext: &[u8],
    iv: &[u8; BLOCK_SIZE],
    key: &[u8; BLOCK_SIZE],
    padding: Padding,
) -> Result<Vec<u8>, InternalError> {
    let cipher = Aes128CbcEnc::new(key.into(), iv.into());
    match padding {
        Padding::Pkcs7 => Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
        Padding::None => {
            if plaintext.len() % BLOCK_SIZE != 0 {
                return Err(InternalError::BlockAlignmentError);
            }
            Ok(cipher.encrypt_padded_vec_mut::<NoPadding>(plaintext))
        }
    }
}

/// Decrypts an AES-128-CBC ciphertext.
///
/// A malformed ciphertext or bad padding surfaces as an undifferentiated
/// [`InternalError::CryptoFailureError`] so that callers cannot be turned
/// into a padding oracle.
pub fn aes128_cbc_decrypt(
    ciphertext: &[u8],
    iv: &[u8; BLOCK_SIZE],
    key: &[u8; BLOCK_SIZE],
    padding: Padding,
) -> Result<Vec<u8>, InternalError> {
    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(InternalError::CryptoFailureError);
    }
    let cipher = Aes128CbcDec::new(key.into(), iv.into());
    match padding {
        Padding::Pkcs7 => cipher
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| InternalError::CryptoFailureError),
        Padding::None => cipher
            .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
            .map_err(|_| InternalError::CryptoFailureError),
    }
}

/// Computes the raw ECDH shared secret, the 32-byte x-coordinate of the
/// agreed point on secp256r1.
pub fn ecdh_shared_secret(private: &PrivateKey, public: &PublicKey) -> [u8; 32] {
    let shared = p256::ecdh::diffie_hellman(private.0.to_nonzero_scalar(), public.0.as_affine());
    (*shared.raw_secret_bytes()).into()
}

/// Signs `data` with ECDSA over SHA-256, returning the ASN.1 DER encoding
/// used on the wire.
pub fn ecdsa_sign(private: &PrivateKey, data: &[u8]) -> Vec<u8> {
    let signing_key = SigningKey::from(&private.0);
    let signature: Signature = signing_key.sign(data);
    signature.to_der().as_bytes().to_vec()
}

/// Verifies a DER-encoded ECDSA signature over `data`. An undecodable
/// signature simply fails verification.
pub fn ecdsa_verify(public: &PublicKey, data: &[u8], signature_der: &[u8]) -> bool {
    let Ok(signature) = Signature::from_der(signature_der) else {
        return false;
    };
    VerifyingKey::from(&public.0).verify(data, &signature).is_ok()
}

/// Stretches a UTF-8 password into a 128-bit key with PBKDF2-HMAC-SHA-1.
pub fn pbkdf2_hmac_sha1(password: &str, salt: &[u8]) -> [u8; BLOCK_SIZE] {
    pbkdf2_hmac_array::<Sha1, BLOCK_SIZE>(password.as_bytes(), salt, PBKDF2_ITERATIONS)
}

/// Folds a 32-byte value to 16 bytes by xoring its halves byte by byte.
pub fn xor_fold(bytes: &[u8]) -> Result<[u8; BLOCK_SIZE], InternalError> {
    let checked = crate::errors::utils::check_slice_size(bytes, 32, "xor_fold input")?;
    let mut folded = [0u8; BLOCK_SIZE];
    for (i, out) in folded.iter_mut().enumerate() {
        *out = checked[i] ^ checked[i + BLOCK_SIZE];
    }
    Ok(folded)
}
