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

//! Short-lived token digests for read-only request authentication
//!
//! A token is an `(id, secret)` pair issued to the client after an
//! authenticated request; the pair itself travels under the transport key
//! through the surrounding service. Authenticating with a token means
//! sending a fresh nonce, the current timestamp, and
//! `HMAC-SHA256(secret, nonce || '&' || timestamp)`.

use crate::errors::InternalError;
use crate::kdf::SecretKey;
use crate::primitives::{self, BLOCK_SIZE};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand_core::{CryptoRng, RngCore};
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// Separator between nonce and timestamp in the digest input.
const DIGEST_SEPARATOR: u8 = b'&';

/// Generates a random 16-byte token nonce.
pub fn generate_token_nonce<R: RngCore + CryptoRng>(rng: &mut R) -> [u8; BLOCK_SIZE] {
    primitives::random_bytes(rng)
}

/// Returns the current Unix time in milliseconds as ASCII decimal bytes,
/// the timestamp format carried in the token header.
pub fn generate_token_timestamp() -> Vec<u8> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    millis.to_string().into_bytes()
}

/// Computes the token digest: `HMAC-SHA256(secret, nonce || '&' || timestamp)`.
pub fn compute_token_digest(
    nonce: &[u8],
    timestamp: &[u8],
    token_secret: &SecretKey,
) -> Result<[u8; 32], InternalError> {
    let mut data = Vec::with_capacity(nonce.len() + 1 + timestamp.len());
    data.extend_from_slice(nonce);
    data.push(DIGEST_SEPARATOR);
    data.extend_from_slice(timestamp);
    primitives::hmac_sha256(token_secret.as_bytes(), &data)
}

/// Verifies a token digest by recomputation and constant-time comparison.
pub fn validate_token_digest(
    nonce: &[u8],
    timestamp: &[u8],
    token_secret: &SecretKey,
    digest: &[u8],
) -> Result<bool, InternalError> {
    let expected = compute_token_digest(nonce, timestamp, token_secret)?;
    Ok(expected.ct_eq(digest).into())
}

/// The fields of one `X-PowerAuth-Token` request header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenRequestHeader {
    /// Token identifier assigned by the server.
    pub token_id: Uuid,
    /// Digest over nonce and timestamp under the token secret.
    pub token_digest: [u8; 32],
    /// Client-generated nonce for this request.
    pub nonce: [u8; BLOCK_SIZE],
    /// ASCII decimal Unix milliseconds.
    pub timestamp: Vec<u8>,
    /// Protocol version announced by the client, e.g. `"3.0"`.
    pub version: String,
}

impl TokenRequestHeader {
    /// Builds the header for one request: fresh nonce, current timestamp,
    /// digest under the token secret.
    pub fn new<R: RngCore + CryptoRng>(
        rng: &mut R,
        token_id: Uuid,
        token_secret: &SecretKey,
        version: &str,
    ) -> Result<Self, InternalError> {
        let nonce = generate_token_nonce(rng);
        let timestamp = generate_token_timestamp();
        let token_digest = compute_token_digest(&nonce, &timestamp, token_secret)?;
        Ok(Self {
            token_id,
            token_digest,
            nonce,
            timestamp,
            version: version.to_string(),
        })
    }

    /// Renders the `X-PowerAuth-Token` header value, with binary fields in
    /// standard Base64 and the timestamp as a decimal string.
    pub fn header_value(&self) -> String {
        format!(
            "PowerAuth token_id=\"{}\" token_digest=\"{}\" nonce=\"{}\" timestamp=\"{}\" version=\"{}\"",
            self.token_id,
            BASE64.encode(self.token_digest),
            BASE64.encode(self.nonce),
            String::from_utf8_lossy(&self.timestamp),
            self.version,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn digest_known_answer() {
        let nonce = [0u8; 16];
        let secret = SecretKey::new([0xFF; 16]);
        let digest = compute_token_digest(&nonce, b"1700000000000", &secret).unwrap();
        assert_eq!(
            hex::encode(digest),
            "79d87147ba1ace6ba138947f5c20a45bf5df63fe6479f123e92b6f98a72dcad7"
        );
    }

    #[test]
    fn digest_validation_roundtrip() {
        let mut rng = OsRng;
        let secret = SecretKey::generate_random(&mut rng);
        let nonce = generate_token_nonce(&mut rng);
        let timestamp = generate_token_timestamp();
        let digest = compute_token_digest(&nonce, &timestamp, &secret).unwrap();
        assert!(validate_token_digest(&nonce, &timestamp, &secret, &digest).unwrap());
        assert!(!validate_token_digest(&nonce, b"1700000000001", &secret, &digest).unwrap());
        let other = SecretKey::generate_random(&mut rng);
        assert!(!validate_token_digest(&nonce, &timestamp, &other, &digest).unwrap());
    }

    #[test]
    fn timestamp_is_ascii_millis() {
        let timestamp = generate_token_timestamp();
        assert!(timestamp.iter().all(|b| b.is_ascii_digit()));
        // 13 digits covers 2001-09 through 2286-11
        assert_eq!(timestamp.len(), 13);
    }

    #[test]
    fn header_rendering() {
        let mut rng = OsRng;
        let secret = SecretKey::generate_random(&mut rng);
        let header =
            TokenRequestHeader::new(&mut rng, Uuid::new_v4(), &secret, "3.0").unwrap();
        let value = header.header_value();
        assert!(value.starts_with("PowerAuth token_id=\""));
        assert!(value.contains(" token_digest=\""));
        assert!(value.contains(" nonce=\""));
        assert!(value.ends_with("version=\"3.0\""));
    }
}
