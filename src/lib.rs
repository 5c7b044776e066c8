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

//! An implementation of the PowerAuth mobile activation and request-signing
//! cryptography
//!
//! # Overview
//!
//! PowerAuth binds a mobile device to a server through a one-time activation
//! ceremony and thereafter authenticates HTTP requests with symmetric-key
//! signatures, short-lived tokens, and an end-to-end encryption channel.
//! This crate implements the cryptographic core of both sides of the
//! protocol; transport, persistence, and user interaction belong to the
//! surrounding client and server applications.
//!
//! During activation the two parties exchange fresh secp256r1 public keys,
//! the server authenticating its half with an ECDSA signature under a
//! long-term master authority key. An ECDH agreement folded to 128 bits
//! yields the master secret, which expands into five named keys:
//!
//! | Key | Derivation index | Purpose |
//! |---|---|---|
//! | possession | 1 | signature factor held by the device |
//! | knowledge | 2 | signature factor derived from the user's PIN/password |
//! | biometry | 3 | signature factor gated by biometry |
//! | transport | 1000 | status blobs and counter seeds |
//! | vault encryption | 2000 | protecting the key vault |
//!
//! Request signatures combine one to three factor keys with a per-activation
//! counter into zero-padded 8-digit decimal components joined by `-`. Two
//! wire-compatible counter families exist: the current one walks a SHA-256
//! hash chain over an opaque 16-byte value, the legacy one increments a
//! 64-bit integer. Both advance by exactly one step per accepted signature
//! on both sides, which is what keeps client and server interoperable; the
//! [`counter`] module documents the discipline.
//!
//! The remaining modules cover the short-lived token digests ([`token`]),
//! the encrypted activation status blob ([`status`]), and the
//! encrypt-then-MAC channel used before an activation exists
//! ([`encryptor`]).
//!
//! # Example
//!
//! A complete activation followed by one signed request:
//!
//! ```
//! use powerauth_crypto::{
//!     compute_signature, verify_signature, ClientActivation, KeyPair, ServerActivation,
//! };
//! use rand::rngs::OsRng;
//!
//! let mut rng = OsRng;
//! // The long-term master authority key pair; its public half is
//! // provisioned into the mobile application ahead of time.
//! let master = KeyPair::generate_random(&mut rng);
//!
//! // The client generates its device key pair and sends the public key.
//! let client = ClientActivation::start(&mut rng);
//! let device_public_key = client.device_public_key();
//!
//! // The server answers with its public key, a signature over the
//! // activation fingerprint, and the sealed counter seed.
//! let (server, response) =
//!     ServerActivation::key_exchange(&mut rng, &device_public_key, master.private())?;
//!
//! // The client verifies the server's authenticity and derives the same
//! // keys, then confirms with a possession-factor signature.
//! let client = client.key_exchange(&response, master.public())?;
//! let (client_activation, confirmation) = client.confirm(b"activation-confirm")?;
//! let server_activation = server.confirm(b"activation-confirm", &confirmation)?;
//! assert_eq!(client_activation.keys, server_activation.keys);
//!
//! // Authenticated requests: sign under the chosen factor keys, verify
//! // server-side at the synchronized counter.
//! let data = b"POST&/pa/vault/unlock&bm9uY2U=&Ym9keQ==";
//! let keys = [client_activation.keys.possession.clone()];
//! let signature = compute_signature(data, &keys, &client_activation.counter)?;
//! assert!(verify_signature(data, &signature, &keys, &server_activation.counter)?);
//! # Ok::<(), powerauth_crypto::errors::ProtocolError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

// Error types
pub mod errors;

pub mod activation;
pub mod counter;
pub mod encryptor;
pub mod kdf;
pub mod keypair;
pub mod primitives;
pub mod signature;
pub mod status;
pub mod token;

mod serialization;

// Exports

pub use crate::activation::{
    activation_fingerprint, Activation, ActivationKeys, ClientActivation,
    ClientActivationKeyExchanged, ServerActivation, ServerKeyExchange,
};
pub use crate::counter::Counter;
pub use crate::encryptor::{NonPersonalizedEncryptedMessage, NonPersonalizedEncryptor};
pub use crate::kdf::{derive_secret_key_from_password, MasterSecretKey, SecretKey};
pub use crate::keypair::{KeyPair, PrivateKey, PublicKey};
pub use crate::signature::{
    compute_signature, compute_signature_for_ctr_data, verify_signature,
    verify_signature_for_ctr_data, SIGNATURE_LENGTH,
};
pub use crate::status::{ActivationStatus, ActivationStatusBlob};
pub use crate::token::{
    compute_token_digest, generate_token_nonce, generate_token_timestamp, validate_token_digest,
    TokenRequestHeader,
};
