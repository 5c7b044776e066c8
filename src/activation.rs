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

//! The activation ceremony binding a device key pair to a server key pair
//!
//! The ceremony is a short handshake. The client generates a fresh device
//! key pair and sends its public key (together with an activation code the
//! surrounding service validates; the code never enters the cryptographic
//! core). The server generates its own ephemeral key pair and answers with
//! its public key, an ECDSA signature over the activation fingerprint
//! `device_public ‖ server_public` under the long-term master authority key,
//! and the hash-chain counter seed sealed under the transport key. Both
//! sides then agree on the master secret through ECDH, expand the five named
//! keys, and the client proves possession with a one-factor confirmation
//! signature.
//!
//! Every step consumes the in-progress state, so a failed exchange discards
//! all partial material. Structural violations of the handshake (a malformed
//! peer key, a missing or unexpected counter seed) surface as
//! [`ProtocolError::HandshakeError`]; a fingerprint or confirmation
//! signature that fails to verify surfaces as
//! [`ProtocolError::SignatureMismatchError`]. The master secret itself lives
//! only inside [`ActivationKeys::derive`] and is dropped once the named keys
//! exist.
//!
//! Persistence of the device key pair (in the device secure store) and of
//! the server-side record belongs to the caller; the accessors on the
//! intermediate states expose what must be stored.

use crate::counter::Counter;
use crate::errors::ProtocolError;
use crate::kdf::{MasterSecretKey, SecretKey};
use crate::keypair::{KeyPair, PrivateKey, PublicKey};
use crate::primitives::{self, Padding, BLOCK_SIZE};
use crate::signature::{compute_signature, verify_signature};
use rand_core::{CryptoRng, RngCore};

/// The five named symmetric keys expanded from the master secret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivationKeys {
    /// Possession-factor signature key.
    pub possession: SecretKey,
    /// Knowledge-factor signature key.
    pub knowledge: SecretKey,
    /// Biometry-factor signature key.
    pub biometry: SecretKey,
    /// Transport key protecting status blobs and counter seeds.
    pub transport: SecretKey,
    /// Vault encryption key.
    pub vault: SecretKey,
}

impl ActivationKeys {
    /// Expands the named keys from a master secret. The master secret is not
    /// retained; callers should let it drop right after this call.
    pub fn derive(master: &MasterSecretKey) -> Self {
        Self {
            possession: master.signature_possession_key(),
            knowledge: master.signature_knowledge_key(),
            biometry: master.signature_biometry_key(),
            transport: master.transport_key(),
            vault: master.vault_encryption_key(),
        }
    }
}

/// An established activation: the named keys plus the synchronized counter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Activation {
    /// The named symmetric keys of this activation.
    pub keys: ActivationKeys,
    /// Counter material, advanced once per accepted signature.
    pub counter: Counter,
}

/// The server's answer to the client's key exchange request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerKeyExchange {
    /// SEC1 encoding of the server's ephemeral public key.
    pub server_public_key: Vec<u8>,
    /// DER ECDSA signature over the activation fingerprint under the master
    /// authority key.
    pub server_signature: Vec<u8>,
    /// Hash-chain counter seed sealed under the transport key. Absent only
    /// in the legacy flow, where counters start at zero.
    pub encrypted_ctr_data: Option<Vec<u8>>,
}

/// Client side of the ceremony after the device key pair was generated.
pub struct ClientActivation {
    device: KeyPair,
}

impl ClientActivation {
    /// Starts an activation by generating a fresh device key pair.
    pub fn start<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self {
            device: KeyPair::generate_random(rng),
        }
    }

    /// The SEC1 encoding of the device public key, sent to the server.
    pub fn device_public_key(&self) -> Vec<u8> {
        self.device.public().to_bytes()
    }

    /// The device key pair, for the caller to place in the device secure
    /// store before completing the ceremony.
    pub fn device_key_pair(&self) -> &KeyPair {
        &self.device
    }

    /// Processes the server's answer: verifies the fingerprint signature
    /// against the provisioned master authority public key, agrees on the
    /// master secret, expands the named keys, and opens the counter seed.
    pub fn key_exchange(
        self,
        response: &ServerKeyExchange,
        master_public_key: &PublicKey,
    ) -> Result<ClientActivationKeyExchanged, ProtocolError> {
        let (device, keys) = self.exchange_keys(response, master_public_key)?;
        let sealed = response
            .encrypted_ctr_data
            .as_ref()
            .ok_or(ProtocolError::HandshakeError)?;
        let counter = open_ctr_seed(sealed, &keys.transport)?;
        Ok(ClientActivationKeyExchanged {
            device,
            keys,
            counter,
        })
    }

    /// Legacy variant of [`key_exchange`](Self::key_exchange): no counter
    /// seed is transmitted and both sides start the numeric counter at zero.
    #[deprecated(note = "the numeric counter family is a legacy surface; use `key_exchange`")]
    pub fn key_exchange_legacy(
        self,
        response: &ServerKeyExchange,
        master_public_key: &PublicKey,
    ) -> Result<ClientActivationKeyExchanged, ProtocolError> {
        if response.encrypted_ctr_data.is_some() {
            return Err(ProtocolError::HandshakeError);
        }
        let (device, keys) = self.exchange_keys(response, master_public_key)?;
        Ok(ClientActivationKeyExchanged {
            device,
            keys,
            counter: Counter::V2(0),
        })
    }

    fn exchange_keys(
        self,
        response: &ServerKeyExchange,
        master_public_key: &PublicKey,
    ) -> Result<(KeyPair, ActivationKeys), ProtocolError> {
        let server_public = PublicKey::from_sec1_bytes(&response.server_public_key)
            .map_err(|_| ProtocolError::HandshakeError)?;
        let fingerprint =
            activation_fingerprint(&self.device_public_key(), &response.server_public_key);
        if !primitives::ecdsa_verify(master_public_key, &fingerprint, &response.server_signature) {
            return Err(ProtocolError::SignatureMismatchError);
        }
        let master = MasterSecretKey::agree(self.device.private(), &server_public)?;
        let keys = ActivationKeys::derive(&master);
        Ok((self.device, keys))
    }
}

/// Client side after the key exchange, holding the derived keys and the
/// synchronized counter.
pub struct ClientActivationKeyExchanged {
    device: KeyPair,
    keys: ActivationKeys,
    counter: Counter,
}

impl ClientActivationKeyExchanged {
    /// The device key pair, for the caller's secure store.
    pub fn device_key_pair(&self) -> &KeyPair {
        &self.device
    }

    /// The derived named keys.
    pub fn keys(&self) -> &ActivationKeys {
        &self.keys
    }

    /// Completes the ceremony: issues the possession-factor confirmation
    /// signature over `data` and advances the counter, assuming the server
    /// accepts. Returns the active record and the signature to transmit.
    pub fn confirm(self, data: &[u8]) -> Result<(Activation, String), ProtocolError> {
        let signature = compute_signature(data, &[self.keys.possession.clone()], &self.counter)?;
        let mut counter = self.counter;
        counter.advance();
        Ok((
            Activation {
                keys: self.keys,
                counter,
            },
            signature,
        ))
    }
}

/// Server side of the ceremony after answering the key exchange.
pub struct ServerActivation {
    server: KeyPair,
    keys: ActivationKeys,
    counter: Counter,
}

impl ServerActivation {
    /// Answers a device key exchange: validates the device public key,
    /// generates the server key pair and counter seed, signs the activation
    /// fingerprint under the master authority key, and derives the named
    /// keys.
    pub fn key_exchange<R: RngCore + CryptoRng>(
        rng: &mut R,
        device_public_key: &[u8],
        master_signing_key: &PrivateKey,
    ) -> Result<(Self, ServerKeyExchange), ProtocolError> {
        let (state, mut response) =
            Self::exchange_keys(rng, device_public_key, master_signing_key, |rng| {
                Counter::init_v3(rng)
            })?;
        response.encrypted_ctr_data = Some(seal_ctr_seed(&state.counter, &state.keys.transport)?);
        Ok((state, response))
    }

    /// Legacy variant of [`key_exchange`](Self::key_exchange): the numeric
    /// counter starts at zero and no seed is transmitted.
    #[deprecated(note = "the numeric counter family is a legacy surface; use `key_exchange`")]
    pub fn key_exchange_legacy<R: RngCore + CryptoRng>(
        rng: &mut R,
        device_public_key: &[u8],
        master_signing_key: &PrivateKey,
    ) -> Result<(Self, ServerKeyExchange), ProtocolError> {
        Self::exchange_keys(rng, device_public_key, master_signing_key, |_| Counter::V2(0))
    }

    fn exchange_keys<R: RngCore + CryptoRng>(
        rng: &mut R,
        device_public_key: &[u8],
        master_signing_key: &PrivateKey,
        init_counter: impl FnOnce(&mut R) -> Counter,
    ) -> Result<(Self, ServerKeyExchange), ProtocolError> {
        let device_public = PublicKey::from_sec1_bytes(device_public_key)
            .map_err(|_| ProtocolError::HandshakeError)?;
        let server = KeyPair::generate_random(rng);
        let server_public_key = server.public().to_bytes();
        let fingerprint = activation_fingerprint(device_public_key, &server_public_key);
        let server_signature = primitives::ecdsa_sign(master_signing_key, &fingerprint);
        let master = MasterSecretKey::agree(server.private(), &device_public)?;
        let keys = ActivationKeys::derive(&master);
        let counter = init_counter(rng);
        Ok((
            Self {
                server,
                keys,
                counter,
            },
            ServerKeyExchange {
                server_public_key,
                server_signature,
                encrypted_ctr_data: None,
            },
        ))
    }

    /// The server key pair, for the caller's activation record.
    pub fn server_key_pair(&self) -> &KeyPair {
        &self.server
    }

    /// The derived named keys.
    pub fn keys(&self) -> &ActivationKeys {
        &self.keys
    }

    /// Verifies the client's possession-factor confirmation signature and,
    /// on success, advances the counter and transitions the activation to
    /// active.
    pub fn confirm(self, data: &[u8], signature: &str) -> Result<Activation, ProtocolError> {
        let accepted = verify_signature(
            data,
            signature,
            &[self.keys.possession.clone()],
            &self.counter,
        )?;
        if !accepted {
            return Err(ProtocolError::SignatureMismatchError);
        }
        let mut counter = self.counter;
        counter.advance();
        Ok(Activation {
            keys: self.keys,
            counter,
        })
    }
}

/// The activation fingerprint signed by the master authority key: the SEC1
/// device public key followed by the SEC1 server public key.
pub fn activation_fingerprint(device_public_key: &[u8], server_public_key: &[u8]) -> Vec<u8> {
    [device_public_key, server_public_key].concat()
}

fn seal_ctr_seed(counter: &Counter, transport: &SecretKey) -> Result<Vec<u8>, ProtocolError> {
    Ok(primitives::aes128_cbc_encrypt(
        &counter.ctr_data(),
        &[0u8; BLOCK_SIZE],
        transport.as_bytes(),
        Padding::None,
    )?)
}

fn open_ctr_seed(sealed: &[u8], transport: &SecretKey) -> Result<Counter, ProtocolError> {
    let seed = primitives::aes128_cbc_decrypt(
        sealed,
        &[0u8; BLOCK_SIZE],
        transport.as_bytes(),
        Padding::None,
    )?;
    Counter::v3_from_slice(&seed)
}
