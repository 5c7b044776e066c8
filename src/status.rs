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

//! The encrypted activation status blob
//!
//! The server answers every status query with a fixed 16-byte blob encrypted
//! under the transport key with a zero IV and no padding. The blob is a
//! fresh plaintext on every query and carries a 4-byte magic header in lieu
//! of a MAC: a ciphertext produced under the wrong key, or tampered with in
//! transit, decrypts to a blob whose magic does not match. Do not introduce
//! a random IV or PKCS#7 padding here; the single-block layout is the wire
//! contract.

use crate::errors::{InternalError, ProtocolError};
use crate::kdf::SecretKey;
use crate::primitives::{self, Padding, BLOCK_SIZE};

/// Magic header of a valid status blob.
pub const STATUS_BLOB_MAGIC: [u8; 4] = [0xDE, 0xC0, 0xDE, 0xD1];

/// Serialized length of the status blob.
pub const STATUS_BLOB_LENGTH: usize = BLOCK_SIZE;

/// Lifecycle state of an activation as carried in the status blob.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ActivationStatus {
    /// Activation record exists, waiting for the device key exchange.
    Created = 1,
    /// The activation code was consumed; waiting for commit.
    OtpUsed = 2,
    /// Fully activated; signatures are accepted.
    Active = 3,
    /// Administratively blocked.
    Blocked = 4,
    /// Removed; terminal.
    Removed = 5,
}

impl TryFrom<u8> for ActivationStatus {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            1 => Ok(ActivationStatus::Created),
            2 => Ok(ActivationStatus::OtpUsed),
            3 => Ok(ActivationStatus::Active),
            4 => Ok(ActivationStatus::Blocked),
            5 => Ok(ActivationStatus::Removed),
            _ => Err(ProtocolError::InvalidMessageError),
        }
    }
}

/// The decoded contents of one status blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivationStatusBlob {
    /// Raw activation status byte.
    pub activation_status: u8,
    /// Protocol version the activation currently uses.
    pub current_version: u8,
    /// Highest protocol version the server can upgrade this activation to.
    pub upgrade_version: u8,
    /// Failed authentication attempts so far.
    pub failed_attempts: u8,
    /// Attempt limit after which the activation blocks.
    pub max_failed_attempts: u8,
    valid: bool,
}

impl ActivationStatusBlob {
    /// Builds a blob for the given field values.
    pub fn new(
        activation_status: u8,
        current_version: u8,
        upgrade_version: u8,
        failed_attempts: u8,
        max_failed_attempts: u8,
    ) -> Self {
        Self {
            activation_status,
            current_version,
            upgrade_version,
            failed_attempts,
            max_failed_attempts,
            valid: true,
        }
    }

    /// Whether the magic header was present when this blob was decoded.
    /// Always true for locally constructed blobs.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The typed activation status, if the status byte is a known state.
    pub fn status(&self) -> Result<ActivationStatus, ProtocolError> {
        ActivationStatus::try_from(self.activation_status)
    }

    /// Serializes the fixed 16-byte layout: magic, status, versions, six
    /// reserved zero bytes, attempt counters, one reserved zero byte.
    pub fn to_bytes(&self) -> [u8; STATUS_BLOB_LENGTH] {
        let mut bytes = [0u8; STATUS_BLOB_LENGTH];
        bytes[..4].copy_from_slice(&STATUS_BLOB_MAGIC);
        bytes[4] = self.activation_status;
        bytes[5] = self.current_version;
        bytes[6] = self.upgrade_version;
        bytes[13] = self.failed_attempts;
        bytes[14] = self.max_failed_attempts;
        bytes
    }

    /// Decodes a 16-byte blob. Reserved bytes are ignored; the magic check
    /// lands in [`is_valid`](Self::is_valid) rather than an error, so a
    /// garbled blob still decodes and reports itself invalid.
    pub fn from_bytes(input: &[u8]) -> Result<Self, InternalError> {
        let checked =
            crate::errors::utils::check_slice_size(input, STATUS_BLOB_LENGTH, "status blob")?;
        Ok(Self {
            activation_status: checked[4],
            current_version: checked[5],
            upgrade_version: checked[6],
            failed_attempts: checked[13],
            max_failed_attempts: checked[14],
            valid: checked[..4] == STATUS_BLOB_MAGIC,
        })
    }

    /// Encrypts the blob under the transport key: AES-128-CBC, zero IV, no
    /// padding, a single block of ciphertext.
    pub fn encrypt(
        &self,
        transport_key: &SecretKey,
    ) -> Result<[u8; STATUS_BLOB_LENGTH], InternalError> {
        let ciphertext = primitives::aes128_cbc_encrypt(
            &self.to_bytes(),
            &[0u8; BLOCK_SIZE],
            transport_key.as_bytes(),
            Padding::None,
        )?;
        let mut blob = [0u8; STATUS_BLOB_LENGTH];
        blob.copy_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Decrypts and decodes a status blob received from the server.
    pub fn decrypt(input: &[u8], transport_key: &SecretKey) -> Result<Self, InternalError> {
        let checked = crate::errors::utils::check_slice_size(
            input,
            STATUS_BLOB_LENGTH,
            "encrypted status blob",
        )?;
        let plaintext = primitives::aes128_cbc_decrypt(
            checked,
            &[0u8; BLOCK_SIZE],
            transport_key.as_bytes(),
            Padding::None,
        )?;
        Self::from_bytes(&plaintext)
    }
}
