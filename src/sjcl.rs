//! The SJCL "ccm" JSON envelope.
//!
//! SJCL's `sjcl.encrypt` emits a small JSON object whose binary fields are
//! base64 strings: the initialization vector, the associated data, the
//! PBKDF2 salt and the ciphertext-with-tag. This module (de)serializes that
//! envelope and runs the CCM core over the decoded buffers.
//!
//! Keys are supplied by the caller; PBKDF2 derivation from a passphrase is
//! outside the scope of this crate, so the `iter` and `salt` fields are
//! carried verbatim and never interpreted.
//!
//! ```rust
//! use sjcl_ccm::sjcl::SjclEnvelope;
//!
//! let key = [0x2B; 16];
//! let envelope =
//!     SjclEnvelope::seal(&key, &[0xA0; 16], b"hello world", b"", 64)
//!         .unwrap();
//! let json = envelope.to_json().unwrap();
//!
//! let parsed = SjclEnvelope::from_json(&json).unwrap();
//! assert_eq!(b"hello world".to_vec(), parsed.open(&key).unwrap());
//! ```

use core::ops::Deref;

use aes::{Aes128, Aes192, Aes256};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cipher::block::generic_array::{ArrayLength, GenericArray};
use cipher::block::{Block, BlockCipher, NewBlockCipher};
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use thiserror::Error;

use crate::lengths::nonce_length_for_message;
use crate::CcmMode;

/// The error type for envelope parsing and processing.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// The `cipher` field names something other than "aes".
    #[error("only AES encryption is supported")]
    UnsupportedCipher,
    /// The `mode` field names something other than "ccm".
    #[error("only CCM authentication is supported")]
    UnsupportedMode,
    /// The `v` field is not 1.
    #[error("only version 1 of SJCL is supported")]
    UnsupportedVersion,
    /// The `ts` field is not a whole number of octets.
    #[error("tag size of {0} bits is not a multiple of 8")]
    BadTagSize(u32),
    /// The supplied key does not match the envelope's `ks` field or is not
    /// an AES key size.
    #[error("key of {0} octets does not match the envelope key size")]
    KeyLength(usize),
    /// Malformed JSON or base64 in a binary field.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// The CCM core rejected the envelope's contents.
    #[error("CCM error: {0}")]
    Ccm(#[from] crate::Error),
}

/// A byte buffer that (de)serializes as a standard, padded base64 string,
/// the encoding SJCL uses for every binary envelope field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Base64Data(pub Vec<u8>);

impl Serialize for Base64Data {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Base64Data {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        STANDARD
            .decode(text.as_bytes())
            .map(Base64Data)
            .map_err(de::Error::custom)
    }
}

impl Deref for Base64Data {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Base64Data {
    fn from(bytes: Vec<u8>) -> Self {
        Base64Data(bytes)
    }
}

impl From<&[u8]> for Base64Data {
    fn from(bytes: &[u8]) -> Self {
        Base64Data(bytes.to_vec())
    }
}

/// The SJCL version-1 "ccm" JSON envelope.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SjclEnvelope {
    /// Initialization vector; SJCL stores 16 octets even though CCM uses a
    /// truncated prefix.
    pub iv: Base64Data,
    /// Format version, always 1.
    #[serde(rename = "v")]
    pub version: u32,
    /// PBKDF2 iteration count; passthrough metadata here.
    #[serde(default)]
    pub iter: u32,
    /// Key size in bits.
    #[serde(rename = "ks")]
    pub key_size: u32,
    /// Tag size in bits, a multiple of 8.
    #[serde(rename = "ts")]
    pub tag_size: u32,
    /// Always "ccm".
    pub mode: String,
    /// Associated data, authenticated but not encrypted.
    #[serde(default)]
    pub adata: Base64Data,
    /// Always "aes".
    pub cipher: String,
    /// PBKDF2 salt; passthrough metadata here.
    #[serde(default)]
    pub salt: Base64Data,
    /// Encrypted payload followed by the authentication tag.
    #[serde(rename = "ct")]
    pub ciphertext: Base64Data,
    /// RESTful response status, when the envelope is a reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// RESTful response message, when the envelope is an error reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl SjclEnvelope {
    /// Parses and validates an envelope from its JSON text.
    pub fn from_json(text: &str) -> Result<SjclEnvelope, EnvelopeError> {
        let envelope: SjclEnvelope = serde_json::from_str(text)?;
        envelope.validate()?;
        Ok(envelope)
    }

    /// Serializes the envelope to JSON text.
    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Checks the constant fields: cipher "aes", mode "ccm", version 1 and
    /// a tag size that is a whole number of octets.
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if self.cipher != "aes" {
            return Err(EnvelopeError::UnsupportedCipher);
        }
        if self.mode != "ccm" {
            return Err(EnvelopeError::UnsupportedMode);
        }
        if self.version != 1 {
            return Err(EnvelopeError::UnsupportedVersion);
        }
        if self.tag_size % 8 != 0 {
            return Err(EnvelopeError::BadTagSize(self.tag_size));
        }
        Ok(())
    }

    /// Tag size converted to octets.
    pub fn tag_size_bytes(&self) -> usize {
        (self.tag_size / 8) as usize
    }

    /// Key size converted to octets.
    pub fn key_size_bytes(&self) -> usize {
        (self.key_size / 8) as usize
    }

    /// Decrypts the envelope with a supplied key and returns the plaintext.
    ///
    /// The key length must match the `ks` field. The nonce length is
    /// derived from the ciphertext length, as SJCL does, so the stored
    /// 16-octet `iv` is truncated to the effective prefix.
    pub fn open(&self, key: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
        self.validate()?;
        if key.len() != self.key_size_bytes() {
            return Err(EnvelopeError::KeyLength(key.len()));
        }
        match key.len() {
            16 => self.open_with(Aes128::new(GenericArray::from_slice(key))),
            24 => self.open_with(Aes192::new(GenericArray::from_slice(key))),
            32 => self.open_with(Aes256::new(GenericArray::from_slice(key))),
            n => Err(EnvelopeError::KeyLength(n)),
        }
    }

    fn open_with<C>(&self, cipher: C) -> Result<Vec<u8>, EnvelopeError>
    where
        C: BlockCipher,
        C::ParBlocks: ArrayLength<Block<C>>,
    {
        let tag_size = self.tag_size_bytes();
        let nonce_size = nonce_length_for_message(
            self.ciphertext.len().saturating_sub(tag_size),
        );
        let ccm = CcmMode::new(cipher, tag_size, nonce_size)?;
        let mut plaintext = Vec::new();
        ccm.open(&mut plaintext, &self.iv, &self.ciphertext, &self.adata)?;
        Ok(plaintext)
    }

    /// Encrypts `plaintext` into a fresh envelope with a supplied key.
    ///
    /// The full `iv` is stored while the CCM core seals with its effective
    /// prefix, matching what SJCL emits. `iter` and `salt` describe a
    /// PBKDF2 derivation this crate does not perform and are left empty.
    pub fn seal(
        key: &[u8],
        iv: &[u8],
        plaintext: &[u8],
        adata: &[u8],
        tag_bits: u32,
    ) -> Result<SjclEnvelope, EnvelopeError> {
        if tag_bits % 8 != 0 {
            return Err(EnvelopeError::BadTagSize(tag_bits));
        }
        let tag_size = (tag_bits / 8) as usize;
        let ciphertext = match key.len() {
            16 => seal_with(
                Aes128::new(GenericArray::from_slice(key)),
                iv,
                plaintext,
                adata,
                tag_size,
            ),
            24 => seal_with(
                Aes192::new(GenericArray::from_slice(key)),
                iv,
                plaintext,
                adata,
                tag_size,
            ),
            32 => seal_with(
                Aes256::new(GenericArray::from_slice(key)),
                iv,
                plaintext,
                adata,
                tag_size,
            ),
            n => return Err(EnvelopeError::KeyLength(n)),
        }?;

        Ok(SjclEnvelope {
            iv: iv.into(),
            version: 1,
            iter: 0,
            key_size: (key.len() * 8) as u32,
            tag_size: tag_bits,
            mode: "ccm".to_owned(),
            adata: adata.into(),
            cipher: "aes".to_owned(),
            salt: Base64Data::default(),
            ciphertext: ciphertext.into(),
            status: None,
            msg: None,
        })
    }
}

fn seal_with<C>(
    cipher: C,
    iv: &[u8],
    plaintext: &[u8],
    adata: &[u8],
    tag_size: usize,
) -> Result<Vec<u8>, EnvelopeError>
where
    C: BlockCipher,
    C::ParBlocks: ArrayLength<Block<C>>,
{
    let nonce_size = nonce_length_for_message(plaintext.len());
    let ccm = CcmMode::new(cipher, tag_size, nonce_size)?;
    let mut ciphertext = Vec::new();
    ccm.seal(&mut ciphertext, iv, plaintext, adata)?;
    Ok(ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_all_key_sizes() {
        let iv = [0xA0u8; 16];
        let plaintext = b"attack at dawn";
        let adata = b"header";

        for key in
            [&[0x11u8; 16][..], &[0x22u8; 24][..], &[0x33u8; 32][..]].iter()
        {
            let envelope =
                SjclEnvelope::seal(key, &iv, plaintext, adata, 64).unwrap();
            assert_eq!((key.len() * 8) as u32, envelope.key_size);
            assert_eq!(
                plaintext.len() + envelope.tag_size_bytes(),
                envelope.ciphertext.len()
            );

            let json = envelope.to_json().unwrap();
            let parsed = SjclEnvelope::from_json(&json).unwrap();
            assert_eq!(envelope, parsed);
            assert_eq!(plaintext.to_vec(), parsed.open(key).unwrap());
        }
    }

    #[test]
    fn stored_iv_is_truncated_like_sjcl() {
        let key = [0x44u8; 16];
        let mut iv = [0u8; 16];
        iv[..13].copy_from_slice(b"0123456789abc");
        iv[13..].copy_from_slice(&[0xDE, 0xAD, 0xBE]);

        let long = SjclEnvelope::seal(&key, &iv, b"payload", b"", 64).unwrap();
        let short =
            SjclEnvelope::seal(&key, &iv[..13], b"payload", b"", 64).unwrap();
        assert_eq!(short.ciphertext, long.ciphertext);

        // The envelope still records the full vector it was given.
        assert_eq!(&iv[..], &long.iv[..]);
        assert_eq!(b"payload".to_vec(), long.open(&key).unwrap());
    }

    #[test]
    fn parses_the_sjcl_field_names() {
        let json = concat!(
            r#"{"iv":"AAECAwQFBgcICQoLDA0ODw==","v":1,"iter":10000,"#,
            r#""ks":128,"ts":64,"mode":"ccm","adata":"","cipher":"aes","#,
            r#""salt":"c2FsdA==","ct":"AAAAAAAAAAAAAAAAAAAAAA=="}"#
        );
        let envelope = SjclEnvelope::from_json(json).unwrap();

        assert_eq!((0..16).collect::<Vec<u8>>(), envelope.iv.0);
        assert_eq!(1, envelope.version);
        assert_eq!(10_000, envelope.iter);
        assert_eq!(16, envelope.key_size_bytes());
        assert_eq!(8, envelope.tag_size_bytes());
        assert_eq!(b"salt".to_vec(), envelope.salt.0);
        assert_eq!(16, envelope.ciphertext.len());
        assert!(envelope.adata.is_empty());

        // Garbage ciphertext parses fine but cannot authenticate.
        assert!(envelope.open(&[0u8; 16]).is_err());
    }

    #[test]
    fn rejects_foreign_envelopes() {
        let good =
            SjclEnvelope::seal(&[0x55u8; 16], &[0xA0; 16], b"x", b"", 64)
                .unwrap();

        let mut e = good.clone();
        e.cipher = "des".to_owned();
        assert!(matches!(
            e.validate(),
            Err(EnvelopeError::UnsupportedCipher)
        ));

        let mut e = good.clone();
        e.mode = "gcm".to_owned();
        assert!(matches!(e.validate(), Err(EnvelopeError::UnsupportedMode)));

        let mut e = good.clone();
        e.version = 2;
        assert!(matches!(
            e.validate(),
            Err(EnvelopeError::UnsupportedVersion)
        ));

        let mut e = good.clone();
        e.tag_size = 65;
        assert!(matches!(e.validate(), Err(EnvelopeError::BadTagSize(65))));
    }

    #[test]
    fn rejects_mismatched_keys() {
        let envelope =
            SjclEnvelope::seal(&[0x66u8; 16], &[0xA0; 16], b"x", b"", 64)
                .unwrap();

        // Wrong length for the recorded key size.
        assert!(matches!(
            envelope.open(&[0u8; 24]),
            Err(EnvelopeError::KeyLength(24))
        ));
        // Right length, wrong key.
        assert!(matches!(
            envelope.open(&[0u8; 16]),
            Err(EnvelopeError::Ccm(crate::Error::AuthenticationFailed))
        ));
    }

    #[test]
    fn tampered_adata_fails_to_open() {
        let key = [0x77u8; 16];
        let mut envelope =
            SjclEnvelope::seal(&key, &[0xA0; 16], b"payload", b"header", 64)
                .unwrap();
        envelope.adata.0[0] ^= 0x01;
        assert!(envelope.open(&key).is_err());
    }
}
