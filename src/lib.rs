//! CCM (Counter with CBC-MAC) authenticated encryption per [RFC 3610],
//! with the nonce handling of the Stanford JavaScript Crypto Library
//! ([SJCL]) so that its "ccm" JSON envelopes can be produced and consumed
//! byte-for-byte.
//!
//! ## Overview
//! CCM combines a CBC-MAC over the associated data and plaintext with
//! CTR-mode encryption under the same key. The two RFC parameters are the
//! tag size `M` (an even value in 4..=16) and the width `L` of the message
//! length field, tied to the nonce by `L = 15 - nonce_size`.
//!
//! SJCL adds one quirk on top of the RFC: it derives the nonce length from
//! the message length and silently truncates a longer nonce (its envelopes
//! store a 16-octet `iv`). [`CcmMode::seal`] and [`CcmMode::open`]
//! reproduce that behaviour exactly, which is invisible to callers that
//! pass RFC-style fixed-length nonces.
//!
//! The block cipher is consumed through the [`block_cipher::BlockCipher`]
//! trait and is otherwise opaque; any 128-bit block cipher works. The
//! `aes` feature (on by default) provides the [`Aes128Ccm`], [`Aes192Ccm`]
//! and [`Aes256Ccm`] aliases, and the `sjcl` feature adds the JSON
//! envelope layer in [`sjcl`].
//!
//! ## Usage
//! ```rust
//! use aes::Aes128;
//! use sjcl_ccm::{block_cipher::NewBlockCipher, CcmMode};
//!
//! let key = [
//!     0xC0, 0xC1, 0xC2, 0xC3, 0xC4, 0xC5, 0xC6, 0xC7, 0xC8, 0xC9, 0xCA,
//!     0xCB, 0xCC, 0xCD, 0xCE, 0xCF,
//! ];
//! // Tag size 8, nonce size 13 (so a 2-octet length field).
//! let ccm = CcmMode::new(Aes128::new(&key.into()), 8, 13).unwrap();
//!
//! let nonce = [
//!     0x00, 0x00, 0x00, 0x03, 0x02, 0x01, 0x00, 0xA0, 0xA1, 0xA2, 0xA3,
//!     0xA4, 0xA5,
//! ];
//! let msg = [
//!     0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10, 0x11, 0x12,
//!     0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x1B, 0x1C, 0x1D,
//!     0x1E,
//! ];
//! let adata = [0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
//!
//! let mut ciphertext = Vec::new();
//! ccm.seal(&mut ciphertext, &nonce, &msg, &adata).unwrap();
//! assert_eq!(msg.len() + ccm.overhead(), ciphertext.len());
//!
//! let mut plaintext = Vec::new();
//! ccm.open(&mut plaintext, &nonce, &ciphertext, &adata).unwrap();
//! assert_eq!(&msg[..], &plaintext[..]);
//! ```
//!
//! ## Security
//! The tag length bounds the forgery probability; RFC 3610 recommends tags
//! longer than 8 octets for most applications. Reusing a nonce under one
//! key destroys the security of CCM. Tag verification in
//! [`CcmMode::open`] is constant-time via the [`subtle`] crate, and the
//! decrypted buffer is wiped before an authentication failure is reported.
//! Side-channel behaviour of the block cipher itself is up to the chosen
//! implementation.
//!
//! [RFC 3610]: https://tools.ietf.org/html/rfc3610
//! [SJCL]: https://github.com/bitwiseshiftleft/sjcl
//! [`subtle`]: https://docs.rs/subtle

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(not(feature = "std"))]
extern crate alloc;

mod ccm;
mod error;
mod lengths;
#[cfg(feature = "sjcl")]
#[cfg_attr(docsrs, doc(cfg(feature = "sjcl")))]
pub mod sjcl;

pub use cipher::block as block_cipher;

pub use ccm::{CcmMode, BLOCK_SIZE};
#[cfg(feature = "aes")]
pub use ccm::{Aes128Ccm, Aes192Ccm, Aes256Ccm};
pub use error::Error;
pub use lengths::{
    max_nonce_length, maximum_length_for_message, nonce_length_for_message,
};
