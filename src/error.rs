//! CCM errors.

use core::fmt;

/// The error type for CCM sealing and opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The block cipher does not operate on 128-bit blocks.
    InvalidBlockSize,
    /// Wrong tag length.
    TagSize,
    /// Nonce length outside 7..=13.
    NonceSize,
    /// The effective nonce length does not match the length-field width
    /// the context was built with.
    InvalidNonceLength,
    /// Plaintext longer than the length field can represent.
    PlaintextTooLong,
    /// Ciphertext longer than the length field plus tag can represent.
    CiphertextTooLong,
    /// Ciphertext shorter than the tag.
    CiphertextTooShort,
    /// Tag verification failed.
    AuthenticationFailed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidBlockSize => {
                write!(f, "a 128-bit block cipher is mandatory")
            }
            Error::TagSize => write!(
                f,
                "tag size must be one of 4, 6, 8, 10, 12, 14 or 16"
            ),
            Error::NonceSize => write!(f, "invalid nonce size"),
            Error::InvalidNonceLength => write!(f, "invalid nonce length"),
            Error::PlaintextTooLong => {
                write!(f, "plaintext exceeds maximum length")
            }
            Error::CiphertextTooLong => {
                write!(f, "ciphertext exceeds maximum length")
            }
            Error::CiphertextTooShort => {
                write!(f, "ciphertext below minimum length")
            }
            Error::AuthenticationFailed => {
                write!(f, "message authentication failed")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
