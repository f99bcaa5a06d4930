use thiserror::Error;

use crate::transport::TransportError;

/// Result type for Passvault operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Passvault operations.
///
/// A wrong PIN is deliberately absent here: it is a routine outcome of the
/// secret-store operations, reported through
/// [`SecretOutcome`](crate::SecretOutcome) instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure; the operation is aborted immediately and
    /// the transport is left in the caller's care.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A payload does not fit the protocol's size limits: the single-byte
    /// frame length field, or the scratch area's 16-bit addressing range.
    #[error("payload of {0} bytes exceeds the protocol size limit")]
    PayloadTooLarge(usize),

    /// The card answered with an unexpected status trailer.
    #[error("unexpected status word {0:#06x}")]
    UnexpectedStatus(u16),

    /// The card reported a logical failure where success was expected.
    #[error("card reported result code {0:#04x}")]
    CommandFailed(u8),

    /// The card refused to select the applet.
    #[error("applet selection failed")]
    SelectFailed,

    /// The card rejected a scratch-area chunk.
    #[error("scratch write rejected at offset {offset}")]
    ScratchWriteFailed {
        /// Byte offset of the rejected chunk.
        offset: usize,
    },

    /// The card rejected a bulk-decrypt chunk.
    #[error("decrypt chunk rejected at offset {offset}")]
    DecryptChunkFailed {
        /// Byte offset of the rejected chunk.
        offset: usize,
    },

    /// Ciphertext handed to the card must be a whole number of AES blocks.
    #[error("ciphertext length {0} is not a multiple of the AES block size")]
    NotBlockAligned(usize),

    /// A response did not match the protocol layout.
    #[error("malformed response: {0}")]
    MalformedResponse(&'static str),

    /// The card-supplied exponent and modulus do not form a usable RSA key.
    #[error("card supplied an invalid RSA public key")]
    KeyConstruction(#[source] rsa::Error),

    /// RSA encryption under the card public key failed.
    #[error("encryption with the card public key failed")]
    Encryption(#[source] rsa::Error),

    /// A plaintext buffer could not be prepared for block encryption.
    #[error("pad error")]
    Pad(cipher::inout::PadError),

    /// A ciphertext buffer did not decrypt to whole blocks.
    #[error("unpad error")]
    Unpad(cipher::block_padding::UnpadError),
}

// `PadError`/`UnpadError` do not implement `std::error::Error`, so thiserror's
// `#[from]` cannot be used (it implies `#[source]`). Provide the `From` impls
// manually so `?` still converts them at the call sites.
impl From<cipher::inout::PadError> for Error {
    fn from(err: cipher::inout::PadError) -> Self {
        Self::Pad(err)
    }
}

impl From<cipher::block_padding::UnpadError> for Error {
    fn from(err: cipher::block_padding::UnpadError) -> Self {
        Self::Unpad(err)
    }
}
