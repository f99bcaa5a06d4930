//! Bulk decryption delegated to the card.

use bytes::BytesMut;
use rand::{CryptoRng, RngCore};
use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::apdu::CommandApdu;
use crate::constants::{AES_BLOCK_SIZE, MAX_DECRYPT_CHUNK, ins, result_code};
use crate::error::{Error, Result};
use crate::secure_channel::establish_transaction_key;
use crate::transport::{CardTransport, exchange};

/// Decrypt `ciphertext` with the card's long-term password key.
///
/// The card never releases the true plaintext to the transport: every chunk
/// it decrypts comes back re-encrypted under the operation's transaction
/// key, and the double wrapping is only removed locally once all chunks are
/// in. `password_key_iv` primes the card's own AES engine for the data
/// being decrypted; it is protocol-level state, distinct from the
/// transaction IV.
///
/// The output length equals the input length; no padding is removed here,
/// that is the caller's layer.
pub fn decrypt_via_card<T, R>(
    transport: &mut T,
    rng: &mut R,
    password_key_iv: &[u8; 16],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>>
where
    T: CardTransport + ?Sized,
    R: RngCore + CryptoRng,
{
    if ciphertext.len() % AES_BLOCK_SIZE != 0 {
        return Err(Error::NotBlockAligned(ciphertext.len()));
    }

    let key = establish_transaction_key(transport, rng)?;

    let command =
        CommandApdu::applet_with_data(ins::PREPARE_DECRYPTION, password_key_iv.to_vec())?;
    let response = exchange(transport, &command)?;
    if !response.is_success() {
        return Err(Error::UnexpectedStatus(response.status_word()));
    }

    debug!(len = ciphertext.len(), "delegating decryption to the card");
    let mut rewrapped = BytesMut::with_capacity(ciphertext.len());
    for (index, chunk) in ciphertext.chunks(MAX_DECRYPT_CHUNK).enumerate() {
        let offset = index * MAX_DECRYPT_CHUNK;
        let command = CommandApdu::applet_with_data(ins::DECRYPT_BLOCK, chunk.to_vec())?;
        let response = exchange(transport, &command)?;
        let data = response.data();
        if data.first() != Some(&result_code::SUCCESS) {
            return Err(Error::DecryptChunkFailed { offset });
        }
        if data.len() != 1 + chunk.len() {
            return Err(Error::MalformedResponse("decrypt chunk length mismatch"));
        }
        rewrapped.extend_from_slice(&data[1..]);
        trace!(offset, len = chunk.len(), "chunk decrypted by the card");
    }

    // The concatenated card output is one continuous CBC stream under the
    // transaction key.
    let plaintext = key.decrypt(&mut rewrapped)?;
    Ok(Zeroizing::new(plaintext.to_vec()))
}
