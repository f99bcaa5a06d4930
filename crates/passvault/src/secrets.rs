//! PIN-gated storage of the card-held secret.
//!
//! Request payloads are encrypted whole under the operation's transaction
//! key; the get-secret response is additionally wrapped under a fresh IV
//! the card picks for that one answer.

use bytes::BytesMut;
use rand::{CryptoRng, RngCore};
use tracing::debug;
use zeroize::Zeroizing;

use crate::apdu::{CommandApdu, read_u16_be, write_u16_be};
use crate::constants::{ins, result_code};
use crate::crypto::{pad_to_block, round_to_block};
use crate::error::{Error, Result};
use crate::secure_channel::establish_transaction_key;
use crate::transport::{CardTransport, exchange};

/// Fixed overhead of the set-secret plaintext: three 16-bit length fields.
const SET_HEADER_LEN: usize = 6;
/// Fixed overhead of the get-secret request plaintext: one 16-bit length field.
const GET_HEADER_LEN: usize = 2;
/// Bytes preceding the encrypted region of a get-secret response: the
/// result code, one padding byte, and the 16-byte fresh IV.
const GET_RESPONSE_PREFIX: usize = 2 + 16;

/// Outcome of a PIN-gated operation.
///
/// A rejected PIN is a routine, recoverable outcome — callers re-prompt and
/// retry — so it lives here rather than in [`Error`]. Transport, protocol
/// and crypto faults still arrive as `Err(_)`.
#[derive(Debug)]
pub enum SecretOutcome<P> {
    /// The card accepted the PIN and completed the operation.
    Success(P),
    /// The card rejected the supplied PIN.
    WrongPin,
    /// The card reported a result code other than success or wrong-PIN.
    Failed(u8),
}

impl<P> SecretOutcome<P> {
    /// Whether the card accepted the operation.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Store `secret` on the card, guarded by `new_pin`.
///
/// `old_pin` must match the PIN currently guarding the secret; on first
/// provisioning it is empty. The whole payload travels encrypted under a
/// transaction key negotiated for this call alone.
pub fn set_secret<T, R>(
    transport: &mut T,
    rng: &mut R,
    new_pin: &[u8],
    secret: &[u8],
    old_pin: &[u8],
) -> Result<SecretOutcome<()>>
where
    T: CardTransport + ?Sized,
    R: RngCore + CryptoRng,
{
    let padded_len =
        round_to_block(SET_HEADER_LEN + secret.len() + old_pin.len() + new_pin.len());
    if padded_len > CommandApdu::MAX_PAYLOAD {
        return Err(Error::PayloadTooLarge(padded_len));
    }

    let key = establish_transaction_key(transport, rng)?;
    let mut payload = encode_set_payload(secret, old_pin, new_pin);
    let encrypted = key.encrypt(&mut payload)?;

    let command = CommandApdu::applet_with_data(ins::SET_SECRET_DATA, encrypted.to_vec())?;
    let response = exchange(transport, &command)?;
    match response.result_code() {
        Some(result_code::SUCCESS) => {
            debug!("secret stored");
            Ok(SecretOutcome::Success(()))
        }
        Some(result_code::WRONG_PIN) => Ok(SecretOutcome::WrongPin),
        Some(code) => Ok(SecretOutcome::Failed(code)),
        None => Err(Error::MalformedResponse("missing result code")),
    }
}

/// Retrieve the card-held secret, authorising with `pin`.
pub fn get_secret<T, R>(
    transport: &mut T,
    rng: &mut R,
    pin: &[u8],
) -> Result<SecretOutcome<Zeroizing<Vec<u8>>>>
where
    T: CardTransport + ?Sized,
    R: RngCore + CryptoRng,
{
    let padded_len = round_to_block(GET_HEADER_LEN + pin.len());
    if padded_len > CommandApdu::MAX_PAYLOAD {
        return Err(Error::PayloadTooLarge(padded_len));
    }

    let key = establish_transaction_key(transport, rng)?;
    let mut payload = encode_get_payload(pin);
    let encrypted = key.encrypt(&mut payload)?;

    let command = CommandApdu::applet_with_data(ins::GET_SECRET_DATA, encrypted.to_vec())?;
    let response = exchange(transport, &command)?;
    let raw = response.as_bytes();
    match response.result_code() {
        Some(result_code::SUCCESS) => {
            // Layout: result code, one padding byte, the fresh IV, then the
            // secret block encrypted under the transaction key and that IV.
            let Some(ciphertext) = raw.get(GET_RESPONSE_PREFIX..raw.len() - 2) else {
                return Err(Error::MalformedResponse("secret response too short"));
            };
            let mut fresh_iv = [0u8; 16];
            fresh_iv.copy_from_slice(&raw[2..GET_RESPONSE_PREFIX]);

            let mut block = BytesMut::from(ciphertext);
            let plaintext = key.decrypt_with_iv(&fresh_iv, &mut block)?;
            if plaintext.len() < GET_HEADER_LEN {
                return Err(Error::MalformedResponse("secret block too short"));
            }
            let secret_len = read_u16_be(&plaintext, 0) as usize;
            let secret = plaintext
                .get(GET_HEADER_LEN..GET_HEADER_LEN + secret_len)
                .ok_or(Error::MalformedResponse("secret shorter than declared"))?;
            debug!(len = secret_len, "secret retrieved");
            Ok(SecretOutcome::Success(Zeroizing::new(secret.to_vec())))
        }
        Some(result_code::WRONG_PIN) => Ok(SecretOutcome::WrongPin),
        Some(code) => Ok(SecretOutcome::Failed(code)),
        None => Err(Error::MalformedResponse("missing result code")),
    }
}

/// Lay out the set-secret plaintext and zero-pad it to a block boundary.
///
/// Three length fields, then the three blobs in the same order. Declared
/// lengths always sum, with the header, to at most the padded length;
/// padding bytes are never interpreted by the card.
fn encode_set_payload(secret: &[u8], old_pin: &[u8], new_pin: &[u8]) -> BytesMut {
    let mut payload =
        BytesMut::zeroed(SET_HEADER_LEN + secret.len() + old_pin.len() + new_pin.len());
    write_u16_be(&mut payload, 0, secret.len() as u16);
    write_u16_be(&mut payload, 2, old_pin.len() as u16);
    write_u16_be(&mut payload, 4, new_pin.len() as u16);

    let mut pos = SET_HEADER_LEN;
    payload[pos..pos + secret.len()].copy_from_slice(secret);
    pos += secret.len();
    payload[pos..pos + old_pin.len()].copy_from_slice(old_pin);
    pos += old_pin.len();
    payload[pos..pos + new_pin.len()].copy_from_slice(new_pin);

    pad_to_block(&mut payload);
    payload
}

/// Lay out the get-secret request plaintext: PIN length, then the PIN.
fn encode_get_payload(pin: &[u8]) -> BytesMut {
    let mut payload = BytesMut::zeroed(GET_HEADER_LEN + pin.len());
    write_u16_be(&mut payload, 0, pin.len() as u16);
    payload[GET_HEADER_LEN..].copy_from_slice(pin);
    pad_to_block(&mut payload);
    payload
}
