//! Key transport to the card: the per-operation transaction key and the
//! long-term password key both travel RSA-encrypted through the scratch
//! area, followed by an activation command.

use rand::{CryptoRng, RngCore};
use tracing::debug;

use crate::apdu::{CommandApdu, is_success};
use crate::card_key::fetch_card_pubkey;
use crate::constants::ins;
use crate::crypto::{TransactionKey, encrypt_with_card_key};
use crate::error::{Error, Result};
use crate::scratch::write_scratch;
use crate::transport::{CardTransport, exchange};

/// Negotiate a fresh transaction key with the card.
///
/// Generates a one-time AES key/IV pair, delivers the key RSA-encrypted
/// through the scratch area, and activates it with the IV as payload. The
/// returned pair is the shared secret for the remainder of the operation.
///
/// The card acknowledges the activation command but not the adoption
/// itself: a key it failed to decrypt only shows up when a later command
/// misbehaves. Every operation negotiates anew, so a broken negotiation
/// never outlives the operation that ran it.
pub fn establish_transaction_key<T, R>(transport: &mut T, rng: &mut R) -> Result<TransactionKey>
where
    T: CardTransport + ?Sized,
    R: RngCore + CryptoRng,
{
    let card_key = fetch_card_pubkey(transport)?;
    let key = TransactionKey::generate(rng);

    // 256 ciphertext bytes for a 2048-bit card key; far beyond one frame.
    let wrapped = encrypt_with_card_key(&card_key, rng, key.key_bytes())?;
    write_scratch(transport, &wrapped)?;

    let command =
        CommandApdu::applet_with_data(ins::SET_TRANSACTION_KEY, key.iv_bytes().to_vec())?;
    let response = exchange(transport, &command)?;
    if !response.is_success() {
        return Err(Error::UnexpectedStatus(response.status_word()));
    }
    debug!("transaction key established");
    Ok(key)
}

/// Install a long-term password key on the card.
///
/// Same delivery path as the transaction key; the activation command
/// carries no payload and must answer with the exact trailer-only success.
pub fn set_password_key<T, R>(transport: &mut T, rng: &mut R, password_key: &[u8]) -> Result<()>
where
    T: CardTransport + ?Sized,
    R: RngCore + CryptoRng,
{
    let card_key = fetch_card_pubkey(transport)?;
    let wrapped = encrypt_with_card_key(&card_key, rng, password_key)?;
    write_scratch(transport, &wrapped)?;

    let response = exchange(transport, &CommandApdu::applet(ins::SET_PASSWORD_KEY))?;
    if !is_success(response.as_bytes(), 2) {
        return Err(Error::UnexpectedStatus(response.status_word()));
    }
    debug!("password key installed");
    Ok(())
}
