//! Retrieval of the card's RSA public key.
//!
//! The key arrives in pieces: one round for the exponent, then as many
//! offset-addressed rounds as the card needs to send the modulus. Each
//! modulus round reports how many bytes it carried and how many are still
//! to come; assembly continues, in request order, until nothing remains.

use rsa::{BigUint, RsaPublicKey};
use tracing::{debug, trace};

use crate::apdu::{CommandApdu, read_u16_be, write_u16_be};
use crate::constants::{ins, result_code};
use crate::error::{Error, Result};
use crate::transport::{CardTransport, exchange};

/// Selector for the exponent round.
const GET_EXPONENT: u8 = 1;
/// Selector for a modulus round.
const GET_MODULUS: u8 = 2;

/// Fetch the card's RSA public key.
///
/// Fetched once per secure-channel negotiation and never cached across
/// transport connections.
pub fn fetch_card_pubkey<T>(transport: &mut T) -> Result<RsaPublicKey>
where
    T: CardTransport + ?Sized,
{
    let command = CommandApdu::applet_with_data(ins::GET_CARD_PUBKEY, vec![GET_EXPONENT, 0, 0])?;
    let response = exchange(transport, &command)?;
    let raw = response.as_bytes();
    check_result(raw)?;
    if raw.len() < 5 {
        return Err(Error::MalformedResponse("exponent response too short"));
    }
    let exponent_len = raw[2] as usize;
    if raw.len() < 3 + exponent_len + 2 {
        return Err(Error::MalformedResponse("exponent shorter than declared"));
    }
    let exponent = &raw[3..3 + exponent_len];
    let exponent = BigUint::from_bytes_be(exponent);

    let mut modulus = Vec::new();
    let mut offset: u16 = 0;
    loop {
        let mut args = [GET_MODULUS, 0, 0];
        write_u16_be(&mut args, 1, offset);
        let command = CommandApdu::applet_with_data(ins::GET_CARD_PUBKEY, args.to_vec())?;
        let response = exchange(transport, &command)?;
        let raw = response.as_bytes();
        check_result(raw)?;
        if raw.len() < 7 {
            return Err(Error::MalformedResponse("modulus response too short"));
        }
        let bytes_sent = read_u16_be(raw, 1);
        let bytes_to_go = read_u16_be(raw, 3);
        let chunk = &raw[5..raw.len() - 2];
        // A round that disagrees with itself, or one that makes no
        // progress, would otherwise loop forever on a misbehaving card.
        if bytes_sent == 0 || chunk.len() != bytes_sent as usize {
            return Err(Error::MalformedResponse("inconsistent modulus chunk"));
        }
        modulus.extend_from_slice(chunk);
        offset = offset
            .checked_add(bytes_sent)
            .ok_or(Error::MalformedResponse("modulus overflows its offset field"))?;
        trace!(offset, bytes_to_go, "modulus chunk received");
        if bytes_to_go == 0 {
            break;
        }
    }
    debug!(modulus_len = modulus.len(), "card public key retrieved");

    RsaPublicKey::new(BigUint::from_bytes_be(&modulus), exponent).map_err(Error::KeyConstruction)
}

fn check_result(raw: &[u8]) -> Result<()> {
    match raw.first().copied() {
        Some(result_code::SUCCESS) => Ok(()),
        Some(code) => Err(Error::CommandFailed(code)),
        None => Err(Error::MalformedResponse("empty response")),
    }
}
