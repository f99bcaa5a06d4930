//! High-level session driver for the Passvault applet.

use std::time::Duration;

use rand::{CryptoRng, RngCore};
use tracing::debug;
use zeroize::Zeroizing;

use crate::apdu::{CommandApdu, is_success};
use crate::constants::PASSVAULT_AID;
use crate::decrypt::decrypt_via_card;
use crate::error::{Error, Result};
use crate::secrets::{SecretOutcome, get_secret, set_secret};
use crate::secure_channel::set_password_key;
use crate::transport::CardTransport;

/// Transport timeout covering the card's slowest operation: on-card RSA
/// decryption of the wrapped key material. Hard to bound precisely, so
/// sized generously rather than for the fast path.
pub const CARD_TIMEOUT: Duration = Duration::from_millis(2000);

const CLA_ISO: u8 = 0x00;
const INS_SELECT: u8 = 0xA4;
const P1_SELECT_BY_AID: u8 = 0x04;

/// A Passvault session over one transport connection.
///
/// Owns the transport for the lifetime of the session; every operation is a
/// sequence of blocking round trips, so two operations can never interleave
/// on one handle. Abandoning an operation means closing the session — the
/// card sees the connection drop, nothing more.
#[derive(Debug)]
pub struct PassVault<T: CardTransport> {
    transport: T,
}

impl<T: CardTransport> PassVault<T> {
    /// Wrap a channel on which the applet has already been selected.
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Configure the transport and select the applet.
    pub fn connect(mut transport: T) -> Result<Self> {
        transport.set_timeout(CARD_TIMEOUT)?;
        let mut vault = Self::new(transport);
        vault.select()?;
        Ok(vault)
    }

    /// Select the Passvault applet by its AID.
    pub fn select(&mut self) -> Result<()> {
        let command = CommandApdu::new(CLA_ISO, INS_SELECT, P1_SELECT_BY_AID, 0x00)
            .with_data(PASSVAULT_AID.to_vec())?
            .with_le(0x00);
        let raw = self.transport.transceive(&command.to_bytes())?;
        if !is_success(&raw, 2) {
            debug!("applet selection refused");
            return Err(Error::SelectFailed);
        }
        Ok(())
    }

    /// Store `secret` on the card, guarded by `new_pin`.
    ///
    /// See [`set_secret`].
    pub fn set_secret<R>(
        &mut self,
        rng: &mut R,
        new_pin: &[u8],
        secret: &[u8],
        old_pin: &[u8],
    ) -> Result<SecretOutcome<()>>
    where
        R: RngCore + CryptoRng,
    {
        set_secret(&mut self.transport, rng, new_pin, secret, old_pin)
    }

    /// Retrieve the card-held secret. See [`get_secret`].
    pub fn get_secret<R>(
        &mut self,
        rng: &mut R,
        pin: &[u8],
    ) -> Result<SecretOutcome<Zeroizing<Vec<u8>>>>
    where
        R: RngCore + CryptoRng,
    {
        get_secret(&mut self.transport, rng, pin)
    }

    /// Decrypt `ciphertext` with the card's password key.
    ///
    /// See [`decrypt_via_card`].
    pub fn decrypt<R>(
        &mut self,
        rng: &mut R,
        password_key_iv: &[u8; 16],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>>
    where
        R: RngCore + CryptoRng,
    {
        decrypt_via_card(&mut self.transport, rng, password_key_iv, ciphertext)
    }

    /// Install a long-term password key on the card.
    ///
    /// See [`set_password_key`].
    pub fn set_password_key<R>(&mut self, rng: &mut R, password_key: &[u8]) -> Result<()>
    where
        R: RngCore + CryptoRng,
    {
        set_password_key(&mut self.transport, rng, password_key)
    }

    /// Access the underlying transport.
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the underlying transport.
    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Close the transport, ending the card-side session.
    pub fn close(mut self) -> Result<()> {
        self.transport.close()?;
        Ok(())
    }
}
