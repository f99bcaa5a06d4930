//! Host-side driver for the Passvault contactless secret-storage applet.
//!
//! The applet keeps an opaque secret behind a PIN and lends out its AES
//! engine for bulk decryption. The host reaches it through a synchronous
//! [`CardTransport`] and speaks a small command set on top of APDU frames:
//! fetch the card's RSA key, negotiate an ephemeral transaction key through
//! the card-side scratch buffer, then run one PIN-gated or bulk operation
//! under that key. Every operation negotiates its own key; nothing secret
//! survives the call that created it.

mod apdu;
mod application;
mod card_key;
mod constants;
mod crypto;
mod decrypt;
mod error;
mod scratch;
mod secrets;
mod secure_channel;
mod transport;

pub use apdu::{CommandApdu, ResponseApdu, is_success, read_u16_be, write_u16_be};
pub use application::{CARD_TIMEOUT, PassVault};
pub use card_key::fetch_card_pubkey;
pub use constants::*;
pub use crypto::{TransactionCipher, TransactionKey};
pub use decrypt::decrypt_via_card;
pub use error::{Error, Result};
pub use scratch::write_scratch;
pub use secrets::{SecretOutcome, get_secret, set_secret};
pub use secure_channel::{establish_transaction_key, set_password_key};
pub use transport::{CardTransport, TransportError};
