//! Local cryptographic primitives: the ephemeral transaction key and the
//! RSA key transport that delivers it to the card.

use aes::cipher::{
    BlockDecryptMut, BlockEncryptMut, Iv, IvSizeUser, Key, KeyIvInit, KeySizeUser,
    block_padding::NoPadding, typenum::U16,
};
use bytes::{Bytes, BytesMut};
use rand::{CryptoRng, RngCore};
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use zeroize::Zeroize;

use crate::constants::AES_BLOCK_SIZE;
use crate::error::{Error, Result};

type Encryptor = cbc::Encryptor<aes::Aes128>;
type Decryptor = cbc::Decryptor<aes::Aes128>;

/// Marker for the 128-bit AES-CBC cipher shared with the card.
pub struct TransactionCipher;

impl KeySizeUser for TransactionCipher {
    type KeySize = U16;
}

impl IvSizeUser for TransactionCipher {
    type IvSize = U16;
}

/// Ephemeral key material negotiated for a single protocol operation.
///
/// One AES key and IV, freshly generated per operation, held only on the
/// host for the duration of one call and wiped on drop. Reusing a pair
/// across two operations is a protocol violation; nothing here allows it.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct TransactionKey {
    key: [u8; 16],
    iv: [u8; 16],
}

impl core::fmt::Debug for TransactionKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // Key material stays out of logs.
        f.debug_struct("TransactionKey").finish_non_exhaustive()
    }
}

impl TransactionKey {
    /// Generate a fresh key and IV from a cryptographically secure source.
    pub fn generate<R>(rng: &mut R) -> Self
    where
        R: RngCore + CryptoRng,
    {
        let mut key = [0u8; 16];
        let mut iv = [0u8; 16];
        rng.fill_bytes(&mut key);
        rng.fill_bytes(&mut iv);
        Self { key, iv }
    }

    #[cfg(test)]
    pub(crate) const fn from_raw(key: [u8; 16], iv: [u8; 16]) -> Self {
        Self { key, iv }
    }

    pub(crate) const fn key_bytes(&self) -> &[u8; 16] {
        &self.key
    }

    pub(crate) const fn iv_bytes(&self) -> &[u8; 16] {
        &self.iv
    }

    fn key(&self) -> &Key<TransactionCipher> {
        self.key_bytes().into()
    }

    fn iv(&self) -> &Iv<TransactionCipher> {
        self.iv_bytes().into()
    }

    /// Encrypt a block-aligned buffer in place under the key and IV.
    pub(crate) fn encrypt(&self, data: &mut BytesMut) -> Result<Bytes> {
        let msg_len = data.len();
        let ciphertext =
            Encryptor::new(self.key(), self.iv()).encrypt_padded_mut::<NoPadding>(data, msg_len)?;
        Ok(Bytes::copy_from_slice(ciphertext))
    }

    /// Decrypt a block-aligned buffer in place under the key and IV.
    pub(crate) fn decrypt(&self, data: &mut BytesMut) -> Result<Bytes> {
        self.decrypt_with_iv(&self.iv, data)
    }

    /// Decrypt under the transaction key but a card-supplied fresh IV.
    pub(crate) fn decrypt_with_iv(&self, iv: &[u8; 16], data: &mut BytesMut) -> Result<Bytes> {
        let plaintext =
            Decryptor::new(self.key(), iv.into()).decrypt_padded_mut::<NoPadding>(data)?;
        Ok(Bytes::copy_from_slice(plaintext))
    }
}

/// RSA-encrypt key material for transport to the card.
///
/// PKCS#1 v1.5, one block; a 2048-bit card key turns 16 key bytes into 256
/// ciphertext bytes, which is why delivery goes through the scratch area.
pub(crate) fn encrypt_with_card_key<R>(
    card_key: &RsaPublicKey,
    rng: &mut R,
    plaintext: &[u8],
) -> Result<Vec<u8>>
where
    R: RngCore + CryptoRng,
{
    card_key
        .encrypt(rng, Pkcs1v15Encrypt, plaintext)
        .map_err(Error::Encryption)
}

/// Round `len` up to the next multiple of the AES block size.
pub(crate) const fn round_to_block(len: usize) -> usize {
    len.next_multiple_of(AES_BLOCK_SIZE)
}

/// Zero-pad `data` up to the next block boundary.
///
/// Already-aligned buffers, the empty one included, are left untouched.
/// The card never interprets padding bytes, so their value is fixed at
/// zero rather than derived from the payload.
pub(crate) fn pad_to_block(data: &mut BytesMut) {
    data.resize(round_to_block(data.len()), 0);
}
