/// Application identifier of the Passvault applet.
pub const PASSVAULT_AID: &[u8] = &[
    0xA0, 0x00, 0x00, 0x07, 0x47, 0x00, 0x99, 0x84, 0x8A, 0x60,
];

/// Class byte shared by every Passvault command.
pub const CLA_PASSVAULT: u8 = 0xB0;

/// Status word the card appends to every successfully transported response.
pub const SW_SUCCESS: u16 = 0x9000;

/// AES block size; every encrypted payload is padded to a multiple of this.
pub const AES_BLOCK_SIZE: usize = 16;

/// Largest payload streamed to the card in one frame. Leaves headroom below
/// the 255-byte frame cap.
pub const MAX_CHUNK_SIZE: usize = 120;

/// Largest ciphertext chunk delegated to the card in one frame:
/// [`MAX_CHUNK_SIZE`] rounded down to a whole number of AES blocks.
pub const MAX_DECRYPT_CHUNK: usize = (MAX_CHUNK_SIZE / AES_BLOCK_SIZE) * AES_BLOCK_SIZE;

/// Instruction bytes of the applet's command set.
pub mod ins {
    /// Fetch the card's RSA public key (exponent, then modulus chunks).
    pub const GET_CARD_PUBKEY: u8 = 0x70;
    /// Adopt the long-term password key staged in the scratch area.
    pub const SET_PASSWORD_KEY: u8 = 0x71;
    /// Adopt the transaction key staged in the scratch area; payload is the IV.
    pub const SET_TRANSACTION_KEY: u8 = 0x72;
    /// Prime the card's AES engines for a bulk decryption.
    pub const PREPARE_DECRYPTION: u8 = 0x73;
    /// Decrypt one chunk and rewrap it under the transaction key.
    pub const DECRYPT_BLOCK: u8 = 0x74;
    /// Write one offset-addressed chunk into the scratch area.
    pub const WRITE_TO_SCRATCH: u8 = 0x77;
    /// Store the PIN-protected secret.
    pub const SET_SECRET_DATA: u8 = 0x78;
    /// Retrieve the PIN-protected secret.
    pub const GET_SECRET_DATA: u8 = 0x79;
}

/// Logical result codes carried in the leading response byte of
/// data-returning commands.
pub mod result_code {
    /// The operation succeeded.
    pub const SUCCESS: u8 = 0x01;
    /// The supplied PIN did not match.
    pub const WRONG_PIN: u8 = 0x03;
}
