//! A card-side model of the Passvault applet, faithful enough to exercise
//! every protocol flow without hardware: RSA key exposure, scratch
//! assembly, transaction-key adoption, bulk decryption through chained AES
//! engines, and the PIN-gated secret store with its nested response
//! encryption.

use std::sync::OnceLock;
use std::time::Duration;

use aes::Aes128;
use aes::cipher::{Block, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use passvault::{
    CLA_PASSVAULT, CardTransport, PASSVAULT_AID, TransportError, ins, read_u16_be, result_code,
    write_u16_be,
};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};

type CbcEnc = cbc::Encryptor<Aes128>;
type CbcDec = cbc::Decryptor<Aes128>;

/// The IV the simulated card picks for every get-secret answer.
pub const FRESH_RESPONSE_IV: [u8; 16] = [0x5A; 16];

/// One card key for the whole test binary; generation is the slow part.
fn shared_card_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap())
}

/// AES-128-CBC encrypt `data` in place, no padding.
pub fn cbc_encrypt_in_place(key: &[u8; 16], iv: &[u8; 16], data: &mut [u8]) {
    assert_eq!(data.len() % 16, 0);
    let mut engine = CbcEnc::new(key.into(), iv.into());
    for block in data.chunks_mut(16) {
        engine.encrypt_block_mut(Block::<Aes128>::from_mut_slice(block));
    }
}

/// AES-128-CBC decrypt `data` in place, no padding.
pub fn cbc_decrypt_in_place(key: &[u8; 16], iv: &[u8; 16], data: &mut [u8]) {
    assert_eq!(data.len() % 16, 0);
    let mut engine = CbcDec::new(key.into(), iv.into());
    for block in data.chunks_mut(16) {
        engine.decrypt_block_mut(Block::<Aes128>::from_mut_slice(block));
    }
}

pub struct SimulatedCard {
    key: RsaPrivateKey,
    modulus_chunk: usize,
    scratch: Vec<u8>,
    transaction: Option<([u8; 16], [u8; 16])>,
    password_key: Option<[u8; 16]>,
    dec_engine: Option<CbcDec>,
    enc_engine: Option<CbcEnc>,
    secret: Vec<u8>,
    pin: Vec<u8>,
    pub selected: bool,
    pub timeout: Option<Duration>,
}

impl SimulatedCard {
    pub fn new() -> Self {
        Self {
            key: shared_card_key().clone(),
            modulus_chunk: 120,
            scratch: Vec::new(),
            transaction: None,
            password_key: None,
            dec_engine: None,
            enc_engine: None,
            secret: Vec::new(),
            pin: Vec::new(),
            selected: false,
            timeout: None,
        }
    }

    /// Serve the modulus in rounds of at most `chunk` bytes.
    pub fn with_modulus_chunk(mut self, chunk: usize) -> Self {
        assert!(chunk > 0);
        self.modulus_chunk = chunk;
        self
    }

    pub fn public_modulus(&self) -> Vec<u8> {
        self.key.n().to_bytes_be()
    }

    pub fn public_exponent(&self) -> Vec<u8> {
        self.key.e().to_bytes_be()
    }

    pub fn has_transaction_key(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn stored_secret(&self) -> &[u8] {
        &self.secret
    }

    fn handle(&mut self, frame: &[u8]) -> Vec<u8> {
        assert!(frame.len() >= 5, "frame shorter than its header");
        let lc = frame[4] as usize;
        let data = &frame[5..5 + lc];

        if frame[0] == 0x00 && frame[1] == 0xA4 {
            assert_eq!(data, PASSVAULT_AID, "selected a foreign applet");
            self.selected = true;
            return vec![0x90, 0x00];
        }
        assert_eq!(frame[0], CLA_PASSVAULT, "unexpected class byte");
        assert_eq!(&frame[2..4], &[0, 0], "P1/P2 must be zero");

        match frame[1] {
            ins::GET_CARD_PUBKEY => self.get_pubkey(data),
            ins::WRITE_TO_SCRATCH => self.write_scratch(data),
            ins::SET_TRANSACTION_KEY => self.set_transaction_key(data),
            ins::SET_PASSWORD_KEY => self.set_password_key(),
            ins::PREPARE_DECRYPTION => self.prepare_decryption(data),
            ins::DECRYPT_BLOCK => self.decrypt_block(data),
            ins::SET_SECRET_DATA => self.set_secret_data(data),
            ins::GET_SECRET_DATA => self.get_secret_data(data),
            other => panic!("unknown instruction {other:#04x}"),
        }
    }

    fn get_pubkey(&self, data: &[u8]) -> Vec<u8> {
        match data[0] {
            1 => {
                let exponent = self.public_exponent();
                let mut response = vec![result_code::SUCCESS, 0x00, exponent.len() as u8];
                response.extend_from_slice(&exponent);
                response.extend_from_slice(&[0x90, 0x00]);
                response
            }
            2 => {
                let modulus = self.public_modulus();
                let offset = read_u16_be(data, 1) as usize;
                assert!(offset < modulus.len(), "modulus offset out of range");
                let end = usize::min(offset + self.modulus_chunk, modulus.len());
                let chunk = &modulus[offset..end];

                let mut response = vec![result_code::SUCCESS, 0, 0, 0, 0];
                write_u16_be(&mut response, 1, chunk.len() as u16);
                write_u16_be(&mut response, 3, (modulus.len() - end) as u16);
                response.extend_from_slice(chunk);
                response.extend_from_slice(&[0x90, 0x00]);
                response
            }
            other => panic!("unknown pubkey selector {other}"),
        }
    }

    fn write_scratch(&mut self, data: &[u8]) -> Vec<u8> {
        let offset = read_u16_be(data, 0) as usize;
        let chunk = &data[2..];
        // A write starting over replaces the previous payload.
        if offset == 0 {
            self.scratch.clear();
        }
        assert_eq!(offset, self.scratch.len(), "scratch writes must be in order");
        self.scratch.extend_from_slice(chunk);
        vec![0x90, 0x00]
    }

    fn unwrap_scratch(&self) -> [u8; 16] {
        let plaintext = self
            .key
            .decrypt(Pkcs1v15Encrypt, &self.scratch)
            .expect("scratch does not hold a valid key block");
        plaintext.as_slice().try_into().expect("wrapped key is not 16 bytes")
    }

    fn set_transaction_key(&mut self, data: &[u8]) -> Vec<u8> {
        let iv: [u8; 16] = data.try_into().expect("transaction IV is not 16 bytes");
        self.transaction = Some((self.unwrap_scratch(), iv));
        vec![0x90, 0x00]
    }

    fn set_password_key(&mut self) -> Vec<u8> {
        self.password_key = Some(self.unwrap_scratch());
        vec![0x90, 0x00]
    }

    fn prepare_decryption(&mut self, data: &[u8]) -> Vec<u8> {
        let password_iv: [u8; 16] = data.try_into().expect("password IV is not 16 bytes");
        let password_key = self.password_key.expect("no password key installed");
        let (key, iv) = self.transaction.expect("no transaction key adopted");

        self.dec_engine = Some(CbcDec::new((&password_key).into(), (&password_iv).into()));
        self.enc_engine = Some(CbcEnc::new((&key).into(), (&iv).into()));
        vec![0x90, 0x00]
    }

    fn decrypt_block(&mut self, data: &[u8]) -> Vec<u8> {
        assert_eq!(data.len() % 16, 0, "decrypt chunk is not block aligned");
        let mut buffer = data.to_vec();
        let dec = self.dec_engine.as_mut().expect("decryption not prepared");
        for block in buffer.chunks_mut(16) {
            dec.decrypt_block_mut(Block::<Aes128>::from_mut_slice(block));
        }
        let enc = self.enc_engine.as_mut().expect("decryption not prepared");
        for block in buffer.chunks_mut(16) {
            enc.encrypt_block_mut(Block::<Aes128>::from_mut_slice(block));
        }

        let mut response = vec![result_code::SUCCESS];
        response.extend_from_slice(&buffer);
        response.extend_from_slice(&[0x90, 0x00]);
        response
    }

    fn open_request(&self, data: &[u8]) -> Vec<u8> {
        let (key, iv) = self.transaction.expect("no transaction key adopted");
        let mut buffer = data.to_vec();
        cbc_decrypt_in_place(&key, &iv, &mut buffer);
        buffer
    }

    fn set_secret_data(&mut self, data: &[u8]) -> Vec<u8> {
        let request = self.open_request(data);
        let secret_len = read_u16_be(&request, 0) as usize;
        let old_pin_len = read_u16_be(&request, 2) as usize;
        let new_pin_len = read_u16_be(&request, 4) as usize;

        let mut pos = 6;
        let secret = &request[pos..pos + secret_len];
        pos += secret_len;
        let old_pin = &request[pos..pos + old_pin_len];
        pos += old_pin_len;
        let new_pin = &request[pos..pos + new_pin_len];

        if old_pin != self.pin {
            return vec![result_code::WRONG_PIN, 0x90, 0x00];
        }
        self.secret = secret.to_vec();
        self.pin = new_pin.to_vec();
        vec![result_code::SUCCESS, 0x90, 0x00]
    }

    fn get_secret_data(&mut self, data: &[u8]) -> Vec<u8> {
        let request = self.open_request(data);
        let pin_len = read_u16_be(&request, 0) as usize;
        if &request[2..2 + pin_len] != self.pin {
            return vec![result_code::WRONG_PIN, 0x90, 0x00];
        }

        let (key, _) = self.transaction.expect("no transaction key adopted");
        let mut block = vec![0u8; 2 + self.secret.len()];
        write_u16_be(&mut block, 0, self.secret.len() as u16);
        block[2..].copy_from_slice(&self.secret);
        block.resize(block.len().next_multiple_of(16), 0);
        cbc_encrypt_in_place(&key, &FRESH_RESPONSE_IV, &mut block);

        let mut response = vec![result_code::SUCCESS, 0x00];
        response.extend_from_slice(&FRESH_RESPONSE_IV);
        response.extend_from_slice(&block);
        response.extend_from_slice(&[0x90, 0x00]);
        response
    }
}

impl Default for SimulatedCard {
    fn default() -> Self {
        Self::new()
    }
}

impl CardTransport for SimulatedCard {
    fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, TransportError> {
        Ok(self.handle(command))
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), TransportError> {
        self.timeout = Some(timeout);
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.selected = false;
        Ok(())
    }
}
