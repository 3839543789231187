use std::fmt;

use rand::Rng;
use secrecy::ExposeSecret;

use crate::{
    algorithm::{self, Cipher, CipherState},
    Result,
};

use super::Keys;

/// The transport state for both directions, `tx` ours, `rx` theirs.
#[derive(Debug, Default)]
pub(crate) struct TransportPair {
    pub tx: Transport,
    pub rx: Transport,
}

/// The transport state of a single direction: negotiated algorithms,
/// derived keys and the running cipher context.
#[derive(Default)]
pub(crate) struct Transport {
    pub compress: algorithm::Compress,
    pub cipher: algorithm::Cipher,
    pub hmac: algorithm::Hmac,

    pub state: Option<CipherState>,
    pub chain: Keys,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("compress", &self.compress)
            .field("cipher", &self.cipher)
            .field("hmac", &self.hmac)
            .finish_non_exhaustive()
    }
}

impl Transport {
    pub const MIN_PAD_SIZE: usize = 4;
    pub const MIN_ALIGN: usize = 8;

    pub fn block_size(&self) -> usize {
        self.cipher.block_size()
    }

    pub fn mac_size(&self) -> usize {
        self.hmac.size()
    }

    /// The padding length framing a `payload` of the provided size, so that
    /// the whole record is aligned on the cipher block size.
    pub fn padding(&self, payload: usize) -> u8 {
        let align = self.block_size().max(Self::MIN_ALIGN);

        let size = std::mem::size_of::<u32>() + std::mem::size_of::<u8>() + payload;
        let padding = align - size % align;

        if padding < Self::MIN_PAD_SIZE {
            (padding + align) as u8
        } else {
            padding as u8
        }
    }

    /// Append `padding` bytes of filler: random under an active cipher,
    /// a fixed `0xff` before one is installed so records stay deterministic.
    pub fn pad(&self, buffer: &mut Vec<u8>, padding: u8) {
        if self.cipher == Cipher::None {
            buffer.resize(buffer.len() + usize::from(padding), 0xff);
        } else {
            let mut rng = rand::thread_rng();

            buffer.resize_with(buffer.len() + usize::from(padding), || rng.gen());
        }
    }

    pub fn encrypt<B: AsMut<[u8]>>(&mut self, mut buffer: B) -> Result<()> {
        if self.state.is_none() {
            self.state = CipherState::sealing(
                &self.cipher,
                self.chain.key.expose_secret(),
                self.chain.iv.expose_secret(),
            )?;
        }

        match &mut self.state {
            Some(state) => state.apply(buffer.as_mut()),
            None => Ok(()),
        }
    }

    pub fn decrypt<B: AsMut<[u8]>>(&mut self, mut buffer: B) -> Result<()> {
        if self.state.is_none() {
            self.state = CipherState::opening(
                &self.cipher,
                self.chain.key.expose_secret(),
                self.chain.iv.expose_secret(),
            )?;
        }

        match &mut self.state {
            Some(state) => state.apply(buffer.as_mut()),
            None => Ok(()),
        }
    }

    /// The MAC over `seq ‖ plaintext`, empty when no algorithm is installed.
    pub fn seal(&self, seq: u32, buffer: &[u8]) -> Vec<u8> {
        self.hmac.sign(seq, buffer, self.chain.hmac.expose_secret())
    }

    /// Verify the received MAC over `seq ‖ plaintext`, in constant time.
    pub fn open(&self, seq: u32, buffer: &[u8], mac: &[u8]) -> Result<()> {
        if self.hmac.size() > 0 {
            self.hmac
                .verify(seq, buffer, self.chain.hmac.expose_secret(), mac)?;
        }

        Ok(())
    }
}
