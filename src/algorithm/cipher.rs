use cipher::{Block, BlockDecryptMut, BlockEncryptMut, BlockSizeUser, KeyIvInit, StreamCipher};
use strum::{AsRefStr, EnumString};

use crate::{trans::KexInit, Error, Result};

pub(crate) fn negociate(clientkex: &KexInit, serverkex: &KexInit) -> Result<(Cipher, Cipher)> {
    Ok((
        clientkex
            .encryption_algorithms_client_to_server
            .preferred_in(&serverkex.encryption_algorithms_client_to_server)
            .ok_or(Error::NoCommonCipher)?
            .parse()
            .map_err(|_| Error::NoCommonCipher)?,
        clientkex
            .encryption_algorithms_server_to_client
            .preferred_in(&serverkex.encryption_algorithms_server_to_client)
            .ok_or(Error::NoCommonCipher)?
            .parse()
            .map_err(|_| Error::NoCommonCipher)?,
    ))
}

/// SSH cipher algorithms.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Cipher {
    /// AES-256 in counter (CTR) mode.
    Aes256Ctr,

    /// AES-192 in counter (CTR) mode.
    Aes192Ctr,

    /// AES-128 in counter (CTR) mode.
    Aes128Ctr,

    /// AES-256 in cipher block chaining (CBC) mode.
    Aes256Cbc,

    /// AES-192 in cipher block chaining (CBC) mode.
    Aes192Cbc,

    /// AES-128 in cipher block chaining (CBC) mode.
    Aes128Cbc,

    /// No cipher algorithm.
    #[default]
    None,
}

impl Cipher {
    /// Block length the record layer aligns on; `none` counts as 8.
    pub(crate) fn block_size(&self) -> usize {
        // Every supported cipher is AES.
        match self {
            Self::None => 8,
            _ => 16,
        }
    }

    pub(crate) fn key_size(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Aes128Ctr | Self::Aes128Cbc => 16,
            Self::Aes192Ctr | Self::Aes192Cbc => 24,
            Self::Aes256Ctr | Self::Aes256Cbc => 32,
        }
    }

    pub(crate) fn iv_size(&self) -> usize {
        match self {
            Self::None => 0,
            _ => 16,
        }
    }
}

/// The running cipher context of one half of a stream direction, created
/// lazily at the first record after a key install.
///
/// A CTR keystream runs identically on both halves; CBC chains through a
/// distinct encryptor or decryptor.
pub(crate) enum CipherState {
    Aes128Ctr(ctr::Ctr128BE<aes::Aes128>),
    Aes192Ctr(ctr::Ctr128BE<aes::Aes192>),
    Aes256Ctr(ctr::Ctr128BE<aes::Aes256>),

    SealAes128Cbc(cbc::Encryptor<aes::Aes128>),
    SealAes192Cbc(cbc::Encryptor<aes::Aes192>),
    SealAes256Cbc(cbc::Encryptor<aes::Aes256>),

    OpenAes128Cbc(cbc::Decryptor<aes::Aes128>),
    OpenAes192Cbc(cbc::Decryptor<aes::Aes192>),
    OpenAes256Cbc(cbc::Decryptor<aes::Aes256>),
}

impl CipherState {
    /// The context sealing (encrypting) records of a direction, or `None`
    /// under the `none` cipher.
    pub(crate) fn sealing(cipher: &Cipher, key: &[u8], iv: &[u8]) -> Result<Option<Self>> {
        Ok(Some(match cipher {
            Cipher::Aes128Ctr => Self::Aes128Ctr(init(key, iv)?),
            Cipher::Aes192Ctr => Self::Aes192Ctr(init(key, iv)?),
            Cipher::Aes256Ctr => Self::Aes256Ctr(init(key, iv)?),
            Cipher::Aes128Cbc => Self::SealAes128Cbc(init(key, iv)?),
            Cipher::Aes192Cbc => Self::SealAes192Cbc(init(key, iv)?),
            Cipher::Aes256Cbc => Self::SealAes256Cbc(init(key, iv)?),
            Cipher::None => return Ok(None),
        }))
    }

    /// The context opening (decrypting) records of a direction, or `None`
    /// under the `none` cipher.
    pub(crate) fn opening(cipher: &Cipher, key: &[u8], iv: &[u8]) -> Result<Option<Self>> {
        Ok(Some(match cipher {
            Cipher::Aes128Ctr => Self::Aes128Ctr(init(key, iv)?),
            Cipher::Aes192Ctr => Self::Aes192Ctr(init(key, iv)?),
            Cipher::Aes256Ctr => Self::Aes256Ctr(init(key, iv)?),
            Cipher::Aes128Cbc => Self::OpenAes128Cbc(init(key, iv)?),
            Cipher::Aes192Cbc => Self::OpenAes192Cbc(init(key, iv)?),
            Cipher::Aes256Cbc => Self::OpenAes256Cbc(init(key, iv)?),
            Cipher::None => return Ok(None),
        }))
    }

    /// Run the context over one block-aligned record region, in place.
    pub(crate) fn apply(&mut self, buffer: &mut [u8]) -> Result<()> {
        match self {
            Self::Aes128Ctr(state) => keystream(state, buffer),
            Self::Aes192Ctr(state) => keystream(state, buffer),
            Self::Aes256Ctr(state) => keystream(state, buffer),
            Self::SealAes128Cbc(state) => seal_blocks(state, buffer),
            Self::SealAes192Cbc(state) => seal_blocks(state, buffer),
            Self::SealAes256Cbc(state) => seal_blocks(state, buffer),
            Self::OpenAes128Cbc(state) => open_blocks(state, buffer),
            Self::OpenAes192Cbc(state) => open_blocks(state, buffer),
            Self::OpenAes256Cbc(state) => open_blocks(state, buffer),
        }
    }
}

fn init<C: KeyIvInit>(key: &[u8], iv: &[u8]) -> Result<C> {
    C::new_from_slices(key, iv).map_err(|_| Error::Cipher)
}

fn keystream<C: StreamCipher>(state: &mut C, buffer: &mut [u8]) -> Result<()> {
    state.try_apply_keystream(buffer).map_err(|_| Error::Cipher)
}

fn seal_blocks<C: BlockEncryptMut>(state: &mut C, buffer: &mut [u8]) -> Result<()> {
    for block in aligned::<C>(buffer)? {
        state.encrypt_block_mut(block);
    }

    Ok(())
}

fn open_blocks<C: BlockDecryptMut>(state: &mut C, buffer: &mut [u8]) -> Result<()> {
    for block in aligned::<C>(buffer)? {
        state.decrypt_block_mut(block);
    }

    Ok(())
}

fn aligned<'b, C: BlockSizeUser>(
    buffer: &'b mut [u8],
) -> Result<impl Iterator<Item = &'b mut Block<C>> + 'b> {
    if buffer.len() % C::block_size() != 0 {
        return Err(Error::Cipher);
    }

    Ok(buffer
        .chunks_exact_mut(C::block_size())
        .map(Block::<C>::from_mut_slice))
}
