use futures::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{trans::Message, Error, Result};

use super::Transport;

/// Default ceiling for the `packet_length` field, per RFC 4253 §6.1.
pub const MAX_PACKET_SIZE: u32 = 65536;

/// Hard ceiling an embedder may raise [`MAX_PACKET_SIZE`] up to.
pub const MAX_PACKET_SIZE_CEILING: u32 = 262_144;

/// A transport packet, reduced to its payload; framing, padding and MAC
/// only ever exist on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// The decrypted, authenticated payload.
    pub payload: Vec<u8>,
}

impl Packet {
    /// A packet over the provided payload.
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload }
    }

    /// Try to parse the payload as the provided [`Message`] type.
    pub fn to<T: Message>(&self) -> Result<T> {
        T::from_payload(&self.payload)
    }

    /// Read, decrypt and authenticate exactly one record off the reader.
    pub(crate) async fn from_reader(
        reader: &mut (impl AsyncRead + Unpin),
        transport: &mut Transport,
        seq: u32,
        max_size: u32,
    ) -> Result<Self> {
        let block_size = transport.block_size().max(Transport::MIN_ALIGN);

        // Pull a single cipher block to learn the record length.
        let mut buffer = vec![0u8; block_size];
        reader.read_exact(&mut buffer).await?;
        transport.decrypt(&mut buffer[..])?;

        let length = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]);
        if length == 0 || length > max_size {
            return Err(Error::OversizedPacket);
        }

        let total = std::mem::size_of::<u32>() + length as usize;
        if total % block_size != 0 {
            return Err(Error::BadPadding);
        }

        buffer.resize(total + transport.mac_size(), 0);
        reader.read_exact(&mut buffer[block_size..]).await?;
        transport.decrypt(&mut buffer[block_size..total])?;

        // The trailing MAC was read alongside, but is not encrypted.
        let mac = buffer.split_off(total);

        let padding = usize::from(buffer[4]);
        if padding < Transport::MIN_PAD_SIZE || padding >= length as usize {
            return Err(Error::BadPadding);
        }

        transport.open(seq, &buffer, &mac)?;

        Ok(Self {
            payload: buffer[5..total - padding].to_vec(),
        })
    }

    /// Frame, authenticate, encrypt and write the packet to the writer.
    pub(crate) async fn to_writer(
        &self,
        writer: &mut (impl AsyncWrite + Unpin),
        transport: &mut Transport,
        seq: u32,
    ) -> Result<()> {
        let padding = transport.padding(self.payload.len());
        let length = (std::mem::size_of::<u8>() + self.payload.len() + usize::from(padding)) as u32;

        let mut buffer = Vec::with_capacity(std::mem::size_of::<u32>() + length as usize);
        buffer.extend_from_slice(&length.to_be_bytes());
        buffer.push(padding);
        buffer.extend_from_slice(&self.payload);
        transport.pad(&mut buffer, padding);

        // The MAC covers the sequence number and the *plaintext* record.
        let mac = transport.seal(seq, &buffer);
        transport.encrypt(&mut buffer[..])?;

        writer.write_all(&buffer).await?;
        writer.write_all(&mac).await?;

        Ok(())
    }
}

/// Conversion of messages and raw payloads into a [`Packet`].
pub trait IntoPacket {
    /// Build the packet, serializing the payload if needed.
    fn into_packet(self) -> Result<Packet>;
}

impl IntoPacket for Packet {
    fn into_packet(self) -> Result<Packet> {
        Ok(self)
    }
}

impl<T: Message> IntoPacket for &T {
    fn into_packet(self) -> Result<Packet> {
        Ok(Packet::new(self.to_payload()?))
    }
}
