//! Primitives to extract and frame binary packets over a [`Pipe`] stream.

use futures::{AsyncBufReadExt, AsyncWriteExt, FutureExt};
use futures_time::{future::FutureExt as _, time::Duration};

use crate::{Pipe, Result};

mod keys;
pub(crate) use keys::Keys;

mod packet;
pub use packet::{IntoPacket, Packet, MAX_PACKET_SIZE, MAX_PACKET_SIZE_CEILING};

mod transport;
pub(crate) use transport::{Transport, TransportPair};

/// A wrapper around a [`Pipe`] to interface with the SSH binary protocol.
pub(crate) struct Stream<S> {
    inner: S,
    timeout: Duration,

    /// The pair of transport algorithms and keys computed from the key exchange.
    transport: TransportPair,

    /// The session identifier derived from the first key exchange.
    session: Option<Vec<u8>>,

    /// Sequence number for the `tx` side.
    txseq: u32,

    /// Sequence number for the `rx` side.
    rxseq: u32,

    /// A buffer for the `peek` method.
    buffer: Option<Packet>,

    /// Ceiling for the `packet_length` field of received records.
    max_packet: u32,
}

impl<S> Stream<S>
where
    S: Pipe,
{
    pub fn new(stream: S, timeout: Duration, max_packet: u32) -> Self {
        Self {
            inner: stream,
            timeout,
            transport: Default::default(),
            session: None,
            txseq: 0,
            rxseq: 0,
            buffer: None,
            max_packet,
        }
    }

    /// Whether the first key exchange completed on this stream.
    pub fn is_keyed(&self) -> bool {
        self.session.is_some()
    }

    /// Latch the session identifier; only the very first exchange hash
    /// ever sticks, rekeys keep the original.
    pub fn with_session(&mut self, session: &[u8]) -> &[u8] {
        self.session.get_or_insert_with(|| session.to_vec())
    }

    pub fn session_id(&self) -> Option<&[u8]> {
        self.session.as_deref()
    }

    /// Replace the outgoing transport; our next sent packet is the first
    /// one under the new keys. The sequence number is untouched.
    pub fn install_tx(&mut self, transport: Transport) {
        self.transport.tx = transport;
    }

    /// Replace the incoming transport; the peer's next packet is the first
    /// one under the new keys. The sequence number is untouched.
    pub fn install_rx(&mut self, transport: Transport) {
        self.transport.rx = transport;
    }

    pub async fn fill_buf(&mut self) -> Result<()> {
        self.inner.fill_buf().await?;

        Ok(())
    }

    /// Poll the stream to detect whether data is immediately readable.
    pub async fn is_readable(&mut self) -> Result<bool> {
        futures::select_biased! {
            buf = self.inner.fill_buf().fuse() => {
                buf?;

                Ok(true)
            }
            _ = futures::future::ready(()).fuse() => {
                Ok(false)
            }
        }
    }

    /// Receive and decrypt a _packet_ from the peer without removing it
    /// from the queue.
    pub async fn peek(&mut self) -> Result<&Packet> {
        let packet = self.recv().await?;

        Ok(self.buffer.insert(packet))
    }

    /// Receive and decrypt a _packet_ from the peer.
    pub async fn recv(&mut self) -> Result<Packet> {
        match self.buffer.take() {
            Some(packet) => Ok(packet),
            None => {
                let packet = Packet::from_reader(
                    &mut self.inner,
                    &mut self.transport.rx,
                    self.rxseq,
                    self.max_packet,
                )
                .timeout(self.timeout)
                .await??;

                tracing::trace!(
                    "<~- #{}: ^{:#x} ({} bytes)",
                    self.rxseq,
                    packet.payload.first().copied().unwrap_or_default(),
                    packet.payload.len(),
                );

                self.rxseq = self.rxseq.wrapping_add(1);

                Ok(packet)
            }
        }
    }

    /// Encrypt and send a _packet_ to the peer.
    pub async fn send(&mut self, packet: impl IntoPacket) -> Result<()> {
        let packet = packet.into_packet()?;

        packet
            .to_writer(&mut self.inner, &mut self.transport.tx, self.txseq)
            .timeout(self.timeout)
            .await??;
        self.inner.flush().await?;

        tracing::trace!(
            "-~> #{}: ^{:#x} ({} bytes)",
            self.txseq,
            packet.payload.first().copied().unwrap_or_default(),
            packet.payload.len(),
        );

        self.txseq = self.txseq.wrapping_add(1);

        Ok(())
    }
}
