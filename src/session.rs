//! A client session wrapping a `stream` to handle **key-exchange** and
//! **[`SSH-TRANS`]** layer messages.
//!
//! [`SSH-TRANS`]: https://datatracker.ietf.org/doc/html/rfc4253

use either::Either;
use futures::{AsyncBufRead, AsyncWrite, AsyncWriteExt};
use futures_time::future::FutureExt;

use crate::{
    algorithm::kex,
    client::Client,
    error::{DisconnectedBy, DisconnectedError, Error, Result},
    stream::{IntoPacket, Packet, Stream, TransportPair, MAX_PACKET_SIZE_CEILING},
    trans::{self, DisconnectReason, KexInit, Message, NewKeys},
    Id,
};

/// A trait alias for something _pipe-alike_, implementing [`AsyncBufRead`] and [`AsyncWrite`].
pub trait Pipe: AsyncBufRead + AsyncWrite + Unpin + Send + Sync + 'static {}
impl<T: AsyncBufRead + AsyncWrite + Unpin + Send + Sync + 'static> Pipe for T {}

/// A client session over a [`Pipe`] stream, driving the identification
/// exchange, the key exchanges and the transport-layer message hygiene.
pub struct Session<IO: Pipe> {
    stream: Either<Stream<IO>, DisconnectedError>,
    config: Client,

    peer_id: Id,
}

impl<IO> Session<IO>
where
    IO: Pipe,
{
    /// Create a new [`Session`] from a [`Pipe`] stream and some
    /// configuration, exchanging identification strings right away.
    pub async fn new(mut stream: IO, config: Client) -> Result<Self> {
        config.id.to_async_writer(&mut stream).await?;
        stream.flush().await?;

        let peer_id = Id::from_async_reader(&mut stream)
            .timeout(futures_time::time::Duration::from(config.timeout))
            .await??;

        if !peer_id.is_v2() {
            return Err(Error::Protocol);
        }

        let stream = Stream::new(
            stream,
            config.timeout.into(),
            config.max_packet_size.min(MAX_PACKET_SIZE_CEILING),
        );

        tracing::debug!("Session started with peer `{peer_id}`");

        Ok(Self {
            stream: Either::Left(stream),
            config,
            peer_id,
        })
    }

    /// Access the [`Id`] of the connected peer.
    pub fn peer_id(&self) -> &Id {
        &self.peer_id
    }

    /// Access the initial exchange hash.
    pub fn session_id(&self) -> Option<&[u8]> {
        self.stream.as_ref().left().and_then(Stream::session_id)
    }

    /// Receive a _packet_ from the connected peer.
    ///
    /// The first call drives the initial key exchange; later calls run a
    /// rekey whenever the peer requests one with a `KEXINIT`.
    pub async fn recv(&mut self) -> Result<Packet> {
        loop {
            let stream = match &mut self.stream {
                Either::Left(stream) => stream,
                Either::Right(err) => return Err(err.clone().into()),
            };

            let kex_pending = if !stream.is_keyed() {
                true
            } else {
                match stream.peek().await {
                    Ok(packet) => packet.to::<KexInit>().is_ok(),
                    Err(err) => return Err(self.failed(err).await),
                }
            };

            if kex_pending {
                if let Err(err) = rekey(&self.config, stream, &self.peer_id).await {
                    return Err(self.failed(err).await);
                }

                continue;
            }

            let packet = match stream.recv().await {
                Ok(packet) => packet,
                Err(err) => return Err(self.failed(err).await),
            };

            if let Ok(trans::Disconnect {
                reason,
                description,
                ..
            }) = packet.to()
            {
                tracing::warn!("Peer disconnected with `{reason:?}`: {description}");

                let err = DisconnectedError {
                    by: DisconnectedBy::Them,
                    reason,
                    description,
                };
                self.stream = Either::Right(err.clone());

                return Err(err.into());
            } else if let Ok(trans::Ignore { data }) = packet.to() {
                tracing::debug!("Received an 'ignore' message with length {}", data.len());
            } else if let Ok(trans::Unimplemented { seq }) = packet.to() {
                tracing::debug!("Received an 'unimplemented' message about packet #{seq}");
            } else if let Ok(trans::Debug { message, .. }) = packet.to() {
                tracing::debug!("Received a 'debug' message: {message}");
            } else {
                return Ok(packet);
            }
        }
    }

    /// Send a _packet_ to the connected peer, driving any key exchange
    /// that is due beforehand.
    pub async fn send(&mut self, message: impl IntoPacket) -> Result<()> {
        let stream = match &mut self.stream {
            Either::Left(stream) => stream,
            Either::Right(err) => return Err(err.clone().into()),
        };

        let kex_pending = if !stream.is_keyed() {
            true
        } else {
            match stream.is_readable().await {
                Ok(true) => match stream.peek().await {
                    Ok(packet) => packet.to::<KexInit>().is_ok(),
                    Err(err) => return Err(self.failed(err).await),
                },
                Ok(false) => false,
                Err(err) => return Err(self.failed(err).await),
            }
        };

        if kex_pending {
            if let Err(err) = rekey(&self.config, stream, &self.peer_id).await {
                return Err(self.failed(err).await);
            }
        }

        let stream = match &mut self.stream {
            Either::Left(stream) => stream,
            Either::Right(err) => return Err(err.clone().into()),
        };

        match stream.send(message).await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.failed(err).await),
        }
    }

    /// Send a _disconnect message_ to the peer and shutdown the session.
    pub async fn disconnect(
        &mut self,
        reason: DisconnectReason,
        description: impl Into<String>,
    ) -> DisconnectedError {
        let stream = match &mut self.stream {
            Either::Left(stream) => stream,
            Either::Right(err) => return err.clone(),
        };

        let message = trans::Disconnect {
            reason,
            description: description.into(),
            language: Default::default(),
        };
        if let Err(Error::Disconnected(err)) = stream.send(&message).await {
            return err;
        }

        let err = DisconnectedError {
            by: DisconnectedBy::Us,
            reason,
            description: message.description,
        };
        self.stream = Either::Right(err.clone());

        err
    }

    /// Advertise a fatal `err` to the peer with its mapped disconnect
    /// reason, best-effort, then hand it back to the caller.
    async fn failed(&mut self, err: Error) -> Error {
        if let Some(reason) = err.disconnect_reason() {
            let _ = self.disconnect(reason, err.to_string()).await;
        }

        err
    }
}

/// Run one whole key exchange on the stream: `KEXINIT` both ways, the
/// negotiated kex algorithm, then the `NEWKEYS` switch per direction.
async fn rekey<IO: Pipe>(config: &Client, stream: &mut Stream<IO>, peer_id: &Id) -> Result<()> {
    tracing::debug!("Starting key-exchange procedure");

    let kexinit = config.kexinit();
    let i_c = kexinit.to_payload()?;
    stream.send(&kexinit).await?;

    // The peer's KEXINIT payload is kept verbatim, it is covered by the
    // exchange hash.
    let packet = kex::recv_unignored(stream).await?;
    let peerkexinit: KexInit = packet.to()?;
    let i_s = packet.payload;

    let algorithm = kex::negociate(&kexinit, &peerkexinit)?;
    tracing::debug!("Negociated key-exchange algorithm `{}`", algorithm.as_ref());

    let TransportPair { tx, rx } = algorithm
        .as_client(stream, config, peer_id, &kexinit, &peerkexinit, &i_c, &i_s)
        .await?;

    // Our NEWKEYS is the last packet under the old keys, their NEWKEYS
    // the last one we accept under the old ones.
    stream.send(&NewKeys).await?;
    stream.install_tx(tx);

    kex::recv_unignored(stream).await?.to::<NewKeys>()?;
    stream.install_rx(rx);

    tracing::debug!("Key exchange success");

    Ok(())
}
