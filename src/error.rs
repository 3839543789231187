//! Collection of error handling types and aliases.

use thiserror::Error;

use crate::trans::DisconnectReason;

/// The disconnection side for [`DisconnectedError`].
#[derive(Debug, Clone)]
pub enum DisconnectedBy {
    /// The session has been disconnected by _us_.
    Us,

    /// The session has been disconnected by _them_.
    Them,
}

/// The error type describing disconnect.
#[must_use]
#[derive(Debug, Error, Clone)]
#[error("The session has been disconnected by {by:?} for {reason:?}: {description}")]
pub struct DisconnectedError {
    /// Side that sent the disconnect message.
    pub by: DisconnectedBy,

    /// Reason for disconnect.
    pub reason: DisconnectReason,

    /// Description of the disconnect reason.
    pub description: String,
}

/// The error types that can occur when manipulating this crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// I/O Error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Binary (de)-serialization error.
    #[error("Received a malformed field or message")]
    Malformed,

    /// An encode grew past the codec's configured ceiling.
    #[error("Encoded message would exceed the buffer growth limit")]
    TooLarge,

    /// The `packet_length` field fell outside of the permitted range.
    #[error("Received a packet with an out-of-bounds length field")]
    OversizedPacket,

    /// The `padding_length` or record alignment invariant was broken.
    #[error("Received a packet with broken padding or alignment")]
    BadPadding,

    /// Packet integrity error.
    #[error(transparent)]
    BadMac(#[from] digest::MacError),

    /// SSH Key error.
    #[error(transparent)]
    Key(#[from] ssh_key::Error),

    /// Signature verification error during the key-exchange.
    #[error(transparent)]
    Signature(#[from] signature::Error),

    /// The host-identity hook rejected the presented host key.
    #[error("The server's host key has been rejected")]
    UntrustedHost,

    /// No common kex algorithm found between both sides.
    #[error("Unable to negociate a common kex algorithm")]
    NoCommonKex,

    /// No common key algorithm found between both sides.
    #[error("Unable to negociate a common host key algorithm")]
    NoCommonKey,

    /// No common cipher algorithm found between both sides.
    #[error("Unable to negociate a common encryption algorithm")]
    NoCommonCipher,

    /// No common hmac algorithm found between both sides.
    #[error("Unable to negociate a common HMAC algorithm")]
    NoCommonHmac,

    /// No common compression algorithm found between both sides.
    #[error("Unable to negociate a common compression algorithm")]
    NoCommonCompression,

    /// Protocol error in the key-exchange.
    #[error("Error in the key-exchange algorithm")]
    KexError,

    /// Error while encrypting or decrypting messages.
    #[error("The cipher ended up in an error")]
    Cipher,

    /// The message received was unexpected in the current context.
    #[error("Peer sent a message that made no sense in the current context")]
    UnexpectedMessage,

    /// A behavior the protocol forbids, without a more precise class.
    #[error("Peer violated the transport protocol")]
    Protocol,

    /// The session has been disconnected.
    #[error(transparent)]
    Disconnected(#[from] DisconnectedError),
}

impl Error {
    /// The [`DisconnectReason`] to advertise to the peer before dropping
    /// the connection over this error, if any applies.
    pub(crate) fn disconnect_reason(&self) -> Option<DisconnectReason> {
        match self {
            Self::Io(_) | Self::Disconnected(_) => None,
            Self::BadMac(_) => Some(DisconnectReason::MacError),
            Self::UntrustedHost => Some(DisconnectReason::HostKeyNotVerifiable),
            Self::Signature(_)
            | Self::Key(_)
            | Self::KexError
            | Self::NoCommonKex
            | Self::NoCommonKey
            | Self::NoCommonCipher
            | Self::NoCommonHmac
            | Self::NoCommonCompression => Some(DisconnectReason::KeyExchangeFailed),
            _ => Some(DisconnectReason::ProtocolError),
        }
    }
}

/// A handy [`std::result::Result`] type alias bounding the [`enum@Error`] struct as `E`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
