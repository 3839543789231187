//! Typed **[`SSH-TRANS`]** messages and their wire codecs.
//!
//! [`SSH-TRANS`]: https://datatracker.ietf.org/doc/html/rfc4253

use crate::{
    wire::{Decoder, Encoder, MpInt, NameList},
    Error, Result,
};

/// A message of the transport layer, identified by the first byte of the
/// packet payload.
pub trait Message: Sized {
    /// The assigned message number.
    const NUMBER: u8;

    /// Encode the message fields, message number excluded.
    fn encode(&self, buffer: &mut Encoder) -> Result<()>;

    /// Decode the message fields, message number excluded.
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self>;

    /// Serialize the whole payload, message number included.
    fn to_payload(&self) -> Result<Vec<u8>> {
        let mut buffer = Encoder::new();

        buffer.write_u8(Self::NUMBER)?;
        self.encode(&mut buffer)?;

        Ok(buffer.into_inner())
    }

    /// Parse the message from a whole payload, message number included.
    fn from_payload(payload: &[u8]) -> Result<Self> {
        let mut decoder = Decoder::new(payload);

        if decoder.read_u8()? != Self::NUMBER {
            return Err(Error::UnexpectedMessage);
        }

        Self::decode(&mut decoder)
    }
}

/// The `SSH_MSG_DISCONNECT` reason codes, per RFC 4253 §11.1.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DisconnectReason {
    /// `SSH_DISCONNECT_HOST_NOT_ALLOWED_TO_CONNECT`.
    HostNotAllowedToConnect = 1,

    /// `SSH_DISCONNECT_PROTOCOL_ERROR`.
    ProtocolError = 2,

    /// `SSH_DISCONNECT_KEY_EXCHANGE_FAILED`.
    KeyExchangeFailed = 3,

    /// `SSH_DISCONNECT_RESERVED`.
    Reserved = 4,

    /// `SSH_DISCONNECT_MAC_ERROR`.
    MacError = 5,

    /// `SSH_DISCONNECT_COMPRESSION_ERROR`.
    CompressionError = 6,

    /// `SSH_DISCONNECT_SERVICE_NOT_AVAILABLE`.
    ServiceNotAvailable = 7,

    /// `SSH_DISCONNECT_PROTOCOL_VERSION_NOT_SUPPORTED`.
    ProtocolVersionNotSupported = 8,

    /// `SSH_DISCONNECT_HOST_KEY_NOT_VERIFIABLE`.
    HostKeyNotVerifiable = 9,

    /// `SSH_DISCONNECT_CONNECTION_LOST`.
    ConnectionLost = 10,

    /// `SSH_DISCONNECT_DISCONNECT_BY_APPLICATION`.
    ByApplication = 11,

    /// `SSH_DISCONNECT_TOO_MANY_CONNECTIONS`.
    TooManyConnections = 12,

    /// `SSH_DISCONNECT_AUTH_CANCELLED_BY_USER`.
    AuthCancelledByUser = 13,

    /// `SSH_DISCONNECT_NO_MORE_AUTH_METHODS_AVAILABLE`.
    NoMoreAuthMethodsAvailable = 14,

    /// `SSH_DISCONNECT_ILLEGAL_USER_NAME`.
    IllegalUserName = 15,
}

impl TryFrom<u32> for DisconnectReason {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self> {
        Ok(match code {
            1 => Self::HostNotAllowedToConnect,
            2 => Self::ProtocolError,
            3 => Self::KeyExchangeFailed,
            4 => Self::Reserved,
            5 => Self::MacError,
            6 => Self::CompressionError,
            7 => Self::ServiceNotAvailable,
            8 => Self::ProtocolVersionNotSupported,
            9 => Self::HostKeyNotVerifiable,
            10 => Self::ConnectionLost,
            11 => Self::ByApplication,
            12 => Self::TooManyConnections,
            13 => Self::AuthCancelledByUser,
            14 => Self::NoMoreAuthMethodsAvailable,
            15 => Self::IllegalUserName,
            _ => return Err(Error::Malformed),
        })
    }
}

/// The `SSH_MSG_DISCONNECT` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    /// Machine-readable reason for the disconnect.
    pub reason: DisconnectReason,

    /// Human-readable description of the reason, in UTF-8.
    pub description: String,

    /// RFC 3066 language tag, usually empty.
    pub language: String,
}

impl Message for Disconnect {
    const NUMBER: u8 = 1;

    fn encode(&self, buffer: &mut Encoder) -> Result<()> {
        buffer.write_u32(self.reason as u32)?;
        buffer.write_string(self.description.as_bytes())?;
        buffer.write_string(self.language.as_bytes())
    }

    fn decode(decoder: &mut Decoder<'_>) -> Result<Self> {
        Ok(Self {
            reason: decoder.read_u32()?.try_into()?,
            description: read_utf8(decoder)?,
            language: read_utf8(decoder)?,
        })
    }
}

/// The `SSH_MSG_IGNORE` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ignore {
    /// Payload to be discarded by the receiver.
    pub data: Vec<u8>,
}

impl Message for Ignore {
    const NUMBER: u8 = 2;

    fn encode(&self, buffer: &mut Encoder) -> Result<()> {
        buffer.write_string(&self.data)
    }

    fn decode(decoder: &mut Decoder<'_>) -> Result<Self> {
        Ok(Self {
            data: decoder.read_string()?.to_vec(),
        })
    }
}

/// The `SSH_MSG_UNIMPLEMENTED` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unimplemented {
    /// Sequence number of the packet the peer did not understand.
    pub seq: u32,
}

impl Message for Unimplemented {
    const NUMBER: u8 = 3;

    fn encode(&self, buffer: &mut Encoder) -> Result<()> {
        buffer.write_u32(self.seq)
    }

    fn decode(decoder: &mut Decoder<'_>) -> Result<Self> {
        Ok(Self {
            seq: decoder.read_u32()?,
        })
    }
}

/// The `SSH_MSG_DEBUG` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debug {
    /// Whether the receiver should surface the message to the user.
    pub always_display: bool,

    /// The debug message itself, in UTF-8.
    pub message: String,

    /// RFC 3066 language tag, usually empty.
    pub language: String,
}

impl Message for Debug {
    const NUMBER: u8 = 4;

    fn encode(&self, buffer: &mut Encoder) -> Result<()> {
        buffer.write_bool(self.always_display)?;
        buffer.write_string(self.message.as_bytes())?;
        buffer.write_string(self.language.as_bytes())
    }

    fn decode(decoder: &mut Decoder<'_>) -> Result<Self> {
        Ok(Self {
            always_display: decoder.read_bool()?,
            message: read_utf8(decoder)?,
            language: read_utf8(decoder)?,
        })
    }
}

/// The `SSH_MSG_KEXINIT` message, opening algorithm negotiation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KexInit {
    /// 16 random bytes mixed into the handshake.
    pub cookie: [u8; 16],

    /// Supported key-exchange algorithms.
    pub kex_algorithms: NameList,

    /// Supported server host key algorithms.
    pub server_host_key_algorithms: NameList,

    /// Supported encryption algorithms, client to server.
    pub encryption_algorithms_client_to_server: NameList,

    /// Supported encryption algorithms, server to client.
    pub encryption_algorithms_server_to_client: NameList,

    /// Supported MAC algorithms, client to server.
    pub mac_algorithms_client_to_server: NameList,

    /// Supported MAC algorithms, server to client.
    pub mac_algorithms_server_to_client: NameList,

    /// Supported compression algorithms, client to server.
    pub compression_algorithms_client_to_server: NameList,

    /// Supported compression algorithms, server to client.
    pub compression_algorithms_server_to_client: NameList,

    /// Preferred message languages, client to server.
    pub languages_client_to_server: NameList,

    /// Preferred message languages, server to client.
    pub languages_server_to_client: NameList,

    /// Whether a guessed kex packet follows this message.
    pub first_kex_packet_follows: bool,
}

impl Message for KexInit {
    const NUMBER: u8 = 20;

    fn encode(&self, buffer: &mut Encoder) -> Result<()> {
        buffer.write_bytes(&self.cookie)?;
        buffer.write_name_list(&self.kex_algorithms)?;
        buffer.write_name_list(&self.server_host_key_algorithms)?;
        buffer.write_name_list(&self.encryption_algorithms_client_to_server)?;
        buffer.write_name_list(&self.encryption_algorithms_server_to_client)?;
        buffer.write_name_list(&self.mac_algorithms_client_to_server)?;
        buffer.write_name_list(&self.mac_algorithms_server_to_client)?;
        buffer.write_name_list(&self.compression_algorithms_client_to_server)?;
        buffer.write_name_list(&self.compression_algorithms_server_to_client)?;
        buffer.write_name_list(&self.languages_client_to_server)?;
        buffer.write_name_list(&self.languages_server_to_client)?;
        buffer.write_bool(self.first_kex_packet_follows)?;
        buffer.write_u32(0) // Reserved.
    }

    fn decode(decoder: &mut Decoder<'_>) -> Result<Self> {
        let message = Self {
            cookie: decoder.read_array::<16>()?,
            kex_algorithms: decoder.read_name_list()?,
            server_host_key_algorithms: decoder.read_name_list()?,
            encryption_algorithms_client_to_server: decoder.read_name_list()?,
            encryption_algorithms_server_to_client: decoder.read_name_list()?,
            mac_algorithms_client_to_server: decoder.read_name_list()?,
            mac_algorithms_server_to_client: decoder.read_name_list()?,
            compression_algorithms_client_to_server: decoder.read_name_list()?,
            compression_algorithms_server_to_client: decoder.read_name_list()?,
            languages_client_to_server: decoder.read_name_list()?,
            languages_server_to_client: decoder.read_name_list()?,
            first_kex_packet_follows: decoder.read_bool()?,
        };

        let _ = decoder.read_u32()?; // Reserved.

        Ok(message)
    }
}

/// The `SSH_MSG_NEWKEYS` message, switching to the freshly derived keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NewKeys;

impl Message for NewKeys {
    const NUMBER: u8 = 21;

    fn encode(&self, _buffer: &mut Encoder) -> Result<()> {
        Ok(())
    }

    fn decode(_decoder: &mut Decoder<'_>) -> Result<Self> {
        Ok(Self)
    }
}

/// The `SSH_MSG_KEXDH_INIT` message, carrying the client's ephemeral
/// public value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KexDhInit {
    /// The client's `e = g^x mod p`.
    pub e: MpInt,
}

impl Message for KexDhInit {
    const NUMBER: u8 = 30;

    fn encode(&self, buffer: &mut Encoder) -> Result<()> {
        buffer.write_mpint(&self.e)
    }

    fn decode(decoder: &mut Decoder<'_>) -> Result<Self> {
        Ok(Self {
            e: decoder.read_mpint()?,
        })
    }
}

/// The `SSH_MSG_KEXDH_REPLY` message, carrying the server's host key,
/// ephemeral public value and signature over the exchange hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KexDhReply {
    /// The server's host key blob, `K_S`.
    pub k_s: Vec<u8>,

    /// The server's `f = g^y mod p`.
    pub f: MpInt,

    /// The signature over the exchange hash `H`.
    pub signature: Vec<u8>,
}

impl Message for KexDhReply {
    const NUMBER: u8 = 31;

    fn encode(&self, buffer: &mut Encoder) -> Result<()> {
        buffer.write_string(&self.k_s)?;
        buffer.write_mpint(&self.f)?;
        buffer.write_string(&self.signature)
    }

    fn decode(decoder: &mut Decoder<'_>) -> Result<Self> {
        Ok(Self {
            k_s: decoder.read_string()?.to_vec(),
            f: decoder.read_mpint()?,
            signature: decoder.read_string()?.to_vec(),
        })
    }
}

fn read_utf8(decoder: &mut Decoder<'_>) -> Result<String> {
    String::from_utf8(decoder.read_string()?.to_vec()).map_err(|_| Error::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kexinit_roundtrips() {
        let message = KexInit {
            cookie: [7; 16],
            kex_algorithms: ["diffie-hellman-group14-sha1"].into_iter().collect(),
            server_host_key_algorithms: ["ssh-rsa"].into_iter().collect(),
            encryption_algorithms_client_to_server: ["aes128-ctr"].into_iter().collect(),
            encryption_algorithms_server_to_client: ["aes128-cbc"].into_iter().collect(),
            mac_algorithms_client_to_server: ["hmac-sha2-256"].into_iter().collect(),
            mac_algorithms_server_to_client: ["hmac-sha2-512"].into_iter().collect(),
            compression_algorithms_client_to_server: ["none"].into_iter().collect(),
            compression_algorithms_server_to_client: ["none"].into_iter().collect(),
            ..Default::default()
        };

        let payload = message.to_payload().unwrap();
        assert_eq!(payload[0], KexInit::NUMBER);
        assert_eq!(KexInit::from_payload(&payload).unwrap(), message);
    }

    #[test]
    fn wrong_number_is_unexpected() {
        let payload = NewKeys.to_payload().unwrap();

        assert!(matches!(
            KexInit::from_payload(&payload),
            Err(Error::UnexpectedMessage)
        ));
    }

    #[test]
    fn disconnect_rejects_unknown_reasons() {
        let mut buffer = Encoder::new();
        buffer.write_u32(42).unwrap();
        buffer.write_string(b"").unwrap();
        buffer.write_string(b"").unwrap();

        let mut payload = vec![Disconnect::NUMBER];
        payload.extend_from_slice(buffer.as_ref());

        assert!(matches!(
            Disconnect::from_payload(&payload),
            Err(Error::Malformed)
        ));
    }
}
