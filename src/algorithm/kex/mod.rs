use strum::{AsRefStr, EnumString};

use crate::{
    client::Client,
    error::{DisconnectedBy, DisconnectedError},
    stream::{Packet, Stream, Transport, TransportPair},
    trans::{self, KexInit},
    Error, Id, Pipe, Result,
};

use super::{cipher, compress, hmac, key};

mod group;

pub(crate) fn negociate(clientkex: &KexInit, serverkex: &KexInit) -> Result<Kex> {
    clientkex
        .kex_algorithms
        .preferred_in(&serverkex.kex_algorithms)
        .ok_or(Error::NoCommonKex)?
        .parse()
        .map_err(|_| Error::NoCommonKex)
}

/// SSH key-exchange algorithms.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Kex {
    /// Diffie-Hellman over the 2048-bit MODP group, with sha-1 digest.
    DiffieHellmanGroup14Sha1,

    /// Diffie-Hellman over the 1024-bit MODP group, with sha-1 digest.
    DiffieHellmanGroup1Sha1,
}

impl Kex {
    /// Run the negotiated key-exchange from the client side, returning the
    /// freshly keyed transport pair for the caller to install around the
    /// `NEWKEYS` boundary.
    #[allow(clippy::too_many_arguments)] // The key exchange requires all of these informations
    pub(crate) async fn as_client(
        &self,
        stream: &mut Stream<impl Pipe>,
        config: &Client,
        peer_id: &Id,
        i_c: &KexInit,
        i_s: &KexInit,
        i_c_payload: &[u8],
        i_s_payload: &[u8],
    ) -> Result<TransportPair> {
        let (client_hmac, server_hmac) = hmac::negociate(i_c, i_s)?;
        let (client_compress, server_compress) = compress::negociate(i_c, i_s)?;
        let (client_cipher, server_cipher) = cipher::negociate(i_c, i_s)?;
        let key_alg = key::negociate(i_c, i_s)?;

        let group = match self {
            Self::DiffieHellmanGroup14Sha1 => group::Group::group14(),
            Self::DiffieHellmanGroup1Sha1 => group::Group::group1(),
        };

        let (client_keys, server_keys) = group::as_client(
            &group,
            stream,
            config,
            peer_id,
            i_c_payload,
            i_s_payload,
            &key_alg,
            &client_cipher,
            &server_cipher,
            &client_hmac,
            &server_hmac,
        )
        .await?;

        Ok(TransportPair {
            rx: Transport {
                compress: server_compress,
                cipher: server_cipher,
                hmac: server_hmac,
                state: None,
                chain: server_keys,
            },
            tx: Transport {
                compress: client_compress,
                cipher: client_cipher,
                hmac: client_hmac,
                state: None,
                chain: client_keys,
            },
        })
    }
}

/// Receive a packet, transparently skipping the `IGNORE`, `DEBUG` and
/// `UNIMPLEMENTED` messages a peer may interleave with the key exchange.
pub(crate) async fn recv_unignored(stream: &mut Stream<impl Pipe>) -> Result<Packet> {
    loop {
        let packet = stream.recv().await?;

        if let Ok(trans::Ignore { data }) = packet.to() {
            tracing::debug!("Received an 'ignore' message with length {}", data.len());
        } else if let Ok(trans::Debug { message, .. }) = packet.to() {
            tracing::debug!("Received a 'debug' message: {message}");
        } else if let Ok(trans::Unimplemented { seq }) = packet.to() {
            tracing::debug!("Received an 'unimplemented' message about packet #{seq}");
        } else if let Ok(trans::Disconnect {
            reason,
            description,
            ..
        }) = packet.to()
        {
            tracing::warn!("Peer disconnected with `{reason:?}`: {description}");

            break Err(DisconnectedError {
                by: DisconnectedBy::Them,
                reason,
                description,
            }
            .into());
        } else {
            break Ok(packet);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::wire::NameList;

    fn kexinit(kexs: &[&str]) -> KexInit {
        KexInit {
            kex_algorithms: NameList::from_iter(kexs.iter().copied()),
            ..Default::default()
        }
    }

    #[test]
    fn the_first_client_name_known_to_the_server_wins() {
        let client = kexinit(&[
            "curve25519-sha256",
            "diffie-hellman-group14-sha1",
            "diffie-hellman-group1-sha1",
        ]);
        let server = kexinit(&["diffie-hellman-group1-sha1", "diffie-hellman-group14-sha1"]);

        assert_eq!(
            negociate(&client, &server).unwrap(),
            Kex::DiffieHellmanGroup14Sha1
        );
    }

    #[test]
    fn an_empty_intersection_fails_the_negotiation() {
        let client = kexinit(&["diffie-hellman-group14-sha1"]);
        let server = kexinit(&["ecdh-sha2-nistp256"]);

        assert!(matches!(
            negociate(&client, &server),
            Err(Error::NoCommonKex)
        ));
    }

    #[test]
    fn a_common_name_we_do_not_implement_fails_the_negotiation() {
        let client = kexinit(&["sntrup761x25519-sha512@openssh.com"]);
        let server = kexinit(&["sntrup761x25519-sha512@openssh.com"]);

        assert!(matches!(
            negociate(&client, &server),
            Err(Error::NoCommonKex)
        ));
    }
}
