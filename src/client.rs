//! Client-side configuration of a [`Session`](crate::Session).

use std::{fmt, time::Duration};

use rand::RngCore;

use crate::{
    algorithm::{Cipher, Compress, Hmac, Kex, Key},
    knownhosts::{KnownHosts, Verify},
    stream::MAX_PACKET_SIZE,
    trans::KexInit,
    wire::NameList,
    Id,
};

/// A _client_-side session configuration.
pub struct Client {
    /// [`Id`] for this _client_ session.
    pub id: Id,

    /// Timeout for sending and receiving packets.
    pub timeout: Duration,

    /// Hostname the session dials, fed to the host-identity hook.
    pub host: String,

    /// Port the session dials, fed to the host-identity hook.
    pub port: u16,

    /// Ceiling for the `packet_length` of received packets; values above
    /// the protocol hard limit are clamped.
    pub max_packet_size: u32,

    /// The algorithms enabled for this _client_ session.
    pub algorithms: Algorithms,

    /// The hook judging the server's host key.
    pub verifier: Box<dyn Verify>,
}

impl Default for Client {
    fn default() -> Self {
        Self {
            id: Id::v2(
                concat!(
                    env!("CARGO_PKG_NAME"),
                    "@client:",
                    env!("CARGO_PKG_VERSION")
                ),
                None::<&str>,
            ),
            timeout: Duration::from_secs(120),
            host: "localhost".into(),
            port: 22,
            max_packet_size: MAX_PACKET_SIZE,
            algorithms: Default::default(),
            verifier: Box::new(KnownHosts::open("known_hosts")),
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("timeout", &self.timeout)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("max_packet_size", &self.max_packet_size)
            .field("algorithms", &self.algorithms)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub(crate) fn id(&self) -> &Id {
        &self.id
    }

    /// Generate a fresh `KEXINIT` message from the config.
    pub(crate) fn kexinit(&self) -> KexInit {
        let mut cookie = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut cookie);

        KexInit {
            cookie,
            kex_algorithms: NameList::from_iter(&self.algorithms.kexs),
            server_host_key_algorithms: NameList::from_iter(&self.algorithms.keys),
            encryption_algorithms_client_to_server: NameList::from_iter(&self.algorithms.ciphers),
            encryption_algorithms_server_to_client: NameList::from_iter(&self.algorithms.ciphers),
            mac_algorithms_client_to_server: NameList::from_iter(&self.algorithms.macs),
            mac_algorithms_server_to_client: NameList::from_iter(&self.algorithms.macs),
            compression_algorithms_client_to_server: NameList::from_iter(
                &self.algorithms.compressions,
            ),
            compression_algorithms_server_to_client: NameList::from_iter(
                &self.algorithms.compressions,
            ),
            languages_client_to_server: Default::default(),
            languages_server_to_client: Default::default(),
            first_kex_packet_follows: false,
        }
    }
}

/// Algorithms for a _client_-side session, in preference order.
#[derive(Debug, Clone)]
pub struct Algorithms {
    /// Enabled algorithms for _key-exchange_.
    pub kexs: Vec<Kex>,

    /// Enabled algorithms for _server host key signature_.
    pub keys: Vec<Key>,

    /// Enabled algorithms for _encryption & decryption_.
    pub ciphers: Vec<Cipher>,

    /// Enabled algorithms for _hmac_.
    pub macs: Vec<Hmac>,

    /// Enabled algorithms for _compression_.
    pub compressions: Vec<Compress>,
}

impl Default for Algorithms {
    fn default() -> Self {
        Self {
            kexs: vec![Kex::DiffieHellmanGroup14Sha1, Kex::DiffieHellmanGroup1Sha1],
            keys: vec![
                Key::Rsa {
                    hash: Some(ssh_key::HashAlg::Sha512),
                },
                Key::Rsa {
                    hash: Some(ssh_key::HashAlg::Sha256),
                },
                Key::Rsa { hash: None },
            ],
            ciphers: vec![Cipher::Aes128Ctr, Cipher::Aes128Cbc],
            macs: vec![Hmac::HmacSha256, Hmac::HmacSha512],
            compressions: vec![Compress::None],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kexinit_lists_the_configured_names() {
        let kexinit = Client::default().kexinit();

        assert_eq!(
            kexinit.kex_algorithms.names().join(","),
            "diffie-hellman-group14-sha1,diffie-hellman-group1-sha1"
        );
        assert_eq!(
            kexinit.server_host_key_algorithms.names().join(","),
            "rsa-sha2-512,rsa-sha2-256,ssh-rsa"
        );
        assert_eq!(
            kexinit.encryption_algorithms_client_to_server.names().join(","),
            "aes128-ctr,aes128-cbc"
        );
        assert_eq!(
            kexinit.mac_algorithms_client_to_server.names().join(","),
            "hmac-sha2-256,hmac-sha2-512"
        );
        assert_eq!(
            kexinit.compression_algorithms_client_to_server.names().join(","),
            "none"
        );
        assert!(!kexinit.first_kex_packet_follows);
    }

    #[test]
    fn cookies_are_not_reused() {
        let client = Client::default();

        assert_ne!(client.kexinit().cookie, client.kexinit().cookie);
    }
}
