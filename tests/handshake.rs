#![allow(clippy::unwrap_used)]

//! Drives whole client key-exchanges against a hand-rolled server
//! speaking `diffie-hellman-group14-sha1` over a loopback socket.

use std::net::SocketAddr;

use async_std::net::{TcpListener, TcpStream};
use futures::{
    io::BufReader, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, StreamExt,
};
use num_bigint::{BigUint, RandBigInt};
use sha1::{Digest, Sha1};
use signature::{SignatureEncoding, Signer};

use skiff::{
    algorithm::Key,
    knownhosts::Verdict,
    trans::{self, Message},
    wire::{Encoder, MpInt, NameList},
    Algorithms, Client, Error, Session,
};

/// The RFC 3526 §3 prime, as the peer under test knows it.
const GROUP14_PRIME: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74",
    "020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437",
    "4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05",
    "98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB",
    "9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B",
    "E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718",
    "3995497CEA956AE515D2261898FA051015728E5A8AACAA68FFFFFFFFFFFFFFFF",
);

async fn send_packet(writer: &mut (impl AsyncWrite + Unpin), payload: &[u8]) {
    let mut padding = 8 - (4 + 1 + payload.len()) % 8;
    if padding < 4 {
        padding += 8;
    }

    let mut record = Vec::new();
    record.extend_from_slice(&((1 + payload.len() + padding) as u32).to_be_bytes());
    record.push(padding as u8);
    record.extend_from_slice(payload);
    record.resize(record.len() + padding, 0);

    writer.write_all(&record).await.unwrap();
    writer.flush().await.unwrap();
}

async fn recv_packet(reader: &mut (impl AsyncRead + Unpin)) -> Vec<u8> {
    let mut length = [0u8; 4];
    reader.read_exact(&mut length).await.unwrap();
    let length = u32::from_be_bytes(length) as usize;

    let mut record = vec![0u8; length];
    reader.read_exact(&mut record).await.unwrap();

    let padding = record[0] as usize;
    record[1..length - padding].to_vec()
}

fn server_kexinit(ciphers: &[&str]) -> trans::KexInit {
    trans::KexInit {
        cookie: [0x55; 16],
        kex_algorithms: NameList::from_iter(["diffie-hellman-group14-sha1"]),
        server_host_key_algorithms: NameList::from_iter(["ssh-ed25519"]),
        encryption_algorithms_client_to_server: NameList::from_iter(ciphers.iter().copied()),
        encryption_algorithms_server_to_client: NameList::from_iter(ciphers.iter().copied()),
        mac_algorithms_client_to_server: NameList::from_iter(["hmac-sha2-256"]),
        mac_algorithms_server_to_client: NameList::from_iter(["hmac-sha2-256"]),
        compression_algorithms_client_to_server: NameList::from_iter(["none"]),
        compression_algorithms_server_to_client: NameList::from_iter(["none"]),
        languages_client_to_server: Default::default(),
        languages_server_to_client: Default::default(),
        first_kex_packet_follows: false,
    }
}

fn client(addr: SocketAddr) -> Client {
    Client {
        host: "127.0.0.1".into(),
        port: addr.port(),
        algorithms: Algorithms {
            keys: vec![Key::Ed25519],
            ..Default::default()
        },
        verifier: Box::new(|_: &str, _: u16, _: &str, _: &[u8]| Verdict::Accept),
        ..Default::default()
    }
}

/// Answer one whole group14 exchange, then hang up. Returns the last
/// payload read from the client, the `NEWKEYS` on an honest run.
async fn serve_one_exchange(socket: TcpListener, sign_garbage: bool) -> Vec<u8> {
    let stream = socket.incoming().next().await.unwrap().unwrap();
    let mut reader = BufReader::new(&stream);
    let mut writer = &stream;

    let mut banner = Vec::new();
    reader.read_until(b'\n', &mut banner).await.unwrap();
    let v_c = String::from_utf8(banner).unwrap();
    let v_s = "SSH-2.0-fakesshd_0.1";
    writer
        .write_all(format!("{v_s}\r\n").as_bytes())
        .await
        .unwrap();

    let i_c = recv_packet(&mut reader).await;
    let i_s = server_kexinit(&["aes128-ctr"]).to_payload().unwrap();
    send_packet(&mut writer, &i_s).await;

    let dhinit = trans::KexDhInit::from_payload(&recv_packet(&mut reader).await).unwrap();

    let p = BigUint::parse_bytes(GROUP14_PRIME.as_bytes(), 16).unwrap();
    let y = rand::thread_rng().gen_biguint_range(&BigUint::from(2u8), &(&p - 1u8));
    let e = BigUint::from_bytes_be(dhinit.e.as_bytes());
    let f = MpInt::positive(&BigUint::from(2u8).modpow(&y, &p).to_bytes_be());
    let k = MpInt::positive(&e.modpow(&y, &p).to_bytes_be());

    let key =
        ssh_key::PrivateKey::random(&mut rand::thread_rng(), ssh_key::Algorithm::Ed25519).unwrap();
    let k_s = key.public_key().to_bytes().unwrap();

    let mut exchange = Encoder::new();
    exchange
        .write_string(v_c.trim_end_matches(['\r', '\n']).as_bytes())
        .unwrap();
    exchange.write_string(v_s.as_bytes()).unwrap();
    exchange.write_string(&i_c).unwrap();
    exchange.write_string(&i_s).unwrap();
    exchange.write_string(&k_s).unwrap();
    exchange.write_mpint(&dhinit.e).unwrap();
    exchange.write_mpint(&f).unwrap();
    exchange.write_mpint(&k).unwrap();
    let hash = Sha1::digest(exchange.as_ref());

    let signature: ssh_key::Signature = if sign_garbage {
        Signer::sign(&key, b"something that is not the exchange hash")
    } else {
        Signer::sign(&key, &hash)
    };
    let reply = trans::KexDhReply {
        k_s,
        f,
        signature: signature.to_vec(),
    };
    send_packet(&mut writer, &reply.to_payload().unwrap()).await;

    let answer = recv_packet(&mut reader).await;
    if answer == [trans::NewKeys::NUMBER] {
        send_packet(&mut writer, &[trans::NewKeys::NUMBER]).await;
    }

    answer
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();
}

async fn bound_socket() -> (TcpListener, SocketAddr) {
    let socket = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = socket.local_addr().unwrap();

    (socket, addr)
}

#[async_std::test]
async fn group14_exchange_end_to_end() {
    init_tracing();

    let (socket, addr) = bound_socket().await;
    let handle = async_std::task::spawn(serve_one_exchange(socket, false));

    let stream = BufReader::new(TcpStream::connect(addr).await.unwrap());
    let mut session = Session::new(stream, client(addr)).await.unwrap();

    assert_eq!(session.peer_id().to_string(), "SSH-2.0-fakesshd_0.1");

    // The receive drives the initial key exchange to completion; the
    // server then hangs up, so the next record never arrives.
    let result = session.recv().await;
    assert!(matches!(result, Err(Error::Io(_))), "got {result:?}");

    // But the exchange itself concluded and latched a session identifier.
    assert!(session.session_id().is_some());

    assert_eq!(handle.await, [trans::NewKeys::NUMBER]);
}

#[async_std::test]
async fn an_invalid_signature_fails_the_exchange() {
    init_tracing();

    let (socket, addr) = bound_socket().await;
    let handle = async_std::task::spawn(serve_one_exchange(socket, true));

    let stream = BufReader::new(TcpStream::connect(addr).await.unwrap());
    let mut session = Session::new(stream, client(addr)).await.unwrap();

    let result = session.recv().await;
    assert!(matches!(result, Err(Error::Signature(_))), "got {result:?}");
    assert!(session.session_id().is_none());

    // Instead of NEWKEYS, the peer sees our disconnect notice.
    let answer = handle.await;
    let disconnect = trans::Disconnect::from_payload(&answer).unwrap();
    assert_eq!(disconnect.reason, trans::DisconnectReason::KeyExchangeFailed);
}

#[async_std::test]
async fn a_rejected_host_key_fails_the_exchange() {
    init_tracing();

    let (socket, addr) = bound_socket().await;
    let handle = async_std::task::spawn(serve_one_exchange(socket, false));

    let stream = BufReader::new(TcpStream::connect(addr).await.unwrap());
    let mut session = Session::new(
        stream,
        Client {
            verifier: Box::new(|_: &str, _: u16, _: &str, _: &[u8]| Verdict::Reject),
            ..client(addr)
        },
    )
    .await
    .unwrap();

    let result = session.recv().await;
    assert!(matches!(result, Err(Error::UntrustedHost)), "got {result:?}");

    let answer = handle.await;
    let disconnect = trans::Disconnect::from_payload(&answer).unwrap();
    assert_eq!(
        disconnect.reason,
        trans::DisconnectReason::HostKeyNotVerifiable
    );
}

#[async_std::test]
async fn failed_negotiation_disconnects_the_peer() {
    init_tracing();

    let (socket, addr) = bound_socket().await;

    let handle = async_std::task::spawn(async move {
        let stream = socket.incoming().next().await.unwrap().unwrap();
        let mut reader = BufReader::new(&stream);
        let mut writer = &stream;

        let mut banner = Vec::new();
        reader.read_until(b'\n', &mut banner).await.unwrap();
        writer.write_all(b"SSH-2.0-fakesshd_0.1\r\n").await.unwrap();

        let _ = recv_packet(&mut reader).await;
        // No cipher in common with the client's defaults.
        send_packet(
            &mut writer,
            &server_kexinit(&["chacha20-poly1305@openssh.com"])
                .to_payload()
                .unwrap(),
        )
        .await;

        // The client must advertise the failure before hanging up.
        let disconnect = trans::Disconnect::from_payload(&recv_packet(&mut reader).await).unwrap();
        assert_eq!(disconnect.reason, trans::DisconnectReason::KeyExchangeFailed);
    });

    let stream = BufReader::new(TcpStream::connect(addr).await.unwrap());
    let mut session = Session::new(stream, client(addr)).await.unwrap();

    assert!(matches!(session.recv().await, Err(Error::NoCommonCipher)));

    handle.await;
}
