use num_bigint::{BigUint, RandBigInt};
use sha1::Sha1;
use signature::Verifier;

use crate::{
    algorithm::{Cipher, Hmac, Key},
    client::Client,
    knownhosts::Verdict,
    stream::{Keys, Stream},
    trans::{KexDhInit, KexDhReply},
    wire::{Encoder, MpInt},
    Error, Id, Pipe, Result,
};

/// The 1024-bit MODP prime from RFC 2409 §6.2 (Oakley group 2).
const GROUP1_PRIME: [u8; 128] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xc9, 0x0f, 0xda, 0xa2,
    0x21, 0x68, 0xc2, 0x34, 0xc4, 0xc6, 0x62, 0x8b, 0x80, 0xdc, 0x1c, 0xd1,
    0x29, 0x02, 0x4e, 0x08, 0x8a, 0x67, 0xcc, 0x74, 0x02, 0x0b, 0xbe, 0xa6,
    0x3b, 0x13, 0x9b, 0x22, 0x51, 0x4a, 0x08, 0x79, 0x8e, 0x34, 0x04, 0xdd,
    0xef, 0x95, 0x19, 0xb3, 0xcd, 0x3a, 0x43, 0x1b, 0x30, 0x2b, 0x0a, 0x6d,
    0xf2, 0x5f, 0x14, 0x37, 0x4f, 0xe1, 0x35, 0x6d, 0x6d, 0x51, 0xc2, 0x45,
    0xe4, 0x85, 0xb5, 0x76, 0x62, 0x5e, 0x7e, 0xc6, 0xf4, 0x4c, 0x42, 0xe9,
    0xa6, 0x37, 0xed, 0x6b, 0x0b, 0xff, 0x5c, 0xb6, 0xf4, 0x06, 0xb7, 0xed,
    0xee, 0x38, 0x6b, 0xfb, 0x5a, 0x89, 0x9f, 0xa5, 0xae, 0x9f, 0x24, 0x11,
    0x7c, 0x4b, 0x1f, 0xe6, 0x49, 0x28, 0x66, 0x51, 0xec, 0xe6, 0x53, 0x81,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
];

/// The 2048-bit MODP prime from RFC 3526 §3 (group 14).
const GROUP14_PRIME: [u8; 256] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xc9, 0x0f, 0xda, 0xa2,
    0x21, 0x68, 0xc2, 0x34, 0xc4, 0xc6, 0x62, 0x8b, 0x80, 0xdc, 0x1c, 0xd1,
    0x29, 0x02, 0x4e, 0x08, 0x8a, 0x67, 0xcc, 0x74, 0x02, 0x0b, 0xbe, 0xa6,
    0x3b, 0x13, 0x9b, 0x22, 0x51, 0x4a, 0x08, 0x79, 0x8e, 0x34, 0x04, 0xdd,
    0xef, 0x95, 0x19, 0xb3, 0xcd, 0x3a, 0x43, 0x1b, 0x30, 0x2b, 0x0a, 0x6d,
    0xf2, 0x5f, 0x14, 0x37, 0x4f, 0xe1, 0x35, 0x6d, 0x6d, 0x51, 0xc2, 0x45,
    0xe4, 0x85, 0xb5, 0x76, 0x62, 0x5e, 0x7e, 0xc6, 0xf4, 0x4c, 0x42, 0xe9,
    0xa6, 0x37, 0xed, 0x6b, 0x0b, 0xff, 0x5c, 0xb6, 0xf4, 0x06, 0xb7, 0xed,
    0xee, 0x38, 0x6b, 0xfb, 0x5a, 0x89, 0x9f, 0xa5, 0xae, 0x9f, 0x24, 0x11,
    0x7c, 0x4b, 0x1f, 0xe6, 0x49, 0x28, 0x66, 0x51, 0xec, 0xe4, 0x5b, 0x3d,
    0xc2, 0x00, 0x7c, 0xb8, 0xa1, 0x63, 0xbf, 0x05, 0x98, 0xda, 0x48, 0x36,
    0x1c, 0x55, 0xd3, 0x9a, 0x69, 0x16, 0x3f, 0xa8, 0xfd, 0x24, 0xcf, 0x5f,
    0x83, 0x65, 0x5d, 0x23, 0xdc, 0xa3, 0xad, 0x96, 0x1c, 0x62, 0xf3, 0x56,
    0x20, 0x85, 0x52, 0xbb, 0x9e, 0xd5, 0x29, 0x07, 0x70, 0x96, 0x96, 0x6d,
    0x67, 0x0c, 0x35, 0x4e, 0x4a, 0xbc, 0x98, 0x04, 0xf1, 0x74, 0x6c, 0x08,
    0xca, 0x18, 0x21, 0x7c, 0x32, 0x90, 0x5e, 0x46, 0x2e, 0x36, 0xce, 0x3b,
    0xe3, 0x9e, 0x77, 0x2c, 0x18, 0x0e, 0x86, 0x03, 0x9b, 0x27, 0x83, 0xa2,
    0xec, 0x07, 0xa2, 0x8f, 0xb5, 0xc5, 0x5d, 0xf0, 0x6f, 0x4c, 0x52, 0xc9,
    0xde, 0x2b, 0xcb, 0xf6, 0x95, 0x58, 0x17, 0x18, 0x39, 0x95, 0x49, 0x7c,
    0xea, 0x95, 0x6a, 0xe5, 0x15, 0xd2, 0x26, 0x18, 0x98, 0xfa, 0x05, 0x10,
    0x15, 0x72, 0x8e, 0x5a, 0x8a, 0xac, 0xaa, 0x68, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff,
];

/// A fixed Sophie-Germain-derived MODP group with generator `g = 2`.
pub(super) struct Group {
    p: BigUint,
    g: BigUint,
}

impl Group {
    pub(super) fn group1() -> Self {
        Self {
            p: BigUint::from_bytes_be(&GROUP1_PRIME),
            g: BigUint::from(2u8),
        }
    }

    pub(super) fn group14() -> Self {
        Self {
            p: BigUint::from_bytes_be(&GROUP14_PRIME),
            g: BigUint::from(2u8),
        }
    }

    /// Whether a received public value lies in the legal `[2, p-2]` range.
    fn is_legal(&self, public: &BigUint) -> bool {
        *public >= BigUint::from(2u8) && *public <= &self.p - 2u8
    }
}

#[allow(clippy::too_many_arguments)] // The key exchange requires all of these informations
pub(super) async fn as_client(
    group: &Group,
    stream: &mut Stream<impl Pipe>,
    config: &Client,
    v_s: &Id,
    i_c: &[u8],
    i_s: &[u8],
    key_alg: &Key,
    client_cipher: &Cipher,
    server_cipher: &Cipher,
    client_hmac: &Hmac,
    server_hmac: &Hmac,
) -> Result<(Keys, Keys)> {
    let x = rand::thread_rng().gen_biguint_range(&BigUint::from(2u8), &(&group.p - 1u8));
    let e = MpInt::positive(&group.g.modpow(&x, &group.p).to_bytes_be());

    stream.send(&KexDhInit { e: e.clone() }).await?;

    let reply: KexDhReply = super::recv_unignored(stream).await?.to()?;

    let f = BigUint::from_bytes_be(reply.f.as_bytes());
    if !group.is_legal(&f) {
        return Err(Error::KexError);
    }

    let secret = MpInt::positive(&f.modpow(&x, &group.p).to_bytes_be());

    let hash = exchange_hash(
        config.id(),
        v_s,
        i_c,
        i_s,
        &reply.k_s,
        &e,
        &reply.f,
        &secret,
    )?;

    let k_s = ssh_key::PublicKey::from_bytes(&reply.k_s)?;
    let signature = ssh_key::Signature::try_from(reply.signature.as_slice())?;
    if signature.algorithm().as_str() != key_alg.as_str() {
        return Err(Error::KexError);
    }

    Verifier::verify(&k_s, &hash, &signature)?;

    match config
        .verifier
        .verify(&config.host, config.port, key_alg.as_str(), &reply.k_s)
    {
        Verdict::Accept | Verdict::AcceptAndRemember => (),
        Verdict::Reject => return Err(Error::UntrustedHost),
    }

    let session_id = stream.with_session(&hash);

    Ok((
        Keys::as_client::<Sha1>(&secret, &hash, session_id, client_cipher, client_hmac),
        Keys::as_server::<Sha1>(&secret, &hash, session_id, server_cipher, server_hmac),
    ))
}

/// The exchange hash `H`, binding both identification strings, both
/// `KEXINIT` payloads, the host key and the DH outputs.
#[allow(clippy::too_many_arguments)]
fn exchange_hash(
    v_c: &Id,
    v_s: &Id,
    i_c: &[u8],
    i_s: &[u8],
    k_s: &[u8],
    e: &MpInt,
    f: &MpInt,
    k: &MpInt,
) -> Result<Vec<u8>> {
    use digest::Digest;

    let mut buffer = Encoder::new();

    buffer.write_string(v_c.to_string().as_bytes())?;
    buffer.write_string(v_s.to_string().as_bytes())?;
    buffer.write_string(i_c)?;
    buffer.write_string(i_s)?;
    buffer.write_string(k_s)?;
    buffer.write_mpint(e)?;
    buffer.write_mpint(f)?;
    buffer.write_mpint(k)?;

    Ok(Sha1::digest(buffer.as_ref()).to_vec())
}
