use digest::Mac;
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use strum::{AsRefStr, EnumString};

use crate::{trans::KexInit, Error, Result};

pub(crate) fn negociate(clientkex: &KexInit, serverkex: &KexInit) -> Result<(Hmac, Hmac)> {
    Ok((
        clientkex
            .mac_algorithms_client_to_server
            .preferred_in(&serverkex.mac_algorithms_client_to_server)
            .ok_or(Error::NoCommonHmac)?
            .parse()
            .map_err(|_| Error::NoCommonHmac)?,
        clientkex
            .mac_algorithms_server_to_client
            .preferred_in(&serverkex.mac_algorithms_server_to_client)
            .ok_or(Error::NoCommonHmac)?
            .parse()
            .map_err(|_| Error::NoCommonHmac)?,
    ))
}

/// SSH hmac algorithms.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Hmac {
    /// HMAC with sha-2-512 digest.
    #[strum(serialize = "hmac-sha2-512")]
    HmacSha512,

    /// HMAC with sha-2-256 digest.
    #[strum(serialize = "hmac-sha2-256")]
    HmacSha256,

    /// HMAC with sha-1 digest.
    HmacSha1,

    /// No HMAC algorithm.
    #[default]
    None,
}

/// Bind `$mac` to the concrete HMAC type behind the algorithm name and
/// expand `$body` once per variant; `Hmac::None` yields `$none` instead.
macro_rules! dispatch {
    ($algorithm:expr, $mac:ident => $body:expr, none => $none:expr $(,)?) => {
        match $algorithm {
            Hmac::HmacSha512 => {
                type $mac = hmac::Hmac<Sha512>;
                $body
            }
            Hmac::HmacSha256 => {
                type $mac = hmac::Hmac<Sha256>;
                $body
            }
            Hmac::HmacSha1 => {
                type $mac = hmac::Hmac<Sha1>;
                $body
            }
            Hmac::None => $none,
        }
    };
}

impl Hmac {
    /// A keyed state over the `seq ‖ buf` input shared by sign and verify.
    fn keyed<M: digest::Mac + digest::KeyInit>(seq: u32, buf: &[u8], key: &[u8]) -> M {
        <M as digest::Mac>::new_from_slice(key)
            .expect("HMAC accepts keys of any length")
            .chain_update(seq.to_be_bytes())
            .chain_update(buf)
    }

    pub(crate) fn sign(&self, seq: u32, buf: &[u8], key: &[u8]) -> Vec<u8> {
        dispatch!(self,
            M => Self::keyed::<M>(seq, buf, key).finalize().into_bytes().to_vec(),
            none => Vec::new(),
        )
    }

    /// Check the received `mac` against a fresh computation; the
    /// comparison is constant-time down in the `digest` machinery.
    pub(crate) fn verify(
        &self,
        seq: u32,
        buf: &[u8],
        key: &[u8],
        mac: &[u8],
    ) -> Result<(), digest::MacError> {
        dispatch!(self,
            M => Self::keyed::<M>(seq, buf, key).verify_slice(mac),
            none => Ok(()),
        )
    }

    pub(crate) fn size(&self) -> usize {
        dispatch!(self,
            M => <M as digest::OutputSizeUser>::output_size(),
            none => 0,
        )
    }
}
