use strum::{AsRefStr, EnumString};

use crate::{trans::KexInit, Error, Result};

pub(crate) fn negociate(clientkex: &KexInit, serverkex: &KexInit) -> Result<(Compress, Compress)> {
    Ok((
        clientkex
            .compression_algorithms_client_to_server
            .preferred_in(&serverkex.compression_algorithms_client_to_server)
            .ok_or(Error::NoCommonCompression)?
            .parse()
            .map_err(|_| Error::NoCommonCompression)?,
        clientkex
            .compression_algorithms_server_to_client
            .preferred_in(&serverkex.compression_algorithms_server_to_client)
            .ok_or(Error::NoCommonCompression)?
            .parse()
            .map_err(|_| Error::NoCommonCompression)?,
    ))
}

/// SSH compression algorithms.
///
/// Only `none` is carried; the slot is still negotiated like the others so
/// a peer that insists on compressing fails cleanly at kex time.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Compress {
    /// No compression algorithm.
    #[default]
    None,
}
