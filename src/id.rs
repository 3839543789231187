//! The `SSH-protoversion-softwareversion` identification string exchanged
//! by both sides before any packet flows.

use std::{fmt, str::FromStr};

use futures::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Error, Result};

/// Longest identification line we accept from a peer, CR LF included.
const MAX_LINE: usize = 255;

/// Lines a peer may emit before its identification string; bounded so a
/// hostile peer cannot make us read banners forever.
const MAX_PREAMBLE_LINES: usize = 32;

/// An SSH identification string, e.g. `SSH-2.0-softwareversion comments`,
/// stored without its trailing CR LF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Id {
    protoversion: String,
    softwareversion: String,
    comments: Option<String>,
}

impl Id {
    /// An identifier for protocol version `2.0`.
    pub fn v2(softwareversion: impl Into<String>, comments: Option<impl Into<String>>) -> Self {
        Self {
            protoversion: "2.0".into(),
            softwareversion: softwareversion.into(),
            comments: comments.map(Into::into),
        }
    }

    /// Whether the protocol version is compatible with version 2.
    pub fn is_v2(&self) -> bool {
        // `1.99` is the RFC 4253 §5.1 compatibility marker for version 2.
        matches!(&*self.protoversion, "2.0" | "1.99")
    }

    /// Read a peer identifier, skipping any pre-banner lines the peer
    /// may emit before it.
    pub async fn from_async_reader(reader: &mut (impl AsyncBufRead + Unpin)) -> Result<Self> {
        let mut line = Vec::with_capacity(MAX_LINE);

        for _ in 0..MAX_PREAMBLE_LINES {
            line.clear();

            let read = reader.read_until(b'\n', &mut line).await?;
            if read == 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
            }
            if read > MAX_LINE {
                return Err(Error::Malformed);
            }

            let text = std::str::from_utf8(&line).map_err(|_| Error::Malformed)?;
            let text = text.trim_end_matches(['\r', '\n']);

            if text.starts_with("SSH-") {
                return text.parse();
            }

            tracing::debug!("Skipped a pre-banner line from the peer: {text}");
        }

        Err(Error::Malformed)
    }

    /// Write the identifier, CR LF terminated, to the provided writer.
    pub async fn to_async_writer(&self, writer: &mut (impl AsyncWrite + Unpin)) -> Result<()> {
        writer.write_all(format!("{self}\r\n").as_bytes()).await?;

        Ok(())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SSH-{}-{}", self.protoversion, self.softwareversion)?;

        if let Some(comments) = &self.comments {
            write!(f, " {comments}")?;
        }

        Ok(())
    }
}

impl FromStr for Id {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let rest = line.strip_prefix("SSH-").ok_or(Error::Malformed)?;
        let (protoversion, rest) = rest.split_once('-').ok_or(Error::Malformed)?;

        let (softwareversion, comments) = match rest.split_once(' ') {
            Some((softwareversion, comments)) => (softwareversion, Some(comments.to_owned())),
            None => (rest, None),
        };

        if protoversion.is_empty() || softwareversion.is_empty() {
            return Err(Error::Malformed);
        }

        Ok(Self {
            protoversion: protoversion.to_owned(),
            softwareversion: softwareversion.to_owned(),
            comments,
        })
    }
}
