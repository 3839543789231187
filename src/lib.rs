#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    clippy::unwrap_used,
    clippy::panic,
    clippy::unimplemented,
    clippy::todo,
    clippy::undocumented_unsafe_blocks
)]
#![forbid(unsafe_code)]

mod error;
pub use error::{DisconnectedBy, DisconnectedError, Error, Result};

pub mod wire;

mod id;
pub use id::Id;

pub mod trans;

mod stream;
pub use stream::{IntoPacket, Packet, MAX_PACKET_SIZE, MAX_PACKET_SIZE_CEILING};

pub mod algorithm;

pub mod knownhosts;

mod client;
pub use client::{Algorithms, Client};

mod session;
pub use session::{Pipe, Session};
