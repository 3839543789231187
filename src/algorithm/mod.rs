//! Supported algorithms for **compression**, **encryption**, **integrity**,
//! **host keys** and **key-exchange**.

pub(crate) mod cipher;
pub use cipher::Cipher;
pub(crate) use cipher::CipherState;

pub(crate) mod compress;
pub use compress::Compress;

pub(crate) mod hmac;
pub use hmac::Hmac;

pub(crate) mod kex;
pub use kex::Kex;

pub(crate) mod key;
pub use key::Key;
