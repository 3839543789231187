//! Primitives of the SSH wire format: `byte`, `uint32`, `string`, `mpint`
//! and `name-list`, over a growable [`Encoder`] and a bounds-checked
//! [`Decoder`] cursor.
//!
//! All integers are big-endian; a `string` is opaque bytes behind a `uint32`
//! length; an `mpint` is a canonically-encoded two's-complement integer.

use crate::{Error, Result};

/// Growth ceiling for an [`Encoder`], to bound hostile or runaway encodes.
pub const ENCODE_LIMIT: usize = 256 * 1024;

/// A canonically-encoded multiple precision integer, stored as its wire
/// content bytes (without the length prefix).
///
/// Positive values with the high bit set carry a single leading `0x00`;
/// zero is the empty string; redundant leading bytes are never present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MpInt(Vec<u8>);

impl MpInt {
    /// Build an mpint from the big-endian magnitude of a positive integer.
    pub fn positive(magnitude: &[u8]) -> Self {
        let magnitude = match magnitude.iter().position(|&byte| byte != 0) {
            Some(start) => &magnitude[start..],
            None => &[],
        };

        let mut bytes = Vec::with_capacity(magnitude.len() + 1);
        if magnitude.first().is_some_and(|&byte| byte & 0x80 != 0) {
            bytes.push(0);
        }
        bytes.extend_from_slice(magnitude);

        Self(bytes)
    }

    /// The wire content bytes, sign byte included when one is needed.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn from_wire(bytes: &[u8]) -> Result<Self> {
        match *bytes {
            // `0x00` alone, or one that the next byte does not require.
            [0x00] => Err(Error::Malformed),
            [0x00, next, ..] if next & 0x80 == 0 => Err(Error::Malformed),
            // Likewise for a redundant sign extension of a negative value.
            [0xff, next, ..] if next & 0x80 != 0 => Err(Error::Malformed),
            _ => Ok(Self(bytes.to_vec())),
        }
    }
}

impl AsRef<[u8]> for MpInt {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A comma-separated list of ASCII algorithm names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameList(Vec<String>);

impl NameList {
    /// The names, in preference order.
    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// Walk `self` in order and pick the first name that also appears
    /// anywhere in `other`; the local preference always wins.
    pub fn preferred_in(&self, other: &NameList) -> Option<&str> {
        self.0
            .iter()
            .find(|name| other.0.contains(name))
            .map(String::as_str)
    }

    fn to_wire(&self) -> Vec<u8> {
        self.0.join(",").into_bytes()
    }

    fn from_wire(bytes: &[u8]) -> Result<Self> {
        if !bytes.is_ascii() {
            return Err(Error::Malformed);
        }

        let content = std::str::from_utf8(bytes).map_err(|_| Error::Malformed)?;
        if content.is_empty() {
            return Ok(Self::default());
        }

        let names: Vec<String> = content.split(',').map(str::to_owned).collect();
        if names.iter().any(String::is_empty) {
            return Err(Error::Malformed);
        }

        Ok(Self(names))
    }
}

impl<T: AsRef<str>> FromIterator<T> for NameList {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|name| name.as_ref().to_owned())
                .collect(),
        )
    }
}

/// A growable byte buffer with typed, bounds-limited writers.
#[derive(Debug)]
pub struct Encoder {
    buffer: Vec<u8>,
    limit: usize,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    /// An empty encoder with the default [`ENCODE_LIMIT`].
    pub fn new() -> Self {
        Self::with_limit(ENCODE_LIMIT)
    }

    /// An empty encoder refusing to grow past `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            limit,
        }
    }

    /// Consume the encoder, yielding the written bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    fn reserve(&mut self, additional: usize) -> Result<()> {
        if self.buffer.len() + additional > self.limit {
            return Err(Error::TooLarge);
        }

        Ok(())
    }

    /// Append a single `byte`.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.reserve(1)?;
        self.buffer.push(value);

        Ok(())
    }

    /// Append a big-endian `uint32`.
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.reserve(4)?;
        self.buffer.extend_from_slice(&value.to_be_bytes());

        Ok(())
    }

    /// Append a `boolean` (`0` or `1`).
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(value.into())
    }

    /// Append raw bytes without any framing.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(bytes.len())?;
        self.buffer.extend_from_slice(bytes);

        Ok(())
    }

    /// Append a length-prefixed `string`.
    pub fn write_string(&mut self, bytes: &[u8]) -> Result<()> {
        let len = u32::try_from(bytes.len()).map_err(|_| Error::TooLarge)?;

        self.write_u32(len)?;
        self.write_bytes(bytes)
    }

    /// Append a `name-list`.
    pub fn write_name_list(&mut self, list: &NameList) -> Result<()> {
        self.write_string(&list.to_wire())
    }

    /// Append an `mpint`.
    pub fn write_mpint(&mut self, value: &MpInt) -> Result<()> {
        self.write_string(value.as_bytes())
    }
}

impl AsRef<[u8]> for Encoder {
    fn as_ref(&self) -> &[u8] {
        &self.buffer
    }
}

/// A read cursor over a byte slice that refuses to advance past its end.
#[derive(Debug)]
pub struct Decoder<'b> {
    buffer: &'b [u8],
    position: usize,
}

impl<'b> Decoder<'b> {
    /// A cursor over `buffer`, starting at its first byte.
    pub fn new(buffer: &'b [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// The count of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    /// Whether the cursor reached the end of the buffer.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Read `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'b [u8]> {
        let bytes = self
            .buffer
            .get(self.position..)
            .and_then(|rest| rest.get(..len))
            .ok_or(Error::Malformed)?;
        self.position += len;

        Ok(bytes)
    }

    /// Read a fixed-size array of raw bytes.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.read_bytes(N)?);

        Ok(array)
    }

    /// Read a single `byte`.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a big-endian `uint32`.
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array::<4>()?))
    }

    /// Read a `boolean`; any non-zero byte is `true`.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Read a length-prefixed `string`.
    pub fn read_string(&mut self) -> Result<&'b [u8]> {
        let len = self.read_u32()? as usize;

        self.read_bytes(len)
    }

    /// Read a `name-list`.
    pub fn read_name_list(&mut self) -> Result<NameList> {
        NameList::from_wire(self.read_string()?)
    }

    /// Read an `mpint`, rejecting non-canonical encodings.
    pub fn read_mpint(&mut self) -> Result<MpInt> {
        MpInt::from_wire(self.read_string()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_primitives() {
        let mut encoder = Encoder::new();
        encoder.write_u8(0x2a).unwrap();
        encoder.write_u32(0xdead_beef).unwrap();
        encoder.write_bool(true).unwrap();
        encoder.write_string(b"some opaque\x00bytes").unwrap();

        let buffer = encoder.into_inner();
        let mut decoder = Decoder::new(&buffer);

        assert_eq!(decoder.read_u8().unwrap(), 0x2a);
        assert_eq!(decoder.read_u32().unwrap(), 0xdead_beef);
        assert!(decoder.read_bool().unwrap());
        assert_eq!(decoder.read_string().unwrap(), b"some opaque\x00bytes");
        assert!(decoder.is_empty());
    }

    #[test]
    fn refuses_truncated_reads() {
        let mut decoder = Decoder::new(&[0, 0, 0, 5, b'a']);

        assert!(matches!(decoder.read_string(), Err(Error::Malformed)));
    }

    #[test]
    fn mpint_is_canonical() {
        // High bit set gains a sign byte, leading zeroes are stripped.
        assert_eq!(MpInt::positive(&[0x80]).as_bytes(), &[0x00, 0x80]);
        assert_eq!(MpInt::positive(&[0x00, 0x7f]).as_bytes(), &[0x7f]);
        assert_eq!(MpInt::positive(&[]).as_bytes(), &[] as &[u8]);

        let reencoded = MpInt::positive(&[0x00, 0x00, 0x80]);
        assert_eq!(reencoded.as_bytes(), &[0x00, 0x80]);
    }

    #[test]
    fn mpint_rejects_redundant_bytes() {
        for wire in [
            &[0, 0, 0, 1, 0x00][..],
            &[0, 0, 0, 2, 0x00, 0x7f][..],
            &[0, 0, 0, 2, 0xff, 0x80][..],
        ] {
            let mut decoder = Decoder::new(wire);
            assert!(matches!(decoder.read_mpint(), Err(Error::Malformed)));
        }

        let mut decoder = Decoder::new(&[0, 0, 0, 2, 0x00, 0x80]);
        assert_eq!(decoder.read_mpint().unwrap().as_bytes(), &[0x00, 0x80]);
    }

    #[test]
    fn name_list_prefers_the_local_order() {
        let ours: NameList = ["curve25519-sha256", "diffie-hellman-group14-sha1"]
            .into_iter()
            .collect();
        let theirs: NameList = ["diffie-hellman-group14-sha1", "ssh-rsa"]
            .into_iter()
            .collect();

        assert_eq!(
            ours.preferred_in(&theirs),
            Some("diffie-hellman-group14-sha1")
        );
        assert_eq!(theirs.preferred_in(&ours), Some("diffie-hellman-group14-sha1"));
        assert_eq!(NameList::default().preferred_in(&theirs), None);
    }

    #[test]
    fn name_list_rejects_empty_entries() {
        let mut encoder = Encoder::new();
        encoder.write_string(b"aes128-ctr,,none").unwrap();

        let buffer = encoder.into_inner();
        assert!(matches!(
            Decoder::new(&buffer).read_name_list(),
            Err(Error::Malformed)
        ));
    }

    #[test]
    fn encoder_enforces_its_limit() {
        let mut encoder = Encoder::with_limit(8);

        encoder.write_u32(1).unwrap();
        assert!(matches!(
            encoder.write_string(b"overflow"),
            Err(Error::TooLarge)
        ));
    }
}
