//! Internal TLV codec.
//!
//! Frames are tag-length-value with a one-byte tag and a fixed four-byte
//! big-endian length. Tag numbers follow the SNMP BER assignments so captures
//! stay recognizable, but this is not BER: no interoperability with
//! third-party SNMP peers is attempted, only round-tripping between this
//! crate's client and agent.

use bytes::Bytes;

use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;

/// Tag constants. Numbering follows X.690/SNMP for familiarity.
pub mod tag {
    pub const INTEGER: u8 = 0x02;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OBJECT_IDENTIFIER: u8 = 0x06;
    pub const SEQUENCE: u8 = 0x30;

    pub const IP_ADDRESS: u8 = 0x40;
    pub const COUNTER32: u8 = 0x41;
    pub const GAUGE32: u8 = 0x42;
    pub const TIMETICKS: u8 = 0x43;
    pub const COUNTER64: u8 = 0x46;

    pub const NO_SUCH_OBJECT: u8 = 0x80;
    pub const NO_SUCH_INSTANCE: u8 = 0x81;
    pub const END_OF_MIB_VIEW: u8 = 0x82;

    pub const GET_REQUEST: u8 = 0xA0;
    pub const GET_NEXT_REQUEST: u8 = 0xA1;
    pub const RESPONSE: u8 = 0xA2;
    pub const SET_REQUEST: u8 = 0xA3;
    pub const GET_BULK_REQUEST: u8 = 0xA5;
}

const LEN_BYTES: usize = 4;

/// Buffer for TLV encoding.
///
/// Constructed frames write their tag, reserve the length field, emit the
/// content, then backpatch the length. Fixed-width lengths make this a single
/// pass with no pre-measuring.
pub struct EncodeBuf {
    buf: Vec<u8>,
}

impl EncodeBuf {
    /// Create a new encode buffer with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a new encode buffer with specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Current length of encoded data.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn push_header(&mut self, tag: u8, len: usize) {
        self.buf.push(tag);
        self.buf.extend_from_slice(&(len as u32).to_be_bytes());
    }

    /// Encode a constructed frame (SEQUENCE, PDU): the closure emits the
    /// content, then the length is patched in.
    pub fn push_constructed<F>(&mut self, tag: u8, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.buf.push(tag);
        let len_at = self.buf.len();
        self.buf.extend_from_slice(&[0; LEN_BYTES]);
        f(self);
        let content_len = (self.buf.len() - len_at - LEN_BYTES) as u32;
        self.buf[len_at..len_at + LEN_BYTES].copy_from_slice(&content_len.to_be_bytes());
    }

    /// Encode a SEQUENCE.
    pub fn push_sequence<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.push_constructed(tag::SEQUENCE, f);
    }

    /// Encode a signed 32-bit integer under the given tag.
    pub fn push_i32(&mut self, tag: u8, value: i32) {
        self.push_header(tag, 4);
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Encode an unsigned 32-bit integer under the given tag.
    pub fn push_u32(&mut self, tag: u8, value: u32) {
        self.push_header(tag, 4);
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Encode an unsigned 64-bit integer under the given tag.
    pub fn push_u64(&mut self, tag: u8, value: u64) {
        self.push_header(tag, 8);
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Encode an OCTET STRING.
    pub fn push_octet_string(&mut self, data: &[u8]) {
        self.push_header(tag::OCTET_STRING, data.len());
        self.buf.extend_from_slice(data);
    }

    /// Encode an empty frame under the given tag (NULL, exceptions).
    pub fn push_empty(&mut self, tag: u8) {
        self.push_header(tag, 0);
    }

    /// Encode an OBJECT IDENTIFIER: each arc as four big-endian bytes.
    pub fn push_oid(&mut self, oid: &Oid) {
        self.push_header(tag::OBJECT_IDENTIFIER, oid.len() * 4);
        for arc in oid.arcs() {
            self.buf.extend_from_slice(&arc.to_be_bytes());
        }
    }

    /// Finalize and return the encoded bytes.
    pub fn finish(self) -> Bytes {
        Bytes::from(self.buf)
    }
}

impl Default for EncodeBuf {
    fn default() -> Self {
        Self::new()
    }
}

/// TLV decoder over a byte buffer.
///
/// Reported error offsets are absolute within the original message, including
/// for decoders returned by [`read_sequence`](Decoder::read_sequence).
pub struct Decoder {
    data: Bytes,
    pos: usize,
    base: usize,
}

impl Decoder {
    /// Create a decoder over a message.
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
        }
    }

    /// Absolute offset of the next unread byte.
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// True when all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn read_header(&mut self) -> Result<(u8, usize)> {
        let at = self.offset();
        if self.data.len() - self.pos < 1 + LEN_BYTES {
            return Err(Error::decode(at, DecodeErrorKind::TruncatedData));
        }
        let tag = self.data[self.pos];
        let len = u32::from_be_bytes(
            self.data[self.pos + 1..self.pos + 1 + LEN_BYTES]
                .try_into()
                .expect("slice is LEN_BYTES long"),
        ) as usize;
        self.pos += 1 + LEN_BYTES;
        if self.data.len() - self.pos < len {
            return Err(Error::decode(at, DecodeErrorKind::TlvOverflow));
        }
        Ok((tag, len))
    }

    /// Read the next TLV, returning its tag and content.
    pub fn read_tlv(&mut self) -> Result<(u8, Bytes)> {
        let (tag, len) = self.read_header()?;
        let content = self.data.slice(self.pos..self.pos + len);
        self.pos += len;
        Ok((tag, content))
    }

    /// Peek at the next tag without consuming anything.
    pub fn peek_tag(&self) -> Result<u8> {
        if self.pos >= self.data.len() {
            return Err(Error::decode(self.offset(), DecodeErrorKind::TruncatedData));
        }
        Ok(self.data[self.pos])
    }

    /// Read the next TLV, requiring a specific tag.
    pub fn expect(&mut self, expected: u8) -> Result<Bytes> {
        let at = self.offset();
        let (tag, content) = self.read_tlv()?;
        if tag != expected {
            return Err(Error::decode(
                at,
                DecodeErrorKind::UnexpectedTag {
                    expected,
                    actual: tag,
                },
            ));
        }
        Ok(content)
    }

    /// Read a constructed frame with the given tag, returning a decoder over
    /// its content.
    pub fn read_constructed(&mut self, expected: u8) -> Result<Decoder> {
        let content_base = self.offset() + 1 + LEN_BYTES;
        let content = self.expect(expected)?;
        Ok(Decoder {
            data: content,
            pos: 0,
            base: content_base,
        })
    }

    /// Read a SEQUENCE, returning a decoder over its content.
    pub fn read_sequence(&mut self) -> Result<Decoder> {
        self.read_constructed(tag::SEQUENCE)
    }

    /// Read a signed 32-bit integer under the given tag.
    pub fn read_i32(&mut self, tag: u8) -> Result<i32> {
        let at = self.offset();
        let content = self.expect(tag)?;
        let bytes: [u8; 4] = content.as_ref().try_into().map_err(|_| {
            Error::decode(
                at,
                DecodeErrorKind::InvalidValueLength {
                    tag,
                    length: content.len(),
                },
            )
        })?;
        Ok(i32::from_be_bytes(bytes))
    }

    /// Read an unsigned 32-bit integer under the given tag.
    pub fn read_u32(&mut self, tag: u8) -> Result<u32> {
        let at = self.offset();
        let content = self.expect(tag)?;
        let bytes: [u8; 4] = content.as_ref().try_into().map_err(|_| {
            Error::decode(
                at,
                DecodeErrorKind::InvalidValueLength {
                    tag,
                    length: content.len(),
                },
            )
        })?;
        Ok(u32::from_be_bytes(bytes))
    }

    /// Read an unsigned 64-bit integer under the given tag.
    pub fn read_u64(&mut self, tag: u8) -> Result<u64> {
        let at = self.offset();
        let content = self.expect(tag)?;
        let bytes: [u8; 8] = content.as_ref().try_into().map_err(|_| {
            Error::decode(
                at,
                DecodeErrorKind::InvalidValueLength {
                    tag,
                    length: content.len(),
                },
            )
        })?;
        Ok(u64::from_be_bytes(bytes))
    }

    /// Read an OCTET STRING.
    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        self.expect(tag::OCTET_STRING)
    }

    /// Read an OBJECT IDENTIFIER.
    pub fn read_oid(&mut self) -> Result<Oid> {
        let at = self.offset();
        let content = self.expect(tag::OBJECT_IDENTIFIER)?;
        if content.len() % 4 != 0 {
            return Err(Error::decode(
                at,
                DecodeErrorKind::InvalidValueLength {
                    tag: tag::OBJECT_IDENTIFIER,
                    length: content.len(),
                },
            ));
        }
        let arcs: Vec<u32> = content
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes(c.try_into().expect("chunk is 4 bytes")))
            .collect();
        Ok(Oid::from_slice(&arcs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    #[test]
    fn test_i32_roundtrip() {
        let mut buf = EncodeBuf::new();
        buf.push_i32(tag::INTEGER, -12345);
        let mut dec = Decoder::new(buf.finish());
        assert_eq!(dec.read_i32(tag::INTEGER).unwrap(), -12345);
        assert!(dec.is_empty());
    }

    #[test]
    fn test_oid_roundtrip() {
        let mut buf = EncodeBuf::new();
        buf.push_oid(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0));
        let mut dec = Decoder::new(buf.finish());
        assert_eq!(dec.read_oid().unwrap(), oid!(1, 3, 6, 1, 2, 1, 1, 1, 0));
    }

    #[test]
    fn test_sequence_roundtrip() {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_i32(tag::INTEGER, 7);
            buf.push_octet_string(b"public");
        });
        let mut dec = Decoder::new(buf.finish());
        let mut seq = dec.read_sequence().unwrap();
        assert_eq!(seq.read_i32(tag::INTEGER).unwrap(), 7);
        assert_eq!(seq.read_octet_string().unwrap().as_ref(), b"public");
        assert!(seq.is_empty());
        assert!(dec.is_empty());
    }

    #[test]
    fn test_unexpected_tag() {
        let mut buf = EncodeBuf::new();
        buf.push_empty(tag::NULL);
        let mut dec = Decoder::new(buf.finish());
        let err = dec.read_i32(tag::INTEGER).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                kind: DecodeErrorKind::UnexpectedTag { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_truncated_data() {
        let mut dec = Decoder::new(Bytes::from_static(&[tag::INTEGER, 0, 0]));
        assert!(matches!(
            dec.read_tlv().unwrap_err(),
            Error::Decode {
                kind: DecodeErrorKind::TruncatedData,
                ..
            }
        ));
    }

    #[test]
    fn test_tlv_overflow() {
        // Claims 8 content bytes but carries only 1.
        let mut dec = Decoder::new(Bytes::from_static(&[tag::OCTET_STRING, 0, 0, 0, 8, 0xAA]));
        assert!(matches!(
            dec.read_tlv().unwrap_err(),
            Error::Decode {
                kind: DecodeErrorKind::TlvOverflow,
                ..
            }
        ));
    }

    #[test]
    fn test_nested_offset_is_absolute() {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_empty(tag::NULL);
        });
        let mut dec = Decoder::new(buf.finish());
        let mut seq = dec.read_sequence().unwrap();
        // The NULL TLV starts after the outer tag + length.
        assert_eq!(seq.offset(), 5);
        seq.read_tlv().unwrap();
        assert_eq!(seq.offset(), 10);
    }
}
