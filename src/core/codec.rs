//! Command protocol codec.
//!
//! One connection carries a newline-terminated ASCII command token followed
//! by a single self-describing MessagePack value, and the reply is a single
//! value. The codec frames both: in [`Phase::Token`] it yields the token and
//! switches to [`Phase::Value`], where each complete value is yielded as raw
//! bytes for the caller to decode into its own type.

use bytes::{BufMut, Bytes, BytesMut};
use rmp::Marker;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{constants, LcpError, Result};

/// Longest accepted command token, terminator excluded
pub const MAX_TOKEN_LEN: usize = 64;

/// Largest single value accepted on the wire (256MB)
pub const MAX_VALUE_SIZE: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Token(String),
    Value(Bytes),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Token,
    Value,
}

#[derive(Debug)]
pub struct CommandCodec {
    phase: Phase,
    scan: ValueScan,
}

impl CommandCodec {
    /// Server side: a token is read first.
    pub fn server() -> Self {
        Self {
            phase: Phase::Token,
            scan: ValueScan::new(),
        }
    }

    /// Client side: only values are read back.
    pub fn client() -> Self {
        Self {
            phase: Phase::Value,
            scan: ValueScan::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn decode_token(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        let Some(pos) = src.iter().position(|b| *b == b'\n') else {
            if src.len() > MAX_TOKEN_LEN + 1 {
                return Err(LcpError::ProtocolError(
                    constants::ERR_COMMAND_TOO_LONG.into(),
                ));
            }
            return Ok(None);
        };

        let line = src.split_to(pos + 1);
        let mut token = &line[..pos];
        if let Some(stripped) = token.strip_suffix(b"\r") {
            token = stripped;
        }

        if token.len() > MAX_TOKEN_LEN {
            return Err(LcpError::ProtocolError(
                constants::ERR_COMMAND_TOO_LONG.into(),
            ));
        }
        if !token.is_ascii() {
            return Err(LcpError::ProtocolError(
                constants::ERR_NON_ASCII_COMMAND.into(),
            ));
        }

        self.phase = Phase::Value;
        self.scan = ValueScan::new();
        // ASCII was checked above
        let token = String::from_utf8_lossy(token).into_owned();
        Ok(Some(Frame::Token(token)))
    }

    fn decode_value(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match self.scan.advance(src)? {
            Some(len) => {
                self.scan = ValueScan::new();
                Ok(Some(Frame::Value(src.split_to(len).freeze())))
            }
            None => Ok(None),
        }
    }
}

/// Incremental walk over one MessagePack value as its bytes arrive.
///
/// Elements are stepped over by their headers, so string and binary bodies
/// are never read, and the walk resumes where the previous call stopped.
/// `need` is the buffer length below which no progress is possible.
#[derive(Debug, Clone, Copy)]
struct ValueScan {
    pos: usize,
    pending: u64,
    need: usize,
}

enum Layout {
    Element { header: usize, body: u64, children: u64 },
    ShortHeader(usize),
}

impl ValueScan {
    fn new() -> Self {
        Self {
            pos: 0,
            pending: 1,
            need: 1,
        }
    }

    /// Length of the value once every element of it is buffered.
    fn advance(&mut self, src: &[u8]) -> Result<Option<usize>> {
        if src.len() < self.need {
            return Ok(None);
        }

        while self.pending > 0 {
            let start = self.pos;
            let Some(&byte) = src.get(start) else {
                self.need = start + 1;
                return Ok(None);
            };

            let (header, body, children) = match layout(Marker::from_u8(byte), &src[start + 1..])? {
                Layout::Element {
                    header,
                    body,
                    children,
                } => (header, body, children),
                Layout::ShortHeader(width) => {
                    self.need = start + 1 + width;
                    return Ok(None);
                }
            };

            let end = usize::try_from(body)
                .ok()
                .and_then(|body| (start + 1 + header).checked_add(body))
                .filter(|end| *end <= MAX_VALUE_SIZE)
                .ok_or_else(too_large)?;
            if src.len() < end {
                self.need = end;
                return Ok(None);
            }

            self.pos = end;
            self.pending = self.pending - 1 + children;
            // every pending element takes at least one byte
            if (self.pos as u64).saturating_add(self.pending) > MAX_VALUE_SIZE as u64 {
                return Err(too_large());
            }
        }

        Ok(Some(self.pos))
    }
}

fn too_large() -> LcpError {
    LcpError::ProtocolError(format!("value exceeds {MAX_VALUE_SIZE} bytes"))
}

/// Header width, body size and child count of the element behind `marker`.
fn layout(marker: Marker, rest: &[u8]) -> Result<Layout> {
    let fixed = |body: u64| {
        Ok(Layout::Element {
            header: 0,
            body,
            children: 0,
        })
    };

    match marker {
        Marker::FixPos(_) | Marker::FixNeg(_) | Marker::Null | Marker::True | Marker::False => {
            fixed(0)
        }
        Marker::U8 | Marker::I8 => fixed(1),
        Marker::U16 | Marker::I16 => fixed(2),
        Marker::U32 | Marker::I32 | Marker::F32 => fixed(4),
        Marker::U64 | Marker::I64 | Marker::F64 => fixed(8),
        Marker::FixStr(len) => fixed(u64::from(len)),
        Marker::FixExt1 => fixed(2),
        Marker::FixExt2 => fixed(3),
        Marker::FixExt4 => fixed(5),
        Marker::FixExt8 => fixed(9),
        Marker::FixExt16 => fixed(17),
        Marker::FixArray(len) => Ok(Layout::Element {
            header: 0,
            body: 0,
            children: u64::from(len),
        }),
        Marker::FixMap(len) => Ok(Layout::Element {
            header: 0,
            body: 0,
            children: 2 * u64::from(len),
        }),
        Marker::Str8 | Marker::Bin8 => Ok(sized(rest, 1, 0)),
        Marker::Str16 | Marker::Bin16 => Ok(sized(rest, 2, 0)),
        Marker::Str32 | Marker::Bin32 => Ok(sized(rest, 4, 0)),
        // ext bodies carry a type byte before the data
        Marker::Ext8 => Ok(sized(rest, 1, 1)),
        Marker::Ext16 => Ok(sized(rest, 2, 1)),
        Marker::Ext32 => Ok(sized(rest, 4, 1)),
        Marker::Array16 => Ok(counted(rest, 2, 1)),
        Marker::Array32 => Ok(counted(rest, 4, 1)),
        Marker::Map16 => Ok(counted(rest, 2, 2)),
        Marker::Map32 => Ok(counted(rest, 4, 2)),
        Marker::Reserved => Err(LcpError::ProtocolError(
            "corrupt payload: reserved marker".into(),
        )),
    }
}

fn read_be(rest: &[u8], width: usize) -> Option<u64> {
    rest.get(..width)
        .map(|bytes| bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

fn sized(rest: &[u8], width: usize, extra: u64) -> Layout {
    match read_be(rest, width) {
        Some(len) => Layout::Element {
            header: width,
            body: len + extra,
            children: 0,
        },
        None => Layout::ShortHeader(width),
    }
}

fn counted(rest: &[u8], width: usize, per_entry: u64) -> Layout {
    match read_be(rest, width) {
        Some(len) => Layout::Element {
            header: width,
            body: 0,
            children: len * per_entry,
        },
        None => Layout::ShortHeader(width),
    }
}

impl Decoder for CommandCodec {
    type Item = Frame;
    type Error = LcpError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match self.phase {
            Phase::Token => self.decode_token(src),
            Phase::Value => self.decode_value(src),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if src.is_empty() {
            return Ok(None);
        }

        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None => match self.phase {
                Phase::Token => Err(LcpError::ProtocolError(format!(
                    "{}: unterminated command token",
                    constants::ERR_UNKNOWN_COMMAND
                ))),
                Phase::Value => Err(LcpError::ProtocolError(
                    constants::ERR_TRUNCATED_PAYLOAD.into(),
                )),
            },
        }
    }
}

impl Encoder<Frame> for CommandCodec {
    type Error = LcpError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        match frame {
            Frame::Token(token) => {
                if token.len() > MAX_TOKEN_LEN || !token.is_ascii() || token.contains('\n') {
                    return Err(LcpError::ProtocolError(format!(
                        "{}: {token:?}",
                        constants::ERR_UNKNOWN_COMMAND
                    )));
                }
                dst.reserve(token.len() + 1);
                dst.put_slice(token.as_bytes());
                dst.put_u8(b'\n');
            }
            Frame::Value(bytes) => dst.extend_from_slice(&bytes),
        }
        Ok(())
    }
}

/// Encode a value the way peers expect it: MessagePack with named fields,
/// so fields can be added without breaking older peers.
pub fn encode_value<T: serde::Serialize>(value: &T) -> Result<Bytes> {
    rmp_serde::to_vec_named(value)
        .map(Bytes::from)
        .map_err(|e| LcpError::Serialization(e.to_string()))
}

pub fn decode_value<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    rmp_serde::from_slice(bytes).map_err(|e| LcpError::ProtocolError(format!("corrupt payload: {e}")))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use serde::Serialize;

    #[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
    struct Sample {
        user: String,
        count: u32,
    }

    fn sample_bytes() -> Bytes {
        encode_value(&Sample {
            user: "peer".into(),
            count: 3,
        })
        .unwrap()
    }

    #[test]
    fn test_token_then_value() {
        let mut codec = CommandCodec::server();
        let mut buf = BytesMut::from(&b"UPDATELICENSE\r\n"[..]);
        buf.extend_from_slice(&sample_bytes());

        let token = codec.decode(&mut buf).unwrap();
        assert_eq!(token, Some(Frame::Token("UPDATELICENSE".into())));
        assert_eq!(codec.phase(), Phase::Value);

        let Some(Frame::Value(value)) = codec.decode(&mut buf).unwrap() else {
            panic!("expected a value frame");
        };
        let sample: Sample = decode_value(&value).unwrap();
        assert_eq!(sample.count, 3);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_value_waits() {
        let mut codec = CommandCodec::client();
        let bytes = sample_bytes();
        let mut buf = BytesMut::from(&bytes[..bytes.len() - 2]);

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(&bytes[bytes.len() - 2..]);
        assert!(matches!(codec.decode(&mut buf).unwrap(), Some(Frame::Value(_))));
    }

    #[test]
    fn test_large_value_in_small_chunks() {
        let payload = vec![0xA5u8; 4 * 1024 * 1024];
        let wire = rmp_serde::to_vec(&Bin(&payload)).unwrap();

        let mut codec = CommandCodec::client();
        let mut buf = BytesMut::new();
        let mut frames = Vec::new();
        for chunk in wire.chunks(8 * 1024) {
            buf.extend_from_slice(chunk);
            if let Some(frame) = codec.decode(&mut buf).unwrap() {
                frames.push(frame);
            }
            if frames.is_empty() {
                // the bin header already told the codec how much to wait for
                assert_eq!(codec.scan.need, wire.len());
            }
        }

        assert_eq!(frames.len(), 1);
        let Frame::Value(value) = &frames[0] else {
            panic!("expected a value frame");
        };
        assert_eq!(value.len(), wire.len());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_array_value_in_small_chunks() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(256 * 1024).collect();
        let wire = encode_value(&payload).unwrap();

        let mut codec = CommandCodec::client();
        let mut buf = BytesMut::new();
        let mut decoded = None;
        for chunk in wire.chunks(4 * 1024) {
            buf.extend_from_slice(chunk);
            if let Some(Frame::Value(value)) = codec.decode(&mut buf).unwrap() {
                decoded = Some(value);
            }
        }

        let back: Vec<u8> = decode_value(&decoded.unwrap()).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_oversized_and_reserved_values_rejected() {
        let mut codec = CommandCodec::client();
        // bin32 announcing 4GB
        let mut huge = BytesMut::from(&[0xC6u8, 0xFF, 0xFF, 0xFF, 0xFF][..]);
        assert!(matches!(
            codec.decode(&mut huge),
            Err(LcpError::ProtocolError(_))
        ));

        let mut codec = CommandCodec::client();
        let mut reserved = BytesMut::from(&[0xC1u8][..]);
        assert!(codec.decode(&mut reserved).is_err());
    }

    /// Serializes as a MessagePack `bin` rather than an array.
    struct Bin<'a>(&'a [u8]);

    impl Serialize for Bin<'_> {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
            serializer.serialize_bytes(self.0)
        }
    }

    #[test]
    fn test_eof_cases() {
        let mut codec = CommandCodec::client();
        assert_eq!(codec.decode_eof(&mut BytesMut::new()).unwrap(), None);

        let bytes = sample_bytes();
        let mut truncated = BytesMut::from(&bytes[..3]);
        assert!(matches!(
            codec.decode_eof(&mut truncated),
            Err(LcpError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_token_limits() {
        let mut codec = CommandCodec::server();
        let mut long = BytesMut::from(vec![b'A'; MAX_TOKEN_LEN + 8].as_slice());
        assert!(codec.decode(&mut long).is_err());

        let mut codec = CommandCodec::server();
        let mut non_ascii = BytesMut::from("CRÉER\n".as_bytes());
        assert!(codec.decode(&mut non_ascii).is_err());
    }

    #[test]
    fn test_encode_token() {
        let mut codec = CommandCodec::client();
        let mut dst = BytesMut::new();
        codec
            .encode(Frame::Token("CREATECONTENT".into()), &mut dst)
            .unwrap();
        assert_eq!(&dst[..], b"CREATECONTENT\n");
    }
}
