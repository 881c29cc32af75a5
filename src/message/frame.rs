use bytes::{Buf, BufMut, Bytes, BytesMut};

/// The fixed-size frame header: a single little-endian `u32` declaring how
/// many body bytes follow. No type tag, no sequence number, no checksum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Header {
    pub body_size: u32,
}

impl Header {
    /// Bytes a header occupies on the wire.
    pub const WIRE_SIZE: usize = 4;

    pub fn new(body_size: u32) -> Header {
        Header { body_size }
    }

    pub fn encode(&self) -> [u8; Self::WIRE_SIZE] {
        self.body_size.to_le_bytes()
    }

    pub fn decode(raw: [u8; Self::WIRE_SIZE]) -> Header {
        Header {
            body_size: u32::from_le_bytes(raw),
        }
    }
}

/// One framed message: header plus a body of exactly `header.body_size`
/// bytes. A `body_size` of zero is a valid frame with an empty body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    header: Header,
    body: Bytes,
}

impl Message {
    /// Builds a message around raw body bytes; the header is derived.
    pub fn new(body: impl Into<Bytes>) -> Message {
        let body = body.into();
        Message {
            header: Header::new(body.len() as u32),
            body,
        }
    }

    /// Builds a message from text carrying the exact byte length, with no
    /// terminator. This is the default text convention.
    pub fn from_text(text: &str) -> Message {
        Message::new(Bytes::copy_from_slice(text.as_bytes()))
    }

    /// Builds a message in the legacy C-string convention: the body is the
    /// text plus a trailing NUL, and `body_size` counts the terminator.
    /// Kept for wire compatibility with peers speaking that convention.
    pub fn from_c_text(text: &str) -> Message {
        let mut body = BytesMut::with_capacity(text.len() + 1);
        body.put_slice(text.as_bytes());
        body.put_u8(0);
        Message::new(body.freeze())
    }

    /// Recovers the body as text. Bytes from the first NUL onward are
    /// dropped, so both text conventions decode to the same string.
    pub fn text(&self) -> String {
        let end = self
            .body
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.body.len());
        String::from_utf8_lossy(&self.body[..end]).into_owned()
    }

    pub fn header(&self) -> Header {
        self.header
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn body_size(&self) -> u32 {
        self.header.body_size
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Total frame length on the wire.
    pub fn wire_size(&self) -> usize {
        Header::WIRE_SIZE + self.body.len()
    }

    /// Encodes the whole frame: header verbatim, then the body, with no
    /// padding or delimiters.
    pub fn encode(&self) -> Bytes {
        let mut buffer = BytesMut::with_capacity(self.wire_size());
        buffer.put_slice(&self.header.encode());
        buffer.put_slice(&self.body);
        buffer.freeze()
    }

    /// Parses one frame off the front of `buffer`, leaving any trailing
    /// bytes in place. Returns `None` when the buffer does not yet hold a
    /// complete frame.
    pub fn decode(buffer: &mut BytesMut) -> Option<Message> {
        if buffer.remaining() < Header::WIRE_SIZE {
            return None;
        }
        let declared =
            u32::from_le_bytes(buffer[..Header::WIRE_SIZE].try_into().unwrap()) as usize;
        if buffer.remaining() < Header::WIRE_SIZE + declared {
            return None;
        }
        buffer.advance(Header::WIRE_SIZE);
        let body = buffer.split_to(declared).freeze();
        Some(Message::new(body))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::empty(b"".as_slice())]
    #[case::short(b"hello".as_slice())]
    #[case::binary(&[0u8, 1, 2, 253, 254, 255])]
    fn test_encode_decode_round_trip(#[case] body: &[u8]) {
        let message = Message::new(Bytes::copy_from_slice(body));
        assert_eq!(message.body_size() as usize, body.len());

        let mut buffer = BytesMut::from(message.encode().as_ref());
        let decoded = Message::decode(&mut buffer).expect("complete frame");
        assert_eq!(decoded, message);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_header_is_little_endian() {
        let header = Header::new(0x0102_0304);
        assert_eq!(header.encode(), [0x04, 0x03, 0x02, 0x01]);
        assert_eq!(Header::decode([0x04, 0x03, 0x02, 0x01]), header);
    }

    #[test]
    fn test_decode_incomplete_frame() {
        let message = Message::from_text("incomplete");
        let encoded = message.encode();

        // nothing short of the full frame decodes
        for cut in 0..encoded.len() {
            let mut buffer = BytesMut::from(&encoded[..cut]);
            assert!(Message::decode(&mut buffer).is_none());
            assert_eq!(buffer.len(), cut, "partial input must stay buffered");
        }
    }

    #[test]
    fn test_decode_leaves_trailing_bytes() {
        let first = Message::from_text("one");
        let second = Message::from_text("two");
        let mut buffer = BytesMut::new();
        buffer.extend_from_slice(&first.encode());
        buffer.extend_from_slice(&second.encode());

        assert_eq!(Message::decode(&mut buffer), Some(first));
        assert_eq!(Message::decode(&mut buffer), Some(second));
        assert_eq!(Message::decode(&mut buffer), None);
    }

    #[test]
    fn test_c_text_convention() {
        let message = Message::from_c_text("hi");
        assert_eq!(message.body_size(), 3);
        assert_eq!(message.body().as_ref(), b"hi\0");
        assert_eq!(message.text(), "hi");
    }

    #[test]
    fn test_plain_text_convention() {
        let message = Message::from_text("hi");
        assert_eq!(message.body_size(), 2);
        assert_eq!(message.text(), "hi");
    }
}
