//! RCON packet framing.
//!
//! ```text
//! i32 length | i32 request id | i32 type | body bytes | 0x00 0x00
//! ```
//!
//! All integers are little-endian. `length` counts everything after itself.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{RconError, Result};

/// Largest command body a Minecraft server accepts.
pub const MAX_REQUEST_BODY: usize = 1446;
/// Largest body a Minecraft server sends in one packet.
pub const MAX_RESPONSE_BODY: usize = 4096;

/// Id, type and the two trailing NULs.
const HEADER_AND_PADDING: usize = 10;

/// RCON packet type.
///
/// Not an enum: the login reply reuses the command type value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketType(pub i32);

impl PacketType {
    pub const LOGIN: PacketType = PacketType(3);
    pub const COMMAND: PacketType = PacketType(2);
    pub const AUTH_RESPONSE: PacketType = PacketType(2);
    pub const RESPONSE: PacketType = PacketType(0);
}

/// One RCON packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub kind: PacketType,
    pub body: String,
}

impl Packet {
    pub fn new(id: i32, kind: PacketType, body: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            body: body.into(),
        }
    }

    /// Encodes the packet, length prefix included.
    pub fn encode(&self) -> Vec<u8> {
        let body = self.body.as_bytes();
        let length = (body.len() + HEADER_AND_PADDING) as i32;

        let mut buffer = Vec::with_capacity(4 + body.len() + HEADER_AND_PADDING);
        buffer.extend_from_slice(&length.to_le_bytes());
        buffer.extend_from_slice(&self.id.to_le_bytes());
        buffer.extend_from_slice(&self.kind.0.to_le_bytes());
        buffer.extend_from_slice(body);
        buffer.extend_from_slice(&[0, 0]);
        buffer
    }

    /// Removes one complete packet from the front of `buffer`.
    ///
    /// Returns `Ok(None)` if the buffer does not hold a whole packet yet.
    pub fn parse(buffer: &mut Vec<u8>) -> Result<Option<Packet>> {
        if buffer.len() < 4 {
            return Ok(None);
        }
        let length = frame_length(le_i32(&buffer[..4]))?;
        if buffer.len() < 4 + length {
            return Ok(None);
        }

        let packet = Self::decode(&buffer[4..4 + length])?;
        buffer.drain(..4 + length);
        Ok(Some(packet))
    }

    /// Reads exactly one packet.
    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Packet> {
        let mut prefix = [0u8; 4];
        reader.read_exact(&mut prefix).await.map_err(eof_as_closed)?;
        let length = frame_length(le_i32(&prefix))?;

        let mut frame = vec![0u8; length];
        reader.read_exact(&mut frame).await.map_err(eof_as_closed)?;
        Self::decode(&frame)
    }

    pub async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.encode()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Decodes a frame without its length prefix.
    fn decode(frame: &[u8]) -> Result<Packet> {
        let (head, tail) = frame.split_at(frame.len() - 2);
        if tail != [0, 0] {
            return Err(RconError::Protocol(
                "packet is missing its NUL terminator".to_string(),
            ));
        }

        Ok(Packet {
            id: le_i32(&head[0..4]),
            kind: PacketType(le_i32(&head[4..8])),
            body: String::from_utf8_lossy(&head[8..]).into_owned(),
        })
    }
}

fn frame_length(raw: i32) -> Result<usize> {
    let max = (MAX_RESPONSE_BODY + HEADER_AND_PADDING) as i32;
    if raw < HEADER_AND_PADDING as i32 || raw > max {
        return Err(RconError::Protocol(format!(
            "invalid packet length {}",
            raw
        )));
    }
    Ok(raw as usize)
}

fn le_i32(bytes: &[u8]) -> i32 {
    i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn eof_as_closed(err: std::io::Error) -> RconError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        RconError::Closed
    } else {
        RconError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let bytes = Packet::new(7, PacketType::COMMAND, "list").encode();
        assert_eq!(&bytes[0..4], &14i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &7i32.to_le_bytes());
        assert_eq!(&bytes[8..12], &2i32.to_le_bytes());
        assert_eq!(&bytes[12..16], b"list");
        assert_eq!(&bytes[16..], &[0, 0]);
    }

    #[test]
    fn test_parse_waits_for_whole_packet() {
        let bytes = Packet::new(1, PacketType::RESPONSE, "hello").encode();
        let mut buffer = bytes[..bytes.len() - 3].to_vec();
        assert_eq!(Packet::parse(&mut buffer).unwrap(), None);

        buffer.extend_from_slice(&bytes[bytes.len() - 3..]);
        let packet = Packet::parse(&mut buffer).unwrap().unwrap();
        assert_eq!(packet.body, "hello");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_parse_leaves_following_packet() {
        let mut buffer = Packet::new(1, PacketType::RESPONSE, "a").encode();
        buffer.extend(Packet::new(2, PacketType::RESPONSE, "b").encode());

        assert_eq!(Packet::parse(&mut buffer).unwrap().unwrap().id, 1);
        assert_eq!(Packet::parse(&mut buffer).unwrap().unwrap().id, 2);
        assert_eq!(Packet::parse(&mut buffer).unwrap(), None);
    }

    #[test]
    fn test_parse_rejects_bad_length() {
        let mut buffer = 3i32.to_le_bytes().to_vec();
        assert!(matches!(
            Packet::parse(&mut buffer),
            Err(RconError::Protocol(_))
        ));
    }

    #[test]
    fn test_parse_rejects_missing_terminator() {
        let mut bytes = Packet::new(1, PacketType::RESPONSE, "x").encode();
        let last = bytes.len() - 1;
        bytes[last] = b'!';
        assert!(matches!(
            Packet::parse(&mut bytes),
            Err(RconError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_read_from_stream() {
        let bytes = Packet::new(-1, PacketType::AUTH_RESPONSE, "").encode();
        let mut reader = &bytes[..];
        let packet = Packet::read_from(&mut reader).await.unwrap();
        assert_eq!(packet.id, -1);
        assert_eq!(packet.kind, PacketType::AUTH_RESPONSE);
    }

    #[tokio::test]
    async fn test_read_from_eof_is_closed() {
        let mut reader: &[u8] = &[];
        assert!(matches!(
            Packet::read_from(&mut reader).await,
            Err(RconError::Closed)
        ));
    }
}
