//! 0x6363 packet header decoding
//!
//! Field layout recovered from the `liblewei-3.2.2.so` stack frame at the
//! packet dispatch routine (lines 15240-15266 of the decompilation):
//!
//! | Offset | Size | Field                          |
//! |--------|------|--------------------------------|
//! | 0      | 2    | magic = 0x6363 (LE)            |
//! | 2      | 1    | command type                   |
//! | 3      | 2    | sequence id (LE)               |
//! | 5      | 2    | declared length (LE, untrusted)|
//! | 7      | 1    | frame type                     |
//! | 8      | 4    | frame id (LE)                  |
//!
//! `declared_len` does not reliably match the actual payload size in
//! captures and is parsed for diagnostics only. `frame_type` and `frame_id`
//! are only meaningful on video-bearing datagrams; non-video packets reuse
//! those bytes as part of a text field that starts right after the short
//! 7-byte command header.

use super::{COMMAND_HEADER_LEN, HEADER_LEN, MAGIC};
use crate::error::{Error, Result};

/// Parsed view of one datagram's header plus its trailing bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketHeader<'a> {
    /// Protocol magic, always 0x6363 after a successful decode
    pub magic: u16,
    /// Command type byte (see [`super::CommandType`])
    pub command: u8,
    /// Packet sequence id
    pub sequence_id: u16,
    /// Declared payload length; informational only, never used for bounds
    pub declared_len: u16,
    /// Frame type flags (video only)
    pub frame_type: u8,
    /// Rolling frame identifier, the reassembly key (video only)
    pub frame_id: u32,
    /// The whole datagram, kept for the offset-based payload views
    raw: &'a [u8],
}

impl<'a> PacketHeader<'a> {
    /// Parse the fixed header of one datagram. Pure, no side effects.
    pub fn decode(datagram: &'a [u8]) -> Result<Self> {
        if datagram.len() < HEADER_LEN {
            return Err(Error::ShortPacket {
                len: datagram.len(),
                min: HEADER_LEN,
            });
        }

        let magic = u16::from_le_bytes([datagram[0], datagram[1]]);
        if magic != MAGIC {
            return Err(Error::BadMagic {
                actual: magic,
                expected: MAGIC,
            });
        }

        Ok(Self {
            magic,
            command: datagram[2],
            sequence_id: u16::from_le_bytes([datagram[3], datagram[4]]),
            declared_len: u16::from_le_bytes([datagram[5], datagram[6]]),
            frame_type: datagram[7],
            frame_id: u32::from_le_bytes([
                datagram[8],
                datagram[9],
                datagram[10],
                datagram[11],
            ]),
            raw: datagram,
        })
    }

    /// Bytes after the full 12-byte header
    pub fn payload(&self) -> &'a [u8] {
        &self.raw[HEADER_LEN..]
    }

    /// Bytes after the short 7-byte command header. Non-video packets put
    /// their body here, overlapping the frame type/id fields.
    pub fn body(&self) -> &'a [u8] {
        &self.raw[COMMAND_HEADER_LEN..]
    }

    /// Body as trailing-NUL-trimmed printable ASCII, if it is that.
    /// Heartbeat acks carry the drone SSID in this form.
    pub fn ascii_body(&self) -> Option<&'a str> {
        let body = self.body();
        let end = body.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
        let text = std::str::from_utf8(&body[..end]).ok()?;
        text.chars()
            .all(|c| c.is_ascii() && !c.is_ascii_control())
            .then_some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_hex(hex: &str) -> Vec<u8> {
        (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
            .collect()
    }

    /// Heartbeat/ack capture from the drone's access point
    const HEARTBEAT_HEX: &str = "63630100006300484153414b45452d576946692d31393134354\
300000000000000000000000000000000000000000000000000000000";

    /// First fragment of a multi-packet video frame
    const VIDEO_HEX: &str = "63630300004601037e675a5a681c00005a5a5a5a5a5a5a5a5a5a5a\
5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a01060006001001a28a0028a28a";

    #[test]
    fn test_decode_heartbeat_capture() {
        let data = from_hex(HEARTBEAT_HEX);
        let header = PacketHeader::decode(&data).unwrap();

        assert_eq!(header.magic, 0x6363);
        assert_eq!(header.command, 0x01);
        assert_eq!(
            header.frame_id,
            u32::from_le_bytes([data[8], data[9], data[10], data[11]])
        );
        assert_eq!(header.ascii_body(), Some("HASAKEE-WiFi-19145C"));
    }

    #[test]
    fn test_decode_video_capture() {
        let data = from_hex(VIDEO_HEX);
        let header = PacketHeader::decode(&data).unwrap();

        assert_eq!(header.command, 0x03);
        assert_ne!(header.frame_id, 0);
        assert_eq!(header.frame_id, 0x5A5A677E);
        assert_eq!(header.frame_type, 0x03);
        // Binary body must not pass for text
        assert_eq!(header.ascii_body(), None);
    }

    #[test]
    fn test_short_packet() {
        let result = PacketHeader::decode(&[0x63, 0x63, 0x01]);
        assert!(matches!(
            result,
            Err(Error::ShortPacket { len: 3, min: 12 })
        ));
    }

    #[test]
    fn test_bad_magic() {
        let result = PacketHeader::decode(&[0u8; 16]);
        assert!(matches!(
            result,
            Err(Error::BadMagic {
                actual: 0,
                expected: 0x6363
            })
        ));
    }

    #[test]
    fn test_payload_views() {
        let data = from_hex(HEARTBEAT_HEX);
        let header = PacketHeader::decode(&data).unwrap();

        assert_eq!(header.payload().len(), data.len() - 12);
        assert_eq!(header.body().len(), data.len() - 7);
        assert_eq!(&header.body()[..7], b"HASAKEE");
    }
}
