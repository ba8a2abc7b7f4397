//! Outbound command packets
//!
//! The app side of the protocol wraps everything in a short 7-byte header:
//! magic, command type, sequence byte, and a 16-bit payload length split
//! around a reserved byte (from `Java_com_lewei_lib_LeweiLib_LW93SendUdpData`
//! in the firmware library). Commands go to UDP port 40000 on the drone.

use super::{CommandType, MAGIC};

/// Build an outbound command packet: 7-byte header plus payload
pub fn encode_command(command: u8, payload: &[u8]) -> Vec<u8> {
    let len = payload.len();
    let mut packet = Vec::with_capacity(super::COMMAND_HEADER_LEN + len);
    packet.extend_from_slice(&MAGIC.to_le_bytes());
    packet.push(command);
    packet.push(0x00); // sequence, always zero in observed captures
    packet.push((len & 0xFF) as u8);
    packet.push(0x00); // reserved
    packet.push((len >> 8) as u8);
    packet.extend_from_slice(payload);
    packet
}

/// Video start / session keep-alive command
///
/// The drone starts (and keeps) streaming as long as it sees this packet
/// about once a second; it stops a few seconds after the last one.
pub fn start_video() -> Vec<u8> {
    encode_command(CommandType::Heartbeat as u8, &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_video_packet() {
        // The exact bytes the stock app sends at 1 Hz
        assert_eq!(start_video(), [0x63, 0x63, 0x01, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_command_length_encoding() {
        let packet = encode_command(0x0A, &[0x66, 0x80, 0x99]);
        assert_eq!(&packet[..7], [0x63, 0x63, 0x0A, 0x00, 0x03, 0x00, 0x00]);
        assert_eq!(&packet[7..], [0x66, 0x80, 0x99]);

        let long = encode_command(0x0A, &vec![0u8; 0x1234]);
        assert_eq!(long[4], 0x34); // length low byte
        assert_eq!(long[6], 0x12); // length high byte
    }
}
