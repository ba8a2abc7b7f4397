//! Wire-level definitions for the 0x6363 camera protocol
//!
//! The protocol is proprietary and undocumented; everything here was
//! recovered from a disassembly of the drone's `liblewei-3.2.2.so` firmware
//! library and verified against live captures. There is no formal
//! specification to check against.

mod command;
mod header;
mod obfuscation;

pub use command::{encode_command, start_video};
pub use header::PacketHeader;
pub use obfuscation::{compute_index, deobfuscate};

/// Protocol magic, first two little-endian bytes of every datagram
pub const MAGIC: u16 = 0x6363;

/// Full header length; datagrams shorter than this are rejected
pub const HEADER_LEN: usize = 12;

/// Short command header length. Outbound commands and the text field of
/// non-video packets (heartbeat ack, key events) use this boundary.
pub const COMMAND_HEADER_LEN: usize = 7;

/// Byte offset of the fragment index within a video datagram. This is a
/// separate counter from the header's `sequence_id`.
pub const FRAGMENT_INDEX_OFFSET: usize = 48;

/// Fixed proprietary header length of video-bearing datagrams; the JPEG
/// payload starts here. Shorter datagrams carry no payload.
pub const VIDEO_PAYLOAD_OFFSET: usize = 54;

/// Frame type transmitted without obfuscation
pub const FRAME_TYPE_CLEAR: u8 = 0x02;

/// Command types observed on the wire
///
/// The table is fixed but not exhaustive; types outside it are reported and
/// ignored rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    /// Heartbeat/ack, carries the drone SSID as ASCII text
    Heartbeat = 0x01,
    /// Multi-fragment video data
    VideoFragment = 0x03,
    /// WiFi SSID (set)
    WifiSsidSet = 0x04,
    /// WiFi SSID (get)
    WifiSsidGet = 0x06,
    /// WiFi password (set)
    WifiPasswordSet = 0x07,
    /// Key event (shutter/record button on the transmitter)
    KeyEvent = 0x09,
    /// Joystick control data (outbound)
    ControlData = 0x0A,
    /// Single-datagram video data
    VideoSingle = 0x0B,
    /// Clear WiFi settings
    WifiClear = 0x0C,
    /// WiFi password (get)
    WifiPasswordGet = 0x0D,
    /// Camera LED on
    CameraLedOn = 0x0F,
    /// Camera LED off
    CameraLedOff = 0x10,
}

impl CommandType {
    /// Look up a raw command byte in the name table
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0x01 => Some(CommandType::Heartbeat),
            0x03 => Some(CommandType::VideoFragment),
            0x04 => Some(CommandType::WifiSsidSet),
            0x06 => Some(CommandType::WifiSsidGet),
            0x07 => Some(CommandType::WifiPasswordSet),
            0x09 => Some(CommandType::KeyEvent),
            0x0A => Some(CommandType::ControlData),
            0x0B => Some(CommandType::VideoSingle),
            0x0C => Some(CommandType::WifiClear),
            0x0D => Some(CommandType::WifiPasswordGet),
            0x0F => Some(CommandType::CameraLedOn),
            0x10 => Some(CommandType::CameraLedOff),
            _ => None,
        }
    }

    /// Human-readable command name for diagnostics
    pub fn name(self) -> &'static str {
        match self {
            CommandType::Heartbeat => "Heartbeat",
            CommandType::VideoFragment => "Multi-packet Video",
            CommandType::WifiSsidSet => "WiFi SSID (Set)",
            CommandType::WifiSsidGet => "WiFi SSID (Get)",
            CommandType::WifiPasswordSet => "WiFi Password (Set)",
            CommandType::KeyEvent => "Key Event",
            CommandType::ControlData => "Control Data",
            CommandType::VideoSingle => "Single Video Data",
            CommandType::WifiClear => "Clear WiFi",
            CommandType::WifiPasswordGet => "WiFi Password (Get)",
            CommandType::CameraLedOn => "Camera LED On",
            CommandType::CameraLedOff => "Camera LED Off",
        }
    }

    /// Whether this command carries video fragments for reassembly
    pub fn is_video(self) -> bool {
        matches!(self, CommandType::VideoFragment | CommandType::VideoSingle)
    }
}
