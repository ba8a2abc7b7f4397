//! Error types for lewei-stream

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// lewei-stream error types
///
/// Per-datagram errors (`ShortPacket`, `BadMagic`, `UnknownCommand`,
/// `MalformedKeyframe`, `ImageDecode`) are local to one receive cycle and
/// never terminate the session. Only `Bind` and unrecoverable transport
/// errors are fatal.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Datagram shorter than the fixed header
    #[error("Datagram too short: {len} bytes (header needs {min})")]
    ShortPacket {
        /// Received datagram length
        len: usize,
        /// Minimum parseable length
        min: usize,
    },

    /// First two little-endian bytes are not the protocol magic
    #[error("Bad magic {actual:#06x} (expected {expected:#06x})")]
    BadMagic {
        /// Magic value found on the wire
        actual: u16,
        /// Expected magic value
        expected: u16,
    },

    /// Command type outside the known name table (reported, non-fatal)
    #[error("Unknown command type {0:#04x}")]
    UnknownCommand(u8),

    /// Video fragment that cannot be attached to a frame (dropped, non-fatal)
    #[error("Malformed keyframe for frame {frame_id}: {reason}")]
    MalformedKeyframe {
        /// Frame id the fragment claimed to belong to
        frame_id: u32,
        /// Why the fragment was rejected
        reason: &'static str,
    },

    /// Local socket bind failure (fatal at startup)
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address the bind was attempted on
        addr: String,
        /// Underlying socket error
        source: std::io::Error,
    },

    /// Command send failure (reported, retried at the next scheduled tick)
    #[error("Send failed: {0}")]
    Send(std::io::Error),

    /// Assembled frame rejected by the image codec even after salvage
    #[error("Image decode failed: {0}")]
    ImageDecode(String),

    /// Configuration parse error
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration serialization error
    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
