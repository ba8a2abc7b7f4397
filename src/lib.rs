//! lewei-stream - Receiver for the Lewei 0x6363 UDP drone video protocol
//!
//! Talks to legacy FPV drones built on the Lewei `liblewei` firmware
//! (HASAKEE/SANROCK U61W family): keeps the session alive with the 1 Hz
//! start command, parses the proprietary 0x6363 datagram framing,
//! reassembles fragmented MJPEG frames, reverses the per-frame single-byte
//! obfuscation, and best-effort-repairs corrupt frames instead of dropping
//! them.
//!
//! The protocol was reverse engineered from the firmware library; there is
//! no public specification. Image decoding is delegated to the `image`
//! crate and used only to validate and consume finished frames.

pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod sink;
pub mod transport;
pub mod video;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use session::{SessionDriver, SessionStats};
pub use sink::FrameWriter;
pub use video::{FrameAssembler, RepairPolicy, VideoFrame};
