//! MJPEG frame reassembly from video datagram fragments
//!
//! The protocol has no end-of-frame marker: a frame is complete when the
//! first fragment carrying a different frame id arrives. Completion
//! therefore lags one fragment behind the wire, which costs one frame of
//! latency but needs no timers and survives arbitrary fragment loss.
//!
//! At most one frame is in flight at a time; its buffer is owned exclusively
//! by the assembler and moved out on emission.

use super::JPEG_SOI;
use crate::error::Error;
use crate::protocol::{self, PacketHeader, deobfuscate};

/// One complete, deobfuscated encoded image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    /// Frame identifier the fragments shared
    pub frame_id: u32,
    /// Frame type flags captured from the keyframe fragment
    pub frame_type: u8,
    /// Encoded JPEG bytes
    pub data: Vec<u8>,
    /// Number of fragments that contributed
    pub fragments: u32,
}

enum State {
    Idle,
    Accumulating {
        frame_id: u32,
        frame_type: u8,
        buffer: Vec<u8>,
        fragments: u32,
    },
}

/// Reassembles video fragments into frames, keyed by the rolling frame id
pub struct FrameAssembler {
    state: State,
    frames_emitted: u64,
    fragments_dropped: u64,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            frames_emitted: 0,
            fragments_dropped: 0,
        }
    }

    /// Feed one video-bearing datagram
    ///
    /// Returns the previous frame when this datagram starts a new one. The
    /// fragment that signalled the boundary is processed as well, never lost.
    pub fn push(&mut self, header: &PacketHeader, datagram: &[u8]) -> Option<VideoFrame> {
        let fragment_index = datagram
            .get(protocol::FRAGMENT_INDEX_OFFSET)
            .copied()
            .unwrap_or(0);
        let payload = datagram
            .get(protocol::VIDEO_PAYLOAD_OFFSET..)
            .unwrap_or(&[]);

        // A different frame id finalizes whatever is in flight.
        let boundary = matches!(
            &self.state,
            State::Accumulating { frame_id, .. } if *frame_id != header.frame_id
        );
        let completed = if boundary { self.finalize() } else { None };

        if fragment_index == 1 && payload.starts_with(&JPEG_SOI) {
            self.state = State::Accumulating {
                frame_id: header.frame_id,
                // Captured here so the boundary datagram of the *next* frame
                // cannot change how this one is deobfuscated.
                frame_type: header.frame_type,
                buffer: payload.to_vec(),
                fragments: 1,
            };
        } else if fragment_index > 1 {
            match &mut self.state {
                State::Accumulating {
                    frame_id,
                    buffer,
                    fragments,
                    ..
                } if *frame_id == header.frame_id => {
                    buffer.extend_from_slice(payload);
                    *fragments += 1;
                }
                // The keyframe fragment was lost in transit; UDP loss is
                // expected, so drop and keep going.
                _ => self.drop_fragment(header.frame_id, "continuation without keyframe"),
            }
        } else if fragment_index == 1 {
            self.drop_fragment(header.frame_id, "keyframe without start-of-image marker");
        } else {
            self.drop_fragment(header.frame_id, "fragment index zero");
        }

        completed
    }

    /// Discard any in-flight buffer. Incomplete frames are never emitted.
    pub fn reset(&mut self) {
        if let State::Accumulating {
            frame_id, buffer, ..
        } = &self.state
        {
            log::debug!(
                "Discarding incomplete frame {} ({} bytes)",
                frame_id,
                buffer.len()
            );
        }
        self.state = State::Idle;
    }

    /// Frame id currently accumulating, if any
    pub fn in_flight(&self) -> Option<u32> {
        match &self.state {
            State::Accumulating { frame_id, .. } => Some(*frame_id),
            State::Idle => None,
        }
    }

    /// `(frames emitted, fragments dropped)` since construction
    pub fn stats(&self) -> (u64, u64) {
        (self.frames_emitted, self.fragments_dropped)
    }

    fn finalize(&mut self) -> Option<VideoFrame> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Accumulating {
                frame_id,
                frame_type,
                mut buffer,
                fragments,
            } => {
                deobfuscate(&mut buffer, frame_id, frame_type);
                self.frames_emitted += 1;
                log::trace!(
                    "Frame {} complete: {} bytes from {} fragments",
                    frame_id,
                    buffer.len(),
                    fragments
                );
                Some(VideoFrame {
                    frame_id,
                    frame_type,
                    data: buffer,
                    fragments,
                })
            }
            State::Idle => None,
        }
    }

    fn drop_fragment(&mut self, frame_id: u32, reason: &'static str) {
        self.fragments_dropped += 1;
        let err = Error::MalformedKeyframe { frame_id, reason };
        log::debug!("{}", err);
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}
