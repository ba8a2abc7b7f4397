//! Frame consumer: codec validation, salvage, persistence
//!
//! Runs on its own thread, fed by the session's bounded frame channel. Each
//! frame is handed to the JPEG codec first; only frames the codec rejects go
//! through the salvage candidates, in order, and the first candidate that
//! decodes wins. A frame that survives nothing is reported and skipped;
//! the capture loop never sees any of this.

use crate::error::Error;
use crate::session::SessionStats;
use crate::video::{RepairPolicy, VideoFrame};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// How long to wait on the channel before rechecking the shutdown flag
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Consumes completed frames from the session driver
pub struct FrameWriter {
    frames: Receiver<VideoFrame>,
    policy: RepairPolicy,
    output_dir: Option<PathBuf>,
    running: Arc<AtomicBool>,
    stats: Arc<SessionStats>,
    frame_count: u64,
}

impl FrameWriter {
    pub fn new(
        frames: Receiver<VideoFrame>,
        policy: RepairPolicy,
        output_dir: Option<PathBuf>,
        running: Arc<AtomicBool>,
        stats: Arc<SessionStats>,
    ) -> Self {
        Self {
            frames,
            policy,
            output_dir,
            running,
            stats,
            frame_count: 0,
        }
    }

    /// Run the consumer loop until shutdown or channel close
    pub fn run(&mut self) {
        match &self.output_dir {
            Some(dir) => {
                log::info!("Frame writer started, persisting to {}", dir.display());
                if let Err(e) = std::fs::create_dir_all(dir) {
                    log::error!(
                        "Cannot create {}, persistence disabled: {}",
                        dir.display(),
                        e
                    );
                    self.output_dir = None;
                }
            }
            None => log::info!("Frame writer started (validate-only, no persistence)"),
        }

        while self.running.load(Ordering::Relaxed) {
            match self.frames.recv_timeout(POLL_INTERVAL) {
                Ok(frame) => self.process(frame),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        log::info!("Frame writer stopped ({} frames written)", self.frame_count);
    }

    /// Validate one frame, salvaging it first if the codec rejects it
    pub fn process(&mut self, frame: VideoFrame) {
        match decode_jpeg(&frame.data) {
            Ok(image) => {
                self.stats.frames_decoded.fetch_add(1, Ordering::Relaxed);
                self.persist(&frame, &frame.data, &image);
            }
            Err(err) => {
                log::debug!(
                    "Frame {} rejected by codec ({} bytes): {}",
                    frame.frame_id,
                    frame.data.len(),
                    err
                );
                self.salvage(frame);
            }
        }
    }

    fn salvage(&mut self, frame: VideoFrame) {
        for candidate in self.policy.candidates(&frame.data) {
            if let Ok(image) = decode_jpeg(&candidate) {
                self.stats.frames_repaired.fetch_add(1, Ordering::Relaxed);
                log::info!(
                    "Salvaged frame {} ({} -> {} bytes)",
                    frame.frame_id,
                    frame.data.len(),
                    candidate.len()
                );
                self.persist(&frame, &candidate, &image);
                return;
            }
        }

        self.stats.frames_skipped.fetch_add(1, Ordering::Relaxed);
        let err = Error::ImageDecode(format!(
            "frame {} unrecoverable ({} bytes, {} fragments)",
            frame.frame_id,
            frame.data.len(),
            frame.fragments
        ));
        self.stats.record_error(&err);
        log::warn!("{}, skipped", err);
    }

    fn persist(&mut self, frame: &VideoFrame, data: &[u8], image: &image::DynamicImage) {
        self.frame_count += 1;
        log::trace!(
            "Frame {}: {}x{} from {} fragments",
            frame.frame_id,
            image.width(),
            image.height(),
            frame.fragments
        );

        if let Some(dir) = &self.output_dir {
            let path = dir.join(format!("frame_{:06}.jpg", self.frame_count));
            if let Err(e) = std::fs::write(&path, data) {
                log::warn!("Failed to write {}: {}", path.display(), e);
            }
        }
    }
}

/// Decode through the JPEG codec; doubles as the validity check that gates
/// the salvage heuristics
fn decode_jpeg(data: &[u8]) -> image::ImageResult<image::DynamicImage> {
    image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    fn encoded_jpeg() -> Vec<u8> {
        let img = image::RgbImage::from_fn(32, 32, |x, y| {
            image::Rgb([(x * 8) as u8, (y * 8) as u8, 128])
        });
        let mut buf = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Jpeg)
            .unwrap();
        buf.into_inner()
    }

    fn writer() -> (FrameWriter, Arc<SessionStats>) {
        let (_tx, rx) = bounded(1);
        let stats = Arc::new(SessionStats::default());
        let writer = FrameWriter::new(
            rx,
            RepairPolicy::default(),
            None,
            Arc::new(AtomicBool::new(false)),
            Arc::clone(&stats),
        );
        (writer, stats)
    }

    #[test]
    fn test_valid_frame_counted_as_decoded() {
        let (mut writer, stats) = writer();
        writer.process(VideoFrame {
            frame_id: 1,
            frame_type: 0x01,
            data: encoded_jpeg(),
            fragments: 3,
        });

        assert_eq!(stats.frames_decoded.load(Ordering::Relaxed), 1);
        assert_eq!(stats.frames_skipped.load(Ordering::Relaxed), 0);
        assert_eq!(writer.frame_count, 1);
    }

    #[test]
    fn test_garbage_frame_skipped_without_panic() {
        let (mut writer, stats) = writer();
        writer.process(VideoFrame {
            frame_id: 2,
            frame_type: 0x01,
            data: vec![0xDE, 0xAD, 0xBE, 0xEF],
            fragments: 1,
        });

        assert_eq!(stats.frames_decoded.load(Ordering::Relaxed), 0);
        assert_eq!(stats.frames_skipped.load(Ordering::Relaxed), 1);
        assert!(
            stats
                .last_error
                .lock()
                .as_deref()
                .unwrap()
                .contains("frame 2")
        );
    }

    #[test]
    fn test_rejected_frame_walks_candidates_in_order() {
        // A structurally corrupt buffer the policy can produce candidates
        // for: every candidate also fails here, so the frame ends skipped
        // after the full walk instead of crashing partway.
        let mut bogus = vec![0xFF, 0xD8]; // SOI, then a fake SOS
        bogus.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x04, 0x01, 0x00]);
        bogus.extend_from_slice(&[0x12, 0xFF, 0x2C, 0x34]); // bare 0xFF in scan
        assert!(!RepairPolicy::default().candidates(&bogus).is_empty());

        let (mut writer, stats) = writer();
        writer.process(VideoFrame {
            frame_id: 3,
            frame_type: 0x01,
            data: bogus,
            fragments: 2,
        });

        assert_eq!(stats.frames_decoded.load(Ordering::Relaxed), 0);
        assert_eq!(stats.frames_skipped.load(Ordering::Relaxed), 1);
    }
}
