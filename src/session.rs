//! Session driver: command cadence, receive loop, dispatch
//!
//! One loop owns the transport and all reassembly state, so nothing here
//! needs a lock. The drone only streams while it keeps seeing the start
//! command, so the loop interleaves a 1 Hz (configurable) resend with
//! timeout-bounded receives. Completed frames leave through a bounded
//! channel; when the consumer falls behind, frames are dropped rather than
//! stalling the receive loop.

use crate::error::{Error, Result};
use crate::protocol::{CommandType, PacketHeader, start_video};
use crate::transport::PacketTransport;
use crate::video::{FrameAssembler, VideoFrame};
use crossbeam_channel::{Sender, TrySendError};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Receive buffer size; observed datagrams stay well under 2 KB
const RECV_BUFFER_SIZE: usize = 2048;

/// How often the running session logs a statistics summary
const STATS_INTERVAL: Duration = Duration::from_secs(10);

/// Shared session diagnostics (lock-free counters plus the last error)
#[derive(Default)]
pub struct SessionStats {
    /// Datagrams received
    pub datagrams: AtomicU64,
    /// Bytes received
    pub bytes: AtomicU64,
    /// Frames emitted by the assembler
    pub frames: AtomicU64,
    /// Frames the codec accepted as-is
    pub frames_decoded: AtomicU64,
    /// Frames the codec accepted only after salvage
    pub frames_repaired: AtomicU64,
    /// Frames skipped because every salvage candidate failed
    pub frames_skipped: AtomicU64,
    /// Frames dropped because the sink was backlogged
    pub frames_backlogged: AtomicU64,
    /// Video fragments dropped by the assembler
    pub fragments_dropped: AtomicU64,
    /// Datagrams with an undecodable header
    pub header_errors: AtomicU64,
    /// Datagrams with a command type outside the name table
    pub unknown_commands: AtomicU64,
    /// Failed command sends
    pub send_errors: AtomicU64,
    /// Most recent error, for diagnostics surfaces
    pub last_error: Mutex<Option<String>>,
}

impl SessionStats {
    /// Record an error as the most recent one
    pub fn record_error(&self, err: &Error) {
        *self.last_error.lock() = Some(err.to_string());
    }

    /// Log a one-line throughput/health summary
    pub fn log_summary(&self) {
        let bytes = self.bytes.load(Ordering::Relaxed);
        log::info!(
            "Session: {:.2} MB in {} datagrams | frames: {} ({} decoded, {} repaired, {} skipped) | dropped fragments: {}, unknown cmds: {}, send errors: {}",
            bytes as f64 / (1024.0 * 1024.0),
            self.datagrams.load(Ordering::Relaxed),
            self.frames.load(Ordering::Relaxed),
            self.frames_decoded.load(Ordering::Relaxed),
            self.frames_repaired.load(Ordering::Relaxed),
            self.frames_skipped.load(Ordering::Relaxed),
            self.fragments_dropped.load(Ordering::Relaxed),
            self.unknown_commands.load(Ordering::Relaxed),
            self.send_errors.load(Ordering::Relaxed),
        );
        if let Some(err) = self.last_error.lock().as_ref() {
            log::debug!("Last error: {}", err);
        }
    }
}

/// Drives one drone connection: heartbeat cadence, receive, dispatch
pub struct SessionDriver<T: PacketTransport> {
    transport: T,
    assembler: FrameAssembler,
    heartbeat_interval: Duration,
    last_heartbeat: Option<Instant>,
    frames: Sender<VideoFrame>,
    capture: Option<Box<dyn Write + Send>>,
    stats: Arc<SessionStats>,
    running: Arc<AtomicBool>,
}

impl<T: PacketTransport> SessionDriver<T> {
    /// Create a driver over an already-bound transport
    pub fn new(
        transport: T,
        heartbeat_interval: Duration,
        frames: Sender<VideoFrame>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            transport,
            assembler: FrameAssembler::new(),
            heartbeat_interval,
            last_heartbeat: None,
            frames,
            capture: None,
            stats: Arc::new(SessionStats::default()),
            running,
        }
    }

    /// Attach a raw capture sink; every datagram is appended exactly as
    /// received, no delimiters
    pub fn with_capture(mut self, sink: Box<dyn Write + Send>) -> Self {
        self.capture = Some(sink);
        self
    }

    /// Handle to the shared diagnostics counters
    pub fn stats(&self) -> Arc<SessionStats> {
        Arc::clone(&self.stats)
    }

    /// Run the receive/dispatch loop until the running flag clears
    ///
    /// Per-datagram errors are counted and logged, never fatal; only an
    /// unrecoverable transport error ends the session early. Any in-flight
    /// frame is discarded on exit, never emitted.
    pub fn run(&mut self) -> Result<()> {
        log::info!(
            "Session started (heartbeat every {:?})",
            self.heartbeat_interval
        );
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        let mut last_stats = Instant::now();

        while self.running.load(Ordering::Relaxed) {
            if let Err(e) = self.poll(&mut buf) {
                self.stats.record_error(&e);
                self.assembler.reset();
                log::error!("Session aborted: {}", e);
                return Err(e);
            }

            if last_stats.elapsed() >= STATS_INTERVAL {
                self.sync_assembler_stats();
                self.stats.log_summary();
                last_stats = Instant::now();
            }
        }

        self.assembler.reset();
        self.sync_assembler_stats();
        self.stats.log_summary();
        log::info!("Session stopped");
        Ok(())
    }

    /// One loop iteration: heartbeat tick, then a timeout-bounded receive
    fn poll(&mut self, buf: &mut [u8]) -> Result<()> {
        if self
            .last_heartbeat
            .is_none_or(|t| t.elapsed() >= self.heartbeat_interval)
        {
            self.send_heartbeat();
            self.last_heartbeat = Some(Instant::now());
        }

        if let Some(n) = self.transport.recv(buf)? {
            self.handle_datagram(&buf[..n]);
        }
        Ok(())
    }

    fn send_heartbeat(&mut self) {
        let packet = start_video();
        match self.transport.send(&packet) {
            Ok(_) => log::trace!("Sent start/keep-alive command"),
            // Not retried immediately; the next scheduled tick resends.
            Err(e) => {
                log::warn!("Heartbeat send failed: {}", e);
                self.stats.send_errors.fetch_add(1, Ordering::Relaxed);
                self.stats.record_error(&e);
            }
        }
    }

    fn handle_datagram(&mut self, datagram: &[u8]) {
        self.stats.datagrams.fetch_add(1, Ordering::Relaxed);
        self.stats
            .bytes
            .fetch_add(datagram.len() as u64, Ordering::Relaxed);

        if let Some(capture) = &mut self.capture
            && let Err(e) = capture.write_all(datagram)
        {
            log::warn!("Raw capture write failed, disabling capture: {}", e);
            self.capture = None;
        }

        let header = match PacketHeader::decode(datagram) {
            Ok(header) => header,
            Err(e) => {
                self.stats.header_errors.fetch_add(1, Ordering::Relaxed);
                self.stats.record_error(&e);
                log::debug!("Undecodable datagram ({} bytes): {}", datagram.len(), e);
                return;
            }
        };

        match CommandType::from_raw(header.command) {
            Some(CommandType::Heartbeat) => match header.ascii_body() {
                Some(text) if !text.is_empty() => log::debug!("Heartbeat ack: {}", text),
                _ => log::debug!("Heartbeat ack"),
            },
            Some(cmd) if cmd.is_video() => {
                if let Some(frame) = self.assembler.push(&header, datagram) {
                    self.emit(frame);
                }
            }
            Some(CommandType::KeyEvent) => {
                let preview = &header.payload()[..header.payload().len().min(8)];
                log::info!("Key event: {:02X?}", preview);
            }
            Some(other) => {
                log::debug!("Ignoring {} packet ({} bytes)", other.name(), datagram.len());
            }
            None => {
                let err = Error::UnknownCommand(header.command);
                self.stats.unknown_commands.fetch_add(1, Ordering::Relaxed);
                self.stats.record_error(&err);
                log::warn!("{} ({} bytes)", err, datagram.len());
            }
        }
    }

    fn emit(&mut self, frame: VideoFrame) {
        self.stats.frames.fetch_add(1, Ordering::Relaxed);
        match self.frames.try_send(frame) {
            Ok(()) => {}
            // Video is best-effort: drop rather than stall the receive loop.
            Err(TrySendError::Full(frame)) => {
                self.stats.frames_backlogged.fetch_add(1, Ordering::Relaxed);
                log::debug!("Frame sink backlogged, dropped frame {}", frame.frame_id);
            }
            Err(TrySendError::Disconnected(_)) => {
                log::warn!("Frame sink disconnected");
            }
        }
    }

    fn sync_assembler_stats(&self) {
        let (_, dropped) = self.assembler.stats();
        self.stats.fragments_dropped.store(dropped, Ordering::Relaxed);
    }
}
