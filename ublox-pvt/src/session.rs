use std::{
    io::{ErrorKind, Read, Write},
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use chrono::{DateTime, Utc};

use crate::{
    FixPublisher, FrameAssembler, FrameOutcome, ReceiverConfigurator, TelemetryBus, UbxError,
};

const READ_CHUNK: usize = 4096;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
/// What a single [`Session::poll`] saw
pub struct PollSummary {
    /// Bytes read from the port
    pub bytes: usize,
    /// Validated frames assembled
    pub frames: usize,
    /// Fixes sent to the bus
    pub published: usize,
    /// A stale-fix signal was sent
    pub stale: bool,
}

/// Single-threaded bridge from a receiver port to a [`FixPublisher`].
///
/// The port read is the only blocking call; its timeout bounds how long a
/// poll can take. Malformed input, decode failures and bus failures are
/// logged and never end the loop.
pub struct Session<P, B> {
    port: P,
    assembler: FrameAssembler,
    publisher: FixPublisher<B>,
    read_buf: Vec<u8>,
    error_backoff: Duration,
}

impl<P: Read + Write, B: TelemetryBus> Session<P, B> {
    /// Create a session; `error_backoff` is the pause after a failed read.
    pub fn new(
        port: P,
        assembler: FrameAssembler,
        publisher: FixPublisher<B>,
        error_backoff: Duration,
    ) -> Self {
        Self {
            port,
            assembler,
            publisher,
            read_buf: vec![0; READ_CHUNK],
            error_backoff,
        }
    }

    /// Send the startup configuration to the receiver.
    pub fn configure_receiver(&mut self) -> Result<(), UbxError> {
        ReceiverConfigurator::configure(&mut self.port)
    }

    /// The frame assembler
    pub fn assembler(&self) -> &FrameAssembler {
        &self.assembler
    }

    /// The fix publisher
    pub fn publisher(&self) -> &FixPublisher<B> {
        &self.publisher
    }

    /// Tear the session apart.
    pub fn into_parts(self) -> (P, FrameAssembler, FixPublisher<B>) {
        (self.port, self.assembler, self.publisher)
    }

    /// Read once, publish whatever completed, then check fix liveness.
    pub fn poll(&mut self, now: DateTime<Utc>) -> PollSummary {
        let mut summary = PollSummary::default();
        match self.port.read(&mut self.read_buf) {
            Ok(n) => summary.bytes = n,
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                log::warn!("Failed to read from receiver: {e}");
                std::thread::sleep(self.error_backoff);
            }
        }
        for frame in self.assembler.feed(&self.read_buf[..summary.bytes]) {
            summary.frames += 1;
            match self.publisher.on_frame(&frame, now) {
                Ok(FrameOutcome::Published) => summary.published += 1,
                Ok(_) => {}
                Err(e) => log::warn!("Dropping frame: {e}"),
            }
        }
        match self.publisher.on_tick(now) {
            Ok(stale) => summary.stale = stale,
            Err(e) => log::warn!("Failed to report stale fix: {e}"),
        }
        summary
    }

    /// Poll until `running` is cleared, bracketed by status announcements.
    pub fn run(&mut self, running: &AtomicBool) {
        if let Err(e) = self.publisher.announce_online() {
            log::warn!("Failed to announce online status: {e}");
        }
        while running.load(Ordering::SeqCst) {
            self.poll(Utc::now());
        }
        if let Err(e) = self.publisher.announce_offline() {
            log::warn!("Failed to announce offline status: {e}");
        }
        let stats = self.assembler.stats();
        log::info!(
            "Session ended: {} frames, {} checksum failures, {} noise bytes",
            stats.frames,
            stats.checksum_failures,
            stats.noise_bytes
        );
    }
}
