use crate::prelude::*;
use crate::growatt::frame::{FrameBuffer, FrameEvent};

use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;

/// Outcome of one interpreter step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Queue was empty.
    Idle,
    /// A byte went into the frame buffer.
    Accumulating,
    /// A candidate record was handed to the decoder, whether it decoded or not.
    RecordReady,
    /// Frame buffer filled without a terminator.
    Overflowed,
    /// Back off for the given time before polling again.
    Sleeping(Duration),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub empty_polls: u32,
    pub corrupt_frames: u32,
}

/// Turns queued bytes into datagrams and keeps the snapshot cell current.
pub struct Interpreter {
    config: config::Interpreter,
    queue: Arc<ByteQueue>,
    snapshot: SnapshotCell,
    status: StatusBoard,
    frame: FrameBuffer,
    counters: Counters,
    last_record: Option<Datagram>,
}

impl Interpreter {
    pub fn new(
        config: config::Interpreter,
        queue: Arc<ByteQueue>,
        snapshot: SnapshotCell,
        status: StatusBoard,
    ) -> Self {
        Self {
            config,
            queue,
            snapshot,
            status,
            frame: FrameBuffer::new(),
            counters: Counters::default(),
            last_record: None,
        }
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub async fn start(mut self) -> Result<()> {
        info!("interpreter starting");
        self.status.set_interpreter("Waiting for data");

        loop {
            match self.step(Local::now()) {
                Phase::Idle => tokio::time::sleep(self.config.poll_interval).await,
                Phase::Sleeping(backoff) => {
                    tokio::time::sleep(backoff).await;
                    self.wake();
                }
                Phase::RecordReady | Phase::Overflowed => tokio::task::yield_now().await,
                Phase::Accumulating => {}
            }
        }
    }

    /// Consumes at most one byte from the queue.
    pub fn step(&mut self, now: DateTime<Local>) -> Phase {
        let b = match self.queue.pop() {
            Some(b) => b,
            None => return self.on_empty(now),
        };
        self.counters.empty_polls = 0;

        let candidate = match self.frame.feed(b) {
            FrameEvent::Pushed => return Phase::Accumulating,
            FrameEvent::Overflow => None,
            FrameEvent::Candidate(data) => Some(Datagram::decode(data, now)),
        };

        match candidate {
            None => return self.on_overflow(now),
            Some(c) => self.on_candidate(c, now),
        }

        Phase::RecordReady
    }

    fn on_candidate(&mut self, candidate: Result<Datagram>, now: DateTime<Local>) {
        match candidate {
            Ok(datagram) => {
                debug!("{}", datagram);
                self.counters.corrupt_frames = 0;
                self.status
                    .set_interpreter(format!("Data:{} on {}", datagram.status, now.format("%H:%M:%S")));
                self.status.update_stats(|s| s.records_decoded += 1);
                self.snapshot.replace(datagram.clone());
                self.last_record = Some(datagram);
            }
            Err(e) => {
                warn!("discarding record: {}", e);
                self.status.update_stats(|s| s.records_rejected += 1);
            }
        }
    }

    /// Clears the transient counters after a backoff.
    pub fn wake(&mut self) {
        info!("interpreter resuming");
        self.counters = Counters::default();
        self.frame.reset();
        self.status.set_interpreter("Waiting for data");
    }

    fn on_empty(&mut self, now: DateTime<Local>) -> Phase {
        self.counters.empty_polls += 1;
        if self.counters.empty_polls < self.config.empty_poll_limit() {
            return Phase::Idle;
        }

        warn!(
            "no data for {}s, sleeping for {}s",
            self.config.idle_timeout.as_secs(),
            self.config.sleep_backoff.as_secs()
        );
        self.enter_sleep(Status::Sleeping, now);
        Phase::Sleeping(self.config.sleep_backoff)
    }

    fn on_overflow(&mut self, now: DateTime<Local>) -> Phase {
        self.counters.corrupt_frames += 1;
        debug!("frame overflow ({} in a row)", self.counters.corrupt_frames);
        self.status.update_stats(|s| s.frames_overflowed += 1);
        self.publish_placeholder(Status::Invalid, now);

        if self.counters.corrupt_frames <= self.config.corrupt_frame_limit {
            return Phase::Overflowed;
        }

        warn!(
            "{} corrupt frames in a row, backing off for {}s",
            self.counters.corrupt_frames,
            self.config.corrupt_backoff.as_secs()
        );
        self.enter_sleep(Status::Invalid, now);
        Phase::Sleeping(self.config.corrupt_backoff)
    }

    fn enter_sleep(&mut self, status: Status, now: DateTime<Local>) {
        self.publish_placeholder(status, now);
        self.queue.clear();
        self.frame.reset();
        self.counters = Counters::default();
        self.status.update_stats(|s| s.sleeps += 1);
        self.status
            .set_interpreter(format!("{} since {}", status, now.format("%H:%M:%S")));
    }

    fn publish_placeholder(&self, status: Status, now: DateTime<Local>) {
        self.snapshot
            .replace(Datagram::placeholder(status, self.last_record.as_ref(), now));
    }
}
