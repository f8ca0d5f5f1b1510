//! Cross-thread queue into the UI thread.
//!
//! Workers and the animation driver never touch views. They post
//! [`UiTask`]s into a bounded flume channel that the UI thread drains in
//! `pump`/`tick`. An update request carries an ack channel, so the worker
//! that made it can wait for the pass to finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender};

use crate::error::{Error, Result};

/// How often a waiting worker re-checks whether the runtime went away.
const ACK_POLL: Duration = Duration::from_millis(50);

/// Work for the UI thread.
pub(crate) enum UiTask {
    /// Run `update_all(reason)` and report the outcome on `ack`.
    Update {
        reason: String,
        ack: Sender<std::result::Result<(), String>>,
    },
    /// Advance the active animation ramp.
    Frame,
}

/// Sending side of the UI queue. Cheap to clone and `Send`.
#[derive(Clone)]
pub struct UiSender {
    tx: Sender<UiTask>,
    ui_thread: ThreadId,
    closed: Arc<AtomicBool>,
}

impl UiSender {
    /// Ask the UI thread for an update pass and wait until it has run.
    ///
    /// On the UI thread itself the pass runs directly.
    pub fn request_update(&self, reason: &str) -> Result<()> {
        if thread::current().id() == self.ui_thread {
            return crate::pipeline::mount::update_all(reason);
        }
        if self.is_closed() {
            return Err(Error::NotMounted);
        }

        let (ack, done) = flume::bounded(1);
        self.tx.send(UiTask::Update {
            reason: reason.to_string(),
            ack,
        })?;

        loop {
            match done.recv_timeout(ACK_POLL) {
                Ok(outcome) => return outcome.map_err(Error::Channel),
                Err(RecvTimeoutError::Timeout) if self.is_closed() => return Err(Error::NotMounted),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::Channel("update request dropped".to_string()));
                }
            }
        }
    }

    /// Post a frame tick without blocking. A full queue drops the tick.
    ///
    /// Returns `false` once the UI side is gone.
    pub fn post_frame(&self) -> bool {
        match self.tx.try_send(UiTask::Frame) {
            Ok(()) | Err(flume::TrySendError::Full(_)) => !self.is_closed(),
            Err(flume::TrySendError::Disconnected(_)) => false,
        }
    }

    /// Post a frame tick, waiting for room in the queue.
    pub fn finish_frame(&self) -> bool {
        !self.is_closed() && self.tx.send(UiTask::Frame).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Tasks waiting to be drained.
    pub fn pending(&self) -> usize {
        self.tx.len()
    }
}

/// Create the queue for the calling (UI) thread.
pub(crate) fn channel(capacity: usize) -> (UiSender, Receiver<UiTask>) {
    let (tx, rx) = flume::bounded(capacity.max(1));
    let sender = UiSender {
        tx,
        ui_thread: thread::current().id(),
        closed: Arc::new(AtomicBool::new(false)),
    };
    (sender, rx)
}
