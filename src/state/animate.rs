//! Animation Scheduler - one timed ramp per update pass.
//!
//! Handlers queue interpolation callbacks while observers run. After the
//! pass, [`start`] drives everything queued through a single ramp:
//!
//! - Every callback is invoked once with progress `0.0` immediately
//! - A driver thread posts frame ticks to the UI thread until the ramp's
//!   duration has elapsed
//! - Each tick invokes every callback with the current progress, ending at `1.0`
//!
//! The queue is rebuilt on every pass, so animations never accumulate. A
//! ramp that is still running when the next one starts is snapped to `1.0`
//! first.
//!
//! # Example
//!
//! ```ignore
//! use spark_bind::state::animate;
//!
//! animate::enqueue(move |progress| println!("width: {}", 10.0 + progress * 20.0));
//! animate::start(Duration::from_millis(300), Duration::from_millis(16), Some(sender));
//!
//! // On the UI thread, for every frame tick:
//! animate::frame(Instant::now());
//! ```

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::pipeline::queue::UiSender;

/// Callback invoked with ramp progress in `[0, 1]`.
pub type Interpolation = Box<dyn Fn(f32)>;

// =============================================================================
// State
// =============================================================================

struct Ramp {
    callbacks: Vec<Interpolation>,
    started: Instant,
    duration: Duration,
    /// Flag to signal the driver thread to stop.
    running: Arc<AtomicBool>,
}

impl Ramp {
    fn run(&self, progress: f32) {
        for callback in &self.callbacks {
            callback(progress);
        }
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

thread_local! {
    static QUEUE: RefCell<Vec<Interpolation>> = RefCell::new(Vec::new());
    static ACTIVE: RefCell<Option<Ramp>> = const { RefCell::new(None) };
}

// =============================================================================
// Queue
// =============================================================================

/// Discard everything queued so far.
pub fn clear_queue() {
    QUEUE.with(|queue| queue.borrow_mut().clear());
}

pub fn enqueue(callback: impl Fn(f32) + 'static) {
    QUEUE.with(|queue| queue.borrow_mut().push(Box::new(callback)));
}

/// Number of callbacks waiting for the next ramp.
pub fn queued() -> usize {
    QUEUE.with(|queue| queue.borrow().len())
}

// =============================================================================
// Ramp
// =============================================================================

/// Start a ramp over everything queued.
///
/// Returns `false` if the queue was empty. With `ticker`, a driver thread
/// posts frame ticks through it; without one, frames are driven manually via
/// [`frame`] or [`finish`].
pub fn start(duration: Duration, frame_interval: Duration, ticker: Option<UiSender>) -> bool {
    let callbacks = QUEUE.with(|queue| std::mem::take(&mut *queue.borrow_mut()));
    if callbacks.is_empty() {
        return false;
    }

    finish();

    let ramp = Ramp {
        callbacks,
        started: Instant::now(),
        duration,
        running: Arc::new(AtomicBool::new(true)),
    };
    trace!(callbacks = ramp.callbacks.len(), ?duration, "ramp start");
    ramp.run(0.0);

    if duration.is_zero() {
        ramp.run(1.0);
        ramp.stop();
        return true;
    }

    if let Some(ticker) = ticker {
        let running = ramp.running.clone();
        thread::spawn(move || {
            let deadline = Instant::now() + duration;
            while running.load(Ordering::SeqCst) {
                thread::sleep(frame_interval);
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                if Instant::now() >= deadline {
                    // The last tick must land so the ramp reaches 1.0.
                    ticker.finish_frame();
                    break;
                }
                if !ticker.post_frame() {
                    break;
                }
            }
        });
    }

    ACTIVE.with(|active| *active.borrow_mut() = Some(ramp));
    true
}

/// Advance the active ramp to `now`.
///
/// Returns the progress applied, or `None` when nothing is animating.
pub fn frame(now: Instant) -> Option<f32> {
    let ramp = ACTIVE.with(|active| active.borrow_mut().take())?;
    let elapsed = now.saturating_duration_since(ramp.started).as_secs_f32();
    let progress = (elapsed / ramp.duration.as_secs_f32()).clamp(0.0, 1.0);
    ramp.run(progress);

    if progress < 1.0 {
        ACTIVE.with(|active| *active.borrow_mut() = Some(ramp));
    } else {
        ramp.stop();
        trace!("ramp done");
    }
    Some(progress)
}

/// Snap the active ramp to its end.
pub fn finish() {
    let ramp = ACTIVE.with(|active| active.borrow_mut().take());
    if let Some(ramp) = ramp {
        ramp.run(1.0);
        ramp.stop();
    }
}

pub fn is_animating() -> bool {
    ACTIVE.with(|active| active.borrow().is_some())
}

/// Drop queued and active animations without running them (for teardown
/// and tests).
pub fn reset_animations() {
    clear_queue();
    if let Some(ramp) = ACTIVE.with(|active| active.borrow_mut().take()) {
        ramp.stop();
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder() -> (Rc<RefCell<Vec<f32>>>, impl Fn(f32) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |p| sink.borrow_mut().push(p))
    }

    #[test]
    fn test_empty_queue_does_not_start() {
        reset_animations();
        assert!(!start(Duration::from_millis(100), Duration::from_millis(16), None));
        assert!(!is_animating());
    }

    #[test]
    fn test_start_applies_zero_first() {
        reset_animations();
        let (seen, callback) = recorder();
        enqueue(callback);
        assert_eq!(queued(), 1);

        assert!(start(Duration::from_millis(100), Duration::from_millis(16), None));
        assert_eq!(queued(), 0);
        assert!(is_animating());
        assert_eq!(*seen.borrow(), vec![0.0]);
    }

    #[test]
    fn test_frame_progress_and_completion() {
        reset_animations();
        let (seen, callback) = recorder();
        enqueue(callback);
        start(Duration::from_millis(100), Duration::from_millis(16), None);

        let started = Instant::now();
        let mid = frame(started + Duration::from_millis(50)).unwrap();
        assert!(mid > 0.0 && mid < 1.0);
        assert!(is_animating());

        assert_eq!(frame(started + Duration::from_secs(1)), Some(1.0));
        assert!(!is_animating());
        assert_eq!(frame(Instant::now()), None);
        assert_eq!(seen.borrow().last(), Some(&1.0));
    }

    #[test]
    fn test_new_ramp_finishes_previous() {
        reset_animations();
        let (first, callback) = recorder();
        enqueue(callback);
        start(Duration::from_secs(10), Duration::from_millis(16), None);

        let (second, callback) = recorder();
        enqueue(callback);
        start(Duration::from_secs(10), Duration::from_millis(16), None);

        assert_eq!(*first.borrow(), vec![0.0, 1.0]);
        assert_eq!(*second.borrow(), vec![0.0]);
    }

    #[test]
    fn test_clear_queue_discards() {
        reset_animations();
        let (seen, callback) = recorder();
        enqueue(callback);
        clear_queue();
        assert!(!start(Duration::from_millis(100), Duration::from_millis(16), None));
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_zero_duration_completes_immediately() {
        reset_animations();
        let (seen, callback) = recorder();
        enqueue(callback);
        start(Duration::ZERO, Duration::from_millis(16), None);
        assert_eq!(*seen.borrow(), vec![0.0, 1.0]);
        assert!(!is_animating());
    }

    #[test]
    fn test_reset_drops_without_running() {
        reset_animations();
        let (seen, callback) = recorder();
        enqueue(callback);
        start(Duration::from_secs(10), Duration::from_millis(16), None);
        reset_animations();
        finish();
        assert_eq!(*seen.borrow(), vec![0.0]);
    }
}
