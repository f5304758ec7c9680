//! The capture → detect → publish loop.
//!
//! - `DetectionLoop`: the state machine (Idle, Acquiring, Running, SuspendedRetry)
//! - `RefreshClock`: refresh cadence and backoff timing (`SystemClock`, `ManualClock`)
//! - `CancelToken`: cooperative teardown
//!
//! The loop is single-threaded. The detector is the only call that may block it,
//! and there is never more than one detection in flight.

mod cancel;
mod clock;
mod detection_loop;

pub use cancel::CancelToken;
pub use clock::{ManualClock, RefreshClock, SystemClock};
pub use detection_loop::{
    DetectionLoop, LoopSettings, LoopState, LoopStats, TickOutcome, DEFAULT_BACKOFF,
    DEFAULT_REFRESH_INTERVAL,
};
