#![forbid(unsafe_code)]

//! Frame-loop lifecycle and clock.
//!
//! The loop is a one-way state machine: `Idle → Running → Stopped`. Starting
//! twice is rejected rather than silently tolerated, because the web driver
//! registers input listeners on start and a double start would register them
//! twice. Stopping is idempotent and final.

use std::fmt;

/// Lifecycle of the frame loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    #[default]
    Idle,
    Running,
    Stopped,
}

/// Rejected `start` transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartError {
    /// `start` while already running.
    AlreadyRunning,
    /// `start` after `stop`; the loop does not restart.
    Stopped,
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "frame loop is already running"),
            Self::Stopped => write!(f, "frame loop has been stopped"),
        }
    }
}

impl std::error::Error for StartError {}

/// Computes per-frame elapsed time from monotonic millisecond timestamps.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameClock {
    previous_ms: f64,
}

impl FrameClock {
    /// Record the baseline timestamp.
    pub fn reset(&mut self, now_ms: f64) {
        self.previous_ms = now_ms;
    }

    /// Milliseconds since the previous frame (or the baseline), clamped to
    /// zero against non-monotonic timestamps.
    pub fn advance(&mut self, now_ms: f64) -> f64 {
        let elapsed = (now_ms - self.previous_ms).max(0.0);
        self.previous_ms = now_ms;
        elapsed
    }
}

/// The frame-loop state machine.
#[derive(Debug, Default)]
pub struct TickLoop {
    state: LoopState,
    clock: FrameClock,
}

impl TickLoop {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> LoopState {
        self.state
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == LoopState::Running
    }

    /// `Idle → Running`, recording the baseline timestamp.
    pub fn start(&mut self, now_ms: f64) -> Result<(), StartError> {
        match self.state {
            LoopState::Idle => {
                self.clock.reset(now_ms);
                self.state = LoopState::Running;
                Ok(())
            }
            LoopState::Running => Err(StartError::AlreadyRunning),
            LoopState::Stopped => Err(StartError::Stopped),
        }
    }

    /// Account one frame, returning its elapsed milliseconds.
    ///
    /// Returns `None` unless running — a frame callback that lands after
    /// `stop` must do nothing.
    pub fn frame(&mut self, now_ms: f64) -> Option<f64> {
        if self.is_running() {
            Some(self.clock.advance(now_ms))
        } else {
            None
        }
    }

    /// `Running → Stopped`. No-op in any other state.
    pub fn stop(&mut self) {
        if self.is_running() {
            self.state = LoopState::Stopped;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_only_from_idle() {
        let mut tick = TickLoop::new();
        assert_eq!(tick.state(), LoopState::Idle);
        assert!(tick.start(100.0).is_ok());
        assert_eq!(tick.start(200.0), Err(StartError::AlreadyRunning));
        tick.stop();
        assert_eq!(tick.start(300.0), Err(StartError::Stopped));
    }

    #[test]
    fn frame_reports_elapsed_since_previous() {
        let mut tick = TickLoop::new();
        tick.start(1000.0).unwrap();
        assert_eq!(tick.frame(1016.0), Some(16.0));
        assert_eq!(tick.frame(1049.0), Some(33.0));
    }

    #[test]
    fn elapsed_clamps_against_clock_regression() {
        let mut clock = FrameClock::default();
        clock.reset(500.0);
        assert_eq!(clock.advance(490.0), 0.0);
        // The regressed timestamp still becomes the new baseline.
        assert_eq!(clock.advance(500.0), 10.0);
    }

    #[test]
    fn frames_after_stop_yield_none() {
        let mut tick = TickLoop::new();
        tick.start(0.0).unwrap();
        tick.stop();
        assert_eq!(tick.frame(16.0), None);
        // Stop stays idempotent.
        tick.stop();
        assert_eq!(tick.state(), LoopState::Stopped);
    }

    #[test]
    fn frame_before_start_yields_none() {
        let mut tick = TickLoop::new();
        assert_eq!(tick.frame(1.0), None);
    }
}
