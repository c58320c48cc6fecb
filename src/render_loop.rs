//! Render-loop control: cancellation, pacing, throughput reporting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared cancellation flag for a render loop.
///
/// The loop checks the token at the top of each iteration and stops
/// rescheduling once it is cancelled; the owner of the surface cancels it on
/// teardown. Cancelling is idempotent.
#[derive(Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops the loop this token controls. Safe to call more than once.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Whether the loop should stop instead of rendering this iteration.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Gates a redraw stream down to a target frame rate.
///
/// The display callback fires at refresh cadence; `tick` admits an iteration
/// only once the target interval has elapsed since the last admitted one.
pub struct FramePacer {
    interval: Duration,
    last_frame: Instant,
}

impl FramePacer {
    pub fn new(target_fps: u32) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / target_fps.max(1) as f64),
            last_frame: Instant::now() - Duration::from_secs(1),
        }
    }

    /// Returns true if a frame should be rendered now.
    pub fn tick(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_frame) >= self.interval {
            self.last_frame = now;
            true
        } else {
            false
        }
    }

    /// Time left until the next admitted frame; zero if one is due.
    pub fn remaining(&self) -> Duration {
        self.interval
            .saturating_sub(self.last_frame.elapsed())
    }
}

/// A utility for tracking frames per second.
pub struct FpsCounter {
    frame_count: u32,
    last_time: Instant,
    interval: Duration,
}

impl FpsCounter {
    /// Create a new FPS counter reporting once per second.
    pub fn new() -> Self {
        Self {
            frame_count: 0,
            last_time: Instant::now(),
            interval: Duration::from_secs(1),
        }
    }

    /// Update the counter with a new frame.
    /// Returns Some(fps) if the reporting interval has passed, otherwise None.
    pub fn update(&mut self) -> Option<f32> {
        self.frame_count += 1;
        let elapsed = self.last_time.elapsed();

        if elapsed >= self.interval {
            let fps = self.frame_count as f32 / elapsed.as_secs_f32();
            self.frame_count = 0;
            self.last_time = Instant::now();
            Some(fps)
        } else {
            None
        }
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_stops_iterations() {
        let token = CancelToken::new();
        let loop_token = token.clone();

        // The loop shape used by the app: check the token, draw, reschedule.
        let mut draws = 0;
        for i in 0..10 {
            if loop_token.is_cancelled() {
                break;
            }
            draws += 1;
            if i == 2 {
                token.cancel();
            }
        }

        assert_eq!(draws, 3);

        // After teardown no further iterations draw.
        let mut late_draws = 0;
        for _ in 0..5 {
            if loop_token.is_cancelled() {
                break;
            }
            late_draws += 1;
        }
        assert_eq!(late_draws, 0);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_token_starts_live() {
        assert!(!CancelToken::new().is_cancelled());
    }

    #[test]
    fn test_pacer_admits_first_tick() {
        let mut pacer = FramePacer::new(30);
        assert!(pacer.tick());
    }

    #[test]
    fn test_pacer_gates_burst() {
        // At 10 fps a burst of immediate ticks admits exactly one frame.
        let mut pacer = FramePacer::new(10);
        assert!(pacer.tick());
        let admitted = (0..20).filter(|_| pacer.tick()).count();
        assert_eq!(admitted, 0);
        assert!(pacer.remaining() > Duration::ZERO);
    }

    #[test]
    fn test_pacer_admits_after_interval() {
        let mut pacer = FramePacer::new(1000);
        assert!(pacer.tick());
        std::thread::sleep(Duration::from_millis(5));
        assert!(pacer.tick());
    }

    #[test]
    fn test_fps_counter_reports_after_interval() {
        let mut counter = FpsCounter {
            frame_count: 0,
            last_time: Instant::now() - Duration::from_secs(2),
            interval: Duration::from_secs(1),
        };
        let fps = counter.update().expect("interval elapsed");
        assert!(fps > 0.0);
        assert!(counter.update().is_none());
    }
}
