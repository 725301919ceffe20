use seqatlas_core::Viewport;
use std::f64::consts::PI;
use std::time::{Duration, Instant};

pub fn ease_in_out_sine(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    -((PI * t).cos() - 1.0) / 2.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraStep {
    Idle,
    Moving(Viewport),
    /// Final frame of flight `epoch`.
    Arrived { epoch: u64, viewport: Viewport },
}

#[derive(Debug, Clone)]
struct Flight {
    epoch: u64,
    from: Viewport,
    to: Viewport,
    started: Instant,
}

/// Eased transition of the visible rectangle toward a small window around a
/// target point. A new target replaces the flight in progress.
#[derive(Debug)]
pub struct CameraAnimator {
    duration: Duration,
    half_extent: f64,
    flight: Option<Flight>,
    epoch: u64,
}

impl CameraAnimator {
    pub fn new(duration: Duration, half_extent: f64) -> Self {
        Self {
            duration,
            half_extent,
            flight: None,
            epoch: 0,
        }
    }

    pub fn target_window(&self, x: f64, y: f64) -> Option<Viewport> {
        Viewport::centered(x, y, self.half_extent)
    }

    /// Starts a flight from `from` to the window around `(x, y)` and returns
    /// its epoch. `None` if that window is not a valid rectangle.
    pub fn fly_to(&mut self, from: Viewport, x: f64, y: f64, now: Instant) -> Option<u64> {
        let to = self.target_window(x, y)?;
        self.epoch += 1;
        if let Some(old) = &self.flight {
            tracing::debug!(superseded = old.epoch, epoch = self.epoch, "camera retargeted");
        }
        self.flight = Some(Flight {
            epoch: self.epoch,
            from,
            to,
            started: now,
        });
        Some(self.epoch)
    }

    pub fn tick(&mut self, now: Instant) -> CameraStep {
        let Some(flight) = &self.flight else {
            return CameraStep::Idle;
        };
        let elapsed = now.saturating_duration_since(flight.started);
        if elapsed >= self.duration || self.duration.is_zero() {
            let step = CameraStep::Arrived {
                epoch: flight.epoch,
                viewport: flight.to,
            };
            self.flight = None;
            return step;
        }
        let t = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        CameraStep::Moving(flight.from.lerp(&flight.to, ease_in_out_sine(t)))
    }

    /// Completion handlers check this before acting.
    pub fn is_current(&self, epoch: u64) -> bool {
        epoch == self.epoch
    }

    pub fn is_animating(&self) -> bool {
        self.flight.is_some()
    }

    pub fn cancel(&mut self) -> bool {
        if self.flight.take().is_some() {
            self.epoch += 1;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> Viewport {
        Viewport::new(-20.0, 20.0, -30.0, 20.0).expect("viewport")
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn easing_is_symmetric_and_bounded() {
        assert_eq!(ease_in_out_sine(0.0), 0.0);
        assert!((ease_in_out_sine(0.5) - 0.5).abs() < 1e-12);
        assert!((ease_in_out_sine(1.0) - 1.0).abs() < 1e-12);
        assert!((ease_in_out_sine(0.25) + ease_in_out_sine(0.75) - 1.0).abs() < 1e-12);
        assert_eq!(ease_in_out_sine(2.0), ease_in_out_sine(1.0));
    }

    #[test]
    fn flies_to_window_around_target_within_duration() {
        let t0 = Instant::now();
        let mut cam = CameraAnimator::new(ms(500), 0.3);
        let epoch = cam.fly_to(start(), 400.0, 0.0, t0).expect("flight");

        let CameraStep::Moving(mid) = cam.tick(t0 + ms(250)) else {
            panic!("expected an intermediate frame");
        };
        let (cx, _) = mid.center();
        assert!(cx > 0.0 && cx < 400.0);
        assert!(mid.x_min < mid.x_max && mid.y_min < mid.y_max);

        let step = cam.tick(t0 + ms(500));
        let CameraStep::Arrived { epoch: done, viewport } = step else {
            panic!("expected arrival");
        };
        assert_eq!(done, epoch);
        assert!((viewport.x_min - 399.7).abs() < 1e-9);
        assert!((viewport.x_max - 400.3).abs() < 1e-9);
        assert!((viewport.y_min + 0.3).abs() < 1e-9);
        assert!((viewport.y_max - 0.3).abs() < 1e-9);
        assert_eq!(cam.tick(t0 + ms(600)), CameraStep::Idle);
    }

    #[test]
    fn new_target_supersedes_flight_in_progress() {
        let t0 = Instant::now();
        let mut cam = CameraAnimator::new(ms(500), 0.3);
        let first = cam.fly_to(start(), 10.0, 10.0, t0).expect("first");
        let second = cam.fly_to(start(), -10.0, -10.0, t0 + ms(200)).expect("second");
        assert!(!cam.is_current(first));
        assert!(cam.is_current(second));

        // the first flight would have ended at 500ms; only the second arrives
        assert!(matches!(cam.tick(t0 + ms(500)), CameraStep::Moving(_)));
        let CameraStep::Arrived { epoch, viewport } = cam.tick(t0 + ms(700)) else {
            panic!("expected arrival");
        };
        assert_eq!(epoch, second);
        assert_eq!(viewport.center(), (-10.0, -10.0));
    }

    #[test]
    fn cancel_invalidates_epoch() {
        let t0 = Instant::now();
        let mut cam = CameraAnimator::new(ms(500), 0.3);
        let epoch = cam.fly_to(start(), 1.0, 1.0, t0).expect("flight");
        assert!(cam.cancel());
        assert!(!cam.is_current(epoch));
        assert!(!cam.is_animating());
        assert_eq!(cam.tick(t0 + ms(600)), CameraStep::Idle);
    }

    #[test]
    fn non_finite_target_is_refused() {
        let mut cam = CameraAnimator::new(ms(500), 0.3);
        assert!(cam.fly_to(start(), f64::NAN, 0.0, Instant::now()).is_none());
        assert!(!cam.is_animating());
    }
}
