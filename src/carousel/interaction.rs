//! Pointer and touch handling: drag transitions plus the release velocity
//! estimate that seeds momentum.

use std::collections::VecDeque;
use std::time::Instant;

use super::motion::{LoopBounds, MotionState, PointerPosition};

/// Vertical band of the container, as fractions of its height, where a press
/// may start a drag.
pub const DRAG_BAND_TOP: f64 = 0.35;
pub const DRAG_BAND_BOTTOM: f64 = 0.65;
const VELOCITY_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerSource {
    Mouse,
    Touch(u64),
}

pub fn in_drag_band(y: f64, container_height: f64) -> bool {
    y >= container_height * DRAG_BAND_TOP && y <= container_height * DRAG_BAND_BOTTOM
}

/// Rolling window of the most recent per-move velocities in px/ms.
#[derive(Debug, Clone, Default)]
pub struct VelocitySamples {
    samples: VecDeque<f64>,
}

impl VelocitySamples {
    pub fn push(&mut self, velocity: f64) {
        self.samples.push_back(velocity);
        while self.samples.len() > VELOCITY_WINDOW {
            self.samples.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.samples.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Mean of the retained samples, zero when nothing was recorded.
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }
}

#[derive(Debug, Clone, Default)]
pub struct DragController {
    source: Option<PointerSource>,
    last_move: Option<Instant>,
    last_x: f64,
    samples: VelocitySamples,
}

impl DragController {
    #[cfg(test)]
    fn source(&self) -> Option<PointerSource> {
        self.source
    }

    #[cfg(test)]
    fn samples(&self) -> &VelocitySamples {
        &self.samples
    }

    /// Start a drag if the press lands inside the drag band. Returns whether a
    /// drag started; presses while another pointer is dragging are ignored.
    pub fn press(
        &mut self,
        state: &mut MotionState,
        source: PointerSource,
        at: PointerPosition,
        container_height: f64,
        now: Instant,
    ) -> bool {
        if state.is_dragging || !in_drag_band(at.y, container_height) {
            return false;
        }
        state.start_drag(at);
        self.source = Some(source);
        self.last_move = Some(now);
        self.last_x = at.x;
        self.samples.clear();
        true
    }

    pub fn moved(
        &mut self,
        state: &mut MotionState,
        source: PointerSource,
        at: PointerPosition,
        now: Instant,
        sensitivity: f64,
        bounds: &LoopBounds,
    ) -> bool {
        if !state.is_dragging || self.source != Some(source) {
            return false;
        }
        if let Some(last) = self.last_move {
            let elapsed_ms = now.saturating_duration_since(last).as_secs_f64() * 1000.0;
            if elapsed_ms > 0.0 {
                self.samples.push((at.x - self.last_x) / elapsed_ms);
            }
        }
        self.last_move = Some(now);
        self.last_x = at.x;
        state.update_drag(at, sensitivity, bounds);
        true
    }

    /// End the drag owned by `source`, returning the seeded momentum.
    pub fn release(
        &mut self,
        state: &mut MotionState,
        source: PointerSource,
        sensitivity: f64,
    ) -> Option<f64> {
        if self.source != Some(source) {
            return None;
        }
        self.finish(state, sensitivity)
    }

    /// End any drag in progress regardless of which pointer owns it.
    pub fn cancel(&mut self, state: &mut MotionState, sensitivity: f64) -> Option<f64> {
        self.source?;
        self.finish(state, sensitivity)
    }

    fn finish(&mut self, state: &mut MotionState, sensitivity: f64) -> Option<f64> {
        self.source = None;
        self.last_move = None;
        if !state.is_dragging {
            return None;
        }
        state.end_drag(self.samples.average(), sensitivity);
        Some(state.target_velocity)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn bounds() -> LoopBounds {
        LoopBounds::new(-20.0, 9, 10.0)
    }

    #[test]
    fn band_is_inclusive() {
        assert!(in_drag_band(35.0, 100.0));
        assert!(in_drag_band(65.0, 100.0));
        assert!(!in_drag_band(34.9, 100.0));
        assert!(!in_drag_band(65.1, 100.0));
    }

    #[test]
    fn press_outside_band_is_ignored() {
        let mut state = MotionState::new(false);
        let mut drag = DragController::default();
        let now = Instant::now();
        assert!(!drag.press(&mut state, PointerSource::Mouse, PointerPosition::new(10.0, 5.0), 100.0, now));
        assert!(!state.is_dragging);
        assert!(drag.source().is_none());
    }

    #[test]
    fn move_scales_delta_into_time() {
        let mut state = MotionState::new(false);
        let mut drag = DragController::default();
        let t0 = Instant::now();
        assert!(drag.press(&mut state, PointerSource::Mouse, PointerPosition::new(100.0, 50.0), 100.0, t0));
        drag.moved(
            &mut state,
            PointerSource::Mouse,
            PointerPosition::new(80.0, 50.0),
            t0 + Duration::from_millis(10),
            0.9,
            &bounds(),
        );
        assert!((state.drag_velocity - 0.018).abs() < 1e-12);
        assert!((state.time - 0.018).abs() < 1e-12);
        assert_eq!(drag.samples().len(), 1);
        assert!((drag.samples().average() + 2.0).abs() < 1e-9);
    }

    #[test]
    fn zero_elapsed_moves_are_not_sampled() {
        let mut state = MotionState::new(false);
        let mut drag = DragController::default();
        let t0 = Instant::now();
        drag.press(&mut state, PointerSource::Mouse, PointerPosition::new(0.0, 50.0), 100.0, t0);
        drag.moved(&mut state, PointerSource::Mouse, PointerPosition::new(5.0, 50.0), t0, 1.0, &bounds());
        assert!(drag.samples().is_empty());
        assert!(state.time < 0.0);
    }

    #[test]
    fn velocity_window_keeps_last_five() {
        let mut samples = VelocitySamples::default();
        for v in [100.0, 1.0, 2.0, 3.0, 4.0, 5.0] {
            samples.push(v);
        }
        assert_eq!(samples.len(), 5);
        assert!((samples.average() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn release_without_samples_has_no_momentum() {
        let mut state = MotionState::new(false);
        let mut drag = DragController::default();
        let t0 = Instant::now();
        drag.press(&mut state, PointerSource::Mouse, PointerPosition::new(0.0, 50.0), 100.0, t0);
        assert_eq!(drag.release(&mut state, PointerSource::Mouse, 0.9), Some(0.0));
        assert!(!state.is_dragging);
        assert_eq!(state.target_velocity, 0.0);
    }

    #[test]
    fn only_first_touch_is_tracked() {
        let mut state = MotionState::new(false);
        let mut drag = DragController::default();
        let t0 = Instant::now();
        assert!(drag.press(&mut state, PointerSource::Touch(1), PointerPosition::new(0.0, 50.0), 100.0, t0));
        assert!(!drag.press(&mut state, PointerSource::Touch(2), PointerPosition::new(9.0, 50.0), 100.0, t0));
        assert!(!drag.moved(
            &mut state,
            PointerSource::Touch(2),
            PointerPosition::new(40.0, 50.0),
            t0 + Duration::from_millis(5),
            0.9,
            &bounds(),
        ));
        assert_eq!(state.time, 0.0);
        assert!(drag.release(&mut state, PointerSource::Touch(2), 0.9).is_none());
        assert!(state.is_dragging);
        assert!(drag.release(&mut state, PointerSource::Touch(1), 0.9).is_some());
    }

    #[test]
    fn cancel_releases_any_source() {
        let mut state = MotionState::new(false);
        let mut drag = DragController::default();
        let t0 = Instant::now();
        drag.press(&mut state, PointerSource::Touch(7), PointerPosition::new(0.0, 50.0), 100.0, t0);
        drag.moved(
            &mut state,
            PointerSource::Touch(7),
            PointerPosition::new(-10.0, 50.0),
            t0 + Duration::from_millis(20),
            0.9,
            &bounds(),
        );
        let momentum = drag.cancel(&mut state, 0.9).unwrap();
        // -(-0.5) * 0.9 * 0.005
        assert!((momentum - 0.00225).abs() < 1e-12);
        assert!(drag.cancel(&mut state, 0.9).is_none());
    }
}
