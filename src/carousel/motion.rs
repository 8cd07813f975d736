//! Animation state and the once-per-frame update that drives the scene offset.
//!
//! `time` is the only position the carousel tracks. Momentum, auto-scroll and
//! drag all add to it, and every addition is followed by a wrap that keeps
//! `time * speed` within one loop width of zero.

use crate::config::Direction;

use super::geometry::loop_width;

/// Momentum keeps being applied while its magnitude stays above this.
pub const MOMENTUM_FLOOR: f64 = 0.001;
/// Auto-scroll only runs once momentum has decayed below this.
pub const AUTO_SCROLL_THRESHOLD: f64 = 0.0001;
pub const FRICTION: f64 = 0.92;
pub const AUTO_SCROLL_STEP: f64 = 0.00001;
pub const DRAG_SCALE: f64 = 0.001;
pub const MOMENTUM_SCALE: f64 = 0.005;
pub const MAX_MOMENTUM: f64 = 0.02;

/// Wrap limits for `time`, derived once from the configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopBounds {
    width: f64,
    speed: f64,
}

impl LoopBounds {
    /// `speed` must be non-zero; configuration validation guarantees it.
    pub fn new(gap: f64, image_count: usize, speed: f64) -> Self {
        debug_assert!(speed != 0.0, "loop bounds need a non-zero speed");
        Self {
            width: loop_width(gap, image_count),
            speed,
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    /// Shift `time` by at most one loop so the rendered offset stays in range.
    pub fn wrap(&self, time: f64) -> f64 {
        let offset = time * self.speed;
        if offset >= self.width {
            time - self.width / self.speed
        } else if offset <= -self.width {
            time + self.width / self.speed
        } else {
            time
        }
    }

    pub fn offset(&self, time: f64) -> f64 {
        time * self.speed
    }
}

/// Which rule moved `time` during a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionPhase {
    /// Paused, or momentum sitting between the two thresholds.
    Still,
    AutoScroll,
    Momentum,
    /// Drag input moves `time` from the interaction handlers instead.
    Dragging,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMotion {
    pub phase: MotionPhase,
    /// Horizontal scene offset for this frame (`time * speed`).
    pub offset: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerPosition {
    pub x: f64,
    pub y: f64,
}

impl PointerPosition {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MotionState {
    pub time: f64,
    pub is_paused: bool,
    pub is_reversed: bool,
    pub is_dragging: bool,
    pub drag_start: PointerPosition,
    pub drag_current: PointerPosition,
    pub drag_velocity: f64,
    pub target_velocity: f64,
    /// Whether auto-scroll was running when the current drag began.
    pub auto_scroll_before_drag: bool,
}

impl MotionState {
    pub fn new(paused: bool) -> Self {
        Self {
            is_paused: paused,
            ..Self::default()
        }
    }

    /// Advance one display frame.
    pub fn advance(&mut self, bounds: &LoopBounds, direction: Direction) -> FrameMotion {
        let phase = if self.is_dragging {
            MotionPhase::Dragging
        } else if self.target_velocity.abs() > MOMENTUM_FLOOR {
            self.time += self.target_velocity;
            self.target_velocity *= FRICTION;
            self.time = bounds.wrap(self.time);
            MotionPhase::Momentum
        } else if !self.is_paused && self.target_velocity.abs() <= AUTO_SCROLL_THRESHOLD {
            self.time += self.scroll_direction(direction).sign() * AUTO_SCROLL_STEP;
            self.time = bounds.wrap(self.time);
            MotionPhase::AutoScroll
        } else {
            MotionPhase::Still
        };

        FrameMotion {
            phase,
            offset: bounds.offset(self.time),
        }
    }

    /// Auto-scroll direction after applying the reverse toggle.
    pub fn scroll_direction(&self, direction: Direction) -> Direction {
        if self.is_reversed {
            direction.flipped()
        } else {
            direction
        }
    }

    pub fn start_drag(&mut self, at: PointerPosition) {
        self.is_dragging = true;
        self.drag_start = at;
        self.drag_current = at;
        self.drag_velocity = 0.0;
        self.target_velocity = 0.0;
        self.auto_scroll_before_drag = !self.is_paused;
    }

    /// Move `time` by the horizontal pointer delta since the last update.
    ///
    /// Like every other step this wraps at most one loop, so a single move
    /// wider than a loop can leave the offset outside the loop range until
    /// the next update.
    pub fn update_drag(&mut self, at: PointerPosition, sensitivity: f64, bounds: &LoopBounds) {
        if !self.is_dragging {
            return;
        }
        let delta_x = at.x - self.drag_current.x;
        self.drag_current = at;
        self.drag_velocity = -delta_x * sensitivity * DRAG_SCALE;
        self.time = bounds.wrap(self.time + self.drag_velocity);
    }

    /// Finish a drag and seed momentum from the release velocity (px/ms).
    pub fn end_drag(&mut self, release_velocity: f64, sensitivity: f64) {
        self.is_dragging = false;
        let momentum = -release_velocity * sensitivity * MOMENTUM_SCALE;
        self.target_velocity = momentum.clamp(-MAX_MOMENTUM, MAX_MOMENTUM);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> LoopBounds {
        LoopBounds::new(-20.0, 3, 10.0)
    }

    #[test]
    fn auto_scroll_steps_in_direction() {
        let mut state = MotionState::new(false);
        let frame = state.advance(&bounds(), Direction::Left);
        assert_eq!(frame.phase, MotionPhase::AutoScroll);
        assert!((state.time + 0.00001).abs() < 1e-15);
        assert!((frame.offset + 0.0001).abs() < 1e-12);
    }

    #[test]
    fn reversed_flips_auto_scroll() {
        let mut state = MotionState::new(false);
        state.is_reversed = true;
        state.advance(&bounds(), Direction::Left);
        assert!(state.time > 0.0);
    }

    #[test]
    fn paused_state_does_not_move() {
        let mut state = MotionState::new(true);
        let frame = state.advance(&bounds(), Direction::Right);
        assert_eq!(frame.phase, MotionPhase::Still);
        assert_eq!(state.time, 0.0);
    }

    #[test]
    fn momentum_decays_by_friction() {
        let mut state = MotionState::new(false);
        state.target_velocity = 0.01;
        let frame = state.advance(&bounds(), Direction::Left);
        assert_eq!(frame.phase, MotionPhase::Momentum);
        assert!((state.time - 0.01).abs() < 1e-15);
        assert!((state.target_velocity - 0.0092).abs() < 1e-15);
    }

    #[test]
    fn dead_zone_momentum_holds_still() {
        let mut state = MotionState::new(false);
        state.target_velocity = 0.0005;
        let frame = state.advance(&bounds(), Direction::Left);
        assert_eq!(frame.phase, MotionPhase::Still);
        assert_eq!(state.time, 0.0);
        assert_eq!(state.target_velocity, 0.0005);
    }

    #[test]
    fn dragging_suppresses_momentum_and_auto_scroll() {
        let mut state = MotionState::new(false);
        state.start_drag(PointerPosition::new(10.0, 10.0));
        state.target_velocity = 0.01;
        let frame = state.advance(&bounds(), Direction::Left);
        assert_eq!(frame.phase, MotionPhase::Dragging);
        assert_eq!(state.time, 0.0);
    }

    #[test]
    fn wrap_subtracts_exactly_one_loop() {
        let b = bounds();
        // loop width 2.4 at speed 10 -> time threshold 0.24
        let wrapped = b.wrap(0.25);
        assert!((wrapped - 0.01).abs() < 1e-12);
        let wrapped = b.wrap(-0.3);
        assert!((wrapped + 0.06).abs() < 1e-12);
        assert_eq!(b.wrap(0.1), 0.1);
    }

    #[test]
    fn wrap_handles_negative_speed() {
        let b = LoopBounds::new(0.0, 2, -4.0);
        let time = 0.6; // offset -2.4 <= -2
        let wrapped = b.wrap(time);
        assert!((b.offset(wrapped) - (-0.4)).abs() < 1e-12);
    }

    #[test]
    fn start_drag_records_auto_scroll_and_zeroes_velocity() {
        let mut state = MotionState::new(false);
        state.target_velocity = 0.015;
        state.start_drag(PointerPosition::new(5.0, 6.0));
        assert!(state.is_dragging);
        assert!(state.auto_scroll_before_drag);
        assert_eq!(state.target_velocity, 0.0);
        assert_eq!(state.drag_start, PointerPosition::new(5.0, 6.0));

        let mut paused = MotionState::new(true);
        paused.start_drag(PointerPosition::default());
        assert!(!paused.auto_scroll_before_drag);
    }

    #[test]
    fn update_drag_is_ignored_when_idle() {
        let mut state = MotionState::new(false);
        state.update_drag(PointerPosition::new(50.0, 0.0), 0.9, &bounds());
        assert_eq!(state.time, 0.0);
        assert_eq!(state.drag_velocity, 0.0);
    }

    #[test]
    fn oversized_drag_step_wraps_once_then_recovers() {
        let b = bounds();
        let mut state = MotionState::new(false);
        state.time = 0.2;
        state.start_drag(PointerPosition::new(500.0, 0.0));
        // -400 px at 0.9 -> +0.36, 0.56 wraps once to 0.32 (offset 3.2 > 2.4)
        state.update_drag(PointerPosition::new(100.0, 0.0), 0.9, &b);
        assert!((state.time - 0.32).abs() < 1e-12);
        assert!(b.offset(state.time) > b.width());
        state.update_drag(PointerPosition::new(100.0, 0.0), 0.9, &b);
        assert!((state.time - 0.08).abs() < 1e-12);
        assert!(b.offset(state.time).abs() <= b.width());
    }

    #[test]
    fn end_drag_clamps_momentum() {
        let mut state = MotionState::new(false);
        state.start_drag(PointerPosition::default());
        state.end_drag(-100.0, 0.9);
        assert!(!state.is_dragging);
        assert_eq!(state.target_velocity, MAX_MOMENTUM);

        state.start_drag(PointerPosition::default());
        state.end_drag(100.0, 0.9);
        assert_eq!(state.target_velocity, -MAX_MOMENTUM);
    }
}
