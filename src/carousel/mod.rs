//! Carousel state: the animation engine, drag handling and tile layout for one
//! carousel instance. Nothing in here touches the GPU; the viewer feeds input
//! and frame ticks in and reads the scene offset and layout back out.

pub mod geometry;
pub mod interaction;
pub mod layout;
pub mod motion;
pub mod resize;

use std::time::Instant;

use glam::Mat4;
use tracing::debug;

use crate::config::Configuration;

use geometry::{CameraRig, FrameGeometry};
use interaction::{DragController, PointerSource};
use layout::TileLayout;
use motion::{FrameMotion, LoopBounds, MotionState, PointerPosition};

pub struct Carousel {
    cfg: Configuration,
    state: MotionState,
    drag: DragController,
    bounds: LoopBounds,
    camera: CameraRig,
    layout: Option<TileLayout>,
}

impl Carousel {
    /// Build a carousel from its own copy of `cfg`, which must already be validated.
    pub fn new(cfg: &Configuration) -> Self {
        let cfg = cfg.clone();
        let bounds = LoopBounds::new(cfg.gap, cfg.images.len(), cfg.speed);
        let camera = CameraRig::new(
            &cfg.camera,
            cfg.window.width as f32 / cfg.window.height.max(1) as f32,
        );
        Self {
            state: MotionState::new(cfg.start_paused),
            drag: DragController::default(),
            bounds,
            camera,
            layout: None,
            cfg,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.cfg
    }

    pub fn state(&self) -> &MotionState {
        &self.state
    }

    pub fn bounds(&self) -> &LoopBounds {
        &self.bounds
    }

    pub fn layout(&self) -> Option<&TileLayout> {
        self.layout.as_ref()
    }

    pub fn scene_offset(&self) -> f64 {
        self.bounds.offset(self.state.time)
    }

    /// Advance the animation by one display frame.
    pub fn advance(&mut self) -> FrameMotion {
        self.state.advance(&self.bounds, self.cfg.direction)
    }

    pub fn pointer_pressed(
        &mut self,
        source: PointerSource,
        at: PointerPosition,
        container_height: f64,
        now: Instant,
    ) -> bool {
        let started = self
            .drag
            .press(&mut self.state, source, at, container_height, now);
        if started {
            debug!(?source, x = at.x, y = at.y, "drag started");
        }
        started
    }

    pub fn pointer_moved(&mut self, source: PointerSource, at: PointerPosition, now: Instant) -> bool {
        self.drag.moved(
            &mut self.state,
            source,
            at,
            now,
            self.cfg.drag_sensitivity,
            &self.bounds,
        )
    }

    /// Returns the momentum seeded by the release, if `source` owned a drag.
    pub fn pointer_released(&mut self, source: PointerSource) -> Option<f64> {
        let momentum = self
            .drag
            .release(&mut self.state, source, self.cfg.drag_sensitivity);
        if let Some(momentum) = momentum {
            debug!(?source, momentum, "drag released");
        }
        momentum
    }

    /// Release whatever drag is in progress, e.g. when the window loses focus.
    pub fn cancel_drag(&mut self) -> Option<f64> {
        self.drag.cancel(&mut self.state, self.cfg.drag_sensitivity)
    }

    pub fn is_dragging(&self) -> bool {
        self.state.is_dragging
    }

    pub fn pause(&mut self) {
        self.state.is_paused = true;
    }

    pub fn resume(&mut self) {
        self.state.is_paused = false;
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.state.is_paused = !self.state.is_paused;
        self.state.is_paused
    }

    /// Flip the auto-scroll direction; tile placement is unaffected.
    pub fn reverse(&mut self) -> bool {
        self.state.is_reversed = !self.state.is_reversed;
        self.state.is_reversed
    }

    /// Recompute the camera and rebuild the tile layout for a new viewport.
    pub fn relayout(&mut self, width: u32, height: u32) -> &TileLayout {
        self.camera.set_viewport(width, height);
        let frame = self.frame_geometry();
        let layout = TileLayout::build(
            &frame,
            self.cfg.gap,
            self.cfg.images.len(),
            self.cfg.direction,
        );
        debug!(
            width,
            height,
            tiles = layout.len(),
            tile_width = frame.tile_width,
            "carousel layout rebuilt"
        );
        self.layout.insert(layout)
    }

    pub fn frame_geometry(&self) -> FrameGeometry {
        self.camera.frame_geometry(self.cfg.images_per_view)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.camera.view_projection()
    }

    /// Drop the layout; the carousel keeps its motion state.
    pub fn clear_layout(&mut self) {
        self.layout = None;
    }
}
