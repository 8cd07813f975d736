use glam::{Mat4, Vec3};

use crate::config::CameraOptions;

/// Tile plane size in carousel units; the mesh is slightly taller than wide.
pub const PLANE_WIDTH: f32 = 0.65;
pub const PLANE_HEIGHT: f32 = 0.85;
pub const PLANE_ASPECT: f32 = PLANE_WIDTH / PLANE_HEIGHT;

/// Distance between adjacent tile centres for a `gap` percentage.
pub fn pitch(gap: f64) -> f64 {
    1.0 + gap / 100.0
}

/// Axis distance covered by one full cycle of `image_count` images.
pub fn loop_width(gap: f64, image_count: usize) -> f64 {
    pitch(gap) * image_count as f64
}

/// Perspective camera looking down -z at the tile plane.
#[derive(Debug, Clone)]
pub struct CameraRig {
    pub fov_y_radians: f32,
    pub distance: f32,
    pub near: f32,
    pub far: f32,
    pub aspect: f32,
}

impl CameraRig {
    pub fn new(options: &CameraOptions, aspect: f32) -> Self {
        Self {
            fov_y_radians: options.fov_degrees.to_radians(),
            distance: options.distance,
            near: options.near,
            far: options.far,
            aspect: aspect.max(0.0001),
        }
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect = (width as f32 / height as f32).max(0.0001);
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        let eye = Vec3::new(0.0, 0.0, self.distance);
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(self.fov_y_radians, self.aspect, self.near, self.far);
        proj * view
    }

    /// Visible extent of the tile plane and the width of one tile such that
    /// `images_per_view` tiles span it.
    pub fn frame_geometry(&self, images_per_view: f64) -> FrameGeometry {
        let visible_height =
            2.0 * (f64::from(self.fov_y_radians) / 2.0).tan() * f64::from(self.distance);
        let visible_width = visible_height * f64::from(self.aspect);
        FrameGeometry {
            visible_width,
            visible_height,
            tile_width: visible_width / images_per_view,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameGeometry {
    pub visible_width: f64,
    pub visible_height: f64,
    pub tile_width: f64,
}
