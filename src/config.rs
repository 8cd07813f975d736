use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, ensure};
use serde::de::{self, Deserializer};
use serde::Deserialize;

/// Sign applied to auto-scroll and to tile placement along the carousel axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `+1`: auto-scroll pushes the scene towards positive x.
    Right,
    /// `-1`: auto-scroll pushes the scene towards negative x.
    Left,
}

impl Direction {
    pub const fn sign(self) -> f64 {
        match self {
            Self::Right => 1.0,
            Self::Left => -1.0,
        }
    }

    pub const fn flipped(self) -> Self {
        match self {
            Self::Right => Self::Left,
            Self::Left => Self::Right,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Right => "right",
            Self::Left => "left",
        }
    }
}

impl Default for Direction {
    fn default() -> Self {
        Self::Left
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i64> for Direction {
    type Error = String;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Right),
            -1 => Ok(Self::Left),
            other => Err(format!("direction must be 1 or -1, got {other}")),
        }
    }
}

impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Sign(i64),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Sign(sign) => Self::try_from(sign).map_err(de::Error::custom),
            Raw::Name(name) => match name.as_str() {
                "right" => Ok(Self::Right),
                "left" => Ok(Self::Left),
                _ => Err(de::Error::unknown_variant(&name, &["right", "left"])),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CameraOptions {
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    /// Distance from the camera to the tile plane.
    pub distance: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            distance: 2.25,
            near: 0.1,
            far: 20.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WindowOptions {
    pub title: String,
    pub fullscreen: bool,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: "Curved Carousel".to_string(),
            fullscreen: false,
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Multiplier from the internal time value to the scene's horizontal offset.
    pub speed: f64,
    /// Percentage spacing between tile centres; pitch is `1 + gap / 100`.
    pub gap: f64,
    /// Strength of the vertical warp as tiles move away from the centre.
    pub curve: f32,
    pub direction: Direction,
    /// Scales pointer deltas during a drag and the momentum on release.
    pub drag_sensitivity: f64,
    /// Number of tiles meant to span the viewport width.
    pub images_per_view: f64,
    /// Rounded-corner radius in tile UV units.
    pub border_radius: f32,
    /// Ordered image sources. Directories expand to the images they contain.
    pub images: Vec<PathBuf>,
    pub camera: CameraOptions,
    pub window: WindowOptions,
    pub background_color: [u8; 3],
    /// Quiet period a resize must settle for before the layout is rebuilt.
    #[serde(with = "humantime_serde")]
    pub resize_debounce: Duration,
    /// Maximum number of concurrent image decodes in the loader.
    pub loader_max_concurrent_decodes: usize,
    /// Decoded images larger than this on either axis are downscaled.
    pub max_texture_dimension: u32,
    pub start_paused: bool,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            self.speed.is_finite() && self.speed != 0.0,
            "speed must be a finite, non-zero number"
        );
        ensure!(
            self.gap.is_finite() && self.pitch() > 0.0,
            "gap must be greater than -100"
        );
        ensure!(self.curve.is_finite(), "curve must be finite");
        ensure!(
            self.drag_sensitivity.is_finite() && self.drag_sensitivity >= 0.0,
            "drag-sensitivity must be zero or positive"
        );
        ensure!(
            self.images_per_view.is_finite() && self.images_per_view > 0.0,
            "images-per-view must be greater than zero"
        );
        ensure!(
            (0.0..=0.5).contains(&self.border_radius),
            "border-radius must be between 0 and 0.5"
        );
        ensure!(!self.images.is_empty(), "images must not be empty");
        ensure!(
            self.camera.fov_degrees > 0.0 && self.camera.fov_degrees < 180.0,
            "camera.fov-degrees must be between 0 and 180"
        );
        ensure!(
            self.camera.distance > 0.0,
            "camera.distance must be positive"
        );
        ensure!(self.camera.near > 0.0, "camera.near must be positive");
        ensure!(
            self.camera.far > self.camera.near,
            "camera.far must be greater than camera.near"
        );
        ensure!(
            self.loader_max_concurrent_decodes > 0,
            "loader-max-concurrent-decodes must be greater than zero"
        );
        ensure!(
            self.max_texture_dimension > 0,
            "max-texture-dimension must be greater than zero"
        );
        Ok(self)
    }

    /// Distance between adjacent tile centres in carousel units.
    pub fn pitch(&self) -> f64 {
        1.0 + self.gap / 100.0
    }

    fn default_images() -> Vec<PathBuf> {
        (1..=9)
            .map(|n| PathBuf::from(format!("assets/images/frame-{n:02}.jpg")))
            .collect()
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            speed: 10.0,
            gap: -20.0,
            curve: 15.0,
            direction: Direction::Left,
            drag_sensitivity: 0.9,
            images_per_view: 9.0,
            border_radius: 0.0,
            images: Self::default_images(),
            camera: CameraOptions::default(),
            window: WindowOptions::default(),
            background_color: [0, 0, 0],
            resize_debounce: Duration::from_millis(100),
            loader_max_concurrent_decodes: 4,
            max_texture_dimension: 2048,
            start_paused: false,
        }
    }
}
