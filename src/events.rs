use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

/// Identifies one image slot of one layout generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadKey {
    pub generation: u64,
    pub image_index: usize,
}

#[derive(Debug, Clone)]
pub struct LoadImage {
    pub key: LoadKey,
    pub path: PathBuf,
    /// Longest edge the decoded image may have.
    pub max_dimension: u32,
    /// Cancelled when the layout generation that asked for this image is gone.
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone)]
pub struct PreparedImageCpu {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum LoaderEvent {
    Ready {
        key: LoadKey,
        image: PreparedImageCpu,
    },
    Failed {
        key: LoadKey,
        path: PathBuf,
    },
}

impl LoaderEvent {
    pub fn key(&self) -> LoadKey {
        match self {
            Self::Ready { key, .. } | Self::Failed { key, .. } => *key,
        }
    }
}

/// Runtime operations accepted from outside the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarouselCommand {
    Pause,
    Resume,
    TogglePause,
    Reverse,
    Teardown,
}
