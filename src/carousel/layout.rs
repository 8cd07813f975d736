use crate::config::Direction;

use super::geometry::{FrameGeometry, pitch};

/// Minimum number of extra tiles kept beyond the visible span.
const MIN_PADDING: usize = 10;

/// One tile instance: which image it shows and where it sits on the axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileSlot {
    pub index: usize,
    pub image_index: usize,
    pub x: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileLayout {
    pub pitch: f64,
    pub center_index: usize,
    pub tiles: Vec<TileSlot>,
}

impl TileLayout {
    /// Lay out enough tiles to cover the viewport, absorb fast drags, and keep
    /// two spare image cycles for the wrap-around.
    pub fn build(
        frame: &FrameGeometry,
        gap: f64,
        image_count: usize,
        direction: Direction,
    ) -> Self {
        let pitch = pitch(gap);
        let total = tile_count(frame, pitch, image_count);
        let center_index = total.div_ceil(2);
        let tiles = (0..total)
            .map(|index| TileSlot {
                index,
                image_index: if image_count == 0 { 0 } else { index % image_count },
                x: -direction.sign() * (index as f64 - center_index as f64) * pitch,
            })
            .collect();
        Self {
            pitch,
            center_index,
            tiles,
        }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Range of tile centres along the axis, `(min, max)`.
    #[cfg(test)]
    fn extent(&self) -> (f64, f64) {
        self.tiles
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), tile| {
                (lo.min(tile.x), hi.max(tile.x))
            })
    }
}

pub fn tile_count(frame: &FrameGeometry, pitch: f64, image_count: usize) -> usize {
    if image_count == 0 {
        return 0;
    }
    let per_tile = (frame.visible_width / (frame.tile_width * pitch)).ceil();
    let per_pitch = (frame.visible_width / pitch).ceil();
    let base = per_tile.max(per_pitch).max(0.0) as usize + 1;
    let padding = MIN_PADDING.max(image_count);
    base + padding + image_count * 2
}
