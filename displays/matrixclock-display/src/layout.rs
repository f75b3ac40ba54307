//! Tile layout and mount orientation
//!
//! The canvas spans four 8x8 tiles. Each logical slot (8 columns of the
//! canvas) is served by one physical tile, and every tile is mounted with
//! a quarter-turn rotation. Hanging the clock upside down reverses the
//! tile order and turns each tile by a further 180 degrees.

use crate::framebuffer::{FrameBuffer, HEIGHT, WIDTH};

/// Number of 8x8 tiles in the chain
pub const TILE_COUNT: usize = 4;

/// Tilt beyond which the clock is considered flipped
pub const FLIP_THRESHOLD_DEGREES: f32 = 40.0;

/// Which sign of the tilt angle means the clock hangs upside down
pub const DOWN_WHEN_ANGLE_POSITIVE: bool = true;

/// Per-tile digit register bytes, see [`crate::MatrixPanel::write`]
pub type TileRows = [[u8; 8]; TILE_COUNT];

/// Mount orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Orientation {
    #[default]
    Up,
    Down,
}

impl Orientation {
    /// Classify a Y-axis tilt angle in degrees
    ///
    /// Anything not clearly flipped, including NaN, is `Up`.
    pub fn from_angle(angle: f32) -> Self {
        let flipped = if DOWN_WHEN_ANGLE_POSITIVE {
            angle >= FLIP_THRESHOLD_DEGREES
        } else {
            angle <= -FLIP_THRESHOLD_DEGREES
        };
        if flipped {
            Orientation::Down
        } else {
            Orientation::Up
        }
    }

    /// Tile mapping for this orientation
    pub fn layout(self) -> TileLayout {
        match self {
            Orientation::Up => TileLayout {
                positions: [0, 1, 2, 3],
                rotation: 1,
            },
            Orientation::Down => TileLayout {
                positions: [3, 2, 1, 0],
                rotation: 3,
            },
        }
    }
}

/// Mapping of logical slots onto physical tiles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TileLayout {
    /// `positions[slot]` is the physical tile showing canvas columns
    /// `slot * 8 .. slot * 8 + 8`
    pub positions: [u8; TILE_COUNT],
    /// Quarter turns applied to every tile (0..=3)
    pub rotation: u8,
}

impl Default for TileLayout {
    fn default() -> Self {
        Orientation::Up.layout()
    }
}

impl TileLayout {
    /// Map a canvas pixel to `(tile, digit, bit)`
    pub fn to_physical(&self, x: i32, y: i32) -> Option<(usize, usize, u8)> {
        if !(0..WIDTH).contains(&x) || !(0..HEIGHT).contains(&y) {
            return None;
        }
        let tile = *self.positions.get((x >> 3) as usize)? as usize;
        let mut px = (x & 7) as u8;
        let mut py = (y & 7) as u8;
        let r = self.rotation & 3;
        if r >= 2 {
            px = 7 - px;
        }
        if r == 1 || r == 2 {
            py = 7 - py;
        }
        if r == 1 || r == 3 {
            core::mem::swap(&mut px, &mut py);
        }
        Some((tile, px as usize, py))
    }

    /// Map a whole frame to digit register bytes
    pub fn render(&self, frame: &FrameBuffer) -> TileRows {
        let mut rows = [[0u8; 8]; TILE_COUNT];
        for x in 0..WIDTH {
            for y in 0..HEIGHT {
                if !frame.pixel(x, y) {
                    continue;
                }
                if let Some((tile, digit, bit)) = self.to_physical(x, y) {
                    rows[tile][digit] |= 1 << bit;
                }
            }
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_threshold() {
        assert_eq!(Orientation::from_angle(40.0), Orientation::Down);
        assert_eq!(Orientation::from_angle(39.9), Orientation::Up);
        assert_eq!(Orientation::from_angle(-40.0), Orientation::Up);
        assert_eq!(Orientation::from_angle(0.0), Orientation::Up);
        assert_eq!(Orientation::from_angle(f32::NAN), Orientation::Up);
    }

    #[test]
    fn test_layouts() {
        assert_eq!(Orientation::Up.layout().positions, [0, 1, 2, 3]);
        assert_eq!(Orientation::Up.layout().rotation, 1);
        assert_eq!(Orientation::Down.layout().positions, [3, 2, 1, 0]);
        assert_eq!(Orientation::Down.layout().rotation, 3);
    }

    #[test]
    fn test_up_corner_mapping() {
        let layout = Orientation::Up.layout();
        // rotation 1: y flipped, then swapped with x
        assert_eq!(layout.to_physical(0, 0), Some((0, 7, 0)));
        assert_eq!(layout.to_physical(31, 7), Some((3, 0, 7)));
        assert_eq!(layout.to_physical(32, 0), None);
    }

    #[test]
    fn test_down_is_point_reflection_of_up() {
        let up = Orientation::Up.layout();
        let down = Orientation::Down.layout();
        for x in 0..WIDTH {
            for y in 0..HEIGHT {
                assert_eq!(
                    down.to_physical(x, y),
                    up.to_physical(WIDTH - 1 - x, HEIGHT - 1 - y)
                );
            }
        }
    }

    #[test]
    fn test_render_single_pixel() {
        let mut frame = FrameBuffer::new();
        frame.set_pixel(9, 3, true);
        let rows = Orientation::Up.layout().render(&frame);
        // slot 1 -> tile 1; local (1, 3) -> rot 1 -> digit 4, bit 1
        assert_eq!(rows[1][4], 0b0000_0010);
        let lit: u32 = rows.iter().flatten().map(|b| b.count_ones()).sum();
        assert_eq!(lit, 1);
    }

    proptest! {
        #[test]
        fn prop_orientation_is_one_of_two_and_stable(angle in -180.0f32..180.0) {
            let first = Orientation::from_angle(angle);
            let second = Orientation::from_angle(angle);
            prop_assert_eq!(first, second);
            prop_assert_eq!(first.layout(), second.layout());
            prop_assert!(first == Orientation::Up || first == Orientation::Down);
        }

        #[test]
        fn prop_mapping_is_a_bijection(x1 in 0i32..32, y1 in 0i32..8, x2 in 0i32..32, y2 in 0i32..8, down in any::<bool>()) {
            let layout = if down { Orientation::Down } else { Orientation::Up }.layout();
            let a = layout.to_physical(x1, y1);
            let b = layout.to_physical(x2, y2);
            prop_assert!(a.is_some());
            prop_assert_eq!(a == b, (x1, y1) == (x2, y2));
        }
    }
}
