//! Matrix panel trait
//!
//! Implemented by the tile chain driver. The renderer hands over rows that
//! are already mapped to physical tiles, so a driver only shifts bytes out.

use crate::layout::TileRows;

/// Display backend errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayError {
    /// Communication error with the panel
    Communication,
    /// Intensity outside 0..=15
    InvalidIntensity,
}

/// A chain of 8x8 LED tiles
pub trait MatrixPanel {
    /// Push one full frame
    ///
    /// `rows[tile][n]` is the byte for digit register `n + 1` of physical
    /// tile `tile`, tile 0 being the first in the chain.
    fn write(&mut self, rows: &TileRows) -> Result<(), DisplayError>;

    /// Set the brightness (0 = dimmest, 15 = brightest)
    fn set_intensity(&mut self, level: u8) -> Result<(), DisplayError>;
}
