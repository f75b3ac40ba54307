//! Logical canvas
//!
//! One byte per column, bit `y` lit when pixel `(x, y)` is on. Drawing
//! outside the canvas is silently clipped and text never wraps.

use crate::font::{self, ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH};

/// Canvas width in pixels (four tiles)
pub const WIDTH: i32 = 32;

/// Canvas height in pixels
pub const HEIGHT: i32 = 8;

/// 32x8 monochrome framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBuffer {
    columns: [u8; WIDTH as usize],
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    /// Create a blank canvas
    pub const fn new() -> Self {
        Self {
            columns: [0; WIDTH as usize],
        }
    }

    /// Turn every pixel off
    pub fn clear(&mut self) {
        self.columns = [0; WIDTH as usize];
    }

    /// Set a pixel; out-of-range coordinates are ignored
    pub fn set_pixel(&mut self, x: i32, y: i32, on: bool) {
        if !(0..WIDTH).contains(&x) || !(0..HEIGHT).contains(&y) {
            return;
        }
        let column = &mut self.columns[x as usize];
        if on {
            *column |= 1 << y;
        } else {
            *column &= !(1 << y);
        }
    }

    /// Whether a pixel is lit; out-of-range reads as off
    pub fn pixel(&self, x: i32, y: i32) -> bool {
        if !(0..WIDTH).contains(&x) || !(0..HEIGHT).contains(&y) {
            return false;
        }
        self.columns[x as usize] & (1 << y) != 0
    }

    /// Raw column byte
    pub fn column(&self, x: usize) -> u8 {
        self.columns.get(x).copied().unwrap_or(0)
    }

    /// Number of lit pixels
    pub fn lit_count(&self) -> u32 {
        self.columns.iter().map(|c| c.count_ones()).sum()
    }

    pub fn is_blank(&self) -> bool {
        self.columns.iter().all(|&c| c == 0)
    }

    /// Draw one character with its top-left corner at `(x, y)`
    ///
    /// With `opaque` the whole 6x8 cell is painted, unlit pixels cleared;
    /// otherwise only lit pixels are touched.
    pub fn draw_char(&mut self, x: i32, y: i32, c: char, opaque: bool) {
        let glyph = font::glyph(c);
        for (dx, &bits) in glyph.iter().enumerate() {
            for dy in 0..GLYPH_HEIGHT {
                let on = bits & (1 << dy) != 0;
                if on || opaque {
                    self.set_pixel(x + dx as i32, y + dy, on);
                }
            }
        }
        if opaque {
            for dy in 0..GLYPH_HEIGHT {
                self.set_pixel(x + GLYPH_WIDTH, y + dy, false);
            }
        }
    }

    /// Print text starting at the cursor; returns the advanced cursor x
    pub fn print(&mut self, cursor_x: i32, cursor_y: i32, text: &str) -> i32 {
        let mut x = cursor_x;
        for c in text.chars() {
            self.draw_char(x, cursor_y, c, false);
            x += ADVANCE;
        }
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_clear_pixel() {
        let mut fb = FrameBuffer::new();
        fb.set_pixel(12, 2, true);
        assert!(fb.pixel(12, 2));
        assert_eq!(fb.column(12), 0b0000_0100);
        fb.set_pixel(12, 2, false);
        assert!(fb.is_blank());
    }

    #[test]
    fn test_clipping() {
        let mut fb = FrameBuffer::new();
        fb.set_pixel(-1, 0, true);
        fb.set_pixel(32, 0, true);
        fb.set_pixel(0, 8, true);
        fb.set_pixel(0, -1, true);
        assert!(fb.is_blank());
        assert!(!fb.pixel(40, 3));
    }

    #[test]
    fn test_print_advances_six_pixels() {
        let mut fb = FrameBuffer::new();
        let next = fb.print(0, 0, "OK");
        assert_eq!(next, 12);
        // 'O' column 0 is 0x3E
        assert_eq!(fb.column(0), 0x3E);
        // spacing column stays dark
        assert_eq!(fb.column(5), 0);
        // 'K' column 0 is 0x7F
        assert_eq!(fb.column(6), 0x7F);
    }

    #[test]
    fn test_print_does_not_wrap() {
        let mut fb = FrameBuffer::new();
        let next = fb.print(0, 0, "CLR WiFi");
        assert_eq!(next, 48);
        // Nothing drawn on a second line, only the first 32 columns exist
        assert!(fb.lit_count() > 0);
        assert_eq!(fb.column(32), 0);
    }

    #[test]
    fn test_transparent_print_keeps_existing_pixels() {
        let mut fb = FrameBuffer::new();
        fb.set_pixel(5, 0, true);
        fb.print(0, 0, " ");
        assert!(fb.pixel(5, 0));
    }

    #[test]
    fn test_opaque_char_clears_cell() {
        let mut fb = FrameBuffer::new();
        for x in 0..6 {
            for y in 0..8 {
                fb.set_pixel(x, y, true);
            }
        }
        fb.draw_char(0, 0, ' ', true);
        assert!(fb.is_blank());
    }

    #[test]
    fn test_partially_visible_char() {
        let mut fb = FrameBuffer::new();
        fb.draw_char(31, 0, 'L', true);
        assert_eq!(fb.column(31), 0x7F);
        fb.clear();
        fb.draw_char(-4, 0, 'L', true);
        assert_eq!(fb.column(0), 0x40);
    }
}
