//! Clock face, messages, progress and scrolling text

use core::fmt::Write;

use heapless::String;

use crate::backend::{DisplayError, MatrixPanel};
use crate::font::{ADVANCE, GLYPH_SPACING};
use crate::framebuffer::{FrameBuffer, HEIGHT, WIDTH};
use crate::layout::{Orientation, TileLayout};

/// Cursor x of the minutes on the clock face
const MINUTE_CURSOR: i32 = 14;

/// Colon pixels between hours and minutes
const CLOCK_COLON: [(i32, i32); 2] = [(12, 2), (12, 4)];

/// Narrow colon after the progress "P"
const PROGRESS_COLON: [(i32, i32); 2] = [(7, 2), (7, 4)];

/// Cursor x of the progress percentage
const PROGRESS_CURSOR: i32 = 9;

#[rustfmt::skip]
const AM_PIXELS: [(i32, i32); 14] = [
    (28, 2), (28, 3), (28, 4), (28, 5), (28, 6),
    (29, 1), (29, 4),
    (30, 1), (30, 4),
    (31, 2), (31, 3), (31, 4), (31, 5), (31, 6),
];

#[rustfmt::skip]
const PM_PIXELS: [(i32, i32); 12] = [
    (28, 1), (28, 2), (28, 3), (28, 4), (28, 5), (28, 6),
    (29, 1), (29, 4),
    (30, 1), (30, 4),
    (31, 2), (31, 3),
];

/// Frame generator for a right-to-left marquee
///
/// Frame `i` places letter `i / 6` at `x = width - 1 - i % 6` and walks back
/// one glyph at a time while any part of it is still visible.
#[derive(Debug, Clone, Copy)]
pub struct ScrollText<'a> {
    text: &'a str,
    len: usize,
}

impl<'a> ScrollText<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            len: text.chars().count(),
        }
    }

    /// Total number of frames for the animation
    pub fn frame_count(&self) -> usize {
        (ADVANCE as usize * self.len + WIDTH as usize).saturating_sub(1 + GLYPH_SPACING as usize)
    }

    /// Draw frame `i` into `frame`
    pub fn draw(&self, frame: &mut FrameBuffer, i: usize) {
        frame.clear();
        let advance = ADVANCE as usize;
        let mut letter = (i / advance) as isize;
        let mut x = (WIDTH - 1) - (i % advance) as i32;
        let y = (HEIGHT - 8) / 2;

        while x + ADVANCE - GLYPH_SPACING >= 0 && letter >= 0 {
            if (letter as usize) < self.len {
                if let Some(c) = self.text.chars().nth(letter as usize) {
                    frame.draw_char(x, y, c, true);
                }
            }
            letter -= 1;
            x -= ADVANCE;
        }
    }
}

/// Drives a [`MatrixPanel`] through a framebuffer and the current tile
/// layout
pub struct Renderer<P> {
    panel: P,
    frame: FrameBuffer,
    orientation: Orientation,
    layout: TileLayout,
}

impl<P: MatrixPanel> Renderer<P> {
    pub fn new(panel: P) -> Self {
        Self {
            panel,
            frame: FrameBuffer::new(),
            orientation: Orientation::Up,
            layout: Orientation::Up.layout(),
        }
    }

    /// Apply the tile mapping for a tilt angle
    ///
    /// Takes effect on the next push; returns the chosen orientation.
    pub fn set_orientation(&mut self, angle: f32) -> Orientation {
        let orientation = Orientation::from_angle(angle);
        self.orientation = orientation;
        self.layout = orientation.layout();
        orientation
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn layout(&self) -> &TileLayout {
        &self.layout
    }

    /// Current canvas contents
    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    pub fn panel_mut(&mut self) -> &mut P {
        &mut self.panel
    }

    pub fn set_intensity(&mut self, level: u8) -> Result<(), DisplayError> {
        if level > 15 {
            return Err(DisplayError::InvalidIntensity);
        }
        self.panel.set_intensity(level)
    }

    /// Push the framebuffer through the tile mapping
    pub fn flush(&mut self) -> Result<(), DisplayError> {
        let rows = self.layout.render(&self.frame);
        self.panel.write(&rows)
    }

    /// Clear, print at (0, 0) and push
    pub fn show_message(&mut self, text: &str) -> Result<(), DisplayError> {
        self.frame.clear();
        self.frame.print(0, 0, text);
        self.flush()
    }

    /// `P:` followed by a two-digit percentage
    pub fn show_progress(&mut self, current: u32, total: u32) -> Result<(), DisplayError> {
        self.frame.clear();
        self.frame.print(0, 0, "P");
        for (x, y) in PROGRESS_COLON {
            self.frame.set_pixel(x, y, true);
        }

        let percent = progress_percent(current, total);
        let mut text: String<8> = String::new();
        let _ = write!(text, "{:02}%", percent);
        self.frame.print(PROGRESS_CURSOR, 0, &text);
        self.flush()
    }

    /// Digital clock face: `hh:mm` plus an AM/PM marker
    pub fn show_clock(&mut self, hour12: u8, minute: u8, second: u8, is_am: bool) -> Result<(), DisplayError> {
        self.frame.clear();

        let mut text: String<4> = String::new();
        let _ = write!(text, "{:>2}", hour12);
        self.frame.print(0, 0, &text);

        if second % 2 != 0 {
            for (x, y) in CLOCK_COLON {
                self.frame.set_pixel(x, y, true);
            }
        }

        text.clear();
        let _ = write!(text, "{:02}", minute);
        self.frame.print(MINUTE_CURSOR, 0, &text);

        let marker: &[(i32, i32)] = if is_am { &AM_PIXELS } else { &PM_PIXELS };
        for &(x, y) in marker {
            self.frame.set_pixel(x, y, true);
        }

        self.flush()
    }

    /// Draw and push one frame of a marquee
    pub fn show_scroll_frame(&mut self, scroll: &ScrollText<'_>, i: usize) -> Result<(), DisplayError> {
        scroll.draw(&mut self.frame, i);
        self.flush()
    }
}

/// Integer percentage as the progress screen shows it
///
/// Totals under 100 would divide by zero and count as complete.
pub fn progress_percent(current: u32, total: u32) -> u32 {
    let step = total / 100;
    if step == 0 {
        return 100;
    }
    current / step
}
