//! Rendering for the 32x8 LED matrix clock face
//!
//! This crate provides:
//! - `FrameBuffer`: the logical 32x8 monochrome canvas with text drawing
//! - `font`: the classic 5x7 glyph table (6 pixel advance)
//! - `TileLayout` / `Orientation`: mapping of the canvas onto the four
//!   physical 8x8 tiles, flipped when the clock hangs upside down
//! - `MatrixPanel`: the trait a tile driver implements
//! - `Renderer`: messages, progress, the clock face and scrolling text
//!
//! Nothing here knows about time; animations are produced frame by frame
//! and paced by the caller.

#![no_std]
#![deny(unsafe_code)]

pub mod backend;
pub mod font;
pub mod framebuffer;
pub mod layout;
pub mod renderer;

// Re-export key types
pub use backend::{DisplayError, MatrixPanel};
pub use framebuffer::{FrameBuffer, HEIGHT, WIDTH};
pub use layout::{Orientation, TileLayout, TileRows, FLIP_THRESHOLD_DEGREES, TILE_COUNT};
pub use renderer::{Renderer, ScrollText};
