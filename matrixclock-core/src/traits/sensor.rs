//! Tilt sensor and button traits

/// Errors that can occur while reading the tilt sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// Bus transfer failed
    Bus,
    /// Device did not identify itself
    NotResponding,
}

/// A filtered angle sensor
///
/// Implementations fuse accelerometer and gyro readings; every `update`
/// advances the filter by the time elapsed since the previous one.
pub trait AngleSensor {
    /// Take one reading and advance the filter
    ///
    /// - `now_ms`: monotonic timestamp used to integrate the gyro
    fn update(&mut self, now_ms: u64) -> Result<(), SensorError>;

    /// Filtered Y-axis angle in degrees
    fn angle_y(&self) -> f32;
}

/// A momentary push button
pub trait ButtonInput {
    /// True once per debounced press
    fn pressed(&mut self, now_ms: u64) -> bool;
}
