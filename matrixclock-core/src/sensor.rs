//! Orientation sampling
//!
//! Wraps an [`AngleSensor`] with the enable switch and the settling read
//! used at boot.

use crate::traits::{AngleSensor, SensorError, Timebase};

/// Filter updates performed by a settling read
pub const SETTLE_READINGS: u8 = 10;

/// Delay between settling updates
pub const SETTLE_DELAY_MS: u32 = 5;

/// Tilt sensor with an on/off switch
pub struct OrientationSensor<S> {
    sensor: S,
    enabled: bool,
}

impl<S: AngleSensor> OrientationSensor<S> {
    pub fn new(sensor: S, enabled: bool) -> Self {
        Self { sensor, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    /// Y-axis angle in degrees
    ///
    /// With `multiple_readings` the filter is updated ten times, 5 ms
    /// apart, and the angle after the last update is returned. A disabled
    /// sensor reads 0 without touching the hardware. On a failed update
    /// the error is returned and the filter keeps its previous state.
    pub async fn sample<T: Timebase>(
        &mut self,
        timebase: &mut T,
        multiple_readings: bool,
    ) -> Result<f32, SensorError> {
        if !self.enabled {
            return Ok(0.0);
        }

        if multiple_readings {
            for _ in 0..SETTLE_READINGS {
                self.sensor.update(timebase.now_ms())?;
                timebase.delay_ms(SETTLE_DELAY_MS).await;
            }
        } else {
            self.sensor.update(timebase.now_ms())?;
        }
        Ok(self.sensor.angle_y())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::future::Future;
    use embassy_futures::block_on;

    struct FakeTimebase {
        now: u64,
        delays: u32,
    }

    impl Timebase for FakeTimebase {
        fn now_ms(&self) -> u64 {
            self.now
        }

        fn delay_ms(&mut self, ms: u32) -> impl Future<Output = ()> {
            self.now += ms as u64;
            self.delays += 1;
            core::future::ready(())
        }

        fn input_pending(&mut self) -> bool {
            false
        }
    }

    struct RampSensor {
        updates: u32,
        timestamps: [u64; 16],
        fail: bool,
    }

    impl AngleSensor for RampSensor {
        fn update(&mut self, now_ms: u64) -> Result<(), SensorError> {
            if self.fail {
                return Err(SensorError::Bus);
            }
            self.timestamps[self.updates as usize % 16] = now_ms;
            self.updates += 1;
            Ok(())
        }

        fn angle_y(&self) -> f32 {
            self.updates as f32 * 5.0
        }
    }

    fn sensor() -> RampSensor {
        RampSensor {
            updates: 0,
            timestamps: [0; 16],
            fail: false,
        }
    }

    #[test]
    fn test_settling_read() {
        let mut tb = FakeTimebase { now: 0, delays: 0 };
        let mut s = OrientationSensor::new(sensor(), true);
        let angle = block_on(s.sample(&mut tb, true)).unwrap();
        assert_eq!(angle, 50.0);
        assert_eq!(tb.delays, 10);
        assert_eq!(tb.now, 50);
        // updates are 5 ms apart
        assert_eq!(s.inner_mut().timestamps[1] - s.inner_mut().timestamps[0], 5);
    }

    #[test]
    fn test_single_read_advances_filter() {
        let mut tb = FakeTimebase { now: 0, delays: 0 };
        let mut s = OrientationSensor::new(sensor(), true);
        assert_eq!(block_on(s.sample(&mut tb, false)), Ok(5.0));
        assert_eq!(block_on(s.sample(&mut tb, false)), Ok(10.0));
        assert_eq!(tb.delays, 0);
    }

    #[test]
    fn test_disabled_reads_zero() {
        let mut tb = FakeTimebase { now: 0, delays: 0 };
        let mut s = OrientationSensor::new(sensor(), false);
        assert_eq!(block_on(s.sample(&mut tb, true)), Ok(0.0));
        assert_eq!(s.inner_mut().updates, 0);
        assert_eq!(tb.delays, 0);
    }

    #[test]
    fn test_error_is_reported() {
        let mut tb = FakeTimebase { now: 0, delays: 0 };
        let mut failing = sensor();
        failing.fail = true;
        let mut s = OrientationSensor::new(failing, true);
        assert_eq!(block_on(s.sample(&mut tb, false)), Err(SensorError::Bus));
    }
}
