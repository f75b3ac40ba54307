//! MPU6050 accelerometer/gyro with a complementary tilt filter
//!
//! Runs the gyro at ±500 °/s and the accelerometer at ±2 g. Angles blend
//! 98% gyro integration with 2% accelerometer.

use core::f32::consts::PI;

use matrixclock_core::traits::{AngleSensor, SensorError};
use matrixclock_hal::I2cBus;

/// Default I2C address (AD0 low)
pub const MPU6050_ADDR: u8 = 0x68;

/// MPU6050 register addresses
pub mod reg {
    pub const SMPLRT_DIV: u8 = 0x19;
    pub const CONFIG: u8 = 0x1A;
    pub const GYRO_CONFIG: u8 = 0x1B;
    pub const ACCEL_CONFIG: u8 = 0x1C;
    /// Start of the 14-byte accel/temp/gyro burst
    pub const ACCEL_XOUT_H: u8 = 0x3B;
    pub const PWR_MGMT_1: u8 = 0x6B;
    pub const WHO_AM_I: u8 = 0x75;
}

/// Gyro sensitivity at ±500 °/s
pub const GYRO_LSB_PER_DPS: f32 = 65.5;

/// Accelerometer sensitivity at ±2 g
pub const ACCEL_LSB_PER_G: f32 = 16384.0;

/// Weight of the integrated gyro angle
pub const GYRO_COEFF: f32 = 0.98;

/// Weight of the accelerometer angle
pub const ACCEL_COEFF: f32 = 0.02;

/// Errors from the IMU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ImuError {
    /// I2C transfer failed
    Bus,
    /// WHO_AM_I did not identify an MPU6050
    NotFound,
}

impl From<ImuError> for SensorError {
    fn from(e: ImuError) -> Self {
        match e {
            ImuError::Bus => SensorError::Bus,
            ImuError::NotFound => SensorError::NotResponding,
        }
    }
}

/// One burst read, still in raw counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawSample {
    pub accel: [i16; 3],
    pub temperature: i16,
    pub gyro: [i16; 3],
}

impl RawSample {
    fn from_bytes(b: &[u8; 14]) -> Self {
        let word = |i: usize| i16::from_be_bytes([b[i], b[i + 1]]);
        Self {
            accel: [word(0), word(2), word(4)],
            temperature: word(6),
            gyro: [word(8), word(10), word(12)],
        }
    }
}

/// Tilt angles from an acceleration vector, in degrees
///
/// Returns `(x, y)`; the Y angle is negated so that it grows when the
/// board tips towards +X.
pub fn accel_angles(ax: f32, ay: f32, az: f32) -> (f32, f32) {
    let x = libm::atan2f(ay, libm::sqrtf(az * az + ax * ax)) * 180.0 / PI;
    let y = libm::atan2f(ax, libm::sqrtf(az * az + ay * ay)) * -180.0 / PI;
    (x, y)
}

/// One complementary filter step
pub fn complementary(angle: f32, rate_dps: f32, dt_s: f32, accel_angle: f32) -> f32 {
    GYRO_COEFF * (angle + rate_dps * dt_s) + ACCEL_COEFF * accel_angle
}

/// MPU6050 on an I2C bus
pub struct Mpu6050<I2C> {
    i2c: I2C,
    address: u8,
    gyro_offset: [f32; 3],
    angle: [f32; 3],
    last_update_ms: Option<u64>,
}

impl<I2C: I2cBus> Mpu6050<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, MPU6050_ADDR)
    }

    pub fn with_address(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            gyro_offset: [0.0; 3],
            angle: [0.0; 3],
            last_update_ms: None,
        }
    }

    /// Identify and configure the chip
    pub fn init(&mut self) -> Result<(), ImuError> {
        let mut id = [0u8; 1];
        self.i2c
            .write_read(self.address, &[reg::WHO_AM_I], &mut id)
            .map_err(|_| ImuError::Bus)?;
        if id[0] & 0x7E != MPU6050_ADDR {
            return Err(ImuError::NotFound);
        }

        self.write_register(reg::SMPLRT_DIV, 0x00)?;
        self.write_register(reg::CONFIG, 0x00)?;
        self.write_register(reg::GYRO_CONFIG, 0x08)?;
        self.write_register(reg::ACCEL_CONFIG, 0x00)?;
        self.write_register(reg::PWR_MGMT_1, 0x01)?;
        self.angle = [0.0; 3];
        self.last_update_ms = None;
        Ok(())
    }

    /// Average `samples` gyro readings into the zero-rate offsets
    ///
    /// The board must be at rest.
    pub fn calibrate_gyro(&mut self, samples: u16) -> Result<[f32; 3], ImuError> {
        let samples = samples.max(1);
        let mut sum = [0.0f32; 3];
        for _ in 0..samples {
            let raw = self.read_raw()?;
            for (acc, rate) in sum.iter_mut().zip(raw.gyro) {
                *acc += rate as f32 / GYRO_LSB_PER_DPS;
            }
        }
        for (offset, total) in self.gyro_offset.iter_mut().zip(sum) {
            *offset = total / samples as f32;
        }
        Ok(self.gyro_offset)
    }

    pub fn set_gyro_offsets(&mut self, offsets: [f32; 3]) {
        self.gyro_offset = offsets;
    }

    pub fn read_raw(&mut self) -> Result<RawSample, ImuError> {
        let mut buf = [0u8; 14];
        self.i2c
            .write_read(self.address, &[reg::ACCEL_XOUT_H], &mut buf)
            .map_err(|_| ImuError::Bus)?;
        Ok(RawSample::from_bytes(&buf))
    }

    /// Read the chip and advance the filter to `now_ms`
    pub fn sample(&mut self, now_ms: u64) -> Result<(), ImuError> {
        let raw = self.read_raw()?;

        let [ax, ay, az] = raw.accel.map(|v| v as f32 / ACCEL_LSB_PER_G);
        let mut rate = raw.gyro.map(|v| v as f32 / GYRO_LSB_PER_DPS);
        for (r, offset) in rate.iter_mut().zip(self.gyro_offset) {
            *r -= offset;
        }

        let dt_s = match self.last_update_ms {
            Some(last) => now_ms.saturating_sub(last) as f32 / 1000.0,
            None => 0.0,
        };
        self.last_update_ms = Some(now_ms);

        let (acc_x, acc_y) = accel_angles(ax, ay, az);
        self.angle[0] = complementary(self.angle[0], rate[0], dt_s, acc_x);
        self.angle[1] = complementary(self.angle[1], rate[1], dt_s, acc_y);
        self.angle[2] += rate[2] * dt_s;
        Ok(())
    }

    pub fn angles(&self) -> [f32; 3] {
        self.angle
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), ImuError> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(|_| ImuError::Bus)
    }
}

impl<I2C: I2cBus> AngleSensor for Mpu6050<I2C> {
    fn update(&mut self, now_ms: u64) -> Result<(), SensorError> {
        Ok(self.sample(now_ms)?)
    }

    fn angle_y(&self) -> f32 {
        self.angle[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec;
    use proptest::prelude::*;

    /// Answers WHO_AM_I and serves one fixed burst
    struct FakeBus {
        who_am_i: u8,
        burst: [u8; 14],
        writes: Vec<(u8, u8), 8>,
    }

    impl FakeBus {
        fn with_sample(accel: [i16; 3], gyro: [i16; 3]) -> Self {
            let mut burst = [0u8; 14];
            for (i, v) in accel.iter().chain([0i16].iter()).chain(gyro.iter()).enumerate() {
                burst[2 * i..2 * i + 2].copy_from_slice(&v.to_be_bytes());
            }
            Self {
                who_am_i: MPU6050_ADDR,
                burst,
                writes: Vec::new(),
            }
        }
    }

    impl I2cBus for FakeBus {
        type Error = ();

        fn write(&mut self, _address: u8, data: &[u8]) -> Result<(), ()> {
            self.writes.push((data[0], data[1])).map_err(|_| ())
        }

        fn write_read(&mut self, _address: u8, write_data: &[u8], read_buf: &mut [u8]) -> Result<(), ()> {
            match write_data[0] {
                reg::WHO_AM_I => read_buf[0] = self.who_am_i,
                reg::ACCEL_XOUT_H => read_buf.copy_from_slice(&self.burst),
                _ => return Err(()),
            }
            Ok(())
        }
    }

    #[test]
    fn test_init_register_values() {
        let mut imu = Mpu6050::new(FakeBus::with_sample([0, 0, 16384], [0; 3]));
        imu.init().unwrap();
        assert_eq!(
            imu.i2c.writes.as_slice(),
            &[
                (reg::SMPLRT_DIV, 0x00),
                (reg::CONFIG, 0x00),
                (reg::GYRO_CONFIG, 0x08),
                (reg::ACCEL_CONFIG, 0x00),
                (reg::PWR_MGMT_1, 0x01),
            ]
        );
    }

    #[test]
    fn test_init_rejects_unknown_chip() {
        let mut bus = FakeBus::with_sample([0; 3], [0; 3]);
        bus.who_am_i = 0x12;
        let mut imu = Mpu6050::new(bus);
        assert_eq!(imu.init(), Err(ImuError::NotFound));
    }

    #[test]
    fn test_level_board_reads_zero() {
        let (x, y) = accel_angles(0.0, 0.0, 1.0);
        assert!(x.abs() < 1e-4);
        assert!(y.abs() < 1e-4);
    }

    #[test]
    fn test_tipped_board_converges() {
        // 1 g along +X: accelerometer Y angle is -90
        let mut imu = Mpu6050::new(FakeBus::with_sample([16384, 0, 0], [0; 3]));
        for i in 0..400 {
            imu.update(i * 5).unwrap();
        }
        assert!((imu.angle_y() + 90.0).abs() < 0.5);
    }

    #[test]
    fn test_gyro_integration_uses_elapsed_time() {
        // 65.5 counts = 1 deg/s around Y, board level
        let mut imu = Mpu6050::new(FakeBus::with_sample([0, 0, 16384], [0, 655, 0]));
        imu.update(0).unwrap();
        imu.update(1000).unwrap();
        // 0.98 * (0 + 10 deg/s * 1 s)
        assert!((imu.angle_y() - 9.8).abs() < 1e-3);
    }

    #[test]
    fn test_calibration_removes_bias() {
        let mut imu = Mpu6050::new(FakeBus::with_sample([0, 0, 16384], [131, 655, -131]));
        let offsets = imu.calibrate_gyro(10).unwrap();
        assert!((offsets[1] - 10.0).abs() < 1e-3);
        imu.update(0).unwrap();
        imu.update(1000).unwrap();
        assert!(imu.angle_y().abs() < 1e-3);
    }

    #[test]
    fn test_bus_error_maps_to_sensor_error() {
        struct DeadBus;
        impl I2cBus for DeadBus {
            type Error = ();
            fn write(&mut self, _: u8, _: &[u8]) -> Result<(), ()> {
                Err(())
            }
            fn write_read(&mut self, _: u8, _: &[u8], _: &mut [u8]) -> Result<(), ()> {
                Err(())
            }
        }
        let mut imu = Mpu6050::new(DeadBus);
        assert_eq!(imu.update(0), Err(SensorError::Bus));
    }

    proptest! {
        #[test]
        fn prop_filter_stays_between_inputs(angle in -90.0f32..90.0, accel in -90.0f32..90.0) {
            // With no rotation the new angle is a blend of old and measured
            let next = complementary(angle, 0.0, 0.01, accel);
            let (lo, hi) = if angle < accel { (angle, accel) } else { (accel, angle) };
            prop_assert!(next >= lo - 1e-3 && next <= hi + 1e-3);
        }
    }
}
