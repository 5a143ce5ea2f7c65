//! MPU6050 6-axis IMU, gyroscope half only
//!
//! Configured for the ±250 °/s range, where one LSB is 1/131 °/s.

use embedded_hal_async::i2c::I2c;
use stillweigh_core::traits::{AngularRates, Gyroscope, SensorError};

/// I2C address with AD0 tied low
pub const DEFAULT_ADDRESS: u8 = 0x68;

/// MPU6050 register addresses
pub mod reg {
    /// Gyroscope full-scale range
    pub const GYRO_CONFIG: u8 = 0x1B;
    /// First of six big-endian gyro output bytes (X, Y, Z)
    pub const GYRO_XOUT_H: u8 = 0x43;
    /// Power management 1 (sleep bit, clock source)
    pub const PWR_MGMT_1: u8 = 0x6B;
    /// Identity, reads back 0x68 regardless of AD0
    pub const WHO_AM_I: u8 = 0x75;
}

const WHO_AM_I_VALUE: u8 = 0x68;
const PWR_MGMT_1_SLEEP: u8 = 0x40;
const GYRO_RANGE_250DPS: u8 = 0x00;
const LSB_PER_DEG_PER_SEC: f32 = 131.0;

pub struct Mpu6050<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Mpu6050<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, DEFAULT_ADDRESS)
    }

    pub fn with_address(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    async fn write_register(&mut self, register: u8, value: u8) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &[register, value])
            .await
            .map_err(|_| SensorError::Bus)
    }

    async fn read_registers(&mut self, register: u8, buf: &mut [u8]) -> Result<(), SensorError> {
        self.i2c
            .write_read(self.address, &[register], buf)
            .await
            .map_err(|_| SensorError::Bus)
    }
}

fn rate(high: u8, low: u8) -> f32 {
    i16::from_be_bytes([high, low]) as f32 / LSB_PER_DEG_PER_SEC
}

impl<I2C: I2c> Gyroscope for Mpu6050<I2C> {
    async fn init(&mut self) -> Result<(), SensorError> {
        let mut id = [0u8; 1];
        self.read_registers(reg::WHO_AM_I, &mut id).await?;
        if id[0] != WHO_AM_I_VALUE {
            warn!("MPU6050 WHO_AM_I mismatch: {=u8:#x}", id[0]);
            return Err(SensorError::NotPresent);
        }
        // Clear the sleep bit, internal oscillator
        self.write_register(reg::PWR_MGMT_1, 0x00).await?;
        self.write_register(reg::GYRO_CONFIG, GYRO_RANGE_250DPS).await?;
        info!("MPU6050 awake at {=u8:#x}", self.address);
        Ok(())
    }

    async fn read_angular_rates(&mut self) -> Result<AngularRates, SensorError> {
        let mut raw = [0u8; 6];
        self.read_registers(reg::GYRO_XOUT_H, &mut raw).await?;
        Ok(AngularRates::new(
            rate(raw[0], raw[1]),
            rate(raw[2], raw[3]),
            rate(raw[4], raw[5]),
        ))
    }

    async fn sleep(&mut self) -> Result<(), SensorError> {
        self.write_register(reg::PWR_MGMT_1, PWR_MGMT_1_SLEEP).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockI2c;
    use embassy_futures::block_on;

    fn present() -> MockI2c {
        let mut bus = MockI2c::new(DEFAULT_ADDRESS);
        bus.registers[reg::WHO_AM_I as usize] = WHO_AM_I_VALUE;
        bus.registers[reg::PWR_MGMT_1 as usize] = PWR_MGMT_1_SLEEP;
        bus
    }

    #[test]
    fn test_init_wakes_device() {
        let mut imu = Mpu6050::new(present());
        block_on(imu.init()).unwrap();
        let bus = imu.release();
        assert_eq!(
            bus.writes,
            vec![(reg::PWR_MGMT_1, 0x00), (reg::GYRO_CONFIG, GYRO_RANGE_250DPS)]
        );
    }

    #[test]
    fn test_init_rejects_wrong_identity() {
        let mut bus = present();
        bus.registers[reg::WHO_AM_I as usize] = 0x70;
        let mut imu = Mpu6050::new(bus);
        assert_eq!(block_on(imu.init()), Err(SensorError::NotPresent));
        assert!(imu.release().writes.is_empty());
    }

    #[test]
    fn test_init_missing_device() {
        let mut imu = Mpu6050::with_address(present(), 0x69);
        assert_eq!(block_on(imu.init()), Err(SensorError::Bus));
    }

    #[test]
    fn test_read_scales_to_degrees_per_second() {
        let mut bus = present();
        // X = 131 (1 °/s), Y = -262 (-2 °/s), Z = 655 (5 °/s)
        let raw = [0x00, 0x83, 0xFE, 0xFA, 0x02, 0x8F];
        bus.registers[reg::GYRO_XOUT_H as usize..reg::GYRO_XOUT_H as usize + 6]
            .copy_from_slice(&raw);
        let mut imu = Mpu6050::new(bus);

        let rates = block_on(imu.read_angular_rates()).unwrap();
        assert_eq!(rates, AngularRates::new(1.0, -2.0, 5.0));
    }

    #[test]
    fn test_read_bus_error() {
        let mut bus = present();
        bus.fail = true;
        let mut imu = Mpu6050::new(bus);
        assert_eq!(block_on(imu.read_angular_rates()), Err(SensorError::Bus));
    }

    #[test]
    fn test_sleep_sets_sleep_bit() {
        let mut imu = Mpu6050::new(present());
        block_on(imu.sleep()).unwrap();
        let bus = imu.release();
        assert_eq!(bus.writes, vec![(reg::PWR_MGMT_1, PWR_MGMT_1_SLEEP)]);
    }
}
