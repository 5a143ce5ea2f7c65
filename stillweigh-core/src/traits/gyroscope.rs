//! Angular-rate sensor abstraction

use core::future::Future;

use super::SensorError;

/// Angular rates in degrees per second
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AngularRates {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl AngularRates {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

/// Three-axis gyroscope
pub trait Gyroscope {
    /// Wake the device and configure its range
    fn init(&mut self) -> impl Future<Output = Result<(), SensorError>>;

    /// Read the current angular rates
    fn read_angular_rates(&mut self) -> impl Future<Output = Result<AngularRates, SensorError>>;

    /// Put the device into its low-power state
    fn sleep(&mut self) -> impl Future<Output = Result<(), SensorError>>;
}
