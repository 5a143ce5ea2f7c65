//! Load-cell ADC abstraction

use core::future::Future;

use super::SensorError;

/// Load-cell amplifier/ADC
///
/// Raw readings are uncalibrated counts. Conversion to weight belongs to
/// [`CalibrationRecord`](crate::calibration::CalibrationRecord).
pub trait LoadCell {
    /// Bring the device into a known state after power-on
    fn init(&mut self) -> impl Future<Output = Result<(), SensorError>>;

    /// Read one raw sample
    fn read_raw(&mut self) -> impl Future<Output = Result<f64, SensorError>>;

    /// Leave power-down mode
    fn power_up(&mut self) -> impl Future<Output = Result<(), SensorError>>;

    /// Enter power-down mode
    fn power_down(&mut self) -> impl Future<Output = Result<(), SensorError>>;

    /// Full chip reset (power down then up)
    fn reset(&mut self) -> impl Future<Output = Result<(), SensorError>>;
}
