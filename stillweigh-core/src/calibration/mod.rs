//! Load-cell calibration
//!
//! - [`CalibrationRecord`]: offset, reference unit and optional baseline
//! - [`CalibrationStore`]: durable load/save through [`FlashStorage`](stillweigh_hal::FlashStorage)
//! - [`perform_tare`]: median-of-raw-readings zero offset

pub mod record;
pub mod store;
pub mod tare;

pub use record::{CalibrationRecord, RecordError, StoredCalibration};
pub use store::{CalibrationStore, LoadError, SaveError};
pub use tare::{perform_tare, TareError, MAX_TARE_SAMPLES};
