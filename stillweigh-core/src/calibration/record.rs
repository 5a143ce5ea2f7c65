//! Calibration record and its persisted envelope

use serde::{Deserialize, Serialize};

/// Magic number to identify valid calibration data
pub const CALIBRATION_MAGIC: u32 = 0x5357_4341; // "SWCA"

/// Current calibration data version
pub const CALIBRATION_VERSION: u8 = 1;

/// Why a record was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordError {
    /// Offset is NaN or infinite
    InvalidOffset,
    /// Reference unit is zero, NaN or infinite
    InvalidReferenceUnit,
    /// Baseline is NaN or infinite
    InvalidBaseline,
}

/// Offset and scale for converting raw load-cell counts to weight
///
/// Fields are private so every instance has passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationRecord {
    offset: f64,
    reference_unit: f64,
    baseline_weight: Option<f64>,
}

impl CalibrationRecord {
    /// Create a record without a baseline
    pub fn new(offset: f64, reference_unit: f64) -> Result<Self, RecordError> {
        Self::with_parts(offset, reference_unit, None)
    }

    /// Create a record from all fields
    pub fn with_parts(
        offset: f64,
        reference_unit: f64,
        baseline_weight: Option<f64>,
    ) -> Result<Self, RecordError> {
        if !offset.is_finite() {
            return Err(RecordError::InvalidOffset);
        }
        if !reference_unit.is_finite() || reference_unit == 0.0 {
            return Err(RecordError::InvalidReferenceUnit);
        }
        if let Some(b) = baseline_weight {
            if !b.is_finite() {
                return Err(RecordError::InvalidBaseline);
            }
        }
        Ok(Self {
            offset,
            reference_unit,
            baseline_weight,
        })
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn reference_unit(&self) -> f64 {
        self.reference_unit
    }

    pub fn baseline_weight(&self) -> Option<f64> {
        self.baseline_weight
    }

    /// Same record with a new offset (re-tare)
    pub fn with_offset(self, offset: f64) -> Result<Self, RecordError> {
        Self::with_parts(offset, self.reference_unit, self.baseline_weight)
    }

    /// Same record with a baseline weight attached
    pub fn with_baseline(self, baseline: f64) -> Result<Self, RecordError> {
        Self::with_parts(self.offset, self.reference_unit, Some(baseline))
    }

    /// Convert a raw reading to weight: `(raw - offset) / reference_unit`
    pub fn convert(&self, raw: f64) -> f64 {
        (raw - self.offset) / self.reference_unit
    }

    /// Re-check field constraints, e.g. after deserialization
    pub fn validate(&self) -> Result<(), RecordError> {
        Self::with_parts(self.offset, self.reference_unit, self.baseline_weight).map(|_| ())
    }
}

/// Persisted calibration with header for data validation
///
/// This struct is serialized to flash using postcard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StoredCalibration {
    /// Magic number for validation
    pub magic: u32,
    /// Data format version
    pub version: u8,
    /// The record itself
    pub record: CalibrationRecord,
    /// CRC32 over magic, version and record fields
    pub crc: u32,
}

impl StoredCalibration {
    /// Wrap a record with a fresh header and CRC
    pub fn new(record: CalibrationRecord) -> Self {
        let mut stored = Self {
            magic: CALIBRATION_MAGIC,
            version: CALIBRATION_VERSION,
            record,
            crc: 0,
        };
        stored.update_crc();
        stored
    }

    /// Check if the header matches (magic and version)
    pub fn is_valid(&self) -> bool {
        self.magic == CALIBRATION_MAGIC && self.version == CALIBRATION_VERSION
    }

    /// Calculate CRC32 for the data (excluding the crc field itself)
    pub fn calculate_crc(&self) -> u32 {
        let mut crc: u32 = 0xFFFF_FFFF;
        crc = crc32_update(crc, &self.magic.to_le_bytes());
        crc = crc32_update(crc, &[self.version]);
        crc = crc32_update(crc, &self.record.offset.to_le_bytes());
        crc = crc32_update(crc, &self.record.reference_unit.to_le_bytes());
        match self.record.baseline_weight {
            Some(b) => {
                crc = crc32_update(crc, &[1]);
                crc = crc32_update(crc, &b.to_le_bytes());
            }
            None => crc = crc32_update(crc, &[0]),
        }
        !crc
    }

    /// Update the CRC field
    pub fn update_crc(&mut self) {
        self.crc = self.calculate_crc();
    }

    /// Verify the CRC is correct
    pub fn verify_crc(&self) -> bool {
        self.crc == self.calculate_crc()
    }
}

/// CRC32 update (IEEE 802.3 polynomial, reflected)
fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc = crc;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_and_non_finite_reference_unit() {
        assert_eq!(
            CalibrationRecord::new(0.0, 0.0),
            Err(RecordError::InvalidReferenceUnit)
        );
        assert_eq!(
            CalibrationRecord::new(0.0, f64::INFINITY),
            Err(RecordError::InvalidReferenceUnit)
        );
        assert_eq!(
            CalibrationRecord::new(f64::NAN, 1.0),
            Err(RecordError::InvalidOffset)
        );
        assert_eq!(
            CalibrationRecord::with_parts(0.0, 1.0, Some(f64::NAN)),
            Err(RecordError::InvalidBaseline)
        );
    }

    #[test]
    fn test_convert() {
        let record = CalibrationRecord::new(8_400.0, 425.37).unwrap();
        assert_eq!(record.convert(8_400.0), 0.0);
        let w = record.convert(8_400.0 + 425.37 * 100.0);
        assert!((w - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_retare_keeps_scale_and_baseline() {
        let record = CalibrationRecord::with_parts(1.0, 2.0, Some(50.0)).unwrap();
        let retared = record.with_offset(5.0).unwrap();
        assert_eq!(retared.offset(), 5.0);
        assert_eq!(retared.reference_unit(), 2.0);
        assert_eq!(retared.baseline_weight(), Some(50.0));
    }

    #[test]
    fn test_crc_consistency() {
        let record = CalibrationRecord::with_parts(123.0, 425.37, Some(250.0)).unwrap();
        let mut stored = StoredCalibration::new(record);
        assert!(stored.is_valid());
        assert!(stored.verify_crc());

        // Modify data without updating CRC
        stored.record.offset = 124.0;
        assert!(!stored.verify_crc());
    }

    #[test]
    fn test_crc_distinguishes_missing_baseline() {
        let with = StoredCalibration::new(CalibrationRecord::with_parts(0.0, 1.0, Some(0.0)).unwrap());
        let without = StoredCalibration::new(CalibrationRecord::new(0.0, 1.0).unwrap());
        assert_ne!(with.crc, without.crc);
    }

    #[test]
    fn test_crc32_known_vector() {
        // "123456789" -> 0xCBF43926
        assert_eq!(!crc32_update(0xFFFF_FFFF, b"123456789"), 0xCBF4_3926);
    }
}
