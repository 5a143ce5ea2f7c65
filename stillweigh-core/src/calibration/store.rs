//! Calibration persistence

use stillweigh_hal::{FlashError, FlashStorage, StorageKey};

use super::record::{CalibrationRecord, StoredCalibration};

/// Maximum serialized calibration size
const MAX_CALIBRATION_SIZE: usize = 64;

/// Reasons `load` found no usable record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoadError {
    /// Nothing stored yet
    NotFound,
    /// Stored bytes are malformed, fail the CRC, or carry invalid fields
    Invalid,
    /// Storage itself failed
    Storage(FlashError),
}

impl From<FlashError> for LoadError {
    fn from(e: FlashError) -> Self {
        match e {
            FlashError::NotFound => LoadError::NotFound,
            FlashError::Corrupted | FlashError::BufferTooSmall => LoadError::Invalid,
            other => LoadError::Storage(other),
        }
    }
}

/// Reasons `save` failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SaveError {
    /// Serialization failed
    Serialize,
    /// Storage write failed
    Storage(FlashError),
}

/// Durable home of the calibration record
pub struct CalibrationStore<S> {
    storage: S,
}

impl<S: FlashStorage> CalibrationStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Load and validate the stored record
    ///
    /// Either the whole record is returned or an error; fields are never
    /// partially applied.
    pub async fn load(&mut self) -> Result<CalibrationRecord, LoadError> {
        let mut buffer = [0u8; MAX_CALIBRATION_SIZE];
        let len = self.storage.read(StorageKey::Calibration, &mut buffer).await?;

        debug!("Read {} bytes of calibration", len);

        let stored: StoredCalibration =
            postcard::from_bytes(&buffer[..len]).map_err(|_| LoadError::Invalid)?;

        if !stored.is_valid() {
            warn!("Calibration header mismatch");
            return Err(LoadError::Invalid);
        }
        if !stored.verify_crc() {
            warn!("Calibration CRC mismatch");
            return Err(LoadError::Invalid);
        }
        stored.record.validate().map_err(|_| LoadError::Invalid)?;

        Ok(stored.record)
    }

    /// Overwrite the stored record
    pub async fn save(&mut self, record: &CalibrationRecord) -> Result<(), SaveError> {
        let stored = StoredCalibration::new(*record);

        let mut buffer = [0u8; MAX_CALIBRATION_SIZE];
        let bytes = postcard::to_slice(&stored, &mut buffer).map_err(|_| SaveError::Serialize)?;

        debug!("Saving {} bytes of calibration", bytes.len());

        self.storage
            .write(StorageKey::Calibration, bytes)
            .await
            .map_err(SaveError::Storage)
    }

    /// Give the storage back
    pub fn into_inner(self) -> S {
        self.storage
    }
}
