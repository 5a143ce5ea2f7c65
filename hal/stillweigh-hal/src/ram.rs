//! RAM-backed storage
//!
//! Fixed-capacity in-memory implementation of [`FlashStorage`], used by
//! host tests and by boards without a spare flash partition.

use heapless::Vec;

use crate::flash::{FlashError, FlashStorage, StorageKey};

/// Number of distinct keys
const SLOTS: usize = 3;

/// In-memory key-value store with `N` bytes per slot
pub struct RamStorage<const N: usize> {
    slots: [Option<Vec<u8, N>>; SLOTS],
    fail_writes: bool,
}

impl<const N: usize> Default for RamStorage<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RamStorage<N> {
    /// Create an empty store
    pub const fn new() -> Self {
        Self {
            slots: [None, None, None],
            fail_writes: false,
        }
    }

    /// Make every subsequent write fail with [`FlashError::Flash`]
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Raw access to a stored value
    pub fn get(&self, key: StorageKey) -> Option<&[u8]> {
        self.slots[key.as_u8() as usize].as_deref()
    }

    /// Overwrite a stored value without going through the async API
    pub fn put(&mut self, key: StorageKey, data: &[u8]) -> Result<(), FlashError> {
        let value = Vec::from_slice(data).map_err(|_| FlashError::Full)?;
        self.slots[key.as_u8() as usize] = Some(value);
        Ok(())
    }
}

impl<const N: usize> FlashStorage for RamStorage<N> {
    async fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, FlashError> {
        let data = self.get(key).ok_or(FlashError::NotFound)?;
        if buffer.len() < data.len() {
            return Err(FlashError::BufferTooSmall);
        }
        buffer[..data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    async fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), FlashError> {
        if self.fail_writes {
            return Err(FlashError::Flash);
        }
        self.put(key, data)
    }

    async fn exists(&mut self, key: StorageKey) -> bool {
        self.get(key).is_some()
    }

    async fn erase_all(&mut self) -> Result<(), FlashError> {
        self.slots = [None, None, None];
        Ok(())
    }
}
