//! RP2040-specific HAL for the Stillweigh firmware
//!
//! Provides the flash storage driver (implements
//! `stillweigh_hal::FlashStorage`) backed by sequential-storage.

#![no_std]

pub mod flash;

// Re-export shared traits from stillweigh-hal for convenience
pub use stillweigh_hal::{FlashStorage as FlashStorageTrait, StorageKey};
