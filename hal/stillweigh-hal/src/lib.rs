//! Stillweigh Hardware Abstraction Layer
//!
//! Chip-independent storage traits shared by the core crate and the
//! chip-specific HALs.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  stillweigh-core / stillweigh-firmware   │
//! └──────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌──────────────────────────────────────────┐
//! │  stillweigh-hal (this crate - traits)    │
//! └──────────────────────────────────────────┘
//!          │                        │
//!          ▼                        ▼
//! ┌──────────────────┐    ┌──────────────────┐
//! │ stillweigh-hal-  │    │   RamStorage     │
//! │     rp2040       │    │  (host, tests)   │
//! └──────────────────┘    └──────────────────┘
//! ```

#![no_std]
#![deny(unsafe_code)]

pub mod flash;
pub mod ram;

// Re-export key traits at crate root for convenience
pub use flash::{FlashError, FlashStorage, StorageKey};
pub use ram::RamStorage;
