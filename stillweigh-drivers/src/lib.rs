//! Hardware driver implementations
//!
//! Concrete implementations of the traits defined in `stillweigh-core`:
//!
//! - Load cell: HX711 24-bit bridge ADC (bit-banged)
//! - Gyroscope: MPU6050 over I2C
//! - Peer link: HC-05 Bluetooth SPP module over UART

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod hc05;
pub mod hx711;
pub mod mpu6050;

#[cfg(test)]
mod mock;

pub use hc05::{Hc05, Hc05Config, Hc05Transport};
pub use hx711::{Gain, Hx711, Hx711Config};
pub use mpu6050::Mpu6050;
