//! Device configuration
//!
//! Typed configuration with defaults, validation and a small TOML-subset
//! parser for `device.toml`.

pub mod parse;
pub mod types;

pub use parse::{parse_config, ParseError, ParseErrorKind};
pub use types::{
    AcquisitionConfig, ConfigError, DeliveryConfig, DeviceConfig, LinkMode, StabilityConfig,
    StabilityPolicy, TareConfig,
};
