//! Configuration loading
//!
//! A `device.toml` stored in flash wins; otherwise the copy embedded at
//! build time is used. Both go through the same parser and validation.

use core::str;
use defmt::*;

use stillweigh_core::config::{parse_config, ConfigError, DeviceConfig, ParseError};
use stillweigh_hal_rp2040::flash::{FlashError, StorageKey, MAX_ITEM_SIZE};
use stillweigh_hal_rp2040::FlashStorageTrait;

/// Embedded default configuration; edit device.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../../device.toml");

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigLoadError {
    Flash(FlashError),
    InvalidUtf8,
    Parse(ParseError),
    Invalid(ConfigError),
}

impl From<FlashError> for ConfigLoadError {
    fn from(e: FlashError) -> Self {
        ConfigLoadError::Flash(e)
    }
}

/// Load the flash config, falling back to the embedded one, then to defaults
pub async fn load_config<S: FlashStorageTrait>(storage: &mut S) -> DeviceConfig {
    match load_from_flash(storage).await {
        Ok(config) => {
            info!("Loaded device.toml from flash");
            return config;
        }
        Err(ConfigLoadError::Flash(FlashError::NotFound)) => {
            debug!("No device.toml in flash");
        }
        Err(e) => {
            warn!("Ignoring device.toml in flash: {:?}", e);
        }
    }

    match parse_checked(EMBEDDED_CONFIG) {
        Ok(config) => {
            info!("Using embedded device.toml");
            config
        }
        Err(e) => {
            // build.rs validates device.toml, so only a parser mismatch gets here
            error!("Embedded device.toml rejected: {:?}", e);
            DeviceConfig::default()
        }
    }
}

async fn load_from_flash<S: FlashStorageTrait>(
    storage: &mut S,
) -> Result<DeviceConfig, ConfigLoadError> {
    let mut buffer = [0u8; MAX_ITEM_SIZE];
    let len = storage
        .read(StorageKey::DeviceConfigToml, &mut buffer)
        .await?;
    debug!("Read {} bytes of TOML from flash", len);

    let text = str::from_utf8(&buffer[..len]).map_err(|_| ConfigLoadError::InvalidUtf8)?;
    parse_checked(text)
}

fn parse_checked(text: &str) -> Result<DeviceConfig, ConfigLoadError> {
    let config = parse_config(text).map_err(ConfigLoadError::Parse)?;
    config.validate().map_err(ConfigLoadError::Invalid)?;
    log_config_summary(&config);
    Ok(config)
}

fn log_config_summary(config: &DeviceConfig) {
    debug!("  stability: {:?}", config.stability);
    debug!("  acquisition: {:?}", config.acquisition);
    debug!("  tare: {:?}", config.tare);
    debug!("  delivery: {:?}", config.delivery);
}
