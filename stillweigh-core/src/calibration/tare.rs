//! Zero-offset measurement

use embedded_hal_async::delay::DelayNs;
use heapless::Vec;

use crate::config::TareConfig;
use crate::filter::median;
use crate::traits::LoadCell;

/// Upper bound on tare readings kept in memory
pub const MAX_TARE_SAMPLES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TareError {
    /// Every reading failed
    NoValidSamples,
}

/// Measure a new zero offset
///
/// Power-cycles the load cell, takes `config.samples` raw readings and
/// returns their median. Failed or non-finite readings are discarded. No
/// calibration state is touched; the caller decides what to do with the
/// offset.
pub async fn perform_tare<L, D>(
    load_cell: &mut L,
    delay: &mut D,
    config: &TareConfig,
) -> Result<f64, TareError>
where
    L: LoadCell,
    D: DelayNs,
{
    if let Err(e) = load_cell.power_down().await {
        warn!("Tare: power down failed: {:?}", e);
    }
    delay.delay_ms(config.power_cycle_ms).await;
    if let Err(e) = load_cell.power_up().await {
        warn!("Tare: power up failed: {:?}", e);
    }

    // Validated configs never exceed the buffer
    let wanted = (config.samples as usize).min(MAX_TARE_SAMPLES);
    if wanted < config.samples as usize {
        warn!("Tare: {} samples requested, taking {}", config.samples, wanted);
    }
    let mut readings: Vec<f64, MAX_TARE_SAMPLES> = Vec::new();

    for i in 0..wanted {
        match load_cell.read_raw().await {
            Ok(raw) if raw.is_finite() => {
                let _ = readings.push(raw);
            }
            Ok(raw) => warn!("Tare: discarded non-finite reading {}", raw),
            Err(e) => warn!("Tare: discarded reading {}: {:?}", i, e),
        }
        if i + 1 < wanted {
            delay.delay_ms(config.sample_interval_ms).await;
        }
    }

    let offset = median(&mut readings).ok_or(TareError::NoValidSamples)?;
    info!(
        "Tare offset {} from {}/{} readings",
        offset,
        readings.len(),
        wanted
    );
    Ok(offset)
}
