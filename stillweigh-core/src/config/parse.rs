//! Minimal TOML parser for `device.toml`
//!
//! Handles only the subset the device configuration uses and never
//! allocates:
//!
//! - `[section]` headers (`stability`, `acquisition`, `tare`, `delivery`)
//! - `key = value` with integer, float, boolean and quoted string values
//! - Full-line and trailing `#` comments
//!
//! Keys that are absent keep their defaults. Unknown sections or keys are
//! errors so typos do not silently fall back to defaults.

use heapless::String;

use super::types::{DeviceConfig, LinkMode, StabilityPolicy};
use crate::traits::{BdAddr, PeerEndpoint, ServiceUuid};

/// What went wrong on a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseErrorKind {
    /// Section header is not one of the known sections
    UnknownSection,
    /// Key is not valid in the current section
    UnknownKey,
    /// Line is neither a header nor `key = value`
    Syntax,
    /// Value has the wrong type or is out of range
    InvalidValue,
}

/// Parse error with 1-based line number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Stability,
    Acquisition,
    Tare,
    Delivery,
}

/// Thresholds for both policies are collected first; the policy key picks one
struct PolicyDraft {
    magnitude: bool,
    x: f32,
    y: f32,
    z: f32,
    threshold: f32,
}

/// Fallback endpoint fields may come in either order
struct FallbackDraft {
    address: Option<BdAddr>,
    channel: u8,
}

/// Parse TOML text into a configuration, starting from defaults
pub fn parse_config(input: &str) -> Result<DeviceConfig, ParseError> {
    let mut config = DeviceConfig::default();
    let mut section = Section::Root;

    let mut policy = match config.stability.policy {
        StabilityPolicy::PerAxis { x, y, z } => PolicyDraft {
            magnitude: false,
            x,
            y,
            z,
            threshold: x,
        },
        StabilityPolicy::Magnitude { threshold } => PolicyDraft {
            magnitude: true,
            x: threshold,
            y: threshold,
            z: threshold,
            threshold,
        },
    };
    let mut fallback = FallbackDraft {
        address: None,
        channel: 1,
    };

    for (index, raw_line) in input.lines().enumerate() {
        let line_no = index + 1;
        let err = |kind| ParseError {
            line: line_no,
            kind,
        };
        let line = strip_comment(raw_line).trim();

        if line.is_empty() {
            continue;
        }

        if line.starts_with('[') {
            if !line.ends_with(']') {
                return Err(err(ParseErrorKind::Syntax));
            }
            section = match line[1..line.len() - 1].trim() {
                "stability" => Section::Stability,
                "acquisition" => Section::Acquisition,
                "tare" => Section::Tare,
                "delivery" => Section::Delivery,
                _ => return Err(err(ParseErrorKind::UnknownSection)),
            };
            continue;
        }

        let (key, value) = parse_key_value(line).ok_or(err(ParseErrorKind::Syntax))?;

        let applied = match section {
            Section::Root => Err(ParseErrorKind::UnknownKey),
            Section::Stability => apply_stability(&mut config, &mut policy, key, value),
            Section::Acquisition => apply_acquisition(&mut config, key, value),
            Section::Tare => apply_tare(&mut config, key, value),
            Section::Delivery => apply_delivery(&mut config, &mut fallback, key, value),
        };
        applied.map_err(err)?;
    }

    config.stability.policy = if policy.magnitude {
        StabilityPolicy::Magnitude {
            threshold: policy.threshold,
        }
    } else {
        StabilityPolicy::PerAxis {
            x: policy.x,
            y: policy.y,
            z: policy.z,
        }
    };

    if let Some(address) = fallback.address {
        config.delivery.fallback = Some(PeerEndpoint {
            address,
            channel: fallback.channel,
        });
    }

    Ok(config)
}

fn apply_stability(
    config: &mut DeviceConfig,
    policy: &mut PolicyDraft,
    key: &str,
    value: &str,
) -> Result<(), ParseErrorKind> {
    let stability = &mut config.stability;
    match key {
        "policy" => {
            policy.magnitude = match parse_string(value)? {
                "per_axis" => false,
                "magnitude" => true,
                _ => return Err(ParseErrorKind::InvalidValue),
            }
        }
        "threshold_x" => policy.x = parse_num(value)?,
        "threshold_y" => policy.y = parse_num(value)?,
        "threshold_z" => policy.z = parse_num(value)?,
        "threshold" => policy.threshold = parse_num(value)?,
        "required_duration_ms" => stability.required_duration_ms = parse_num(value)?,
        "sample_interval_ms" => stability.sample_interval_ms = parse_num(value)?,
        "error_backoff_ms" => stability.error_backoff_ms = parse_num(value)?,
        "status_interval_ms" => stability.status_interval_ms = parse_num(value)?,
        _ => return Err(ParseErrorKind::UnknownKey),
    }
    Ok(())
}

fn apply_acquisition(config: &mut DeviceConfig, key: &str, value: &str) -> Result<(), ParseErrorKind> {
    let acquisition = &mut config.acquisition;
    match key {
        "window_ms" => acquisition.window_ms = parse_num(value)?,
        "sample_interval_ms" => acquisition.sample_interval_ms = parse_num(value)?,
        "sanity_bound" => acquisition.sanity_bound = parse_num(value)?,
        "post_trigger_pause_ms" => acquisition.post_trigger_pause_ms = parse_num(value)?,
        _ => return Err(ParseErrorKind::UnknownKey),
    }
    Ok(())
}

fn apply_tare(config: &mut DeviceConfig, key: &str, value: &str) -> Result<(), ParseErrorKind> {
    let tare = &mut config.tare;
    match key {
        "samples" => tare.samples = parse_num(value)?,
        "sample_interval_ms" => tare.sample_interval_ms = parse_num(value)?,
        "power_cycle_ms" => tare.power_cycle_ms = parse_num(value)?,
        "default_reference_unit" => tare.default_reference_unit = parse_num(value)?,
        "capture_baseline" => tare.capture_baseline = parse_bool(value)?,
        "baseline_capture_delay_ms" => tare.baseline_capture_delay_ms = parse_num(value)?,
        _ => return Err(ParseErrorKind::UnknownKey),
    }
    Ok(())
}

fn apply_delivery(
    config: &mut DeviceConfig,
    fallback: &mut FallbackDraft,
    key: &str,
    value: &str,
) -> Result<(), ParseErrorKind> {
    let delivery = &mut config.delivery;
    match key {
        "mode" => {
            delivery.mode = match parse_string(value)? {
                "inbound" => LinkMode::Inbound,
                "outbound" => LinkMode::Outbound,
                _ => return Err(ParseErrorKind::InvalidValue),
            }
        }
        "service" => {
            delivery.service =
                ServiceUuid::parse(parse_string(value)?).ok_or(ParseErrorKind::InvalidValue)?
        }
        "fallback_address" => {
            fallback.address =
                Some(BdAddr::parse(parse_string(value)?).ok_or(ParseErrorKind::InvalidValue)?)
        }
        "fallback_channel" => fallback.channel = parse_num(value)?,
        "ack_timeout_ms" => delivery.ack_timeout_ms = parse_num(value)?,
        "accept_timeout_ms" => delivery.accept_timeout_ms = parse_num(value)?,
        "handshake" => delivery.handshake = parse_bool(value)?,
        _ => return Err(ParseErrorKind::UnknownKey),
    }
    Ok(())
}

/// Drop a trailing `#` comment that is not inside a string
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let value = value.trim();
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Parse a quoted string value
fn parse_string(value: &str) -> Result<&str, ParseErrorKind> {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .ok_or(ParseErrorKind::InvalidValue)
}

/// Parse a number, allowing `_` digit separators
///
/// Integer targets reject fractional input.
fn parse_num<T: core::str::FromStr>(value: &str) -> Result<T, ParseErrorKind> {
    let mut digits: String<32> = String::new();
    for c in value.chars().filter(|&c| c != '_') {
        digits.push(c).map_err(|_| ParseErrorKind::InvalidValue)?;
    }
    digits.parse().map_err(|_| ParseErrorKind::InvalidValue)
}

fn parse_bool(value: &str) -> Result<bool, ParseErrorKind> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ParseErrorKind::InvalidValue),
    }
}
