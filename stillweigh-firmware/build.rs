//! Build script for stillweigh-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates device.toml at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Value kinds a key accepts
#[derive(Clone, Copy)]
enum Kind {
    /// Non-negative integer no larger than the bound
    Int(i64),
    /// Finite number (integer or float) that must be positive
    Positive,
    Bool,
    /// String restricted to the listed values (empty = any)
    Str(&'static [&'static str]),
}

const STABILITY: &[(&str, Kind)] = &[
    ("policy", Kind::Str(&["per_axis", "magnitude"])),
    ("threshold_x", Kind::Positive),
    ("threshold_y", Kind::Positive),
    ("threshold_z", Kind::Positive),
    ("threshold", Kind::Positive),
    ("required_duration_ms", Kind::Int(u32::MAX as i64)),
    ("sample_interval_ms", Kind::Int(u32::MAX as i64)),
    ("error_backoff_ms", Kind::Int(u32::MAX as i64)),
    ("status_interval_ms", Kind::Int(u32::MAX as i64)),
];

const ACQUISITION: &[(&str, Kind)] = &[
    ("window_ms", Kind::Int(u32::MAX as i64)),
    ("sample_interval_ms", Kind::Int(u32::MAX as i64)),
    ("sanity_bound", Kind::Positive),
    ("post_trigger_pause_ms", Kind::Int(u32::MAX as i64)),
];

const TARE: &[(&str, Kind)] = &[
    ("samples", Kind::Int(64)),
    ("sample_interval_ms", Kind::Int(u32::MAX as i64)),
    ("power_cycle_ms", Kind::Int(u32::MAX as i64)),
    ("default_reference_unit", Kind::Positive),
    ("capture_baseline", Kind::Bool),
    ("baseline_capture_delay_ms", Kind::Int(u32::MAX as i64)),
];

const DELIVERY: &[(&str, Kind)] = &[
    ("mode", Kind::Str(&["inbound", "outbound"])),
    ("service", Kind::Str(&[])),
    ("fallback_address", Kind::Str(&[])),
    ("fallback_channel", Kind::Int(30)),
    ("ack_timeout_ms", Kind::Int(u32::MAX as i64)),
    ("accept_timeout_ms", Kind::Int(u32::MAX as i64)),
    ("handshake", Kind::Bool),
];

const SECTIONS: &[(&str, &[(&str, Kind)])] = &[
    ("stability", STABILITY),
    ("acquisition", ACQUISITION),
    ("tare", TARE),
    ("delivery", DELIVERY),
];

/// Validate device.toml configuration at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=device.toml");

    let config_path = Path::new("device.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: device.toml not found!                                   ║\n\
            ║                                                                  ║\n\
            ║  The firmware embeds device.toml as its default configuration.   ║\n\
            ║  Please create one in the stillweigh-firmware directory.         ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read device.toml                               ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in device.toml                       ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                {}\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let mut errors = validate_sections(&config);
    errors.extend(validate_delivery(&config));
    errors.extend(validate_window(&config));

    if !errors.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: Invalid device.toml                                      ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            errors
                .iter()
                .map(|e| format!("║  • {:<62} ║", e))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }

    println!("cargo:warning=device.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Known sections only, known keys only, each with the right type
fn validate_sections(config: &toml::Value) -> Vec<String> {
    let mut errors = Vec::new();

    let root = match config.as_table() {
        Some(t) => t,
        None => return vec!["document must be a table".to_string()],
    };

    for (name, section) in root {
        let keys = match SECTIONS.iter().find(|(s, _)| *s == name.as_str()) {
            Some((_, keys)) => keys,
            None => {
                errors.push(format!("unknown section [{}]", name));
                continue;
            }
        };
        let table = match section.as_table() {
            Some(t) => t,
            None => {
                errors.push(format!("[{}] must be a table", name));
                continue;
            }
        };

        for (key, value) in table {
            match keys.iter().find(|(k, _)| *k == key.as_str()) {
                Some((_, kind)) => {
                    if let Err(e) = check_value(*kind, value) {
                        errors.push(format!("[{}] {}: {}", name, key, e));
                    }
                }
                None => errors.push(format!("[{}] unknown key '{}'", name, key)),
            }
        }
    }

    errors
}

fn check_value(kind: Kind, value: &toml::Value) -> Result<(), String> {
    match (kind, value) {
        (Kind::Int(max), toml::Value::Integer(v)) => {
            if *v < 0 || *v > max {
                Err(format!("must be 0-{}", max))
            } else {
                Ok(())
            }
        }
        (Kind::Positive, toml::Value::Integer(v)) if *v > 0 => Ok(()),
        (Kind::Positive, toml::Value::Float(v)) if v.is_finite() && *v > 0.0 => Ok(()),
        (Kind::Positive, _) => Err("must be a positive number".to_string()),
        (Kind::Bool, toml::Value::Boolean(_)) => Ok(()),
        (Kind::Str(allowed), toml::Value::String(s)) => {
            if allowed.is_empty() || allowed.contains(&s.as_str()) {
                Ok(())
            } else {
                Err(format!("must be one of {:?}", allowed))
            }
        }
        (Kind::Int(_), _) => Err("must be an integer".to_string()),
        (Kind::Bool, _) => Err("must be true or false".to_string()),
        (Kind::Str(_), _) => Err("must be a quoted string".to_string()),
    }
}

/// Acquisition buffer holds this many samples
const MAX_WINDOW_SAMPLES: i64 = 128;

/// Window must fit the acquisition buffer at the configured rate
fn validate_window(config: &toml::Value) -> Vec<String> {
    let acquisition = config.get("acquisition");
    let int = |key: &str, default: i64| {
        acquisition
            .and_then(|a| a.get(key))
            .and_then(|v| v.as_integer())
            .unwrap_or(default)
    };
    let window = int("window_ms", 3_000);
    let interval = int("sample_interval_ms", 100);
    if interval <= 0 {
        return vec!["[acquisition] sample_interval_ms must be positive".to_string()];
    }
    let samples = (window + interval - 1) / interval;
    if samples > MAX_WINDOW_SAMPLES {
        return vec![format!(
            "[acquisition] window_ms / sample_interval_ms = {} exceeds {} samples",
            samples, MAX_WINDOW_SAMPLES
        )];
    }
    Vec::new()
}

/// Identifier formats the firmware parser accepts
fn validate_delivery(config: &toml::Value) -> Vec<String> {
    let mut errors = Vec::new();
    let delivery = match config.get("delivery").and_then(|d| d.as_table()) {
        Some(t) => t,
        None => return errors,
    };

    if let Some(toml::Value::String(uuid)) = delivery.get("service") {
        let groups: Vec<&str> = uuid.split('-').collect();
        let lens: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        let hex = groups
            .iter()
            .all(|g| g.chars().all(|c| c.is_ascii_hexdigit()));
        if lens != [8, 4, 4, 4, 12] || !hex {
            errors.push(format!("[delivery] service '{}' is not a UUID", uuid));
        }
    }

    if let Some(toml::Value::String(addr)) = delivery.get("fallback_address") {
        let parts: Vec<&str> = addr.split(':').collect();
        let ok = parts.len() == 6
            && parts
                .iter()
                .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()));
        if !ok {
            errors.push(format!(
                "[delivery] fallback_address '{}' is not AA:BB:CC:DD:EE:FF",
                addr
            ));
        }
    }

    if delivery.get("mode").and_then(|m| m.as_str()) == Some("outbound")
        && delivery.get("fallback_address").is_none()
    {
        println!("cargo:warning=outbound mode without fallback_address relies on discovery");
    }

    errors
}
