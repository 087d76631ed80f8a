//! Configuration validation.
//!
//! Validates all config fields before a replay starts.

use crate::domain::error::ReplayError;
use crate::ports::config_port::ConfigPort;

pub fn validate_replay_config(config: &dyn ConfigPort) -> Result<(), ReplayError> {
    validate_interval(config)?;
    validate_split(config)?;
    validate_overlay(config)?;
    validate_chart(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> ReplayError {
    ReplayError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_interval(config: &dyn ConfigPort) -> Result<(), ReplayError> {
    let Some(raw) = config.get_string("replay", "interval_ms") else {
        return Ok(());
    };
    match raw.trim().parse::<i64>() {
        Ok(ms) if ms >= 0 => Ok(()),
        Ok(_) => Err(invalid(
            "replay",
            "interval_ms",
            "interval_ms must be non-negative",
        )),
        Err(_) => Err(invalid(
            "replay",
            "interval_ms",
            "interval_ms must be an integer",
        )),
    }
}

fn validate_split(config: &dyn ConfigPort) -> Result<(), ReplayError> {
    if let Some(raw) = config.get_string("replay", "split_ratio") {
        match raw.trim().parse::<f64>() {
            Ok(r) if (0.0..=1.0).contains(&r) => {}
            _ => {
                return Err(invalid(
                    "replay",
                    "split_ratio",
                    "split_ratio must be between 0 and 1",
                ));
            }
        }
    }
    if let Some(raw) = config.get_string("replay", "split_gap") {
        if raw.trim().parse::<usize>().is_err() {
            return Err(invalid(
                "replay",
                "split_gap",
                "split_gap must be a non-negative integer",
            ));
        }
    }
    Ok(())
}

fn validate_overlay(config: &dyn ConfigPort) -> Result<(), ReplayError> {
    if !config.get_bool("overlay", "enabled", true) {
        return Ok(());
    }
    for key in ["name", "shape", "color"] {
        if let Some(value) = config.get_string("overlay", key) {
            if value.trim().is_empty() {
                return Err(invalid("overlay", key, "must not be empty"));
            }
        }
    }
    let size = config.get_double("overlay", "shape_size", 0.3);
    if size <= 0.0 {
        return Err(invalid(
            "overlay",
            "shape_size",
            "shape_size must be positive",
        ));
    }
    if let Some(raw) = config.get_string("overlay", "line_width") {
        if raw.trim().parse::<u32>().is_err() {
            return Err(invalid(
                "overlay",
                "line_width",
                "line_width must be a non-negative integer",
            ));
        }
    }
    Ok(())
}

fn validate_chart(config: &dyn ConfigPort) -> Result<(), ReplayError> {
    if let Some(id) = config.get_string("chart", "id") {
        if !is_js_identifier(id.trim()) {
            return Err(invalid(
                "chart",
                "id",
                "id must be a JavaScript identifier",
            ));
        }
    }
    for key in ["volume_up_color", "volume_down_color"] {
        if let Some(value) = config.get_string("chart", key) {
            if value.trim().is_empty() {
                return Err(invalid("chart", key, "must not be empty"));
            }
        }
    }
    Ok(())
}

pub fn is_js_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
