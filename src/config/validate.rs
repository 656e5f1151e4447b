// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BatchflowError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::BatchflowError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let timeout = raw
            .executor
            .command_timeout
            .as_deref()
            .map(parse_duration)
            .transpose()
            .map_err(|e| {
                BatchflowError::ConfigError(format!("[executor].command_timeout: {e}"))
            })?;
        Ok(ConfigFile::new_unchecked(raw.executor, raw.flow, timeout))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_workers(cfg)?;
    validate_flow_section(cfg)?;
    Ok(())
}

fn validate_workers(cfg: &RawConfigFile) -> Result<()> {
    let exec = &cfg.executor;

    if exec.min_workers == 0 {
        return Err(BatchflowError::ConfigError(
            "[executor].min_workers must be >= 1 (got 0)".to_string(),
        ));
    }

    if exec.max_workers < exec.min_workers {
        return Err(BatchflowError::ConfigError(format!(
            "[executor].max_workers ({}) must be >= min_workers ({})",
            exec.max_workers, exec.min_workers
        )));
    }

    Ok(())
}

fn validate_flow_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.flow.max_depth == Some(0) {
        return Err(BatchflowError::ConfigError(
            "[flow].max_depth must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;

    let secs_per_unit = match unit_part.trim().to_lowercase().as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        unit => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{}' is too large", s))
}
