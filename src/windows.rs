// ==============================================================================
// windows.rs - Window Partitioning
// ==============================================================================
// Description: Fixed-size, interval-restricted and explicit window lists
//              (0-based, half-open)
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::config::ConfigError;
use crate::models::Window;
use crate::store::RangeError;

/// Either a configuration problem (fatal for the run) or a range problem
/// (fatal for one contig)
#[derive(Error, Debug)]
pub enum WindowError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Range(#[from] RangeError),
}

/// How windows are laid out on each contig
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum WindowSpec {
    /// Contiguous windows of `size` bp, optionally restricted to one interval
    Fixed {
        size: u64,
        #[serde(default)]
        interval: Option<Window>,
    },
    /// Per-contig window lists (e.g. from a BED file)
    Explicit { windows: BTreeMap<String, Vec<Window>> },
}

impl WindowSpec {
    pub fn fixed(size: u64) -> Self {
        WindowSpec::Fixed {
            size,
            interval: None,
        }
    }

    /// Windows for one contig of the given length
    ///
    /// Contigs without explicit windows resolve to an empty list.
    pub fn resolve(&self, contig: &str, contig_length: u64) -> Result<Vec<Window>, WindowError> {
        match self {
            WindowSpec::Fixed {
                size,
                interval: None,
            } => Ok(windows(contig_length, *size)?),
            WindowSpec::Fixed {
                size,
                interval: Some(interval),
            } => windows_in_interval(contig, contig_length, *interval, *size),
            WindowSpec::Explicit { windows } => {
                let Some(list) = windows.get(contig) else {
                    return Ok(Vec::new());
                };
                let validated = explicit(list)?;
                if let Some(last) = validated.last() {
                    if last.end > contig_length {
                        return Err(RangeError::OutOfBounds {
                            contig: contig.to_string(),
                            start: last.start,
                            end: last.end,
                            length: contig_length,
                        }
                        .into());
                    }
                }
                Ok(validated)
            }
        }
    }

    /// Fixed window size, if any
    pub fn window_size(&self) -> Option<u64> {
        match self {
            WindowSpec::Fixed { size, .. } => Some(*size),
            WindowSpec::Explicit { .. } => None,
        }
    }
}

/// Partition `[0, contig_length)` into contiguous windows of `window_size` bp
///
/// # Arguments
/// * `contig_length` - Contig length in bp
/// * `window_size` - Window size in bp (> 0)
///
/// # Returns
/// * Windows covering the contig; the last one is shorter when the length
///   is not a multiple of the window size
pub fn windows(contig_length: u64, window_size: u64) -> Result<Vec<Window>, ConfigError> {
    fixed_windows(0, contig_length, window_size)
}

/// Fixed windows restricted to `interval` on a single contig
///
/// Windows start at `interval.start`; the last one is clipped to `interval.end`.
pub fn windows_in_interval(
    contig: &str,
    contig_length: u64,
    interval: Window,
    window_size: u64,
) -> Result<Vec<Window>, WindowError> {
    if interval.is_empty() {
        return Err(ConfigError::InvalidInterval {
            start: interval.start,
            end: interval.end,
        }
        .into());
    }

    if interval.end > contig_length {
        return Err(RangeError::OutOfBounds {
            contig: contig.to_string(),
            start: interval.start,
            end: interval.end,
            length: contig_length,
        }
        .into());
    }

    Ok(fixed_windows(interval.start, interval.end, window_size)?)
}

fn fixed_windows(start: u64, end: u64, window_size: u64) -> Result<Vec<Window>, ConfigError> {
    if window_size == 0 {
        return Err(ConfigError::InvalidWindowSize(window_size));
    }

    let mut result = Vec::with_capacity(((end.saturating_sub(start)) / window_size + 1) as usize);
    let mut cursor = start;
    while cursor < end {
        let stop = cursor.saturating_add(window_size).min(end);
        result.push(Window::new(cursor, stop));
        cursor = stop;
    }

    Ok(result)
}

/// Validate an explicit window list
///
/// Windows must be non-empty, ascending and non-overlapping; gaps are allowed.
pub fn explicit(list: &[Window]) -> Result<Vec<Window>, ConfigError> {
    for (idx, window) in list.iter().enumerate() {
        if window.is_empty() {
            return Err(ConfigError::EmptyWindow {
                start: window.start,
                end: window.end,
            });
        }

        if idx > 0 {
            let previous = list[idx - 1];
            if window.start < previous.start {
                return Err(ConfigError::WindowsUnsorted {
                    previous: previous.to_string(),
                    next: window.to_string(),
                });
            }
            if window.start < previous.end {
                return Err(ConfigError::WindowsOverlap {
                    first: previous.to_string(),
                    second: window.to_string(),
                });
            }
        }
    }

    Ok(list.to_vec())
}
