// ==============================================================================
// bed.rs - BED Window Parser
// ==============================================================================
// Description: Parser for explicit window lists in BED format
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Format: tab-separated chrom, start, end; extra columns ignored
// Example:
//   chr1	0	500
//   chr1	500	1000
//   chr2	100	900
// Lines starting with "track", "browser" or "#" are skipped.
//
// Coordinates:
//   Standard BED is 0-based half-open and is used as is: "chr1 0 500" covers
//   VCF POS 1..=500. pixy window files are 1-based inclusive ("chr1 1 500"
//   for the same bases); read them with BedCoordinates::OneBasedInclusive,
//   otherwise every window shifts by one base.
// ==============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::config::ConfigError;
use crate::models::Window;

/// Coordinate convention of a window file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BedCoordinates {
    /// Standard BED: 0-based start, exclusive end
    #[default]
    ZeroBasedHalfOpen,

    /// pixy-style: 1-based start, inclusive end
    OneBasedInclusive,
}

/// BED window file parser
pub struct BedParser;

impl BedParser {
    /// Parse a standard (0-based, half-open) BED file into per-contig window lists
    ///
    /// Window ordering and overlap are validated later by
    /// `windows::explicit`, so unsorted files are reported there.
    pub fn parse(path: impl AsRef<Path>) -> Result<BTreeMap<String, Vec<Window>>, ConfigError> {
        Self::parse_with(path, BedCoordinates::ZeroBasedHalfOpen)
    }

    /// Parse a window file in the given coordinate convention, in file order
    ///
    /// Returned windows are always 0-based half-open.
    pub fn parse_with(
        path: impl AsRef<Path>,
        coordinates: BedCoordinates,
    ) -> Result<BTreeMap<String, Vec<Window>>, ConfigError> {
        let path = path.as_ref();
        debug!("Reading windows from {:?} ({:?})", path, coordinates);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .from_path(path)
            .map_err(|e| ConfigError::from_csv(path, e))?;

        let mut windows: BTreeMap<String, Vec<Window>> = BTreeMap::new();
        let mut count = 0usize;

        for (idx, record) in reader.records().enumerate() {
            let record = record.map_err(|e| ConfigError::from_csv(path, e))?;
            let line = record.position().map(|p| p.line() as usize).unwrap_or(idx + 1);

            let first = record.get(0).map(str::trim).unwrap_or("");
            if (first.is_empty() && record.len() <= 1)
                || first.starts_with("track")
                || first.starts_with("browser")
            {
                continue;
            }

            let (contig, window) = Self::parse_record(&record, line, path, coordinates)?;
            windows.entry(contig).or_default().push(window);
            count += 1;
        }

        info!(
            "Loaded {} windows on {} contigs from {:?}",
            count,
            windows.len(),
            path
        );
        Ok(windows)
    }

    fn parse_record(
        record: &csv::StringRecord,
        line: usize,
        path: &Path,
        coordinates: BedCoordinates,
    ) -> Result<(String, Window), ConfigError> {
        let invalid = |details: String| ConfigError::InvalidFormat {
            path: path.display().to_string(),
            line,
            details,
        };

        if record.len() < 3 {
            return Err(invalid(format!(
                "expected at least 3 tab-separated fields, found {}",
                record.len()
            )));
        }

        let field = |i: usize| record.get(i).map(str::trim).unwrap_or("");
        let start: u64 = field(1)
            .parse()
            .map_err(|_| invalid(format!("invalid start '{}'", field(1))))?;
        let end: u64 = field(2)
            .parse()
            .map_err(|_| invalid(format!("invalid end '{}'", field(2))))?;

        let start = match coordinates {
            BedCoordinates::ZeroBasedHalfOpen => start,
            BedCoordinates::OneBasedInclusive => start
                .checked_sub(1)
                .ok_or_else(|| invalid("1-based start must be at least 1".to_string()))?,
        };

        Ok((field(0).to_string(), Window::new(start, end)))
    }
}
