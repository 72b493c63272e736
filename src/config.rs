// ==============================================================================
// config.rs - Run Configuration
// ==============================================================================
// Description: Immutable run configuration (windows, filters, statistics,
//              ploidy, concurrency) with validation
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::genotype::DiffConvention;
use crate::models::StatKind;
use crate::parsers::sites::TargetSites;
use crate::windows::{self, WindowSpec};

/// Default bp per store read
pub const DEFAULT_CHUNK_SIZE: u64 = 100_000;

/// Configuration errors; all are fatal and raised before any computation
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Window size must be greater than zero (got {0})")]
    InvalidWindowSize(u64),

    #[error("Windows overlap: {first} and {second}")]
    WindowsOverlap { first: String, second: String },

    #[error("Windows are not in ascending order: {previous} followed by {next}")]
    WindowsUnsorted { previous: String, next: String },

    #[error("Empty window [{start}, {end})")]
    EmptyWindow { start: u64, end: u64 },

    #[error("Invalid interval [{start}, {end})")]
    InvalidInterval { start: u64, end: u64 },

    #[error("An interval can only be used with exactly one contig")]
    IntervalWithMultipleContigs,

    #[error("Sample '{sample}' is assigned to both '{first}' and '{second}'")]
    OverlappingPopulations {
        sample: String,
        first: String,
        second: String,
    },

    #[error("Population '{0}' has no samples")]
    EmptyPopulation(String),

    #[error("Sample '{sample}' of population '{population}' is not present in the genotype data")]
    UnknownSample { sample: String, population: String },

    #[error("d_xy requires at least two populations (found {0})")]
    TooFewPopulations(usize),

    #[error("No populations defined")]
    NoPopulations,

    #[error("max_missing_proportion must be within [0, 1] (got {0})")]
    InvalidMissingProportion(f64),

    #[error("Ploidy must be at least 1 (got {0})")]
    InvalidPloidy(usize),

    #[error("Genotype store holds ploidy {store} calls but the run expects ploidy {run}")]
    StorePloidyMismatch { store: usize, run: usize },

    #[error("No statistics requested")]
    NoStatistics,

    #[error("chunk_size must be greater than zero")]
    InvalidChunkSize,

    #[error("threads must be at least 1")]
    InvalidThreads,

    #[error("Invalid format in {path} at line {line}: {details}")]
    InvalidFormat {
        path: String,
        line: usize,
        details: String,
    },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration file {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Map a csv reader error on `path` to `Io` or `InvalidFormat`
    pub fn from_csv(path: &Path, err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line() as usize).unwrap_or(0);
        match err.into_kind() {
            csv::ErrorKind::Io(source) => ConfigError::Io {
                path: path.display().to_string(),
                source,
            },
            kind => ConfigError::InvalidFormat {
                path: path.display().to_string(),
                line,
                details: format!("{:?}", kind),
            },
        }
    }
}

/// How raw no-calls are treated by the site filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingHandling {
    /// No-calls are missing
    #[default]
    Exclude,
    /// No-calls become homozygous-reference calls
    AsReference,
}

/// Per-call and per-site filtration thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub min_depth: u32,

    pub min_genotype_quality: f32,

    /// Sites whose missing proportion among analyzed samples is strictly
    /// greater than this are excluded
    pub max_missing_proportion: f64,

    pub missing_handling: MissingHandling,

    /// Keep only invariant sites and biallelic SNPs
    pub biallelic_snps_only: bool,

    /// Optional list of target sites (chrom<TAB>pos, 1-based)
    pub sites_file: Option<PathBuf>,

    #[serde(skip)]
    pub target_sites: Option<Arc<TargetSites>>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_depth: 0,
            min_genotype_quality: 0.0,
            max_missing_proportion: 1.0,
            missing_handling: MissingHandling::Exclude,
            biallelic_snps_only: true,
            sites_file: None,
            target_sites: None,
        }
    }
}

/// Contigs to process
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContigSelection {
    /// Every contig in store order
    #[default]
    All,
    /// Listed contigs in the given order
    List(Vec<String>),
}

/// Immutable configuration of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub windows: WindowSpec,
    pub filter: FilterConfig,
    pub stats: Vec<StatKind>,
    pub ploidy: usize,
    pub diff_convention: DiffConvention,
    pub chunk_size: u64,
    pub threads: usize,
    pub contigs: ContigSelection,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            windows: WindowSpec::fixed(10_000),
            filter: FilterConfig::default(),
            stats: vec![StatKind::Pi, StatKind::Dxy],
            ploidy: 2,
            diff_convention: DiffConvention::Genotype,
            chunk_size: DEFAULT_CHUNK_SIZE,
            threads: default_threads(),
            contigs: ContigSelection::All,
        }
    }
}

/// Available parallelism, or 1 when it cannot be determined
pub fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl RunConfig {
    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn wants(&self, kind: StatKind) -> bool {
        self.stats.contains(&kind)
    }

    /// Check every setting that does not depend on the genotype data
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.windows {
            WindowSpec::Fixed { size, interval } => {
                if *size == 0 {
                    return Err(ConfigError::InvalidWindowSize(*size));
                }
                if let Some(interval) = interval {
                    if interval.is_empty() {
                        return Err(ConfigError::InvalidInterval {
                            start: interval.start,
                            end: interval.end,
                        });
                    }
                    match &self.contigs {
                        ContigSelection::List(list) if list.len() == 1 => {}
                        _ => return Err(ConfigError::IntervalWithMultipleContigs),
                    }
                }
            }
            WindowSpec::Explicit { windows: per_contig } => {
                for list in per_contig.values() {
                    windows::explicit(list)?;
                }
            }
        }

        let max_missing = self.filter.max_missing_proportion;
        if !(0.0..=1.0).contains(&max_missing) {
            return Err(ConfigError::InvalidMissingProportion(max_missing));
        }

        if self.ploidy == 0 {
            return Err(ConfigError::InvalidPloidy(self.ploidy));
        }

        if self.stats.is_empty() {
            return Err(ConfigError::NoStatistics);
        }

        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }

        if self.threads == 0 {
            return Err(ConfigError::InvalidThreads);
        }

        Ok(())
    }
}
