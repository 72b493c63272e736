// ==============================================================================
// sites.rs - Target Sites Parser
// ==============================================================================
// Description: Parser for target-site lists restricting which sites are counted
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Format: tab-separated, no header, 1-based positions
// Example:
//   chr1	1001
//   chr1	1002
//   chr2	57
// ==============================================================================

use csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::config::ConfigError;

/// Target sites per contig (0-based positions, sorted, deduplicated)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSites {
    sites: HashMap<String, Vec<u64>>,
}

impl TargetSites {
    /// Build from (contig, 0-based position) pairs
    pub fn from_positions<I, S>(positions: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let mut sites: HashMap<String, Vec<u64>> = HashMap::new();
        for (contig, position) in positions {
            sites.entry(contig.into()).or_default().push(position);
        }
        for list in sites.values_mut() {
            list.sort_unstable();
            list.dedup();
        }
        Self { sites }
    }

    pub fn contains(&self, contig: &str, position: u64) -> bool {
        self.sites
            .get(contig)
            .map(|list| list.binary_search(&position).is_ok())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.sites.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contigs(&self) -> impl Iterator<Item = &str> {
        self.sites.keys().map(String::as_str)
    }
}

/// Target sites file parser
pub struct SitesParser;

impl SitesParser {
    /// Parse a sites file
    ///
    /// # Arguments
    /// * `path` - Path to a `chrom<TAB>pos` file (1-based positions)
    ///
    /// # Returns
    /// * `Ok(TargetSites)` - Sites converted to 0-based positions
    /// * `Err(ConfigError)` - Unreadable file or malformed line
    pub fn parse(path: impl AsRef<Path>) -> Result<TargetSites, ConfigError> {
        let path = path.as_ref();
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .from_path(path)
            .map_err(|e| ConfigError::from_csv(path, e))?;

        let mut positions = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| ConfigError::from_csv(path, e))?;
            let line = record.position().map(|p| p.line() as usize).unwrap_or(0);

            let invalid = |details: String| ConfigError::InvalidFormat {
                path: path.display().to_string(),
                line,
                details,
            };

            let contig = record
                .get(0)
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .ok_or_else(|| invalid("missing contig".to_string()))?;
            let pos_text = record
                .get(1)
                .map(str::trim)
                .ok_or_else(|| invalid("missing position".to_string()))?;
            let position: u64 = pos_text
                .parse()
                .map_err(|_| invalid(format!("invalid position '{}'", pos_text)))?;
            if position == 0 {
                return Err(invalid("positions are 1-based".to_string()));
            }

            positions.push((contig.to_string(), position - 1));
        }

        let sites = TargetSites::from_positions(positions);
        info!("Loaded {} target sites from {:?}", sites.len(), path);
        Ok(sites)
    }
}
