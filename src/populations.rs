// ==============================================================================
// populations.rs - Population Map
// ==============================================================================
// Description: Loads sample → population assignments and resolves them
//              against the samples present in the genotype store
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// File format (tab-separated, no header):
//   sample_id<TAB>population
// ==============================================================================

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

use crate::config::ConfigError;
use crate::models::StatKind;

/// Named, disjoint, non-empty sample sets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulationMap {
    populations: BTreeMap<String, Vec<String>>,
}

impl PopulationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (sample, population) assignments
    ///
    /// Repeating the same assignment is harmless; assigning a sample to a
    /// second population is an error.
    pub fn from_assignments<I, S, P>(assignments: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (S, P)>,
        S: Into<String>,
        P: Into<String>,
    {
        let mut map = Self::new();
        let mut seen: HashMap<String, String> = HashMap::new();

        for (sample, population) in assignments {
            let sample = sample.into();
            let population = population.into();

            if let Some(existing) = seen.get(&sample) {
                if *existing != population {
                    return Err(ConfigError::OverlappingPopulations {
                        sample,
                        first: existing.clone(),
                        second: population,
                    });
                }
                continue;
            }

            seen.insert(sample.clone(), population.clone());
            map.populations.entry(population).or_default().push(sample);
        }

        Ok(map)
    }

    /// Build from explicit groups, rejecting empty and overlapping groups
    pub fn from_groups(groups: BTreeMap<String, Vec<String>>) -> Result<Self, ConfigError> {
        if let Some((name, _)) = groups.iter().find(|(_, samples)| samples.is_empty()) {
            return Err(ConfigError::EmptyPopulation(name.clone()));
        }

        Self::from_assignments(
            groups
                .into_iter()
                .flat_map(|(pop, samples)| samples.into_iter().map(move |s| (s, pop.clone()))),
        )
    }

    /// Load a populations file (`sample<TAB>population` per line)
    ///
    /// # Arguments
    /// * `path` - Path to the populations file
    ///
    /// # Returns
    /// * `Ok(PopulationMap)` - Parsed, validated map
    /// * `Err(ConfigError)` - Unreadable file, malformed line or overlapping assignment
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading populations from {:?}", path);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .from_path(path)
            .map_err(|e| ConfigError::from_csv(path, e))?;

        let mut assignments = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record.map_err(|e| ConfigError::from_csv(path, e))?;
            let line = record.position().map(|p| p.line() as usize).unwrap_or(idx + 1);

            let sample = record.get(0).map(str::trim).unwrap_or("");
            let population = record.get(1).map(str::trim).unwrap_or("");

            if sample.is_empty() && record.len() <= 1 {
                continue;
            }
            if sample.is_empty() || population.is_empty() {
                return Err(ConfigError::InvalidFormat {
                    path: path.display().to_string(),
                    line,
                    details: "expected 'sample<TAB>population'".to_string(),
                });
            }

            assignments.push((sample.to_string(), population.to_string()));
        }

        let map = Self::from_assignments(assignments)?;
        if map.is_empty() {
            return Err(ConfigError::NoPopulations);
        }

        info!(
            "Loaded {} populations ({} samples)",
            map.len(),
            map.populations.values().map(Vec::len).sum::<usize>()
        );
        Ok(map)
    }

    pub fn len(&self) -> usize {
        self.populations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.populations.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.populations.keys().map(String::as_str)
    }

    pub fn samples(&self, population: &str) -> Option<&[String]> {
        self.populations.get(population).map(Vec::as_slice)
    }

    /// Map sample names to store column indices
    ///
    /// # Arguments
    /// * `store_samples` - Sample names in store column order
    /// * `stats` - Requested statistics (d_xy needs two populations)
    pub fn resolve(
        &self,
        store_samples: &[String],
        stats: &[StatKind],
    ) -> Result<ResolvedPopulations, ConfigError> {
        if self.is_empty() {
            return Err(ConfigError::NoPopulations);
        }
        if stats.contains(&StatKind::Dxy) && self.len() < 2 {
            return Err(ConfigError::TooFewPopulations(self.len()));
        }

        let column: HashMap<&str, usize> = store_samples
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.as_str(), idx))
            .collect();

        let mut populations = Vec::with_capacity(self.len());
        for (name, samples) in &self.populations {
            let mut indices = Vec::with_capacity(samples.len());
            for sample in samples {
                let idx = column.get(sample.as_str()).copied().ok_or_else(|| {
                    ConfigError::UnknownSample {
                        sample: sample.clone(),
                        population: name.clone(),
                    }
                })?;
                indices.push(idx);
            }
            indices.sort_unstable();

            debug!("Population {}: {} samples", name, indices.len());
            populations.push(Population {
                name: name.clone(),
                sample_indices: indices,
            });
        }

        let mut analyzed: Vec<usize> = populations
            .iter()
            .flat_map(|p| p.sample_indices.iter().copied())
            .collect();
        analyzed.sort_unstable();

        Ok(ResolvedPopulations {
            populations,
            analyzed,
        })
    }
}

/// A population with its store column indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Population {
    pub name: String,
    pub sample_indices: Vec<usize>,
}

/// Populations resolved against a store, in name order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPopulations {
    populations: Vec<Population>,
    analyzed: Vec<usize>,
}

impl ResolvedPopulations {
    pub fn populations(&self) -> &[Population] {
        &self.populations
    }

    /// Union of all population members (store column indices, ascending)
    pub fn analyzed_samples(&self) -> &[usize] {
        &self.analyzed
    }

    /// Unordered population pairs (i, j) with i < j, in name order
    pub fn pairs(&self) -> Vec<(usize, usize)> {
        let n = self.populations.len();
        (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .collect()
    }
}
