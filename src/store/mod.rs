// ==============================================================================
// store/mod.rs - Genotype Store Interface
// ==============================================================================
// Description: Range-read access to columnar genotype calls plus the
//              builder interface used during ingestion
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

pub mod memory;
pub mod sqlite;

pub use memory::{MemoryStore, MemoryStoreBuilder};
pub use sqlite::{SqliteStore, SqliteStoreBuilder};

use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;

use crate::models::{Site, VariantClass};

/// Contig name and length
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContigInfo {
    pub name: String,
    pub length: u64,
}

/// Requested range cannot be served for a contig
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("Unknown contig '{0}'")]
    UnknownContig(String),

    #[error("Range [{start}, {end}) is outside contig '{contig}' (length {length})")]
    OutOfBounds {
        contig: String,
        start: u64,
        end: u64,
        length: u64,
    },
}

/// Store-level errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Range(#[from] RangeError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt store: {0}")]
    Corrupt(String),

    #[error("Site {contig}:{position} has {found} calls, expected {expected}")]
    CallCountMismatch {
        contig: String,
        position: u64,
        found: usize,
        expected: usize,
    },

    #[error("Store builder used before begin()")]
    NotStarted,
}

/// Columnar genotype calls for the sites of one contig range
///
/// `alleles` is site-major: each site holds `n_samples × ploidy` alleles,
/// `-1` for a missing allele. `depths` and `qualities` hold one entry per
/// (site, sample).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenotypeSlice {
    pub contig: String,
    pub n_samples: usize,
    pub ploidy: usize,
    pub positions: Vec<u64>,
    pub classes: Vec<VariantClass>,
    pub alleles: Vec<i16>,
    pub depths: Vec<Option<u32>>,
    pub qualities: Vec<Option<f32>>,
}

impl GenotypeSlice {
    pub fn new(contig: impl Into<String>, n_samples: usize, ploidy: usize) -> Self {
        Self {
            contig: contig.into(),
            n_samples,
            ploidy,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Alleles of one sample's call at one site
    pub fn call(&self, site: usize, sample: usize) -> &[i16] {
        let start = (site * self.n_samples + sample) * self.ploidy;
        &self.alleles[start..start + self.ploidy]
    }

    pub fn depth(&self, site: usize, sample: usize) -> Option<u32> {
        self.depths[site * self.n_samples + sample]
    }

    pub fn quality(&self, site: usize, sample: usize) -> Option<f32> {
        self.qualities[site * self.n_samples + sample]
    }

    /// Index range of the sites with `start <= position < end`
    pub fn site_range(&self, start: u64, end: u64) -> Range<usize> {
        let lo = self.positions.partition_point(|&p| p < start);
        let hi = self.positions.partition_point(|&p| p < end);
        lo..hi.max(lo)
    }

    /// Append a site; its call arrays must match this slice's shape
    pub fn push_site(&mut self, site: &Site) -> Result<(), StoreError> {
        let expected = self.n_samples * self.ploidy;
        if site.alleles.len() != expected
            || site.depths.len() != self.n_samples
            || site.qualities.len() != self.n_samples
        {
            return Err(StoreError::CallCountMismatch {
                contig: site.contig.clone(),
                position: site.position,
                found: site.alleles.len(),
                expected,
            });
        }

        self.positions.push(site.position);
        self.classes.push(site.class);
        self.alleles.extend_from_slice(&site.alleles);
        self.depths.extend_from_slice(&site.depths);
        self.qualities.extend_from_slice(&site.qualities);
        Ok(())
    }

    /// Copy of the sites in `range` (site indices)
    pub fn sub_slice(&self, range: Range<usize>) -> GenotypeSlice {
        let calls = self.n_samples * self.ploidy;
        GenotypeSlice {
            contig: self.contig.clone(),
            n_samples: self.n_samples,
            ploidy: self.ploidy,
            positions: self.positions[range.clone()].to_vec(),
            classes: self.classes[range.clone()].to_vec(),
            alleles: self.alleles[range.start * calls..range.end * calls].to_vec(),
            depths: self.depths[range.start * self.n_samples..range.end * self.n_samples].to_vec(),
            qualities: self.qualities[range.start * self.n_samples..range.end * self.n_samples]
                .to_vec(),
        }
    }
}

/// Read access to genotype calls by contig range
///
/// Implementations are shared between blocking worker tasks and must never
/// hand the same underlying connection to two readers at once.
pub trait GenotypeStore: Send + Sync {
    /// Sample names in column order
    fn samples(&self) -> &[String];

    /// Ploidy of the stored calls
    fn ploidy(&self) -> usize;

    /// Contigs in store order
    fn contigs(&self) -> Vec<ContigInfo>;

    fn contig_length(&self, contig: &str) -> Result<u64, RangeError> {
        self.contigs()
            .into_iter()
            .find(|c| c.name == contig)
            .map(|c| c.length)
            .ok_or_else(|| RangeError::UnknownContig(contig.to_string()))
    }

    /// Every stored site in `[start, end)`, ordered by position
    fn fetch(&self, contig: &str, start: u64, end: u64) -> Result<GenotypeSlice, StoreError>;
}

/// Check a fetch range against the contig length
pub fn check_range(contig: &str, start: u64, end: u64, length: u64) -> Result<(), RangeError> {
    if start >= end || end > length {
        return Err(RangeError::OutOfBounds {
            contig: contig.to_string(),
            start,
            end,
            length,
        });
    }
    Ok(())
}

/// Receives sites during ingestion and produces a store
pub trait StoreBuilder {
    type Store: GenotypeStore;

    /// Declare samples and header contigs; must precede `push_site`
    fn begin(&mut self, samples: &[String], contigs: &[ContigInfo]) -> Result<(), StoreError>;

    fn push_site(&mut self, site: Site) -> Result<(), StoreError>;

    fn finish(self) -> Result<Self::Store, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(position: u64, alleles: Vec<i16>) -> Site {
        Site {
            contig: "chr1".to_string(),
            position,
            ref_allele: "A".to_string(),
            alt_alleles: vec![".".to_string()],
            class: VariantClass::Invariant,
            alleles,
            depths: vec![Some(10), None],
            qualities: vec![Some(30.0), None],
        }
    }

    #[test]
    fn test_slice_accessors() {
        let mut slice = GenotypeSlice::new("chr1", 2, 2);
        slice.push_site(&site(5, vec![0, 0, 0, 1])).unwrap();
        slice.push_site(&site(9, vec![1, 1, -1, -1])).unwrap();

        assert_eq!(slice.len(), 2);
        assert_eq!(slice.call(0, 1), &[0, 1]);
        assert_eq!(slice.call(1, 1), &[-1, -1]);
        assert_eq!(slice.depth(1, 0), Some(10));
        assert_eq!(slice.quality(0, 1), None);
    }

    #[test]
    fn test_site_range_binary_search() {
        let mut slice = GenotypeSlice::new("chr1", 2, 2);
        for pos in [0, 10, 20, 30] {
            slice.push_site(&site(pos, vec![0; 4])).unwrap();
        }

        assert_eq!(slice.site_range(0, 10), 0..1);
        assert_eq!(slice.site_range(5, 25), 1..3);
        assert_eq!(slice.site_range(31, 40), 4..4);

        let sub = slice.sub_slice(slice.site_range(10, 30));
        assert_eq!(sub.positions, vec![10, 20]);
        assert_eq!(sub.alleles.len(), 8);
        assert_eq!(sub.depths.len(), 4);
    }

    #[test]
    fn test_push_site_shape_mismatch() {
        let mut slice = GenotypeSlice::new("chr1", 2, 2);
        assert!(matches!(
            slice.push_site(&site(1, vec![0, 0])),
            Err(StoreError::CallCountMismatch { .. })
        ));
    }

    #[test]
    fn test_check_range() {
        assert!(check_range("chr1", 0, 100, 100).is_ok());
        assert!(check_range("chr1", 50, 50, 100).is_err());
        assert!(check_range("chr1", 0, 101, 100).is_err());
    }
}
