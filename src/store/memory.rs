// ==============================================================================
// store/memory.rs - In-Memory Genotype Store
// ==============================================================================
// Description: Per-contig sorted columnar arrays with binary-search range reads
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use std::collections::HashMap;
use tracing::{debug, warn};

use super::{check_range, ContigInfo, GenotypeSlice, GenotypeStore, RangeError, StoreBuilder, StoreError};
use crate::models::Site;

/// Genotype store held entirely in memory
#[derive(Debug, Clone)]
pub struct MemoryStore {
    samples: Vec<String>,
    ploidy: usize,
    contigs: Vec<ContigInfo>,
    data: HashMap<String, GenotypeSlice>,
}

impl MemoryStore {
    /// Build a store directly from a list of sites
    pub fn from_sites(
        samples: Vec<String>,
        ploidy: usize,
        contigs: Vec<ContigInfo>,
        sites: impl IntoIterator<Item = Site>,
    ) -> Result<Self, StoreError> {
        let mut builder = MemoryStoreBuilder::new(ploidy);
        builder.begin(&samples, &contigs)?;
        for site in sites {
            builder.push_site(site)?;
        }
        builder.finish()
    }

    /// Number of stored sites across all contigs
    pub fn site_count(&self) -> usize {
        self.data.values().map(GenotypeSlice::len).sum()
    }
}

impl GenotypeStore for MemoryStore {
    fn samples(&self) -> &[String] {
        &self.samples
    }

    fn ploidy(&self) -> usize {
        self.ploidy
    }

    fn contigs(&self) -> Vec<ContigInfo> {
        self.contigs.clone()
    }

    fn fetch(&self, contig: &str, start: u64, end: u64) -> Result<GenotypeSlice, StoreError> {
        let length = self.contig_length(contig)?;
        check_range(contig, start, end, length)?;

        match self.data.get(contig) {
            Some(slice) => Ok(slice.sub_slice(slice.site_range(start, end))),
            None => Ok(GenotypeSlice::new(contig, self.samples.len(), self.ploidy)),
        }
    }
}

/// Collects ingested sites into a `MemoryStore`
pub struct MemoryStoreBuilder {
    ploidy: usize,
    samples: Option<Vec<String>>,
    contigs: Vec<ContigInfo>,
    data: HashMap<String, GenotypeSlice>,
    unsorted: Vec<String>,
    duplicates: u64,
}

impl MemoryStoreBuilder {
    pub fn new(ploidy: usize) -> Self {
        Self {
            ploidy,
            samples: None,
            contigs: Vec::new(),
            data: HashMap::new(),
            unsorted: Vec::new(),
            duplicates: 0,
        }
    }
}

impl StoreBuilder for MemoryStoreBuilder {
    type Store = MemoryStore;

    fn begin(&mut self, samples: &[String], contigs: &[ContigInfo]) -> Result<(), StoreError> {
        self.samples = Some(samples.to_vec());
        self.contigs = contigs.to_vec();
        Ok(())
    }

    fn push_site(&mut self, site: Site) -> Result<(), StoreError> {
        let n_samples = self.samples.as_ref().ok_or(StoreError::NotStarted)?.len();

        if !self.contigs.iter().any(|c| c.name == site.contig) {
            self.contigs.push(ContigInfo {
                name: site.contig.clone(),
                length: 0,
            });
        }

        let slice = self
            .data
            .entry(site.contig.clone())
            .or_insert_with(|| GenotypeSlice::new(site.contig.clone(), n_samples, self.ploidy));

        if let Some(&last) = slice.positions.last() {
            if last == site.position {
                self.duplicates += 1;
                return Ok(());
            }
            if last > site.position && !self.unsorted.contains(&site.contig) {
                self.unsorted.push(site.contig.clone());
            }
        }

        slice.push_site(&site)
    }

    fn finish(mut self) -> Result<MemoryStore, StoreError> {
        let samples = self.samples.ok_or(StoreError::NotStarted)?;

        for contig in &self.unsorted {
            if let Some(slice) = self.data.get_mut(contig) {
                debug!("Sorting out-of-order sites on {}", contig);
                let (sorted, dropped) = sort_slice(slice);
                self.duplicates += dropped;
                *slice = sorted;
            }
        }

        if self.duplicates > 0 {
            warn!("Ignored {} duplicate site records (first record kept)", self.duplicates);
        }

        for info in &mut self.contigs {
            if info.length == 0 {
                info.length = self
                    .data
                    .get(&info.name)
                    .and_then(|s| s.positions.last())
                    .map(|p| p + 1)
                    .unwrap_or(0);
            }
        }

        Ok(MemoryStore {
            samples,
            ploidy: self.ploidy,
            contigs: self.contigs,
            data: self.data,
        })
    }
}

/// Stable sort by position; later duplicates are dropped
fn sort_slice(slice: &GenotypeSlice) -> (GenotypeSlice, u64) {
    let mut order: Vec<usize> = (0..slice.len()).collect();
    order.sort_by_key(|&i| slice.positions[i]);

    let mut sorted = GenotypeSlice::new(slice.contig.clone(), slice.n_samples, slice.ploidy);
    let mut dropped = 0;
    for idx in order {
        if sorted.positions.last() == Some(&slice.positions[idx]) {
            dropped += 1;
            continue;
        }
        let single = slice.sub_slice(idx..idx + 1);
        sorted.positions.extend(single.positions);
        sorted.classes.extend(single.classes);
        sorted.alleles.extend(single.alleles);
        sorted.depths.extend(single.depths);
        sorted.qualities.extend(single.qualities);
    }
    (sorted, dropped)
}
