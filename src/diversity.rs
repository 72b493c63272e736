// ==============================================================================
// diversity.rs - Pairwise Diversity Engine
// ==============================================================================
// Description: Raw pairwise-difference and comparison counts for nucleotide
//              diversity (pi) and divergence (dxy) from filtered calls
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Counts are built from per-site tallies (genotype classes and allele counts
// per population), never by visiting every sample pair, and stay exact in
// u64 arithmetic.
//
// Genotype convention (comparison = pair of samples):
//   pi:  comparisons = C(n, 2)      differences = Σ_{g<h} c_g c_h d(g, h)
//   dxy: comparisons = n_P n_Q      differences = Σ_g Σ_h c_{P,g} c_{Q,h} d(g, h)
//   d(g, h) = ploidy - |g ∩ h|   (multiset intersection)
//
// Haplotype convention (comparison = pair of called haplotypes):
//   pi:  comparisons = C(k, 2)      differences = Σ_{a<b} c_a c_b
//   dxy: comparisons = k_P k_Q      differences = k_P k_Q - Σ_a c_{P,a} c_{Q,a}
//
// n = called samples, k = called haplotypes, c = class / allele counts.
// ==============================================================================

use std::ops::Range;

use crate::filter::FilteredSlice;
use crate::genotype::{allelic_differences, genotype_key, Allele, DiffConvention, Genotype};
use crate::models::RawCounts;

/// Called genotypes of one population at one site
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationTally {
    /// Population size (called or not)
    pub n_samples: u64,
    /// Samples with a usable call
    pub called: u64,
    /// Sorted-allele genotype class → sample count
    genotypes: Vec<(Vec<Allele>, u64)>,
    /// Allele → haplotype count
    alleles: Vec<(Allele, u64)>,
}

impl PopulationTally {
    /// Tally the calls of `samples` at `site`
    pub fn from_site(slice: &FilteredSlice, site: usize, samples: &[usize]) -> Self {
        let mut tally = PopulationTally {
            n_samples: samples.len() as u64,
            ..Default::default()
        };

        for &sample in samples {
            if let Genotype::Called(call) = slice.genotype(site, sample) {
                tally.called += 1;

                let key = genotype_key(call);
                match tally.genotypes.iter_mut().find(|(g, _)| *g == key) {
                    Some((_, count)) => *count += 1,
                    None => tally.genotypes.push((key, 1)),
                }

                for &allele in call {
                    match tally.alleles.iter_mut().find(|(a, _)| *a == allele) {
                        Some((_, count)) => *count += 1,
                        None => tally.alleles.push((allele, 1)),
                    }
                }
            }
        }

        tally
    }

    fn called_haplotypes(&self) -> u64 {
        self.alleles.iter().map(|(_, c)| c).sum()
    }
}

fn choose2(n: u64) -> u64 {
    n * n.saturating_sub(1) / 2
}

/// π counts of one population at one site
///
/// Populations with fewer than two samples never produce comparisons.
pub fn pi_site(tally: &PopulationTally, ploidy: usize, convention: DiffConvention) -> RawCounts {
    if tally.n_samples < 2 {
        return RawCounts::default();
    }

    let (differences, comparisons, possible) = match convention {
        DiffConvention::Genotype => {
            let mut differences = 0u64;
            for (i, (g, cg)) in tally.genotypes.iter().enumerate() {
                for (h, ch) in &tally.genotypes[i + 1..] {
                    differences += cg * ch * allelic_differences(g, h);
                }
            }
            (differences, choose2(tally.called), choose2(tally.n_samples))
        }
        DiffConvention::Haplotype => {
            let k = tally.called_haplotypes();
            let same: u64 = tally.alleles.iter().map(|(_, c)| choose2(*c)).sum();
            let comparisons = choose2(k);
            (
                comparisons - same,
                comparisons,
                choose2(tally.n_samples * ploidy as u64),
            )
        }
    };

    RawCounts {
        differences,
        comparisons,
        missing_comparisons: possible - comparisons,
        sites: u64::from(comparisons > 0),
    }
}

/// d_xy counts between two populations at one site
pub fn dxy_site(
    p: &PopulationTally,
    q: &PopulationTally,
    ploidy: usize,
    convention: DiffConvention,
) -> RawCounts {
    let (differences, comparisons, possible) = match convention {
        DiffConvention::Genotype => {
            let mut differences = 0u64;
            for (g, cg) in &p.genotypes {
                for (h, ch) in &q.genotypes {
                    differences += cg * ch * allelic_differences(g, h);
                }
            }
            (differences, p.called * q.called, p.n_samples * q.n_samples)
        }
        DiffConvention::Haplotype => {
            let kp = p.called_haplotypes();
            let kq = q.called_haplotypes();
            let same: u64 = p
                .alleles
                .iter()
                .map(|(a, cp)| {
                    q.alleles
                        .iter()
                        .find(|(b, _)| b == a)
                        .map_or(0, |(_, cq)| cp * cq)
                })
                .sum();
            let ploidy = ploidy as u64;
            (
                kp * kq - same,
                kp * kq,
                p.n_samples * ploidy * q.n_samples * ploidy,
            )
        }
    };

    RawCounts {
        differences,
        comparisons,
        missing_comparisons: possible - comparisons,
        sites: u64::from(comparisons > 0),
    }
}

/// Σ π counts over the retained sites in `range`
///
/// # Arguments
/// * `slice` - Filtered calls
/// * `range` - Site indices (see `FilteredSlice::site_range`)
/// * `samples` - Store column indices of the population
/// * `convention` - Difference convention
pub fn pi_counts(
    slice: &FilteredSlice,
    range: Range<usize>,
    samples: &[usize],
    convention: DiffConvention,
) -> RawCounts {
    range
        .filter(|&site| slice.is_retained(site))
        .map(|site| {
            let tally = PopulationTally::from_site(slice, site, samples);
            pi_site(&tally, slice.ploidy, convention)
        })
        .sum()
}

/// Σ d_xy counts over the retained sites in `range`
pub fn dxy_counts(
    slice: &FilteredSlice,
    range: Range<usize>,
    p_samples: &[usize],
    q_samples: &[usize],
    convention: DiffConvention,
) -> RawCounts {
    range
        .filter(|&site| slice.is_retained(site))
        .map(|site| {
            let p = PopulationTally::from_site(slice, site, p_samples);
            let q = PopulationTally::from_site(slice, site, q_samples);
            dxy_site(&p, &q, slice.ploidy, convention)
        })
        .sum()
}
