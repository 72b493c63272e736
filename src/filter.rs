// ==============================================================================
// filter.rs - Site and Genotype Filtration
// ==============================================================================
// Description: Masks low-quality calls and excludes sites before any
//              statistic sees them, so every statistic shares one
//              classification of each site
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Per site, in order:
//   1. Not a target site                        → Excluded(NotTargeted)
//   2. Variant class not invariant/biallelic    → Excluded(VariantClass)
//   3. Per analyzed call: no-call, low depth, low GQ → call masked missing
//   4. Missing proportion > max_missing_proportion → Excluded(TooMuchMissing)
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Range};

use crate::config::{FilterConfig, MissingHandling};
use crate::genotype::{Genotype, MISSING_ALLELE};
use crate::models::VariantClass;
use crate::populations::ResolvedPopulations;
use crate::store::GenotypeSlice;

/// Why a site was removed from every statistic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExclusionReason {
    NotTargeted,
    VariantClass,
    TooMuchMissing,
}

/// Classification of one site after filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteStatus {
    Retained,
    Excluded(ExclusionReason),
}

/// Why a single call was masked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingReason {
    NoCall,
    LowDepth,
    LowQuality,
}

/// Call and site counts collected while filtering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterTally {
    pub usable_calls: u64,
    pub missing_no_call: u64,
    pub missing_low_depth: u64,
    pub missing_low_quality: u64,
    pub retained_sites: u64,
    pub excluded_not_targeted: u64,
    pub excluded_variant_class: u64,
    pub excluded_too_much_missing: u64,
}

impl FilterTally {
    pub fn excluded_sites(&self) -> u64 {
        self.excluded_not_targeted + self.excluded_variant_class + self.excluded_too_much_missing
    }

    fn record_missing(&mut self, reason: MissingReason) {
        match reason {
            MissingReason::NoCall => self.missing_no_call += 1,
            MissingReason::LowDepth => self.missing_low_depth += 1,
            MissingReason::LowQuality => self.missing_low_quality += 1,
        }
    }

    fn record_exclusion(&mut self, reason: ExclusionReason) {
        match reason {
            ExclusionReason::NotTargeted => self.excluded_not_targeted += 1,
            ExclusionReason::VariantClass => self.excluded_variant_class += 1,
            ExclusionReason::TooMuchMissing => self.excluded_too_much_missing += 1,
        }
    }
}

impl Add for FilterTally {
    type Output = FilterTally;

    fn add(self, rhs: FilterTally) -> FilterTally {
        FilterTally {
            usable_calls: self.usable_calls + rhs.usable_calls,
            missing_no_call: self.missing_no_call + rhs.missing_no_call,
            missing_low_depth: self.missing_low_depth + rhs.missing_low_depth,
            missing_low_quality: self.missing_low_quality + rhs.missing_low_quality,
            retained_sites: self.retained_sites + rhs.retained_sites,
            excluded_not_targeted: self.excluded_not_targeted + rhs.excluded_not_targeted,
            excluded_variant_class: self.excluded_variant_class + rhs.excluded_variant_class,
            excluded_too_much_missing: self.excluded_too_much_missing
                + rhs.excluded_too_much_missing,
        }
    }
}

impl AddAssign for FilterTally {
    fn add_assign(&mut self, rhs: FilterTally) {
        *self = *self + rhs;
    }
}

/// Genotype slice after filtration
///
/// Masked calls of analyzed samples hold `MISSING_ALLELE`; calls of samples
/// outside every population are left untouched and never read.
#[derive(Debug, Clone)]
pub struct FilteredSlice {
    pub contig: String,
    pub n_samples: usize,
    pub ploidy: usize,
    pub positions: Vec<u64>,
    pub status: Vec<SiteStatus>,
    pub alleles: Vec<i16>,
    pub tally: FilterTally,
}

impl FilteredSlice {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn is_retained(&self, site: usize) -> bool {
        self.status[site] == SiteStatus::Retained
    }

    pub fn genotype(&self, site: usize, sample: usize) -> Genotype<'_> {
        let start = (site * self.n_samples + sample) * self.ploidy;
        Genotype::from_alleles(&self.alleles[start..start + self.ploidy])
    }

    /// Index range of the sites with `start <= position < end`
    pub fn site_range(&self, start: u64, end: u64) -> Range<usize> {
        let lo = self.positions.partition_point(|&p| p < start);
        let hi = self.positions.partition_point(|&p| p < end);
        lo..hi.max(lo)
    }
}

/// Apply filtration to a fetched slice
///
/// Missingness is measured within each population; a site where any
/// population exceeds `max_missing_proportion` is excluded for every statistic.
///
/// # Arguments
/// * `slice` - Columnar calls from the store
/// * `config` - Filter thresholds
/// * `populations` - Populations resolved against the store's sample columns
///
/// # Returns
/// * Filtered slice with per-site status and the tally for this slice
pub fn filter(
    slice: &GenotypeSlice,
    config: &FilterConfig,
    populations: &ResolvedPopulations,
) -> FilteredSlice {
    let ploidy = slice.ploidy;
    let mut alleles = slice.alleles.clone();
    let mut status = Vec::with_capacity(slice.len());
    let mut tally = FilterTally::default();

    for site in 0..slice.len() {
        let position = slice.positions[site];

        // 1. Target sites
        if let Some(targets) = &config.target_sites {
            if !targets.contains(&slice.contig, position) {
                exclude(&mut status, &mut tally, ExclusionReason::NotTargeted);
                continue;
            }
        }

        // 2. Variant class
        if config.biallelic_snps_only
            && !matches!(
                slice.classes[site],
                VariantClass::Invariant | VariantClass::BiallelicSnp
            )
        {
            exclude(&mut status, &mut tally, ExclusionReason::VariantClass);
            continue;
        }

        // 3. Per-call masking
        let mut site_tally = FilterTally::default();
        for &sample in populations.analyzed_samples() {
            let start = (site * slice.n_samples + sample) * ploidy;
            let call = &mut alleles[start..start + ploidy];

            match check_call(call, slice.depth(site, sample), slice.quality(site, sample), config) {
                None => site_tally.usable_calls += 1,
                Some(reason) => {
                    call.fill(MISSING_ALLELE);
                    site_tally.record_missing(reason);
                }
            }
        }
        tally += site_tally;

        // 4. Site missingness within each population
        let row = &alleles[site * slice.n_samples * ploidy..(site + 1) * slice.n_samples * ploidy];
        let too_much_missing = populations.populations().iter().any(|population| {
            missing_proportion(row, ploidy, &population.sample_indices)
                > config.max_missing_proportion
        });
        if too_much_missing {
            exclude(&mut status, &mut tally, ExclusionReason::TooMuchMissing);
            continue;
        }

        status.push(SiteStatus::Retained);
        tally.retained_sites += 1;
    }

    FilteredSlice {
        contig: slice.contig.clone(),
        n_samples: slice.n_samples,
        ploidy,
        positions: slice.positions.clone(),
        status,
        alleles,
        tally,
    }
}

/// Fraction of `samples` whose masked call in `row` is missing
fn missing_proportion(row: &[i16], ploidy: usize, samples: &[usize]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let missing = samples
        .iter()
        .filter(|&&sample| row[sample * ploidy..(sample + 1) * ploidy].iter().any(|&a| a < 0))
        .count();
    missing as f64 / samples.len() as f64
}

fn exclude(status: &mut Vec<SiteStatus>, tally: &mut FilterTally, reason: ExclusionReason) {
    status.push(SiteStatus::Excluded(reason));
    tally.record_exclusion(reason);
}

/// Decide whether a call is usable; may rewrite a no-call to reference
fn check_call(
    call: &mut [i16],
    depth: Option<u32>,
    quality: Option<f32>,
    config: &FilterConfig,
) -> Option<MissingReason> {
    if call.iter().any(|&a| a < 0) {
        match config.missing_handling {
            MissingHandling::Exclude => return Some(MissingReason::NoCall),
            MissingHandling::AsReference => call.fill(0),
        }
    }

    if config.min_depth > 0 && depth.map_or(true, |d| d < config.min_depth) {
        return Some(MissingReason::LowDepth);
    }

    if config.min_genotype_quality > 0.0
        && quality.map_or(true, |q| q < config.min_genotype_quality)
    {
        return Some(MissingReason::LowQuality);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Site, StatKind};
    use crate::parsers::sites::TargetSites;
    use crate::populations::PopulationMap;
    use std::sync::Arc;

    const N: usize = 4;

    fn site(position: u64, class: VariantClass, alleles: Vec<i16>) -> Site {
        Site {
            contig: "chr1".to_string(),
            position,
            ref_allele: "A".to_string(),
            alt_alleles: vec![],
            class,
            alleles,
            depths: vec![Some(20), Some(3), None, Some(20)],
            qualities: vec![Some(99.0), Some(99.0), Some(99.0), Some(10.0)],
        }
    }

    fn slice(sites: &[Site]) -> GenotypeSlice {
        let mut slice = GenotypeSlice::new("chr1", N, 2);
        for s in sites {
            slice.push_site(s).unwrap();
        }
        slice
    }

    fn sample_names() -> Vec<String> {
        (0..N).map(|i| format!("s{}", i)).collect()
    }

    /// Populations from (name, store columns) groups over samples s0..s3
    fn groups(groups: &[(&str, &[usize])]) -> ResolvedPopulations {
        let names = sample_names();
        PopulationMap::from_assignments(groups.iter().flat_map(|(population, columns)| {
            columns
                .iter()
                .map(|&c| (names[c].clone(), population.to_string()))
                .collect::<Vec<_>>()
        }))
        .unwrap()
        .resolve(&names, &[StatKind::Pi])
        .unwrap()
    }

    fn all() -> ResolvedPopulations {
        groups(&[("P", &[0, 1, 2, 3])])
    }

    #[test]
    fn test_default_filter_keeps_called_sites() {
        let s = slice(&[site(0, VariantClass::BiallelicSnp, vec![0, 1, 0, 0, 1, 1, 0, 0])]);
        let out = filter(&s, &FilterConfig::default(), &all());

        assert!(out.is_retained(0));
        assert_eq!(out.tally.usable_calls, 4);
        assert_eq!(out.genotype(0, 0), Genotype::Called(&[0, 1]));
    }

    #[test]
    fn test_max_missing_exclusion() {
        // 3 of 4 samples missing, 0.75 > 0.5
        let s = slice(&[site(0, VariantClass::Invariant, vec![0, 0, -1, -1, -1, -1, -1, -1])]);
        let config = FilterConfig {
            max_missing_proportion: 0.5,
            ..FilterConfig::default()
        };

        let out = filter(&s, &config, &all());
        assert_eq!(out.status[0], SiteStatus::Excluded(ExclusionReason::TooMuchMissing));
        assert_eq!(out.tally.missing_no_call, 3);
        assert_eq!(out.tally.excluded_too_much_missing, 1);
    }

    #[test]
    fn test_missing_proportion_at_threshold_is_kept() {
        // 2 of 4 missing, 0.5 is not strictly greater than 0.5
        let s = slice(&[site(0, VariantClass::Invariant, vec![0, 0, 0, 0, -1, -1, -1, -1])]);
        let config = FilterConfig {
            max_missing_proportion: 0.5,
            ..FilterConfig::default()
        };
        assert!(filter(&s, &config, &all()).is_retained(0));
    }

    #[test]
    fn test_missingness_counts_only_analyzed_samples() {
        let s = slice(&[site(0, VariantClass::Invariant, vec![0, 0, 0, 0, -1, -1, -1, -1])]);
        let config = FilterConfig {
            max_missing_proportion: 0.0,
            ..FilterConfig::default()
        };

        assert!(!filter(&s, &config, &all()).is_retained(0));
        assert!(filter(&s, &config, &groups(&[("P", &[0, 1])])).is_retained(0));
    }

    #[test]
    fn test_missingness_is_measured_per_population() {
        // A = {s0, s1} fully missing, B = {s2, s3} fully called: pooled 0.5, A alone 1.0
        let s = slice(&[site(0, VariantClass::BiallelicSnp, vec![-1, -1, -1, -1, 0, 0, 0, 1])]);
        let config = FilterConfig {
            max_missing_proportion: 0.5,
            ..FilterConfig::default()
        };
        let two = groups(&[("A", &[0, 1]), ("B", &[2, 3])]);

        let out = filter(&s, &config, &two);
        assert_eq!(out.status[0], SiteStatus::Excluded(ExclusionReason::TooMuchMissing));
        assert_eq!(out.tally.excluded_too_much_missing, 1);
        assert_eq!(out.tally.missing_no_call, 2);
        assert_eq!(out.tally.usable_calls, 2);

        // Same calls as one population stay within the limit
        assert!(filter(&s, &config, &all()).is_retained(0));
    }

    #[test]
    fn test_any_population_over_limit_excludes_site() {
        // A has 1 of 2 missing (0.5), B none; pooled proportion is 0.25
        let s = slice(&[site(0, VariantClass::Invariant, vec![0, 0, -1, -1, 0, 0, 0, 0])]);
        let two = groups(&[("A", &[0, 1]), ("B", &[2, 3])]);

        let at_limit = FilterConfig {
            max_missing_proportion: 0.5,
            ..FilterConfig::default()
        };
        assert!(filter(&s, &at_limit, &two).is_retained(0));

        let below = FilterConfig {
            max_missing_proportion: 0.4,
            ..FilterConfig::default()
        };
        assert_eq!(
            filter(&s, &below, &two).status[0],
            SiteStatus::Excluded(ExclusionReason::TooMuchMissing)
        );
        assert!(filter(&s, &below, &all()).is_retained(0));
    }

    #[test]
    fn test_masked_calls_count_toward_population_missingness() {
        // s1 fails depth (3) and s2 has no depth; each population loses one call
        let s = slice(&[site(0, VariantClass::BiallelicSnp, vec![0, 1, 0, 1, 0, 1, 0, 1])]);
        let config = FilterConfig {
            min_depth: 10,
            max_missing_proportion: 0.4,
            ..FilterConfig::default()
        };

        let out = filter(&s, &config, &groups(&[("A", &[0, 1]), ("B", &[2, 3])]));
        assert_eq!(out.status[0], SiteStatus::Excluded(ExclusionReason::TooMuchMissing));
        assert_eq!(out.tally.missing_low_depth, 2);
    }

    #[test]
    fn test_depth_and_quality_masking() {
        let s = slice(&[site(0, VariantClass::BiallelicSnp, vec![0, 1, 0, 1, 0, 1, 0, 1])]);
        let config = FilterConfig {
            min_depth: 10,
            min_genotype_quality: 20.0,
            ..FilterConfig::default()
        };

        let out = filter(&s, &config, &all());
        assert_eq!(out.genotype(0, 0), Genotype::Called(&[0, 1]));
        // depth 3
        assert!(out.genotype(0, 1).is_missing());
        // absent depth fails a positive threshold
        assert!(out.genotype(0, 2).is_missing());
        // GQ 10
        assert!(out.genotype(0, 3).is_missing());
        assert_eq!(out.tally.missing_low_depth, 2);
        assert_eq!(out.tally.missing_low_quality, 1);
        assert_eq!(out.tally.usable_calls, 1);
    }

    #[test]
    fn test_missing_as_reference() {
        let s = slice(&[site(0, VariantClass::BiallelicSnp, vec![0, 1, -1, -1, 1, 1, 0, 0])]);
        let config = FilterConfig {
            missing_handling: MissingHandling::AsReference,
            ..FilterConfig::default()
        };

        let out = filter(&s, &config, &all());
        assert_eq!(out.genotype(0, 1), Genotype::Called(&[0, 0]));
        assert_eq!(out.tally.missing_no_call, 0);
    }

    #[test]
    fn test_variant_class_exclusion() {
        let s = slice(&[
            site(0, VariantClass::MultiallelicSnp, vec![0; 8]),
            site(1, VariantClass::Other, vec![0; 8]),
            site(2, VariantClass::Invariant, vec![0; 8]),
        ]);

        let out = filter(&s, &FilterConfig::default(), &all());
        assert_eq!(out.status[0], SiteStatus::Excluded(ExclusionReason::VariantClass));
        assert_eq!(out.status[1], SiteStatus::Excluded(ExclusionReason::VariantClass));
        assert!(out.is_retained(2));

        let config = FilterConfig {
            biallelic_snps_only: false,
            ..FilterConfig::default()
        };
        let out = filter(&s, &config, &all());
        assert!(out.status.iter().all(|s| *s == SiteStatus::Retained));
    }

    #[test]
    fn test_target_sites() {
        let s = slice(&[
            site(10, VariantClass::Invariant, vec![0; 8]),
            site(11, VariantClass::Invariant, vec![0; 8]),
        ]);
        let config = FilterConfig {
            target_sites: Some(Arc::new(TargetSites::from_positions(vec![("chr1", 11)]))),
            ..FilterConfig::default()
        };

        let out = filter(&s, &config, &all());
        assert_eq!(out.status[0], SiteStatus::Excluded(ExclusionReason::NotTargeted));
        assert!(out.is_retained(1));
        assert_eq!(out.tally.excluded_sites(), 1);
        assert_eq!(out.tally.retained_sites, 1);
    }
}
