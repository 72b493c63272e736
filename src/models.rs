// ==============================================================================
// models.rs - Diversity Data Models
// ==============================================================================
// Description: Sites, windows, raw pairwise counts and per-window statistic
//              records shared by every stage of the pipeline
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use thiserror::Error;

/// Variant class of a site, derived from its REF/ALT alleles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantClass {
    /// No alternate allele (ALT is "." or only the gVCF <NON_REF> marker)
    Invariant,
    /// One single-base alternate allele
    BiallelicSnp,
    /// Several single-base alternate alleles
    MultiallelicSnp,
    /// Indels, symbolic alleles, anything else
    Other,
}

impl VariantClass {
    /// Classify a site from its REF and ALT columns
    ///
    /// # Arguments
    /// * `ref_allele` - REF column
    /// * `alt_alleles` - ALT column split on ',' (empty or ["."] when invariant)
    pub fn classify(ref_allele: &str, alt_alleles: &[String]) -> Self {
        let alts: Vec<&str> = alt_alleles
            .iter()
            .map(|a| a.as_str())
            .filter(|a| *a != "." && *a != "<NON_REF>" && *a != "<*>")
            .collect();

        if alts.is_empty() {
            return if ref_allele.len() == 1 {
                VariantClass::Invariant
            } else {
                VariantClass::Other
            };
        }

        let is_base = |a: &str| a.len() == 1 && matches!(a, "A" | "C" | "G" | "T" | "N");
        if !is_base(ref_allele) || !alts.iter().all(|a| is_base(a)) {
            return VariantClass::Other;
        }

        if alts.len() == 1 {
            VariantClass::BiallelicSnp
        } else {
            VariantClass::MultiallelicSnp
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VariantClass::Invariant => "invariant",
            VariantClass::BiallelicSnp => "biallelic_snp",
            VariantClass::MultiallelicSnp => "multiallelic_snp",
            VariantClass::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "invariant" => Some(VariantClass::Invariant),
            "biallelic_snp" => Some(VariantClass::BiallelicSnp),
            "multiallelic_snp" => Some(VariantClass::MultiallelicSnp),
            "other" => Some(VariantClass::Other),
            _ => None,
        }
    }
}

/// One genotyped site as produced by ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub contig: String,

    /// 0-based position
    pub position: u64,

    pub ref_allele: String,

    pub alt_alleles: Vec<String>,

    pub class: VariantClass,

    /// Sample-major call array: `n_samples × ploidy` alleles, -1 for missing
    pub alleles: Vec<i16>,

    /// Per-sample read depth (DP), None when absent
    pub depths: Vec<Option<u32>>,

    /// Per-sample genotype quality (GQ, or RGQ for reference blocks), None when absent
    pub qualities: Vec<Option<f32>>,
}

/// Half-open `[start, end)` window on a contig (0-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Window {
    pub start: u64,
    pub end: u64,
}

impl Window {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True when `other` lies entirely inside this window
    pub fn contains(&self, other: &Window) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn contains_position(&self, position: u64) -> bool {
        self.start <= position && position < self.end
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Statistic kind; π sorts before d_xy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatKind {
    Pi,
    Dxy,
}

impl StatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatKind::Pi => "pi",
            StatKind::Dxy => "dxy",
        }
    }
}

/// Population (π) or ordered population pair (d_xy) a record describes
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GroupLabel {
    Population(String),
    /// (P, Q) with P < Q in name order
    Pair(String, String),
}

impl GroupLabel {
    /// Build a pair label in canonical (name) order
    pub fn pair(a: &str, b: &str) -> Self {
        if a <= b {
            GroupLabel::Pair(a.to_string(), b.to_string())
        } else {
            GroupLabel::Pair(b.to_string(), a.to_string())
        }
    }

    pub fn pop1(&self) -> &str {
        match self {
            GroupLabel::Population(p) => p,
            GroupLabel::Pair(p, _) => p,
        }
    }

    pub fn pop2(&self) -> Option<&str> {
        match self {
            GroupLabel::Population(_) => None,
            GroupLabel::Pair(_, q) => Some(q),
        }
    }
}

/// Raw pairwise counts for one grouping over some set of sites
///
/// Counts are summable; the ratio derived from them is not. Combining
/// windows always goes through `+` on these counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCounts {
    /// Σ allelic differences over compared pairs (numerator)
    pub differences: u64,

    /// Σ non-missing pairwise comparisons (denominator)
    pub comparisons: u64,

    /// Σ pairs that could not be compared because a call was missing
    pub missing_comparisons: u64,

    /// Sites contributing at least one comparison
    pub sites: u64,
}

impl RawCounts {
    pub fn new(differences: u64, comparisons: u64, missing_comparisons: u64, sites: u64) -> Self {
        Self {
            differences,
            comparisons,
            missing_comparisons,
            sites,
        }
    }

    /// Ratio of sums; undefined when nothing was compared
    pub fn estimate(&self) -> Estimate {
        if self.comparisons == 0 {
            Estimate::Undefined
        } else {
            Estimate::Defined(self.differences as f64 / self.comparisons as f64)
        }
    }
}

impl Add for RawCounts {
    type Output = RawCounts;

    fn add(self, rhs: RawCounts) -> RawCounts {
        RawCounts {
            differences: self.differences + rhs.differences,
            comparisons: self.comparisons + rhs.comparisons,
            missing_comparisons: self.missing_comparisons + rhs.missing_comparisons,
            sites: self.sites + rhs.sites,
        }
    }
}

impl AddAssign for RawCounts {
    fn add_assign(&mut self, rhs: RawCounts) {
        *self = *self + rhs;
    }
}

impl Sum for RawCounts {
    fn sum<I: Iterator<Item = RawCounts>>(iter: I) -> RawCounts {
        iter.fold(RawCounts::default(), Add::add)
    }
}

impl<'a> Sum<&'a RawCounts> for RawCounts {
    fn sum<I: Iterator<Item = &'a RawCounts>>(iter: I) -> RawCounts {
        iter.copied().sum()
    }
}

/// Per-window estimate; deliberately has no arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Estimate {
    Defined(f64),
    /// Denominator was zero (insufficient data)
    Undefined,
}

impl Estimate {
    pub fn value(&self) -> Option<f64> {
        match self {
            Estimate::Defined(v) => Some(*v),
            Estimate::Undefined => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Estimate::Defined(_))
    }
}

impl fmt::Display for Estimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Estimate::Defined(v) => write!(f, "{}", v),
            Estimate::Undefined => write!(f, "NA"),
        }
    }
}

/// Errors from combining records
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordMergeError {
    #[error("Cannot merge records from different groupings ({0})")]
    DifferentGrouping(String),

    #[error("Windows {first} and {second} are not adjacent")]
    NotAdjacent { first: Window, second: Window },
}

/// Raw counts for one (contig, window, statistic, population-or-pair)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStatisticRecord {
    pub contig: String,
    pub window: Window,
    pub kind: StatKind,
    pub label: GroupLabel,
    pub counts: RawCounts,
}

impl RawStatisticRecord {
    pub fn new(
        contig: impl Into<String>,
        window: Window,
        kind: StatKind,
        label: GroupLabel,
        counts: RawCounts,
    ) -> Self {
        Self {
            contig: contig.into(),
            window,
            kind,
            label,
            counts,
        }
    }

    pub fn estimate(&self) -> Estimate {
        self.counts.estimate()
    }

    pub fn is_undefined(&self) -> bool {
        !self.estimate().is_defined()
    }

    /// Combine with the record of the same grouping over the adjacent window
    ///
    /// Either order is accepted; the result spans both windows and its
    /// counts are the sum of both.
    pub fn merge(&self, other: &RawStatisticRecord) -> Result<RawStatisticRecord, RecordMergeError> {
        if self.contig != other.contig || self.kind != other.kind || self.label != other.label {
            return Err(RecordMergeError::DifferentGrouping(format!(
                "{} {} {:?} vs {} {} {:?}",
                self.contig,
                self.kind.as_str(),
                self.label,
                other.contig,
                other.kind.as_str(),
                other.label
            )));
        }

        let window = if self.window.end == other.window.start {
            Window::new(self.window.start, other.window.end)
        } else if other.window.end == self.window.start {
            Window::new(other.window.start, self.window.end)
        } else {
            return Err(RecordMergeError::NotAdjacent {
                first: self.window,
                second: other.window,
            });
        };

        Ok(RawStatisticRecord {
            contig: self.contig.clone(),
            window,
            kind: self.kind,
            label: self.label.clone(),
            counts: self.counts + other.counts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_variant_classification() {
        assert_eq!(VariantClass::classify("A", &alts(&["."])), VariantClass::Invariant);
        assert_eq!(VariantClass::classify("A", &alts(&[])), VariantClass::Invariant);
        assert_eq!(
            VariantClass::classify("A", &alts(&["<NON_REF>"])),
            VariantClass::Invariant
        );
        assert_eq!(VariantClass::classify("A", &alts(&["G"])), VariantClass::BiallelicSnp);
        assert_eq!(
            VariantClass::classify("A", &alts(&["G", "T"])),
            VariantClass::MultiallelicSnp
        );
        assert_eq!(VariantClass::classify("A", &alts(&["AT"])), VariantClass::Other);
        assert_eq!(VariantClass::classify("AT", &alts(&["A"])), VariantClass::Other);
        assert_eq!(VariantClass::classify("A", &alts(&["<DEL>"])), VariantClass::Other);
    }

    #[test]
    fn test_variant_class_text_roundtrip() {
        for class in [
            VariantClass::Invariant,
            VariantClass::BiallelicSnp,
            VariantClass::MultiallelicSnp,
            VariantClass::Other,
        ] {
            assert_eq!(VariantClass::parse(class.as_str()), Some(class));
        }
        assert_eq!(VariantClass::parse("snp"), None);
    }

    #[test]
    fn test_raw_counts_sum() {
        let parts = vec![RawCounts::new(1, 10, 2, 3), RawCounts::new(0, 5, 0, 2)];
        let total: RawCounts = parts.iter().sum();
        assert_eq!(total, RawCounts::new(1, 15, 2, 5));
    }

    #[test]
    fn test_estimate_ratio_of_sums() {
        // Averaging per-window ratios would give (0.1 + 0.0) / 2 = 0.05
        let a = RawCounts::new(1, 10, 0, 1);
        let b = RawCounts::new(0, 90, 0, 1);
        assert_eq!((a + b).estimate(), Estimate::Defined(0.01));
    }

    #[test]
    fn test_zero_denominator_is_undefined() {
        let counts = RawCounts::default();
        assert_eq!(counts.estimate(), Estimate::Undefined);
        assert_eq!(counts.estimate().to_string(), "NA");
    }

    #[test]
    fn test_pair_label_canonical_order() {
        assert_eq!(GroupLabel::pair("B", "A"), GroupLabel::Pair("A".into(), "B".into()));
        assert!(GroupLabel::Population("Z".into()) < GroupLabel::Pair("A".into(), "B".into()));
    }

    #[test]
    fn test_merge_adjacent_records() {
        let label = GroupLabel::Population("A".into());
        let left = RawStatisticRecord::new(
            "chr1",
            Window::new(0, 500),
            StatKind::Pi,
            label.clone(),
            RawCounts::new(1, 500, 0, 500),
        );
        let right = RawStatisticRecord::new(
            "chr1",
            Window::new(500, 1000),
            StatKind::Pi,
            label,
            RawCounts::new(0, 500, 0, 500),
        );

        let merged = right.merge(&left).unwrap();
        assert_eq!(merged.window, Window::new(0, 1000));
        assert_eq!(merged.counts, RawCounts::new(1, 1000, 0, 1000));
        assert_eq!(merged.estimate(), Estimate::Defined(0.001));
    }

    #[test]
    fn test_merge_rejects_gaps_and_mixed_groupings() {
        let a = RawStatisticRecord::new(
            "chr1",
            Window::new(0, 10),
            StatKind::Pi,
            GroupLabel::Population("A".into()),
            RawCounts::default(),
        );
        let gap = RawStatisticRecord {
            window: Window::new(20, 30),
            ..a.clone()
        };
        let other_pop = RawStatisticRecord {
            window: Window::new(10, 20),
            label: GroupLabel::Population("B".into()),
            ..a.clone()
        };

        assert!(matches!(a.merge(&gap), Err(RecordMergeError::NotAdjacent { .. })));
        assert!(matches!(
            a.merge(&other_pop),
            Err(RecordMergeError::DifferentGrouping(_))
        ));
    }

    #[test]
    fn test_window_containment() {
        let w = Window::new(100, 200);
        assert_eq!(w.len(), 100);
        assert!(w.contains(&Window::new(100, 150)));
        assert!(!w.contains(&Window::new(150, 250)));
        assert!(w.contains_position(199));
        assert!(!w.contains_position(200));
    }
}
