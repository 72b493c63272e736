// ==============================================================================
// genotype.rs - Genotype Call Decoding and Allelic Differences
// ==============================================================================
// Description: Decodes VCF GT text into tagged calls and counts allelic
//              differences between two calls
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Algorithm:
//   GT text is split on '/' or '|' into allele indices:
//   - "0/0", "0|1", "1/1", "0/2"  → Called([a, b])
//   - "./.", ".|.", "."           → Missing (explicit no-call)
//   - "0/.", "A/G", "0/1/1" (wrong ploidy), ""  → error (treated as missing
//     by the site filter)
//   Differences between two calls of ploidy p are p minus the size of the
//   multiset intersection of their alleles:
//   - 0/0 vs 0/0 → 0,  0/1 vs 0/0 → 1,  0/0 vs 1/1 → 2,  0/1 vs 0/1 → 0
// ==============================================================================

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Allele index as stored in the columnar call arrays (0 = REF, 1.. = ALT)
pub type Allele = i16;

/// Sentinel for a missing allele in the columnar call arrays
pub const MISSING_ALLELE: Allele = -1;

/// A single sample's call at a site, viewed from a columnar slice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Genotype<'a> {
    /// Fully called genotype (exactly `ploidy` alleles, all non-missing)
    Called(&'a [Allele]),
    /// No usable call
    Missing,
}

impl<'a> Genotype<'a> {
    /// View `ploidy` alleles from a call array; any missing allele makes the call missing
    pub fn from_alleles(alleles: &'a [Allele]) -> Self {
        if alleles.is_empty() || alleles.iter().any(|&a| a < 0) {
            Genotype::Missing
        } else {
            Genotype::Called(alleles)
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Genotype::Missing)
    }
}

/// Errors that can occur while decoding GT text
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenotypeParseError {
    #[error("Empty genotype field")]
    Empty,

    #[error("Invalid allele '{allele}' in genotype '{genotype}'")]
    InvalidAllele { genotype: String, allele: String },

    #[error("Partially missing genotype '{0}'")]
    PartialCall(String),

    #[error("Genotype '{genotype}' has ploidy {found}, expected {expected}")]
    PloidyMismatch {
        genotype: String,
        found: usize,
        expected: usize,
    },
}

/// How allelic differences and comparisons are counted
///
/// See DESIGN.md for the rationale of each convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffConvention {
    /// One comparison per pair of samples; differences = ploidy minus the
    /// shared alleles of the two calls (0..=ploidy)
    #[default]
    Genotype,
    /// One comparison per pair of called haplotypes; differences are 0 or 1
    Haplotype,
}

impl DiffConvention {
    /// Upper bound of differences a single comparison can contribute
    pub fn max_differences(&self, ploidy: usize) -> u64 {
        match self {
            DiffConvention::Genotype => ploidy as u64,
            DiffConvention::Haplotype => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiffConvention::Genotype => "genotype",
            DiffConvention::Haplotype => "haplotype",
        }
    }
}

/// Decode a GT field into allele indices
///
/// # Arguments
/// * `genotype` - GT text from a VCF sample column (e.g. "0/1", "1|1", "./.")
/// * `ploidy` - Expected number of alleles per call
/// * `out` - Destination for exactly `ploidy` alleles
///
/// # Returns
/// * `Ok(true)` - Called genotype written to `out`
/// * `Ok(false)` - Explicit no-call; `out` is filled with `MISSING_ALLELE`
/// * `Err(GenotypeParseError)` - Unrecognized encoding; `out` is filled with `MISSING_ALLELE`
///
/// # Examples
/// ```
/// use diversity_processor::genotype::decode_genotype;
///
/// let mut call = [0i16; 2];
/// assert_eq!(decode_genotype("0|1", 2, &mut call), Ok(true));
/// assert_eq!(call, [0, 1]);
///
/// assert_eq!(decode_genotype("./.", 2, &mut call), Ok(false));
/// assert_eq!(call, [-1, -1]);
/// ```
pub fn decode_genotype(
    genotype: &str,
    ploidy: usize,
    out: &mut [Allele],
) -> Result<bool, GenotypeParseError> {
    debug_assert_eq!(out.len(), ploidy);
    out.fill(MISSING_ALLELE);

    let genotype = genotype.trim();
    if genotype.is_empty() {
        return Err(GenotypeParseError::Empty);
    }

    // Haploid no-call
    if genotype == "." {
        return if ploidy == 1 {
            Ok(false)
        } else {
            Err(GenotypeParseError::PloidyMismatch {
                genotype: genotype.to_string(),
                found: 1,
                expected: ploidy,
            })
        };
    }

    let parts: Vec<&str> = genotype.split(['/', '|']).collect();
    if parts.len() != ploidy {
        return Err(GenotypeParseError::PloidyMismatch {
            genotype: genotype.to_string(),
            found: parts.len(),
            expected: ploidy,
        });
    }

    let missing = parts.iter().filter(|p| **p == ".").count();
    if missing == ploidy {
        return Ok(false);
    }
    if missing > 0 {
        return Err(GenotypeParseError::PartialCall(genotype.to_string()));
    }

    for (slot, part) in out.iter_mut().zip(parts.iter()) {
        *slot = part
            .parse::<Allele>()
            .ok()
            .filter(|a| *a >= 0)
            .ok_or_else(|| GenotypeParseError::InvalidAllele {
                genotype: genotype.to_string(),
                allele: part.to_string(),
            })?;
    }

    Ok(true)
}

/// Count allelic differences between two called genotypes of equal ploidy
///
/// Differences are the ploidy minus the size of the multiset intersection,
/// so allele order (phasing) never matters.
pub fn allelic_differences(a: &[Allele], b: &[Allele]) -> u64 {
    debug_assert_eq!(a.len(), b.len());

    let mut used = [false; 16];
    let mut shared = 0u64;

    if b.len() <= used.len() {
        for allele in a {
            if let Some(idx) = b
                .iter()
                .enumerate()
                .position(|(i, other)| !used[i] && other == allele)
            {
                used[idx] = true;
                shared += 1;
            }
        }
    } else {
        let mut remaining: Vec<Allele> = b.to_vec();
        for allele in a {
            if let Some(idx) = remaining.iter().position(|other| other == allele) {
                remaining.swap_remove(idx);
                shared += 1;
            }
        }
    }

    a.len() as u64 - shared
}

/// Homozygous-reference call of the given ploidy
pub fn reference_call(ploidy: usize) -> Vec<Allele> {
    vec![0; ploidy]
}

/// Canonical (sorted) allele key of a call, used to tally genotype classes
pub fn genotype_key(alleles: &[Allele]) -> Vec<Allele> {
    let mut key = alleles.to_vec();
    key.sort_unstable();
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(gt: &str, ploidy: usize) -> Result<Option<Vec<Allele>>, GenotypeParseError> {
        let mut out = vec![0; ploidy];
        decode_genotype(gt, ploidy, &mut out).map(|called| called.then_some(out))
    }

    #[test]
    fn test_diploid_calls() {
        assert_eq!(decode("0/0", 2).unwrap(), Some(vec![0, 0]));
        assert_eq!(decode("0/1", 2).unwrap(), Some(vec![0, 1]));
        assert_eq!(decode("1|0", 2).unwrap(), Some(vec![1, 0]));
        assert_eq!(decode("1/1", 2).unwrap(), Some(vec![1, 1]));
        assert_eq!(decode("0/2", 2).unwrap(), Some(vec![0, 2]));
    }

    #[test]
    fn test_no_calls() {
        assert_eq!(decode("./.", 2).unwrap(), None);
        assert_eq!(decode(".|.", 2).unwrap(), None);
        assert_eq!(decode(".", 1).unwrap(), None);
    }

    #[test]
    fn test_unrecognized_encodings() {
        assert!(matches!(
            decode("0/.", 2),
            Err(GenotypeParseError::PartialCall(_))
        ));
        assert!(matches!(
            decode("A/G", 2),
            Err(GenotypeParseError::InvalidAllele { .. })
        ));
        assert!(matches!(
            decode("0/1/1", 2),
            Err(GenotypeParseError::PloidyMismatch { found: 3, .. })
        ));
        assert!(matches!(
            decode(".", 2),
            Err(GenotypeParseError::PloidyMismatch { .. })
        ));
        assert!(matches!(decode("", 2), Err(GenotypeParseError::Empty)));
        assert!(matches!(
            decode("-1/0", 2),
            Err(GenotypeParseError::InvalidAllele { .. })
        ));
    }

    #[test]
    fn test_failed_decode_leaves_missing() {
        let mut out = [7i16; 2];
        assert!(decode_genotype("0/x", 2, &mut out).is_err());
        assert_eq!(out, [MISSING_ALLELE, MISSING_ALLELE]);
    }

    #[test]
    fn test_haploid_and_polyploid() {
        assert_eq!(decode("1", 1).unwrap(), Some(vec![1]));
        assert_eq!(decode("0/0/1/1", 4).unwrap(), Some(vec![0, 0, 1, 1]));
    }

    #[test]
    fn test_genotype_view() {
        assert_eq!(Genotype::from_alleles(&[0, 1]), Genotype::Called(&[0, 1]));
        assert!(Genotype::from_alleles(&[0, MISSING_ALLELE]).is_missing());
        assert!(Genotype::from_alleles(&[]).is_missing());
    }

    #[test]
    fn test_allelic_differences_diploid() {
        assert_eq!(allelic_differences(&[0, 0], &[0, 0]), 0);
        assert_eq!(allelic_differences(&[0, 1], &[0, 0]), 1);
        assert_eq!(allelic_differences(&[1, 0], &[0, 0]), 1);
        assert_eq!(allelic_differences(&[0, 0], &[1, 1]), 2);
        assert_eq!(allelic_differences(&[0, 1], &[1, 0]), 0);
        assert_eq!(allelic_differences(&[0, 1], &[1, 2]), 1);
    }

    #[test]
    fn test_allelic_differences_polyploid() {
        assert_eq!(allelic_differences(&[0, 0, 1, 1], &[0, 1, 1, 1]), 1);
        assert_eq!(allelic_differences(&[0, 0, 0, 0], &[1, 1, 1, 1]), 4);
        assert_eq!(allelic_differences(&[2], &[2]), 0);
    }

    #[test]
    fn test_max_differences() {
        assert_eq!(DiffConvention::Genotype.max_differences(2), 2);
        assert_eq!(DiffConvention::Genotype.max_differences(4), 4);
        assert_eq!(DiffConvention::Haplotype.max_differences(2), 1);
    }

    #[test]
    fn test_genotype_key_is_order_independent() {
        assert_eq!(genotype_key(&[1, 0]), genotype_key(&[0, 1]));
        assert_ne!(genotype_key(&[0, 0]), genotype_key(&[0, 1]));
    }
}
