// ==============================================================================
// parsers/mod.rs - File parser modules
// ==============================================================================
// Description: Parsers for genotype, window and target-site input files
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

pub mod bed;
pub mod sites;
pub mod vcf;

pub use bed::{BedCoordinates, BedParser};
pub use sites::{SitesParser, TargetSites};
pub use vcf::{IngestSummary, VcfHeader, VcfParseError, VcfParser};
