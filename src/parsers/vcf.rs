// ==============================================================================
// parsers/vcf.rs - All-Sites VCF Ingestion
// ==============================================================================
// Description: Streams an all-sites VCF (plain or bgzip) into a genotype store
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// References:
// - VCF 4.2 Spec: https://samtools.github.io/hts-specs/VCFv4.2.pdf
// - noodles-vcf: https://docs.rs/noodles-vcf/
// ==============================================================================
// Per record:
//   - POS (1-based) is stored as POS - 1
//   - GT decodes to allele indices; unparseable calls are stored as missing
//   - DP → depth, GQ (or RGQ for reference blocks) → genotype quality
// ==============================================================================

use noodles_bgzf as bgzf;
use noodles_vcf as vcf;
use noodles_vcf::variant::record::AlternateBases;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::genotype::{decode_genotype, Allele, MISSING_ALLELE};
use crate::models::{Site, VariantClass};
use crate::store::{ContigInfo, StoreBuilder, StoreError};

/// Default number of malformed records tolerated before ingestion fails
pub const DEFAULT_MAX_ERRORS: usize = 1000;

/// VCF reader over plain text or bgzip input
pub type VcfReader = vcf::io::Reader<Box<dyn BufRead>>;

/// VCF parsing errors
#[derive(Error, Debug)]
pub enum VcfParseError {
    #[error("Failed to open VCF file {path}: {source}")]
    FileOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Record {record}: {details}")]
    InvalidFormat { record: u64, details: String },

    #[error("Too many malformed records ({count} > {max})")]
    TooManyErrors { count: usize, max: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Header facts needed for ingestion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VcfHeader {
    pub samples: Vec<String>,
    pub contigs: Vec<ContigInfo>,
}

impl VcfHeader {
    /// Sample names and `##contig` lengths from a parsed header
    pub fn from_header(header: &vcf::Header) -> Self {
        let samples = header.sample_names().iter().cloned().collect();
        let contigs = header
            .contigs()
            .iter()
            .map(|(name, contig)| ContigInfo {
                name: name.to_string(),
                length: contig.length().unwrap_or(0) as u64,
            })
            .collect();

        Self { samples, contigs }
    }
}

/// Counts reported after ingestion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub samples: usize,
    pub sites: u64,
    pub invariant_sites: u64,
    pub variant_sites: u64,
    pub skipped_lines: usize,
    pub uncalled_genotypes: u64,
}

/// Open a VCF for reading; `.gz` / `.bgz` inputs are read as BGZF
pub fn open_reader(path: &Path) -> Result<VcfReader, VcfParseError> {
    let file = File::open(path).map_err(|source| VcfParseError::FileOpen {
        path: path.display().to_string(),
        source,
    })?;

    let is_bgzf = path
        .extension()
        .map(|e| e == "gz" || e == "bgz")
        .unwrap_or(false);

    let inner: Box<dyn BufRead> = if is_bgzf {
        Box::new(bgzf::io::Reader::new(file))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(vcf::io::Reader::new(inner))
}

/// VCF parser with configuration options
#[derive(Debug, Clone)]
pub struct VcfParser {
    /// Alleles per genotype call
    pub ploidy: usize,

    /// Malformed records tolerated before failing
    pub max_errors: usize,

    /// Malformed records skipped during the last ingestion
    pub error_count: usize,
}

impl Default for VcfParser {
    fn default() -> Self {
        Self {
            ploidy: 2,
            max_errors: DEFAULT_MAX_ERRORS,
            error_count: 0,
        }
    }
}

impl VcfParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ploidy(mut self, ploidy: usize) -> Self {
        self.ploidy = ploidy;
        self
    }

    pub fn with_max_errors(mut self, max: usize) -> Self {
        self.max_errors = max;
        self
    }

    /// Ingest a VCF file into a store builder
    ///
    /// # Arguments
    /// * `path` - Path to a `.vcf` or bgzipped `.vcf.gz` file
    /// * `builder` - Store builder receiving every parsed site
    ///
    /// # Returns
    /// * The finished store and ingestion counts
    ///
    /// # Example
    /// ```no_run
    /// use diversity_processor::parsers::VcfParser;
    /// use diversity_processor::store::MemoryStoreBuilder;
    ///
    /// let mut parser = VcfParser::new().with_ploidy(2);
    /// let (store, summary) = parser.ingest("allsites.vcf.gz", MemoryStoreBuilder::new(2))?;
    /// println!("Ingested {} sites", summary.sites);
    /// # Ok::<(), diversity_processor::parsers::VcfParseError>(())
    /// ```
    pub fn ingest<B: StoreBuilder>(
        &mut self,
        path: impl AsRef<Path>,
        builder: B,
    ) -> Result<(B::Store, IngestSummary), VcfParseError> {
        let path = path.as_ref();
        info!("Ingesting VCF {:?} (ploidy {})", path, self.ploidy);
        let reader = open_reader(path)?;
        self.ingest_reader(reader, builder)
    }

    /// Ingest records from an open VCF reader
    pub fn ingest_reader<R: BufRead, B: StoreBuilder>(
        &mut self,
        mut reader: vcf::io::Reader<R>,
        mut builder: B,
    ) -> Result<(B::Store, IngestSummary), VcfParseError> {
        self.error_count = 0;
        let mut summary = IngestSummary::default();

        // 1. Header
        let header = reader
            .read_header()
            .map_err(|e| VcfParseError::InvalidHeader(e.to_string()))?;
        let facts = VcfHeader::from_header(&header);
        summary.samples = facts.samples.len();
        builder.begin(&facts.samples, &facts.contigs)?;
        info!(
            "VCF header: {} samples, {} contigs",
            facts.samples.len(),
            facts.contigs.len()
        );

        // 2. Records
        for (idx, result) in reader.records().enumerate() {
            let record_number = idx as u64 + 1;
            let parsed = result
                .map_err(|e| VcfParseError::InvalidFormat {
                    record: record_number,
                    details: e.to_string(),
                })
                .and_then(|record| self.parse_record(&record, record_number, facts.samples.len()));

            match parsed {
                Ok(site) => {
                    summary.sites += 1;
                    if site.class == VariantClass::Invariant {
                        summary.invariant_sites += 1;
                    } else {
                        summary.variant_sites += 1;
                    }
                    summary.uncalled_genotypes += site
                        .alleles
                        .chunks(self.ploidy)
                        .filter(|call| call.iter().any(|&a| a == MISSING_ALLELE))
                        .count() as u64;
                    builder.push_site(site)?;
                }
                Err(e) => {
                    warn!("Skipping malformed VCF record: {}", e);
                    self.error_count += 1;
                    if self.error_count > self.max_errors {
                        return Err(VcfParseError::TooManyErrors {
                            count: self.error_count,
                            max: self.max_errors,
                        });
                    }
                }
            }

            if summary.sites > 0 && summary.sites % 1_000_000 == 0 {
                debug!("Ingested {} sites", summary.sites);
            }
        }

        summary.skipped_lines = self.error_count;
        let store = builder.finish()?;

        info!(
            "VCF ingested: {} sites ({} invariant, {} variant), {} malformed records skipped",
            summary.sites, summary.invariant_sites, summary.variant_sites, summary.skipped_lines
        );
        Ok((store, summary))
    }

    /// Convert one VCF record into a site
    ///
    /// Genotypes that fail to decode are stored as missing.
    pub fn parse_record(
        &self,
        record: &vcf::Record,
        record_number: u64,
        n_samples: usize,
    ) -> Result<Site, VcfParseError> {
        let invalid = |details: String| VcfParseError::InvalidFormat {
            record: record_number,
            details,
        };

        let contig = record.reference_sequence_name();
        if contig.is_empty() {
            return Err(invalid("empty CHROM".to_string()));
        }

        let position = match record.variant_start() {
            Some(Ok(pos)) => usize::from(pos) as u64 - 1,
            Some(Err(e)) => return Err(invalid(format!("invalid POS: {}", e))),
            None => return Err(invalid("missing POS".to_string())),
        };

        let ref_allele = record.reference_bases().to_string();
        let alt_alleles = record
            .alternate_bases()
            .iter()
            .map(|alt| alt.map(str::to_string))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| invalid(format!("invalid ALT: {}", e)))?;
        let class = VariantClass::classify(&ref_allele, &alt_alleles);

        let columns = parse_sample_columns(record.samples().as_ref(), n_samples, self.ploidy)
            .map_err(invalid)?;

        Ok(Site {
            contig: contig.to_string(),
            position,
            ref_allele,
            alt_alleles,
            class,
            alleles: columns.alleles,
            depths: columns.depths,
            qualities: columns.qualities,
        })
    }
}

#[derive(Debug, Default)]
struct SampleColumns {
    alleles: Vec<Allele>,
    depths: Vec<Option<u32>>,
    qualities: Vec<Option<f32>>,
}

/// Decode the FORMAT column and per-sample fields of one record
///
/// `text` is the raw `FORMAT\tsample1\tsample2...` suffix of the line.
fn parse_sample_columns(text: &str, n_samples: usize, ploidy: usize) -> Result<SampleColumns, String> {
    let mut columns = SampleColumns {
        alleles: vec![MISSING_ALLELE; n_samples * ploidy],
        depths: vec![None; n_samples],
        qualities: vec![None; n_samples],
    };
    if n_samples == 0 {
        return Ok(columns);
    }

    let mut fields = text.split('\t');
    let format: Vec<&str> = fields.next().unwrap_or_default().split(':').collect();
    let values: Vec<&str> = fields.collect();
    if values.len() != n_samples {
        return Err(format!(
            "expected {} sample columns, found {}",
            n_samples,
            values.len()
        ));
    }

    let gt_idx = format
        .iter()
        .position(|k| *k == "GT")
        .ok_or_else(|| "FORMAT has no GT field".to_string())?;
    let dp_idx = format.iter().position(|k| *k == "DP");
    let gq_idx = format
        .iter()
        .position(|k| *k == "GQ")
        .or_else(|| format.iter().position(|k| *k == "RGQ"));

    for (sample, column) in values.iter().enumerate() {
        let value: Vec<&str> = column.split(':').collect();

        let call = &mut columns.alleles[sample * ploidy..(sample + 1) * ploidy];
        if let Some(gt) = value.get(gt_idx) {
            // Unrecognized encodings leave the call missing
            let _ = decode_genotype(gt, ploidy, call);
        }

        columns.depths[sample] = dp_idx
            .and_then(|i| value.get(i))
            .and_then(|v| v.parse::<u32>().ok());
        columns.qualities[sample] = gq_idx
            .and_then(|i| value.get(i))
            .and_then(|v| v.parse::<f32>().ok());
    }

    Ok(columns)
}
