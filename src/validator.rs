// ==============================================================================
// validator.rs - Input File Validation
// ==============================================================================
// Description: Validates all-sites VCF input (size, type, format, invariant
//              sites) and computes input digests for the run manifest
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Invariant-site check:
//   Scans ALT of the first 100 000 data lines.
//   - no ALT = "."           → error (π / d_xy would be inflated)
//   - only ALT = "."         → warning (no variable sites seen)
//   - bypassed               → loud warning, no scan
// ==============================================================================

use anyhow::{Context, Result};
use noodles_vcf::variant::record::AlternateBases;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::output::InputDigest;
use crate::parsers::vcf::open_reader;

const MAX_FILE_SIZE: u64 = 200 * 1024 * 1024 * 1024; // 200 GB

/// Data lines scanned by the invariant-site check
pub const INVARIANT_SCAN_LINES: usize = 100_000;

const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

/// Result of the invariant-site scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantCheck {
    /// Both invariant and variable sites were seen
    Passed { invariant: u64, variable: u64 },
    /// Only invariant sites in the scanned lines
    OnlyInvariant { invariant: u64 },
    /// Check skipped on request
    Bypassed,
}

#[derive(Debug)]
pub struct ValidatedInput {
    pub file_name: String,
    pub extension: String,
    pub size: u64,
    pub hash_sha256: String,
    pub invariant_check: InvariantCheck,
    pub validated_at: chrono::DateTime<chrono::Utc>,
}

impl ValidatedInput {
    pub fn digest(&self, path: &Path) -> InputDigest {
        InputDigest {
            path: path.to_path_buf(),
            sha256: self.hash_sha256.clone(),
        }
    }
}

pub struct InputValidator {
    max_file_size: u64,
    scan_lines: usize,
}

impl InputValidator {
    pub fn new() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
            scan_lines: INVARIANT_SCAN_LINES,
        }
    }

    pub fn with_scan_lines(mut self, lines: usize) -> Self {
        self.scan_lines = lines;
        self
    }

    /// Validate a VCF before ingestion
    ///
    /// # Arguments
    /// * `file_path` - `.vcf`, `.vcf.gz` or `.vcf.bgz` file
    /// * `bypass_invariant_check` - Skip the invariant-site scan
    ///
    /// # Returns
    /// * `Ok(ValidatedInput)` - File passed every check
    /// * `Err` - Unreadable, wrong type, not VCF, or no invariant sites
    pub async fn validate_vcf(
        &self,
        file_path: &Path,
        bypass_invariant_check: bool,
    ) -> Result<ValidatedInput> {
        let file_name = file_path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("Invalid file path"))?
            .to_string_lossy()
            .to_string();

        info!("Validating file: {}", file_name);

        // 1. Size check
        let metadata = std::fs::metadata(file_path)
            .with_context(|| format!("Failed to get file metadata for {:?}", file_path))?;
        let size = metadata.len();

        if size == 0 {
            anyhow::bail!("VCF file is empty");
        }
        if size > self.max_file_size {
            anyhow::bail!(
                "File too large: {} bytes (max: {} bytes)",
                size,
                self.max_file_size
            );
        }
        debug!("Size check passed: {} bytes", size);

        // 2. Extension check (allowlist)
        let ext = get_extension(&file_name)?;
        debug!("Extension check passed: {}", ext);

        // 3. Magic number verification for compressed input
        if ext != "vcf" {
            let actual = read_magic_number(file_path)?;
            if !actual.starts_with(&GZIP_MAGIC) {
                anyhow::bail!("Magic number mismatch for .{} file", ext);
            }
            debug!("Magic number check passed");
        }

        // 4. Content validation (fileformat header)
        validate_vcf_header(file_path)?;
        debug!("Content validation passed");

        // 5. Invariant sites
        let invariant_check = if bypass_invariant_check {
            warn!(
                "EXTREME WARNING: the invariant-site check is bypassed. \
                 A lack of invariant sites will result in incorrect estimates."
            );
            InvariantCheck::Bypassed
        } else {
            self.check_invariant_sites(file_path)?
        };

        // 6. Compute SHA-256 hash
        let hash = compute_sha256(file_path)?;
        debug!("SHA-256: {}", hash);

        Ok(ValidatedInput {
            file_name,
            extension: ext,
            size,
            hash_sha256: hash,
            invariant_check,
            validated_at: chrono::Utc::now(),
        })
    }

    /// Scan ALT of the first data lines for invariant sites
    pub fn check_invariant_sites(&self, path: &Path) -> Result<InvariantCheck> {
        info!("Checking for invariant sites...");
        let mut reader = open_reader(path)?;
        reader.read_header().context("Failed to read VCF header")?;

        let mut invariant = 0u64;
        let mut variable = 0u64;
        let mut scanned = 0usize;

        for result in reader.records() {
            if scanned >= self.scan_lines {
                break;
            }
            let record = result.context("Failed to read VCF record")?;
            scanned += 1;

            if record.alternate_bases().is_empty() {
                invariant += 1;
            } else {
                variable += 1;
            }
        }

        debug!(
            "Invariant-site scan: {} lines, {} invariant, {} variable",
            scanned, invariant, variable
        );

        if invariant == 0 {
            anyhow::bail!(
                "The provided VCF appears to contain no invariant sites (ALT = \".\"). \
                 This check can be bypassed with --bypass-invariant-check."
            );
        }

        if variable == 0 {
            warn!(
                "The provided VCF appears to contain no variable sites in the first {} sites. \
                 It may have been filtered incorrectly, or genetic diversity may be extremely low.",
                self.scan_lines
            );
            return Ok(InvariantCheck::OnlyInvariant { invariant });
        }

        Ok(InvariantCheck::Passed {
            invariant,
            variable,
        })
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn get_extension(filename: &str) -> Result<String> {
    // Compound extensions first
    for ext in ["vcf.gz", "vcf.bgz", "vcf"] {
        if filename.ends_with(&format!(".{}", ext)) {
            return Ok(ext.to_string());
        }
    }

    anyhow::bail!("Invalid file type: {} (expected .vcf, .vcf.gz or .vcf.bgz)", filename)
}

fn read_magic_number(path: &Path) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut buffer = vec![0u8; 4];
    let n = file.read(&mut buffer)?;
    buffer.truncate(n);
    Ok(buffer)
}

fn validate_vcf_header(path: &Path) -> Result<()> {
    let mut reader = open_reader(path)?;

    // Requires ##fileformat=VCFv4.x as the first line
    let header = reader
        .read_header()
        .context("Invalid VCF format: unreadable header")?;
    debug!("VCF header: {} samples", header.sample_names().len());

    Ok(())
}

/// SHA-256 of a file, hex encoded
pub fn compute_sha256(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open {:?} for hashing", path))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Digest of an input file for the run manifest
pub fn digest_input(path: &Path) -> Result<InputDigest> {
    Ok(InputDigest {
        path: path.to_path_buf(),
        sha256: compute_sha256(path)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use noodles_bgzf as bgzf;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    const HEADER: &str = "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1\n";

    fn vcf_file(body: &str) -> NamedTempFile {
        let mut file = Builder::new().suffix(".vcf").tempfile().unwrap();
        write!(file, "{}{}", HEADER, body).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_get_extension() {
        assert_eq!(get_extension("allsites.vcf.gz").unwrap(), "vcf.gz");
        assert_eq!(get_extension("allsites.vcf.bgz").unwrap(), "vcf.bgz");
        assert_eq!(get_extension("allsites.vcf").unwrap(), "vcf");
        assert!(get_extension("genome.txt").is_err());
    }

    #[tokio::test]
    async fn test_validate_all_sites_vcf() {
        let file = vcf_file(
            "chr1\t1\t.\tA\t.\t.\t.\t.\tGT\t0/0\n\
             chr1\t2\t.\tC\tT\t.\t.\t.\tGT\t0/1\n",
        );

        let validated = InputValidator::new()
            .validate_vcf(file.path(), false)
            .await
            .unwrap();
        assert_eq!(validated.extension, "vcf");
        assert_eq!(
            validated.invariant_check,
            InvariantCheck::Passed {
                invariant: 1,
                variable: 1
            }
        );
        assert_eq!(validated.hash_sha256.len(), 64);
    }

    #[tokio::test]
    async fn test_no_invariant_sites_rejected() {
        let file = vcf_file("chr1\t2\t.\tC\tT\t.\t.\t.\tGT\t0/1\n");
        let validator = InputValidator::new();

        let err = validator.validate_vcf(file.path(), false).await.unwrap_err();
        assert!(err.to_string().contains("no invariant sites"));

        let validated = validator.validate_vcf(file.path(), true).await.unwrap();
        assert_eq!(validated.invariant_check, InvariantCheck::Bypassed);
    }

    #[test]
    fn test_only_invariant_sites_warns() {
        let file = vcf_file("chr1\t1\t.\tA\t.\t.\t.\t.\tGT\t0/0\n");
        assert_eq!(
            InputValidator::new().check_invariant_sites(file.path()).unwrap(),
            InvariantCheck::OnlyInvariant { invariant: 1 }
        );
    }

    #[test]
    fn test_scan_stops_at_limit() {
        let file = vcf_file(
            "chr1\t1\t.\tC\tT\t.\t.\t.\tGT\t0/1\n\
             chr1\t2\t.\tA\t.\t.\t.\t.\tGT\t0/0\n",
        );
        let validator = InputValidator::new().with_scan_lines(1);
        assert!(validator.check_invariant_sites(file.path()).is_err());
    }

    #[tokio::test]
    async fn test_gzip_vcf_and_bad_magic() {
        let gz = Builder::new().suffix(".vcf.gz").tempfile().unwrap();
        {
            let mut writer = bgzf::io::Writer::new(File::create(gz.path()).unwrap());
            write!(writer, "{}chr1\t1\t.\tA\t.\t.\t.\t.\tGT\t0/0\n", HEADER).unwrap();
            writer.finish().unwrap();
        }

        let validated = InputValidator::new()
            .validate_vcf(gz.path(), false)
            .await
            .unwrap();
        assert_eq!(validated.extension, "vcf.gz");

        let fake = Builder::new().suffix(".vcf.gz").tempfile().unwrap();
        std::fs::write(fake.path(), HEADER).unwrap();
        assert!(InputValidator::new()
            .validate_vcf(fake.path(), false)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_missing_fileformat_header() {
        let mut file = Builder::new().suffix(".vcf").tempfile().unwrap();
        writeln!(file, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO").unwrap();
        file.flush().unwrap();
        assert!(InputValidator::new()
            .validate_vcf(file.path(), true)
            .await
            .is_err());
    }

    #[test]
    fn test_sha256_known_value() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "abc").unwrap();
        file.flush().unwrap();
        assert_eq!(
            compute_sha256(file.path()).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
