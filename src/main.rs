// ==============================================================================
// main.rs - Diversity Processor Entry Point
// ==============================================================================
// Description: Command line entry point: VCF ingestion, input checks and
//              windowed π / d_xy runs
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use diversity_processor::config::{ContigSelection, MissingHandling, RunConfig};
use diversity_processor::genotype::DiffConvention;
use diversity_processor::models::{StatKind, Window};
use diversity_processor::output::{open_sink, MultiSink, OutputFormat, RecordSink, RunManifest};
use diversity_processor::parsers::{BedCoordinates, BedParser, SitesParser, VcfParser};
use diversity_processor::populations::PopulationMap;
use diversity_processor::processor::{CancellationFlag, DiversityProcessor, RunOutcome};
use diversity_processor::store::{
    GenotypeStore, MemoryStoreBuilder, SqliteStore, SqliteStoreBuilder,
};
use diversity_processor::validator::{digest_input, InputValidator};
use diversity_processor::windows::WindowSpec;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest an all-sites VCF into a SQLite genotype store
    Ingest(IngestArgs),

    /// Check that a VCF is usable (format, invariant sites)
    Check(CheckArgs),

    /// Compute windowed π and d_xy
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct IngestArgs {
    /// All-sites VCF (.vcf or .vcf.gz)
    #[arg(long)]
    vcf: PathBuf,

    /// Genotype store to create (replaced if it exists)
    #[arg(long)]
    store: PathBuf,

    /// Alleles per genotype call
    #[arg(long, default_value_t = 2)]
    ploidy: usize,

    /// Malformed VCF lines tolerated before failing
    #[arg(long, default_value_t = 1000)]
    max_errors: usize,

    /// Skip the invariant-site check
    #[arg(long)]
    bypass_invariant_check: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// VCF to check
    #[arg(long)]
    vcf: PathBuf,

    /// Skip the invariant-site check
    #[arg(long)]
    bypass_invariant_check: bool,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Genotype store produced by `ingest`
    #[arg(long, conflicts_with = "vcf", required_unless_present = "vcf")]
    store: Option<PathBuf>,

    /// All-sites VCF, ingested in memory
    #[arg(long)]
    vcf: Option<PathBuf>,

    /// Populations file (sample<TAB>population)
    #[arg(long)]
    populations: PathBuf,

    /// JSON run configuration; command line flags override its values
    #[arg(long, env = "DIVERSITY_CONFIG")]
    config: Option<PathBuf>,

    /// Fixed window size in bp
    #[arg(long, conflicts_with = "bed_file")]
    window_size: Option<u64>,

    /// BED file of windows. Read as standard BED (0-based start, exclusive end)
    /// unless --bed-one-based is given; pixy window files are 1-based inclusive
    #[arg(long)]
    bed_file: Option<PathBuf>,

    /// Read --bed-file as 1-based inclusive coordinates (pixy convention)
    #[arg(long, requires = "bed_file")]
    bed_one_based: bool,

    /// Target sites file (chrom<TAB>pos, 1-based)
    #[arg(long)]
    sites_file: Option<PathBuf>,

    /// First position of the interval (1-based, inclusive; single contig only)
    #[arg(long, requires = "interval_end")]
    interval_start: Option<u64>,

    /// Last position of the interval (1-based, inclusive)
    #[arg(long, requires = "interval_start")]
    interval_end: Option<u64>,

    /// Contigs to process, comma separated (default: all)
    #[arg(long, value_delimiter = ',')]
    contigs: Option<Vec<String>>,

    /// Statistics to compute, comma separated (pi, dxy)
    #[arg(long, value_delimiter = ',')]
    stats: Option<Vec<String>>,

    /// Output directory
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Output file prefix
    #[arg(long, default_value = "diversity")]
    output_prefix: String,

    /// Output formats, comma separated (tsv, json, sqlite, parquet)
    #[arg(long, value_delimiter = ',', default_value = "tsv")]
    formats: Vec<String>,

    /// Worker threads (chunks evaluated concurrently)
    #[arg(long)]
    threads: Option<usize>,

    /// Bp per store read
    #[arg(long)]
    chunk_size: Option<u64>,

    /// Alleles per genotype call
    #[arg(long)]
    ploidy: Option<usize>,

    /// Minimum per-call read depth (DP)
    #[arg(long)]
    min_depth: Option<u32>,

    /// Minimum per-call genotype quality (GQ)
    #[arg(long)]
    min_gq: Option<f32>,

    /// Maximum proportion of missing calls per site
    #[arg(long)]
    max_missing: Option<f64>,

    /// Treat no-calls as homozygous reference
    #[arg(long)]
    missing_as_ref: bool,

    /// Keep multiallelic and non-SNP sites
    #[arg(long)]
    all_variant_classes: bool,

    /// Difference convention (genotype or haplotype)
    #[arg(long)]
    diff_convention: Option<String>,

    /// Continue an interrupted TSV run, skipping completed windows
    #[arg(long)]
    resume: bool,

    /// Skip the invariant-site check on --vcf input
    #[arg(long)]
    bypass_invariant_check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "diversity_processor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Ingest(args) => ingest(args).await,
        Command::Check(args) => check(args).await,
        Command::Run(args) => run(args).await,
    }
}

async fn ingest(args: IngestArgs) -> Result<()> {
    InputValidator::new()
        .validate_vcf(&args.vcf, args.bypass_invariant_check)
        .await?;

    let summary = tokio::task::spawn_blocking({
        let vcf = args.vcf.clone();
        let store = args.store.clone();
        move || -> Result<_> {
            let builder = SqliteStoreBuilder::create(&store, args.ploidy)
                .with_context(|| format!("Failed to create genotype store {:?}", store))?;
            let mut parser = VcfParser::new()
                .with_ploidy(args.ploidy)
                .with_max_errors(args.max_errors);
            let (_, summary) = parser.ingest(&vcf, builder)?;
            Ok(summary)
        }
    })
    .await??;

    info!(
        "Genotype store {:?} ready: {} samples, {} sites",
        args.store, summary.samples, summary.sites
    );
    Ok(())
}

async fn check(args: CheckArgs) -> Result<()> {
    let validated = InputValidator::new()
        .validate_vcf(&args.vcf, args.bypass_invariant_check)
        .await?;

    info!(
        "{} OK ({} bytes, sha256 {}): {:?}",
        validated.file_name, validated.size, validated.hash_sha256, validated.invariant_check
    );
    Ok(())
}

async fn run(args: RunArgs) -> Result<()> {
    let started_at = chrono::Utc::now();
    let mut inputs = Vec::new();

    // 1. Configuration and populations
    let config = build_config(&args)?;
    for path in [&args.config, &args.bed_file, &args.sites_file]
        .into_iter()
        .flatten()
    {
        inputs.push(digest_input(path)?);
    }

    let populations = PopulationMap::from_file(&args.populations)?;
    inputs.push(digest_input(&args.populations)?);

    // 2. Genotype store
    let store: Arc<dyn GenotypeStore> = match (&args.store, &args.vcf) {
        (Some(path), _) => {
            inputs.push(digest_input(path)?);
            let store = SqliteStore::open(path)
                .with_context(|| format!("Failed to open genotype store {:?}", path))?;
            Arc::new(store)
        }
        (None, Some(path)) => {
            let validated = InputValidator::new()
                .validate_vcf(path, args.bypass_invariant_check)
                .await?;
            inputs.push(validated.digest(path));
            Arc::new(ingest_in_memory(path, config.ploidy).await?)
        }
        (None, None) => anyhow::bail!("Either --store or --vcf is required"),
    };

    // 3. Processor (configuration is fully validated here)
    let processor = DiversityProcessor::new(config, &populations, store.as_ref())?;

    // 4. Output sinks
    let formats = parse_formats(&args.formats)?;
    if args.resume && formats != [OutputFormat::Tsv] {
        anyhow::bail!("--resume is only supported with TSV output alone");
    }
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", args.output_dir))?;

    let mut sinks: Vec<Box<dyn RecordSink>> = Vec::new();
    let mut completed = Default::default();
    for format in &formats {
        let path = format.output_path(&args.output_dir, &args.output_prefix);
        let (sink, done) = open_sink(*format, &path, args.resume, processor.records_per_window())?;
        sinks.push(sink);
        completed = done;
    }
    let mut sink = MultiSink::new(sinks);
    let processor = processor.with_completed_windows(completed);

    // 5. Ctrl-C stops the run after in-flight chunks
    let cancel = CancellationFlag::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; finishing in-flight chunks");
                cancel.cancel();
            }
        }
    });

    // 6. Compute
    let summary = processor.run(store, &mut sink, &cancel).await?;
    let outputs = sink.finish_all()?;

    // 7. Manifest
    let outcome = summary.outcome;
    let manifest = RunManifest {
        run_id: uuid::Uuid::new_v4(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        started_at,
        finished_at: chrono::Utc::now(),
        config: processor.config().clone(),
        inputs,
        outputs,
        summary,
    };
    manifest.write(&RunManifest::path(&args.output_dir, &args.output_prefix))?;

    if outcome == RunOutcome::Cancelled {
        anyhow::bail!("Run cancelled; rerun with --resume to continue");
    }
    Ok(())
}

async fn ingest_in_memory(
    path: &Path,
    ploidy: usize,
) -> Result<diversity_processor::store::MemoryStore> {
    tokio::task::spawn_blocking({
        let path = path.to_path_buf();
        move || -> Result<_> {
            let mut parser = VcfParser::new().with_ploidy(ploidy);
            let (store, _) = parser.ingest(&path, MemoryStoreBuilder::new(ploidy))?;
            Ok(store)
        }
    })
    .await?
}

/// Merge the optional JSON configuration with command line overrides
fn build_config(args: &RunArgs) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_json_file(path)?,
        None => RunConfig::default(),
    };

    if let Some(contigs) = &args.contigs {
        config.contigs = ContigSelection::List(contigs.clone());
    }

    if let Some(path) = &args.bed_file {
        let coordinates = if args.bed_one_based {
            BedCoordinates::OneBasedInclusive
        } else {
            BedCoordinates::ZeroBasedHalfOpen
        };
        config.windows = WindowSpec::Explicit {
            windows: BedParser::parse_with(path, coordinates)?,
        };
    } else if args.window_size.is_some() || args.interval_start.is_some() {
        let size = args
            .window_size
            .or_else(|| config.windows.window_size())
            .context("--window-size is required with an explicit window list")?;

        let interval = match (args.interval_start, args.interval_end) {
            (Some(start), Some(end)) => {
                if start == 0 || end < start {
                    anyhow::bail!(
                        "Invalid interval {}-{} (1-based, inclusive, start <= end)",
                        start,
                        end
                    );
                }
                Some(Window::new(start - 1, end))
            }
            _ => None,
        };

        config.windows = WindowSpec::Fixed { size, interval };
    }

    if let Some(stats) = &args.stats {
        config.stats = stats
            .iter()
            .map(|s| parse_stat(s))
            .collect::<Result<Vec<_>>>()?;
    }

    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(ploidy) = args.ploidy {
        config.ploidy = ploidy;
    }
    if let Some(convention) = &args.diff_convention {
        config.diff_convention = match convention.to_lowercase().as_str() {
            "genotype" => DiffConvention::Genotype,
            "haplotype" => DiffConvention::Haplotype,
            other => anyhow::bail!("Unknown difference convention '{}'", other),
        };
    }

    // Filters
    if let Some(min_depth) = args.min_depth {
        config.filter.min_depth = min_depth;
    }
    if let Some(min_gq) = args.min_gq {
        config.filter.min_genotype_quality = min_gq;
    }
    if let Some(max_missing) = args.max_missing {
        config.filter.max_missing_proportion = max_missing;
    }
    if args.missing_as_ref {
        config.filter.missing_handling = MissingHandling::AsReference;
    }
    if args.all_variant_classes {
        config.filter.biallelic_snps_only = false;
    }
    if let Some(path) = &args.sites_file {
        config.filter.sites_file = Some(path.clone());
    }
    if let Some(path) = config.filter.sites_file.clone() {
        config.filter.target_sites = Some(Arc::new(SitesParser::parse(&path)?));
    }

    config.validate()?;
    Ok(config)
}

fn parse_stat(value: &str) -> Result<StatKind> {
    match value.trim().to_lowercase().as_str() {
        "pi" => Ok(StatKind::Pi),
        "dxy" => Ok(StatKind::Dxy),
        other => anyhow::bail!("Unknown statistic '{}' (expected pi or dxy)", other),
    }
}

fn parse_formats(values: &[String]) -> Result<Vec<OutputFormat>> {
    let mut formats = Vec::new();
    for value in values {
        let format = match value.trim().to_lowercase().as_str() {
            "tsv" => OutputFormat::Tsv,
            "json" | "jsonl" => OutputFormat::Json,
            "sqlite" | "db" => OutputFormat::Sqlite,
            "parquet" => OutputFormat::Parquet,
            other => anyhow::bail!("Unknown output format '{}'", other),
        };
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    Ok(formats)
}
