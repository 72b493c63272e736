// ==============================================================================
// output.rs - Multi-Format Record Output
// ==============================================================================
// Description: Streams per-window diversity records to TSV, JSON lines,
//              SQLite and Parquet, and writes the run manifest
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Columns (every format):
//   contig, window_start, window_end, statistic, pop1, pop2 (NA for pi),
//   numerator, denominator, n_sites, estimate (NA when undefined),
//   missing_comparisons
// Record files depend only on inputs and configuration; run-specific values
// (run id, timestamps) live in the manifest alone.
// ==============================================================================

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

// Apache Arrow/Parquet for columnar data
use arrow::array::{ArrayRef, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

// SQLite for queryable database
use rusqlite::{params, Connection};

use crate::config::RunConfig;
use crate::models::{RawStatisticRecord, Window};
use crate::processor::RunSummary;

const NA: &str = "NA";

const COLUMNS: [&str; 11] = [
    "contig",
    "window_start",
    "window_end",
    "statistic",
    "pop1",
    "pop2",
    "numerator",
    "denominator",
    "n_sites",
    "estimate",
    "missing_comparisons",
];

/// Rows buffered before a Parquet row group is written
const PARQUET_BATCH_ROWS: usize = 65_536;

/// Supported record output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Tab-separated text (default, resumable)
    Tsv,
    /// JSON lines, one record per line
    Json,
    /// SQLite database (best for querying and exploration)
    Sqlite,
    /// Apache Parquet (best for data science: Python, R, Spark)
    Parquet,
}

impl OutputFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Tsv => "tsv",
            OutputFormat::Json => "jsonl",
            OutputFormat::Sqlite => "db",
            OutputFormat::Parquet => "parquet",
        }
    }

    /// `{dir}/{prefix}_diversity.{ext}`
    pub fn output_path(&self, dir: &Path, prefix: &str) -> PathBuf {
        dir.join(format!("{}_diversity.{}", prefix, self.extension()))
    }
}

/// Flat, serializable view of one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordRow {
    pub contig: String,
    pub window_start: u64,
    pub window_end: u64,
    pub statistic: String,
    pub pop1: String,
    pub pop2: Option<String>,
    pub numerator: u64,
    pub denominator: u64,
    pub n_sites: u64,
    pub estimate: Option<f64>,
    pub missing_comparisons: u64,
}

impl From<&RawStatisticRecord> for RecordRow {
    fn from(record: &RawStatisticRecord) -> Self {
        RecordRow {
            contig: record.contig.clone(),
            window_start: record.window.start,
            window_end: record.window.end,
            statistic: record.kind.as_str().to_string(),
            pop1: record.label.pop1().to_string(),
            pop2: record.label.pop2().map(str::to_string),
            numerator: record.counts.differences,
            denominator: record.counts.comparisons,
            n_sites: record.counts.sites,
            estimate: record.estimate().value(),
            missing_comparisons: record.counts.missing_comparisons,
        }
    }
}

impl RecordRow {
    fn to_tsv(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.contig,
            self.window_start,
            self.window_end,
            self.statistic,
            self.pop1,
            self.pop2.as_deref().unwrap_or(NA),
            self.numerator,
            self.denominator,
            self.n_sites,
            self.estimate
                .map(|v| v.to_string())
                .unwrap_or_else(|| NA.to_string()),
            self.missing_comparisons
        )
    }
}

/// Destination for the records of completed windows, in window order
pub trait RecordSink: Send {
    /// Write every record of one window
    fn write_window(&mut self, records: &[RawStatisticRecord]) -> Result<()>;

    /// Flush and close; returns the written file, if any
    fn finish(&mut self) -> Result<Option<PathBuf>>;
}

/// Collects records in memory
#[derive(Debug, Default)]
pub struct VecSink {
    pub records: Vec<RawStatisticRecord>,
    pub windows: usize,
}

impl RecordSink for VecSink {
    fn write_window(&mut self, records: &[RawStatisticRecord]) -> Result<()> {
        self.records.extend_from_slice(records);
        self.windows += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}

/// Fans each window out to several sinks
pub struct MultiSink {
    sinks: Vec<Box<dyn RecordSink>>,
}

impl MultiSink {
    pub fn new(sinks: Vec<Box<dyn RecordSink>>) -> Self {
        Self { sinks }
    }

    /// Finish every sink and collect the written paths
    pub fn finish_all(&mut self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for sink in &mut self.sinks {
            if let Some(path) = sink.finish()? {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

impl RecordSink for MultiSink {
    fn write_window(&mut self, records: &[RawStatisticRecord]) -> Result<()> {
        for sink in &mut self.sinks {
            sink.write_window(records)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<PathBuf>> {
        Ok(self.finish_all()?.into_iter().next())
    }
}

/// Tab-separated output with header, flushed after every window
pub struct TsvSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl TsvSink {
    /// Create (or truncate) a TSV output file
    pub fn create(path: &Path) -> Result<Self> {
        info!("Writing TSV output: {:?}", path);
        let file = File::create(path).context("Failed to create TSV output file")?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", COLUMNS.join("\t"))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(writer),
        })
    }

    /// Reopen an existing TSV output for appending
    ///
    /// Complete windows already present are returned so the run can skip
    /// them. A trailing window with fewer than `records_per_window` rows (or
    /// an unterminated last line) is cut off and will be recomputed.
    ///
    /// # Arguments
    /// * `path` - TSV file from a previous run with the same configuration
    /// * `records_per_window` - Records every complete window carries
    ///
    /// # Returns
    /// * The sink positioned after the last complete window, and the set of
    ///   completed `(contig, window)` keys
    pub fn resume(path: &Path, records_per_window: usize) -> Result<(Self, HashSet<(String, Window)>)> {
        if !path.exists() {
            return Ok((Self::create(path)?, HashSet::new()));
        }

        let reader = BufReader::new(File::open(path).context("Failed to open TSV for resume")?);
        let mut lines = reader.split(b'\n');

        let header = match lines.next() {
            Some(line) => String::from_utf8(line?).context("TSV header is not UTF-8")?,
            None => {
                warn!("Existing TSV {:?} is empty, starting over", path);
                return Ok((Self::create(path)?, HashSet::new()));
            }
        };
        if header != COLUMNS.join("\t") {
            anyhow::bail!("Cannot resume {:?}: unexpected header", path);
        }

        let mut completed = HashSet::new();
        let mut keep_bytes = header.len() as u64 + 1;
        let mut last_completed: Option<((String, Window), u64)> = None;
        let mut current: Option<(String, Window)> = None;
        let mut current_rows = 0usize;
        let mut current_bytes = 0u64;

        for line in lines {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let text = String::from_utf8_lossy(&line);
            let fields: Vec<&str> = text.split('\t').collect();
            let key = match parse_window_key(&fields) {
                Some(key) => key,
                None => break,
            };

            if current.as_ref() != Some(&key) {
                current = Some(key);
                current_rows = 0;
                current_bytes = 0;
            }
            current_rows += 1;
            current_bytes += line.len() as u64 + 1;

            if current_rows == records_per_window && fields.len() == COLUMNS.len() {
                if let Some(done) = current.take() {
                    last_completed = Some((done.clone(), keep_bytes));
                    completed.insert(done);
                }
                keep_bytes += current_bytes;
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .context("Failed to reopen TSV for resume")?;
        let length = file.metadata()?.len();

        // Last window ends in an unterminated line
        if keep_bytes > length {
            match last_completed {
                Some((key, offset)) => {
                    completed.remove(&key);
                    keep_bytes = offset;
                }
                None => {
                    drop(file);
                    return Ok((Self::create(path)?, HashSet::new()));
                }
            }
        }
        if length > keep_bytes {
            warn!(
                "Dropping {} bytes of incomplete output from {:?}",
                length - keep_bytes,
                path
            );
        }
        file.set_len(keep_bytes)?;

        let file = OpenOptions::new().append(true).open(path)?;
        info!(
            "Resuming TSV output {:?}: {} complete windows",
            path,
            completed.len()
        );

        Ok((
            Self {
                path: path.to_path_buf(),
                writer: Some(BufWriter::new(file)),
            },
            completed,
        ))
    }
}

fn parse_window_key(fields: &[&str]) -> Option<(String, Window)> {
    if fields.len() < 3 {
        return None;
    }
    let start = fields[1].parse().ok()?;
    let end = fields[2].parse().ok()?;
    Some((fields[0].to_string(), Window::new(start, end)))
}

impl RecordSink for TsvSink {
    fn write_window(&mut self, records: &[RawStatisticRecord]) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("TSV output already finished"))?;
        for record in records {
            writeln!(writer, "{}", RecordRow::from(record).to_tsv())?;
        }
        writer.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<PathBuf>> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().context("Failed to flush TSV output")?;
        }
        Ok(Some(self.path.clone()))
    }
}

/// JSON lines output
pub struct JsonLinesSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl JsonLinesSink {
    pub fn create(path: &Path) -> Result<Self> {
        info!("Writing JSON lines output: {:?}", path);
        let file = File::create(path).context("Failed to create JSON output file")?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
        })
    }
}

impl RecordSink for JsonLinesSink {
    fn write_window(&mut self, records: &[RawStatisticRecord]) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("JSON output already finished"))?;
        for record in records {
            serde_json::to_writer(&mut *writer, &RecordRow::from(record))?;
            writeln!(writer)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<PathBuf>> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().context("Failed to flush JSON output")?;
        }
        Ok(Some(self.path.clone()))
    }
}

/// SQLite output: table `records`, one transaction per window
pub struct SqliteSink {
    path: PathBuf,
    conn: Option<Connection>,
    rows: u64,
}

impl SqliteSink {
    pub fn create(path: &Path) -> Result<Self> {
        info!("Initializing SQLite database: {:?}", path);
        if path.exists() {
            std::fs::remove_file(path).context("Failed to replace existing SQLite output")?;
        }

        let conn = Connection::open(path).context("Failed to create SQLite database")?;
        conn.execute_batch(
            "PRAGMA journal_mode = OFF;
             PRAGMA synchronous = OFF;",
        )
        .context("Failed to set SQLite pragmas")?;

        conn.execute(
            "CREATE TABLE records (
                contig TEXT NOT NULL,
                window_start INTEGER NOT NULL,
                window_end INTEGER NOT NULL,
                statistic TEXT NOT NULL,
                pop1 TEXT NOT NULL,
                pop2 TEXT,
                numerator INTEGER NOT NULL,
                denominator INTEGER NOT NULL,
                n_sites INTEGER NOT NULL,
                estimate REAL,
                missing_comparisons INTEGER NOT NULL
            )",
            [],
        )
        .context("Failed to create records table")?;

        Ok(Self {
            path: path.to_path_buf(),
            conn: Some(conn),
            rows: 0,
        })
    }
}

impl RecordSink for SqliteSink {
    fn write_window(&mut self, records: &[RawStatisticRecord]) -> Result<()> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("SQLite output already finished"))?;

        let tx = conn.transaction().context("Failed to start SQLite transaction")?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO records
                     (contig, window_start, window_end, statistic, pop1, pop2,
                      numerator, denominator, n_sites, estimate, missing_comparisons)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                )
                .context("Failed to prepare records insert statement")?;

            for record in records {
                let row = RecordRow::from(record);
                stmt.execute(params![
                    row.contig,
                    row.window_start as i64,
                    row.window_end as i64,
                    row.statistic,
                    row.pop1,
                    row.pop2,
                    row.numerator as i64,
                    row.denominator as i64,
                    row.n_sites as i64,
                    row.estimate,
                    row.missing_comparisons as i64,
                ])
                .context("Failed to insert record")?;
            }
        }
        tx.commit().context("Failed to commit records")?;
        self.rows += records.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<PathBuf>> {
        if let Some(conn) = self.conn.take() {
            info!("Creating SQLite indexes...");
            conn.execute(
                "CREATE INDEX idx_records_window ON records(contig, window_start)",
                [],
            )
            .context("Failed to create window index")?;
            conn.execute(
                "CREATE INDEX idx_records_group ON records(statistic, pop1, pop2)",
                [],
            )
            .context("Failed to create grouping index")?;
            drop(conn);
            info!("SQLite finalized: {} records", self.rows);
        }
        Ok(Some(self.path.clone()))
    }
}

/// Parquet output with SNAPPY compression, one row group per buffered batch
pub struct ParquetSink {
    path: PathBuf,
    schema: Arc<Schema>,
    writer: Option<ArrowWriter<File>>,
    buffer: Vec<RecordRow>,
    rows: u64,
}

impl ParquetSink {
    pub fn create(path: &Path) -> Result<Self> {
        info!("Writing Parquet output: {:?}", path);

        let schema = Arc::new(Schema::new(vec![
            Field::new("contig", DataType::Utf8, false),
            Field::new("window_start", DataType::UInt64, false),
            Field::new("window_end", DataType::UInt64, false),
            Field::new("statistic", DataType::Utf8, false),
            Field::new("pop1", DataType::Utf8, false),
            Field::new("pop2", DataType::Utf8, true),
            Field::new("numerator", DataType::UInt64, false),
            Field::new("denominator", DataType::UInt64, false),
            Field::new("n_sites", DataType::UInt64, false),
            Field::new("estimate", DataType::Float64, true),
            Field::new("missing_comparisons", DataType::UInt64, false),
        ]));

        let file = File::create(path).context("Failed to create Parquet file")?;
        let props = WriterProperties::builder()
            .set_compression(parquet::basic::Compression::SNAPPY)
            .build();
        let writer = ArrowWriter::try_new(file, schema.clone(), Some(props))
            .context("Failed to create Parquet writer")?;

        Ok(Self {
            path: path.to_path_buf(),
            schema,
            writer: Some(writer),
            buffer: Vec::new(),
            rows: 0,
        })
    }

    fn flush_batch(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("Parquet output already finished"))?;

        let rows = &self.buffer;
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(
                rows.iter().map(|r| r.contig.as_str()).collect::<Vec<_>>(),
            )),
            Arc::new(UInt64Array::from(
                rows.iter().map(|r| r.window_start).collect::<Vec<_>>(),
            )),
            Arc::new(UInt64Array::from(
                rows.iter().map(|r| r.window_end).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                rows.iter().map(|r| r.statistic.as_str()).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                rows.iter().map(|r| r.pop1.as_str()).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                rows.iter().map(|r| r.pop2.as_deref()).collect::<Vec<_>>(),
            )),
            Arc::new(UInt64Array::from(
                rows.iter().map(|r| r.numerator).collect::<Vec<_>>(),
            )),
            Arc::new(UInt64Array::from(
                rows.iter().map(|r| r.denominator).collect::<Vec<_>>(),
            )),
            Arc::new(UInt64Array::from(
                rows.iter().map(|r| r.n_sites).collect::<Vec<_>>(),
            )),
            Arc::new(Float64Array::from(
                rows.iter().map(|r| r.estimate).collect::<Vec<_>>(),
            )),
            Arc::new(UInt64Array::from(
                rows.iter().map(|r| r.missing_comparisons).collect::<Vec<_>>(),
            )),
        ];

        let batch = RecordBatch::try_new(self.schema.clone(), columns)
            .context("Failed to create Arrow RecordBatch")?;
        writer.write(&batch).context("Failed to write Parquet data")?;

        debug!("Wrote Parquet batch of {} rows", rows.len());
        self.rows += rows.len() as u64;
        self.buffer.clear();
        Ok(())
    }
}

impl RecordSink for ParquetSink {
    fn write_window(&mut self, records: &[RawStatisticRecord]) -> Result<()> {
        self.buffer.extend(records.iter().map(RecordRow::from));
        if self.buffer.len() >= PARQUET_BATCH_ROWS {
            self.flush_batch()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<PathBuf>> {
        self.flush_batch()?;
        if let Some(writer) = self.writer.take() {
            writer.close().context("Failed to close Parquet writer")?;
            info!("Parquet output complete: {} records", self.rows);
        }
        Ok(Some(self.path.clone()))
    }
}

/// Open a sink for `format`; TSV sinks honour `resume`
///
/// # Returns
/// * The sink and the windows already complete in a resumed TSV (empty otherwise)
pub fn open_sink(
    format: OutputFormat,
    path: &Path,
    resume: bool,
    records_per_window: usize,
) -> Result<(Box<dyn RecordSink>, HashSet<(String, Window)>)> {
    match format {
        OutputFormat::Tsv if resume => {
            let (sink, completed) = TsvSink::resume(path, records_per_window)?;
            Ok((Box::new(sink), completed))
        }
        OutputFormat::Tsv => Ok((Box::new(TsvSink::create(path)?), HashSet::new())),
        OutputFormat::Json => Ok((Box::new(JsonLinesSink::create(path)?), HashSet::new())),
        OutputFormat::Sqlite => Ok((Box::new(SqliteSink::create(path)?), HashSet::new())),
        OutputFormat::Parquet => Ok((Box::new(ParquetSink::create(path)?), HashSet::new())),
    }
}

/// Digest of one input file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputDigest {
    pub path: PathBuf,
    pub sha256: String,
}

/// Run provenance written next to the record files
#[derive(Debug, Serialize)]
pub struct RunManifest {
    pub run_id: Uuid,
    pub tool_version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub config: RunConfig,
    pub inputs: Vec<InputDigest>,
    pub outputs: Vec<PathBuf>,
    pub summary: RunSummary,
}

impl RunManifest {
    /// `{dir}/{prefix}_manifest.json`
    pub fn path(dir: &Path, prefix: &str) -> PathBuf {
        dir.join(format!("{}_manifest.json", prefix))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let file = File::create(path).context("Failed to create manifest file")?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .context("Failed to write manifest")?;
        info!("Run manifest written: {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GroupLabel, RawCounts, StatKind};
    use tempfile::tempdir;

    fn window_records(start: u64, end: u64) -> Vec<RawStatisticRecord> {
        vec![
            RawStatisticRecord::new(
                "chr1",
                Window::new(start, end),
                StatKind::Pi,
                GroupLabel::Population("A".into()),
                RawCounts::new(1, 500, 0, 500),
            ),
            RawStatisticRecord::new(
                "chr1",
                Window::new(start, end),
                StatKind::Dxy,
                GroupLabel::Pair("A".into(), "B".into()),
                RawCounts::new(0, 0, 4, 0),
            ),
        ]
    }

    fn write_tsv(path: &Path) {
        let mut sink = TsvSink::create(path).unwrap();
        sink.write_window(&window_records(0, 500)).unwrap();
        sink.write_window(&window_records(500, 1000)).unwrap();
        sink.finish().unwrap();
    }

    #[test]
    fn test_output_format_extension() {
        assert_eq!(OutputFormat::Tsv.extension(), "tsv");
        assert_eq!(OutputFormat::Json.extension(), "jsonl");
        assert_eq!(OutputFormat::Sqlite.extension(), "db");
        assert_eq!(OutputFormat::Parquet.extension(), "parquet");
        assert_eq!(
            OutputFormat::Tsv.output_path(Path::new("out"), "run1"),
            PathBuf::from("out/run1_diversity.tsv")
        );
    }

    #[test]
    fn test_output_format_serde() {
        let json = serde_json::to_string(&OutputFormat::Parquet).unwrap();
        assert_eq!(json, "\"parquet\"");

        let parsed: OutputFormat = serde_json::from_str("\"tsv\"").unwrap();
        assert_eq!(parsed, OutputFormat::Tsv);
    }

    #[test]
    fn test_tsv_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        write_tsv(&path);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], COLUMNS.join("\t"));
        assert_eq!(lines[1], "chr1\t0\t500\tpi\tA\tNA\t1\t500\t500\t0.002\t0");
        assert_eq!(lines[2], "chr1\t0\t500\tdxy\tA\tB\t0\t0\t0\tNA\t4");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_tsv_output_is_byte_identical_across_runs() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("a.tsv");
        let second = dir.path().join("b.tsv");
        write_tsv(&first);
        write_tsv(&second);

        assert_eq!(std::fs::read(&first).unwrap(), std::fs::read(&second).unwrap());
    }

    #[test]
    fn test_tsv_resume_drops_incomplete_window() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        write_tsv(&path);

        // simulate a crash halfway through a third window
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "chr1\t1000\t1500\tpi\tA\tNA\t0\t5").unwrap();
        drop(file);

        let (mut sink, completed) = TsvSink::resume(&path, 2).unwrap();
        assert_eq!(completed.len(), 2);
        assert!(completed.contains(&("chr1".to_string(), Window::new(500, 1000))));
        assert!(!completed.contains(&("chr1".to_string(), Window::new(1000, 1500))));

        sink.write_window(&window_records(1000, 1500)).unwrap();
        sink.finish().unwrap();

        let reference = dir.path().join("reference.tsv");
        let mut full = TsvSink::create(&reference).unwrap();
        for (s, e) in [(0, 500), (500, 1000), (1000, 1500)] {
            full.write_window(&window_records(s, e)).unwrap();
        }
        full.finish().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), std::fs::read(&reference).unwrap());
    }

    #[test]
    fn test_json_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let mut sink = JsonLinesSink::create(&path).unwrap();
        sink.write_window(&window_records(0, 500)).unwrap();
        sink.finish().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let rows: Vec<RecordRow> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].estimate, Some(0.002));
        assert_eq!(rows[0].pop2, None);
        assert_eq!(rows[1].estimate, None);
    }

    #[test]
    fn test_sqlite_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.db");
        let mut sink = SqliteSink::create(&path).unwrap();
        sink.write_window(&window_records(0, 500)).unwrap();
        sink.finish().unwrap();

        let conn = Connection::open(&path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);

        let estimate: Option<f64> = conn
            .query_row(
                "SELECT estimate FROM records WHERE statistic = 'dxy'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(estimate, None);
    }

    #[test]
    fn test_parquet_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.parquet");
        let mut sink = ParquetSink::create(&path).unwrap();
        sink.write_window(&window_records(0, 500)).unwrap();
        assert_eq!(sink.finish().unwrap(), Some(path.clone()));

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], b"PAR1");
        assert_eq!(&bytes[bytes.len() - 4..], b"PAR1");
    }
}
