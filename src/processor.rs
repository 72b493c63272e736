// ==============================================================================
// processor.rs - Diversity Run Orchestration
// ==============================================================================
// Description: Plans chunked store reads per contig, evaluates chunks on the
//              blocking pool and emits per-window records in window order
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Pipeline per contig:
//   resolve windows → plan chunk reads (≤ chunk_size bp, long windows split
//   into sub-windows) → fetch + filter + aggregate per chunk (blocking pool,
//   ≤ threads in flight) → await in submission order → sum sub-window pieces
//   → emit each complete window
// ==============================================================================

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::aggregator::{aggregate, reaggregate};
use crate::config::{ConfigError, ContigSelection, RunConfig};
use crate::filter::{filter, FilterTally};
use crate::models::{RawStatisticRecord, StatKind, Window};
use crate::output::RecordSink;
use crate::populations::{PopulationMap, ResolvedPopulations};
use crate::store::{ContigInfo, GenotypeStore, RangeError, StoreError};
use crate::windows::{WindowError, WindowSpec};

/// Shared cancellation flag, checked between chunks
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Completed,
    Cancelled,
}

/// A contig that could not be processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedContig {
    pub contig: String,
    pub reason: String,
    /// Windows of this contig written before the failure
    pub windows_emitted: u64,
}

/// Totals of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub contigs_processed: usize,
    pub windows: u64,
    pub skipped_windows: u64,
    pub records: u64,
    pub undefined_records: u64,
    pub failed_contigs: Vec<FailedContig>,
    pub filter: FilterTally,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            outcome: RunOutcome::Completed,
            contigs_processed: 0,
            windows: 0,
            skipped_windows: 0,
            records: 0,
            undefined_records: 0,
            failed_contigs: Vec::new(),
            filter: FilterTally::default(),
        }
    }
}

/// Part of a window evaluated by one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
struct Piece {
    window: Window,
    part: Window,
    completes_window: bool,
}

/// One store read and the window pieces it serves
#[derive(Debug, Clone, PartialEq, Eq)]
struct WorkUnit {
    span: Window,
    pieces: Vec<Piece>,
}

struct UnitResult {
    pieces: Vec<(Piece, Vec<RawStatisticRecord>)>,
    tally: FilterTally,
    sites: usize,
}

/// Group windows into chunk reads of at most `chunk_size` bp
///
/// Windows longer than `chunk_size` are split into consecutive sub-windows,
/// one per unit; the last sub-window is flagged as completing the window.
fn plan_units(windows: &[Window], chunk_size: u64) -> Vec<WorkUnit> {
    let mut units: Vec<WorkUnit> = Vec::new();
    let mut current: Option<WorkUnit> = None;

    for &window in windows {
        if window.len() > chunk_size {
            if let Some(unit) = current.take() {
                units.push(unit);
            }
            let mut start = window.start;
            while start < window.end {
                let end = start.saturating_add(chunk_size).min(window.end);
                let part = Window::new(start, end);
                units.push(WorkUnit {
                    span: part,
                    pieces: vec![Piece {
                        window,
                        part,
                        completes_window: end == window.end,
                    }],
                });
                start = end;
            }
            continue;
        }

        let piece = Piece {
            window,
            part: window,
            completes_window: true,
        };

        match current.as_mut() {
            Some(unit) if window.end - unit.span.start <= chunk_size => {
                unit.span.end = window.end;
                unit.pieces.push(piece);
            }
            _ => {
                if let Some(unit) = current.take() {
                    units.push(unit);
                }
                current = Some(WorkUnit {
                    span: window,
                    pieces: vec![piece],
                });
            }
        }
    }

    if let Some(unit) = current {
        units.push(unit);
    }
    units
}

fn evaluate_unit(
    store: &dyn GenotypeStore,
    contig: &str,
    unit: &WorkUnit,
    config: &RunConfig,
    populations: &ResolvedPopulations,
) -> Result<UnitResult, StoreError> {
    let slice = store.fetch(contig, unit.span.start, unit.span.end)?;
    let filtered = filter(&slice, &config.filter, populations);

    let pieces = unit
        .pieces
        .iter()
        .map(|piece| {
            let records = aggregate(piece.part, &filtered, populations, config);
            (piece.clone(), records)
        })
        .collect();

    Ok(UnitResult {
        pieces,
        tally: filtered.tally,
        sites: slice.len(),
    })
}

/// Computes windowed π and d_xy for every selected contig of a store
pub struct DiversityProcessor {
    config: Arc<RunConfig>,
    populations: Arc<ResolvedPopulations>,
    completed: HashSet<(String, Window)>,
}

impl DiversityProcessor {
    /// Validate the configuration and resolve populations against the store
    ///
    /// # Arguments
    /// * `config` - Run configuration
    /// * `populations` - Population map
    /// * `store` - Store the run will read
    ///
    /// # Returns
    /// * `Ok(DiversityProcessor)` - Ready to run
    /// * `Err(ConfigError)` - Invalid configuration; nothing has been computed
    pub fn new(
        config: RunConfig,
        populations: &PopulationMap,
        store: &dyn GenotypeStore,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        if store.ploidy() != config.ploidy {
            return Err(ConfigError::StorePloidyMismatch {
                store: store.ploidy(),
                run: config.ploidy,
            });
        }

        let resolved = populations.resolve(store.samples(), &config.stats)?;

        Ok(Self {
            config: Arc::new(config),
            populations: Arc::new(resolved),
            completed: HashSet::new(),
        })
    }

    /// Skip windows already present in a resumed output
    pub fn with_completed_windows(mut self, completed: HashSet<(String, Window)>) -> Self {
        self.completed = completed;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn populations(&self) -> &ResolvedPopulations {
        &self.populations
    }

    /// Records every complete window carries
    pub fn records_per_window(&self) -> usize {
        records_per_window(&self.config, self.populations.populations().len())
    }

    /// Main processing pipeline
    pub async fn run(
        &self,
        store: Arc<dyn GenotypeStore>,
        sink: &mut dyn RecordSink,
        cancel: &CancellationFlag,
    ) -> Result<RunSummary> {
        info!(
            "Starting diversity run: {} populations, statistics {:?}, {} threads",
            self.populations.populations().len(),
            self.config.stats,
            self.config.threads
        );

        // 1. Select contigs
        let contigs = self.select_contigs(store.as_ref());
        let mut summary = RunSummary::new();

        // 2. Process contigs in order
        for contig in contigs {
            if cancel.is_cancelled() {
                break;
            }

            let windows = match self.contig_windows(store.as_ref(), &contig) {
                Ok(windows) => windows,
                Err(WindowError::Range(e)) => {
                    error!("Skipping contig {}: {}", contig, e);
                    summary.failed_contigs.push(FailedContig {
                        contig: contig.clone(),
                        reason: e.to_string(),
                        windows_emitted: 0,
                    });
                    continue;
                }
                Err(WindowError::Config(e)) => return Err(e).context("Invalid window configuration"),
            };

            let total = windows.len();
            let windows: Vec<Window> = windows
                .into_iter()
                .filter(|w| !self.completed.contains(&(contig.clone(), *w)))
                .collect();
            summary.skipped_windows += (total - windows.len()) as u64;

            if windows.is_empty() {
                debug!("No windows to compute on {}", contig);
                continue;
            }

            info!("Processing {}: {} windows", contig, windows.len());
            match self
                .process_contig(&store, &contig, &windows, sink, cancel, &mut summary)
                .await
            {
                Ok(()) => summary.contigs_processed += 1,
                Err(ContigFailure::Range {
                    error: e,
                    windows_emitted,
                }) => {
                    error!(
                        "Contig {} failed after {} of {} windows: {}",
                        contig,
                        windows_emitted,
                        windows.len(),
                        e
                    );
                    summary.failed_contigs.push(FailedContig {
                        contig: contig.clone(),
                        reason: e.to_string(),
                        windows_emitted,
                    });
                }
                Err(ContigFailure::Fatal(e)) => return Err(e),
            }
        }

        if cancel.is_cancelled() {
            warn!("Run cancelled; output holds every window completed so far");
            summary.outcome = RunOutcome::Cancelled;
        }

        if summary.undefined_records > 0 {
            warn!(
                "{} records have insufficient data (denominator 0, estimate NA)",
                summary.undefined_records
            );
        }

        info!(
            "Diversity run finished: {} windows, {} records, {} failed contigs",
            summary.windows,
            summary.records,
            summary.failed_contigs.len()
        );
        Ok(summary)
    }

    fn select_contigs(&self, store: &dyn GenotypeStore) -> Vec<String> {
        let available: Vec<ContigInfo> = store.contigs();

        if let WindowSpec::Explicit { windows } = &self.config.windows {
            for contig in windows.keys() {
                if !available.iter().any(|c| &c.name == contig) {
                    warn!("Window list contig {} is not in the genotype data; skipping", contig);
                }
            }
        }

        match &self.config.contigs {
            ContigSelection::All => available.into_iter().map(|c| c.name).collect(),
            ContigSelection::List(list) => list.clone(),
        }
    }

    fn contig_windows(&self, store: &dyn GenotypeStore, contig: &str) -> Result<Vec<Window>, WindowError> {
        let length = store.contig_length(contig)?;
        self.config.windows.resolve(contig, length)
    }

    async fn process_contig(
        &self,
        store: &Arc<dyn GenotypeStore>,
        contig: &str,
        windows: &[Window],
        sink: &mut dyn RecordSink,
        cancel: &CancellationFlag,
        summary: &mut RunSummary,
    ) -> Result<(), ContigFailure> {
        let units = plan_units(windows, self.config.chunk_size);
        debug!("{}: {} windows in {} chunks", contig, windows.len(), units.len());

        let mut in_flight: VecDeque<JoinHandle<Result<UnitResult, StoreError>>> = VecDeque::new();
        let mut collector = WindowCollector::default();
        let mut units = units.into_iter();
        let windows_before = summary.windows;

        loop {
            // Keep up to `threads` chunks in flight unless cancelled
            while in_flight.len() < self.config.threads && !cancel.is_cancelled() {
                let Some(unit) = units.next() else { break };
                in_flight.push_back(tokio::task::spawn_blocking({
                    let store = store.clone();
                    let config = self.config.clone();
                    let populations = self.populations.clone();
                    let contig = contig.to_string();
                    move || evaluate_unit(store.as_ref(), &contig, &unit, &config, &populations)
                }));
            }

            let Some(handle) = in_flight.pop_front() else { break };
            let result = handle
                .await
                .context("Chunk evaluation task failed")
                .map_err(ContigFailure::Fatal)?;

            let result = match result {
                Ok(result) => result,
                Err(StoreError::Range(e)) => {
                    // Let in-flight reads finish before giving up on this contig
                    for handle in in_flight.drain(..) {
                        let _ = handle.await;
                    }
                    return Err(ContigFailure::Range {
                        error: e,
                        windows_emitted: summary.windows - windows_before,
                    });
                }
                Err(e) => {
                    return Err(ContigFailure::Fatal(
                        anyhow::Error::new(e).context(format!("Failed to read {}", contig)),
                    ))
                }
            };

            debug!(
                "{}: chunk of {} sites, {} retained, {} excluded",
                contig,
                result.sites,
                result.tally.retained_sites,
                result.tally.excluded_sites()
            );
            summary.filter += result.tally;

            for (piece, records) in result.pieces {
                if let Some(window_records) = collector.add(piece, records) {
                    summary.windows += 1;
                    summary.records += window_records.len() as u64;
                    summary.undefined_records +=
                        window_records.iter().filter(|r| r.is_undefined()).count() as u64;
                    sink.write_window(&window_records)
                        .map_err(ContigFailure::Fatal)?;
                }
            }
        }

        if collector.has_partial() {
            debug!("{}: dropping partially computed window after cancellation", contig);
        }
        Ok(())
    }
}

/// Records each complete window carries for a configuration
pub fn records_per_window(config: &RunConfig, n_populations: usize) -> usize {
    let mut count = 0;
    if config.wants(StatKind::Pi) {
        count += n_populations;
    }
    if config.wants(StatKind::Dxy) {
        count += n_populations * n_populations.saturating_sub(1) / 2;
    }
    count
}

enum ContigFailure {
    Range {
        error: RangeError,
        windows_emitted: u64,
    },
    Fatal(anyhow::Error),
}

/// Reassembles windows from sub-window pieces, in order
#[derive(Default)]
struct WindowCollector {
    partial: Vec<RawStatisticRecord>,
    window: Option<Window>,
}

impl WindowCollector {
    /// Add one piece; returns the window's records once it is complete
    fn add(&mut self, piece: Piece, records: Vec<RawStatisticRecord>) -> Option<Vec<RawStatisticRecord>> {
        if piece.part == piece.window {
            return Some(records);
        }

        if self.window != Some(piece.window) {
            self.partial.clear();
            self.window = Some(piece.window);
        }
        self.partial.extend(records);

        if !piece.completes_window {
            return None;
        }

        let combined = reaggregate(&self.partial, &[piece.window]);
        self.partial.clear();
        self.window = None;
        Some(combined)
    }

    fn has_partial(&self) -> bool {
        self.window.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Estimate, GroupLabel, Site, VariantClass};
    use crate::output::VecSink;
    use crate::store::{GenotypeSlice, MemoryStore};
    use std::collections::BTreeMap;

    fn samples() -> Vec<String> {
        vec!["a1".into(), "a2".into(), "b1".into(), "b2".into()]
    }

    fn population_map() -> PopulationMap {
        PopulationMap::from_assignments(vec![("a1", "A"), ("a2", "A"), ("b1", "B"), ("b2", "B")])
            .unwrap()
    }

    fn site(contig: &str, position: u64, alleles: Vec<i16>) -> Site {
        let class = if alleles.iter().any(|&a| a > 0) {
            VariantClass::BiallelicSnp
        } else {
            VariantClass::Invariant
        };
        Site {
            contig: contig.into(),
            position,
            ref_allele: "A".into(),
            alt_alleles: vec![],
            class,
            alleles,
            depths: vec![Some(30); 4],
            qualities: vec![Some(60.0); 4],
        }
    }

    /// chr1: 1000 invariant sites with one A-heterozygote at 100;
    /// chr2: 300 sites with a fixed difference between A and B at 50
    fn store() -> Arc<dyn GenotypeStore> {
        let mut sites = Vec::new();
        for pos in 0..1000 {
            let alleles = if pos == 100 {
                vec![0, 1, 0, 0, 0, 0, 0, 0]
            } else {
                vec![0; 8]
            };
            sites.push(site("chr1", pos, alleles));
        }
        for pos in 0..300 {
            let alleles = if pos == 50 {
                vec![0, 0, 0, 0, 1, 1, 1, 1]
            } else {
                vec![0; 8]
            };
            sites.push(site("chr2", pos, alleles));
        }

        let contigs = vec![
            ContigInfo {
                name: "chr1".into(),
                length: 1000,
            },
            ContigInfo {
                name: "chr2".into(),
                length: 300,
            },
        ];
        Arc::new(MemoryStore::from_sites(samples(), 2, contigs, sites).unwrap())
    }

    fn config(window: u64, chunk: u64, threads: usize) -> RunConfig {
        RunConfig {
            windows: WindowSpec::fixed(window),
            chunk_size: chunk,
            threads,
            ..RunConfig::default()
        }
    }

    async fn run(config: RunConfig) -> (RunSummary, Vec<RawStatisticRecord>) {
        let store = store();
        let processor = DiversityProcessor::new(config, &population_map(), store.as_ref()).unwrap();
        let mut sink = VecSink::default();
        let summary = processor
            .run(store, &mut sink, &CancellationFlag::new())
            .await
            .unwrap();
        (summary, sink.records)
    }

    #[test]
    fn test_plan_units_groups_and_splits() {
        let windows = vec![
            Window::new(0, 100),
            Window::new(100, 200),
            Window::new(200, 300),
            Window::new(300, 650),
        ];
        let units = plan_units(&windows, 200);

        assert_eq!(units.len(), 4);
        assert_eq!(units[0].span, Window::new(0, 200));
        assert_eq!(units[0].pieces.len(), 2);
        assert_eq!(units[1].span, Window::new(200, 300));
        assert_eq!(units[2].span, Window::new(300, 500));
        assert!(!units[2].pieces[0].completes_window);
        assert_eq!(units[3].span, Window::new(500, 650));
        assert!(units[3].pieces[0].completes_window);
    }

    #[tokio::test]
    async fn test_chr1_scenario_end_to_end() {
        let (summary, records) = run(config(500, 100_000, 2)).await;
        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.contigs_processed, 2);

        let pi_a: Vec<&RawStatisticRecord> = records
            .iter()
            .filter(|r| {
                r.contig == "chr1"
                    && r.kind == StatKind::Pi
                    && r.label == GroupLabel::Population("A".into())
            })
            .collect();
        assert_eq!(pi_a.len(), 2);
        assert_eq!(pi_a[0].window, Window::new(0, 500));
        assert_eq!(pi_a[0].estimate(), Estimate::Defined(0.002));
        assert_eq!(pi_a[1].window, Window::new(500, 1000));
        assert_eq!(pi_a[1].counts.differences, 0);
        assert_eq!(pi_a[1].counts.comparisons, 500);
    }

    #[tokio::test]
    async fn test_output_order_independent_of_chunking() {
        let (_, reference) = run(config(100, 100_000, 1)).await;
        let (_, chunked) = run(config(100, 150, 4)).await;
        let (_, split) = run(config(100, 30, 3)).await;

        assert_eq!(reference, chunked);
        assert_eq!(reference, split);

        // window ascending, then statistic, then label
        let keys: Vec<(String, Window)> = reference
            .iter()
            .map(|r| (r.contig.clone(), r.window))
            .collect();
        let mut sorted_chr1: Vec<_> = keys.iter().filter(|k| k.0 == "chr1").cloned().collect();
        sorted_chr1.sort_by_key(|k| k.1);
        assert_eq!(
            keys.iter().filter(|k| k.0 == "chr1").cloned().collect::<Vec<_>>(),
            sorted_chr1
        );
    }

    #[tokio::test]
    async fn test_fixed_difference_dxy() {
        let (_, records) = run(config(300, 100_000, 2)).await;
        let dxy = records
            .iter()
            .find(|r| r.contig == "chr2" && r.kind == StatKind::Dxy)
            .unwrap();
        // 4 comparisons at the fixed site, 2 differences each
        assert_eq!(dxy.counts.differences, 8);
        assert_eq!(dxy.counts.comparisons, 300 * 4);
    }

    #[tokio::test]
    async fn test_unknown_contig_is_skipped() {
        let mut cfg = config(500, 100_000, 2);
        cfg.contigs = ContigSelection::List(vec!["chrZ".into(), "chr2".into()]);

        let (summary, records) = run(cfg).await;
        assert_eq!(summary.failed_contigs.len(), 1);
        assert_eq!(summary.failed_contigs[0].contig, "chrZ");
        assert!(records.iter().all(|r| r.contig == "chr2"));
        assert!(!records.is_empty());
    }

    #[tokio::test]
    async fn test_explicit_windows_past_contig_end() {
        let mut per_contig = BTreeMap::new();
        per_contig.insert("chr1".to_string(), vec![Window::new(0, 100)]);
        per_contig.insert("chr2".to_string(), vec![Window::new(0, 5000)]);
        let cfg = RunConfig {
            windows: WindowSpec::Explicit {
                windows: per_contig,
            },
            threads: 2,
            ..RunConfig::default()
        };

        let (summary, records) = run(cfg).await;
        assert_eq!(summary.failed_contigs.len(), 1);
        assert_eq!(summary.failed_contigs[0].contig, "chr2");
        assert_eq!(summary.failed_contigs[0].windows_emitted, 0);
        assert!(records.iter().all(|r| r.window == Window::new(0, 100)));
    }

    /// Store whose reads of `contig` fail past `readable_end`
    struct TruncatedStore {
        inner: Arc<dyn GenotypeStore>,
        contig: &'static str,
        readable_end: u64,
    }

    impl GenotypeStore for TruncatedStore {
        fn samples(&self) -> &[String] {
            self.inner.samples()
        }

        fn ploidy(&self) -> usize {
            self.inner.ploidy()
        }

        fn contigs(&self) -> Vec<ContigInfo> {
            self.inner.contigs()
        }

        fn fetch(&self, contig: &str, start: u64, end: u64) -> Result<GenotypeSlice, StoreError> {
            if contig == self.contig && end > self.readable_end {
                return Err(RangeError::OutOfBounds {
                    contig: contig.to_string(),
                    start,
                    end,
                    length: self.readable_end,
                }
                .into());
            }
            self.inner.fetch(contig, start, end)
        }
    }

    #[tokio::test]
    async fn test_mid_contig_failure_counts_emitted_windows() {
        let store: Arc<dyn GenotypeStore> = Arc::new(TruncatedStore {
            inner: store(),
            contig: "chr1",
            readable_end: 500,
        });
        let processor =
            DiversityProcessor::new(config(100, 100, 1), &population_map(), store.as_ref()).unwrap();
        let mut sink = VecSink::default();
        let summary = processor
            .run(store, &mut sink, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(summary.failed_contigs.len(), 1);
        assert_eq!(summary.failed_contigs[0].contig, "chr1");
        assert_eq!(summary.failed_contigs[0].windows_emitted, 5);
        assert_eq!(summary.contigs_processed, 1);

        let chr1_windows: HashSet<Window> = sink
            .records
            .iter()
            .filter(|r| r.contig == "chr1")
            .map(|r| r.window)
            .collect();
        assert_eq!(chr1_windows.len(), 5);
        assert!(chr1_windows.iter().all(|w| w.end <= 500));
        assert!(sink.records.iter().any(|r| r.contig == "chr2"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let store = store();
        let processor =
            DiversityProcessor::new(config(500, 100_000, 2), &population_map(), store.as_ref())
                .unwrap();
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let mut sink = VecSink::default();
        let summary = processor.run(store, &mut sink, &cancel).await.unwrap();
        assert_eq!(summary.outcome, RunOutcome::Cancelled);
        assert!(sink.records.is_empty());
    }

    #[tokio::test]
    async fn test_resume_skips_completed_windows() {
        let store = store();
        let mut completed = HashSet::new();
        completed.insert(("chr1".to_string(), Window::new(0, 500)));

        let processor =
            DiversityProcessor::new(config(500, 100_000, 2), &population_map(), store.as_ref())
                .unwrap()
                .with_completed_windows(completed);
        let mut sink = VecSink::default();
        let summary = processor
            .run(store, &mut sink, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(summary.skipped_windows, 1);
        assert!(sink
            .records
            .iter()
            .all(|r| !(r.contig == "chr1" && r.window == Window::new(0, 500))));
    }

    #[test]
    fn test_ploidy_mismatch_rejected() {
        let store = store();
        let cfg = RunConfig {
            ploidy: 4,
            ..config(500, 100_000, 1)
        };
        assert!(matches!(
            DiversityProcessor::new(cfg, &population_map(), store.as_ref()),
            Err(ConfigError::StorePloidyMismatch { .. })
        ));
    }

    #[test]
    fn test_records_per_window() {
        let cfg = config(500, 100_000, 1);
        assert_eq!(records_per_window(&cfg, 3), 3 + 3);
    }
}
