// ==============================================================================
// aggregator.rs - Per-Window Record Aggregation
// ==============================================================================
// Description: Turns filtered calls into one raw-count record per window,
//              statistic and population (pair); re-aggregates fine windows
//              into coarser ones by summing raw counts
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use std::collections::BTreeMap;
use tracing::debug;

use crate::config::RunConfig;
use crate::diversity::{dxy_site, pi_site, PopulationTally};
use crate::filter::FilteredSlice;
use crate::models::{GroupLabel, RawCounts, RawStatisticRecord, StatKind, Window};
use crate::populations::ResolvedPopulations;

/// Records for one window
///
/// # Arguments
/// * `window` - Window (must lie inside the slice's fetched range)
/// * `slice` - Filtered calls covering the window
/// * `populations` - Populations resolved against the store
/// * `config` - Requested statistics, ploidy and difference convention
///
/// # Returns
/// * π records (population name order) followed by d_xy records (pair
///   order); records with a zero denominator are still emitted
pub fn aggregate(
    window: Window,
    slice: &FilteredSlice,
    populations: &ResolvedPopulations,
    config: &RunConfig,
) -> Vec<RawStatisticRecord> {
    let pops = populations.populations();
    let pairs = populations.pairs();
    let want_pi = config.wants(StatKind::Pi);
    let want_dxy = config.wants(StatKind::Dxy);

    let mut pi = vec![RawCounts::default(); if want_pi { pops.len() } else { 0 }];
    let mut dxy = vec![RawCounts::default(); if want_dxy { pairs.len() } else { 0 }];

    let range = slice.site_range(window.start, window.end);
    for site in range {
        if !slice.is_retained(site) {
            continue;
        }

        let tallies: Vec<PopulationTally> = pops
            .iter()
            .map(|p| PopulationTally::from_site(slice, site, &p.sample_indices))
            .collect();

        for (counts, tally) in pi.iter_mut().zip(&tallies) {
            *counts += pi_site(tally, config.ploidy, config.diff_convention);
        }
        for (counts, &(i, j)) in dxy.iter_mut().zip(&pairs) {
            *counts += dxy_site(&tallies[i], &tallies[j], config.ploidy, config.diff_convention);
        }
    }

    let mut records = Vec::with_capacity(pi.len() + dxy.len());
    for (counts, pop) in pi.into_iter().zip(pops) {
        records.push(RawStatisticRecord::new(
            slice.contig.clone(),
            window,
            StatKind::Pi,
            GroupLabel::Population(pop.name.clone()),
            counts,
        ));
    }
    for (counts, (i, j)) in dxy.into_iter().zip(pairs) {
        records.push(RawStatisticRecord::new(
            slice.contig.clone(),
            window,
            StatKind::Dxy,
            GroupLabel::Pair(pops[i].name.clone(), pops[j].name.clone()),
            counts,
        ));
    }

    let undefined = records.iter().filter(|r| r.is_undefined()).count();
    if undefined > 0 {
        debug!(
            "{}:{} has {} records with insufficient data",
            slice.contig, window, undefined
        );
    }

    records
}

/// Sum fine-window records into coarser windows
///
/// A record contributes to a coarse window only when its window lies
/// entirely inside it. Output is ordered by contig (first appearance),
/// coarse window, statistic kind, then label. Every grouping seen on a
/// contig gets a record for each coarse window, with zero counts when
/// nothing fell inside.
pub fn reaggregate(records: &[RawStatisticRecord], coarser: &[Window]) -> Vec<RawStatisticRecord> {
    let mut contigs: Vec<&str> = Vec::new();
    for record in records {
        if !contigs.contains(&record.contig.as_str()) {
            contigs.push(&record.contig);
        }
    }

    let mut output = Vec::new();
    for contig in contigs {
        let on_contig: Vec<&RawStatisticRecord> =
            records.iter().filter(|r| r.contig == contig).collect();

        for coarse in coarser {
            let mut sums: BTreeMap<(StatKind, GroupLabel), RawCounts> = on_contig
                .iter()
                .map(|r| ((r.kind, r.label.clone()), RawCounts::default()))
                .collect();

            for record in on_contig.iter().filter(|r| coarse.contains(&r.window)) {
                if let Some(counts) = sums.get_mut(&(record.kind, record.label.clone())) {
                    *counts += record.counts;
                }
            }

            output.extend(sums.into_iter().map(|((kind, label), counts)| {
                RawStatisticRecord::new(contig, *coarse, kind, label, counts)
            }));
        }
    }

    output
}
