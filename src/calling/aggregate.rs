// Copyright 2026 svpileup developers.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::{HashMap, HashSet};
use std::convert::TryFrom;
use std::path::PathBuf;

use anyhow::Result;
use derive_builder::Builder;
use itertools::Itertools;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Bfs;
use rust_htslib::bam;
use rust_htslib::bam::record::{Aux, Cigar, CigarString};
use rust_htslib::bam::Read;

use crate::errors::Error;
use crate::metrics::{self, AggregatedBreakpointPileup, BreakpointPileup};
use crate::targets::TargetIndex;
use crate::utils::join_positions;

/// Clusters nearby breakpoints that share contig/strand topology and
/// annotates the clusters with allele frequencies and target overlap.
#[derive(Builder)]
#[builder(pattern = "owned")]
pub struct Caller {
    input: PathBuf,
    output: PathBuf,
    #[builder(default)]
    bam: Option<PathBuf>,
    flank: u64,
    min_breakpoint_support: u64,
    min_frequency: f64,
    #[builder(default)]
    targets: Option<TargetIndex>,
    max_dist: u64,
}

/// An aggregated cluster plus the per-side breakend positions needed by the
/// allele-frequency scan.
struct Aggregate {
    row: AggregatedBreakpointPileup,
    left_positions: Vec<u64>,
    right_positions: Vec<u64>,
}

impl Caller {
    pub fn call(&mut self) -> Result<()> {
        let pileups = metrics::read_pileups(&self.input)?;
        info!("{} breakpoint pileups read.", pileups.len());

        let mut partitions: HashMap<(String, String, char, char), Vec<usize>> = HashMap::new();
        for (idx, row) in pileups.iter().enumerate() {
            partitions
                .entry((
                    row.left_contig.clone(),
                    row.right_contig.clone(),
                    row.left_strand,
                    row.right_strand,
                ))
                .or_default()
                .push(idx);
        }

        let mut aggregates = Vec::new();
        for indices in partitions.values() {
            let members: Vec<&BreakpointPileup> =
                indices.iter().map(|&idx| &pileups[idx]).collect();
            for cluster in clusters(&members, self.max_dist) {
                let rows: Vec<&BreakpointPileup> =
                    cluster.iter().map(|&idx| members[idx]).collect();
                aggregates.push(aggregate_cluster(&rows));
            }
        }

        let mut bam_reader = match &self.bam {
            Some(path) => Some(bam::IndexedReader::from_path(path)?),
            None => None,
        };
        for aggregate in &mut aggregates {
            if let Some(reader) = bam_reader.as_mut() {
                aggregate.row.left_frequency = side_frequency(
                    reader,
                    &aggregate.row.left_contig,
                    &aggregate.left_positions,
                    aggregate.row.left_min_pos,
                    aggregate.row.left_max_pos,
                    aggregate.row.total,
                    self.flank,
                    self.min_breakpoint_support,
                    self.min_frequency,
                )?;
                aggregate.row.right_frequency = side_frequency(
                    reader,
                    &aggregate.row.right_contig,
                    &aggregate.right_positions,
                    aggregate.row.right_min_pos,
                    aggregate.row.right_max_pos,
                    aggregate.row.total,
                    self.flank,
                    self.min_breakpoint_support,
                    self.min_frequency,
                )?;
            }
            if let Some(targets) = &self.targets {
                let row = &mut aggregate.row;
                row.left_overlaps_target =
                    Some(targets.overlaps_any(&row.left_contig, row.left_min_pos, row.left_max_pos));
                row.left_targets =
                    targets.annotation(&row.left_contig, row.left_min_pos, row.left_max_pos);
                row.right_overlaps_target = Some(targets.overlaps_any(
                    &row.right_contig,
                    row.right_min_pos,
                    row.right_max_pos,
                ));
                row.right_targets =
                    targets.annotation(&row.right_contig, row.right_min_pos, row.right_max_pos);
            }
        }

        let mut rows: Vec<AggregatedBreakpointPileup> =
            aggregates.into_iter().map(|aggregate| aggregate.row).collect();
        rows.sort_by(|a, b| {
            (&a.left_contig, a.left_min_pos, &a.right_contig, a.right_min_pos).cmp(&(
                &b.left_contig,
                b.left_min_pos,
                &b.right_contig,
                b.right_min_pos,
            ))
        });
        info!("{} aggregated pileups written.", rows.len());
        metrics::write(&self.output, &rows)?;
        Ok(())
    }
}

fn distance(a: u64, b: u64) -> u64 {
    a.max(b) - a.min(b)
}

fn neighbors(a: &BreakpointPileup, b: &BreakpointPileup, max_dist: u64) -> bool {
    a.id != b.id
        && distance(a.left_pos, b.left_pos) <= max_dist
        && distance(a.right_pos, b.right_pos) <= max_dist
}

/// Connected components of the neighbor graph within one partition.
fn clusters(rows: &[&BreakpointPileup], max_dist: u64) -> Vec<Vec<usize>> {
    let mut graph: UnGraph<usize, ()> = UnGraph::new_undirected();
    let nodes: Vec<NodeIndex> = (0..rows.len()).map(|idx| graph.add_node(idx)).collect();
    for i in 0..rows.len() {
        for j in (i + 1)..rows.len() {
            if neighbors(rows[i], rows[j], max_dist) {
                graph.add_edge(nodes[i], nodes[j], ());
            }
        }
    }
    let mut assigned = vec![false; rows.len()];
    let mut components = Vec::new();
    for (i, &start) in nodes.iter().enumerate() {
        if assigned[i] {
            continue;
        }
        let mut component = Vec::new();
        let mut bfs = Bfs::new(&graph, start);
        while let Some(node) = bfs.next(&graph) {
            let idx = graph[node];
            if !assigned[idx] {
                assigned[idx] = true;
                component.push(idx);
            }
        }
        component.sort_unstable();
        components.push(component);
    }
    components
}

fn category(row: &BreakpointPileup) -> &'static str {
    if row.left_contig != row.right_contig {
        "Inter-contig rearrangement"
    } else if row.left_strand != row.right_strand {
        "Intra-contig rearrangement"
    } else {
        "Possible deletion"
    }
}

fn aggregate_cluster(rows: &[&BreakpointPileup]) -> Aggregate {
    let first = rows.first().expect("clusters are non-empty");
    let id = rows.iter().map(|row| row.id.as_str()).sorted().join("_");
    let left_positions: Vec<u64> = rows
        .iter()
        .map(|row| row.left_pos)
        .sorted()
        .dedup()
        .collect();
    let right_positions: Vec<u64> = rows
        .iter()
        .map(|row| row.right_pos)
        .sorted()
        .dedup()
        .collect();
    let split_reads = rows.iter().map(|row| row.split_reads).sum();
    let read_pairs = rows.iter().map(|row| row.read_pairs).sum();
    let total = rows.iter().map(|row| row.total).sum();
    let row = AggregatedBreakpointPileup {
        id,
        category: category(first).to_owned(),
        left_contig: first.left_contig.clone(),
        left_min_pos: left_positions[0],
        left_max_pos: left_positions[left_positions.len() - 1],
        left_strand: first.left_strand,
        right_contig: first.right_contig.clone(),
        right_min_pos: right_positions[0],
        right_max_pos: right_positions[right_positions.len() - 1],
        right_strand: first.right_strand,
        split_reads,
        read_pairs,
        total,
        left_pileups: join_positions(&left_positions),
        right_pileups: join_positions(&right_positions),
        left_frequency: None,
        right_frequency: None,
        left_overlaps_target: None,
        right_overlaps_target: None,
        left_targets: None,
        right_targets: None,
    };
    Aggregate {
        row,
        left_positions,
        right_positions,
    }
}

/// Reference span of the mate, recovered from the mate-cigar tag.
fn mate_end_from_mc(rec: &bam::Record) -> Option<u64> {
    match rec.aux(b"MC") {
        Ok(Aux::String(mc)) => CigarString::try_from(mc).ok().map(|cigar| {
            let ref_len: u64 = cigar
                .iter()
                .map(|op| match op {
                    Cigar::Match(l)
                    | Cigar::Del(l)
                    | Cigar::RefSkip(l)
                    | Cigar::Equal(l)
                    | Cigar::Diff(l) => *l as u64,
                    _ => 0,
                })
                .sum();
            rec.mpos() as u64 + ref_len
        }),
        _ => None,
    }
}

fn is_fr_pair(rec: &bam::Record) -> bool {
    rec.is_paired()
        && !rec.is_mate_unmapped()
        && rec.tid() == rec.mtid()
        && ((!rec.is_reverse() && rec.is_mate_reverse() && rec.pos() <= rec.mpos())
            || (rec.is_reverse() && !rec.is_mate_reverse() && rec.mpos() <= rec.pos()))
}

/// 1-based inclusive span a record vouches for: the full template span for an
/// FR pair with a recoverable mate end, the record's own span otherwise.
fn template_span(rec: &bam::Record) -> (u64, u64) {
    let start = rec.pos() as u64 + 1;
    let end = rec.cigar().end_pos() as u64;
    if is_fr_pair(rec) {
        if let Some(mate_end) = mate_end_from_mc(rec) {
            let mate_start = rec.mpos() as u64 + 1;
            return (start.min(mate_start), end.max(mate_end));
        }
    }
    (start, end)
}

/// Fraction of templates near one side of an aggregated pileup that support
/// the breakpoint. Scanning stops as soon as the overlapper count proves the
/// frequency cannot reach `min_frequency`.
#[allow(clippy::too_many_arguments)]
fn side_frequency(
    reader: &mut bam::IndexedReader,
    contig: &str,
    positions: &[u64],
    min_pos: u64,
    max_pos: u64,
    total: u64,
    flank: u64,
    min_breakpoint_support: u64,
    min_frequency: f64,
) -> Result<Option<f64>> {
    if total < min_breakpoint_support {
        return Ok(None);
    }
    let tid = reader
        .header()
        .tid(contig.as_bytes())
        .ok_or_else(|| Error::MissingContig {
            contig: contig.to_owned(),
        })?;
    let fetch_start = min_pos.saturating_sub(flank).saturating_sub(1);
    let fetch_end = max_pos + flank;
    reader.fetch((tid as i32, fetch_start as i64, fetch_end as i64))?;
    let bound = total as f64 / min_frequency;
    let mut overlappers: HashSet<Vec<u8>> = HashSet::new();
    for result in reader.records() {
        let rec = result?;
        if rec.is_unmapped() || rec.is_secondary() || rec.is_supplementary() {
            continue;
        }
        let (span_start, span_end) = template_span(&rec);
        if positions
            .iter()
            .any(|&pos| span_start <= pos && pos <= span_end)
        {
            overlappers.insert(rec.qname().to_vec());
            if overlappers.len() as f64 > bound {
                debug!(
                    "abandoning allele-frequency scan at {}:{}-{} after {} overlappers",
                    contig,
                    min_pos,
                    max_pos,
                    overlappers.len()
                );
                return Ok(None);
            }
        }
    }
    if overlappers.is_empty() {
        Ok(None)
    } else {
        Ok(Some((total as f64 / overlappers.len() as f64).min(1.0)))
    }
}
