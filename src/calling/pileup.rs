// Copyright 2026 svpileup developers.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use derive_builder::Builder;
use rust_htslib::bam;
use rust_htslib::bam::record::Aux;
use rust_htslib::bam::Read;

use crate::errors::Error;
use crate::metrics::{self, BreakpointPileup};
use crate::model::evidence::{detect_breakpoints, BreakpointEvidence};
use crate::model::segment::chain_of;
use crate::model::template::TemplateIterator;
use crate::model::{Breakpoint, EvidenceType};
use crate::reference::SequenceDictionary;
use crate::targets::{TargetIndex, TargetsBedRequirement};
use crate::utils::strand_char;

/// Per-breakpoint evidence counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakpointInfo {
    pub id: u64,
    pub split_reads: u64,
    pub read_pairs: u64,
}

impl BreakpointInfo {
    pub fn total(&self) -> u64 {
        self.split_reads + self.read_pairs
    }
}

/// Process-lifetime mapping from canonical breakpoints to evidence counts.
/// Ids are assigned monotonically on first observation.
#[derive(Debug, Default)]
pub struct BreakpointTracker {
    counts: HashMap<Breakpoint, BreakpointInfo>,
    next_id: u64,
}

impl BreakpointTracker {
    /// Record one piece of evidence and return the breakpoint's id.
    pub fn count(&mut self, breakpoint: &Breakpoint, evidence: EvidenceType) -> u64 {
        debug_assert!(breakpoint.is_canonical());
        let next_id = &mut self.next_id;
        let info = self.counts.entry(*breakpoint).or_insert_with(|| {
            let id = *next_id;
            *next_id += 1;
            BreakpointInfo {
                id,
                split_reads: 0,
                read_pairs: 0,
            }
        });
        match evidence {
            EvidenceType::SplitRead => info.split_reads += 1,
            EvidenceType::ReadPair => info.read_pairs += 1,
        }
        info.id
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Consume the tracker, yielding breakpoints in paired order so that
    /// related events end up adjacent in the emitted table.
    pub fn into_sorted(self) -> Vec<(Breakpoint, BreakpointInfo)> {
        let mut entries: Vec<_> = self.counts.into_iter().collect();
        entries.sort_by(|(a, _), (b, _)| a.paired_cmp(b));
        entries
    }
}

/// Append the tag elements contributed by one piece of evidence to the
/// per-record tag map. Elements read `<id>;<left|right>;<from|into>;<kind>`.
fn annotate(tags: &mut HashMap<usize, Vec<String>>, evidence: &BreakpointEvidence, id: u64) {
    let kind = evidence.evidence.snake_name();
    let (from_side, into_side) = if evidence.from_is_left {
        ("left", "right")
    } else {
        ("right", "left")
    };
    for &idx in &evidence.from {
        tags.entry(idx)
            .or_default()
            .push(format!("{};{};from;{}", id, from_side, kind));
    }
    for &idx in &evidence.into {
        tags.entry(idx)
            .or_default()
            .push(format!("{};{};into;{}", id, into_side, kind));
    }
}

/// Drives the main pass: templates in, annotated alignments and the
/// breakpoint table out.
#[derive(Builder)]
#[builder(pattern = "owned")]
pub struct Caller {
    #[builder(private)]
    bam_reader: bam::Reader,
    #[builder(private)]
    bam_writer: bam::Writer,
    #[builder(private)]
    dict: SequenceDictionary,
    #[builder(private)]
    output_table: PathBuf,
    max_read_pair_inner_distance: u64,
    max_aligned_segment_inner_distance: u64,
    min_primary_mapq: u8,
    min_supplementary_mapq: u8,
    min_unique_bases_to_add: u64,
    slop: u64,
    #[builder(default = "\"be\".to_owned()")]
    tag: String,
    #[builder(default)]
    targets: Option<TargetIndex>,
    #[builder(default = "TargetsBedRequirement::AnnotateOnly")]
    targets_requirement: TargetsBedRequirement,
}

impl CallerBuilder {
    /// Open the input and derive the two output paths from the prefix.
    pub fn io<P: AsRef<Path>>(self, input: P, output_prefix: P) -> Result<Self> {
        let bam_reader = bam::Reader::from_path(input.as_ref())?;
        let dict = SequenceDictionary::from_header(bam_reader.header())?;
        let header = bam::Header::from_template(bam_reader.header());
        let prefix = output_prefix.as_ref().display().to_string();
        let bam_writer = bam::Writer::from_path(
            PathBuf::from(format!("{}.bam", prefix)),
            &header,
            bam::Format::Bam,
        )?;
        Ok(self
            .bam_reader(bam_reader)
            .dict(dict)
            .bam_writer(bam_writer)
            .output_table(PathBuf::from(format!("{}.txt", prefix))))
    }
}

impl Caller {
    pub fn call(&mut self) -> Result<()> {
        let mut tracker = BreakpointTracker::default();
        let mut n_templates = 0u64;

        for template in TemplateIterator::new(self.bam_reader.records()) {
            let mut template = template?;
            n_templates += 1;
            let mut tags: HashMap<usize, Vec<String>> = HashMap::new();
            if let Some(indices) =
                template.filtered(self.min_primary_mapq, self.min_supplementary_mapq)
            {
                match chain_of(&template, &indices, self.min_unique_bases_to_add, self.slop) {
                    Ok(chain) => {
                        // commit the template's evidence only once detection
                        // has completed for the whole chain
                        for evidence in detect_breakpoints(
                            &chain,
                            self.max_aligned_segment_inner_distance,
                            self.max_read_pair_inner_distance,
                            &self.dict,
                        ) {
                            let id = tracker.count(&evidence.breakpoint, evidence.evidence);
                            annotate(&mut tags, &evidence, id);
                        }
                    }
                    Err(e @ Error::MalformedAlignment { .. })
                    | Err(e @ Error::EmptyTemplate { .. }) => {
                        warn!("skipping template: {}", e);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            for (idx, rec) in template.recs.iter_mut().enumerate() {
                if let Some(elements) = tags.get(&idx) {
                    rec.push_aux(self.tag.as_bytes(), Aux::String(&elements.join(",")))?;
                }
                self.bam_writer.write(rec)?;
            }
            if n_templates % 100_000 == 0 {
                info!("{} templates processed.", n_templates);
            }
        }

        let rows = self.rows(tracker)?;
        info!(
            "{} templates processed, {} breakpoints written.",
            n_templates,
            rows.len()
        );
        metrics::write(&self.output_table, &rows)?;
        Ok(())
    }

    fn rows(&self, tracker: BreakpointTracker) -> Result<Vec<BreakpointPileup>> {
        let mut rows = Vec::with_capacity(tracker.len());
        for (breakpoint, info) in tracker.into_sorted() {
            let left_contig = self.dict.name(breakpoint.left_ref_index)?.to_owned();
            let right_contig = self.dict.name(breakpoint.right_ref_index)?.to_owned();
            let (left_overlap, right_overlap) = match &self.targets {
                Some(targets) => (
                    targets.overlaps_any(&left_contig, breakpoint.left_pos, breakpoint.left_pos),
                    targets.overlaps_any(
                        &right_contig,
                        breakpoint.right_pos,
                        breakpoint.right_pos,
                    ),
                ),
                None => (false, false),
            };
            let keep = match self.targets_requirement {
                TargetsBedRequirement::AnnotateOnly => true,
                TargetsBedRequirement::OverlapAny => left_overlap || right_overlap,
                TargetsBedRequirement::OverlapBoth => left_overlap && right_overlap,
            };
            if !keep {
                continue;
            }
            let left_targets = self.targets.as_ref().and_then(|targets| {
                targets.annotation(&left_contig, breakpoint.left_pos, breakpoint.left_pos)
            });
            let right_targets = self.targets.as_ref().and_then(|targets| {
                targets.annotation(&right_contig, breakpoint.right_pos, breakpoint.right_pos)
            });
            rows.push(BreakpointPileup {
                id: info.id.to_string(),
                left_contig,
                left_pos: breakpoint.left_pos,
                left_strand: strand_char(breakpoint.left_positive),
                right_contig,
                right_pos: breakpoint.right_pos,
                right_strand: strand_char(breakpoint.right_positive),
                split_reads: info.split_reads,
                read_pairs: info.read_pairs,
                total: info.total(),
                left_targets,
                right_targets,
            });
        }
        Ok(rows)
    }
}
