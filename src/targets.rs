use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use bio::data_structures::interval_tree::IntervalTree;
use bio::io::bed;
use itertools::Itertools;
use strum_macros::{EnumString, EnumVariantNames};

/// How target intervals gate breakpoint emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, EnumVariantNames)]
pub enum TargetsBedRequirement {
    /// Annotate overlapping targets, keep every breakpoint.
    AnnotateOnly,
    /// Keep breakpoints with at least one breakend on target.
    OverlapAny,
    /// Keep breakpoints with both breakends on target.
    OverlapBoth,
}

/// Per-contig interval tree over named target regions. Queries are 1-based
/// inclusive; BED input is converted on load.
pub struct TargetIndex {
    trees: HashMap<String, IntervalTree<u64, String>>,
}

impl TargetIndex {
    pub fn from_bed<P: AsRef<Path> + std::fmt::Debug>(path: P) -> Result<Self> {
        let mut reader = bed::Reader::from_file(path)?;
        let mut trees: HashMap<String, IntervalTree<u64, String>> = HashMap::new();
        for record in reader.records() {
            let record = record?;
            let start = record.start() + 1;
            let end = record.end();
            let name = record
                .name()
                .map(|name| name.to_owned())
                .unwrap_or_else(|| format!("{}:{}-{}", record.chrom(), start, end));
            trees
                .entry(record.chrom().to_owned())
                .or_insert_with(IntervalTree::new)
                .insert(start..end + 1, name);
        }
        Ok(TargetIndex { trees })
    }

    pub fn overlaps_any(&self, contig: &str, start: u64, end: u64) -> bool {
        self.trees
            .get(contig)
            .map_or(false, |tree| tree.find(start..end + 1).next().is_some())
    }

    /// Sorted, deduplicated names of targets overlapping the interval.
    pub fn target_names(&self, contig: &str, start: u64, end: u64) -> Vec<String> {
        self.trees
            .get(contig)
            .map(|tree| {
                tree.find(start..end + 1)
                    .map(|entry| entry.data().clone())
                    .sorted()
                    .dedup()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Comma-joined target names, or `None` when nothing overlaps.
    pub fn annotation(&self, contig: &str, start: u64, end: u64) -> Option<String> {
        let names = self.target_names(contig, start, end);
        if names.is_empty() {
            None
        } else {
            Some(names.join(","))
        }
    }
}
