//! Tab-delimited metric tables. Row structs double as the header definition:
//! the serde field order is the column order.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::errors::Error;

/// One row of the breakpoint pileup table emitted by `pileup`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakpointPileup {
    pub id: String,
    pub left_contig: String,
    pub left_pos: u64,
    pub left_strand: char,
    pub right_contig: String,
    pub right_pos: u64,
    pub right_strand: char,
    pub split_reads: u64,
    pub read_pairs: u64,
    pub total: u64,
    pub left_targets: Option<String>,
    pub right_targets: Option<String>,
}

/// One row of the aggregated table emitted by `aggregate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedBreakpointPileup {
    pub id: String,
    pub category: String,
    pub left_contig: String,
    pub left_min_pos: u64,
    pub left_max_pos: u64,
    pub left_strand: char,
    pub right_contig: String,
    pub right_min_pos: u64,
    pub right_max_pos: u64,
    pub right_strand: char,
    pub split_reads: u64,
    pub read_pairs: u64,
    pub total: u64,
    pub left_pileups: String,
    pub right_pileups: String,
    pub left_frequency: Option<f64>,
    pub right_frequency: Option<f64>,
    pub left_overlaps_target: Option<bool>,
    pub right_overlaps_target: Option<bool>,
    pub left_targets: Option<String>,
    pub right_targets: Option<String>,
}

/// Write rows with a reflective header line.
pub fn write<S: Serialize, P: AsRef<Path>>(path: P, rows: &[S]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read the pileup table, enforcing the evidence-count invariant.
pub fn read_pileups<P: AsRef<Path>>(path: P) -> Result<Vec<BreakpointPileup>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        let row: BreakpointPileup = row?;
        if row.total != row.split_reads + row.read_pairs {
            return Err(Error::InvalidPileupRecord {
                id: row.id,
                split_reads: row.split_reads,
                read_pairs: row.read_pairs,
                total: row.total,
            }
            .into());
        }
        rows.push(row);
    }
    Ok(rows)
}

pub fn read_aggregated<P: AsRef<Path>>(path: P) -> Result<Vec<AggregatedBreakpointPileup>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        let row: AggregatedBreakpointPileup = row?;
        crate::utils::parse_positions(&row.left_pileups)?;
        crate::utils::parse_positions(&row.right_pileups)?;
        rows.push(row);
    }
    Ok(rows)
}
