// Copyright 2026 svpileup developers.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::Path;

use anyhow::Result;

use crate::metrics::{self, AggregatedBreakpointPileup};

/// Ten-column BEDPE row; intervals are 0-based half-open.
#[derive(Debug, PartialEq, Serialize)]
pub struct BedpeRecord {
    pub chrom1: String,
    pub start1: u64,
    pub end1: u64,
    pub chrom2: String,
    pub start2: u64,
    pub end2: u64,
    pub name: String,
    pub score: u64,
    pub strand1: char,
    pub strand2: char,
}

impl From<&AggregatedBreakpointPileup> for BedpeRecord {
    fn from(row: &AggregatedBreakpointPileup) -> Self {
        BedpeRecord {
            chrom1: row.left_contig.clone(),
            start1: row.left_min_pos - 1,
            end1: row.left_max_pos,
            chrom2: row.right_contig.clone(),
            start2: row.right_min_pos - 1,
            end2: row.right_max_pos,
            name: row.id.clone(),
            score: row.total,
            strand1: row.left_strand,
            strand2: row.right_strand,
        }
    }
}

/// Project an aggregated pileup table to headerless BEDPE.
pub fn convert<P: AsRef<Path>>(input: P, output: P) -> Result<()> {
    let rows = metrics::read_aggregated(input)?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(output)?;
    for row in &rows {
        writer.serialize(BedpeRecord::from(row))?;
    }
    writer.flush()?;
    info!("{} BEDPE records written.", rows.len());
    Ok(())
}
