// Copyright 2026 svpileup developers.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::PathBuf;

use anyhow::Result;
use structopt::StructOpt;
use strum::VariantNames;

use crate::calling::{aggregate, bedpe, pileup};
use crate::errors;
use crate::targets::{TargetIndex, TargetsBedRequirement};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "svpileup",
    about = "Detect, tabulate and aggregate structural-variant breakpoint evidence from aligned reads.",
    setting = structopt::clap::AppSettings::ColoredHelp,
)]
pub enum Svpileup {
    #[structopt(
        name = "pileup",
        about = "Collate a pileup of putative structural-variant supporting reads. The input BAM must be queryname grouped.",
        setting = structopt::clap::AppSettings::ColoredHelp,
    )]
    Pileup {
        #[structopt(parse(from_os_str), long, help = "Queryname-grouped BAM with aligned reads.")]
        input: PathBuf,
        #[structopt(
            parse(from_os_str),
            long,
            help = "Output path prefix; the breakpoint table is written to <prefix>.txt and the annotated alignments to <prefix>.bam."
        )]
        output: PathBuf,
        #[structopt(
            long = "max-read-pair-inner-distance",
            default_value = "1000",
            help = "Maximum inner distance between the reads of a pair before a breakpoint is called."
        )]
        max_read_pair_inner_distance: u64,
        #[structopt(
            long = "max-aligned-segment-inner-distance",
            default_value = "100",
            help = "Maximum inner distance between segments of the same read before a breakpoint is called."
        )]
        max_aligned_segment_inner_distance: u64,
        #[structopt(
            long = "min-primary-mapping-quality",
            default_value = "30",
            help = "Minimum mapping quality of a primary alignment."
        )]
        min_primary_mapping_quality: u8,
        #[structopt(
            long = "min-supplementary-mapping-quality",
            default_value = "18",
            help = "Minimum mapping quality of a supplementary alignment."
        )]
        min_supplementary_mapping_quality: u8,
        #[structopt(
            long = "min-unique-bases-to-add",
            default_value = "20",
            help = "Minimum newly covered read bases a supplementary alignment must contribute to extend the segment chain."
        )]
        min_unique_bases_to_add: u64,
        #[structopt(
            long,
            default_value = "5",
            help = "Tolerance in bases when assigning records to the sides of a merged segment."
        )]
        slop: u64,
        #[structopt(
            parse(from_os_str),
            long = "targets-bed",
            help = "BED file of target regions to annotate breakpoints with."
        )]
        targets_bed: Option<PathBuf>,
        #[structopt(
            long = "targets-bed-requirement",
            default_value = "AnnotateOnly",
            possible_values = TargetsBedRequirement::VARIANTS,
            help = "How target regions gate emitted breakpoints."
        )]
        targets_bed_requirement: TargetsBedRequirement,
    },
    #[structopt(
        name = "aggregate",
        about = "Aggregate nearby breakpoints that likely describe the same underlying event.",
        setting = structopt::clap::AppSettings::ColoredHelp,
    )]
    Aggregate {
        #[structopt(parse(from_os_str), long, help = "Breakpoint pileup table from the pileup subcommand.")]
        input: PathBuf,
        #[structopt(parse(from_os_str), long, help = "Output path for the aggregated table.")]
        output: PathBuf,
        #[structopt(
            parse(from_os_str),
            long,
            help = "Indexed BAM to compute breakpoint allele frequencies from."
        )]
        bam: Option<PathBuf>,
        #[structopt(
            long,
            default_value = "1000",
            help = "Bases to extend each side of an aggregated breakpoint by when scanning for overlapping templates."
        )]
        flank: u64,
        #[structopt(
            long = "min-breakpoint-support",
            default_value = "10",
            help = "Minimum supporting evidence before an allele frequency is computed."
        )]
        min_breakpoint_support: u64,
        #[structopt(
            long = "min-frequency",
            default_value = "0.001",
            help = "Minimum allele frequency worth reporting; scans that cannot reach it are abandoned."
        )]
        min_frequency: f64,
        #[structopt(
            parse(from_os_str),
            long = "targets-bed",
            help = "BED file of target regions to annotate aggregated breakpoints with."
        )]
        targets_bed: Option<PathBuf>,
        #[structopt(
            long = "max-dist",
            default_value = "10",
            help = "Maximum per-side distance between breakpoints aggregated together."
        )]
        max_dist: u64,
    },
    #[structopt(
        name = "to-bedpe",
        about = "Convert an aggregated breakpoint table to BEDPE.",
        setting = structopt::clap::AppSettings::ColoredHelp,
    )]
    ToBedpe {
        #[structopt(parse(from_os_str), long, help = "Aggregated table from the aggregate subcommand.")]
        input: PathBuf,
        #[structopt(parse(from_os_str), long, help = "Output BEDPE path.")]
        output: PathBuf,
    },
}

pub fn run(opt: Svpileup) -> Result<()> {
    match opt {
        Svpileup::Pileup {
            input,
            output,
            max_read_pair_inner_distance,
            max_aligned_segment_inner_distance,
            min_primary_mapping_quality,
            min_supplementary_mapping_quality,
            min_unique_bases_to_add,
            slop,
            targets_bed,
            targets_bed_requirement,
        } => {
            if targets_bed.is_none()
                && targets_bed_requirement != TargetsBedRequirement::AnnotateOnly
            {
                return Err(errors::Error::MissingTargets.into());
            }
            let targets = targets_bed.map(TargetIndex::from_bed).transpose()?;
            let mut caller = pileup::CallerBuilder::default()
                .io(&input, &output)?
                .max_read_pair_inner_distance(max_read_pair_inner_distance)
                .max_aligned_segment_inner_distance(max_aligned_segment_inner_distance)
                .min_primary_mapq(min_primary_mapping_quality)
                .min_supplementary_mapq(min_supplementary_mapping_quality)
                .min_unique_bases_to_add(min_unique_bases_to_add)
                .slop(slop)
                .targets(targets)
                .targets_requirement(targets_bed_requirement)
                .build()?;
            caller.call()?;
        }
        Svpileup::Aggregate {
            input,
            output,
            bam,
            flank,
            min_breakpoint_support,
            min_frequency,
            targets_bed,
            max_dist,
        } => {
            let targets = targets_bed.map(TargetIndex::from_bed).transpose()?;
            let mut caller = aggregate::CallerBuilder::default()
                .input(input)
                .output(output)
                .bam(bam)
                .flank(flank)
                .min_breakpoint_support(min_breakpoint_support)
                .min_frequency(min_frequency)
                .targets(targets)
                .max_dist(max_dist)
                .build()?;
            caller.call()?;
        }
        Svpileup::ToBedpe { input, output } => {
            bedpe::convert(&input, &output)?;
        }
    }
    Ok(())
}
