use crate::model::segment::{AlignedSegment, RecIdx};
use crate::model::{Breakpoint, EvidenceType};
use crate::reference::SequenceDictionary;

/// One detected breakpoint together with the records supporting each side.
///
/// `from` holds the records whose sequencing-order-earlier side sat on the
/// "from" breakend; `from_is_left` records whether those correspond to the
/// left or the right side of the canonicalized breakpoint.
#[derive(Debug, Clone)]
pub struct BreakpointEvidence {
    pub breakpoint: Breakpoint,
    pub evidence: EvidenceType,
    pub from: Vec<RecIdx>,
    pub into: Vec<RecIdx>,
    pub from_is_left: bool,
}

/// Walk the segment chain pairwise and emit evidence for every junction that
/// cannot be explained by contiguous sequencing along the reference.
pub fn detect_breakpoints(
    chain: &[AlignedSegment],
    max_within_read_distance: u64,
    max_read_pair_inner_distance: u64,
    dict: &SequenceDictionary,
) -> Vec<BreakpointEvidence> {
    let mut evidence = Vec::new();
    for pair in chain.windows(2) {
        if let Some(ev) = evidence_between(
            &pair[0],
            &pair[1],
            max_within_read_distance,
            max_read_pair_inner_distance,
            dict,
        ) {
            evidence.push(ev);
        }
    }
    evidence
}

fn evidence_between(
    from: &AlignedSegment,
    into: &AlignedSegment,
    max_within_read_distance: u64,
    max_read_pair_inner_distance: u64,
    dict: &SequenceDictionary,
) -> Option<BreakpointEvidence> {
    let inter_read = from.origin.is_inter_read(into.origin);
    let inter_contig = from.range.ref_index != into.range.ref_index;
    let fires = if inter_contig {
        true
    } else if dict.is_circular(from.range.ref_index) {
        // gaps on circular contigs may wrap around the origin
        false
    } else {
        let max_inner_distance = if inter_read {
            max_read_pair_inner_distance
        } else {
            max_within_read_distance
        } as i64;
        let inner_distance = if from.range.start <= into.range.start {
            into.range.start as i64 - from.range.end as i64
        } else {
            from.range.start as i64 - into.range.end as i64
        };
        from.positive_strand != into.positive_strand
            || (from.positive_strand && into.range.start < from.range.end)
            || (!from.positive_strand && from.range.start < into.range.start)
            || inner_distance > max_inner_distance
    };
    if !fires {
        return None;
    }

    let evidence = if inter_read {
        EvidenceType::ReadPair
    } else {
        EvidenceType::SplitRead
    };
    let (left_pos, left_positive) = if from.positive_strand {
        (from.range.end, true)
    } else {
        (from.range.start, false)
    };
    let (right_pos, right_positive) = if into.positive_strand {
        (into.range.start, true)
    } else {
        (into.range.end, false)
    };
    let breakpoint = Breakpoint {
        left_ref_index: from.range.ref_index,
        left_pos,
        left_positive,
        right_ref_index: into.range.ref_index,
        right_pos,
        right_positive,
    };
    // reads crossing out of the junction sit at the trailing end of `from`
    // and the leading end of `into`, relative to each segment's strand
    let from_recs = if from.positive_strand {
        from.right.clone()
    } else {
        from.left.clone()
    };
    let into_recs = if into.positive_strand {
        into.left.clone()
    } else {
        into.right.clone()
    };
    let (breakpoint, from_is_left) = if breakpoint.is_canonical() {
        (breakpoint, true)
    } else {
        (breakpoint.reversed(), false)
    };
    Some(BreakpointEvidence {
        breakpoint,
        evidence,
        from: from_recs,
        into: into_recs,
        from_is_left,
    })
}
