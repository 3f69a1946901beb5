use bv::{BitVec, Bits, BitsMut};
use rust_htslib::bam;
use rust_htslib::bam::record::{Cigar, CigarString};

use crate::errors::Error;
use crate::model::template::{Template, TemplateIndices};
use crate::model::{GenomicRange, SegmentOrigin};

/// Index of an alignment record within its template's record arena.
pub type RecIdx = usize;

/// One mapped portion of a template, in read-sequencing order.
///
/// `read_start`/`read_end` are 1-based inclusive positions within the read as
/// it came off the sequencer, independent of the alignment strand. `left` and
/// `right` are the records supporting each end of `range`; both default to
/// `recs` and are re-partitioned when overlapping mates are merged.
#[derive(Debug, Clone)]
pub struct AlignedSegment {
    pub origin: SegmentOrigin,
    pub read_start: u64,
    pub read_end: u64,
    pub positive_strand: bool,
    pub cigar: CigarString,
    pub range: GenomicRange,
    pub recs: Vec<RecIdx>,
    pub left: Vec<RecIdx>,
    pub right: Vec<RecIdx>,
}

fn is_clipping(op: &Cigar) -> bool {
    matches!(op, Cigar::SoftClip(_) | Cigar::HardClip(_))
}

fn consumes_read(op: &Cigar) -> bool {
    matches!(
        op,
        Cigar::Match(_) | Cigar::Ins(_) | Cigar::SoftClip(_) | Cigar::Equal(_) | Cigar::Diff(_)
    )
}

/// Sum of leading clips, read-consuming middle operators, and trailing clips.
fn clip_and_middle(ops: &[Cigar]) -> (u64, u64, u64) {
    let leading: u64 = ops
        .iter()
        .take_while(|op| is_clipping(op))
        .map(|op| op.len() as u64)
        .sum();
    let trailing: u64 = ops
        .iter()
        .rev()
        .take_while(|op| is_clipping(op))
        .map(|op| op.len() as u64)
        .sum();
    let middle: u64 = ops
        .iter()
        .skip_while(|op| is_clipping(op))
        .filter(|op| !is_clipping(op) && consumes_read(op))
        .map(|op| op.len() as u64)
        .sum();
    (leading, middle, trailing)
}

/// Full read length implied by one alignment of it, hard clips included.
pub fn read_length_of(rec: &bam::Record) -> u64 {
    let cigar = rec.cigar();
    let (leading, middle, trailing) = clip_and_middle(&cigar);
    leading + middle + trailing
}

impl AlignedSegment {
    /// Build a segment from one mapped alignment record at arena index `idx`.
    pub fn from_record(rec: &bam::Record, idx: RecIdx) -> Result<AlignedSegment, Error> {
        let malformed = || Error::MalformedAlignment {
            name: String::from_utf8_lossy(rec.qname()).into_owned(),
        };
        if rec.is_unmapped() || rec.tid() < 0 {
            return Err(malformed());
        }
        let cigar = rec.cigar();
        let (leading, middle, trailing) = clip_and_middle(&cigar);
        let (read_start, read_end) = if rec.is_reverse() {
            (trailing + 1, trailing + middle)
        } else {
            (leading + 1, leading + middle)
        };
        if read_end < read_start {
            return Err(malformed());
        }
        let origin = if !rec.is_paired() || rec.is_first_in_template() {
            SegmentOrigin::ReadOne
        } else {
            SegmentOrigin::ReadTwo
        };
        let range = GenomicRange::new(
            rec.tid() as u32,
            rec.pos() as u64 + 1,
            cigar.end_pos() as u64,
        );
        Ok(AlignedSegment {
            origin,
            read_start,
            read_end,
            positive_strand: !rec.is_reverse(),
            cigar: cigar.take(),
            range,
            recs: vec![idx],
            left: vec![idx],
            right: vec![idx],
        })
    }

    /// Ranges overlap and strands agree.
    pub fn strand_overlaps(&self, other: &AlignedSegment) -> bool {
        self.range.overlaps(&other.range) && self.positive_strand == other.positive_strand
    }
}

/// Chain of segments for a single read end: the primary plus every
/// supplementary that contributes at least `min_unique_bases_to_add` read
/// positions not covered by previously accepted segments. Supplementaries are
/// visited in `(read_start, read_end)` order; the stable sort keeps insertion
/// order on ties.
pub fn segments_from(
    primary: AlignedSegment,
    mut supplementals: Vec<AlignedSegment>,
    read_length: u64,
    min_unique_bases_to_add: u64,
) -> Vec<AlignedSegment> {
    let mut covered: BitVec = BitVec::new_fill(false, read_length);
    for pos in primary.read_start..=primary.read_end.min(read_length) {
        covered.set_bit(pos - 1, true);
    }
    let mut kept = vec![primary];
    supplementals.sort_by_key(|seg| (seg.read_start, seg.read_end));
    for seg in supplementals {
        let novel = (seg.read_start..=seg.read_end.min(read_length))
            .filter(|&pos| !covered.get_bit(pos - 1))
            .count() as u64;
        if novel >= min_unique_bases_to_add {
            for pos in seg.read_start..=seg.read_end.min(read_length) {
                covered.set_bit(pos - 1, true);
            }
            kept.push(seg);
        }
    }
    kept.sort_by_key(|seg| (seg.read_start, seg.read_end));
    kept
}

fn rec_start(recs: &[bam::Record], idx: RecIdx) -> u64 {
    recs[idx].pos() as u64 + 1
}

fn rec_end(recs: &[bam::Record], idx: RecIdx) -> u64 {
    recs[idx].cigar().end_pos() as u64
}

fn within_slop(a: u64, b: u64, slop: u64) -> bool {
    a.max(b) - a.min(b) <= slop
}

/// Collapse two strand-overlapping segments from opposite reads of a pair.
///
/// Downstream only consults `range`, `origin` and `positive_strand` of the
/// result; read coordinates collapse to `(1, 1)` and the cigar to empty. The
/// supporting records are re-partitioned into the `left`/`right` sets by
/// whether they sit within `slop` bases of the merged range's boundaries.
fn merge(
    s1: &AlignedSegment,
    s2: &AlignedSegment,
    slop: u64,
    recs: &[bam::Record],
) -> AlignedSegment {
    let range = s1.range.union(&s2.range);
    let origin = if s1.origin == s2.origin {
        s1.origin
    } else {
        SegmentOrigin::Both
    };
    let mut all = s1.recs.clone();
    for &idx in &s2.recs {
        if !all.contains(&idx) {
            all.push(idx);
        }
    }
    let left = all
        .iter()
        .copied()
        .filter(|&idx| within_slop(rec_start(recs, idx), range.start, slop))
        .collect();
    let right = all
        .iter()
        .copied()
        .filter(|&idx| within_slop(rec_end(recs, idx), range.end, slop))
        .collect();
    AlignedSegment {
        origin,
        read_start: 1,
        read_end: 1,
        positive_strand: s1.positive_strand,
        cigar: CigarString(vec![]),
        range,
        recs: all,
        left,
        right,
    }
}

/// Merge the R1 chain with the reversed, strand-negated R2 chain.
///
/// Starting at depth 1, the last `k` R1 segments are compared pairwise with
/// the first `k` R2 segments; the first depth at which all pairs
/// strand-overlap wins and each pair is merged. If no depth fits within both
/// chains, the chains are concatenated unmerged.
pub fn merge_chains(
    mut r1: Vec<AlignedSegment>,
    r2: Vec<AlignedSegment>,
    slop: u64,
    recs: &[bam::Record],
) -> Vec<AlignedSegment> {
    let mut k = 1;
    let depth = loop {
        if k > r1.len() || k > r2.len() {
            break None;
        }
        let offset = r1.len() - k;
        if (0..k).all(|i| r1[offset + i].strand_overlaps(&r2[i])) {
            break Some(k);
        }
        k += 1;
    };
    match depth {
        None => {
            r1.extend(r2);
            r1
        }
        Some(k) => {
            let offset = r1.len() - k;
            let merged: Vec<AlignedSegment> = (0..k)
                .map(|i| merge(&r1[offset + i], &r2[i], slop, recs))
                .collect();
            r1.truncate(offset);
            r1.extend(merged);
            r1.extend(r2.into_iter().skip(k));
            r1
        }
    }
}

/// Assemble the full segment chain for one template.
///
/// Builds the per-read chains, reverses and strand-negates R2 so that both
/// reads are expressed in template sequencing direction (FR libraries), and
/// merges tail overlap between them.
pub fn chain_of(
    template: &Template,
    indices: &TemplateIndices,
    min_unique_bases_to_add: u64,
    slop: u64,
) -> Result<Vec<AlignedSegment>, Error> {
    let build = |primary: Option<RecIdx>,
                 supplementals: &[RecIdx]|
     -> Result<Vec<AlignedSegment>, Error> {
        let primary_idx = match primary {
            Some(idx) => idx,
            None => return Ok(vec![]),
        };
        let primary_seg = AlignedSegment::from_record(&template.recs[primary_idx], primary_idx)?;
        let mut read_length = read_length_of(&template.recs[primary_idx]);
        let mut supp_segments = Vec::with_capacity(supplementals.len());
        for &idx in supplementals {
            supp_segments.push(AlignedSegment::from_record(&template.recs[idx], idx)?);
            read_length = read_length.max(read_length_of(&template.recs[idx]));
        }
        Ok(segments_from(
            primary_seg,
            supp_segments,
            read_length,
            min_unique_bases_to_add,
        ))
    };

    let r1 = build(indices.r1, &indices.r1_supplementals)?;
    let mut r2 = build(indices.r2, &indices.r2_supplementals)?;
    if r1.is_empty() && r2.is_empty() {
        return Err(Error::EmptyTemplate {
            name: template.name_lossy(),
        });
    }
    if r1.is_empty() {
        return Ok(r2);
    }
    if r2.is_empty() {
        return Ok(r1);
    }
    r2.reverse();
    for seg in &mut r2 {
        seg.positive_strand = !seg.positive_strand;
    }
    Ok(merge_chains(r1, r2, slop, &template.recs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::template::Template;
    use crate::model::testutil::RecordBuilder;

    #[test]
    fn test_from_record_forward_strand() {
        let rec = RecordBuilder::new(b"q1", "50M50S").start(100).build();
        let seg = AlignedSegment::from_record(&rec, 0).unwrap();
        assert_eq!((seg.read_start, seg.read_end), (1, 50));
        assert_eq!(seg.range, GenomicRange::new(0, 100, 149));
        assert!(seg.positive_strand);
        assert_eq!(seg.origin, SegmentOrigin::ReadOne);
        assert_eq!(seg.recs, vec![0]);
    }

    #[test]
    fn test_from_record_reverse_strand_swaps_clips() {
        let rec = RecordBuilder::new(b"q1", "50M50S")
            .start(100)
            .reverse()
            .build();
        let seg = AlignedSegment::from_record(&rec, 0).unwrap();
        // trailing clip leads in read-sequencing order on the negative strand
        assert_eq!((seg.read_start, seg.read_end), (51, 100));
        assert_eq!(seg.range, GenomicRange::new(0, 100, 149));
        assert!(!seg.positive_strand);
    }

    #[test]
    fn test_from_record_hard_clips_count() {
        let rec = RecordBuilder::new(b"q1", "70H30M").start(900).build();
        let seg = AlignedSegment::from_record(&rec, 0).unwrap();
        assert_eq!((seg.read_start, seg.read_end), (71, 100));
        assert_eq!(seg.range, GenomicRange::new(0, 900, 929));
    }

    #[test]
    fn test_from_record_interior_clips_both_strands() {
        let rec = RecordBuilder::new(b"q1", "30S40M30S")
            .tid(1)
            .start(500)
            .reverse()
            .build();
        let seg = AlignedSegment::from_record(&rec, 0).unwrap();
        assert_eq!((seg.read_start, seg.read_end), (31, 70));
        assert_eq!(seg.range, GenomicRange::new(1, 500, 539));
    }

    #[test]
    fn test_from_record_deletion_consumes_reference_only() {
        let rec = RecordBuilder::new(b"q1", "20M5D20M").start(100).build();
        let seg = AlignedSegment::from_record(&rec, 0).unwrap();
        assert_eq!((seg.read_start, seg.read_end), (1, 40));
        assert_eq!(seg.range, GenomicRange::new(0, 100, 144));
        // read bases consumed between the clip groups
        assert_eq!(seg.read_end - seg.read_start + 1, 40);
    }

    #[test]
    fn test_from_record_unmapped_fails() {
        let rec = RecordBuilder::new(b"q1", "50M").start(100).unmapped().build();
        assert!(matches!(
            AlignedSegment::from_record(&rec, 0),
            Err(Error::MalformedAlignment { .. })
        ));
    }

    #[test]
    fn test_read_pair_origin() {
        let rec = RecordBuilder::new(b"q1", "50M")
            .start(100)
            .paired_second()
            .build();
        let seg = AlignedSegment::from_record(&rec, 0).unwrap();
        assert_eq!(seg.origin, SegmentOrigin::ReadTwo);
    }

    fn segment(read_start: u64, read_end: u64, start: u64, end: u64, idx: RecIdx) -> AlignedSegment {
        AlignedSegment {
            origin: SegmentOrigin::ReadOne,
            read_start,
            read_end,
            positive_strand: true,
            cigar: CigarString(vec![]),
            range: GenomicRange::new(0, start, end),
            recs: vec![idx],
            left: vec![idx],
            right: vec![idx],
        }
    }

    #[test]
    fn test_segments_from_keeps_novel_supplementaries() {
        let primary = segment(1, 50, 100, 149, 0);
        let supp_a = segment(40, 90, 500, 550, 1);
        let supp_b = segment(45, 95, 800, 850, 2);
        let kept = segments_from(primary, vec![supp_b, supp_a], 100, 20);
        // supp_a adds 40 novel bases; after it, supp_b only adds 91..=95
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].recs, vec![0]);
        assert_eq!(kept[1].recs, vec![1]);
    }

    #[test]
    fn test_segments_from_tie_keeps_insertion_order() {
        let primary = segment(1, 20, 100, 119, 0);
        let supp_a = segment(21, 60, 500, 539, 1);
        let supp_b = segment(21, 60, 900, 939, 2);
        let kept = segments_from(primary, vec![supp_a, supp_b], 60, 20);
        // the first-inserted supplementary wins the unique-bases contest
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].recs, vec![1]);
    }

    #[test]
    fn test_segments_from_sorted_by_read_coordinates() {
        let primary = segment(51, 100, 800, 849, 0);
        let supp = segment(1, 50, 100, 149, 1);
        let kept = segments_from(primary, vec![supp], 100, 20);
        assert_eq!(kept[0].recs, vec![1]);
        assert_eq!(kept[1].recs, vec![0]);
    }

    fn template_of(recs: Vec<rust_htslib::bam::Record>) -> Template {
        Template::from_records(recs)
    }

    #[test]
    fn test_chain_of_reverses_and_negates_r2() {
        // plain FR pair
        let r1 = RecordBuilder::new(b"t", "100M").start(100).paired_first().build();
        let r2 = RecordBuilder::new(b"t", "100M")
            .start(250)
            .paired_second()
            .reverse()
            .build();
        let template = template_of(vec![r1, r2]);
        let indices = template.indices.clone();
        let chain = chain_of(&template, &indices, 20, 5).unwrap();
        assert_eq!(chain.len(), 2);
        assert!(chain[0].positive_strand);
        assert!(chain[1].positive_strand);
        assert_eq!(chain[0].range, GenomicRange::new(0, 100, 199));
        assert_eq!(chain[1].range, GenomicRange::new(0, 250, 349));
    }

    #[test]
    fn test_chain_of_single_read() {
        let r1 = RecordBuilder::new(b"t", "100M").start(100).build();
        let template = template_of(vec![r1]);
        let indices = template.indices.clone();
        let chain = chain_of(&template, &indices, 20, 5).unwrap();
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_chain_of_empty_template_fails() {
        let r1 = RecordBuilder::new(b"t", "100M").start(100).build();
        let template = template_of(vec![r1]);
        let indices = TemplateIndices::default();
        assert!(matches!(
            chain_of(&template, &indices, 20, 5),
            Err(Error::EmptyTemplate { .. })
        ));
    }

    #[test]
    fn test_merge_chains_overlapping_pair() {
        let r1 = RecordBuilder::new(b"t", "100M").start(100).paired_first().build();
        let r2 = RecordBuilder::new(b"t", "100M")
            .start(150)
            .paired_second()
            .reverse()
            .build();
        let template = template_of(vec![r1, r2]);
        let indices = template.indices.clone();
        let chain = chain_of(&template, &indices, 20, 5).unwrap();
        assert_eq!(chain.len(), 1);
        let merged = &chain[0];
        assert_eq!(merged.origin, SegmentOrigin::Both);
        assert_eq!(merged.range, GenomicRange::new(0, 100, 249));
        assert_eq!((merged.read_start, merged.read_end), (1, 1));
        assert!(merged.cigar.is_empty());
        assert_eq!(merged.recs, vec![0, 1]);
        // R1 starts at the merged start, R2 ends at the merged end
        assert_eq!(merged.left, vec![0]);
        assert_eq!(merged.right, vec![1]);
    }

    #[test]
    fn test_merge_chains_no_overlap_concatenates() {
        let a = segment(1, 50, 100, 149, 0);
        let b = segment(51, 100, 800, 849, 1);
        let out = merge_chains(vec![a], vec![b], 5, &[]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_merge_chains_deeper_overlap() {
        // R1 tail [s2, s3] overlaps R2 head [t1, t2] only at depth 2
        let recs = vec![
            RecordBuilder::new(b"t", "50M").start(100).build(),
            RecordBuilder::new(b"t", "50M").start(500).build(),
            RecordBuilder::new(b"t", "50M").start(600).build(),
            RecordBuilder::new(b"t", "50M").start(505).build(),
            RecordBuilder::new(b"t", "50M").start(610).build(),
        ];
        let s1 = segment(1, 50, 100, 149, 0);
        let s2 = segment(51, 100, 500, 549, 1);
        let s3 = segment(101, 150, 600, 649, 2);
        let t1 = segment(1, 50, 505, 554, 3);
        let t2 = segment(51, 100, 610, 659, 4);
        // depth 1 fails (s3 vs t1 do not overlap), depth 2 merges both pairs
        let out = merge_chains(vec![s1, s2, s3], vec![t1, t2], 5, &recs);
        assert_eq!(out.len(), 3);
        assert_eq!(out[1].range, GenomicRange::new(0, 500, 554));
        assert_eq!(out[2].range, GenomicRange::new(0, 600, 659));
    }
}
