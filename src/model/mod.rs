use std::cmp::Ordering;

use strum_macros::IntoStaticStr;

pub mod evidence;
pub mod segment;
pub mod template;
#[cfg(test)]
pub(crate) mod testutil;

/// A 1-based inclusive interval on a reference contig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenomicRange {
    pub ref_index: u32,
    pub start: u64,
    pub end: u64,
}

impl GenomicRange {
    pub fn new(ref_index: u32, start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "interval start must not exceed end");
        GenomicRange {
            ref_index,
            start,
            end,
        }
    }

    pub fn overlaps(&self, other: &GenomicRange) -> bool {
        self.ref_index == other.ref_index && self.start <= other.end && other.start <= self.end
    }

    /// Union of two overlapping ranges.
    pub fn union(&self, other: &GenomicRange) -> GenomicRange {
        debug_assert!(self.overlaps(other), "union requires overlapping ranges");
        GenomicRange {
            ref_index: self.ref_index,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Which read(s) of a template an aligned segment was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentOrigin {
    ReadOne,
    ReadTwo,
    Both,
}

impl SegmentOrigin {
    /// True iff the two origins can represent opposite ends of a template.
    pub fn is_paired_with(&self, other: SegmentOrigin) -> bool {
        self.is_inter_read(other) || *self == SegmentOrigin::Both || other == SegmentOrigin::Both
    }

    /// True iff both origins are single-read origins and differ.
    pub fn is_inter_read(&self, other: SegmentOrigin) -> bool {
        matches!(
            (self, other),
            (SegmentOrigin::ReadOne, SegmentOrigin::ReadTwo)
                | (SegmentOrigin::ReadTwo, SegmentOrigin::ReadOne)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum EvidenceType {
    SplitRead,
    ReadPair,
}

impl EvidenceType {
    pub fn snake_name(&self) -> &'static str {
        (*self).into()
    }
}

/// A canonicalizable pair of breakends. Positions are 1-based inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Breakpoint {
    pub left_ref_index: u32,
    pub left_pos: u64,
    pub left_positive: bool,
    pub right_ref_index: u32,
    pub right_pos: u64,
    pub right_positive: bool,
}

impl Breakpoint {
    /// Swap left and right breakends and negate both strands.
    pub fn reversed(&self) -> Breakpoint {
        Breakpoint {
            left_ref_index: self.right_ref_index,
            left_pos: self.right_pos,
            left_positive: !self.right_positive,
            right_ref_index: self.left_ref_index,
            right_pos: self.left_pos,
            right_positive: !self.left_positive,
        }
    }

    /// Canonical form: `(left_ref_index, left_pos) < (right_ref_index, right_pos)`,
    /// ties broken by a positive left strand.
    pub fn is_canonical(&self) -> bool {
        let left = (self.left_ref_index, self.left_pos);
        let right = (self.right_ref_index, self.right_pos);
        left < right || (left == right && self.left_positive)
    }

    pub fn canonicalized(&self) -> Breakpoint {
        if self.is_canonical() {
            *self
        } else {
            self.reversed()
        }
    }

    /// Sort order that keeps paired events adjacent: left contig, right
    /// contig, left position, right position, strands.
    pub fn paired_cmp(&self, other: &Breakpoint) -> Ordering {
        (
            self.left_ref_index,
            self.right_ref_index,
            self.left_pos,
            self.right_pos,
            self.left_positive,
            self.right_positive,
        )
            .cmp(&(
                other.left_ref_index,
                other.right_ref_index,
                other.left_pos,
                other.right_pos,
                other.left_positive,
                other.right_positive,
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_overlap_and_union() {
        let a = GenomicRange::new(0, 100, 200);
        let b = GenomicRange::new(0, 150, 250);
        let c = GenomicRange::new(1, 150, 250);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert_eq!(a.union(&b), GenomicRange::new(0, 100, 250));
        // adjacency without overlap
        assert!(!GenomicRange::new(0, 100, 149).overlaps(&GenomicRange::new(0, 150, 200)));
    }

    #[test]
    fn test_range_order() {
        let mut ranges = vec![
            GenomicRange::new(1, 50, 60),
            GenomicRange::new(0, 100, 300),
            GenomicRange::new(0, 100, 200),
            GenomicRange::new(0, 50, 60),
        ];
        ranges.sort();
        assert_eq!(
            ranges,
            vec![
                GenomicRange::new(0, 50, 60),
                GenomicRange::new(0, 100, 200),
                GenomicRange::new(0, 100, 300),
                GenomicRange::new(1, 50, 60),
            ]
        );
    }

    #[test]
    fn test_origin_helpers() {
        use SegmentOrigin::*;
        assert!(ReadOne.is_inter_read(ReadTwo));
        assert!(ReadTwo.is_inter_read(ReadOne));
        assert!(!ReadOne.is_inter_read(ReadOne));
        assert!(!Both.is_inter_read(ReadOne));
        assert!(ReadOne.is_paired_with(ReadTwo));
        assert!(Both.is_paired_with(ReadOne));
        assert!(Both.is_paired_with(Both));
        assert!(!ReadOne.is_paired_with(ReadOne));
    }

    #[test]
    fn test_evidence_snake_names() {
        assert_eq!(EvidenceType::SplitRead.snake_name(), "split_read");
        assert_eq!(EvidenceType::ReadPair.snake_name(), "read_pair");
    }

    fn breakpoint(
        left: (u32, u64, bool),
        right: (u32, u64, bool),
    ) -> Breakpoint {
        Breakpoint {
            left_ref_index: left.0,
            left_pos: left.1,
            left_positive: left.2,
            right_ref_index: right.0,
            right_pos: right.1,
            right_positive: right.2,
        }
    }

    #[test]
    fn test_reversal_involution() {
        let bp = breakpoint((0, 199, true), (1, 300, false));
        assert_eq!(bp.reversed().reversed(), bp);
    }

    #[test]
    fn test_canonicalization() {
        let bp = breakpoint((1, 300, false), (0, 199, true));
        assert!(!bp.is_canonical());
        let canonical = bp.canonicalized();
        assert!(canonical.is_canonical());
        assert_eq!(canonical, breakpoint((0, 199, false), (1, 300, true)));
        // idempotence
        assert_eq!(canonical.canonicalized(), canonical);
    }

    #[test]
    fn test_canonicalization_tie_break() {
        let bp = breakpoint((0, 100, false), (0, 100, true));
        assert!(!bp.is_canonical());
        assert_eq!(bp.canonicalized(), breakpoint((0, 100, false), (0, 100, true)).reversed());
        assert!(breakpoint((0, 100, true), (0, 100, false)).is_canonical());
    }

    #[test]
    fn test_paired_ordering() {
        let mut bps = vec![
            breakpoint((0, 200, true), (1, 100, true)),
            breakpoint((0, 100, true), (0, 500, true)),
            breakpoint((0, 100, true), (1, 100, true)),
        ];
        bps.sort_by(|a, b| a.paired_cmp(b));
        assert_eq!(bps[0], breakpoint((0, 100, true), (0, 500, true)));
        assert_eq!(bps[1], breakpoint((0, 100, true), (1, 100, true)));
        assert_eq!(bps[2], breakpoint((0, 200, true), (1, 100, true)));
    }
}
