//! Record synthesis for unit tests.

use std::convert::TryFrom;

use rust_htslib::bam::record::{Aux, Cigar, CigarString};
use rust_htslib::bam::Record;

const FLAG_PAIRED: u16 = 0x1;
const FLAG_UNMAPPED: u16 = 0x4;
const FLAG_MATE_UNMAPPED: u16 = 0x8;
const FLAG_REVERSE: u16 = 0x10;
const FLAG_MATE_REVERSE: u16 = 0x20;
const FLAG_FIRST: u16 = 0x40;
const FLAG_SECOND: u16 = 0x80;
const FLAG_SECONDARY: u16 = 0x100;
const FLAG_SUPPLEMENTARY: u16 = 0x800;

pub(crate) struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    /// New mapped record on tid 0 with a sequence matching the cigar's
    /// read-consuming length. Positions handed to the builder are 1-based.
    pub(crate) fn new(qname: &[u8], cigar: &str) -> Self {
        let cigar = CigarString::try_from(cigar).expect("valid test cigar");
        let read_len: usize = cigar
            .iter()
            .map(|op| match op {
                Cigar::Match(l)
                | Cigar::Ins(l)
                | Cigar::SoftClip(l)
                | Cigar::Equal(l)
                | Cigar::Diff(l) => *l as usize,
                _ => 0,
            })
            .sum();
        let seq = vec![b'A'; read_len];
        let qual = vec![30u8; read_len];
        let mut record = Record::new();
        record.set(qname, Some(&cigar), &seq, &qual);
        record.set_tid(0);
        record.set_pos(0);
        record.set_mtid(-1);
        record.set_mpos(-1);
        record.set_mapq(60);
        record.set_flags(0);
        RecordBuilder { record }
    }

    pub(crate) fn tid(mut self, tid: i32) -> Self {
        self.record.set_tid(tid);
        self
    }

    pub(crate) fn start(mut self, start: u64) -> Self {
        self.record.set_pos(start as i64 - 1);
        self
    }

    pub(crate) fn mapq(mut self, mapq: u8) -> Self {
        self.record.set_mapq(mapq);
        self
    }

    fn flag(mut self, flag: u16) -> Self {
        let flags = self.record.flags() | flag;
        self.record.set_flags(flags);
        self
    }

    pub(crate) fn reverse(self) -> Self {
        self.flag(FLAG_REVERSE)
    }

    pub(crate) fn unmapped(self) -> Self {
        self.flag(FLAG_UNMAPPED)
    }

    pub(crate) fn paired_first(self) -> Self {
        self.flag(FLAG_PAIRED | FLAG_FIRST)
    }

    pub(crate) fn paired_second(self) -> Self {
        self.flag(FLAG_PAIRED | FLAG_SECOND)
    }

    pub(crate) fn supplementary(self) -> Self {
        self.flag(FLAG_SUPPLEMENTARY)
    }

    pub(crate) fn secondary(self) -> Self {
        self.flag(FLAG_SECONDARY)
    }

    /// Register a mapped mate at a 1-based position.
    pub(crate) fn mate(mut self, mtid: i32, mstart: u64, mate_reverse: bool) -> Self {
        self.record.set_mtid(mtid);
        self.record.set_mpos(mstart as i64 - 1);
        if mate_reverse {
            self.flag(FLAG_MATE_REVERSE)
        } else {
            self
        }
    }

    pub(crate) fn mate_unmapped(self) -> Self {
        self.flag(FLAG_MATE_UNMAPPED)
    }

    /// Attach the mate-cigar tag used to recover the mate's reference end.
    pub(crate) fn mate_cigar(mut self, mc: &str) -> Self {
        self.record
            .push_aux(b"MC", Aux::String(mc))
            .expect("room for MC tag");
        self
    }

    pub(crate) fn build(self) -> Record {
        self.record
    }
}
