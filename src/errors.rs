use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("alignment record of template {name} is unmapped or covers no read bases")]
    MalformedAlignment { name: String },
    #[error("template {name} has no mapped primary alignment")]
    EmptyTemplate { name: String },
    #[error("contig {contig} not found in the sequence dictionary")]
    MissingContig { contig: String },
    #[error("reference index {ref_index} not found in the sequence dictionary")]
    MissingReferenceIndex { ref_index: u32 },
    #[error("invalid @SQ entry in the input header: {msg}")]
    InvalidHeader { msg: String },
    #[error("invalid pileup record {id}: total {total} does not equal split_reads {split_reads} + read_pairs {read_pairs}")]
    InvalidPileupRecord {
        id: String,
        split_reads: u64,
        read_pairs: u64,
        total: u64,
    },
    #[error("unable to parse breakend position list {value}")]
    InvalidPositionList { value: String },
    #[error("--targets-bed-requirement other than AnnotateOnly requires --targets-bed")]
    MissingTargets,
}
