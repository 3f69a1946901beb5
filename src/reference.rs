use std::collections::HashMap;

use rust_htslib::bam;

use crate::errors::Error;

/// One `@SQ` entry of the input's sequence dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContigInfo {
    pub name: String,
    pub ref_index: u32,
    pub length: u64,
    pub circular: bool,
}

/// Contig name, length and topology lookup, indexed in `@SQ` (tid) order.
#[derive(Debug, Clone)]
pub struct SequenceDictionary {
    contigs: Vec<ContigInfo>,
    by_name: HashMap<String, u32>,
}

impl SequenceDictionary {
    pub fn new(contigs: Vec<ContigInfo>) -> Self {
        let by_name = contigs
            .iter()
            .map(|contig| (contig.name.clone(), contig.ref_index))
            .collect();
        SequenceDictionary { contigs, by_name }
    }

    pub fn from_header(header: &bam::HeaderView) -> Result<Self, Error> {
        let text = bam::Header::from_template(header).to_bytes();
        parse_header_text(&String::from_utf8_lossy(&text))
    }

    pub fn get(&self, ref_index: u32) -> Result<&ContigInfo, Error> {
        self.contigs
            .get(ref_index as usize)
            .ok_or(Error::MissingReferenceIndex { ref_index })
    }

    pub fn name(&self, ref_index: u32) -> Result<&str, Error> {
        self.get(ref_index).map(|contig| contig.name.as_str())
    }

    pub fn tid(&self, name: &str) -> Result<u32, Error> {
        self.by_name.get(name).copied().ok_or(Error::MissingContig {
            contig: name.to_owned(),
        })
    }

    pub fn is_circular(&self, ref_index: u32) -> bool {
        self.contigs
            .get(ref_index as usize)
            .map_or(false, |contig| contig.circular)
    }

    pub fn contigs(&self) -> &[ContigInfo] {
        &self.contigs
    }
}

fn parse_header_text(text: &str) -> Result<SequenceDictionary, Error> {
    let mut contigs = Vec::new();
    for line in text.lines().filter(|line| line.starts_with("@SQ")) {
        let mut name = None;
        let mut length = None;
        let mut circular = false;
        for field in line.split('\t').skip(1) {
            let mut parts = field.splitn(2, ':');
            match (parts.next(), parts.next()) {
                (Some("SN"), Some(value)) => name = Some(value.to_owned()),
                (Some("LN"), Some(value)) => {
                    length = Some(value.parse().map_err(|_| Error::InvalidHeader {
                        msg: format!("unparseable LN in {:?}", line),
                    })?)
                }
                (Some("TP"), Some(value)) => circular = value == "circular",
                _ => (),
            }
        }
        match (name, length) {
            (Some(name), Some(length)) => {
                let ref_index = contigs.len() as u32;
                contigs.push(ContigInfo {
                    name,
                    ref_index,
                    length,
                    circular,
                });
            }
            _ => {
                return Err(Error::InvalidHeader {
                    msg: format!("missing SN or LN in {:?}", line),
                })
            }
        }
    }
    Ok(SequenceDictionary::new(contigs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_text() {
        let dict = parse_header_text(
            "@HD\tVN:1.6\tGO:query\n\
             @SQ\tSN:chr1\tLN:248956422\n\
             @SQ\tSN:chrM\tLN:16569\tTP:circular\n\
             @PG\tID:bwa\n",
        )
        .unwrap();
        assert_eq!(dict.contigs().len(), 2);
        assert_eq!(dict.name(0).unwrap(), "chr1");
        assert_eq!(dict.tid("chrM").unwrap(), 1);
        assert_eq!(dict.get(1).unwrap().length, 16569);
        assert!(!dict.is_circular(0));
        assert!(dict.is_circular(1));
        assert!(matches!(dict.name(2), Err(Error::MissingReferenceIndex { .. })));
        assert!(matches!(dict.tid("chrX"), Err(Error::MissingContig { .. })));
    }

    #[test]
    fn test_parse_header_rejects_incomplete_sq() {
        assert!(parse_header_text("@SQ\tSN:chr1\n").is_err());
        assert!(parse_header_text("@SQ\tSN:chr1\tLN:abc\n").is_err());
    }
}
