use rust_htslib::bam;

/// All alignment records sharing a query name, with index lists locating the
/// primary and supplementary alignments of each read end inside the arena.
/// Secondary alignments stay in `recs` (they are mirrored to the output) but
/// never enter the index lists.
#[derive(Debug)]
pub struct Template {
    pub name: Vec<u8>,
    pub recs: Vec<bam::Record>,
    pub indices: TemplateIndices,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateIndices {
    pub r1: Option<usize>,
    pub r2: Option<usize>,
    pub r1_supplementals: Vec<usize>,
    pub r2_supplementals: Vec<usize>,
}

impl Template {
    pub fn from_records(recs: Vec<bam::Record>) -> Self {
        let name = recs
            .first()
            .map(|rec| rec.qname().to_vec())
            .unwrap_or_default();
        let mut indices = TemplateIndices::default();
        for (i, rec) in recs.iter().enumerate() {
            if rec.is_secondary() {
                continue;
            }
            let first = !rec.is_paired() || rec.is_first_in_template();
            if rec.is_supplementary() {
                if first {
                    indices.r1_supplementals.push(i);
                } else {
                    indices.r2_supplementals.push(i);
                }
            } else if first {
                indices.r1.get_or_insert(i);
            } else {
                indices.r2.get_or_insert(i);
            }
        }
        Template { name, recs, indices }
    }

    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    /// Drop low-quality primaries along with their supplementaries, and
    /// supplementaries below the supplementary MAPQ cutoff. Returns `None`
    /// when no primary survives.
    pub fn filtered(
        &self,
        min_primary_mapq: u8,
        min_supplementary_mapq: u8,
    ) -> Option<TemplateIndices> {
        let primary_ok = |idx: Option<usize>| {
            idx.map_or(false, |i| {
                let rec = &self.recs[i];
                !rec.is_unmapped() && rec.mapq() >= min_primary_mapq
            })
        };
        let r1_ok = primary_ok(self.indices.r1);
        let r2_ok = primary_ok(self.indices.r2);
        if !r1_ok && !r2_ok {
            return None;
        }
        let keep_supplementals = |supplementals: &[usize]| {
            supplementals
                .iter()
                .copied()
                .filter(|&i| {
                    let rec = &self.recs[i];
                    !rec.is_unmapped() && rec.mapq() >= min_supplementary_mapq
                })
                .collect()
        };
        Some(TemplateIndices {
            r1: if r1_ok { self.indices.r1 } else { None },
            r2: if r2_ok { self.indices.r2 } else { None },
            r1_supplementals: if r1_ok {
                keep_supplementals(&self.indices.r1_supplementals)
            } else {
                Vec::new()
            },
            r2_supplementals: if r2_ok {
                keep_supplementals(&self.indices.r2_supplementals)
            } else {
                Vec::new()
            },
        })
    }
}

/// Adapter turning a queryname-grouped record stream into templates.
pub struct TemplateIterator<I>
where
    I: Iterator<Item = Result<bam::Record, rust_htslib::errors::Error>>,
{
    records: I,
    pending: Option<bam::Record>,
}

impl<I> TemplateIterator<I>
where
    I: Iterator<Item = Result<bam::Record, rust_htslib::errors::Error>>,
{
    pub fn new(records: I) -> Self {
        TemplateIterator {
            records,
            pending: None,
        }
    }
}

impl<I> Iterator for TemplateIterator<I>
where
    I: Iterator<Item = Result<bam::Record, rust_htslib::errors::Error>>,
{
    type Item = Result<Template, rust_htslib::errors::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = match self.pending.take() {
            Some(rec) => rec,
            None => match self.records.next()? {
                Ok(rec) => rec,
                Err(e) => return Some(Err(e)),
            },
        };
        let name = first.qname().to_vec();
        let mut group = vec![first];
        loop {
            match self.records.next() {
                None => break,
                Some(Err(e)) => return Some(Err(e)),
                Some(Ok(rec)) => {
                    if rec.qname() == name.as_slice() {
                        group.push(rec);
                    } else {
                        self.pending = Some(rec);
                        break;
                    }
                }
            }
        }
        Some(Ok(Template::from_records(group)))
    }
}
