use itertools::Itertools;

use crate::errors::Error;

/// Character representation of an alignment strand.
pub fn strand_char(positive: bool) -> char {
    if positive {
        '+'
    } else {
        '-'
    }
}

/// Join breakend positions into the comma-separated list stored in the
/// aggregated pileup table. Positions are sorted and deduplicated.
pub fn join_positions(positions: &[u64]) -> String {
    positions.iter().sorted().dedup().join(",")
}

pub fn parse_positions(value: &str) -> Result<Vec<u64>, Error> {
    value
        .split(',')
        .map(|pos| {
            pos.parse().map_err(|_| Error::InvalidPositionList {
                value: value.to_owned(),
            })
        })
        .collect()
}
