//! Mapping functions and read filters for alignment-backed arrays.
//!
//! A [`MappingFunction`] receives every read fetched for a query segment and
//! returns the reads it used, plus a count vector over the segment in
//! genomic order. Offsets are counted along the aligned reference positions
//! of a read, so they follow splice junctions.

use std::fmt;

use log::warn;
use ndarray::Array1;

use crate::{
    mapping::OffsetTable,
    ranges::{AlignedRead, GenomicSegment},
    Position,
};

type MapClosure = dyn Fn(Vec<AlignedRead>, &GenomicSegment) -> (Vec<AlignedRead>, Array1<f64>);

/// A named rule mapping fetched reads to counts over a query segment.
pub struct MappingFunction {
    description: String,
    func: Box<MapClosure>,
}

impl MappingFunction {
    pub fn new<F>(description: impl Into<String>, func: F) -> Self
    where
        F: Fn(Vec<AlignedRead>, &GenomicSegment) -> (Vec<AlignedRead>, Array1<f64>) + 'static,
    {
        Self {
            description: description.into(),
            func: Box::new(func),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Map `reads` onto `segment`, returning the reads that contributed and
    /// the counts in genomic order.
    pub fn apply(
        &self,
        reads: Vec<AlignedRead>,
        segment: &GenomicSegment,
    ) -> (Vec<AlignedRead>, Array1<f64>) {
        (self.func)(reads, segment)
    }
}

impl fmt::Debug for MappingFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingFunction")
            .field("description", &self.description)
            .finish()
    }
}

/// A predicate deciding whether a read is passed to the mapping function.
pub type ReadFilter = Box<dyn Fn(&AlignedRead) -> bool>;

/// Add `weight` at `position` if it falls inside `segment`. Returns whether
/// the position was counted.
fn count_at(
    counts: &mut Array1<f64>,
    segment: &GenomicSegment,
    position: Position,
    weight: f64,
) -> bool {
    if segment.contains(position) {
        counts[(position - segment.start) as usize] += weight;
        true
    } else {
        false
    }
}

/// Map a single site per read, picked by `site` from the read's aligned
/// positions. Reads whose site falls outside the segment are dropped.
fn single_site_mapping<F>(description: String, site: F) -> MappingFunction
where
    F: Fn(&AlignedRead, &[Position]) -> Option<Position> + 'static,
{
    MappingFunction::new(description, move |reads, segment| {
        let mut counts = Array1::zeros(segment.len());
        let mut kept = Vec::new();
        for read in reads {
            let positions = read.positions();
            let Some(position) = site(&read, &positions) else {
                continue;
            };
            if count_at(&mut counts, segment, position, 1.0) {
                kept.push(read);
            }
        }
        (kept, counts)
    })
}

/// The aligned position `offset` nucleotides 3' of the read's 5' end.
fn five_prime_site(read: &AlignedRead, positions: &[Position], offset: usize) -> Option<Position> {
    if offset >= positions.len() {
        warn!(
            "Offset {} nt greater than read length {} nt. Ignoring read {}.",
            offset,
            positions.len(),
            read.name
        );
        return None;
    }
    if read.is_reverse {
        Some(positions[positions.len() - 1 - offset])
    } else {
        Some(positions[offset])
    }
}

/// Map each read to the position `offset` nucleotides from its 5' end.
pub fn five_prime_mapping(offset: usize) -> MappingFunction {
    single_site_mapping(
        format!("five prime mapping, offset {} nt", offset),
        move |read, positions| five_prime_site(read, positions, offset),
    )
}

/// Map each read to the position `offset` nucleotides from its 3' end.
pub fn three_prime_mapping(offset: usize) -> MappingFunction {
    single_site_mapping(
        format!("three prime mapping, offset {} nt", offset),
        move |read, positions| {
            if offset >= positions.len() {
                warn!(
                    "Offset {} nt greater than read length {} nt. Ignoring read {}.",
                    offset,
                    positions.len(),
                    read.name
                );
                return None;
            }
            if read.is_reverse {
                Some(positions[offset])
            } else {
                Some(positions[positions.len() - 1 - offset])
            }
        },
    )
}

/// Map each read from its 5' end with an offset chosen by its aligned
/// length. Reads without an offset for their length are skipped.
pub fn variable_five_prime_mapping(table: OffsetTable) -> MappingFunction {
    single_site_mapping(
        "variable five prime mapping".to_string(),
        move |read, positions| {
            let Some(offset) = table.lookup(positions.len()) else {
                warn!(
                    "No offset for reads of length {}. Ignoring read {}.",
                    positions.len(),
                    read.name
                );
                return None;
            };
            if offset < 0 {
                warn!("Negative offset {} is not supported. Ignoring.", offset);
                return None;
            }
            five_prime_site(read, positions, offset as usize)
        },
    )
}

/// Trim `nibble` positions from each end of every read and divide `value`
/// evenly over the remaining positions.
pub fn center_mapping(nibble: usize, value: f64) -> MappingFunction {
    MappingFunction::new(
        format!("center mapping, nibble {} nt", nibble),
        move |reads, segment| {
            let mut counts = Array1::zeros(segment.len());
            let mut kept = Vec::new();
            for read in reads {
                let positions = read.positions();
                if positions.len() <= 2 * nibble {
                    warn!(
                        "Read {} ({} nt) is not longer than 2 * nibble ({} nt). Ignoring.",
                        read.name,
                        positions.len(),
                        2 * nibble
                    );
                    continue;
                }
                let trimmed = &positions[nibble..positions.len() - nibble];
                let weight = value / trimmed.len() as f64;
                let mut overlaps = false;
                for &position in trimmed {
                    overlaps |= count_at(&mut counts, segment, position, weight);
                }
                if overlaps {
                    kept.push(read);
                }
            }
            (kept, counts)
        },
    )
}

/// Keep reads whose aligned length is within `[min_length, max_length]`.
/// `None` leaves the upper bound open.
pub fn size_filter(min_length: usize, max_length: Option<usize>) -> ReadFilter {
    Box::new(move |read| {
        let length = read.aligned_length();
        length >= min_length && max_length.map_or(true, |max| length <= max)
    })
}
