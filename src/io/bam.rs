//! Indexed BAM files as an [`AlignmentSource`].

use std::fs::File;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use noodles::core::{Position as BamPosition, Region};
use noodles::csi::binning_index::ReferenceSequence as _;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::{bam, bgzf, sam};

use crate::{
    error::GenomeArrayError, ranges::AlignedRead, traits::AlignmentSource, Position,
};

/// An indexed BAM file. The index is expected next to the file, at
/// `<path>.bai`.
pub struct IndexedBamSource {
    path: PathBuf,
    reader: bam::io::IndexedReader<bgzf::Reader<File>>,
    header: sam::Header,
    mapped: u64,
}

impl std::fmt::Debug for IndexedBamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedBamSource")
            .field("path", &self.path)
            .field("mapped", &self.mapped)
            .finish_non_exhaustive()
    }
}

/// Sum the mapped record counts stored in the BAI index metadata.
fn read_mapped_count(index_path: &Path) -> Result<u64, GenomeArrayError> {
    let index = bam::bai::read(index_path)?;
    let mut mapped = 0;
    for reference_sequence in index.reference_sequences() {
        match reference_sequence.metadata() {
            Some(metadata) => mapped += metadata.mapped_record_count(),
            None => debug!("BAI reference without metadata in {:?}", index_path),
        }
    }
    Ok(mapped)
}

impl IndexedBamSource {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, GenomeArrayError> {
        let path = path.into();
        let mut reader = bam::io::indexed_reader::Builder::default()
            .build_from_path(&path)
            .map_err(|e| GenomeArrayError::AlignmentFile(format!("{:?}: {}", path, e)))?;
        let header = reader.read_header()?;

        let mut index_path = path.clone().into_os_string();
        index_path.push(".bai");
        let mapped = read_mapped_count(Path::new(&index_path))?;
        debug!("Opened {:?} with {} mapped reads", path, mapped);
        Ok(Self {
            path,
            reader,
            header,
            mapped,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Convert a BAM record into an [`AlignedRead`]. Returns `None` for
/// unmapped records.
fn aligned_read(
    record: &bam::Record,
    chrom: &str,
) -> Result<Option<AlignedRead>, GenomeArrayError> {
    let flags = record.flags();
    if flags.is_unmapped() {
        return Ok(None);
    }
    let start = match record.alignment_start().transpose()? {
        Some(position) => (usize::from(position) - 1) as Position,
        None => return Ok(None),
    };

    let mut blocks: Vec<(Position, Position)> = Vec::new();
    let mut cursor = start;
    for op in record.cigar().iter() {
        let op = op?;
        let len = op.len() as Position;
        match op.kind() {
            Kind::Match | Kind::SequenceMatch | Kind::SequenceMismatch => {
                match blocks.last_mut() {
                    Some(last) if last.1 == cursor => last.1 += len,
                    _ => blocks.push((cursor, cursor + len)),
                }
                cursor += len;
            }
            Kind::Deletion | Kind::Skip => cursor += len,
            _ => {}
        }
    }
    if blocks.is_empty() {
        return Ok(None);
    }

    let name = record.name().map(|n| n.to_string()).unwrap_or_default();
    Ok(Some(AlignedRead {
        name,
        chrom: chrom.to_string(),
        blocks,
        is_reverse: flags.is_reverse_complemented(),
        query_length: record.sequence().len(),
    }))
}

impl AlignmentSource for IndexedBamSource {
    fn references(&self) -> Vec<(String, Position)> {
        self.header
            .reference_sequences()
            .iter()
            .map(|(name, reference)| {
                (name.to_string(), usize::from(reference.length()) as Position)
            })
            .collect()
    }

    fn mapped(&self) -> u64 {
        self.mapped
    }

    fn fetch(
        &mut self,
        chrom: &str,
        start: Position,
        end: Position,
    ) -> Result<Vec<AlignedRead>, GenomeArrayError> {
        if start >= end {
            return Ok(Vec::new());
        }
        let known = self
            .header
            .reference_sequences()
            .keys()
            .any(|name| &name[..] == chrom.as_bytes());
        if !known {
            warn!("Chromosome '{}' is not in {:?}.", chrom, self.path);
            return Ok(Vec::new());
        }
        let bad_position = || GenomeArrayError::InvalidGenomicRange(start, end);
        let interval_start = BamPosition::new(start as usize + 1).ok_or_else(bad_position)?;
        let interval_end = BamPosition::new(end as usize).ok_or_else(bad_position)?;
        let region = Region::new(chrom, interval_start..=interval_end);

        let query = self.reader.query(&self.header, &region)?;
        let mut reads = Vec::new();
        for result in query {
            let record = result?;
            if let Some(read) = aligned_read(&record, chrom)? {
                reads.push(read);
            }
        }
        Ok(reads)
    }
}
