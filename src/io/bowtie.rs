//! A reader for bowtie's native (default) alignment output.
//!
//! Each tab-delimited line holds the read name, strand, reference name,
//! 0-based leftmost offset, read sequence, qualities, the number of other
//! alignments, and an optional list of mismatches.

use csv::{DeserializeRecordsIntoIter, ReaderBuilder};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer};
use std::io::{BufReader, Read};
use std::path::PathBuf;

use crate::{
    error::GenomeArrayError,
    io::file::InputFile,
    ranges::{GenomicSegment, Strand},
    Position,
};

fn deserialize_strand<'de, D>(deserializer: D) -> Result<Strand, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    s.parse::<Strand>()
        .map_err(|e| DeError::custom(format!("parsing error: {}", e)))
}

/// One line of bowtie native output.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct BowtieAlignment {
    pub name: String,
    #[serde(deserialize_with = "deserialize_strand")]
    pub strand: Strand,
    pub chrom: String,
    pub offset: Position,
    pub sequence: String,
    pub qualities: String,
    pub other_alignments: u32,
    #[serde(default)]
    pub mismatches: Option<String>,
}

impl BowtieAlignment {
    /// Aligned length, i.e. the length of the read sequence.
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// The reference segment covered by the alignment.
    pub fn segment(&self) -> GenomicSegment {
        GenomicSegment {
            chrom: self.chrom.clone(),
            start: self.offset,
            end: self.offset + self.len() as Position,
            strand: self.strand,
        }
    }
}

/// Iterates over [`BowtieAlignment`] records of a plain or gzip-compressed file.
pub struct BowtieReader<R: Read> {
    inner: DeserializeRecordsIntoIter<R, BowtieAlignment>,
}

impl<R: Read> std::fmt::Debug for BowtieReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BowtieReader").finish_non_exhaustive()
    }
}

impl BowtieReader<BufReader<Box<dyn Read>>> {
    pub fn from_path(filepath: impl Into<PathBuf>) -> Result<Self, GenomeArrayError> {
        let reader = InputFile::new(filepath).reader()?;
        Ok(Self::new(reader))
    }
}

impl<R: Read> BowtieReader<R> {
    pub fn new(reader: R) -> Self {
        let inner = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .from_reader(reader)
            .into_deserialize();
        Self { inner }
    }
}

impl<R: Read> Iterator for BowtieReader<R> {
    type Item = Result<BowtieAlignment, GenomeArrayError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|res| res.map_err(Into::into))
    }
}
