//! The [`GenomeArrayError`] `enum` definition and error messages.
//!
use crate::Position;
use genomap::GenomeMapError;
use std::num::{ParseFloatError, ParseIntError};
use thiserror::Error;

/// The [`GenomeArrayError`] defines the standard set of errors that should
/// be passed to the user.
#[derive(Debug, Error)]
pub enum GenomeArrayError {
    // IO related errors
    #[error("File reading eror: {0}")]
    IOError(#[from] std::io::Error),
    #[error("TSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    // File parsing related errors
    #[error("Integer parsing error: {0}")]
    ParseIntError(#[from] ParseIntError),
    #[error("Float parsing error: {0}")]
    ParseFloatError(#[from] ParseFloatError),
    #[error("Genome file is invalid: {0}")]
    InvalidGenomeFile(String),
    #[error("Invalid strand '{0}': must be either '+', '-', or '.'")]
    InvalidStrand(String),
    #[error("Malformed wiggle/bedGraph line {0}: {1}")]
    InvalidTrackLine(usize, String),
    #[error("Invalid offset table entry '{0}': expected LENGTH:OFFSET or default:OFFSET")]
    InvalidOffsetEntry(String),

    // Invalid genomic range errors
    #[error("Range invalid: start ({0}) must be less than or equal to end ({1})")]
    InvalidGenomicRange(Position, Position),
    #[error("Segment chain is empty")]
    EmptySegmentChain,
    #[error("Segment chain mixes chromosomes or strands: {0}")]
    InconsistentSegmentChain(String),
    #[error("Sequence name '{0}' is not in the array")]
    MissingSequence(String),
    #[error("Error encountered in genomap::GenomeMap")]
    GenomeMapError(#[from] GenomeMapError),

    // Array contract violations
    #[error("Strand '{0}' is not one of the array's strands ({1})")]
    StrandNotInArray(String, String),
    #[error("Value vector has length {0}, but the region has length {1}")]
    ValueLengthMismatch(usize, usize),
    #[error("Arrays have different dimensions: {0}")]
    DimensionMismatch(String),
    #[error("Combination mode '{0}' not understood. Must be 'same', 'all', or 'truncate'")]
    InvalidCombineMode(String),

    // Backend errors
    #[error("Alignment file error: {0}")]
    AlignmentFile(String),
    #[error("Signal file error: {0}")]
    SignalFile(String),

    // Command line tool related errors
    #[error("Command line argument error: {0}")]
    ArgumentError(#[from] clap::error::Error),
    #[error("Invalid command line input: {0}")]
    InvalidInput(String),
}
