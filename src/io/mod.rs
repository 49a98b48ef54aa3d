//! Types and methods for reading inputs and writing track output.

pub mod bam;
pub mod bigwig;
pub mod bowtie;
pub mod file;
pub mod tracks;
pub mod wiggle;

pub use bam::IndexedBamSource;
pub use bigwig::BigWigSource;
pub use bowtie::{BowtieAlignment, BowtieReader};
pub use file::{InputFile, OutputFile};
pub use wiggle::{WiggleReader, WiggleRecord};
