//! A reader for wiggle (variableStep and fixedStep) and bedGraph files.
//!
//! Every data line is converted to a 0-based, half-open [`WiggleRecord`].
//! `track` and `browser` lines, comments, and blank lines are skipped.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;

use crate::{error::GenomeArrayError, io::file::InputFile, Position};

/// A value over `[start, end)` on `chrom`.
#[derive(Clone, Debug, PartialEq)]
pub struct WiggleRecord {
    pub chrom: String,
    pub start: Position,
    pub end: Position,
    pub value: f64,
}

#[derive(Clone, Debug)]
enum Block {
    BedGraph,
    VariableStep {
        chrom: String,
        span: Position,
    },
    FixedStep {
        chrom: String,
        next: Position,
        step: Position,
        span: Position,
    },
}

fn invalid_line(line_number: usize, line: &str) -> GenomeArrayError {
    GenomeArrayError::InvalidTrackLine(line_number, line.trim_end().to_string())
}

/// Iterates over the records of a wiggle or bedGraph file.
pub struct WiggleReader<R: BufRead> {
    reader: R,
    block: Block,
    line: String,
    line_number: usize,
}

impl WiggleReader<BufReader<Box<dyn Read>>> {
    /// Open a plain or gzip-compressed file.
    pub fn from_path(filepath: impl Into<PathBuf>) -> Result<Self, GenomeArrayError> {
        let reader = InputFile::new(filepath).reader()?;
        Ok(Self::new(reader))
    }
}

impl<R: BufRead> WiggleReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            block: Block::BedGraph,
            line: String::new(),
            line_number: 0,
        }
    }

    fn invalid(&self) -> GenomeArrayError {
        invalid_line(self.line_number, &self.line)
    }

    /// Parse a `variableStep` or `fixedStep` declaration line.
    fn parse_declaration(&self, fields: &[&str]) -> Result<Block, GenomeArrayError> {
        let mut chrom = None;
        let mut start = None;
        let mut step = None;
        let mut span = 1;
        for field in &fields[1..] {
            let (key, value) = field.split_once('=').ok_or_else(|| self.invalid())?;
            match key {
                "chrom" => chrom = Some(value.to_string()),
                "start" => start = Some(value.parse::<Position>()?),
                "step" => step = Some(value.parse::<Position>()?),
                "span" => span = value.parse::<Position>()?,
                _ => return Err(self.invalid()),
            }
        }
        let chrom = chrom.ok_or_else(|| self.invalid())?;
        match fields[0] {
            "variableStep" => Ok(Block::VariableStep { chrom, span }),
            _ => {
                let (start, step) = start.zip(step).ok_or_else(|| self.invalid())?;
                if start == 0 {
                    return Err(self.invalid());
                }
                Ok(Block::FixedStep {
                    chrom,
                    next: start - 1,
                    step,
                    span,
                })
            }
        }
    }

    /// Parse a data line, or update the current block and return `None`.
    fn parse_line(&mut self) -> Result<Option<WiggleRecord>, GenomeArrayError> {
        let trimmed = self.line.trim();
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || trimmed.starts_with("track")
            || trimmed.starts_with("browser")
        {
            return Ok(None);
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        let invalid = || invalid_line(self.line_number, &self.line);
        if fields[0] == "variableStep" || fields[0] == "fixedStep" {
            self.block = self.parse_declaration(&fields)?;
            return Ok(None);
        }

        let record = match &mut self.block {
            Block::BedGraph => {
                if fields.len() != 4 {
                    return Err(invalid());
                }
                WiggleRecord {
                    chrom: fields[0].to_string(),
                    start: fields[1].parse()?,
                    end: fields[2].parse()?,
                    value: fields[3].parse()?,
                }
            }
            Block::VariableStep { chrom, span } => {
                if fields.len() != 2 {
                    return Err(invalid());
                }
                let position: Position = fields[0].parse()?;
                if position == 0 {
                    return Err(invalid());
                }
                WiggleRecord {
                    chrom: chrom.clone(),
                    start: position - 1,
                    end: position - 1 + *span,
                    value: fields[1].parse()?,
                }
            }
            Block::FixedStep {
                chrom,
                next,
                step,
                span,
            } => {
                if fields.len() != 1 {
                    return Err(invalid());
                }
                let record = WiggleRecord {
                    chrom: chrom.clone(),
                    start: *next,
                    end: *next + *span,
                    value: fields[0].parse()?,
                };
                *next += *step;
                record
            }
        };
        if record.start > record.end {
            return Err(invalid());
        }
        Ok(Some(record))
    }
}

impl<R: BufRead> Iterator for WiggleReader<R> {
    type Item = Result<WiggleRecord, GenomeArrayError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return None,
                Ok(_) => self.line_number += 1,
                Err(e) => return Some(Err(e.into())),
            }
            match self.parse_line() {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
