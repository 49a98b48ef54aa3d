//! Writers for variableStep wiggle and bedGraph tracks.

use std::io::Write;

use indexmap::IndexMap;

use crate::error::GenomeArrayError;

/// Write a `track` definition line. Extra parameters are written sorted by key.
pub fn write_track_line<W: Write>(
    writer: &mut W,
    track_type: &str,
    trackname: &str,
    params: &IndexMap<String, String>,
) -> Result<(), GenomeArrayError> {
    write!(writer, "track type={} name={}", track_type, trackname)?;
    let mut params: Vec<_> = params.iter().collect();
    params.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in params {
        write!(writer, " {}={}", key, value)?;
    }
    writeln!(writer)?;
    Ok(())
}

/// Writes `variableStep` blocks with a span of one.
pub struct VariableStepWriter<'w, W: Write> {
    writer: &'w mut W,
}

impl<'w, W: Write> VariableStepWriter<'w, W> {
    pub fn new(writer: &'w mut W) -> Self {
        Self { writer }
    }

    /// Start the block of a new chromosome.
    pub fn start_chrom(&mut self, chrom: &str) -> Result<(), GenomeArrayError> {
        writeln!(self.writer, "variableStep chrom={} span=1", chrom)?;
        Ok(())
    }

    /// Write the value at 0-based `position`; the file is 1-based.
    pub fn write_value(&mut self, position: u64, value: f64) -> Result<(), GenomeArrayError> {
        writeln!(self.writer, "{}\t{}", position + 1, value)?;
        Ok(())
    }
}

/// Writes bedGraph lines, merging adjacent positions of equal value into
/// one run.
///
/// Positions must be pushed in increasing order within each chromosome.
/// Zero values are never written.
pub struct BedGraphWriter<'w, W: Write> {
    writer: &'w mut W,
    run: Option<Run>,
}

struct Run {
    chrom: String,
    start: u64,
    end: u64,
    value: f64,
}

impl<'w, W: Write> BedGraphWriter<'w, W> {
    pub fn new(writer: &'w mut W) -> Self {
        Self { writer, run: None }
    }

    /// Add the value at 0-based `position`.
    pub fn push(&mut self, chrom: &str, position: u64, value: f64) -> Result<(), GenomeArrayError> {
        if value == 0.0 {
            return Ok(());
        }
        if let Some(run) = self.run.as_mut() {
            if run.chrom == chrom && run.end == position && run.value == value {
                run.end += 1;
                return Ok(());
            }
        }
        self.flush()?;
        self.run = Some(Run {
            chrom: chrom.to_string(),
            start: position,
            end: position + 1,
            value,
        });
        Ok(())
    }

    fn flush(&mut self) -> Result<(), GenomeArrayError> {
        if let Some(run) = self.run.take() {
            writeln!(
                self.writer,
                "{}\t{}\t{}\t{}",
                run.chrom, run.start, run.end, run.value
            )?;
        }
        Ok(())
    }

    /// Write the last open run.
    pub fn finish(mut self) -> Result<(), GenomeArrayError> {
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_line_sorted_params() {
        let mut params = IndexMap::new();
        params.insert("visibility".to_string(), "full".to_string());
        params.insert("color".to_string(), "255,0,0".to_string());
        let mut out = Vec::new();
        write_track_line(&mut out, "bedGraph", "test", &params).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "track type=bedGraph name=test color=255,0,0 visibility=full\n"
        );
    }

    #[test]
    fn test_bedgraph_runs() {
        let mut out = Vec::new();
        let mut writer = BedGraphWriter::new(&mut out);
        for (position, value) in [(3, 1.0), (4, 1.0), (5, 2.5), (7, 2.5), (8, 0.0)] {
            writer.push("chr1", position, value).unwrap();
        }
        writer.push("chr2", 8, 2.5).unwrap();
        writer.finish().unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "chr1\t3\t5\t1\nchr1\t5\t6\t2.5\nchr1\t7\t8\t2.5\nchr2\t8\t9\t2.5\n"
        );
    }

    #[test]
    fn test_variable_step() {
        let mut out = Vec::new();
        let mut writer = VariableStepWriter::new(&mut out);
        writer.start_chrom("chrI").unwrap();
        writer.write_value(0, 3.0).unwrap();
        writer.write_value(9, 0.5).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "variableStep chrom=chrI span=1\n1\t3\n10\t0.5\n"
        );
    }
}
