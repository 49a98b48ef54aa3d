//! BigWig files as a [`SignalSource`].

use std::path::PathBuf;

use bigtools::utils::reopen::ReopenableFile;
use bigtools::BigWigRead;
use indexmap::IndexMap;
use log::{debug, warn};
use ndarray::Array1;

use crate::{error::GenomeArrayError, traits::SignalSource, Position};

/// A BigWig file opened for random access.
pub struct BigWigSource {
    path: PathBuf,
    reader: BigWigRead<ReopenableFile>,
    lengths: IndexMap<String, Position>,
    fill: f64,
    total: Option<f64>,
}

impl std::fmt::Debug for BigWigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigWigSource")
            .field("path", &self.path)
            .field("fill", &self.fill)
            .finish_non_exhaustive()
    }
}

impl BigWigSource {
    /// Open the BigWig file at `path`. Positions without data are reported
    /// as `fill`.
    pub fn open(path: impl Into<PathBuf>, fill: f64) -> Result<Self, GenomeArrayError> {
        let path = path.into();
        let reader = BigWigRead::open_file(&path)
            .map_err(|e| GenomeArrayError::SignalFile(format!("{:?}: {:?}", path, e)))?;
        let lengths = reader
            .chroms()
            .iter()
            .map(|chrom| (chrom.name.clone(), chrom.length as Position))
            .collect();
        debug!("Opened BigWig file {:?}", path);
        Ok(Self {
            path,
            reader,
            lengths,
            fill,
            total: None,
        })
    }
}

impl SignalSource for BigWigSource {
    fn chrom_lengths(&self) -> IndexMap<String, Position> {
        self.lengths.clone()
    }

    /// The sum of every covered base's value, computed once and cached.
    fn total(&mut self) -> Result<f64, GenomeArrayError> {
        if let Some(total) = self.total {
            return Ok(total);
        }
        let mut total = 0.0;
        let lengths = self.lengths.clone();
        for (chrom, length) in lengths {
            let intervals = self
                .reader
                .get_interval(&chrom, 0, length)
                .map_err(|e| GenomeArrayError::SignalFile(format!("{:?}", e)))?;
            for interval in intervals {
                let interval =
                    interval.map_err(|e| GenomeArrayError::SignalFile(format!("{:?}", e)))?;
                total += interval.value as f64 * (interval.end - interval.start) as f64;
            }
        }
        self.total = Some(total);
        Ok(total)
    }

    fn values(
        &mut self,
        chrom: &str,
        start: Position,
        end: Position,
    ) -> Result<Array1<f64>, GenomeArrayError> {
        let mut values = Array1::from_elem((end - start) as usize, self.fill);
        let length = match self.lengths.get(chrom) {
            Some(&length) => length,
            None => {
                warn!("Chromosome '{}' is not in {:?}.", chrom, self.path);
                return Ok(values);
            }
        };
        let query_end = end.min(length);
        if start >= query_end {
            return Ok(values);
        }
        let intervals = self
            .reader
            .get_interval(chrom, start, query_end)
            .map_err(|e| GenomeArrayError::SignalFile(format!("{:?}", e)))?;
        for interval in intervals {
            let interval =
                interval.map_err(|e| GenomeArrayError::SignalFile(format!("{:?}", e)))?;
            let from = interval.start.max(start);
            let to = interval.end.min(query_end);
            for position in from..to {
                values[(position - start) as usize] = interval.value as f64;
            }
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utilities::temp_file_with;
    use bigtools::beddata::BedParserStreamingIterator;
    use bigtools::BigWigWrite;
    use std::collections::HashMap;
    use std::fs::File;
    use std::path::Path;
    use tokio::runtime;

    const BEDGRAPH: &str = "\
chrA\t10\t20\t2
chrA\t20\t25\t0.5
chrA\t98\t100\t3
chrB\t0\t5\t1
";

    /// Write `BEDGRAPH` as a BigWig file into `dir`.
    fn write_bigwig(dir: &Path) -> PathBuf {
        let path = dir.join("signal.bw");
        let bedgraph = temp_file_with(BEDGRAPH);
        let chrom_map: HashMap<String, u32> =
            HashMap::from([("chrA".to_string(), 100), ("chrB".to_string(), 50)]);

        let mut writer = BigWigWrite::create_file(&path, chrom_map).unwrap();
        writer.options.channel_size = 0;
        let runtime = runtime::Builder::new_current_thread().build().unwrap();
        let file = File::open(bedgraph.path()).unwrap();
        let values = BedParserStreamingIterator::from_bedgraph_file(file, false);
        writer.write(values, runtime).unwrap();
        path
    }

    #[test]
    fn test_missing_file() {
        let result = BigWigSource::open("no/such/file.bw", 0.0);
        assert!(matches!(result, Err(GenomeArrayError::SignalFile(_))));
    }

    #[test]
    fn test_chrom_lengths_and_total() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = BigWigSource::open(write_bigwig(dir.path()), 0.0).unwrap();
        let lengths = source.chrom_lengths();
        assert_eq!(lengths.len(), 2);
        assert_eq!(lengths["chrA"], 100);
        assert_eq!(lengths["chrB"], 50);
        // 2 * 10 + 0.5 * 5 + 3 * 2 + 1 * 5
        assert_eq!(source.total().unwrap(), 33.5);
        assert_eq!(source.total().unwrap(), 33.5);
    }

    #[test]
    fn test_values_with_fill() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = BigWigSource::open(write_bigwig(dir.path()), -1.0).unwrap();
        let values = source.values("chrA", 5, 15).unwrap();
        assert_eq!(
            values.to_vec(),
            vec![-1.0, -1.0, -1.0, -1.0, -1.0, 2.0, 2.0, 2.0, 2.0, 2.0]
        );
        let values = source.values("chrA", 18, 27).unwrap();
        assert_eq!(
            values.to_vec(),
            vec![2.0, 2.0, 0.5, 0.5, 0.5, 0.5, 0.5, -1.0, -1.0]
        );
    }

    #[test]
    fn test_values_past_chrom_end() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = BigWigSource::open(write_bigwig(dir.path()), -1.0).unwrap();
        let values = source.values("chrA", 95, 105).unwrap();
        assert_eq!(
            values.to_vec(),
            vec![-1.0, -1.0, -1.0, 3.0, 3.0, -1.0, -1.0, -1.0, -1.0, -1.0]
        );
        let values = source.values("chrB", 60, 64).unwrap();
        assert_eq!(values.to_vec(), vec![-1.0; 4]);
    }

    #[test]
    fn test_values_unknown_chrom() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = BigWigSource::open(write_bigwig(dir.path()), 0.0).unwrap();
        assert_eq!(source.values("chrZ", 0, 3).unwrap().to_vec(), vec![0.0; 3]);
    }
}
