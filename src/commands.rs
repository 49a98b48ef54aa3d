//! The operations behind the `genomearray` subcommands.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use indexmap::IndexMap;
use log::{debug, info};

use crate::{
    arrays::StrandedArray,
    io::{BowtieReader, IndexedBamSource, OutputFile, WiggleReader},
    mapping::factories::{
        center_mapping, five_prime_mapping, size_filter, three_prime_mapping,
        variable_five_prime_mapping, MappingFunction,
    },
    mapping::{
        center_map, five_prime_map, three_prime_map, variable_five_prime_map, MapRule,
        DEFAULT_MIN_LENGTH,
    },
    prelude::*,
    reporting::{CommandOutput, Report},
    PositionOffset,
};

/// Storage backend of an in-memory array.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    #[default]
    Dense,
    Sparse,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum TrackFormat {
    #[default]
    Bedgraph,
    Variablestep,
}

impl TrackFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TrackFormat::Bedgraph => "bedgraph",
            TrackFormat::Variablestep => "wig",
        }
    }
}

/// Where each alignment's count is placed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum MappingRule {
    #[default]
    Fiveprime,
    Threeprime,
    FiveprimeVariable,
    Center,
}

/// How alignments are turned into counts.
#[derive(Clone, Debug)]
pub struct MappingOptions {
    pub rule: MappingRule,
    pub offset: usize,
    /// A tab-delimited offset file, or an inline list like `28:12,default:13`.
    pub offset_table: Option<String>,
    pub nibble: usize,
    pub min_length: usize,
    pub max_length: Option<usize>,
}

impl Default for MappingOptions {
    fn default() -> Self {
        Self {
            rule: MappingRule::default(),
            offset: 0,
            offset_table: None,
            nibble: 0,
            min_length: DEFAULT_MIN_LENGTH,
            max_length: None,
        }
    }
}

impl MappingOptions {
    fn offset_table(&self) -> Result<OffsetTable, GenomeArrayError> {
        match &self.offset_table {
            Some(table) if Path::new(table).exists() => OffsetTable::from_path(table),
            Some(table) => table.parse(),
            None => Err(GenomeArrayError::InvalidInput(
                "the fiveprime-variable rule needs an offset table".to_string(),
            )),
        }
    }

    /// The rule and parameters applied to each alignment of a bowtie file.
    pub fn map_rule(&self) -> Result<(MapRule, MapParams), GenomeArrayError> {
        let offset = self.offset as PositionOffset;
        Ok(match self.rule {
            MappingRule::Fiveprime => (five_prime_map as MapRule, MapParams::with_offset(offset)),
            MappingRule::Threeprime => (three_prime_map as MapRule, MapParams::with_offset(offset)),
            MappingRule::FiveprimeVariable => (
                variable_five_prime_map as MapRule,
                MapParams::with_table(self.offset_table()?),
            ),
            MappingRule::Center => (center_map as MapRule, MapParams::with_nibble(self.nibble)),
        })
    }

    /// The mapping function applied to the reads of an alignment-backed array.
    pub fn mapping_function(&self) -> Result<MappingFunction, GenomeArrayError> {
        Ok(match self.rule {
            MappingRule::Fiveprime => five_prime_mapping(self.offset),
            MappingRule::Threeprime => three_prime_mapping(self.offset),
            MappingRule::FiveprimeVariable => variable_five_prime_mapping(self.offset_table()?),
            MappingRule::Center => center_mapping(self.nibble, 1.0),
        })
    }

    fn has_size_limits(&self) -> bool {
        self.min_length > 0 || self.max_length.is_some()
    }
}

/// Output settings shared by the subcommands. One file is written per
/// strand, at `<prefix>_fw`, `<prefix>_rc`, or `<prefix>_un` plus the
/// format's extension.
#[derive(Clone, Debug)]
pub struct TrackOptions {
    pub prefix: PathBuf,
    pub format: TrackFormat,
    pub trackname: Option<String>,
    pub normalize: bool,
    pub params: IndexMap<String, String>,
}

impl TrackOptions {
    pub fn new(prefix: impl Into<PathBuf>, format: TrackFormat) -> Self {
        Self {
            prefix: prefix.into(),
            format,
            trackname: None,
            normalize: false,
            params: IndexMap::new(),
        }
    }

    fn trackname(&self) -> String {
        match &self.trackname {
            Some(name) => name.clone(),
            None => self
                .prefix
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "genomearray".to_string()),
        }
    }

    /// The output file for `strand`.
    pub fn path(&self, strand: Strand) -> PathBuf {
        let mut path = self.prefix.clone().into_os_string();
        path.push(format!(
            "_{}.{}",
            strand_suffix(strand),
            self.format.extension()
        ));
        PathBuf::from(path)
    }
}

fn strand_suffix(strand: Strand) -> &'static str {
    match strand {
        Strand::Plus => "fw",
        Strand::Minus => "rc",
        Strand::Unstranded => "un",
    }
}

/// Parse a `FILE:STRAND` argument, splitting at the last colon.
pub fn parse_wiggle_arg(arg: &str) -> Result<(PathBuf, Strand), GenomeArrayError> {
    let (path, strand) = arg.rsplit_once(':').ok_or_else(|| {
        GenomeArrayError::InvalidInput(format!("'{}' is not of the form FILE:STRAND", arg))
    })?;
    Ok((PathBuf::from(path), strand.parse()?))
}

/// Parse a `KEY=VALUE` track line parameter.
pub fn parse_track_param(arg: &str) -> Result<(String, String), GenomeArrayError> {
    let (key, value) = arg.split_once('=').ok_or_else(|| {
        GenomeArrayError::InvalidInput(format!("'{}' is not of the form KEY=VALUE", arg))
    })?;
    Ok((key.to_string(), value.to_string()))
}

/// Open one output file per strand and hand each to `write`.
fn write_tracks<F>(
    track: &TrackOptions,
    strands: &[Strand],
    mut write: F,
) -> Result<(), GenomeArrayError>
where
    F: FnMut(&mut Box<dyn Write>, &str, Strand) -> Result<(), GenomeArrayError>,
{
    let trackname = track.trackname();
    for &strand in strands {
        let path = track.path(strand);
        info!("Writing strand {} to {:?}", strand, path);
        let mut writer = OutputFile::new(&path).writer()?;
        let name = format!("{}_{}", trackname, strand_suffix(strand));
        write(&mut writer, &name, strand)?;
        writer.flush()?;
    }
    Ok(())
}

/// Accumulate wiggle and bowtie inputs into `array`.
fn fill_array<B: StrandBuffer>(
    array: &mut StrandedArray<B>,
    wiggles: &[(PathBuf, Strand)],
    bowtie: &[PathBuf],
    mapping: &MappingOptions,
    report: &mut Report,
) -> Result<(), GenomeArrayError> {
    for (path, strand) in wiggles {
        info!("Reading {:?} onto strand {}", path, strand);
        let intervals = array.add_from_wiggle(WiggleReader::from_path(path)?, *strand)?;
        debug!("Read {} intervals from {:?}", intervals, path);
    }
    if bowtie.is_empty() {
        return Ok(());
    }
    let (rule, params) = mapping.map_rule()?;
    for path in bowtie {
        info!("Reading alignments from {:?}", path);
        let mut total = 0;
        let records = BowtieReader::from_path(path)?.inspect(|_| total += 1);
        let counted = array.add_from_bowtie(
            records,
            rule,
            &params,
            mapping.min_length,
            mapping.max_length,
        )?;
        if counted < total {
            report.add_issue(format!(
                "{} of {} alignments in {:?} were outside the length range and not counted",
                total - counted,
                total,
                path
            ));
        }
    }
    Ok(())
}

fn convert_with<B: StrandBuffer>(
    mut array: StrandedArray<B>,
    wiggles: &[(PathBuf, Strand)],
    bowtie: &[PathBuf],
    mapping: &MappingOptions,
    track: &TrackOptions,
) -> Result<CommandOutput<()>, GenomeArrayError> {
    let mut report = Report::new();
    fill_array(&mut array, wiggles, bowtie, mapping, &mut report)?;
    if array.sum()? == 0.0 {
        report.add_issue("the inputs contain no nonzero values".to_string());
    }
    array.set_normalize(track.normalize);

    let strands = array.strands();
    write_tracks(track, &strands, |writer, name, strand| match track.format {
        TrackFormat::Bedgraph => array.to_bedgraph(writer, name, strand, &track.params),
        TrackFormat::Variablestep => array.to_variable_step(writer, name, strand, &track.params),
    })?;
    Ok(CommandOutput::new((), report))
}

/// Read wiggle, bedGraph, and bowtie inputs into an in-memory array and
/// write it out as one track per strand.
///
/// The array stores the `+` and `-` strands, and the unstranded strand too
/// if any wiggle input is assigned to it. If `seqlens` is given, its
/// chromosomes are allocated up front; others are allocated at
/// `min_chr_size` when first read.
pub fn genomearray_convert(
    wiggles: &[(PathBuf, Strand)],
    bowtie: &[PathBuf],
    mapping: &MappingOptions,
    backend: Backend,
    seqlens: Option<&PathBuf>,
    min_chr_size: usize,
    track: &TrackOptions,
) -> Result<CommandOutput<()>, GenomeArrayError> {
    if wiggles.is_empty() && bowtie.is_empty() {
        return Err(GenomeArrayError::InvalidInput(
            "at least one wiggle or bowtie input is required".to_string(),
        ));
    }
    let mut strands = Strand::DEFAULT.to_vec();
    if wiggles.iter().any(|(_, strand)| *strand == Strand::Unstranded) {
        strands.push(Strand::Unstranded);
    }
    let config = ArrayConfig::with_strands(&strands).min_chr_size(min_chr_size);
    let seqlens = match seqlens {
        Some(path) => read_seqlens(path)?,
        None => IndexMap::new(),
    };

    match backend {
        Backend::Dense => {
            let array = DenseGenomeArray::with_lengths(&seqlens, config)?;
            convert_with(array, wiggles, bowtie, mapping, track)
        }
        Backend::Sparse => {
            let array = SparseGenomeArray::with_lengths(&seqlens, config)?;
            convert_with(array, wiggles, bowtie, mapping, track)
        }
    }
}

/// Map the reads of one or more indexed BAM files and write the counts
/// of each strand as a track, `window_size` positions at a time.
pub fn genomearray_bam(
    bams: &[PathBuf],
    mapping: &MappingOptions,
    window_size: usize,
    track: &TrackOptions,
) -> Result<CommandOutput<()>, GenomeArrayError> {
    let mut report = Report::new();
    let mut sources = Vec::with_capacity(bams.len());
    for path in bams {
        sources.push(IndexedBamSource::open(path)?);
    }
    let mut array = BamGenomeArray::with_mapping(sources, mapping.mapping_function()?);
    if mapping.has_size_limits() {
        array.add_filter("size", size_filter(mapping.min_length, mapping.max_length));
    }
    if array.sum()? == 0.0 {
        report.add_issue("the BAM indices report no mapped reads".to_string());
    }
    array.set_normalize(track.normalize);

    write_tracks(
        track,
        &Strand::DEFAULT,
        |writer, name, strand| match track.format {
            TrackFormat::Bedgraph => {
                array.to_bedgraph(writer, name, strand, window_size, &track.params)
            }
            TrackFormat::Variablestep => {
                array.to_variable_step(writer, name, strand, window_size, &track.params)
            }
        },
    )?;
    Ok(CommandOutput::new((), report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utilities::temp_file_with;
    use std::fs;

    #[test]
    fn test_parse_wiggle_arg() {
        let (path, strand) = parse_wiggle_arg("data/c:d.wig:-").unwrap();
        assert_eq!(path, PathBuf::from("data/c:d.wig"));
        assert_eq!(strand, Strand::Minus);
        assert!(parse_wiggle_arg("reads.wig").is_err());
        assert!(parse_wiggle_arg("reads.wig:x").is_err());
    }

    #[test]
    fn test_track_paths() {
        let track = TrackOptions::new("out/sample", TrackFormat::Variablestep);
        assert_eq!(track.path(Strand::Plus), PathBuf::from("out/sample_fw.wig"));
        assert_eq!(track.path(Strand::Minus), PathBuf::from("out/sample_rc.wig"));
        assert_eq!(track.trackname(), "sample");
    }

    #[test]
    fn test_variable_rule_needs_table() {
        let mapping = MappingOptions {
            rule: MappingRule::FiveprimeVariable,
            ..Default::default()
        };
        assert!(mapping.map_rule().is_err());
        let mapping = MappingOptions {
            rule: MappingRule::FiveprimeVariable,
            offset_table: Some("30:12,default:14".to_string()),
            ..Default::default()
        };
        let (_, params) = mapping.map_rule().unwrap();
        assert_eq!(params.offset.lookup(30), Some(12));
        assert_eq!(params.offset.lookup(31), Some(14));
    }

    #[test]
    fn test_convert_bowtie_sparse() {
        let bowtie = temp_file_with(
            "r1\t+\tchrI\t10\tACGTACGTAC\tIIIIIIIIII\t0\t\n\
             r2\t+\tchrI\t10\tACGTACGTAC\tIIIIIIIIII\t0\t\n\
             r3\t-\tchrI\t20\tACGTA\tIIIII\t0\t\n\
             r4\t+\tchrI\t50\tACG\tIII\t0\t\n",
        );
        let dir = tempfile::tempdir().unwrap();
        let mapping = MappingOptions {
            min_length: 5,
            ..Default::default()
        };
        let track = TrackOptions::new(dir.path().join("reads"), TrackFormat::Bedgraph);
        let output = genomearray_convert(
            &[],
            &[bowtie.path().to_path_buf()],
            &mapping,
            Backend::Sparse,
            None,
            1000,
            &track,
        )
        .unwrap();
        assert_eq!(output.report().issues().len(), 1);

        let fw = fs::read_to_string(track.path(Strand::Plus)).unwrap();
        assert_eq!(fw, "track type=bedGraph name=reads_fw\nchrI\t10\t11\t2\n");
        let rc = fs::read_to_string(track.path(Strand::Minus)).unwrap();
        assert_eq!(rc, "track type=bedGraph name=reads_rc\nchrI\t24\t25\t1\n");
    }

    #[test]
    fn test_convert_wiggle_normalized() {
        let wiggle = temp_file_with("variableStep chrom=chrII span=1\n5\t1\n6\t3\n");
        let dir = tempfile::tempdir().unwrap();
        let mut track = TrackOptions::new(dir.path().join("signal"), TrackFormat::Variablestep);
        track.normalize = true;
        let wiggles = vec![(wiggle.path().to_path_buf(), Strand::Plus)];
        let output = genomearray_convert(
            &wiggles,
            &[],
            &MappingOptions::default(),
            Backend::Dense,
            None,
            100,
            &track,
        )
        .unwrap();
        assert!(output.report().is_empty());
        let fw = fs::read_to_string(track.path(Strand::Plus)).unwrap();
        assert_eq!(
            fw,
            "track type=wiggle_0 name=signal_fw\nvariableStep chrom=chrII span=1\n5\t250000\n6\t750000\n"
        );
        let rc = fs::read_to_string(track.path(Strand::Minus)).unwrap();
        assert_eq!(
            rc,
            "track type=wiggle_0 name=signal_rc\nvariableStep chrom=chrII span=1\n"
        );
    }

    #[test]
    fn test_convert_requires_input() {
        let track = TrackOptions::new("unused", TrackFormat::Bedgraph);
        let result = genomearray_convert(
            &[],
            &[],
            &MappingOptions::default(),
            Backend::Dense,
            None,
            100,
            &track,
        );
        assert!(matches!(result, Err(GenomeArrayError::InvalidInput(_))));
    }
}
