use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use genomearray::{
    commands::{
        genomearray_bam, genomearray_convert, parse_track_param, parse_wiggle_arg, Backend,
        MappingOptions, MappingRule, TrackFormat, TrackOptions,
    },
    mapping::DEFAULT_MIN_LENGTH,
    prelude::{GenomeArrayError, Strand},
    reporting::CommandOutput,
    MIN_CHR_SIZE,
};
use log::warn;

const INFO: &str = "\
genomearray: per-nucleotide count and signal tracks
usage: genomearray [--help] <subcommand>

Subcommands:

  convert: read wiggle, bedGraph, or bowtie files into an array and write tracks.
  bam: map the reads of indexed BAM files and write tracks.

";

#[derive(Parser)]
#[clap(name = "genomearray")]
#[clap(about = INFO)]
struct Cli {
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct MappingArgs {
    /// where each alignment is counted
    #[arg(long, value_enum, default_value_t = MappingRule::Fiveprime)]
    mapping: MappingRule,

    /// offset from the read end, in nucleotides, for fiveprime and threeprime mapping
    #[arg(long, default_value_t = 0)]
    offset: usize,

    /// offsets by read length for fiveprime-variable mapping: a tab-delimited
    /// file, or a list like `28:12,29:12,default:13`
    #[arg(long)]
    offset_table: Option<String>,

    /// positions trimmed from each read end for center mapping
    #[arg(long, default_value_t = 0)]
    nibble: usize,

    /// minimum aligned read length to count
    #[arg(long, default_value_t = DEFAULT_MIN_LENGTH)]
    min_length: usize,

    /// maximum aligned read length to count
    #[arg(long)]
    max_length: Option<usize>,
}

impl From<&MappingArgs> for MappingOptions {
    fn from(args: &MappingArgs) -> Self {
        MappingOptions {
            rule: args.mapping,
            offset: args.offset,
            offset_table: args.offset_table.clone(),
            nibble: args.nibble,
            min_length: args.min_length,
            max_length: args.max_length,
        }
    }
}

#[derive(Args)]
struct TrackArgs {
    /// output prefix; one file per strand is written, e.g. `<prefix>_fw.wig`
    #[arg(short, long, required = true)]
    output: PathBuf,

    /// output track format
    #[arg(long, value_enum, default_value_t = TrackFormat::Bedgraph)]
    format: TrackFormat,

    /// track name (defaults to the output file name)
    #[arg(long)]
    trackname: Option<String>,

    /// report values as reads per million
    #[arg(long)]
    normalize: bool,

    /// extra KEY=VALUE parameters for the track definition line
    #[arg(long = "track-param", value_parser = track_param)]
    params: Vec<(String, String)>,
}

impl From<&TrackArgs> for TrackOptions {
    fn from(args: &TrackArgs) -> Self {
        let mut track = TrackOptions::new(&args.output, args.format);
        track.trackname = args.trackname.clone();
        track.normalize = args.normalize;
        track.params = args.params.iter().cloned().collect();
        track
    }
}

fn wiggle_input(arg: &str) -> Result<(PathBuf, Strand), String> {
    parse_wiggle_arg(arg).map_err(|e| e.to_string())
}

fn track_param(arg: &str) -> Result<(String, String), String> {
    parse_track_param(arg).map_err(|e| e.to_string())
}

#[derive(Subcommand)]
enum Commands {
    Convert {
        /// a wiggle or bedGraph file and the strand it belongs to, as FILE:STRAND
        /// (STRAND is '+', '-', or '.'); may be repeated
        #[arg(long, value_parser = wiggle_input)]
        wiggle: Vec<(PathBuf, Strand)>,

        /// a bowtie (native format) alignment file; may be repeated
        #[arg(long)]
        bowtie: Vec<PathBuf>,

        /// a TSV genome file of chromosome names and their lengths
        #[arg(long)]
        seqlens: Option<PathBuf>,

        /// size allocated for chromosomes not in the genome file
        #[arg(long, default_value_t = MIN_CHR_SIZE)]
        min_chr_size: usize,

        /// array storage
        #[arg(long, value_enum, default_value_t = Backend::Dense)]
        backend: Backend,

        #[command(flatten)]
        mapping: MappingArgs,

        #[command(flatten)]
        track: TrackArgs,
    },
    Bam {
        /// indexed BAM files (each with a `.bai` index alongside)
        #[arg(required = true)]
        bams: Vec<PathBuf>,

        /// number of positions queried at a time
        #[arg(long, default_value_t = genomearray::arrays::bam::DEFAULT_WINDOW_SIZE)]
        window_size: usize,

        #[command(flatten)]
        mapping: MappingArgs,

        #[command(flatten)]
        track: TrackArgs,
    },
}

fn run() -> Result<(), GenomeArrayError> {
    let cli = Cli::parse();

    let level = match cli.debug {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false)
        .init();

    let result: Result<CommandOutput<()>, GenomeArrayError> = match &cli.command {
        Some(Commands::Convert {
            wiggle,
            bowtie,
            seqlens,
            min_chr_size,
            backend,
            mapping,
            track,
        }) => genomearray_convert(
            wiggle,
            bowtie,
            &mapping.into(),
            *backend,
            seqlens.as_ref(),
            *min_chr_size,
            &track.into(),
        ),
        Some(Commands::Bam {
            bams,
            window_size,
            mapping,
            track,
        }) => genomearray_bam(bams, &mapping.into(), *window_size, &track.into()),
        None => {
            println!("{}\n", INFO);
            std::process::exit(1);
        }
    };
    let output = result?;
    for issue in output.report().issues() {
        warn!("{}", issue);
    }
    Ok(())
}

fn main() {
    match run() {
        Ok(_) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
