//! End-to-end runs of the `genomearray` binary.

use genomearray::test_utilities::temp_file_with;
use std::fs;
use std::process::Command;

fn genomearray_binary_path() -> &'static str {
    env!("CARGO_BIN_EXE_genomearray")
}

#[test]
fn test_convert_wiggle_to_bedgraph() {
    let plus = temp_file_with(
        "track type=bedGraph name=plus\nchrI\t10\t13\t2\nchrI\t13\t15\t2\nchrI\t20\t21\t0.5\n",
    );
    let minus = temp_file_with("variableStep chrom=chrII span=2\n4\t1\n");
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("signal");

    let output = Command::new(genomearray_binary_path())
        .arg("convert")
        .arg("--wiggle")
        .arg(format!("{}:+", plus.path().display()))
        .arg("--wiggle")
        .arg(format!("{}:-", minus.path().display()))
        .arg("--min-chr-size")
        .arg("1000")
        .arg("--track-param")
        .arg("visibility=full")
        .arg("--output")
        .arg(&prefix)
        .output()
        .expect("genomearray convert failed");
    assert!(output.status.success(), "{:?}", output);

    let fw = fs::read_to_string(dir.path().join("signal_fw.bedgraph")).unwrap();
    assert_eq!(
        fw,
        "track type=bedGraph name=signal_fw visibility=full\nchrI\t10\t15\t2\nchrI\t20\t21\t0.5\n"
    );
    let rc = fs::read_to_string(dir.path().join("signal_rc.bedgraph")).unwrap();
    assert_eq!(
        rc,
        "track type=bedGraph name=signal_rc visibility=full\nchrII\t3\t5\t1\n"
    );
}

#[test]
fn test_convert_bowtie_to_variable_step() {
    let bowtie = temp_file_with(
        "r1\t+\tchrI\t100\tACGTACGTAC\tIIIIIIIIII\t0\t\n\
         r2\t-\tchrI\t100\tACGTACGTAC\tIIIIIIIIII\t0\t\n",
    );
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("reads");

    let output = Command::new(genomearray_binary_path())
        .arg("convert")
        .arg("--bowtie")
        .arg(bowtie.path())
        .arg("--mapping")
        .arg("threeprime")
        .arg("--offset")
        .arg("2")
        .arg("--min-length")
        .arg("10")
        .arg("--backend")
        .arg("sparse")
        .arg("--min-chr-size")
        .arg("1000")
        .arg("--format")
        .arg("variablestep")
        .arg("--output")
        .arg(&prefix)
        .output()
        .expect("genomearray convert failed");
    assert!(output.status.success(), "{:?}", output);

    // three prime end of r1 is 109; two nt upstream is 107 (1-based 108)
    let fw = fs::read_to_string(dir.path().join("reads_fw.wig")).unwrap();
    assert_eq!(
        fw,
        "track type=wiggle_0 name=reads_fw\nvariableStep chrom=chrI span=1\n108\t1\n"
    );
    // three prime end of r2 is 100; two nt upstream is 102 (1-based 103)
    let rc = fs::read_to_string(dir.path().join("reads_rc.wig")).unwrap();
    assert_eq!(
        rc,
        "track type=wiggle_0 name=reads_rc\nvariableStep chrom=chrI span=1\n103\t1\n"
    );
}

#[test]
fn test_bad_wiggle_argument() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(genomearray_binary_path())
        .arg("convert")
        .arg("--wiggle")
        .arg("no_strand.wig")
        .arg("--output")
        .arg(dir.path().join("out"))
        .output()
        .expect("could not run genomearray");
    assert!(!output.status.success());
}

#[test]
fn test_missing_bam() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(genomearray_binary_path())
        .arg("bam")
        .arg(dir.path().join("missing.bam"))
        .arg("--output")
        .arg(dir.path().join("out"))
        .output()
        .expect("could not run genomearray");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Alignment file error"));
}
