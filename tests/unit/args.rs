//! Unit tests for cli/args.rs

use clap::{Args, Command, FromArgMatches};
use std::path::PathBuf;

use panladder::cli::RunArgs;
use panladder::config::{SearchEngine, SequenceType, SpanFilter, Staging};
use panladder::report::TableStyle;
use panladder::sequence::GenomeSource;
use panladder::PipelineError;

fn command() -> Command {
    Command::new("panladder").subcommand(RunArgs::augment_args(Command::new("run")))
}

fn parse_args(args: &[&str]) -> RunArgs {
    let mut all_args = vec!["panladder".to_string(), "run".to_string()];
    all_args.extend(args.iter().map(|s| s.to_string()));

    let matches = command().get_matches_from(all_args);
    let sub_matches = matches.subcommand_matches("run").unwrap();
    RunArgs::from_arg_matches(sub_matches).unwrap()
}

#[test]
fn test_default_values() {
    let args = parse_args(&["-i", "loci.faa"]);

    assert_eq!(args.inputs, vec![PathBuf::from("loci.faa")]);
    assert_eq!(args.seq_type, SequenceType::Protein);
    assert_eq!(args.engine, SearchEngine::Blast);
    assert_eq!(args.dedup_high, 100.0);
    assert_eq!(args.dedup_floor, 98.0);
    assert_eq!(args.dedup_step, 0.5);
    assert_eq!(args.memory_mb, 2000);
    assert!(!args.no_core);
    assert_eq!(args.evalue, 1e-6);
    assert_eq!(args.min_query_span, None);
    assert_eq!(args.chunks, 1);
    assert_eq!(args.thresholds, "50,60,70,80,90,95,98");
    assert_eq!(args.inflation, 1.5);
    assert_eq!(args.concurrency, 1);
    assert_eq!(args.num_threads, 0);
    assert!(!args.disk_staging);
    assert!(!args.native);
    assert!(!args.table_comments);
    assert_eq!(args.table_style(), TableStyle::plain());
    assert!(args.genome_source().is_none());
}

#[test]
fn test_table_comments_flag() {
    let args = parse_args(&["-i", "x.faa", "--table-comments"]);
    assert_eq!(args.table_style(), TableStyle::with_comments());
}

#[test]
fn test_multiple_inputs() {
    let args = parse_args(&["-i", "a.faa", "-i", "b.faa"]);
    assert_eq!(args.inputs.len(), 2);
}

#[test]
fn test_to_config_maps_every_section() {
    let args = parse_args(&[
        "-i",
        "loci.fna",
        "-t",
        "nucleotide",
        "--dedup-floor",
        "95",
        "--no-core",
        "--min-reciprocal-span",
        "0.8",
        "--thresholds",
        "90,70",
        "-I",
        "2.0",
        "-n",
        "8",
        "--concurrency",
        "2",
        "--disk-staging",
        "--work-dir",
        "scratch",
    ]);
    let config = args.to_config("loci").unwrap();
    assert_eq!(config.sequence_type, SequenceType::Nucleotide);
    assert_eq!(config.dedup.floor, 95.0);
    assert!(!config.dedup.extract_core);
    assert_eq!(config.search.span_filter, Some(SpanFilter::Reciprocal(0.8)));
    assert_eq!(config.cluster.thresholds, vec![70.0, 90.0]);
    assert_eq!(config.cluster.inflation, 2.0);
    assert_eq!(config.threads, 8);
    assert_eq!(config.threads_per_worker(2), 4);
    assert_eq!(config.staging, Staging::Disk);
    assert_eq!(config.work_dir, PathBuf::from("scratch").join("loci"));
}

#[test]
fn test_zero_threads_means_all_cpus() {
    let args = parse_args(&["-i", "x.faa"]);
    assert_eq!(args.to_config("x").unwrap().threads, num_cpus::get());
}

#[test]
fn test_two_span_filters_rejected() {
    let args = parse_args(&["-i", "x.faa", "--min-query-span", "0.5", "--min-reciprocal-span", "0.5"]);
    assert!(matches!(args.to_config("x"), Err(PipelineError::Configuration(_))));
}

#[test]
fn test_diamond_with_nucleotides_rejected() {
    let args = parse_args(&["-i", "x.fna", "-t", "nucl", "--engine", "diamond"]);
    assert!(matches!(args.to_config("x"), Err(PipelineError::Configuration(_))));
}

#[test]
fn test_bad_threshold_list_rejected() {
    let args = parse_args(&["-i", "x.faa", "--thresholds", "50,abc"]);
    assert!(args.to_config("x").is_err());
    let args = parse_args(&["-i", "x.faa", "--thresholds", "50,120"]);
    assert!(args.to_config("x").is_err());
}

#[test]
fn test_tiny_dedup_step_rejected() {
    let args = parse_args(&["-i", "x.faa", "--dedup-floor", "1", "--dedup-step", "1e-12"]);
    assert!(matches!(args.to_config("x"), Err(PipelineError::Configuration(_))));
}

#[test]
fn test_genome_sources() {
    let args = parse_args(&["-i", "x.faa", "--genome-delimiter", "_"]);
    assert!(matches!(args.genome_source(), Some(GenomeSource::IdDelimiter('_'))));
    let args = parse_args(&["-i", "x.faa", "--genome-map", "map.tsv"]);
    assert!(matches!(args.genome_source(), Some(GenomeSource::Mapping(_))));
}

#[test]
fn test_genome_map_and_delimiter_conflict() {
    let result = command().try_get_matches_from([
        "panladder",
        "run",
        "-i",
        "x.faa",
        "--genome-map",
        "map.tsv",
        "--genome-delimiter",
        "_",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_unknown_sequence_type_rejected() {
    let result = command().try_get_matches_from(["panladder", "run", "-i", "x.faa", "-t", "rna"]);
    assert!(result.is_err());
}
