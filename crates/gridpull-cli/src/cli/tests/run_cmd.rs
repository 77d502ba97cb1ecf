//! Tests for the run, config, and completions subcommands.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_run_defaults() {
    match parse(&["gridpull", "run", "-n", "node1", "-d", "112935"]) {
        CliCommand::Run {
            output,
            node,
            dataset,
            data_dir,
            verbosity,
            retry_elsewhere,
        } => {
            assert!(output.is_none());
            assert_eq!(node, vec!["node1"]);
            assert_eq!(dataset, "112935");
            assert_eq!(data_dir, "Data");
            assert_eq!(verbosity, "warn");
            assert!(!retry_elsewhere);
        }
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_run_repeatable_nodes() {
    match parse(&[
        "gridpull", "run", "-n", "node1", "-n", "node2", "-n", "node3", "-d", "7",
    ]) {
        CliCommand::Run { node, .. } => {
            assert_eq!(node, vec!["node1", "node2", "node3"]);
        }
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_run_all_flags() {
    match parse(&[
        "gridpull",
        "run",
        "--output",
        "/srv/downloads",
        "--node",
        "http://grid:4444/wd/hub",
        "--dataset",
        "42",
        "--data-dir",
        "Files",
        "--verbosity",
        "debug",
        "--retry-elsewhere",
    ]) {
        CliCommand::Run {
            output,
            node,
            data_dir,
            verbosity,
            retry_elsewhere,
            ..
        } => {
            assert_eq!(output.as_deref(), Some(std::path::Path::new("/srv/downloads")));
            assert_eq!(node, vec!["http://grid:4444/wd/hub"]);
            assert_eq!(data_dir, "Files");
            assert_eq!(verbosity, "debug");
            assert!(retry_elsewhere);
        }
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_run_requires_a_node() {
    assert!(Cli::try_parse_from(["gridpull", "run", "-d", "42"]).is_err());
}

#[test]
fn cli_run_rejects_unknown_verbosity() {
    assert!(Cli::try_parse_from([
        "gridpull", "run", "-n", "node1", "-d", "42", "-v", "loud"
    ])
    .is_err());
}

#[test]
fn cli_parse_config() {
    assert!(matches!(parse(&["gridpull", "config"]), CliCommand::Config));
}

#[test]
fn cli_parse_completions() {
    match parse(&["gridpull", "completions", "bash"]) {
        CliCommand::Completions { shell } => {
            assert_eq!(shell, clap_complete::Shell::Bash);
        }
        _ => panic!("expected Completions"),
    }
}

#[test]
fn verbosity_accessor_only_set_for_run() {
    let cli = Cli::try_parse_from(["gridpull", "run", "-n", "n", "-d", "1", "-v", "info"]).unwrap();
    assert_eq!(cli.verbosity().as_deref(), Some("info"));
    let cli = Cli::try_parse_from(["gridpull", "config"]).unwrap();
    assert!(cli.verbosity().is_none());
}
