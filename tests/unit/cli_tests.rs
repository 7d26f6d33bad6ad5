//! Command-line parsing

use clap::Parser;
use pqcompare::cli::{Cli, Commands};
use std::path::PathBuf;

#[test]
fn test_compare_with_all_options() {
    let cli = Cli::try_parse_from([
        "pqcompare",
        "compare",
        "before.parquet",
        "after.parquet",
        "--config",
        "rules.yaml",
        "--tolerance",
        "0.01",
        "--no-checksum",
        "--json",
        "--report-dir",
        "out",
    ])
    .unwrap();

    match cli.command {
        Commands::Compare {
            before,
            after,
            config,
            tolerance,
            no_checksum,
            json,
            report_dir,
        } => {
            assert_eq!(before, PathBuf::from("before.parquet"));
            assert_eq!(after, PathBuf::from("after.parquet"));
            assert_eq!(config, Some(PathBuf::from("rules.yaml")));
            assert_eq!(tolerance, Some(0.01));
            assert!(no_checksum);
            assert!(json);
            assert_eq!(report_dir, Some(PathBuf::from("out")));
        }
        _ => panic!("expected compare"),
    }
}

#[test]
fn test_run_flags() {
    let cli = Cli::try_parse_from(["pqcompare", "--verbose", "run", "--config", "c.yaml", "--force", "--no-checksum", "--no-progress"])
        .unwrap();
    assert!(cli.verbose);
    match cli.command {
        Commands::Run {
            force,
            no_checksum,
            no_progress,
            workers,
            ..
        } => {
            assert!(force);
            assert!(no_checksum);
            assert!(no_progress);
            assert_eq!(workers, None);
        }
        _ => panic!("expected run"),
    }
}

#[test]
fn test_invalid_arguments_are_rejected() {
    assert!(Cli::try_parse_from(["pqcompare", "run", "--config", "c.yaml", "--workers", "0"]).is_err());
    assert!(Cli::try_parse_from(["pqcompare", "compare", "a.parquet"]).is_err());
    assert!(Cli::try_parse_from(["pqcompare", "compare", "a", "b", "--tolerance", "-0.1"]).is_err());
    assert!(Cli::try_parse_from(["pqcompare", "bogus"]).is_err());
}
