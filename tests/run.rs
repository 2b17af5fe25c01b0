//! Integration tests for the `run` command.
use gridvalue::cli::{RunOpts, handle_run_command};
use gridvalue::settings::Settings;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const OUTPUT_FILE_NAMES: [&str; 7] = [
    "arbitrage_revenue.csv",
    "capacity_value.csv",
    "curtailment_marginal.csv",
    "curtailment_recovery.csv",
    "metadata.toml",
    "storage_capacity_credit.csv",
    "top_hours.csv",
];

/// Get the path to the example case.
fn get_case_dir() -> PathBuf {
    PathBuf::from("demos/simple")
}

/// Read the header and rows of a CSV output file
fn read_records(file_path: &Path) -> (csv::StringRecord, Vec<csv::StringRecord>) {
    let mut reader = csv::Reader::from_path(file_path).unwrap();
    let header = reader.headers().unwrap().clone();
    let rows = reader.records().map(Result::unwrap).collect();
    (header, rows)
}

/// An integration test for the `run` command.
#[test]
fn test_handle_run_command() {
    unsafe { std::env::set_var("GRIDVALUE_LOG_LEVEL", "off") };

    // Save results to non-existent directory to check that directory creation works
    let tempdir = tempdir().unwrap();
    let output_dir = tempdir.path().join("results");
    let opts = RunOpts {
        output_dir: Some(output_dir.clone()),
        overwrite: false,
    };
    handle_run_command(&get_case_dir(), &opts, Some(Settings::default())).unwrap();

    for file_name in OUTPUT_FILE_NAMES {
        assert!(output_dir.join(file_name).is_file(), "Missing {file_name}");
    }

    // Regions are pooled into their capacity-credit groups
    let (header, rows) = read_records(&output_dir.join("storage_capacity_credit.csv"));
    assert_eq!(
        header.iter().collect::<Vec<_>>(),
        [
            "area",
            "storage_tech_id",
            "power",
            "energy",
            "efficiency",
            "capacity_credit"
        ]
    );
    let areas: Vec<_> = rows
        .iter()
        .filter(|row| row[1].is_empty())
        .map(|row| row[0].to_string())
        .collect();
    assert_eq!(areas, ["mainland", "island"]);
    assert!(rows.iter().any(|row| row[1] == *"battery_4"));

    // One row per region and rung of the duration ladder
    let (_, rows) = read_records(&output_dir.join("arbitrage_revenue.csv"));
    assert_eq!(rows.len(), 3 * 6);
    for row in &rows {
        let revenue: f64 = row[3].parse().unwrap();
        assert!(revenue >= 0.0);
    }

    let (_, rows) = read_records(&output_dir.join("curtailment_recovery.csv"));
    for row in &rows {
        let fraction: f64 = row[5].parse().unwrap();
        assert!((0.0..=1.0).contains(&fraction));
    }

    // Second time will fail because the logging is already initialised
    let opts = RunOpts {
        output_dir: Some(tempdir.path().join("results2")),
        overwrite: false,
    };
    assert_eq!(
        handle_run_command(&get_case_dir(), &opts, Some(Settings::default()))
            .unwrap_err()
            .chain()
            .next()
            .unwrap()
            .to_string(),
        "Failed to initialise logging."
    );
}

/// Output folders which already contain files are only reused when overwriting
#[test]
fn test_handle_run_command_existing_output() {
    let tempdir = tempdir().unwrap();
    std::fs::write(tempdir.path().join("old.csv"), "").unwrap();
    let opts = RunOpts {
        output_dir: Some(tempdir.path().to_path_buf()),
        overwrite: false,
    };
    let err = handle_run_command(&get_case_dir(), &opts, Some(Settings::default())).unwrap_err();
    assert!(err.to_string().starts_with("Failed to create output directory"));
}
