//! Code for reading in the time slice of each hour from a CSV file.
use super::*;
use crate::time_slice::{TimeSliceID, TimeSliceMap};
use serde::Deserialize;
use std::path::Path;

const TIME_SLICES_FILE_NAME: &str = "time_slices.csv";

/// A time slice record retrieved from a CSV file
#[derive(PartialEq, Debug, Deserialize)]
struct TimeSliceRaw {
    hour: usize,
    time_slice: String,
}

/// Read the time slice map from an iterator of raw records, which may be in any order
fn read_time_slices_from_iter<I>(iter: I, hours_per_day: usize) -> Result<TimeSliceMap>
where
    I: Iterator<Item = TimeSliceRaw>,
{
    let records = iter.sorted_by_key(|record| record.hour).collect_vec();
    for (expected, record) in records.iter().enumerate() {
        ensure!(
            record.hour == expected,
            "Time slices must be given for every hour from 0, without gaps or duplicates \
            (problem at hour {})",
            record.hour
        );
    }

    TimeSliceMap::new(
        records
            .into_iter()
            .map(|record| TimeSliceID::from(record.time_slice)),
        hours_per_day,
    )
}

/// Read the time slice of every hour from a CSV file.
///
/// # Arguments
///
/// * `case_dir` - Folder containing case configuration files
/// * `hours_per_day` - The number of consecutive hours making up a day
///
/// # Returns
///
/// A [`TimeSliceMap`] covering every hour of the case.
pub fn read_time_slices(case_dir: &Path, hours_per_day: usize) -> Result<TimeSliceMap> {
    let file_path = case_dir.join(TIME_SLICES_FILE_NAME);
    let time_slices_csv = read_csv(&file_path)?;
    read_time_slices_from_iter(time_slices_csv, hours_per_day)
        .with_context(|| input_err_msg(file_path))
}
