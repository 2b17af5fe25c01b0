//! Common routines for handling input data.
use crate::case::Case;
use crate::id::{HasID, IDLike};
use crate::parameters::ValueParameters;
use crate::profile::{HourlyProfile, ProfileMatrix};
use anyhow::{Context, Result, bail, ensure};
use indexmap::IndexMap;
use itertools::Itertools;
use log::debug;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

mod region;
use region::{read_regions, read_transmission_groups};
mod resource;
use resource::{read_generators, read_resources, read_storage, read_storage_techs};
mod time_slice;
use time_slice::read_time_slices;

const LOAD_FILE_NAME: &str = "load.csv";
const CAPACITY_FACTORS_FILE_NAME: &str = "capacity_factors.csv";
const STORAGE_LEVEL_FILE_NAME: &str = "storage_level.csv";
const PRICES_FILE_NAME: &str = "prices.csv";
const GENERATION_FILE_NAME: &str = "generation.csv";
const EXPORT_CAPACITY_FILE_NAME: &str = "export_capacity.csv";

/// Read a series of type `T`s from a CSV file.
///
/// Will raise an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<T: DeserializeOwned>(file_path: &Path) -> Result<impl Iterator<Item = T>> {
    let vec = read_csv_internal(file_path)?;
    if vec.is_empty() {
        bail!("CSV file {} cannot be empty", file_path.display());
    }

    Ok(vec.into_iter())
}

/// Read a series of type `T`s from a CSV file.
///
/// The file may be empty or absent, in which case no records are returned.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv_optional<T: DeserializeOwned>(file_path: &Path) -> Result<impl Iterator<Item = T>> {
    if !file_path.exists() {
        return Ok(Vec::new().into_iter());
    }

    Ok(read_csv_internal(file_path)?.into_iter())
}

fn read_csv_internal<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let vec = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))?
        .into_deserialize()
        .process_results(|iter| iter.collect_vec())
        .with_context(|| input_err_msg(file_path))?;

    Ok(vec)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Check whether an iterator contains values that are sorted and unique
pub fn is_sorted_and_unique<T, I>(iter: I) -> bool
where
    T: PartialOrd + Clone,
    I: IntoIterator<Item = T>,
{
    iter.into_iter().tuple_windows().all(|(a, b)| a < b)
}

/// Read records with IDs from a CSV file into a map, checking that IDs are unique
pub fn read_csv_id_file<T, ID>(file_path: &Path) -> Result<IndexMap<ID, T>>
where
    T: HasID<ID> + DeserializeOwned,
    ID: IDLike,
{
    fn fill_and_validate_map<T, ID>(file_path: &Path) -> Result<IndexMap<ID, T>>
    where
        T: HasID<ID> + DeserializeOwned,
        ID: IDLike,
    {
        let mut map = IndexMap::new();
        for record in read_csv::<T>(file_path)? {
            let id = record.get_id().clone();
            let existing = map.insert(id.clone(), record).is_some();
            ensure!(!existing, "Duplicate ID found: {id}");
        }

        Ok(map)
    }

    fill_and_validate_map(file_path).with_context(|| input_err_msg(file_path))
}

/// A value for one ID and hour in a long-format CSV file
#[derive(Debug, Deserialize, PartialEq)]
struct HourlyValueRaw {
    #[serde(
        alias = "region_id",
        alias = "resource_id",
        alias = "storage_id",
        alias = "generator_id"
    )]
    id: String,
    hour: usize,
    value: f64,
}

/// Build one profile per known ID from long-format records.
///
/// Hours without a record are zero. Unknown IDs, out-of-range hours and duplicate entries are
/// errors.
fn read_hourly_values_from_iter<ID, V, I>(
    iter: I,
    ids: &IndexMap<ID, V>,
    n_hours: usize,
) -> Result<ProfileMatrix<ID>>
where
    ID: IDLike,
    I: Iterator<Item = HourlyValueRaw>,
{
    let mut values: IndexMap<ID, Vec<f64>> = ids
        .keys()
        .map(|id| (id.clone(), vec![0.0; n_hours]))
        .collect();
    let mut seen = HashSet::new();
    for record in iter {
        let (_, id, column) = values
            .get_full_mut(record.id.as_str())
            .with_context(|| format!("Unknown ID {} found", record.id))?;
        ensure!(
            record.hour < n_hours,
            "Hour {} for {id} is out of range (there are {n_hours} hours)",
            record.hour
        );
        ensure!(
            record.value.is_finite(),
            "Value for {id} in hour {} must be finite",
            record.hour
        );
        ensure!(
            seen.insert((id.clone(), record.hour)),
            "Duplicate entry for {id} in hour {}",
            record.hour
        );
        column[record.hour] = record.value;
    }

    let mut matrix = ProfileMatrix::new(n_hours);
    for (id, column) in values {
        matrix.insert(id, HourlyProfile::new(column))?;
    }

    Ok(matrix)
}

/// Read hourly values in long format from a CSV file.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
/// * `ids` - The known IDs. Every ID gets a profile, even if it has no entries.
/// * `n_hours` - The number of hours in each profile
/// * `optional` - Whether the file may be absent or empty
pub fn read_hourly_values<ID, V>(
    file_path: &Path,
    ids: &IndexMap<ID, V>,
    n_hours: usize,
    optional: bool,
) -> Result<ProfileMatrix<ID>>
where
    ID: IDLike,
{
    let result = if optional {
        read_csv_optional(file_path)
            .and_then(|iter| read_hourly_values_from_iter(iter, ids, n_hours))
    } else {
        read_csv(file_path).and_then(|iter| read_hourly_values_from_iter(iter, ids, n_hours))
    };

    result.with_context(|| input_err_msg(file_path))
}

/// Log IDs which have no non-zero values
fn log_empty_profiles<ID: IDLike>(name: &str, matrix: &ProfileMatrix<ID>) {
    for (id, profile) in matrix.iter() {
        if profile.iter().all(|value| *value == 0.0) {
            debug!("No non-zero {name} provided for {id}");
        }
    }
}

/// Read a case from the specified directory.
///
/// # Arguments
///
/// * `case_dir` - Folder containing case configuration files
///
/// # Returns
///
/// The loaded [`Case`] or an error if any of the input files is missing or invalid.
pub fn load_case<P: AsRef<Path>>(case_dir: P) -> Result<Case> {
    let case_dir = case_dir.as_ref();
    let parameters = ValueParameters::from_path(case_dir)?;
    let time_slices = read_time_slices(case_dir, parameters.hours_per_day)?;
    let n_hours = time_slices.n_hours();
    let regions = read_regions(case_dir)?;

    let resources = read_resources(case_dir, &regions)?;
    let storage = read_storage(case_dir, &regions)?;
    let storage_techs = read_storage_techs(case_dir)?;
    let generators = read_generators(case_dir, &regions)?;

    let load = read_hourly_values(&case_dir.join(LOAD_FILE_NAME), &regions, n_hours, false)?;
    let capacity_factors = read_hourly_values(
        &case_dir.join(CAPACITY_FACTORS_FILE_NAME),
        &resources,
        n_hours,
        false,
    )?;
    check_capacity_factors(&capacity_factors)
        .with_context(|| input_err_msg(case_dir.join(CAPACITY_FACTORS_FILE_NAME)))?;
    let storage_levels = read_hourly_values(
        &case_dir.join(STORAGE_LEVEL_FILE_NAME),
        &storage,
        n_hours,
        true,
    )?;
    let prices = read_hourly_values(&case_dir.join(PRICES_FILE_NAME), &regions, n_hours, true)?;
    let export_capacity = read_hourly_values(
        &case_dir.join(EXPORT_CAPACITY_FILE_NAME),
        &regions,
        n_hours,
        true,
    )?;
    check_export_capacity(&export_capacity)
        .with_context(|| input_err_msg(case_dir.join(EXPORT_CAPACITY_FILE_NAME)))?;
    let generation = read_hourly_values(
        &case_dir.join(GENERATION_FILE_NAME),
        &generators,
        n_hours,
        true,
    )?;
    let transmission_groups = read_transmission_groups(case_dir, &regions, n_hours)?;

    log_empty_profiles("load", &load);
    log_empty_profiles("capacity factors", &capacity_factors);

    Ok(Case {
        parameters,
        time_slices,
        regions,
        load,
        resources,
        capacity_factors,
        storage,
        storage_levels,
        storage_techs,
        prices,
        export_capacity,
        generators,
        generation,
        transmission_groups,
    })
}

/// Check that capacity factors are all between zero and one
fn check_capacity_factors<ID: IDLike>(capacity_factors: &ProfileMatrix<ID>) -> Result<()> {
    for (id, profile) in capacity_factors.iter() {
        if let Some(hour) = profile.iter().position(|cf| !(0.0..=1.0).contains(cf)) {
            bail!("Capacity factor for {id} in hour {hour} is not between 0 and 1");
        }
    }

    Ok(())
}

/// Check that export capacities are not negative
fn check_export_capacity<ID: IDLike>(export_capacity: &ProfileMatrix<ID>) -> Result<()> {
    for (id, profile) in export_capacity.iter() {
        if let Some(hour) = profile.iter().position(|value| *value < 0.0) {
            bail!("Export capacity for {id} in hour {hour} is negative");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use crate::id::GenericID;
    use crate::region::RegionID;
    use indexmap::indexmap;
    use itertools::assert_equal;
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Record {
        id: GenericID,
        value: u32,
    }
    crate::id::define_id_getter! {Record, GenericID}

    /// Create an example CSV file in dir_path
    fn create_csv_file(dir_path: &Path, contents: &str) -> std::path::PathBuf {
        let file_path = dir_path.join("test.csv");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "{contents}").unwrap();
        file_path
    }

    /// Test a normal read
    #[test]
    fn test_read_csv() {
        let dir = tempdir().unwrap();
        let file_path = create_csv_file(dir.path(), "id,value\nhello,1\nworld,2\n");
        let records: Vec<Record> = read_csv(&file_path).unwrap().collect();
        assert_eq!(
            records,
            &[
                Record {
                    id: "hello".into(),
                    value: 1,
                },
                Record {
                    id: "world".into(),
                    value: 2,
                }
            ]
        );

        // File with only header
        let file_path = create_csv_file(dir.path(), "id,value\n");
        assert!(read_csv::<Record>(&file_path).is_err());
        assert!(
            read_csv_optional::<Record>(&file_path)
                .unwrap()
                .next()
                .is_none()
        );

        // Missing file
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("a_missing_file.csv");
        assert!(!file_path.exists());
        assert!(read_csv_optional::<Record>(&file_path).unwrap().next().is_none());
    }

    #[test]
    fn test_read_csv_id_file() {
        let dir = tempdir().unwrap();
        let file_path = create_csv_file(dir.path(), "id,value\na,1\nb,2");
        let map: IndexMap<GenericID, Record> = read_csv_id_file(&file_path).unwrap();
        assert_equal(map.keys(), [&"a".into(), &"b".into()]);

        let file_path = create_csv_file(dir.path(), "id,value\na,1\na,2");
        let result: Result<IndexMap<GenericID, Record>> = read_csv_id_file(&file_path);
        assert_error!(result, input_err_msg(&file_path));
    }

    #[test]
    fn test_read_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.toml");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "value = 1").unwrap();
        }

        #[derive(Debug, Deserialize, PartialEq)]
        struct Value {
            value: u32,
        }

        assert_eq!(read_toml::<Value>(&file_path).unwrap(), Value { value: 1 });

        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "bad toml syntax").unwrap();
        }

        assert!(read_toml::<Value>(&file_path).is_err());
    }

    #[rstest]
    #[case(&[] as &[f64], true)]
    #[case(&[1.0], true)]
    #[case(&[1.0, 2.0], true)]
    #[case(&[2.0, 1.0], false)]
    #[case(&[1.0, 1.0], false)]
    fn test_is_sorted_and_unique(#[case] values: &[f64], #[case] expected: bool) {
        assert_eq!(is_sorted_and_unique(values.iter().copied()), expected);
    }

    fn regions() -> IndexMap<RegionID, ()> {
        indexmap! {"r1".into() => (), "r2".into() => ()}
    }

    fn raw(id: &str, hour: usize, value: f64) -> HourlyValueRaw {
        HourlyValueRaw {
            id: id.into(),
            hour,
            value,
        }
    }

    #[test]
    fn test_read_hourly_values_missing_hours() {
        let records = [raw("r1", 0, 5.0), raw("r1", 2, 7.0)];
        let matrix = read_hourly_values_from_iter(records.into_iter(), &regions(), 3).unwrap();
        assert_eq!(matrix[&"r1".into()].values(), [5.0, 0.0, 7.0]);
        assert_eq!(matrix[&"r2".into()].values(), [0.0; 3]);
    }

    #[rstest]
    #[case(raw("r3", 0, 1.0), "Unknown ID r3 found")]
    #[case(raw("r1", 3, 1.0), "Hour 3 for r1 is out of range (there are 3 hours)")]
    #[case(raw("r1", 0, f64::NAN), "Value for r1 in hour 0 must be finite")]
    fn test_read_hourly_values_invalid(#[case] record: HourlyValueRaw, #[case] msg: &str) {
        assert_error!(
            read_hourly_values_from_iter(std::iter::once(record), &regions(), 3),
            msg
        );
    }

    #[test]
    fn test_read_hourly_values_duplicate() {
        let records = [raw("r1", 0, 5.0), raw("r1", 0, 7.0)];
        assert_error!(
            read_hourly_values_from_iter(records.into_iter(), &regions(), 3),
            "Duplicate entry for r1 in hour 0"
        );
    }

    #[test]
    fn test_read_hourly_values_column_names() {
        let dir = tempdir().unwrap();
        let file_path = create_csv_file(dir.path(), "region_id,hour,value\nr2,1,3.5");
        let matrix = read_hourly_values(&file_path, &regions(), 2, false).unwrap();
        assert_eq!(matrix[&"r2".into()].values(), [0.0, 3.5]);
    }

    #[test]
    fn test_check_capacity_factors() {
        let matrix: ProfileMatrix<GenericID> =
            std::iter::once(("wind".into(), HourlyProfile::new(vec![0.5, 1.2]))).collect();
        assert_error!(
            check_capacity_factors(&matrix),
            "Capacity factor for wind in hour 1 is not between 0 and 1"
        );
    }

    #[test]
    fn test_check_export_capacity() {
        let matrix: ProfileMatrix<GenericID> =
            std::iter::once(("r1".into(), HourlyProfile::new(vec![10.0, 0.0]))).collect();
        assert!(check_export_capacity(&matrix).is_ok());

        let matrix: ProfileMatrix<GenericID> =
            std::iter::once(("r1".into(), HourlyProfile::new(vec![10.0, -1.0]))).collect();
        assert_error!(
            check_export_capacity(&matrix),
            "Export capacity for r1 in hour 1 is negative"
        );
    }
}
