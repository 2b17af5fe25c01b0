//! Code for reading region-related information from CSV files.
use super::*;
use crate::id::IDCollection;
use crate::region::{RegionID, RegionMap, TransmissionGroupID, TransmissionGroups};
use serde::Deserialize;
use std::path::Path;

const REGIONS_FILE_NAME: &str = "regions.csv";
const TRANSMISSION_GROUPS_FILE_NAME: &str = "transmission_groups.csv";

/// Reads regions from a CSV file.
///
/// # Arguments
///
/// * `case_dir` - Folder containing case configuration files
///
/// # Returns
///
/// A `RegionMap` with the parsed regions data or an error
pub fn read_regions(case_dir: &Path) -> Result<RegionMap> {
    read_csv_id_file(&case_dir.join(REGIONS_FILE_NAME))
}

/// The transmission group of a region in one hour, as read from a CSV file
#[derive(PartialEq, Debug, Deserialize)]
struct TransmissionGroupRaw {
    region_id: String,
    hour: usize,
    group: String,
}

fn read_transmission_groups_from_iter<I>(
    iter: I,
    regions: &RegionMap,
    n_hours: usize,
) -> Result<TransmissionGroups>
where
    I: Iterator<Item = TransmissionGroupRaw>,
{
    let mut hourly: IndexMap<RegionID, Vec<Option<TransmissionGroupID>>> = IndexMap::new();
    for record in iter {
        let region_id = regions.get_id(&record.region_id)?;
        ensure!(
            record.hour < n_hours,
            "Hour {} for {region_id} is out of range (there are {n_hours} hours)",
            record.hour
        );

        let groups = hourly
            .entry(region_id.clone())
            .or_insert_with(|| vec![None; n_hours]);
        ensure!(
            groups[record.hour].is_none(),
            "Duplicate transmission group for {region_id} in hour {}",
            record.hour
        );
        groups[record.hour] = Some(record.group.into());
    }

    // Hours without an entry leave the region on its own
    let mut transmission_groups = TransmissionGroups::default();
    for (region_id, groups) in hourly {
        let groups = groups
            .into_iter()
            .map(|group| group.unwrap_or_else(|| TransmissionGroupID(region_id.0.clone())))
            .collect();
        transmission_groups.insert(region_id, groups);
    }

    Ok(transmission_groups)
}

/// Read the hourly transmission groups of regions from a CSV file.
///
/// The file is optional. Regions without entries form a group of their own.
pub fn read_transmission_groups(
    case_dir: &Path,
    regions: &RegionMap,
    n_hours: usize,
) -> Result<TransmissionGroups> {
    let file_path = case_dir.join(TRANSMISSION_GROUPS_FILE_NAME);
    let groups_csv = read_csv_optional(&file_path)?;
    read_transmission_groups_from_iter(groups_csv, regions, n_hours)
        .with_context(|| input_err_msg(file_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, regions};
    use crate::region::Region;
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;
    use tempfile::tempdir;

    /// Create an example regions file in dir_path
    fn create_regions_file(dir_path: &Path) {
        let file_path = dir_path.join(REGIONS_FILE_NAME);
        let mut file = File::create(file_path).unwrap();
        writeln!(
            file,
            "id,group
p1,west
p2,west
p3,east"
        )
        .unwrap();
    }

    #[test]
    fn test_read_regions() {
        let dir = tempdir().unwrap();
        create_regions_file(dir.path());
        let regions = read_regions(dir.path()).unwrap();
        assert_eq!(regions.len(), 3);
        assert_eq!(
            regions[&RegionID::from("p3")],
            Region {
                id: "p3".into(),
                group: "east".into(),
            }
        );
    }

    fn raw(region_id: &str, hour: usize, group: &str) -> TransmissionGroupRaw {
        TransmissionGroupRaw {
            region_id: region_id.into(),
            hour,
            group: group.into(),
        }
    }

    #[rstest]
    fn test_read_transmission_groups(regions: RegionMap) {
        let records = [raw("r1", 0, "g"), raw("r2", 0, "g"), raw("r2", 1, "g")];
        let groups = read_transmission_groups_from_iter(records.into_iter(), &regions, 2).unwrap();
        assert_eq!(groups.group(&"r1".into(), 0), "g".into());
        assert_eq!(groups.group(&"r1".into(), 1), "r1".into());
        assert_eq!(groups.group(&"r2".into(), 1), "g".into());
        assert_eq!(groups.group(&"r3".into(), 0), "r3".into());
    }

    #[rstest]
    fn test_read_transmission_groups_missing_file(regions: RegionMap) {
        let dir = tempdir().unwrap();
        let groups = read_transmission_groups(dir.path(), &regions, 2).unwrap();
        assert_eq!(groups, TransmissionGroups::default());
    }

    #[rstest]
    #[case(raw("r9", 0, "g"), "Unknown ID r9 found")]
    #[case(raw("r1", 2, "g"), "Hour 2 for r1 is out of range (there are 2 hours)")]
    fn test_read_transmission_groups_invalid(
        regions: RegionMap,
        #[case] record: TransmissionGroupRaw,
        #[case] msg: &str,
    ) {
        assert_error!(
            read_transmission_groups_from_iter(std::iter::once(record), &regions, 2),
            msg
        );
    }

    #[rstest]
    fn test_read_transmission_groups_duplicate(regions: RegionMap) {
        let records = [raw("r1", 0, "g"), raw("r1", 0, "h")];
        assert_error!(
            read_transmission_groups_from_iter(records.into_iter(), &regions, 2),
            "Duplicate transmission group for r1 in hour 0"
        );
    }
}
