//! Code for reading resources, storage and generators from CSV files.
use super::*;
use crate::region::{RegionID, RegionMap};
use crate::resource::{
    Generator, GeneratorMap, ResourceMap, StorageDevice, StorageMap, StorageTechMap,
};
use crate::units::{Dimensionless, Energy, Hours, Power};
use std::path::Path;

const RESOURCES_FILE_NAME: &str = "resources.csv";
const STORAGE_FILE_NAME: &str = "storage.csv";
const STORAGE_TECHS_FILE_NAME: &str = "storage_techs.csv";
const GENERATORS_FILE_NAME: &str = "generators.csv";

/// Check that a region ID is known
fn check_region<ID: IDLike>(id: &ID, region_id: &RegionID, regions: &RegionMap) -> Result<()> {
    ensure!(
        regions.contains_key(region_id),
        "{id} is in unknown region {region_id}"
    );

    Ok(())
}

/// Check that an efficiency is in the range (0, 1]
fn check_efficiency<ID: IDLike>(id: &ID, efficiency: Dimensionless) -> Result<()> {
    ensure!(
        efficiency > Dimensionless(0.0) && efficiency <= Dimensionless(1.0),
        "Efficiency for {id} must be greater than zero and no more than one"
    );

    Ok(())
}

fn validate_resources(resources: &ResourceMap, regions: &RegionMap) -> Result<()> {
    for (id, resource) in resources {
        check_region(id, &resource.region_id, regions)?;
        ensure!(
            resource.capacity.is_finite() && resource.capacity >= Power(0.0),
            "Capacity for {id} cannot be negative"
        );
    }

    Ok(())
}

/// Read variable generation resources from a CSV file.
///
/// # Arguments
///
/// * `case_dir` - Folder containing case configuration files
/// * `regions` - All known regions
pub fn read_resources(case_dir: &Path, regions: &RegionMap) -> Result<ResourceMap> {
    let file_path = case_dir.join(RESOURCES_FILE_NAME);
    let resources = read_csv_id_file(&file_path)?;
    validate_resources(&resources, regions).with_context(|| input_err_msg(&file_path))?;

    Ok(resources)
}

fn read_storage_from_iter<I>(iter: I, regions: &RegionMap) -> Result<StorageMap>
where
    I: Iterator<Item = StorageDevice>,
{
    let mut storage = StorageMap::new();
    for device in iter {
        let id = device.id.clone();
        check_region(&id, &device.region_id, regions)?;
        ensure!(
            device.power.is_finite() && device.power >= Power(0.0),
            "Power for {id} cannot be negative"
        );
        ensure!(
            device.energy.is_finite() && device.energy >= Energy(0.0),
            "Energy capacity for {id} cannot be negative"
        );
        check_efficiency(&id, device.efficiency)?;
        ensure!(
            storage.insert(id.clone(), device).is_none(),
            "Duplicate ID found: {id}"
        );
    }

    Ok(storage)
}

/// Read existing storage devices from a CSV file.
///
/// The file is optional, as a region may have no storage.
pub fn read_storage(case_dir: &Path, regions: &RegionMap) -> Result<StorageMap> {
    let file_path = case_dir.join(STORAGE_FILE_NAME);
    let storage_csv = read_csv_optional(&file_path)?;
    read_storage_from_iter(storage_csv, regions).with_context(|| input_err_msg(file_path))
}

fn validate_storage_techs(techs: &StorageTechMap) -> Result<()> {
    for (id, tech) in techs {
        ensure!(
            tech.duration.is_finite() && tech.duration > Hours(0.0),
            "Duration for {id} must be greater than zero"
        );
        check_efficiency(id, tech.efficiency)?;
    }

    Ok(())
}

/// Read candidate storage technologies from a CSV file
pub fn read_storage_techs(case_dir: &Path) -> Result<StorageTechMap> {
    let file_path = case_dir.join(STORAGE_TECHS_FILE_NAME);
    let techs = read_csv_id_file(&file_path)?;
    validate_storage_techs(&techs).with_context(|| input_err_msg(&file_path))?;

    Ok(techs)
}

fn read_generators_from_iter<I>(iter: I, regions: &RegionMap) -> Result<GeneratorMap>
where
    I: Iterator<Item = Generator>,
{
    let mut generators = GeneratorMap::new();
    for generator in iter {
        let id = generator.id.clone();
        check_region(&id, &generator.region_id, regions)?;
        ensure!(
            generators.insert(id.clone(), generator).is_none(),
            "Duplicate ID found: {id}"
        );
    }

    Ok(generators)
}

/// Read dispatchable generators from a CSV file.
///
/// The file is optional. Without generators, market prices are used unadjusted.
pub fn read_generators(case_dir: &Path, regions: &RegionMap) -> Result<GeneratorMap> {
    let file_path = case_dir.join(GENERATORS_FILE_NAME);
    let generators_csv = read_csv_optional(&file_path)?;
    read_generators_from_iter(generators_csv, regions).with_context(|| input_err_msg(file_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, regions, storage_device};
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_file(dir_path: &Path, file_name: &str, contents: &str) {
        let mut file = File::create(dir_path.join(file_name)).unwrap();
        writeln!(file, "{contents}").unwrap();
    }

    #[rstest]
    fn test_read_resources(regions: RegionMap) {
        let dir = tempdir().unwrap();
        write_file(
            dir.path(),
            RESOURCES_FILE_NAME,
            "id,region_id,capacity\nwind_r1,r1,100\npv_r3,r3,50.5",
        );
        let resources = read_resources(dir.path(), &regions).unwrap();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].capacity, Power(100.0));
        assert_eq!(resources[1].region_id, "r3".into());
    }

    #[rstest]
    fn test_read_resources_bad_region(regions: RegionMap) {
        let dir = tempdir().unwrap();
        write_file(
            dir.path(),
            RESOURCES_FILE_NAME,
            "id,region_id,capacity\nwind_r9,r9,100",
        );
        assert_error!(
            read_resources(dir.path(), &regions),
            input_err_msg(dir.path().join(RESOURCES_FILE_NAME))
        );
    }

    #[rstest]
    fn test_read_storage(regions: RegionMap, storage_device: StorageDevice) {
        let storage = read_storage_from_iter(std::iter::once(storage_device), &regions).unwrap();
        assert_eq!(storage[0].duration(), Hours(4.0));
    }

    #[rstest]
    fn test_read_storage_missing_file(regions: RegionMap) {
        let dir = tempdir().unwrap();
        assert!(read_storage(dir.path(), &regions).unwrap().is_empty());
    }

    #[rstest]
    #[case(-1.0, 40.0, 0.85, "Power for battery1 cannot be negative")]
    #[case(10.0, -1.0, 0.85, "Energy capacity for battery1 cannot be negative")]
    #[case(
        10.0,
        40.0,
        1.2,
        "Efficiency for battery1 must be greater than zero and no more than one"
    )]
    fn test_read_storage_invalid(
        regions: RegionMap,
        storage_device: StorageDevice,
        #[case] power: f64,
        #[case] energy: f64,
        #[case] efficiency: f64,
        #[case] msg: &str,
    ) {
        let device = StorageDevice {
            power: Power(power),
            energy: Energy(energy),
            efficiency: Dimensionless(efficiency),
            ..storage_device
        };
        assert_error!(
            read_storage_from_iter(std::iter::once(device), &regions),
            msg
        );
    }

    #[test]
    fn test_read_storage_techs() {
        let dir = tempdir().unwrap();
        write_file(
            dir.path(),
            STORAGE_TECHS_FILE_NAME,
            "id,duration,efficiency\nbattery_4,4,0.85\nbattery_8,8,0.85",
        );
        let techs = read_storage_techs(dir.path()).unwrap();
        assert_eq!(techs[1].duration, Hours(8.0));

        write_file(
            dir.path(),
            STORAGE_TECHS_FILE_NAME,
            "id,duration,efficiency\nbattery_0,0,0.85",
        );
        assert!(read_storage_techs(dir.path()).is_err());
    }

    #[rstest]
    fn test_read_generators(regions: RegionMap) {
        let dir = tempdir().unwrap();
        assert!(read_generators(dir.path(), &regions).unwrap().is_empty());

        write_file(
            dir.path(),
            GENERATORS_FILE_NAME,
            "id,region_id,operating_cost,start_cost_per_mw\ngas1,r1,30,100",
        );
        let generators = read_generators(dir.path(), &regions).unwrap();
        assert_eq!(generators[0].region_id, "r1".into());
    }
}
