//! Fixtures for tests

use crate::case::Case;
use crate::parameters::ValueParameters;
use crate::profile::{HourlyProfile, ProfileMatrix};
use crate::region::{Region, RegionMap, TransmissionGroups};
use crate::resource::{
    GeneratorMap, Resource, ResourceMap, StorageDevice, StorageMap, StorageTech, StorageTechMap,
};
use crate::time_slice::{TimeSliceID, TimeSliceMap};
use crate::units::{Dimensionless, Energy, Hours, Power};
use indexmap::indexmap;
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

#[fixture]
pub fn regions() -> RegionMap {
    [("r1", "west"), ("r2", "west"), ("r3", "east")]
        .into_iter()
        .map(|(id, group)| {
            let region = Region {
                id: id.into(),
                group: group.into(),
            };
            (region.id.clone(), region)
        })
        .collect()
}

#[fixture]
pub fn time_slices() -> TimeSliceMap {
    TimeSliceMap::new(["day", "day", "night", "night"].map(TimeSliceID::from), 2).unwrap()
}

#[fixture]
pub fn storage_device() -> StorageDevice {
    StorageDevice {
        id: "battery1".into(),
        region_id: "r1".into(),
        power: Power(10.0),
        energy: Energy(40.0),
        efficiency: Dimensionless(0.85),
    }
}

#[fixture]
pub fn storage_techs() -> StorageTechMap {
    [("battery_4", 4.0), ("battery_8", 8.0)]
        .into_iter()
        .map(|(id, duration)| {
            let tech = StorageTech {
                id: id.into(),
                duration: Hours(duration),
                efficiency: Dimensionless(0.85),
            };
            (tech.id.clone(), tech)
        })
        .collect()
}

fn profiles<K, const N: usize>(columns: [(&str, [f64; 4]); N]) -> ProfileMatrix<K>
where
    K: std::hash::Hash + Eq + std::fmt::Display + for<'a> From<&'a str>,
{
    columns
        .into_iter()
        .map(|(id, values)| (K::from(id), HourlyProfile::new(values.to_vec())))
        .collect()
}

/// A four-hour case with two days and three regions.
///
/// Wind in r1 only generates off-peak. Solar in r2 is curtailed in the second hour. r3 has no
/// variable resources.
#[fixture]
pub fn case(
    regions: RegionMap,
    time_slices: TimeSliceMap,
    storage_device: StorageDevice,
    storage_techs: StorageTechMap,
) -> Case {
    let resources: ResourceMap = indexmap! {
        "wind_r1".into() => Resource {
            id: "wind_r1".into(),
            region_id: "r1".into(),
            capacity: Power(50.0),
        },
        "pv_r2".into() => Resource {
            id: "pv_r2".into(),
            region_id: "r2".into(),
            capacity: Power(60.0),
        },
    };
    let storage: StorageMap = indexmap! {storage_device.id.clone() => storage_device};

    Case {
        parameters: ValueParameters {
            top_hours: 2,
            hours_per_day: 2,
            ..ValueParameters::default()
        },
        time_slices,
        regions,
        load: profiles([
            ("r1", [100.0, 100.0, 100.0, 100.0]),
            ("r2", [80.0, 20.0, 60.0, 90.0]),
            ("r3", [30.0, 40.0, 50.0, 60.0]),
        ]),
        resources,
        capacity_factors: profiles([
            ("wind_r1", [1.0, 0.0, 1.0, 0.0]),
            ("pv_r2", [0.0, 1.0, 0.5, 0.0]),
        ]),
        storage,
        storage_levels: ProfileMatrix::new(4),
        storage_techs,
        prices: profiles([
            ("r1", [10.0, 50.0, 5.0, 80.0]),
            ("r2", [20.0, 0.0, 30.0, 40.0]),
            ("r3", [0.0; 4]),
        ]),
        export_capacity: ProfileMatrix::new(4),
        generators: GeneratorMap::new(),
        generation: ProfileMatrix::new(4),
        transmission_groups: TransmissionGroups::default(),
    }
}
