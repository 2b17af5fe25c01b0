//! The input data for one evaluation of resource values.
use crate::parameters::ValueParameters;
use crate::profile::ProfileMatrix;
use crate::region::{RegionID, RegionMap, TransmissionGroups};
use crate::resource::{
    GeneratorID, GeneratorMap, Resource, ResourceID, ResourceMap, StorageDevice, StorageID,
    StorageMap, StorageTechMap,
};
use crate::time_slice::TimeSliceMap;

/// Everything needed to evaluate resource values for one solve year.
///
/// All hourly profiles have one value per hour of `time_slices`.
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    /// Parameters controlling the evaluation
    pub parameters: ValueParameters,
    /// The time slice and day of each hour
    pub time_slices: TimeSliceMap,
    /// All regions
    pub regions: RegionMap,
    /// Hourly load for each region
    pub load: ProfileMatrix<RegionID>,
    /// Variable generation resources
    pub resources: ResourceMap,
    /// Hourly capacity factor for each resource
    pub capacity_factors: ProfileMatrix<ResourceID>,
    /// Existing storage devices
    pub storage: StorageMap,
    /// Hourly state of charge for existing storage devices, where known
    pub storage_levels: ProfileMatrix<StorageID>,
    /// Candidate storage technologies
    pub storage_techs: StorageTechMap,
    /// Hourly market price for each region
    pub prices: ProfileMatrix<RegionID>,
    /// Hourly capacity to export out of each region, where known
    pub export_capacity: ProfileMatrix<RegionID>,
    /// Dispatchable generators
    pub generators: GeneratorMap,
    /// Hourly output of each dispatchable generator
    pub generation: ProfileMatrix<GeneratorID>,
    /// Transmission-connected groups of regions in each hour
    pub transmission_groups: TransmissionGroups,
}

impl Case {
    /// Iterate over the resources in the given region
    pub fn resources_in<'a>(
        &'a self,
        region_id: &'a RegionID,
    ) -> impl Iterator<Item = &'a Resource> {
        self.resources
            .values()
            .filter(move |resource| resource.region_id == *region_id)
    }

    /// Iterate over the existing storage devices in the given region
    pub fn storage_in<'a>(
        &'a self,
        region_id: &'a RegionID,
    ) -> impl Iterator<Item = &'a StorageDevice> {
        self.storage
            .values()
            .filter(move |device| device.region_id == *region_id)
    }
}
