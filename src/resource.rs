//! The resources whose value is assessed: variable generators, storage and dispatchable units.
use crate::id::{define_id_getter, define_id_type};
use crate::region::RegionID;
use crate::units::{Dimensionless, Energy, Hours, MoneyPerEnergy, MoneyPerPower, Power};
use indexmap::IndexMap;
use serde::Deserialize;

define_id_type! {ResourceID}
define_id_type! {StorageID}
define_id_type! {StorageTechID}
define_id_type! {GeneratorID}

/// A map of [`Resource`]s, keyed by ID
pub type ResourceMap = IndexMap<ResourceID, Resource>;

/// A map of [`StorageDevice`]s, keyed by ID
pub type StorageMap = IndexMap<StorageID, StorageDevice>;

/// A map of [`StorageTech`]s, keyed by ID
pub type StorageTechMap = IndexMap<StorageTechID, StorageTech>;

/// A map of [`Generator`]s, keyed by ID
pub type GeneratorMap = IndexMap<GeneratorID, Generator>;

/// A variable generation resource class (e.g. one wind or PV resource class in a region)
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Resource {
    /// Unique identifier
    pub id: ResourceID,
    /// The region in which the resource is installed
    pub region_id: RegionID,
    /// Installed capacity
    pub capacity: Power,
}
define_id_getter! {Resource, ResourceID}

/// An existing storage device
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct StorageDevice {
    /// Unique identifier
    pub id: StorageID,
    /// The region in which the device is installed
    pub region_id: RegionID,
    /// Charge/discharge power limit
    pub power: Power,
    /// Energy capacity
    pub energy: Energy,
    /// Round-trip efficiency
    pub efficiency: Dimensionless,
}
define_id_getter! {StorageDevice, StorageID}

impl StorageDevice {
    /// The duration of the device at full power
    pub fn duration(&self) -> Hours {
        if self.power.value() == 0.0 {
            Hours(0.0)
        } else {
            self.energy / self.power
        }
    }
}

/// A candidate storage technology which could be built in the next solve year
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct StorageTech {
    /// Unique identifier (e.g. "battery_4")
    pub id: StorageTechID,
    /// Duration at full power
    pub duration: Hours,
    /// Round-trip efficiency
    pub efficiency: Dimensionless,
}
define_id_getter! {StorageTech, StorageTechID}

/// A dispatchable generating unit contributing bids to the price stack
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Generator {
    /// Unique identifier
    pub id: GeneratorID,
    /// The region in which the unit is installed
    pub region_id: RegionID,
    /// Marginal operating cost
    pub operating_cost: MoneyPerEnergy,
    /// Cost of one start, per MW started
    pub start_cost_per_mw: MoneyPerPower,
}
define_id_getter! {Generator, GeneratorID}
