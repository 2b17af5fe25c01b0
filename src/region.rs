//! Regions are the balancing areas for which load and prices are provided.
//!
//! Each region belongs to a capacity-credit group. Depending on the configured
//! [`RegionLevel`](crate::parameters::RegionLevel), capacity values are computed per region or over
//! the pooled load and resources of each group.
use crate::id::{define_id_getter, define_id_type};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashSet;

define_id_type! {RegionID}
define_id_type! {GroupID}
define_id_type! {TransmissionGroupID}

/// A map of [`Region`]s, keyed by region ID
pub type RegionMap = IndexMap<RegionID, Region>;

/// Represents a region with an ID and the group it is pooled with
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Region {
    /// A unique identifier for a region (e.g. "p10").
    pub id: RegionID,
    /// The capacity-credit group the region belongs to (e.g. "west").
    pub group: GroupID,
}
define_id_getter! {Region, RegionID}

/// Iterate over the groups in `regions`, each with its member regions, in order of first appearance
pub fn iter_groups(regions: &RegionMap) -> impl Iterator<Item = (GroupID, Vec<RegionID>)> {
    let mut groups: IndexMap<GroupID, Vec<RegionID>> = IndexMap::new();
    for region in regions.values() {
        groups
            .entry(region.group.clone())
            .or_default()
            .push(region.id.clone());
    }

    groups.into_iter()
}

/// The transmission-connected group each region belongs to in each hour.
///
/// Regions in the same group in a given hour are linked by uncongested transmission, so share a
/// price and can absorb one another's surplus. Regions without an entry form a group of their own.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransmissionGroups(IndexMap<RegionID, Vec<TransmissionGroupID>>);

impl TransmissionGroups {
    /// Set the hourly groups for a region
    pub fn insert(&mut self, region_id: RegionID, groups: Vec<TransmissionGroupID>) {
        self.0.insert(region_id, groups);
    }

    /// The group to which `region_id` belongs in `hour`
    pub fn group(&self, region_id: &RegionID, hour: usize) -> TransmissionGroupID {
        self.0
            .get(region_id)
            .and_then(|groups| groups.get(hour))
            .cloned()
            .unwrap_or_else(|| TransmissionGroupID(region_id.0.clone()))
    }

    /// For each region and hour, whether any region in the same group has a surplus
    pub fn curtailing<'a, I>(&self, net_loads: I, n_hours: usize) -> IndexMap<RegionID, Vec<bool>>
    where
        I: IntoIterator<Item = (&'a RegionID, &'a [f64])> + Clone,
    {
        let mut curtailing_groups = HashSet::new();
        for (region_id, net_load) in net_loads.clone() {
            for (hour, net) in net_load.iter().enumerate() {
                if *net < 0.0 {
                    curtailing_groups.insert((self.group(region_id, hour), hour));
                }
            }
        }

        net_loads
            .into_iter()
            .map(|(region_id, _)| {
                let flags = (0..n_hours)
                    .map(|hour| curtailing_groups.contains(&(self.group(region_id, hour), hour)))
                    .collect();
                (region_id.clone(), flags)
            })
            .collect()
    }
}
