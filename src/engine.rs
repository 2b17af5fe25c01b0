//! Evaluation of every value coefficient for one solve year.
//!
//! Capacity credit is evaluated per area (a region or a capacity-credit group, depending on
//! [`RegionLevel`]). Curtailment and arbitrage are always evaluated per region.
use crate::capacity_value::{ResourceCapacityValue, calculate_capacity_value};
use crate::case::Case;
use crate::curtailment::{
    available_load, curtailment_signal, derate, marginal_curtailment, recovery_ratio,
    remaining_cycles, storage_schedule,
};
use crate::dispatch::{
    StorageSpec, charging_share_outside_curtailment, dispatch_storage, usable_energy,
};
use crate::duration::interpolate_durations;
use crate::id::define_id_type;
use crate::parameters::RegionLevel;
use crate::price_stack::adjusted_prices;
use crate::profile::{HourlyProfile, ProfileMatrix, finalise, round_to};
use crate::region::{RegionID, iter_groups};
use crate::resource::{Resource, ResourceID, StorageID, StorageTech, StorageTechID};
use crate::storage_sizing::{StorageFleet, storage_capacity_credit};
use crate::time_slice::TimeSliceValues;
use crate::units::{Dimensionless, Energy, Hours, Money, MoneyPerPower, Power};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use itertools::Itertools;
use log::{debug, info, warn};
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};

define_id_type! {AreaID}

/// Capacity credit results for one area
#[derive(Debug, Clone, PartialEq)]
pub struct AreaCapacityValue {
    /// The region or capacity-credit group
    pub area: AreaID,
    /// Installed capacity of each variable resource in the area
    pub capacities: IndexMap<ResourceID, Power>,
    /// Capacity value of each variable resource in the area
    pub values: IndexMap<ResourceID, ResourceCapacityValue>,
    /// The existing storage fleet of the area
    pub fleet: StorageFleet,
    /// Capacity credit of the storage fleet as a fraction of its power
    pub storage_credit: Dimensionless,
    /// Capacity credit of marginal storage of each candidate technology
    pub marginal_storage_credits: IndexMap<StorageTechID, MarginalStorageCredit>,
    /// The share of the top net-load hours falling in each time slice
    pub top_hour_shares: TimeSliceValues,
}

/// Capacity credit of a marginal addition of one storage technology
#[derive(Debug, Clone, PartialEq)]
pub struct MarginalStorageCredit {
    /// Power, energy and efficiency of the marginal addition
    pub storage: StorageFleet,
    /// Capacity credit as a fraction of the addition's power
    pub capacity_credit: Dimensionless,
}

/// Which storage is recovering which curtailment
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, SerializeLabeledStringEnum, DeserializeLabeledStringEnum,
)]
pub enum RecoveryKind {
    /// A candidate storage technology recovering curtailment of a marginal resource
    #[string = "marginal_storage_marginal_curtailment"]
    MarginalStorageMarginalCurtailment,
    /// A candidate storage technology recovering curtailment of the existing fleet
    #[string = "marginal_storage_existing_curtailment"]
    MarginalStorageExistingCurtailment,
    /// An existing device recovering curtailment of a marginal resource
    #[string = "existing_storage_marginal_curtailment"]
    ExistingStorageMarginalCurtailment,
}

/// The storage doing the recovering
#[derive(Debug, Clone, PartialEq, derive_more::Display)]
pub enum RecoveringStorage {
    /// A candidate technology
    Tech(StorageTechID),
    /// An existing device
    Device(StorageID),
}

/// The fraction of curtailment recovered by storage in each time slice
#[derive(Debug, Clone, PartialEq)]
pub struct CurtailmentRecovery {
    /// Which storage is recovering which curtailment
    pub kind: RecoveryKind,
    /// The storage doing the recovering
    pub storage: RecoveringStorage,
    /// The marginal resource whose curtailment is recovered, if any
    pub resource_id: Option<ResourceID>,
    /// Recovered fraction in each time slice
    pub ratios: TimeSliceValues,
}

/// Curtailment results for one region
#[derive(Debug, Clone, PartialEq)]
pub struct RegionCurtailment {
    /// The region
    pub region_id: RegionID,
    /// Curtailed fraction of each marginal resource's generation in each time slice
    pub marginal: IndexMap<ResourceID, TimeSliceValues>,
    /// Recovery of curtailment by storage
    pub recovery: Vec<CurtailmentRecovery>,
}

/// The arbitrage revenue of one candidate storage duration
#[derive(Debug, Clone, PartialEq)]
pub struct ArbitrageRevenue {
    /// The candidate technology with this duration, if there is one
    pub storage_tech_id: Option<StorageTechID>,
    /// Storage duration
    pub duration: Hours,
    /// Revenue of the dispatched device
    pub revenue: Money,
    /// Revenue per MW of storage power
    pub revenue_per_mw: MoneyPerPower,
}

/// Arbitrage results for one region
#[derive(Debug, Clone, PartialEq)]
pub struct RegionArbitrage {
    /// The region
    pub region_id: RegionID,
    /// Revenue for each candidate duration
    pub revenues: Vec<ArbitrageRevenue>,
}

/// All results of an evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResults {
    /// Capacity credit of variable resources and storage
    pub capacity_values: Vec<AreaCapacityValue>,
    /// Marginal curtailment and its recovery by storage
    pub curtailment: Vec<RegionCurtailment>,
    /// Arbitrage revenue of candidate storage
    pub arbitrage: Vec<RegionArbitrage>,
}

/// Evaluate every value coefficient for the case.
///
/// # Arguments
///
/// * `case` - The input data and parameters
///
/// # Returns
///
/// The results for every area and region, or an error if a calculation is misconfigured.
pub fn evaluate(case: &Case) -> Result<EvaluationResults> {
    let n_hours = case.time_slices.n_hours();
    let net_loads = region_net_loads(case)?;

    info!(
        "Calculating capacity credit by {}...",
        match case.parameters.region_level {
            RegionLevel::Region => "region",
            RegionLevel::Group => "group",
        }
    );
    let capacity_values = areas(case)
        .map(|(area, members)| evaluate_capacity_value(case, area, &members))
        .try_collect()?;

    info!("Calculating marginal curtailment and recovery by storage...");
    let curtailing = case.transmission_groups.curtailing(
        net_loads
            .iter()
            .map(|(region_id, net_load)| (region_id, net_load.values())),
        n_hours,
    );
    let curtailment = net_loads
        .iter()
        .map(|(region_id, net_load)| {
            evaluate_curtailment(case, region_id, net_load, &curtailing[region_id])
        })
        .try_collect()?;

    info!("Calculating storage arbitrage revenue...");
    let market_prices: IndexMap<_, _> = case
        .prices
        .iter()
        .map(|(region_id, prices)| (region_id.clone(), prices.clone()))
        .collect();
    let prices = adjusted_prices(
        &market_prices,
        &case.generation,
        &case.generators,
        &case.transmission_groups,
        &case.time_slices,
    )?;
    let arbitrage = prices
        .iter()
        .map(|(region_id, prices)| {
            evaluate_arbitrage(case, region_id, prices, &curtailing[region_id])
        })
        .try_collect()?;

    Ok(EvaluationResults {
        capacity_values,
        curtailment,
        arbitrage,
    })
}

/// The areas over which capacity credit is evaluated, each with its member regions
fn areas(case: &Case) -> Box<dyn Iterator<Item = (AreaID, Vec<RegionID>)> + '_> {
    match case.parameters.region_level {
        RegionLevel::Region => Box::new(
            case.regions
                .keys()
                .map(|region_id| (AreaID(region_id.0.clone()), vec![region_id.clone()])),
        ),
        RegionLevel::Group => Box::new(
            iter_groups(&case.regions).map(|(group_id, members)| (AreaID(group_id.0), members)),
        ),
    }
}

/// Hourly generation of a set of variable resources
fn vre_generation<'a, I>(case: &Case, resources: I) -> HourlyProfile
where
    I: IntoIterator<Item = &'a Resource>,
{
    let mut generation = vec![0.0; case.time_slices.n_hours()];
    for resource in resources {
        let capacity = resource.capacity.value();
        for (total, cf) in generation.iter_mut().zip(case.capacity_factors[&resource.id].iter()) {
            *total += cf * capacity;
        }
    }

    HourlyProfile::new(generation)
}

/// Load less variable generation in each region
fn region_net_loads(case: &Case) -> Result<IndexMap<RegionID, HourlyProfile>> {
    case.regions
        .keys()
        .map(|region_id| {
            let load = case
                .load
                .get(region_id)
                .with_context(|| format!("No load provided for region {region_id}"))?;
            let generation = vre_generation(case, case.resources_in(region_id));
            Ok((region_id.clone(), load.minus(&generation)))
        })
        .collect()
}

/// Round every value
fn rounded(values: &TimeSliceValues, decimals: u32) -> TimeSliceValues {
    values
        .iter()
        .map(|(ts, value)| (ts.clone(), round_to(*value, decimals)))
        .collect()
}

fn evaluate_capacity_value(
    case: &Case,
    area: AreaID,
    members: &[RegionID],
) -> Result<AreaCapacityValue> {
    let params = &case.parameters;
    let n_hours = case.time_slices.n_hours();

    let mut load = vec![0.0; n_hours];
    for region_id in members {
        for (total, value) in load.iter_mut().zip(case.load[region_id].iter()) {
            *total += value;
        }
    }
    let load = HourlyProfile::new(load);

    let resources = case
        .resources
        .values()
        .filter(|resource| members.contains(&resource.region_id))
        .collect_vec();
    let mut capacity_factors = ProfileMatrix::new(n_hours);
    for resource in &resources {
        capacity_factors.insert(
            resource.id.clone(),
            case.capacity_factors[&resource.id].clone(),
        )?;
    }
    let capacities: IndexMap<_, _> = resources
        .iter()
        .map(|resource| (resource.id.clone(), resource.capacity))
        .collect();

    let result = calculate_capacity_value(
        &load,
        &capacity_factors,
        &capacities,
        params.top_hours,
        params.marginal_vre_capacity,
        params.decimals,
    )
    .with_context(|| format!("Failed to calculate capacity value for {area}"))?;

    let fleet = StorageFleet::from_devices(
        case.storage
            .values()
            .filter(|device| members.contains(&device.region_id)),
        params.default_storage_efficiency,
    );
    let durations = case
        .storage_techs
        .values()
        .map(|tech| tech.duration)
        .collect_vec();
    let credit = storage_capacity_credit(
        &result.net_load,
        &fleet,
        params.sizing_steps,
        params.marginal_storage_power,
        &durations,
        params.discharge_efficiency,
        params.storage_buffer(),
        params.decimals,
    )
    .with_context(|| format!("Failed to size storage for {area}"))?;
    debug!(
        "{area}: {} resources, storage fleet of {} MW with capacity credit {}",
        resources.len(),
        fleet.power,
        credit.capacity_credit.value()
    );

    let marginal_storage_credits = case
        .storage_techs
        .values()
        .zip(credit.marginal_credits)
        .map(|(tech, capacity_credit)| {
            let power = params.marginal_storage_power;
            let storage = StorageFleet {
                power,
                energy: power * tech.duration,
                efficiency: tech.efficiency,
            };
            let marginal = MarginalStorageCredit {
                storage,
                capacity_credit,
            };
            (tech.id.clone(), marginal)
        })
        .collect();

    let top_hour_shares = case.time_slices.share_of_hours(&result.top_hours);
    Ok(AreaCapacityValue {
        area,
        capacities,
        values: result.values,
        fleet,
        storage_credit: credit.capacity_credit,
        marginal_storage_credits,
        top_hour_shares: rounded(&top_hour_shares, params.decimals),
    })
}

fn evaluate_curtailment(
    case: &Case,
    region_id: &RegionID,
    net_load: &HourlyProfile,
    curtailing: &[bool],
) -> Result<RegionCurtailment> {
    let params = &case.parameters;
    let time_slices = &case.time_slices;
    let storage_power = params.marginal_storage_power;
    let devices = case.storage_in(region_id).collect_vec();
    let remaining: Vec<_> = devices
        .iter()
        .map(|device| {
            case.storage_levels
                .get(&device.id)
                .map_or(params.daily_cycle_limit, |levels| {
                    remaining_cycles(levels, device.energy, params.daily_cycle_limit, time_slices)
                })
        })
        .collect();

    let mut marginal = IndexMap::new();
    let mut recovery = Vec::new();
    let no_export = HourlyProfile::zeros(net_load.len());
    let export_capacity = case.export_capacity.get(region_id).unwrap_or(&no_export);
    let available = available_load(net_load, export_capacity, curtailing);
    for resource in case.resources_in(region_id) {
        let result = marginal_curtailment(
            &available,
            &case.capacity_factors[&resource.id],
            params.marginal_vre_capacity,
            time_slices,
        );

        // Candidate storage recovering the curtailment of the marginal resource
        let schedule = storage_schedule(&result.net_load, storage_power);
        let curtailment = curtailment_signal(&result.net_load, storage_power);
        for tech in case.storage_techs.values() {
            let ratios = recovery_ratio(
                storage_power * tech.duration,
                tech.efficiency,
                &schedule,
                time_slices,
                &curtailment,
            )?;
            recovery.push(CurtailmentRecovery {
                kind: RecoveryKind::MarginalStorageMarginalCurtailment,
                storage: RecoveringStorage::Tech(tech.id.clone()),
                resource_id: Some(resource.id.clone()),
                ratios: rounded(&ratios, params.decimals),
            });
        }

        // Existing storage recovering the curtailment of the marginal resource, limited by the
        // cycles it has left
        for (device, remaining) in devices.iter().zip(&remaining) {
            let schedule = storage_schedule(&result.net_load, device.power);
            let curtailment = curtailment_signal(&result.net_load, device.power);
            let ratios = recovery_ratio(
                device.energy,
                device.efficiency,
                &schedule,
                time_slices,
                &curtailment,
            )?;
            recovery.push(CurtailmentRecovery {
                kind: RecoveryKind::ExistingStorageMarginalCurtailment,
                storage: RecoveringStorage::Device(device.id.clone()),
                resource_id: Some(resource.id.clone()),
                ratios: rounded(&derate(&ratios, *remaining), params.decimals),
            });
        }

        marginal.insert(resource.id.clone(), rounded(&result.fractions, params.decimals));
    }

    // Candidate storage recovering curtailment of the existing fleet
    let schedule = storage_schedule(net_load, storage_power);
    let curtailment = curtailment_signal(net_load, storage_power);
    if curtailment.iter().all(|value| *value == 0.0) {
        warn!("Region {region_id} has no existing curtailment for storage to recover");
    }
    for tech in case.storage_techs.values() {
        let ratios = recovery_ratio(
            storage_power * tech.duration,
            tech.efficiency,
            &schedule,
            time_slices,
            &curtailment,
        )?;
        recovery.push(CurtailmentRecovery {
            kind: RecoveryKind::MarginalStorageExistingCurtailment,
            storage: RecoveringStorage::Tech(tech.id.clone()),
            resource_id: None,
            ratios: rounded(&ratios, params.decimals),
        });
    }

    debug!(
        "{region_id}: marginal curtailment for {} resources, {} recovery results",
        marginal.len(),
        recovery.len()
    );

    Ok(RegionCurtailment {
        region_id: region_id.clone(),
        marginal,
        recovery,
    })
}

/// Dispatch a candidate technology against prices, returning its revenue.
///
/// Returns `None` if the technology has no usable energy once the buffer is removed.
fn dispatch_revenue(
    case: &Case,
    region_id: &RegionID,
    prices: &[f64],
    tech: &StorageTech,
    curtailing: &[bool],
) -> Result<Option<Money>> {
    let params = &case.parameters;
    let energy = usable_energy(params.dispatch_power, tech.duration, params.storage_buffer());
    if energy <= Energy(0.0) {
        warn!(
            "Storage technology {} has no usable energy once the buffer is removed, so will not be \
            dispatched",
            tech.id
        );
        return Ok(None);
    }

    let spec = StorageSpec {
        power: params.dispatch_power,
        energy,
        charge_efficiency: tech.efficiency / params.discharge_efficiency,
        discharge_efficiency: params.discharge_efficiency,
        levels: params.dispatch_levels,
    };
    let result = dispatch_storage(prices, &spec)
        .with_context(|| format!("Failed to dispatch {} in region {region_id}", tech.id))?;

    // Energy charged from curtailment is valued by curtailment recovery instead
    let share = if params.exclude_curtailment_charging {
        charging_share_outside_curtailment(&result.dispatch, curtailing)
    } else {
        1.0
    };
    debug!(
        "{region_id}: {} earns {} before excluding charging from curtailment ({share} kept)",
        tech.id, result.revenue
    );

    Ok(Some(result.revenue * Dimensionless(share)))
}

fn evaluate_arbitrage(
    case: &Case,
    region_id: &RegionID,
    prices: &HourlyProfile,
    curtailing: &[bool],
) -> Result<RegionArbitrage> {
    let params = &case.parameters;
    if prices.iter().all(|price| *price == 0.0) {
        warn!("No prices provided for region {region_id}, so arbitrage revenue will be zero");
    }

    let tech_with_duration = |duration: Hours| {
        case.storage_techs
            .values()
            .find(|tech| tech.duration == duration)
    };
    let revenue_row = |storage_tech_id, duration, revenue: Money| {
        let per_mw = revenue.value() / params.dispatch_power.value();
        ArbitrageRevenue {
            storage_tech_id,
            duration,
            revenue: Money(finalise(revenue.value(), params.min_value, params.decimals)),
            revenue_per_mw: MoneyPerPower(finalise(per_mw, params.min_value, params.decimals)),
        }
    };

    let reference_techs: Option<Vec<_>> = params
        .reference_durations
        .iter()
        .map(|duration| tech_with_duration(*duration))
        .collect();
    let revenues = if let Some(reference_techs) = reference_techs {
        // Dispatch the reference durations and interpolate the rest
        let mut dispatched = Vec::new();
        for tech in reference_techs {
            let revenue = dispatch_revenue(case, region_id, prices, tech, curtailing)?;
            dispatched.push((tech.duration, revenue.unwrap_or_default()));
        }

        interpolate_durations(
            &dispatched,
            &params.reference_durations,
            &params.duration_ladder,
        )?
        .into_iter()
        .map(|(duration, revenue)| {
            let tech_id = tech_with_duration(duration).map(|tech| tech.id.clone());
            revenue_row(tech_id, duration, revenue)
        })
        .collect()
    } else {
        debug!("No technologies with the reference durations, so dispatching every technology");
        let mut revenues = Vec::new();
        for tech in case.storage_techs.values() {
            if let Some(revenue) = dispatch_revenue(case, region_id, prices, tech, curtailing)? {
                revenues.push(revenue_row(Some(tech.id.clone()), tech.duration, revenue));
            }
        }

        revenues
    };

    Ok(RegionArbitrage {
        region_id: region_id.clone(),
        revenues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::case;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_areas(mut case: Case) {
        let regions = areas(&case).map(|(area, _)| area).collect_vec();
        assert_eq!(regions, ["r1".into(), "r2".into(), "r3".into()]);

        case.parameters.region_level = RegionLevel::Group;
        let groups = areas(&case).collect_vec();
        assert_eq!(
            groups,
            [
                ("west".into(), vec!["r1".into(), "r2".into()]),
                ("east".into(), vec!["r3".into()]),
            ]
        );
    }

    #[rstest]
    fn test_region_net_loads(case: Case) {
        let net_loads = region_net_loads(&case).unwrap();
        assert_eq!(net_loads[&RegionID::from("r1")].values(), [50.0, 100.0, 50.0, 100.0]);
    }

    #[rstest]
    fn test_evaluate_capacity_value(case: Case) {
        let results = evaluate(&case).unwrap();
        assert_eq!(results.capacity_values.len(), 3);

        // Wind in r1 never generates in the peak hours
        let r1 = &results.capacity_values[0];
        let wind = &r1.values[&ResourceID::from("wind_r1")];
        assert_eq!(wind.existing, Power(0.0));
        assert!((0.0..=1.0).contains(&wind.marginal.value()));
        assert_approx_eq!(f64, r1.top_hour_shares.values().sum::<f64>(), 1.0);

        // One marginal credit for each candidate technology
        assert!(
            r1.marginal_storage_credits
                .keys()
                .eq(case.storage_techs.keys())
        );
        for (tech_id, marginal) in &r1.marginal_storage_credits {
            let tech = &case.storage_techs[tech_id];
            assert_eq!(marginal.storage.power, case.parameters.marginal_storage_power);
            assert_approx_eq!(
                Energy,
                marginal.storage.energy,
                case.parameters.marginal_storage_power * tech.duration
            );
            assert!(marginal.capacity_credit >= Dimensionless(0.0));
        }
    }

    #[rstest]
    fn test_evaluate_group_level(mut case: Case) {
        case.parameters.region_level = RegionLevel::Group;
        let results = evaluate(&case).unwrap();
        assert_eq!(results.capacity_values.len(), 2);
        assert_eq!(results.capacity_values[0].values.len(), 2);
        assert_eq!(results.capacity_values[0].fleet.power, Power(10.0));
    }

    #[rstest]
    fn test_evaluate_curtailment(case: Case) {
        let results = evaluate(&case).unwrap();
        assert_eq!(results.curtailment.len(), 3);
        for region in &results.curtailment {
            for ratios in region.marginal.values() {
                assert!(ratios.values().all(|r| (0.0..=1.0).contains(r)));
            }
            for recovery in &region.recovery {
                assert!(recovery.ratios.values().all(|r| (0.0..=1.0).contains(r)));
            }
        }

        // r1 has one resource, two candidate techs and one existing device
        let r1 = &results.curtailment[0];
        assert_eq!(r1.recovery.len(), 2 + 1 + 2);
        assert_eq!(
            r1.recovery
                .iter()
                .filter(|r| r.kind == RecoveryKind::ExistingStorageMarginalCurtailment)
                .count(),
            1
        );
    }

    #[rstest]
    fn test_evaluate_arbitrage_interpolated(case: Case) {
        let results = evaluate(&case).unwrap();
        let r1 = &results.arbitrage[0];
        assert_eq!(r1.revenues.len(), case.parameters.duration_ladder.len());
        assert!(r1.revenues.iter().all(|r| r.revenue >= Money(0.0)));
        assert_eq!(r1.revenues[1].storage_tech_id, Some("battery_4".into()));
        assert_eq!(r1.revenues[0].storage_tech_id, None);
    }

    #[rstest]
    fn test_evaluate_arbitrage_direct(mut case: Case) {
        case.parameters.reference_durations = vec![Hours(2.0), Hours(6.0)];
        let results = evaluate(&case).unwrap();
        let durations = results.arbitrage[0]
            .revenues
            .iter()
            .map(|r| r.duration)
            .collect_vec();
        assert_eq!(durations, [Hours(4.0), Hours(8.0)]);
    }

    #[rstest]
    fn test_evaluate_missing_buffer_energy(mut case: Case) {
        case.parameters.reference_durations = vec![Hours(2.0), Hours(6.0)];
        case.parameters.storage_buffer_minutes = 300.0;
        let results = evaluate(&case).unwrap();
        let durations = results.arbitrage[0]
            .revenues
            .iter()
            .map(|r| r.duration)
            .collect_vec();
        assert_eq!(durations, [Hours(8.0)]);
    }
}
