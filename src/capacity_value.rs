//! Capacity credit of variable generation using a top-hours approximation.
//!
//! The credit of the existing fleet is the reduction in the highest load hours achieved by variable
//! generation, shared among resources according to what each generates in those hours. The
//! marginal credit of a resource is the reduction in the highest net-load hours achieved by adding
//! a small amount of extra capacity of that resource.
use crate::profile::{
    HourlyProfile, ProfileMatrix, check_aligned, clamp_fraction, finalise, round_to, safe_div,
    sorted_descending, top_hours,
};
use crate::resource::ResourceID;
use crate::units::{Dimensionless, Power};
use anyhow::{Result, ensure};
use indexmap::IndexMap;

/// Marginal capacity credits below this value are set to zero
pub const MARGINAL_CREDIT_FLOOR: f64 = 0.01;

/// The capacity value of a single variable resource
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceCapacityValue {
    /// The firm capacity contributed by the installed capacity
    pub existing: Power,
    /// `existing` as a fraction of installed capacity
    pub existing_fraction: Dimensionless,
    /// The capacity credit of the next increment of capacity
    pub marginal: Dimensionless,
}

/// The results of a capacity value calculation for one region
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityValueResult {
    /// Load net of all variable generation
    pub net_load: HourlyProfile,
    /// The hours with the highest net load, highest first
    pub top_hours: Vec<usize>,
    /// Capacity values for each resource
    pub values: IndexMap<ResourceID, ResourceCapacityValue>,
}

/// Calculate the existing and marginal capacity value of variable resources.
///
/// # Arguments
///
/// * `load` - Hourly load
/// * `capacity_factors` - Hourly capacity factor for each resource
/// * `capacities` - Installed capacity of each resource. Missing resources have zero capacity.
/// * `n_top` - The number of top hours to consider
/// * `increment` - The capacity added to each resource to calculate its marginal credit
/// * `decimals` - The number of decimal places to round results to
pub fn calculate_capacity_value(
    load: &HourlyProfile,
    capacity_factors: &ProfileMatrix<ResourceID>,
    capacities: &IndexMap<ResourceID, Power>,
    n_top: usize,
    increment: Power,
    decimals: u32,
) -> Result<CapacityValueResult> {
    let n_hours = load.len();
    ensure!(n_top > 0, "The number of top hours must be greater than zero");
    ensure!(
        n_top <= n_hours,
        "The number of top hours ({n_top}) exceeds the number of hours ({n_hours})"
    );
    ensure!(
        increment > Power(0.0),
        "The marginal capacity increment must be greater than zero"
    );
    check_aligned("load", capacity_factors.n_hours(), n_hours)?;

    let capacity_of = |id: &ResourceID| capacities.get(id).copied().unwrap_or_default();
    let generation: ProfileMatrix<ResourceID> = capacity_factors
        .iter()
        .map(|(id, cf)| (id.clone(), cf.scaled(capacity_of(id).value())))
        .collect();
    let net_load = load.minus(&generation.row_sums());

    let top_net = top_hours(&net_load, n_top);
    let top_load = top_hours(load, n_top);

    // Reduction in the k-th highest load achieved by variable generation
    let reductions: Vec<_> = top_load
        .iter()
        .zip(&top_net)
        .map(|(&h, &h_net)| load[h] - net_load[h_net])
        .collect();
    let ratios: Vec<_> = top_load
        .iter()
        .zip(&reductions)
        .map(|(&h, reduction)| safe_div(*reduction, load[h] - net_load[h]))
        .collect();

    // Generation credited to each resource in each top hour
    let blended: IndexMap<&ResourceID, Vec<f64>> = generation
        .iter()
        .map(|(id, gen_profile)| {
            let values = (0..n_top)
                .map(|k| {
                    let at_load_peak = gen_profile[top_load[k]];
                    let from_load_peak = if ratios[k] < 1.0 {
                        at_load_peak * ratios[k]
                    } else {
                        at_load_peak
                    };
                    gen_profile[top_net[k]] + from_load_peak
                })
                .collect();
            (id, values)
        })
        .collect();
    let blended_sums: Vec<f64> = (0..n_top)
        .map(|k| blended.values().map(|values| values[k]).sum())
        .collect();

    let values = blended
        .into_iter()
        .map(|(id, gen_values)| {
            let useful: f64 = gen_values
                .iter()
                .zip(&blended_sums)
                .zip(&reductions)
                .map(|((value, sum), reduction)| safe_div(*value, *sum) * reduction)
                .sum::<f64>()
                / n_top as f64;

            let capacity = capacity_of(id);
            let existing = round_to(useful.clamp(0.0, capacity.value().max(0.0)), decimals);
            let existing_fraction = round_to(safe_div(existing, capacity.value()), decimals);
            let marginal =
                marginal_capacity_credit(&net_load, &top_net, &capacity_factors[id], increment);

            let value = ResourceCapacityValue {
                existing: Power(existing),
                existing_fraction: Dimensionless(existing_fraction),
                marginal: Dimensionless(finalise(marginal, MARGINAL_CREDIT_FLOOR, decimals)),
            };
            (id.clone(), value)
        })
        .collect();

    Ok(CapacityValueResult {
        net_load,
        top_hours: top_net,
        values,
    })
}

/// The capacity credit of an extra `increment` of a resource with the given capacity factor.
///
/// The marginal net-load profile is re-sorted so that the k-th highest marginal net load is
/// compared against the k-th highest existing net load, even if they fall in different hours.
fn marginal_capacity_credit(
    net_load: &[f64],
    top_net: &[usize],
    capacity_factor: &[f64],
    increment: Power,
) -> f64 {
    let marginal_net_load: Vec<_> = net_load
        .iter()
        .zip(capacity_factor)
        .map(|(net, cf)| net - cf * increment.value())
        .collect();
    let sorted = sorted_descending(&marginal_net_load);

    let reduction: f64 = top_net
        .iter()
        .zip(&sorted)
        .map(|(&h, marginal)| net_load[h] - marginal)
        .sum();

    clamp_fraction(reduction / top_net.len() as f64 / increment.value())
}
