//! Storage sizing for peak-load reduction and the capacity credit of storage.
//!
//! For each candidate peak reduction, storage must discharge whenever load exceeds the reduced
//! peak and may recharge (up to the reduction) whenever there is headroom below it. The energy
//! capacity needed is the deepest deficit reached by that sequence.
//!
//! The reductions run from zero to the power of the existing fleet, followed by one extra point for
//! the fleet plus a marginal addition. The credit of the existing fleet is read off the curve up to
//! full fleet power; the credit of marginal storage comes from the slope of the curve around the
//! fleet.
use crate::profile::{clamp_fraction, round_to, safe_div};
use crate::resource::StorageDevice;
use crate::units::{Dimensionless, Energy, Hours, Power};
use anyhow::{Result, ensure};
use itertools::Itertools;

/// The storage fleet of a region, aggregated
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageFleet {
    /// Total power
    pub power: Power,
    /// Total energy capacity
    pub energy: Energy,
    /// Power-weighted round-trip efficiency
    pub efficiency: Dimensionless,
}

impl StorageFleet {
    /// Aggregate a set of devices.
    ///
    /// `default_efficiency` is used when the fleet has no power.
    pub fn from_devices<'a, I>(devices: I, default_efficiency: Dimensionless) -> Self
    where
        I: IntoIterator<Item = &'a StorageDevice>,
    {
        let mut power = Power(0.0);
        let mut energy = Energy(0.0);
        let mut weighted_efficiency = 0.0;
        for device in devices {
            power = power + device.power;
            energy = energy + device.energy;
            weighted_efficiency += device.power.value() * device.efficiency.value();
        }

        let efficiency = if power > Power(0.0) {
            Dimensionless(weighted_efficiency / power.value())
        } else {
            default_efficiency
        };

        Self {
            power,
            energy,
            efficiency,
        }
    }
}

/// The results of sizing storage against a net-load profile
#[derive(Debug, Clone, PartialEq)]
pub struct StorageCreditResult {
    /// Candidate peak reductions (MW), ending with the fleet plus the marginal addition
    pub reductions: Vec<f64>,
    /// Energy capacity (MWh) required to achieve each reduction
    pub required_energy: Vec<f64>,
    /// Capacity credit of the existing fleet as a fraction of its power
    pub capacity_credit: Dimensionless,
    /// Capacity credit of marginal storage of each requested duration, as a fraction of its power
    pub marginal_credits: Vec<Dimensionless>,
}

/// `steps` evenly spaced peak reductions from zero to `fleet_power` inclusive
pub fn peak_reductions(fleet_power: Power, steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => {
            let step = fleet_power.value() / (steps - 1) as f64;
            (0..steps).map(|i| i as f64 * step).collect()
        }
    }
}

/// Peak reductions for sizing, with a final point for the fleet plus `marginal_power`
fn peak_reductions_with_marginal(
    fleet_power: Power,
    steps: usize,
    marginal_power: Power,
) -> Vec<f64> {
    let mut reductions = peak_reductions(fleet_power, steps);
    reductions.push((fleet_power + marginal_power).value());

    reductions
}

/// The energy capacity needed to reduce the peak of `load` by each of `reductions`.
///
/// # Arguments
///
/// * `load` - Hourly (net) load
/// * `reductions` - Candidate peak reductions
/// * `charge_efficiency` - Efficiency applied to recharging
/// * `discharge_efficiency` - Efficiency applied to the forced discharge
/// * `buffer` - Extra duration added to every requirement
pub fn required_energy(
    load: &[f64],
    reductions: &[f64],
    charge_efficiency: Dimensionless,
    discharge_efficiency: Dimensionless,
    buffer: Hours,
) -> Vec<f64> {
    let peak = load.iter().copied().reduce(f64::max).unwrap_or(0.0);

    reductions
        .iter()
        .map(|&reduction| {
            let cap = peak - reduction;
            let mut level = 0.0f64;
            let mut deepest = 0.0f64;
            for &value in load {
                let headroom = cap - value;
                let change = if headroom <= 0.0 {
                    headroom / discharge_efficiency.value()
                } else {
                    (reduction * charge_efficiency.value())
                        .min(headroom * charge_efficiency.value())
                };

                level = (level + change).min(0.0);
                deepest = deepest.min(level);
            }

            -deepest + reduction * buffer.value()
        })
        .collect()
}

/// Linear interpolation of `x` in a non-decreasing table, clamped to its ends.
///
/// Where `xs` has flat sections, the last matching point is used.
fn interpolate(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    let Some(i) = xs.iter().rposition(|&xi| xi <= x) else {
        return ys.first().copied().unwrap_or(0.0);
    };
    if i + 1 == xs.len() {
        return ys[i];
    }

    ys[i] + (ys[i + 1] - ys[i]) * (x - xs[i]) / (xs[i + 1] - xs[i])
}

/// Whether the fleet's energy covers a reduction equal to its full power.
///
/// The last point of the curve is the marginal addition, so full fleet power is the one before it.
fn covers_fleet_power(required: &[f64], fleet: &StorageFleet) -> bool {
    required.len() >= 2 && required[required.len() - 2] <= fleet.energy.value()
}

/// The capacity credit of a fleet given the requirement curve.
///
/// The credit is one when the fleet's energy covers a reduction equal to its full power.
/// Otherwise it is the reduction achievable with the fleet's energy as a fraction of its power.
pub fn fleet_capacity_credit(
    reductions: &[f64],
    required: &[f64],
    fleet: &StorageFleet,
    decimals: u32,
) -> Dimensionless {
    if fleet.power <= Power(0.0) || required.len() < 2 {
        return Dimensionless(0.0);
    }

    let energy = fleet.energy.value();
    if covers_fleet_power(required, fleet) {
        return Dimensionless(1.0);
    }

    let effective_power = interpolate(energy, required, reductions);
    Dimensionless(round_to(
        clamp_fraction(effective_power / fleet.power.value()),
        decimals,
    ))
}

/// The slope of the requirement curve (MW per MWh) where the fleet sits on it.
///
/// The slope is taken between the fleet and the nearest point of the curve. If the fleet lies
/// exactly on that point, the segment leaving it is used.
fn slope_at_fleet(reductions: &[f64], required: &[f64], energy: f64, effective_power: f64) -> f64 {
    let closest = required
        .iter()
        .map(|value| (value - energy).abs())
        .position_min_by(f64::total_cmp)
        .unwrap_or(0);

    let run = required[closest] - energy;
    if run != 0.0 {
        return ((reductions[closest] - effective_power) / run).abs();
    }

    let next = (closest + 1).min(required.len() - 1);
    safe_div(
        reductions[next] - reductions[closest],
        required[next] - required[closest],
    )
    .abs()
}

/// The capacity credit of marginal storage of each duration, given the requirement curve.
///
/// If the fleet covers its full power, a marginal device whose energy closes the gap to the last
/// point of the curve gets a credit of one; shorter devices get the slope of the last segment times
/// their duration. Otherwise the credit is the slope of the curve at the fleet times the duration,
/// capped at the value which would bring the credit of the whole fleet up to one.
pub fn marginal_capacity_credits(
    reductions: &[f64],
    required: &[f64],
    fleet: &StorageFleet,
    marginal_power: Power,
    durations: &[Hours],
    decimals: u32,
) -> Vec<Dimensionless> {
    let n = required.len();
    if n < 2 || marginal_power <= Power(0.0) {
        return vec![Dimensionless(0.0); durations.len()];
    }

    let energy = fleet.energy.value();
    let marginal = marginal_power.value();
    let credit = |value: f64| Dimensionless(round_to(value.max(0.0), decimals));

    if covers_fleet_power(required, fleet) {
        let rise = reductions[n - 1] - reductions[n - 2];
        let run = required[n - 1] - required[n - 2];
        return durations
            .iter()
            .map(|duration| {
                let hours = duration.value();
                if run <= 0.0 || required[n - 1] <= energy + marginal * hours {
                    credit(1.0)
                } else {
                    credit(rise / run * hours)
                }
            })
            .collect();
    }

    let effective_power = interpolate(energy, required, reductions);
    let fleet_credit = safe_div(effective_power, fleet.power.value());
    let max_credit = (marginal + fleet.power.value() * (1.0 - fleet_credit)) / marginal;
    let slope = slope_at_fleet(reductions, required, energy, effective_power);

    durations
        .iter()
        .map(|duration| credit((slope * duration.value()).min(max_credit)))
        .collect()
}

/// Size storage against `net_load` and compute the capacity credit of `fleet` and of marginal
/// storage of each of `durations`
#[allow(clippy::too_many_arguments)]
pub fn storage_capacity_credit(
    net_load: &[f64],
    fleet: &StorageFleet,
    steps: usize,
    marginal_power: Power,
    durations: &[Hours],
    discharge_efficiency: Dimensionless,
    buffer: Hours,
    decimals: u32,
) -> Result<StorageCreditResult> {
    ensure!(steps >= 2, "At least two peak reductions must be considered");
    ensure!(!net_load.is_empty(), "Cannot size storage against an empty profile");

    let reductions = peak_reductions_with_marginal(fleet.power, steps, marginal_power);
    let required = required_energy(
        net_load,
        &reductions,
        fleet.efficiency,
        discharge_efficiency,
        buffer,
    );
    let capacity_credit = fleet_capacity_credit(&reductions, &required, fleet, decimals);
    let marginal_credits = marginal_capacity_credits(
        &reductions,
        &required,
        fleet,
        marginal_power,
        durations,
        decimals,
    );

    Ok(StorageCreditResult {
        reductions,
        required_energy: required,
        capacity_credit,
        marginal_credits,
    })
}
