//! Marginal curtailment and its recovery by storage.
//!
//! Storage is simulated in hour order against a schedule of desired charging (positive) and
//! discharging (negative). Energy charged is treated as recovered curtailment, less whatever is
//! still held in storage at the end of the year.
use crate::profile::{clamp_fraction, safe_div};
use crate::time_slice::{TimeSliceMap, TimeSliceValues};
use crate::units::{Dimensionless, Energy, Power};
use anyhow::{Result, ensure};

/// The storage schedule implied by a net-load profile.
///
/// Storage charges from surplus (negative net load) and discharges into positive net load, in
/// both cases limited to `power`.
pub fn storage_schedule(net_load: &[f64], power: Power) -> Vec<f64> {
    let power = power.value();
    net_load.iter().map(|net| -net.clamp(-power, power)).collect()
}

/// Hourly curtailment (surplus) which a device of the given power could absorb
pub fn curtailment_signal(net_load: &[f64], power: Power) -> Vec<f64> {
    let power = power.value();
    net_load.iter().map(|net| (-net).clamp(0.0, power)).collect()
}

/// Load which could absorb extra generation in each hour.
///
/// This is positive net load plus the capacity to export out of the region. Nothing is available
/// in hours where the region's transmission group is already curtailing.
pub fn available_load(
    net_load: &[f64],
    export_capacity: &[f64],
    group_curtailing: &[bool],
) -> Vec<f64> {
    assert_eq!(net_load.len(), group_curtailing.len(), "Profiles not aligned");
    assert_eq!(net_load.len(), export_capacity.len(), "Profiles not aligned");

    net_load
        .iter()
        .zip(export_capacity)
        .zip(group_curtailing)
        .map(|((net, export), curtailing)| {
            if *curtailing {
                0.0
            } else {
                net.max(0.0) + export
            }
        })
        .collect()
}

/// Curtailment resulting from adding an increment of a variable resource
#[derive(Debug, Clone, PartialEq)]
pub struct MarginalCurtailment {
    /// Available load less the marginal generation
    pub net_load: Vec<f64>,
    /// Hourly curtailment of the marginal generation
    pub curtailment: Vec<f64>,
    /// Curtailed fraction of the marginal generation in each time slice
    pub fractions: TimeSliceValues,
}

/// Calculate the curtailment of `increment` extra capacity with the given capacity factor
pub fn marginal_curtailment(
    available_load: &[f64],
    capacity_factor: &[f64],
    increment: Power,
    time_slices: &TimeSliceMap,
) -> MarginalCurtailment {
    let generation: Vec<_> = capacity_factor
        .iter()
        .map(|cf| cf * increment.value())
        .collect();
    let net_load: Vec<_> = available_load
        .iter()
        .zip(&generation)
        .map(|(load, generation)| load - generation)
        .collect();
    let curtailment: Vec<_> = net_load.iter().map(|net| (-net).max(0.0)).collect();

    let curtailed = time_slices.sum_by_slice(&curtailment);
    let generated = time_slices.sum_by_slice(&generation);
    let fractions = curtailed
        .into_iter()
        .zip(generated)
        .map(|(curtailed, generated)| safe_div(curtailed, generated).min(1.0))
        .collect();

    MarginalCurtailment {
        net_load,
        curtailment,
        fractions: time_slices.label(fractions),
    }
}

/// Simulate storage following `schedule` and return the hourly state of charge and the energy
/// recovered each hour.
///
/// The state of charge starts empty. Charging is subject to `efficiency` and the state of charge is
/// kept within `[0, energy]`.
fn simulate(energy: Energy, efficiency: Dimensionless, schedule: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let efficiency = efficiency.value();
    let mut level = 0.0f64;
    let mut levels = Vec::with_capacity(schedule.len());
    let mut recovered = Vec::with_capacity(schedule.len());
    for &change in schedule {
        let change = if change > 0.0 {
            change * efficiency
        } else {
            change
        };
        let next = (level + change).clamp(0.0, energy.value());
        recovered.push(((next - level) / efficiency).max(0.0));
        levels.push(next);
        level = next;
    }

    (levels, recovered)
}

/// The fraction of curtailment in each time slice recovered by a storage device.
///
/// # Arguments
///
/// * `energy` - Energy capacity of the device
/// * `efficiency` - Round-trip efficiency of the device
/// * `schedule` - Desired hourly charging (positive) and discharging (negative), already limited
///   to the device's power
/// * `time_slices` - Time slice of each hour
/// * `curtailment` - Hourly curtailment which the device is recovering
pub fn recovery_ratio(
    energy: Energy,
    efficiency: Dimensionless,
    schedule: &[f64],
    time_slices: &TimeSliceMap,
    curtailment: &[f64],
) -> Result<TimeSliceValues> {
    ensure!(
        efficiency > Dimensionless(0.0),
        "Storage efficiency must be greater than zero"
    );
    ensure!(
        energy >= Energy(0.0),
        "Storage energy capacity cannot be negative"
    );

    let (levels, recovered) = simulate(energy, efficiency, schedule);
    let recovered_by_slice = time_slices.sum_by_slice(&recovered);
    let total_recovered: f64 = recovered_by_slice.iter().sum();
    let curtailment_by_slice = time_slices.sum_by_slice(curtailment);

    // Energy left in storage at the end was never used, so is removed from each time slice in
    // proportion to what was recovered there
    let leftover = levels.last().copied().unwrap_or(0.0);
    let ratios = recovered_by_slice
        .into_iter()
        .zip(curtailment_by_slice)
        .map(|(recovered, curtailed)| {
            let unrecovered = leftover * safe_div(recovered, total_recovered);
            clamp_fraction(safe_div(recovered - unrecovered, curtailed))
        })
        .collect();

    Ok(time_slices.label(ratios))
}

/// The fraction of its daily cycling limit an existing device has left unused.
///
/// Charging is taken from the positive changes in the device's hourly state of charge.
pub fn remaining_cycles(
    state_of_charge: &[f64],
    energy: Energy,
    daily_cycle_limit: f64,
    time_slices: &TimeSliceMap,
) -> f64 {
    if energy <= Energy(0.0) {
        return 0.0;
    }

    let mut charged: Vec<_> = state_of_charge
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).max(0.0))
        .collect();
    charged.resize(state_of_charge.len(), 0.0);

    let daily = time_slices.sum_by_day(&charged);
    let mean_daily = daily.iter().sum::<f64>() / daily.len() as f64;
    let cycles = mean_daily / energy.value();

    (daily_cycle_limit - cycles).max(0.0)
}

/// Scale recovery ratios by the cycles a device has left
pub fn derate(ratios: &TimeSliceValues, remaining_cycles: f64) -> TimeSliceValues {
    ratios
        .iter()
        .map(|(ts, ratio)| (ts.clone(), clamp_fraction(ratio * remaining_cycles)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_slice::TimeSliceID;
    use float_cmp::assert_approx_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn time_slices() -> TimeSliceMap {
        TimeSliceMap::new(["day", "day", "night", "night"].map(TimeSliceID::from), 2).unwrap()
    }

    fn ratio(values: &TimeSliceValues, ts: &str) -> f64 {
        values[&TimeSliceID::from(ts)]
    }

    #[test]
    fn test_storage_schedule() {
        assert_eq!(
            storage_schedule(&[-20.0, -5.0, 5.0, 20.0], Power(10.0)),
            [10.0, 5.0, -5.0, -10.0]
        );
        assert_eq!(
            curtailment_signal(&[-20.0, -5.0, 5.0, 20.0], Power(10.0)),
            [10.0, 5.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_available_load() {
        assert_eq!(
            available_load(&[-5.0, 10.0, 10.0], &[0.0; 3], &[false, false, true]),
            [0.0, 10.0, 0.0]
        );

        // Export capacity is only usable where the group is not curtailing
        assert_eq!(
            available_load(&[-5.0, 10.0, 10.0], &[20.0; 3], &[false, false, true]),
            [20.0, 30.0, 0.0]
        );
    }

    #[rstest]
    fn test_export_capacity_lowers_curtailment(time_slices: TimeSliceMap) {
        let net_load = [0.0, 50.0, 100.0, 100.0];
        let capacity_factor = [0.5, 1.0, 0.0, 1.0];
        let curtailing = [false; 4];

        let available = available_load(&net_load, &[0.0; 4], &curtailing);
        let without_export =
            marginal_curtailment(&available, &capacity_factor, Power(100.0), &time_slices);
        assert_approx_eq!(f64, ratio(&without_export.fractions, "day"), 100.0 / 150.0);

        // 25 MW of export absorbs 25 MWh in each day hour
        let available = available_load(&net_load, &[25.0; 4], &curtailing);
        let with_export =
            marginal_curtailment(&available, &capacity_factor, Power(100.0), &time_slices);
        assert_eq!(with_export.curtailment, [25.0, 25.0, 0.0, 0.0]);
        assert_approx_eq!(f64, ratio(&with_export.fractions, "day"), 50.0 / 150.0);
        assert!(ratio(&with_export.fractions, "day") < ratio(&without_export.fractions, "day"));
    }

    #[rstest]
    fn test_marginal_curtailment(time_slices: TimeSliceMap) {
        let result = marginal_curtailment(
            &[0.0, 50.0, 100.0, 100.0],
            &[0.5, 1.0, 0.0, 1.0],
            Power(100.0),
            &time_slices,
        );
        assert_eq!(result.curtailment, [50.0, 50.0, 0.0, 0.0]);
        assert_approx_eq!(f64, ratio(&result.fractions, "day"), 100.0 / 150.0);
        assert_eq!(ratio(&result.fractions, "night"), 0.0);
    }

    #[rstest]
    fn test_full_recovery_lossless(time_slices: TimeSliceMap) {
        // Unlimited energy, no losses: everything charged is later discharged
        let schedule = [10.0, 10.0, -10.0, -10.0];
        let curtailment = [10.0, 10.0, 0.0, 0.0];
        let ratios = recovery_ratio(
            Energy(1000.0),
            Dimensionless(1.0),
            &schedule,
            &time_slices,
            &curtailment,
        )
        .unwrap();
        assert_approx_eq!(f64, ratio(&ratios, "day"), 1.0);
        assert_eq!(ratio(&ratios, "night"), 0.0);
    }

    #[rstest]
    fn test_leftover_energy_removed(time_slices: TimeSliceMap) {
        // Half of what is charged is never discharged
        let schedule = [10.0, 10.0, -10.0, 0.0];
        let curtailment = [10.0, 10.0, 0.0, 0.0];
        let ratios = recovery_ratio(
            Energy(1000.0),
            Dimensionless(1.0),
            &schedule,
            &time_slices,
            &curtailment,
        )
        .unwrap();
        assert_approx_eq!(f64, ratio(&ratios, "day"), 0.5);
    }

    #[rstest]
    fn test_energy_limit(time_slices: TimeSliceMap) {
        let schedule = [10.0, 10.0, -10.0, -10.0];
        let curtailment = [10.0, 10.0, 0.0, 0.0];
        let ratios = recovery_ratio(
            Energy(5.0),
            Dimensionless(1.0),
            &schedule,
            &time_slices,
            &curtailment,
        )
        .unwrap();
        assert_approx_eq!(f64, ratio(&ratios, "day"), 0.25);
    }

    #[rstest]
    fn test_losses(time_slices: TimeSliceMap) {
        let schedule = [10.0, 0.0, -10.0, 0.0];
        let curtailment = [10.0, 0.0, 0.0, 0.0];
        let ratios = recovery_ratio(
            Energy(100.0),
            Dimensionless(0.5),
            &schedule,
            &time_slices,
            &curtailment,
        )
        .unwrap();

        // 5 MWh stored from 10 MWh of curtailment, then fully discharged
        assert_approx_eq!(f64, ratio(&ratios, "day"), 1.0);
    }

    #[rstest]
    #[case([3.0, -7.0, 12.0, -1.0])]
    #[case([10.0, 10.0, 10.0, 10.0])]
    #[case([-10.0, 4.0, -2.0, 9.0])]
    fn test_ratio_bounds(#[case] schedule: [f64; 4], time_slices: TimeSliceMap) {
        let curtailment = schedule.map(|s| s.max(0.0) / 2.0);
        let ratios = recovery_ratio(
            Energy(8.0),
            Dimensionless(0.8),
            &schedule,
            &time_slices,
            &curtailment,
        )
        .unwrap();
        assert!(ratios.values().all(|r| (0.0..=1.0).contains(r)));
    }

    #[rstest]
    fn test_zero_curtailment(time_slices: TimeSliceMap) {
        let ratios = recovery_ratio(
            Energy(10.0),
            Dimensionless(1.0),
            &[0.0; 4],
            &time_slices,
            &[0.0; 4],
        )
        .unwrap();
        assert!(ratios.values().all(|r| *r == 0.0));
    }

    #[rstest]
    fn test_remaining_cycles(time_slices: TimeSliceMap) {
        // 10 MWh charged on the first day, none on the second
        let soc = [0.0, 10.0, 10.0, 10.0];
        assert_approx_eq!(
            f64,
            remaining_cycles(&soc, Energy(10.0), 1.0, &time_slices),
            0.5
        );
        assert_eq!(
            remaining_cycles(&soc, Energy(2.0), 1.0, &time_slices),
            0.0
        );
        assert_eq!(remaining_cycles(&soc, Energy(0.0), 1.0, &time_slices), 0.0);
    }

    #[rstest]
    fn test_derate(time_slices: TimeSliceMap) {
        let ratios = time_slices.label(vec![0.8, 0.4]);
        let derated = derate(&ratios, 0.5);
        assert_approx_eq!(f64, ratio(&derated, "day"), 0.4);
        assert_approx_eq!(f64, ratio(&derated, "night"), 0.2);
    }
}
