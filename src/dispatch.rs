//! Perfect-foresight, price-taking storage dispatch by dynamic programming.
//!
//! The state of charge is discretised into evenly spaced levels, from full (state 0) to empty
//! (the last state). Each hour the device may move up or down by a whole number of levels within
//! its power limit. Backward induction over the hours gives the cheapest move from every state, and
//! the dispatch is reconstructed forward from a full device.
use crate::units::{Dimensionless, Energy, Hours, Money, Power};
use anyhow::{Result, ensure};

/// A small cost per move, growing with the square of the move size, so that slower movements are
/// preferred when costs are otherwise equal
pub const MOTION_PENALTY: f64 = 1e-7;

/// Price ($/MWh) at which the device must refill any energy it has not replaced by the end of the
/// period
pub const TERMINAL_PRICE: f64 = 7000.0;

/// The storage device being dispatched
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageSpec {
    /// Charge and discharge limit
    pub power: Power,
    /// Usable energy capacity
    pub energy: Energy,
    /// Efficiency applied when charging
    pub charge_efficiency: Dimensionless,
    /// Efficiency applied when discharging
    pub discharge_efficiency: Dimensionless,
    /// The number of discrete energy levels
    pub levels: usize,
}

/// The result of dispatching a storage device
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResult {
    /// Net output in each hour: positive when injecting, negative when drawing from the grid
    pub dispatch: Vec<f64>,
    /// State of charge at the end of each hour
    pub state_of_charge: Vec<f64>,
    /// Revenue from buying and selling energy at the given prices
    pub revenue: Money,
}

/// The possible moves between energy levels in a single hour
struct MoveSet {
    /// Number of levels by which the device may charge in one hour
    charge_steps: usize,
    /// Number of levels by which the device may discharge in one hour
    discharge_steps: usize,
    /// Energy drawn from the grid for each move, ordered from full charge to full discharge
    grid_energy: Vec<f64>,
    /// Motion penalty for each move
    penalty: Vec<f64>,
}

impl MoveSet {
    fn new(spec: &StorageSpec, resolution: f64) -> Result<Self> {
        let charge_steps =
            (spec.power.value() * spec.charge_efficiency.value() / resolution).floor() as usize;
        let discharge_steps =
            (spec.power.value() / spec.discharge_efficiency.value() / resolution).floor() as usize;
        ensure!(
            charge_steps > 0 && discharge_steps > 0,
            "Storage cannot move between energy levels with {} levels: increase the number of \
            levels",
            spec.levels
        );

        let (grid_energy, penalty) = (0..=charge_steps + discharge_steps)
            .map(|index| {
                let steps = charge_steps as f64 - index as f64;
                if steps > 0.0 {
                    let fraction = steps / charge_steps as f64;
                    (
                        steps * resolution / spec.charge_efficiency.value(),
                        MOTION_PENALTY * fraction * fraction,
                    )
                } else {
                    let fraction = steps / discharge_steps as f64;
                    (
                        steps * resolution * spec.discharge_efficiency.value(),
                        MOTION_PENALTY * fraction * fraction,
                    )
                }
            })
            .unzip();

        Ok(Self {
            charge_steps,
            discharge_steps,
            grid_energy,
            penalty,
        })
    }

    /// The state reached by taking move `index` from `state`, saturated to the valid range, and
    /// whether the move was feasible
    fn target(&self, state: usize, index: usize, n_levels: usize) -> (usize, bool) {
        let target = state as isize + index as isize - self.charge_steps as isize;
        let last = n_levels as isize - 1;

        (target.clamp(0, last) as usize, (0..=last).contains(&target))
    }
}

fn check_spec(spec: &StorageSpec) -> Result<()> {
    ensure!(
        spec.levels >= 2,
        "At least two energy levels are needed to dispatch storage"
    );
    ensure!(
        spec.energy.is_finite() && spec.energy > Energy(0.0),
        "Storage energy capacity must be greater than zero"
    );
    ensure!(
        spec.power.is_finite() && spec.power > Power(0.0),
        "Storage power must be greater than zero"
    );
    ensure!(
        spec.charge_efficiency > Dimensionless(0.0) && spec.discharge_efficiency > Dimensionless(0.0),
        "Storage efficiencies must be greater than zero"
    );

    Ok(())
}

/// Dispatch a storage device against a price signal to maximise its revenue.
///
/// The device starts full and is charged [`TERMINAL_PRICE`] for any energy it has not replaced by
/// the end of the period.
///
/// # Arguments
///
/// * `prices` - Hourly energy price
/// * `spec` - The device to dispatch
pub fn dispatch_storage(prices: &[f64], spec: &StorageSpec) -> Result<DispatchResult> {
    check_spec(spec)?;

    let n_levels = spec.levels;
    let resolution = spec.energy.value() / (n_levels - 1) as f64;
    let moves = MoveSet::new(spec, resolution)?;
    let level = |state: usize| spec.energy.value() - state as f64 * resolution;

    // Cost to go from each state at the start of the next hour
    let mut expected: Vec<f64> = (0..n_levels)
        .map(|state| (spec.energy.value() - level(state)) / spec.charge_efficiency.value())
        .map(|unfilled| unfilled * TERMINAL_PRICE)
        .collect();

    // Best move index for each hour and state
    let mut choices = vec![0usize; prices.len() * n_levels];
    let mut next_expected = vec![0.0; n_levels];
    for (hour, price) in prices.iter().enumerate().rev() {
        std::mem::swap(&mut expected, &mut next_expected);
        for (state, expected_cost) in expected.iter_mut().enumerate() {
            let mut best_cost = f64::INFINITY;
            let mut best_move = moves.charge_steps;
            let options = moves.grid_energy.iter().zip(&moves.penalty).enumerate();
            for (index, (grid_energy, penalty)) in options {
                let (target, feasible) = moves.target(state, index, n_levels);
                let infeasible_cost = if feasible { 0.0 } else { f64::INFINITY };
                let cost = grid_energy * price + infeasible_cost + penalty + next_expected[target];

                if cost < best_cost {
                    best_cost = cost;
                    best_move = index;
                }
            }

            *expected_cost = best_cost;
            choices[hour * n_levels + state] = best_move;
        }
    }

    let mut state = 0;
    let mut dispatch = Vec::with_capacity(prices.len());
    let mut state_of_charge = Vec::with_capacity(prices.len());
    for hour in 0..prices.len() {
        let index = choices[hour * n_levels + state];
        state = moves.target(state, index, n_levels).0;
        dispatch.push(-moves.grid_energy[index]);
        state_of_charge.push(level(state));
    }

    let revenue = dispatch.iter().zip(prices).map(|(d, p)| d * p).sum();

    Ok(DispatchResult {
        dispatch,
        state_of_charge,
        revenue: Money(revenue),
    })
}

/// The energy capacity available for dispatch, after removing a buffer from the duration
pub fn usable_energy(power: Power, duration: Hours, buffer: Hours) -> Energy {
    power * (duration - buffer)
}

/// The share of charging energy drawn in hours without curtailment.
///
/// Returns one if the device never charges.
pub fn charging_share_outside_curtailment(dispatch: &[f64], curtailing: &[bool]) -> f64 {
    assert_eq!(dispatch.len(), curtailing.len(), "Profiles not aligned");

    let mut total = 0.0;
    let mut outside = 0.0;
    for (value, curtailing) in dispatch.iter().zip(curtailing) {
        if *value < 0.0 {
            total -= value;
            if !curtailing {
                outside -= value;
            }
        }
    }

    if total == 0.0 { 1.0 } else { outside / total }
}
