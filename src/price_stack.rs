//! Adjusting market prices for the start costs of dispatchable generators.
//!
//! Each generator bids its operating cost plus, on days when it starts up, its start cost spread
//! over the energy it generates that day. The adjusted price in each hour is the higher of the
//! market price and the highest bid of any generator running in the same transmission group.
use crate::profile::{HourlyProfile, ProfileMatrix, check_aligned, safe_div};
use crate::region::{RegionID, TransmissionGroupID, TransmissionGroups};
use crate::resource::{Generator, GeneratorID, GeneratorMap};
use crate::time_slice::TimeSliceMap;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Market prices below this value are treated as zero
pub const PRICE_FLOOR: f64 = 0.001;

/// The bid price of a generator on each day.
///
/// A generator is considered to have started up on days when its minimum output was zero. The
/// capacity started is the difference between its maximum and minimum output that day.
pub fn daily_bid_prices(
    generation: &[f64],
    generator: &Generator,
    time_slices: &TimeSliceMap,
) -> Vec<f64> {
    let n_days = time_slices.n_days();
    let mut max = vec![f64::NEG_INFINITY; n_days];
    let mut min = vec![f64::INFINITY; n_days];
    for (hour, value) in generation.iter().enumerate() {
        let day = time_slices.day_for_hour(hour);
        max[day] = max[day].max(*value);
        min[day] = min[day].min(*value);
    }
    let totals = time_slices.sum_by_day(generation);

    max.into_iter()
        .zip(min)
        .zip(totals)
        .map(|((max, min), total)| {
            let start_cost = if min == 0.0 {
                (max - min) * generator.start_cost_per_mw.value()
            } else {
                0.0
            };

            generator.operating_cost.value() + safe_div(start_cost, total)
        })
        .collect()
}

/// Market prices raised to the start-cost-adjusted bids of running generators.
///
/// # Arguments
///
/// * `market_prices` - Hourly market price for each region
/// * `generation` - Hourly output of each generator
/// * `generators` - Generator definitions
/// * `groups` - Transmission groups linking regions
/// * `time_slices` - Day of each hour
///
/// # Returns
///
/// Adjusted hourly prices for each region in `market_prices`
pub fn adjusted_prices(
    market_prices: &IndexMap<RegionID, HourlyProfile>,
    generation: &ProfileMatrix<GeneratorID>,
    generators: &GeneratorMap,
    groups: &TransmissionGroups,
    time_slices: &TimeSliceMap,
) -> Result<IndexMap<RegionID, HourlyProfile>> {
    let n_hours = time_slices.n_hours();
    check_aligned("generation", generation.n_hours(), n_hours)?;

    // Highest bid in each (group, hour) among generators which are running
    let mut highest_bids: HashMap<(TransmissionGroupID, usize), f64> = HashMap::new();
    for (generator_id, output) in generation.iter() {
        let generator = generators
            .get(generator_id)
            .with_context(|| format!("Generation provided for unknown generator {generator_id}"))?;
        let bids = daily_bid_prices(output, generator, time_slices);

        for (hour, value) in output.iter().enumerate() {
            if *value <= 0.0 {
                continue;
            }

            let bid = bids[time_slices.day_for_hour(hour)];
            let key = (groups.group(&generator.region_id, hour), hour);
            highest_bids
                .entry(key)
                .and_modify(|highest| *highest = highest.max(bid))
                .or_insert(bid);
        }
    }

    market_prices
        .iter()
        .map(|(region_id, prices)| {
            check_aligned(region_id, prices.len(), n_hours)?;

            let adjusted: HourlyProfile = prices
                .iter()
                .enumerate()
                .map(|(hour, price)| {
                    let price = if *price < PRICE_FLOOR { 0.0 } else { *price };
                    let bid = highest_bids
                        .get(&(groups.group(region_id, hour), hour))
                        .copied()
                        .unwrap_or(0.0);
                    price.max(bid)
                })
                .collect();

            Ok((region_id.clone(), adjusted))
        })
        .collect()
}
