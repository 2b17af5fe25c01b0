//! Extending arbitrage revenue from two dispatched durations to a ladder of durations.
//!
//! Revenue per hour of duration is assumed to vary linearly with duration between (and beyond) the
//! two reference durations.
use crate::units::{Hours, Money};
use anyhow::{Context, Result, ensure};

/// Interpolate revenue for each duration in `ladder`.
///
/// # Arguments
///
/// * `revenues` - Revenue of devices with the two reference durations
/// * `reference_durations` - The two durations which were dispatched
/// * `ladder` - Durations for which to estimate revenue
pub fn interpolate_durations(
    revenues: &[(Hours, Money)],
    reference_durations: &[Hours],
    ladder: &[Hours],
) -> Result<Vec<(Hours, Money)>> {
    ensure!(
        reference_durations.len() == 2,
        "Exactly two reference durations are needed, but {} were given",
        reference_durations.len()
    );
    let (low, high) = (reference_durations[0], reference_durations[1]);
    ensure!(
        low != high,
        "Reference durations must be different, but both are {low}"
    );

    let revenue_for = |duration: Hours| {
        revenues
            .iter()
            .find(|(d, _)| *d == duration)
            .map(|(_, revenue)| revenue.value())
            .with_context(|| format!("No revenue provided for reference duration {duration}"))
    };
    let per_hour_low = revenue_for(low)? / low.value();
    let per_hour_high = revenue_for(high)? / high.value();
    let slope = (per_hour_high - per_hour_low) / (high.value() - low.value());

    Ok(ladder
        .iter()
        .map(|&duration| {
            let per_hour = per_hour_low + slope * (duration.value() - low.value());
            (duration, Money(per_hour * duration.value()))
        })
        .collect())
}
