//! Defines the `ValueParameters` struct, which represents the contents of `parameters.toml`.
use crate::input::{input_err_msg, is_sorted_and_unique, read_toml};
use crate::units::{Dimensionless, Hours, Power};
use anyhow::{Context, Result, ensure};
use log::warn;
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::path::Path;

const PARAMETERS_FILE_NAME: &str = "parameters.toml";

macro_rules! define_unit_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            <$type>::new($value)
        }
    };
}

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_top_hours, usize, 10);
define_unit_param_default!(default_marginal_vre_capacity, Power, 100.0);
define_unit_param_default!(default_marginal_storage_power, Power, 100.0);
define_unit_param_default!(default_dispatch_power, Power, 100.0);
define_param_default!(default_storage_buffer_minutes, f64, 60.0);
define_param_default!(default_sizing_steps, usize, 100);
define_param_default!(default_daily_cycle_limit, f64, 1.0);
define_param_default!(default_dispatch_levels, usize, 21);
define_unit_param_default!(default_discharge_efficiency, Dimensionless, 1.0);
define_unit_param_default!(default_storage_efficiency, Dimensionless, 0.85);
define_param_default!(default_min_value, f64, 0.001);
define_param_default!(default_decimals, u32, 5);
define_param_default!(default_hours_per_day, usize, crate::time_slice::HOURS_PER_DAY);
define_param_default!(default_exclude_curtailment_charging, bool, true);

fn default_reference_durations() -> Vec<Hours> {
    vec![Hours(4.0), Hours(8.0)]
}

fn default_duration_ladder() -> Vec<Hours> {
    [2.0, 4.0, 6.0, 8.0, 10.0, 12.0].map(Hours).to_vec()
}

/// The parameters controlling a single evaluation of resource values.
///
/// All fields have defaults, so an empty `parameters.toml` is valid.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ValueParameters {
    /// The number of top net-load hours used to approximate capacity credit
    #[serde(default = "default_top_hours")]
    pub top_hours: usize,
    /// The capacity added to each variable resource when computing marginal values
    #[serde(default = "default_marginal_vre_capacity")]
    pub marginal_vre_capacity: Power,
    /// The power of the marginal storage device used for curtailment recovery
    #[serde(default = "default_marginal_storage_power")]
    pub marginal_storage_power: Power,
    /// The power of the marginal storage device dispatched against prices
    #[serde(default = "default_dispatch_power")]
    pub dispatch_power: Power,
    /// A buffer added to storage duration requirements and removed from dispatched storage
    #[serde(default = "default_storage_buffer_minutes")]
    pub storage_buffer_minutes: f64,
    /// The number of candidate peak reductions tried when sizing the storage fleet
    #[serde(default = "default_sizing_steps")]
    pub sizing_steps: usize,
    /// The maximum number of full cycles per day an existing storage device may perform
    #[serde(default = "default_daily_cycle_limit")]
    pub daily_cycle_limit: f64,
    /// The number of discrete energy levels used by the dispatch optimiser.
    ///
    /// More levels give a more accurate dispatch at the cost of run time.
    #[serde(default = "default_dispatch_levels")]
    pub dispatch_levels: usize,
    /// Discharge efficiency for dispatch. Round-trip losses are otherwise applied on charging.
    #[serde(default = "default_discharge_efficiency")]
    pub discharge_efficiency: Dimensionless,
    /// The round-trip efficiency assumed for a region with no existing storage
    #[serde(default = "default_storage_efficiency")]
    pub default_storage_efficiency: Dimensionless,
    /// The two storage durations which are dispatched explicitly
    #[serde(default = "default_reference_durations")]
    pub reference_durations: Vec<Hours>,
    /// The storage durations for which arbitrage revenue is interpolated
    #[serde(default = "default_duration_ladder")]
    pub duration_ladder: Vec<Hours>,
    /// Output values below this threshold are set to zero
    #[serde(default = "default_min_value")]
    pub min_value: f64,
    /// The number of decimal places to which outputs are rounded
    #[serde(default = "default_decimals")]
    pub decimals: u32,
    /// The number of consecutive hours in a day
    #[serde(default = "default_hours_per_day")]
    pub hours_per_day: usize,
    /// Whether to discount arbitrage revenue earned by charging from curtailed energy
    #[serde(default = "default_exclude_curtailment_charging")]
    pub exclude_curtailment_charging: bool,
    /// The level at which load and resources are pooled for capacity credit
    #[serde(default)]
    pub region_level: RegionLevel,
}

impl Default for ValueParameters {
    fn default() -> Self {
        // All fields have serde defaults
        toml::from_str("").expect("Cannot create parameters from empty TOML")
    }
}

/// The level at which capacity credit is evaluated
#[derive(DeserializeLabeledStringEnum, Debug, PartialEq, Clone, Copy, Default)]
pub enum RegionLevel {
    /// Each region is evaluated on its own load
    #[default]
    #[string = "region"]
    Region,
    /// Regions in the same capacity-credit group are pooled
    #[string = "group"]
    Group,
}

/// Check that the `top_hours` parameter is valid
fn check_top_hours(value: usize) -> Result<()> {
    ensure!(value > 0, "top_hours cannot be zero");

    Ok(())
}

/// Check that a power parameter is finite and positive
fn check_power(name: &str, value: Power) -> Result<()> {
    ensure!(
        value.is_finite() && value > Power(0.0),
        "{name} must be a finite number greater than zero"
    );

    Ok(())
}

/// Check that an efficiency is in the range (0, 1]
fn check_efficiency(name: &str, value: Dimensionless) -> Result<()> {
    ensure!(
        value > Dimensionless(0.0) && value <= Dimensionless(1.0),
        "{name} must be greater than zero and no more than one"
    );

    Ok(())
}

/// Check that the `dispatch_levels` parameter is valid
fn check_dispatch_levels(value: usize) -> Result<()> {
    ensure!(value >= 2, "dispatch_levels must be at least 2");

    Ok(())
}

/// Check that the `reference_durations` parameter is valid
fn check_reference_durations(durations: &[Hours]) -> Result<()> {
    ensure!(
        durations.len() == 2,
        "reference_durations must contain exactly two durations"
    );
    ensure!(
        durations[0] != durations[1],
        "reference_durations must be different from one another"
    );
    ensure!(
        durations.iter().all(|d| d.is_finite() && *d > Hours(0.0)),
        "reference_durations must be positive"
    );

    Ok(())
}

/// Check that the `duration_ladder` parameter is valid
fn check_duration_ladder(durations: &[Hours]) -> Result<()> {
    ensure!(!durations.is_empty(), "`duration_ladder` is empty");
    let values: Vec<_> = durations.iter().map(|d| d.value()).collect();
    ensure!(
        is_sorted_and_unique(&values),
        "`duration_ladder` must be composed of unique values in order"
    );

    Ok(())
}

impl ValueParameters {
    /// Read a parameters file from the specified directory.
    ///
    /// If the file is not present, default values are used.
    ///
    /// # Arguments
    ///
    /// * `case_dir` - Folder containing case input files
    ///
    /// # Returns
    ///
    /// The file contents as a [`ValueParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(case_dir: P) -> Result<ValueParameters> {
        let file_path = case_dir.as_ref().join(PARAMETERS_FILE_NAME);
        if !file_path.is_file() {
            return Ok(ValueParameters::default());
        }

        let params: ValueParameters = read_toml(&file_path)?;
        params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(params)
    }

    /// Validate parameters after reading in file
    pub fn validate(&self) -> Result<()> {
        check_top_hours(self.top_hours)?;
        check_power("marginal_vre_capacity", self.marginal_vre_capacity)?;
        check_power("marginal_storage_power", self.marginal_storage_power)?;
        check_power("dispatch_power", self.dispatch_power)?;
        ensure!(
            self.storage_buffer_minutes.is_finite() && self.storage_buffer_minutes >= 0.0,
            "storage_buffer_minutes must be a finite number no less than zero"
        );
        ensure!(self.sizing_steps >= 2, "sizing_steps must be at least 2");
        ensure!(
            self.daily_cycle_limit.is_finite() && self.daily_cycle_limit >= 0.0,
            "daily_cycle_limit must be a finite number no less than zero"
        );
        check_dispatch_levels(self.dispatch_levels)?;
        check_efficiency("discharge_efficiency", self.discharge_efficiency)?;
        check_efficiency("default_storage_efficiency", self.default_storage_efficiency)?;
        check_reference_durations(&self.reference_durations)?;
        check_duration_ladder(&self.duration_ladder)?;
        ensure!(self.hours_per_day > 0, "hours_per_day cannot be zero");

        if self.min_value < 0.0 {
            warn!("min_value is negative, so no outputs will be set to zero");
        }

        Ok(())
    }

    /// The duration buffer in hours
    pub fn storage_buffer(&self) -> Hours {
        Hours(self.storage_buffer_minutes / 60.0)
    }
}
