//! The module responsible for writing output data to disk.
use crate::engine::{
    AreaCapacityValue, AreaID, EvaluationResults, RecoveryKind, RegionArbitrage, RegionCurtailment,
};
use crate::log::{LOG_ERROR_FILE_NAME, LOG_INFO_FILE_NAME};
use crate::region::RegionID;
use crate::resource::{ResourceID, StorageTechID};
use crate::time_slice::TimeSliceID;
use crate::units::{Dimensionless, Energy, Hours, Money, MoneyPerPower, Power};
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which case-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "gridvalue_results";

/// The output file name for capacity values of variable resources
const CAPACITY_VALUE_FILE_NAME: &str = "capacity_value.csv";

/// The output file name for the capacity credit of existing storage
const STORAGE_CAPACITY_CREDIT_FILE_NAME: &str = "storage_capacity_credit.csv";

/// The output file name for the time slices of the top net-load hours
const TOP_HOURS_FILE_NAME: &str = "top_hours.csv";

/// The output file name for marginal curtailment fractions
const CURTAILMENT_MARGINAL_FILE_NAME: &str = "curtailment_marginal.csv";

/// The output file name for curtailment recovered by storage
const CURTAILMENT_RECOVERY_FILE_NAME: &str = "curtailment_recovery.csv";

/// The output file name for storage arbitrage revenue
const ARBITRAGE_REVENUE_FILE_NAME: &str = "arbitrage_revenue.csv";

/// Every file which a run may write to its output folder
const OUTPUT_FILE_NAMES: [&str; 9] = [
    CAPACITY_VALUE_FILE_NAME,
    STORAGE_CAPACITY_CREDIT_FILE_NAME,
    TOP_HOURS_FILE_NAME,
    CURTAILMENT_MARGINAL_FILE_NAME,
    CURTAILMENT_RECOVERY_FILE_NAME,
    ARBITRAGE_REVENUE_FILE_NAME,
    metadata::METADATA_FILE_NAME,
    LOG_INFO_FILE_NAME,
    LOG_ERROR_FILE_NAME,
];

/// Get the default output directory for the case in the specified directory
pub fn get_output_dir(case_dir: &Path) -> Result<PathBuf> {
    // Canonicalise in case the user has specified "."
    let case_dir = case_dir
        .canonicalize()
        .context("Could not resolve path to case")?;

    let case_name = case_dir
        .file_name()
        .context("Case cannot be in root folder")?
        .to_str()
        .context("Invalid chars in case dir name")?;

    Ok([OUTPUT_DIRECTORY_ROOT, case_name].iter().collect())
}

/// Create a new output directory, clearing a non-empty existing one if `allow_overwrite` is set.
///
/// Only folders containing nothing but files written by a previous run are cleared.
///
/// # Returns
///
/// Whether an existing directory was overwritten
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let Ok(entries) = fs::read_dir(output_dir) else {
        fs::create_dir_all(output_dir)?;
        return Ok(false);
    };

    let entries: Vec<_> = entries.try_collect()?;
    if entries.is_empty() {
        // Empty folder can be reused as is
        return Ok(false);
    }

    ensure!(
        allow_overwrite,
        "Output folder already exists and is not empty. Please delete the folder or pass the \
         --overwrite command-line option."
    );

    for entry in &entries {
        let is_output_file = entry.file_type()?.is_file()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| OUTPUT_FILE_NAMES.contains(&name));
        ensure!(
            is_output_file,
            "Output folder contains {}, which was not written by gridvalue. Please delete the \
             folder manually.",
            entry.path().display()
        );
    }

    for entry in &entries {
        fs::remove_file(entry.path())?;
    }

    Ok(true)
}

/// Represents a row in the capacity value CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct CapacityValueRow {
    area: AreaID,
    resource_id: ResourceID,
    capacity: Power,
    existing: Power,
    existing_fraction: Dimensionless,
    marginal: Dimensionless,
}

/// Represents a row in the storage capacity credit CSV file.
///
/// Rows without a `storage_tech_id` are for the existing fleet of the area.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct StorageCapacityCreditRow {
    area: AreaID,
    storage_tech_id: Option<StorageTechID>,
    power: Power,
    energy: Energy,
    efficiency: Dimensionless,
    capacity_credit: Dimensionless,
}

/// Represents a row in the top hours CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct TopHoursRow {
    area: AreaID,
    time_slice: TimeSliceID,
    share: f64,
}

/// Represents a row in the marginal curtailment CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct CurtailmentMarginalRow {
    region_id: RegionID,
    resource_id: ResourceID,
    time_slice: TimeSliceID,
    fraction: f64,
}

/// Represents a row in the curtailment recovery CSV file.
///
/// `storage` is either a storage technology or an existing device, depending on `kind`.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct CurtailmentRecoveryRow {
    region_id: RegionID,
    kind: RecoveryKind,
    storage: String,
    resource_id: Option<ResourceID>,
    time_slice: TimeSliceID,
    fraction: f64,
}

/// Represents a row in the arbitrage revenue CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ArbitrageRevenueRow {
    region_id: RegionID,
    storage_tech_id: Option<StorageTechID>,
    duration: Hours,
    revenue: Money,
    revenue_per_mw: MoneyPerPower,
}

/// An object for writing evaluation results to file
pub struct DataWriter {
    capacity_value_writer: csv::Writer<File>,
    storage_credit_writer: csv::Writer<File>,
    top_hours_writer: csv::Writer<File>,
    curtailment_marginal_writer: csv::Writer<File>,
    curtailment_recovery_writer: csv::Writer<File>,
    arbitrage_writer: csv::Writer<File>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    pub fn create(output_path: &Path) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(file_path)
        };

        Ok(Self {
            capacity_value_writer: new_writer(CAPACITY_VALUE_FILE_NAME)?,
            storage_credit_writer: new_writer(STORAGE_CAPACITY_CREDIT_FILE_NAME)?,
            top_hours_writer: new_writer(TOP_HOURS_FILE_NAME)?,
            curtailment_marginal_writer: new_writer(CURTAILMENT_MARGINAL_FILE_NAME)?,
            curtailment_recovery_writer: new_writer(CURTAILMENT_RECOVERY_FILE_NAME)?,
            arbitrage_writer: new_writer(ARBITRAGE_REVENUE_FILE_NAME)?,
        })
    }

    /// Write all evaluation results to CSV files
    pub fn write_results(&mut self, results: &EvaluationResults) -> Result<()> {
        self.write_capacity_values(&results.capacity_values)?;
        self.write_curtailment(&results.curtailment)?;
        self.write_arbitrage(&results.arbitrage)?;

        Ok(())
    }

    /// Write capacity values, storage capacity credit and top-hour shares
    fn write_capacity_values(&mut self, areas: &[AreaCapacityValue]) -> Result<()> {
        for area in areas {
            for (resource_id, value) in &area.values {
                let row = CapacityValueRow {
                    area: area.area.clone(),
                    resource_id: resource_id.clone(),
                    capacity: area.capacities[resource_id],
                    existing: value.existing,
                    existing_fraction: value.existing_fraction,
                    marginal: value.marginal,
                };
                self.capacity_value_writer.serialize(row)?;
            }

            let row = StorageCapacityCreditRow {
                area: area.area.clone(),
                storage_tech_id: None,
                power: area.fleet.power,
                energy: area.fleet.energy,
                efficiency: area.fleet.efficiency,
                capacity_credit: area.storage_credit,
            };
            self.storage_credit_writer.serialize(row)?;
            for (tech_id, marginal) in &area.marginal_storage_credits {
                let row = StorageCapacityCreditRow {
                    area: area.area.clone(),
                    storage_tech_id: Some(tech_id.clone()),
                    power: marginal.storage.power,
                    energy: marginal.storage.energy,
                    efficiency: marginal.storage.efficiency,
                    capacity_credit: marginal.capacity_credit,
                };
                self.storage_credit_writer.serialize(row)?;
            }

            for (time_slice, share) in &area.top_hour_shares {
                let row = TopHoursRow {
                    area: area.area.clone(),
                    time_slice: time_slice.clone(),
                    share: *share,
                };
                self.top_hours_writer.serialize(row)?;
            }
        }

        Ok(())
    }

    /// Write marginal curtailment and its recovery by storage
    fn write_curtailment(&mut self, regions: &[RegionCurtailment]) -> Result<()> {
        for region in regions {
            for (resource_id, fractions) in &region.marginal {
                for (time_slice, fraction) in fractions {
                    let row = CurtailmentMarginalRow {
                        region_id: region.region_id.clone(),
                        resource_id: resource_id.clone(),
                        time_slice: time_slice.clone(),
                        fraction: *fraction,
                    };
                    self.curtailment_marginal_writer.serialize(row)?;
                }
            }

            for recovery in &region.recovery {
                for (time_slice, fraction) in &recovery.ratios {
                    let row = CurtailmentRecoveryRow {
                        region_id: region.region_id.clone(),
                        kind: recovery.kind,
                        storage: recovery.storage.to_string(),
                        resource_id: recovery.resource_id.clone(),
                        time_slice: time_slice.clone(),
                        fraction: *fraction,
                    };
                    self.curtailment_recovery_writer.serialize(row)?;
                }
            }
        }

        Ok(())
    }

    /// Write arbitrage revenue for each candidate duration
    fn write_arbitrage(&mut self, regions: &[RegionArbitrage]) -> Result<()> {
        for region in regions {
            for revenue in &region.revenues {
                let row = ArbitrageRevenueRow {
                    region_id: region.region_id.clone(),
                    storage_tech_id: revenue.storage_tech_id.clone(),
                    duration: revenue.duration,
                    revenue: revenue.revenue,
                    revenue_per_mw: revenue.revenue_per_mw,
                };
                self.arbitrage_writer.serialize(row)?;
            }
        }

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.capacity_value_writer.flush()?;
        self.storage_credit_writer.flush()?;
        self.top_hours_writer.flush()?;
        self.curtailment_marginal_writer.flush()?;
        self.curtailment_recovery_writer.flush()?;
        self.arbitrage_writer.flush()?;

        Ok(())
    }
}
