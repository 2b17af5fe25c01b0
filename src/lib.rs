//! Capacity value, curtailment and storage arbitrage coefficients for capacity-expansion models.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod capacity_value;
pub mod case;
pub mod cli;
pub mod curtailment;
pub mod dispatch;
pub mod duration;
pub mod engine;
pub mod id;
pub mod input;
pub mod log;
pub mod output;
pub mod parameters;
pub mod price_stack;
pub mod profile;
pub mod region;
pub mod resource;
pub mod settings;
pub mod storage_sizing;
pub mod time_slice;
pub mod units;

#[cfg(test)]
mod fixture;

/// Get the config dir for the program
pub fn get_gridvalue_config_dir() -> PathBuf {
    let Some(mut config_dir) = dirs::config_dir() else {
        // No config dir on this platform, so use the current directory
        return PathBuf::new();
    };

    config_dir.push("gridvalue");
    config_dir
}
