//! Code for working with time slices.
//!
//! Time slices are coarse reporting buckets (e.g. season × time of day). Every hour of the modelled
//! year belongs to exactly one time slice, and hours are also grouped into days for the daily-cycle
//! calculations. Time slices are only ever used to aggregate results: simulations always run in
//! hour order.
use crate::id::define_id_type;
use anyhow::{Result, ensure};
use indexmap::{IndexMap, IndexSet};

define_id_type! {TimeSliceID}

/// The default number of hours in a day
pub const HOURS_PER_DAY: usize = 24;

/// Values aggregated per time slice, in the order the time slices first appear
pub type TimeSliceValues = IndexMap<TimeSliceID, f64>;

/// Maps each hour of the year to a time slice and a day
#[derive(PartialEq, Debug, Clone)]
pub struct TimeSliceMap {
    /// Time slices in order of first appearance
    time_slices: IndexSet<TimeSliceID>,
    /// Index into `time_slices` for each hour
    hour_slices: Vec<usize>,
    /// Number of consecutive hours making up a day
    hours_per_day: usize,
}

impl TimeSliceMap {
    /// Create a new [`TimeSliceMap`] from the time slice label of every hour.
    ///
    /// # Arguments
    ///
    /// * `labels` - The time slice for each hour, in hour order
    /// * `hours_per_day` - How many consecutive hours make up one day
    pub fn new<I>(labels: I, hours_per_day: usize) -> Result<Self>
    where
        I: IntoIterator<Item = TimeSliceID>,
    {
        ensure!(hours_per_day > 0, "hours_per_day must be greater than zero");

        let mut time_slices = IndexSet::new();
        let hour_slices: Vec<_> = labels
            .into_iter()
            .map(|label| time_slices.insert_full(label).0)
            .collect();
        ensure!(!hour_slices.is_empty(), "Time slice map cannot be empty");

        Ok(Self {
            time_slices,
            hour_slices,
            hours_per_day,
        })
    }

    /// A map with a single time slice covering every hour
    pub fn single(n_hours: usize) -> Self {
        Self {
            time_slices: std::iter::once("annual".into()).collect(),
            hour_slices: vec![0; n_hours],
            hours_per_day: HOURS_PER_DAY,
        }
    }

    /// The number of hours covered by the map
    pub fn n_hours(&self) -> usize {
        self.hour_slices.len()
    }

    /// The number of time slices
    pub fn n_time_slices(&self) -> usize {
        self.time_slices.len()
    }

    /// The number of (possibly partial) days covered by the map
    pub fn n_days(&self) -> usize {
        self.n_hours().div_ceil(self.hours_per_day)
    }

    /// The day to which `hour` belongs
    pub fn day_for_hour(&self, hour: usize) -> usize {
        hour / self.hours_per_day
    }

    /// Iterate over all [`TimeSliceID`]s in order
    pub fn iter_ids(&self) -> impl Iterator<Item = &TimeSliceID> {
        self.time_slices.iter()
    }

    /// The time slice to which `hour` belongs
    pub fn time_slice_for_hour(&self, hour: usize) -> &TimeSliceID {
        &self.time_slices[self.hour_slices[hour]]
    }

    /// Sum an hourly series within each time slice.
    ///
    /// The result is indexed in the same order as [`TimeSliceMap::iter_ids`].
    pub fn sum_by_slice(&self, values: &[f64]) -> Vec<f64> {
        assert_eq!(values.len(), self.n_hours(), "Profile not aligned with time slices");

        let mut sums = vec![0.0; self.n_time_slices()];
        for (&slice, value) in self.hour_slices.iter().zip(values) {
            sums[slice] += value;
        }

        sums
    }

    /// Average an hourly series within each time slice
    pub fn mean_by_slice(&self, values: &[f64]) -> Vec<f64> {
        let mut counts = vec![0usize; self.n_time_slices()];
        for &slice in &self.hour_slices {
            counts[slice] += 1;
        }

        self.sum_by_slice(values)
            .into_iter()
            .zip(counts)
            .map(|(sum, count)| sum / count as f64)
            .collect()
    }

    /// Sum an hourly series within each day
    pub fn sum_by_day(&self, values: &[f64]) -> Vec<f64> {
        assert_eq!(values.len(), self.n_hours(), "Profile not aligned with days");

        let mut sums = vec![0.0; self.n_days()];
        for (hour, value) in values.iter().enumerate() {
            sums[self.day_for_hour(hour)] += value;
        }

        sums
    }

    /// The fraction of the given hours falling in each time slice.
    ///
    /// Time slices containing none of the hours are omitted.
    pub fn share_of_hours(&self, hours: &[usize]) -> TimeSliceValues {
        let mut counts = vec![0usize; self.n_time_slices()];
        for &hour in hours {
            counts[self.hour_slices[hour]] += 1;
        }

        self.iter_ids()
            .zip(counts)
            .filter(|(_, count)| *count > 0)
            .map(|(ts, count)| (ts.clone(), count as f64 / hours.len() as f64))
            .collect()
    }

    /// Attach time slice IDs to values indexed as in [`TimeSliceMap::sum_by_slice`]
    pub fn label(&self, values: Vec<f64>) -> TimeSliceValues {
        assert_eq!(values.len(), self.n_time_slices());
        self.iter_ids().cloned().zip(values).collect()
    }
}
