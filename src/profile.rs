//! Hourly time series and the primitives shared by every calculation.
//!
//! Profiles are plain hour-ordered `f64` series. A [`ProfileMatrix`] holds one profile per resource
//! (or per storage device, generator, ...), all of the same length.
use anyhow::{Result, ensure};
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::hash::Hash;

/// An hour-ordered series of values, one per hour of the modelled period
#[derive(Debug, Clone, PartialEq, Default, derive_more::Deref)]
pub struct HourlyProfile(Vec<f64>);

impl HourlyProfile {
    /// Create a profile from hour-ordered values
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// A profile of `n_hours` zeros
    pub fn zeros(n_hours: usize) -> Self {
        Self(vec![0.0; n_hours])
    }

    /// Broadcast a scalar across `n_hours` hours
    pub fn constant(n_hours: usize, value: f64) -> Self {
        Self(vec![value; n_hours])
    }

    /// The underlying values
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// Multiply every hour by the same scalar (e.g. capacity factor × installed capacity)
    pub fn scaled(&self, factor: f64) -> Self {
        self.0.iter().map(|value| value * factor).collect()
    }

    /// The largest value in the profile, or 0 for an empty profile
    pub fn max_value(&self) -> f64 {
        self.0.iter().copied().reduce(f64::max).unwrap_or(0.0)
    }

    /// Hour-wise difference `self - other`
    pub fn minus(&self, other: &[f64]) -> Self {
        assert_eq!(self.len(), other.len(), "Profiles not aligned");
        self.0.iter().zip(other).map(|(a, b)| a - b).collect()
    }
}

impl From<Vec<f64>> for HourlyProfile {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

impl FromIterator<f64> for HourlyProfile {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A set of equal-length hourly profiles keyed by ID
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileMatrix<K: Hash + Eq> {
    n_hours: usize,
    columns: IndexMap<K, HourlyProfile>,
}

impl<K: Hash + Eq + std::fmt::Display> ProfileMatrix<K> {
    /// Create an empty matrix whose columns will all have `n_hours` values
    pub fn new(n_hours: usize) -> Self {
        Self {
            n_hours,
            columns: IndexMap::new(),
        }
    }

    /// Add a column, checking it is aligned with the others
    pub fn insert(&mut self, key: K, profile: HourlyProfile) -> Result<()> {
        check_aligned(&key, profile.len(), self.n_hours)?;
        self.columns.insert(key, profile);
        Ok(())
    }

    /// The number of hours in each column
    pub fn n_hours(&self) -> usize {
        self.n_hours
    }

    /// The number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the matrix has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Get the profile for `key`
    pub fn get(&self, key: &K) -> Option<&HourlyProfile> {
        self.columns.get(key)
    }

    /// Iterate over keys
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.columns.keys()
    }

    /// Iterate over columns in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &HourlyProfile)> {
        self.columns.iter()
    }

    /// Hour-wise sum over all columns
    pub fn row_sums(&self) -> HourlyProfile {
        let mut sums = vec![0.0; self.n_hours];
        for profile in self.columns.values() {
            for (sum, value) in sums.iter_mut().zip(profile.iter()) {
                *sum += value;
            }
        }

        HourlyProfile(sums)
    }
}

impl<K: Hash + Eq> std::ops::Index<&K> for ProfileMatrix<K> {
    type Output = HourlyProfile;

    fn index(&self, key: &K) -> &HourlyProfile {
        &self.columns[key]
    }
}

impl<K: Hash + Eq + std::fmt::Display> FromIterator<(K, HourlyProfile)> for ProfileMatrix<K> {
    /// Build a matrix from columns. All columns must have the same length.
    fn from_iter<I: IntoIterator<Item = (K, HourlyProfile)>>(iter: I) -> Self {
        let columns: IndexMap<_, _> = iter.into_iter().collect();
        let n_hours = columns.values().next().map_or(0, |p: &HourlyProfile| p.len());
        assert!(
            columns.values().all(|p| p.len() == n_hours),
            "Profiles not aligned"
        );

        Self { n_hours, columns }
    }
}

/// Check that a profile has the expected number of hours
pub fn check_aligned<D: std::fmt::Display>(name: D, len: usize, n_hours: usize) -> Result<()> {
    ensure!(
        len == n_hours,
        "Profile for {name} has {len} hours but {n_hours} were expected"
    );

    Ok(())
}

/// Compare floats so that larger values come first, treating NaN as smallest
fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
}

/// The indices of the `n` largest values, largest first.
///
/// Ties keep hour order.
pub fn top_hours(values: &[f64], n: usize) -> Vec<usize> {
    let mut hours: Vec<_> = (0..values.len()).collect();
    hours.sort_by(|&a, &b| descending(values[a], values[b]));
    hours.truncate(n);
    hours
}

/// A copy of `values` sorted largest first
pub fn sorted_descending(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| descending(*a, *b));
    sorted
}

/// Round to the given number of decimal places
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    // Adding zero turns -0.0 into 0.0
    (value * factor).round() / factor + 0.0
}

/// Set values below `min_value` to zero, then round
pub fn finalise(value: f64, min_value: f64, decimals: u32) -> f64 {
    if value < min_value {
        0.0
    } else {
        round_to(value, decimals)
    }
}

/// Divide, returning zero where the denominator is zero
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Clamp a value to the unit interval
pub fn clamp_fraction(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use crate::id::GenericID;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[test]
    fn test_scaled() {
        let cf = HourlyProfile::new(vec![0.0, 0.5, 1.0]);
        assert_eq!(cf.scaled(50.0), HourlyProfile::new(vec![0.0, 25.0, 50.0]));
    }

    #[test]
    fn test_top_hours_ties_keep_order() {
        assert_eq!(top_hours(&[50.0, 100.0, 50.0, 100.0], 2), [1, 3]);
        assert_eq!(top_hours(&[3.0, 1.0, 2.0], 3), [0, 2, 1]);
    }

    #[test]
    fn test_top_hours_nan_last() {
        assert_eq!(top_hours(&[f64::NAN, 1.0, 2.0], 2), [2, 1]);
    }

    #[test]
    fn test_sorted_descending() {
        assert_eq!(sorted_descending(&[1.0, 3.0, 2.0]), [3.0, 2.0, 1.0]);
    }

    #[rstest]
    #[case(0.123_456, 5, 0.12346)]
    #[case(-0.000_001, 5, 0.0)]
    #[case(2.5, 0, 3.0)]
    fn test_round_to(#[case] value: f64, #[case] decimals: u32, #[case] expected: f64) {
        assert_approx_eq!(f64, round_to(value, decimals), expected);
        assert!(round_to(value, decimals).is_sign_positive());
    }

    #[rstest]
    #[case(0.0005, 0.001, 0.0)]
    #[case(0.123_456, 0.001, 0.1235)]
    fn test_finalise(#[case] value: f64, #[case] min_value: f64, #[case] expected: f64) {
        assert_approx_eq!(f64, finalise(value, min_value, 4), expected);
    }

    #[test]
    fn test_safe_div() {
        assert_eq!(safe_div(1.0, 0.0), 0.0);
        assert_eq!(safe_div(1.0, 4.0), 0.25);
    }

    #[test]
    fn test_matrix_insert_misaligned() {
        let mut matrix = ProfileMatrix::<GenericID>::new(3);
        matrix
            .insert("a".into(), HourlyProfile::constant(3, 1.0))
            .unwrap();
        assert_error!(
            matrix.insert("b".into(), HourlyProfile::zeros(2)),
            "Profile for b has 2 hours but 3 were expected"
        );
    }

    #[test]
    fn test_row_sums() {
        let matrix: ProfileMatrix<GenericID> = [
            ("a".into(), HourlyProfile::new(vec![1.0, 2.0])),
            ("b".into(), HourlyProfile::new(vec![3.0, 4.0])),
        ]
        .into_iter()
        .collect();
        assert_eq!(matrix.row_sums(), HourlyProfile::new(vec![4.0, 6.0]));
    }
}
