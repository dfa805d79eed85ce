//! Fusion of overlapping per-dataset arrays into one.

use cube_common::FusionPolicy;

use crate::error::{GridProcessorError, Result};

#[inline]
fn is_valid(value: f32, nodata: f32) -> bool {
    !value.is_nan() && value != nodata
}

/// Folds arrays of one cell, lowest priority first, under a fusion policy.
///
/// A pixel stays nodata only while every array pushed so far is nodata
/// there; a valid value is never replaced by nodata.
#[derive(Debug, Clone)]
pub struct FusionAccumulator {
    policy: FusionPolicy,
    nodata: f32,
    values: Vec<f32>,
    sums: Vec<f64>,
    counts: Vec<u32>,
}

impl FusionAccumulator {
    pub fn new(policy: FusionPolicy, len: usize, nodata: f32) -> Self {
        let (sums, counts) = match policy {
            FusionPolicy::Mean => (vec![0.0; len], vec![0; len]),
            _ => (Vec::new(), Vec::new()),
        };
        Self {
            policy,
            nodata,
            values: vec![nodata; len],
            sums,
            counts,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Fold the next array (higher priority than all before it).
    pub fn push(&mut self, data: &[f32]) -> Result<()> {
        if data.len() != self.values.len() {
            return Err(GridProcessorError::configuration(format!(
                "cannot fuse array of {} pixels into {}",
                data.len(),
                self.values.len()
            )));
        }

        let nodata = self.nodata;
        match self.policy {
            FusionPolicy::Overwrite => {
                for (acc, &v) in self.values.iter_mut().zip(data) {
                    if is_valid(v, nodata) {
                        *acc = v;
                    }
                }
            }
            FusionPolicy::Mean => {
                for ((sum, count), &v) in self.sums.iter_mut().zip(self.counts.iter_mut()).zip(data) {
                    if is_valid(v, nodata) {
                        *sum += v as f64;
                        *count += 1;
                    }
                }
            }
            FusionPolicy::Min => {
                for (acc, &v) in self.values.iter_mut().zip(data) {
                    if is_valid(v, nodata) && (!is_valid(*acc, nodata) || v < *acc) {
                        *acc = v;
                    }
                }
            }
            FusionPolicy::Max => {
                for (acc, &v) in self.values.iter_mut().zip(data) {
                    if is_valid(v, nodata) && (!is_valid(*acc, nodata) || v > *acc) {
                        *acc = v;
                    }
                }
            }
        }
        Ok(())
    }

    pub fn finish(self) -> Vec<f32> {
        match self.policy {
            FusionPolicy::Mean => {
                let nodata = self.nodata;
                self.sums
                    .iter()
                    .zip(&self.counts)
                    .map(|(&sum, &count)| {
                        if count == 0 {
                            nodata
                        } else {
                            (sum / count as f64) as f32
                        }
                    })
                    .collect()
            }
            _ => self.values,
        }
    }
}

/// Fuse ordered arrays (lowest priority first) into one.
pub fn fuse<'a, I>(arrays: I, len: usize, nodata: f32, policy: FusionPolicy) -> Result<Vec<f32>>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut acc = FusionAccumulator::new(policy, len, nodata);
    for array in arrays {
        acc.push(array)?;
    }
    Ok(acc.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ND: f32 = -999.0;

    fn run(policy: FusionPolicy, arrays: &[&[f32]]) -> Vec<f32> {
        fuse(arrays.iter().copied(), arrays[0].len(), ND, policy).unwrap()
    }

    #[test]
    fn test_overwrite_later_wins_where_valid() {
        let low: &[f32] = &[1.0, 1.0, ND, ND];
        let high: &[f32] = &[2.0, ND, 2.0, ND];
        assert_eq!(run(FusionPolicy::Overwrite, &[low, high]), vec![2.0, 1.0, 2.0, ND]);
    }

    #[test]
    fn test_mean_min_max() {
        let a: &[f32] = &[1.0, ND, 4.0];
        let b: &[f32] = &[3.0, ND, ND];
        assert_eq!(run(FusionPolicy::Mean, &[a, b]), vec![2.0, ND, 4.0]);
        assert_eq!(run(FusionPolicy::Min, &[a, b]), vec![1.0, ND, 4.0]);
        assert_eq!(run(FusionPolicy::Max, &[a, b]), vec![3.0, ND, 4.0]);
    }

    #[test]
    fn test_nan_nodata() {
        let a: &[f32] = &[f32::NAN, 1.0];
        let b: &[f32] = &[5.0, f32::NAN];
        let out = fuse([a, b], 2, f32::NAN, FusionPolicy::Overwrite).unwrap();
        assert_eq!(out, vec![5.0, 1.0]);

        let none = fuse([a], 2, f32::NAN, FusionPolicy::Min).unwrap();
        assert!(none[0].is_nan());
    }

    #[test]
    fn test_nodata_iff_all_nodata() {
        let arrays: [&[f32]; 3] = [&[ND, 1.0, ND], &[ND, ND, ND], &[ND, ND, 7.0]];
        for policy in [FusionPolicy::Overwrite, FusionPolicy::Mean, FusionPolicy::Min, FusionPolicy::Max] {
            let out = run(policy, &arrays);
            assert_eq!(out[0], ND, "{}", policy);
            assert_ne!(out[1], ND, "{}", policy);
            assert_ne!(out[2], ND, "{}", policy);
        }
    }

    #[test]
    fn test_deterministic() {
        let a: Vec<f32> = (0..100).map(|i| i as f32 * 0.1).collect();
        let b: Vec<f32> = (0..100).map(|i| if i % 3 == 0 { ND } else { i as f32 * 0.7 }).collect();
        for policy in [FusionPolicy::Overwrite, FusionPolicy::Mean] {
            let first = run(policy, &[a.as_slice(), b.as_slice()]);
            let second = run(policy, &[a.as_slice(), b.as_slice()]);
            let bits = |v: &[f32]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
            assert_eq!(bits(&first), bits(&second));
        }
    }

    #[test]
    fn test_length_mismatch() {
        let mut acc = FusionAccumulator::new(FusionPolicy::Overwrite, 3, ND);
        assert!(acc.push(&[1.0]).is_err());
    }
}
