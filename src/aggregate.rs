use crate::data_io::{read_dataset, write_dataset};
use crate::dataset::GridDataset;
use crate::error::{DownsampleError, Result};
use ndarray::{ArrayViewD, Axis};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Concatenate datasets along the time axis, in the order given.
///
/// Every input must carry the same variables in the same order, over the
/// same spatial coordinates, and the combined time axis must be strictly
/// increasing. Per-variable attributes are taken from the first input.
pub fn concat_datasets(datasets: Vec<GridDataset>) -> Result<GridDataset> {
    let first = datasets.first().ok_or_else(|| {
        DownsampleError::Validation("no datasets to concatenate".to_string())
    })?;
    let names: Vec<String> = first
        .variable_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    for ds in &datasets[1..] {
        if ds.variable_names() != first.variable_names() {
            return Err(DownsampleError::Validation(format!(
                "inconsistent variable sets: {:?} vs {:?}",
                first.variable_names(),
                ds.variable_names()
            )));
        }
        if ds.coords() != first.coords() {
            return Err(DownsampleError::Validation(
                "inconsistent spatial coordinates between inputs".to_string(),
            ));
        }
    }

    let mut times = Vec::new();
    for ds in &datasets {
        times.extend_from_slice(ds.times());
    }
    if let Some(pair) = times.windows(2).find(|pair| pair[0] >= pair[1]) {
        return Err(DownsampleError::Validation(format!(
            "inputs out of time order or overlapping at {} -> {}; sort inputs by date",
            pair[0], pair[1]
        )));
    }

    let coords = first.coords().to_vec();
    let mut out = GridDataset::new(times, coords)?;
    for name in &names {
        let mut views: Vec<ArrayViewD<f64>> = Vec::with_capacity(datasets.len());
        let mut attrs = None;
        for ds in &datasets {
            let var = ds.variable(name).ok_or_else(|| {
                DownsampleError::Validation(format!("variable {} missing during concatenation", name))
            })?;
            if attrs.is_none() {
                attrs = Some(var.attrs.clone());
            }
            views.push(var.data.view());
        }
        let data = ndarray::concatenate(Axis(0), &views).map_err(|e| {
            DownsampleError::Validation(format!("concatenation failed for {}: {}", name, e))
        })?;
        out.add_variable(name.clone(), data, attrs.unwrap_or_default())?;
    }
    debug!(
        inputs = datasets.len(),
        n_times = out.n_times(),
        "concatenated datasets"
    );
    Ok(out)
}

/// Read a list of files, concatenate them along time and write the result
/// to `output`. Inputs must already be sorted by date; out-of-order or
/// overlapping inputs are rejected rather than reordered silently.
pub fn aggregate_files(paths: &[PathBuf], output: &Path) -> Result<GridDataset> {
    if paths.is_empty() {
        return Err(DownsampleError::Validation(
            "no input files to aggregate".to_string(),
        ));
    }
    let mut datasets = Vec::with_capacity(paths.len());
    for path in paths {
        datasets.push(read_dataset(path)?);
    }
    let combined = concat_datasets(datasets)?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    write_dataset(&combined, output)?;
    info!(
        inputs = paths.len(),
        output = %output.display(),
        "aggregated files"
    );
    Ok(combined)
}

/// Collapse the time axis to its mean, keeping a singleton time dimension
/// labeled by the first timestamp. Attributes are preserved.
pub fn long_term_mean(ds: &GridDataset) -> Result<GridDataset> {
    let n = ds.n_times() as f64;
    let times = vec![ds.times()[0]];
    let mut out = GridDataset::new(times, ds.coords().to_vec())?;
    for var in ds.variables() {
        let mut mean = var.data.sum_axis(Axis(0));
        mean.mapv_inplace(|x| x / n);
        out.add_variable(var.name.clone(), mean.insert_axis(Axis(0)), var.attrs.clone())?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{SpatialCoord, VarAttrs};
    use chrono::{DateTime, TimeZone, Utc};
    use ndarray::ArrayD;

    fn times_from(day: u32, n: usize) -> Vec<DateTime<Utc>> {
        (0..n)
            .map(|h| {
                Utc.with_ymd_and_hms(2000, 1, day, 0, 0, 0).unwrap()
                    + chrono::Duration::hours(h as i64)
            })
            .collect()
    }

    fn dataset(day: u32, n: usize, value: f64) -> GridDataset {
        let coords = vec![SpatialCoord::new("latitude", vec![1.0, 2.0])];
        let mut ds = GridDataset::new(times_from(day, n), coords).unwrap();
        ds.add_variable(
            "tp",
            ArrayD::from_elem(vec![n, 2], value),
            VarAttrs::new("m", "Total precipitation"),
        )
        .unwrap();
        ds
    }

    #[test]
    fn test_concat_preserves_order_and_attrs() {
        let out = concat_datasets(vec![dataset(1, 3, 1.0), dataset(2, 2, 2.0)]).unwrap();
        assert_eq!(out.n_times(), 5);
        let var = out.variable("tp").unwrap();
        assert_eq!(var.data.shape(), &[5, 2]);
        assert!((var.data[[0, 0]] - 1.0).abs() < 1e-12);
        assert!((var.data[[4, 1]] - 2.0).abs() < 1e-12);
        assert_eq!(var.attrs.units.as_deref(), Some("m"));
    }

    #[test]
    fn test_concat_rejects_out_of_order_inputs() {
        let err = concat_datasets(vec![dataset(2, 2, 1.0), dataset(1, 2, 1.0)]).unwrap_err();
        assert!(matches!(err, DownsampleError::Validation(_)));
    }

    #[test]
    fn test_concat_rejects_mismatched_variables() {
        let a = dataset(1, 2, 1.0);
        let mut b = dataset(2, 2, 1.0);
        b.add_variable("u10", ArrayD::from_elem(vec![2, 2], 0.0), VarAttrs::default())
            .unwrap();
        let err = concat_datasets(vec![a, b]).unwrap_err();
        assert!(matches!(err, DownsampleError::Validation(_)));
    }

    #[test]
    fn test_concat_rejects_mismatched_coords() {
        let a = dataset(1, 2, 1.0);
        let mut b = GridDataset::new(
            times_from(2, 2),
            vec![SpatialCoord::new("latitude", vec![3.0, 4.0])],
        )
        .unwrap();
        b.add_variable(
            "tp",
            ArrayD::from_elem(vec![2, 2], 1.0),
            VarAttrs::default(),
        )
        .unwrap();
        let err = concat_datasets(vec![a, b]).unwrap_err();
        assert!(matches!(err, DownsampleError::Validation(_)));
    }

    #[test]
    fn test_concat_rejects_empty_input() {
        assert!(matches!(
            concat_datasets(Vec::new()).unwrap_err(),
            DownsampleError::Validation(_)
        ));
    }

    #[test]
    fn test_long_term_mean_collapses_time() {
        let mut ds = GridDataset::new(times_from(1, 4), vec![]).unwrap();
        ds.add_variable(
            "tp",
            ArrayD::from_shape_vec(vec![4], vec![1.0, 2.0, 3.0, 6.0]).unwrap(),
            VarAttrs::new("m", "Total precipitation"),
        )
        .unwrap();
        let out = long_term_mean(&ds).unwrap();
        assert_eq!(out.n_times(), 1);
        let var = out.variable("tp").unwrap();
        assert_eq!(var.data.shape(), &[1]);
        assert!((var.data[[0]] - 3.0).abs() < 1e-12);
        assert_eq!(var.attrs.long_name.as_deref(), Some("Total precipitation"));
    }
}
