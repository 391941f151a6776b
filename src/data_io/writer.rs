use super::{time_epoch, TIME_UNITS};
use crate::dataset::GridDataset;
use crate::error::{DownsampleError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Write a [`GridDataset`] to a netCDF file.
///
/// The data is written to a temporary sibling path and renamed into place,
/// so the output either appears complete or not at all. An existing file at
/// `path` is superseded atomically, never mutated in place.
pub fn write_dataset(ds: &GridDataset, path: &Path) -> Result<()> {
    let tmp = tmp_path(path);
    if let Err(e) = write_to(ds, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path).map_err(|e| DownsampleError::Write {
        path: path.to_path_buf(),
        reason: format!("rename failed: {}", e),
    })?;
    debug!(path = %path.display(), n_times = ds.n_times(), "wrote dataset");
    Ok(())
}

/// Check that a previously-written output opens and carries a non-empty
/// time coordinate. Used to gate input cleanup.
pub fn verify_readable(path: &Path) -> Result<()> {
    let fail = |reason: String| DownsampleError::Write {
        path: path.to_path_buf(),
        reason,
    };
    let file = netcdf::open(path).map_err(|e| fail(format!("verification failed: {}", e)))?;
    let time_var = file
        .variable("time")
        .ok_or_else(|| fail("verification failed: missing time coordinate".to_string()))?;
    let values: Vec<f64> = time_var
        .get_values(..)
        .map_err(|e| fail(format!("verification failed: {}", e)))?;
    if values.is_empty() {
        return Err(fail("verification failed: empty time coordinate".to_string()));
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_to(ds: &GridDataset, path: &Path) -> Result<()> {
    let fail = |reason: String| DownsampleError::Write {
        path: path.to_path_buf(),
        reason,
    };

    let mut file = netcdf::create(path).map_err(|e| fail(format!("create failed: {}", e)))?;

    file.add_attribute("Conventions", "CF-1.6")
        .map_err(|e| fail(format!("global attribute: {}", e)))?;
    file.add_attribute("source", "era5_downsample")
        .map_err(|e| fail(format!("global attribute: {}", e)))?;
    // Versioned instead of timestamped, so re-running a period rewrites
    // byte-identical metadata.
    let history = format!(
        "Created by era5_downsample {}",
        env!("CARGO_PKG_VERSION")
    );
    file.add_attribute("history", history)
        .map_err(|e| fail(format!("global attribute: {}", e)))?;

    file.add_dimension("time", ds.n_times())
        .map_err(|e| fail(format!("time dimension: {}", e)))?;
    for coord in ds.coords() {
        file.add_dimension(&coord.name, coord.len())
            .map_err(|e| fail(format!("dimension {}: {}", coord.name, e)))?;
    }

    // Time coordinate variable.
    {
        let mut time_var = file
            .add_variable::<f64>("time", &["time"])
            .map_err(|e| fail(format!("time variable: {}", e)))?;
        time_var
            .put_attribute("units", TIME_UNITS)
            .map_err(|e| fail(format!("time units: {}", e)))?;
        time_var
            .put_attribute("calendar", "gregorian")
            .map_err(|e| fail(format!("time calendar: {}", e)))?;
        time_var
            .put_attribute("long_name", "time")
            .map_err(|e| fail(format!("time long_name: {}", e)))?;
        let epoch = time_epoch();
        let hours: Vec<f64> = ds
            .times()
            .iter()
            .map(|t| (*t - epoch).num_seconds() as f64 / 3600.0)
            .collect();
        time_var
            .put_values(&hours, ..)
            .map_err(|e| fail(format!("time values: {}", e)))?;
    }

    // Spatial coordinate variables.
    for coord in ds.coords() {
        let mut var = file
            .add_variable::<f64>(&coord.name, &[&coord.name])
            .map_err(|e| fail(format!("coordinate {}: {}", coord.name, e)))?;
        if let Some(units) = &coord.attrs.units {
            var.put_attribute("units", units.as_str())
                .map_err(|e| fail(format!("coordinate {} units: {}", coord.name, e)))?;
        }
        if let Some(long_name) = &coord.attrs.long_name {
            var.put_attribute("long_name", long_name.as_str())
                .map_err(|e| fail(format!("coordinate {} long_name: {}", coord.name, e)))?;
        }
        var.put_values(&coord.values, ..)
            .map_err(|e| fail(format!("coordinate {} values: {}", coord.name, e)))?;
    }

    // Data variables, in dataset order.
    let mut dims: Vec<&str> = vec!["time"];
    dims.extend(ds.coords().iter().map(|c| c.name.as_str()));
    for variable in ds.variables() {
        let mut var = file
            .add_variable::<f64>(&variable.name, &dims)
            .map_err(|e| fail(format!("variable {}: {}", variable.name, e)))?;
        if let Some(units) = &variable.attrs.units {
            var.put_attribute("units", units.as_str())
                .map_err(|e| fail(format!("variable {} units: {}", variable.name, e)))?;
        }
        if let Some(long_name) = &variable.attrs.long_name {
            var.put_attribute("long_name", long_name.as_str())
                .map_err(|e| fail(format!("variable {} long_name: {}", variable.name, e)))?;
        }
        let flat: Vec<f64> = variable.data.iter().copied().collect();
        var.put_values(&flat, ..)
            .map_err(|e| fail(format!("variable {} values: {}", variable.name, e)))?;
    }

    Ok(())
}
