use super::parse_time_units;
use crate::dataset::{GridDataset, SpatialCoord, VarAttrs};
use crate::error::{DownsampleError, Result};
use chrono::Duration;
use ndarray::{ArrayD, IxDyn};
use std::path::Path;
use tracing::debug;

/// Load a netCDF file into a [`GridDataset`].
///
/// The file must carry a `time` coordinate with CF "units since epoch"
/// metadata; every data variable must have `time` as its leading dimension
/// and all data variables must share the same dimension list. Spatial
/// coordinate variables and per-variable attributes are carried along.
pub fn read_dataset(path: &Path) -> Result<GridDataset> {
    if !path.exists() {
        return Err(DownsampleError::Validation(format!(
            "input file does not exist: {}",
            path.display()
        )));
    }
    let file = netcdf::open(path)?;

    let time_var = file.variable("time").ok_or_else(|| {
        DownsampleError::Validation(format!("{}: missing time coordinate", path.display()))
    })?;
    let units = attr_string(&time_var, "units").ok_or_else(|| {
        DownsampleError::Validation(format!(
            "{}: time coordinate has no units attribute",
            path.display()
        ))
    })?;
    let (unit_secs, epoch) = parse_time_units(&units)?;
    let raw_times: Vec<f64> = time_var.get_values(..)?;
    let times = raw_times
        .iter()
        .map(|v| epoch + Duration::milliseconds((v * unit_secs as f64 * 1000.0).round() as i64))
        .collect();

    // Data variables: leading dimension is time, excluding coordinates.
    let mut data_vars = Vec::new();
    for var in file.variables() {
        if var.name() == "time" {
            continue;
        }
        let dims = var.dimensions();
        if dims.is_empty() || dims[0].name() != "time" {
            continue;
        }
        data_vars.push(var);
    }
    if data_vars.is_empty() {
        return Err(DownsampleError::Validation(format!(
            "{}: no time-indexed data variables",
            path.display()
        )));
    }

    let dim_names: Vec<String> = data_vars[0]
        .dimensions()
        .iter()
        .map(|d| d.name().to_string())
        .collect();
    for var in &data_vars {
        let names: Vec<String> = var
            .dimensions()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        if names != dim_names {
            return Err(DownsampleError::Validation(format!(
                "{}: variable {} has dimensions {:?}, expected {:?}",
                path.display(),
                var.name(),
                names,
                dim_names
            )));
        }
    }

    // Spatial coordinates, with values from matching coordinate variables
    // where present.
    let mut coords = Vec::new();
    for dim in data_vars[0].dimensions().iter().skip(1) {
        let name = dim.name().to_string();
        let coord = match file.variable(&name) {
            Some(coord_var) => {
                let values: Vec<f64> = coord_var.get_values(..)?;
                SpatialCoord {
                    name: name.clone(),
                    values,
                    attrs: VarAttrs {
                        units: attr_string(&coord_var, "units"),
                        long_name: attr_string(&coord_var, "long_name"),
                    },
                }
            }
            None => SpatialCoord::new(name.clone(), (0..dim.len()).map(|i| i as f64).collect()),
        };
        coords.push(coord);
    }

    let mut ds = GridDataset::new(times, coords)?;
    for var in &data_vars {
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let raw: Vec<f64> = var.get_values(..)?;
        let data = ArrayD::from_shape_vec(IxDyn(&shape), raw).map_err(|e| {
            DownsampleError::Validation(format!(
                "{}: variable {}: {}",
                path.display(),
                var.name(),
                e
            ))
        })?;
        let attrs = VarAttrs {
            units: attr_string(var, "units"),
            long_name: attr_string(var, "long_name"),
        };
        ds.add_variable(var.name(), data, attrs)?;
    }

    debug!(
        path = %path.display(),
        n_times = ds.n_times(),
        variables = ?ds.variable_names(),
        "read dataset"
    );
    Ok(ds)
}

fn attr_string(var: &netcdf::Variable, name: &str) -> Option<String> {
    match var.attribute(name)?.value() {
        Ok(netcdf::AttributeValue::Str(s)) => Some(s),
        _ => None,
    }
}
