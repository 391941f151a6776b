use crate::dataset::{GridDataset, VarAttrs};
use crate::error::{DownsampleError, Result};
use ndarray::ArrayD;
use tracing::debug;

/// Units attached to every derived wind-speed variable.
pub const WIND_SPEED_UNITS: &str = "m s**-1";

/// Element-wise wind speed `sqrt(u^2 + v^2)` from orthogonal components.
///
/// The two arrays must have identical shape; there is no broadcasting.
pub fn wind_speed(u: &ArrayD<f64>, v: &ArrayD<f64>) -> Result<ArrayD<f64>> {
    if u.shape() != v.shape() {
        return Err(DownsampleError::ShapeMismatch {
            expected: u.shape().to_vec(),
            found: v.shape().to_vec(),
        });
    }
    Ok((u * u + v * v).mapv(f64::sqrt))
}

/// Canonical name for a derived wind-speed variable: the directional prefix
/// of the u-component name is stripped and `ws` prepended (`u10` -> `ws10`).
pub fn derived_name(u_name: &str) -> String {
    format!("ws{}", component_suffix(u_name))
}

fn component_suffix(name: &str) -> &str {
    let mut chars = name.chars();
    match chars.next() {
        Some(_) => chars.as_str(),
        None => name,
    }
}

/// Compute wind speed from two component variables and insert it into the
/// dataset under the canonical derived name, with fixed units and a
/// descriptive long name. Returns the derived variable's name.
pub fn derive_wind_speed(ds: &mut GridDataset, u_name: &str, v_name: &str) -> Result<String> {
    let u = ds
        .variable(u_name)
        .ok_or_else(|| {
            DownsampleError::Validation(format!("wind component {} not found in dataset", u_name))
        })?
        .data
        .clone();
    let v = ds
        .variable(v_name)
        .ok_or_else(|| {
            DownsampleError::Validation(format!("wind component {} not found in dataset", v_name))
        })?
        .data
        .clone();

    let speed = wind_speed(&u, &v)?;
    let name = derived_name(u_name);
    let attrs = VarAttrs::new(
        WIND_SPEED_UNITS,
        format!("{}-meter wind speed", component_suffix(u_name)),
    );
    debug!(u = u_name, v = v_name, derived = %name, "derived wind speed");
    ds.insert_variable(name.clone(), speed, attrs)?;
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::GridDataset;
    use chrono::{DateTime, TimeZone, Utc};

    fn times(n: usize) -> Vec<DateTime<Utc>> {
        (0..n)
            .map(|h| Utc.with_ymd_and_hms(2000, 3, 1, h as u32, 0, 0).unwrap())
            .collect()
    }

    #[test]
    fn test_wind_speed_pythagorean() {
        let u = ArrayD::from_elem(vec![2, 2], 3.0);
        let v = ArrayD::from_elem(vec![2, 2], 4.0);
        let ws = wind_speed(&u, &v).unwrap();
        for x in ws.iter() {
            assert!((x - 5.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_wind_speed_shape_mismatch() {
        let u = ArrayD::from_elem(vec![2, 2], 1.0);
        let v = ArrayD::from_elem(vec![2, 3], 1.0);
        let err = wind_speed(&u, &v).unwrap_err();
        assert!(matches!(err, DownsampleError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_derived_name_rule() {
        assert_eq!(derived_name("u10"), "ws10");
        assert_eq!(derived_name("u100"), "ws100");
        // A bare component name has an empty suffix.
        assert_eq!(derived_name("u"), "ws");
    }

    #[test]
    fn test_derive_inserts_variable_with_attrs() {
        let mut ds = GridDataset::new(times(2), vec![]).unwrap();
        ds.add_variable("u10", ArrayD::from_elem(vec![2], 3.0), VarAttrs::new("m s**-1", "u"))
            .unwrap();
        ds.add_variable("v10", ArrayD::from_elem(vec![2], 4.0), VarAttrs::new("m s**-1", "v"))
            .unwrap();

        let name = derive_wind_speed(&mut ds, "u10", "v10").unwrap();
        assert_eq!(name, "ws10");
        let var = ds.variable("ws10").unwrap();
        assert_eq!(var.attrs.units.as_deref(), Some(WIND_SPEED_UNITS));
        assert_eq!(var.attrs.long_name.as_deref(), Some("10-meter wind speed"));
        assert!((var.data[[0]] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_derive_missing_component() {
        let mut ds = GridDataset::new(times(2), vec![]).unwrap();
        ds.add_variable("u10", ArrayD::from_elem(vec![2], 1.0), VarAttrs::default())
            .unwrap();
        assert!(derive_wind_speed(&mut ds, "u10", "v10").is_err());
    }
}
