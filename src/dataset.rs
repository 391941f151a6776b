use crate::error::{DownsampleError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use ndarray::ArrayD;

/// Attribute metadata attached to a variable or coordinate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VarAttrs {
    pub units: Option<String>,
    pub long_name: Option<String>,
}

impl VarAttrs {
    pub fn new(units: impl Into<String>, long_name: impl Into<String>) -> Self {
        Self {
            units: Some(units.into()),
            long_name: Some(long_name.into()),
        }
    }
}

/// A named gridded variable with time on axis 0.
#[derive(Debug, Clone)]
pub struct GridVariable {
    pub name: String,
    pub data: ArrayD<f64>,
    pub attrs: VarAttrs,
}

/// A spatial coordinate axis (e.g. latitude, longitude).
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialCoord {
    pub name: String,
    pub values: Vec<f64>,
    pub attrs: VarAttrs,
}

impl SpatialCoord {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
            attrs: VarAttrs::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// An in-memory time series of gridded variables sharing one time coordinate.
///
/// Invariants: the time coordinate is non-empty and strictly increasing, and
/// every variable's shape is `[times.len(), coords[0].len(), ...]`. Variables
/// keep insertion order.
#[derive(Debug, Clone)]
pub struct GridDataset {
    times: Vec<DateTime<Utc>>,
    coords: Vec<SpatialCoord>,
    variables: Vec<GridVariable>,
}

impl GridDataset {
    pub fn new(times: Vec<DateTime<Utc>>, coords: Vec<SpatialCoord>) -> Result<Self> {
        if times.is_empty() {
            return Err(DownsampleError::Validation(
                "time coordinate is empty".to_string(),
            ));
        }
        if let Some(w) = times.windows(2).find(|w| w[0] >= w[1]) {
            return Err(DownsampleError::Validation(format!(
                "time coordinate is not strictly increasing at {} -> {}",
                w[0], w[1]
            )));
        }
        Ok(Self {
            times,
            coords,
            variables: Vec::new(),
        })
    }

    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    pub fn n_times(&self) -> usize {
        self.times.len()
    }

    pub fn coords(&self) -> &[SpatialCoord] {
        &self.coords
    }

    pub fn spatial_shape(&self) -> Vec<usize> {
        self.coords.iter().map(|c| c.len()).collect()
    }

    /// Full shape every variable must have: `[n_times, spatial dims...]`.
    pub fn expected_shape(&self) -> Vec<usize> {
        let mut shape = vec![self.times.len()];
        shape.extend(self.spatial_shape());
        shape
    }

    /// Calendar date of the earliest sample.
    pub fn start_date(&self) -> NaiveDate {
        self.times[0].date_naive()
    }

    /// Calendar date of the latest sample.
    pub fn end_date(&self) -> NaiveDate {
        self.times[self.times.len() - 1].date_naive()
    }

    pub fn variables(&self) -> &[GridVariable] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&GridVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.iter().map(|v| v.name.as_str()).collect()
    }

    pub fn contains_variable(&self, name: &str) -> bool {
        self.variable(name).is_some()
    }

    /// Add a variable, enforcing the shared-shape invariant.
    pub fn add_variable(&mut self, name: impl Into<String>, data: ArrayD<f64>, attrs: VarAttrs) -> Result<()> {
        let name = name.into();
        let expected = self.expected_shape();
        if data.shape() != expected.as_slice() {
            return Err(DownsampleError::ShapeMismatch {
                expected,
                found: data.shape().to_vec(),
            });
        }
        if self.contains_variable(&name) {
            return Err(DownsampleError::Validation(format!(
                "variable {} already present in dataset",
                name
            )));
        }
        self.variables.push(GridVariable { name, data, attrs });
        Ok(())
    }

    /// Add a variable, replacing any existing one with the same name.
    pub fn insert_variable(&mut self, name: impl Into<String>, data: ArrayD<f64>, attrs: VarAttrs) -> Result<()> {
        let name = name.into();
        self.variables.retain(|v| v.name != name);
        self.add_variable(name, data, attrs)
    }
}
