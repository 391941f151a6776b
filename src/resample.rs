use crate::aggregate::concat_datasets;
use crate::data_io::{read_dataset, write_dataset};
use crate::dataset::GridDataset;
use crate::derive::{derive_wind_speed, derived_name};
use crate::error::{DownsampleError, Result};
use crate::naming::output_file_name;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike, Utc};
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, Slice};
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Target time resolution for resampling: fixed-width, calendar-aligned
/// windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeResolution {
    Hourly,
    Daily,
    Monthly,
    Yearly,
}

impl TimeResolution {
    /// Short label used in specs and output file names.
    pub fn label(&self) -> &'static str {
        match self {
            TimeResolution::Hourly => "1H",
            TimeResolution::Daily => "1D",
            TimeResolution::Monthly => "1M",
            TimeResolution::Yearly => "1Y",
        }
    }

    /// Minimum width of one window in seconds (28-day month, 365-day year).
    fn min_width_secs(&self) -> i64 {
        match self {
            TimeResolution::Hourly => 3600,
            TimeResolution::Daily => 86_400,
            TimeResolution::Monthly => 28 * 86_400,
            TimeResolution::Yearly => 365 * 86_400,
        }
    }

    /// Minimum time span a dataset must cover to be resampled to this
    /// resolution: two windows of the next finer calendar unit. A single
    /// day of data cannot be reduced to a monthly value, while a partial
    /// year of daily data can still close out its year.
    fn min_span_secs(&self) -> i64 {
        match self {
            TimeResolution::Hourly => 120,
            TimeResolution::Daily => 2 * 3600,
            TimeResolution::Monthly => 2 * 86_400,
            TimeResolution::Yearly => 56 * 86_400,
        }
    }

    /// Start of the window containing `t`.
    pub fn window_start(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let date = t.date_naive();
        match self {
            TimeResolution::Hourly => {
                let hour = NaiveTime::from_hms_opt(t.hour(), 0, 0).expect("valid hour");
                date.and_time(hour).and_utc()
            }
            TimeResolution::Daily => date.and_time(NaiveTime::MIN).and_utc(),
            TimeResolution::Monthly => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
                .expect("valid month start")
                .and_time(NaiveTime::MIN)
                .and_utc(),
            TimeResolution::Yearly => NaiveDate::from_ymd_opt(date.year(), 1, 1)
                .expect("valid year start")
                .and_time(NaiveTime::MIN)
                .and_utc(),
        }
    }
}

impl FromStr for TimeResolution {
    type Err = DownsampleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "1H" | "HOURLY" => Ok(TimeResolution::Hourly),
            "1D" | "DAILY" => Ok(TimeResolution::Daily),
            "1M" | "MONTHLY" => Ok(TimeResolution::Monthly),
            "1Y" | "YEARLY" => Ok(TimeResolution::Yearly),
            _ => Err(DownsampleError::Resolution(format!(
                "unknown time resolution label: {}",
                s
            ))),
        }
    }
}

/// Reduction applied within each window, independently per variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Max,
    Mean,
}

impl ReduceOp {
    pub fn label(&self) -> &'static str {
        match self {
            ReduceOp::Sum => "sum",
            ReduceOp::Max => "max",
            ReduceOp::Mean => "mean",
        }
    }
}

impl FromStr for ReduceOp {
    type Err = DownsampleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sum" => Ok(ReduceOp::Sum),
            "max" => Ok(ReduceOp::Max),
            "mean" => Ok(ReduceOp::Mean),
            _ => Err(DownsampleError::VariableSpec(format!(
                "unknown reduction operator: {}",
                s
            ))),
        }
    }
}

/// What a spec entry reduces: an existing variable, or wind speed derived
/// from two orthogonal components before reduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableSource {
    Field(String),
    WindComponents { u: String, v: String },
}

#[derive(Debug, Clone)]
pub struct VariableSpec {
    pub source: VariableSource,
    pub op: ReduceOp,
}

/// One resampling request: ordered variable specs, a target resolution and
/// the labels appended to output file names.
#[derive(Debug, Clone)]
pub struct ResamplingSpec {
    pub variables: Vec<VariableSpec>,
    pub resolution: TimeResolution,
    pub output_labels: Vec<String>,
}

impl ResamplingSpec {
    pub fn new(
        variables: Vec<VariableSpec>,
        resolution: TimeResolution,
        output_labels: Vec<String>,
    ) -> Self {
        Self {
            variables,
            resolution,
            output_labels,
        }
    }

    /// Build a spec from parallel variable and operator-name lists.
    /// The lists must have equal length and every operator name must be
    /// one of `sum`, `max`, `mean`.
    pub fn from_lists(
        sources: Vec<VariableSource>,
        op_names: &[&str],
        resolution: TimeResolution,
        output_labels: Vec<String>,
    ) -> Result<Self> {
        if sources.len() != op_names.len() {
            return Err(DownsampleError::VariableSpec(format!(
                "{} variables but {} operators",
                sources.len(),
                op_names.len()
            )));
        }
        let variables = sources
            .into_iter()
            .zip(op_names)
            .map(|(source, op)| {
                Ok(VariableSpec {
                    source,
                    op: op.parse()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(variables, resolution, output_labels))
    }
}

/// Re-bin one dataset's time axis into fixed-width windows at the target
/// resolution, applying each spec entry's reduction per window.
///
/// Wind-component entries are derived into the dataset first and reduced
/// under their derived name. Plain variables carry their original attributes
/// forward; derived variables keep the attributes assigned at derivation.
/// Output windows are labeled by window start.
pub fn resample(ds: &GridDataset, spec: &ResamplingSpec) -> Result<GridDataset> {
    if spec.variables.is_empty() {
        return Err(DownsampleError::VariableSpec(
            "resampling spec has no variables".to_string(),
        ));
    }

    let needs_derive = spec
        .variables
        .iter()
        .any(|v| matches!(v.source, VariableSource::WindComponents { .. }));
    let mut work_storage;
    let work: &GridDataset = if needs_derive {
        work_storage = ds.clone();
        for entry in &spec.variables {
            if let VariableSource::WindComponents { u, v } = &entry.source {
                derive_wind_speed(&mut work_storage, u, v)?;
            }
        }
        &work_storage
    } else {
        ds
    };

    check_resolution(work.times(), spec.resolution)?;
    let windows = build_windows(work.times(), spec.resolution);
    let out_times: Vec<DateTime<Utc>> = windows.iter().map(|(start, _)| *start).collect();
    let mut out = GridDataset::new(out_times, work.coords().to_vec())?;

    for entry in &spec.variables {
        let name = match &entry.source {
            VariableSource::Field(name) => name.clone(),
            VariableSource::WindComponents { u, .. } => derived_name(u),
        };
        let var = work.variable(&name).ok_or_else(|| {
            DownsampleError::Validation(format!("variable {} not found in dataset", name))
        })?;

        let mut shape = vec![windows.len()];
        shape.extend(work.spatial_shape());
        let mut data = ArrayD::<f64>::zeros(IxDyn(&shape));
        for (w, (_, range)) in windows.iter().enumerate() {
            let slice = var.data.slice_axis(Axis(0), Slice::from(range.clone()));
            let reduced = reduce_window(&slice, entry.op);
            data.index_axis_mut(Axis(0), w).assign(&reduced);
        }
        debug!(
            variable = %name,
            op = entry.op.label(),
            windows = windows.len(),
            "reduced variable"
        );
        out.add_variable(name, data, var.attrs.clone())?;
    }

    Ok(out)
}

/// Resample each input file and concatenate the results into one output
/// file named by the combined series' span. An empty input list is a no-op
/// and produces nothing.
pub fn resample_files(
    paths: &[PathBuf],
    spec: &ResamplingSpec,
    output_dir: &Path,
    tag: &str,
) -> Result<Option<PathBuf>> {
    if paths.is_empty() {
        debug!("no input files, nothing to resample");
        return Ok(None);
    }
    let mut reduced = Vec::with_capacity(paths.len());
    for path in paths {
        let ds = read_dataset(path)?;
        reduced.push(resample(&ds, spec)?);
    }
    let combined = concat_datasets(reduced)?;
    let name = output_file_name(
        combined.start_date(),
        combined.end_date(),
        spec.resolution.label(),
        tag,
        &spec.output_labels,
    );
    fs::create_dir_all(output_dir)?;
    let out_path = output_dir.join(name);
    write_dataset(&combined, &out_path)?;
    info!(
        inputs = paths.len(),
        output = %out_path.display(),
        resolution = spec.resolution.label(),
        "resampled file group"
    );
    Ok(Some(out_path))
}

/// Both resampling preconditions: strictly coarser than the sampling
/// interval, and no coarser than the covered time span.
fn check_resolution(times: &[DateTime<Utc>], res: TimeResolution) -> Result<()> {
    if times.len() < 2 {
        return Err(DownsampleError::Resolution(
            "cannot infer a sampling interval from fewer than two time samples".to_string(),
        ));
    }
    let mut min_delta = i64::MAX;
    let mut max_delta = i64::MIN;
    for pair in times.windows(2) {
        let delta = (pair[1] - pair[0]).num_seconds();
        min_delta = min_delta.min(delta);
        max_delta = max_delta.max(delta);
    }
    if min_delta >= res.min_width_secs() {
        return Err(DownsampleError::Resolution(format!(
            "target resolution {} is not strictly coarser than the input sampling interval",
            res.label()
        )));
    }
    let covered = (times[times.len() - 1] - times[0]).num_seconds() + max_delta;
    if covered < res.min_span_secs() {
        return Err(DownsampleError::Resolution(format!(
            "target resolution {} is coarser than the dataset's total time span",
            res.label()
        )));
    }
    Ok(())
}

/// Group a sorted time axis into contiguous index ranges per window.
fn build_windows(
    times: &[DateTime<Utc>],
    res: TimeResolution,
) -> Vec<(DateTime<Utc>, Range<usize>)> {
    let mut windows: Vec<(DateTime<Utc>, Range<usize>)> = Vec::new();
    for (i, t) in times.iter().enumerate() {
        let start = res.window_start(*t);
        match windows.last_mut() {
            Some((prev, range)) if *prev == start => range.end = i + 1,
            _ => windows.push((start, i..i + 1)),
        }
    }
    windows
}

fn reduce_window(slice: &ArrayViewD<f64>, op: ReduceOp) -> ArrayD<f64> {
    match op {
        ReduceOp::Sum => slice.sum_axis(Axis(0)),
        ReduceOp::Max => slice.fold_axis(Axis(0), f64::NEG_INFINITY, |acc, x| acc.max(*x)),
        ReduceOp::Mean => {
            let n = slice.len_of(Axis(0)) as f64;
            let mut sum = slice.sum_axis(Axis(0));
            sum.mapv_inplace(|x| x / n);
            sum
        }
    }
}
