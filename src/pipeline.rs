use crate::aggregate::{aggregate_files, concat_datasets, long_term_mean};
use crate::data_io::{read_dataset, verify_readable, write_dataset};
use crate::error::{DownsampleError, Result};
use crate::naming::{mean_annual_file_name, output_file_name};
use crate::resample::{resample_files, ResamplingSpec};
use crate::time_utils::parse_leading_date;
use chrono::Datelike;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// A calendar span a stage processes as one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    YearMonth { year: i32, month: u32 },
    Year(i32),
    Years { start: i32, end: i32 },
}

impl Period {
    fn contains(&self, date: chrono::NaiveDate) -> bool {
        match self {
            Period::YearMonth { year, month } => {
                date.year() == *year && date.month() == *month
            }
            Period::Year(year) => date.year() == *year,
            Period::Years { start, end } => date.year() >= *start && date.year() <= *end,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Period::YearMonth { year, month } => format!("{}-{:02}", year, month),
            Period::Year(year) => format!("{}", year),
            Period::Years { start, end } => format!("{}-{}", start, end),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// List the `.nc` files in `dir` whose leading file-name date falls inside
/// `period`, sorted by that date (ties broken by name). A `.nc` file whose
/// name does not start with a date is an error, not a silent skip.
pub fn select_files(dir: &Path, period: &Period) -> Result<Vec<PathBuf>> {
    let mut selected: Vec<(chrono::NaiveDate, PathBuf)> = Vec::new();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("nc") {
            continue;
        }
        let file_name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        let date = parse_leading_date(file_name).ok_or_else(|| {
            DownsampleError::Validation(format!(
                "cannot parse a date from file name: {}",
                file_name
            ))
        })?;
        if period.contains(date) {
            selected.push((date, path));
        }
    }
    selected.sort();
    Ok(selected.into_iter().map(|(_, path)| path).collect())
}

/// What a stage does to each period's file group.
#[derive(Debug, Clone)]
pub enum StageOperation {
    /// Resample every file to a coarser resolution, then concatenate.
    Reduce(ResamplingSpec),
    /// Concatenate the files as they are, without reduction.
    Aggregate {
        resolution_label: String,
        output_labels: Vec<String>,
    },
}

#[derive(Debug, Clone)]
pub struct StageConfig {
    pub name: String,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub operation: StageOperation,
    /// Delete the period's input files once the output is written and
    /// verified readable.
    pub cleanup_inputs: bool,
    pub tag: String,
}

/// Progress marker for one period within a stage. On failure the outcome
/// records the last state reached, so a report shows how far the period got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Pending,
    Selecting,
    Reducing,
    Aggregating,
    Written,
    CleanedUp,
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageState::Pending => "pending",
            StageState::Selecting => "selecting",
            StageState::Reducing => "reducing",
            StageState::Aggregating => "aggregating",
            StageState::Written => "written",
            StageState::CleanedUp => "cleaned-up",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub struct PeriodOutcome {
    pub period: Period,
    pub state: StageState,
    pub output: Option<PathBuf>,
    pub error: Option<DownsampleError>,
}

impl PeriodOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug)]
pub struct StageReport {
    pub stage: String,
    pub outcomes: Vec<PeriodOutcome>,
}

impl StageReport {
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_ok()).count()
    }
}

/// A stage plus the periods it runs over.
#[derive(Debug, Clone)]
pub struct StagePlan {
    pub config: StageConfig,
    pub periods: Vec<Period>,
}

/// Run one stage over all its periods. A failing period is recorded in the
/// report and never stops the remaining periods.
pub fn run_stage(config: &StageConfig, periods: &[Period]) -> StageReport {
    let mut outcomes = Vec::with_capacity(periods.len());
    for period in periods {
        let mut state = StageState::Pending;
        match run_period(config, period, &mut state) {
            Ok(output) => {
                info!(
                    stage = %config.name,
                    period = %period,
                    output = %output.display(),
                    "period complete"
                );
                outcomes.push(PeriodOutcome {
                    period: *period,
                    state,
                    output: Some(output),
                    error: None,
                });
            }
            Err(e) => {
                error!(
                    stage = %config.name,
                    period = %period,
                    state = %state,
                    error = %e,
                    "period failed"
                );
                outcomes.push(PeriodOutcome {
                    period: *period,
                    state,
                    output: None,
                    error: Some(e),
                });
            }
        }
    }
    StageReport {
        stage: config.name.clone(),
        outcomes,
    }
}

fn run_period(config: &StageConfig, period: &Period, state: &mut StageState) -> Result<PathBuf> {
    *state = StageState::Selecting;
    let files = select_files(&config.input_dir, period)?;
    if files.is_empty() {
        return Err(DownsampleError::MissingFiles {
            period: period.label(),
            dir: config.input_dir.clone(),
        });
    }

    let output = match &config.operation {
        StageOperation::Reduce(spec) => {
            *state = StageState::Reducing;
            resample_files(&files, spec, &config.output_dir, &config.tag)?
                .ok_or_else(|| DownsampleError::MissingFiles {
                    period: period.label(),
                    dir: config.input_dir.clone(),
                })?
        }
        StageOperation::Aggregate {
            resolution_label,
            output_labels,
        } => {
            *state = StageState::Aggregating;
            let mut datasets = Vec::with_capacity(files.len());
            for file in &files {
                datasets.push(read_dataset(file)?);
            }
            let combined = concat_datasets(datasets)?;
            let name = output_file_name(
                combined.start_date(),
                combined.end_date(),
                resolution_label,
                &config.tag,
                output_labels,
            );
            fs::create_dir_all(&config.output_dir)?;
            let path = config.output_dir.join(name);
            write_dataset(&combined, &path)?;
            path
        }
    };

    *state = StageState::Written;
    verify_readable(&output)?;

    if config.cleanup_inputs {
        for file in &files {
            if *file == output {
                warn!(path = %file.display(), "output coincides with an input, keeping it");
                continue;
            }
            fs::remove_file(file)?;
        }
        *state = StageState::CleanedUp;
    }
    Ok(output)
}

/// Run stages in order. Later stages read what earlier stages wrote, so a
/// period that failed upstream simply has no files downstream and is
/// reported as missing there.
pub fn run_chain(plans: &[StagePlan]) -> Vec<StageReport> {
    let mut reports = Vec::with_capacity(plans.len());
    for plan in plans {
        info!(stage = %plan.config.name, periods = plan.periods.len(), "running stage");
        reports.push(run_stage(&plan.config, &plan.periods));
    }
    reports
}

#[derive(Debug, Clone)]
pub struct MeanAnnualConfig {
    pub yearly_dir: PathBuf,
    pub output_dir: PathBuf,
    pub first_year: i32,
    pub last_year: i32,
    pub tag: String,
    pub label: String,
}

/// Aggregate per-year files over a span of years, write the combined series
/// and its long-term mean. Returns the mean file's path.
pub fn run_mean_annual(config: &MeanAnnualConfig) -> Result<PathBuf> {
    let period = Period::Years {
        start: config.first_year,
        end: config.last_year,
    };
    let files = select_files(&config.yearly_dir, &period)?;
    if files.is_empty() {
        return Err(DownsampleError::MissingFiles {
            period: period.label(),
            dir: config.yearly_dir.clone(),
        });
    }
    fs::create_dir_all(&config.output_dir)?;
    let aggregate_path = config.output_dir.join(format!(
        "{}_{}_yearly_aggregate.nc",
        config.first_year, config.last_year
    ));
    let combined = aggregate_files(&files, &aggregate_path)?;
    verify_readable(&aggregate_path)?;

    let mean = long_term_mean(&combined)?;
    let mean_path = config.output_dir.join(mean_annual_file_name(
        config.first_year,
        config.last_year,
        &config.tag,
        &config.label,
    ));
    write_dataset(&mean, &mean_path)?;
    verify_readable(&mean_path)?;
    info!(
        years = %period,
        output = %mean_path.display(),
        "wrote long-term mean"
    );
    Ok(mean_path)
}
