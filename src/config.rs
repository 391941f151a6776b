use crate::derive::derived_name;
use crate::error::{DownsampleError, Result};
use crate::naming::DEFAULT_TAG;
use crate::pipeline::{MeanAnnualConfig, Period, StageConfig, StageOperation, StagePlan};
use crate::resample::{ResamplingSpec, TimeResolution, VariableSource};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

/// Which processing chain to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainKind {
    /// Raw hourly files to daily files, daily files to per-year aggregates,
    /// aggregates to yearly files.
    HourlyDailyYearly,
    /// Monthly files straight to yearly files.
    MonthlyYearly,
    /// Per-year files to one long-term mean.
    MeanAnnual,
}

/// Fully resolved run configuration. All paths come from the command line,
/// nothing is assumed about the current working directory.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub chain: ChainKind,
    pub raw_dir: PathBuf,
    pub daily_dir: PathBuf,
    pub aggregate_dir: PathBuf,
    pub yearly_dir: PathBuf,
    pub start_year: i32,
    pub end_year: i32,
    pub start_month: u32,
    pub end_month: u32,
    pub wind_u: String,
    pub wind_v: String,
    pub precip: String,
    pub dataset_tag: String,
    pub cleanup_intermediate: bool,
    pub verbosity: u8,
}

impl PipelineConfig {
    /// Parse the process command line.
    pub fn from_args() -> Result<Self> {
        Self::from_matches(&build_cli().get_matches())
    }

    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let (chain, sub) = match matches.subcommand() {
            Some(("hourly", sub)) => (ChainKind::HourlyDailyYearly, sub),
            Some(("monthly", sub)) => (ChainKind::MonthlyYearly, sub),
            Some(("mean-annual", sub)) => (ChainKind::MeanAnnual, sub),
            _ => {
                return Err(DownsampleError::Validation(
                    "a subcommand is required".to_string(),
                ))
            }
        };

        // Not every subcommand defines every argument, so lookups go
        // through try_get_one with a per-argument default.
        let dir = |name: &str| -> PathBuf {
            sub.try_get_one::<String>(name)
                .ok()
                .flatten()
                .map(PathBuf::from)
                .unwrap_or_default()
        };
        let string = |name: &str, default: &str| -> String {
            sub.try_get_one::<String>(name)
                .ok()
                .flatten()
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };
        let month = |name: &str, default: u32| -> u32 {
            sub.try_get_one::<u32>(name)
                .ok()
                .flatten()
                .copied()
                .unwrap_or(default)
        };
        let config = Self {
            chain,
            raw_dir: dir("raw-dir"),
            daily_dir: dir("daily-dir"),
            aggregate_dir: dir("aggregate-dir"),
            yearly_dir: dir("yearly-dir"),
            start_year: *sub.get_one::<i32>("start-year").unwrap_or(&0),
            end_year: *sub.get_one::<i32>("end-year").unwrap_or(&0),
            start_month: month("start-month", 1),
            end_month: month("end-month", 12),
            wind_u: string("wind-u", "u10"),
            wind_v: string("wind-v", "v10"),
            precip: string("precip", "tp"),
            dataset_tag: string("tag", DEFAULT_TAG),
            cleanup_intermediate: !sub.get_flag("keep-intermediate"),
            verbosity: matches.get_count("verbose"),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.start_year > self.end_year {
            return Err(DownsampleError::Validation(format!(
                "start year {} is after end year {}",
                self.start_year, self.end_year
            )));
        }
        if !(1..=12).contains(&self.start_month)
            || !(1..=12).contains(&self.end_month)
            || self.start_month > self.end_month
        {
            return Err(DownsampleError::Validation(format!(
                "invalid month range {}..{}",
                self.start_month, self.end_month
            )));
        }
        Ok(())
    }

    fn years(&self) -> Vec<Period> {
        (self.start_year..=self.end_year).map(Period::Year).collect()
    }

    fn year_months(&self) -> Vec<Period> {
        let mut periods = Vec::new();
        for year in self.start_year..=self.end_year {
            for month in self.start_month..=self.end_month {
                periods.push(Period::YearMonth { year, month });
            }
        }
        periods
    }

    fn wind_speed_source(&self) -> VariableSource {
        VariableSource::WindComponents {
            u: self.wind_u.clone(),
            v: self.wind_v.clone(),
        }
    }

    /// Build the stage plans for this configuration's chain. Empty for the
    /// mean-annual chain, which runs outside the stage machinery.
    pub fn plan(&self) -> Result<Vec<StagePlan>> {
        let labels = vec!["windspeed".to_string(), "totalprecip".to_string()];
        match self.chain {
            ChainKind::HourlyDailyYearly => {
                let daily_spec = ResamplingSpec::from_lists(
                    vec![
                        self.wind_speed_source(),
                        VariableSource::Field(self.precip.clone()),
                    ],
                    &["max", "sum"],
                    TimeResolution::Daily,
                    labels.clone(),
                )?;
                let yearly_spec = ResamplingSpec::from_lists(
                    vec![
                        VariableSource::Field(derived_name(&self.wind_u)),
                        VariableSource::Field(self.precip.clone()),
                    ],
                    &["max", "sum"],
                    TimeResolution::Yearly,
                    labels.clone(),
                )?;
                Ok(vec![
                    StagePlan {
                        config: StageConfig {
                            name: "daily".to_string(),
                            input_dir: self.raw_dir.clone(),
                            output_dir: self.daily_dir.clone(),
                            operation: StageOperation::Reduce(daily_spec),
                            cleanup_inputs: self.cleanup_intermediate,
                            tag: self.dataset_tag.clone(),
                        },
                        periods: self.year_months(),
                    },
                    StagePlan {
                        config: StageConfig {
                            name: "aggregate".to_string(),
                            input_dir: self.daily_dir.clone(),
                            output_dir: self.aggregate_dir.clone(),
                            operation: StageOperation::Aggregate {
                                resolution_label: "1D".to_string(),
                                output_labels: labels.clone(),
                            },
                            cleanup_inputs: self.cleanup_intermediate,
                            tag: self.dataset_tag.clone(),
                        },
                        periods: self.years(),
                    },
                    StagePlan {
                        config: StageConfig {
                            name: "yearly".to_string(),
                            input_dir: self.aggregate_dir.clone(),
                            output_dir: self.yearly_dir.clone(),
                            operation: StageOperation::Reduce(yearly_spec),
                            cleanup_inputs: self.cleanup_intermediate,
                            tag: self.dataset_tag.clone(),
                        },
                        periods: self.years(),
                    },
                ])
            }
            ChainKind::MonthlyYearly => {
                let yearly_spec = ResamplingSpec::from_lists(
                    vec![VariableSource::Field(self.precip.clone())],
                    &["sum"],
                    TimeResolution::Yearly,
                    vec!["totalprecip".to_string()],
                )?;
                Ok(vec![StagePlan {
                    config: StageConfig {
                        name: "yearly".to_string(),
                        input_dir: self.raw_dir.clone(),
                        output_dir: self.yearly_dir.clone(),
                        operation: StageOperation::Reduce(yearly_spec),
                        cleanup_inputs: self.cleanup_intermediate,
                        tag: self.dataset_tag.clone(),
                    },
                    periods: self.years(),
                }])
            }
            ChainKind::MeanAnnual => Ok(Vec::new()),
        }
    }

    pub fn mean_annual(&self) -> MeanAnnualConfig {
        MeanAnnualConfig {
            yearly_dir: self.yearly_dir.clone(),
            output_dir: self.aggregate_dir.clone(),
            first_year: self.start_year,
            last_year: self.end_year,
            tag: self.dataset_tag.clone(),
            label: "totalprecip".to_string(),
        }
    }
}

fn year_range_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("start-year")
            .long("start-year")
            .value_name("YEAR")
            .help("First year to process")
            .required(true)
            .value_parser(value_parser!(i32)),
    )
    .arg(
        Arg::new("end-year")
            .long("end-year")
            .value_name("YEAR")
            .help("Last year to process (inclusive)")
            .required(true)
            .value_parser(value_parser!(i32)),
    )
    .arg(
        Arg::new("tag")
            .long("tag")
            .value_name("NAME")
            .help("Dataset tag embedded in output file names")
            .default_value(DEFAULT_TAG),
    )
    .arg(
        Arg::new("keep-intermediate")
            .long("keep-intermediate")
            .help("Keep input files after each stage instead of deleting them")
            .action(ArgAction::SetTrue),
    )
}

pub fn build_cli() -> Command {
    Command::new("era5_downsample")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Time-downsampling pipeline for gridded ERA5 data")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log verbosity (repeatable)")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(
            year_range_args(
                Command::new("hourly")
                    .about("Reduce raw hourly files to daily, per-year and yearly files"),
            )
            .arg(
                Arg::new("raw-dir")
                    .long("raw-dir")
                    .value_name("DIR")
                    .help("Directory holding raw hourly files")
                    .required(true),
            )
            .arg(
                Arg::new("daily-dir")
                    .long("daily-dir")
                    .value_name("DIR")
                    .help("Directory for per-month daily files")
                    .required(true),
            )
            .arg(
                Arg::new("aggregate-dir")
                    .long("aggregate-dir")
                    .value_name("DIR")
                    .help("Directory for per-year daily aggregates")
                    .required(true),
            )
            .arg(
                Arg::new("yearly-dir")
                    .long("yearly-dir")
                    .value_name("DIR")
                    .help("Directory for yearly files")
                    .required(true),
            )
            .arg(
                Arg::new("start-month")
                    .long("start-month")
                    .value_name("MONTH")
                    .help("First month to process in each year")
                    .default_value("1")
                    .value_parser(value_parser!(u32)),
            )
            .arg(
                Arg::new("end-month")
                    .long("end-month")
                    .value_name("MONTH")
                    .help("Last month to process in each year (inclusive)")
                    .default_value("12")
                    .value_parser(value_parser!(u32)),
            )
            .arg(
                Arg::new("wind-u")
                    .long("wind-u")
                    .value_name("NAME")
                    .help("Eastward wind component variable")
                    .default_value("u10"),
            )
            .arg(
                Arg::new("wind-v")
                    .long("wind-v")
                    .value_name("NAME")
                    .help("Northward wind component variable")
                    .default_value("v10"),
            )
            .arg(
                Arg::new("precip")
                    .long("precip")
                    .value_name("NAME")
                    .help("Precipitation variable")
                    .default_value("tp"),
            ),
        )
        .subcommand(
            year_range_args(
                Command::new("monthly").about("Reduce monthly files to yearly files"),
            )
            .arg(
                Arg::new("raw-dir")
                    .long("raw-dir")
                    .value_name("DIR")
                    .help("Directory holding monthly files")
                    .required(true),
            )
            .arg(
                Arg::new("yearly-dir")
                    .long("yearly-dir")
                    .value_name("DIR")
                    .help("Directory for yearly files")
                    .required(true),
            )
            .arg(
                Arg::new("precip")
                    .long("precip")
                    .value_name("NAME")
                    .help("Precipitation variable")
                    .default_value("tp"),
            ),
        )
        .subcommand(
            year_range_args(
                Command::new("mean-annual")
                    .about("Aggregate yearly files and write their long-term mean"),
            )
            .arg(
                Arg::new("yearly-dir")
                    .long("yearly-dir")
                    .value_name("DIR")
                    .help("Directory holding yearly files")
                    .required(true),
            )
            .arg(
                Arg::new("aggregate-dir")
                    .long("aggregate-dir")
                    .value_name("DIR")
                    .help("Directory for the aggregate and mean outputs")
                    .required(true),
            ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<PipelineConfig> {
        let matches = build_cli()
            .try_get_matches_from(args)
            .map_err(|e| DownsampleError::Validation(e.to_string()))?;
        PipelineConfig::from_matches(&matches)
    }

    #[test]
    fn test_hourly_chain_plan() {
        let config = parse(&[
            "era5_downsample",
            "hourly",
            "--raw-dir", "/data/raw",
            "--daily-dir", "/data/daily",
            "--aggregate-dir", "/data/agg",
            "--yearly-dir", "/data/yearly",
            "--start-year", "2000",
            "--end-year", "2001",
            "--start-month", "3",
            "--end-month", "4",
        ])
        .unwrap();
        assert_eq!(config.chain, ChainKind::HourlyDailyYearly);
        assert!(config.cleanup_intermediate);

        let plan = config.plan().unwrap();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0].config.name, "daily");
        assert_eq!(plan[0].periods.len(), 4);
        assert_eq!(plan[1].config.name, "aggregate");
        assert_eq!(plan[1].periods, vec![Period::Year(2000), Period::Year(2001)]);
        assert_eq!(plan[2].config.name, "yearly");
    }

    #[test]
    fn test_monthly_chain_plan() {
        let config = parse(&[
            "era5_downsample",
            "monthly",
            "--raw-dir", "/data/monthly",
            "--yearly-dir", "/data/yearly",
            "--start-year", "1982",
            "--end-year", "1984",
            "--keep-intermediate",
        ])
        .unwrap();
        assert_eq!(config.chain, ChainKind::MonthlyYearly);
        assert!(!config.cleanup_intermediate);
        let plan = config.plan().unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].periods.len(), 3);
    }

    #[test]
    fn test_rejects_inverted_year_range() {
        let err = parse(&[
            "era5_downsample",
            "mean-annual",
            "--yearly-dir", "/data/yearly",
            "--aggregate-dir", "/data/agg",
            "--start-year", "2019",
            "--end-year", "1982",
        ])
        .unwrap_err();
        assert!(matches!(err, DownsampleError::Validation(_)));
    }
}
