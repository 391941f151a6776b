use chrono::{DateTime, Duration, TimeZone, Utc};
use era5_downsample::aggregate::aggregate_files;
use era5_downsample::data_io::{read_dataset, write_dataset};
use era5_downsample::dataset::{GridDataset, SpatialCoord, VarAttrs};
use era5_downsample::pipeline::{run_mean_annual, MeanAnnualConfig};
use era5_downsample::DownsampleError;
use ndarray::ArrayD;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn daily_dataset(year: i32, month: u32, day: u32, n_days: usize, value: f64) -> GridDataset {
    let times: Vec<DateTime<Utc>> = (0..n_days)
        .map(|d| {
            Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap() + Duration::days(d as i64)
        })
        .collect();
    let coords = vec![SpatialCoord::new("latitude", vec![10.0, 11.0])];
    let mut ds = GridDataset::new(times, coords).unwrap();
    ds.add_variable(
        "tp",
        ArrayD::from_elem(vec![n_days, 2], value),
        VarAttrs::new("m", "Total precipitation"),
    )
    .unwrap();
    ds
}

fn write(dir: &Path, name: &str, ds: &GridDataset) -> PathBuf {
    let path = dir.join(name);
    write_dataset(ds, &path).unwrap();
    path
}

#[test]
fn test_aggregate_files_concatenates_in_order() {
    let dir = tempdir().unwrap();
    let march = write(
        dir.path(),
        "2000-03-01_ERA5_daily.nc",
        &daily_dataset(2000, 3, 1, 3, 1.0),
    );
    let april = write(
        dir.path(),
        "2000-04-01_ERA5_daily.nc",
        &daily_dataset(2000, 4, 1, 2, 2.0),
    );

    let output = dir.path().join("out").join("2000_aggregate.nc");
    let combined = aggregate_files(&[march, april], &output).unwrap();
    assert_eq!(combined.n_times(), 5);

    let loaded = read_dataset(&output).unwrap();
    assert_eq!(loaded.n_times(), 5);
    let var = loaded.variable("tp").unwrap();
    assert!((var.data[[0, 0]] - 1.0).abs() < 1e-9);
    assert!((var.data[[4, 1]] - 2.0).abs() < 1e-9);
}

#[test]
fn test_aggregate_files_rejects_unsorted_inputs() {
    let dir = tempdir().unwrap();
    let march = write(
        dir.path(),
        "2000-03-01_ERA5_daily.nc",
        &daily_dataset(2000, 3, 1, 3, 1.0),
    );
    let april = write(
        dir.path(),
        "2000-04-01_ERA5_daily.nc",
        &daily_dataset(2000, 4, 1, 2, 2.0),
    );

    let output = dir.path().join("2000_aggregate.nc");
    let err = aggregate_files(&[april, march], &output).unwrap_err();
    assert!(matches!(err, DownsampleError::Validation(_)));
    assert!(!output.exists());
}

#[test]
fn test_aggregate_files_empty_list() {
    let dir = tempdir().unwrap();
    let err = aggregate_files(&[], &dir.path().join("out.nc")).unwrap_err();
    assert!(matches!(err, DownsampleError::Validation(_)));
}

#[test]
fn test_mean_annual_over_yearly_files() {
    let dir = tempdir().unwrap();
    let yearly_dir = dir.path().join("yearly");
    std::fs::create_dir_all(&yearly_dir).unwrap();
    // One value per year, labeled at the year start.
    for (year, value) in [(1982, 10.0), (1983, 20.0), (1984, 30.0)] {
        write(
            &yearly_dir,
            &format!("{}-01-01_ERA5_1Y_totalprecip.nc", year),
            &daily_dataset(year, 1, 1, 1, value),
        );
    }

    let config = MeanAnnualConfig {
        yearly_dir,
        output_dir: dir.path().join("agg"),
        first_year: 1982,
        last_year: 1984,
        tag: "ERA5".to_string(),
        label: "totalprecip".to_string(),
    };
    let mean_path = run_mean_annual(&config).unwrap();
    assert_eq!(
        mean_path.file_name().unwrap().to_str().unwrap(),
        "1982_1984_ERA5_mean_annual_totalprecip.nc"
    );
    assert!(config.output_dir.join("1982_1984_yearly_aggregate.nc").exists());

    let mean = read_dataset(&mean_path).unwrap();
    assert_eq!(mean.n_times(), 1);
    let var = mean.variable("tp").unwrap();
    assert!((var.data[[0, 0]] - 20.0).abs() < 1e-9);
}

#[test]
fn test_mean_annual_missing_inputs() {
    let dir = tempdir().unwrap();
    let config = MeanAnnualConfig {
        yearly_dir: dir.path().join("yearly"),
        output_dir: dir.path().join("agg"),
        first_year: 1982,
        last_year: 1984,
        tag: "ERA5".to_string(),
        label: "totalprecip".to_string(),
    };
    let err = run_mean_annual(&config).unwrap_err();
    assert!(matches!(err, DownsampleError::MissingFiles { .. }));
    assert!(!config.output_dir.exists());
}
