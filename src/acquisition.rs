use crate::error::Result;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Source of raw hourly files, one file per day.
///
/// The pipeline only depends on the on-disk layout produced here, so a
/// provider can be a remote archive client or a local generator in tests.
pub trait RawDataProvider {
    /// Fetch the given variables for each day, writing one netCDF file per
    /// day into `output_dir` named by [`raw_file_name`]. Returns the paths
    /// written, in day order.
    fn fetch_days(
        &self,
        variables: &[String],
        days: &[NaiveDate],
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>>;
}

/// File name for one day of raw hourly data:
/// `{Y-m-d}_ERA5_hourly[_{suffix}].nc`.
pub fn raw_file_name(day: NaiveDate, suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) => format!("{}_ERA5_hourly_{}.nc", day.format("%Y-%m-%d"), suffix),
        None => format!("{}_ERA5_hourly.nc", day.format("%Y-%m-%d")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_file_name() {
        let day = NaiveDate::from_ymd_opt(2000, 3, 1).unwrap();
        assert_eq!(raw_file_name(day, None), "2000-03-01_ERA5_hourly.nc");
        assert_eq!(
            raw_file_name(day, Some("u10")),
            "2000-03-01_ERA5_hourly_u10.nc"
        );
    }
}
