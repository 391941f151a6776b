use chrono::NaiveDate;

/// Parse the date encoded at the start of a stage file name.
///
/// Accepts `YYYY`, `YYYY-MM` and `YYYY-MM-DD` prefixes; missing components
/// default to the first month/day. This is the counterpart of the filename
/// convention shared between pipeline stages.
pub fn parse_leading_date(file_name: &str) -> Option<NaiveDate> {
    let head: String = file_name
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    let head = head.trim_end_matches('-');

    let mut parts = head.splitn(3, '-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u32 = match parts.next() {
        Some(m) => m.parse().ok()?,
        None => 1,
    };
    let day: u32 = match parts.next() {
        Some(d) => d.parse().ok()?,
        None => 1,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_leading_date_full() {
        assert_eq!(
            parse_leading_date("2000-03-01_ERA5_hourly.nc"),
            NaiveDate::from_ymd_opt(2000, 3, 1)
        );
    }

    #[test]
    fn test_parse_leading_date_partial() {
        assert_eq!(
            parse_leading_date("2000-03_ERA5_daily.nc"),
            NaiveDate::from_ymd_opt(2000, 3, 1)
        );
        assert_eq!(
            parse_leading_date("2000_ERA5_daily.nc"),
            NaiveDate::from_ymd_opt(2000, 1, 1)
        );
    }

    #[test]
    fn test_parse_leading_date_invalid() {
        assert_eq!(parse_leading_date("era5_2000.nc"), None);
        assert_eq!(parse_leading_date("2000-13-01_x.nc"), None);
    }
}
