use chrono::NaiveDate;

/// Default dataset tag embedded in output file names.
pub const DEFAULT_TAG: &str = "ERA5";

/// Translate a resolution label to its canonical human-readable form.
/// Labels without a canonical entry pass through verbatim.
fn resolution_file_label(label: &str) -> &str {
    match label {
        "1H" => "hourly",
        "1D" => "daily",
        "1M" => "monthly",
        other => other,
    }
}

/// Build the deterministic output file name for an aggregated series.
///
/// Layout: `{start}[_{end}]_{tag}_{resolution}[_{label}...].nc`, where the
/// end date is included only when the series spans more than one day. Pure
/// function, no I/O.
pub fn output_file_name(
    start: NaiveDate,
    end: NaiveDate,
    resolution_label: &str,
    tag: &str,
    labels: &[String],
) -> String {
    let mut name = start.format("%Y-%m-%d").to_string();
    if end != start {
        name.push('_');
        name.push_str(&end.format("%Y-%m-%d").to_string());
    }
    name.push('_');
    name.push_str(tag);
    name.push('_');
    name.push_str(resolution_file_label(resolution_label));
    for label in labels {
        name.push('_');
        name.push_str(label);
    }
    name.push_str(".nc");
    name
}

/// File name for a long-term mean of yearly values.
pub fn mean_annual_file_name(first_year: i32, last_year: i32, tag: &str, label: &str) -> String {
    format!("{}_{}_{}_mean_annual_{}.nc", first_year, last_year, tag, label)
}
