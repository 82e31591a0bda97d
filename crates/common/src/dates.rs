//! Date helpers for printed documents

/// Reformat a `YYYY-MM-DD` date as `DD-MM-YYYY`
///
/// Anything that is not three dash-separated numeric parts in that shape is
/// returned unchanged.
pub fn to_day_month_year(date: &str) -> String {
    let parts: Vec<&str> = date.split('-').collect();

    match parts.as_slice() {
        [year, month, day]
            if parts
                .iter()
                .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit())) =>
        {
            format!("{}-{}-{}", day, month, year)
        }
        _ => date.to_string(),
    }
}
