//! CSV export of the hourly forecast.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::forecast::ForecastResult;

/// Column header for the forecast export.
const HEADER: [&str; 3] = ["timestamp", "day", "power_kw"];

/// Exports the hourly points of `result` to a CSV file at the given path.
///
/// Writes a header row followed by one row per hour in chronological order.
/// Produces identical output for identical inputs.
///
/// # Arguments
///
/// * `result` - Aggregated forecast
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(result: &ForecastResult, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(result, buf)
}

/// Writes the hourly points of `result` as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(result: &ForecastResult, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(HEADER)?;

    for day in &result.days {
        let day_str = day.day.format("%Y-%m-%d").to_string();
        for p in &day.points {
            wtr.write_record([
                p.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                day_str.clone(),
                format!("{:.4}", p.power_kw),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
