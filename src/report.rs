//! Renders the timing table to any `Write` sink.

use std::io::{self, Write};

use crate::runner::Row;
use crate::strategy::{Measurement, Strategy};
use crate::utils::format_thousands;

pub const LENGTH_LABEL: &str = "Length";
pub const UNAVAILABLE: &str = "N/A";
pub const FAILED: &str = "FAILED";

/// Renders one measurement as a table cell.
pub fn format_cell(measurement: &Measurement) -> String {
    match measurement {
        Measurement::Elapsed(d) => format_thousands(d.as_millis()),
        Measurement::Unavailable => UNAVAILABLE.to_string(),
        Measurement::Failed(_) => FAILED.to_string(),
    }
}

fn format_line(fields: &[String; 5]) -> String {
    format!(
        "{:<20} {:<20} {:<20} {:<20} {:<20}",
        fields[0], fields[1], fields[2], fields[3], fields[4]
    )
}

/// The header line, without trailing newline.
pub fn header_line() -> String {
    let [a, b, c, d] = Strategy::ALL.map(|s| s.label().to_string());
    format_line(&[LENGTH_LABEL.to_string(), a, b, c, d])
}

/// One result line, without trailing newline. Missing cells render `N/A`.
pub fn row_line(row: &Row) -> String {
    let cell = |s: Strategy| {
        row.measurement(s)
            .map(format_cell)
            .unwrap_or_else(|| UNAVAILABLE.to_string())
    };
    let [a, b, c, d] = Strategy::ALL.map(cell);
    format_line(&[format_thousands(row.length as u128), a, b, c, d])
}

/// Writes the header once, then rows.
pub struct Reporter<W: Write> {
    out: W,
    header_written: bool,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            header_written: false,
        }
    }

    /// Writes the header and a blank line; later calls do nothing.
    pub fn write_header(&mut self) -> io::Result<()> {
        if self.header_written {
            return Ok(());
        }
        writeln!(self.out, "{}\n", header_line())?;
        self.header_written = true;
        Ok(())
    }

    pub fn write_row(&mut self, row: &Row) -> io::Result<()> {
        self.write_header()?;
        writeln!(self.out, "{}", row_line(row))?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
