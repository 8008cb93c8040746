//! Fixed-width table rendering for `show` and `find` output.

use std::fmt::Write;

use crate::client::DeviceRow;

const HEADER: &str = "BLOCK IMEI             CUSTID     TID Reported   Deliver";

fn cell(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

/// One formatted device line under [`HEADER`].
pub fn format_row(row: &DeviceRow) -> String {
    format!(
        "{:5} {:<16} {:<10} {:<3} {:<10} {:<10}",
        i32::from(row.block),
        row.imei,
        row.custid,
        cell(row.tid.as_deref()),
        cell(row.reported.as_deref()),
        cell(row.deliver.as_deref()),
    )
}

/// Full table with header, one line per device.
pub fn render(rows: &[DeviceRow]) -> String {
    let mut out = String::from(HEADER);
    for row in rows {
        let _ = write!(out, "\n{}", format_row(row).trim_end());
    }
    out
}
