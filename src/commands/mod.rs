pub mod list;
pub mod power;
pub mod snapshot;

use std::io::Write;

use crate::app_err::AppResult;

/// Writes one record line, fields separated by `", "`.
pub(crate) fn write_row(out: &mut dyn Write, fields: &[&str]) -> AppResult<()> {
    writeln!(out, "{}", fields.join(", "))?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn output_lines(out: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(out).lines().map(String::from).collect()
}
