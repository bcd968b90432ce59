//! List the pings in a GWF file
use super::output_writer;
use crate::error::{Error, Result};
use crate::gwf;
use std::io::Write;
use std::path::PathBuf;
use time::format_description::well_known::Rfc3339;

/// Write one line per ping: number, time, beams, offset and size
pub fn list(path: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let file = gwf::open(path)?;
    let mut writer = output_writer(output)?;
    for ping in file {
        let ping = ping?;
        let time = ping
            .timestamp
            .format(&Rfc3339)
            .map_err(|e| Error::InvalidTimestamp(e.to_string()))?;
        let location = ping.location.unwrap_or_default();
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}",
            ping.ping_number,
            time,
            ping.beams.len(),
            location.offset,
            location.size
        )?;
    }
    writer.flush()?;
    Ok(())
}
