//! Converting vendor files to GWF files
use crate::config::DecoderConfig;
use crate::error::Result;
use crate::gwf;
use crate::parser::ParserCollection;
use log::{info, warn};
use std::io::BufWriter;
use std::path::Path;

/// Convert the water column data of a vendor file to GWF
///
/// Pings that cannot be decoded are skipped with a warning. A damaged
/// stream ends the conversion with an error, keeping the pings written
/// so far.
/// ```console
/// $ wcd convert <input> <output>
/// ```
pub fn convert(input: &Path, output: &Path, config: DecoderConfig) -> Result<usize> {
    let mut parsers = ParserCollection::with_config(config);
    let pings = parsers.water_column_packets(input)?;

    let f = std::fs::File::create(output)?;
    let mut writer = gwf::Writer::new(BufWriter::new(f));
    let mut bytes = 0;
    let mut failure = None;
    for ping in pings {
        match ping {
            Ok(ping) => bytes += writer.write_ping(&ping)?.size,
            Err(e) if e.is_framing() => {
                failure = Some(e);
                break;
            }
            Err(e) => warn!("Skipping ping: {}", e),
        }
    }
    let count = writer.count();
    writer.finish()?;
    info!(
        "Wrote {} pings ({} bytes) to {}",
        count,
        bytes,
        output.display()
    );

    match failure {
        Some(e) => Err(e),
        None => Ok(count),
    }
}
