//! Count the records in a vendor file
use super::output_writer;
use crate::error::Result;
use crate::parser::ParserCollection;
use std::io::Write;
use std::path::PathBuf;

/// Write one `count<TAB>name` line per record type
pub fn count(path: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let mut parsers = ParserCollection::new();
    let counts = parsers.record_counts(&path)?;

    let mut writer = output_writer(output)?;
    for (key, value) in &counts {
        writeln!(writer, "{}\t{}", value, key)?;
    }
    writer.flush()?;
    Ok(())
}
