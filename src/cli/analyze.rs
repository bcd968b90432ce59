//! Print info about vendor files
use crate::error::Result;
use crate::parser::ParserCollection;
use log::warn;
use std::path::PathBuf;

/// Print the size and sonar of each file
///
/// Files no parser handles are skipped with a warning.
/// ```console
/// $ wcd analyze survey/*.all
/// ```
pub fn analyze(paths: &[PathBuf]) -> Result<()> {
    let mut parsers = ParserCollection::new();
    for path in paths {
        if !parsers.is_potential_wcd_file(path) {
            warn!("Skipping {}: no parser for this extension", path.display());
            continue;
        }
        let file = parsers.analyze_file(path)?;
        println!("File: {}", file.path.display());
        println!("Size: {}", file.size);
        println!("Manufacturer: {}", file.manufacturer);
        println!("Model: {}", file.model);
    }
    parsers.close();
    Ok(())
}
