//! Writing Avro indexes of GWF files
use crate::error::Result;
use crate::gwf;
use apache_avro::{Schema, Writer};
use serde::Serialize;
use std::path::Path;

const INDEX_SCHEMA: &str = r#"{"type": "record","namespace": "wcd","name": "ping_index","fields": [{"name": "ping_number", "type": "long"},{"name": "timestamp", "type": "long"},{"name": "offset", "type": "long"},{"name": "size", "type": "long"},{"name": "beams", "type": "int"}]}"#;

/// One row of the index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexEntry {
    /// Vendor ping number
    pub ping_number: i64,
    /// Microseconds since the Unix epoch
    pub timestamp: i64,
    /// Byte offset of the record
    pub offset: i64,
    /// Record size in bytes
    pub size: i64,
    /// Number of beams
    pub beams: i32,
}

/// Write an Avro file with one [`IndexEntry`] per ping of a GWF file
///
/// ```console
/// $ wcd index <input> <output>
/// ```
pub fn index(path: &Path, output: &Path) -> Result<usize> {
    let schema = Schema::parse_str(INDEX_SCHEMA)?;

    let g = std::fs::File::create(output)?;
    let mut writer = Writer::new(&schema, g);
    let mut count = 0;
    for ping in gwf::open(path)? {
        let ping = ping?;
        let location = ping.location.unwrap_or_default();
        writer.append_ser(IndexEntry {
            ping_number: i64::from(ping.ping_number),
            timestamp: (ping.timestamp.unix_timestamp_nanos() / 1000) as i64,
            offset: location.offset as i64,
            size: location.size as i64,
            beams: ping.beams.len() as i32,
        })?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}
