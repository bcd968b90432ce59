//! Vendor water column decoders
//!
//! Each vendor format implements [`WaterColumnParser`]. A
//! [`ParserCollection`] picks the parser for a file by its extension and
//! keeps at most one file open at a time.
use crate::config::DecoderConfig;
use crate::error::{Error, Result};
use crate::model::Ping;
use binrw::io::BufReader;
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};

pub mod congregate;
pub mod kongsberg;
pub mod reson;

/// A lazy stream of normalized pings borrowed from an open parser
pub type PingIter<'a> = Box<dyn Iterator<Item = Result<Ping>> + 'a>;

/// The capabilities every vendor decoder provides
pub trait WaterColumnParser {
    /// File extensions handled by this parser, including the leading dot
    fn supported_extensions(&self) -> &'static [&'static str];

    /// Open a file, closing any file opened before
    fn open(&mut self, path: &Path) -> Result<()>;

    /// Release the open file
    ///
    /// Safe to call when nothing is open or `open` failed.
    fn close(&mut self);

    /// Whether the file holds at least one water column record
    ///
    /// The result is remembered until the file is closed. Probing does
    /// not affect [`water_column_packets`](Self::water_column_packets).
    fn contains_water_column_data(&mut self) -> Result<bool>;

    /// Manufacturer and model from the first water column record
    ///
    /// Returns `("Unknown", "Unknown")` if there is no such record.
    fn make_and_model(&mut self) -> Result<(String, String)>;

    /// Stream every ping in the file, starting from the beginning
    fn water_column_packets(&mut self) -> Result<PingIter<'_>>;

    /// Number of records of each type in the file
    fn record_counts(&mut self) -> Result<BTreeMap<String, u64>>;
}

/// The manufacturer/model pair reported when nothing is known
pub fn unknown_make_and_model() -> (String, String) {
    ("Unknown".to_string(), "Unknown".to_string())
}

/// The file handle owned by an open parser
pub(crate) struct Source {
    path: PathBuf,
    reader: BufReader<std::fs::File>,
}

impl Source {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let reader = BufReader::new(std::fs::File::open(path)?);
        Ok(Source {
            path: path.to_path_buf(),
            reader,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Seek back to the start for a new pass over the file
    pub(crate) fn rewind(&mut self) -> Result<&mut BufReader<std::fs::File>> {
        self.reader.seek(SeekFrom::Start(0))?;
        Ok(&mut self.reader)
    }
}

/// A summary of a potential water column file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WaterColumnFile {
    /// Path of the file
    pub path: PathBuf,
    /// Size of the file in bytes
    pub size: u64,
    /// Sonar manufacturer
    pub manufacturer: String,
    /// Sonar model
    pub model: String,
}

/// Dispatches files to vendor parsers by extension
///
/// The collection caches the most recently opened file. Asking about a
/// different path closes it and opens the new one.
pub struct ParserCollection {
    parsers: Vec<Box<dyn WaterColumnParser>>,
    extensions: HashMap<String, usize>,
    opened: Option<(PathBuf, usize)>,
}

impl ParserCollection {
    /// A collection with every built-in parser and the default configuration
    pub fn new() -> Self {
        Self::with_config(DecoderConfig::default())
    }

    /// A collection with every built-in parser
    pub fn with_config(config: DecoderConfig) -> Self {
        let mut collection = ParserCollection {
            parsers: Vec::new(),
            extensions: HashMap::new(),
            opened: None,
        };
        collection.register(Box::new(reson::ResonParser::new()));
        collection.register(Box::new(kongsberg::KongsbergParser::with_config(config)));
        collection
    }

    /// Add a parser, taking over any extensions it shares with earlier ones
    pub fn register(&mut self, parser: Box<dyn WaterColumnParser>) {
        let index = self.parsers.len();
        for ext in parser.supported_extensions() {
            self.extensions.insert(ext.to_ascii_lowercase(), index);
        }
        self.parsers.push(parser);
    }

    fn parser_index(&self, path: &Path) -> Option<usize> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.extensions.get(&format!(".{}", ext)).copied()
    }

    /// Whether a parser is registered for the file's extension
    pub fn is_potential_wcd_file<P: AsRef<Path>>(&self, path: P) -> bool {
        self.parser_index(path.as_ref()).is_some()
    }

    fn ensure_open(&mut self, path: &Path) -> Result<usize> {
        let index = self
            .parser_index(path)
            .ok_or_else(|| Error::UnsupportedExtension(path.to_path_buf()))?;
        let already_open = self.opened.as_ref().map(|(p, _)| p.as_path() == path);
        match already_open {
            Some(true) => return Ok(index),
            Some(false) => self.close(),
            None => {}
        }

        debug!("Opening {}", path.display());
        if let Err(e) = self.parsers[index].open(path) {
            self.parsers[index].close();
            return Err(e);
        }
        self.opened = Some((path.to_path_buf(), index));
        Ok(index)
    }

    /// Whether the file holds water column data
    ///
    /// Files with an unregistered extension are reported as not
    /// containing any.
    pub fn contains_wcd<P: AsRef<Path>>(&mut self, path: P) -> Result<bool> {
        let path = path.as_ref();
        if !self.is_potential_wcd_file(path) {
            return Ok(false);
        }
        let index = self.ensure_open(path)?;
        self.parsers[index].contains_water_column_data()
    }

    /// Identify the sonar that produced a file
    pub fn analyze_file<P: AsRef<Path>>(&mut self, path: P) -> Result<WaterColumnFile> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)?.len();
        let (manufacturer, model) = if self.contains_wcd(path)? {
            let index = self.ensure_open(path)?;
            self.parsers[index].make_and_model()?
        } else {
            unknown_make_and_model()
        };
        Ok(WaterColumnFile {
            path: path.to_path_buf(),
            size,
            manufacturer,
            model,
        })
    }

    /// Stream the normalized pings of a file
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoWaterColumnData`] if the file has no water
    /// column records or its extension is not registered.
    pub fn water_column_packets<P: AsRef<Path>>(&mut self, path: P) -> Result<PingIter<'_>> {
        let path = path.as_ref();
        if !self.contains_wcd(path)? {
            return Err(Error::NoWaterColumnData(path.to_path_buf()));
        }
        let index = self.ensure_open(path)?;
        self.parsers[index].water_column_packets()
    }

    /// Count the records of each type in a file
    pub fn record_counts<P: AsRef<Path>>(&mut self, path: P) -> Result<BTreeMap<String, u64>> {
        let index = self.ensure_open(path.as_ref())?;
        self.parsers[index].record_counts()
    }

    /// The path of the currently open file, if any
    pub fn opened_path(&self) -> Option<&Path> {
        self.opened.as_ref().map(|(p, _)| p.as_path())
    }

    /// Close the currently open file
    pub fn close(&mut self) {
        if let Some((path, index)) = self.opened.take() {
            debug!("Closing {}", path.display());
            self.parsers[index].close();
        }
    }
}

impl Default for ParserCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ParserCollection {
    fn drop(&mut self) {
        self.close();
    }
}
