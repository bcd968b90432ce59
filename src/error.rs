//! Errors raised while decoding vendor streams and GWF files
use std::path::PathBuf;
use thiserror::Error;

/// A `Result` carrying an [`enum@Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while reading or writing water column data
#[derive(Debug, Error)]
pub enum Error {
    /// Fewer bytes remain than a header declares
    #[error("truncated input at byte {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        /// Position of the read that failed
        offset: u64,
        /// Number of bytes the header declared
        needed: u64,
        /// Number of bytes actually left
        available: u64,
    },

    /// A frame whose declared sizes are inconsistent
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// A structured decode failed
    #[error("binary decode error: {0}")]
    Binary(binrw::Error),

    /// A sample format code outside 0..=5
    #[error("unsupported sample format code {0}")]
    UnsupportedSampleFormat(u8),

    /// A Reson 7008 sample type other than 16 bit magnitude / 16 bit phase
    #[error("unsupported 7008 data sample type {0:#x}")]
    UnsupportedSampleType(u32),

    /// A Reson 7008 beam that does not cover the whole ping
    #[error("beam {beam} spans {samples} samples but the ping declares {expected}")]
    UnsupportedBeamExtent {
        /// Index of the offending beam
        beam: usize,
        /// Samples covered by the beam descriptor
        samples: u64,
        /// Samples declared for the whole ping
        expected: u64,
    },

    /// A water column record type that is recognized but not decoded
    #[error("record type {0} is not supported")]
    UnsupportedRecord(u32),

    /// Sample bytes that are not a whole number of elements
    #[error("beam {beam}: {len} sample bytes is not a multiple of the {width} byte sample width")]
    InvalidSampleLength {
        /// Index of the offending beam
        beam: usize,
        /// Number of bytes in the sample buffer
        len: usize,
        /// Element width of the declared format
        width: usize,
    },

    /// A length that does not fit its on-disk field
    #[error("{field} of {value} does not fit its encoded field")]
    FieldOverflow {
        /// Name of the field
        field: &'static str,
        /// The value that overflowed
        value: u64,
    },

    /// A timestamp that cannot be represented
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// No parser is registered for the file extension
    #[error("no parser registered for {0}")]
    UnsupportedExtension(PathBuf),

    /// The file does not contain any water column data
    #[error("no water column data in {0}")]
    NoWaterColumnData(PathBuf),

    /// A parser was used before `open`
    #[error("parser has no open file")]
    NotOpen,

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Avro export failure
    #[error("Avro error: {0}")]
    Avro(#[from] apache_avro::Error),
}

impl Error {
    /// Whether this error leaves the underlying stream unusable
    ///
    /// Framing errors end iteration over a file. Every other error is
    /// confined to the record that raised it.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Error::Truncated { .. } | Error::InvalidFrame(_) | Error::Binary(_) | Error::Io(_)
        )
    }
}

/// I/O failures, end of input included, stay [`Error::Io`]. Decoders check
/// the bytes available before reading, so running out of input is
/// reported as [`Error::Truncated`] there.
impl From<binrw::Error> for Error {
    fn from(err: binrw::Error) -> Self {
        match err {
            binrw::Error::Io(e) => Error::Io(e),
            other => Error::Binary(other),
        }
    }
}

impl From<time::error::ComponentRange> for Error {
    fn from(err: time::error::ComponentRange) -> Self {
        Error::InvalidTimestamp(err.to_string())
    }
}
