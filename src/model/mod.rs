//! The vendor-neutral water column data model
//!
//! Every vendor decoder produces [`Ping`]s and the GWF container
//! consumes them. Samples are kept as raw bytes in the [`SampleFormat`]
//! declared by the owning ping; turning them into numbers is left to
//! [`SampleFormat::decode`].
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The encoding of a single amplitude or phase sample
///
/// The discriminants are the codes stored in GWF ping headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Deserialize, Serialize)]
#[repr(u8)]
pub enum SampleFormat {
    /// Signed 8 bit
    I8 = 0,
    /// Unsigned 8 bit
    U8 = 1,
    /// Signed 16 bit
    I16 = 2,
    /// Unsigned 16 bit
    U16 = 3,
    /// Signed 32 bit
    I32 = 4,
    /// Unsigned 32 bit
    U32 = 5,
}

impl SampleFormat {
    /// The code written to GWF headers
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Width of one element in bytes
    pub fn width(self) -> usize {
        match self {
            SampleFormat::I8 | SampleFormat::U8 => 1,
            SampleFormat::I16 | SampleFormat::U16 => 2,
            SampleFormat::I32 | SampleFormat::U32 => 4,
        }
    }

    /// Width of one element in bits
    pub fn bits(self) -> u32 {
        8 * self.width() as u32
    }

    /// Whether elements are two's complement
    pub fn is_signed(self) -> bool {
        matches!(self, SampleFormat::I8 | SampleFormat::I16 | SampleFormat::I32)
    }

    /// Decode little-endian sample bytes into numeric values
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSampleLength`] if `bytes` is not a whole
    /// number of elements.
    pub fn decode(self, bytes: &[u8]) -> Result<Vec<i64>> {
        let width = self.width();
        if bytes.len() % width != 0 {
            return Err(Error::InvalidSampleLength {
                beam: 0,
                len: bytes.len(),
                width,
            });
        }
        let values = bytes
            .chunks_exact(width)
            .map(|c| match self {
                SampleFormat::I8 => i64::from(c[0] as i8),
                SampleFormat::U8 => i64::from(c[0]),
                SampleFormat::I16 => i64::from(i16::from_le_bytes([c[0], c[1]])),
                SampleFormat::U16 => i64::from(u16::from_le_bytes([c[0], c[1]])),
                SampleFormat::I32 => i64::from(i32::from_le_bytes([c[0], c[1], c[2], c[3]])),
                SampleFormat::U32 => i64::from(u32::from_le_bytes([c[0], c[1], c[2], c[3]])),
            })
            .collect();
        Ok(values)
    }

    /// Decode samples and shift signed formats into the unsigned range
    ///
    /// Signed values get a bias of 2^(bits-1) added, so -128 in an I8
    /// stream becomes 0. This is how amplitudes are prepared for display;
    /// stored bytes are never biased.
    pub fn decode_biased(self, bytes: &[u8]) -> Result<Vec<i64>> {
        let mut values = self.decode(bytes)?;
        if self.is_signed() {
            let bias = 1i64 << (self.bits() - 1);
            values.iter_mut().for_each(|v| *v += bias);
        }
        Ok(values)
    }
}

impl TryFrom<u8> for SampleFormat {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(SampleFormat::I8),
            1 => Ok(SampleFormat::U8),
            2 => Ok(SampleFormat::I16),
            3 => Ok(SampleFormat::U16),
            4 => Ok(SampleFormat::I32),
            5 => Ok(SampleFormat::U32),
            other => Err(Error::UnsupportedSampleFormat(other)),
        }
    }
}

/// Where a ping was found in a GWF file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[derive(Deserialize, Serialize)]
pub struct RecordLocation {
    /// Byte offset of the ping header
    pub offset: u64,
    /// Encoded size of the ping including all of its beams
    pub size: u64,
}

/// One receive beam of a ping
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[derive(Deserialize, Serialize)]
pub struct Beam {
    /// Amplitude samples in the ping's amplitude format
    pub amplitude_samples: Vec<u8>,
    /// Phase samples in the ping's phase format, empty if the vendor has none
    pub phase_samples: Vec<u8>,
    /// Opaque vendor metadata for this beam
    pub generic_data: Vec<u8>,
}

impl Beam {
    /// Create a new Beam from the given data
    pub fn new(amplitude_samples: Vec<u8>, phase_samples: Vec<u8>, generic_data: Vec<u8>) -> Beam {
        Beam {
            amplitude_samples,
            phase_samples,
            generic_data,
        }
    }
}

/// A representation of one water column ping
///
#[derive(Debug, Clone, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Ping {
    /// The vendor-assigned ping number
    ///
    /// This is not unique across files.
    pub ping_number: u32,
    /// The time at which the ping was transmitted, in UTC
    #[serde(with = "time::serde::timestamp")]
    pub timestamp: OffsetDateTime,
    /// Encoding of every beam's amplitude samples
    pub amplitude_format: SampleFormat,
    /// Encoding of every beam's phase samples
    pub phase_format: SampleFormat,
    /// Opaque vendor metadata, preserved byte for byte
    pub generic_data: Vec<u8>,
    /// The beams in vendor order
    pub beams: Vec<Beam>,
    /// Position in the GWF file this ping was read from
    ///
    /// Only set on pings read back from a GWF file.
    pub location: Option<RecordLocation>,
}

impl Ping {
    /// Create a new Ping from the given data
    pub fn new(
        ping_number: u32,
        timestamp: OffsetDateTime,
        amplitude_format: SampleFormat,
        phase_format: SampleFormat,
        generic_data: Vec<u8>,
        beams: Vec<Beam>,
    ) -> Ping {
        Ping {
            ping_number,
            timestamp,
            amplitude_format,
            phase_format,
            generic_data,
            beams,
            location: None,
        }
    }

    /// Check that every beam holds a whole number of samples
    pub fn validate(&self) -> Result<()> {
        for (index, beam) in self.beams.iter().enumerate() {
            for (bytes, format) in [
                (&beam.amplitude_samples, self.amplitude_format),
                (&beam.phase_samples, self.phase_format),
            ] {
                if bytes.len() % format.width() != 0 {
                    return Err(Error::InvalidSampleLength {
                        beam: index,
                        len: bytes.len(),
                        width: format.width(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Decoded amplitudes of one beam
    pub fn amplitudes(&self, beam: usize) -> Option<Result<Vec<i64>>> {
        self.beams
            .get(beam)
            .map(|b| self.amplitude_format.decode(&b.amplitude_samples))
    }

    /// A samples-by-beams matrix of display amplitudes
    ///
    /// Only every `decimate`-th sample is kept. Beams shorter than the
    /// longest beam are padded with zeros.
    pub fn amplitude_array(&self, decimate: usize) -> Result<Vec<Vec<i64>>> {
        let decimate = decimate.max(1);
        let beams = self
            .beams
            .iter()
            .map(|b| self.amplitude_format.decode_biased(&b.amplitude_samples))
            .collect::<Result<Vec<_>>>()?;
        let longest = beams.iter().map(Vec::len).max().unwrap_or(0);
        let height = (longest + decimate - 1) / decimate;

        let mut array = vec![vec![0; beams.len()]; height];
        for (column, samples) in beams.iter().enumerate() {
            for (row, sample) in samples.iter().step_by(decimate).enumerate() {
                array[row][column] = *sample;
            }
        }
        Ok(array)
    }
}
