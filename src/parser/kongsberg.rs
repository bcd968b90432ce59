//! Parsing Kongsberg .all and .wcd files
//!
//! Both formats are a flat sequence of datagrams, each starting with a
//! 4 byte length that counts everything after itself. Water column data
//! live in datagram type 107, which a sonar may split across several
//! datagrams per ping; [`Congregator`] puts them back together.
use super::congregate::Congregator;
use super::{unknown_make_and_model, PingIter, Source, WaterColumnParser};
use crate::binary;
use crate::config::DecoderConfig;
use crate::error::{Error, Result};
use crate::model::{Beam, Ping, SampleFormat};
use binrw::{binread, io::Cursor, BinRead};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use time::{Date, Duration, Month, OffsetDateTime};

/// The datagram type carrying water column data
pub const WATER_COLUMN_DATAGRAM: u8 = 107;
/// Size of the length/STX/type/model prefix of every datagram
pub const PREFIX_SIZE: usize = 8;

/// The fixed start of every datagram
#[binread]
#[br(little)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatagramPrefix {
    /// Number of bytes following this field
    pub length: u32,
    /// Start byte, always 0x02
    pub stx: u8,
    /// The datagram type code
    pub datagram_type: u8,
    /// The echo sounder model number
    pub model: u16,
}

/// One raw datagram
#[derive(Debug, Clone, PartialEq)]
pub struct Datagram {
    /// The decoded prefix
    pub prefix: DatagramPrefix,
    /// Every byte of the datagram, length field included
    pub data: Vec<u8>,
}

impl Datagram {
    /// The datagram type code
    pub fn datagram_type(&self) -> u8 {
        self.prefix.datagram_type
    }

    /// The echo sounder model number
    pub fn model(&self) -> u16 {
        self.prefix.model
    }
}

/// Name of a datagram type
pub fn datagram_name(datagram_type: u8) -> &'static str {
    match datagram_type {
        48 => "PU Id Output",
        49 => "PU Status",
        65 => "Attitude",
        67 => "Clock",
        68 => "Depth",
        69 => "Single Beam Depth",
        71 => "Surface Sound Speed",
        72 => "Heading",
        73 => "Installation Parameters",
        74 => "Transducer Tilt",
        78 => "Raw Range and Angle 78",
        80 => "Position",
        82 => "Runtime Parameters",
        83 => "Seabed Image",
        85 => "Sound Speed Profile",
        88 => "XYZ 88",
        89 => "Seabed Image 89",
        102 => "Raw Range and Angle",
        104 => "Depth or Height",
        105 => "Installation Parameters Stop",
        107 => "Water Column",
        110 => "Network Attitude Velocity",
        _ => "Unknown",
    }
}

/// An iterator over the datagrams of a Kongsberg stream
///
/// A clean end of input or a partial prefix ends iteration. A datagram
/// body shorter than its declared length is reported as an error, after
/// which iteration ends.
pub struct DatagramReader<R: Read> {
    reader: R,
    position: u64,
    done: bool,
}

impl<R: Read> DatagramReader<R> {
    /// Create a datagram reader from a reader positioned at a datagram
    pub fn new(reader: R) -> Self {
        DatagramReader {
            reader,
            position: 0,
            done: false,
        }
    }

    fn read_datagram(&mut self) -> Result<Option<Datagram>> {
        let mut head = [0u8; PREFIX_SIZE];
        let n = binary::read_available(&mut self.reader, &mut head)?;
        if n == 0 {
            return Ok(None);
        }
        if n < PREFIX_SIZE {
            warn!(
                "Truncated datagram prefix at byte {}: {} of {} bytes",
                self.position, n, PREFIX_SIZE
            );
            return Ok(None);
        }
        let prefix = DatagramPrefix::read(&mut Cursor::new(&head[..]))?;

        let size = u64::from(prefix.length) + 4;
        if size < PREFIX_SIZE as u64 {
            return Err(Error::InvalidFrame(format!(
                "datagram at byte {} declares {} bytes",
                self.position, prefix.length
            )));
        }
        // Grows only as far as the stream actually goes
        let body_len = size - PREFIX_SIZE as u64;
        let mut data = head.to_vec();
        let body = (&mut self.reader).take(body_len).read_to_end(&mut data)? as u64;
        if body < body_len {
            return Err(Error::Truncated {
                offset: self.position,
                needed: size,
                available: body + PREFIX_SIZE as u64,
            });
        }
        self.position += size;
        Ok(Some(Datagram { prefix, data }))
    }
}

impl<R: Read> Iterator for DatagramReader<R> {
    type Item = Result<Datagram>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_datagram() {
            Ok(Some(d)) => Some(Ok(d)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// The fixed header of a water column datagram
#[binread]
#[br(little)]
#[derive(Debug, Clone, PartialEq)]
pub struct WaterColumnHeader {
    /// Number of bytes in the datagram, summed over merged sub-packets
    pub datagram_size: u32,
    /// Start byte
    pub stx: u8,
    /// Always [`WATER_COLUMN_DATAGRAM`]
    pub datagram_type: u8,
    /// Echo sounder model number
    pub model: u16,
    /// Date as YYYYMMDD
    pub date: u32,
    /// Milliseconds since midnight
    pub time_ms: u32,
    /// Ping counter
    pub ping_number: u16,
    /// System serial number, one per sonar head
    pub serial_number: u16,
    /// Number of datagrams this ping was split into
    pub number_of_datagrams: u16,
    /// Index of this datagram within the ping
    pub datagram_number: u16,
    /// Number of transmit sectors
    pub tx_sector_count: u16,
    /// Receive beams in the whole ping
    pub total_receive_beams: u16,
    /// Receive beams in this datagram
    pub beams_in_datagram: u16,
    /// Sound speed in 0.1 m/s
    pub sound_speed: u16,
    /// Sampling frequency in 0.01 Hz
    pub sampling_frequency: u32,
    /// Transmit time heave in cm
    pub tx_time_heave: i16,
    /// TVG function applied (X in X log R)
    pub tvg_function: u8,
    /// TVG offset in dB (C)
    pub tvg_offset: i8,
    /// Scanning info
    #[br(pad_after = 3)]
    pub scanning_info: u8,
}

impl WaterColumnHeader {
    /// Size of the encoded header
    pub const SIZE: usize = 44;

    /// The ping time from the packed date and milliseconds of day
    pub fn ping_time(&self) -> Result<OffsetDateTime> {
        let year = (self.date / 10_000) as i32;
        let month = Month::try_from(((self.date / 100) % 100) as u8)?;
        let day = (self.date % 100) as u8;
        let date = Date::from_calendar_date(year, month, day)?;
        Ok(date.midnight().assume_utc() + Duration::milliseconds(i64::from(self.time_ms)))
    }
}

/// A transmit sector descriptor
#[binread]
#[br(little)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TxSector {
    tilt_angle: i16,
    center_frequency: u16,
    /// Transmit sector index
    #[br(pad_after = 1)]
    pub sector_number: u8,
}

impl TxSector {
    /// Size of an encoded sector descriptor
    pub const SIZE: usize = 6;

    /// Tilt angle in degrees
    pub fn tilt_angle(&self) -> f64 {
        f64::from(self.tilt_angle) * 0.01
    }

    /// Center frequency in Hz
    pub fn center_frequency(&self) -> u32 {
        u32::from(self.center_frequency) * 10
    }
}

/// One receive beam of a water column datagram
#[binread]
#[br(little)]
#[derive(Debug, Clone, PartialEq)]
pub struct WaterColumnBeam {
    beam_angle: i16,
    /// First sample index
    pub start_range_sample: u16,
    /// Number of amplitude samples
    pub sample_count: u16,
    /// Detected range in samples
    pub detection_range: u16,
    /// Transmit sector this beam belongs to
    pub transmit_sector: u8,
    /// Beam index
    pub beam_number: u8,
    /// Amplitude samples in 0.5 dB steps
    #[br(count = sample_count)]
    pub samples: Vec<u8>,
    /// The encoded beam header
    #[br(ignore)]
    pub header_bytes: Vec<u8>,
}

impl WaterColumnBeam {
    /// Size of the encoded beam header
    pub const HEADER_SIZE: usize = 10;

    /// Beam pointing angle in degrees
    pub fn beam_angle(&self) -> f64 {
        f64::from(self.beam_angle) * 0.01
    }
}

/// A decoded water column datagram (or a merged group of them)
#[derive(Debug, Clone, PartialEq)]
pub struct WaterColumnDatagram {
    /// The fixed header
    pub header: WaterColumnHeader,
    /// Transmit sector descriptors
    pub sectors: Vec<TxSector>,
    /// Receive beams in arrival order
    pub beams: Vec<WaterColumnBeam>,
    /// Every byte of the datagram that is not part of a beam
    pub generic_data: Vec<u8>,
}

impl WaterColumnDatagram {
    /// Decode a type 107 datagram
    pub fn parse(datagram: &Datagram) -> Result<Self> {
        let data = &datagram.data;
        let short = |_| {
            Error::InvalidFrame(format!(
                "water column datagram of {} bytes is shorter than its declared contents",
                data.len()
            ))
        };
        binary::slice(data, 0, WaterColumnHeader::SIZE)?;

        let mut cursor = Cursor::new(&data[..]);
        let header = WaterColumnHeader::read(&mut cursor)?;
        let sectors = (0..header.tx_sector_count)
            .map(|_| TxSector::read(&mut cursor))
            .collect::<binrw::BinResult<Vec<_>>>()
            .map_err(short)?;
        let beams_start = cursor.position() as usize;

        let mut beams = Vec::with_capacity(usize::from(header.beams_in_datagram));
        for _ in 0..header.beams_in_datagram {
            let start = cursor.position() as usize;
            let mut beam = WaterColumnBeam::read(&mut cursor).map_err(short)?;
            beam.header_bytes = data[start..start + WaterColumnBeam::HEADER_SIZE].to_vec();
            beams.push(beam);
        }
        let beams_end = cursor.position() as usize;

        let mut generic_data = data[..beams_start].to_vec();
        generic_data.extend_from_slice(&data[beams_end..]);

        Ok(WaterColumnDatagram {
            header,
            sectors,
            beams,
            generic_data,
        })
    }

    /// Convert into a normalized ping
    ///
    /// Amplitudes are signed 8 bit. This vendor provides no phase.
    pub fn into_ping(self) -> Result<Ping> {
        let timestamp = self.header.ping_time()?;
        let beams = self
            .beams
            .into_iter()
            .map(|b| Beam::new(b.samples, Vec::new(), b.header_bytes))
            .collect();
        Ok(Ping::new(
            u32::from(self.header.ping_number),
            timestamp,
            SampleFormat::I8,
            SampleFormat::I8,
            self.generic_data,
            beams,
        ))
    }
}

/// Decoder for Kongsberg .all and .wcd files
pub struct KongsbergParser {
    config: DecoderConfig,
    source: Option<Source>,
    first_water_column: Option<Option<u16>>,
}

impl KongsbergParser {
    /// A parser with the default configuration
    pub fn new() -> Self {
        Self::with_config(DecoderConfig::default())
    }

    /// A parser with the given configuration
    pub fn with_config(config: DecoderConfig) -> Self {
        KongsbergParser {
            config,
            source: None,
            first_water_column: None,
        }
    }

    /// The model number of the first water column datagram
    fn probe(&mut self) -> Result<Option<u16>> {
        if let Some(found) = self.first_water_column {
            return Ok(found);
        }
        let source = self.source.as_mut().ok_or(Error::NotOpen)?;
        let path = source.path().to_path_buf();
        let mut found = None;
        for datagram in DatagramReader::new(source.rewind()?) {
            let datagram = datagram?;
            if datagram.datagram_type() == WATER_COLUMN_DATAGRAM {
                found = Some(datagram.model());
                break;
            }
        }
        if found.is_none() {
            debug!("No water column data in {}", path.display());
        }
        self.first_water_column = Some(found);
        Ok(found)
    }
}

impl Default for KongsbergParser {
    fn default() -> Self {
        Self::new()
    }
}

impl WaterColumnParser for KongsbergParser {
    fn supported_extensions(&self) -> &'static [&'static str] {
        &[".all", ".wcd"]
    }

    fn open(&mut self, path: &Path) -> Result<()> {
        self.close();
        self.source = Some(Source::open(path)?);
        Ok(())
    }

    fn close(&mut self) {
        self.source = None;
        self.first_water_column = None;
    }

    fn contains_water_column_data(&mut self) -> Result<bool> {
        Ok(self.probe()?.is_some())
    }

    fn make_and_model(&mut self) -> Result<(String, String)> {
        Ok(match self.probe()? {
            Some(model) => ("Kongsberg".to_string(), model.to_string()),
            None => unknown_make_and_model(),
        })
    }

    fn water_column_packets(&mut self) -> Result<PingIter<'_>> {
        let config = self.config;
        let source = self.source.as_mut().ok_or(Error::NotOpen)?;
        let datagrams = DatagramReader::new(source.rewind()?)
            .filter(|d| {
                d.as_ref()
                    .map_or(true, |d| d.datagram_type() == WATER_COLUMN_DATAGRAM)
            })
            .map(|d| d.and_then(|d| WaterColumnDatagram::parse(&d)));
        let pings = Congregator::new(datagrams, config).map(|p| p.and_then(WaterColumnDatagram::into_ping));
        Ok(Box::new(pings))
    }

    fn record_counts(&mut self) -> Result<BTreeMap<String, u64>> {
        let source = self.source.as_mut().ok_or(Error::NotOpen)?;
        let mut counts = BTreeMap::new();
        for datagram in DatagramReader::new(source.rewind()?) {
            let name = datagram_name(datagram?.datagram_type());
            *counts.entry(name.to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }
}
