//! Parsing Reson .s7k files
//!
//! An s7k file is a sequence of Data Record Frames (DRF). Every frame has
//! a 64 byte header, a payload whose layout depends on the record type
//! and a 4 byte checksum. The checksum is read but not verified.
//!
//! Water column data come in record types 7008 (generic magnitude and
//! phase) and 7018 (beamformed). Type 7042 (compressed water column) is
//! recognized but not decoded.
use super::{unknown_make_and_model, PingIter, Source, WaterColumnParser};
use crate::binary;
use crate::error::{Error, Result};
use crate::model::{Beam, Ping, SampleFormat};
use binrw::{binread, io::Cursor, BinRead};
use log::debug;
use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use time::{Date, OffsetDateTime};

/// Size of the frame header
pub const FRAME_HEADER_SIZE: u32 = 64;
/// Size of the checksum trailer
pub const CHECKSUM_SIZE: u32 = 4;
/// Bytes of every frame that are not payload
pub const FRAME_OVERHEAD: u32 = FRAME_HEADER_SIZE + CHECKSUM_SIZE;

/// 7k Generic Data Record
pub const GENERIC_WATER_COLUMN: u32 = 7008;
/// Beamformed Data Record
pub const BEAMFORMED: u32 = 7018;
/// Compressed Water Column Data Record
pub const COMPRESSED_WATER_COLUMN: u32 = 7042;
/// Record types that carry water column data
pub const WATER_COLUMN_RECORDS: [u32; 3] = [GENERIC_WATER_COLUMN, BEAMFORMED, COMPRESSED_WATER_COLUMN];

/// The Data Record Frame header
#[binread]
#[br(little)]
#[derive(Debug, Clone, PartialEq)]
pub struct FrameHeader {
    /// Protocol version
    pub protocol_version: u16,
    /// Offset from the sync pattern to the payload
    pub offset: u16,
    /// Sync pattern, 0x0000FFFF
    pub sync_pattern: u32,
    /// Size of the whole frame including header and checksum
    #[br(assert(size >= FRAME_OVERHEAD))]
    pub size: u32,
    /// Offset of the optional data, 0 if none
    pub optional_data_offset: u32,
    /// Identifier of the optional data
    pub optional_data_identifier: u32,
    /// Year
    pub year: u16,
    /// Day of the year, starting at 1
    pub day: u16,
    /// Seconds, with fractional part
    pub seconds: f32,
    /// Hour
    pub hours: u8,
    /// Minute
    #[br(pad_after = 2)]
    pub minutes: u8,
    /// The record type identifier
    pub record_type: u32,
    /// The device identifier
    #[br(pad_after = 2)]
    pub device_identifier: u32,
    /// System enumerator
    #[br(pad_after = 4)]
    pub system_enumerator: u16,
    /// Flags
    #[br(pad_after = 6)]
    pub flags: u16,
    /// Total records in a fragmented data record set
    pub total_fragments: u32,
    /// Fragment number
    pub fragment_number: u32,
}

impl FrameHeader {
    /// The frame time from the year, day of year and time of day
    pub fn timestamp(&self) -> Result<OffsetDateTime> {
        let seconds = f64::from(self.seconds);
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(Error::InvalidTimestamp(format!("{} seconds", self.seconds)));
        }
        let whole = seconds.floor();
        let micros = ((seconds - whole) * 1e6).floor() as u32;
        let date = Date::from_ordinal_date(i32::from(self.year), self.day)?;
        let datetime = date.with_hms_micro(self.hours, self.minutes, whole.min(255.0) as u8, micros)?;
        Ok(datetime.assume_utc())
    }
}

/// One Data Record Frame
#[binread]
#[br(little)]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFrame {
    #[br(restore_position, count = FRAME_HEADER_SIZE)]
    raw_header: Vec<u8>,
    /// The decoded header
    pub header: FrameHeader,
    /// The record payload
    #[br(count = header.size - FRAME_OVERHEAD)]
    pub payload: Vec<u8>,
    /// The checksum trailer, not verified
    pub checksum: u32,
}

impl RecordFrame {
    /// The record type identifier
    pub fn record_type(&self) -> u32 {
        self.header.record_type
    }

    /// The header bytes as they appeared in the file
    pub fn raw_header(&self) -> &[u8] {
        &self.raw_header
    }

    /// Decode the payload according to the record type
    pub fn record(&self) -> Result<Record> {
        Ok(match self.header.record_type {
            GENERIC_WATER_COLUMN => {
                Record::GenericWaterColumn(GenericWaterColumnRecord::parse(&self.payload)?)
            }
            BEAMFORMED => Record::Beamformed(BeamformedRecord::parse(&self.payload)?),
            COMPRESSED_WATER_COLUMN => Record::CompressedWaterColumn {
                size: self.payload.len(),
            },
            record_type => Record::Unknown {
                record_type,
                size: self.payload.len(),
            },
        })
    }

    /// Convert a water column frame into a normalized ping
    pub fn into_ping(self) -> Result<Ping> {
        let timestamp = self.header.timestamp()?;
        match self.record()? {
            Record::GenericWaterColumn(r) => Ok(r.into_ping(timestamp)),
            Record::Beamformed(r) => {
                let mut generic_data = self.raw_header;
                generic_data.extend_from_slice(&self.checksum.to_le_bytes());
                Ok(r.into_ping(timestamp, generic_data))
            }
            _ => Err(Error::UnsupportedRecord(self.header.record_type)),
        }
    }
}

/// The payload of a frame
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Record 7008
    GenericWaterColumn(GenericWaterColumnRecord),
    /// Record 7018
    Beamformed(BeamformedRecord),
    /// Record 7042, not decoded
    CompressedWaterColumn {
        /// Payload size in bytes
        size: usize,
    },
    /// Any other record, skipped
    Unknown {
        /// The record type identifier
        record_type: u32,
        /// Payload size in bytes
        size: usize,
    },
}

/// Name of a record type
pub fn record_name(record_type: u32) -> &'static str {
    match record_type {
        1003 => "Position Record",
        1008 => "Depth Record",
        1010 => "CTD Data Record",
        1012 => "Roll Pitch Heave Record",
        1013 => "Heading Record",
        1015 => "Navigation Record",
        1016 => "Attitude Record",
        7000 => "7K Sonar Settings Record",
        7001 => "7K Configuration Record",
        7004 => "7K Beam Geometry Record",
        7006 => "7K Bathymetric Data",
        7007 => "7K Backscatter Record",
        7008 => "7k Generic Data Record",
        7009 => "Vertical Depth Record",
        7018 => "Beam Formed Data Record",
        7022 => "7K Center Version Record",
        7027 => "Raw Bathymetry Record (3D)",
        7028 => "Snippets Data Record",
        7030 => "Sonar Installation Parameters Record",
        7042 => "Compressed Water Column Data Record",
        7200 => "7k File Header",
        _ => "Unknown Record Type",
    }
}

/// Name of a 7k device identifier
pub fn device_name(device_identifier: u32) -> Option<&'static str> {
    let name = match device_identifier {
        20 => "RESON SeaBat T20-P",
        50 => "RESON SeaBat T50-P",
        100 => "Generic Position Sensor (e.g., GPS)",
        101 => "Generic Heading Sensor (e.g., Gyro)",
        102 => "Generic Attitude Sensor",
        103 => "Generic MBES",
        104 => "Generic Side-scan Sonar",
        105 => "Generic Sub-bottom Profiler",
        1000 => "Odom Odom MB1",
        1001 => "TrueTime PCISG",
        1002 => "Odom Odom MB2",
        2000 => "CDC SMCG 2001 CDC SPG",
        2002 => "Empire Magnetics YS2000 Rotator",
        4013 => "RESON TC4013",
        6000 => "RESON DiverDat",
        7000 => "RESON 7kCenter",
        7001 => "RESON 7k User Interface",
        7003 => "RESON Teledyne PDS",
        7004 => "RESON 7k Logger",
        7005 => "BlueView BlueView ProScan",
        7012 => "RESON SeaBat",
        7100 => "RESON SeaBat 7100",
        7101 => "RESON SeaBat 7101",
        7102 => "RESON SeaBat 7102",
        7111 => "RESON SeaBat 7111",
        7112 => "RESON SeaBat 7112",
        7123 => "RESON SeaBat 7123",
        7125 => "RESON SeaBat 7125",
        7128 => "RESON SeaBat 7128",
        7150 => "RESON SeaBat 7150",
        _ => return None,
    };
    Some(name)
}

/// The fixed header of a 7008 record
#[binread]
#[br(little)]
#[derive(Debug, Clone, PartialEq)]
pub struct GenericWaterColumnHeader {
    /// Sonar serial number
    pub sonar_id: u64,
    /// Sequential ping number
    pub ping_number: u32,
    /// Position within a multi-ping sequence
    pub multi_ping_sequence: u16,
    /// Number of beams
    #[br(pad_after = 2)]
    pub beam_count: u16,
    /// Samples in every beam
    pub samples_per_ping: u32,
    /// Whether only a subset of beams and samples is present
    pub record_subset_flag: u8,
    /// 0 if samples are stored sample-major, 1 if beam-major
    #[br(pad_after = 2)]
    pub row_column_flag: u8,
    /// Magnitude type in bits 0-3, phase type in bits 4-7
    pub sample_type: u32,
}

impl GenericWaterColumnHeader {
    /// Size of the encoded header
    pub const SIZE: usize = 30;
    /// The only supported sample type, 16 bit magnitude and 16 bit phase
    pub const MAGNITUDE_PHASE_16: u32 = 0x22;
}

/// Per-beam descriptor of a 7008 record
#[binread]
#[br(little)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamDescriptor {
    /// Beam number
    pub descriptor: u16,
    /// First sample included for this beam
    pub first_sample: u32,
    /// Last sample included for this beam
    pub last_sample: u32,
}

impl BeamDescriptor {
    /// Size of an encoded descriptor
    pub const SIZE: usize = 10;

    fn sample_count(&self) -> Option<u64> {
        u64::from(self.last_sample)
            .checked_sub(u64::from(self.first_sample))
            .map(|n| n + 1)
    }
}

/// A decoded beam of a 7008 record
#[derive(Debug, Clone, PartialEq)]
pub struct GenericWaterColumnBeam {
    /// The beam descriptor
    pub descriptor: BeamDescriptor,
    /// The descriptor bytes as they appeared in the record
    pub descriptor_bytes: Vec<u8>,
    /// Magnitude samples
    pub amplitude: Vec<u16>,
    /// Phase samples
    pub phase: Vec<i16>,
}

/// A 7008 Generic Data Record
#[derive(Debug, Clone, PartialEq)]
pub struct GenericWaterColumnRecord {
    /// The fixed header
    pub header: GenericWaterColumnHeader,
    /// The header bytes followed by any bytes after the sample block
    pub header_bytes: Vec<u8>,
    /// The decoded beams
    pub beams: Vec<GenericWaterColumnBeam>,
}

/// Index of the amplitude/phase unit for a sample of a beam
fn unit_index(row_column_flag: u8, sample: usize, beam: usize, samples: usize, beams: usize) -> usize {
    if row_column_flag == 0 {
        sample * beams + beam
    } else {
        beam * samples + sample
    }
}

impl GenericWaterColumnRecord {
    /// Decode a 7008 payload
    ///
    /// # Errors
    ///
    /// Only 16 bit magnitude with 16 bit phase is supported, and every
    /// beam must span the whole ping.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let header_slice = binary::slice(payload, 0, GenericWaterColumnHeader::SIZE)?;
        let header = GenericWaterColumnHeader::read(&mut Cursor::new(header_slice))?;
        if header.sample_type != GenericWaterColumnHeader::MAGNITUDE_PHASE_16 {
            return Err(Error::UnsupportedSampleType(header.sample_type));
        }

        let beams = usize::from(header.beam_count);
        let samples = header.samples_per_ping as usize;
        let table = binary::slice(payload, GenericWaterColumnHeader::SIZE, beams * BeamDescriptor::SIZE)?;
        let descriptors = table
            .chunks_exact(BeamDescriptor::SIZE)
            .map(|c| BeamDescriptor::read(&mut Cursor::new(c)))
            .collect::<binrw::BinResult<Vec<_>>>()?;
        for (beam, d) in descriptors.iter().enumerate() {
            if d.sample_count() != Some(samples as u64) {
                return Err(Error::UnsupportedBeamExtent {
                    beam,
                    samples: d.sample_count().unwrap_or(0),
                    expected: samples as u64,
                });
            }
        }

        let block_start = GenericWaterColumnHeader::SIZE + table.len();
        let block_len = beams
            .checked_mul(samples)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| Error::InvalidFrame("7008 sample block size overflows".to_string()))?;
        let block = binary::slice(payload, block_start, block_len)?;

        let mut decoded = Vec::with_capacity(beams);
        for (b, descriptor) in descriptors.into_iter().enumerate() {
            let mut amplitude = Vec::with_capacity(samples);
            let mut phase = Vec::with_capacity(samples);
            for s in 0..samples {
                let at = 4 * unit_index(header.row_column_flag, s, b, samples, beams);
                amplitude.push(u16::from_le_bytes([block[at], block[at + 1]]));
                phase.push(i16::from_le_bytes([block[at + 2], block[at + 3]]));
            }
            let at_table = b * BeamDescriptor::SIZE;
            decoded.push(GenericWaterColumnBeam {
                descriptor,
                descriptor_bytes: table[at_table..at_table + BeamDescriptor::SIZE].to_vec(),
                amplitude,
                phase,
            });
        }

        let mut header_bytes = header_slice.to_vec();
        let trailing = &payload[block_start + block_len..];
        if !trailing.is_empty() {
            debug!("7008 record has {} bytes after the sample block", trailing.len());
            header_bytes.extend_from_slice(trailing);
        }

        Ok(GenericWaterColumnRecord {
            header,
            header_bytes,
            beams: decoded,
        })
    }

    /// Convert into a normalized ping
    pub fn into_ping(self, timestamp: OffsetDateTime) -> Ping {
        let beams = self
            .beams
            .into_iter()
            .map(|b| {
                Beam::new(
                    binary::pack_u16(&b.amplitude),
                    binary::pack_i16(&b.phase),
                    b.descriptor_bytes,
                )
            })
            .collect();
        Ping::new(
            self.header.ping_number,
            timestamp,
            SampleFormat::U16,
            SampleFormat::I16,
            self.header_bytes,
            beams,
        )
    }
}

/// The fixed header of a 7018 record
#[binread]
#[br(little)]
#[derive(Debug, Clone, PartialEq)]
pub struct BeamformedHeader {
    /// Sonar serial number
    pub sonar_id: u64,
    /// Sequential ping number
    pub ping_number: u32,
    /// Position within a multi-ping sequence
    pub multi_ping_sequence: u16,
    /// Number of beams
    pub beam_count: u16,
    /// Samples per beam
    #[br(pad_after = 32)]
    pub sample_count: u32,
}

impl BeamformedHeader {
    /// Size of the encoded header
    pub const SIZE: usize = 52;
}

/// A 7018 Beamformed Data Record
#[derive(Debug, Clone, PartialEq)]
pub struct BeamformedRecord {
    /// The fixed header
    pub header: BeamformedHeader,
    /// The header bytes as they appeared in the record
    pub header_bytes: Vec<u8>,
    /// Amplitude per beam
    pub amplitude: Vec<Vec<u16>>,
    /// Phase per beam
    pub phase: Vec<Vec<i16>>,
}

impl BeamformedRecord {
    /// Decode a 7018 payload
    ///
    /// Samples are stored as a [sample][beam] matrix of amplitude/phase
    /// pairs.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let header_slice = binary::slice(payload, 0, BeamformedHeader::SIZE)?;
        let header = BeamformedHeader::read(&mut Cursor::new(header_slice))?;
        let beams = usize::from(header.beam_count);
        let samples = header.sample_count as usize;
        let matrix_len = beams
            .checked_mul(samples)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| Error::InvalidFrame("7018 sample matrix size overflows".to_string()))?;
        let matrix = binary::slice(payload, BeamformedHeader::SIZE, matrix_len)?;

        let mut amplitude: Vec<Vec<u16>> = (0..beams).map(|_| Vec::with_capacity(samples)).collect();
        let mut phase: Vec<Vec<i16>> = (0..beams).map(|_| Vec::with_capacity(samples)).collect();
        if beams > 0 {
            for row in matrix.chunks_exact(4 * beams) {
                for (b, unit) in row.chunks_exact(4).enumerate() {
                    amplitude[b].push(u16::from_le_bytes([unit[0], unit[1]]));
                    phase[b].push(i16::from_le_bytes([unit[2], unit[3]]));
                }
            }
        }

        Ok(BeamformedRecord {
            header,
            header_bytes: header_slice.to_vec(),
            amplitude,
            phase,
        })
    }

    /// Convert into a normalized ping
    ///
    /// `frame_bytes` (the frame header and checksum) are placed before the
    /// record header in the ping's generic data.
    pub fn into_ping(self, timestamp: OffsetDateTime, mut frame_bytes: Vec<u8>) -> Ping {
        frame_bytes.extend_from_slice(&self.header_bytes);
        let beams = self
            .amplitude
            .iter()
            .zip(&self.phase)
            .map(|(a, p)| Beam::new(binary::pack_u16(a), binary::pack_i16(p), Vec::new()))
            .collect();
        Ping::new(
            self.header.ping_number,
            timestamp,
            SampleFormat::U16,
            SampleFormat::I16,
            frame_bytes,
            beams,
        )
    }
}

/// An iterator over the frames of an s7k stream
///
/// Iteration ends at the end of the stream. A frame that runs past the
/// end is reported once as an error, after which iteration ends.
pub struct FrameReader<R: Read + Seek> {
    reader: R,
    len: u64,
    done: bool,
}

impl<R: Read + Seek> FrameReader<R> {
    /// Create a frame reader from a reader positioned at a frame
    pub fn new(mut reader: R) -> Result<Self> {
        let len = binary::stream_len(&mut reader)?;
        Ok(FrameReader {
            reader,
            len,
            done: false,
        })
    }

    fn read_frame(&mut self) -> Result<Option<RecordFrame>> {
        let offset = self.reader.stream_position()?;
        if offset >= self.len {
            return Ok(None);
        }
        let available = self.len - offset;
        if available < u64::from(FRAME_HEADER_SIZE) {
            return Err(Error::Truncated {
                offset,
                needed: u64::from(FRAME_HEADER_SIZE),
                available,
            });
        }
        let header = FrameHeader::read(&mut self.reader)?;
        self.reader.seek(SeekFrom::Start(offset))?;
        if u64::from(header.size) > available {
            return Err(Error::Truncated {
                offset,
                needed: u64::from(header.size),
                available,
            });
        }
        Ok(Some(RecordFrame::read(&mut self.reader)?))
    }
}

impl<R: Read + Seek> Iterator for FrameReader<R> {
    type Item = Result<RecordFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
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

fn is_water_column(frame: &Result<RecordFrame>) -> bool {
    frame
        .as_ref()
        .map_or(true, |f| WATER_COLUMN_RECORDS.contains(&f.record_type()))
}

/// Decoder for Reson .s7k files
#[derive(Default)]
pub struct ResonParser {
    source: Option<Source>,
    first_water_column: Option<Option<u32>>,
}

impl ResonParser {
    /// Create a parser with no file open
    pub fn new() -> Self {
        Self::default()
    }

    /// The device identifier of the first water column frame
    fn probe(&mut self) -> Result<Option<u32>> {
        if let Some(found) = self.first_water_column {
            return Ok(found);
        }
        let source = self.source.as_mut().ok_or(Error::NotOpen)?;
        let path = source.path().to_path_buf();
        let found = FrameReader::new(source.rewind()?)?
            .find(is_water_column)
            .transpose()?
            .map(|f| f.header.device_identifier);
        if found.is_none() {
            debug!("No water column data in {}", path.display());
        }
        self.first_water_column = Some(found);
        Ok(found)
    }
}

impl WaterColumnParser for ResonParser {
    fn supported_extensions(&self) -> &'static [&'static str] {
        &[".s7k"]
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
            Some(device) => (
                "Reson".to_string(),
                device_name(device)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Unknown {}", device)),
            ),
            None => unknown_make_and_model(),
        })
    }

    fn water_column_packets(&mut self) -> Result<PingIter<'_>> {
        let source = self.source.as_mut().ok_or(Error::NotOpen)?;
        let pings = FrameReader::new(source.rewind()?)?
            .filter(is_water_column)
            .map(|f| f.and_then(RecordFrame::into_ping));
        Ok(Box::new(pings))
    }

    fn record_counts(&mut self) -> Result<BTreeMap<String, u64>> {
        let source = self.source.as_mut().ok_or(Error::NotOpen)?;
        let mut counts = BTreeMap::new();
        for frame in FrameReader::new(source.rewind()?)? {
            let name = record_name(frame?.record_type());
            *counts.entry(name.to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }
}
