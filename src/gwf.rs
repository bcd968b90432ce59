//! Reading and writing Generic Water Column Format files
//!
//! A GWF file is a bare sequence of ping records with no file header.
//! Each ping record is a fixed header, the ping's generic data and then
//! every beam as a fixed header followed by its three byte blobs. All
//! integers are little-endian.
//!
//! ```text
//! ping:  u32 ping_number | u32 seconds | u32 microseconds | u16 beams
//!        u8 amplitude_format | u8 phase_format | u16 generic_len | generic
//! beam:  u32 amplitude_len | u32 phase_len | u16 generic_len
//!        amplitude | phase | generic
//! ```
//!
//! The end of a file is only detectable by comparing the cursor with the
//! file length.
use crate::binary;
use crate::error::{Error, Result};
use crate::model::{Beam, Ping, RecordLocation, SampleFormat};
use binrw::{binrw, io::BufReader, BinRead, BinWrite};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use time::{Duration, OffsetDateTime};

/// Size of an encoded ping header
pub const PING_HEADER_SIZE: u64 = 18;
/// Size of an encoded beam header
pub const BEAM_HEADER_SIZE: u64 = 10;

#[binrw]
#[brw(little)]
#[derive(Debug, PartialEq)]
struct PingHeader {
    ping_number: u32,
    time_seconds: u32,
    time_microseconds: u32,
    beam_count: u16,
    amplitude_format: u8,
    phase_format: u8,
    generic_data_len: u16,
}

#[binrw]
#[brw(little)]
#[derive(Debug, PartialEq)]
struct BeamHeader {
    amplitude_len: u32,
    phase_len: u32,
    generic_data_len: u16,
}

fn fit<T: TryFrom<usize>>(field: &'static str, value: usize) -> Result<T> {
    T::try_from(value).map_err(|_| Error::FieldOverflow {
        field,
        value: value as u64,
    })
}

impl PingHeader {
    fn from_ping(ping: &Ping) -> Result<Self> {
        let seconds = ping.timestamp.unix_timestamp();
        let time_seconds = u32::try_from(seconds).map_err(|_| {
            Error::InvalidTimestamp(format!("{} is outside the GWF time range", ping.timestamp))
        })?;
        Ok(PingHeader {
            ping_number: ping.ping_number,
            time_seconds,
            time_microseconds: ping.timestamp.microsecond(),
            beam_count: fit("beam count", ping.beams.len())?,
            amplitude_format: ping.amplitude_format.code(),
            phase_format: ping.phase_format.code(),
            generic_data_len: fit("ping generic data length", ping.generic_data.len())?,
        })
    }

    fn timestamp(&self) -> Result<OffsetDateTime> {
        Ok(OffsetDateTime::from_unix_timestamp(i64::from(self.time_seconds))?
            + Duration::microseconds(i64::from(self.time_microseconds)))
    }
}

impl BeamHeader {
    fn from_beam(beam: &Beam) -> Result<Self> {
        Ok(BeamHeader {
            amplitude_len: fit("amplitude length", beam.amplitude_samples.len())?,
            phase_len: fit("phase length", beam.phase_samples.len())?,
            generic_data_len: fit("beam generic data length", beam.generic_data.len())?,
        })
    }
}

fn ensure_available<R: Seek>(reader: &mut R, size: u64, end: u64) -> Result<()> {
    let offset = reader.stream_position()?;
    let available = end.saturating_sub(offset);
    if available < size {
        return Err(Error::Truncated {
            offset,
            needed: size,
            available,
        });
    }
    Ok(())
}

/// Decode the ping record starting at the reader's position
///
/// `end` is the length of the stream. The returned ping carries its
/// [`RecordLocation`].
pub fn read_ping<R: Read + Seek>(reader: &mut R, end: u64) -> Result<Ping> {
    let offset = reader.stream_position()?;
    ensure_available(reader, PING_HEADER_SIZE, end)?;
    let header = PingHeader::read(reader)?;
    let generic_data = binary::read_vec(reader, usize::from(header.generic_data_len), end)?;

    let mut beams = Vec::with_capacity(usize::from(header.beam_count));
    for _ in 0..header.beam_count {
        ensure_available(reader, BEAM_HEADER_SIZE, end)?;
        let bh = BeamHeader::read(reader)?;
        let amplitude_samples = binary::read_vec(reader, bh.amplitude_len as usize, end)?;
        let phase_samples = binary::read_vec(reader, bh.phase_len as usize, end)?;
        let generic_data = binary::read_vec(reader, usize::from(bh.generic_data_len), end)?;
        beams.push(Beam::new(amplitude_samples, phase_samples, generic_data));
    }
    let size = reader.stream_position()? - offset;

    // The record is fully consumed before any format checks so that a bad
    // format code only spoils this ping.
    let ping = Ping {
        ping_number: header.ping_number,
        timestamp: header.timestamp()?,
        amplitude_format: SampleFormat::try_from(header.amplitude_format)?,
        phase_format: SampleFormat::try_from(header.phase_format)?,
        generic_data,
        beams,
        location: Some(RecordLocation { offset, size }),
    };
    ping.validate()?;
    Ok(ping)
}

/// Decode the single ping record at `offset`
pub fn read_at<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<Ping> {
    let end = binary::stream_len(reader)?;
    reader.seek(SeekFrom::Start(offset))?;
    read_ping(reader, end)
}

/// Encode a ping into the bytes of one GWF record
pub fn encode(ping: &Ping) -> Result<Vec<u8>> {
    let mut cursor = io::Cursor::new(Vec::new());
    write_ping(&mut cursor, ping)?;
    Ok(cursor.into_inner())
}

fn write_ping<W: Write + Seek>(writer: &mut W, ping: &Ping) -> Result<()> {
    ping.validate()?;
    let header = PingHeader::from_ping(ping)?;
    let beam_headers = ping
        .beams
        .iter()
        .map(BeamHeader::from_beam)
        .collect::<Result<Vec<_>>>()?;

    header.write(writer)?;
    writer.write_all(&ping.generic_data)?;
    for (bh, beam) in beam_headers.iter().zip(&ping.beams) {
        bh.write(writer)?;
        writer.write_all(&beam.amplitude_samples)?;
        writer.write_all(&beam.phase_samples)?;
        writer.write_all(&beam.generic_data)?;
    }
    Ok(())
}

/// An iterator interface to a GWF file
///
/// Yields pings in file order. A framing error is yielded once and ends
/// iteration; a ping with an unsupported format is reported and skipped.
pub struct File<R: Read + Seek> {
    reader: R,
    len: u64,
    done: bool,
}

impl<R: Read + Seek> File<R> {
    /// Create a GWF file from a reader positioned at the first record
    pub fn new(mut reader: R) -> io::Result<Self> {
        let len = binary::stream_len(&mut reader)?;
        Ok(File {
            reader,
            len,
            done: false,
        })
    }

    /// The length of the underlying stream
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the underlying stream is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Decode the ping at `offset` without disturbing iteration
    pub fn get(&mut self, offset: u64) -> Result<Ping> {
        let pos = self.reader.stream_position()?;
        self.reader.seek(SeekFrom::Start(offset))?;
        let ping = read_ping(&mut self.reader, self.len);
        self.reader.seek(SeekFrom::Start(pos))?;
        ping
    }

    /// Give back the underlying reader
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Seek> Iterator for File<R> {
    type Item = Result<Ping>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let pos = match self.reader.stream_position() {
            Ok(pos) => pos,
            Err(e) => {
                self.done = true;
                return Some(Err(e.into()));
            }
        };
        if pos >= self.len {
            self.done = true;
            return None;
        }
        let res = read_ping(&mut self.reader, self.len);
        if let Err(e) = &res {
            self.done = e.is_framing();
        }
        Some(res)
    }
}

/// Open a GWF file for reading
///
/// Re-open to restart iteration.
pub fn open<P: AsRef<Path>>(path: P) -> io::Result<File<BufReader<std::fs::File>>> {
    File::new(BufReader::new(std::fs::File::open(path)?))
}

/// Read every ping from a GWF file lazily
pub fn read<P: AsRef<Path>>(path: P) -> io::Result<File<BufReader<std::fs::File>>> {
    open(path)
}

/// Writes pings as consecutive GWF records
pub struct Writer<W: Write + Seek> {
    writer: W,
    count: usize,
}

impl<W: Write + Seek> Writer<W> {
    /// Create a writer appending at the current position of `writer`
    pub fn new(writer: W) -> Self {
        Writer { writer, count: 0 }
    }

    /// Encode one ping and return where it was written
    ///
    /// Nothing is written if the ping fails validation.
    pub fn write_ping(&mut self, ping: &Ping) -> Result<RecordLocation> {
        let offset = self.writer.stream_position()?;
        write_ping(&mut self.writer, ping)?;
        let size = self.writer.stream_position()? - offset;
        self.count += 1;
        Ok(RecordLocation { offset, size })
    }

    /// Number of pings written so far
    pub fn count(&self) -> usize {
        self.count
    }

    /// Flush and give back the underlying writer
    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Write a sequence of pings to a new GWF file
///
/// Pings are pulled one at a time and written in order. Returns the
/// number of pings written.
pub fn write<P, I>(path: P, pings: I) -> Result<usize>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = Ping>,
{
    let f = std::fs::File::create(path)?;
    let mut writer = Writer::new(io::BufWriter::new(f));
    for ping in pings {
        writer.write_ping(&ping)?;
    }
    let count = writer.count();
    writer.finish()?;
    Ok(count)
}
