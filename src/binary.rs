//! Little-endian field helpers shared by every decoder and encoder
//!
//! Fixed layouts are declared with `binrw`. The helpers here cover the
//! parts that are not fixed: blobs whose length comes from a header,
//! short reads at end of input and re-packing decoded samples.
use crate::error::{Error, Result};
use std::io::{self, Read, Seek, SeekFrom};

/// Fill as much of `buf` as the reader can provide
///
/// Returns the number of bytes read, which is only less than
/// `buf.len()` at end of input.
pub fn read_available<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Length of a seekable stream, leaving the cursor where it was
pub fn stream_len<S: Seek>(stream: &mut S) -> io::Result<u64> {
    let pos = stream.stream_position()?;
    let len = stream.seek(SeekFrom::End(0))?;
    if pos != len {
        stream.seek(SeekFrom::Start(pos))?;
    }
    Ok(len)
}

/// Read exactly `len` bytes, refusing to run past `end`
///
/// `end` is the stream length; the check happens before allocating so a
/// corrupt length field cannot request more memory than the file holds.
pub fn read_vec<R: Read + Seek>(reader: &mut R, len: usize, end: u64) -> Result<Vec<u8>> {
    let offset = reader.stream_position()?;
    let available = end.saturating_sub(offset);
    if len as u64 > available {
        return Err(Error::Truncated {
            offset,
            needed: len as u64,
            available,
        });
    }
    let mut buf = vec![0; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// A bounds-checked sub-slice of an in-memory record
pub fn slice(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| bytes.get(offset..end))
        .ok_or(Error::Truncated {
            offset: offset as u64,
            needed: len as u64,
            available: bytes.len().saturating_sub(offset) as u64,
        })
}

/// Re-pack unsigned 16 bit samples as little-endian bytes
pub fn pack_u16(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Re-pack signed 16 bit samples as little-endian bytes
pub fn pack_i16(values: &[i16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}
