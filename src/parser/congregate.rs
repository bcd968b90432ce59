//! Reassembling pings that a sonar split over several datagrams
//!
//! Sub-packets are grouped per sonar head (serial number). A head's
//! buffer is flushed into one ping when a sub-packet with a different
//! ping number arrives for that head, and every head is flushed when the
//! input ends.
//!
//! A head that never changes ping number buffers without bound; callers
//! feeding untrusted streams must cap the input themselves.
use super::kongsberg::WaterColumnDatagram;
use crate::config::DecoderConfig;
use crate::error::Result;
use log::{debug, warn};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Sub-packets of the ping currently being accumulated for one head
#[derive(Debug)]
struct HeadBuffer {
    ping_number: u16,
    sub_packets: Vec<WaterColumnDatagram>,
}

impl HeadBuffer {
    fn new(packet: WaterColumnDatagram) -> Self {
        HeadBuffer {
            ping_number: packet.header.ping_number,
            sub_packets: vec![packet],
        }
    }
}

/// Merge sub-packets into the first one, in arrival order
///
/// Beams are appended and datagram sizes summed.
pub fn merge(sub_packets: Vec<WaterColumnDatagram>) -> Option<WaterColumnDatagram> {
    let mut iter = sub_packets.into_iter();
    let mut ping = iter.next()?;
    for sub in iter {
        ping.beams.extend(sub.beams);
        ping.header.datagram_size = ping
            .header
            .datagram_size
            .saturating_add(sub.header.datagram_size);
    }
    Some(ping)
}

fn flush(buffer: HeadBuffer, allow_incomplete: bool) -> Option<WaterColumnDatagram> {
    let ping = merge(buffer.sub_packets)?;
    let declared = usize::from(ping.header.total_receive_beams);
    if ping.beams.len() == declared {
        debug!(
            "Ping {} from head {} complete with {} beams",
            ping.header.ping_number,
            ping.header.serial_number,
            declared
        );
        Some(ping)
    } else if allow_incomplete {
        debug!(
            "Ping {} from head {} incomplete ({} of {} beams), keeping it",
            ping.header.ping_number,
            ping.header.serial_number,
            ping.beams.len(),
            declared
        );
        Some(ping)
    } else {
        warn!(
            "Incomplete ping with number {} only has {} of {} beams",
            buffer.ping_number,
            ping.beams.len(),
            declared
        );
        None
    }
}

/// An iterator adapter turning water column sub-packets into whole pings
///
/// Errors from the inner iterator are passed through. A framing error
/// ends reassembly and discards whatever was buffered.
pub struct Congregator<I> {
    inner: I,
    config: DecoderConfig,
    heads: BTreeMap<u16, HeadBuffer>,
    finished: bool,
}

impl<I> Congregator<I>
where
    I: Iterator<Item = Result<WaterColumnDatagram>>,
{
    /// Wrap an iterator of sub-packets
    pub fn new(inner: I, config: DecoderConfig) -> Self {
        Congregator {
            inner,
            config,
            heads: BTreeMap::new(),
            finished: false,
        }
    }

    /// Number of heads with buffered sub-packets
    pub fn pending_heads(&self) -> usize {
        self.heads.len()
    }

    fn push(&mut self, packet: WaterColumnDatagram) -> Option<WaterColumnDatagram> {
        let allow_incomplete = self.config.allow_incomplete_pings;
        match self.heads.entry(packet.header.serial_number) {
            Entry::Vacant(e) => {
                e.insert(HeadBuffer::new(packet));
                None
            }
            Entry::Occupied(mut e) => {
                if e.get().ping_number == packet.header.ping_number {
                    e.get_mut().sub_packets.push(packet);
                    None
                } else {
                    let done = std::mem::replace(e.get_mut(), HeadBuffer::new(packet));
                    flush(done, allow_incomplete)
                }
            }
        }
    }
}

impl<I> Iterator for Congregator<I>
where
    I: Iterator<Item = Result<WaterColumnDatagram>>,
{
    type Item = Result<WaterColumnDatagram>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            match self.inner.next() {
                Some(Ok(packet)) => {
                    if let Some(ping) = self.push(packet) {
                        return Some(Ok(ping));
                    }
                }
                Some(Err(e)) => {
                    if e.is_framing() {
                        self.finished = true;
                        self.heads.clear();
                    }
                    return Some(Err(e));
                }
                None => self.finished = true,
            }
        }

        let allow_incomplete = self.config.allow_incomplete_pings;
        while let Some((_, buffer)) = self.heads.pop_first() {
            if let Some(ping) = flush(buffer, allow_incomplete) {
                return Some(Ok(ping));
            }
        }
        None
    }
}
