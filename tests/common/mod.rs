//! Byte builders for synthetic vendor streams
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use wcd::model::{Beam, Ping, SampleFormat};

pub const KONGSBERG_MODEL: u16 = 710;

/// A Kongsberg datagram with the given type and body
pub fn kongsberg_datagram(datagram_type: u8, body: &[u8]) -> Vec<u8> {
    let mut d = Vec::new();
    d.extend_from_slice(&((body.len() + 4) as u32).to_le_bytes());
    d.push(2);
    d.push(datagram_type);
    d.extend_from_slice(&KONGSBERG_MODEL.to_le_bytes());
    d.extend_from_slice(body);
    d
}

/// One water column sub-packet
pub struct WaterColumn {
    pub ping_number: u16,
    pub serial_number: u16,
    pub datagram_number: u16,
    pub number_of_datagrams: u16,
    pub total_beams: u16,
    /// (beam number, samples)
    pub beams: Vec<(u8, Vec<u8>)>,
}

impl WaterColumn {
    pub fn new(ping_number: u16, total_beams: u16, beams: Vec<(u8, Vec<u8>)>) -> Self {
        WaterColumn {
            ping_number,
            serial_number: 100,
            datagram_number: 1,
            number_of_datagrams: 1,
            total_beams,
            beams,
        }
    }

    pub fn serial(mut self, serial_number: u16) -> Self {
        self.serial_number = serial_number;
        self
    }

    /// The encoded datagram: header, one tx sector, beams and a trailer
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&20_190_504u32.to_le_bytes());
        body.extend_from_slice(&45_000_500u32.to_le_bytes());
        body.extend_from_slice(&self.ping_number.to_le_bytes());
        body.extend_from_slice(&self.serial_number.to_le_bytes());
        body.extend_from_slice(&self.number_of_datagrams.to_le_bytes());
        body.extend_from_slice(&self.datagram_number.to_le_bytes());
        body.extend_from_slice(&1u16.to_le_bytes());
        body.extend_from_slice(&self.total_beams.to_le_bytes());
        body.extend_from_slice(&(self.beams.len() as u16).to_le_bytes());
        body.extend_from_slice(&14_850u16.to_le_bytes());
        body.extend_from_slice(&3_000_000u32.to_le_bytes());
        body.extend_from_slice(&0i16.to_le_bytes());
        body.push(30);
        body.push(0);
        body.push(0);
        body.extend_from_slice(&[0; 3]);
        // tx sector
        body.extend_from_slice(&0i16.to_le_bytes());
        body.extend_from_slice(&30_000u16.to_le_bytes());
        body.extend_from_slice(&[0, 0]);
        for (number, samples) in &self.beams {
            body.extend_from_slice(&beam_header(*number, samples.len() as u16));
            body.extend_from_slice(samples);
        }
        body.extend_from_slice(&[0x03, 0xab, 0xcd]);
        kongsberg_datagram(107, &body)
    }
}

/// The 10 byte header of a Kongsberg water column beam
pub fn beam_header(number: u8, sample_count: u16) -> Vec<u8> {
    let mut h = Vec::new();
    h.extend_from_slice(&(-4500i16 + i16::from(number)).to_le_bytes());
    h.extend_from_slice(&0u16.to_le_bytes());
    h.extend_from_slice(&sample_count.to_le_bytes());
    h.extend_from_slice(&(sample_count / 2).to_le_bytes());
    h.push(0);
    h.push(number);
    h
}

/// Size of the Reson frame header
pub const RESON_HEADER: usize = 64;

/// A Reson data record frame at 2019-05-04 12:30:15.25
pub fn reson_frame(record_type: u32, device: u32, payload: &[u8]) -> Vec<u8> {
    let mut f = vec![0u8; RESON_HEADER];
    f[0..2].copy_from_slice(&5u16.to_le_bytes());
    f[2..4].copy_from_slice(&60u16.to_le_bytes());
    f[4..8].copy_from_slice(&0x0000_ffffu32.to_le_bytes());
    f[8..12].copy_from_slice(&(payload.len() as u32 + 68).to_le_bytes());
    f[20..22].copy_from_slice(&2019u16.to_le_bytes());
    f[22..24].copy_from_slice(&124u16.to_le_bytes());
    f[24..28].copy_from_slice(&15.25f32.to_le_bytes());
    f[28] = 12;
    f[29] = 30;
    f[32..36].copy_from_slice(&record_type.to_le_bytes());
    f[36..40].copy_from_slice(&device.to_le_bytes());
    f.extend_from_slice(payload);
    f.extend_from_slice(&[0; 4]);
    f
}

/// A 7008 payload with sample-major (amplitude, phase) units
pub fn generic_7008(ping_number: u32, beams: u16, samples: u32, sample_type: u32) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&7125u64.to_le_bytes());
    p.extend_from_slice(&ping_number.to_le_bytes());
    p.extend_from_slice(&0u16.to_le_bytes());
    p.extend_from_slice(&beams.to_le_bytes());
    p.extend_from_slice(&0u16.to_le_bytes());
    p.extend_from_slice(&samples.to_le_bytes());
    p.push(0);
    p.push(0);
    p.extend_from_slice(&0u16.to_le_bytes());
    p.extend_from_slice(&sample_type.to_le_bytes());
    for b in 0..beams {
        p.extend_from_slice(&b.to_le_bytes());
        p.extend_from_slice(&0u32.to_le_bytes());
        p.extend_from_slice(&(samples - 1).to_le_bytes());
    }
    for s in 0..samples {
        for b in 0..u32::from(beams) {
            p.extend_from_slice(&((100 * b + s) as u16).to_le_bytes());
            p.extend_from_slice(&(-((b + s) as i16)).to_le_bytes());
        }
    }
    p
}

/// A 7018 payload with a [sample][beam] matrix
pub fn beamformed_7018(ping_number: u32, beams: u16, samples: u32) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&7125u64.to_le_bytes());
    p.extend_from_slice(&ping_number.to_le_bytes());
    p.extend_from_slice(&0u16.to_le_bytes());
    p.extend_from_slice(&beams.to_le_bytes());
    p.extend_from_slice(&samples.to_le_bytes());
    p.extend_from_slice(&[0; 32]);
    for s in 0..samples {
        for b in 0..u32::from(beams) {
            p.extend_from_slice(&((10 * s + b) as u16).to_le_bytes());
            p.extend_from_slice(&(b as i16).to_le_bytes());
        }
    }
    p
}

/// Write bytes to a file in `dir`
pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// A ping with `beams` beams of `samples` 16 bit samples
pub fn ping(ping_number: u32, beams: usize, samples: usize) -> Ping {
    let timestamp = time::OffsetDateTime::from_unix_timestamp(1_556_973_000 + i64::from(ping_number))
        .unwrap()
        + time::Duration::microseconds(123_456);
    let beams = (0..beams)
        .map(|b| {
            let amplitude: Vec<u8> = (0..samples)
                .flat_map(|s| ((b * 1000 + s) as u16).to_le_bytes())
                .collect();
            let phase: Vec<u8> = (0..samples).flat_map(|s| (-(s as i16)).to_le_bytes()).collect();
            Beam::new(amplitude, phase, vec![b as u8; b % 3])
        })
        .collect();
    Ping::new(
        ping_number,
        timestamp,
        SampleFormat::U16,
        SampleFormat::I16,
        vec![0xee; 5],
        beams,
    )
}

/// A ping without the location it was read from
pub fn unlocated(mut ping: Ping) -> Ping {
    ping.location = None;
    ping
}
