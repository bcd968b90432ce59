mod common;

use common::{kongsberg_datagram, write_file, WaterColumn};
use time::macros::datetime;
use wcd::config::DecoderConfig;
use wcd::error::{Error, Result};
use wcd::model::{Ping, SampleFormat};
use wcd::parser::kongsberg::{KongsbergParser, WaterColumnDatagram};
use wcd::parser::WaterColumnParser;

fn pings(parser: &mut KongsbergParser) -> Vec<Result<Ping>> {
    parser.water_column_packets().unwrap().collect()
}

fn open(bytes: &[u8], config: DecoderConfig) -> (tempfile::TempDir, KongsbergParser) {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "survey.all", bytes);
    let mut parser = KongsbergParser::with_config(config);
    parser.open(&path).unwrap();
    (dir, parser)
}

#[test]
fn single_datagram_ping() {
    let wc = WaterColumn::new(42, 2, vec![(0, vec![0x80, 0x00, 0x7f]), (1, vec![5])]);
    let mut bytes = kongsberg_datagram(65, &[0; 6]);
    bytes.extend(wc.encode());
    let (_dir, mut parser) = open(&bytes, DecoderConfig::default());

    assert!(parser.contains_water_column_data().unwrap());
    assert_eq!(
        parser.make_and_model().unwrap(),
        ("Kongsberg".to_string(), "710".to_string())
    );

    let pings = pings(&mut parser);
    assert_eq!(pings.len(), 1);
    let p = pings[0].as_ref().unwrap();
    assert_eq!(p.ping_number, 42);
    assert_eq!(p.timestamp, datetime!(2019-05-04 12:30:00.5 UTC));
    assert_eq!(p.amplitude_format, SampleFormat::I8);
    assert_eq!(p.phase_format, SampleFormat::I8);
    assert_eq!(p.beams.len(), 2);
    assert_eq!(p.beams[0].amplitude_samples, vec![0x80, 0x00, 0x7f]);
    assert!(p.beams[0].phase_samples.is_empty());
    assert_eq!(p.beams[0].generic_data, common::beam_header(0, 3));
    assert_eq!(p.amplitudes(0).unwrap().unwrap(), vec![-128, 0, 127]);

    // header, one sector and the trailer
    let encoded = wc.encode();
    assert_eq!(p.generic_data.len(), 44 + 6 + 3);
    assert_eq!(&p.generic_data[..50], &encoded[..50]);
    assert_eq!(&p.generic_data[50..], &[0x03, 0xab, 0xcd]);
}

#[test]
fn split_ping_is_reassembled_in_order() {
    let mut first = WaterColumn::new(5, 4, vec![(0, vec![1]), (1, vec![2])]);
    first.number_of_datagrams = 2;
    let mut second = WaterColumn::new(5, 4, vec![(2, vec![3]), (3, vec![4])]);
    second.number_of_datagrams = 2;
    second.datagram_number = 2;
    let next = WaterColumn::new(6, 1, vec![(0, vec![9])]);

    let mut bytes = first.encode();
    bytes.extend(kongsberg_datagram(80, &[0; 10]));
    bytes.extend(second.encode());
    bytes.extend(next.encode());
    let (_dir, mut parser) = open(&bytes, DecoderConfig::default());

    let pings: Vec<Ping> = pings(&mut parser).into_iter().collect::<Result<_>>().unwrap();
    assert_eq!(pings.len(), 2);
    assert_eq!(pings[0].ping_number, 5);
    let samples: Vec<u8> = pings[0]
        .beams
        .iter()
        .map(|b| b.amplitude_samples[0])
        .collect();
    assert_eq!(samples, vec![1, 2, 3, 4]);
    assert_eq!(pings[1].ping_number, 6);
}

#[test]
fn merged_datagram_sizes_add_up() {
    let mut first = WaterColumn::new(5, 2, vec![(0, vec![1])]).encode();
    let second = WaterColumn::new(5, 2, vec![(1, vec![2, 3])]).encode();
    let sizes = [
        u32::from_le_bytes([first[0], first[1], first[2], first[3]]),
        u32::from_le_bytes([second[0], second[1], second[2], second[3]]),
    ];
    first.extend(second);
    let datagrams = wcd::parser::kongsberg::DatagramReader::new(&first[..])
        .map(|d| d.and_then(|d| WaterColumnDatagram::parse(&d)));
    let merged: Vec<WaterColumnDatagram> =
        wcd::parser::congregate::Congregator::new(datagrams, DecoderConfig::default())
            .collect::<Result<_>>()
            .unwrap();
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].header.datagram_size, sizes[0] + sizes[1]);
    assert_eq!(merged[0].beams.len(), 2);
}

#[test]
fn heads_are_reassembled_independently() {
    let mut bytes = Vec::new();
    for ping in 1..=2 {
        for serial in [200, 100] {
            bytes.extend(
                WaterColumn::new(ping, 1, vec![(0, vec![serial as u8])])
                    .serial(serial)
                    .encode(),
            );
        }
    }
    let (_dir, mut parser) = open(&bytes, DecoderConfig::default());
    let order: Vec<(u32, u8)> = pings(&mut parser)
        .into_iter()
        .map(|p| {
            let p = p.unwrap();
            (p.ping_number, p.beams[0].amplitude_samples[0])
        })
        .collect();
    // ping 1 of each head as its ping 2 arrives, then the rest by serial number
    assert_eq!(order, vec![(1, 200), (1, 100), (2, 100), (2, 200)]);
}

#[test]
fn incomplete_pings_follow_the_config() {
    let bytes = WaterColumn::new(3, 3, vec![(0, vec![1]), (1, vec![2])]).encode();

    let (_dir, mut parser) = open(&bytes, DecoderConfig::default());
    let kept = pings(&mut parser);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].as_ref().unwrap().beams.len(), 2);

    let (_dir, mut parser) = open(&bytes, DecoderConfig::default().allow_incomplete_pings(false));
    assert!(pings(&mut parser).is_empty());
}

#[test]
fn truncated_datagram_ends_the_stream() {
    let mut bytes = WaterColumn::new(1, 1, vec![(0, vec![1])]).encode();
    bytes.extend(WaterColumn::new(2, 1, vec![(0, vec![2])]).encode());
    let third = WaterColumn::new(3, 1, vec![(0, vec![3])]).encode();
    bytes.extend_from_slice(&third[..20]);
    let (_dir, mut parser) = open(&bytes, DecoderConfig::default());

    let results = pings(&mut parser);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().unwrap().ping_number, 1);
    assert!(matches!(results[1], Err(Error::Truncated { .. })));
}

#[test]
fn file_without_water_column() {
    let mut bytes = kongsberg_datagram(65, &[0; 6]);
    bytes.extend(kongsberg_datagram(80, &[0; 6]));
    bytes.extend(kongsberg_datagram(80, &[0; 6]));
    let (_dir, mut parser) = open(&bytes, DecoderConfig::default());

    assert!(!parser.contains_water_column_data().unwrap());
    assert_eq!(
        parser.make_and_model().unwrap(),
        ("Unknown".to_string(), "Unknown".to_string())
    );
    assert!(pings(&mut parser).is_empty());

    let counts = parser.record_counts().unwrap();
    assert_eq!(counts["Attitude"], 1);
    assert_eq!(counts["Position"], 2);
}

#[test]
fn probing_does_not_disturb_extraction() {
    let mut bytes = WaterColumn::new(1, 1, vec![(0, vec![1])]).encode();
    bytes.extend(WaterColumn::new(2, 1, vec![(0, vec![2])]).encode());
    let (_dir, mut parser) = open(&bytes, DecoderConfig::default());

    assert_eq!(pings(&mut parser).len(), 2);
    assert!(parser.contains_water_column_data().unwrap());
    assert_eq!(pings(&mut parser).len(), 2);
}

#[test]
fn closed_parser_reports_not_open() {
    let mut parser = KongsbergParser::new();
    assert!(matches!(parser.contains_water_column_data(), Err(Error::NotOpen)));
    parser.close();
    assert!(matches!(parser.water_column_packets().err(), Some(Error::NotOpen)));
}
