mod common;

use common::{beamformed_7018, generic_7008, reson_frame, write_file};
use time::macros::datetime;
use wcd::error::{Error, Result};
use wcd::model::{Ping, SampleFormat};
use wcd::parser::reson::ResonParser;
use wcd::parser::WaterColumnParser;

fn open(bytes: &[u8]) -> (tempfile::TempDir, ResonParser) {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "survey.s7k", bytes);
    let mut parser = ResonParser::new();
    parser.open(&path).unwrap();
    (dir, parser)
}

fn pings(parser: &mut ResonParser) -> Vec<Result<Ping>> {
    parser.water_column_packets().unwrap().collect()
}

#[test]
fn generic_water_column_records() {
    let mut bytes = reson_frame(7200, 7125, &[0; 20]);
    bytes.extend(reson_frame(7008, 7125, &generic_7008(11, 3, 4, 0x22)));
    bytes.extend(reson_frame(1015, 7125, &[0; 8]));
    bytes.extend(reson_frame(7008, 7125, &generic_7008(12, 3, 4, 0x22)));
    let (_dir, mut parser) = open(&bytes);

    assert!(parser.contains_water_column_data().unwrap());
    assert_eq!(
        parser.make_and_model().unwrap(),
        ("Reson".to_string(), "RESON SeaBat 7125".to_string())
    );

    let pings: Vec<Ping> = pings(&mut parser).into_iter().collect::<Result<_>>().unwrap();
    assert_eq!(pings.len(), 2);
    let p = &pings[0];
    assert_eq!(p.ping_number, 11);
    assert_eq!(p.timestamp, datetime!(2019-05-04 12:30:15.25 UTC));
    assert_eq!(p.amplitude_format, SampleFormat::U16);
    assert_eq!(p.phase_format, SampleFormat::I16);
    assert_eq!(p.generic_data.len(), 30);
    assert_eq!(p.beams.len(), 3);
    assert_eq!(p.beams[2].generic_data.len(), 10);
    assert_eq!(p.amplitudes(2).unwrap().unwrap(), vec![200, 201, 202, 203]);
    assert_eq!(
        SampleFormat::I16.decode(&p.beams[1].phase_samples).unwrap(),
        vec![-1, -2, -3, -4]
    );
    assert_eq!(pings[1].ping_number, 12);
}

#[test]
fn beamformed_records() {
    let bytes = reson_frame(7018, 7125, &beamformed_7018(3, 2, 3));
    let (_dir, mut parser) = open(&bytes);

    let pings = pings(&mut parser);
    assert_eq!(pings.len(), 1);
    let p = pings[0].as_ref().unwrap();
    assert_eq!(p.ping_number, 3);
    assert_eq!(p.beams.len(), 2);
    assert_eq!(p.amplitudes(1).unwrap().unwrap(), vec![1, 11, 21]);
    assert_eq!(p.generic_data.len(), 64 + 4 + 52);
    assert_eq!(&p.generic_data[..64], &bytes[..64]);
    assert!(p.beams.iter().all(|b| b.generic_data.is_empty()));
}

#[test]
fn unsupported_records_do_not_end_the_stream() {
    let mut bytes = reson_frame(7042, 7125, &[0; 16]);
    bytes.extend(reson_frame(7008, 7125, &generic_7008(1, 2, 2, 0x11)));
    bytes.extend(reson_frame(7008, 7125, &generic_7008(2, 2, 2, 0x22)));
    let (_dir, mut parser) = open(&bytes);

    assert!(parser.contains_water_column_data().unwrap());
    let results = pings(&mut parser);
    assert_eq!(results.len(), 3);
    assert!(matches!(results[0], Err(Error::UnsupportedRecord(7042))));
    assert!(matches!(results[1], Err(Error::UnsupportedSampleType(0x11))));
    assert_eq!(results[2].as_ref().unwrap().ping_number, 2);
}

#[test]
fn unknown_device() {
    let bytes = reson_frame(7018, 9999, &beamformed_7018(1, 1, 1));
    let (_dir, mut parser) = open(&bytes);
    assert_eq!(
        parser.make_and_model().unwrap(),
        ("Reson".to_string(), "Unknown 9999".to_string())
    );
}

#[test]
fn no_water_column_records() {
    let mut bytes = reson_frame(7200, 7125, &[0; 4]);
    bytes.extend(reson_frame(1015, 7125, &[0; 4]));
    bytes.extend(reson_frame(1015, 7125, &[0; 4]));
    let (_dir, mut parser) = open(&bytes);

    assert!(!parser.contains_water_column_data().unwrap());
    assert_eq!(
        parser.make_and_model().unwrap(),
        ("Unknown".to_string(), "Unknown".to_string())
    );
    let counts = parser.record_counts().unwrap();
    assert_eq!(counts["7k File Header"], 1);
    assert_eq!(counts["Navigation Record"], 2);
}

#[test]
fn frame_past_end_of_file() {
    let mut bytes = reson_frame(7008, 7125, &generic_7008(1, 2, 2, 0x22));
    let second = reson_frame(7008, 7125, &generic_7008(2, 2, 2, 0x22));
    bytes.extend_from_slice(&second[..second.len() - 10]);
    let (_dir, mut parser) = open(&bytes);

    let results = pings(&mut parser);
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(Error::Truncated { .. })));
}
