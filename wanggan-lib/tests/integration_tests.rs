mod common;

use std::fs;
use std::time::Duration;

use wanggan::transport::ScriptedChannel;
use wanggan::{
    decode_tracks, plan_documents, DownloadMode, Format, ReceiveOpts, RecordKind, Session,
    Termination, Track,
};

use common::fixture;

fn fast_opts() -> ReceiveOpts {
    ReceiveOpts::builder()
        .hard_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_millis(100))
        .settle_delay(Duration::ZERO)
        .poll_interval(Duration::from_millis(5))
        .build()
}

#[test]
fn decode_scenario_session() {
    let data = b"n0001,m0410000000,l-0082300000;t202401151030,N0005\n\
                 +008d35'28.86540\",+041d06'52.58100\",01769;\n!\n";

    let tracks = decode_tracks(data);

    assert_eq!(tracks.len(), 1);
    let header = tracks[0].header.as_ref().unwrap();
    assert_eq!(header.kind, RecordKind::Area);
    assert_eq!(header.record_number, 1);
    assert_eq!(header.timestamp.to_string(), "2024-01-15 10:30");
    assert_eq!(header.total_records, 5);
    assert!((header.latitude.unwrap() - 41.0).abs() < 1e-9);
    assert!((header.longitude.unwrap() + 8.23).abs() < 1e-9);

    assert_eq!(tracks[0].points.len(), 1);
    let point = tracks[0].points[0];
    assert!((point.longitude - 8.591_351).abs() < 1e-6);
    assert!((point.latitude - 41.114_606).abs() < 1e-6);
    assert_eq!(point.altitude, 1769);
}

#[test]
fn oversized_header_numbers_still_start_a_track() {
    let data = b"n0001,m0410000000,l-0082300000;t202401151030,N0001\n\
                 +008d35'28.86540\",+041d06'52.58100\",01769;\n!\n\
                 n99999999999,m0410000000,l-0082300000;t202401151030,N0001\n\
                 +008d35'29.00000\",+041d06'53.00000\",01770;\n!\n";

    let tracks = decode_tracks(data);

    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0].points.len(), 1);
    assert_eq!(tracks[1].header.as_ref().unwrap().record_number, u32::MAX);
    assert_eq!(tracks[1].points[0].altitude, 1770);
}

#[test]
fn decode_full_track_fixture() {
    let tracks = decode_tracks(&fixture("session_tilde.txt"));

    let summary: Vec<(RecordKind, u32, usize)> = tracks
        .iter()
        .map(|t| {
            let header = t.header.as_ref().unwrap();
            (header.kind, header.record_number, t.points.len())
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            (RecordKind::Area, 1, 3),
            (RecordKind::Distance, 2, 0),
            (RecordKind::Waypoint, 3, 1),
            (RecordKind::Track, 4, 3),
        ]
    );

    // The corrupt byte in the second point is dropped during text decoding
    let alts: Vec<i64> = tracks[3].points.iter().map(|p| p.altitude).collect();
    assert_eq!(alts, vec![200, 201, 202]);
}

#[test]
fn decode_bulk_fixture_has_no_header() {
    let tracks = decode_tracks(&fixture("session_exclamation.txt"));

    assert_eq!(tracks.len(), 1);
    assert!(tracks[0].header.is_none());
    let alts: Vec<i64> = tracks[0].points.iter().map(|p| p.altitude).collect();
    assert_eq!(alts, vec![1769, 1770, 120]);
}

#[test]
fn decode_is_repeatable() {
    let data = fixture("session_tilde.txt");
    let first: Vec<Track> = decode_tracks(&data);
    let second: Vec<Track> = decode_tracks(&data);
    assert_eq!(first, second);
}

#[test]
fn csv_round_trip() {
    let tracks = decode_tracks(&fixture("session_tilde.txt"));
    let expected: Vec<(f64, f64, i64)> = tracks
        .iter()
        .flat_map(|t| t.points.iter().map(|p| (p.longitude, p.latitude, p.altitude)))
        .collect();

    let docs = plan_documents(&tracks, Format::Csv, false, "track").unwrap();
    assert_eq!(docs.len(), 1);

    let mut lines = docs[0].body.lines();
    assert_eq!(lines.next(), Some("longitude,latitude,altitude"));
    let parsed: Vec<(f64, f64, i64)> = lines
        .map(|line| {
            let fields: Vec<&str> = line.split(',').collect();
            (
                fields[0].parse().unwrap(),
                fields[1].parse().unwrap(),
                fields[2].parse().unwrap(),
            )
        })
        .collect();

    assert_eq!(parsed.len(), expected.len());
    for ((lon, lat, alt), (elon, elat, ealt)) in parsed.iter().zip(expected.iter()) {
        assert!((lon - elon).abs() < 1e-7, "lon {lon} != {elon}");
        assert!((lat - elat).abs() < 1e-7, "lat {lat} != {elat}");
        assert_eq!(alt, ealt);
    }
}

#[test]
fn download_decode_and_export() {
    let data = fixture("session_tilde.txt");
    let (first, rest) = data.split_at(40);
    let (second, third) = rest.split_at(rest.len() / 2);
    let chan = ScriptedChannel::new()
        .chunk(Duration::ZERO, first)
        .chunk(Duration::from_millis(20), second)
        .chunk(Duration::from_millis(40), third);

    let mut session = Session::with_channel(chan, Duration::ZERO);
    let capture = session
        .download(DownloadMode::FullTrack, &fast_opts())
        .unwrap();
    session.close().unwrap();

    assert_eq!(capture.data, data);
    assert_eq!(capture.termination, Termination::Idle);

    let tracks = decode_tracks(&capture.data);
    let docs = plan_documents(&tracks, Format::Gpx, true, "track").unwrap();
    // the distance track has no points and is skipped
    assert_eq!(docs.len(), 3);

    let tmpdir = tempfile::tempdir().unwrap();
    for doc in &docs {
        fs::write(tmpdir.path().join(&doc.file_name), &doc.body).unwrap();
    }
    let written =
        fs::read_to_string(tmpdir.path().join("waypoint_n0003_20240117_1215.gpx")).unwrap();
    assert!(written.contains("<name>Waypoint 3</name>"));
    assert!(written.contains("<ele>120</ele>"));
}

#[test]
fn download_nothing_is_not_an_error() {
    let chan = ScriptedChannel::new();
    let mut session = Session::with_channel(chan, Duration::ZERO);
    let opts = ReceiveOpts::builder()
        .hard_timeout(Duration::from_millis(50))
        .settle_delay(Duration::ZERO)
        .poll_interval(Duration::from_millis(5))
        .build();

    let capture = session.download(DownloadMode::BulkCoordinates, &opts).unwrap();

    assert!(capture.is_empty());
    assert!(decode_tracks(&capture.data).is_empty());
}
