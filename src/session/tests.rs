//! Tests for background decoding and follow-up session operations

use super::*;
use crate::FlightLog;
use crate::test_utils::{sample_dataflash_log, sample_tlog, sample_vendor_log, write_fixture};
use anyhow::Context;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("flightlog=debug").with_test_writer().try_init();
}

#[tokio::test]
async fn parse_streams_events_then_finishes() -> anyhow::Result<()> {
    init_tracing();
    let options = DecodeOptions::default().with_batch_size(8);
    let mut task = FlightLog::parse(sample_dataflash_log(30), "bin", options)?;

    let mut streamed = 0;
    let mut types = Vec::new();
    let mut done = None;
    while let Some(event) = task.next_event().await {
        match event {
            ParseEvent::AvailableTypes(names) => types = names,
            ParseEvent::Messages(batch) => streamed += batch.len(),
            ParseEvent::Done(stats) => done = Some(stats),
            _ => {}
        }
    }

    let session = task.finish().await.context("finish")?;
    let stats = done.context("no Done event")?;
    assert_eq!(streamed, session.index().len());
    assert_eq!(&stats, session.stats());
    assert_eq!(types, session.all_types());
    assert_eq!(session.records_of_type("ATT").len(), 30);
    assert_eq!(session.metadata().duration, 3_000_000);
    Ok(())
}

#[tokio::test]
async fn parse_task_is_a_stream() -> anyhow::Result<()> {
    let task = FlightLog::parse(sample_vendor_log(5), "dat", DecodeOptions::default())?;
    let events: Vec<ParseEvent> = task.collect().await;

    assert!(matches!(events.first(), Some(ParseEvent::Started { format: FormatKind::Vendor, .. })));
    assert!(matches!(events.last(), Some(ParseEvent::Done(_))));
    Ok(())
}

#[tokio::test]
async fn finish_without_reading_events() -> anyhow::Result<()> {
    let session = FlightLog::decode(sample_tlog(12), "tlog", DecodeOptions::default()).await?;
    assert_eq!(session.format(), FormatKind::Mavlink);
    assert_eq!(session.records_of_type("GLOBAL_POSITION_INT").len(), 12);

    let summary = session.summary();
    assert_eq!(summary.vehicle_class.as_deref(), Some("quadcopter"));
    assert_eq!(summary.trajectory_sources, vec!["GLOBAL_POSITION_INT"]);
    Ok(())
}

#[tokio::test]
async fn unsupported_hint_fails_before_spawning() {
    let result = FlightLog::parse(vec![1u8, 2, 3], "kml", DecodeOptions::default());
    assert!(matches!(result, Err(LogError::UnsupportedFormat { .. })));
}

#[tokio::test]
async fn empty_buffer_aborts() {
    for hint in ["bin", "tlog", "dat"] {
        let task = FlightLog::parse(Vec::<u8>::new(), hint, DecodeOptions::default()).unwrap();
        let err = task.finish().await.unwrap_err();
        assert!(matches!(err, LogError::DecodeAborted { .. }), "{hint}: {err}");
    }
}

#[tokio::test]
async fn load_type_decodes_filtered_type() -> anyhow::Result<()> {
    let data = sample_dataflash_log(20);
    let full = FlightLog::decode(data.clone(), "bin", DecodeOptions::default()).await?;

    let options = DecodeOptions::default().with_type_filter(["ATT"]);
    let mut session = FlightLog::decode(data, "bin", options).await?;
    assert!(session.records_of_type("GPS").is_empty());
    assert!(session.all_types().iter().any(|t| t == "GPS"));
    assert!(!session.is_loaded("GPS"));
    assert!(session.is_loaded("ATT"));

    let gps = session.load_type("GPS").await?.to_vec();
    assert_eq!(gps, full.records_of_type("GPS"));
    assert!(session.is_loaded("GPS"));

    let again = session.load_type("GPS").await?;
    assert_eq!(again.len(), 20);
    assert_eq!(session.index().len(), full.records_of_type("ATT").len() + 20);
    Ok(())
}

#[tokio::test]
async fn load_unknown_type_is_not_found() -> anyhow::Result<()> {
    let mut session = FlightLog::decode(sample_dataflash_log(2), "bin", DecodeOptions::default()).await?;
    let err = session.load_type("XKF1").await.unwrap_err();
    assert!(matches!(err, LogError::TypeNotFound { ref name } if name == "XKF1"));
    Ok(())
}

#[tokio::test]
async fn load_type_respects_trim_window() -> anyhow::Result<()> {
    let options = DecodeOptions::default().with_type_filter(["ATT"]);
    let mut session = FlightLog::decode(sample_dataflash_log(20), "bin", options).await?;

    let metadata = session.trim_file(500_000, 1_000_000).await?;
    assert_eq!(metadata.message_count, 6);
    assert_eq!(session.window(), Some((500_000, 1_000_000)));

    let gps = session.load_type("GPS").await?;
    assert_eq!(gps.len(), 6);
    assert!(gps.iter().all(|r| (500_000..=1_000_000).contains(&r.timestamp)));
    Ok(())
}

#[tokio::test]
async fn trims_narrow_each_other() -> anyhow::Result<()> {
    let mut session = FlightLog::decode(sample_dataflash_log(20), "bin", DecodeOptions::default()).await?;

    let first = session.trim_file(300_000, 1_500_000).await?;
    assert!(first.duration <= 1_200_000);
    assert!(first.loaded_types.contains(&"GPS".to_string()));
    assert!(!first.loaded_types.contains(&"PARM".to_string()));
    assert!(first.message_types.contains(&"PARM".to_string()));

    let second = session.trim_file(1_000_000, 2_000_000).await?;
    assert_eq!(session.window(), Some((1_000_000, 1_500_000)));
    assert_eq!(second.first_timestamp, Some(1_000_000));
    assert_eq!(second.last_timestamp, Some(1_500_000));
    assert_eq!(session.records_of_type("ATT").len(), 6);
    Ok(())
}

#[tokio::test]
async fn open_reads_file_and_names_session() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_fixture(dir.path(), "00000007.BIN", &sample_dataflash_log(3))?;

    let session = FlightLog::open(&path, DecodeOptions::default()).await?.finish().await?;
    let metadata = session.metadata();
    assert_eq!(metadata.file_name, "00000007.BIN");
    assert_eq!(metadata.file_size, std::fs::metadata(&path)?.len());
    Ok(())
}

#[tokio::test]
async fn open_missing_file_is_file_error() {
    let err = FlightLog::open("/nonexistent/flight.bin", DecodeOptions::default()).await.unwrap_err();
    assert!(matches!(err, LogError::File { .. }));
}

#[tokio::test]
async fn dropped_task_does_not_disturb_fresh_decode() -> anyhow::Result<()> {
    let data = sample_dataflash_log(200);
    drop(FlightLog::parse(data.clone(), "bin", DecodeOptions::default())?);

    let session = FlightLog::decode(data, "bin", DecodeOptions::default()).await?;
    assert_eq!(session.records_of_type("ATT").len(), 200);
    Ok(())
}
