//! High-level flight summary
//!
//! [`FlightSummary`] condenses a decoded index into what a flight review
//! usually starts from: attitude, mode changes, arming, mission, parameters,
//! text messages, vehicle type and per-source trajectories. Both MAVLink
//! message names and their dataflash counterparts are recognized where the
//! two differ.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::index::MessageIndex;
use crate::types::{Record, Timestamp};

/// MAV_MODE_FLAG_SAFETY_ARMED
const ARMED_FLAG: i64 = 0x80;

/// Trajectory sources in order of preference.
pub const TRAJECTORY_SOURCES: [&str; 4] = ["GLOBAL_POSITION_INT", "GPS_RAW_INT", "AHRS2", "AHRS3"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttitudeSample {
    pub timestamp: Timestamp,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeChange {
    pub timestamp: Timestamp,
    pub mode: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArmState {
    Armed,
    Disarmed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArmEvent {
    pub timestamp: Timestamp,
    pub state: ArmState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Waypoint {
    pub longitude: f64,
    pub latitude: f64,
    pub altitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamValue {
    pub timestamp: Timestamp,
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextMessage {
    pub timestamp: Timestamp,
    pub severity: u8,
    pub text: String,
}

/// One position sample, altitude relative to the first sample of its source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectoryPoint {
    pub timestamp: Timestamp,
    pub longitude: f64,
    pub latitude: f64,
    pub relative_altitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    /// Altitude of the first sample in meters
    pub start_altitude: f64,
    pub points: Vec<TrajectoryPoint>,
}

/// Summary derived from a decoded session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlightSummary {
    pub attitude: Vec<AttitudeSample>,
    pub flight_modes: Vec<ModeChange>,
    pub events: Vec<ArmEvent>,
    pub mission: Vec<Waypoint>,
    pub params: Vec<ParamValue>,
    pub text_messages: Vec<TextMessage>,
    pub named_value_float_names: Vec<String>,
    /// First SYSTEM_TIME `time_unix_usec`
    pub start_time: Option<u64>,
    /// MAV_TYPE from the first HEARTBEAT
    pub vehicle_type: Option<u8>,
    pub vehicle_class: Option<String>,
    pub attitude_sources: Vec<String>,
    pub trajectory_sources: Vec<String>,
    pub trajectories: BTreeMap<String, Trajectory>,
}

impl FlightSummary {
    pub fn from_index(index: &MessageIndex) -> Self {
        let heartbeats = index.records_of_type("HEARTBEAT");
        let vehicle_type = heartbeats
            .iter()
            .find_map(|r| r.get_i64("type"))
            .and_then(|t| u8::try_from(t).ok());

        let trajectories: BTreeMap<String, Trajectory> = TRAJECTORY_SOURCES
            .iter()
            .filter_map(|&source| {
                trajectory(source, index.records_of_type(source)).map(|t| (source.to_string(), t))
            })
            .collect();

        let attitude_sources = ["ATTITUDE", "ATT"]
            .iter()
            .filter(|name| !index.records_of_type(name).is_empty())
            .map(|name| name.to_string())
            .collect();

        Self {
            attitude: attitude(index),
            flight_modes: flight_modes(index),
            events: arm_events(heartbeats),
            mission: mission(index.records_of_type("CMD")),
            params: params(index),
            text_messages: text_messages(index),
            named_value_float_names: named_value_float_names(index.records_of_type("NAMED_VALUE_FLOAT")),
            start_time: index
                .records_of_type("SYSTEM_TIME")
                .iter()
                .find_map(|r| r.get("time_unix_usec").and_then(|v| v.as_u64())),
            vehicle_type,
            vehicle_class: vehicle_type.map(vehicle_class),
            attitude_sources,
            trajectory_sources: TRAJECTORY_SOURCES
                .iter()
                .filter(|source| trajectories.contains_key(**source))
                .map(|source| source.to_string())
                .collect(),
            trajectories,
        }
    }
}

/// Human-readable class of a MAV_TYPE value.
pub fn vehicle_class(mav_type: u8) -> String {
    let class = match mav_type {
        1 | 19 | 20 | 22 | 23 | 24 => "airplane",
        2 | 3 | 4 | 13 | 14 | 15 | 21 | 29 => "quadcopter",
        5 => "tracker",
        10 => "rover",
        11 => "boat",
        12 => "submarine",
        other => return other.to_string(),
    };
    class.to_string()
}

fn attitude(index: &MessageIndex) -> Vec<AttitudeSample> {
    let mavlink = index.records_of_type("ATTITUDE").iter().filter_map(|r| {
        Some(AttitudeSample {
            timestamp: r.timestamp,
            roll: r.get_f64("roll")?,
            pitch: r.get_f64("pitch")?,
            yaw: r.get_f64("yaw")?,
        })
    });
    let dataflash = index.records_of_type("ATT").iter().filter_map(|r| {
        Some(AttitudeSample {
            timestamp: r.timestamp,
            roll: r.scaled("Roll")?,
            pitch: r.scaled("Pitch")?,
            yaw: r.scaled("Yaw").unwrap_or(0.0),
        })
    });
    mavlink.chain(dataflash).collect()
}

fn flight_modes(index: &MessageIndex) -> Vec<ModeChange> {
    let heartbeat = index
        .records_of_type("HEARTBEAT")
        .iter()
        .filter_map(|r| Some((r.timestamp, r.get_i64("custom_mode")?)));
    let mode = index
        .records_of_type("MODE")
        .iter()
        .filter_map(|r| Some((r.timestamp, r.get_i64("ModeNum").or_else(|| r.get_i64("Mode"))?)));

    let mut changes: Vec<ModeChange> = Vec::new();
    for (timestamp, mode) in heartbeat.chain(mode) {
        if changes.last().is_none_or(|last| last.mode != mode) {
            changes.push(ModeChange { timestamp, mode });
        }
    }
    changes
}

fn arm_events(heartbeats: &[Record]) -> Vec<ArmEvent> {
    let mut events: Vec<ArmEvent> = Vec::new();
    for record in heartbeats {
        let base_mode = record.get_i64("base_mode").unwrap_or(0);
        let state = if base_mode & ARMED_FLAG != 0 { ArmState::Armed } else { ArmState::Disarmed };
        if events.last().is_none_or(|last| last.state != state) {
            events.push(ArmEvent { timestamp: record.timestamp, state });
        }
    }
    events
}

fn mission(commands: &[Record]) -> Vec<Waypoint> {
    commands
        .iter()
        .filter(|r| r.get_i64("Lat").is_some_and(|lat| lat != 0))
        .filter_map(|r| {
            Some(Waypoint {
                longitude: r.scaled("Lng")?,
                latitude: r.scaled("Lat")?,
                altitude: r.scaled("Alt")?,
            })
        })
        .collect()
}

fn params(index: &MessageIndex) -> Vec<ParamValue> {
    let mavlink = index.records_of_type("PARAM_VALUE").iter().filter_map(|r| {
        Some(ParamValue {
            timestamp: r.timestamp,
            name: r.get_str("param_id")?.to_string(),
            value: r.get_f64("param_value")?,
        })
    });
    let dataflash = index.records_of_type("PARM").iter().filter_map(|r| {
        Some(ParamValue {
            timestamp: r.timestamp,
            name: r.get_str("Name")?.to_string(),
            value: r.get_f64("Value")?,
        })
    });
    mavlink.chain(dataflash).collect()
}

fn text_messages(index: &MessageIndex) -> Vec<TextMessage> {
    let statustext = index.records_of_type("STATUSTEXT").iter().filter_map(|r| {
        Some(TextMessage {
            timestamp: r.timestamp,
            severity: r.get_i64("severity").and_then(|s| u8::try_from(s).ok()).unwrap_or(0),
            text: r.get_str("text")?.to_string(),
        })
    });
    let msg = index.records_of_type("MSG").iter().filter_map(|r| {
        Some(TextMessage { timestamp: r.timestamp, severity: 0, text: r.get_str("Message")?.to_string() })
    });
    let vendor = index.records_of_type("TEXT").iter().filter_map(|r| {
        Some(TextMessage { timestamp: r.timestamp, severity: 0, text: r.get_str("Text")?.to_string() })
    });
    statustext.chain(msg).chain(vendor).collect()
}

fn named_value_float_names(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.get_str("name"))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Longitude, latitude (degrees) and altitude (meters) of one sample.
fn position(source: &str, record: &Record) -> Option<(f64, f64, f64)> {
    const DEG_E7: f64 = 1e-7;
    match source {
        "GLOBAL_POSITION_INT" => Some((
            record.get_f64("lon")? * DEG_E7,
            record.get_f64("lat")? * DEG_E7,
            record.get_f64("relative_alt")? / 1000.0,
        )),
        "GPS_RAW_INT" => Some((
            record.get_f64("lon")? * DEG_E7,
            record.get_f64("lat")? * DEG_E7,
            record.get_f64("alt")? / 1000.0,
        )),
        "AHRS2" | "AHRS3" => Some((
            record.get_f64("lng")? * DEG_E7,
            record.get_f64("lat")? * DEG_E7,
            record.get_f64("altitude")?,
        )),
        _ => None,
    }
}

fn trajectory(source: &str, records: &[Record]) -> Option<Trajectory> {
    let mut start_altitude = None;
    let points: Vec<TrajectoryPoint> = records
        .iter()
        .filter_map(|record| {
            let (longitude, latitude, altitude) = position(source, record)?;
            let start = *start_altitude.get_or_insert(altitude);
            Some(TrajectoryPoint {
                timestamp: record.timestamp,
                longitude,
                latitude,
                relative_altitude: altitude - start,
            })
        })
        .collect();

    Some(Trajectory { start_altitude: start_altitude?, points })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::LogDecoder;
    use crate::mavlink::{MavlinkDecoder, MessageDictionary};
    use crate::test_utils::{sample_dataflash_log, sample_tlog};
    use crate::types::FormatKind;

    fn tlog_index(samples: usize) -> MessageIndex {
        let mut index = MessageIndex::new("flight.tlog", 0, FormatKind::Mavlink);
        MavlinkDecoder::new(MessageDictionary::builtin().unwrap())
            .decode(&sample_tlog(samples), &mut index)
            .unwrap();
        index
    }

    #[test]
    fn mavlink_summary() {
        let summary = FlightSummary::from_index(&tlog_index(10));

        assert_eq!(summary.attitude.len(), 10);
        assert_eq!(summary.vehicle_type, Some(2));
        assert_eq!(summary.vehicle_class.as_deref(), Some("quadcopter"));
        assert_eq!(summary.start_time, Some(1_700_000_000_000_000));
        assert_eq!(summary.events.iter().map(|e| e.state).collect::<Vec<_>>(), vec![
            ArmState::Disarmed,
            ArmState::Armed
        ]);
        assert_eq!(summary.flight_modes.iter().map(|m| m.mode).collect::<Vec<_>>(), vec![0, 5]);
        assert_eq!(summary.params[0].name, "WPNAV_SPEED");
        assert_eq!(summary.text_messages[0].severity, 6);
        assert_eq!(summary.attitude_sources, vec!["ATTITUDE"]);
        assert_eq!(summary.trajectory_sources, vec!["GLOBAL_POSITION_INT"]);

        let track = &summary.trajectories["GLOBAL_POSITION_INT"];
        assert_eq!(track.points.len(), 10);
        assert_eq!(track.points[0].relative_altitude, 0.0);
        assert!((track.points[9].relative_altitude - 0.9).abs() < 1e-9);
        assert!((track.points[0].latitude + 35.363_261).abs() < 1e-9);
    }

    #[test]
    fn dataflash_summary() {
        let mut index = MessageIndex::new("flight.bin", 0, FormatKind::Dataflash);
        crate::dataflash::DataflashDecoder::default()
            .decode(&sample_dataflash_log(5), &mut index)
            .unwrap();
        let summary = FlightSummary::from_index(&index);

        assert_eq!(summary.attitude.len(), 5);
        assert_eq!(summary.attitude_sources, vec!["ATT"]);
        assert_eq!(summary.mission.len(), 1);
        assert!((summary.mission[0].latitude + 35.363_261).abs() < 1e-9);
        assert_eq!(summary.params[0].value, 500.0);
        assert_eq!(summary.text_messages[0].text, "ArduCopter V4.5.1");
        assert_eq!(summary.flight_modes[0].mode, 5);
        assert!(summary.vehicle_type.is_none());
    }

    #[test]
    fn vehicle_classes() {
        assert_eq!(vehicle_class(1), "airplane");
        assert_eq!(vehicle_class(13), "quadcopter");
        assert_eq!(vehicle_class(12), "submarine");
        assert_eq!(vehicle_class(42), "42");
    }

    #[test]
    fn empty_index_gives_empty_summary() {
        let index = MessageIndex::new("empty.bin", 0, FormatKind::Dataflash);
        assert_eq!(FlightSummary::from_index(&index), FlightSummary::default());
    }
}
