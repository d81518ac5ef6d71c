//! ==============================================================================
//! summary.rs - experiment summary statistics
//! ==============================================================================
//!
//! purpose:
//!     turns a window of readings into the summary the dashboard shows when
//!     an experiment ends: duration, per-channel min/max/avg/change, a motion
//!     event count, tagged events and a short commentary.
//!
//!     `summarize` is pure. it never touches the store and the result is never
//!     cached; the handler fetches a fresh window on every request.
//!
//! units:
//!     acceleration is in m/s². a motion event is a consecutive pair of
//!     samples whose acceleration delta has a euclidean norm strictly above
//!     `MOTION_THRESHOLD`.
//!
//! ==============================================================================

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::domain::Reading;

/// m/s² of acceleration change between two samples that counts as motion
pub const MOTION_THRESHOLD: f64 = 2.0;

/// |temperature change| above this raises an event
const TEMP_EVENT_THRESHOLD: f64 = 5.0;
/// ...and above this the event is high severity
const TEMP_HIGH_THRESHOLD: f64 = 10.0;
/// |temperature change| above this is called a trend in the commentary
const TEMP_TREND_THRESHOLD: f64 = 2.0;

const NO_DATA_COMMENTARY: &str = "No data was collected during this experiment. \
Check that the device is powered, connected and streaming readings, then start a new run.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentSummary {
    /// whole seconds between the first and last sample
    pub duration: i64,
    pub data_points: usize,
    /// when this summary was generated
    pub timestamp: String,
    pub statistics: Statistics,
    pub events: Vec<SummaryEvent>,
    pub commentary: String,
    pub data_quality: DataQuality,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub temperature: ChannelStats,
    pub pressure: ChannelStats,
    pub humidity: ChannelStats,
    pub distance: ChannelStats,
    pub acceleration: AccelerationStats,
}

/// `None` renders as "N/A"
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelStats {
    #[serde(serialize_with = "or_not_applicable")]
    pub min: Option<f64>,
    #[serde(serialize_with = "or_not_applicable")]
    pub max: Option<f64>,
    #[serde(serialize_with = "or_not_applicable")]
    pub avg: Option<f64>,
    #[serde(serialize_with = "or_not_applicable")]
    pub change: Option<f64>,
    pub unit: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccelerationStats {
    pub x: AxisStats,
    pub y: AxisStats,
    pub z: AxisStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisStats {
    #[serde(serialize_with = "or_not_applicable")]
    pub avg: Option<f64>,
    pub unit: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Motion,
    Temperature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub description: String,
    /// device timestamp of the last sample in the window
    pub timestamp: i64,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuality {
    /// samples that arrived with every channel empty
    pub anomalies: usize,
    pub motion_events: usize,
    pub total_events: usize,
}

fn or_not_applicable<S: Serializer>(value: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => s.serialize_f64(*v),
        None => s.serialize_str("N/A"),
    }
}

impl ChannelStats {
    fn empty(unit: &'static str) -> Self {
        Self { min: None, max: None, avg: None, change: None, unit }
    }

    /// `values` must be in chronological order
    fn from_values(values: &[f64], unit: &'static str) -> Self {
        let (Some(first), Some(last)) = (values.first(), values.last()) else {
            return Self::empty(unit);
        };
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let change = if values.len() < 2 { 0.0 } else { last - first };
        Self {
            min: Some(min),
            max: Some(max),
            avg: Some(mean(values)),
            change: Some(change),
            unit,
        }
    }
}

impl AxisStats {
    fn from_values(values: &[f64]) -> Self {
        Self { avg: (!values.is_empty()).then(|| mean(values)), unit: "m/s²" }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn present(samples: &[&Reading], channel: impl Fn(&Reading) -> Option<f64>) -> Vec<f64> {
    samples.iter().filter_map(|r| channel(*r)).collect()
}

/// count consecutive sample pairs whose acceleration jump exceeds the threshold
pub fn count_motion_events(samples: &[&Reading]) -> usize {
    samples
        .windows(2)
        .filter_map(|pair| {
            let (ax, ay, az) = pair[0].acceleration()?;
            let (bx, by, bz) = pair[1].acceleration()?;
            Some(((bx - ax).powi(2) + (by - ay).powi(2) + (bz - az).powi(2)).sqrt())
        })
        .filter(|norm| *norm > MOTION_THRESHOLD)
        .count()
}

/// summary returned when the window is empty
pub fn no_data(generated_at: DateTime<Utc>) -> ExperimentSummary {
    ExperimentSummary {
        duration: 0,
        data_points: 0,
        timestamp: generated_at.to_rfc3339(),
        statistics: Statistics {
            temperature: ChannelStats::empty("°C"),
            pressure: ChannelStats::empty("Pa"),
            humidity: ChannelStats::empty("%"),
            distance: ChannelStats::empty("m"),
            acceleration: AccelerationStats {
                x: AxisStats { avg: None, unit: "m/s²" },
                y: AxisStats { avg: None, unit: "m/s²" },
                z: AxisStats { avg: None, unit: "m/s²" },
            },
        },
        events: Vec::new(),
        commentary: NO_DATA_COMMENTARY.to_string(),
        data_quality: DataQuality { anomalies: 0, motion_events: 0, total_events: 0 },
    }
}

/// summarize a window of readings, newest first (the order the store returns)
pub fn summarize(window: &[Reading], generated_at: DateTime<Utc>) -> ExperimentSummary {
    if window.is_empty() {
        return no_data(generated_at);
    }

    let samples: Vec<&Reading> = window.iter().rev().collect();

    let duration = match (samples.first(), samples.last()) {
        (Some(first), Some(last)) if samples.len() >= 2 => {
            ((last.device_ts - first.device_ts) / 1000).max(0)
        }
        _ => 0,
    };

    let statistics = Statistics {
        temperature: ChannelStats::from_values(&present(&samples, |r| r.temperature), "°C"),
        pressure: ChannelStats::from_values(&present(&samples, |r| r.pressure), "Pa"),
        humidity: ChannelStats::from_values(&present(&samples, |r| r.humidity), "%"),
        distance: ChannelStats::from_values(&present(&samples, |r| r.distance), "m"),
        acceleration: AccelerationStats {
            x: AxisStats::from_values(&present(&samples, |r| r.accel_x)),
            y: AxisStats::from_values(&present(&samples, |r| r.accel_y)),
            z: AxisStats::from_values(&present(&samples, |r| r.accel_z)),
        },
    };

    let motion_events = count_motion_events(&samples);
    let last_ts = samples.last().map(|r| r.device_ts).unwrap_or_default();

    let mut events = Vec::new();
    if motion_events > 0 {
        events.push(SummaryEvent {
            kind: EventKind::Motion,
            description: format!("{} motion events detected", motion_events),
            timestamp: last_ts,
            severity: Severity::Medium,
        });
    }
    if let Some(change) = statistics.temperature.change {
        if change.abs() > TEMP_EVENT_THRESHOLD {
            let direction = if change > 0.0 { "increase" } else { "decrease" };
            events.push(SummaryEvent {
                kind: EventKind::Temperature,
                description: format!("Significant temperature {} of {:.1}°C", direction, change.abs()),
                timestamp: last_ts,
                severity: if change.abs() > TEMP_HIGH_THRESHOLD {
                    Severity::High
                } else {
                    Severity::Medium
                },
            });
        }
    }

    let commentary = commentary(statistics.temperature.change, motion_events, samples.len(), duration);
    let anomalies = samples.iter().filter(|r| r.is_empty()).count();

    ExperimentSummary {
        duration,
        data_points: samples.len(),
        timestamp: generated_at.to_rfc3339(),
        statistics,
        data_quality: DataQuality {
            anomalies,
            motion_events,
            total_events: events.len(),
        },
        events,
        commentary,
    }
}

fn commentary(temp_change: Option<f64>, motion_events: usize, samples: usize, duration: i64) -> String {
    let temperature = match temp_change {
        Some(c) if c > TEMP_TREND_THRESHOLD => {
            format!("Temperature increased by {:.1}°C over the experiment.", c)
        }
        Some(c) if c < -TEMP_TREND_THRESHOLD => {
            format!("Temperature decreased by {:.1}°C over the experiment.", c.abs())
        }
        Some(c) => format!("Temperature remained stable ({:+.1}°C).", c),
        None => "No temperature data was recorded.".to_string(),
    };

    let motion = match motion_events {
        0 => "No significant motion was detected.".to_string(),
        1 => "1 motion event was detected.".to_string(),
        n => format!("{} motion events were detected.", n),
    };

    format!(
        "{} {} Collected {} data points over {} seconds.",
        temperature, motion, samples, duration
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ts: i64) -> Reading {
        Reading { session_id: "s".into(), device_ts: ts, ..Default::default() }
    }

    fn with_temp(ts: i64, t: f64) -> Reading {
        Reading { temperature: Some(t), ..at(ts) }
    }

    fn with_accel(ts: i64, x: f64, y: f64, z: f64) -> Reading {
        Reading { accel_x: Some(x), accel_y: Some(y), accel_z: Some(z), ..at(ts) }
    }

    /// newest first, like the store returns them
    fn newest_first(mut chronological: Vec<Reading>) -> Vec<Reading> {
        chronological.reverse();
        chronological
    }

    #[test]
    fn empty_window_is_the_fixture() {
        let now = Utc::now();
        let summary = summarize(&[], now);
        assert_eq!(summary, no_data(now));
        assert_eq!(summary.data_points, 0);
        assert_eq!(summary.duration, 0);
        assert_eq!(summary.data_quality.motion_events, 0);
        assert!(summary.events.is_empty());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["statistics"]["temperature"]["min"], "N/A");
        assert_eq!(json["statistics"]["acceleration"]["x"]["avg"], "N/A");
        assert_eq!(json["dataPoints"], 0);
    }

    #[test]
    fn two_sample_temperature_stats() {
        let window = newest_first(vec![with_temp(0, 20.0), with_temp(4_500, 25.0)]);
        let summary = summarize(&window, Utc::now());

        let t = &summary.statistics.temperature;
        assert_eq!(t.change, Some(5.0));
        assert_eq!(t.min, Some(20.0));
        assert_eq!(t.max, Some(25.0));
        assert_eq!(t.avg, Some(22.5));
        // exactly 5 is not strictly greater than 5
        assert!(summary.events.iter().all(|e| e.kind != EventKind::Temperature));
        assert_eq!(summary.duration, 4);
    }

    #[test]
    fn temperature_event_severity() {
        let medium = summarize(&newest_first(vec![with_temp(0, 20.0), with_temp(1, 26.0)]), Utc::now());
        assert_eq!(medium.events.len(), 1);
        assert_eq!(medium.events[0].kind, EventKind::Temperature);
        assert_eq!(medium.events[0].severity, Severity::Medium);

        let high = summarize(&newest_first(vec![with_temp(0, 30.0), with_temp(1, 18.0)]), Utc::now());
        assert_eq!(high.events[0].severity, Severity::High);
        assert!(high.events[0].description.contains("decrease"));
    }

    #[test]
    fn motion_counted_per_pair() {
        let window = newest_first(vec![
            with_accel(0, 0.0, 0.0, 9.8),
            with_accel(100, 3.0, 0.0, 9.8),
            with_accel(200, 0.0, 3.0, 9.8),
        ]);
        let summary = summarize(&window, Utc::now());

        assert_eq!(summary.data_quality.motion_events, 2);
        let motion: Vec<_> = summary.events.iter().filter(|e| e.kind == EventKind::Motion).collect();
        assert_eq!(motion.len(), 1);
        assert_eq!(motion[0].severity, Severity::Medium);
        assert_eq!(motion[0].timestamp, 200);
    }

    #[test]
    fn small_jitter_is_not_motion() {
        let window = newest_first(vec![
            with_accel(0, 0.0, 0.0, 9.8),
            with_accel(100, 0.5, 0.5, 9.9),
            with_accel(200, 0.0, 0.0, 9.8),
        ]);
        assert_eq!(summarize(&window, Utc::now()).data_quality.motion_events, 0);
    }

    #[test]
    fn pairs_missing_acceleration_are_skipped() {
        let window = newest_first(vec![
            with_accel(0, 0.0, 0.0, 0.0),
            at(100),
            with_accel(200, 10.0, 10.0, 10.0),
        ]);
        assert_eq!(summarize(&window, Utc::now()).data_quality.motion_events, 0);
    }

    #[test]
    fn single_value_has_zero_change() {
        let window = vec![Reading { humidity: Some(40.0), ..at(0) }];
        let summary = summarize(&window, Utc::now());
        assert_eq!(summary.statistics.humidity.change, Some(0.0));
        assert_eq!(summary.statistics.humidity.avg, Some(40.0));
        assert_eq!(summary.statistics.pressure.avg, None);
        assert_eq!(summary.duration, 0);
    }

    #[test]
    fn acceleration_only_reports_means() {
        let window = newest_first(vec![with_accel(0, 1.0, 2.0, 9.0), with_accel(1, 3.0, 4.0, 10.0)]);
        let summary = summarize(&window, Utc::now());
        assert_eq!(summary.statistics.acceleration.x.avg, Some(2.0));
        assert_eq!(summary.statistics.acceleration.z.avg, Some(9.5));

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json["statistics"]["acceleration"]["x"].get("min").is_none());
    }

    #[test]
    fn empty_samples_count_as_anomalies() {
        let window = newest_first(vec![with_temp(0, 20.0), at(1), with_temp(2, 20.5)]);
        assert_eq!(summarize(&window, Utc::now()).data_quality.anomalies, 1);
    }

    #[test]
    fn commentary_reports_trend_motion_and_size() {
        let text = commentary(Some(3.0), 0, 10, 60);
        assert!(text.contains("increased by 3.0"));
        assert!(text.contains("No significant motion"));
        assert!(text.contains("10 data points over 60 seconds"));

        assert!(commentary(Some(-2.5), 4, 5, 1).contains("decreased by 2.5"));
        assert!(commentary(Some(1.0), 1, 5, 1).contains("remained stable"));
        assert!(commentary(None, 0, 5, 1).contains("No temperature data"));
    }
}
