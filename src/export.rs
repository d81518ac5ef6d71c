//! csv rendering of stored readings for the export download.

use chrono::{TimeZone, Utc};

use crate::domain::Reading;

const HEADER: &str = "session_id,device_ts,temperature_c,pressure_pa,humidity_pct,voc,\
accel_x_ms2,accel_y_ms2,accel_z_ms2,gyro_x_rads,gyro_y_rads,gyro_z_rads,distance_m,received_at";

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// quote a text field if it would break the row
fn text(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// render readings oldest first; missing channels become empty cells
pub fn to_csv(newest_first: &[Reading]) -> String {
    let mut out = String::with_capacity(64 * (newest_first.len() + 1));
    out.push_str(HEADER);
    out.push('\n');

    for r in newest_first.iter().rev() {
        let received = r
            .created_at
            .clone()
            .or_else(|| Utc.timestamp_millis_opt(r.device_ts).single().map(|t| t.to_rfc3339()))
            .unwrap_or_default();
        let row = [
            text(&r.session_id),
            r.device_ts.to_string(),
            cell(r.temperature),
            cell(r.pressure),
            cell(r.humidity),
            cell(r.voc),
            cell(r.accel_x),
            cell(r.accel_y),
            cell(r.accel_z),
            cell(r.gyro_x),
            cell(r.gyro_y),
            cell(r.gyro_z),
            cell(r.distance),
            text(&received),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}
