use std::io::Write;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use ublox_pvt::{TelemetryBus, UbxError};

#[derive(Serialize)]
struct BusRecord<'a> {
    ts: String,
    topic: &'a str,
    payload: &'a str,
    retain: bool,
}

/// Telemetry bus writing one JSON object per publish, newline delimited.
///
/// Suits piping into a broker client or appending to a log file.
pub struct JsonLinesBus<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesBus<W> {
    /// Wrap `writer`
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TelemetryBus for JsonLinesBus<W> {
    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), UbxError> {
        let record = BusRecord {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            topic,
            payload,
            retain,
        };
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_line_per_publish() {
        let mut bus = JsonLinesBus::new(Vec::new());
        bus.publish("sleigh/gps/status", "online", true).unwrap();
        bus.publish("sleigh/gps/lat", "51.3779263", false).unwrap();
        let out = String::from_utf8(bus.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["topic"], "sleigh/gps/status");
        assert_eq!(lines[0]["retain"], true);
        assert_eq!(lines[1]["payload"], "51.3779263");
        assert!(lines[1]["ts"].as_str().is_some_and(|ts| ts.ends_with('Z')));
    }

    #[test]
    fn json_payload_is_escaped() {
        let mut bus = JsonLinesBus::new(Vec::new());
        bus.publish("sleigh/gps/position", r#"{"lat":51.3}"#, true)
            .unwrap();
        let out = String::from_utf8(bus.into_inner()).unwrap();
        assert_eq!(out.lines().count(), 1);
        let line: serde_json::Value = serde_json::from_str(out.trim_end()).unwrap();
        assert_eq!(line["payload"], r#"{"lat":51.3}"#);
    }
}
