use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{decode_frame, Fix, RawFrame, UbxError};

/// Sink for decoded telemetry, e.g. an MQTT client or a log writer.
pub trait TelemetryBus {
    /// Publish `payload` on `topic`; `retain` asks the bus to keep it as the
    /// last known value for late subscribers.
    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), UbxError>;
}

impl<B: TelemetryBus + ?Sized> TelemetryBus for &mut B {
    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), UbxError> {
        (**self).publish(topic, payload, retain)
    }
}

impl<B: TelemetryBus + ?Sized> TelemetryBus for Box<B> {
    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), UbxError> {
        (**self).publish(topic, payload, retain)
    }
}

#[derive(Debug, Clone)]
/// Topic layout and timing of a [`FixPublisher`]
pub struct PublishPolicy {
    /// Prefix of every topic, without a trailing slash
    pub topic_base: String,
    /// Retain the `position` record on the bus
    pub retain_position: bool,
    /// Minimum spacing between two published fixes
    pub min_interval: Duration,
    /// Age after which the last fix is reported as lost
    pub stale_after: Duration,
}

impl Default for PublishPolicy {
    fn default() -> Self {
        Self {
            topic_base: "sleigh/gps".into(),
            retain_position: true,
            min_interval: Duration::milliseconds(1000),
            stale_after: Duration::milliseconds(5000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// JSON body of the `position` topic
pub struct PositionRecord {
    /// GPS time of week, ms
    #[serde(rename = "iTOW_ms")]
    pub itow_ms: u32,
    /// Receiver UTC time, `YYYY-MM-DDTHH:MM:SSZ`
    pub time: String,
    /// Receiver time flagged valid
    pub time_ok: bool,
    /// GNSS fix type
    pub fix_type: u8,
    /// Fix usable
    pub fix_ok: bool,
    /// Satellites used
    #[serde(rename = "numSV")]
    pub num_sv: u8,
    /// Latitude, degrees
    pub lat: f64,
    /// Longitude, degrees
    pub lon: f64,
    /// Ground speed, m/s
    pub speed_mps: f64,
    /// Ground speed, km/h
    pub speed_kmh: f64,
    /// Host decode time, seconds since the Unix epoch
    pub timestamp: f64,
}

impl From<&Fix> for PositionRecord {
    fn from(fix: &Fix) -> Self {
        Self {
            itow_ms: fix.itow_ms,
            time: fix.timestamp_string(),
            time_ok: fix.time_valid,
            fix_type: fix.fix_type,
            fix_ok: fix.fix_ok,
            num_sv: fix.num_satellites,
            lat: fix.latitude_deg,
            lon: fix.longitude_deg,
            speed_mps: fix.speed_mps,
            speed_kmh: fix.speed_kmh,
            timestamp: fix.decoded_at.timestamp_micros() as f64 / 1e6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// What [`FixPublisher::on_frame`] did with a frame
pub enum FrameOutcome {
    /// Not a NAV-PVT frame
    Ignored,
    /// Decoded and kept, but inside the minimum publish interval
    Throttled,
    /// Decoded and sent to the bus
    Published,
}

/// Turns decoded frames into rate-limited bus publishes, and reports
/// `fix_ok = 0` once the receiver stops producing fixes.
pub struct FixPublisher<B> {
    bus: B,
    policy: PublishPolicy,
    last_published_at: Option<DateTime<Utc>>,
    last_fix: Option<Fix>,
    last_stale_at: Option<DateTime<Utc>>,
}

impl<B: TelemetryBus> FixPublisher<B> {
    /// Create a publisher writing to `bus`.
    pub fn new(bus: B, policy: PublishPolicy) -> Self {
        Self {
            bus,
            policy,
            last_published_at: None,
            last_fix: None,
            last_stale_at: None,
        }
    }

    /// Publishing policy in use
    pub fn policy(&self) -> &PublishPolicy {
        &self.policy
    }

    /// Most recently decoded fix, published or not
    pub fn last_fix(&self) -> Option<&Fix> {
        self.last_fix.as_ref()
    }

    /// Time of the last successful fix publish
    pub fn last_published_at(&self) -> Option<DateTime<Utc>> {
        self.last_published_at
    }

    /// The underlying bus
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Give the bus back.
    pub fn into_bus(self) -> B {
        self.bus
    }

    fn topic(&self, leaf: &str) -> String {
        format!("{}/{}", self.policy.topic_base, leaf)
    }

    /// Handle one validated frame received at `now`.
    ///
    /// A NAV-PVT payload of the wrong length is returned as an error and
    /// leaves the publisher untouched.
    pub fn on_frame(
        &mut self,
        frame: &RawFrame,
        now: DateTime<Utc>,
    ) -> Result<FrameOutcome, UbxError> {
        let Some(fix) = decode_frame(frame, now)? else {
            log::trace!("Ignoring UBX {:#04x}/{:#04x}", frame.msg_class, frame.msg_id);
            return Ok(FrameOutcome::Ignored);
        };
        let due = self
            .last_published_at
            .map_or(true, |last| now - last >= self.policy.min_interval);
        let res = if due {
            Some(self.publish_fix(&fix))
        } else {
            None
        };
        self.last_fix = Some(fix);
        self.last_stale_at = None;
        match res {
            None => Ok(FrameOutcome::Throttled),
            Some(Ok(())) => {
                self.last_published_at = Some(now);
                Ok(FrameOutcome::Published)
            }
            Some(Err(e)) => Err(e),
        }
    }

    /// Check fix liveness at `now`; returns whether a stale signal was sent.
    ///
    /// The signal goes out once the last fix is older than
    /// [`PublishPolicy::stale_after`], then again after every further
    /// `stale_after` without a new fix.
    pub fn on_tick(&mut self, now: DateTime<Utc>) -> Result<bool, UbxError> {
        let Some(decoded_at) = self.last_fix.as_ref().map(|fix| fix.decoded_at) else {
            return Ok(false);
        };
        if now - decoded_at <= self.policy.stale_after {
            return Ok(false);
        }
        if let Some(last) = self.last_stale_at {
            if now - last < self.policy.stale_after {
                return Ok(false);
            }
        }
        log::warn!(
            "No fix for {:.1} s, reporting fix lost",
            (now - decoded_at).num_milliseconds() as f64 / 1e3
        );
        let topic = self.topic("fix_ok");
        self.bus.publish(&topic, "0", false)?;
        self.last_stale_at = Some(now);
        Ok(true)
    }

    /// Publish the retained `online` status.
    pub fn announce_online(&mut self) -> Result<(), UbxError> {
        let topic = self.topic("status");
        self.bus.publish(&topic, "online", true)
    }

    /// Publish the retained `offline` status.
    pub fn announce_offline(&mut self) -> Result<(), UbxError> {
        let topic = self.topic("status");
        self.bus.publish(&topic, "offline", true)
    }

    fn publish_fix(&mut self, fix: &Fix) -> Result<(), UbxError> {
        let record = serde_json::to_string(&PositionRecord::from(fix))?;
        let retain = self.policy.retain_position;
        let scalars = [
            ("lat", fix.latitude_deg.to_string()),
            ("lon", fix.longitude_deg.to_string()),
            ("speed_mps", fix.speed_mps.to_string()),
            ("speed_kmh", fix.speed_kmh.to_string()),
            ("fix_ok", if fix.fix_ok { "1" } else { "0" }.to_string()),
            ("numsat", fix.num_satellites.to_string()),
        ];
        let topic = self.topic("position");
        self.bus.publish(&topic, &record, retain)?;
        for (leaf, value) in scalars {
            let topic = self.topic(leaf);
            self.bus.publish(&topic, &value, false)?;
        }
        log::debug!(
            "Published fix ({:.7}, {:.7}) {:.2} km/h, {} SV, ok={}",
            fix.latitude_deg,
            fix.longitude_deg,
            fix.speed_kmh,
            fix.num_satellites,
            fix.fix_ok
        );
        Ok(())
    }
}
