use bitfield_struct::bitfield;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{RawFrame, UbxError};

/// NAV message class
pub const CLASS_NAV: u8 = 0x01;
/// NAV-PVT message id
pub const ID_NAV_PVT: u8 = 0x07;
/// NAV-PVT payload length
pub const NAV_PVT_LEN: usize = 92;

const KMH_PER_MPS: f64 = 3.6;

/// NAV-PVT `valid` byte
#[bitfield(u8)]
pub struct PvtValid {
    /// UTC date is valid
    pub valid_date: bool,
    /// UTC time of day is valid
    pub valid_time: bool,
    /// UTC time of day has no seconds uncertainty
    pub fully_resolved: bool,
    /// Magnetic declination is valid
    pub valid_mag: bool,
    #[bits(4)]
    __: u8,
}

/// NAV-PVT `flags` byte
#[bitfield(u8)]
pub struct PvtFlags {
    /// Valid fix, within DOP and accuracy masks
    pub gnss_fix_ok: bool,
    /// Differential corrections were applied
    pub diff_soln: bool,
    /// Power save mode state
    #[bits(3)]
    pub psm_state: u8,
    /// Heading of vehicle is valid
    pub head_veh_valid: bool,
    /// Carrier phase range solution status
    #[bits(2)]
    pub carr_soln: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A navigation fix decoded from one NAV-PVT payload.
pub struct Fix {
    /// GPS time of week of the navigation epoch, in milliseconds
    pub itow_ms: u32,
    /// UTC year as reported by the receiver
    pub year: u16,
    /// UTC month (1..=12)
    pub month: u8,
    /// UTC day of month (1..=31)
    pub day: u8,
    /// UTC hour (0..=23)
    pub hour: u8,
    /// UTC minute (0..=59)
    pub minute: u8,
    /// UTC second (0..=60)
    pub second: u8,
    /// Either the date or the time of day was flagged valid
    pub time_valid: bool,
    /// GNSS fix type (0: none, 2: 2D, 3: 3D, ...)
    pub fix_type: u8,
    /// The receiver considers the fix usable
    pub fix_ok: bool,
    /// Satellites used in the solution
    pub num_satellites: u8,
    /// Latitude in degrees
    pub latitude_deg: f64,
    /// Longitude in degrees
    pub longitude_deg: f64,
    /// Ground speed in m/s
    pub speed_mps: f64,
    /// Ground speed in km/h
    pub speed_kmh: f64,
    /// Host time at which the payload was decoded
    pub decoded_at: DateTime<Utc>,
}

impl Fix {
    /// Decode a NAV-PVT payload received at `decoded_at`.
    pub fn from_payload(payload: &[u8], decoded_at: DateTime<Utc>) -> Result<Self, UbxError> {
        if payload.len() != NAV_PVT_LEN {
            return Err(UbxError::PayloadLength {
                message: "NAV-PVT",
                expected: NAV_PVT_LEN,
                got: payload.len(),
            });
        }
        let valid = PvtValid::from_bits(payload[11]);
        let flags = PvtFlags::from_bits(payload[21]);
        let speed_mps = i32_at(payload, 60) as f64 / 1e3;
        Ok(Self {
            itow_ms: u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]),
            year: u16::from_le_bytes([payload[4], payload[5]]),
            month: payload[6],
            day: payload[7],
            hour: payload[8],
            minute: payload[9],
            second: payload[10],
            time_valid: valid.valid_date() || valid.valid_time(),
            fix_type: payload[20],
            fix_ok: flags.gnss_fix_ok(),
            num_satellites: payload[23],
            longitude_deg: i32_at(payload, 24) as f64 / 1e7,
            latitude_deg: i32_at(payload, 28) as f64 / 1e7,
            speed_mps,
            speed_kmh: speed_mps * KMH_PER_MPS,
            decoded_at,
        })
    }

    /// Receiver UTC time, if flagged valid and representable.
    pub fn receiver_time(&self) -> Option<DateTime<Utc>> {
        if !self.time_valid {
            return None;
        }
        NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32)?
            .and_hms_opt(self.hour as u32, self.minute as u32, self.second as u32)
            .map(|t| t.and_utc())
    }

    /// Receiver time as `YYYY-MM-DDTHH:MM:SSZ`, straight from the raw fields.
    pub fn timestamp_string(&self) -> String {
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

fn i32_at(payload: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([
        payload[offset],
        payload[offset + 1],
        payload[offset + 2],
        payload[offset + 3],
    ])
}

/// Decode a NAV-PVT payload, stamping it with the current time.
pub fn decode_nav_pvt(payload: &[u8]) -> Result<Fix, UbxError> {
    Fix::from_payload(payload, Utc::now())
}

/// Decode `frame` if it is a NAV-PVT frame; anything else is `Ok(None)`.
pub fn decode_frame(frame: &RawFrame, decoded_at: DateTime<Utc>) -> Result<Option<Fix>, UbxError> {
    match (frame.msg_class, frame.msg_id) {
        (CLASS_NAV, ID_NAV_PVT) => Fix::from_payload(&frame.payload, decoded_at).map(Some),
        _ => Ok(None),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Fields of a NAV-PVT payload a test cares about
    pub(crate) struct PvtFields {
        pub itow: u32,
        pub year: u16,
        pub month: u8,
        pub day: u8,
        pub hour: u8,
        pub minute: u8,
        pub second: u8,
        pub valid: u8,
        pub fix_type: u8,
        pub flags: u8,
        pub num_sv: u8,
        pub lon: i32,
        pub lat: i32,
        pub g_speed: i32,
    }

    impl Default for PvtFields {
        fn default() -> Self {
            Self {
                itow: 345_600_000,
                year: 2024,
                month: 12,
                day: 24,
                hour: 23,
                minute: 59,
                second: 0,
                valid: 0x03,
                fix_type: 3,
                flags: 0x01,
                num_sv: 8,
                lon: -31_237_549,
                lat: 513_779_263,
                g_speed: 5556,
            }
        }
    }

    impl PvtFields {
        pub(crate) fn payload(&self) -> Vec<u8> {
            let mut p = vec![0u8; NAV_PVT_LEN];
            p[0..4].copy_from_slice(&self.itow.to_le_bytes());
            p[4..6].copy_from_slice(&self.year.to_le_bytes());
            p[6] = self.month;
            p[7] = self.day;
            p[8] = self.hour;
            p[9] = self.minute;
            p[10] = self.second;
            p[11] = self.valid;
            p[20] = self.fix_type;
            p[21] = self.flags;
            p[23] = self.num_sv;
            p[24..28].copy_from_slice(&self.lon.to_le_bytes());
            p[28..32].copy_from_slice(&self.lat.to_le_bytes());
            p[60..64].copy_from_slice(&self.g_speed.to_le_bytes());
            p
        }

        pub(crate) fn frame(&self) -> RawFrame {
            RawFrame {
                msg_class: CLASS_NAV,
                msg_id: ID_NAV_PVT,
                payload: self.payload(),
            }
        }
    }

    #[test]
    fn decode_christmas_eve_fix() {
        let fix = decode_nav_pvt(&PvtFields::default().payload()).unwrap();
        assert!((fix.latitude_deg - 51.377_926_3).abs() < 1e-9);
        assert!((fix.longitude_deg + 3.123_754_9).abs() < 1e-9);
        assert!((fix.speed_mps - 5.556).abs() < 1e-9);
        assert!((fix.speed_kmh - 20.0).abs() < 0.01);
        assert!(fix.fix_ok);
        assert!(fix.time_valid);
        assert_eq!(fix.num_satellites, 8);
        assert_eq!(fix.fix_type, 3);
        assert_eq!(fix.itow_ms, 345_600_000);
        assert_eq!(
            (fix.year, fix.month, fix.day, fix.hour, fix.minute, fix.second),
            (2024, 12, 24, 23, 59, 0)
        );
        assert_eq!(fix.timestamp_string(), "2024-12-24T23:59:00Z");
        assert_eq!(
            fix.receiver_time().map(|t| t.to_rfc3339()),
            Some("2024-12-24T23:59:00+00:00".to_string())
        );
    }

    #[test]
    fn wrong_length_rejected() {
        let payload = PvtFields::default().payload();
        for len in [0, 91] {
            assert!(matches!(
                decode_nav_pvt(&payload[..len]),
                Err(UbxError::PayloadLength { expected: 92, got, .. }) if got == len
            ));
        }
        let mut long = payload.clone();
        long.push(0);
        assert!(matches!(
            decode_nav_pvt(&long),
            Err(UbxError::PayloadLength { got: 93, .. })
        ));
    }

    #[test]
    fn flag_bits() {
        let fields = PvtFields {
            valid: 0x02,
            flags: 0xfe,
            ..Default::default()
        };
        let fix = decode_nav_pvt(&fields.payload()).unwrap();
        assert!(fix.time_valid);
        assert!(!fix.fix_ok);

        let fields = PvtFields {
            valid: 0x0c,
            ..Default::default()
        };
        let fix = decode_nav_pvt(&fields.payload()).unwrap();
        assert!(!fix.time_valid);
        assert_eq!(fix.receiver_time(), None);

        let flags = PvtFlags::from_bits(0b1010_0011);
        assert!(flags.gnss_fix_ok());
        assert!(flags.diff_soln());
        assert!(flags.head_veh_valid());
        assert_eq!(flags.carr_soln(), 2);
    }

    #[test]
    fn southern_hemisphere_negative_speed_field() {
        let fields = PvtFields {
            lat: -338_688_000,
            lon: 1_512_093_000,
            g_speed: 0,
            ..Default::default()
        };
        let fix = decode_nav_pvt(&fields.payload()).unwrap();
        assert!((fix.latitude_deg + 33.8688).abs() < 1e-9);
        assert!((fix.longitude_deg - 151.2093).abs() < 1e-9);
        assert_eq!(fix.speed_kmh, 0.0);
    }

    #[test]
    fn other_messages_ignored() {
        let now = Utc::now();
        let ack = RawFrame {
            msg_class: 0x05,
            msg_id: 0x01,
            payload: vec![0x06, 0x01],
        };
        assert!(decode_frame(&ack, now).unwrap().is_none());
        let fix = decode_frame(&PvtFields::default().frame(), now).unwrap();
        assert_eq!(fix.map(|f| f.decoded_at), Some(now));

        let short = RawFrame {
            msg_class: CLASS_NAV,
            msg_id: ID_NAV_PVT,
            payload: vec![0; 84],
        };
        assert!(decode_frame(&short, now).is_err());
    }
}
