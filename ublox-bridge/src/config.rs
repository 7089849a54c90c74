use std::{path::Path, path::PathBuf, time::Duration};

use argh::FromArgs;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use ublox_pvt::{FrameAssembler, PublishPolicy};

use crate::error::BridgeError;

#[derive(FromArgs, Serialize, Deserialize, Debug, Clone, PartialEq)]
/// Publish NAV-PVT fixes from a u-blox receiver as telemetry records
pub struct BridgeCfg {
    /// serial device
    #[argh(option, default = "String::from(\"/dev/ttyACM0\")")]
    pub device: String,
    /// baud rate
    #[argh(option, default = "9600")]
    pub baud_rate: u32,
    /// read timeout in milliseconds
    #[argh(option, default = "1000")]
    pub timeout: u64,
    /// prefix of every published topic
    #[argh(option, default = "String::from(\"sleigh/gps\")")]
    pub topic_base: String,
    /// do not retain the position record
    #[argh(switch)]
    #[serde(default)]
    pub no_retain: bool,
    /// minimum milliseconds between two published fixes
    #[argh(option, default = "1000")]
    pub min_interval: u64,
    /// milliseconds without a fix before reporting it lost
    #[argh(option, default = "5000")]
    pub stale_after: u64,
    /// resynchronize past frame headers announcing a larger payload
    #[argh(option)]
    #[serde(default)]
    pub max_payload: Option<u16>,
    /// do not send the startup configuration to the receiver
    #[argh(switch)]
    #[serde(default)]
    pub skip_configure: bool,
    /// write telemetry records to this file instead of stdout
    #[argh(option)]
    #[serde(default)]
    pub output: Option<PathBuf>,
    /// store this configuration as the default
    #[argh(switch)]
    #[serde(skip)]
    pub save: bool,
    /// run with the stored default configuration
    #[argh(switch)]
    #[serde(skip)]
    pub saved: bool,
}

impl BridgeCfg {
    /// Publishing policy described by this configuration
    pub fn policy(&self) -> Result<PublishPolicy, BridgeError> {
        Ok(PublishPolicy {
            topic_base: self.topic_base.trim_end_matches('/').to_string(),
            retain_position: !self.no_retain,
            min_interval: millis("min_interval", self.min_interval)?,
            stale_after: millis("stale_after", self.stale_after)?,
        })
    }

    /// Frame assembler described by this configuration
    pub fn assembler(&self) -> FrameAssembler {
        match self.max_payload {
            Some(max) => FrameAssembler::with_max_payload(max),
            None => FrameAssembler::new(),
        }
    }

    /// Serial read timeout
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// Store the configuration in the default location
    pub fn store_default(&self) -> Result<PathBuf, BridgeError> {
        let mut path = get_default_path();
        std::fs::create_dir_all(&path)?;
        path.push("config.json");
        self.store_to(&path)?;
        Ok(path)
    }

    /// Load the configuration from the default location
    pub fn load_default() -> Result<Self, BridgeError> {
        let mut path = get_default_path();
        path.push("config.json");
        Self::load_from(&path)
    }

    /// Store the configuration as pretty JSON at `path`
    pub fn store_to(&self, path: &Path) -> Result<(), BridgeError> {
        let data =
            serde_json::to_string_pretty(self).map_err(|e| BridgeError::Config(e.to_string()))?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Load a configuration from `path`; comments and trailing commas are accepted.
    pub fn load_from(path: &Path) -> Result<Self, BridgeError> {
        let data = std::fs::read_to_string(path)?;
        json5::from_str(&data).map_err(|e| BridgeError::Config(format!("{path:?}: {e}")))
    }
}

fn millis(name: &str, ms: u64) -> Result<chrono::Duration, BridgeError> {
    i64::try_from(ms)
        .ok()
        .and_then(chrono::Duration::try_milliseconds)
        .ok_or_else(|| BridgeError::Config(format!("{name}: {ms} ms is out of range")))
}

fn get_default_path() -> PathBuf {
    if let Some(path) = ProjectDirs::from("", "", "ublox_bridge") {
        path.config_dir().to_path_buf()
    } else {
        PathBuf::from(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> BridgeCfg {
        BridgeCfg::from_args(&["ublox-bridge"], args).unwrap()
    }

    #[test]
    fn defaults_match_receiver_service() {
        let cfg = parse(&[]);
        assert_eq!(cfg.device, "/dev/ttyACM0");
        assert_eq!(cfg.baud_rate, 9600);
        assert_eq!(cfg.read_timeout(), Duration::from_secs(1));
        let policy = cfg.policy().unwrap();
        assert_eq!(policy.topic_base, "sleigh/gps");
        assert!(policy.retain_position);
        assert_eq!(policy.min_interval, chrono::Duration::seconds(1));
        assert_eq!(policy.stale_after, chrono::Duration::seconds(5));
    }

    #[test]
    fn options_flow_into_policy() {
        let cfg = parse(&[
            "--device",
            "/dev/ttyUSB0",
            "--topic-base",
            "tracker/",
            "--no-retain",
            "--min-interval",
            "250",
            "--max-payload",
            "1024",
        ]);
        assert_eq!(cfg.device, "/dev/ttyUSB0");
        let policy = cfg.policy().unwrap();
        assert_eq!(policy.topic_base, "tracker");
        assert!(!policy.retain_position);
        assert_eq!(policy.min_interval, chrono::Duration::milliseconds(250));
        assert_eq!(cfg.max_payload, Some(1024));
    }

    #[test]
    fn out_of_range_intervals_are_rejected() {
        let cfg = parse(&["--stale-after", "18446744073709551615"]);
        assert!(matches!(cfg.policy(), Err(BridgeError::Config(_))));
        let cfg = parse(&["--min-interval", "9223372036854775808"]);
        assert!(matches!(cfg.policy(), Err(BridgeError::Config(_))));
        let cfg = parse(&["--stale-after", "86400000"]);
        assert_eq!(
            cfg.policy().unwrap().stale_after,
            chrono::Duration::days(1)
        );
    }

    #[test]
    fn out_of_range_interval_in_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut cfg = parse(&[]);
        cfg.min_interval = u64::MAX;
        cfg.store_to(&path).unwrap();
        let loaded = BridgeCfg::load_from(&path).unwrap();
        assert!(matches!(loaded.policy(), Err(BridgeError::Config(_))));
    }

    #[test]
    fn store_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut cfg = parse(&["--baud-rate", "115200", "--save"]);
        cfg.store_to(&path).unwrap();
        let loaded = BridgeCfg::load_from(&path).unwrap();
        assert!(!loaded.save);
        cfg.save = false;
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn hand_edited_config_with_comments() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                // receiver on the sleigh
                "device": "/dev/ttyACM1",
                "baud_rate": 38400,
                "timeout": 500,
                "topic_base": "sleigh/gps",
                "min_interval": 1000,
                "stale_after": 5000,
            }"#,
        )
        .unwrap();
        let cfg = BridgeCfg::load_from(&path).unwrap();
        assert_eq!(cfg.device, "/dev/ttyACM1");
        assert_eq!(cfg.baud_rate, 38400);
        assert!(!cfg.no_retain);
        assert_eq!(cfg.output, None);
    }

    #[test]
    fn missing_config_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(BridgeCfg::load_from(&dir.path().join("nope.json")).is_err());
    }
}
