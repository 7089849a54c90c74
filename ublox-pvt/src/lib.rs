#![deny(missing_docs)]
//! # UBX NAV-PVT bridge
//! A small engine for u-blox receivers that speak UBX over a serial line.
//!
//! Reassembles UBX frames from a raw byte stream, decodes UBX-NAV-PVT into a
//! [`Fix`], encodes the UBX-CFG-MSG frames that switch NAV-PVT on and the
//! legacy NMEA sentences off, and publishes fixes to a [`TelemetryBus`] with
//! rate limiting and a stale-fix heartbeat.
mod cfg_msg;
mod error;
mod frame;
mod nav_pvt;
mod publish;
mod session;

pub use cfg_msg::{
    encode_cfg_msg, ConfigCommand, ReceiverConfigurator, CLASS_CFG, CLASS_NMEA, ID_CFG_MSG,
    SILENCED_NMEA,
};
pub use error::UbxError;
pub use frame::{
    encode_frame, ubx_checksum, AssemblerStats, FrameAssembler, Frames, RawFrame, FRAME_OVERHEAD,
    SYNC_CHAR_1, SYNC_CHAR_2,
};
pub use nav_pvt::{
    decode_frame, decode_nav_pvt, Fix, PvtFlags, PvtValid, CLASS_NAV, ID_NAV_PVT, NAV_PVT_LEN,
};
pub use publish::{FixPublisher, FrameOutcome, PositionRecord, PublishPolicy, TelemetryBus};
pub use session::{PollSummary, Session};
