use std::io::Write;

use crate::{
    encode_frame,
    nav_pvt::{CLASS_NAV, ID_NAV_PVT},
    UbxError,
};

/// CFG message class
pub const CLASS_CFG: u8 = 0x06;
/// CFG-MSG message id
pub const ID_CFG_MSG: u8 = 0x01;
/// Standard NMEA message class
pub const CLASS_NMEA: u8 = 0xF0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Per-port output rate of one message type, UBX-6 CFG-MSG layout.
///
/// A rate of `n` sends the message every `n`th navigation solution on that
/// port; zero disables it.
pub struct ConfigCommand {
    /// Class of the message being configured
    pub target_class: u8,
    /// Id of the message being configured
    pub target_id: u8,
    /// Rate on the DDC (I2C) port
    pub rate_i2c: u8,
    /// Rate on UART1
    pub rate_uart1: u8,
    /// Rate on UART2
    pub rate_uart2: u8,
    /// Rate on USB
    pub rate_usb: u8,
}

impl ConfigCommand {
    /// Output `class/id` on USB only, once per solution.
    pub fn usb_only(target_class: u8, target_id: u8) -> Self {
        Self {
            target_class,
            target_id,
            rate_i2c: 0,
            rate_uart1: 0,
            rate_uart2: 0,
            rate_usb: 1,
        }
    }

    /// Silence `class/id` on every port.
    pub fn disabled(target_class: u8, target_id: u8) -> Self {
        Self {
            target_class,
            target_id,
            rate_i2c: 0,
            rate_uart1: 0,
            rate_uart2: 0,
            rate_usb: 0,
        }
    }

    /// The 6-byte CFG-MSG payload
    pub fn payload(&self) -> [u8; 6] {
        [
            self.target_class,
            self.target_id,
            self.rate_i2c,
            self.rate_uart1,
            self.rate_uart2,
            self.rate_usb,
        ]
    }

    /// Short name of the configured message, e.g. `NAV-PVT` or `GGA`
    pub fn name(&self) -> &'static str {
        match (self.target_class, self.target_id) {
            (CLASS_NAV, ID_NAV_PVT) => "NAV-PVT",
            (CLASS_NMEA, id) => SILENCED_NMEA
                .iter()
                .find(|(_, nmea_id)| *nmea_id == id)
                .map_or("NMEA", |(name, _)| *name),
            _ => "UBX",
        }
    }

    /// The complete CFG-MSG frame
    pub fn to_frame(&self) -> Vec<u8> {
        encode_frame(CLASS_CFG, ID_CFG_MSG, &self.payload())
    }
}

/// Encode a UBX-6 style CFG-MSG frame setting the output rates of one message.
pub fn encode_cfg_msg(
    target_class: u8,
    target_id: u8,
    rate_i2c: u8,
    rate_uart1: u8,
    rate_uart2: u8,
    rate_usb: u8,
) -> Vec<u8> {
    ConfigCommand {
        target_class,
        target_id,
        rate_i2c,
        rate_uart1,
        rate_uart2,
        rate_usb,
    }
    .to_frame()
}

/// NMEA sentences silenced at startup: GGA, RMC and ZDA
pub const SILENCED_NMEA: [(&str, u8); 3] = [("GGA", 0x00), ("RMC", 0x04), ("ZDA", 0x08)];

/// One-shot startup handshake: NAV-PVT on, legacy NMEA sentences off.
///
/// Frames are written without waiting for an acknowledgement.
pub struct ReceiverConfigurator;

impl ReceiverConfigurator {
    /// Commands sent at startup, in order
    pub fn commands() -> Vec<ConfigCommand> {
        let mut cmds = vec![ConfigCommand::usb_only(CLASS_NAV, ID_NAV_PVT)];
        cmds.extend(
            SILENCED_NMEA
                .iter()
                .map(|(_, id)| ConfigCommand::disabled(CLASS_NMEA, *id)),
        );
        cmds
    }

    /// Write every startup command to `port` and flush it.
    ///
    /// Stops at the first failed write; nothing is retried.
    pub fn configure<W: Write + ?Sized>(port: &mut W) -> Result<(), UbxError> {
        for cmd in Self::commands() {
            log::debug!(
                "CFG-MSG {} ({:#04x}/{:#04x}) rates {:?}",
                cmd.name(),
                cmd.target_class,
                cmd.target_id,
                &cmd.payload()[2..]
            );
            port.write_all(&cmd.to_frame())?;
        }
        port.flush()?;
        Ok(())
    }
}
