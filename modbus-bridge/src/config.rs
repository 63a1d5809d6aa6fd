//! Gateway configuration: one value built once from CLI arguments (or a
//! config file, for the `run` subcommand), then handed to the gateway.
//! Mirrors the flat `config` dict the original kept at module scope, but as
//! a typed, validated struct rather than free globals.

use std::time::Duration;

use crate::common::SerialPortArgs;

#[derive(Debug, Clone)]
pub struct Config {
    /// Port facing the Sullair HMI, impersonating the A1000.
    pub hmi_port: SerialPortArgs,
    /// Port facing the WEG CFW-11.
    pub weg_port: SerialPortArgs,
    /// Modbus slave id this gateway answers as, toward the HMI.
    pub yaskawa_slave_id: u8,
    /// Modbus slave id of the CFW-11 on the WEG-facing bus.
    pub weg_slave_id: u8,
    /// Answer HMI requests for any slave id, not just `yaskawa_slave_id`.
    pub respond_to_any_id: bool,
    /// A1000-side frequency-reference full scale.
    pub max_freq_yaskawa: u16,
    /// CFW-11 motor synchronous frequency at full scale.
    pub weg_max_freq_hz: f64,
    /// Share one serial handle between the HMI and CFW-11 sides, instead of
    /// opening `weg_port` separately. True whenever the two port paths are
    /// equal, unless the caller forces dual-bus anyway.
    pub single_bus: bool,
    /// How often the heartbeat read fires when the bus is otherwise idle.
    pub heartbeat_interval: Duration,
    /// How long a single serial read may block before giving up.
    pub serial_read_timeout: Duration,
    /// How long to wait for the CFW-11's reply to a queued write or
    /// heartbeat read before treating it as failed.
    pub weg_response_timeout: Duration,
    /// Deadline for a direct (operator-triggered) read of the CFW-11.
    pub direct_read_timeout: Duration,
}

/// Errors raised validating a [`Config`] before the gateway starts.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    InvalidSlaveId(&'static str, u8),
    ZeroFrequencyScale,
    NonPositiveWegFrequency,
    NonPositiveHeartbeatInterval,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidSlaveId(which, id) => {
                write!(f, "{which} slave id {id} is out of the 1..=247 range")
            }
            ConfigError::ZeroFrequencyScale => write!(f, "max_freq_yaskawa must be nonzero"),
            ConfigError::NonPositiveWegFrequency => {
                write!(f, "weg_max_freq_hz must be a positive number")
            }
            ConfigError::NonPositiveHeartbeatInterval => {
                write!(f, "heartbeat_interval must be greater than zero")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=247).contains(&self.yaskawa_slave_id) {
            return Err(ConfigError::InvalidSlaveId("yaskawa", self.yaskawa_slave_id));
        }
        if !(1..=247).contains(&self.weg_slave_id) {
            return Err(ConfigError::InvalidSlaveId("weg", self.weg_slave_id));
        }
        if self.max_freq_yaskawa == 0 {
            return Err(ConfigError::ZeroFrequencyScale);
        }
        if self.weg_max_freq_hz <= 0.0 {
            return Err(ConfigError::NonPositiveWegFrequency);
        }
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::NonPositiveHeartbeatInterval);
        }
        Ok(())
    }

    pub fn translator_params(&self) -> modbus_proto::translator::TranslatorParams {
        modbus_proto::translator::TranslatorParams {
            max_freq_yaskawa: self.max_freq_yaskawa,
            weg_max_freq_hz: self.weg_max_freq_hz,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::{Parity, StopBits};

    fn port(name: &str) -> SerialPortArgs {
        SerialPortArgs {
            port: name.to_string(),
            baud: 9600,
            parity: Parity::None,
            stop_bits: StopBits::One,
            data_bits: 8,
            plain_file: true,
        }
    }

    fn config() -> Config {
        Config {
            hmi_port: port("hmi"),
            weg_port: port("weg"),
            yaskawa_slave_id: 6,
            weg_slave_id: 1,
            respond_to_any_id: false,
            max_freq_yaskawa: 6000,
            weg_max_freq_hz: 60.0,
            single_bus: false,
            heartbeat_interval: Duration::from_millis(500),
            serial_read_timeout: Duration::from_millis(50),
            weg_response_timeout: Duration::from_millis(150),
            direct_read_timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_slave_id() {
        let mut c = config();
        c.weg_slave_id = 0;
        assert_eq!(
            c.validate(),
            Err(ConfigError::InvalidSlaveId("weg", 0))
        );
    }

    #[test]
    fn rejects_zero_frequency_scale() {
        let mut c = config();
        c.max_freq_yaskawa = 0;
        assert_eq!(c.validate(), Err(ConfigError::ZeroFrequencyScale));
    }

    #[test]
    fn rejects_zero_heartbeat_interval() {
        let mut c = config();
        c.heartbeat_interval = Duration::ZERO;
        assert_eq!(c.validate(), Err(ConfigError::NonPositiveHeartbeatInterval));
    }
}
