//! `modbus-bridge run`: start the gateway and keep it running, printing
//! events to the log as they happen.

use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};

use crate::common::SerialPortArgs;
use crate::config::Config;
use crate::events::Severity;
use crate::gateway::Gateway;
use crate::ToolRun;

#[derive(clap::Args, Debug)]
pub struct RunOpts {
    /// Serial port facing the Sullair HMI.
    #[arg(long)]
    hmi_port: String,
    #[arg(long, default_value_t = 9600)]
    hmi_baud: u32,

    /// Serial port facing the WEG CFW-11.
    #[arg(long)]
    weg_port: String,
    #[arg(long, default_value_t = 9600)]
    weg_baud: u32,

    /// Slave id this gateway answers as, toward the HMI.
    #[arg(long, default_value_t = 0x06)]
    yaskawa_slave_id: u8,
    /// Slave id of the CFW-11 on the WEG-facing bus.
    #[arg(long, default_value_t = 0x01)]
    weg_slave_id: u8,
    /// Answer HMI requests for any slave id, not just `yaskawa_slave_id`.
    #[arg(long)]
    respond_to_any_id: bool,

    /// Force a single shared serial handle even if the two port paths
    /// differ. Auto-detected (true) when `hmi_port == weg_port`.
    #[arg(long)]
    single_bus: bool,

    #[arg(long, default_value_t = 6000)]
    max_freq_yaskawa: u16,
    #[arg(long, default_value_t = 60.0)]
    weg_max_freq_hz: f64,
    #[arg(long, default_value_t = 500)]
    heartbeat_interval_ms: u64,

    #[arg(long, default_value_t = 50)]
    serial_read_timeout_ms: u64,
    #[arg(long, default_value_t = 150)]
    weg_response_timeout_ms: u64,
    #[arg(long, default_value_t = 200)]
    direct_read_timeout_ms: u64,
}

impl RunOpts {
    fn config(&self) -> Config {
        Config {
            hmi_port: SerialPortArgs {
                port: self.hmi_port.clone(),
                baud: self.hmi_baud,
                parity: crate::common::Parity::None,
                stop_bits: crate::common::StopBits::One,
                data_bits: 8,
                plain_file: false,
            },
            weg_port: SerialPortArgs {
                port: self.weg_port.clone(),
                baud: self.weg_baud,
                parity: crate::common::Parity::None,
                stop_bits: crate::common::StopBits::One,
                data_bits: 8,
                plain_file: false,
            },
            yaskawa_slave_id: self.yaskawa_slave_id,
            weg_slave_id: self.weg_slave_id,
            respond_to_any_id: self.respond_to_any_id,
            max_freq_yaskawa: self.max_freq_yaskawa,
            weg_max_freq_hz: self.weg_max_freq_hz,
            single_bus: self.single_bus || self.hmi_port == self.weg_port,
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            serial_read_timeout: Duration::from_millis(self.serial_read_timeout_ms),
            weg_response_timeout: Duration::from_millis(self.weg_response_timeout_ms),
            direct_read_timeout: Duration::from_millis(self.direct_read_timeout_ms),
        }
    }
}

impl ToolRun for RunOpts {
    fn run(&self) -> anyhow::Result<()> {
        let config = self.config();
        config.validate()?;

        let gateway = Arc::new(Gateway::new(config));
        gateway.start()?;
        info!("gateway started");

        let mut last_seen = 0u64;
        loop {
            std::thread::sleep(Duration::from_secs(1));
            for event in gateway.events_since(last_seen) {
                last_seen = event.sequence;
                match event.severity {
                    Severity::Error => error!("{}", event.message),
                    Severity::Warn => warn!("{}", event.message),
                    Severity::Info => info!("{}", event.message),
                    Severity::Debug => log::debug!("{}", event.message),
                }
            }
        }
    }
}
