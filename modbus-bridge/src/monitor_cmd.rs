//! `modbus-bridge monitor`: listen on a bus passively and print annotated
//! frames, without answering anything. Useful for watching the real
//! HMI/A1000 conversation before standing the gateway up in its place.

use std::io::Read;
use std::time::{Duration, Instant};

use crate::arbitrator::{BusBuffer, FrameResult};
use crate::common::{Parity, SerialPortArgs, StopBits};
use crate::monitor;
use crate::ToolRun;

#[derive(clap::Args, Debug)]
pub struct MonitorOpts {
    port: String,
    #[arg(long, default_value_t = 9600)]
    baud: u32,
    #[arg(long)]
    plain_file: bool,
}

impl ToolRun for MonitorOpts {
    fn run(&self) -> anyhow::Result<()> {
        let args = SerialPortArgs {
            port: self.port.clone(),
            baud: self.baud,
            parity: Parity::None,
            stop_bits: StopBits::One,
            data_bits: 8,
            plain_file: self.plain_file,
        };
        let mut port = args.open(Duration::from_millis(50))?;

        let mut buffer = BusBuffer::new();
        let mut read_buf = [0u8; 256];
        loop {
            let now = Instant::now();
            match port.read(&mut read_buf) {
                Ok(0) => {}
                Ok(n) => buffer.feed(&read_buf[..n], now),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }
            buffer.expire_if_stale(now);

            loop {
                match buffer.extract_frame(|id| (1..=247).contains(&id)) {
                    FrameResult::Frame(body) => {
                        let annotated = monitor::annotate_request(&body);
                        crate::common::e_hexdump(&format!("[{:02x}]", annotated.slave_id), &annotated.raw);
                        log::info!("{}", annotated.summary);
                        for decoded in &annotated.decoded {
                            if let Some(interpreted) = &decoded.interpreted {
                                log::info!("  {} = {}", decoded.name, interpreted);
                            }
                        }
                    }
                    FrameResult::CrcFailure => log::error!("CRC check failed on inbound frame, discarding"),
                    FrameResult::Incomplete => break,
                }
            }
        }
    }
}
