pub mod arbitrator;
pub mod common;
pub mod config;
pub mod events;
pub mod gateway;
pub mod heartbeat;
pub mod hexdump;
pub mod monitor;

mod monitor_cmd;
mod run;

trait ToolRun {
    fn run(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(clap::Parser, Debug)]
#[command(version, about, long_about = None)]
struct ToolOptions {
    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(clap::Subcommand, Debug)]
enum ToolCommand {
    Run(run::RunOpts),
    ListPorts(ListPortsOpts),
    Monitor(monitor_cmd::MonitorOpts),
}

impl ToolRun for ToolCommand {
    fn run(&self) -> anyhow::Result<()> {
        use ToolCommand::*;
        match self {
            Run(o) => o.run(),
            ListPorts(o) => o.run(),
            Monitor(o) => o.run(),
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct ListPortsOpts;

impl ToolRun for ListPortsOpts {
    fn run(&self) -> anyhow::Result<()> {
        for port in serialport::available_ports()? {
            if port.port_name == common::default_serial_port() {
                println!("* {}", port.port_name);
            } else {
                println!("  {}", port.port_name);
            }
            if let serialport::SerialPortType::UsbPort(usb) = port.port_type {
                println!("    - USB {:x}:{:x}", usb.vid, usb.pid);
                if let Some(serial_number) = usb.serial_number {
                    println!("    - S/N: {}", serial_number);
                }
                if let Some(manufacturer) = usb.manufacturer {
                    println!("    - {}", manufacturer);
                }
                if let Some(product) = usb.product {
                    println!("    - {}", product);
                }
            }
        }
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    use clap::Parser;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = ToolOptions::parse();
    opts.command.run()
}
