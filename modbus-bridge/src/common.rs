//! Serial port setup shared by every subcommand: port selection, line
//! parameters, and a small `Read + Write` abstraction so the arbitrator
//! doesn't care whether it's talking to a real tty or (in tests) a plain
//! file standing in for one.

use std::time::Duration;

/// Parity as configured on the wire; `serialport`'s own enum doesn't impl
/// `clap::ValueEnum`, so this is a thin mirror of it.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

impl From<Parity> for serialport::Parity {
    fn from(p: Parity) -> Self {
        match p {
            Parity::None => serialport::Parity::None,
            Parity::Even => serialport::Parity::Even,
            Parity::Odd => serialport::Parity::Odd,
        }
    }
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopBits {
    #[default]
    One,
    Two,
}

impl From<StopBits> for serialport::StopBits {
    fn from(s: StopBits) -> Self {
        match s {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Line parameters and a port path, used independently for both the
/// HMI-facing and CFW-11-facing ports since the two devices need not agree
/// on baud or parity.
#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct SerialPortArgs {
    pub port: String,
    #[arg(long, default_value_t = 9600)]
    pub baud: u32,
    #[arg(long, value_enum, default_value_t = Parity::None)]
    pub parity: Parity,
    #[arg(long, value_enum, default_value_t = StopBits::One)]
    pub stop_bits: StopBits,
    #[arg(long, default_value_t = 8)]
    pub data_bits: u8,
    /// Treat `port` as a plain file or named pipe instead of a tty, for
    /// bench testing against a recorded byte stream.
    #[arg(long)]
    pub plain_file: bool,
}

#[derive(Debug)]
pub enum SerialPort {
    Serial(Box<dyn serialport::SerialPort>),
    File(std::fs::File),
}

fn data_bits(n: u8) -> anyhow::Result<serialport::DataBits> {
    match n {
        5 => Ok(serialport::DataBits::Five),
        6 => Ok(serialport::DataBits::Six),
        7 => Ok(serialport::DataBits::Seven),
        8 => Ok(serialport::DataBits::Eight),
        other => anyhow::bail!("unsupported data bits: {other}"),
    }
}

impl SerialPortArgs {
    pub fn open(&self, read_timeout: Duration) -> anyhow::Result<SerialPort> {
        if self.plain_file {
            let file = std::fs::File::options()
                .read(true)
                .write(true)
                .open(&self.port)?;
            return Ok(SerialPort::File(file));
        }

        let port = serialport::new(&self.port, self.baud)
            .parity(self.parity.into())
            .stop_bits(self.stop_bits.into())
            .data_bits(data_bits(self.data_bits)?)
            .timeout(read_timeout)
            .open()?;
        Ok(SerialPort::Serial(port))
    }
}

/// First available serial port, preferring a real tty over the loopback
/// ports virtual-machine hosts tend to expose.
pub fn default_serial_port() -> String {
    if let Ok(infos) = serialport::available_ports() {
        for info in infos {
            #[cfg(target_os = "macos")]
            if info.port_name.ends_with(".Bluetooth-Incoming-Port") {
                continue;
            }
            return info.port_name.clone();
        }
    }
    "/dev/ttyUSB0".to_owned()
}

impl std::io::Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Serial(port) => port.read(buf),
            Self::File(port) => port.read(buf),
        }
    }
}

impl std::io::Write for SerialPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Serial(port) => port.write(buf),
            Self::File(port) => port.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Serial(port) => port.flush(),
            Self::File(port) => port.flush(),
        }
    }
}

pub fn e_hexdump(prefix: &str, bytes: &[u8]) {
    for s in crate::hexdump::hexdump_iter(bytes) {
        if !prefix.is_empty() {
            log::trace!("{} {}", prefix, s);
        } else {
            log::trace!("{}", s);
        }
    }
}
