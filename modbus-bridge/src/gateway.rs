//! The gateway as a single value: one struct owns both ports, the
//! impersonated register image, the pending-write queue, and the event
//! rings, with an arbitrator thread driving all of it. No process-wide
//! statics — every control-surface method takes `&self`.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use modbus_proto::decode::DecodedValue;
use modbus_proto::frame::{self, Exception};
use modbus_proto::queue::{CommandQueue, EnqueueOutcome};
use modbus_proto::register::{RegisterImage, RtcStamp};
use modbus_proto::slave::{Mode, SlaveEngine};

use crate::arbitrator::{BusBuffer, FrameResult};
use crate::common::{SerialPort, SerialPortArgs};
use crate::config::Config;
use crate::events::{DecodedRing, Event, EventKind, EventLog, Severity, DECODED_RING_CAPACITY, EVENT_RING_CAPACITY};
use crate::heartbeat::{HeartbeatAction, HeartbeatScheduler};

/// Mutable state shared between the arbitrator thread and the control
/// surface, behind one coarse lock — accesses are short (buffer scans,
/// register reads/writes), so a single mutex is simpler than finer-grained
/// locking and never becomes a bottleneck.
struct Shared {
    engine: SlaveEngine,
    queue: CommandQueue,
    heartbeat: HeartbeatScheduler,
}

/// Minimum quiet time on the HMI bus before queued writes or a heartbeat
/// may be sent, so they never collide with HMI polling.
const BUS_IDLE_THRESHOLD: Duration = Duration::from_millis(50);

/// After a mid-operation I/O error on the HMI port, the arbitrator tries to
/// reopen it with the same config. If that reopen itself fails this many
/// times within `HMI_REOPEN_WINDOW`, the gateway gives up and stops.
const HMI_REOPEN_MAX_FAILURES: u32 = 3;
const HMI_REOPEN_WINDOW: Duration = Duration::from_secs(10);

/// Fields of [`Config`] the control surface may change while the gateway
/// runs. Anything not listed here (port paths, line parameters) only takes
/// effect after `stop()` + `start()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigUpdate {
    pub max_freq_yaskawa: Option<u16>,
    pub weg_max_freq_hz: Option<f64>,
    pub respond_to_any_id: Option<bool>,
}

/// One outstanding operator-triggered read, handed to the arbitrator
/// thread for servicing on its next pass over the WEG bus.
struct DirectRequest {
    register: u16,
    function_code: u8,
    reply: std::sync::mpsc::Sender<anyhow::Result<u16>>,
}

pub struct Gateway {
    config: Config,
    shared: Mutex<Shared>,
    events: Mutex<EventLog>,
    decoded: Mutex<DecodedRing>,
    direct_request: Mutex<Option<DirectRequest>>,
    reconnect_requested: AtomicBool,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

fn now_stamp() -> RtcStamp {
    // No wall-clock source is threaded through; a fixed stamp is stable for
    // the registers the HMI reads once and never expects to tick live.
    RtcStamp {
        year: 2026,
        month: 1,
        day: 1,
        hour: 0,
        minute: 0,
        second: 0,
    }
}

impl Gateway {
    pub fn new(config: Config) -> Self {
        let engine = SlaveEngine {
            respond_to_any_id: config.respond_to_any_id,
            ..SlaveEngine::new(
                RegisterImage::healthy_snapshot(now_stamp()),
                config.translator_params(),
                config.yaskawa_slave_id,
            )
        };
        Self {
            shared: Mutex::new(Shared {
                engine,
                queue: CommandQueue::new(),
                heartbeat: HeartbeatScheduler::new(config.weg_slave_id, config.heartbeat_interval),
            }),
            events: Mutex::new(EventLog::new(EVENT_RING_CAPACITY)),
            decoded: Mutex::new(DecodedRing::new(DECODED_RING_CAPACITY)),
            direct_request: Mutex::new(None),
            reconnect_requested: AtomicBool::new(false),
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
            config,
        }
    }

    fn log_event(&self, severity: Severity, kind: EventKind, message: impl Into<String>) {
        self.events.lock().unwrap().push(severity, kind, message);
    }

    pub fn events_snapshot(&self) -> Vec<Event> {
        self.events.lock().unwrap().snapshot()
    }

    pub fn events_since(&self, sequence: u64) -> Vec<Event> {
        self.events.lock().unwrap().since(sequence)
    }

    pub fn decoded_snapshot(&self) -> Vec<DecodedValue> {
        self.decoded.lock().unwrap().snapshot()
    }

    pub fn set_mode(&self, mode: Mode) {
        self.shared.lock().unwrap().engine.mode = mode;
        self.log_event(Severity::Info, EventKind::ModeChange, format!("mode set to {mode:?}"));
    }

    /// Merge the subset of configuration that can change without reopening
    /// a port. Serial-line parameters aren't here: per the control
    /// surface's contract, those only take effect after `stop()` + a fresh
    /// `start()`.
    pub fn update_config(&self, update: ConfigUpdate) {
        let mut shared = self.shared.lock().unwrap();
        if let Some(v) = update.max_freq_yaskawa {
            shared.engine.translator.max_freq_yaskawa = v;
        }
        if let Some(v) = update.weg_max_freq_hz {
            shared.engine.translator.weg_max_freq_hz = v;
        }
        if let Some(v) = update.respond_to_any_id {
            shared.engine.respond_to_any_id = v;
        }
    }

    /// Queue a write directly onto the CFW-11 bus, bypassing the A1000
    /// translator entirely — `register`/`value` are CFW-11 parameter
    /// address and value as-is. Used by test tooling that wants to drive
    /// the WEG side without going through a simulated HMI request.
    pub fn submit_direct_write(&self, register: u16, value: u16) {
        let overflowed = {
            let mut shared = self.shared.lock().unwrap();
            shared.queue.enqueue(register, value, "DIRECT") == EnqueueOutcome::OverflowDroppedOldest
        };
        if overflowed {
            self.log_event(Severity::Warn, EventKind::Translate, "command queue overflowed, oldest entry dropped");
        }
    }

    /// Synchronously read a CFW-11 register through the arbitrator's own
    /// bus handle. Handed off to the arbitrator thread via a one-shot
    /// channel rather than opening a second handle onto the same wire;
    /// rejected with an error if a prior direct read is still outstanding
    /// or the arbitrator doesn't service it within `direct_read_timeout`.
    pub fn submit_direct_read(&self, register: u16, function_code: u8) -> anyhow::Result<u16> {
        let (tx, rx) = std::sync::mpsc::channel();
        {
            let mut slot = self.direct_request.lock().unwrap();
            if slot.is_some() {
                anyhow::bail!("BUSY");
            }
            *slot = Some(DirectRequest { register, function_code, reply: tx });
        }

        match rx.recv_timeout(self.config.direct_read_timeout) {
            Ok(result) => result,
            Err(_) => {
                *self.direct_request.lock().unwrap() = None;
                anyhow::bail!("BUSY")
            }
        }
    }

    /// Reopen the WEG-facing port after a failure, per the control
    /// surface's reconnect operation. No-op success when the arbitrator
    /// isn't running, since there's no live handle to replace yet.
    pub fn reconnect_weg(&self) -> anyhow::Result<()> {
        self.reconnect_requested.store(true, Ordering::SeqCst);
        self.log_event(Severity::Info, EventKind::Reconnect, "WEG port reconnect requested");
        Ok(())
    }

    pub fn start(self: &Arc<Self>) -> anyhow::Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let gateway = Arc::clone(self);
        let handle = std::thread::spawn(move || gateway.run_arbitrator());
        *self.worker.lock().unwrap() = Some(handle);
        Ok(())
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    fn run_arbitrator(self: Arc<Self>) {
        let mut hmi_port = match self.config.hmi_port.open(self.config.serial_read_timeout) {
            Ok(p) => p,
            Err(e) => {
                self.log_event(Severity::Error, EventKind::Reconnect, format!("failed to open HMI port: {e}"));
                self.running.store(false, Ordering::SeqCst);
                return;
            }
        };
        // In single-bus mode the HMI and CFW-11 share one handle; there is
        // no second port to open, and `reconnect_weg` becomes a no-op since
        // the arbitrator never holds a second handle to replace.
        let mut weg_port: Option<SerialPort> = if self.config.single_bus {
            None
        } else {
            match self.config.weg_port.open(self.config.weg_response_timeout) {
                Ok(p) => Some(p),
                Err(e) => {
                    self.log_event(Severity::Error, EventKind::Reconnect, format!("failed to open WEG port: {e}"));
                    self.running.store(false, Ordering::SeqCst);
                    return;
                }
            }
        };

        let mut buffer = BusBuffer::new();
        let mut read_buf = [0u8; 256];
        let mut hmi_reopen_failures: u32 = 0;
        let mut hmi_reopen_window_start: Option<Instant> = None;

        while self.running.load(Ordering::SeqCst) {
            let now = Instant::now();

            match hmi_port.read(&mut read_buf) {
                Ok(0) => {}
                Ok(n) => {
                    buffer.feed(&read_buf[..n], now);
                    hmi_reopen_failures = 0;
                    hmi_reopen_window_start = None;
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => {
                    self.log_event(Severity::Error, EventKind::Reconnect, format!("HMI read failed: {e}"));

                    if hmi_reopen_window_start.map_or(true, |start| now.duration_since(start) > HMI_REOPEN_WINDOW) {
                        hmi_reopen_window_start = Some(now);
                        hmi_reopen_failures = 0;
                    }

                    match self.config.hmi_port.open(self.config.serial_read_timeout) {
                        Ok(fresh) => {
                            hmi_port = fresh;
                            hmi_reopen_failures = 0;
                            hmi_reopen_window_start = None;
                            self.log_event(Severity::Info, EventKind::Reconnect, "HMI port reopened after I/O error");
                        }
                        Err(reopen_err) => {
                            hmi_reopen_failures += 1;
                            self.log_event(
                                Severity::Warn,
                                EventKind::Reconnect,
                                format!("HMI reopen attempt {hmi_reopen_failures} failed: {reopen_err}"),
                            );
                            if hmi_reopen_failures >= HMI_REOPEN_MAX_FAILURES {
                                self.log_event(
                                    Severity::Error,
                                    EventKind::Reconnect,
                                    format!("HMI port reopen failed {HMI_REOPEN_MAX_FAILURES} times within {HMI_REOPEN_WINDOW:?}, stopping"),
                                );
                                self.running.store(false, Ordering::SeqCst);
                                break;
                            }
                        }
                    }
                    continue;
                }
            }
            buffer.expire_if_stale(now);

            let respond_to_any = self.shared.lock().unwrap().engine.respond_to_any_id;
            let yaskawa_id = self.config.yaskawa_slave_id;
            match buffer.extract_frame(move |id| respond_to_any && (1..=247).contains(&id) || id == yaskawa_id) {
                FrameResult::Frame(body) => self.handle_hmi_frame(&body, &mut hmi_port),
                FrameResult::CrcFailure => {
                    self.log_event(Severity::Error, EventKind::CrcError, "CRC check failed on inbound frame, discarding");
                }
                FrameResult::Incomplete => {}
            }

            if self.reconnect_requested.swap(false, Ordering::SeqCst) {
                if self.config.single_bus {
                    self.log_event(Severity::Info, EventKind::Reconnect, "reconnect requested in single-bus mode, nothing to reopen");
                } else {
                    match self.config.weg_port.open(self.config.weg_response_timeout) {
                        Ok(fresh) => {
                            weg_port = Some(fresh);
                            self.log_event(Severity::Info, EventKind::Reconnect, "WEG port reopened");
                        }
                        Err(e) => {
                            self.log_event(Severity::Error, EventKind::Reconnect, format!("WEG reconnect failed: {e}"));
                        }
                    }
                }
            }

            // Queued writes and the heartbeat must never collide with HMI
            // polling; only drain them once the bus has gone quiet.
            if buffer.is_idle(now, BUS_IDLE_THRESHOLD) {
                let weg: &mut SerialPort = match &mut weg_port {
                    Some(p) => p,
                    None => &mut hmi_port,
                };
                self.service_weg_bus(weg, now);
            }
        }
    }

    /// Service one outstanding direct-read request, if any, ahead of the
    /// queue and heartbeat — this is the "bus lock" the control surface's
    /// `submit_direct_read` contract refers to: only the arbitrator thread
    /// ever touches `weg_port`, so taking this slot first is exclusive
    /// access by construction.
    fn service_direct_request(&self, weg_port: &mut SerialPort) -> bool {
        let request = self.direct_request.lock().unwrap().take();
        let Some(request) = request else { return false };

        let req = frame::encode_request(
            self.config.weg_slave_id,
            if request.function_code == frame::FC_READ_INPUT {
                &frame::Request::ReadInput { addr: request.register, count: 1 }
            } else {
                &frame::Request::ReadHolding { addr: request.register, count: 1 }
            },
        );
        let result = self.read_single_register(weg_port, &req, request.register);
        let _ = request.reply.send(result);
        true
    }

    fn read_single_register(&self, weg_port: &mut SerialPort, request: &[u8], register: u16) -> anyhow::Result<u16> {
        if weg_port.write_all(request).is_err() {
            anyhow::bail!("write to WEG port failed");
        }
        let _ = weg_port.flush();

        let deadline = Instant::now() + self.config.direct_read_timeout;
        let mut response = Vec::new();
        let mut byte = [0u8; 1];
        while Instant::now() < deadline {
            match weg_port.read(&mut byte) {
                Ok(0) => continue,
                Ok(_) => {
                    response.push(byte[0]);
                    if let Some(len) = frame::response_frame_len(&response) {
                        if response.len() >= len {
                            break;
                        }
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if !modbus_proto::crc::verify(&response) {
            anyhow::bail!("direct read of register {register} timed out or failed CRC");
        }
        let byte_count = response.get(2).copied().unwrap_or(0) as usize;
        if byte_count < 2 {
            anyhow::bail!("short response reading register {register}");
        }
        Ok(u16::from_be_bytes([response[3], response[4]]))
    }

    fn handle_hmi_frame(&self, body: &[u8], hmi_port: &mut SerialPort) {
        let mut shared = self.shared.lock().unwrap();
        let outcome = match shared.engine.handle_frame(body) {
            Some(o) => o,
            None => {
                // decodable but addressed to nobody we recognize; let it pass.
                return;
            }
        };
        drop(shared);

        if let Some(response) = &outcome.response {
            crate::common::e_hexdump("hmi<-", response);
            if let Err(e) = hmi_port.write_all(response) {
                self.log_event(Severity::Error, EventKind::Request, format!("failed writing HMI response: {e}"));
                return;
            }
            let _ = hmi_port.flush();
        } else {
            // the only undecodable, addressed-to-us case is an unknown
            // function code; answer with an illegal-function exception.
            if let Ok(req) = frame::decode_request(body) {
                let exc = SlaveEngine::exception_for(req.slave_id, req.request.function_code(), Exception::IllegalFunction);
                let _ = hmi_port.write_all(&exc);
            }
        }

        self.log_event(Severity::Debug, EventKind::Request, format!("answered {} byte request", body.len()));

        for cmd in outcome.enqueue {
            let overflowed = {
                let mut shared = self.shared.lock().unwrap();
                shared.queue.enqueue(cmd.register, cmd.value, cmd.label.clone()) == EnqueueOutcome::OverflowDroppedOldest
            };
            if overflowed {
                self.log_event(Severity::Warn, EventKind::Translate, "command queue overflowed, oldest entry dropped");
            }
            self.log_event(Severity::Info, EventKind::Translate, format!("queued WEG write {}", cmd.label));
        }

        if !outcome.decoded.is_empty() {
            self.decoded.lock().unwrap().push_all(outcome.decoded);
        }
    }

    fn service_weg_bus(&self, weg_port: &mut SerialPort, now: Instant) {
        if self.service_direct_request(weg_port) {
            return;
        }

        let pending = self.shared.lock().unwrap().queue.dequeue();
        if let Some(cmd) = pending {
            let request = frame::encode_request(
                self.config.weg_slave_id,
                &frame::Request::WriteSingle { addr: cmd.register, value: cmd.value },
            );
            let ok = self.send_and_await(weg_port, &request);
            if ok {
                debug!("WEG write {} ({}) applied", cmd.register, cmd.label);
            } else {
                warn!("WEG write {} ({}) failed", cmd.register, cmd.label);
                self.log_event(Severity::Warn, EventKind::Translate, format!("WEG write to {} failed", cmd.register));
            }
            return;
        }

        let action = self.shared.lock().unwrap().heartbeat.poll(now);
        if let HeartbeatAction::Send(frame) = action {
            let ok = self.send_and_await(weg_port, &frame);
            let outcome = self.shared.lock().unwrap().heartbeat.record_result(ok);
            if !ok {
                let severity = if outcome.severity_is_warn { Severity::Warn } else { Severity::Debug };
                self.log_event(severity, EventKind::Heartbeat, "heartbeat read failed");
            } else if outcome.log_status_summary {
                let total = self.shared.lock().unwrap().heartbeat.ok();
                info!("heartbeat ok, {total} sent");
                self.log_event(Severity::Info, EventKind::Heartbeat, format!("{total} heartbeats sent"));
            }
        }
    }

    fn send_and_await(&self, weg_port: &mut SerialPort, request: &[u8]) -> bool {
        if weg_port.write_all(request).is_err() {
            return false;
        }
        let _ = weg_port.flush();

        let deadline = Instant::now() + self.config.weg_response_timeout;
        let mut response = Vec::new();
        let mut byte = [0u8; 1];
        while Instant::now() < deadline {
            match weg_port.read(&mut byte) {
                Ok(0) => continue,
                Ok(_) => {
                    response.push(byte[0]);
                    if let Some(len) = frame::response_frame_len(&response) {
                        if response.len() >= len {
                            return modbus_proto::crc::verify(&response);
                        }
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(_) => return false,
            }
        }
        false
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
    fn direct_write_enqueues_raw_weg_register_unchanged() {
        let gw = Gateway::new(config());
        gw.submit_direct_write(683, 4096);
        let mut shared = gw.shared.lock().unwrap();
        let queued = shared.queue.dequeue().unwrap();
        assert_eq!(queued.register, 683);
        assert_eq!(queued.value, 4096);
    }

    #[test]
    fn update_config_changes_translator_params_live() {
        let gw = Gateway::new(config());
        gw.update_config(ConfigUpdate {
            weg_max_freq_hz: Some(50.0),
            ..Default::default()
        });
        let shared = gw.shared.lock().unwrap();
        assert_eq!(shared.engine.translator.weg_max_freq_hz, 50.0);
    }

    #[test]
    fn second_direct_read_is_rejected_while_first_is_pending() {
        let gw = Gateway::new(config());
        *gw.direct_request.lock().unwrap() = Some(DirectRequest {
            register: 1,
            function_code: frame::FC_READ_HOLDING,
            reply: std::sync::mpsc::channel().0,
        });
        assert!(gw.submit_direct_read(2, frame::FC_READ_HOLDING).is_err());
    }

    #[test]
    fn mode_change_is_recorded_as_an_event() {
        let gw = Gateway::new(config());
        gw.set_mode(Mode::Listen);
        let events = gw.events_snapshot();
        assert!(events.iter().any(|e| e.kind == EventKind::ModeChange));
    }

    #[test]
    fn reconnect_is_a_recorded_noop_in_single_bus_mode() {
        let mut c = config();
        c.single_bus = true;
        let gw = Gateway::new(c);
        assert!(gw.reconnect_weg().is_ok());
        assert!(gw
            .events_snapshot()
            .iter()
            .any(|e| e.kind == EventKind::Reconnect));
    }

    #[test]
    fn service_weg_bus_is_skipped_while_bus_is_not_idle() {
        // BusBuffer::is_idle is what gates this in run_arbitrator; exercise
        // it directly since the arbitrator loop itself needs a live port.
        let mut buffer = BusBuffer::new();
        let t0 = Instant::now();
        buffer.feed(&[0x06], t0);
        assert!(!buffer.is_idle(t0, BUS_IDLE_THRESHOLD));
        assert!(buffer.is_idle(t0 + BUS_IDLE_THRESHOLD, BUS_IDLE_THRESHOLD));
    }
}
