//! Modbus RTU protocol engine for the Yaskawa A1000 impersonation gateway.
//!
//! This crate is transport-free: it has no notion of a serial port or a
//! thread. It knows how to compute a Modbus CRC, encode and decode the four
//! supported PDU shapes, hold a register image with the write policies the
//! impersonated drive needs, translate A1000 register writes into CFW-11
//! parameter writes, and queue the results. The binary crate drives all of
//! this from a real (or simulated) RS-485 bus.

pub mod crc;
pub mod decode;
pub mod error;
pub mod frame;
pub mod queue;
pub mod register;
pub mod slave;
pub mod translator;

pub use error::FrameError;
pub use frame::{Exception, Request, RequestFrame, Response};
pub use queue::{CommandQueue, QueuedCommand};
pub use register::RegisterImage;
pub use slave::{Mode, SlaveEngine, SlaveOutcome};
pub use translator::{TranslatorParams, WegCommand};
