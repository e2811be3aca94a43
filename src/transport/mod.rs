//! C1: the framed transport codec.
//!
//! Owns frame assembly/parsing (CRC-16-CCITT) and the small capability trait
//! the codec drives the serial link through.

pub mod frame;
pub mod serial;

pub use frame::{crc16, Frame, MAX_PAYLOAD, SOF};
pub use serial::{RealSerialPort, SerialPort};
