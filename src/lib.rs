//! Host-side implementation of SSCP (Secure Serial Communication Protocol):
//! the framed, authenticated, encrypted serial link used by a control panel
//! to drive an NFC/RFID reader.
//!
//! The core pipeline is [`SscpContext::open`] → [`auth::authenticate`] →
//! any [`commands`] method → [`SscpContext::close`]. Everything below the
//! command catalog (framing, session keys, the secure exchange envelope) is
//! driven automatically; callers only see typed operations and
//! [`error::SscpError`].

pub mod auth;
pub mod commands;
pub mod config;
pub mod context;
pub mod crypto;
pub mod error;
pub mod exchange;
pub mod guard;
pub mod selftest;
pub mod stats;
pub mod transport;

pub use auth::{authenticate, DEFAULT_AUTH_KEY};
pub use commands::{ReaderInfos, ScanResult};
pub use config::SscpConfig;
pub use context::SscpContext;
pub use error::{Result, SscpError};
pub use stats::Statistics;

/// Maximum frame payload, in either direction.
pub const MAX_PAYLOAD: usize = transport::MAX_PAYLOAD;
/// Protocol byte for the two authentication legs.
pub const PROTOCOL_AUTHENTICATE: u8 = auth::PROTOCOL_AUTHENTICATE;
/// Protocol byte for secure (post-authentication) messages.
pub const PROTOCOL_SECURE: u8 = exchange::PROTOCOL_SECURE;
