//! The session context: owns the transport, the replay counter, the derived
//! session keys, and the per-context guard timer and statistics.

use crate::config::SscpConfig;
use crate::crypto::SessionKeys;
use crate::error::{Result, SscpError};
use crate::guard::GuardTimer;
use crate::stats::{Statistics, StatsTracker};
use crate::transport::{crc16, RealSerialPort, SerialPort, SOF};
use tracing::{debug, trace};

/// A session with one reader, reachable over one serial link.
///
/// Mirrors `SSCP_CTX_ST`: address, replay counter, session keys (absent
/// until [`SscpContext::authenticate`] succeeds), guard timer and
/// statistics. `Alloc`/`Free` from the reference collapse into
/// construction and [`Drop`].
pub struct SscpContext {
    pub(crate) transport: Option<Box<dyn SerialPort>>,
    pub(crate) address: u8,
    pub(crate) counter: u32,
    pub(crate) session_keys: Option<SessionKeys>,
    pub(crate) guard: GuardTimer,
    pub(crate) stats: StatsTracker,
    pub(crate) config: SscpConfig,
}

impl SscpContext {
    /// Allocate an unopened, unauthenticated context.
    pub fn new(config: SscpConfig) -> Self {
        Self {
            transport: None,
            address: 0,
            counter: 0,
            session_keys: None,
            guard: GuardTimer::new(config.scan_global_guard_time_ms),
            stats: StatsTracker::new(),
            config,
        }
    }

    /// Open a real serial port and attach it to this context.
    pub fn open(&mut self, port_name: &str, baudrate: u32) -> Result<()> {
        let port = RealSerialPort::open(port_name, baudrate)?;
        self.attach(Box::new(port));
        Ok(())
    }

    /// Attach an arbitrary [`SerialPort`] implementation (production or a
    /// test double) to this context.
    pub fn attach(&mut self, transport: Box<dyn SerialPort>) {
        self.transport = Some(transport);
        self.stats.on_open();
    }

    /// Tear the session down: drop the session keys (zeroizing them) before
    /// releasing the transport.
    pub fn close(&mut self) -> Result<()> {
        self.session_keys = None;
        self.counter = 0;
        if let Some(mut transport) = self.transport.take() {
            transport.close()?;
        }
        Ok(())
    }

    /// Select the RS-485 target address for subsequent exchanges. Purely
    /// local bookkeeping: no command is sent to the reader.
    pub fn select_address(&mut self, address: u8) -> Result<()> {
        if address > 127 {
            return Err(SscpError::InvalidParameter);
        }
        self.address = address;
        Ok(())
    }

    /// Reconfigure the local serial line's baudrate. Does not tell the
    /// reader to change its own baudrate; see [`crate::SscpContext::set_baudrate`]
    /// for that.
    pub fn select_baudrate(&mut self, baudrate: u32) -> Result<()> {
        let transport = self.transport.as_mut().ok_or(SscpError::CommNotOpen)?;
        transport.configure(baudrate)
    }

    /// `true` once a session has been established: all four session keys
    /// are present and the replay counter has been initialized.
    pub fn authenticated(&self) -> bool {
        self.session_keys.is_some() && self.counter > 0
    }

    pub fn get_statistics(&self) -> Statistics {
        self.stats.snapshot(self.counter)
    }

    /// Run mutual authentication and establish a session. `key` defaults to
    /// [`crate::auth::DEFAULT_AUTH_KEY`] when `None`.
    pub fn authenticate(&mut self, key: Option<&[u8; 16]>) -> Result<()> {
        crate::auth::authenticate(self, key)
    }

    /// C1's `ExchangeRaw`: one raw frame round trip, with no retry and no
    /// session semantics. Used directly by authentication (which predates
    /// the session) and by the secure exchange engine (which layers retry
    /// and crypto on top).
    pub fn exchange_raw(&mut self, protocol: u8, cmd: &[u8]) -> Result<Vec<u8>> {
        let frame = crate::transport::Frame::build(self.address, protocol, cmd)
            .ok_or(SscpError::CommandTooLong)?;
        let transport = self.transport.as_mut().ok_or(SscpError::CommNotOpen)?;

        transport.set_timeouts(
            self.config.response_first_timeout_ms,
            self.config.response_next_timeout_ms,
        )?;

        transport.send(&frame.header)?;
        transport.send(&frame.payload)?;
        transport.send(&frame.crc)?;
        let sent = frame.header.len() + frame.payload.len() + frame.crc.len();
        self.stats.on_bytes_sent(sent);
        trace!(bytes = sent, "sent raw frame");

        let resp_header = transport.recv(5)?;
        if resp_header[0] != SOF {
            return Err(SscpError::WrongResponseCommand);
        }
        let length = ((resp_header[1] as usize) << 8) | resp_header[2] as usize;
        if length > crate::transport::MAX_PAYLOAD {
            return Err(SscpError::ResponseTooLong);
        }

        transport.set_timeouts(self.config.response_next_timeout_ms, self.config.response_next_timeout_ms)?;

        let payload = match transport.recv(length) {
            Ok(p) => p,
            Err(SscpError::CommRecvMute) => return Err(SscpError::CommRecvStopped),
            Err(e) => return Err(e),
        };
        let crc_bytes = match transport.recv(2) {
            Ok(c) => c,
            Err(SscpError::CommRecvMute) => return Err(SscpError::CommRecvStopped),
            Err(e) => return Err(e),
        };
        self.stats.on_bytes_received(5 + payload.len() + 2);

        let resp_tail: [u8; 4] = resp_header[1..5].try_into().unwrap();
        let expect_crc = crc16(&resp_tail, &payload).to_be_bytes();
        if crc_bytes != expect_crc {
            return Err(SscpError::WrongResponseCrc);
        }

        debug!(len = payload.len(), "received raw frame");
        Ok(payload)
    }

    pub(crate) fn record_recovered_timeout(&mut self) {
        self.stats.on_recovered_timeout();
    }

    pub(crate) fn record_session_established(&mut self) {
        self.stats.on_authenticated();
    }
}

impl Drop for SscpContext {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::serial::ScriptedSerialPort;

    fn frame(protocol: u8, address: u8, payload: &[u8]) -> Vec<u8> {
        let len = payload.len() as u16;
        let header = [SOF, (len >> 8) as u8, len as u8, address, protocol];
        let tail: [u8; 4] = header[1..5].try_into().unwrap();
        let crc = crc16(&tail, payload).to_be_bytes();
        let mut out = header.to_vec();
        out.extend_from_slice(payload);
        out.extend_from_slice(&crc);
        out
    }

    #[test]
    fn exchange_raw_roundtrips_a_well_formed_frame() {
        let mut ctx = SscpContext::new(SscpConfig::default());
        let response_frame = frame(0x21, 0, &[0xAA, 0xBB]);
        ctx.attach(Box::new(ScriptedSerialPort::new(vec![
            Ok(response_frame[..5].to_vec()),
            Ok(response_frame[5..7].to_vec()),
            Ok(response_frame[7..9].to_vec()),
        ])));

        let resp = ctx.exchange_raw(0x21, &[0x01]).unwrap();
        assert_eq!(resp, vec![0xAA, 0xBB]);
    }

    #[test]
    fn exchange_raw_rejects_bad_crc() {
        let mut ctx = SscpContext::new(SscpConfig::default());
        let mut response_frame = frame(0x21, 0, &[0xAA, 0xBB]);
        let last = response_frame.len() - 1;
        response_frame[last] ^= 0xFF;
        ctx.attach(Box::new(ScriptedSerialPort::new(vec![
            Ok(response_frame[..5].to_vec()),
            Ok(response_frame[5..7].to_vec()),
            Ok(response_frame[7..9].to_vec()),
        ])));

        assert_eq!(ctx.exchange_raw(0x21, &[0x01]), Err(SscpError::WrongResponseCrc));
    }

    #[test]
    fn exchange_raw_fails_when_not_open() {
        let mut ctx = SscpContext::new(SscpConfig::default());
        assert_eq!(ctx.exchange_raw(0x21, &[0x01]), Err(SscpError::CommNotOpen));
    }

    #[test]
    fn exchange_raw_rejects_oversized_command() {
        let mut ctx = SscpContext::new(SscpConfig::default());
        ctx.attach(Box::new(ScriptedSerialPort::new(vec![])));
        let oversized = vec![0u8; crate::transport::MAX_PAYLOAD + 1];
        assert_eq!(ctx.exchange_raw(0x21, &oversized), Err(SscpError::CommandTooLong));
    }
}
