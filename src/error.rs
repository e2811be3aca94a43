//! SSCP error space.
//!
//! Mirrors `sscp-errors.h` from the reference implementation: local faults
//! detected by the host are distinct enum variants, while reader-reported
//! application faults (a single status byte, returned when a response
//! decrypts and authenticates cleanly but the reader itself refused the
//! command) are carried in [`SscpError::ReaderStatus`].

use thiserror::Error;

/// Unified SSCP error space.
///
/// Local faults and reader-reported status bytes live in the same enum but
/// are never confused with each other: callers that need to distinguish them
/// can match on [`SscpError::ReaderStatus`] explicitly.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SscpError {
    #[error("invalid context")]
    InvalidContext,
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("command too long for the communication layer")]
    CommandTooLong,
    #[error("response too long for the communication layer")]
    ResponseTooLong,
    #[error("supplied buffer is too small")]
    OutputBufferOverflow,
    #[error("dynamic allocation failed")]
    OutOfMemory,
    #[error("an internal operation has failed")]
    InternalFailure,

    #[error("failed to open the port")]
    CommNotAvailable,
    #[error("the port is not open")]
    CommNotOpen,
    #[error("failed to configure the port")]
    CommControlFailed,
    #[error("failed to send through the serial port")]
    CommSendFailed,
    #[error("unable to receive")]
    CommRecvFailed,
    #[error("device has stopped transmitting")]
    CommRecvStopped,
    #[error("no response from device")]
    CommRecvMute,

    #[error("wrong response length")]
    WrongResponseLength,
    #[error("wrong CRC in response")]
    WrongResponseCrc,
    #[error("wrong HMAC in response")]
    WrongResponseSignature,
    #[error("response counter does not match command")]
    WrongResponseCounter,
    #[error("type in response footer does not match command")]
    WrongResponseType,
    #[error("command in response header does not match command")]
    WrongResponseCommand,
    #[error("length in response header does not match size of response")]
    WrongResponseFormat,

    #[error("wrong response status byte")]
    UnsupportedResponseStatus,
    #[error("wrong value in response")]
    UnsupportedResponseValue,
    #[error("response length is incorrect")]
    UnsupportedResponseLength,

    #[error("no card")]
    NfcCardAbsent,
    #[error("card timeout")]
    NfcCardMuteOrRemoved,
    #[error("card communication error")]
    NfcCardCommError,

    /// Positive status byte returned verbatim by the reader. Distinct from
    /// the negative local-error space above: the exchange completed,
    /// decrypted, and authenticated, but the reader itself failed the
    /// command.
    #[error("reader returned status {0:#04x}")]
    ReaderStatus(u8),
}

impl SscpError {
    /// True for transport-level silence that the secure exchange engine is
    /// allowed to retry (spec: "only when the frame-level error is
    /// `RECV_MUTE` or `RECV_STOPPED`").
    pub fn is_retryable_timeout(self) -> bool {
        matches!(self, SscpError::CommRecvMute | SscpError::CommRecvStopped)
    }
}

pub type Result<T> = std::result::Result<T, SscpError>;
