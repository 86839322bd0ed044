use std::time::Duration;

use semivibe_frame::{ErrorCode, FrameError};
use semivibe_transport::TransportError;

/// Errors that stop the device server.
///
/// Per-frame problems never surface here: they are answered on the wire with
/// one of the three error frames.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A thread panicked while holding the device state lock.
    #[error("device state lock poisoned")]
    StatePoisoned,

    /// The server worker thread panicked.
    #[error("server thread panicked")]
    ThreadPanicked,
}

pub type ServerResult<T> = std::result::Result<T, ServerError>;

/// Errors while exchanging the `ACK` greeting.
#[derive(Debug, thiserror::Error)]
pub enum GreetingError {
    /// The server sent something other than `ACK`.
    #[error("unexpected greeting {0:?}")]
    Unexpected(String),

    /// No greeting arrived in time.
    #[error("greeting timed out after {0:?}")]
    Timeout(Duration),

    /// Peer closed the connection before the greeting completed.
    #[error("peer disconnected during greeting")]
    Disconnected,

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

/// Errors returned by [`Driver`](crate::Driver) operations.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// `connect` was called before `init`.
    #[error("driver not initialized")]
    NotInitialized,

    /// `init` was called twice.
    #[error("driver already initialized")]
    AlreadyInitialized,

    /// An operation needs a connection and there is none.
    #[error("driver not connected")]
    NotConnected,

    /// `connect` was called while connected.
    #[error("driver already connected")]
    AlreadyConnected,

    /// The TCP connection or the greeting failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// I/O failure, timeout or a short or garbled response.
    #[error("communication failed: {0}")]
    CommunicationFailed(String),

    /// The response did not echo the expected address.
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// The device answered with an error frame.
    #[error("device returned {0} error")]
    Device(ErrorCode),

    /// An argument was rejected before anything was sent.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),

    /// The host name resolved to no address.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// A raw command was not a well-formed frame.
    #[error("malformed command: {0}")]
    Frame(#[from] FrameError),
}

/// Flat classification of [`DriverError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverErrorKind {
    NotInitialized,
    AlreadyInitialized,
    NotConnected,
    AlreadyConnected,
    ConnectionFailed,
    CommunicationFailed,
    ProtocolError,
    Forbidden,
    Invalid,
    General,
    InvalidParameter,
    Internal,
    ResourceUnavailable,
    MalformedCommand,
}

impl DriverError {
    /// Flat error kind for callers that need a code.
    pub fn kind(&self) -> DriverErrorKind {
        match self {
            Self::NotInitialized => DriverErrorKind::NotInitialized,
            Self::AlreadyInitialized => DriverErrorKind::AlreadyInitialized,
            Self::NotConnected => DriverErrorKind::NotConnected,
            Self::AlreadyConnected => DriverErrorKind::AlreadyConnected,
            Self::ConnectionFailed(_) => DriverErrorKind::ConnectionFailed,
            Self::CommunicationFailed(_) => DriverErrorKind::CommunicationFailed,
            Self::ProtocolError(_) => DriverErrorKind::ProtocolError,
            Self::Device(ErrorCode::Forbidden) => DriverErrorKind::Forbidden,
            Self::Device(ErrorCode::Invalid) => DriverErrorKind::Invalid,
            Self::Device(ErrorCode::General) => DriverErrorKind::General,
            Self::InvalidParameter(_) => DriverErrorKind::InvalidParameter,
            Self::Internal(_) => DriverErrorKind::Internal,
            Self::ResourceUnavailable(_) => DriverErrorKind::ResourceUnavailable,
            Self::Frame(_) => DriverErrorKind::MalformedCommand,
        }
    }

    pub(crate) fn communication(err: FrameError) -> Self {
        Self::CommunicationFailed(err.to_string())
    }
}

impl From<GreetingError> for DriverError {
    fn from(err: GreetingError) -> Self {
        Self::ConnectionFailed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DriverError>;
