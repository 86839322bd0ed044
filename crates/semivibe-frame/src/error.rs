/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame does not have exactly six characters.
    #[error("frame must be exactly 6 characters, got {len}")]
    Length { len: usize },

    /// A frame character is not an ASCII hex digit.
    #[error("non-hex character 0x{byte:02X} at position {position}")]
    NotHex { position: usize, byte: u8 },

    /// A single-digit field was given a value above 0xF.
    #[error("{field} 0x{value:X} does not fit in one hex digit")]
    NibbleOutOfRange { field: &'static str, value: u8 },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;

pub(crate) fn transport_to_frame_error(err: semivibe_transport::TransportError) -> FrameError {
    use semivibe_transport::TransportError;

    match err {
        TransportError::Io(io) | TransportError::Accept(io) => FrameError::Io(io),
        TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
            FrameError::Io(source)
        }
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
