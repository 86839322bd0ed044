use std::fmt;

use crate::error::{FrameError, Result};

/// Every frame is six ASCII hex characters.
pub const FRAME_LEN: usize = 6;

/// Greeting the server sends once per accepted connection.
pub const ACK: &[u8; 3] = b"ACK";

/// Token the driver sends to close its connection.
pub const EXIT: &[u8; 4] = b"exit";

/// Error frame: valid address, wrong direction.
pub const FORBIDDEN: &[u8; FRAME_LEN] = b"1FFFFF";
/// Error frame: address or read/write flag does not resolve.
pub const INVALID: &[u8; FRAME_LEN] = b"2FFFFF";
/// Error frame: operation could not complete at runtime.
pub const GENERAL: &[u8; FRAME_LEN] = b"3FFFFF";

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Wire-level error kinds carried by the three fixed error frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Forbidden,
    Invalid,
    General,
}

impl ErrorCode {
    /// The literal frame for this error.
    pub fn frame(self) -> &'static [u8; FRAME_LEN] {
        match self {
            Self::Forbidden => FORBIDDEN,
            Self::Invalid => INVALID,
            Self::General => GENERAL,
        }
    }

    /// Match a raw frame against the fixed error frames.
    pub fn from_frame(src: &[u8]) -> Option<Self> {
        [Self::Forbidden, Self::Invalid, Self::General]
            .into_iter()
            .find(|code| src.eq_ignore_ascii_case(code.frame()))
    }

    /// Short lowercase name for logs and CLI output.
    pub fn name(self) -> &'static str {
        match self {
            Self::Forbidden => "forbidden",
            Self::Invalid => "invalid",
            Self::General => "general",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read/write digit of a read command and of every successful response.
pub const RW_READ: u8 = 0;
/// Read/write digit of a write command.
pub const RW_WRITE: u8 = 1;

/// A decoded 6-hex frame.
///
/// Commands and successful responses share this layout. The region and
/// read/write fields are single hex digits and are kept raw: whether they
/// name a real register is the register map's decision, not the codec's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame {
    /// Region digit (`0x0..=0xF`).
    pub region: u8,
    /// Register offset within the region.
    pub offset: u8,
    /// Read/write digit (`0x0..=0xF`).
    pub rw: u8,
    /// Data byte.
    pub data: u8,
}

impl Frame {
    /// Build a read command. The data byte is zero.
    pub fn read(region: u8, offset: u8) -> Self {
        Self {
            region,
            offset,
            rw: RW_READ,
            data: 0,
        }
    }

    /// Build a write command.
    pub fn write(region: u8, offset: u8, data: u8) -> Self {
        Self {
            region,
            offset,
            rw: RW_WRITE,
            data,
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:X}{:02X}{:X}{:02X}",
            self.region & 0x0F,
            self.offset,
            self.rw & 0x0F,
            self.data
        )
    }
}

/// A decoded response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Successful read result or write echo.
    Value(Frame),
    /// One of the three fixed error frames.
    Error(ErrorCode),
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone, Default)]
pub struct FrameConfig {
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

/// Encode a frame into its wire form.
///
/// Wire format:
/// ```text
/// ┌─────────┬──────────┬─────────┬──────────┐
/// │ Region  │ Offset   │ R/W     │ Data     │
/// │ 1 hex   │ 2 hex    │ 1 hex   │ 2 hex    │
/// └─────────┴──────────┴─────────┴──────────┘
/// ```
pub fn encode_frame(frame: &Frame) -> Result<[u8; FRAME_LEN]> {
    if frame.region > 0x0F {
        return Err(FrameError::NibbleOutOfRange {
            field: "region",
            value: frame.region,
        });
    }
    if frame.rw > 0x0F {
        return Err(FrameError::NibbleOutOfRange {
            field: "rw",
            value: frame.rw,
        });
    }

    let mut out = [0u8; FRAME_LEN];
    out[0] = HEX_DIGITS[frame.region as usize];
    out[1] = HEX_DIGITS[(frame.offset >> 4) as usize];
    out[2] = HEX_DIGITS[(frame.offset & 0x0F) as usize];
    out[3] = HEX_DIGITS[frame.rw as usize];
    out[4] = HEX_DIGITS[(frame.data >> 4) as usize];
    out[5] = HEX_DIGITS[(frame.data & 0x0F) as usize];
    Ok(out)
}

/// Decode six hex characters into a frame.
///
/// Fails if the input is not exactly six characters or any of them is not a
/// hex digit (either case). Region and read/write digits are not range
/// checked beyond being hex.
pub fn decode_frame(src: &[u8]) -> Result<Frame> {
    if src.len() != FRAME_LEN {
        return Err(FrameError::Length { len: src.len() });
    }

    let mut digits = [0u8; FRAME_LEN];
    for (position, (&byte, digit)) in src.iter().zip(digits.iter_mut()).enumerate() {
        *digit = hex_value(byte).ok_or(FrameError::NotHex { position, byte })?;
    }

    Ok(Frame {
        region: digits[0],
        offset: (digits[1] << 4) | digits[2],
        rw: digits[3],
        data: (digits[4] << 4) | digits[5],
    })
}

/// Encode a successful response: region and offset echoed, read/write digit
/// fixed to `0`, data set to the resulting byte.
///
/// Only the low digit of `region` is used.
pub fn encode_response(region: u8, offset: u8, data: u8) -> [u8; FRAME_LEN] {
    let frame = Frame {
        region: region & 0x0F,
        offset,
        rw: RW_READ,
        data,
    };
    // Both digit fields are masked above, so encoding cannot fail.
    encode_frame(&frame).unwrap_or(*GENERAL)
}

/// Decode a response frame, recognising the fixed error frames first.
pub fn decode_response(src: &[u8]) -> Result<Response> {
    if let Some(code) = ErrorCode::from_frame(src) {
        return Ok(Response::Error(code));
    }
    decode_frame(src).map(Response::Value)
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        _ => None,
    }
}
