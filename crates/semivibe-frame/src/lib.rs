//! Fixed-width command/response framing for the Semi-Vibe device protocol.
//!
//! Every command and every response on the wire is exactly six ASCII hex
//! characters, back to back, with no length prefix and no delimiter:
//! - 1 hex digit region
//! - 2 hex digits register offset
//! - 1 hex digit read/write flag
//! - 2 hex digits data byte
//!
//! Two out-of-band tokens sit next to the frames: the server greets every
//! connection with `ACK`, and the driver closes its session with `exit`.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, decode_response, encode_frame, encode_response, ErrorCode, Frame,
    FrameConfig, Response, ACK, EXIT, FORBIDDEN, FRAME_LEN, GENERAL, INVALID, RW_READ, RW_WRITE,
};
pub use error::{FrameError, Result};
pub use reader::{FrameReader, Inbound};
pub use writer::FrameWriter;
