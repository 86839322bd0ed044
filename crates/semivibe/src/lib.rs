//! Simulated Semi-Vibe register device.
//!
//! A small device with fifteen one-byte registers, reachable over TCP with a
//! fixed six-character hex protocol, and a typed driver to talk to it.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP listener and stream plumbing
//! - [`frame`]: the 6-hex frame codec with its reader and writer
//! - [`device`]: register map and live device state
//! - [`peer`]: device server and driver client (behind `peer` feature)
//! - [`describe`]: human-readable explanation of a frame

pub mod describe;

/// Re-export transport types.
pub mod transport {
    pub use semivibe_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use semivibe_frame::*;
}

/// Re-export register map and device state types.
pub mod device {
    pub use semivibe_device::*;
}

/// Re-export server and driver types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use semivibe_peer::*;
}

pub use describe::{describe, explain, Description};
