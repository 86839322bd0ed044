//! TCP transport for the Semi-Vibe device protocol.
//!
//! This is the lowest layer of semivibe. The device server listens on a
//! [`TcpEndpoint`]; both sides exchange bytes over a [`DeviceStream`].
//! Everything above this crate is protocol logic and never touches sockets
//! directly.

pub mod error;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use tcp::{TcpEndpoint, DEFAULT_PORT};
pub use traits::DeviceStream;
