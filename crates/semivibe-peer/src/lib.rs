//! Both ends of a Semi-Vibe connection.
//!
//! [`DeviceServer`] owns one [`DeviceState`](semivibe_device::DeviceState),
//! greets each client with `ACK` and answers one response frame per command
//! frame. [`Driver`] is the typed client: every call builds one frame, waits
//! for one response and maps wire errors to [`DriverError`].

pub mod driver;
pub mod error;
pub mod greeting;
pub mod server;

pub use driver::{
    ActuatorData, DeviceStatus, DoorState, Driver, DriverConfig, SensorData, DEFAULT_HOST,
};
pub use error::{DriverError, DriverErrorKind, GreetingError, Result, ServerError, ServerResult};
pub use greeting::{expect_greeting, send_greeting};
pub use server::{
    dispatch, DeviceServer, DirectAccess, ServerConfig, ServerControl, ServerHandle,
};
