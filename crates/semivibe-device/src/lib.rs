//! Register model of the Semi-Vibe device.
//!
//! The device exposes fifteen one-byte registers split across four regions.
//! [`register`] holds the static address table together with its access
//! policy and masking rules; [`state`] owns the live values and applies
//! validated reads and writes, including the power and reset side effects of
//! the control registers.
//!
//! This crate knows nothing about the wire format. Callers decode a frame,
//! hand the raw region, offset and read/write digits to [`resolve`], and pass
//! the result to [`DeviceState::apply`].

pub mod error;
pub mod register;
pub mod state;

pub use error::{RegisterError, Result};
pub use register::{
    check_access, mask, resolve, Access, Component, Group, Operation, Region, Register,
    RegisterKind,
};
pub use state::{DeviceState, Sensor, Snapshot};
