use crate::register::Operation;

/// Errors produced while resolving or applying a register operation.
///
/// The three variants line up with the three wire error frames.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    /// The region, offset or read/write digit does not name a register.
    #[error("no register at region 0x{region:X} offset 0x{offset:02X} (rw digit 0x{rw:X})")]
    Invalid { region: u8, offset: u8, rw: u8 },

    /// The register exists but does not allow this direction.
    #[error("{register} does not allow {operation}")]
    Forbidden {
        register: &'static str,
        operation: Operation,
    },

    /// The operation is well formed but cannot complete in the current state.
    #[error("{register}: {reason}")]
    General {
        register: &'static str,
        reason: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, RegisterError>;
