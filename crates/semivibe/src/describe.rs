//! Human-readable explanation of a decoded command frame.
//!
//! Used by tooling such as the `describe` subcommand. Nothing on the wire path
//! formats descriptions.

use std::fmt;

use serde::Serialize;

use semivibe_device::{
    check_access, mask, resolve, Access, Component, Operation, Region, RegisterError, RegisterKind,
};
use semivibe_frame::Frame;

/// Structured result of [`explain`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Description {
    /// Frame text, uppercase hex.
    pub frame: String,
    /// Region the frame addresses, if the digit is known.
    pub region: Option<Region>,
    /// Register name, if the address resolves.
    pub register: Option<&'static str>,
    /// Access policy of the register.
    pub access: Option<Access>,
    /// Requested operation, if the read/write digit is valid.
    pub operation: Option<Operation>,
    /// Data byte as sent.
    pub data: u8,
    /// Value the device would store for a write, after masking.
    pub stored: Option<u8>,
    /// Components named by the bits of a bitfield write.
    pub components: Vec<&'static str>,
    /// Error the device answers with, when the frame cannot succeed
    /// regardless of device state.
    pub rejected: Option<&'static str>,
}

/// Describe `frame` against the register table.
pub fn explain(frame: &Frame) -> Description {
    let mut out = Description {
        frame: frame.to_string(),
        region: Region::from_nibble(frame.region),
        register: None,
        access: None,
        operation: Operation::from_nibble(frame.rw),
        data: frame.data,
        stored: None,
        components: Vec::new(),
        rejected: None,
    };

    let (register, operation) = match resolve(frame.region, frame.offset, frame.rw) {
        Ok(found) => found,
        Err(err) => {
            out.rejected = Some(rejection(&err));
            return out;
        }
    };
    out.register = Some(register.name);
    out.access = Some(register.access);

    if let Err(err) = check_access(register, operation) {
        out.rejected = Some(rejection(&err));
        return out;
    }

    if operation == Operation::Write {
        let stored = mask(register, frame.data);
        out.stored = Some(if register.self_clearing { 0 } else { stored });
        out.components = match register.kind {
            RegisterKind::PowerControl(group) | RegisterKind::ResetControl(group) => {
                Component::in_bitfield(frame.data & group.mask())
                    .map(Component::name)
                    .collect()
            }
            _ => Vec::new(),
        };
    }
    out
}

/// One-line description of `frame`.
pub fn describe(frame: &Frame) -> String {
    explain(frame).to_string()
}

fn rejection(err: &RegisterError) -> &'static str {
    match err {
        RegisterError::Invalid { .. } => "invalid",
        RegisterError::Forbidden { .. } => "forbidden",
        RegisterError::General { .. } => "general",
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.frame)?;

        let (Some(region), Some(register), Some(access), Some(operation)) =
            (self.region, self.register, self.access, self.operation)
        else {
            return write!(f, "unknown address ({})", self.rejected.unwrap_or("invalid"));
        };

        write!(f, "{operation} {register} ({region}, {})", access.short())?;
        if let Some(stored) = self.stored {
            write!(f, " data=0x{:02X}", self.data)?;
            if stored != self.data {
                write!(f, " stored=0x{stored:02X}")?;
            }
        }
        if !self.components.is_empty() {
            write!(f, " [{}]", self.components.join(", "))?;
        }
        if let Some(rejected) = self.rejected {
            write!(f, " -> {rejected}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semivibe_frame::decode_frame;

    fn frame(text: &str) -> Frame {
        decode_frame(text.as_bytes()).expect("test frame should decode")
    }

    #[test]
    fn describes_actuator_write() {
        let desc = explain(&frame("310180"));
        assert_eq!(desc.register, Some("actuator_a"));
        assert_eq!(desc.operation, Some(Operation::Write));
        assert_eq!(desc.stored, Some(0x80));
        assert_eq!(desc.rejected, None);
        assert_eq!(
            describe(&frame("310180")),
            "310180: write actuator_a (actuator, RW) data=0x80"
        );
    }

    #[test]
    fn shows_masked_value() {
        let desc = explain(&frame("3401FF"));
        assert_eq!(desc.stored, Some(0x55));
        assert!(describe(&frame("3401FF")).ends_with("data=0xFF stored=0x55"));
    }

    #[test]
    fn reads_carry_no_data() {
        let desc = explain(&frame("211000"));
        assert_eq!(desc.register, Some("sensor_a_reading"));
        assert_eq!(desc.stored, None);
        assert_eq!(
            describe(&frame("211000")),
            "211000: read sensor_a_reading (sensor, RO)"
        );
    }

    #[test]
    fn lists_components_of_control_bitfields() {
        let desc = explain(&frame("4FC1F0"));
        assert_eq!(desc.components, vec!["led", "fan", "heater", "doors"]);

        let desc = explain(&frame("4FD102"));
        assert_eq!(desc.stored, Some(0));
        assert_eq!(desc.components, vec!["humidity"]);
    }

    #[test]
    fn flags_forbidden_and_invalid() {
        let desc = explain(&frame("100101"));
        assert_eq!(desc.register, Some("connected_device"));
        assert_eq!(desc.rejected, Some("forbidden"));
        assert!(describe(&frame("100101")).ends_with("-> forbidden"));

        let desc = explain(&frame("500000"));
        assert_eq!(desc.region, None);
        assert_eq!(desc.rejected, Some("invalid"));
        assert_eq!(describe(&frame("500000")), "500000: unknown address (invalid)");

        assert_eq!(explain(&frame("310280")).rejected, Some("invalid"));
    }
}
