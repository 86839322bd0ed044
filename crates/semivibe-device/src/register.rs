//! Fixed register address table, access policy and masking rules.

use std::fmt;

use serde::Serialize;

use crate::error::{RegisterError, Result};

/// Mask applied to the heater value (`0..=15`).
pub const HEATER_MASK: u8 = 0x0F;
/// Mask applied to the doors value: one bit per door at positions 0, 2, 4, 6.
pub const DOORS_MASK: u8 = 0x55;

/// Address regions, keyed by the first hex digit of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    /// Device-wide status bitfields.
    Main,
    /// Sensor ids and readings.
    Sensor,
    /// Actuator values.
    Actuator,
    /// Power and reset control bytes.
    Control,
}

impl Region {
    /// Map a region digit to a region.
    #[must_use]
    pub const fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            1 => Some(Self::Main),
            2 => Some(Self::Sensor),
            3 => Some(Self::Actuator),
            4 => Some(Self::Control),
            _ => None,
        }
    }

    /// The region digit used on the wire.
    #[must_use]
    pub const fn nibble(self) -> u8 {
        match self {
            Self::Main => 1,
            Self::Sensor => 2,
            Self::Actuator => 3,
            Self::Control => 4,
        }
    }

    /// Lowercase display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Sensor => "sensor",
            Self::Actuator => "actuator",
            Self::Control => "control",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Device components. Each one owns the same bit in every bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Temperature,
    Humidity,
    Led,
    Fan,
    Heater,
    Doors,
}

impl Component {
    /// All components in bit order.
    pub const ALL: [Self; 6] = [
        Self::Temperature,
        Self::Humidity,
        Self::Led,
        Self::Fan,
        Self::Heater,
        Self::Doors,
    ];

    /// Bit mask for this component in `connected_device`, `power_state`,
    /// `error_state` and the control registers.
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Self::Temperature => 1 << 0,
            Self::Humidity => 1 << 1,
            Self::Led => 1 << 4,
            Self::Fan => 1 << 5,
            Self::Heater => 1 << 6,
            Self::Doors => 1 << 7,
        }
    }

    /// Power and reset group this component belongs to.
    #[must_use]
    pub const fn group(self) -> Group {
        match self {
            Self::Temperature | Self::Humidity => Group::Sensors,
            Self::Led | Self::Fan | Self::Heater | Self::Doors => Group::Actuators,
        }
    }

    /// Lowercase display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Led => "led",
            Self::Fan => "fan",
            Self::Heater => "heater",
            Self::Doors => "doors",
        }
    }

    /// Components whose bit is set in `bits`.
    pub fn in_bitfield(bits: u8) -> impl Iterator<Item = Self> {
        Self::ALL
            .into_iter()
            .filter(move |component| bits & component.bit() != 0)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Component groups addressed by the power and reset control registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    Sensors,
    Actuators,
}

impl Group {
    /// Bits of the group's components.
    #[must_use]
    pub const fn mask(self) -> u8 {
        match self {
            Self::Sensors => Component::Temperature.bit() | Component::Humidity.bit(),
            Self::Actuators => {
                Component::Led.bit()
                    | Component::Fan.bit()
                    | Component::Heater.bit()
                    | Component::Doors.bit()
            }
        }
    }

    /// Components of the group in bit order.
    pub fn components(self) -> impl Iterator<Item = Component> {
        Component::ALL
            .into_iter()
            .filter(move |component| component.group() == self)
    }
}

/// Access policy of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Access {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Access {
    /// Short form used in tables (`RO`, `WO`, `RW`).
    #[must_use]
    pub const fn short(self) -> &'static str {
        match self {
            Self::ReadOnly => "RO",
            Self::WriteOnly => "WO",
            Self::ReadWrite => "RW",
        }
    }
}

/// Direction of a resolved register operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Write,
}

impl Operation {
    /// Map a read/write digit. Only `0` and `1` name an operation.
    #[must_use]
    pub const fn from_nibble(rw: u8) -> Option<Self> {
        match rw {
            0 => Some(Self::Read),
            1 => Some(Self::Write),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// What a register stores and which side effects a write has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterKind {
    /// `connected_device` bitfield.
    ConnectedDevice,
    /// `power_state` bitfield.
    PowerState,
    /// `error_state` bitfield.
    ErrorState,
    /// Fixed id of the sensor owned by the component.
    SensorId(Component),
    /// Latest reading of the sensor owned by the component.
    SensorReading(Component),
    /// Value byte of an actuator.
    Actuator(Component),
    /// Per-component power gating for a group.
    PowerControl(Group),
    /// Momentary reset pulse for a group.
    ResetControl(Group),
}

/// One entry of the register address table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register {
    /// Register name as documented.
    pub name: &'static str,
    /// Region the register lives in.
    pub region: Region,
    /// Offset within the region.
    pub offset: u8,
    /// Access policy.
    pub access: Access,
    /// Write-only register that never retains a value and reads back as zero.
    pub self_clearing: bool,
    /// Storage and side-effect class.
    pub kind: RegisterKind,
}

const fn reg(
    name: &'static str,
    region: Region,
    offset: u8,
    access: Access,
    kind: RegisterKind,
) -> Register {
    Register {
        name,
        region,
        offset,
        access,
        self_clearing: false,
        kind,
    }
}

const fn pulse(name: &'static str, offset: u8, group: Group) -> Register {
    Register {
        name,
        region: Region::Control,
        offset,
        access: Access::WriteOnly,
        self_clearing: true,
        kind: RegisterKind::ResetControl(group),
    }
}

impl Register {
    /// The complete address table in region/offset order.
    pub const ALL: [Self; 15] = [
        reg("connected_device", Region::Main, 0x00, Access::ReadOnly, RegisterKind::ConnectedDevice),
        reg("power_state", Region::Main, 0x02, Access::ReadOnly, RegisterKind::PowerState),
        reg("error_state", Region::Main, 0x03, Access::ReadOnly, RegisterKind::ErrorState),
        reg(
            "sensor_a_id",
            Region::Sensor,
            0x10,
            Access::ReadOnly,
            RegisterKind::SensorId(Component::Temperature),
        ),
        reg(
            "sensor_a_reading",
            Region::Sensor,
            0x11,
            Access::ReadOnly,
            RegisterKind::SensorReading(Component::Temperature),
        ),
        reg(
            "sensor_b_id",
            Region::Sensor,
            0x20,
            Access::ReadOnly,
            RegisterKind::SensorId(Component::Humidity),
        ),
        reg(
            "sensor_b_reading",
            Region::Sensor,
            0x21,
            Access::ReadOnly,
            RegisterKind::SensorReading(Component::Humidity),
        ),
        reg("actuator_a", Region::Actuator, 0x10, Access::ReadWrite, RegisterKind::Actuator(Component::Led)),
        reg("actuator_b", Region::Actuator, 0x20, Access::ReadWrite, RegisterKind::Actuator(Component::Fan)),
        reg(
            "actuator_c",
            Region::Actuator,
            0x30,
            Access::ReadWrite,
            RegisterKind::Actuator(Component::Heater),
        ),
        reg(
            "actuator_d",
            Region::Actuator,
            0x40,
            Access::ReadWrite,
            RegisterKind::Actuator(Component::Doors),
        ),
        reg(
            "power_sensors",
            Region::Control,
            0xFB,
            Access::ReadWrite,
            RegisterKind::PowerControl(Group::Sensors),
        ),
        reg(
            "power_actuators",
            Region::Control,
            0xFC,
            Access::ReadWrite,
            RegisterKind::PowerControl(Group::Actuators),
        ),
        pulse("reset_sensors", 0xFD, Group::Sensors),
        pulse("reset_actuators", 0xFE, Group::Actuators),
    ];

    /// Look up a register by region and offset.
    #[must_use]
    pub fn lookup(region: Region, offset: u8) -> Option<&'static Self> {
        Self::ALL
            .iter()
            .find(|register| register.region == region && register.offset == offset)
    }

    /// Look up a register by its documented name.
    #[must_use]
    pub fn by_name(name: &str) -> Option<&'static Self> {
        Self::ALL.iter().find(|register| register.name == name)
    }

    /// Whether the access policy lets `operation` through.
    #[must_use]
    pub const fn permits(&self, operation: Operation) -> bool {
        match (self.access, operation) {
            (Access::ReadWrite, _) => true,
            (Access::ReadOnly, Operation::Read) => true,
            (Access::ReadOnly, Operation::Write) => false,
            (Access::WriteOnly, Operation::Write) => true,
            (Access::WriteOnly, Operation::Read) => self.self_clearing,
        }
    }
}

/// Resolve raw frame digits to a register and an operation.
///
/// Fails with [`RegisterError::Invalid`] when the region digit is not `1..=4`,
/// the offset is not defined in that region, or the read/write digit is not
/// `0` or `1`.
pub fn resolve(region: u8, offset: u8, rw: u8) -> Result<(&'static Register, Operation)> {
    let invalid = || RegisterError::Invalid { region, offset, rw };

    let operation = Operation::from_nibble(rw).ok_or_else(invalid)?;
    let register = Region::from_nibble(region)
        .and_then(|region| Register::lookup(region, offset))
        .ok_or_else(invalid)?;
    Ok((register, operation))
}

/// Check the register's access policy for `operation`.
///
/// Writes to read-only registers and reads of write-only registers are
/// forbidden, except that self-clearing registers may be read.
pub fn check_access(register: &Register, operation: Operation) -> Result<()> {
    if register.permits(operation) {
        Ok(())
    } else {
        Err(RegisterError::Forbidden {
            register: register.name,
            operation,
        })
    }
}

/// Apply the register's write mask to `raw`.
#[must_use]
pub fn mask(register: &Register, raw: u8) -> u8 {
    match register.kind {
        RegisterKind::Actuator(Component::Heater) => raw & HEATER_MASK,
        RegisterKind::Actuator(Component::Doors) => raw & DOORS_MASK,
        _ => raw,
    }
}
