//! Live register values and the side effects of control writes.

use serde::Serialize;
use tracing::debug;

use crate::error::{RegisterError, Result};
use crate::register::{mask, Access, Component, Group, Operation, Register, RegisterKind};

const DEFAULT_CONNECTED: u8 = 0xF3;
const DEFAULT_POWER: u8 = 0xF3;
const SENSOR_A_ID: u8 = 0xA1;
const SENSOR_A_DEFAULT_READING: u8 = 0x16;
const SENSOR_B_ID: u8 = 0xB2;
const SENSOR_B_DEFAULT_READING: u8 = 0x28;

/// The two physical sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensor {
    /// Temperature sensor.
    A,
    /// Humidity sensor.
    B,
}

impl Sensor {
    /// Component bit the sensor reports under.
    #[must_use]
    pub const fn component(self) -> Component {
        match self {
            Self::A => Component::Temperature,
            Self::B => Component::Humidity,
        }
    }

    const fn default_id(self) -> u8 {
        match self {
            Self::A => SENSOR_A_ID,
            Self::B => SENSOR_B_ID,
        }
    }

    const fn default_reading(self) -> u8 {
        match self {
            Self::A => SENSOR_A_DEFAULT_READING,
            Self::B => SENSOR_B_DEFAULT_READING,
        }
    }

    fn of(component: Component) -> Option<Self> {
        match component {
            Component::Temperature => Some(Self::A),
            Component::Humidity => Some(Self::B),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SensorSlot {
    id: u8,
    reading: u8,
}

impl SensorSlot {
    const fn defaults(sensor: Sensor) -> Self {
        Self {
            id: sensor.default_id(),
            reading: sensor.default_reading(),
        }
    }
}

/// Live state of one simulated device.
///
/// Created once with documented defaults and mutated only through
/// [`DeviceState::write`] or the direct-access setters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    connected_device: u8,
    power_state: u8,
    error_state: u8,
    sensors: [SensorSlot; 2],
    actuators: [u8; 4],
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            connected_device: DEFAULT_CONNECTED,
            power_state: DEFAULT_POWER,
            error_state: 0,
            sensors: [
                SensorSlot::defaults(Sensor::A),
                SensorSlot::defaults(Sensor::B),
            ],
            actuators: [0; 4],
        }
    }
}

impl DeviceState {
    /// Device with documented defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a register.
    ///
    /// Values are stored already masked. Reads of a powered-off component
    /// return the last stored value. Self-clearing registers read as zero.
    pub fn read(&self, register: &Register) -> Result<u8> {
        if register.access == Access::WriteOnly && !register.self_clearing {
            return Err(forbidden(register, Operation::Read));
        }

        let value = match register.kind {
            RegisterKind::ConnectedDevice => self.connected_device,
            RegisterKind::PowerState => self.power_state,
            RegisterKind::ErrorState => self.error_state,
            RegisterKind::SensorId(component) => self.sensor_slot(register, component)?.id,
            RegisterKind::SensorReading(component) => {
                self.sensor_slot(register, component)?.reading
            }
            RegisterKind::Actuator(component) => self.actuators[actuator_index(register, component)?],
            RegisterKind::PowerControl(group) => self.power_state & group.mask(),
            RegisterKind::ResetControl(_) => 0,
        };
        Ok(value)
    }

    /// Write a register and return the byte to echo back.
    ///
    /// Actuator writes are masked and echo the stored value; they fail with
    /// [`RegisterError::General`] while the actuator is powered off. Power and
    /// reset control writes echo the written byte.
    pub fn write(&mut self, register: &Register, value: u8) -> Result<u8> {
        if register.access == Access::ReadOnly {
            return Err(forbidden(register, Operation::Write));
        }

        match register.kind {
            RegisterKind::Actuator(component) => {
                if !self.is_powered(component) {
                    return Err(RegisterError::General {
                        register: register.name,
                        reason: "component is powered off",
                    });
                }
                let stored = mask(register, value);
                self.actuators[actuator_index(register, component)?] = stored;
                debug!(register = register.name, value = stored, "actuator updated");
                Ok(stored)
            }
            RegisterKind::PowerControl(group) => {
                self.set_group_power(group, value);
                Ok(value)
            }
            RegisterKind::ResetControl(group) => {
                self.reset_group(group, value);
                Ok(value)
            }
            RegisterKind::ConnectedDevice
            | RegisterKind::PowerState
            | RegisterKind::ErrorState
            | RegisterKind::SensorId(_)
            | RegisterKind::SensorReading(_) => Err(forbidden(register, Operation::Write)),
        }
    }

    /// Dispatch a resolved operation. `data` is ignored for reads.
    pub fn apply(&mut self, register: &Register, operation: Operation, data: u8) -> Result<u8> {
        match operation {
            Operation::Read => self.read(register),
            Operation::Write => self.write(register, data),
        }
    }

    /// Whether the component's power bit is set.
    #[must_use]
    pub fn is_powered(&self, component: Component) -> bool {
        self.power_state & component.bit() != 0
    }

    /// Copy of every register value.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            connected_device: self.connected_device,
            power_state: self.power_state,
            error_state: self.error_state,
            sensor_a_id: self.sensors[0].id,
            sensor_a_reading: self.sensors[0].reading,
            sensor_b_id: self.sensors[1].id,
            sensor_b_reading: self.sensors[1].reading,
            actuator_a: self.actuators[0],
            actuator_b: self.actuators[1],
            actuator_c: self.actuators[2],
            actuator_d: self.actuators[3],
            power_sensors: self.power_state & Group::Sensors.mask(),
            power_actuators: self.power_state & Group::Actuators.mask(),
            reset_sensors: 0,
            reset_actuators: 0,
        }
    }

    /// Inject a sensor reading.
    pub fn set_sensor_reading(&mut self, sensor: Sensor, value: u8) {
        self.sensors[sensor_index(sensor)].reading = value;
    }

    /// Raise or clear a component's error bit.
    pub fn set_error(&mut self, component: Component, raised: bool) {
        self.error_state = with_bit(self.error_state, component.bit(), raised);
    }

    /// Mark a component as attached or detached.
    pub fn set_connected(&mut self, component: Component, connected: bool) {
        self.connected_device = with_bit(self.connected_device, component.bit(), connected);
    }

    fn set_group_power(&mut self, group: Group, value: u8) {
        let before = self.power_state;
        self.power_state = (self.power_state & !group.mask()) | (value & group.mask());
        debug!(
            ?group,
            before,
            after = self.power_state,
            "power state updated"
        );
    }

    fn reset_group(&mut self, group: Group, value: u8) {
        for component in group.components() {
            if value & component.bit() == 0 {
                continue;
            }
            match Sensor::of(component) {
                Some(sensor) => self.sensors[sensor_index(sensor)] = SensorSlot::defaults(sensor),
                None => {
                    if let Some(index) = actuator_slot(component) {
                        self.actuators[index] = 0;
                    }
                }
            }
            self.error_state &= !component.bit();
            debug!(%component, "component reset");
        }
    }

    fn sensor_slot(&self, register: &Register, component: Component) -> Result<&SensorSlot> {
        Sensor::of(component)
            .map(|sensor| &self.sensors[sensor_index(sensor)])
            .ok_or(RegisterError::General {
                register: register.name,
                reason: "register is not backed by a sensor",
            })
    }
}

/// Every register value at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub connected_device: u8,
    pub power_state: u8,
    pub error_state: u8,
    pub sensor_a_id: u8,
    pub sensor_a_reading: u8,
    pub sensor_b_id: u8,
    pub sensor_b_reading: u8,
    pub actuator_a: u8,
    pub actuator_b: u8,
    pub actuator_c: u8,
    pub actuator_d: u8,
    pub power_sensors: u8,
    pub power_actuators: u8,
    pub reset_sensors: u8,
    pub reset_actuators: u8,
}

const fn sensor_index(sensor: Sensor) -> usize {
    match sensor {
        Sensor::A => 0,
        Sensor::B => 1,
    }
}

const fn actuator_slot(component: Component) -> Option<usize> {
    match component {
        Component::Led => Some(0),
        Component::Fan => Some(1),
        Component::Heater => Some(2),
        Component::Doors => Some(3),
        Component::Temperature | Component::Humidity => None,
    }
}

fn actuator_index(register: &Register, component: Component) -> Result<usize> {
    actuator_slot(component).ok_or(RegisterError::General {
        register: register.name,
        reason: "register is not backed by an actuator",
    })
}

fn forbidden(register: &Register, operation: Operation) -> RegisterError {
    RegisterError::Forbidden {
        register: register.name,
        operation,
    }
}

const fn with_bit(bits: u8, bit: u8, set: bool) -> u8 {
    if set {
        bits | bit
    } else {
        bits & !bit
    }
}
