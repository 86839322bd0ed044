use std::time::Duration;

use semivibe_device::{Component, Group, Region, Register, RegisterKind};
use semivibe_frame::{
    decode_frame, encode_frame, Frame, FrameConfig, FrameError, FrameReader, FrameWriter,
    Response, EXIT, FRAME_LEN, RW_READ,
};
use semivibe_transport::{DeviceStream, TcpEndpoint, TransportError};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{DriverError, Result};
use crate::greeting::expect_greeting;

/// Host the driver connects to when none is given.
pub const DEFAULT_HOST: &str = "localhost";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DOOR_COUNT: u8 = 4;
const HEATER_MAX: u8 = 0x0F;

/// Driver configuration.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Applied to connect, every read and every write.
    pub timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl DriverConfig {
    /// Override the I/O timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// State of one door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DoorState {
    Open,
    Closed,
}

/// Summary of the device-wide bitfields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceStatus {
    /// At least one component is attached.
    pub connected: bool,
    /// At least one sensor is powered.
    pub sensors_powered: bool,
    /// At least one actuator is powered.
    pub actuators_powered: bool,
    /// At least one component reports an error.
    pub has_errors: bool,
}

/// Both sensors' ids and readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SensorData {
    pub temperature_id: u8,
    pub temperature: u8,
    pub humidity_id: u8,
    pub humidity: u8,
}

/// All four actuator values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActuatorData {
    pub led: u8,
    pub fan: u8,
    pub heater: u8,
    pub doors: u8,
}

struct Connection {
    peer: String,
    reader: FrameReader<DeviceStream>,
    writer: FrameWriter<DeviceStream>,
}

/// Typed client for one Semi-Vibe device.
///
/// ```no_run
/// use semivibe_peer::{Driver, DriverConfig};
///
/// let mut driver = Driver::new(DriverConfig::default());
/// driver.init()?;
/// driver.connect("localhost", 8989)?;
/// driver.set_led(0x80)?;
/// assert_eq!(driver.get_led()?, 0x80);
/// driver.disconnect();
/// # Ok::<(), semivibe_peer::DriverError>(())
/// ```
pub struct Driver {
    config: DriverConfig,
    initialized: bool,
    connection: Option<Connection>,
}

impl Driver {
    /// Create an uninitialized driver.
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config,
            initialized: false,
            connection: None,
        }
    }

    /// Initialize, connect and return a ready driver with default config.
    pub fn open(host: &str, port: u16) -> Result<Self> {
        Self::open_with_config(host, port, DriverConfig::default())
    }

    /// Initialize, connect and return a ready driver.
    pub fn open_with_config(host: &str, port: u16, config: DriverConfig) -> Result<Self> {
        let mut driver = Self::new(config);
        driver.init()?;
        driver.connect(host, port)?;
        Ok(driver)
    }

    /// Validate configuration. Must be called once before `connect`.
    pub fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Err(DriverError::AlreadyInitialized);
        }
        if self.config.timeout.is_zero() {
            return Err(DriverError::InvalidParameter(
                "timeout must be greater than zero".to_string(),
            ));
        }
        self.initialized = true;
        debug!(timeout = ?self.config.timeout, "driver initialized");
        Ok(())
    }

    /// Open the connection and wait for the `ACK` greeting.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        if !self.initialized {
            return Err(DriverError::NotInitialized);
        }
        if self.connection.is_some() {
            return Err(DriverError::AlreadyConnected);
        }

        let stream = TcpEndpoint::connect(host, port, self.config.timeout).map_err(|err| {
            match err {
                TransportError::Unresolved(addr) => DriverError::ResourceUnavailable(addr),
                other => DriverError::ConnectionFailed(other.to_string()),
            }
        })?;

        let frame_config = FrameConfig {
            read_timeout: Some(self.config.timeout),
            write_timeout: Some(self.config.timeout),
        };
        let reader_stream = stream
            .try_clone()
            .map_err(|err| DriverError::ConnectionFailed(err.to_string()))?;
        let mut reader = FrameReader::with_config_stream(reader_stream, frame_config.clone())
            .map_err(|err| DriverError::ConnectionFailed(err.to_string()))?;
        let writer = FrameWriter::with_config_stream(stream, frame_config)
            .map_err(|err| DriverError::ConnectionFailed(err.to_string()))?;

        expect_greeting(&mut reader, self.config.timeout)?;

        let peer = format!("{host}:{port}");
        info!(%peer, "driver connected");
        self.connection = Some(Connection {
            peer,
            reader,
            writer,
        });
        Ok(())
    }

    /// Whether a connection is open.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Send `exit` and close the connection. Idempotent.
    pub fn disconnect(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };
        if let Err(err) = connection.writer.write_raw(EXIT) {
            debug!(error = %err, "exit token not delivered");
        }
        if let Err(err) = connection.writer.get_ref().shutdown() {
            warn!(error = %err, "failed to close driver connection");
        }
        info!(peer = %connection.peer, "driver disconnected");
    }

    /// Read one register by region and offset.
    pub fn read_register(&mut self, region: Region, offset: u8) -> Result<u8> {
        self.transact(Frame::read(region.nibble(), offset))
    }

    /// Write one register and return the byte the device echoed.
    pub fn write_register(&mut self, region: Region, offset: u8, value: u8) -> Result<u8> {
        self.transact(Frame::write(region.nibble(), offset, value))
    }

    /// Send a raw six-character command and return the raw response.
    ///
    /// Only the local frame shape is checked. Error frames are returned as
    /// text, not as errors.
    pub fn send_raw(&mut self, command: &str) -> Result<String> {
        decode_frame(command.as_bytes())?;
        let connection = self.connection_mut()?;

        let exchanged = connection
            .writer
            .write_raw(command.as_bytes())
            .and_then(|()| connection.reader.read_bytes(FRAME_LEN))
            .map_err(DriverError::communication)
            .and_then(|raw| {
                String::from_utf8(raw.to_vec()).map_err(|_| {
                    DriverError::CommunicationFailed("response is not ASCII".to_string())
                })
            });

        let response = exchanged.map_err(|err| self.abort(err))?;
        debug!(%command, %response, "raw exchange");
        Ok(response)
    }

    /// Temperature sensor reading.
    pub fn get_temperature(&mut self) -> Result<u8> {
        self.read_named("sensor_a_reading")
    }

    /// Humidity sensor reading.
    pub fn get_humidity(&mut self) -> Result<u8> {
        self.read_named("sensor_b_reading")
    }

    /// Both sensors' ids and readings.
    pub fn get_sensors(&mut self) -> Result<SensorData> {
        Ok(SensorData {
            temperature_id: self.read_named("sensor_a_id")?,
            temperature: self.read_named("sensor_a_reading")?,
            humidity_id: self.read_named("sensor_b_id")?,
            humidity: self.read_named("sensor_b_reading")?,
        })
    }

    /// All four actuator values.
    pub fn get_actuators(&mut self) -> Result<ActuatorData> {
        Ok(ActuatorData {
            led: self.get_led()?,
            fan: self.get_fan()?,
            heater: self.get_heater()?,
            doors: self.read_named("actuator_d")?,
        })
    }

    pub fn get_led(&mut self) -> Result<u8> {
        self.read_named("actuator_a")
    }

    pub fn set_led(&mut self, value: u8) -> Result<()> {
        self.write_named("actuator_a", value)
    }

    pub fn get_fan(&mut self) -> Result<u8> {
        self.read_named("actuator_b")
    }

    pub fn set_fan(&mut self, value: u8) -> Result<()> {
        self.write_named("actuator_b", value)
    }

    pub fn get_heater(&mut self) -> Result<u8> {
        self.read_named("actuator_c")
    }

    /// Set the heater level (`0..=15`).
    pub fn set_heater(&mut self, value: u8) -> Result<()> {
        if value > HEATER_MAX {
            return Err(DriverError::InvalidParameter(format!(
                "heater level {value} is outside 0..={HEATER_MAX}"
            )));
        }
        self.write_named("actuator_c", value)
    }

    /// State of door `door` (`1..=4`).
    pub fn get_door_state(&mut self, door: u8) -> Result<DoorState> {
        let bit = door_bit(door)?;
        let doors = self.read_named("actuator_d")?;
        Ok(if doors & bit != 0 {
            DoorState::Open
        } else {
            DoorState::Closed
        })
    }

    /// Open or close door `door` (`1..=4`), leaving the other doors as they are.
    pub fn set_door(&mut self, door: u8, state: DoorState) -> Result<()> {
        let bit = door_bit(door)?;
        let current = self.read_named("actuator_d")?;
        let next = match state {
            DoorState::Open => current | bit,
            DoorState::Closed => current & !bit,
        };
        self.write_named("actuator_d", next)
    }

    /// Whether `component` is powered.
    pub fn get_power_state(&mut self, component: Component) -> Result<bool> {
        let power = self.read_named("power_state")?;
        Ok(power & component.bit() != 0)
    }

    /// Power `component` on or off, leaving the rest of its group as it is.
    pub fn set_power_state(&mut self, component: Component, powered: bool) -> Result<()> {
        let register = control_register(RegisterKind::PowerControl(component.group()))?;
        let current = self.transact(Frame::read(register.region.nibble(), register.offset))?;
        let next = if powered {
            current | component.bit()
        } else {
            current & !component.bit()
        };
        self.write_checked(register, next)
    }

    /// Whether `component` reports an error.
    pub fn get_error_state(&mut self, component: Component) -> Result<bool> {
        let errors = self.read_named("error_state")?;
        Ok(errors & component.bit() != 0)
    }

    /// Pulse the reset line of `component`.
    pub fn reset_component(&mut self, component: Component) -> Result<()> {
        let register = control_register(RegisterKind::ResetControl(component.group()))?;
        self.write_checked(register, component.bit())
    }

    /// Summary of the device-wide bitfields.
    pub fn get_status(&mut self) -> Result<DeviceStatus> {
        let connected = self.read_named("connected_device")?;
        let power = self.read_named("power_state")?;
        let errors = self.read_named("error_state")?;
        Ok(DeviceStatus {
            connected: connected != 0,
            sensors_powered: power & Group::Sensors.mask() != 0,
            actuators_powered: power & Group::Actuators.mask() != 0,
            has_errors: errors != 0,
        })
    }

    fn read_named(&mut self, name: &str) -> Result<u8> {
        let register = named(name)?;
        self.transact(Frame::read(register.region.nibble(), register.offset))
    }

    fn write_named(&mut self, name: &str, value: u8) -> Result<()> {
        let register = named(name)?;
        self.write_checked(register, value)
    }

    fn write_checked(&mut self, register: &Register, value: u8) -> Result<()> {
        let echoed = self.transact(Frame::write(register.region.nibble(), register.offset, value))?;
        if echoed != value {
            return Err(DriverError::ProtocolError(format!(
                "{} echoed 0x{echoed:02X}, wrote 0x{value:02X}",
                register.name
            )));
        }
        Ok(())
    }

    /// Send one frame, read one response, return its data byte.
    fn transact(&mut self, frame: Frame) -> Result<u8> {
        let wire = encode_frame(&frame)
            .map_err(|err| DriverError::InvalidParameter(err.to_string()))?;
        let connection = self.connection_mut()?;

        let exchanged = connection
            .writer
            .write_raw(&wire)
            .and_then(|()| connection.reader.read_response())
            .map_err(|err| match err {
                FrameError::Length { .. } | FrameError::NotHex { .. } => {
                    DriverError::CommunicationFailed(format!("garbled response: {err}"))
                }
                other => DriverError::communication(other),
            });
        let response = exchanged.map_err(|err| self.abort(err))?;

        match response {
            Response::Error(code) => {
                debug!(command = %frame, %code, "device rejected command");
                Err(DriverError::Device(code))
            }
            Response::Value(reply) => {
                if reply.region != frame.region
                    || reply.offset != frame.offset
                    || reply.rw != RW_READ
                {
                    return Err(DriverError::ProtocolError(format!(
                        "response {reply} does not echo command {frame}"
                    )));
                }
                debug!(command = %frame, value = reply.data, "command answered");
                Ok(reply.data)
            }
        }
    }

    /// Drop the connection after a failed exchange. A late or partial reply
    /// may still be in flight, so the stream cannot be reused.
    fn abort(&mut self, err: DriverError) -> DriverError {
        if let Some(connection) = self.connection.take() {
            if let Err(shutdown) = connection.writer.get_ref().shutdown() {
                debug!(error = %shutdown, "shutdown after failed exchange");
            }
            warn!(peer = %connection.peer, error = %err, "driver connection dropped");
        }
        err
    }

    fn connection_mut(&mut self) -> Result<&mut Connection> {
        self.connection.as_mut().ok_or(DriverError::NotConnected)
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("config", &self.config)
            .field("initialized", &self.initialized)
            .field(
                "peer",
                &self.connection.as_ref().map(|connection| &connection.peer),
            )
            .finish()
    }
}

fn named(name: &str) -> Result<&'static Register> {
    Register::by_name(name)
        .ok_or_else(|| DriverError::Internal(format!("register {name} missing from table")))
}

fn control_register(kind: RegisterKind) -> Result<&'static Register> {
    Register::ALL
        .iter()
        .find(|register| register.kind == kind)
        .ok_or_else(|| DriverError::Internal(format!("no register of kind {kind:?}")))
}

fn door_bit(door: u8) -> Result<u8> {
    if !(1..=DOOR_COUNT).contains(&door) {
        return Err(DriverError::InvalidParameter(format!(
            "door {door} is outside 1..={DOOR_COUNT}"
        )));
    }
    Ok(1 << (2 * (door - 1)))
}
