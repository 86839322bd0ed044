use serde::Serialize;

use semivibe_peer::{ActuatorData, DeviceStatus, SensorData};

use crate::cmd::send::open;
use crate::cmd::StatusArgs;
use crate::exit::{driver_error, CliResult, SUCCESS};
use crate::output::{hex, print_record, yes_no, OutputFormat};

#[derive(Serialize)]
struct Report {
    status: DeviceStatus,
    sensors: SensorData,
    actuators: ActuatorData,
}

pub fn run(args: StatusArgs, format: OutputFormat) -> CliResult<i32> {
    let mut driver = open(&args.device)?;
    let status = driver
        .get_status()
        .map_err(|err| driver_error("status failed", err))?;
    let sensors = driver
        .get_sensors()
        .map_err(|err| driver_error("sensor read failed", err))?;
    let actuators = driver
        .get_actuators()
        .map_err(|err| driver_error("actuator read failed", err))?;
    driver.disconnect();

    let rows = vec![
        ("connected", yes_no(status.connected)),
        ("sensors_powered", yes_no(status.sensors_powered)),
        ("actuators_powered", yes_no(status.actuators_powered)),
        ("has_errors", yes_no(status.has_errors)),
        ("temperature_id", hex(sensors.temperature_id)),
        ("temperature", sensors.temperature.to_string()),
        ("humidity_id", hex(sensors.humidity_id)),
        ("humidity", sensors.humidity.to_string()),
        ("led", hex(actuators.led)),
        ("fan", hex(actuators.fan)),
        ("heater", actuators.heater.to_string()),
        ("doors", hex(actuators.doors)),
    ];
    print_record(
        &Report {
            status,
            sensors,
            actuators,
        },
        &rows,
        format,
    );
    Ok(SUCCESS)
}
