use serde::Serialize;

use semivibe_frame::{decode_frame, decode_response, Response};
use semivibe_peer::{Driver, DriverConfig};

use crate::cmd::{parse_duration, DeviceArgs, SendArgs};
use crate::exit::{driver_error, frame_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct Exchange {
    command: String,
    response: String,
    error: Option<&'static str>,
}

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    decode_frame(args.frame.as_bytes()).map_err(|err| frame_error("invalid frame", err))?;

    let mut driver = open(&args.device)?;
    let response = driver
        .send_raw(&args.frame)
        .map_err(|err| driver_error("send failed", err))?;
    driver.disconnect();

    let error = match decode_response(response.as_bytes()) {
        Ok(Response::Error(code)) => Some(code.name()),
        _ => None,
    };

    let mut rows = vec![
        ("command", args.frame.to_ascii_uppercase()),
        ("response", response.clone()),
    ];
    if let Some(error) = error {
        rows.push(("error", error.to_string()));
    }
    print_record(
        &Exchange {
            command: args.frame.to_ascii_uppercase(),
            response,
            error,
        },
        &rows,
        format,
    );

    Ok(if error.is_some() { FAILURE } else { SUCCESS })
}

pub(crate) fn open(device: &DeviceArgs) -> CliResult<Driver> {
    let timeout = parse_duration("timeout", &device.timeout)?;
    Driver::open_with_config(
        &device.host,
        device.port,
        DriverConfig::default().with_timeout(timeout),
    )
    .map_err(|err| driver_error("connect failed", err))
}
