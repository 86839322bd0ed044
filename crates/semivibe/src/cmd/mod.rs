use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod describe;
pub mod send;
pub mod serve;
pub mod status;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the device server until interrupted.
    Serve(ServeArgs),
    /// Send one raw frame and print the response.
    Send(SendArgs),
    /// Print device status, sensor readings and actuator values.
    Status(StatusArgs),
    /// Explain a frame without touching the network.
    Describe(DescribeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Status(args) => status::run(args, format),
        Command::Describe(args) => describe::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8989")]
    pub bind: String,
    /// How often the server checks for a stop request (e.g. 100ms, 1s).
    #[arg(long, default_value = "100ms")]
    pub poll_interval: String,
}

/// Where to reach a running device.
#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// Device host.
    #[arg(long, default_value = semivibe_peer::DEFAULT_HOST)]
    pub host: String,
    /// Device port.
    #[arg(long, default_value_t = semivibe_transport::DEFAULT_PORT)]
    pub port: u16,
    /// Connect and response timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Six hex characters: region, offset (2), read/write flag, data (2).
    pub frame: String,
    #[command(flatten)]
    pub device: DeviceArgs,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
}

#[derive(Args, Debug)]
pub struct DescribeArgs {
    /// Six hex characters to explain.
    pub frame: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `150ms`, `5s` or a bare number of seconds.
pub fn parse_duration(what: &str, input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, format!("{what} must not be empty")));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid {what} value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, format!("{what} must be greater than zero")));
    }

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds() {
        assert_eq!(
            parse_duration("timeout", "5s").expect("5s should parse"),
            Duration::from_secs(5)
        );
        assert_eq!(
            parse_duration("timeout", "2").expect("bare number should parse"),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn parse_duration_millis() {
        assert_eq!(
            parse_duration("poll interval", "150ms").expect("150ms should parse"),
            Duration::from_millis(150)
        );
    }

    #[test]
    fn parse_duration_invalid() {
        let err = parse_duration("timeout", "0s").expect_err("zero should be rejected");
        assert_eq!(err.code, USAGE);
        assert!(parse_duration("timeout", "bad").is_err());
        assert!(parse_duration("timeout", " ").is_err());
    }
}
