use serde::Serialize;
use tracing::info;

use semivibe_peer::{DeviceServer, ServerConfig, ServerControl};

use crate::cmd::{parse_duration, ServeArgs};
use crate::exit::{server_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct Listening {
    event: &'static str,
    addr: String,
}

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let poll_interval = parse_duration("poll interval", &args.poll_interval)?;
    let config = ServerConfig::default().with_poll_interval(poll_interval);

    let server = DeviceServer::bind_with_config(args.bind.as_str(), config)
        .map_err(|err| server_error("bind failed", err))?;
    install_ctrlc_handler(server.control())?;

    let addr = server.local_addr().to_string();
    print_record(
        &Listening {
            event: "listening",
            addr: addr.clone(),
        },
        &[("listening", addr)],
        format,
    );

    server.run().map_err(|err| server_error("server failed", err))?;
    info!("server stopped");
    Ok(SUCCESS)
}

fn install_ctrlc_handler(control: ServerControl) -> CliResult<()> {
    ctrlc::set_handler(move || control.stop())
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
