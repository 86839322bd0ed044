use semivibe::describe::explain;
use semivibe_frame::decode_frame;

use crate::cmd::DescribeArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{hex, print_record, OutputFormat};

pub fn run(args: DescribeArgs, format: OutputFormat) -> CliResult<i32> {
    let frame =
        decode_frame(args.frame.as_bytes()).map_err(|err| frame_error("invalid frame", err))?;
    let description = explain(&frame);

    let mut rows = vec![("frame", description.frame.clone())];
    if let Some(region) = description.region {
        rows.push(("region", region.to_string()));
    }
    if let Some(register) = description.register {
        rows.push(("register", register.to_string()));
    }
    if let Some(access) = description.access {
        rows.push(("access", access.short().to_string()));
    }
    if let Some(operation) = description.operation {
        rows.push(("operation", operation.to_string()));
    }
    if let Some(stored) = description.stored {
        rows.push(("data", hex(description.data)));
        rows.push(("stored", hex(stored)));
    }
    if !description.components.is_empty() {
        rows.push(("components", description.components.join(", ")));
    }
    if let Some(rejected) = description.rejected {
        rows.push(("rejected", rejected.to_string()));
    }
    rows.push(("summary", description.to_string()));

    print_record(&description, &rows, format);
    Ok(SUCCESS)
}
