use std::time::Instant;

use radiowave_resource::{PayloadFactory, Process, Resource};

use crate::cmd::ExecArgs;
use crate::exit::{resource_error, CliResult, SUCCESS};
use crate::output::{print_response, OutputFormat};

pub fn run(args: ExecArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = args.payload.resolve()?;

    let process: Process<Vec<u8>, PayloadFactory> =
        Process::exec(PayloadFactory, &args.argv).map_err(|err| resource_error("exec failed", err))?;
    let peer = format!("pid:{}", process.id());

    let started = Instant::now();
    let response = process.call(payload);
    let elapsed_ms = started.elapsed().as_millis();
    let reason = process.close_reason();
    process.close();

    let response = response.map_err(|err| {
        tracing::debug!(?reason, status = ?process.exit_status(), "child closed before responding");
        resource_error("call failed", err)
    })?;

    print_response(&response, &peer, elapsed_ms, format);
    Ok(SUCCESS)
}
