use bytes::Bytes;
use radiowave_resource::{File, PayloadFactory, Resource, ResourceConfig};

use crate::cmd::{echo_reply, StdioEchoArgs};
use crate::exit::{resource_error, CliResult, SUCCESS};

/// Serve framed echo replies over this process's own stdin and stdout.
///
/// Runs until stdin reaches EOF, which is how a parent closing the pipe
/// ends the session.
pub fn run(args: StdioEchoArgs) -> CliResult<i32> {
    let file: File<Bytes, PayloadFactory> = File::with_config(
        PayloadFactory,
        std::io::stdin(),
        std::io::stdout(),
        || -> std::io::Result<()> { Ok(()) },
        &ResourceConfig::default().with_label("stdio"),
    )
    .map_err(|err| resource_error("stdio setup failed", err))?;

    let mut served = 0usize;
    while let Ok(payload) = file.read() {
        if file.write(Bytes::from(echo_reply(&payload, args.upper))).is_err() {
            break;
        }
        served += 1;
    }

    tracing::debug!(served, reason = ?file.close_reason(), "stdin closed");
    file.close();
    Ok(SUCCESS)
}
