use std::time::Instant;

use radiowave_frame::FrameConfig;
use radiowave_resource::{Conn, PayloadFactory, Resource, ResourceConfig};

use crate::cmd::{parse_duration, CallArgs};
use crate::exit::{resource_error, CliResult, SUCCESS};
use crate::output::{print_response, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let payload = args.payload.resolve()?;

    let mut config = ResourceConfig::default().with_frame_config(
        FrameConfig::default()
            .with_read_timeout(timeout)
            .with_write_timeout(timeout),
    );
    if let Some(label) = &args.label {
        config = config.with_label(label.as_str());
    }

    let conn: Conn<Vec<u8>, PayloadFactory> =
        Conn::dial_with_config(PayloadFactory, args.addr.as_str(), &config)
            .map_err(|err| resource_error("connect failed", err))?;
    let peer = conn.peer_addr().to_string();

    let started = Instant::now();
    let response = conn.call(payload);
    let elapsed_ms = started.elapsed().as_millis();

    let response = match response {
        Ok(response) => response,
        Err(err) => {
            let reason = conn.close_reason();
            conn.close();
            tracing::debug!(?reason, "connection closed before a response arrived");
            return Err(resource_error("call failed", err));
        }
    };
    conn.close();

    print_response(&response, &peer, elapsed_ms, format);
    Ok(SUCCESS)
}
