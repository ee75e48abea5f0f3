use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod exec;
pub mod serve;
pub mod stdio_echo;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve framed echo replies over TCP.
    Serve(ServeArgs),
    /// Dial a TCP peer, send one request and print the response.
    Call(CallArgs),
    /// Spawn a child process, send one request and print the response.
    Exec(ExecArgs),
    /// Echo frames from stdin to stdout; usable as a child-process peer.
    StdioEcho(StdioEchoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Call(args) => call::run(args, format),
        Command::Exec(args) => exec::run(args, format),
        Command::StdioEcho(args) => stdio_echo::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind (e.g. 127.0.0.1:7000, or port 0 for any free port).
    pub addr: String,
    /// Reply with the payload upper-cased.
    #[arg(long)]
    pub upper: bool,
    /// Exit after this many connections have been served.
    #[arg(long)]
    pub count: Option<usize>,
}

/// Request payload source shared by `call` and `exec`.
#[derive(Args, Debug)]
pub struct PayloadArgs {
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Address to connect to.
    pub addr: String,
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Socket read/write deadline (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Label used in log lines.
    #[arg(long)]
    pub label: Option<String>,
}

#[derive(Args, Debug)]
pub struct ExecArgs {
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Executable and arguments, after `--`.
    #[arg(required = true, last = true, num_args = 1..)]
    pub argv: Vec<String>,
}

#[derive(Args, Debug)]
pub struct StdioEchoArgs {
    /// Reply with the payload upper-cased.
    #[arg(long)]
    pub upper: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

impl PayloadArgs {
    pub fn resolve(&self) -> CliResult<Vec<u8>> {
        if let Some(data) = &self.data {
            return Ok(data.as_bytes().to_vec());
        }
        if let Some(path) = &self.file {
            return fs::read(path)
                .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
        }
        Ok(Vec::new())
    }
}

/// Echo transform shared by `serve` and `stdio-echo`.
pub fn echo_reply(payload: &[u8], upper: bool) -> Vec<u8> {
    if upper {
        payload.to_ascii_uppercase()
    } else {
        payload.to_vec()
    }
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}
