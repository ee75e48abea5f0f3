#![cfg(all(unix, feature = "cli"))]

use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};

use radiowave_frame::{FrameReader, FrameWriter};

fn radiowave() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_radiowave"));
    cmd.arg("--log-level").arg("error");
    cmd
}

#[test]
fn version_prints_package_version() {
    let output = radiowave().arg("version").output().expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("radiowave {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn call_against_serve_returns_transformed_payload() {
    let mut server = radiowave()
        .arg("--format")
        .arg("json")
        .arg("serve")
        .arg("127.0.0.1:0")
        .arg("--upper")
        .arg("--count")
        .arg("1")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("serve should start");

    let stdout = server.stdout.take().expect("serve stdout");
    let mut first_line = String::new();
    BufReader::new(stdout)
        .read_line(&mut first_line)
        .expect("listening line");
    let listening: serde_json::Value =
        serde_json::from_str(&first_line).expect("listening line should be json");
    assert_eq!(listening["event"], "listening");
    let addr = listening["addr"].as_str().expect("addr").to_string();

    let output = radiowave()
        .arg("--format")
        .arg("json")
        .arg("call")
        .arg(&addr)
        .arg("--data")
        .arg("hello radiowave")
        .output()
        .expect("call should run");

    assert!(output.status.success(), "{output:?}");
    let response: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("response should be json");
    assert_eq!(response["event"], "response");
    assert_eq!(response["payload"], "HELLO RADIOWAVE");
    assert_eq!(response["payload_size"], 15);

    let status = server.wait().expect("serve should exit after one connection");
    assert!(status.success());
}

#[test]
fn call_refused_connection_fails() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr")
    };

    let output = radiowave()
        .arg("call")
        .arg(addr.to_string())
        .arg("--data")
        .arg("x")
        .output()
        .expect("call should run");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("connect failed"), "{stderr}");
}

#[test]
fn exec_round_trips_through_stdio_echo_child() {
    let output = radiowave()
        .arg("--format")
        .arg("raw")
        .arg("exec")
        .arg("--data")
        .arg("ping")
        .arg("--")
        .arg(env!("CARGO_BIN_EXE_radiowave"))
        .arg("--log-level")
        .arg("error")
        .arg("stdio-echo")
        .arg("--upper")
        .output()
        .expect("exec should run");

    assert!(output.status.success(), "{output:?}");
    assert_eq!(output.stdout, b"PING");
}

#[test]
fn exec_missing_program_returns_127() {
    let output = radiowave()
        .arg("exec")
        .arg("--data")
        .arg("ping")
        .arg("--")
        .arg("/nonexistent/radiowave-child")
        .output()
        .expect("exec should run");

    assert_eq!(output.status.code(), Some(127));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("exec failed"), "{stderr}");
}

#[test]
fn stdio_echo_serves_frames_until_stdin_closes() {
    let mut child = radiowave()
        .arg("stdio-echo")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("stdio-echo should start");

    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    let mut writer = FrameWriter::new(stdin);
    let mut reader = FrameReader::new(stdout);

    for payload in [&b"first"[..], b"", &[0u8; 300][..]] {
        writer.send(payload).expect("send frame");
        let frame = reader.read_frame().expect("echoed frame");
        assert_eq!(frame.payload(), payload);
    }

    drop(writer);
    let status = child.wait().expect("stdio-echo should exit");
    assert!(status.success());
}
