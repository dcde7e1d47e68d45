#![cfg(all(unix, feature = "cli"))]

use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Command, Output};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rtde_frame::{Frame, FrameReader, FrameWriter};

fn rtde(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rtde"))
        .arg("--log-level")
        .arg("error")
        .args(args)
        .output()
        .expect("rtde should run")
}

fn unique_temp_file(tag: &str, content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "rtdecli-{tag}-{}-{}.json",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::write(&path, content).expect("temp file should be writable");
    path
}

fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should work");
    listener.local_addr().expect("local addr").port()
}

/// Simulated controller: accepts one client, answers the protocol request,
/// then runs `script`.
fn spawn_controller<F>(script: F) -> (u16, JoinHandle<()>)
where
    F: FnOnce(&mut FrameReader<TcpStream>, &mut FrameWriter<TcpStream>) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should work");
    let port = listener.local_addr().expect("local addr").port();

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("client should connect");
        let mut reader = FrameReader::new(stream.try_clone().expect("clone"));
        let mut writer = FrameWriter::new(stream);

        let negotiation = expect_frame(&mut reader, b'V');
        assert_eq!(negotiation.payload.as_ref(), &[0u8, 2]);
        writer.send(b'V', &[1]).expect("reply");

        script(&mut reader, &mut writer);
        while reader.read_frame().is_ok() {}
    });
    (port, handle)
}

fn expect_frame(reader: &mut FrameReader<TcpStream>, command: u8) -> Frame {
    let frame = reader.read_frame().expect("client frame");
    assert_eq!(
        frame.command, command,
        "expected command {:?}, got {:?}",
        command as char, frame.command as char
    );
    frame
}

#[test]
fn version_prints_package_version() {
    let output = rtde(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("rtde {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn extended_version_lists_protocol() {
    let output = rtde(&["version", "--extended"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("protocol_version: 2"));
    assert!(stdout.contains("minimum_controller: 3.2.19171"));
}

#[test]
fn missing_field_source_is_a_usage_error() {
    let output = rtde(&["stream", "127.0.0.1"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn refused_connection_exits_with_transport_error() {
    let port = closed_port().to_string();
    let output = rtde(&["info", "127.0.0.1", "--port", &port, "--timeout", "500ms"]);
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error: connect failed"));
}

#[test]
fn invalid_timeout_exits_with_usage() {
    let output = rtde(&["info", "127.0.0.1", "--timeout", "soon"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn missing_recipe_file_exits_with_data_invalid() {
    let output = rtde(&[
        "write",
        "127.0.0.1",
        "--recipes",
        "/nonexistent/rtde-recipes.json",
        "--key",
        "setp",
        "--set",
        "speed_slider_mask=1",
    ]);
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn unknown_recipe_key_exits_with_usage() {
    let recipes = unique_temp_file(
        "key",
        r#"{"recipes": [{"key": "out", "fields": [{"name": "timestamp", "type": "DOUBLE"}]}]}"#,
    );
    let output = rtde(&[
        "stream",
        "127.0.0.1",
        "--recipes",
        recipes.to_str().expect("utf-8 path"),
        "--key",
        "missing",
    ]);
    assert_eq!(output.status.code(), Some(64));
    let _ = std::fs::remove_file(&recipes);
}

#[test]
fn info_reports_controller_version() {
    let (port, controller) = spawn_controller(|reader, writer| {
        expect_frame(reader, b'v');
        let mut payload = Vec::new();
        for part in [5u32, 11, 0, 108249] {
            payload.extend_from_slice(&part.to_be_bytes());
        }
        writer.send(b'v', &payload).expect("reply");
    });

    let port = port.to_string();
    let output = rtde(&["--format", "json", "info", "127.0.0.1", "--port", &port]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("controller-info.schema.json"));
    assert!(stdout.contains("\"major\":5"));
    assert!(stdout.contains("\"supported\":true"));

    controller.join().expect("controller thread");
}

#[test]
fn stream_prints_requested_number_of_records() {
    let (port, controller) = spawn_controller(|reader, writer| {
        let setup = expect_frame(reader, b'O');
        assert_eq!(&setup.payload[8..], b"timestamp");
        writer.send(b'O', b"\x01DOUBLE").expect("reply");
        expect_frame(reader, b'S');
        writer.send(b'S', &[1]).expect("reply");

        for timestamp in [1.0f64, 2.0] {
            let mut package = vec![1u8];
            package.extend_from_slice(&timestamp.to_be_bytes());
            writer.send(b'U', &package).expect("package");
            thread::sleep(Duration::from_millis(100));
        }

        expect_frame(reader, b'P');
        writer.send(b'P', &[1]).expect("reply");
    });

    let port = port.to_string();
    let output = rtde(&[
        "--format",
        "json",
        "stream",
        "127.0.0.1",
        "--port",
        &port,
        "--fields",
        "timestamp",
        "--count",
        "2",
    ]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("\"fields\":{\"timestamp\":1.0}"));
    assert!(lines[1].contains("\"sequence\":2"));

    controller.join().expect("controller thread");
}

#[test]
fn write_sends_one_record() {
    let recipes = unique_temp_file(
        "write",
        r#"{"recipes": [{"key": "setp", "fields": [
            {"name": "input_int_register_0", "type": "INT32"},
            {"name": "input_double_register_0", "type": "DOUBLE"}
        ]}]}"#,
    );

    let (port, controller) = spawn_controller(|reader, writer| {
        let setup = expect_frame(reader, b'I');
        assert_eq!(
            setup.payload.as_ref(),
            b"input_int_register_0,input_double_register_0"
        );
        writer.send(b'I', b"\x02INT32,DOUBLE").expect("reply");
        expect_frame(reader, b'S');
        writer.send(b'S', &[1]).expect("reply");

        let data = expect_frame(reader, b'U');
        let mut expected = vec![2u8];
        expected.extend_from_slice(&(-7i32).to_be_bytes());
        expected.extend_from_slice(&0.0f64.to_be_bytes());
        assert_eq!(data.payload.as_ref(), expected.as_slice());

        expect_frame(reader, b'P');
        writer.send(b'P', &[1]).expect("reply");
    });

    let port = port.to_string();
    let output = rtde(&[
        "--format",
        "json",
        "write",
        "127.0.0.1",
        "--port",
        &port,
        "--recipes",
        recipes.to_str().expect("utf-8 path"),
        "--key",
        "setp",
        "--set",
        "input_int_register_0=-7",
    ]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"recipe_id\":2"));
    assert!(stdout.contains("\"input_int_register_0\":-7"));

    controller.join().expect("controller thread");
    let _ = std::fs::remove_file(&recipes);
}
