//! Request/reply exchanges and protocol version negotiation.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use rtde_frame::{command_name, Command, Frame, FrameError, FrameReader, FrameWriter};
use rtde_transport::ReadTimeout;
use tracing::{debug, warn};

use crate::error::{Result, SessionError};
use crate::message::{self, encode_protocol_version, DecodedMessage};

/// Send `payload` under `command` and wait for the controller's reply to it.
pub(crate) fn request<R: Read + ReadTimeout, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    command: Command,
    payload: &[u8],
    timeout: Duration,
) -> Result<Frame> {
    writer.send(command.id(), payload)?;
    await_reply(reader, command, timeout)
}

/// Read frames until one for `expected` arrives.
///
/// Text messages that arrive in the meantime are logged; data packages and
/// replies to other commands are dropped.
pub(crate) fn await_reply<R: Read + ReadTimeout>(
    reader: &mut FrameReader<R>,
    expected: Command,
    timeout: Duration,
) -> Result<Frame> {
    let deadline = Instant::now() + timeout;
    loop {
        match reader.read_frame_until(deadline) {
            Ok(frame) if frame.command == expected.id() => return Ok(frame),
            Ok(frame) if frame.command == Command::TextMessage.id() => {
                match message::decode(frame.command, &frame.payload, None) {
                    Ok(DecodedMessage::Text(text)) => text.log(),
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "dropping malformed text message"),
                }
            }
            Ok(frame) => {
                debug!(
                    expected = expected.name(),
                    received = command_name(frame.command),
                    "dropping frame while waiting for reply"
                );
            }
            Err(err) if err.is_timeout() => return Err(SessionError::Timeout(timeout)),
            Err(FrameError::ConnectionClosed) => return Err(SessionError::PeerClosed),
            Err(err) => return Err(SessionError::Frame(err)),
        }
    }
}

/// Ask the controller to speak protocol `version`.
///
/// Every failure, including a missing reply or a closed connection, is
/// reported as `NegotiationFailed`.
pub fn negotiate_protocol<R: Read + ReadTimeout, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    version: u16,
    timeout: Duration,
) -> Result<()> {
    let reply = request(
        reader,
        writer,
        Command::RequestProtocolVersion,
        &encode_protocol_version(version),
        timeout,
    )
    .map_err(|err| SessionError::NegotiationFailed(err.to_string()))?;

    match message::decode(reply.command, &reply.payload, None) {
        Ok(DecodedMessage::ProtocolVersionAck { success: true }) => {
            debug!(version, "protocol version accepted");
            Ok(())
        }
        Ok(_) => Err(SessionError::NegotiationFailed(format!(
            "controller refused protocol version {version}"
        ))),
        Err(err) => Err(SessionError::NegotiationFailed(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, ErrorKind};
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    use bytes::BytesMut;
    use rtde_frame::encode_frame;

    use super::*;

    fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    fn scripted(frames: &[(u8, &[u8])]) -> FrameReader<Cursor<Vec<u8>>> {
        let mut wire = BytesMut::new();
        for (command, payload) in frames {
            encode_frame(*command, payload, &mut wire).unwrap();
        }
        FrameReader::new(Cursor::new(wire.to_vec()))
    }

    #[test]
    fn successful_negotiation() {
        let (client, server) = tcp_pair();

        let controller = thread::spawn(move || {
            let mut reader = FrameReader::new(server.try_clone().unwrap());
            let mut writer = FrameWriter::new(server);
            let frame = reader.read_frame().unwrap();
            writer.send(b'V', &[1]).unwrap();
            frame
        });

        let mut reader = FrameReader::new(client.try_clone().unwrap());
        let mut writer = FrameWriter::new(client);
        negotiate_protocol(&mut reader, &mut writer, 2, Duration::from_secs(1)).unwrap();

        let request = controller.join().unwrap();
        assert_eq!(request.command, b'V');
        assert_eq!(request.payload.as_ref(), &[0u8, 2]);
    }

    #[test]
    fn refused_version() {
        let mut reader = scripted(&[(b'V', &[0])]);
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let result = negotiate_protocol(&mut reader, &mut writer, 2, Duration::from_secs(1));
        assert!(matches!(result, Err(SessionError::NegotiationFailed(_))));
    }

    #[test]
    fn closed_before_reply() {
        let mut reader = scripted(&[]);
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let result = negotiate_protocol(&mut reader, &mut writer, 2, Duration::from_secs(1));
        assert!(matches!(result, Err(SessionError::NegotiationFailed(msg)) if msg.contains("closed")));
    }

    #[test]
    fn negotiation_timeout() {
        let mut reader = FrameReader::new(AlwaysTimedOutReader);
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let result = negotiate_protocol(&mut reader, &mut writer, 2, Duration::from_millis(25));
        assert!(matches!(result, Err(SessionError::NegotiationFailed(msg)) if msg.contains("timed out")));
    }

    #[test]
    fn reply_wait_skips_unrelated_frames() {
        let text = [2u8, b'h', b'i', 3, b'u', b'r', b'c', 3];
        let mut reader = scripted(&[(b'M', &text), (b'U', &[1, 0]), (b'P', &[1]), (b'S', &[1])]);
        let frame = await_reply(&mut reader, Command::Start, Duration::from_secs(1)).unwrap();
        assert_eq!(frame.payload.as_ref(), &[1u8]);
    }

    #[test]
    fn reply_wait_reports_timeout() {
        let mut reader = FrameReader::new(AlwaysTimedOutReader);
        let err = await_reply(&mut reader, Command::Pause, Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, SessionError::Timeout(_)));
        assert!(err.is_transport_failure());
    }

    struct AlwaysTimedOutReader;

    impl Read for AlwaysTimedOutReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            std::thread::sleep(Duration::from_millis(2));
            Err(std::io::Error::from(ErrorKind::TimedOut))
        }
    }

    impl ReadTimeout for AlwaysTimedOutReader {
        fn apply_read_timeout(&mut self, _timeout: Duration) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn reply_wait_is_bounded_by_the_timeout_not_the_socket() {
        let (client, _server) = tcp_pair();
        client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

        let mut reader = FrameReader::new(client);
        let started = Instant::now();
        let err = await_reply(&mut reader, Command::Start, Duration::from_millis(100)).unwrap_err();

        assert!(matches!(err, SessionError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_millis(1500));
    }

    #[test]
    fn reply_already_buffered_is_taken_after_the_timeout() {
        let mut reader = scripted(&[(b'P', &[1]), (b'S', &[1])]);
        reader.read_frame().unwrap();

        let frame = await_reply(&mut reader, Command::Start, Duration::ZERO).unwrap();
        assert_eq!(frame.command, b'S');
    }
}
