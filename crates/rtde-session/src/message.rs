//! Payload encoding and decoding for each command.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use rtde_frame::Command;
use rtde_recipe::{Recipe, RecipeError, Record};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{Result, SessionError};

/// Severity of a text message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Severity {
    Exception = 0,
    Error = 1,
    Warning = 2,
    Info = 3,
}

impl Severity {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Severity::Exception),
            1 => Some(Severity::Error),
            2 => Some(Severity::Warning),
            3 => Some(Severity::Info),
            _ => None,
        }
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn name(self) -> &'static str {
        match self {
            Severity::Exception => "exception",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A text message from the controller (or to it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextMessage {
    pub severity: Severity,
    pub source: String,
    pub text: String,
}

impl TextMessage {
    /// Emit the message as a log event at the level matching its severity.
    pub fn log(&self) {
        match self.severity {
            Severity::Exception | Severity::Error => {
                error!(source = %self.source, severity = %self.severity, "{}", self.text)
            }
            Severity::Warning => warn!(source = %self.source, "{}", self.text),
            Severity::Info => info!(source = %self.source, "{}", self.text),
        }
    }
}

/// Controller software version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ControllerVersion {
    pub major: u32,
    pub minor: u32,
    pub bugfix: u32,
    pub build: u32,
}

impl ControllerVersion {
    /// Oldest controller release with a compatible data interface.
    pub const MINIMUM: ControllerVersion = ControllerVersion {
        major: 3,
        minor: 2,
        bugfix: 19171,
        build: 0,
    };

    /// True when this version is at least [`ControllerVersion::MINIMUM`].
    /// The build number is not considered.
    pub fn meets_minimum(&self) -> bool {
        (self.major, self.minor, self.bugfix)
            >= (Self::MINIMUM.major, Self::MINIMUM.minor, Self::MINIMUM.bugfix)
    }
}

impl fmt::Display for ControllerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.bugfix, self.build
        )
    }
}

/// Answer to a recipe setup: the assigned id and the reported type names.
///
/// Type names are kept as sent so that `NOT_FOUND` and `IN_USE` markers can be
/// reported per field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeAck {
    pub id: u8,
    pub types: Vec<String>,
}

/// A decoded controller message.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedMessage {
    ProtocolVersionAck { success: bool },
    ControllerVersion(ControllerVersion),
    Text(TextMessage),
    OutputRecipeAck(RecipeAck),
    InputRecipeAck(RecipeAck),
    StartAck { success: bool },
    PauseAck { success: bool },
    Data(Record),
}

impl DecodedMessage {
    /// The command this message was decoded from.
    pub fn command(&self) -> Command {
        match self {
            DecodedMessage::ProtocolVersionAck { .. } => Command::RequestProtocolVersion,
            DecodedMessage::ControllerVersion(_) => Command::GetControllerVersion,
            DecodedMessage::Text(_) => Command::TextMessage,
            DecodedMessage::OutputRecipeAck(_) => Command::SetupOutputs,
            DecodedMessage::InputRecipeAck(_) => Command::SetupInputs,
            DecodedMessage::StartAck { .. } => Command::Start,
            DecodedMessage::PauseAck { .. } => Command::Pause,
            DecodedMessage::Data(_) => Command::DataPackage,
        }
    }
}

/// Decode a payload by command.
///
/// Data packages need the active output recipe; without one the result is
/// `NoOutputConfigured`, and a package for a different recipe id is
/// `UnknownRecipe`.
pub fn decode(command: u8, payload: &[u8], output: Option<&Recipe>) -> Result<DecodedMessage> {
    let command = Command::from_u8(command).ok_or(SessionError::UnknownCommand(command))?;
    let message = match command {
        Command::RequestProtocolVersion => DecodedMessage::ProtocolVersionAck {
            success: decode_success(command, payload)?,
        },
        Command::GetControllerVersion => {
            DecodedMessage::ControllerVersion(decode_controller_version(payload)?)
        }
        Command::TextMessage => DecodedMessage::Text(decode_text_message(payload)?),
        Command::SetupOutputs => DecodedMessage::OutputRecipeAck(decode_recipe_ack(payload)?),
        Command::SetupInputs => DecodedMessage::InputRecipeAck(decode_recipe_ack(payload)?),
        Command::Start => DecodedMessage::StartAck {
            success: decode_success(command, payload)?,
        },
        Command::Pause => DecodedMessage::PauseAck {
            success: decode_success(command, payload)?,
        },
        Command::DataPackage => {
            let recipe = output.ok_or(SessionError::NoOutputConfigured)?;
            DecodedMessage::Data(decode_data(payload, recipe)?)
        }
    };
    Ok(message)
}

/// Recipe id a data package is addressed to, if the payload has one.
pub fn data_recipe_id(payload: &[u8]) -> Option<u8> {
    payload.first().copied()
}

fn decode_success(command: Command, payload: &[u8]) -> Result<bool> {
    match payload {
        [flag] => Ok(*flag != 0),
        _ => Err(SessionError::MalformedPayload(format!(
            "{command} ack must be 1 byte, got {}",
            payload.len()
        ))),
    }
}

fn decode_controller_version(mut payload: &[u8]) -> Result<ControllerVersion> {
    if payload.len() != 16 {
        return Err(SessionError::MalformedPayload(format!(
            "controller version must be 16 bytes, got {}",
            payload.len()
        )));
    }
    Ok(ControllerVersion {
        major: payload.get_u32(),
        minor: payload.get_u32(),
        bugfix: payload.get_u32(),
        build: payload.get_u32(),
    })
}

fn decode_text_message(mut payload: &[u8]) -> Result<TextMessage> {
    let text = take_short_string(&mut payload, "message")?;
    let source = take_short_string(&mut payload, "source")?;
    let severity = match payload {
        [level] => Severity::from_u8(*level).ok_or_else(|| {
            SessionError::MalformedPayload(format!("unknown text message severity {level}"))
        })?,
        _ => {
            return Err(SessionError::MalformedPayload(format!(
                "text message must end with one severity byte, {} bytes left",
                payload.len()
            )))
        }
    };
    Ok(TextMessage {
        severity,
        source,
        text,
    })
}

fn take_short_string(payload: &mut &[u8], what: &str) -> Result<String> {
    let len = match payload.first() {
        Some(len) => usize::from(*len),
        None => {
            return Err(SessionError::MalformedPayload(format!(
                "text message is missing the {what} length"
            )))
        }
    };
    if payload.len() < 1 + len {
        return Err(SessionError::MalformedPayload(format!(
            "text message {what} needs {len} bytes, {} left",
            payload.len() - 1
        )));
    }
    let text = String::from_utf8_lossy(&payload[1..1 + len]).into_owned();
    payload.advance(1 + len);
    Ok(text)
}

fn decode_recipe_ack(payload: &[u8]) -> Result<RecipeAck> {
    let (id, names) = payload
        .split_first()
        .ok_or_else(|| SessionError::MalformedPayload("empty recipe setup ack".to_string()))?;
    let names = std::str::from_utf8(names).map_err(|err| {
        SessionError::MalformedPayload(format!("recipe setup ack is not UTF-8: {err}"))
    })?;
    let types = if names.is_empty() {
        Vec::new()
    } else {
        names.split(',').map(str::to_string).collect()
    };
    Ok(RecipeAck { id: *id, types })
}

fn decode_data(payload: &[u8], recipe: &Recipe) -> Result<Record> {
    let (id, data) = payload
        .split_first()
        .ok_or_else(|| SessionError::MalformedPayload("empty data package".to_string()))?;
    if *id != recipe.id() {
        return Err(SessionError::UnknownRecipe(*id));
    }
    recipe.unpack(data).map_err(SessionError::from_unpack)
}

/// Payload of a protocol version request.
pub fn encode_protocol_version(version: u16) -> [u8; 2] {
    version.to_be_bytes()
}

/// Payload of an output setup request: frequency, then comma-joined names.
pub fn encode_output_setup<S: AsRef<str>>(frequency: f64, names: &[S]) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_f64(frequency);
    put_names(&mut buf, names);
    buf.freeze()
}

/// Payload of an input setup request: comma-joined names.
pub fn encode_input_setup<S: AsRef<str>>(names: &[S]) -> Bytes {
    let mut buf = BytesMut::new();
    put_names(&mut buf, names);
    buf.freeze()
}

fn put_names<S: AsRef<str>>(buf: &mut BytesMut, names: &[S]) {
    for (index, name) in names.iter().enumerate() {
        if index > 0 {
            buf.put_u8(b',');
        }
        buf.put_slice(name.as_ref().as_bytes());
    }
}

/// Payload of a text message.
pub fn encode_text_message(message: &TextMessage) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(3 + message.text.len() + message.source.len());
    put_short_string(&mut buf, "message", &message.text)?;
    put_short_string(&mut buf, "source", &message.source)?;
    buf.put_u8(message.severity.as_u8());
    Ok(buf.freeze())
}

fn put_short_string(buf: &mut BytesMut, field: &str, value: &str) -> Result<()> {
    let len = u8::try_from(value.len()).map_err(|_| RecipeError::StringTooLong {
        field: field.to_string(),
        len: value.len(),
    })?;
    buf.put_u8(len);
    buf.put_slice(value.as_bytes());
    Ok(())
}

/// Payload of a data package: recipe id, then the packed record.
pub fn encode_data(recipe: &Recipe, record: &Record) -> Result<Bytes> {
    let packed = recipe.pack(record)?;
    let mut buf = BytesMut::with_capacity(1 + packed.len());
    buf.put_u8(recipe.id());
    buf.put_slice(&packed);
    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use rtde_recipe::FieldValue;

    use super::*;

    fn joint_recipe() -> Recipe {
        Recipe::from_names(1, &["actual_q"], &["VECTOR6D"]).unwrap()
    }

    #[test]
    fn boolean_acks() {
        assert_eq!(
            decode(b'V', &[1], None).unwrap(),
            DecodedMessage::ProtocolVersionAck { success: true }
        );
        assert_eq!(
            decode(b'S', &[0], None).unwrap(),
            DecodedMessage::StartAck { success: false }
        );
        assert_eq!(
            decode(b'P', &[1], None).unwrap(),
            DecodedMessage::PauseAck { success: true }
        );
    }

    #[test]
    fn boolean_ack_with_wrong_size_is_malformed() {
        assert!(matches!(
            decode(b'S', &[], None).unwrap_err(),
            SessionError::MalformedPayload(_)
        ));
        assert!(matches!(
            decode(b'V', &[1, 0], None).unwrap_err(),
            SessionError::MalformedPayload(_)
        ));
    }

    #[test]
    fn controller_version() {
        let mut payload = Vec::new();
        for part in [5u32, 11, 3, 108_000] {
            payload.extend_from_slice(&part.to_be_bytes());
        }
        let message = decode(b'v', &payload, None).unwrap();
        let version = match message {
            DecodedMessage::ControllerVersion(version) => version,
            other => panic!("expected controller version, got {other:?}"),
        };
        assert_eq!(version.to_string(), "5.11.3.108000");
        assert!(version.meets_minimum());

        assert!(matches!(
            decode(b'v', &payload[..12], None).unwrap_err(),
            SessionError::MalformedPayload(_)
        ));
    }

    #[test]
    fn minimum_version_comparison() {
        let old = ControllerVersion {
            major: 3,
            minor: 2,
            bugfix: 19170,
            build: 999,
        };
        assert!(!old.meets_minimum());
        assert!(ControllerVersion::MINIMUM.meets_minimum());
        let newer_minor = ControllerVersion {
            major: 3,
            minor: 3,
            bugfix: 0,
            build: 0,
        };
        assert!(newer_minor.meets_minimum());
    }

    #[test]
    fn text_message_round_trip() {
        let message = TextMessage {
            severity: Severity::Warning,
            source: "RTDE".to_string(),
            text: "Protective stop".to_string(),
        };
        let payload = encode_text_message(&message).unwrap();
        assert_eq!(payload[0], 15);
        assert_eq!(
            decode(b'M', &payload, None).unwrap(),
            DecodedMessage::Text(message)
        );
    }

    #[test]
    fn truncated_text_message_is_malformed() {
        let payload = [5u8, b'a', b'b'];
        assert!(matches!(
            decode(b'M', &payload, None).unwrap_err(),
            SessionError::MalformedPayload(_)
        ));
    }

    #[test]
    fn oversized_text_message_is_rejected() {
        let message = TextMessage {
            severity: Severity::Info,
            source: "client".to_string(),
            text: "x".repeat(300),
        };
        assert!(matches!(
            encode_text_message(&message).unwrap_err(),
            SessionError::Recipe(RecipeError::StringTooLong { len: 300, .. })
        ));
    }

    #[test]
    fn recipe_acks() {
        let ack = decode(b'O', b"\x01DOUBLE,VECTOR6D", None).unwrap();
        assert_eq!(
            ack,
            DecodedMessage::OutputRecipeAck(RecipeAck {
                id: 1,
                types: vec!["DOUBLE".to_string(), "VECTOR6D".to_string()],
            })
        );

        let ack = decode(b'I', b"\x02IN_USE", None).unwrap();
        assert_eq!(ack.command(), Command::SetupInputs);

        assert!(matches!(
            decode(b'O', &[], None).unwrap_err(),
            SessionError::MalformedPayload(_)
        ));
    }

    #[test]
    fn data_needs_output_recipe() {
        let err = decode(b'U', &[1], None).unwrap_err();
        assert!(matches!(err, SessionError::NoOutputConfigured));
    }

    #[test]
    fn data_is_unpacked_with_output_recipe() {
        let recipe = joint_recipe();
        let mut payload = vec![1u8];
        for value in [0.0f64, -1.57, 1.57, 0.0, 1.57, 0.0] {
            payload.extend_from_slice(&value.to_be_bytes());
        }

        let message = decode(b'U', &payload, Some(&recipe)).unwrap();
        let record = match message {
            DecodedMessage::Data(record) => record,
            other => panic!("expected data, got {other:?}"),
        };
        assert_eq!(
            record.get("actual_q"),
            Some(&FieldValue::Vector6d([0.0, -1.57, 1.57, 0.0, 1.57, 0.0]))
        );
    }

    #[test]
    fn data_for_other_recipe_is_unknown() {
        let recipe = joint_recipe();
        let mut payload = vec![7u8];
        payload.extend_from_slice(&[0u8; 48]);
        assert!(matches!(
            decode(b'U', &payload, Some(&recipe)).unwrap_err(),
            SessionError::UnknownRecipe(7)
        ));
    }

    #[test]
    fn short_data_is_malformed() {
        let recipe = joint_recipe();
        let mut payload = vec![1u8];
        payload.extend_from_slice(&[0u8; 47]);
        assert!(matches!(
            decode(b'U', &payload, Some(&recipe)).unwrap_err(),
            SessionError::MalformedPayload(_)
        ));
    }

    #[test]
    fn unknown_command_byte() {
        assert!(matches!(
            decode(b'X', &[], None).unwrap_err(),
            SessionError::UnknownCommand(b'X')
        ));
    }

    #[test]
    fn output_setup_payload() {
        let payload = encode_output_setup(125.0, &["timestamp", "actual_q"]);
        assert_eq!(&payload[..8], &125.0f64.to_be_bytes());
        assert_eq!(&payload[8..], b"timestamp,actual_q");
        assert_eq!(encode_input_setup(&["a"]).as_ref(), b"a");
    }

    #[test]
    fn data_payload_is_prefixed_with_recipe_id() {
        let recipe = Recipe::from_names(3, &["input_int_register_0"], &["INT32"]).unwrap();
        let mut record = recipe.empty_record();
        record.set("input_int_register_0", -2i32).unwrap();
        let payload = encode_data(&recipe, &record).unwrap();
        assert_eq!(payload.as_ref(), &[3u8, 0xff, 0xff, 0xff, 0xfe]);
    }
}
