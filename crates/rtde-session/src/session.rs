use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::time::Instant;

use rtde_frame::{command_name, Command, Frame, FrameError, FrameReader, FrameWriter};
use rtde_recipe::{FieldType, Recipe, Record};
use rtde_transport::{ReadTimeout, RtdeStream, ShutdownHandle};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::handshake::{negotiate_protocol, request};
use crate::message::{
    self, data_recipe_id, encode_data, encode_input_setup, encode_output_setup,
    encode_text_message, ControllerVersion, DecodedMessage, RecipeAck, Severity, TextMessage,
};

/// Marker the controller returns for a field it does not know.
const NOT_FOUND: &str = "NOT_FOUND";
/// Marker the controller returns for an input field claimed by another client.
const IN_USE: &str = "IN_USE";

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Disconnected,
    Connected,
    Started,
    Paused,
}

impl SessionState {
    pub const fn name(self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connected => "connected",
            SessionState::Started => "started",
            SessionState::Paused => "paused",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

struct Link<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    closer: Option<ShutdownHandle>,
}

impl<R, W> Link<R, W> {
    fn close(self) {
        if let Some(closer) = self.closer {
            if let Err(err) = closer.shutdown() {
                debug!(error = %err, "socket shutdown failed");
            }
        }
    }
}

/// A client session with one controller.
///
/// The session owns the connection and the negotiated recipes. Operations
/// take `&mut self` and block for at most the configured timeout. A failure
/// of the connection itself (timeout, closed by the controller, socket error)
/// drops the connection and leaves the session `Disconnected` with no
/// recipes; every other error leaves the state unchanged.
///
/// `Session` without type parameters is a TCP session created with
/// [`Session::new`] and opened with [`Session::connect`]. Any other pair of
/// streams can be driven with [`Session::attach`].
pub struct Session<R = RtdeStream, W = RtdeStream> {
    config: SessionConfig,
    link: Option<Link<R, W>>,
    state: SessionState,
    output: Option<Recipe>,
    inputs: HashMap<u8, Recipe>,
}

impl Session {
    /// Create a disconnected TCP session.
    pub fn new(config: SessionConfig) -> Self {
        Self::detached(config)
    }

    /// Open a TCP connection to `host:port` and negotiate the protocol version.
    ///
    /// Connecting a session that is already connected does nothing.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        if self.link.is_some() {
            debug!(host, port, "already connected");
            return Ok(());
        }

        let stream = rtde_transport::connect(host, port, &self.config.transport)?;
        let reader = stream.try_clone()?;
        let closer = stream.shutdown_handle()?;
        self.open(reader, stream, Some(closer))
    }

    /// Handle that closes the connection from another thread.
    ///
    /// A `receive` blocked on the socket then returns as if the controller had
    /// closed the connection.
    pub fn shutdown_handle(&self) -> Result<ShutdownHandle> {
        let link = self.link.as_ref().ok_or(SessionError::NotConnected)?;
        Ok(link.writer.get_ref().shutdown_handle()?)
    }
}

impl<R: Read + ReadTimeout, W: Write> Session<R, W> {
    /// Negotiate the protocol over an already connected pair of streams.
    ///
    /// Reads are bounded by the session timeout through [`ReadTimeout`]; a
    /// write timeout, if wanted, must already be set on `writer`.
    pub fn attach(reader: R, writer: W, config: SessionConfig) -> Result<Self> {
        let mut session = Self::detached(config);
        session.open(reader, writer, None)?;
        Ok(session)
    }

    fn detached(config: SessionConfig) -> Self {
        Self {
            config,
            link: None,
            state: SessionState::Disconnected,
            output: None,
            inputs: HashMap::new(),
        }
    }

    fn open(&mut self, reader: R, writer: W, closer: Option<ShutdownHandle>) -> Result<()> {
        let mut link = Link {
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
            closer,
        };

        if let Err(err) = negotiate_protocol(
            &mut link.reader,
            &mut link.writer,
            self.config.protocol_version,
            self.config.timeout,
        ) {
            link.close();
            return Err(err);
        }

        self.link = Some(link);
        self.state = SessionState::Connected;
        self.output = None;
        self.inputs.clear();
        info!(version = self.config.protocol_version, "session connected");
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state != SessionState::Disconnected
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The active output recipe, if one has been set up.
    pub fn output_recipe(&self) -> Option<&Recipe> {
        self.output.as_ref()
    }

    /// A registered input recipe by id.
    pub fn input_recipe(&self, id: u8) -> Option<&Recipe> {
        self.inputs.get(&id)
    }

    /// Ask the controller for its software version.
    ///
    /// Returns `None` when no reply arrives in time; the session is then
    /// disconnected. Versions older than [`ControllerVersion::MINIMUM`] are
    /// reported with a warning.
    pub fn get_controller_version(&mut self) -> Result<Option<ControllerVersion>> {
        let reply = match self.request(Command::GetControllerVersion, &[]) {
            Ok(reply) => reply,
            Err(SessionError::Timeout(timeout)) => {
                warn!(?timeout, "no controller version reply");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        match message::decode(reply.command, &reply.payload, None)? {
            DecodedMessage::ControllerVersion(version) => {
                info!(%version, "controller version");
                if !version.meets_minimum() {
                    warn!(
                        %version,
                        minimum = %ControllerVersion::MINIMUM,
                        "controller is older than the minimum supported version"
                    );
                }
                Ok(Some(version))
            }
            other => Err(unexpected_reply(Command::GetControllerVersion, &other)),
        }
    }

    /// Subscribe to `fields` at `frequency` Hz.
    ///
    /// When `expected` is given, the types reported by the controller must
    /// match it exactly. On success the recipe replaces any previous output
    /// recipe.
    pub fn setup_output_recipe<S: AsRef<str>>(
        &mut self,
        fields: &[S],
        expected: Option<&[FieldType]>,
        frequency: f64,
    ) -> Result<&Recipe> {
        let payload = encode_output_setup(frequency, fields);
        let reply = self.request(Command::SetupOutputs, &payload)?;
        let ack = match message::decode(reply.command, &reply.payload, None)? {
            DecodedMessage::OutputRecipeAck(ack) => ack,
            other => return Err(unexpected_reply(Command::SetupOutputs, &other)),
        };

        let recipe = build_recipe(fields, ack, expected)?;
        info!(
            id = recipe.id(),
            fields = recipe.len(),
            frequency,
            "output recipe configured"
        );
        Ok(self.output.insert(recipe))
    }

    /// Register `fields` as inputs and return an empty record for them.
    ///
    /// The record has every field at its zero value and is bound to the
    /// recipe id the controller assigned.
    pub fn setup_input_recipe<S: AsRef<str>>(
        &mut self,
        fields: &[S],
        expected: Option<&[FieldType]>,
    ) -> Result<Record> {
        let payload = encode_input_setup(fields);
        let reply = self.request(Command::SetupInputs, &payload)?;
        let ack = match message::decode(reply.command, &reply.payload, None)? {
            DecodedMessage::InputRecipeAck(ack) => ack,
            other => return Err(unexpected_reply(Command::SetupInputs, &other)),
        };

        let recipe = build_recipe(fields, ack, expected)?;
        let record = recipe.empty_record();
        info!(id = recipe.id(), fields = recipe.len(), "input recipe configured");
        self.inputs.insert(recipe.id(), recipe);
        Ok(record)
    }

    /// Start data synchronization. Valid when connected or paused.
    pub fn start(&mut self) -> Result<()> {
        if !matches!(self.state, SessionState::Connected | SessionState::Paused) {
            return Err(SessionError::InvalidState {
                operation: "start",
                state: self.state,
            });
        }
        self.control(Command::Start)?;
        self.state = SessionState::Started;
        info!("synchronization started");
        Ok(())
    }

    /// Pause data synchronization. Valid only when started.
    pub fn pause(&mut self) -> Result<()> {
        if self.state != SessionState::Started {
            return Err(SessionError::InvalidState {
                operation: "pause",
                state: self.state,
            });
        }
        self.control(Command::Pause)?;
        self.state = SessionState::Paused;
        info!("synchronization paused");
        Ok(())
    }

    /// Send an input record. No reply is awaited.
    pub fn send(&mut self, record: &Record) -> Result<()> {
        self.require_started()?;
        let recipe = self
            .inputs
            .get(&record.recipe_id())
            .ok_or(SessionError::UnknownRecipe(record.recipe_id()))?;
        let payload = encode_data(recipe, record)?;
        self.write(Command::DataPackage, &payload)
    }

    /// Wait for the next record of the output recipe.
    ///
    /// Other messages are handled on the way: text messages are logged,
    /// everything else is dropped. When several data packages are already
    /// buffered, only the newest one that decodes is returned. Returns `None`
    /// when no data arrives in time or the controller closes the connection;
    /// the session is then disconnected.
    pub fn receive(&mut self) -> Result<Option<Record>> {
        self.require_started()?;
        let output_id = self
            .output
            .as_ref()
            .map(Recipe::id)
            .ok_or(SessionError::NoOutputConfigured)?;

        let deadline = Instant::now() + self.config.timeout;
        loop {
            let link = self.link.as_mut().ok_or(SessionError::NotConnected)?;
            let frame = match link.reader.read_frame_until(deadline) {
                Ok(frame) => frame,
                Err(err) if err.is_timeout() => {
                    warn!(timeout = ?self.config.timeout, "no data received");
                    self.drop_link("receive timed out");
                    return Ok(None);
                }
                Err(FrameError::ConnectionClosed) => {
                    self.drop_link("connection closed by controller");
                    return Ok(None);
                }
                Err(err) => {
                    self.drop_link("read failed");
                    return Err(err.into());
                }
            };

            if frame.command != Command::DataPackage.id() {
                self.handle_unsolicited(&frame);
                continue;
            }
            if data_recipe_id(&frame.payload) != Some(output_id) {
                debug!(
                    recipe_id = data_recipe_id(&frame.payload),
                    "skipping package for another recipe"
                );
                continue;
            }
            let output = self.output.as_ref();
            if link.reader.pending().any(|newer| {
                newer.command == Command::DataPackage.id()
                    && matches!(
                        message::decode(newer.command, &newer.payload, output),
                        Ok(DecodedMessage::Data(_))
                    )
            }) {
                debug!("skipping package superseded by a newer one");
                continue;
            }

            return match message::decode(frame.command, &frame.payload, self.output.as_ref())? {
                DecodedMessage::Data(record) => Ok(Some(record)),
                other => Err(unexpected_reply(Command::DataPackage, &other)),
            };
        }
    }

    /// Send a text message to the controller log. No reply is awaited.
    pub fn send_message(&mut self, text: &str, source: &str, severity: Severity) -> Result<()> {
        let payload = encode_text_message(&TextMessage {
            severity,
            source: source.to_string(),
            text: text.to_string(),
        })?;
        self.write(Command::TextMessage, &payload)
    }

    /// Close the connection.
    ///
    /// A started session is paused first, best effort. The recipes are
    /// forgotten. Disconnecting a disconnected session does nothing.
    pub fn disconnect(&mut self) {
        if self.link.is_none() {
            self.state = SessionState::Disconnected;
            return;
        }
        if self.state == SessionState::Started {
            if let Err(err) = self.control(Command::Pause) {
                debug!(error = %err, "pause before disconnect failed");
            }
        }
        self.drop_link("disconnect requested");
    }

    fn require_started(&self) -> Result<()> {
        if self.state == SessionState::Started {
            Ok(())
        } else {
            Err(SessionError::NotStarted)
        }
    }

    fn control(&mut self, command: Command) -> Result<()> {
        let reply = self.request(command, &[])?;
        let success = match message::decode(reply.command, &reply.payload, None)? {
            DecodedMessage::StartAck { success } | DecodedMessage::PauseAck { success } => success,
            other => return Err(unexpected_reply(command, &other)),
        };
        if success {
            Ok(())
        } else {
            Err(SessionError::Rejected(command))
        }
    }

    fn request(&mut self, command: Command, payload: &[u8]) -> Result<Frame> {
        let timeout = self.config.timeout;
        let link = self.link.as_mut().ok_or(SessionError::NotConnected)?;
        let result = request(&mut link.reader, &mut link.writer, command, payload, timeout);
        self.check(result)
    }

    fn write(&mut self, command: Command, payload: &[u8]) -> Result<()> {
        let link = self.link.as_mut().ok_or(SessionError::NotConnected)?;
        let result = link.writer.send(command.id(), payload).map_err(SessionError::from);
        self.check(result)
    }

    fn check<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if err.is_transport_failure() {
                self.drop_link(&err.to_string());
            }
        }
        result
    }

    fn handle_unsolicited(&self, frame: &Frame) {
        match message::decode(frame.command, &frame.payload, None) {
            Ok(DecodedMessage::Text(text)) => text.log(),
            Ok(other) => debug!(command = %other.command(), "ignoring unsolicited reply"),
            Err(err) => warn!(
                command = command_name(frame.command),
                error = %err,
                "ignoring undecodable frame"
            ),
        }
    }

    fn drop_link(&mut self, reason: &str) {
        if let Some(link) = self.link.take() {
            link.close();
            info!(reason, "session disconnected");
        }
        self.state = SessionState::Disconnected;
        self.output = None;
        self.inputs.clear();
    }
}

impl<R, W> Drop for Session<R, W> {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            link.close();
        }
    }
}

impl<R, W> fmt::Debug for Session<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("output", &self.output.as_ref().map(Recipe::id))
            .field("inputs", &self.inputs.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn build_recipe<S: AsRef<str>>(
    fields: &[S],
    ack: RecipeAck,
    expected: Option<&[FieldType]>,
) -> Result<Recipe> {
    let marked = |marker: &str| {
        fields
            .iter()
            .zip(&ack.types)
            .filter(|(_, ty)| ty.as_str() == marker)
            .map(|(name, _)| name.as_ref())
            .collect::<Vec<_>>()
            .join(",")
    };
    if ack.types.iter().any(|ty| ty == NOT_FOUND) {
        return Err(SessionError::UnknownField(marked(NOT_FOUND)));
    }
    if ack.types.iter().any(|ty| ty == IN_USE) {
        return Err(SessionError::FieldInUse(marked(IN_USE)));
    }

    let recipe = Recipe::from_names(ack.id, fields, &ack.types)?;
    if let Some(expected) = expected {
        let actual: Vec<FieldType> = recipe.field_types().collect();
        if actual != expected {
            return Err(SessionError::RecipeTypeMismatch {
                expected: expected.to_vec(),
                actual,
            });
        }
    }
    Ok(recipe)
}

fn unexpected_reply(command: Command, reply: &DecodedMessage) -> SessionError {
    SessionError::MalformedPayload(format!(
        "expected {command} reply, got {}",
        reply.command()
    ))
}
