//! Command ids.
//!
//! Each frame carries a single command byte. The values are ASCII letters;
//! requests and their acknowledgements share the same id.

/// A command understood by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Protocol version negotiation, `V`.
    RequestProtocolVersion = b'V',
    /// Controller software version, `v`.
    GetControllerVersion = b'v',
    /// Free-form text message with a severity, `M`.
    TextMessage = b'M',
    /// Recipe-encoded data, `U`.
    DataPackage = b'U',
    /// Output recipe setup, `O`.
    SetupOutputs = b'O',
    /// Input recipe setup, `I`.
    SetupInputs = b'I',
    /// Start synchronization, `S`.
    Start = b'S',
    /// Pause synchronization, `P`.
    Pause = b'P',
}

impl Command {
    /// All known commands.
    pub const ALL: [Command; 8] = [
        Command::RequestProtocolVersion,
        Command::GetControllerVersion,
        Command::TextMessage,
        Command::DataPackage,
        Command::SetupOutputs,
        Command::SetupInputs,
        Command::Start,
        Command::Pause,
    ];

    /// Look up a command by its wire byte.
    pub fn from_u8(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.id() == id)
    }

    /// The wire byte of this command.
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            Command::RequestProtocolVersion => "REQUEST_PROTOCOL_VERSION",
            Command::GetControllerVersion => "GET_CONTROLLER_VERSION",
            Command::TextMessage => "TEXT_MESSAGE",
            Command::DataPackage => "DATA_PACKAGE",
            Command::SetupOutputs => "SETUP_OUTPUTS",
            Command::SetupInputs => "SETUP_INPUTS",
            Command::Start => "START",
            Command::Pause => "PAUSE",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns a human-readable name for a raw command byte.
pub fn command_name(id: u8) -> &'static str {
    Command::from_u8(id).map_or("UNKNOWN", Command::name)
}
