//! Client for the Real-Time Data Exchange (RTDE) interface of robot
//! controllers.
//!
//! A session connects to the controller over TCP, negotiates the protocol
//! version, registers output and input recipes, and then exchanges typed
//! records while synchronization is started.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP connection with connect and socket timeouts
//! - [`frame`]: length-prefixed, command-tagged framing and stream reassembly
//! - [`recipe`]: field type registry, recipes, records and recipe files
//! - [`session`]: the controller session state machine

/// Re-export transport types.
pub mod transport {
    pub use rtde_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use rtde_frame::*;
}

/// Re-export recipe types.
pub mod recipe {
    pub use rtde_recipe::*;
}

/// Re-export session types.
pub mod session {
    pub use rtde_session::*;
}

pub use rtde_recipe::{FieldType, FieldValue, Recipe, RecipeBook, Record};
pub use rtde_session::{
    connect, connect_with_config, ControllerVersion, Session, SessionConfig, SessionError,
    SessionState, Severity,
};
