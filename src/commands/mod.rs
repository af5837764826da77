//! Commands Module
//!
//! Device command synthesis, validation and per-device conflict resolution.

mod command;
mod conflict;
mod generator;
mod validator;

pub use command::{ActionSpec, CommandStatus, DeviceCommand, ParamValue, Parameters};
pub use conflict::{ConflictInfo, ConflictResolution, ConflictResolver, ConflictStrategy};
pub use generator::CommandGenerator;
pub use validator::{CommandValidator, ValidationResult};
