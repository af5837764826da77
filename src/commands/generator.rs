//! Command Generator
//!
//! Turns a parsed action into a pending device command after checking the
//! target device against the registry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::command::{ActionSpec, DeviceCommand};
use crate::devices::DeviceRegistry;
use crate::error::CommandError;

pub struct CommandGenerator {
    registry: Option<Arc<dyn DeviceRegistry>>,
    next_id: AtomicU64,
}

impl CommandGenerator {
    pub fn new() -> Self {
        Self {
            registry: None,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_registry(mut self, registry: Arc<dyn DeviceRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn set_registry(&mut self, registry: Arc<dyn DeviceRegistry>) {
        self.registry = Some(registry);
    }

    pub fn has_registry(&self) -> bool {
        self.registry.is_some()
    }

    pub fn generate(&self, action: &ActionSpec, rule_id: Option<&str>) -> Result<DeviceCommand, CommandError> {
        let registry = self.registry.as_ref().ok_or(CommandError::NoRegistry)?;

        let device = registry
            .get_device(&action.device_id)
            .ok_or_else(|| CommandError::DeviceNotFound(action.device_id.clone()))?;
        if !device.is_actuator() {
            return Err(CommandError::NotActuator(action.device_id.clone()));
        }
        if !device.supports(&action.command) {
            warn!(
                "Device '{}' has no capability '{}'",
                action.device_id, action.command
            );
            return Err(CommandError::UnsupportedCommand {
                device_id: action.device_id.clone(),
                command: action.command.clone(),
            });
        }

        let command_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let command = DeviceCommand::new(
            command_id,
            action.device_id.clone(),
            action.command.clone(),
            action.parameters.clone(),
            rule_id.map(str::to_string),
        );
        debug!(
            "Generated command {} -> {}:{}",
            command_id, command.device_id, command.command_type
        );
        Ok(command)
    }
}

impl Default for CommandGenerator {
    fn default() -> Self {
        Self::new()
    }
}
