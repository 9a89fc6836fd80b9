//! Message type codes.
//!
//! Codes `1..=9` are reserved for control messages exchanged by the agent and
//! the server themselves.  Codes from [`FIRST_PLUGIN_TYPE`] upward belong to
//! plugins, one unique code per plugin.  The codec never looks inside a
//! payload based on its type; these codes only matter to the transport and to
//! whoever dispatches decoded messages.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::BacklogConfig;

/// Lowest code a plugin may claim.
pub const FIRST_PLUGIN_TYPE: u8 = 10;

// ── Control messages ──────────────────────────────────────────────────────────

/// Reserved control message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ControlType {
    /// Acknowledges a received data message.
    Ack = 1,
    /// Liveness probe; the peer must answer with [`ControlType::PingAck`].
    Ping = 2,
    /// Answer to a [`ControlType::Ping`], sent without application delay.
    PingAck = 3,
    /// The receiver's queue is full: stop sending data messages.
    MessageQueueLimit = 4,
    /// The receiver's queue has room again: resume sending.
    MessageQueueReady = 5,
}

impl TryFrom<u8> for ControlType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ControlType::Ack),
            2 => Ok(ControlType::Ping),
            3 => Ok(ControlType::PingAck),
            4 => Ok(ControlType::MessageQueueLimit),
            5 => Ok(ControlType::MessageQueueReady),
            _ => Err(()),
        }
    }
}

impl ControlType {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            ControlType::Ack => "ACK",
            ControlType::Ping => "PING",
            ControlType::PingAck => "PING_ACK",
            ControlType::MessageQueueLimit => "MESSAGE_QUEUE_LIMIT",
            ControlType::MessageQueueReady => "MESSAGE_QUEUE_READY",
        }
    }

    /// The control message expected in reply, if any.
    pub fn reply(self) -> Option<ControlType> {
        match self {
            ControlType::Ping => Some(ControlType::PingAck),
            _ => None,
        }
    }
}

/// Codes assigned to the plugins shipped with backlog deployments.
pub mod plugin_types {
    pub const BACKLOG_STATUS: u8 = 10;
    pub const CORESTATION_STATUS: u8 = 11;
    pub const SYSLOG_NG: u8 = 12;
    pub const TOS: u8 = 20;
    pub const TOS1X: u8 = 21;
    pub const BINARY: u8 = 30;
    pub const VAISALA_WXT520: u8 = 40;
    pub const SCHEDULE: u8 = 50;
    pub const GPS: u8 = 60;
    pub const OZ47: u8 = 70;
    pub const ECVQEK3: u8 = 71;
    pub const POWERMANAGER: u8 = 72;

    /// Name and code of every shipped plugin.
    pub const ALL: [(&str, u8); 12] = [
        ("BackLogStatus", BACKLOG_STATUS),
        ("CoreStationStatus", CORESTATION_STATUS),
        ("SyslogNg", SYSLOG_NG),
        ("TOS", TOS),
        ("TOS1x", TOS1X),
        ("Binary", BINARY),
        ("VaisalaWXT520", VAISALA_WXT520),
        ("Schedule", SCHEDULE),
        ("GPS", GPS),
        ("OZ47", OZ47),
        ("ECVQEK3", ECVQEK3),
        ("PowerManager", POWERMANAGER),
    ];
}

// ── Classification ────────────────────────────────────────────────────────────

/// What a type code means to the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// Code 0, never assigned.
    Unassigned,
    Control(ControlType),
    /// Inside the reserved range but without a defined meaning (6..=9).
    Reserved(u8),
    Plugin(u8),
}

impl MessageKind {
    pub fn classify(code: u8) -> Self {
        match ControlType::try_from(code) {
            Ok(control) => MessageKind::Control(control),
            Err(()) if code == 0 => MessageKind::Unassigned,
            Err(()) if code < FIRST_PLUGIN_TYPE => MessageKind::Reserved(code),
            Err(()) => MessageKind::Plugin(code),
        }
    }

    pub fn is_control(self) -> bool {
        matches!(self, MessageKind::Control(_))
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Errors raised when a plugin claims a type code.
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    /// The code lies in the reserved control range.
    #[error("plugin {name:?} claims reserved message type {code}")]
    ReservedCode { name: String, code: u8 },

    /// Another plugin already owns the code.
    #[error("plugin {name:?} claims message type {code}, already owned by {owner:?}")]
    DuplicateCode {
        name: String,
        code: u8,
        owner: String,
    },

    /// The plugin already owns a different code.
    #[error("plugin {name:?} already registered as message type {existing}, cannot claim {code}")]
    NameAlreadyRegistered { name: String, code: u8, existing: u8 },
}

/// Maps plugin type codes to plugin names.
///
/// Plugins register once at startup; afterwards the registry is only read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageTypeRegistry {
    plugins: BTreeMap<u8, String>,
}

impl MessageTypeRegistry {
    /// An empty registry: control codes only.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the shipped plugins.
    pub fn with_builtin_plugins() -> Self {
        let mut registry = Self::new();
        for (name, code) in plugin_types::ALL {
            registry.plugins.insert(code, name.to_string());
        }
        registry
    }

    /// The process-wide registry of shipped plugins, built on first use.
    pub fn builtin() -> &'static MessageTypeRegistry {
        static BUILTIN: OnceLock<MessageTypeRegistry> = OnceLock::new();
        BUILTIN.get_or_init(Self::with_builtin_plugins)
    }

    /// The shipped plugins plus those listed in `config.plugins`.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegistryError`] raised by a configured plugin.
    pub fn from_config(config: &BacklogConfig) -> Result<Self, RegistryError> {
        let mut registry = Self::with_builtin_plugins();
        for (name, &code) in &config.plugins {
            // Re-declaring a shipped plugin under its own code is harmless.
            if registry.plugin_name(code) == Some(name.as_str()) {
                continue;
            }
            registry.register_plugin(name, code)?;
        }
        Ok(registry)
    }

    /// Claims `code` for the plugin `name`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::ReservedCode`] for codes below [`FIRST_PLUGIN_TYPE`],
    /// [`RegistryError::DuplicateCode`] if another plugin owns `code`,
    /// [`RegistryError::NameAlreadyRegistered`] if `name` already owns a code.
    pub fn register_plugin(&mut self, name: &str, code: u8) -> Result<(), RegistryError> {
        if code < FIRST_PLUGIN_TYPE {
            warn!(plugin = name, code, "rejected reserved message type");
            return Err(RegistryError::ReservedCode {
                name: name.to_string(),
                code,
            });
        }
        if let Some(existing) = self.plugin_code(name) {
            warn!(plugin = name, code, existing, "rejected second message type for plugin");
            return Err(RegistryError::NameAlreadyRegistered {
                name: name.to_string(),
                code,
                existing,
            });
        }
        if let Some(owner) = self.plugins.get(&code) {
            warn!(plugin = name, code, owner = %owner, "rejected duplicate message type");
            return Err(RegistryError::DuplicateCode {
                name: name.to_string(),
                code,
                owner: owner.clone(),
            });
        }
        debug!(plugin = name, code, "registered plugin message type");
        self.plugins.insert(code, name.to_string());
        Ok(())
    }

    pub fn plugin_name(&self, code: u8) -> Option<&str> {
        self.plugins.get(&code).map(String::as_str)
    }

    pub fn plugin_code(&self, name: &str) -> Option<u8> {
        self.plugins
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(&code, _)| code)
    }

    /// Human-readable name of any type code.
    pub fn describe(&self, code: u8) -> String {
        match MessageKind::classify(code) {
            MessageKind::Control(control) => control.name().to_string(),
            MessageKind::Plugin(code) => match self.plugin_name(code) {
                Some(name) => name.to_string(),
                None => format!("unregistered plugin type {code}"),
            },
            MessageKind::Reserved(code) => format!("reserved type {code}"),
            MessageKind::Unassigned => "unassigned type 0".to_string(),
        }
    }

    /// Registered plugins in ascending code order.
    pub fn plugins(&self) -> impl Iterator<Item = (u8, &str)> {
        self.plugins.iter().map(|(&code, name)| (code, name.as_str()))
    }
}
