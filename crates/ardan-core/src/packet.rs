//! Decoded packet envelopes exchanged with the simulation peer.

use crate::id::EntityId;
use crate::state::StateFields;

/// A partial state report for one entity.
///
/// # Examples
///
/// ```
/// use ardan_core::{EntityId, StateFields, StateUpdate};
///
/// let update = StateUpdate {
///     entity: EntityId(7),
///     fields: StateFields {
///         radio_duty: Some(0.25),
///         timestamp: Some(3.0),
///         ..StateFields::default()
///     },
/// };
/// assert_eq!(update.entity, EntityId(7));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StateUpdate {
    /// The entity the update is addressed to.
    pub entity: EntityId,
    /// The fields the peer sent.
    pub fields: StateFields,
}

/// An outbound instruction to the simulation peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    /// Switch an entity's indicator on or off.
    SetIndicator {
        /// Target entity.
        entity: EntityId,
        /// Desired indicator state.
        on: bool,
    },
    /// Fire a one-shot event (e.g. a detection) on an entity.
    TriggerEvent {
        /// Target entity.
        entity: EntityId,
    },
}

impl Command {
    /// The entity this command targets.
    pub fn entity(&self) -> EntityId {
        match self {
            Self::SetIndicator { entity, .. } | Self::TriggerEvent { entity } => *entity,
        }
    }
}

/// One decoded wire packet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PacketEnvelope {
    /// A (partial) state report.
    StateUpdate(StateUpdate),
    /// A command.
    Command(Command),
}

impl PacketEnvelope {
    /// The entity this packet concerns.
    pub fn entity(&self) -> EntityId {
        match self {
            Self::StateUpdate(update) => update.entity,
            Self::Command(cmd) => cmd.entity(),
        }
    }
}

impl From<StateUpdate> for PacketEnvelope {
    fn from(update: StateUpdate) -> Self {
        Self::StateUpdate(update)
    }
}

impl From<Command> for PacketEnvelope {
    fn from(cmd: Command) -> Self {
        Self::Command(cmd)
    }
}
