//! Dispatch table for incoming frames.
//!
//! Connection-level messages take the system path and are handled by the
//! reader itself; everything else is correlated to a pending request through
//! an explicit per-message request-id position.

use crate::codec::message_id;
use crate::protocol::{incoming, server_version};

/// Messages the reader handles itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemMessage {
    EndConnection,
    NextValidId,
    ManagedAccounts,
    Error,
}

impl SystemMessage {
    pub fn from_message_id(msg_id: i32) -> Option<Self> {
        match msg_id {
            incoming::END_CONN => Some(Self::EndConnection),
            incoming::NEXT_VALID_ID => Some(Self::NextValidId),
            incoming::MANAGED_ACCTS => Some(Self::ManagedAccounts),
            incoming::ERR_MSG => Some(Self::Error),
            _ => None,
        }
    }
}

/// Where a frame goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    System(SystemMessage),
    Correlated { message_id: i32, request_id: i32 },
    Unroutable { reason: String },
}

/// Index of the request id within a correlated message, or `None` if the
/// message type is not correlated.
pub fn request_id_index(msg_id: i32, server_version: i32) -> Option<usize> {
    match msg_id {
        incoming::REAL_TIME_BARS => Some(2),
        incoming::TICK_BY_TICK => Some(1),
        incoming::CONTRACT_DATA_END => Some(2),
        incoming::CONTRACT_DATA | incoming::BOND_CONTRACT_DATA => {
            if server_version >= server_version::SIZE_RULES {
                Some(1)
            } else {
                Some(2)
            }
        }
        _ => None,
    }
}

/// Decide where a field sequence should go.
pub fn classify(fields: &[String], server_version: i32) -> Disposition {
    let msg_id = match message_id(fields) {
        Ok(id) => id,
        Err(e) => {
            return Disposition::Unroutable {
                reason: e.to_string(),
            }
        }
    };
    if let Some(system) = SystemMessage::from_message_id(msg_id) {
        return Disposition::System(system);
    }
    let Some(index) = request_id_index(msg_id, server_version) else {
        return Disposition::Unroutable {
            reason: format!("unhandled message {msg_id}"),
        };
    };
    match fields.get(index).map(|f| f.parse::<i32>()) {
        Some(Ok(request_id)) => Disposition::Correlated {
            message_id: msg_id,
            request_id,
        },
        Some(Err(_)) => Disposition::Unroutable {
            reason: format!("message {msg_id}: bad request id '{}'", fields[index]),
        },
        None => Disposition::Unroutable {
            reason: format!("message {msg_id}: no request id at position {index}"),
        },
    }
}
