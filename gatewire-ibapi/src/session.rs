//! Negotiated session state.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use serde::Serialize;

// ============================================================================
// ServerTime
// ============================================================================

const SERVER_TIME_FORMAT: &str = "%Y%m%d %H:%M:%S";

/// Server clock at handshake: local wall time plus the zone label as sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTime {
    pub local: NaiveDateTime,
    pub zone: String,
}

impl ServerTime {
    /// Fixed offset for common North American and UTC labels.
    pub fn utc_offset(&self) -> Option<FixedOffset> {
        let hours = match self.zone.as_str() {
            "EST" => -5,
            "EDT" => -4,
            "CST" => -6,
            "CDT" => -5,
            "MST" => -7,
            "MDT" => -6,
            "PST" => -8,
            "PDT" => -7,
            "GMT" | "UTC" => 0,
            _ => return None,
        };
        FixedOffset::east_opt(hours * 3600)
    }

    /// The time as an instant, when the zone label is one we know.
    pub fn to_fixed(&self) -> Option<DateTime<FixedOffset>> {
        self.utc_offset()?
            .from_local_datetime(&self.local)
            .single()
    }
}

impl FromStr for ServerTime {
    type Err = String;

    /// Parses `"YYYYMMDD HH:MM:SS ZONE"`; the zone is optional and kept verbatim.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut parts = s.splitn(3, ' ');
        let (Some(date), Some(time)) = (parts.next(), parts.next()) else {
            return Err(format!("'{s}' is not 'YYYYMMDD HH:MM:SS ZONE'"));
        };
        let zone = parts.next().unwrap_or("").trim().to_string();
        let local = NaiveDateTime::parse_from_str(&format!("{date} {time}"), SERVER_TIME_FORMAT)
            .map_err(|e| format!("'{s}': {e}"))?;
        Ok(Self { local, zone })
    }
}

impl fmt::Display for ServerTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.local.format(SERVER_TIME_FORMAT))?;
        if !self.zone.is_empty() {
            write!(f, " {}", self.zone)?;
        }
        Ok(())
    }
}

// ============================================================================
// ConnectionState
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Handshaking,
    AwaitingNextValidId,
    Ready,
    Closed,
}

// ============================================================================
// Session
// ============================================================================

/// Everything learned during the handshake, plus values the server updates
/// later on the system path.
#[derive(Debug)]
pub struct Session {
    server_version: i32,
    server_time: ServerTime,
    optional_capabilities: String,
    next_order_id: AtomicI32,
    managed_accounts: RwLock<String>,
}

impl Session {
    pub fn new(server_version: i32, server_time: ServerTime, optional_capabilities: String) -> Self {
        Self {
            server_version,
            server_time,
            optional_capabilities,
            next_order_id: AtomicI32::new(0),
            managed_accounts: RwLock::new(String::new()),
        }
    }

    pub fn server_version(&self) -> i32 {
        self.server_version
    }

    pub fn server_time(&self) -> &ServerTime {
        &self.server_time
    }

    pub fn optional_capabilities(&self) -> &str {
        &self.optional_capabilities
    }

    pub fn next_order_id(&self) -> i32 {
        self.next_order_id.load(Ordering::SeqCst)
    }

    pub(crate) fn set_next_order_id(&self, id: i32) {
        self.next_order_id.store(id, Ordering::SeqCst);
    }

    /// Comma-joined account codes.
    pub fn managed_accounts(&self) -> String {
        self.managed_accounts
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub(crate) fn set_managed_accounts(&self, accounts: String) {
        *self
            .managed_accounts
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = accounts;
    }
}
