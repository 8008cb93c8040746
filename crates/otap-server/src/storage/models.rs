//! Data models for OTAP registry storage.

use serde::{Deserialize, Serialize};

/// One row per physical device, keyed by IMEI.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Device {
    pub imei: String,
    pub custid: String,
    pub tid: Option<String>,
    /// Last version the device self-reported; NULL until first check-in.
    pub reported: Option<String>,
    /// Operator-assigned delivery target: exact version, `*`, or NULL.
    pub deliver: Option<String>,
    pub block: i64,
    /// `;`-joined `key=value` tokens delivered with an upgrade offer.
    pub settings: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Device {
    pub const fn is_blocked(&self) -> bool {
        self.block != 0
    }
}

/// Append-only check-in audit record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VersionCheck {
    pub id: i64,
    pub imei: String,
    pub custid: Option<String>,
    pub tid: Option<String>,
    pub reported: Option<String>,
    pub upgrade_offered: i64,
    pub offered_version: Option<String>,
    pub tstamp: i64,
}

/// Fields for a new audit record (id and tstamp assigned at insert).
#[derive(Debug, Clone)]
pub struct NewVersionCheck {
    pub imei: String,
    pub custid: Option<String>,
    pub tid: Option<String>,
    pub reported: Option<String>,
    pub upgrade_offered: bool,
    pub offered_version: Option<String>,
}

/// Outcome of an upgrade attempt, reported by the device afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeliveryResult {
    pub id: i64,
    pub tid: String,
    pub result: String,
    pub tstamp: i64,
}
