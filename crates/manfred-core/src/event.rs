// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only audit records attached to a session.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of an audit event.
///
/// The seven named kinds cover everything the orchestrator records. Any other
/// string round-trips through [`EventType::Other`], so rows written by newer
/// builds are still readable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    PhaseChange,
    CommentPosted,
    CommentReceived,
    ContainerStart,
    ContainerStop,
    PrCreated,
    Error,
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::PhaseChange => "phase_change",
            EventType::CommentPosted => "comment_posted",
            EventType::CommentReceived => "comment_received",
            EventType::ContainerStart => "container_start",
            EventType::ContainerStop => "container_stop",
            EventType::PrCreated => "pr_created",
            EventType::Error => "error",
            EventType::Other(s) => s,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "phase_change" => EventType::PhaseChange,
            "comment_posted" => EventType::CommentPosted,
            "comment_received" => EventType::CommentReceived,
            "container_start" => EventType::ContainerStart,
            "container_stop" => EventType::ContainerStop,
            "pr_created" => EventType::PrCreated,
            "error" => EventType::Error,
            other => EventType::Other(other.to_string()),
        })
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(t) => t,
            Err(never) => match never {},
        }
    }
}

impl Serialize for EventType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(EventType::from(s.as_str()))
    }
}

/// One persisted audit record.
///
/// `id` is assigned by the store and increases with insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub id: i64,
    pub session_id: String,
    pub event_type: EventType,
    /// Opaque JSON payload, `None` when the event carried no data.
    pub payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
