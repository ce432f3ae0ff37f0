use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One ballot as broadcast on a voting's stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteEvent {
    pub id: i64,
    #[serde(default)]
    pub voting_id: Option<i64>,
    #[serde(default, alias = "hp_unit_id", alias = "unit_id")]
    pub voter_unit_id: Option<i64>,
    #[serde(default, alias = "chosen_option_id")]
    pub option_id: Option<i64>,
    #[serde(default, alias = "option_text")]
    pub option_label: Option<String>,
    #[serde(default)]
    pub option_code: Option<String>,
    #[serde(default, alias = "voted_at", alias = "created_at")]
    pub cast_at: Option<String>,
    #[serde(default, alias = "ip_address")]
    pub source_address: Option<String>,
    #[serde(default, alias = "user_agent")]
    pub source_agent: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl VoteEvent {
    /// Parses `cast_at`, accepting RFC 3339 as well as the zone-less form
    /// some backends emit (interpreted as UTC).
    pub fn cast_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.cast_at.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
                    .map(|naive| naive.and_utc())
                    .ok()
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PreloadComplete {
    #[serde(alias = "total")]
    pub total_votes: u64,
}

/// A decoded record from the vote stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Connected,
    Vote(VoteEvent),
    PreloadComplete(PreloadComplete),
    Heartbeat,
    Unknown(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error(String),
}

impl ConnectionState {
    pub fn is_error(&self) -> bool {
        matches!(self, ConnectionState::Error(_))
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Connected => f.write_str("connected"),
            ConnectionState::Error(message) => write!(f, "error: {message}"),
        }
    }
}

/// The `(property, group, voting)` triple a stream is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamTarget {
    pub property_id: i64,
    pub group_id: i64,
    pub voting_id: i64,
}

impl StreamTarget {
    pub fn new(property_id: i64, group_id: i64, voting_id: i64) -> Self {
        Self {
            property_id,
            group_id,
            voting_id,
        }
    }

    /// Only yields a target when all three identifiers are known.
    pub fn from_parts(
        property_id: Option<i64>,
        group_id: Option<i64>,
        voting_id: Option<i64>,
    ) -> Option<Self> {
        Some(Self::new(property_id?, group_id?, voting_id?))
    }

    pub fn path(&self) -> String {
        format!(
            "/hp/{}/groups/{}/votings/{}/stream",
            self.property_id, self.group_id, self.voting_id
        )
    }
}

impl fmt::Display for StreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "property {} / group {} / voting {}",
            self.property_id, self.group_id, self.voting_id
        )
    }
}
