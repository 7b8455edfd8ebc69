use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::identifiers::{StatusCode, TopicCode};

/// Board column a status renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusGroup {
    New,
    InProgress,
    Waiting,
    Done,
}

impl StatusGroup {
    pub const ALL: [StatusGroup; 4] = [
        StatusGroup::New,
        StatusGroup::InProgress,
        StatusGroup::Waiting,
        StatusGroup::Done,
    ];

    pub const fn as_key(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::InProgress => "IN_PROGRESS",
            Self::Waiting => "WAITING",
            Self::Done => "DONE",
        }
    }

    pub fn from_key(value: &str) -> Option<Self> {
        let normalized = value
            .trim()
            .chars()
            .map(|ch| if ch == '-' || ch == ' ' { '_' } else { ch })
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "NEW" => Some(Self::New),
            "IN_PROGRESS" | "INPROGRESS" => Some(Self::InProgress),
            "WAITING" => Some(Self::Waiting),
            "DONE" => Some(Self::Done),
            _ => None,
        }
    }

    /// Compatibility shim for rows where the server omitted `status_group`.
    ///
    /// Codes starting with `NEW` land in NEW; codes mentioning WAIT/PEND/HOLD land in
    /// WAITING; codes mentioning CLOSE/RESOLV/REJECT/DONE/PAID land in DONE; everything
    /// else is IN_PROGRESS.
    pub fn infer_from_status_code(code: &str) -> Self {
        let code = code.trim().to_ascii_uppercase();
        if code.starts_with("NEW") {
            return Self::New;
        }
        if ["WAIT", "PEND", "HOLD"]
            .iter()
            .any(|marker| code.contains(marker))
        {
            return Self::Waiting;
        }
        if ["CLOSE", "RESOLV", "REJECT", "DONE", "PAID"]
            .iter()
            .any(|marker| code.contains(marker))
        {
            return Self::Done;
        }
        Self::InProgress
    }
}

impl fmt::Display for StatusGroup {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_key())
    }
}

/// Lenient decoding for server-provided groups: unknown or blank values decode as
/// `None` so the heuristic can take over.
pub(crate) fn deserialize_optional_group<'de, D>(
    deserializer: D,
) -> Result<Option<StatusGroup>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(StatusGroup::from_key))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub code: TopicCode,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_optional_group")]
    pub group: Option<StatusGroup>,
    #[serde(default)]
    pub is_terminal: bool,
    #[serde(default)]
    pub sort_order: i32,
}

impl Status {
    pub fn board_group(&self) -> StatusGroup {
        self.group
            .unwrap_or_else(|| StatusGroup::infer_from_status_code(self.code.as_str()))
    }
}

/// One allowed `(topic, from, to)` move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub topic_code: TopicCode,
    pub from_status: StatusCode,
    pub to_status: StatusCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sla_hours: Option<u32>,
    #[serde(default)]
    pub required_data_keys: Vec<String>,
    #[serde(default)]
    pub required_mime_types: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub sort_order: i32,
}

fn default_enabled() -> bool {
    true
}
