use serde::{Deserialize, Serialize};

use crate::request::CaseRequest;
use crate::status::StatusGroup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    #[default]
    UpdatedDesc,
    CreatedAsc,
    ImportantDate,
}

impl SortMode {
    pub const fn as_key(self) -> &'static str {
        match self {
            Self::UpdatedDesc => "updated_desc",
            Self::CreatedAsc => "created_asc",
            Self::ImportantDate => "important_date",
        }
    }

    pub fn from_key(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "updated_desc" => Some(Self::UpdatedDesc),
            "created_asc" => Some(Self::CreatedAsc),
            "important_date" => Some(Self::ImportantDate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardFilter {
    pub field: String,
    pub op: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardQuery {
    pub limit: u32,
    #[serde(default)]
    pub sort_mode: SortMode,
    #[serde(default)]
    pub filters: Vec<BoardFilter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KanbanColumn {
    pub group: StatusGroup,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KanbanBoard {
    #[serde(default)]
    pub rows: Vec<CaseRequest>,
    #[serde(default)]
    pub columns: Vec<KanbanColumn>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub truncated: bool,
}
