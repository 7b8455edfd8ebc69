use serde::{Deserialize, Serialize};

use crate::chat::{Attachment, ChatMessage};
use crate::identifiers::{ActorId, RequestId, StatusCode, TopicCode};
use crate::status::{deserialize_optional_group, StatusGroup};

/// One server-computed move the request may take from its current status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableTransition {
    pub to_status: StatusCode,
    #[serde(default)]
    pub to_status_name: String,
    #[serde(default, deserialize_with = "deserialize_optional_group")]
    pub target_group: Option<StatusGroup>,
}

impl AvailableTransition {
    pub fn board_group(&self) -> StatusGroup {
        self.target_group
            .unwrap_or_else(|| StatusGroup::infer_from_status_code(self.to_status.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRequest {
    pub id: RequestId,
    #[serde(default)]
    pub track_number: String,
    pub topic_code: TopicCode,
    pub status_code: StatusCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_name: Option<String>,
    #[serde(default)]
    pub assigned_lawyer_id: Option<ActorId>,
    #[serde(default)]
    pub available_transitions: Vec<AvailableTransition>,
    #[serde(default, deserialize_with = "deserialize_optional_group")]
    pub status_group: Option<StatusGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub important_date_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl CaseRequest {
    pub fn is_unassigned(&self) -> bool {
        self.assigned_lawyer_id
            .as_ref()
            .map(ActorId::is_blank)
            .unwrap_or(true)
    }

    pub fn is_assigned_to(&self, lawyer_id: &ActorId) -> bool {
        self.assigned_lawyer_id
            .as_ref()
            .is_some_and(|assigned| !assigned.is_blank() && assigned == lawyer_id)
    }
}

/// Append-only record written once per accepted status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub request_id: RequestId,
    #[serde(default)]
    pub from_status: Option<StatusCode>,
    pub to_status: StatusCode,
    pub changed_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub important_date_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChangeReceipt {
    pub from_status: StatusCode,
    pub to_status: StatusCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStep {
    pub status: StatusCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entered_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub important_date_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent_seconds: Option<i64>,
}

/// Path a request has taken through its topic graph, plus where it can go next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRoute {
    #[serde(default)]
    pub steps: Vec<RouteStep>,
    pub current: StatusCode,
    #[serde(default)]
    pub next: Vec<AvailableTransition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSnapshot {
    pub request: CaseRequest,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub status_route: StatusRoute,
    #[serde(default)]
    pub history: Vec<StatusHistoryEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_decodes_kanban_row_shape() {
        let request: CaseRequest = serde_json::from_value(json!({
            "id": "r-1",
            "track_number": "TRK-0001",
            "topic_code": "DIVORCE",
            "status_code": "NEW",
            "assigned_lawyer_id": null,
            "status_group": "NEW",
            "available_transitions": [
                { "to_status": "REVIEW", "to_status_name": "Review", "target_group": "IN_PROGRESS" },
                { "to_status": "REJECTED", "to_status_name": "Rejected" }
            ]
        }))
        .expect("decode request");

        assert!(request.is_unassigned());
        assert_eq!(request.status_group, Some(StatusGroup::New));
        assert_eq!(
            request.available_transitions[0].board_group(),
            StatusGroup::InProgress
        );
        assert_eq!(
            request.available_transitions[1].board_group(),
            StatusGroup::Done
        );
    }

    #[test]
    fn blank_assignee_counts_as_unassigned() {
        let request: CaseRequest = serde_json::from_value(json!({
            "id": "r-2",
            "topic_code": "DIVORCE",
            "status_code": "REVIEW",
            "assigned_lawyer_id": "  "
        }))
        .expect("decode request");

        assert!(request.is_unassigned());
        assert!(!request.is_assigned_to(&ActorId::new("  ")));
    }
}
