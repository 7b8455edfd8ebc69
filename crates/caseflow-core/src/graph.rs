use std::collections::{BTreeMap, BTreeSet};

use caseflow_domain::{
    AvailableTransition, RouteStep, Status, StatusCode, StatusGroup, StatusHistoryEntry,
    StatusRoute, StatusTransition, TopicCode,
};
use time::{Duration, OffsetDateTime};

use crate::adapters::TopicWorkflowDefinition;
use crate::error::WorkflowError;
use crate::timestamps::{compare_stamps, parse_rfc3339};

/// In-memory view of one topic's transition edges.
///
/// Disabled edges are retained so that admin tooling can list them, but every query
/// below only looks at enabled ones.
#[derive(Debug, Clone)]
pub struct StatusGraph {
    topic: TopicCode,
    statuses: BTreeMap<StatusCode, Status>,
    edges: Vec<StatusTransition>,
}

impl StatusGraph {
    pub fn new(
        topic: TopicCode,
        statuses: Vec<Status>,
        mut transitions: Vec<StatusTransition>,
    ) -> Result<Self, WorkflowError> {
        if topic.is_blank() {
            return Err(WorkflowError::validation("topic code must not be empty"));
        }

        let mut enabled_pairs = BTreeSet::new();
        for edge in &transitions {
            if edge.topic_code != topic {
                return Err(WorkflowError::validation(format!(
                    "edge {} -> {} belongs to topic '{}', not '{}'",
                    edge.from_status, edge.to_status, edge.topic_code, topic
                )));
            }
            if edge.from_status.is_blank() || edge.to_status.is_blank() {
                return Err(WorkflowError::validation(format!(
                    "topic '{topic}' has an edge with an empty status code"
                )));
            }
            if edge.enabled
                && !enabled_pairs.insert((edge.from_status.clone(), edge.to_status.clone()))
            {
                return Err(WorkflowError::validation(format!(
                    "topic '{}' has more than one enabled edge {} -> {}",
                    topic, edge.from_status, edge.to_status
                )));
            }
        }

        transitions.sort_by(|left, right| {
            left.sort_order
                .cmp(&right.sort_order)
                .then_with(|| left.to_status.cmp(&right.to_status))
        });

        let statuses = statuses
            .into_iter()
            .map(|status| (status.code.clone(), status))
            .collect();

        Ok(Self {
            topic,
            statuses,
            edges: transitions,
        })
    }

    pub fn from_definition(definition: TopicWorkflowDefinition) -> Result<Self, WorkflowError> {
        Self::new(
            definition.topic.code,
            definition.statuses,
            definition.transitions,
        )
    }

    pub fn topic(&self) -> &TopicCode {
        &self.topic
    }

    pub fn status(&self, code: &StatusCode) -> Option<&Status> {
        self.statuses.get(code)
    }

    pub fn status_name(&self, code: &StatusCode) -> String {
        self.status(code)
            .map(|status| status.name.clone())
            .unwrap_or_else(|| code.to_string())
    }

    /// Board column for a status; falls back to the code heuristic for statuses the
    /// graph does not know or whose group was not declared.
    pub fn group_of(&self, code: &StatusCode) -> StatusGroup {
        self.status(code)
            .map(Status::board_group)
            .unwrap_or_else(|| StatusGroup::infer_from_status_code(code.as_str()))
    }

    pub fn is_terminal(&self, code: &StatusCode) -> bool {
        self.status(code).is_some_and(|status| status.is_terminal)
    }

    pub fn edge(&self, from: &StatusCode, to: &StatusCode) -> Option<&StatusTransition> {
        self.edges
            .iter()
            .find(|edge| edge.enabled && &edge.from_status == from && &edge.to_status == to)
    }

    /// Enabled edges leaving `from`, in edge sort order. Terminal statuses have none.
    pub fn outgoing(&self, from: &StatusCode) -> Vec<&StatusTransition> {
        if self.is_terminal(from) {
            return Vec::new();
        }
        self.edges
            .iter()
            .filter(|edge| edge.enabled && &edge.from_status == from)
            .collect()
    }

    /// The same list the server attaches to each request row.
    pub fn available_transitions(&self, from: &StatusCode) -> Vec<AvailableTransition> {
        self.outgoing(from)
            .into_iter()
            .map(|edge| AvailableTransition {
                to_status: edge.to_status.clone(),
                to_status_name: self.status_name(&edge.to_status),
                target_group: Some(self.group_of(&edge.to_status)),
            })
            .collect()
    }

    pub fn sla_deadline(
        &self,
        from: &StatusCode,
        to: &StatusCode,
        changed_at: OffsetDateTime,
    ) -> Option<OffsetDateTime> {
        let hours = self.edge(from, to)?.sla_hours?;
        changed_at.checked_add(Duration::hours(i64::from(hours)))
    }

    pub fn check_requirements<'a>(
        &self,
        from: &StatusCode,
        to: &StatusCode,
        filled_keys: impl IntoIterator<Item = &'a str>,
        attachment_mime_types: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), WorkflowError> {
        let Some(edge) = self.edge(from, to) else {
            return Err(WorkflowError::validation(format!(
                "no enabled edge {from} -> {to} in topic '{}'",
                self.topic
            )));
        };

        let filled = filled_keys
            .into_iter()
            .map(normalize_key)
            .collect::<BTreeSet<_>>();
        let missing_keys = edge
            .required_data_keys
            .iter()
            .filter(|key| !key.trim().is_empty() && !filled.contains(&normalize_key(key)))
            .map(|key| key.trim().to_owned())
            .collect::<Vec<_>>();

        let mime_types = attachment_mime_types.into_iter().collect::<Vec<_>>();
        let unmatched_patterns = edge
            .required_mime_types
            .iter()
            .filter(|pattern| !pattern.trim().is_empty())
            .filter(|pattern| {
                !mime_types
                    .iter()
                    .any(|mime_type| mime_matches(pattern, mime_type))
            })
            .map(|pattern| pattern.trim().to_owned())
            .collect::<Vec<_>>();

        if missing_keys.is_empty() && unmatched_patterns.is_empty() {
            return Ok(());
        }

        let mut problems = Vec::new();
        if !missing_keys.is_empty() {
            problems.push(format!("missing data: {}", missing_keys.join(", ")));
        }
        if !unmatched_patterns.is_empty() {
            problems.push(format!(
                "missing files of type: {}",
                unmatched_patterns.join(", ")
            ));
        }
        Err(WorkflowError::validation(format!(
            "{from} -> {to} requires {}",
            problems.join("; ")
        )))
    }

    /// Builds the visited path from the append-only history plus the current options.
    pub fn route(&self, current: &StatusCode, history: &[StatusHistoryEntry]) -> StatusRoute {
        let mut entries = history.iter().collect::<Vec<_>>();
        entries.sort_by(|left, right| compare_stamps(&left.changed_at, &right.changed_at));

        let mut steps = Vec::with_capacity(entries.len() + 1);
        if let Some(first) = entries.first() {
            if let Some(initial) = first.from_status.as_ref() {
                steps.push(RouteStep {
                    status: initial.clone(),
                    entered_at: None,
                    important_date_at: None,
                    time_spent_seconds: first.duration_seconds,
                });
            }
        }

        for (index, entry) in entries.iter().enumerate() {
            let time_spent_seconds = entries.get(index + 1).and_then(|next| {
                next.duration_seconds
                    .or_else(|| seconds_between(&entry.changed_at, &next.changed_at))
            });
            steps.push(RouteStep {
                status: entry.to_status.clone(),
                entered_at: Some(entry.changed_at.clone()),
                important_date_at: entry.important_date_at.clone(),
                time_spent_seconds,
            });
        }

        StatusRoute {
            steps,
            current: current.clone(),
            next: self.available_transitions(current),
        }
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

fn seconds_between(start: &str, end: &str) -> Option<i64> {
    let start = parse_rfc3339(start)?;
    let end = parse_rfc3339(end)?;
    Some((end - start).whole_seconds().max(0))
}

/// `*` and `*/*` match anything, `image/*` matches any image subtype, everything else
/// is a case-insensitive exact match.
pub(crate) fn mime_matches(pattern: &str, mime_type: &str) -> bool {
    let pattern = pattern.trim().to_ascii_lowercase();
    let mime_type = mime_type.trim().to_ascii_lowercase();
    if pattern == "*" || pattern == "*/*" {
        return true;
    }
    match pattern.strip_suffix("/*") {
        Some(kind) => mime_type
            .split_once('/')
            .is_some_and(|(candidate, _)| candidate == kind),
        None => pattern == mime_type,
    }
}
