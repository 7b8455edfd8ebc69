use caseflow_domain::{AvailableTransition, CaseRequest, StatusCode, StatusGroup};
use tracing::{debug, warn};

use crate::error::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSource {
    Server,
    Heuristic,
}

/// Board column a request currently sits in, and where that answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentGroup {
    pub group: StatusGroup,
    pub source: GroupSource,
    /// The server-declared group disagrees with what the code heuristic would pick.
    pub diverges: bool,
}

pub fn current_group(request: &CaseRequest) -> CurrentGroup {
    let inferred = StatusGroup::infer_from_status_code(request.status_code.as_str());
    match request.status_group {
        Some(group) => {
            let diverges = group != inferred;
            if diverges {
                debug!(
                    request_id = %request.id,
                    status = %request.status_code,
                    server_group = %group,
                    inferred_group = %inferred,
                    "server status group differs from code heuristic"
                );
            }
            CurrentGroup {
                group,
                source: GroupSource::Server,
                diverges,
            }
        }
        None => {
            warn!(
                request_id = %request.id,
                status = %request.status_code,
                inferred_group = %inferred,
                "request row is missing status_group; using code heuristic"
            );
            CurrentGroup {
                group: inferred,
                source: GroupSource::Heuristic,
                diverges: false,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Target equals where the request already is.
    NoOp,
    Resolved(StatusCode),
    /// More than one legal destination shares the dropped-on column.
    Ambiguous { candidates: Vec<AvailableTransition> },
}

impl Resolution {
    pub fn candidate_codes(&self) -> Vec<&StatusCode> {
        match self {
            Self::Ambiguous { candidates } => candidates
                .iter()
                .map(|candidate| &candidate.to_status)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Picks the destination status for a board drop or an explicit status pick.
///
/// An explicit status always wins. A drop is matched against the request's
/// server-computed `available_transitions`; zero matches is an error, one match is
/// applied, several matches need the caller to ask the user and call again with
/// `explicit_status` set to one of the candidates.
pub fn resolve(
    request: &CaseRequest,
    drop_target_group: Option<StatusGroup>,
    explicit_status: Option<&StatusCode>,
) -> Result<Resolution, WorkflowError> {
    if let Some(explicit) = explicit_status {
        if explicit.is_blank() {
            return Err(WorkflowError::validation("a destination status is required"));
        }
        if explicit == &request.status_code {
            return Ok(Resolution::NoOp);
        }
        return Ok(Resolution::Resolved(explicit.clone()));
    }

    let Some(target) = drop_target_group else {
        return Err(WorkflowError::validation(
            "either a board column or a destination status is required",
        ));
    };

    if current_group(request).group == target {
        return Ok(Resolution::NoOp);
    }

    let mut candidates: Vec<AvailableTransition> = Vec::new();
    for option in &request.available_transitions {
        if option.board_group() != target {
            continue;
        }
        if candidates
            .iter()
            .any(|existing| existing.to_status == option.to_status)
        {
            continue;
        }
        candidates.push(option.clone());
    }

    match candidates.len() {
        0 => Err(WorkflowError::NoLegalTransition {
            from: request.status_code.clone(),
            group: target,
        }),
        1 => {
            let resolved = candidates.remove(0).to_status;
            if resolved == request.status_code {
                Ok(Resolution::NoOp)
            } else {
                Ok(Resolution::Resolved(resolved))
            }
        }
        _ => Ok(Resolution::Ambiguous { candidates }),
    }
}
