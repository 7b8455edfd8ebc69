use caseflow_domain::{AvailableTransition, CaseRequest, RequestId, StatusCode, StatusGroup};

use crate::error::WorkflowError;
use crate::resolver::{resolve, Resolution};

/// What the user asked for: a column drop or a direct status pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowTarget {
    Column(StatusGroup),
    Status(StatusCode),
}

/// Lifecycle of one move on the board.
///
/// `Idle -> Resolving -> (AwaitingChoice ->) Applying -> Idle | Failed`. Every method
/// consumes the current state and returns the next one; calls that do not apply to
/// the current state leave it unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransitionFlow {
    #[default]
    Idle,
    Resolving {
        request_id: RequestId,
        target: FlowTarget,
    },
    AwaitingChoice {
        request_id: RequestId,
        candidates: Vec<AvailableTransition>,
    },
    Applying {
        request_id: RequestId,
        status: StatusCode,
    },
    Failed {
        request_id: RequestId,
        error: WorkflowError,
    },
}

impl TransitionFlow {
    pub fn begin(self, request_id: RequestId, target: FlowTarget) -> Self {
        match self {
            Self::Idle | Self::Failed { .. } => Self::Resolving { request_id, target },
            busy => busy,
        }
    }

    /// Runs the resolver against the freshly loaded request.
    pub fn resolve(self, request: &CaseRequest) -> Self {
        let (request_id, target) = match self {
            Self::Resolving { request_id, target } => (request_id, target),
            other => return other,
        };
        if request.id != request_id {
            return Self::Failed {
                request_id,
                error: WorkflowError::validation(format!(
                    "loaded request '{}' does not match the one being moved",
                    request.id
                )),
            };
        }

        let resolution = match &target {
            FlowTarget::Column(group) => resolve(request, Some(*group), None),
            FlowTarget::Status(status) => resolve(request, None, Some(status)),
        };
        match resolution {
            Ok(Resolution::NoOp) => Self::Idle,
            Ok(Resolution::Resolved(status)) => Self::Applying { request_id, status },
            Ok(Resolution::Ambiguous { candidates }) => Self::AwaitingChoice {
                request_id,
                candidates,
            },
            Err(error) => Self::Failed { request_id, error },
        }
    }

    /// Accepts the user's pick; anything outside the offered candidates fails.
    pub fn choose(self, status: &StatusCode) -> Self {
        let (request_id, candidates) = match self {
            Self::AwaitingChoice {
                request_id,
                candidates,
            } => (request_id, candidates),
            other => return other,
        };
        if candidates
            .iter()
            .any(|candidate| &candidate.to_status == status)
        {
            Self::Applying {
                request_id,
                status: status.clone(),
            }
        } else {
            Self::Failed {
                request_id,
                error: WorkflowError::validation(format!(
                    "'{status}' is not one of the offered destinations"
                )),
            }
        }
    }

    pub fn finish(self, outcome: Result<(), WorkflowError>) -> Self {
        match (self, outcome) {
            (Self::Applying { .. }, Ok(())) => Self::Idle,
            (Self::Applying { request_id, .. }, Err(error)) => Self::Failed { request_id, error },
            (other, _) => other,
        }
    }

    pub fn cancel(self) -> Self {
        Self::Idle
    }

    pub fn pending_status(&self) -> Option<&StatusCode> {
        match self {
            Self::Applying { status, .. } => Some(status),
            _ => None,
        }
    }

    pub fn candidates(&self) -> &[AvailableTransition] {
        match self {
            Self::AwaitingChoice { candidates, .. } => candidates,
            _ => &[],
        }
    }

    pub fn error(&self) -> Option<&WorkflowError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_options(options: Vec<(&str, StatusGroup)>) -> CaseRequest {
        CaseRequest {
            id: "r-7".into(),
            track_number: "TRK-7".to_owned(),
            topic_code: "DIVORCE".into(),
            status_code: "NEW".into(),
            status_name: None,
            assigned_lawyer_id: None,
            available_transitions: options
                .into_iter()
                .map(|(to, group)| AvailableTransition {
                    to_status: to.into(),
                    to_status_name: to.to_owned(),
                    target_group: Some(group),
                })
                .collect(),
            status_group: Some(StatusGroup::New),
            important_date_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn ambiguous_drop_waits_for_a_choice_then_applies() {
        let request = request_with_options(vec![
            ("REJECTED", StatusGroup::Done),
            ("WITHDRAWN", StatusGroup::Done),
        ]);

        let flow = TransitionFlow::Idle
            .begin(request.id.clone(), FlowTarget::Column(StatusGroup::Done))
            .resolve(&request);
        assert_eq!(flow.candidates().len(), 2);

        let flow = flow.choose(&"WITHDRAWN".into());
        assert_eq!(flow.pending_status(), Some(&StatusCode::from("WITHDRAWN")));

        assert!(flow.finish(Ok(())).is_idle());
    }

    #[test]
    fn choosing_outside_the_candidates_fails() {
        let request = request_with_options(vec![
            ("REJECTED", StatusGroup::Done),
            ("WITHDRAWN", StatusGroup::Done),
        ]);

        let flow = TransitionFlow::Idle
            .begin(request.id.clone(), FlowTarget::Column(StatusGroup::Done))
            .resolve(&request)
            .choose(&"REVIEW".into());

        assert!(matches!(
            flow.error(),
            Some(WorkflowError::ValidationFailure(_))
        ));
    }

    #[test]
    fn single_candidate_goes_straight_to_applying() {
        let request = request_with_options(vec![("REVIEW", StatusGroup::InProgress)]);

        let flow = TransitionFlow::Idle
            .begin(request.id.clone(), FlowTarget::Column(StatusGroup::InProgress))
            .resolve(&request);

        assert_eq!(flow.pending_status(), Some(&StatusCode::from("REVIEW")));
    }

    #[test]
    fn illegal_drop_fails_and_can_restart() {
        let request = request_with_options(vec![("REVIEW", StatusGroup::InProgress)]);

        let flow = TransitionFlow::Idle
            .begin(request.id.clone(), FlowTarget::Column(StatusGroup::Waiting))
            .resolve(&request);
        assert!(matches!(
            flow.error(),
            Some(WorkflowError::NoLegalTransition { .. })
        ));

        let flow = flow
            .begin(request.id.clone(), FlowTarget::Status("REVIEW".into()))
            .resolve(&request);
        assert_eq!(flow.pending_status(), Some(&StatusCode::from("REVIEW")));
    }

    #[test]
    fn begin_is_ignored_while_a_move_is_in_progress() {
        let flow = TransitionFlow::Applying {
            request_id: "r-7".into(),
            status: "REVIEW".into(),
        };

        let flow = flow.begin("r-8".into(), FlowTarget::Column(StatusGroup::Done));

        assert_eq!(flow.pending_status(), Some(&StatusCode::from("REVIEW")));
    }

    #[test]
    fn failed_apply_keeps_the_error() {
        let flow = TransitionFlow::Applying {
            request_id: "r-7".into(),
            status: "REVIEW".into(),
        }
        .finish(Err(WorkflowError::network("timeout")));

        assert_eq!(flow.error(), Some(&WorkflowError::network("timeout")));
    }
}
