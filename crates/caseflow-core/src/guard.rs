use caseflow_domain::{Actor, ActorId, ActorRole, CaseRequest};

use crate::error::WorkflowError;

/// Client-side ownership pre-check. The server re-checks every mutation; this only
/// keeps obviously doomed calls off the wire.
#[derive(Debug, Clone, Copy)]
pub struct ClaimReassignGuard<'a> {
    actor: &'a Actor,
}

impl<'a> ClaimReassignGuard<'a> {
    pub fn new(actor: &'a Actor) -> Self {
        Self { actor }
    }

    pub fn check_claim(&self, request: &CaseRequest) -> Result<(), WorkflowError> {
        if self.actor.role == ActorRole::Client {
            return Err(WorkflowError::permission_denied(
                "clients cannot claim requests",
            ));
        }
        if !request.is_unassigned() {
            let owner = request
                .assigned_lawyer_id
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            return Err(WorkflowError::permission_denied(format!(
                "request {} is already assigned to {owner}",
                request.id
            )));
        }
        Ok(())
    }

    pub fn check_reassign(
        &self,
        request: &CaseRequest,
        lawyer_id: &ActorId,
    ) -> Result<(), WorkflowError> {
        if !self.actor.is_admin() {
            return Err(WorkflowError::permission_denied(format!(
                "only administrators can reassign request {}",
                request.id
            )));
        }
        if lawyer_id.is_blank() {
            return Err(WorkflowError::validation(
                "a lawyer must be selected for reassignment",
            ));
        }
        Ok(())
    }

    /// Admins may move anything; lawyers only what is assigned to them.
    pub fn check_status_change(&self, request: &CaseRequest) -> Result<(), WorkflowError> {
        match self.actor.role {
            ActorRole::Admin => Ok(()),
            ActorRole::Client => Err(WorkflowError::permission_denied(
                "clients cannot change request status",
            )),
            ActorRole::Lawyer if request.is_assigned_to(&self.actor.id) => Ok(()),
            ActorRole::Lawyer if request.is_unassigned() => {
                Err(WorkflowError::permission_denied(format!(
                    "claim request {} before changing its status",
                    request.id
                )))
            }
            ActorRole::Lawyer => Err(WorkflowError::permission_denied(format!(
                "request {} is assigned to another lawyer",
                request.id
            ))),
        }
    }
}
