use std::sync::Arc;

use caseflow_domain::{
    Actor, ActorId, Attachment, AttachmentUpload, BoardQuery, CaseRequest, ChatMessage,
    KanbanBoard, NewChatMessage, StatusChangeReceipt, StatusCode, StatusGroup,
    WorkspaceSnapshot,
};

use crate::adapters::{CaseBackend, StatusChangeSubmission};
use crate::error::{FollowUpStage, WorkflowError};
use crate::guard::ClaimReassignGuard;
use crate::resolver::{resolve, Resolution};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusChange {
    pub status_code: StatusCode,
    pub important_date_at: Option<String>,
    pub comment: Option<String>,
    pub files: Vec<AttachmentUpload>,
}

impl StatusChange {
    pub fn to(status_code: impl Into<StatusCode>) -> Self {
        Self {
            status_code: status_code.into(),
            ..Self::default()
        }
    }

    fn comment_text(&self) -> Option<&str> {
        self.comment
            .as_deref()
            .map(str::trim)
            .filter(|comment| !comment.is_empty())
    }

    fn needs_annotation(&self) -> bool {
        self.comment_text().is_some() || !self.files.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChangeOutcome {
    pub receipt: StatusChangeReceipt,
    pub note: Option<ChatMessage>,
    pub attachments: Vec<Attachment>,
    pub workspace: WorkspaceSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    NoOp,
    NeedsChoice { candidates: Vec<StatusCode> },
    Applied(Box<StatusChangeOutcome>),
}

/// First line of the chat note posted alongside a status change.
pub fn status_note_body(receipt: &StatusChangeReceipt, comment: Option<&str>) -> String {
    let mut body = format!(
        "Status change: {} -> {}",
        receipt.from_status, receipt.to_status
    );
    if let Some(comment) = comment.map(str::trim).filter(|comment| !comment.is_empty()) {
        body.push('\n');
        body.push_str(comment);
    }
    body
}

/// Runs status changes, claims and reassignments for one acting user.
///
/// Nothing is mutated locally: every committed change is followed by a workspace
/// reload so the caller renders what the server now holds.
#[derive(Clone)]
pub struct WorkflowController {
    backend: Arc<dyn CaseBackend>,
    actor: Actor,
}

impl WorkflowController {
    pub fn new(backend: Arc<dyn CaseBackend>, actor: Actor) -> Self {
        Self { backend, actor }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn guard(&self) -> ClaimReassignGuard<'_> {
        ClaimReassignGuard::new(&self.actor)
    }

    pub async fn load_board(&self, query: BoardQuery) -> Result<KanbanBoard, WorkflowError> {
        self.backend.load_board(query).await
    }

    pub async fn load_workspace(
        &self,
        request: &CaseRequest,
    ) -> Result<WorkspaceSnapshot, WorkflowError> {
        self.backend.load_workspace(&request.id).await
    }

    /// Resolves a board drop (or explicit pick) and applies it when unambiguous.
    pub async fn move_request(
        &self,
        request: &CaseRequest,
        drop_target_group: Option<StatusGroup>,
        explicit_status: Option<&StatusCode>,
        details: StatusChange,
    ) -> Result<MoveOutcome, WorkflowError> {
        match resolve(request, drop_target_group, explicit_status)? {
            Resolution::NoOp => Ok(MoveOutcome::NoOp),
            Resolution::Ambiguous { candidates } => Ok(MoveOutcome::NeedsChoice {
                candidates: candidates
                    .into_iter()
                    .map(|candidate| candidate.to_status)
                    .collect(),
            }),
            Resolution::Resolved(status_code) => {
                let change = StatusChange {
                    status_code,
                    ..details
                };
                let outcome = self.change_status(request, change).await?;
                Ok(MoveOutcome::Applied(Box::new(outcome)))
            }
        }
    }

    /// Commits the status, then posts the note and files, then reloads.
    ///
    /// A failure after the commit is reported as [`WorkflowError::PartiallyApplied`];
    /// the committed status is never rolled back.
    pub async fn change_status(
        &self,
        request: &CaseRequest,
        change: StatusChange,
    ) -> Result<StatusChangeOutcome, WorkflowError> {
        if change.status_code.is_blank() {
            return Err(WorkflowError::validation("a destination status is required"));
        }
        if change.status_code == request.status_code {
            return Err(WorkflowError::NoOpTransition {
                status: change.status_code,
            });
        }
        self.guard().check_status_change(request)?;

        let submission = StatusChangeSubmission {
            status_code: change.status_code.clone(),
            important_date_at: change.important_date_at.clone(),
            comment: change.comment_text().map(str::to_owned),
        };
        let receipt = self
            .backend
            .submit_status_change(&request.id, submission)
            .await?;
        tracing::info!(
            request_id = %request.id,
            actor_id = %self.actor.id,
            from_status = %receipt.from_status,
            to_status = %receipt.to_status,
            "status change committed"
        );

        let mut note = None;
        let mut attachments = Vec::with_capacity(change.files.len());
        if change.needs_annotation() {
            let body = status_note_body(&receipt, change.comment_text());
            let message = self
                .backend
                .post_message(&request.id, NewChatMessage { body })
                .await
                .map_err(|error| partially_applied(&receipt, FollowUpStage::Annotation, error))?;

            for upload in change.files {
                let file_name = upload.file_name.clone();
                let attachment = self
                    .backend
                    .upload_attachment(&request.id, &message.id, upload)
                    .await
                    .map_err(|error| {
                        tracing::warn!(
                            request_id = %request.id,
                            file_name = %file_name,
                            error = %error,
                            "attachment upload failed after status change"
                        );
                        partially_applied(&receipt, FollowUpStage::AttachmentUpload, error)
                    })?;
                attachments.push(attachment);
            }
            note = Some(message);
        }

        let workspace = self
            .backend
            .load_workspace(&request.id)
            .await
            .map_err(|error| partially_applied(&receipt, FollowUpStage::Reload, error))?;

        Ok(StatusChangeOutcome {
            receipt,
            note,
            attachments,
            workspace,
        })
    }

    pub async fn claim(&self, request: &CaseRequest) -> Result<WorkspaceSnapshot, WorkflowError> {
        self.guard().check_claim(request)?;
        self.backend.claim(&request.id).await?;
        tracing::info!(
            request_id = %request.id,
            lawyer_id = %self.actor.id,
            "request claimed"
        );
        self.backend.load_workspace(&request.id).await
    }

    pub async fn reassign(
        &self,
        request: &CaseRequest,
        lawyer_id: &ActorId,
    ) -> Result<WorkspaceSnapshot, WorkflowError> {
        self.guard().check_reassign(request, lawyer_id)?;
        self.backend.reassign(&request.id, lawyer_id).await?;
        tracing::info!(
            request_id = %request.id,
            lawyer_id = %lawyer_id,
            "request reassigned"
        );
        self.backend.load_workspace(&request.id).await
    }
}

fn partially_applied(
    receipt: &StatusChangeReceipt,
    stage: FollowUpStage,
    error: WorkflowError,
) -> WorkflowError {
    tracing::warn!(
        from_status = %receipt.from_status,
        to_status = %receipt.to_status,
        stage = %stage,
        error = %error,
        "status change committed but follow-up failed"
    );
    WorkflowError::PartiallyApplied {
        committed: receipt.clone(),
        stage,
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_request, RecordingBackend, RecordedCall};
    use caseflow_domain::ActorRole;

    fn lawyer_controller(backend: Arc<RecordingBackend>) -> WorkflowController {
        WorkflowController::new(backend, Actor::new("lawyer-1", ActorRole::Lawyer))
    }

    #[test]
    fn note_body_starts_with_the_synthesized_line() {
        let receipt = StatusChangeReceipt {
            from_status: "NEW".into(),
            to_status: "REVIEW".into(),
        };

        assert_eq!(
            status_note_body(&receipt, Some("  documents checked ")),
            "Status change: NEW -> REVIEW\ndocuments checked"
        );
        assert_eq!(
            status_note_body(&receipt, Some("   ")),
            "Status change: NEW -> REVIEW"
        );
    }

    #[tokio::test]
    async fn same_status_fails_fast_without_network() {
        let backend = Arc::new(RecordingBackend::default());
        let controller = lawyer_controller(backend.clone());
        let request = sample_request("NEW", Some("lawyer-1"));

        let error = controller
            .change_status(&request, StatusChange::to("NEW"))
            .await
            .expect_err("no-op");

        assert!(matches!(error, WorkflowError::NoOpTransition { .. }));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn plain_change_skips_annotation_and_reloads() {
        let backend = Arc::new(RecordingBackend::default());
        let controller = lawyer_controller(backend.clone());
        let request = sample_request("NEW", Some("lawyer-1"));

        let outcome = controller
            .change_status(&request, StatusChange::to("REVIEW"))
            .await
            .expect("change status");

        assert_eq!(outcome.note, None);
        assert_eq!(
            backend.calls(),
            vec![
                RecordedCall::SubmitStatusChange {
                    request_id: "r-1".into(),
                    status_code: "REVIEW".into(),
                    comment: None,
                },
                RecordedCall::LoadWorkspace("r-1".into()),
            ]
        );
    }

    #[tokio::test]
    async fn comment_and_files_are_posted_in_order() {
        let backend = Arc::new(RecordingBackend::default());
        let controller = lawyer_controller(backend.clone());
        let request = sample_request("NEW", Some("lawyer-1"));
        let change = StatusChange {
            status_code: "REVIEW".into(),
            important_date_at: Some("2026-03-03T10:00:00Z".to_owned()),
            comment: Some("see attached".to_owned()),
            files: vec![AttachmentUpload {
                file_name: "scan.pdf".to_owned(),
                mime_type: "application/pdf".to_owned(),
                bytes: vec![1, 2, 3],
            }],
        };

        let outcome = controller
            .change_status(&request, change)
            .await
            .expect("change status");

        assert_eq!(outcome.attachments.len(), 1);
        let calls = backend.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(
            calls[1],
            RecordedCall::PostMessage {
                request_id: "r-1".into(),
                body: "Status change: NEW -> REVIEW\nsee attached".to_owned(),
            }
        );
        assert!(matches!(calls[2], RecordedCall::UploadAttachment { .. }));
        assert_eq!(calls[3], RecordedCall::LoadWorkspace("r-1".into()));
    }

    #[tokio::test]
    async fn failed_annotation_keeps_committed_status_and_skips_reload() {
        let backend = Arc::new(RecordingBackend::default());
        backend.fail_next_post(WorkflowError::network("chat offline"));
        let controller = lawyer_controller(backend.clone());
        let request = sample_request("NEW", Some("lawyer-1"));
        let change = StatusChange {
            comment: Some("note".to_owned()),
            ..StatusChange::to("REVIEW")
        };

        let error = controller
            .change_status(&request, change)
            .await
            .expect_err("annotation failure");

        assert_eq!(error.committed_status(), Some(&StatusCode::from("REVIEW")));
        assert!(matches!(
            error,
            WorkflowError::PartiallyApplied {
                stage: FollowUpStage::Annotation,
                ..
            }
        ));
        assert!(!backend
            .calls()
            .iter()
            .any(|call| matches!(call, RecordedCall::LoadWorkspace(_))));
    }

    #[tokio::test]
    async fn ambiguous_move_does_not_touch_the_backend() {
        let backend = Arc::new(RecordingBackend::default());
        let controller = lawyer_controller(backend.clone());
        let mut request = sample_request("NEW", Some("lawyer-1"));
        request.available_transitions = vec![
            caseflow_domain::AvailableTransition {
                to_status: "REJECTED".into(),
                to_status_name: "Rejected".to_owned(),
                target_group: Some(StatusGroup::Done),
            },
            caseflow_domain::AvailableTransition {
                to_status: "WITHDRAWN".into(),
                to_status_name: "Withdrawn".to_owned(),
                target_group: Some(StatusGroup::Done),
            },
        ];

        let outcome = controller
            .move_request(&request, Some(StatusGroup::Done), None, StatusChange::default())
            .await
            .expect("move");

        assert_eq!(
            outcome,
            MoveOutcome::NeedsChoice {
                candidates: vec!["REJECTED".into(), "WITHDRAWN".into()],
            }
        );
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn lawyer_reassign_is_refused_before_any_call() {
        let backend = Arc::new(RecordingBackend::default());
        let controller = lawyer_controller(backend.clone());

        let error = controller
            .reassign(&sample_request("REVIEW", Some("lawyer-1")), &"lawyer-2".into())
            .await
            .expect_err("lawyer reassign");

        assert!(matches!(error, WorkflowError::PermissionDenied(_)));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn admin_reassign_reaches_the_backend() {
        let backend = Arc::new(RecordingBackend::default());
        let controller =
            WorkflowController::new(backend.clone(), Actor::new("admin-1", ActorRole::Admin));

        controller
            .reassign(&sample_request("REVIEW", Some("lawyer-1")), &"lawyer-2".into())
            .await
            .expect("reassign");

        assert_eq!(
            backend.calls()[0],
            RecordedCall::Reassign("r-1".into(), "lawyer-2".into())
        );
    }

    #[tokio::test]
    async fn claim_reloads_after_success() {
        let backend = Arc::new(RecordingBackend::default());
        let controller = lawyer_controller(backend.clone());

        controller
            .claim(&sample_request("NEW", None))
            .await
            .expect("claim");

        assert_eq!(
            backend.calls(),
            vec![
                RecordedCall::Claim("r-1".into()),
                RecordedCall::LoadWorkspace("r-1".into()),
            ]
        );
    }
}
