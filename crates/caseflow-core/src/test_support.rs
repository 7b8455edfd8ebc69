use std::sync::Mutex;

use async_trait::async_trait;
use caseflow_domain::{
    ActorId, Attachment, AttachmentUpload, BoardQuery, CaseRequest, ChatMessage, KanbanBoard,
    MessageId, NewChatMessage, RequestId, StatusChangeReceipt, StatusCode, StatusRoute,
    TopicCode, WorkspaceSnapshot,
};

use crate::adapters::{CaseBackend, StatusChangeSubmission, TopicWorkflowDefinition};
use crate::error::WorkflowError;

pub(crate) fn sample_request(status: &str, assigned: Option<&str>) -> CaseRequest {
    CaseRequest {
        id: "r-1".into(),
        track_number: "TRK-0001".to_owned(),
        topic_code: "DIVORCE".into(),
        status_code: status.into(),
        status_name: None,
        assigned_lawyer_id: assigned.map(ActorId::from),
        available_transitions: Vec::new(),
        status_group: None,
        important_date_at: None,
        updated_at: None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RecordedCall {
    SubmitStatusChange {
        request_id: RequestId,
        status_code: StatusCode,
        comment: Option<String>,
    },
    PostMessage {
        request_id: RequestId,
        body: String,
    },
    UploadAttachment {
        message_id: MessageId,
        file_name: String,
    },
    LoadWorkspace(RequestId),
    Claim(RequestId),
    Reassign(RequestId, ActorId),
}

/// Accepts every call and remembers it. Status changes report the current status
/// of [`sample_request`] as their origin.
#[derive(Default)]
pub(crate) struct RecordingBackend {
    calls: Mutex<Vec<RecordedCall>>,
    post_failure: Mutex<Option<WorkflowError>>,
}

impl RecordingBackend {
    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub(crate) fn fail_next_post(&self, error: WorkflowError) {
        *self.post_failure.lock().expect("failure lock") = Some(error);
    }

    fn record(&self, call: RecordedCall) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

#[async_trait]
impl CaseBackend for RecordingBackend {
    async fn load_board(&self, _query: BoardQuery) -> Result<KanbanBoard, WorkflowError> {
        Ok(KanbanBoard {
            rows: vec![sample_request("NEW", None)],
            columns: Vec::new(),
            total: 1,
            truncated: false,
        })
    }

    async fn load_topic_workflow(
        &self,
        _topic_code: &TopicCode,
    ) -> Result<TopicWorkflowDefinition, WorkflowError> {
        Err(WorkflowError::network("not stubbed"))
    }

    async fn load_workspace(
        &self,
        request_id: &RequestId,
    ) -> Result<WorkspaceSnapshot, WorkflowError> {
        self.record(RecordedCall::LoadWorkspace(request_id.clone()));
        let request = sample_request("NEW", None);
        Ok(WorkspaceSnapshot {
            status_route: StatusRoute {
                steps: Vec::new(),
                current: request.status_code.clone(),
                next: Vec::new(),
            },
            request,
            messages: Vec::new(),
            attachments: Vec::new(),
            history: Vec::new(),
        })
    }

    async fn submit_status_change(
        &self,
        request_id: &RequestId,
        submission: StatusChangeSubmission,
    ) -> Result<StatusChangeReceipt, WorkflowError> {
        self.record(RecordedCall::SubmitStatusChange {
            request_id: request_id.clone(),
            status_code: submission.status_code.clone(),
            comment: submission.comment,
        });
        Ok(StatusChangeReceipt {
            from_status: "NEW".into(),
            to_status: submission.status_code,
        })
    }

    async fn claim(&self, request_id: &RequestId) -> Result<(), WorkflowError> {
        self.record(RecordedCall::Claim(request_id.clone()));
        Ok(())
    }

    async fn reassign(
        &self,
        request_id: &RequestId,
        lawyer_id: &ActorId,
    ) -> Result<(), WorkflowError> {
        self.record(RecordedCall::Reassign(request_id.clone(), lawyer_id.clone()));
        Ok(())
    }

    async fn post_message(
        &self,
        request_id: &RequestId,
        message: NewChatMessage,
    ) -> Result<ChatMessage, WorkflowError> {
        self.record(RecordedCall::PostMessage {
            request_id: request_id.clone(),
            body: message.body.clone(),
        });
        if let Some(error) = self.post_failure.lock().expect("failure lock").take() {
            return Err(error);
        }
        Ok(ChatMessage {
            id: "m-1".into(),
            request_id: request_id.clone(),
            author_label: "lawyer-1".to_owned(),
            body: message.body,
            created_at: "2026-03-01T10:00:00Z".to_owned(),
            updated_at: None,
        })
    }

    async fn upload_attachment(
        &self,
        request_id: &RequestId,
        message_id: &MessageId,
        upload: AttachmentUpload,
    ) -> Result<Attachment, WorkflowError> {
        self.record(RecordedCall::UploadAttachment {
            message_id: message_id.clone(),
            file_name: upload.file_name.clone(),
        });
        Ok(Attachment {
            id: "a-1".into(),
            request_id: request_id.clone(),
            message_id: Some(message_id.clone()),
            size_bytes: upload.bytes.len() as u64,
            file_name: upload.file_name,
            mime_type: upload.mime_type,
            created_at: "2026-03-01T10:00:01Z".to_owned(),
            updated_at: None,
        })
    }
}
