use async_trait::async_trait;
use caseflow_domain::{
    ActorId, Attachment, AttachmentUpload, BoardQuery, ChatMessage, DataTemplate,
    DataTemplateSummary, DataValueUpdate, KanbanBoard, LivenessResponse, MessageId,
    NewChatMessage, RequestId, Status, StatusChangeReceipt, StatusCode, StatusTransition,
    TemplateId, Topic, TopicCode, WorkspaceSnapshot,
};
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

/// Body of `POST /status-change`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChangeSubmission {
    pub status_code: StatusCode,
    pub important_date_at: Option<String>,
    pub comment: Option<String>,
}

/// Everything needed to build a [`crate::StatusGraph`] for one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicWorkflowDefinition {
    pub topic: Topic,
    #[serde(default)]
    pub statuses: Vec<Status>,
    #[serde(default)]
    pub transitions: Vec<StatusTransition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TemplateQuery {
    pub topic_code: Option<TopicCode>,
    pub search: Option<String>,
}

/// Request workflow endpoints. The server stays authoritative for every mutation.
#[async_trait]
pub trait CaseBackend: Send + Sync {
    async fn load_board(&self, query: BoardQuery) -> Result<KanbanBoard, WorkflowError>;
    async fn load_topic_workflow(
        &self,
        topic_code: &TopicCode,
    ) -> Result<TopicWorkflowDefinition, WorkflowError>;
    async fn load_workspace(&self, request_id: &RequestId)
        -> Result<WorkspaceSnapshot, WorkflowError>;
    async fn submit_status_change(
        &self,
        request_id: &RequestId,
        submission: StatusChangeSubmission,
    ) -> Result<StatusChangeReceipt, WorkflowError>;
    async fn claim(&self, request_id: &RequestId) -> Result<(), WorkflowError>;
    async fn reassign(
        &self,
        request_id: &RequestId,
        lawyer_id: &ActorId,
    ) -> Result<(), WorkflowError>;
    async fn post_message(
        &self,
        request_id: &RequestId,
        message: NewChatMessage,
    ) -> Result<ChatMessage, WorkflowError>;
    async fn upload_attachment(
        &self,
        request_id: &RequestId,
        message_id: &MessageId,
        upload: AttachmentUpload,
    ) -> Result<Attachment, WorkflowError>;
}

#[async_trait]
pub trait DataTemplateBackend: Send + Sync {
    async fn list_templates(
        &self,
        query: TemplateQuery,
    ) -> Result<Vec<DataTemplateSummary>, WorkflowError>;
    async fn get_template(&self, template_id: &TemplateId) -> Result<DataTemplate, WorkflowError>;
    /// Updates the template when it carries an id, creates it otherwise.
    async fn save_template(&self, template: DataTemplate) -> Result<DataTemplate, WorkflowError>;
    async fn save_data_values(
        &self,
        request_id: &RequestId,
        updates: Vec<DataValueUpdate>,
    ) -> Result<(), WorkflowError>;
}

/// Liveness and typing endpoints used by the presence crate.
#[async_trait]
pub trait PresenceBackend: Send + Sync {
    async fn probe_liveness(
        &self,
        request_id: &RequestId,
        cursor: Option<&str>,
    ) -> Result<LivenessResponse, WorkflowError>;
    async fn signal_typing(&self, request_id: &RequestId, typing: bool)
        -> Result<(), WorkflowError>;
}
