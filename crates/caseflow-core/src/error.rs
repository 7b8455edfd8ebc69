use std::fmt;

use caseflow_domain::{StatusChangeReceipt, StatusCode, StatusGroup};
use thiserror::Error;

/// Follow-up step of a status change that runs after the mutation committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUpStage {
    Annotation,
    AttachmentUpload,
    Reload,
}

impl fmt::Display for FollowUpStage {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Annotation => "posting the status note",
            Self::AttachmentUpload => "uploading attachments",
            Self::Reload => "reloading the workspace",
        };
        formatter.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("no legal transition from '{from}' into the {group} column")]
    NoLegalTransition { from: StatusCode, group: StatusGroup },
    #[error("request is already in status '{status}'")]
    NoOpTransition { status: StatusCode },
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("network failure: {0}")]
    NetworkFailure(String),
    #[error("validation failed: {0}")]
    ValidationFailure(String),
    #[error(
        "status changed from '{}' to '{}', but {stage} failed: {reason}",
        .committed.from_status,
        .committed.to_status
    )]
    PartiallyApplied {
        committed: StatusChangeReceipt,
        stage: FollowUpStage,
        reason: String,
    },
}

impl WorkflowError {
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailure(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkFailure(message.into())
    }

    /// Status that is known to be committed server-side despite this error, if any.
    pub fn committed_status(&self) -> Option<&StatusCode> {
        match self {
            Self::PartiallyApplied { committed, .. } => Some(&committed.to_status),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkFailure(_))
    }
}
