pub mod adapters;
pub mod board;
pub mod controller;
pub mod data_template;
pub mod error;
pub mod flow;
pub mod graph;
pub mod guard;
pub mod resolver;
pub mod timestamps;

#[cfg(test)]
mod test_support;

pub use adapters::{
    CaseBackend, DataTemplateBackend, PresenceBackend, StatusChangeSubmission, TemplateQuery,
    TopicWorkflowDefinition,
};
pub use board::{bucket_rows, default_label, BoardLane};
pub use controller::{
    status_note_body, MoveOutcome, StatusChange, StatusChangeOutcome, WorkflowController,
};
pub use data_template::{
    is_locked_for, manual_row, merge_rows, row_from_catalog, rows_from_template,
    DataRequestSheet, RowIdentity,
};
pub use error::{FollowUpStage, WorkflowError};
pub use flow::{FlowTarget, TransitionFlow};
pub use graph::StatusGraph;
pub use guard::ClaimReassignGuard;
pub use resolver::{current_group, resolve, CurrentGroup, GroupSource, Resolution};
pub use timestamps::{compare_stamps, format_rfc3339, parse_rfc3339};
