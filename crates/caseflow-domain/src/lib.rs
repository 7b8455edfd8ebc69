//! Domain model shared by the request workflow and live-collaboration crates.

pub mod actor;
pub mod board;
pub mod chat;
pub mod data_request;
pub mod identifiers;
pub mod presence;
pub mod request;
pub mod status;

pub use actor::{Actor, ActorRole, ActorSide};
pub use board::{BoardFilter, BoardQuery, KanbanBoard, KanbanColumn, SortMode};
pub use chat::{Attachment, AttachmentUpload, ChatMessage, NewChatMessage};
pub use data_request::{
    CatalogField, DataFieldType, DataRequestRow, DataTemplate, DataTemplateItem,
    DataTemplateSummary, DataValue, DataValueKey, DataValueUpdate, FillState,
};
pub use identifiers::{
    ActorId, AttachmentId, MessageId, RequestId, StatusCode, TemplateId, TopicCode,
};
pub use presence::{LivenessResponse, TypingPeer};
pub use request::{
    AvailableTransition, CaseRequest, RouteStep, StatusChangeReceipt, StatusHistoryEntry,
    StatusRoute, WorkspaceSnapshot,
};
pub use status::{Status, StatusGroup, StatusTransition, Topic};
