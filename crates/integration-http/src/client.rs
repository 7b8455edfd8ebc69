use std::sync::Arc;

use async_trait::async_trait;
use caseflow_core::{
    CaseBackend, DataTemplateBackend, PresenceBackend, StatusChangeSubmission, TemplateQuery,
    TopicWorkflowDefinition, WorkflowError,
};
use caseflow_domain::{
    ActorId, Attachment, AttachmentUpload, BoardQuery, CaseRequest, ChatMessage, DataTemplate,
    DataTemplateSummary, DataValueUpdate, KanbanBoard, LivenessResponse, MessageId,
    NewChatMessage, RequestId, StatusChangeReceipt, StatusHistoryEntry, StatusRoute, TemplateId,
    TopicCode, WorkspaceSnapshot,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::transport::{ApiRequest, ApiTransport, HttpBackendConfig, ReqwestTransport};

/// REST client for the case-tracking backend. Implements every backend seam the
/// workflow and presence crates consume.
#[derive(Clone)]
pub struct HttpCaseflowClient {
    transport: Arc<dyn ApiTransport>,
}

impl HttpCaseflowClient {
    pub fn new(config: &HttpBackendConfig) -> Result<Self, WorkflowError> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::with_transport(Arc::new(transport)))
    }

    pub fn with_transport(transport: Arc<dyn ApiTransport>) -> Self {
        Self { transport }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        context: &str,
    ) -> Result<T, WorkflowError> {
        let payload = self.transport.execute(request).await?;
        decode(payload, context)
    }

    async fn fetch_list<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        key: &str,
    ) -> Result<Vec<T>, WorkflowError> {
        let payload = self.transport.execute(request).await?;
        extract_list(payload, key)
    }

    async fn send(&self, request: ApiRequest) -> Result<(), WorkflowError> {
        self.transport.execute(request).await.map(|_| ())
    }
}

fn request_path(request_id: &RequestId, leaf: &str) -> [String; 3] {
    [
        "requests".to_owned(),
        request_id.as_str().to_owned(),
        leaf.to_owned(),
    ]
}

fn decode<T: DeserializeOwned>(payload: Value, context: &str) -> Result<T, WorkflowError> {
    serde_json::from_value(payload).map_err(|error| {
        WorkflowError::network(format!("caseflow API returned a malformed {context}: {error}"))
    })
}

/// Accepts either a bare array or an object wrapping the array under `key`.
fn extract_list<T: DeserializeOwned>(payload: Value, key: &str) -> Result<Vec<T>, WorkflowError> {
    match payload {
        Value::Null => Ok(Vec::new()),
        Value::Array(_) => decode(payload, key),
        Value::Object(mut object) => match object.remove(key) {
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(list) => decode(list, key),
        },
        other => Err(WorkflowError::network(format!(
            "caseflow API returned {other} where a list of {key} was expected"
        ))),
    }
}

#[async_trait]
impl CaseBackend for HttpCaseflowClient {
    async fn load_board(&self, query: BoardQuery) -> Result<KanbanBoard, WorkflowError> {
        let mut request = ApiRequest::get(["kanban"])
            .with_query("limit", query.limit.to_string())
            .with_query("sort_mode", query.sort_mode.as_key());
        if !query.filters.is_empty() {
            let filters = serde_json::to_string(&query.filters).map_err(|error| {
                WorkflowError::validation(format!("board filters cannot be encoded: {error}"))
            })?;
            request = request.with_query("filters", filters);
        }
        self.fetch(request, "kanban board").await
    }

    async fn load_topic_workflow(
        &self,
        topic_code: &TopicCode,
    ) -> Result<TopicWorkflowDefinition, WorkflowError> {
        let request = ApiRequest::get(["topics", topic_code.as_str(), "workflow"]);
        self.fetch(request, "topic workflow").await
    }

    async fn load_workspace(
        &self,
        request_id: &RequestId,
    ) -> Result<WorkspaceSnapshot, WorkflowError> {
        let (request, messages, attachments, status_route, history) = tokio::try_join!(
            self.fetch::<CaseRequest>(ApiRequest::get(["requests", request_id.as_str()]), "request"),
            self.fetch_list::<ChatMessage>(
                ApiRequest::get(request_path(request_id, "messages")),
                "messages"
            ),
            self.fetch_list::<Attachment>(
                ApiRequest::get(request_path(request_id, "attachments")),
                "attachments"
            ),
            self.fetch::<StatusRoute>(
                ApiRequest::get(request_path(request_id, "status-route")),
                "status route"
            ),
            self.fetch_list::<StatusHistoryEntry>(
                ApiRequest::get(request_path(request_id, "status-history")),
                "history"
            ),
        )?;
        Ok(WorkspaceSnapshot {
            request,
            messages,
            attachments,
            status_route,
            history,
        })
    }

    async fn submit_status_change(
        &self,
        request_id: &RequestId,
        submission: StatusChangeSubmission,
    ) -> Result<StatusChangeReceipt, WorkflowError> {
        let body = serde_json::to_value(&submission).map_err(|error| {
            WorkflowError::validation(format!("status change cannot be encoded: {error}"))
        })?;
        let request = ApiRequest::post(request_path(request_id, "status-change")).with_json(body);
        self.fetch(request, "status change receipt").await
    }

    async fn claim(&self, request_id: &RequestId) -> Result<(), WorkflowError> {
        self.send(ApiRequest::post(request_path(request_id, "claim")))
            .await
    }

    async fn reassign(
        &self,
        request_id: &RequestId,
        lawyer_id: &ActorId,
    ) -> Result<(), WorkflowError> {
        let request = ApiRequest::post(request_path(request_id, "reassign"))
            .with_json(json!({ "lawyer_id": lawyer_id }));
        self.send(request).await
    }

    async fn post_message(
        &self,
        request_id: &RequestId,
        message: NewChatMessage,
    ) -> Result<ChatMessage, WorkflowError> {
        let request = ApiRequest::post(request_path(request_id, "messages"))
            .with_json(json!({ "body": message.body }));
        self.fetch(request, "chat message").await
    }

    async fn upload_attachment(
        &self,
        request_id: &RequestId,
        message_id: &MessageId,
        upload: AttachmentUpload,
    ) -> Result<Attachment, WorkflowError> {
        let request = ApiRequest::post(request_path(request_id, "attachments")).with_file(
            vec![("message_id".to_owned(), message_id.as_str().to_owned())],
            upload,
        );
        self.fetch(request, "attachment").await
    }
}

#[async_trait]
impl DataTemplateBackend for HttpCaseflowClient {
    async fn list_templates(
        &self,
        query: TemplateQuery,
    ) -> Result<Vec<DataTemplateSummary>, WorkflowError> {
        let mut request = ApiRequest::get(["data-templates"]);
        if let Some(topic_code) = query.topic_code.filter(|code| !code.is_blank()) {
            request = request.with_query("topic_code", topic_code.as_str());
        }
        if let Some(search) = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|search| !search.is_empty())
        {
            request = request.with_query("search", search);
        }
        self.fetch_list(request, "templates").await
    }

    async fn get_template(&self, template_id: &TemplateId) -> Result<DataTemplate, WorkflowError> {
        self.fetch(
            ApiRequest::get(["data-templates", template_id.as_str()]),
            "data template",
        )
        .await
    }

    async fn save_template(&self, template: DataTemplate) -> Result<DataTemplate, WorkflowError> {
        if template.name.trim().is_empty() {
            return Err(WorkflowError::validation("template name is required"));
        }
        let body = serde_json::to_value(&template).map_err(|error| {
            WorkflowError::validation(format!("data template cannot be encoded: {error}"))
        })?;
        let request = match template.id.as_ref().filter(|id| !id.is_blank()) {
            Some(id) => ApiRequest::put(["data-templates", id.as_str()]),
            None => ApiRequest::post(["data-templates"]),
        };
        self.fetch(request.with_json(body), "data template").await
    }

    async fn save_data_values(
        &self,
        request_id: &RequestId,
        updates: Vec<DataValueUpdate>,
    ) -> Result<(), WorkflowError> {
        if updates.is_empty() {
            return Ok(());
        }
        let request = ApiRequest::post(request_path(request_id, "data-values"))
            .with_json(json!({ "items": updates }));
        self.send(request).await
    }
}

#[async_trait]
impl PresenceBackend for HttpCaseflowClient {
    async fn probe_liveness(
        &self,
        request_id: &RequestId,
        cursor: Option<&str>,
    ) -> Result<LivenessResponse, WorkflowError> {
        let mut request = ApiRequest::get(request_path(request_id, "liveness"));
        if let Some(cursor) = cursor.map(str::trim).filter(|cursor| !cursor.is_empty()) {
            request = request.with_query("cursor", cursor);
        }
        let payload = self.transport.execute(request).await?;
        if payload.is_null() {
            return Ok(LivenessResponse::default());
        }
        decode(payload, "liveness response")
    }

    async fn signal_typing(&self, request_id: &RequestId, typing: bool) -> Result<(), WorkflowError> {
        let request = ApiRequest::post(request_path(request_id, "typing"))
            .with_json(json!({ "typing": typing }));
        self.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{HttpMethod, RequestBody};
    use caseflow_domain::{BoardFilter, DataValue, DataValueKey, SortMode};
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    #[derive(Debug, Default)]
    struct StubTransport {
        requests: Mutex<Vec<ApiRequest>>,
        responses: Mutex<VecDeque<Result<Value, WorkflowError>>>,
    }

    impl StubTransport {
        async fn push_response(&self, value: Value) {
            self.responses.lock().await.push_back(Ok(value));
        }

        async fn push_error(&self, error: WorkflowError) {
            self.responses.lock().await.push_back(Err(error));
        }

        async fn requests(&self) -> Vec<ApiRequest> {
            self.requests.lock().await.clone()
        }
    }

    #[async_trait]
    impl ApiTransport for StubTransport {
        async fn execute(&self, request: ApiRequest) -> Result<Value, WorkflowError> {
            let path = request.path();
            self.requests.lock().await.push(request);
            let mut responses = self.responses.lock().await;
            if let Some(response) = responses.pop_front() {
                return response;
            }
            // Workspace loads fan out concurrently; answer those by path.
            Ok(match path.rsplit('/').next().unwrap_or_default() {
                "messages" | "attachments" | "status-history" => json!([]),
                "status-route" => json!({ "current": "NEW", "steps": [], "next": [] }),
                _ => json!({
                    "id": "r-1",
                    "topic_code": "DIVORCE",
                    "status_code": "NEW"
                }),
            })
        }
    }

    fn client_with(stub: &Arc<StubTransport>) -> HttpCaseflowClient {
        HttpCaseflowClient::with_transport(stub.clone())
    }

    #[tokio::test]
    async fn board_query_carries_limit_sort_and_json_filters() {
        let stub = Arc::new(StubTransport::default());
        stub.push_response(json!({
            "rows": [{
                "id": "r-1",
                "topic_code": "DIVORCE",
                "status_code": "NEW",
                "status_group": "NEW",
                "available_transitions": []
            }],
            "columns": [{ "group": "NEW", "label": "New" }],
            "total": 1,
            "truncated": false
        }))
        .await;
        let client = client_with(&stub);

        let board = client
            .load_board(BoardQuery {
                limit: 400,
                sort_mode: SortMode::ImportantDate,
                filters: vec![BoardFilter {
                    field: "topic_code".to_owned(),
                    op: "=".to_owned(),
                    value: json!("DIVORCE"),
                }],
            })
            .await
            .expect("board");

        assert_eq!(board.rows.len(), 1);
        let requests = stub.requests().await;
        assert_eq!(requests[0].method, HttpMethod::Get);
        assert_eq!(requests[0].path(), "kanban");
        assert_eq!(requests[0].query_value("limit"), Some("400"));
        assert_eq!(requests[0].query_value("sort_mode"), Some("important_date"));
        assert_eq!(
            requests[0].query_value("filters"),
            Some(r#"[{"field":"topic_code","op":"=","value":"DIVORCE"}]"#)
        );
    }

    #[tokio::test]
    async fn empty_filters_are_not_sent() {
        let stub = Arc::new(StubTransport::default());
        stub.push_response(json!({ "rows": [], "columns": [], "total": 0 }))
            .await;
        let client = client_with(&stub);

        client
            .load_board(BoardQuery {
                limit: 10,
                sort_mode: SortMode::UpdatedDesc,
                filters: Vec::new(),
            })
            .await
            .expect("board");

        assert_eq!(stub.requests().await[0].query_value("filters"), None);
    }

    #[tokio::test]
    async fn status_change_posts_the_submission_and_decodes_the_receipt() {
        let stub = Arc::new(StubTransport::default());
        stub.push_response(json!({ "from_status": "NEW", "to_status": "REVIEW" }))
            .await;
        let client = client_with(&stub);

        let receipt = client
            .submit_status_change(
                &"r-1".into(),
                StatusChangeSubmission {
                    status_code: "REVIEW".into(),
                    important_date_at: Some("2026-03-04T09:00:00Z".to_owned()),
                    comment: None,
                },
            )
            .await
            .expect("receipt");

        assert_eq!(receipt.to_status.as_str(), "REVIEW");
        let requests = stub.requests().await;
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].path(), "requests/r-1/status-change");
        assert_eq!(
            requests[0].body,
            RequestBody::Json(json!({
                "status_code": "REVIEW",
                "important_date_at": "2026-03-04T09:00:00Z",
                "comment": null
            }))
        );
    }

    #[tokio::test]
    async fn permission_errors_pass_through_unchanged() {
        let stub = Arc::new(StubTransport::default());
        stub.push_error(WorkflowError::permission_denied("HTTP 409: already assigned"))
            .await;
        let client = client_with(&stub);

        let error = client.claim(&"r-1".into()).await.expect_err("conflict");
        assert_eq!(
            error,
            WorkflowError::PermissionDenied("HTTP 409: already assigned".to_owned())
        );
    }

    #[tokio::test]
    async fn workspace_reload_assembles_all_parts() {
        let stub = Arc::new(StubTransport::default());
        let client = client_with(&stub);

        let snapshot = client.load_workspace(&"r-1".into()).await.expect("workspace");

        assert_eq!(snapshot.request.id.as_str(), "r-1");
        assert_eq!(snapshot.status_route.current.as_str(), "NEW");
        let mut paths = stub
            .requests()
            .await
            .iter()
            .map(ApiRequest::path)
            .collect::<Vec<_>>();
        paths.sort();
        assert_eq!(
            paths,
            vec![
                "requests/r-1",
                "requests/r-1/attachments",
                "requests/r-1/messages",
                "requests/r-1/status-history",
                "requests/r-1/status-route",
            ]
        );
    }

    #[tokio::test]
    async fn attachments_upload_as_multipart_tied_to_the_message() {
        let stub = Arc::new(StubTransport::default());
        stub.push_response(json!({
            "id": "a-1",
            "request_id": "r-1",
            "message_id": "m-1",
            "file_name": "scan.pdf",
            "mime_type": "application/pdf",
            "size_bytes": 3,
            "created_at": "2026-03-01T10:00:00Z"
        }))
        .await;
        let client = client_with(&stub);
        let upload = AttachmentUpload {
            file_name: "scan.pdf".to_owned(),
            mime_type: "application/pdf".to_owned(),
            bytes: vec![1, 2, 3],
        };

        let attachment = client
            .upload_attachment(&"r-1".into(), &"m-1".into(), upload.clone())
            .await
            .expect("attachment");

        assert_eq!(attachment.message_id, Some(MessageId::from("m-1")));
        assert_eq!(
            stub.requests().await[0].body,
            RequestBody::Multipart {
                fields: vec![("message_id".to_owned(), "m-1".to_owned())],
                file: upload,
            }
        );
    }

    #[tokio::test]
    async fn save_template_updates_by_id_or_creates() {
        let stub = Arc::new(StubTransport::default());
        let saved = json!({ "id": "t-9", "name": "Intake", "items": [] });
        stub.push_response(saved.clone()).await;
        stub.push_response(saved).await;
        let client = client_with(&stub);
        let template = DataTemplate {
            id: None,
            name: "Intake".to_owned(),
            topic_code: Some("DIVORCE".into()),
            items: Vec::new(),
        };

        client
            .save_template(template.clone())
            .await
            .expect("create");
        client
            .save_template(DataTemplate {
                id: Some("t-9".into()),
                ..template
            })
            .await
            .expect("update");

        let requests = stub.requests().await;
        assert_eq!(
            (requests[0].method, requests[0].path()),
            (HttpMethod::Post, "data-templates".to_owned())
        );
        assert_eq!(
            (requests[1].method, requests[1].path()),
            (HttpMethod::Put, "data-templates/t-9".to_owned())
        );
    }

    #[tokio::test]
    async fn template_list_accepts_wrapped_or_bare_arrays() {
        let stub = Arc::new(StubTransport::default());
        stub.push_response(json!({ "templates": [{ "id": "t-1", "name": "Intake" }] }))
            .await;
        stub.push_response(json!([{ "id": "t-2", "name": "Assets" }]))
            .await;
        let client = client_with(&stub);

        let wrapped = client
            .list_templates(TemplateQuery {
                topic_code: Some("DIVORCE".into()),
                search: Some("  ".to_owned()),
            })
            .await
            .expect("wrapped");
        let bare = client
            .list_templates(TemplateQuery::default())
            .await
            .expect("bare");

        assert_eq!(wrapped[0].id.as_str(), "t-1");
        assert_eq!(bare[0].id.as_str(), "t-2");
        let requests = stub.requests().await;
        assert_eq!(requests[0].query_value("topic_code"), Some("DIVORCE"));
        assert_eq!(requests[0].query_value("search"), None);
    }

    #[tokio::test]
    async fn data_values_are_batched_and_empty_batches_skipped() {
        let stub = Arc::new(StubTransport::default());
        let client = client_with(&stub);

        client
            .save_data_values(&"r-1".into(), Vec::new())
            .await
            .expect("empty batch");
        assert!(stub.requests().await.is_empty());

        stub.push_response(Value::Null).await;
        client
            .save_data_values(
                &"r-1".into(),
                vec![DataValueUpdate {
                    target: DataValueKey::Key {
                        key: "birth_date".to_owned(),
                    },
                    value: DataValue::Text {
                        value_text: "1984-02-11".to_owned(),
                    },
                }],
            )
            .await
            .expect("batch");

        let requests = stub.requests().await;
        assert_eq!(requests[0].path(), "requests/r-1/data-values");
        assert_eq!(
            requests[0].body,
            RequestBody::Json(json!({
                "items": [{ "key": "birth_date", "value_text": "1984-02-11" }]
            }))
        );
    }

    #[tokio::test]
    async fn liveness_sends_cursor_only_when_known() {
        let stub = Arc::new(StubTransport::default());
        stub.push_response(Value::Null).await;
        stub.push_response(json!({
            "cursor": "2026-03-01T10:00:00Z",
            "typing": [{ "actor_label": "Client", "role": "CLIENT" }]
        }))
        .await;
        let client = client_with(&stub);

        let first = client
            .probe_liveness(&"r-1".into(), None)
            .await
            .expect("first probe");
        let second = client
            .probe_liveness(&"r-1".into(), Some("2026-03-01T09:00:00Z"))
            .await
            .expect("second probe");

        assert_eq!(first, LivenessResponse::default());
        assert_eq!(second.typing.len(), 1);
        let requests = stub.requests().await;
        assert_eq!(requests[0].query_value("cursor"), None);
        assert_eq!(
            requests[1].query_value("cursor"),
            Some("2026-03-01T09:00:00Z")
        );
    }

    #[tokio::test]
    async fn typing_signal_posts_the_flag() {
        let stub = Arc::new(StubTransport::default());
        stub.push_response(Value::Null).await;
        let client = client_with(&stub);

        client
            .signal_typing(&"r-1".into(), false)
            .await
            .expect("typing");

        let requests = stub.requests().await;
        assert_eq!(requests[0].path(), "requests/r-1/typing");
        assert_eq!(requests[0].body, RequestBody::Json(json!({ "typing": false })));
    }

    #[tokio::test]
    async fn malformed_payloads_surface_as_network_failures() {
        let stub = Arc::new(StubTransport::default());
        stub.push_response(json!({ "unexpected": true })).await;
        let client = client_with(&stub);

        let error = client
            .submit_status_change(
                &"r-1".into(),
                StatusChangeSubmission {
                    status_code: "REVIEW".into(),
                    important_date_at: None,
                    comment: None,
                },
            )
            .await
            .expect_err("malformed");
        assert!(error.is_retryable());
    }
}
