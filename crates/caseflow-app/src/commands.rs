use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use caseflow_config::CaseflowConfig;
use caseflow_core::{
    bucket_rows, compare_stamps, format_rfc3339, rows_from_template, BoardLane, CaseBackend,
    DataTemplateBackend, FlowTarget, StatusChange, StatusGraph, TemplateQuery,
    TransitionFlow, WorkflowController, WorkflowError,
};
use caseflow_domain::{
    AttachmentUpload, AvailableTransition, BoardQuery, CaseRequest, ChatMessage, DataFieldType,
    NewChatMessage, RequestId, SortMode, StatusCode, StatusGroup, TemplateId, TopicCode,
    WorkspaceSnapshot,
};
use caseflow_presence::{
    ActivityCursor, BackoffPolicy, ComposerState, ConnectionMode, PresencePoller,
    PresenceSnapshot, TypingSignaler,
};
use integration_http::{HttpBackendConfig, HttpCaseflowClient};
use time::OffsetDateTime;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{info, warn};

use crate::cli::{Command, MoveArgs};

pub struct Services {
    client: Arc<HttpCaseflowClient>,
    controller: WorkflowController,
    policy: BackoffPolicy,
    typing_heartbeat: Duration,
    board_limit: u32,
    sort_mode: SortMode,
}

impl Services {
    pub fn from_config(config: &CaseflowConfig) -> Result<Self> {
        let backend = config.backend_runtime();
        let client = Arc::new(HttpCaseflowClient::new(&HttpBackendConfig {
            base_url: backend.base_url,
            request_timeout: backend.request_timeout,
            api_token: backend.api_token,
        })?);
        let actor = config.actor()?;
        let presence = config.presence_runtime();
        let policy = BackoffPolicy {
            visible_interval: presence.visible_interval,
            hidden_interval: presence.hidden_interval,
            max_delay: presence.max_backoff,
            degraded_after_failures: presence.degraded_after_failures,
        };
        let controller = WorkflowController::new(client.clone(), actor);

        Ok(Self {
            client,
            controller,
            policy,
            typing_heartbeat: presence.typing_heartbeat,
            board_limit: config.board.default_limit,
            sort_mode: config.board_sort_mode(),
        })
    }
}

pub async fn run(services: &Services, command: Command) -> Result<()> {
    match command {
        Command::Board { limit, sort_mode } => run_board(services, limit, sort_mode).await,
        Command::Move(args) => run_move(services, args).await,
        Command::Claim { request_id } => {
            let request = load_request(services, &request_id).await?;
            let snapshot = services.controller.claim(&request).await?;
            println!("{}", request_line(&snapshot.request));
            Ok(())
        }
        Command::Reassign {
            request_id,
            lawyer_id,
        } => {
            let request = load_request(services, &request_id).await?;
            let snapshot = services.controller.reassign(&request, &lawyer_id).await?;
            println!("{}", request_line(&snapshot.request));
            Ok(())
        }
        Command::Watch { request_id, hidden } => run_watch(services, request_id, hidden).await,
        Command::Send { request_id, body } => run_send(services, request_id, body).await,
        Command::Templates { topic_code, search } => {
            run_templates(services, topic_code, search).await
        }
        Command::Template { template_id } => run_template(services, &template_id).await,
        Command::Help => {
            crate::cli::print_usage();
            Ok(())
        }
    }
}

async fn load_request(services: &Services, request_id: &RequestId) -> Result<CaseRequest> {
    let snapshot = services.client.load_workspace(request_id).await?;
    Ok(snapshot.request)
}

async fn run_board(
    services: &Services,
    limit: Option<u32>,
    sort_mode: Option<SortMode>,
) -> Result<()> {
    let board = services
        .controller
        .load_board(BoardQuery {
            limit: limit.unwrap_or(services.board_limit),
            sort_mode: sort_mode.unwrap_or(services.sort_mode),
            filters: Vec::new(),
        })
        .await?;
    for line in board_lines(&bucket_rows(&board)) {
        println!("{line}");
    }
    if board.truncated {
        println!(
            "showing {} of {} requests; raise --limit to see more",
            board.rows.len(),
            board.total
        );
    }
    Ok(())
}

async fn run_move(services: &Services, args: MoveArgs) -> Result<()> {
    let request = load_request(services, &args.request_id).await?;
    let flow = plan_move(&request, args.status.clone(), args.column)?;
    let flow = if flow.candidates().is_empty() {
        flow
    } else {
        let picked = prompt_for_status(flow.candidates()).await?;
        settle_choice(flow, picked)
    };

    let Some(status_code) = flow.pending_status().cloned() else {
        if let Some(error) = flow.error() {
            return Err(error.clone().into());
        }
        println!("{}: nothing to do", request.track_label());
        return Ok(());
    };

    let important_date_at = match args.important_date_at {
        Some(value) => Some(value),
        None => default_important_date(services, &request, &status_code).await,
    };
    let files = args
        .files
        .iter()
        .map(|path| read_upload(path))
        .collect::<Result<Vec<_>>>()?;

    let change = StatusChange {
        status_code,
        important_date_at,
        comment: args.comment,
        files,
    };
    let applied = match services.controller.change_status(&request, change).await {
        Ok(applied) => applied,
        Err(error) => {
            let flow = flow.finish(Err(error.clone()));
            warn!(request_id = %request.id, flow = ?flow, "move failed");
            return Err(error.into());
        }
    };

    println!(
        "{}: {} -> {}",
        request.track_label(),
        applied.receipt.from_status,
        applied.receipt.to_status
    );
    if !applied.attachments.is_empty() {
        println!("attached {} file(s)", applied.attachments.len());
    }
    for line in route_lines(&applied.workspace) {
        println!("{line}");
    }
    Ok(())
}

/// Starts a move and resolves it against the loaded request. An explicit status wins
/// over a column.
fn plan_move(
    request: &CaseRequest,
    status: Option<StatusCode>,
    column: Option<StatusGroup>,
) -> Result<TransitionFlow> {
    let target = match (status, column) {
        (Some(status), _) => FlowTarget::Status(status),
        (None, Some(column)) => FlowTarget::Column(column),
        (None, None) => bail!("'move' needs --column or --status"),
    };
    Ok(TransitionFlow::Idle
        .begin(request.id.clone(), target)
        .resolve(request))
}

fn settle_choice(flow: TransitionFlow, picked: Option<StatusCode>) -> TransitionFlow {
    match picked {
        Some(status) => flow.choose(&status),
        None => flow.cancel(),
    }
}

/// Accepts a 1-based position or a status code. Blank input cancels.
fn pick_candidate(candidates: &[AvailableTransition], input: &str) -> Option<StatusCode> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(position) = input.parse::<usize>() {
        if let Some(candidate) = position.checked_sub(1).and_then(|index| candidates.get(index)) {
            return Some(candidate.to_status.clone());
        }
    }
    Some(StatusCode::from(input))
}

async fn prompt_for_status(candidates: &[AvailableTransition]) -> Result<Option<StatusCode>> {
    println!("Several statuses fit that column:");
    for (index, candidate) in candidates.iter().enumerate() {
        println!(
            "  {}. {} ({})",
            index + 1,
            candidate.to_status_name,
            candidate.to_status
        );
    }
    println!("Pick one (number or code, empty to cancel):");
    let answer = BufReader::new(tokio::io::stdin())
        .lines()
        .next_line()
        .await
        .context("failed to read the status choice from stdin")?;
    Ok(answer.and_then(|answer| pick_candidate(candidates, &answer)))
}

/// SLA deadline of the edge the move will take, when that edge carries an SLA.
async fn default_important_date(
    services: &Services,
    request: &CaseRequest,
    to: &StatusCode,
) -> Option<String> {
    let graph = match services
        .client
        .load_topic_workflow(&request.topic_code)
        .await
        .and_then(StatusGraph::from_definition)
    {
        Ok(graph) => graph,
        Err(error) => {
            warn!(
                request_id = %request.id,
                topic_code = %request.topic_code,
                error = %error,
                "could not load topic workflow for the SLA default"
            );
            return None;
        }
    };
    sla_default(&graph, &request.status_code, to, OffsetDateTime::now_utc())
}

fn sla_default(
    graph: &StatusGraph,
    from: &StatusCode,
    to: &StatusCode,
    now: OffsetDateTime,
) -> Option<String> {
    graph.sla_deadline(from, to, now).map(format_rfc3339)
}

fn read_upload(path: &Path) -> Result<AttachmentUpload> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read attachment '{}'", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("attachment path '{}' has no file name", path.display()))?;
    Ok(AttachmentUpload {
        mime_type: guess_mime_type(&file_name).to_owned(),
        file_name,
        bytes,
    })
}

fn guess_mime_type(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "txt" => "text/plain",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

async fn run_watch(services: &Services, request_id: RequestId, hidden: bool) -> Result<()> {
    let workspace = services.client.load_workspace(&request_id).await?;
    let seed = ActivityCursor::seeded_from(&workspace.messages, &workspace.attachments);
    println!(
        "watching {} (type a line to reply, ctrl-c to stop)",
        workspace.request.track_label()
    );

    let poller = PresencePoller::new(services.client.clone(), services.policy);
    poller.set_visible(!hidden);
    poller.start(request_id.clone(), seed.clone()).await?;

    let session = WatchSession {
        backend: services.client.as_ref(),
        poller: &poller,
        request_id: &request_id,
        seen: seed,
    };
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    session
        .follow(
            BufReader::new(tokio::io::stdin()).lines(),
            shutdown,
            &mut |line: String| println!("{line}"),
        )
        .await;

    poller.stop().await?;
    info!(request_id = %request_id, "stopped watching request");
    Ok(())
}

/// Prints presence changes and new chat activity for one request and posts every
/// input line as a reply, until `shutdown` resolves.
struct WatchSession<'a> {
    backend: &'a dyn CaseBackend,
    poller: &'a PresencePoller,
    request_id: &'a RequestId,
    /// Newest message or attachment stamp already printed.
    seen: ActivityCursor,
}

impl WatchSession<'_> {
    async fn follow<R>(
        mut self,
        replies: Lines<R>,
        shutdown: impl Future<Output = ()>,
        emit: &mut dyn FnMut(String),
    ) where
        R: AsyncBufRead + Unpin,
    {
        let mut replies = Some(replies);
        let mut updates = self.poller.subscribe();
        let mut previous = updates.borrow_and_update().clone();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = updates.borrow_and_update().clone();
                    for line in presence_lines(&previous, &snapshot) {
                        emit(line);
                    }
                    let fresh = snapshot.activity_generation > previous.activity_generation;
                    previous = snapshot;
                    if fresh {
                        let reloaded = tokio::select! {
                            _ = &mut shutdown => break,
                            reloaded = self.backend.load_workspace(self.request_id) => reloaded,
                        };
                        self.show_new_activity(reloaded, emit);
                    }
                }
                line = next_reply(&mut replies) => match line {
                    Ok(Some(line)) => {
                        let posted = tokio::select! {
                            _ = &mut shutdown => break,
                            posted = post_reply(self.backend, self.poller, self.request_id, &line) => posted,
                        };
                        match posted {
                            Ok(Some(message)) => {
                                self.seen.advance(Some(message.created_at.as_str()));
                                emit(message_line(&message));
                            }
                            Ok(None) => {}
                            Err(error) => {
                                warn!(request_id = %self.request_id, error = %error, "reply could not be posted");
                            }
                        }
                    }
                    Ok(None) => replies = None,
                    Err(error) => {
                        warn!(error = %error, "stopped reading replies from stdin");
                        replies = None;
                    }
                },
            }
        }
    }

    fn show_new_activity(
        &mut self,
        reloaded: Result<WorkspaceSnapshot, WorkflowError>,
        emit: &mut dyn FnMut(String),
    ) {
        match reloaded {
            Ok(workspace) => {
                for line in new_message_lines(&workspace, self.seen.value()) {
                    emit(line);
                }
                let latest =
                    ActivityCursor::seeded_from(&workspace.messages, &workspace.attachments);
                self.seen.advance(latest.value());
            }
            Err(error) => {
                warn!(request_id = %self.request_id, error = %error, "workspace reload after new activity failed");
            }
        }
    }
}

async fn next_reply<R>(replies: &mut Option<Lines<R>>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    match replies {
        Some(lines) => lines.next_line().await,
        None => std::future::pending().await,
    }
}

/// Posts one chat reply, then asks the poller for an early probe.
async fn post_reply(
    backend: &dyn CaseBackend,
    poller: &PresencePoller,
    request_id: &RequestId,
    line: &str,
) -> Result<Option<ChatMessage>, WorkflowError> {
    let body = line.trim();
    if body.is_empty() {
        return Ok(None);
    }
    let message = backend
        .post_message(
            request_id,
            NewChatMessage {
                body: body.to_owned(),
            },
        )
        .await?;
    poller.nudge();
    Ok(Some(message))
}

async fn run_send(services: &Services, request_id: RequestId, body: Option<String>) -> Result<()> {
    let body = match body {
        Some(body) => body,
        None => compose_from_stdin(services, &request_id).await?,
    };
    if body.trim().is_empty() {
        println!("nothing to send");
        return Ok(());
    }
    let message = services
        .client
        .post_message(&request_id, NewChatMessage { body })
        .await?;
    println!("{}", message_line(&message));
    Ok(())
}

/// Reads the draft line by line from stdin while signalling typing to the other
/// viewers. End of input sends the draft.
async fn compose_from_stdin(services: &Services, request_id: &RequestId) -> Result<String> {
    let signaler = TypingSignaler::spawn(
        services.client.clone(),
        request_id.clone(),
        services.typing_heartbeat,
    );
    signaler.update(ComposerState {
        focused: true,
        busy: false,
        draft: String::new(),
    });

    let mut draft = String::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let read = loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if !draft.is_empty() {
                    draft.push('\n');
                }
                draft.push_str(&line);
                signaler.set_draft(draft.clone());
            }
            Ok(None) => break Ok(()),
            Err(error) => break Err(error),
        }
    };

    signaler.set_busy(true);
    signaler.shutdown().await?;
    read.context("failed to read the message from stdin")?;
    Ok(draft)
}

async fn run_templates(
    services: &Services,
    topic_code: Option<TopicCode>,
    search: Option<String>,
) -> Result<()> {
    let templates = services
        .client
        .list_templates(TemplateQuery { topic_code, search })
        .await?;
    if templates.is_empty() {
        println!("no templates found");
    }
    for template in templates {
        let topic = template
            .topic_code
            .as_ref()
            .map(TopicCode::as_str)
            .unwrap_or("any topic");
        println!("{}  {}  ({topic})", template.id, template.name);
    }
    Ok(())
}

async fn run_template(services: &Services, template_id: &TemplateId) -> Result<()> {
    let template = services.client.get_template(template_id).await?;
    println!("{}", template.name);
    for (index, row) in rows_from_template(&template).iter().enumerate() {
        let kind = match (row.field_type, row.document_name.as_deref()) {
            (DataFieldType::File, Some(document)) => format!("file: {document}"),
            (field_type, _) => format!("{field_type:?}").to_ascii_lowercase(),
        };
        println!("{:>3}. {} [{kind}]", index + 1, row.label);
    }
    Ok(())
}

trait TrackLabel {
    fn track_label(&self) -> String;
}

impl TrackLabel for CaseRequest {
    fn track_label(&self) -> String {
        if self.track_number.trim().is_empty() {
            self.id.to_string()
        } else {
            self.track_number.clone()
        }
    }
}

fn request_line(request: &CaseRequest) -> String {
    let assignee = request
        .assigned_lawyer_id
        .as_ref()
        .filter(|lawyer| !lawyer.is_blank())
        .map(|lawyer| lawyer.to_string())
        .unwrap_or_else(|| "unassigned".to_owned());
    let status = request
        .status_name
        .clone()
        .unwrap_or_else(|| request.status_code.to_string());
    format!(
        "{}  {}  {status}  {assignee}",
        request.track_label(),
        request.topic_code
    )
}

fn message_line(message: &ChatMessage) -> String {
    format!(
        "[{}] {}: {}",
        message.created_at, message.author_label, message.body
    )
}

fn board_lines(lanes: &[BoardLane]) -> Vec<String> {
    let mut lines = Vec::new();
    for lane in lanes {
        lines.push(format!("== {} ({}) ==", lane.column.label, lane.rows.len()));
        lines.extend(lane.rows.iter().map(|row| format!("  {}", request_line(row))));
    }
    lines
}

fn route_lines(workspace: &WorkspaceSnapshot) -> Vec<String> {
    let route = &workspace.status_route;
    let mut lines = route
        .steps
        .iter()
        .map(|step| {
            let spent = step
                .time_spent_seconds
                .map(|seconds| format!(" ({}h)", seconds / 3_600))
                .unwrap_or_default();
            format!("  {}{spent}", step.status)
        })
        .collect::<Vec<_>>();
    if !route.next.is_empty() {
        let next = route
            .next
            .iter()
            .map(|option| option.to_status.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("  next: {next}"));
    }
    lines
}

fn presence_lines(previous: &PresenceSnapshot, current: &PresenceSnapshot) -> Vec<String> {
    let mut lines = Vec::new();
    if previous.mode != current.mode {
        lines.push(match current.mode {
            ConnectionMode::Degraded => format!(
                "connection degraded after {} failed probes; retrying",
                current.consecutive_failures
            ),
            ConnectionMode::Online => "connection restored".to_owned(),
        });
    }
    if previous.typing_peers != current.typing_peers {
        if current.typing_peers.is_empty() {
            lines.push("nobody is typing".to_owned());
        } else {
            let names = current
                .typing_peers
                .iter()
                .map(|peer| peer.actor_label.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("{names} typing..."));
        }
    }
    lines
}

fn new_message_lines(workspace: &WorkspaceSnapshot, seen: Option<&str>) -> Vec<String> {
    let is_new = |stamp: &str| seen.map_or(true, |seen| compare_stamps(stamp, seen).is_gt());
    let mut lines = workspace
        .messages
        .iter()
        .filter(|message| is_new(&message.created_at))
        .map(message_line)
        .collect::<Vec<_>>();
    lines.extend(
        workspace
            .attachments
            .iter()
            .filter(|attachment| is_new(&attachment.created_at))
            .map(|attachment| {
                format!(
                    "[{}] attachment: {} ({})",
                    attachment.created_at, attachment.file_name, attachment.mime_type
                )
            }),
    );
    lines
}
