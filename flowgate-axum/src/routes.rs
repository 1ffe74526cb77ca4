use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{sse, IntoResponse, Response, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use a2a_types::{
    AgentCard, JSONRPCRequest, Message, MessageSendParams, SendMessageResult,
    SendStreamingMessageResult, Task, TaskIdParams, TaskQueryParams, TaskState,
};
use flowgate::events::{self, QueueEventBus, TaskEvent};
use flowgate::{AgentRegistry, FlowExecutor, RequestContext, TaskStore};

use crate::error::{Error, Result};
use crate::json_rpc;

/// State shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<AgentRegistry>,
    pub store: Arc<dyn TaskStore>,
    pub executors: Arc<HashMap<String, Arc<FlowExecutor>>>,
}

/// Creates the gateway's public routes.
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/.well-known/agents.json", get(agents_index))
        .route("/agents", get(agents_index))
        .route(
            "/agents/{id}/.well-known/agent-card.json",
            get(agent_card),
        )
        .route("/agents/{id}", post(rpc_entry))
        .route("/agents/{id}/", post(rpc_entry))
        .route("/health", get(health))
        .route("/.well-known/agent-card.json", get(single_card_guidance))
        .with_state(state)
}

/// Lists every discovery card.
async fn agents_index(State(state): State<AppState>) -> Json<Vec<AgentCard>> {
    Json(state.registry.cards().into_iter().cloned().collect())
}

/// One agent's discovery card.
async fn agent_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AgentCard>> {
    state
        .registry
        .card(&id)
        .cloned()
        .map(Json)
        .ok_or(Error::AgentNotFound(id))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "agents": state.registry.len(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// This gateway hosts multiple agents, so the root well-known card path
/// points callers at the multi-agent discovery document.
async fn single_card_guidance() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "This gateway hosts multiple agents; there is no single agent card",
            "discovery": "/.well-known/agents.json",
        })),
    )
        .into_response()
}

/// JSON-RPC entry point for one agent.
async fn rpc_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<JSONRPCRequest>,
) -> Result<Response> {
    json_rpc::validate_request(&request)?;
    let executor = state
        .executors
        .get(&id)
        .cloned()
        .ok_or_else(|| Error::AgentNotFound(id.clone()))?;

    match request.method.as_str() {
        "message/send" => message_send(&state, &executor, request).await,
        "message/stream" => message_stream(&state, &executor, request),
        "tasks/get" => tasks_get(&state, request).await,
        "tasks/cancel" => tasks_cancel(&state, &executor, request).await,
        other => Err(Error::MethodNotFound(other.to_string())),
    }
}

/// Folds one bus event into the stored task snapshot.
fn apply_event(task: &mut Task, event: &TaskEvent) {
    match event {
        TaskEvent::Message(message) => task.history.push(message.clone()),
        TaskEvent::StatusUpdate(update) => {
            if let Some(message) = &update.status.message {
                task.history.push(message.clone());
            }
            task.status = update.status.clone();
        }
        TaskEvent::ArtifactUpdate(update) => task.artifacts.push(update.artifact.clone()),
    }
}

fn to_streaming_result(event: TaskEvent) -> SendStreamingMessageResult {
    match event {
        TaskEvent::Message(message) => SendStreamingMessageResult::Message(message),
        TaskEvent::StatusUpdate(update) => SendStreamingMessageResult::TaskStatusUpdate(update),
        TaskEvent::ArtifactUpdate(update) => {
            SendStreamingMessageResult::TaskArtifactUpdate(update)
        }
    }
}

/// Opens a new task for the invocation and returns it with the request
/// context the executor consumes.
async fn open_task(
    state: &AppState,
    params: MessageSendParams,
) -> Result<(Task, RequestContext)> {
    let mut message = params.message;
    let context_id = message
        .context_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let task_id = message
        .task_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    message.context_id = Some(context_id.clone());
    message.task_id = Some(task_id.clone());

    let metadata = params.metadata.or_else(|| message.metadata.clone());
    let task = Task {
        kind: a2a_types::TASK_KIND.to_string(),
        id: task_id.clone(),
        context_id: context_id.clone(),
        status: events::bare_status(TaskState::Working),
        history: vec![message.clone()],
        artifacts: Vec::new(),
        metadata,
    };
    state
        .store
        .save(&task)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;

    let ctx = RequestContext {
        task_id,
        context_id,
        message,
        task_metadata: task.metadata.clone(),
    };
    Ok((task, ctx))
}

/// Blocking `message/send`: runs the invocation to completion and returns
/// the lone agent message (REST agents) or the terminal task snapshot.
async fn message_send(
    state: &AppState,
    executor: &Arc<FlowExecutor>,
    request: JSONRPCRequest,
) -> Result<Response> {
    let params: MessageSendParams = json_rpc::parse_params(request.params)?;
    let (mut task, ctx) = open_task(state, params).await?;
    let is_streaming = executor.is_streaming();

    let (bus, mut rx) = QueueEventBus::channel();
    let exec = executor.clone();
    let run = tokio::spawn(async move {
        exec.execute(ctx, &bus).await;
    });

    let mut reply: Option<Message> = None;
    while let Some(event) = rx.recv().await {
        apply_event(&mut task, &event);
        if let TaskEvent::Message(message) = &event {
            reply = Some(message.clone());
        }
        if let Err(err) = state.store.save(&task).await {
            warn!(task = %task.id, error = %err, "failed to persist task update");
        }
    }
    let _ = run.await;

    let result = if is_streaming {
        SendMessageResult::Task(task)
    } else {
        // On success the REST path publishes no terminal status event; the
        // task completes when its single message has been delivered. A
        // concurrent cancel does publish one, and that state must stand.
        if !task.status.state.is_terminal() {
            task.status = events::bare_status(TaskState::Completed);
            if let Err(err) = state.store.save(&task).await {
                warn!(task = %task.id, error = %err, "failed to persist task completion");
            }
        }
        match reply {
            Some(message) => SendMessageResult::Message(message),
            None => SendMessageResult::Task(task),
        }
    };

    Ok(Json(json_rpc::success(request.id, serde_json::to_value(result)?)).into_response())
}

/// Streaming `message/stream`: SSE of JSON-RPC success frames, one per bus
/// event, ending when the executor finishes the bus.
fn message_stream(
    state: &AppState,
    executor: &Arc<FlowExecutor>,
    request: JSONRPCRequest,
) -> Result<Response> {
    let params: MessageSendParams = json_rpc::parse_params(request.params)?;
    let state = state.clone();
    let executor = executor.clone();
    let request_id = request.id;

    let (out_tx, out_rx) = tokio::sync::mpsc::unbounded_channel::<TaskEvent>();
    tokio::spawn(async move {
        let (mut task, ctx) = match open_task(&state, params).await {
            Ok(opened) => opened,
            Err(err) => {
                warn!(error = %err, "failed to open streaming task");
                return;
            }
        };
        let (bus, mut rx) = QueueEventBus::channel();
        let exec = executor.clone();
        let run = tokio::spawn(async move {
            exec.execute(ctx, &bus).await;
        });
        while let Some(event) = rx.recv().await {
            apply_event(&mut task, &event);
            if let Err(err) = state.store.save(&task).await {
                warn!(task = %task.id, error = %err, "failed to persist task update");
            }
            // The client may have disconnected; keep folding regardless.
            let _ = out_tx.send(event);
        }
        let _ = run.await;
    });

    let stream = futures::stream::unfold(out_rx, |mut rx| async move {
        rx.recv().await.map(|event| (event, rx))
    })
    .map(move |event| {
        let frame = json_rpc::success(
            request_id.clone(),
            serde_json::to_value(to_streaming_result(event)).unwrap_or(Value::Null),
        );
        Ok::<_, Infallible>(
            sse::Event::default().data(serde_json::to_string(&frame).unwrap_or_default()),
        )
    });

    Ok(Sse::new(stream)
        .keep_alive(
            sse::KeepAlive::new()
                .interval(Duration::from_secs(30))
                .text("keep-alive"),
        )
        .into_response())
}

async fn tasks_get(state: &AppState, request: JSONRPCRequest) -> Result<Response> {
    let params: TaskQueryParams = json_rpc::parse_params(request.params)?;
    let mut task = state
        .store
        .load(&params.id)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
        .ok_or_else(|| Error::TaskNotFound(params.id.clone()))?;

    if let Some(limit) = params.history_length {
        if limit >= 0 {
            let keep = limit as usize;
            let len = task.history.len();
            if len > keep {
                task.history = task.history.split_off(len - keep);
            }
        }
    }

    Ok(Json(json_rpc::success(request.id, serde_json::to_value(task)?)).into_response())
}

/// `tasks/cancel`. Cancellation is cooperative: when an invocation is in
/// flight, this fires its signal and returns the current task snapshot as
/// an acknowledgement only — the terminal `canceled` status is published by
/// the running invocation once its adapter call returns, and lands in the
/// store and on that invocation's event stream. Only an orphaned task with
/// no in-flight invocation is marked canceled here directly.
async fn tasks_cancel(
    state: &AppState,
    executor: &Arc<FlowExecutor>,
    request: JSONRPCRequest,
) -> Result<Response> {
    let params: TaskIdParams = json_rpc::parse_params(request.params)?;
    let mut task = state
        .store
        .load(&params.id)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
        .ok_or_else(|| Error::TaskNotFound(params.id.clone()))?;

    if task.status.state.is_terminal() {
        // Canceling twice is idempotent; other terminal states refuse.
        if task.status.state == TaskState::Canceled {
            return Ok(
                Json(json_rpc::success(request.id, serde_json::to_value(task)?)).into_response(),
            );
        }
        return Err(Error::TaskNotCancelable(params.id));
    }

    let (bus, mut rx) = QueueEventBus::channel();
    executor.cancel_task(&params.id, &task.context_id, &bus);
    drop(bus);
    // A synthetic terminal event arrives only on the orphan path; fold it
    // into the snapshot. On the in-flight path nothing is drained and the
    // snapshot is left untouched, so this handler cannot overwrite the
    // terminal state the running invocation persists later.
    let mut canceled_here = false;
    while let Some(event) = rx.recv().await {
        apply_event(&mut task, &event);
        canceled_here = true;
    }
    if canceled_here {
        if let Err(err) = state.store.save(&task).await {
            warn!(task = %task.id, error = %err, "failed to persist task cancellation");
        }
    }

    Ok(Json(json_rpc::success(request.id, serde_json::to_value(task)?)).into_response())
}
