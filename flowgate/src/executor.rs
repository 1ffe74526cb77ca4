//! Per-request orchestrator: drives one adapter call, routes normalized
//! outputs to the event bus, and closes the task with exactly one terminal
//! state.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error};
use uuid::Uuid;

use a2a_types::{Artifact, Message, Part, TaskState};

use crate::adapters::{FlowAdapter, FlowRequest, OutputCallback};
use crate::config::TransportKind;
use crate::events::{self, EventBus, TaskEvent};
use crate::normalizer::{self, NormalizedOutput};
use crate::sessions::{CancelSignal, TaskSessionRegistry};

/// Prefix for the synthetic upstream user id derived from the context id.
pub const UPSTREAM_USER_PREFIX: &str = "a2a";

/// The only failure text ever surfaced to REST clients; details stay in logs.
pub const GENERIC_ERROR_TEXT: &str = "An error occurred while processing your request.";

/// Everything the executor needs from one inbound invocation.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub task_id: String,
    pub context_id: String,
    /// The user message that triggered this invocation.
    pub message: Message,
    /// Metadata of the task, as stored by the frontend.
    pub task_metadata: Option<HashMap<String, Value>>,
}

impl RequestContext {
    /// The first text part of the user message; empty when there is none.
    #[must_use]
    pub fn user_text(&self) -> String {
        self.message
            .parts
            .iter()
            .find_map(Part::as_text)
            .unwrap_or("")
            .to_string()
    }

    /// Extra payload forwarded to the upstream call, taken from the task
    /// metadata key `cognigyData` when it is a map.
    #[must_use]
    pub fn upstream_data(&self) -> Option<Value> {
        self.task_metadata
            .as_ref()
            .and_then(|metadata| metadata.get("cognigyData"))
            .filter(|value| value.is_object())
            .cloned()
    }
}

/// Executes A2A invocations against one upstream agent.
pub struct FlowExecutor {
    adapter: Arc<dyn FlowAdapter>,
    sessions: Arc<TaskSessionRegistry>,
}

impl FlowExecutor {
    #[must_use]
    pub fn new(adapter: Arc<dyn FlowAdapter>, sessions: Arc<TaskSessionRegistry>) -> Self {
        Self { adapter, sessions }
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.adapter.transport() == TransportKind::Socket
    }

    /// Runs one invocation to completion. Never fails outward: every
    /// adapter error is translated into user-visible events, the bus is
    /// always finished, and the session registry entry is always released.
    pub async fn execute(&self, ctx: RequestContext, bus: &dyn EventBus) {
        let signal = CancelSignal::new();
        self.sessions.register(&ctx.task_id, signal.clone());

        let is_stream = self.is_streaming();
        if is_stream {
            bus.publish(TaskEvent::StatusUpdate(events::status_update(
                &ctx.task_id,
                &ctx.context_id,
                events::bare_status(TaskState::Working),
                false,
            )));
        }

        let request = FlowRequest {
            text: ctx.user_text(),
            session_id: ctx.context_id.clone(),
            user_id: format!("{UPSTREAM_USER_PREFIX}-{}", ctx.context_id),
            data: ctx.upstream_data(),
        };

        let callback: Option<OutputCallback<'_>> = if is_stream {
            let task_id = ctx.task_id.clone();
            let context_id = ctx.context_id.clone();
            let callback_signal = signal.clone();
            Some(Box::new(move |raw, _index| {
                // A concurrent cancel drops further outputs; the executor
                // publishes the terminal canceled event after the adapter
                // returns.
                if callback_signal.is_canceled() {
                    return Ok(());
                }
                match normalizer::normalize(&raw)? {
                    NormalizedOutput::StatusMessage { parts } => {
                        bus.publish(TaskEvent::StatusUpdate(events::status_update(
                            &task_id,
                            &context_id,
                            events::working_status_with_message(&task_id, &context_id, parts),
                            false,
                        )));
                    }
                    NormalizedOutput::MediaArtifact { parts, name, .. } => {
                        bus.publish(TaskEvent::ArtifactUpdate(
                            a2a_types::TaskArtifactUpdateEvent {
                                kind: a2a_types::ARTIFACT_UPDATE_KIND.to_string(),
                                task_id: task_id.clone(),
                                context_id: context_id.clone(),
                                artifact: Artifact {
                                    artifact_id: Uuid::new_v4().to_string(),
                                    parts,
                                    name: Some(name),
                                    description: None,
                                    metadata: None,
                                },
                                append: Some(false),
                                last_chunk: Some(true),
                                metadata: None,
                            },
                        ));
                    }
                }
                Ok(())
            }))
        } else {
            None
        };

        let result = self.adapter.send(request, callback).await;
        self.sessions.deregister(&ctx.task_id);

        if signal.is_canceled() {
            bus.publish(TaskEvent::StatusUpdate(events::status_update(
                &ctx.task_id,
                &ctx.context_id,
                events::bare_status(TaskState::Canceled),
                true,
            )));
            bus.finish();
            return;
        }

        match result {
            Ok(outputs) => {
                if is_stream {
                    bus.publish(TaskEvent::StatusUpdate(events::status_update(
                        &ctx.task_id,
                        &ctx.context_id,
                        events::bare_status(TaskState::Completed),
                        true,
                    )));
                } else {
                    let parts = normalizer::flatten(&outputs);
                    bus.publish(TaskEvent::Message(events::agent_message(
                        &ctx.task_id,
                        &ctx.context_id,
                        parts,
                    )));
                }
            }
            Err(err) => {
                error!(task = %ctx.task_id, error = %err, "upstream invocation failed");
                if is_stream {
                    bus.publish(TaskEvent::StatusUpdate(events::status_update(
                        &ctx.task_id,
                        &ctx.context_id,
                        events::bare_status(TaskState::Failed),
                        true,
                    )));
                } else {
                    bus.publish(TaskEvent::Message(events::agent_message(
                        &ctx.task_id,
                        &ctx.context_id,
                        vec![Part::text(GENERIC_ERROR_TEXT)],
                    )));
                }
            }
        }
        bus.finish();
    }

    /// Requests cancellation of a task. When the task is in flight, its
    /// executor publishes the terminal event itself; otherwise a synthetic
    /// terminal canceled event is published here.
    pub fn cancel_task(&self, task_id: &str, context_id: &str, bus: &dyn EventBus) {
        if self.sessions.cancel(task_id) {
            debug!(task = %task_id, "cancellation signal fired for in-flight task");
            return;
        }
        bus.publish(TaskEvent::StatusUpdate(events::status_update(
            task_id,
            context_id,
            events::bare_status(TaskState::Canceled),
            true,
        )));
        bus.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::RawFlowOutput;
    use crate::errors::AdapterError;
    use crate::events::CollectingEventBus;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex;

    type AfterFirstHook = Box<dyn Fn() + Send + Sync>;

    /// Scripted adapter: replays its outputs (invoking the callback on the
    /// socket path) or fails with the scripted error.
    struct FakeAdapter {
        kind: TransportKind,
        script: Mutex<Option<Result<Vec<RawFlowOutput>, AdapterError>>>,
        after_first_output: Option<AfterFirstHook>,
    }

    impl FakeAdapter {
        fn with_outputs(kind: TransportKind, outputs: Vec<RawFlowOutput>) -> Self {
            Self {
                kind,
                script: Mutex::new(Some(Ok(outputs))),
                after_first_output: None,
            }
        }

        fn failing(kind: TransportKind, error: AdapterError) -> Self {
            Self {
                kind,
                script: Mutex::new(Some(Err(error))),
                after_first_output: None,
            }
        }
    }

    #[async_trait]
    impl FlowAdapter for FakeAdapter {
        fn transport(&self) -> TransportKind {
            self.kind
        }

        async fn send(
            &self,
            _request: FlowRequest,
            mut on_output: Option<OutputCallback<'_>>,
        ) -> Result<Vec<RawFlowOutput>, AdapterError> {
            let outputs = self.script.lock().await.take().expect("script consumed")?;
            if let Some(callback) = on_output.as_mut() {
                for (index, output) in outputs.iter().enumerate() {
                    if let Err(err) = callback(output.clone(), index) {
                        tracing::warn!(error = %err, "output callback failed");
                    }
                    if index == 0 {
                        if let Some(hook) = &self.after_first_output {
                            hook();
                        }
                    }
                }
            }
            Ok(outputs)
        }
    }

    fn harness(adapter: FakeAdapter) -> (FlowExecutor, Arc<TaskSessionRegistry>) {
        let sessions = Arc::new(TaskSessionRegistry::new());
        (
            FlowExecutor::new(Arc::new(adapter), sessions.clone()),
            sessions,
        )
    }

    fn ctx() -> RequestContext {
        RequestContext {
            task_id: "task-1".into(),
            context_id: "ctx-1".into(),
            message: Message {
                kind: a2a_types::MESSAGE_KIND.into(),
                message_id: "msg-1".into(),
                role: a2a_types::MessageRole::User,
                parts: vec![Part::text("hello")],
                context_id: Some("ctx-1".into()),
                task_id: Some("task-1".into()),
                metadata: None,
            },
            task_metadata: None,
        }
    }

    fn status_states(events: &[TaskEvent]) -> Vec<(TaskState, bool)> {
        events
            .iter()
            .filter_map(|event| match event {
                TaskEvent::StatusUpdate(update) => {
                    Some((update.status.state.clone(), update.is_final))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn user_text_is_the_first_text_part() {
        let mut context = ctx();
        assert_eq!(context.user_text(), "hello");
        context.message.parts.clear();
        assert_eq!(context.user_text(), "");
    }

    #[test]
    fn upstream_data_requires_a_map() {
        let mut context = ctx();
        assert!(context.upstream_data().is_none());

        let mut metadata = HashMap::new();
        metadata.insert("cognigyData".to_string(), json!({ "vip": true }));
        context.task_metadata = Some(metadata);
        assert_eq!(context.upstream_data(), Some(json!({ "vip": true })));

        let mut metadata = HashMap::new();
        metadata.insert("cognigyData".to_string(), json!("not a map"));
        context.task_metadata = Some(metadata);
        assert!(context.upstream_data().is_none());
    }

    #[tokio::test]
    async fn rest_plain_text_publishes_one_message() {
        let (executor, sessions) = harness(FakeAdapter::with_outputs(
            TransportKind::Rest,
            vec![RawFlowOutput::from_text("Hello")],
        ));
        let bus = CollectingEventBus::new();

        executor.execute(ctx(), &bus).await;

        let events = bus.events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            TaskEvent::Message(message) => {
                assert_eq!(message.parts, vec![Part::text("Hello")]);
                assert_eq!(message.role, a2a_types::MessageRole::Agent);
            }
            other => panic!("expected message event, got {other:?}"),
        }
        assert!(bus.is_finished());
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn rest_quick_replies_render_text_and_data_parts() {
        let payload = json!({
            "text": "Pick",
            "quickReplies": [ { "title": "A" }, { "title": "B" } ]
        });
        let (executor, _) = harness(FakeAdapter::with_outputs(
            TransportKind::Rest,
            vec![RawFlowOutput::from_data(json!({ "_quickReplies": payload }))],
        ));
        let bus = CollectingEventBus::new();

        executor.execute(ctx(), &bus).await;

        let events = bus.events();
        assert_eq!(events.len(), 1);
        let TaskEvent::Message(message) = &events[0] else {
            panic!("expected message event");
        };
        assert_eq!(message.parts[0].as_text(), Some("Pick\n- A\n- B"));
        let data = message.parts[1].as_data().unwrap();
        assert_eq!(data["type"], "quick_replies");
        assert_eq!(data["payload"], payload);
    }

    #[tokio::test]
    async fn rest_with_zero_outputs_sends_an_empty_text_part() {
        let (executor, _) = harness(FakeAdapter::with_outputs(TransportKind::Rest, vec![]));
        let bus = CollectingEventBus::new();

        executor.execute(ctx(), &bus).await;

        let events = bus.events();
        assert_eq!(events.len(), 1);
        let TaskEvent::Message(message) = &events[0] else {
            panic!("expected message event");
        };
        assert_eq!(message.parts, vec![Part::text("")]);
    }

    #[tokio::test]
    async fn rest_failure_sends_the_generic_error_message() {
        let (executor, sessions) = harness(FakeAdapter::failing(
            TransportKind::Rest,
            AdapterError::Http { status: 500 },
        ));
        let bus = CollectingEventBus::new();

        executor.execute(ctx(), &bus).await;

        let events = bus.events();
        assert_eq!(events.len(), 1);
        let TaskEvent::Message(message) = &events[0] else {
            panic!("expected message event");
        };
        assert_eq!(message.parts, vec![Part::text(GENERIC_ERROR_TEXT)]);
        assert!(bus.is_finished());
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn stream_emits_opening_per_output_and_terminal_events() {
        let (executor, sessions) = harness(FakeAdapter::with_outputs(
            TransportKind::Socket,
            vec![
                RawFlowOutput::from_text("p1"),
                RawFlowOutput::from_text("p2"),
                RawFlowOutput::from_text("p3"),
            ],
        ));
        let bus = CollectingEventBus::new();

        executor.execute(ctx(), &bus).await;

        let events = bus.events();
        assert_eq!(events.len(), 5);
        assert_eq!(
            status_states(&events),
            vec![
                (TaskState::Working, false),
                (TaskState::Working, false),
                (TaskState::Working, false),
                (TaskState::Working, false),
                (TaskState::Completed, true),
            ]
        );

        // The opening update carries no message; the per-output ones do.
        let TaskEvent::StatusUpdate(opening) = &events[0] else {
            panic!("expected status update");
        };
        assert!(opening.status.message.is_none());
        let TaskEvent::StatusUpdate(first_output) = &events[1] else {
            panic!("expected status update");
        };
        let message = first_output.status.message.as_ref().unwrap();
        assert_eq!(message.parts, vec![Part::text("p1")]);
        assert!(bus.is_finished());
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn stream_with_zero_outputs_is_working_then_completed() {
        let (executor, _) = harness(FakeAdapter::with_outputs(TransportKind::Socket, vec![]));
        let bus = CollectingEventBus::new();

        executor.execute(ctx(), &bus).await;

        assert_eq!(
            status_states(&bus.events()),
            vec![(TaskState::Working, false), (TaskState::Completed, true)]
        );
    }

    #[tokio::test]
    async fn stream_image_output_becomes_an_artifact_event() {
        let (executor, _) = harness(FakeAdapter::with_outputs(
            TransportKind::Socket,
            vec![
                RawFlowOutput::from_text("Look"),
                RawFlowOutput::from_data(json!({
                    "_image": { "imageUrl": "https://cdn.example/photo.png" }
                })),
            ],
        ));
        let bus = CollectingEventBus::new();

        executor.execute(ctx(), &bus).await;

        let events = bus.events();
        assert_eq!(events.len(), 4);
        let TaskEvent::ArtifactUpdate(update) = &events[2] else {
            panic!("expected artifact update, got {:?}", events[2]);
        };
        assert_eq!(update.append, Some(false));
        assert_eq!(update.last_chunk, Some(true));
        assert_eq!(update.artifact.name.as_deref(), Some("photo.png"));
        let Part::File { file, .. } = &update.artifact.parts[0] else {
            panic!("expected file part");
        };
        assert_eq!(file.uri, "https://cdn.example/photo.png");
        assert_eq!(file.mime_type.as_deref(), Some("image/png"));
        assert_eq!(
            update.artifact.parts[1].as_text(),
            Some("[Image: https://cdn.example/photo.png]")
        );
        assert!(events[3].is_terminal());
    }

    #[tokio::test]
    async fn stream_failure_ends_with_terminal_failed() {
        let (executor, sessions) = harness(FakeAdapter::failing(
            TransportKind::Socket,
            AdapterError::SessionTimeout { timeout_ms: 60_000 },
        ));
        let bus = CollectingEventBus::new();

        executor.execute(ctx(), &bus).await;

        assert_eq!(
            status_states(&bus.events()),
            vec![(TaskState::Working, false), (TaskState::Failed, true)]
        );
        assert!(bus.is_finished());
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn cancel_mid_stream_drops_later_outputs_and_ends_canceled() {
        let sessions = Arc::new(TaskSessionRegistry::new());
        let cancel_sessions = sessions.clone();
        let adapter = FakeAdapter {
            kind: TransportKind::Socket,
            script: Mutex::new(Some(Ok(vec![
                RawFlowOutput::from_text("p1"),
                RawFlowOutput::from_text("p2"),
                RawFlowOutput::from_text("p3"),
            ]))),
            after_first_output: Some(Box::new(move || {
                assert!(cancel_sessions.cancel("task-1"));
            })),
        };
        let executor = FlowExecutor::new(Arc::new(adapter), sessions.clone());
        let bus = CollectingEventBus::new();

        executor.execute(ctx(), &bus).await;

        assert_eq!(
            status_states(&bus.events()),
            vec![
                (TaskState::Working, false),
                (TaskState::Working, false),
                (TaskState::Canceled, true),
            ]
        );
        assert!(bus.is_finished());
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn cancel_task_without_running_execute_publishes_synthetic_terminal() {
        let (executor, _) = harness(FakeAdapter::with_outputs(TransportKind::Socket, vec![]));
        let bus = CollectingEventBus::new();

        executor.cancel_task("task-9", "ctx-9", &bus);

        assert_eq!(
            status_states(&bus.events()),
            vec![(TaskState::Canceled, true)]
        );
        assert!(bus.is_finished());
    }

    #[tokio::test]
    async fn terminal_event_is_always_last_and_unique() {
        let (executor, _) = harness(FakeAdapter::with_outputs(
            TransportKind::Socket,
            vec![RawFlowOutput::from_text("p1")],
        ));
        let bus = CollectingEventBus::new();

        executor.execute(ctx(), &bus).await;

        let events = bus.events();
        let terminal_positions: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, event)| event.is_terminal())
            .map(|(index, _)| index)
            .collect();
        assert_eq!(terminal_positions, vec![events.len() - 1]);
    }
}
