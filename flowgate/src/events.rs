//! Task events and the bus the executor publishes them into.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::warn;
use uuid::Uuid;

use a2a_types::{
    Message, MessageRole, Part, TaskArtifactUpdateEvent, TaskState, TaskStatus,
    TaskStatusUpdateEvent,
};

/// One event emitted during a task's execution.
#[derive(Debug, Clone)]
pub enum TaskEvent {
    Message(Message),
    StatusUpdate(TaskStatusUpdateEvent),
    ArtifactUpdate(TaskArtifactUpdateEvent),
}

impl TaskEvent {
    /// Whether this event terminates its task's stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::StatusUpdate(update) if update.is_final)
    }
}

/// The seam between the executor and the transport delivering events to the
/// client. Publishes are synchronous; `finish` marks the end of the stream
/// and later publishes are dropped.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: TaskEvent);
    fn finish(&self);
}

/// Event bus backed by an unbounded channel; finishing closes the channel
/// so a consuming stream terminates.
pub struct QueueEventBus {
    tx: Mutex<Option<UnboundedSender<TaskEvent>>>,
}

impl QueueEventBus {
    #[must_use]
    pub fn channel() -> (Self, UnboundedReceiver<TaskEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }
}

impl EventBus for QueueEventBus {
    fn publish(&self, event: TaskEvent) {
        let guard = self.tx.lock().unwrap();
        match guard.as_ref() {
            Some(tx) => {
                let _ = tx.send(event);
            }
            None => warn!("event published after the bus was finished; dropping"),
        }
    }

    fn finish(&self) {
        self.tx.lock().unwrap().take();
    }
}

/// Test bus that records everything published to it.
#[derive(Default)]
pub struct CollectingEventBus {
    events: Mutex<Vec<TaskEvent>>,
    finished: AtomicBool,
}

impl CollectingEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<TaskEvent> {
        self.events.lock().unwrap().clone()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl EventBus for CollectingEventBus {
    fn publish(&self, event: TaskEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn finish(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// A status with the given state, stamped now, with no message attached.
#[must_use]
pub fn bare_status(state: TaskState) -> TaskStatus {
    TaskStatus {
        state,
        timestamp: Some(now()),
        message: None,
    }
}

/// A `working` status carrying an agent message with the given parts and a
/// fresh message id.
#[must_use]
pub fn working_status_with_message(
    task_id: &str,
    context_id: &str,
    parts: Vec<Part>,
) -> TaskStatus {
    TaskStatus {
        state: TaskState::Working,
        timestamp: Some(now()),
        message: Some(agent_message(task_id, context_id, parts)),
    }
}

/// An agent-role message bound to the task, with a fresh message id.
#[must_use]
pub fn agent_message(task_id: &str, context_id: &str, parts: Vec<Part>) -> Message {
    Message {
        kind: a2a_types::MESSAGE_KIND.to_string(),
        message_id: Uuid::new_v4().to_string(),
        role: MessageRole::Agent,
        parts,
        context_id: Some(context_id.to_string()),
        task_id: Some(task_id.to_string()),
        metadata: None,
    }
}

/// Constructs a status-update event for the task.
#[must_use]
pub fn status_update(
    task_id: &str,
    context_id: &str,
    status: TaskStatus,
    is_final: bool,
) -> TaskStatusUpdateEvent {
    TaskStatusUpdateEvent {
        kind: a2a_types::STATUS_UPDATE_KIND.to_string(),
        task_id: task_id.to_string(),
        context_id: context_id.to_string(),
        status,
        is_final,
        metadata: None,
    }
}
