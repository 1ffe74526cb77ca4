//! Agent-level connection pool for socket endpoints.
//!
//! Maintains at most one long-lived upstream connection per socket agent for
//! liveness and fast failure detection. Per-invocation traffic never rides
//! these connections; the socket adapter opens a dedicated session per call
//! so one agent identity cannot leak outputs across sessions.
//!
//! Entry state machine:
//!
//! ```text
//!            connect attempt
//!     [start] ──────────────► CONNECTING
//!                               │ success        │ failure
//!                               ▼                ▼ (auth → DEAD, else → remove)
//!                             IDLE  ◄─last session ended──  ACTIVE
//!                               │                ▲
//!                       idle timer fires         │ session started
//!                               ▼                │
//!                          [removed]            RECONNECTING ──max attempts──► DEAD
//!                                                 ▲
//!                                      disconnect/error from IDLE or ACTIVE
//! ```

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::AgentDescriptor;
use crate::errors::{AdapterError, PoolError};

/// Per-entry lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Idle,
    Active,
    Reconnecting,
    Dead,
}

/// Pool timing knobs. Defaults match production behavior; tests shrink them.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub idle_timeout: Duration,
    pub max_reconnect_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            max_reconnect_attempts: 6,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// A live upstream connection handed to the pool by a connector.
///
/// The pool owns the `shutdown` side; dropping it tells the io task behind
/// the connection to stop. The io task resolves `closed` with a reason when
/// the upstream drops the connection on its own.
pub struct LiveConnection {
    pub closed: oneshot::Receiver<String>,
    pub shutdown: oneshot::Sender<()>,
}

/// Seam between the pool's state machine and actual socket construction, so
/// the machine is testable without a live upstream.
#[async_trait]
pub trait EndpointConnector: Send + Sync {
    async fn connect(&self, descriptor: &AgentDescriptor) -> Result<LiveConnection, AdapterError>;
}

struct PoolEntry {
    state: ConnectionState,
    active_sessions: u32,
    last_activity: Instant,
    reconnect_attempts: u32,
    idle_timer: Option<JoinHandle<()>>,
    shutdown: Option<oneshot::Sender<()>>,
    watch: Option<JoinHandle<()>>,
}

impl PoolEntry {
    fn new() -> Self {
        Self {
            state: ConnectionState::Connecting,
            active_sessions: 0,
            last_activity: Instant::now(),
            reconnect_attempts: 0,
            idle_timer: None,
            shutdown: None,
            watch: None,
        }
    }

    fn clear_timers(&mut self) {
        if let Some(timer) = self.idle_timer.take() {
            timer.abort();
        }
        self.watch.take();
        self.shutdown.take();
    }
}

/// Singleton-scoped pool of liveness connections, keyed by agent id.
pub struct FlowConnectionPool {
    entries: DashMap<String, Arc<Mutex<PoolEntry>>>,
    /// Ids whose entry went DEAD; get-or-create against these fails until an
    /// explicit `remove`.
    dead: DashMap<String, ()>,
    descriptors: DashMap<String, AgentDescriptor>,
    connector: Arc<dyn EndpointConnector>,
    config: PoolConfig,
    dead_subscribers: StdMutex<Vec<UnboundedSender<String>>>,
}

impl FlowConnectionPool {
    #[must_use]
    pub fn new(connector: Arc<dyn EndpointConnector>, config: PoolConfig) -> Arc<Self> {
        Arc::new(Self {
            entries: DashMap::new(),
            dead: DashMap::new(),
            descriptors: DashMap::new(),
            connector,
            config,
            dead_subscribers: StdMutex::new(Vec::new()),
        })
    }

    /// Admits the agent to the pool, connecting on first use. A DEAD entry
    /// is an immediate error until it is explicitly removed.
    pub async fn get_or_create(self: &Arc<Self>, descriptor: &AgentDescriptor) -> Result<(), PoolError> {
        let agent_id = descriptor.id.clone();
        if self.dead.contains_key(&agent_id) {
            return Err(PoolError::Dead { agent_id });
        }
        self.descriptors.insert(agent_id.clone(), descriptor.clone());

        let cell = self
            .entries
            .entry(agent_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(PoolEntry::new())))
            .clone();
        let mut entry = cell.lock().await;

        match entry.state {
            ConnectionState::Dead => Err(PoolError::Dead { agent_id }),
            ConnectionState::Idle | ConnectionState::Active | ConnectionState::Reconnecting => {
                Ok(())
            }
            ConnectionState::Connecting => match self.connector.connect(descriptor).await {
                Ok(conn) => {
                    // A concurrent creator may have failed and removed the
                    // id while we held the cell; make sure it is present.
                    self.entries.insert(agent_id.clone(), cell.clone());
                    entry.state = ConnectionState::Idle;
                    entry.reconnect_attempts = 0;
                    entry.last_activity = Instant::now();
                    self.attach(&mut entry, conn, &agent_id);
                    self.start_idle_timer(&mut entry, &agent_id);
                    debug!(agent = %agent_id, "pool connection established");
                    Ok(())
                }
                Err(err) => {
                    let reason = err.to_string();
                    drop(entry);
                    if is_auth_error(&reason) {
                        self.mark_dead(&agent_id, &reason).await;
                        Err(PoolError::Auth { agent_id, reason })
                    } else {
                        self.entries.remove(&agent_id);
                        Err(PoolError::Connect(err))
                    }
                }
            },
        }
    }

    /// Called before an active invocation. Cancels any pending idle timer.
    pub async fn session_started(&self, agent_id: &str) {
        let Some(cell) = self.entries.get(agent_id).map(|e| e.clone()) else {
            warn!(agent = %agent_id, "session started for an agent not in the pool");
            return;
        };
        let mut entry = cell.lock().await;
        entry.active_sessions += 1;
        entry.last_activity = Instant::now();
        if let Some(timer) = entry.idle_timer.take() {
            timer.abort();
        }
        if entry.state == ConnectionState::Idle {
            entry.state = ConnectionState::Active;
        }
    }

    /// Called after an invocation ends. When the last session ends in
    /// ACTIVE, the entry returns to IDLE and the idle timer restarts.
    pub async fn session_ended(self: &Arc<Self>, agent_id: &str) {
        let Some(cell) = self.entries.get(agent_id).map(|e| e.clone()) else {
            return;
        };
        let mut entry = cell.lock().await;
        entry.active_sessions = entry.active_sessions.saturating_sub(1);
        entry.last_activity = Instant::now();
        if entry.active_sessions == 0 && entry.state == ConnectionState::Active {
            entry.state = ConnectionState::Idle;
            self.start_idle_timer(&mut entry, agent_id);
        }
    }

    /// Removes an entry outright (operator action); also clears a DEAD
    /// marker so the agent can be re-admitted.
    pub async fn remove(&self, agent_id: &str) {
        self.dead.remove(agent_id);
        self.descriptors.remove(agent_id);
        if let Some((_, cell)) = self.entries.remove(agent_id) {
            let mut entry = cell.lock().await;
            entry.clear_timers();
        }
    }

    /// Subscribes to DEAD notifications; receives the agent id.
    pub fn subscribe_dead(&self) -> UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.dead_subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Test hook: drops every entry, timer, and DEAD marker.
    pub async fn reset(&self) {
        let ids: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, cell)) = self.entries.remove(&id) {
                let mut entry = cell.lock().await;
                entry.clear_timers();
            }
        }
        self.dead.clear();
        self.descriptors.clear();
    }

    pub async fn state(&self, agent_id: &str) -> Option<ConnectionState> {
        let cell = self.entries.get(agent_id).map(|e| e.clone())?;
        let entry = cell.lock().await;
        Some(entry.state)
    }

    pub async fn active_sessions(&self, agent_id: &str) -> Option<u32> {
        let cell = self.entries.get(agent_id).map(|e| e.clone())?;
        let entry = cell.lock().await;
        Some(entry.active_sessions)
    }

    pub async fn last_activity(&self, agent_id: &str) -> Option<Instant> {
        let cell = self.entries.get(agent_id).map(|e| e.clone())?;
        let entry = cell.lock().await;
        Some(entry.last_activity)
    }

    #[must_use]
    pub fn contains(&self, agent_id: &str) -> bool {
        self.entries.contains_key(agent_id)
    }

    fn attach(self: &Arc<Self>, entry: &mut PoolEntry, conn: LiveConnection, agent_id: &str) {
        entry.shutdown = Some(conn.shutdown);
        let pool = Arc::clone(self);
        let id = agent_id.to_string();
        let closed = conn.closed;
        entry.watch = Some(tokio::spawn(async move {
            // Err means the pool dropped the shutdown side itself.
            if let Ok(reason) = closed.await {
                pool.handle_connection_loss(&id, &reason).await;
            }
        }));
    }

    fn start_idle_timer(self: &Arc<Self>, entry: &mut PoolEntry, agent_id: &str) {
        if let Some(timer) = entry.idle_timer.take() {
            timer.abort();
        }
        let pool = Arc::clone(self);
        let id = agent_id.to_string();
        entry.idle_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(pool.config.idle_timeout).await;
            pool.handle_idle_timeout(&id).await;
        }));
    }

    async fn handle_idle_timeout(&self, agent_id: &str) {
        let Some(cell) = self.entries.get(agent_id).map(|e| e.clone()) else {
            return;
        };
        let mut entry = cell.lock().await;
        if entry.state == ConnectionState::Idle && entry.active_sessions == 0 {
            info!(agent = %agent_id, "evicting idle pool connection");
            // Running inside the idle-timer task itself, so take the handle
            // without aborting it.
            entry.idle_timer.take();
            entry.watch.take();
            entry.shutdown.take();
            drop(entry);
            self.entries.remove(agent_id);
            self.descriptors.remove(agent_id);
        }
    }

    /// Drives the state machine on a disconnect or error from the upstream.
    pub async fn handle_connection_loss(self: &Arc<Self>, agent_id: &str, reason: &str) {
        if is_auth_error(reason) {
            self.mark_dead(agent_id, reason).await;
            return;
        }
        let Some(cell) = self.entries.get(agent_id).map(|e| e.clone()) else {
            return;
        };
        {
            let mut entry = cell.lock().await;
            if !matches!(
                entry.state,
                ConnectionState::Idle | ConnectionState::Active
            ) {
                return;
            }
            warn!(agent = %agent_id, %reason, "pool connection lost, reconnecting");
            entry.state = ConnectionState::Reconnecting;
            entry.shutdown.take();
            if let Some(timer) = entry.idle_timer.take() {
                timer.abort();
            }
        }
        let pool = Arc::clone(self);
        let id = agent_id.to_string();
        tokio::spawn(async move {
            pool.reconnect_loop(id).await;
        });
    }

    async fn reconnect_loop(self: Arc<Self>, agent_id: String) {
        loop {
            let Some(descriptor) = self.descriptors.get(&agent_id).map(|d| d.clone()) else {
                return;
            };
            let Some(cell) = self.entries.get(&agent_id).map(|e| e.clone()) else {
                return;
            };

            let attempt = {
                let mut entry = cell.lock().await;
                if entry.state != ConnectionState::Reconnecting {
                    return;
                }
                entry.reconnect_attempts += 1;
                entry.reconnect_attempts
            };

            let delay = self.backoff_delay(attempt);
            debug!(agent = %agent_id, attempt, delay_ms = delay.as_millis() as u64, "scheduling reconnect");
            tokio::time::sleep(delay).await;

            match self.connector.connect(&descriptor).await {
                Ok(conn) => {
                    let mut entry = cell.lock().await;
                    if entry.state != ConnectionState::Reconnecting {
                        return;
                    }
                    entry.reconnect_attempts = 0;
                    entry.last_activity = Instant::now();
                    entry.state = if entry.active_sessions > 0 {
                        ConnectionState::Active
                    } else {
                        ConnectionState::Idle
                    };
                    self.attach(&mut entry, conn, &agent_id);
                    if entry.state == ConnectionState::Idle {
                        self.start_idle_timer(&mut entry, &agent_id);
                    }
                    info!(agent = %agent_id, "pool connection reestablished");
                    return;
                }
                Err(err) => {
                    let reason = err.to_string();
                    if is_auth_error(&reason) {
                        self.mark_dead(&agent_id, &reason).await;
                        return;
                    }
                    if attempt >= self.config.max_reconnect_attempts {
                        self.mark_dead(&agent_id, "reconnect attempts exhausted").await;
                        return;
                    }
                    warn!(agent = %agent_id, attempt, %reason, "reconnect attempt failed");
                }
            }
        }
    }

    async fn mark_dead(&self, agent_id: &str, reason: &str) {
        warn!(agent = %agent_id, %reason, "pool entry is dead");
        self.dead.insert(agent_id.to_string(), ());
        if let Some((_, cell)) = self.entries.remove(agent_id) {
            let mut entry = cell.lock().await;
            entry.state = ConnectionState::Dead;
            entry.clear_timers();
        }
        self.descriptors.remove(agent_id);

        let mut subscribers = self.dead_subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.send(agent_id.to_string()).is_ok());
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let exponential = self.config.base_backoff.as_millis() as u64 * (1u64 << shift);
        let capped = exponential.min(self.config.max_backoff.as_millis() as u64);
        let jitter = rand::thread_rng().gen_range(0.8..=1.2);
        Duration::from_millis((capped as f64 * jitter) as u64)
    }
}

fn is_auth_error(reason: &str) -> bool {
    let lower = reason.to_lowercase();
    ["401", "403", "unauthorized", "forbidden"]
        .iter()
        .any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportKind;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn descriptor(id: &str) -> AgentDescriptor {
        AgentDescriptor {
            id: id.into(),
            name: "Socket agent".into(),
            description: String::new(),
            version: "1.0.0".into(),
            transport: TransportKind::Socket,
            endpoint_url: "wss://endpoint.example".into(),
            endpoint_token: "tok".into(),
            skills: Vec::new(),
        }
    }

    fn live_connection() -> (LiveConnection, oneshot::Sender<String>) {
        let (closed_tx, closed_rx) = oneshot::channel();
        let (shutdown_tx, _shutdown_rx) = oneshot::channel();
        (
            LiveConnection {
                closed: closed_rx,
                shutdown: shutdown_tx,
            },
            closed_tx,
        )
    }

    /// Scripted connector: pops one result per connect call and hands the
    /// close trigger back to the test.
    struct MockConnector {
        script: Mutex<VecDeque<Result<(), AdapterError>>>,
        close_handles: Mutex<Vec<oneshot::Sender<String>>>,
        connects: AtomicU32,
    }

    impl MockConnector {
        fn scripted(script: Vec<Result<(), AdapterError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                close_handles: Mutex::new(Vec::new()),
                connects: AtomicU32::new(0),
            })
        }

        async fn trigger_loss(&self, reason: &str) {
            let handle = self.close_handles.lock().await.pop().expect("live handle");
            let _ = handle.send(reason.to_string());
        }
    }

    #[async_trait]
    impl EndpointConnector for MockConnector {
        async fn connect(
            &self,
            _descriptor: &AgentDescriptor,
        ) -> Result<LiveConnection, AdapterError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            match self.script.lock().await.pop_front() {
                Some(Ok(())) | None => {
                    let (conn, closed_tx) = live_connection();
                    self.close_handles.lock().await.push(closed_tx);
                    Ok(conn)
                }
                Some(Err(err)) => Err(err),
            }
        }
    }

    fn connect_failed() -> AdapterError {
        AdapterError::ConnectFailed {
            reason: "connection refused".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn get_or_create_connects_and_goes_idle() {
        let connector = MockConnector::scripted(vec![Ok(())]);
        let pool = FlowConnectionPool::new(connector.clone(), PoolConfig::default());

        pool.get_or_create(&descriptor("a")).await.unwrap();
        assert_eq!(pool.state("a").await, Some(ConnectionState::Idle));
        assert_eq!(pool.active_sessions("a").await, Some(0));
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);

        // Second call reuses the entry.
        pool.get_or_create(&descriptor("a")).await.unwrap();
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn session_counting_drives_idle_and_active() {
        let connector = MockConnector::scripted(vec![Ok(())]);
        let pool = FlowConnectionPool::new(connector, PoolConfig::default());
        pool.get_or_create(&descriptor("a")).await.unwrap();

        pool.session_started("a").await;
        assert_eq!(pool.state("a").await, Some(ConnectionState::Active));
        pool.session_started("a").await;
        assert_eq!(pool.active_sessions("a").await, Some(2));

        pool.session_ended("a").await;
        assert_eq!(pool.state("a").await, Some(ConnectionState::Active));
        pool.session_ended("a").await;
        assert_eq!(pool.state("a").await, Some(ConnectionState::Idle));
        assert_eq!(pool.active_sessions("a").await, Some(0));

        // Never below zero.
        pool.session_ended("a").await;
        assert_eq!(pool.active_sessions("a").await, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_entry_is_evicted_after_timeout() {
        let connector = MockConnector::scripted(vec![Ok(())]);
        let pool = FlowConnectionPool::new(connector, PoolConfig::default());
        pool.get_or_create(&descriptor("a")).await.unwrap();

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert!(!pool.contains("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn active_entry_survives_the_idle_timeout_moment() {
        let connector = MockConnector::scripted(vec![Ok(())]);
        let pool = FlowConnectionPool::new(connector, PoolConfig::default());
        pool.get_or_create(&descriptor("a")).await.unwrap();
        pool.session_started("a").await;

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert!(pool.contains("a"));
        assert_eq!(pool.state("a").await, Some(ConnectionState::Active));
    }

    #[tokio::test(start_paused = true)]
    async fn connection_loss_reconnects_and_resets_attempts() {
        let connector =
            MockConnector::scripted(vec![Ok(()), Err(connect_failed()), Ok(())]);
        let pool = FlowConnectionPool::new(connector.clone(), PoolConfig::default());
        pool.get_or_create(&descriptor("a")).await.unwrap();

        connector.trigger_loss("connection reset").await;
        // First retry fails, second succeeds; backoff delays are auto-advanced.
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(pool.state("a").await, Some(ConnectionState::Idle));
        assert_eq!(connector.connects.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_reconnects_kill_the_entry() {
        let mut script = vec![Ok(())];
        script.extend((0..6).map(|_| Err(connect_failed())));
        let connector = MockConnector::scripted(script);
        let pool = FlowConnectionPool::new(connector.clone(), PoolConfig::default());
        let mut dead_rx = pool.subscribe_dead();

        pool.get_or_create(&descriptor("a")).await.unwrap();
        connector.trigger_loss("connection reset").await;

        let dead_agent = dead_rx.recv().await.expect("dead notification");
        assert_eq!(dead_agent, "a");
        assert!(!pool.contains("a"));
        // 1 initial connect + 6 failed reconnect attempts.
        assert_eq!(connector.connects.load(Ordering::SeqCst), 7);

        let err = pool.get_or_create(&descriptor("a")).await.unwrap_err();
        assert!(matches!(err, PoolError::Dead { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn auth_error_goes_straight_to_dead() {
        let connector = MockConnector::scripted(vec![Ok(())]);
        let pool = FlowConnectionPool::new(connector.clone(), PoolConfig::default());
        let mut dead_rx = pool.subscribe_dead();

        pool.get_or_create(&descriptor("a")).await.unwrap();
        connector.trigger_loss("server replied 401 Unauthorized").await;

        assert_eq!(dead_rx.recv().await.as_deref(), Some("a"));
        assert!(!pool.contains("a"));
        // No reconnect attempt was made.
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failure_on_first_connect_is_dead_immediately() {
        let connector = MockConnector::scripted(vec![Err(AdapterError::ConnectFailed {
            reason: "403 Forbidden".into(),
        })]);
        let pool = FlowConnectionPool::new(connector, PoolConfig::default());

        let err = pool.get_or_create(&descriptor("a")).await.unwrap_err();
        assert!(matches!(err, PoolError::Auth { .. }));
        let err = pool.get_or_create(&descriptor("a")).await.unwrap_err();
        assert!(matches!(err, PoolError::Dead { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn non_auth_connect_failure_removes_the_entry() {
        let connector = MockConnector::scripted(vec![Err(connect_failed()), Ok(())]);
        let pool = FlowConnectionPool::new(connector, PoolConfig::default());

        let err = pool.get_or_create(&descriptor("a")).await.unwrap_err();
        assert!(matches!(err, PoolError::Connect(_)));
        assert!(!pool.contains("a"));

        // A later attempt may try again.
        pool.get_or_create(&descriptor("a")).await.unwrap();
        assert_eq!(pool.state("a").await, Some(ConnectionState::Idle));
    }

    #[tokio::test(start_paused = true)]
    async fn remove_clears_the_dead_marker() {
        let connector = MockConnector::scripted(vec![Err(AdapterError::ConnectFailed {
            reason: "unauthorized".into(),
        })]);
        let pool = FlowConnectionPool::new(connector, PoolConfig::default());

        let _ = pool.get_or_create(&descriptor("a")).await;
        assert!(matches!(
            pool.get_or_create(&descriptor("a")).await,
            Err(PoolError::Dead { .. })
        ));

        pool.remove("a").await;
        pool.get_or_create(&descriptor("a")).await.unwrap();
    }

    #[test]
    fn auth_markers_are_case_insensitive() {
        assert!(is_auth_error("HTTP 401"));
        assert!(is_auth_error("FORBIDDEN by upstream"));
        assert!(is_auth_error("Unauthorized"));
        assert!(!is_auth_error("connection reset by peer"));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_is_capped() {
        let connector = MockConnector::scripted(vec![]);
        let pool = FlowConnectionPool::new(connector, PoolConfig::default());
        // Attempt 10 would be 512s uncapped; with the 30s cap and ±20%
        // jitter the delay stays within [24s, 36s].
        let delay = pool.backoff_delay(10);
        assert!(delay >= Duration::from_secs(24));
        assert!(delay <= Duration::from_secs(36));
    }
}
