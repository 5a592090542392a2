//! # Sync Scheduler
//!
//! Keeps a [`TopologyStore`] and a [`DiscoveryController`] in step with the
//! controller for as long as a view is open.
//!
//! A single task owns all mutable state. Handles talk to it over a channel,
//! and every network request runs as its own task whose completion is fed
//! back into the owner, so writes are serialized without locks.
//!
//! ## Cadence
//!
//! * Every `poll_interval` (2.5 s by default, first tick immediately) the
//!   scheduler polls the discovery status and fetches nodes, links and
//!   (optionally) neighbor records.
//! * When a node fetch lands with a different identity set than the
//!   previous snapshot, exactly one extra link fetch is issued on the spot,
//!   so edges are resolved against the newest node set.
//! * A kind whose previous request has not answered yet is skipped by the
//!   tick and picked up again by a later one, so a controller slower than
//!   the interval still gets every reply applied.
//! * Failed requests are recorded per component and simply tried again on
//!   the next tick.
//!
//! ## Stale responses
//!
//! Each fetch kind carries a [`Generation`]. A completion is applied only
//! if no newer request of the same kind has been issued since; otherwise
//! it is dropped. Only the link refetch triggered by a node-set change can
//! overtake an outstanding request of the same kind. After [`SyncHandle::shutdown`] in-flight requests are
//! aborted and the store goes away with the task, so late responses cannot
//! write anywhere.

mod generation;

pub use generation::{FetchKind, Generation, RequestGenerations};

use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::api::{ControllerApi, ListPage, ListQuery};
use crate::config::SyncSettings;
use crate::discovery::{DiscoveryCommand, DiscoveryController};
use crate::error::{ApiError, SyncError};
use crate::graph::Graph;
use crate::metrics::{self, SyncMetrics};
use crate::model::{DiscoveryStatus, Link, Neighbor, Node};
use crate::store::{NodeSetChange, TopologyStore};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2500);

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub poll_interval: Duration,
    /// Also refresh the per-probe neighbor list each tick.
    pub fetch_neighbors: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            fetch_neighbors: true,
        }
    }
}

impl From<&SyncSettings> for SyncConfig {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            fetch_neighbors: settings.fetch_neighbors,
        }
    }
}

/// Last error per component; cleared by the next success of that kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentErrors {
    pub discovery: Option<String>,
    pub nodes: Option<String>,
    pub links: Option<String>,
    pub neighbors: Option<String>,
}

impl ComponentErrors {
    pub fn get(&self, kind: FetchKind) -> Option<&str> {
        match kind {
            FetchKind::Status => self.discovery.as_deref(),
            FetchKind::Nodes => self.nodes.as_deref(),
            FetchKind::Links => self.links.as_deref(),
            FetchKind::Neighbors => self.neighbors.as_deref(),
        }
    }

    pub fn any(&self) -> bool {
        FetchKind::ALL.iter().any(|k| self.get(*k).is_some())
    }

    fn slot(&mut self, kind: FetchKind) -> &mut Option<String> {
        match kind {
            FetchKind::Status => &mut self.discovery,
            FetchKind::Nodes => &mut self.nodes,
            FetchKind::Links => &mut self.links,
            FetchKind::Neighbors => &mut self.neighbors,
        }
    }
}

/// Point-in-time view of the scheduler state.
#[derive(Debug, Clone)]
pub struct SyncSnapshot {
    pub discovery: Option<DiscoveryStatus>,
    /// Start/refresh would currently be rejected.
    pub busy: bool,
    pub graph: Arc<Graph>,
    pub node_count: usize,
    pub link_count: usize,
    pub dangling_links: usize,
    pub neighbors: Vec<Neighbor>,
    pub errors: ComponentErrors,
}

enum SyncCommand {
    Discovery(DiscoveryCommand, oneshot::Sender<Result<(), SyncError>>),
    TickNow,
    Settled(oneshot::Sender<()>),
    Snapshot(oneshot::Sender<SyncSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

enum FetchOutcome {
    Status(Result<DiscoveryStatus, ApiError>),
    Nodes(Result<ListPage<Node>, ApiError>),
    Links(Result<ListPage<Link>, ApiError>),
    Neighbors(Result<ListPage<Neighbor>, ApiError>),
}

enum Completion {
    Fetch {
        generation: Generation,
        outcome: FetchOutcome,
    },
    Command {
        command: DiscoveryCommand,
        result: Result<(), ApiError>,
    },
}

#[derive(Clone, Debug)]
pub struct SyncHandle {
    tx: mpsc::UnboundedSender<SyncCommand>,
    graph_rx: watch::Receiver<Arc<Graph>>,
    metrics: Arc<SyncMetrics>,
}

impl SyncHandle {
    /// Ask the controller to begin a discovery run. Rejected without a
    /// request while discovery is busy.
    pub async fn start_discovery(&self) -> Result<(), SyncError> {
        self.discovery_command(DiscoveryCommand::Start).await
    }

    /// Ask for an incremental re-probe. Same gate as [`Self::start_discovery`].
    pub async fn refresh_discovery(&self) -> Result<(), SyncError> {
        self.discovery_command(DiscoveryCommand::Refresh).await
    }

    async fn discovery_command(&self, command: DiscoveryCommand) -> Result<(), SyncError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(SyncCommand::Discovery(command, tx))
            .map_err(|_| SyncError::Stopped)?;
        rx.await.map_err(|_| SyncError::Stopped)?
    }

    /// Run a tick now, outside the regular cadence.
    pub fn tick_now(&self) -> Result<(), SyncError> {
        self.tx
            .send(SyncCommand::TickNow)
            .map_err(|_| SyncError::Stopped)
    }

    /// Resolve once no request is in flight, including follow-up fetches.
    pub async fn settled(&self) -> Result<(), SyncError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(SyncCommand::Settled(tx))
            .map_err(|_| SyncError::Stopped)?;
        rx.await.map_err(|_| SyncError::Stopped)
    }

    pub async fn tick_and_settle(&self) -> Result<(), SyncError> {
        self.tick_now()?;
        self.settled().await
    }

    pub async fn snapshot(&self) -> Result<SyncSnapshot, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(SyncCommand::Snapshot(tx))
            .map_err(|_| SyncError::Stopped)?;
        rx.await.map_err(|_| SyncError::Stopped)
    }

    /// Receiver that is notified whenever the projected graph changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Graph>> {
        self.graph_rx.clone()
    }

    pub fn current_graph(&self) -> Arc<Graph> {
        self.graph_rx.borrow().clone()
    }

    pub fn metrics(&self) -> metrics::Snapshot {
        self.metrics.snapshot()
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Stop polling and abort in-flight requests.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(SyncCommand::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

/// Spawn a scheduler for `api` and return its handle.
pub fn start_sync<A>(config: SyncConfig, api: Arc<A>) -> SyncHandle
where
    A: ControllerApi + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let (graph_tx, graph_rx) = watch::channel(Arc::new(Graph::default()));
    let metrics = Arc::new(SyncMetrics::default());

    let worker = SyncWorker {
        api,
        config,
        store: TopologyStore::new(),
        discovery: DiscoveryController::new(),
        generations: RequestGenerations::new(),
        errors: ComponentErrors::default(),
        tasks: JoinSet::new(),
        pending_reply: None,
        settle_waiters: Vec::new(),
        graph_tx,
        metrics: Arc::clone(&metrics),
    };
    tokio::spawn(worker.run(rx));

    SyncHandle {
        tx,
        graph_rx,
        metrics,
    }
}

struct SyncWorker<A> {
    api: Arc<A>,
    config: SyncConfig,
    store: TopologyStore,
    discovery: DiscoveryController,
    generations: RequestGenerations,
    errors: ComponentErrors,
    tasks: JoinSet<Completion>,
    pending_reply: Option<oneshot::Sender<Result<(), SyncError>>>,
    settle_waiters: Vec<oneshot::Sender<()>>,
    graph_tx: watch::Sender<Arc<Graph>>,
    metrics: Arc<SyncMetrics>,
}

impl<A> SyncWorker<A>
where
    A: ControllerApi + 'static,
{
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SyncCommand>) {
        let period = self.config.poll_interval;
        info!("sync scheduler started (interval {}ms)", period.as_millis());
        self.tick();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(SyncCommand::Shutdown(done)) => {
                        self.tasks.abort_all();
                        let _ = done.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("all sync handles dropped");
                        break;
                    }
                },
                Some(joined) = self.tasks.join_next() => match joined {
                    Ok(completion) => self.apply(completion),
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => {
                        // the kind of a panicked request is unknown
                        warn!("sync request task failed: {}", e);
                        self.generations.clear_pending();
                    }
                },
                _ = ticker.tick() => self.tick(),
            }

            if self.tasks.is_empty() {
                for waiter in self.settle_waiters.drain(..) {
                    let _ = waiter.send(());
                }
            }
        }
        info!("sync scheduler stopped");
    }

    fn handle_command(&mut self, command: SyncCommand) {
        match command {
            SyncCommand::Discovery(command, reply) => self.begin_command(command, reply),
            SyncCommand::TickNow => self.tick(),
            SyncCommand::Settled(done) => self.settle_waiters.push(done),
            SyncCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            // handled by the run loop
            SyncCommand::Shutdown(_) => {}
        }
    }

    fn tick(&mut self) {
        self.metrics.inc_ticks();
        self.tick_fetch(FetchKind::Status);
        self.tick_fetch(FetchKind::Nodes);
        self.tick_fetch(FetchKind::Links);
        if self.config.fetch_neighbors {
            self.tick_fetch(FetchKind::Neighbors);
        }
    }

    fn tick_fetch(&mut self, kind: FetchKind) {
        if self.generations.in_flight(kind) {
            self.metrics.inc_fetches_skipped();
            debug!("{} request still outstanding, skipping this tick", kind);
            return;
        }
        self.spawn_fetch(kind);
    }

    fn spawn_fetch(&mut self, kind: FetchKind) {
        let generation = self.generations.issue(kind);
        self.metrics.record_request(kind);
        let api = Arc::clone(&self.api);
        self.tasks.spawn(async move {
            let query = ListQuery::all();
            let outcome = match kind {
                FetchKind::Status => FetchOutcome::Status(api.discovery_status().await),
                FetchKind::Nodes => FetchOutcome::Nodes(api.list_nodes(&query).await),
                FetchKind::Links => FetchOutcome::Links(api.list_links(&query).await),
                FetchKind::Neighbors => FetchOutcome::Neighbors(api.list_neighbors(&query).await),
            };
            Completion::Fetch {
                generation,
                outcome,
            }
        });
    }

    fn begin_command(
        &mut self,
        command: DiscoveryCommand,
        reply: oneshot::Sender<Result<(), SyncError>>,
    ) {
        if let Err(rejected) = self.discovery.try_begin(command) {
            self.metrics.inc_commands_rejected();
            debug!("discovery {} suppressed: {}", command, rejected);
            let _ = reply.send(Err(rejected.into()));
            return;
        }
        self.metrics.inc_commands_sent();
        self.pending_reply = Some(reply);
        let api = Arc::clone(&self.api);
        self.tasks.spawn(async move {
            let result = api.send_discovery_command(command).await;
            Completion::Command { command, result }
        });
    }

    fn apply(&mut self, completion: Completion) {
        match completion {
            Completion::Fetch {
                generation,
                outcome,
            } => self.apply_fetch(generation, outcome),
            Completion::Command { command, result } => {
                self.discovery.finish_command(command, &result);
                if let Some(reply) = self.pending_reply.take() {
                    let _ = reply.send(result.map_err(SyncError::from));
                }
            }
        }
    }

    fn apply_fetch(&mut self, generation: Generation, outcome: FetchOutcome) {
        if !self.generations.complete(generation) {
            self.metrics.inc_stale_discarded();
            debug!(
                "discarding superseded {} response (generation {} < {})",
                generation.kind,
                generation.value,
                self.generations.latest(generation.kind)
            );
            return;
        }

        match outcome {
            FetchOutcome::Status(Ok(status)) => {
                self.errors.discovery = None;
                if let Some((from, to)) = self.discovery.observe(status) {
                    info!("discovery status {} -> {}", from, to);
                }
            }
            FetchOutcome::Status(Err(e)) => {
                self.discovery.observe_failure(&e);
                self.record_failure(FetchKind::Status, e);
            }
            FetchOutcome::Nodes(Ok(page)) => {
                self.errors.nodes = None;
                if let NodeSetChange::Changed { added, removed } = self.store.set_nodes(page.items)
                {
                    debug!(
                        "node set changed (+{} -{}), refetching links",
                        added, removed
                    );
                    self.metrics.inc_link_refetches();
                    self.spawn_fetch(FetchKind::Links);
                }
                self.publish();
            }
            FetchOutcome::Links(Ok(page)) => {
                self.errors.links = None;
                self.store.set_links(page.items);
                let dangling = self.store.dangling_links();
                if dangling > 0 {
                    debug!("{} link(s) reference unknown nodes and were left out", dangling);
                }
                self.publish();
            }
            FetchOutcome::Neighbors(Ok(page)) => {
                self.errors.neighbors = None;
                self.store.set_neighbors(page.items);
            }
            FetchOutcome::Nodes(Err(e)) => self.record_failure(FetchKind::Nodes, e),
            FetchOutcome::Links(Err(e)) => self.record_failure(FetchKind::Links, e),
            FetchOutcome::Neighbors(Err(e)) => self.record_failure(FetchKind::Neighbors, e),
        }
    }

    fn record_failure(&mut self, kind: FetchKind, err: ApiError) {
        self.metrics.inc_failures();
        warn!("{} fetch failed: {}", kind, err);
        *self.errors.slot(kind) = Some(err.to_string());
    }

    fn publish(&self) {
        let graph = self.store.current_graph();
        self.graph_tx.send_if_modified(|current| {
            if **current == *graph {
                false
            } else {
                *current = Arc::new(graph.clone());
                true
            }
        });
    }

    fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            discovery: self.discovery.latest().cloned(),
            busy: self.discovery.is_busy(),
            graph: self.graph_tx.borrow().clone(),
            node_count: self.store.node_count(),
            link_count: self.store.link_count(),
            dangling_links: self.store.dangling_links(),
            neighbors: self.store.neighbors().to_vec(),
            errors: self.errors.clone(),
        }
    }
}
