//! Test utilities & fixtures.
//! Provides a scripted, in-memory controller that stands in for the REST API.

#![allow(dead_code)] // each test binary uses a different subset

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use meshmap::api::{ControllerApi, ListPage, ListQuery};
use meshmap::discovery::DiscoveryCommand;
use meshmap::error::ApiError;
use meshmap::model::{DiscoveryState, DiscoveryStatus, Link, Neighbor, Node};
use meshmap::sync::{FetchKind, SyncConfig};

/// Scheduler config that never ticks on its own during a test.
pub fn manual_sync_config() -> SyncConfig {
    SyncConfig {
        poll_interval: Duration::from_secs(3600),
        fetch_neighbors: true,
    }
}

/// The two-node network used throughout the scenarios.
pub fn two_nodes() -> Vec<Node> {
    vec![Node::new(1, "A").local(), Node::new(2, "B")]
}

pub fn one_link() -> Vec<Link> {
    vec![Link::new(9u64, 1, 2, 0.5)]
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub status: usize,
    pub nodes: usize,
    pub links: usize,
    pub neighbors: usize,
    pub commands: usize,
}

#[derive(Debug, Default)]
struct Script {
    status: DiscoveryStatus,
    nodes: Vec<Node>,
    links: Vec<Link>,
    neighbors: Vec<Neighbor>,
    /// One-shot link replies consumed in call order before falling back to `links`.
    link_replies: VecDeque<(Duration, Vec<Link>)>,
    failing: HashSet<FetchKind>,
    /// Time the controller takes to answer each kind of request.
    delays: HashMap<FetchKind, Duration>,
    fail_commands: bool,
    calls: CallCounts,
    commands: Vec<DiscoveryCommand>,
}

/// In-memory controller. A start or refresh command flips the reported
/// status to `running`, the way a real controller would on its next poll.
#[derive(Debug, Default)]
pub struct ScriptedApi {
    script: Mutex<Script>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        let api = Self::default();
        api.set_status(DiscoveryState::Idle);
        api
    }

    pub fn with_topology(nodes: Vec<Node>, links: Vec<Link>) -> Self {
        let api = Self::new();
        api.set_nodes(nodes);
        api.set_links(links);
        api
    }

    pub fn set_status(&self, state: DiscoveryState) {
        self.script.lock().unwrap().status.status = state;
    }

    pub fn set_full_status(&self, status: DiscoveryStatus) {
        self.script.lock().unwrap().status = status;
    }

    pub fn set_nodes(&self, nodes: Vec<Node>) {
        self.script.lock().unwrap().nodes = nodes;
    }

    pub fn set_links(&self, links: Vec<Link>) {
        self.script.lock().unwrap().links = links;
    }

    pub fn set_neighbors(&self, neighbors: Vec<Neighbor>) {
        self.script.lock().unwrap().neighbors = neighbors;
    }

    pub fn queue_link_reply(&self, delay: Duration, links: Vec<Link>) {
        self.script
            .lock()
            .unwrap()
            .link_replies
            .push_back((delay, links));
    }

    pub fn set_failing(&self, kind: FetchKind, failing: bool) {
        let mut script = self.script.lock().unwrap();
        if failing {
            script.failing.insert(kind);
        } else {
            script.failing.remove(&kind);
        }
    }

    pub fn set_delay(&self, kind: FetchKind, delay: Duration) {
        self.script.lock().unwrap().delays.insert(kind, delay);
    }

    pub fn set_commands_failing(&self, failing: bool) {
        self.script.lock().unwrap().fail_commands = failing;
    }

    pub fn calls(&self) -> CallCounts {
        self.script.lock().unwrap().calls
    }

    pub fn commands(&self) -> Vec<DiscoveryCommand> {
        self.script.lock().unwrap().commands.clone()
    }

    fn delay(script: &Script, kind: FetchKind) -> Duration {
        script.delays.get(&kind).copied().unwrap_or(Duration::ZERO)
    }

    fn unavailable(kind: FetchKind) -> ApiError {
        ApiError::Status {
            path: format!("/{}", kind),
            status: 503,
            body: "controller unavailable".to_string(),
        }
    }
}

impl ControllerApi for ScriptedApi {
    async fn list_nodes(&self, _query: &ListQuery) -> Result<ListPage<Node>, ApiError> {
        let (delay, reply) = {
            let mut script = self.script.lock().unwrap();
            script.calls.nodes += 1;
            if script.failing.contains(&FetchKind::Nodes) {
                return Err(Self::unavailable(FetchKind::Nodes));
            }
            (Self::delay(&script, FetchKind::Nodes), script.nodes.clone())
        };
        pause(delay).await;
        Ok(ListPage::new(reply))
    }

    async fn list_links(&self, _query: &ListQuery) -> Result<ListPage<Link>, ApiError> {
        let (delay, reply) = {
            let mut script = self.script.lock().unwrap();
            script.calls.links += 1;
            if script.failing.contains(&FetchKind::Links) {
                return Err(Self::unavailable(FetchKind::Links));
            }
            match script.link_replies.pop_front() {
                Some(queued) => queued,
                None => (Self::delay(&script, FetchKind::Links), script.links.clone()),
            }
        };
        pause(delay).await;
        Ok(ListPage::new(reply))
    }

    async fn list_neighbors(&self, _query: &ListQuery) -> Result<ListPage<Neighbor>, ApiError> {
        let (delay, reply) = {
            let mut script = self.script.lock().unwrap();
            script.calls.neighbors += 1;
            if script.failing.contains(&FetchKind::Neighbors) {
                return Err(Self::unavailable(FetchKind::Neighbors));
            }
            (
                Self::delay(&script, FetchKind::Neighbors),
                script.neighbors.clone(),
            )
        };
        pause(delay).await;
        Ok(ListPage::new(reply))
    }

    async fn discovery_status(&self) -> Result<DiscoveryStatus, ApiError> {
        let (delay, reply) = {
            let mut script = self.script.lock().unwrap();
            script.calls.status += 1;
            if script.failing.contains(&FetchKind::Status) {
                return Err(Self::unavailable(FetchKind::Status));
            }
            (Self::delay(&script, FetchKind::Status), script.status.clone())
        };
        pause(delay).await;
        Ok(reply)
    }

    async fn send_discovery_command(&self, command: DiscoveryCommand) -> Result<(), ApiError> {
        let mut script = self.script.lock().unwrap();
        script.calls.commands += 1;
        if script.fail_commands {
            return Err(ApiError::Status {
                path: "/neighbors/discovery".to_string(),
                status: 500,
                body: "busy".to_string(),
            });
        }
        script.commands.push(command);
        script.status.status = DiscoveryState::Running;
        Ok(())
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
