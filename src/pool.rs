use crate::config::PoolConfig;
use crate::node::{Node, NodeDirectory};
use crate::session::{CommandOutput, ConnectionState, Connector, RemoteSession};
use crate::{FleetError, Result};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Available,
    Busy,
    Closed,
}

/// Busy entries without a session are either checked out or still connecting;
/// both count against the node's capacity.
struct SessionEntry {
    id: u64,
    state: SessionState,
    session: Option<RemoteSession>,
}

enum Checkout {
    Idle(RemoteSession),
    Reserved(u64),
    Full,
    Retired,
}

struct NodeSlot {
    hostname: String,
    node: RwLock<Arc<Node>>,
    sessions: Mutex<Vec<SessionEntry>>,
    retired: AtomicBool,
}

impl NodeSlot {
    fn new(node: Node) -> Self {
        Self {
            hostname: node.hostname.clone(),
            node: RwLock::new(Arc::new(node)),
            sessions: Mutex::new(Vec::new()),
            retired: AtomicBool::new(false),
        }
    }

    fn node(&self) -> Arc<Node> {
        Arc::clone(&self.node.read())
    }

    fn replace_node(&self, node: Node) {
        *self.node.write() = Arc::new(node);
    }

    fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Select-or-reserve runs entirely under the node lock, so an idle session
    /// is handed out once and reservations never push the live count past `max_conns`.
    fn check_out(&self, next_id: impl FnOnce() -> u64) -> Checkout {
        let mut sessions = self.sessions.lock();
        if self.is_retired() {
            return Checkout::Retired;
        }

        if let Some(entry) = sessions
            .iter_mut()
            .find(|e| e.state == SessionState::Available && e.session.is_some())
        {
            if let Some(session) = entry.session.take() {
                entry.state = SessionState::Busy;
                return Checkout::Idle(session);
            }
        }

        if sessions.len() >= self.node().max_conns {
            return Checkout::Full;
        }

        let id = next_id();
        sessions.push(SessionEntry {
            id,
            state: SessionState::Busy,
            session: None,
        });
        Checkout::Reserved(id)
    }

    fn cancel_reservation(&self, id: u64) {
        self.sessions.lock().retain(|e| e.id != id);
    }

    fn check_in(&self, mut session: RemoteSession) {
        {
            let mut sessions = self.sessions.lock();
            let over_capacity = sessions.len() > self.node().max_conns;
            let reusable = session.is_ready() && !self.is_retired() && !over_capacity;

            if let Some(index) = sessions.iter().position(|e| e.id == session.id()) {
                if reusable {
                    let entry = &mut sessions[index];
                    entry.state = SessionState::Available;
                    entry.session = Some(session);
                    return;
                }
                sessions.remove(index);
            }
        }

        debug!("Discarding session {} on {}", session.id(), self.hostname);
        session.close();
    }

    fn take_idle(&self, keep: usize) -> Vec<RemoteSession> {
        let mut sessions = self.sessions.lock();
        let mut idle = Vec::new();
        while sessions.len() > keep {
            let Some(index) = sessions.iter().position(|e| e.state == SessionState::Available) else {
                break;
            };
            if let Some(session) = sessions.remove(index).session {
                idle.push(session);
            }
        }
        idle
    }

    /// Closes idle sessions above the (possibly lowered) capacity
    fn trim_to_capacity(&self) {
        let excess = self.take_idle(self.node().max_conns);
        for mut session in excess {
            session.close();
        }
    }

    /// Idle sessions close now; busy ones close when released
    fn retire(&self) {
        self.retired.store(true, Ordering::Release);
        for mut session in self.take_idle(0) {
            session.close();
        }
    }

    fn stats(&self) -> NodeStats {
        let sessions = self.sessions.lock();
        let available = sessions
            .iter()
            .filter(|e| e.state == SessionState::Available)
            .count();
        NodeStats {
            hostname: self.hostname.clone(),
            max_conns: self.node().max_conns,
            live: sessions.len(),
            busy: sessions.len() - available,
            available,
            retired: self.is_retired(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStats {
    pub hostname: String,
    pub max_conns: usize,
    pub live: usize,
    pub busy: usize,
    pub available: usize,
    pub retired: bool,
}

/// Capacity-bounded SSH sessions over the nodes of a directory.
///
/// One instance is built at startup (`ConnectionPool::connect` performs the
/// initial directory sync), shared as `Arc<ConnectionPool>`, and torn down with
/// `shutdown`. Candidate selection is a linear scan in directory order; the first
/// capable node with room wins.
pub struct ConnectionPool {
    directory: Arc<dyn NodeDirectory>,
    connector: Arc<dyn Connector>,
    slots: RwLock<Vec<Arc<NodeSlot>>>,
    resync_interval: Option<Duration>,
    last_sync: Mutex<Option<Instant>>,
    next_session_id: AtomicU64,
}

impl ConnectionPool {
    pub fn new(
        directory: Arc<dyn NodeDirectory>,
        connector: Arc<dyn Connector>,
        config: &PoolConfig,
    ) -> Self {
        Self {
            directory,
            connector,
            slots: RwLock::new(Vec::new()),
            resync_interval: config.resync_interval(),
            last_sync: Mutex::new(None),
            next_session_id: AtomicU64::new(0),
        }
    }

    pub fn connect(
        directory: Arc<dyn NodeDirectory>,
        connector: Arc<dyn Connector>,
        config: &PoolConfig,
    ) -> Result<Self> {
        let pool = Self::new(directory, connector, config);
        pool.sync()?;
        Ok(pool)
    }

    /// Re-reads the directory. Known nodes keep their sessions, removed nodes are retired.
    pub fn sync(&self) -> Result<()> {
        *self.last_sync.lock() = Some(Instant::now());
        let nodes = self.directory.list_nodes()?;

        let mut slots = self.slots.write();
        let mut next: Vec<Arc<NodeSlot>> = Vec::with_capacity(nodes.len());
        for node in nodes {
            if next.iter().any(|s| s.hostname == node.hostname) {
                warn!("Duplicate node {} in directory, keeping the first record", node.hostname);
                continue;
            }
            match slots.iter().find(|s| s.hostname == node.hostname) {
                Some(existing) => {
                    existing.replace_node(node);
                    next.push(Arc::clone(existing));
                }
                None => next.push(Arc::new(NodeSlot::new(node))),
            }
        }

        let removed: Vec<Arc<NodeSlot>> = slots
            .iter()
            .filter(|s| !next.iter().any(|n| Arc::ptr_eq(n, s)))
            .cloned()
            .collect();
        *slots = next.clone();
        drop(slots);

        for slot in removed {
            info!("Node {} left the directory, draining its sessions", slot.hostname);
            slot.retire();
        }
        for slot in &next {
            slot.trim_to_capacity();
        }

        debug!("Directory sync complete: {} nodes", next.len());
        Ok(())
    }

    fn maybe_resync(&self) {
        let Some(interval) = self.resync_interval else {
            return;
        };
        let due = {
            let mut last = self.last_sync.lock();
            let due = last.map_or(true, |at| at.elapsed() >= interval);
            if due {
                *last = Some(Instant::now());
            }
            due
        };
        if due {
            if let Err(e) = self.sync() {
                warn!("Node directory re-sync failed, keeping known nodes: {}", e);
            }
        }
    }

    /// Returns a session on the first capable node that has an idle session or room for a new one.
    pub fn acquire(&self, capability: &str) -> Result<PooledSession> {
        self.maybe_resync();

        let candidates: Vec<Arc<NodeSlot>> = self
            .slots
            .read()
            .iter()
            .filter(|s| !s.is_retired() && s.node().has_capability(capability))
            .cloned()
            .collect();

        for slot in candidates {
            match self.acquire_from(&slot, capability) {
                Ok(session) => return Ok(session),
                Err(e) => debug!("Skipping node {} for {}: {}", slot.hostname, capability, e),
            }
        }

        debug!("No session available for capability {}", capability);
        Err(FleetError::ResourceExhausted {
            capability: capability.to_string(),
        })
    }

    /// Like `acquire`, restricted to one named node
    pub fn acquire_on(&self, hostname: &str, capability: &str) -> Result<PooledSession> {
        self.maybe_resync();

        let slot = self
            .slots
            .read()
            .iter()
            .find(|s| s.hostname == hostname)
            .cloned()
            .ok_or_else(|| FleetError::NodeUnavailable(hostname.to_string()))?;

        if !slot.node().has_capability(capability) {
            return Err(FleetError::NodeUnavailable(format!(
                "{} does not provide {}",
                hostname, capability
            )));
        }
        self.acquire_from(&slot, capability)
    }

    fn acquire_from(&self, slot: &Arc<NodeSlot>, capability: &str) -> Result<PooledSession> {
        let node = slot.node();
        match slot.check_out(|| self.next_session_id.fetch_add(1, Ordering::Relaxed) + 1) {
            Checkout::Idle(session) => {
                debug!("Reusing session {} on {}", session.id(), slot.hostname);
                Ok(PooledSession::new(Arc::clone(slot), session))
            }
            Checkout::Reserved(id) => {
                let mut session = RemoteSession::new(id, node.hostname.clone());
                match session.connect(&node, self.connector.as_ref()) {
                    Ok(()) => Ok(PooledSession::new(Arc::clone(slot), session)),
                    Err(e) => {
                        warn!("Failed to open session on {}: {}", slot.hostname, e);
                        slot.cancel_reservation(id);
                        Err(e)
                    }
                }
            }
            Checkout::Full => Err(FleetError::ResourceExhausted {
                capability: capability.to_string(),
            }),
            Checkout::Retired => Err(FleetError::NodeUnavailable(slot.hostname.clone())),
        }
    }

    pub fn release(&self, session: PooledSession) {
        session.release();
    }

    pub fn stats(&self) -> Vec<NodeStats> {
        self.slots.read().iter().map(|s| s.stats()).collect()
    }

    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.slots.read().iter().map(|s| s.node()).collect()
    }

    /// Closes idle sessions and retires every node; sessions still checked out close on release.
    pub fn shutdown(&self) {
        let slots = std::mem::take(&mut *self.slots.write());
        for slot in &slots {
            slot.retire();
        }
        info!("Connection pool shut down ({} nodes)", slots.len());
    }
}

/// A checked-out session. Dropping the guard returns the session to its node,
/// or discards it when it was closed or its node has left the directory.
pub struct PooledSession {
    id: u64,
    slot: Arc<NodeSlot>,
    session: Option<RemoteSession>,
}

impl PooledSession {
    fn new(slot: Arc<NodeSlot>, session: RemoteSession) -> Self {
        Self {
            id: session.id(),
            slot,
            session: Some(session),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn hostname(&self) -> &str {
        &self.slot.hostname
    }

    pub fn state(&self) -> SessionState {
        match &self.session {
            Some(session) if !session.is_closed() => SessionState::Busy,
            _ => SessionState::Closed,
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session
            .as_ref()
            .map(|s| s.state())
            .unwrap_or(ConnectionState::Closed)
    }

    pub fn execute(&mut self, command: &str, timeout: Option<Duration>) -> Result<CommandOutput> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| FleetError::Execution(format!("session {} already released", self.id)))?;
        session.execute(command, timeout)
    }

    pub fn release(self) {}
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.slot.check_in(session);
        }
    }
}

impl fmt::Debug for PooledSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledSession")
            .field("id", &self.id)
            .field("hostname", &self.slot.hostname)
            .field("state", &self.state())
            .finish()
    }
}
