//! Atomically swappable agent + tracker store snapshot.
use std::sync::Arc;

use arc_swap::ArcSwap;

use parley_session::TrackerStore;

use crate::dialogue_agent::DialogueAgent;

/// One consistent view of the loaded agent and its tracker store.
#[derive(Clone)]
pub struct AgentRuntimeSnapshot {
    pub agent: Option<Arc<dyn DialogueAgent>>,
    pub tracker_store: Option<Arc<dyn TrackerStore>>,
    pub version: u64,
}

impl AgentRuntimeSnapshot {
    /// The agent when one is loaded and ready to serve.
    pub fn ready_agent(&self) -> Option<Arc<dyn DialogueAgent>> {
        self.agent.as_ref().filter(|agent| agent.is_ready()).cloned()
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.agent.as_deref().map(|agent| agent.fingerprint())
    }
}

impl std::fmt::Debug for AgentRuntimeSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRuntimeSnapshot")
            .field("fingerprint", &self.fingerprint())
            .field("has_tracker_store", &self.tracker_store.is_some())
            .field("version", &self.version)
            .finish()
    }
}

/// Shared handle whose snapshot is replaced wholesale on model reload.
#[derive(Debug, Clone)]
pub struct AgentRuntime {
    current: Arc<ArcSwap<AgentRuntimeSnapshot>>,
}

impl AgentRuntime {
    pub fn new(
        agent: Option<Arc<dyn DialogueAgent>>,
        tracker_store: Option<Arc<dyn TrackerStore>>,
    ) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(AgentRuntimeSnapshot {
                agent,
                tracker_store,
                version: 0,
            })),
        }
    }

    /// The snapshot in effect right now; later swaps do not affect it.
    pub fn snapshot(&self) -> Arc<AgentRuntimeSnapshot> {
        self.current.load_full()
    }

    /// Installs `agent` alongside the current tracker store and returns the
    /// new snapshot version.
    pub fn replace_agent(&self, agent: Arc<dyn DialogueAgent>) -> u64 {
        let previous = self.current.rcu(|current| AgentRuntimeSnapshot {
            agent: Some(agent.clone()),
            tracker_store: current.tracker_store.clone(),
            version: current.version.saturating_add(1),
        });
        let version = previous.version.saturating_add(1);
        tracing::info!(
            fingerprint = agent.fingerprint(),
            version,
            "swapped dialogue agent"
        );
        version
    }
}
