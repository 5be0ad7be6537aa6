use std::sync::Arc;

use learning_core::memory::MemoryStore;
use learning_core::ports::{DecisionSource, LearningEventStore};
use learning_core::AgentIdentity;
use learning_postgres::PgStores;

/// Shared state for all routes. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<AgentIdentity>,
    pub events: Arc<dyn LearningEventStore>,
    pub decisions: Arc<dyn DecisionSource>,
}

impl AppState {
    pub fn new(
        agent: AgentIdentity,
        events: Arc<dyn LearningEventStore>,
        decisions: Arc<dyn DecisionSource>,
    ) -> Self {
        Self {
            agent: Arc::new(agent),
            events,
            decisions,
        }
    }

    pub fn postgres(agent: AgentIdentity, stores: PgStores) -> Self {
        Self::new(agent, Arc::new(stores.events), Arc::new(stores.decisions))
    }

    /// Both ports served by one in-memory store.
    pub fn in_memory(agent: AgentIdentity, store: Arc<MemoryStore>) -> Self {
        Self::new(agent, store.clone(), store)
    }
}
