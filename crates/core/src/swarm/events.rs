//! # Swarm Events
//!
//! Progress events emitted by the coordinator while a mission runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of swarm event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SwarmEventKind {
    PipelineStarted,
    /// Pipeline status moved; `data.status` holds the new value
    StatusChanged,
    /// Fetch phase finished; `data.count` files retained
    FilesFetched,
    AgentStarted,
    AgentCompleted,
    AgentFailed,
    PipelineCompleted,
    PipelineFailed,
    RefinementStarted,
    RefinementCompleted,
    RefinementFailed,
}

/// An event in the swarm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmEvent {
    /// Monotonic per-coordinator sequence number, assigned on emit
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: SwarmEventKind,
    /// Agent that produced this event (`coordinator` for pipeline-level events)
    pub agent: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl SwarmEvent {
    pub fn new(kind: SwarmEventKind, agent: &str) -> Self {
        Self {
            seq: 0,
            timestamp: Utc::now(),
            kind,
            agent: agent.to_string(),
            data: None,
        }
    }

    /// Add data to the event
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}
