//! # Swarm Orchestration
//!
//! Coordinates the mission pipeline.
//!
//! ## Pipeline Flow
//!
//! ```text
//! Repository → Scout → Architect → Taskmaster → Final Prompt ⟷ Refiner
//! ```

pub mod coordinator;
pub mod events;
pub mod pipeline;

pub use coordinator::{
    Coordinator, CoordinatorConfig, PipelineRequest, RunOutcome, StageClients,
};
pub use events::{SwarmEvent, SwarmEventKind};
pub use pipeline::PipelineStatus;
