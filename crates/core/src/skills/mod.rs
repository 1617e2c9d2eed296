//! # Mission Skills
//!
//! The four model-backed stages of the pipeline.
//!
//! ```text
//! Scout ──▶ Architect ──▶ Taskmaster ──▶ (final prompt) ◀──▶ Refiner
//!   mission log ──────▶ mission log ──▶
//! ```
//!
//! Each skill is stateless: it assembles a [`ModelRequest`](crate::llm::ModelRequest)
//! from its inputs and a fixed system template, makes one call, and returns text.
//! Control flow lives in the coordinator.

pub mod llm_helpers;
pub mod prompts;

pub mod architect_skill;
pub mod refiner_skill;
pub mod scout_skill;
pub mod taskmaster_skill;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use architect_skill::{ArchitectInput, ArchitectSkill};
pub use refiner_skill::{RefinerInput, RefinerSkill};
pub use scout_skill::{ScoutInput, ScoutSkill};
pub use taskmaster_skill::{TaskmasterInput, TaskmasterSkill};

/// One of the four model-invocation steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStage {
    Scout,
    Architect,
    Taskmaster,
    Refiner,
}

impl AgentStage {
    pub fn all() -> [AgentStage; 4] {
        [
            AgentStage::Scout,
            AgentStage::Architect,
            AgentStage::Taskmaster,
            AgentStage::Refiner,
        ]
    }

    /// Key used for per-agent config overrides and event payloads
    pub fn id(self) -> &'static str {
        match self {
            AgentStage::Scout => "scout",
            AgentStage::Architect => "architect",
            AgentStage::Taskmaster => "taskmaster",
            AgentStage::Refiner => "refiner",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            AgentStage::Scout => "Scout",
            AgentStage::Architect => "Architect",
            AgentStage::Taskmaster => "Taskmaster",
            AgentStage::Refiner => "Refiner",
        }
    }

    pub fn default_temperature(self) -> f32 {
        match self {
            AgentStage::Scout => 0.3,
            AgentStage::Architect => 0.4,
            AgentStage::Taskmaster => 0.2,
            AgentStage::Refiner => 0.2,
        }
    }

    pub fn system_prompt(self) -> &'static str {
        match self {
            AgentStage::Scout => prompts::SCOUT,
            AgentStage::Architect => prompts::ARCHITECT,
            AgentStage::Taskmaster => prompts::TASKMASTER,
            AgentStage::Refiner => prompts::REFINER,
        }
    }

    /// Substituted when the model returns nothing
    pub fn empty_placeholder(self) -> &'static str {
        match self {
            AgentStage::Scout => "Scout returned no analysis.",
            AgentStage::Architect => "Architect returned no plan.",
            AgentStage::Taskmaster => "Taskmaster returned no prompts.",
            AgentStage::Refiner => "Refiner returned no prompts.",
        }
    }
}

impl std::fmt::Display for AgentStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A stage's model call was rejected
#[derive(Debug, Error)]
#[error("{stage} agent failed: {source:#}")]
pub struct StageError {
    pub stage: AgentStage,
    #[source]
    pub source: anyhow::Error,
}
