//! # Mission Forge Core
//!
//! Turns a repository plus an objective into a sequence of self-contained
//! prompts for a coding agent.
//!
//! ## Architecture
//!
//! - `llm/` - `ModelClient` contract and provider wire protocols
//! - `models` - Provider selection and per-stage model configuration
//! - `skills/` - The four model-backed stages (Scout, Architect, Taskmaster, Refiner)
//! - `state/` - Mission state and attached images
//! - `swarm/` - Coordinator, status machine and progress events
//! - `tools/` - Repository fetching, file filtering and chunk parsing
//!
//! ## Usage
//!
//! ```rust,ignore
//! use missionforge_core::swarm::{Coordinator, CoordinatorConfig, PipelineRequest};
//!
//! let mut coordinator = Coordinator::new(CoordinatorConfig::default());
//! coordinator
//!     .execute_pipeline(PipelineRequest::new("https://github.com/acme/app", "Add dark mode"))
//!     .await;
//! for chunk in coordinator.state().chunks() {
//!     println!("{}: {}", chunk.id, chunk.title);
//! }
//! ```

pub mod llm;
pub mod models;
pub mod skills;
pub mod state;
pub mod swarm;
pub mod tools;
