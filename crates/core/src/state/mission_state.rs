//! # Mission State
//!
//! The single explicit state object a coordinator owns for the lifetime of a
//! session. Display collaborators read it through [`MissionSnapshot`]s.

use serde::{Deserialize, Serialize};

use super::images::{ImageError, ImageRef};
use crate::swarm::pipeline::PipelineStatus;
use crate::tools::chunk_parser::{parse_chunks, ParsedPromptChunk};
use crate::tools::fetcher::RepoFile;

#[derive(Debug, Clone, Default)]
pub struct MissionState {
    pub status: PipelineStatus,
    /// Shared context threaded Scout → Architect, seeded with the manifesto
    pub mission_log: String,
    /// Taskmaster output, wholesale-replaced by each successful refinement
    pub final_prompt: Option<String>,
    pub error: Option<String>,
    /// Files from the last fetch; read-only after the fetch phase
    pub files: Vec<RepoFile>,
    pub images: Vec<ImageRef>,
}

impl MissionState {
    pub fn new(manifesto: &str) -> Self {
        Self {
            mission_log: manifesto.to_string(),
            ..Self::default()
        }
    }

    /// Clear the previous run's outputs before a fresh pipeline run
    pub fn reset_for_run(&mut self, manifesto: &str) {
        self.mission_log = manifesto.to_string();
        self.final_prompt = None;
        self.error = None;
        self.files.clear();
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = PipelineStatus::Error;
        self.error = Some(message.into());
    }

    pub fn attach_image(&mut self, image: ImageRef) -> usize {
        self.images.push(image);
        self.images.len() - 1
    }

    pub fn remove_image(&mut self, index: usize) -> Result<ImageRef, ImageError> {
        if index >= self.images.len() {
            return Err(ImageError::NoSuchImage(index));
        }
        Ok(self.images.remove(index))
    }

    /// Chunks of the current final prompt; empty when there is none
    pub fn chunks(&self) -> Vec<ParsedPromptChunk> {
        self.final_prompt
            .as_deref()
            .map(parse_chunks)
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> MissionSnapshot {
        MissionSnapshot {
            status: self.status,
            mission_log: self.mission_log.clone(),
            final_prompt: self.final_prompt.clone(),
            error: self.error.clone(),
            file_count: self.files.len(),
            image_count: self.images.len(),
            files: self
                .files
                .iter()
                .map(|f| FileSummary {
                    path: f.path.clone(),
                    size: f.size,
                })
                .collect(),
            images: self
                .images
                .iter()
                .map(|i| ImageSummary {
                    mime_type: i.mime_type.clone(),
                    bytes: i.decoded_len(),
                })
                .collect(),
        }
    }
}

/// Read-only view published after every state mutation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissionSnapshot {
    pub status: PipelineStatus,
    pub mission_log: String,
    pub final_prompt: Option<String>,
    pub error: Option<String>,
    pub file_count: usize,
    pub image_count: usize,
    /// Paths and sizes of the fetched files, in fetch order
    #[serde(default)]
    pub files: Vec<FileSummary>,
    /// Attached images, in attach order
    #[serde(default)]
    pub images: Vec<ImageSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub mime_type: String,
    pub bytes: usize,
}
