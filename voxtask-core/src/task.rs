use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;

/// A task extracted from a finished utterance. Built once per utterance and
/// handed to the store unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedTask {
    /// Human-readable title; never empty ("Untitled task" when nothing
    /// survives parsing).
    pub title: String,
    /// Resolved due datetime, when the transcript carried one.
    pub when: Option<DateTime<Local>>,
    /// The transcript the task was parsed from, verbatim.
    pub raw_transcript: String,
}

/// Destination for parsed tasks. Implemented by the embedding shell; this
/// crate defines neither its schema nor its persistence.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(&self, task: &ParsedTask) -> anyhow::Result<()>;
}
