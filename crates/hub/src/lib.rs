//! Client for the external dataset-hosting hub.
//!
//! Exports are published by creating a dataset repository and committing
//! JSONL files to its `main` branch.

pub mod client;
pub mod error;

pub use client::{CommitInfo, DatasetTarget, HubClient, HubFile, PushOutcome};
pub use error::HubError;
