//! Git abstraction layer for Shipwright.
//!
//! This crate provides the local Git operations a release needs:
//! - Repository discovery and status checks
//! - Commit and tag listing
//! - Release commit, tag and their rollback

mod error;
mod repository;

pub use error::{GitError, GitResult};
pub use repository::{CommitSummary, Repository, ResetTarget};
