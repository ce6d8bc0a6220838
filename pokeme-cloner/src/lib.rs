//! # pokeme-cloner
//!
//! Replaces a destination directory with a fresh shallow clone of one commit
//! and renders secret placeholders into the files it contains.
//!
//! Call [`Cloner::clone_commit`] directly, or go through the [`Deploy`] trait
//! when the caller should not depend on git at all.

pub mod cloner;
pub mod error;
pub mod git;
pub mod render;
pub mod writer;

pub use cloner::{backup_path, CloneReport, Cloner, Deploy};
pub use error::CloneError;
pub use git::GitTransport;
