//! Core domain types
//!
//! This module contains the core domain structures used across Astra services.
//! These types represent the fundamental business entities and are shared between
//! the orchestrator (for persistence) and the generation pipelines (for execution).

pub mod artifact;
pub mod job;
