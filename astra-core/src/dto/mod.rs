//! DTOs for the orchestrator API

pub mod guidance;
pub mod job;
