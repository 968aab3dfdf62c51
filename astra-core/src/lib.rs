//! Astra Core
//!
//! Core types and abstractions for the Astra content generation system.
//!
//! This crate contains:
//! - Domain types: Core business entities (GenerationJob, DailyArtifact, etc.)
//! - DTOs: Data transfer objects for the orchestrator API
//! - Input hashing and timezone utilities shared across services

pub mod domain;
pub mod dto;
pub mod hash;
pub mod timezone;
