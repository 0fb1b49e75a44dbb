// content-gate-config/src/lib.rs
// ============================================================================
// Module: Content Gate Config Library
// Description: Canonical config model, validation, and example generation.
// Purpose: Single source of truth for content-gate.toml semantics.
// Dependencies: content-gate-core, content-gate-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `content-gate-config` defines the configuration model shared by the
//! server and the CLI. Validation is strict and fail-closed, and the model
//! converts into the runtime settings types of `content-gate-core`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
