//! Core domain types
//!
//! This module contains the core domain structures used across Strata crates.
//! These types represent the fundamental business entities and are shared between
//! the record store (for persistence) and the engine (for orchestration).

pub mod developer;
pub mod pipeline;
pub mod service;
