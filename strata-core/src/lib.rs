//! Strata Core
//!
//! Core types and pure logic for the Strata service delivery platform.
//!
//! This crate contains:
//! - Domain types: Core business entities (ServiceDescriptor, PipelineRun, etc.)
//! - DTOs: Data transfer objects for CLI <-> record store communication
//! - Tenant identity derivation
//! - Cluster manifest generation

pub mod domain;
pub mod dto;
pub mod manifest;
pub mod tenant;
