//! Data Transfer Objects for CLI <-> record store communication
//!
//! DTOs are lightweight request/response shapes for the record store API.
//! Domain entities travel as-is in responses; requests use these types.

pub mod developer;
pub mod pipeline;
pub mod service;
