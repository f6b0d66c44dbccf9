//! Vitalis - Personal health assistant with tiered memory
//!
//! This crate provides a chat service that answers questions about personal
//! health data with four memory tiers, response validation against tool
//! evidence, and a bounded retry policy for hallucinated values.

pub mod agent;
pub mod chat;
pub mod config;
pub mod embedding;
pub mod error;
pub mod memory;
pub mod router;
pub mod server;
pub mod store;
pub mod testing;
pub mod validation;

pub use error::VitalisError;
