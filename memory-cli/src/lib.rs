//! # Memory CLI Library
//!
//! Operator CLI for the cognitive memory service: schema initialization,
//! a connectivity health probe, and ad-hoc graph inspection/mutation.
//! The MCP stdio server itself lives in `memory-mcp`; this crate is for
//! operators, not for agent clients.

pub mod commands;
pub mod config;
pub mod errors;
pub mod output;
